//! Access decisions for auth-dependent routes.
//!
//! Routes fall into four kinds:
//!
//! | kind | paths | rule |
//! |---|---|---|
//! | sign-in page | `/auth` | signed-in users are sent on (`/admin` for admins, `/` otherwise) |
//! | admin | `/admin`, `/admin/*` | admin profile required |
//! | protected | `/dashboard`, `/profile`, `/enroll/*` | session required |
//! | public | everything else | always allowed |
//!
//! Nothing is decided while the session is still loading.

use crate::services::bootstrap::AuthSnapshot;

/// Where signed-out users are sent.
pub const SIGN_IN_PATH: &str = "/auth";
/// Landing page for admins after sign-in.
pub const ADMIN_HOME_PATH: &str = "/admin";
/// Landing page for everyone else after sign-in.
pub const HOME_PATH: &str = "/";

/// The outcome of a route check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Session still loading; show a spinner.
    Pending,
    Allow,
    Redirect(&'static str),
    /// Signed in, but not allowed here.
    Forbidden,
}

/// How a route is protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Public,
    SignIn,
    Protected,
    Admin,
}

impl RouteKind {
    /// Classify a path. Query strings and trailing slashes are ignored.
    #[must_use]
    pub fn of(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };

        if path == SIGN_IN_PATH {
            Self::SignIn
        } else if is_under(path, ADMIN_HOME_PATH) {
            Self::Admin
        } else if path == "/dashboard" || path == "/profile" || is_under(path, "/enroll") {
            Self::Protected
        } else {
            Self::Public
        }
    }
}

fn is_under(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Decide whether the current user may see `path`.
#[must_use]
pub fn evaluate(path: &str, snapshot: &AuthSnapshot) -> Access {
    let kind = RouteKind::of(path);
    if kind == RouteKind::Public {
        return Access::Allow;
    }
    if snapshot.loading {
        return Access::Pending;
    }

    match kind {
        RouteKind::Public => Access::Allow,
        RouteKind::SignIn => match (&snapshot.session, &snapshot.profile) {
            (Some(_), Some(profile)) if profile.role.is_admin() => {
                Access::Redirect(ADMIN_HOME_PATH)
            }
            (Some(_), Some(_)) => Access::Redirect(HOME_PATH),
            _ => Access::Allow,
        },
        RouteKind::Protected | RouteKind::Admin if !snapshot.is_signed_in() => {
            Access::Redirect(SIGN_IN_PATH)
        }
        RouteKind::Protected => Access::Allow,
        RouteKind::Admin if snapshot.is_admin() => Access::Allow,
        RouteKind::Admin => Access::Forbidden,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use secrecy::SecretString;
    use skilltrack_core::{Email, Role, UserId};

    use super::*;
    use crate::models::{AuthUser, NewProfile, Session, UserMetadata};

    fn snapshot(role: Option<Role>) -> AuthSnapshot {
        let id = UserId::random();
        let email = Email::parse("g@example.com").unwrap();
        let session = Session {
            access_token: SecretString::from("a"),
            refresh_token: SecretString::from("r"),
            token_type: "bearer".to_owned(),
            expires_at: None,
            user: AuthUser {
                id,
                email: Some(email.clone()),
                user_metadata: UserMetadata::default(),
            },
        };
        let profile = role.map(|role| {
            let mut profile =
                NewProfile::with_defaults(id, email.clone(), None).into_profile(Utc::now());
            profile.role = role;
            profile
        });
        AuthSnapshot {
            session: Some(session),
            profile,
            loading: false,
        }
    }

    fn signed_out() -> AuthSnapshot {
        AuthSnapshot {
            session: None,
            profile: None,
            loading: false,
        }
    }

    #[test]
    fn test_route_kinds() {
        assert_eq!(RouteKind::of("/"), RouteKind::Public);
        assert_eq!(RouteKind::of("/labs/aws-ec2"), RouteKind::Public);
        assert_eq!(RouteKind::of("/auth/"), RouteKind::SignIn);
        assert_eq!(RouteKind::of("/admin"), RouteKind::Admin);
        assert_eq!(RouteKind::of("/admin/users?page=2"), RouteKind::Admin);
        assert_eq!(RouteKind::of("/administrator"), RouteKind::Public);
        assert_eq!(RouteKind::of("/enroll/cloud/aws-sa"), RouteKind::Protected);
        assert_eq!(RouteKind::of("/dashboard"), RouteKind::Protected);
    }

    #[test]
    fn test_pending_while_loading_except_public() {
        let loading = AuthSnapshot {
            loading: true,
            ..signed_out()
        };
        assert_eq!(evaluate("/admin", &loading), Access::Pending);
        assert_eq!(evaluate("/auth", &loading), Access::Pending);
        assert_eq!(evaluate("/labs", &loading), Access::Allow);
    }

    #[test]
    fn test_signed_out_is_sent_to_sign_in() {
        assert_eq!(evaluate("/dashboard", &signed_out()), Access::Redirect("/auth"));
        assert_eq!(evaluate("/admin", &signed_out()), Access::Redirect("/auth"));
        assert_eq!(evaluate("/auth", &signed_out()), Access::Allow);
    }

    #[test]
    fn test_admin_routes_forbid_students() {
        let student = snapshot(Some(Role::Student));
        assert_eq!(evaluate("/admin", &student), Access::Forbidden);
        assert_eq!(evaluate("/dashboard", &student), Access::Allow);

        let admin = snapshot(Some(Role::Admin));
        assert_eq!(evaluate("/admin/courses", &admin), Access::Allow);
    }

    #[test]
    fn test_missing_profile_cannot_enter_admin() {
        assert_eq!(evaluate("/admin", &snapshot(None)), Access::Forbidden);
        assert_eq!(evaluate("/auth", &snapshot(None)), Access::Allow);
    }

    #[test]
    fn test_sign_in_page_redirects_by_role() {
        assert_eq!(
            evaluate("/auth", &snapshot(Some(Role::Admin))),
            Access::Redirect("/admin")
        );
        assert_eq!(
            evaluate("/auth", &snapshot(Some(Role::Instructor))),
            Access::Redirect("/")
        );
    }
}
