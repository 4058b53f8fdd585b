//! Catalog queries feeding lab sessions.

#![allow(clippy::unwrap_used)]

use chrono::Utc;
use skilltrack_core::ExperienceLevel;
use skilltrack_integration_tests::TestContext;
use skilltrack_labs::catalog::LabFilter;
use skilltrack_labs::lab_session::{LabSession, LabSessionState, Urgency};

#[tokio::test]
async fn test_app_state_carries_embedded_catalog() {
    let ctx = TestContext::new();
    let catalog = ctx.state.catalog();

    assert!(!catalog.services().is_empty());
    for service in catalog.services() {
        assert!(!service.courses.is_empty(), "{} has no courses", service.id);
    }
    for lab in catalog.labs() {
        assert!(
            catalog
                .lab_categories()
                .iter()
                .any(|c| c.id == lab.category),
            "{} has no category",
            lab.id
        );
    }
}

#[tokio::test]
async fn test_free_intermediate_devops_lab_runs_for_its_duration() {
    let ctx = TestContext::new();
    let labs = ctx.state.catalog().search_labs(&LabFilter {
        category: Some("devops".to_owned()),
        difficulty: Some(ExperienceLevel::Intermediate),
        free_only: true,
        ..LabFilter::default()
    });
    let ids: Vec<&str> = labs.iter().map(|l| l.id.as_str()).collect();
    assert_eq!(ids, ["docker-containerization", "azure-devops-pipeline"]);

    let lab = labs.first().copied().unwrap();
    let mut session = LabSession::for_lab(lab);
    assert_eq!(session.format_remaining(), "01:30:00");

    let id = session.start(Utc::now()).unwrap().to_owned();
    assert!(id.starts_with("lab-docker-containerization-"));
    session.ready().unwrap();
    assert_eq!(session.tick().unwrap(), LabSessionState::Active);
    assert_eq!(session.format_remaining(), "01:29:59");
    assert_eq!(session.urgency(), Urgency::Comfortable);

    session.end().unwrap();
    assert_eq!(session.state(), LabSessionState::Ended);
    session.reset().unwrap();
    assert_eq!(session.format_remaining(), "01:30:00");
}

#[tokio::test]
async fn test_popular_labs_are_flagged() {
    let ctx = TestContext::new();
    let popular: Vec<&str> = ctx
        .state
        .catalog()
        .popular_labs()
        .map(|l| l.id.as_str())
        .collect();
    assert_eq!(popular.len(), 5);
    assert!(popular.contains(&"aws-ec2-setup"));
    assert!(!popular.contains(&"kubernetes-deployment"));
}
