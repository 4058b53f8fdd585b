//! Static course and lab catalog.
//!
//! The catalog ships inside the binary as JSON (`data/catalog.json`) and is
//! checked once when loaded: ids must be unique and every lab must belong to
//! a known category.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use skilltrack_core::{ExperienceLevel, Price};

const EMBEDDED_CATALOG: &str = include_str!("../data/catalog.json");

/// Session length used when a lab's duration has no number in it.
const DEFAULT_LAB_MINUTES: u32 = 60;

/// Errors that can occur when loading or querying the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog document is malformed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Two entries share an id.
    #[error("duplicate id: {0}")]
    DuplicateId(String),

    /// A lab points at a category that does not exist.
    #[error("lab {lab} has unknown category {category}")]
    UnknownCategory { lab: String, category: String },

    #[error("service not found: {0}")]
    ServiceNotFound(String),

    #[error("course not found: {service}/{course}")]
    CourseNotFound { service: String, course: String },

    #[error("lab not found: {0}")]
    LabNotFound(String),
}

/// A service area grouping related courses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Icon name.
    pub icon: String,
    pub courses: Vec<Course>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Human-readable length, e.g. "8 weeks".
    pub duration: String,
    pub level: ExperienceLevel,
    pub price: Price,
    pub instructor: String,
    pub rating: f64,
    pub students: u32,
    pub image: String,
    pub features: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabCategory {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    /// Advertised number of labs in the category.
    pub count: u32,
}

/// A hands-on lab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lab {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Id of the [`LabCategory`].
    pub category: String,
    pub difficulty: ExperienceLevel,
    /// Human-readable length, e.g. "45 minutes".
    pub duration: String,
    pub technology: Vec<String>,
    pub provider: String,
    pub rating: f64,
    pub students: u32,
    pub image: String,
    pub features: Vec<String>,
    pub objectives: Vec<String>,
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub is_popular: bool,
    #[serde(default)]
    pub is_free: bool,
}

impl Lab {
    /// Session length in minutes: the first number in `duration`, or 60.
    #[must_use]
    pub fn duration_minutes(&self) -> u32 {
        let digits: String = self
            .duration
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(char::is_ascii_digit)
            .collect();
        digits.parse().unwrap_or(DEFAULT_LAB_MINUTES)
    }

    fn matches_search(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.title.to_lowercase().contains(&term)
            || self.description.to_lowercase().contains(&term)
            || self
                .technology
                .iter()
                .any(|tech| tech.to_lowercase().contains(&term))
    }
}

/// Filter for [`Catalog::search_labs`]. The default matches every lab.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabFilter {
    /// Case-insensitive term matched against title, description and
    /// technologies.
    pub search: Option<String>,
    /// Category id.
    pub category: Option<String>,
    pub difficulty: Option<ExperienceLevel>,
    pub free_only: bool,
}

impl LabFilter {
    fn matches(&self, lab: &Lab) -> bool {
        let search = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty());

        search.is_none_or(|term| lab.matches_search(term))
            && self.category.as_deref().is_none_or(|c| lab.category == c)
            && self.difficulty.is_none_or(|d| lab.difficulty == d)
            && (!self.free_only || lab.is_free)
    }
}

/// The course and lab catalog.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Catalog {
    services: Vec<Service>,
    lab_categories: Vec<LabCategory>,
    labs: Vec<Lab>,
}

impl Catalog {
    /// Load the catalog compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the embedded document fails to parse or
    /// validate.
    pub fn embedded() -> Result<Self, CatalogError> {
        Self::from_json(EMBEDDED_CATALOG)
    }

    /// Parse and validate a catalog document.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Parse` for malformed JSON,
    /// `CatalogError::DuplicateId` for repeated ids and
    /// `CatalogError::UnknownCategory` for labs in a missing category.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let catalog: Self = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        let mut services = HashSet::new();
        for service in &self.services {
            if !services.insert(service.id.as_str()) {
                return Err(CatalogError::DuplicateId(service.id.clone()));
            }
            let mut courses = HashSet::new();
            for course in &service.courses {
                if !courses.insert(course.id.as_str()) {
                    return Err(CatalogError::DuplicateId(format!(
                        "{}/{}",
                        service.id, course.id
                    )));
                }
            }
        }

        let mut categories = HashSet::new();
        for category in &self.lab_categories {
            if !categories.insert(category.id.as_str()) {
                return Err(CatalogError::DuplicateId(category.id.clone()));
            }
        }

        let mut labs = HashSet::new();
        for lab in &self.labs {
            if !labs.insert(lab.id.as_str()) {
                return Err(CatalogError::DuplicateId(lab.id.clone()));
            }
            if !categories.contains(lab.category.as_str()) {
                return Err(CatalogError::UnknownCategory {
                    lab: lab.id.clone(),
                    category: lab.category.clone(),
                });
            }
        }

        Ok(())
    }

    #[must_use]
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// # Errors
    ///
    /// Returns `CatalogError::ServiceNotFound` for an unknown id.
    pub fn service(&self, id: &str) -> Result<&Service, CatalogError> {
        self.services
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| CatalogError::ServiceNotFound(id.to_owned()))
    }

    /// Look up a course within a service.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ServiceNotFound` or
    /// `CatalogError::CourseNotFound`.
    pub fn course(&self, service_id: &str, course_id: &str) -> Result<&Course, CatalogError> {
        self.service(service_id)?
            .courses
            .iter()
            .find(|c| c.id == course_id)
            .ok_or_else(|| CatalogError::CourseNotFound {
                service: service_id.to_owned(),
                course: course_id.to_owned(),
            })
    }

    #[must_use]
    pub fn lab_categories(&self) -> &[LabCategory] {
        &self.lab_categories
    }

    #[must_use]
    pub fn labs(&self) -> &[Lab] {
        &self.labs
    }

    /// # Errors
    ///
    /// Returns `CatalogError::LabNotFound` for an unknown id.
    pub fn lab(&self, id: &str) -> Result<&Lab, CatalogError> {
        self.labs
            .iter()
            .find(|l| l.id == id)
            .ok_or_else(|| CatalogError::LabNotFound(id.to_owned()))
    }

    pub fn popular_labs(&self) -> impl Iterator<Item = &Lab> {
        self.labs.iter().filter(|l| l.is_popular)
    }

    /// Labs matching `filter`, in catalog order.
    #[must_use]
    pub fn search_labs(&self, filter: &LabFilter) -> Vec<&Lab> {
        self.labs.iter().filter(|lab| filter.matches(lab)).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::embedded().unwrap()
    }

    fn ids<'a>(labs: &[&'a Lab]) -> Vec<&'a str> {
        labs.iter().map(|l| l.id.as_str()).collect()
    }

    #[test]
    fn test_embedded_catalog_loads() {
        let catalog = catalog();
        assert_eq!(catalog.services().len(), 6);
        assert_eq!(catalog.lab_categories().len(), 8);
        assert_eq!(catalog.labs().len(), 12);
    }

    #[test]
    fn test_course_lookup_is_scoped_to_service() {
        let catalog = catalog();
        let course = catalog
            .course("ai-machine-learning", "ml-fundamentals")
            .unwrap();
        assert_eq!(course.price.to_string(), "$299");
        assert_eq!(course.level, ExperienceLevel::Beginner);

        let err = catalog
            .course("cybersecurity", "ml-fundamentals")
            .unwrap_err();
        assert!(matches!(err, CatalogError::CourseNotFound { .. }));
        assert!(matches!(
            catalog.service("underwater-basketry"),
            Err(CatalogError::ServiceNotFound(_))
        ));
    }

    #[test]
    fn test_search_is_case_insensitive_across_fields() {
        let catalog = catalog();

        let by_tech = catalog.search_labs(&LabFilter {
            search: Some("KUBECTL".to_owned()),
            ..LabFilter::default()
        });
        assert_eq!(ids(&by_tech), ["kubernetes-deployment"]);

        let by_title = catalog.search_labs(&LabFilter {
            search: Some("docker".to_owned()),
            ..LabFilter::default()
        });
        assert!(ids(&by_title).contains(&"docker-containerization"));
        assert!(ids(&by_title).contains(&"kubernetes-deployment"));
    }

    #[test]
    fn test_filters_combine() {
        let catalog = catalog();
        let devops = catalog.search_labs(&LabFilter {
            category: Some("devops".to_owned()),
            ..LabFilter::default()
        });
        assert_eq!(devops.len(), 3);

        let advanced_devops = catalog.search_labs(&LabFilter {
            category: Some("devops".to_owned()),
            difficulty: Some(ExperienceLevel::Advanced),
            ..LabFilter::default()
        });
        assert_eq!(ids(&advanced_devops), ["kubernetes-deployment"]);

        let free = catalog.search_labs(&LabFilter {
            free_only: true,
            ..LabFilter::default()
        });
        assert_eq!(free.len(), 4);
    }

    #[test]
    fn test_blank_search_matches_everything() {
        let catalog = catalog();
        let all = catalog.search_labs(&LabFilter {
            search: Some("   ".to_owned()),
            ..LabFilter::default()
        });
        assert_eq!(all.len(), catalog.labs().len());
    }

    #[test]
    fn test_lab_duration_minutes() {
        let catalog = catalog();
        assert_eq!(catalog.lab("aws-ec2-setup").unwrap().duration_minutes(), 45);

        let mut lab = catalog.lab("aws-ec2-setup").unwrap().clone();
        lab.duration = "self-paced".to_owned();
        assert_eq!(lab.duration_minutes(), 60);
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let json = r#"{
            "services": [],
            "lab_categories": [],
            "labs": [{
                "id": "x", "title": "X", "description": "", "category": "nowhere",
                "difficulty": "Beginner", "duration": "10 minutes", "technology": [],
                "provider": "", "rating": 4.0, "students": 0, "image": "",
                "features": [], "objectives": [], "prerequisites": []
            }]
        }"#;
        assert!(matches!(
            Catalog::from_json(json),
            Err(CatalogError::UnknownCategory { .. })
        ));
    }
}
