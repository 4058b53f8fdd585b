//! Catalog browsing commands.

use skilltrack_labs::catalog::{Catalog, CatalogError, Lab, LabFilter};

pub fn services(catalog: &Catalog) {
    for service in catalog.services() {
        println!(
            "{:<24} {} ({} courses)",
            service.id,
            service.title,
            service.courses.len()
        );
    }
}

pub fn courses(catalog: &Catalog, service_id: &str) -> Result<(), CatalogError> {
    let service = catalog.service(service_id)?;
    println!("{}", service.title);
    for course in &service.courses {
        println!(
            "  {:<28} {:<12} {:>7}  {}",
            course.id,
            course.level.to_string(),
            course.price.to_string(),
            course.title
        );
    }
    Ok(())
}

pub fn course(catalog: &Catalog, service_id: &str, course_id: &str) -> Result<(), CatalogError> {
    let course = catalog.course(service_id, course_id)?;
    println!("{} ({})", course.title, course.price);
    println!("{}", course.description);
    println!("  Level:       {}", course.level);
    println!("  Duration:    {}", course.duration);
    println!("  Instructor:  {}", course.instructor);
    println!(
        "  Rating:      {:.1} from {} students",
        course.rating, course.students
    );
    for feature in &course.features {
        println!("  - {feature}");
    }
    Ok(())
}

pub fn categories(catalog: &Catalog) {
    for category in catalog.lab_categories() {
        println!(
            "{:<16} {:<28} {} labs",
            category.id, category.name, category.count
        );
    }
}

pub fn labs(catalog: &Catalog, filter: &LabFilter, popular_only: bool) {
    let labs: Vec<&Lab> = catalog
        .search_labs(filter)
        .into_iter()
        .filter(|lab| !popular_only || lab.is_popular)
        .collect();

    if labs.is_empty() {
        println!("No labs match.");
        return;
    }
    for lab in labs {
        let badge = match (lab.is_free, lab.is_popular) {
            (true, true) => "free, popular",
            (true, false) => "free",
            (false, true) => "popular",
            (false, false) => "",
        };
        println!(
            "{:<28} {:<12} {:<12} {:<14} {}",
            lab.id,
            lab.difficulty.to_string(),
            lab.duration,
            badge,
            lab.title
        );
    }
}

pub fn lab(catalog: &Catalog, id: &str) -> Result<(), CatalogError> {
    let lab = catalog.lab(id)?;
    println!("{}", lab.title);
    println!("{}", lab.description);
    println!("  Category:    {}", lab.category);
    println!("  Difficulty:  {}", lab.difficulty);
    println!(
        "  Duration:    {} ({} minute session)",
        lab.duration,
        lab.duration_minutes()
    );
    println!("  Provider:    {}", lab.provider);
    println!("  Stack:       {}", lab.technology.join(", "));
    if !lab.prerequisites.is_empty() {
        println!("  Requires:    {}", lab.prerequisites.join(", "));
    }
    for objective in &lab.objectives {
        println!("  - {objective}");
    }
    Ok(())
}
