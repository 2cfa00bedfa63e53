// src/services/coverage.rs
// DOCUMENTATION: Description coverage of the directory
// PURPOSE: Decide which farms still need a written description

use serde::Serialize;

/// Website hosts that are profiles rather than a farm's own site
const SOCIAL_HOSTS: [&str; 3] = ["facebook", "instagram", "twitter"];

/// A farm needs a description when it has none and links to its own
/// website that a writer could work from
pub fn needs_description(website: Option<&str>, description: Option<&str>) -> bool {
    let has_description = description.map(|d| !d.trim().is_empty()).unwrap_or(false);
    if has_description {
        return false;
    }

    match website.map(str::trim).filter(|w| !w.is_empty()) {
        Some(site) => {
            let lower = site.to_ascii_lowercase();
            !SOCIAL_HOSTS.iter().any(|s| lower.contains(s))
        }
        None => false,
    }
}

/// Coverage summary reported on the admin dashboard
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DescriptionCoverage {
    pub total_farms: i64,
    pub with_description: i64,
    pub needs_description: i64,
    pub coverage_percent: f64,
}

impl DescriptionCoverage {
    pub fn new(total_farms: i64, with_description: i64, needs_description: i64) -> Self {
        let coverage_percent = if total_farms > 0 {
            ((with_description as f64 / total_farms as f64) * 1000.0).round() / 10.0
        } else {
            0.0
        };

        Self {
            total_farms,
            with_description,
            needs_description,
            coverage_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_description() {
        assert!(needs_description(Some("https://hollowfarm.co.uk"), None));
        assert!(needs_description(Some("https://hollowfarm.co.uk"), Some("   ")));
        assert!(!needs_description(Some("https://hollowfarm.co.uk"), Some("Eggs and honey")));
        assert!(!needs_description(Some("https://www.Facebook.com/hollowfarm"), None));
        assert!(!needs_description(Some("https://instagram.com/hollow"), None));
        assert!(!needs_description(None, None));
        assert!(!needs_description(Some(""), None));
    }

    #[test]
    fn test_coverage_percent_rounds_to_one_decimal() {
        let c = DescriptionCoverage::new(3, 1, 2);
        assert_eq!(c.coverage_percent, 33.3);
        assert_eq!(DescriptionCoverage::new(0, 0, 0).coverage_percent, 0.0);
        assert_eq!(DescriptionCoverage::new(8, 8, 0).coverage_percent, 100.0);
    }
}
