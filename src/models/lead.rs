use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Pipeline stage of a lead. Freshly scraped leads always start as `New`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Qualified,
}

/// A business listing extracted from a map search.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct Lead {
    #[garde(length(min = 1, max = 300))]
    pub business_name: String,

    #[garde(length(min = 1, max = 50))]
    pub phone: Option<String>,

    #[garde(length(min = 1, max = 500))]
    pub address: Option<String>,

    #[garde(range(min = 0.0, max = 5.0))]
    pub rating: Option<f32>,

    #[garde(skip)]
    pub reviews: Option<u32>,

    #[garde(skip)]
    pub category: String,

    #[garde(skip)]
    pub maps_url: Option<String>,

    #[garde(skip)]
    #[serde(default)]
    pub status: LeadStatus,
}

impl Lead {
    pub fn new(business_name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            business_name: business_name.into(),
            phone: None,
            address: None,
            rating: None,
            reviews: None,
            category: category.into(),
            maps_url: None,
            status: LeadStatus::New,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_lead_is_valid() {
        assert!(Lead::new("Bright Smiles Dental", "dentist").validate().is_ok());
    }

    #[test]
    fn test_empty_name_is_invalid() {
        assert!(Lead::new("", "dentist").validate().is_err());
    }

    #[test]
    fn test_rating_out_of_range_is_invalid() {
        let mut lead = Lead::new("Bright Smiles Dental", "dentist");
        lead.rating = Some(7.5);
        assert!(lead.validate().is_err());
    }

    #[test]
    fn test_missing_status_defaults_to_new() {
        let lead: Lead = serde_json::from_value(serde_json::json!({
            "business_name": "Bright Smiles Dental",
            "phone": null,
            "address": null,
            "rating": 4.8,
            "reviews": 120,
            "category": "dentist",
            "maps_url": null
        }))
        .unwrap();
        assert_eq!(lead.status, LeadStatus::New);
        assert_eq!(lead.reviews, Some(120));
    }
}
