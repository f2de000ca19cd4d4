//! Lead fixtures shared by the integration tests

use leadgen_scraper::models::lead::Lead;

/// Businesses a stub extractor can "find".
pub const BUSINESSES: &[(&str, &str, &str)] = &[
    ("Bright Smiles Dental", "(555) 0100", "742 Evergreen Terrace"),
    ("Springfield Family Dentistry", "(555) 0101", "19 Plympton St"),
    ("Shelbyville Orthodontics", "(555) 0102", "1 Shelbyville Rd"),
    ("Capital City Dental Care", "(555) 0103", "300 Main St"),
    ("Evergreen Oral Surgery", "(555) 0104", "88 Oak Ave"),
    ("Ogdenville Smile Studio", "(555) 0105", "5 Harbor Way"),
    ("North Haverbrook Dental", "(555) 0106", "12 Monorail Blvd"),
];

/// The first `n` fixture businesses as leads.
pub fn sample_leads(n: usize, category: &str) -> Vec<Lead> {
    BUSINESSES
        .iter()
        .cycle()
        .take(n)
        .enumerate()
        .map(|(i, (name, phone, address))| {
            let mut lead = Lead::new(*name, category);
            lead.phone = Some(phone.to_string());
            lead.address = Some(address.to_string());
            lead.rating = Some(4.0 + (i % 10) as f32 / 10.0);
            lead.reviews = Some(10 * (i as u32 + 1));
            lead.maps_url = Some(format!("https://www.google.com/maps/place/{i}"));
            lead
        })
        .collect()
}

/// A listing whose name could not be read.
pub fn malformed_lead(category: &str) -> Lead {
    let mut lead = Lead::new("", category);
    lead.phone = Some("(555) 0199".to_string());
    lead
}
