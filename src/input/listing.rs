//! Scraped internship listings

use serde::{Deserialize, Serialize};

/// One scraped posting. All five fields are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    #[serde(rename = "URL")]
    pub url: String,
    pub name: String,
    pub company: String,
    pub location: String,
    pub content: String,
}

impl Listing {
    /// Trim surrounding whitespace left over by the scraper.
    pub fn trimmed(self) -> Self {
        Self {
            url: self.url.trim().to_string(),
            name: self.name.trim().to_string(),
            company: self.company.trim().to_string(),
            location: self.location.trim().to_string(),
            content: self.content.trim().to_string(),
        }
    }
}

/// First listing whose name equals `name` exactly.
pub fn find_by_name<'a>(listings: &'a [Listing], name: &str) -> Option<&'a Listing> {
    listings.iter().find(|l| l.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_uses_uppercase_url_key() {
        let raw = r#"{"URL": "https://x/1", "name": " Data Analyst ", "company": "Acme",
                      "location": "Lyon", "content": "SQL"}"#;
        let listing: Listing = serde_json::from_str(raw).unwrap();
        let listing = listing.trimmed();
        assert_eq!(listing.url, "https://x/1");
        assert_eq!(listing.name, "Data Analyst");

        let back = serde_json::to_value(&listing).unwrap();
        assert!(back.get("URL").is_some());
        assert!(back.get("url").is_none());
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let raw = r#"{"URL": "https://x/1", "name": "A", "company": "Acme", "location": "Lyon"}"#;
        assert!(serde_json::from_str::<Listing>(raw).is_err());
    }

    #[test]
    fn test_find_by_name_is_exact() {
        let make = |name: &str| Listing {
            url: format!("https://x/{name}"),
            name: name.to_string(),
            company: "Acme".to_string(),
            location: "Lyon".to_string(),
            content: String::new(),
        };
        let listings = vec![make("Data"), make("Data Analyst"), make("Data")];
        assert_eq!(find_by_name(&listings, "Data").unwrap().url, "https://x/Data");
        assert!(find_by_name(&listings, "data").is_none());
        assert!(find_by_name(&listings, "Data Analyst ").is_none());
    }
}
