//! Concrete row types produced by the two crawl jobs

use crate::output::traits::TabularRow;

const LIST_SEPARATOR: &str = ", ";

/// One organization found on a catalog listing page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrganizationSummary {
    pub organization_name: String,
    pub organization_url: String,
}

impl OrganizationSummary {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            organization_name: name.into(),
            organization_url: url.into(),
        }
    }
}

impl TabularRow for OrganizationSummary {
    const UNIT_COLUMN: &'static str = "page_number";
    const COLUMNS: &'static [&'static str] = &["organization_name", "organization_url"];

    fn to_fields(&self) -> Vec<Option<String>> {
        vec![
            Some(self.organization_name.clone()),
            Some(self.organization_url.clone()),
        ]
    }

    fn from_fields(fields: &[Option<String>]) -> Option<Self> {
        match fields {
            [name, Some(url)] => Some(Self {
                organization_name: name.clone().unwrap_or_default(),
                organization_url: url.clone(),
            }),
            _ => None,
        }
    }
}

/// Details scraped from one organization's own page
///
/// Link lists are empty and scalar fields `None` when the page did not show
/// them, or when the page could not be fetched at all (see `scrape_status`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrganizationDetail {
    pub organization_name: String,
    pub organization_url: String,
    pub github_links: Vec<String>,
    pub website_links: Vec<String>,
    pub social_media_links: Vec<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub member_count: Option<String>,
    pub model_count: Option<String>,
    pub dataset_count: Option<String>,
    pub scrape_status: String,
    pub scrape_timestamp: String,
}

impl OrganizationDetail {
    pub const STATUS_SUCCESS: &'static str = "success";
    pub const STATUS_FAILED_AFTER_RETRIES: &'static str = "failed_after_retries";
}

fn join_list(items: &[String]) -> Option<String> {
    (!items.is_empty()).then(|| items.join(LIST_SEPARATOR))
}

fn split_list(field: &Option<String>) -> Vec<String> {
    field
        .as_deref()
        .map(|value| {
            value
                .split(LIST_SEPARATOR)
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl TabularRow for OrganizationDetail {
    const UNIT_COLUMN: &'static str = "row_index";
    const COLUMNS: &'static [&'static str] = &[
        "organization_name",
        "organization_url",
        "github_links",
        "website_links",
        "social_media_links",
        "location",
        "description",
        "member_count",
        "model_count",
        "dataset_count",
        "scrape_status",
        "scrape_timestamp",
    ];

    fn to_fields(&self) -> Vec<Option<String>> {
        vec![
            Some(self.organization_name.clone()),
            Some(self.organization_url.clone()),
            join_list(&self.github_links),
            join_list(&self.website_links),
            join_list(&self.social_media_links),
            self.location.clone(),
            self.description.clone(),
            self.member_count.clone(),
            self.model_count.clone(),
            self.dataset_count.clone(),
            Some(self.scrape_status.clone()),
            Some(self.scrape_timestamp.clone()),
        ]
    }

    fn from_fields(fields: &[Option<String>]) -> Option<Self> {
        if fields.len() != Self::COLUMNS.len() {
            return None;
        }

        Some(Self {
            organization_name: fields[0].clone().unwrap_or_default(),
            organization_url: fields[1].clone()?,
            github_links: split_list(&fields[2]),
            website_links: split_list(&fields[3]),
            social_media_links: split_list(&fields[4]),
            location: fields[5].clone(),
            description: fields[6].clone(),
            member_count: fields[7].clone(),
            model_count: fields[8].clone(),
            dataset_count: fields[9].clone(),
            scrape_status: fields[10].clone().unwrap_or_default(),
            scrape_timestamp: fields[11].clone().unwrap_or_default(),
        })
    }

    fn status(&self) -> Option<&str> {
        Some(&self.scrape_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_fields() {
        let org = OrganizationSummary::new("Acme", "https://x/acme");
        let fields = org.to_fields();
        assert_eq!(fields.len(), OrganizationSummary::COLUMNS.len());
        assert_eq!(OrganizationSummary::from_fields(&fields), Some(org));
    }

    #[test]
    fn test_summary_requires_url() {
        assert_eq!(
            OrganizationSummary::from_fields(&[Some("Acme".to_string()), None]),
            None
        );
    }

    #[test]
    fn test_detail_nulls_for_missing_fields() {
        let detail = OrganizationDetail {
            organization_name: "Acme".to_string(),
            organization_url: "https://x/acme".to_string(),
            github_links: vec![
                "https://github.com/acme".to_string(),
                "https://gitlab.com/acme".to_string(),
            ],
            scrape_status: OrganizationDetail::STATUS_SUCCESS.to_string(),
            scrape_timestamp: "2026-01-01T00:00:00+00:00".to_string(),
            ..Default::default()
        };

        let fields = detail.to_fields();
        assert_eq!(
            fields[2].as_deref(),
            Some("https://github.com/acme, https://gitlab.com/acme")
        );
        assert_eq!(fields[3], None);
        assert_eq!(fields[5], None);

        let restored = OrganizationDetail::from_fields(&fields).unwrap();
        assert_eq!(restored, detail);
        assert_eq!(restored.status(), Some("success"));
    }
}
