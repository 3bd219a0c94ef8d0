//! Record extractors for fetched pages
//!
//! Extraction is best-effort: anything unexpected in the markup yields fewer
//! records (possibly none), never an error.

use crate::output::{OrganizationDetail, OrganizationSummary};
use crate::state::WorkTarget;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Site sections that look like single-segment paths but are not organizations
const RESERVED_PATHS: &[&str] = &[
    "/models",
    "/datasets",
    "/spaces",
    "/docs",
    "/pricing",
    "/terms-of-service",
    "/privacy",
    "/users",
    "/login",
    "/join",
    "/settings",
    "/new",
    "/organizations",
];

const CODE_HOSTS: &[&str] = &["github.com", "gitlab.com"];

const SOCIAL_HOSTS: &[&str] = &[
    "twitter.com",
    "x.com",
    "linkedin.com",
    "facebook.com",
    "instagram.com",
    "youtube.com",
];

const DESCRIPTION_SELECTORS: &[&str] = &[".organization-description", ".prose p", "article p"];

const LOCATION_SELECTORS: &[&str] = &[
    ".location",
    ".organization-location",
    "[data-testid=\"location\"]",
];

/// Count labels longer than this are prose, not a stat badge
const MAX_COUNT_TEXT_LEN: usize = 40;

/// Turns the content of one fetched page into zero or more rows
pub trait RecordExtractor<T>: Send + Sync {
    /// Extracts rows from a successfully fetched page
    fn extract(&self, target: &WorkTarget, content: &str) -> Vec<T>;

    /// Row recorded in place of real data when the page could not be fetched
    fn failure_record(&self, _target: &WorkTarget, _status: &str) -> Option<T> {
        None
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Visible text of an element with whitespace collapsed
fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .map_or(false, |prefix| prefix.ends_with('.'))
}

/// Extracts organization cards from a catalog listing page
#[derive(Debug, Clone)]
pub struct OrganizationListExtractor {
    base: Url,
    model_count: Regex,
    follower_count: Regex,
    type_labels: Regex,
    picture_alt: Regex,
}

impl OrganizationListExtractor {
    /// Creates an extractor resolving organization paths against `base`
    pub fn new(base: &Url) -> Result<Self, regex::Error> {
        Ok(Self {
            base: base.clone(),
            model_count: Regex::new(r"(?i)\d+\.?\d*k?\s*models?")?,
            follower_count: Regex::new(r"(?i)\d+\.?\d*k?\s*followers?")?,
            type_labels: Regex::new(
                r"(?i)(?:\s*(?:Team|Enterprise|Company|Non-Profit|Community|University|\+))+\s*$",
            )?,
            picture_alt: Regex::new(r"(?i)'s profile picture.*$")?,
        })
    }

    fn is_organization_path(href: &str) -> bool {
        href.len() > 1
            && href.starts_with('/')
            && href.matches('/').count() == 1
            && !href.starts_with("/#")
            && !RESERVED_PATHS.contains(&href)
    }

    /// Strips counts, type labels and image alt text from card text
    fn clean_name(&self, card_text: &str) -> String {
        let name = card_text.split('•').next().unwrap_or_default().trim();
        let name = self.model_count.replace_all(name, "");
        let name = self.follower_count.replace_all(name.trim(), "");
        let name = self.type_labels.replace(name.trim(), "");
        let name = self.picture_alt.replace(name.trim(), "");

        name.trim_end_matches(|c: char| c == '+' || c.is_whitespace())
            .trim()
            .to_string()
    }
}

impl RecordExtractor<OrganizationSummary> for OrganizationListExtractor {
    fn extract(&self, _target: &WorkTarget, content: &str) -> Vec<OrganizationSummary> {
        let Some(anchors) = selector("a[href]") else {
            return Vec::new();
        };
        let document = Html::parse_document(content);

        let mut seen = HashSet::new();
        let mut organizations = Vec::new();

        for element in document.select(&anchors) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            if !Self::is_organization_path(href) {
                continue;
            }

            let text = element_text(&element);
            if !text.to_lowercase().contains("follower") {
                continue;
            }

            let name = self.clean_name(&text);
            if name.is_empty() {
                continue;
            }
            let Ok(url) = self.base.join(href) else {
                continue;
            };

            let org = OrganizationSummary::new(name, url.to_string());
            if seen.insert(org.clone()) {
                organizations.push(org);
            }
        }

        organizations
    }
}

/// Extracts links and profile facts from one organization page
#[derive(Debug, Clone)]
pub struct OrganizationDetailExtractor {
    site_host: Option<String>,
    count: Regex,
}

impl OrganizationDetailExtractor {
    /// Creates an extractor; links back to `site` are not external websites
    pub fn new(site: &Url) -> Result<Self, regex::Error> {
        Ok(Self {
            site_host: site.host_str().map(str::to_lowercase),
            count: Regex::new(r"(?i)(\d[\d.,]*\s*[km]?)\s*(member|model|dataset)s?\b")?,
        })
    }

    fn collect_links(&self, document: &Html, page_url: Option<&Url>) -> LinkGroups {
        let mut groups = LinkGroups::default();
        let Some(anchors) = selector("a[href]") else {
            return groups;
        };

        for element in document.select(&anchors) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let resolved = match page_url {
                Some(base) => base.join(href),
                None => Url::parse(href),
            };
            let Ok(url) = resolved else {
                continue;
            };
            if !matches!(url.scheme(), "http" | "https") {
                continue;
            }
            let Some(host) = url.host_str().map(str::to_lowercase) else {
                continue;
            };

            let bucket = if CODE_HOSTS.iter().any(|d| host_matches(&host, d)) {
                &mut groups.code
            } else if SOCIAL_HOSTS.iter().any(|d| host_matches(&host, d)) {
                &mut groups.social
            } else if self
                .site_host
                .as_deref()
                .map_or(false, |site| host_matches(&host, site))
            {
                continue;
            } else {
                &mut groups.websites
            };

            let link = url.to_string();
            if !bucket.contains(&link) {
                bucket.push(link);
            }
        }

        groups
    }

    fn description(document: &Html) -> Option<String> {
        let meta = selector("meta[name=\"description\"]").and_then(|s| {
            document
                .select(&s)
                .filter_map(|e| e.value().attr("content"))
                .map(str::trim)
                .find(|c| !c.is_empty())
                .map(str::to_string)
        });

        meta.or_else(|| first_text(document, DESCRIPTION_SELECTORS))
    }

    fn counts(&self, document: &Html) -> Counts {
        let mut counts = Counts::default();
        let Some(candidates) = selector("span, div, p") else {
            return counts;
        };

        for element in document.select(&candidates) {
            let text = element_text(&element);
            if text.is_empty() || text.len() > MAX_COUNT_TEXT_LEN {
                continue;
            }

            for caps in self.count.captures_iter(&text) {
                let number = caps[1].trim().to_string();
                let slot = match caps[2].to_lowercase().as_str() {
                    "member" => &mut counts.members,
                    "model" => &mut counts.models,
                    _ => &mut counts.datasets,
                };
                slot.get_or_insert(number);
            }
        }

        counts
    }
}

#[derive(Debug, Default)]
struct LinkGroups {
    code: Vec<String>,
    websites: Vec<String>,
    social: Vec<String>,
}

#[derive(Debug, Default)]
struct Counts {
    members: Option<String>,
    models: Option<String>,
    datasets: Option<String>,
}

/// Text of the first non-empty element matched by any selector, in order
fn first_text(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors
        .iter()
        .filter_map(|css| selector(css))
        .find_map(|s| {
            document
                .select(&s)
                .map(|e| element_text(&e))
                .find(|t| !t.is_empty())
        })
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl RecordExtractor<OrganizationDetail> for OrganizationDetailExtractor {
    fn extract(&self, target: &WorkTarget, content: &str) -> Vec<OrganizationDetail> {
        let document = Html::parse_document(content);
        let page_url = Url::parse(&target.url).ok();

        let links = self.collect_links(&document, page_url.as_ref());
        let counts = self.counts(&document);

        vec![OrganizationDetail {
            organization_name: target.label.clone().unwrap_or_default(),
            organization_url: target.url.clone(),
            github_links: links.code,
            website_links: links.websites,
            social_media_links: links.social,
            location: first_text(&document, LOCATION_SELECTORS),
            description: Self::description(&document),
            member_count: counts.members,
            model_count: counts.models,
            dataset_count: counts.datasets,
            scrape_status: OrganizationDetail::STATUS_SUCCESS.to_string(),
            scrape_timestamp: timestamp(),
        }]
    }

    fn failure_record(&self, target: &WorkTarget, status: &str) -> Option<OrganizationDetail> {
        Some(OrganizationDetail {
            organization_name: target.label.clone().unwrap_or_default(),
            organization_url: target.url.clone(),
            scrape_status: status.to_string(),
            scrape_timestamp: timestamp(),
            ..Default::default()
        })
    }
}
