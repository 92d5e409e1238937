//! Job posting parser for careers pages.

use scraper::Html;
use serde::{Deserialize, Serialize};

use crate::html::{class_string, element_text, resolve_url, sel};
use crate::products::extract_name;

pub const JOBS_PARSER_VERSION: &str = "1.0.1";

const CLASS_KEYWORDS: &[&str] = &["job", "position", "career", "vacancy", "opening"];
const NAME_ATTRS: &[&str] = &["data-job", "data-position", "data-title"];

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct JobPosting {
    pub name: String,
    pub location: String,
    pub description: String,
    pub url: Option<String>,
}

impl JobPosting {
    /// Identity used by the set diff: postings are the same listing
    /// when title and location match.
    pub fn key(&self) -> (String, String) {
        (self.name.to_lowercase(), self.location.to_lowercase())
    }
}

pub fn parse_jobs(html: &str, base_url: &str) -> Vec<JobPosting> {
    let doc = Html::parse_document(html);
    let containers = sel("div, section, article, li");
    let desc_sel = sel("p, div, span");
    let location_sel = sel("span, div");
    let link_sel = sel("a[href]");

    let mut postings = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for el in doc.select(&containers) {
        let classes = class_string(el);
        let class_hit = CLASS_KEYWORDS.iter().any(|k| classes.contains(k));
        let attr_hit = NAME_ATTRS.iter().any(|a| el.value().attr(a).is_some());
        if !class_hit && !attr_hit {
            continue;
        }

        let Some(name) = extract_name(el, NAME_ATTRS) else { continue };

        let location = el
            .select(&location_sel)
            .find(|d| {
                let c = class_string(*d);
                c.contains("location") || c.contains("city") || c.contains("place")
            })
            .map(element_text)
            .unwrap_or_default();

        let posting = JobPosting {
            description: el
                .select(&desc_sel)
                .find(|d| {
                    let c = class_string(*d);
                    c.contains("desc") || c.contains("text") || c.contains("summary")
                })
                .map(|d| element_text(d).chars().take(200).collect())
                .unwrap_or_default(),
            url: el
                .select(&link_sel)
                .find_map(|a| a.value().attr("href"))
                .and_then(|href| resolve_url(base_url, href)),
            name,
            location,
        };

        if seen.insert(posting.key()) {
            postings.push(posting);
        }
    }
    postings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_jobs_keyed_by_title_and_location() {
        let html = r#"
            <li class="job-listing">
              <h4>Senior Rust Engineer</h4>
              <span class="location">Berlin</span>
              <a href="/careers/rust-berlin">Apply</a>
            </li>
            <li class="job-listing">
              <h4>Senior Rust Engineer</h4>
              <span class="location">Remote</span>
            </li>
            <li class="job-listing">
              <h4>Senior Rust Engineer</h4>
              <span class="location">Berlin</span>
            </li>
        "#;
        let jobs = parse_jobs(html, "https://ex.com");
        assert_eq!(jobs.len(), 2, "same title in same location collapses");
        assert_eq!(jobs[0].key(), ("senior rust engineer".into(), "berlin".into()));
        assert_eq!(jobs[0].url.as_deref(), Some("https://ex.com/careers/rust-berlin"));
    }

    #[test]
    fn missing_location_is_empty_not_skipped() {
        let html = r#"<div class="position"><h3>Designer</h3></div>"#;
        let jobs = parse_jobs(html, "https://ex.com");
        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].location.is_empty());
    }
}
