//! Landing-page structure parser: navigation links, key-page presence,
//! page metadata, and a section/heading outline.

use std::collections::BTreeMap;

use scraper::Html;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::html::{element_text, resolve_url, sel};

pub const STRUCTURE_PARSER_VERSION: &str = "1.1.0";

/// Key pages probed on a landing page, with the path patterns and link
/// texts that identify each.
const KEY_PAGE_PATTERNS: &[(&str, &[&str])] = &[
    ("pricing", &["/pricing", "/plans", "/price", "/prices", "/cost"]),
    ("features", &["/features", "/feature", "/solutions", "/capabilities"]),
    ("about", &["/about", "/about-us", "/company", "/team"]),
    ("blog", &["/blog", "/blogs", "/news", "/articles", "/posts", "/stories"]),
    ("news", &["/news", "/newsroom", "/press", "/press-releases", "/media"]),
    ("careers", &["/careers", "/jobs", "/hiring", "/work-with-us", "/join-us"]),
];

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Output model
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct NavLink {
    pub url: String,
    pub text: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct KeyPage {
    pub kind: String,
    pub url: Option<String>,
    pub found: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub og_tags: BTreeMap<String, String>,
    pub twitter_tags: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SectionOutline {
    pub tag: String,
    pub id: String,
    pub class: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Heading {
    pub level: String,
    pub text: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StructureSnapshot {
    pub nav_links: Vec<NavLink>,
    pub key_pages: Vec<KeyPage>,
    pub metadata: PageMetadata,
    pub sections: Vec<SectionOutline>,
    pub headings: Vec<Heading>,
    pub parser_version: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Parser
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn parse_structure(html: &str, base_url: &str) -> StructureSnapshot {
    let doc = Html::parse_document(html);
    StructureSnapshot {
        nav_links: extract_navigation(&doc, base_url),
        key_pages: extract_key_pages(&doc, base_url),
        metadata: extract_metadata(&doc),
        sections: extract_sections(&doc),
        headings: extract_headings(&doc),
        parser_version: STRUCTURE_PARSER_VERSION.to_string(),
    }
}

/// Internal links from the first nav/header/menu containers, deduped
/// on (url, text) and sorted for a stable identity.
fn extract_navigation(doc: &Html, base_url: &str) -> Vec<NavLink> {
    let nav_sel = sel("nav, header, menu");
    let link_sel = sel("a[href]");
    let base_host = Url::parse(base_url).ok().and_then(|u| u.host_str().map(str::to_string));

    let mut links = Vec::new();
    for nav in doc.select(&nav_sel).take(5) {
        for link in nav.select(&link_sel) {
            let Some(href) = link.value().attr("href") else { continue };
            let text = element_text(link);
            if text.is_empty() {
                continue;
            }
            let Some(full) = resolve_url(base_url, href) else { continue };
            let host = Url::parse(&full).ok().and_then(|u| u.host_str().map(str::to_string));
            if host == base_host {
                links.push(NavLink { url: full, text });
            }
        }
    }
    links.sort();
    links.dedup();
    links
}

fn extract_key_pages(doc: &Html, base_url: &str) -> Vec<KeyPage> {
    let link_sel = sel("a[href]");
    let links: Vec<(String, String, String)> = doc
        .select(&link_sel)
        .filter_map(|link| {
            let href = link.value().attr("href")?;
            let full = resolve_url(base_url, href)?;
            Some((full, href.to_lowercase(), element_text(link).to_lowercase()))
        })
        .collect();

    KEY_PAGE_PATTERNS
        .iter()
        .map(|(kind, patterns)| {
            let mut found_url = None;
            'patterns: for pattern in *patterns {
                for (full, href, text) in &links {
                    let path = Url::parse(full)
                        .map(|u| u.path().to_lowercase())
                        .unwrap_or_default();
                    let bare = pattern.trim_start_matches('/');
                    if path.contains(pattern) || href.contains(pattern) || text.contains(bare) {
                        found_url = Some(full.clone());
                        break 'patterns;
                    }
                }
            }
            KeyPage {
                kind: (*kind).to_string(),
                found: found_url.is_some(),
                url: found_url,
            }
        })
        .collect()
}

fn extract_metadata(doc: &Html) -> PageMetadata {
    let mut meta = PageMetadata::default();

    let title_sel = sel("title");
    meta.title = doc
        .select(&title_sel)
        .map(element_text)
        .find(|t| !t.is_empty());

    let meta_sel = sel("meta");
    for tag in doc.select(&meta_sel) {
        let content = tag.value().attr("content").unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        if let Some(name) = tag.value().attr("name") {
            match name {
                "description" => meta.description = Some(content.to_string()),
                "keywords" => meta.keywords = Some(content.to_string()),
                other => {
                    if let Some(key) = other.strip_prefix("twitter:") {
                        meta.twitter_tags.insert(key.to_string(), content.to_string());
                    }
                }
            }
        }
        if let Some(property) = tag.value().attr("property") {
            if let Some(key) = property.strip_prefix("og:") {
                meta.og_tags.insert(key.to_string(), content.to_string());
            }
        }
    }
    meta
}

fn extract_sections(doc: &Html) -> Vec<SectionOutline> {
    let section_sel = sel("header, main, footer, aside, section");
    doc.select(&section_sel)
        .take(10)
        .map(|section| SectionOutline {
            tag: section.value().name().to_string(),
            id: section.value().attr("id").unwrap_or("").to_string(),
            class: section
                .value()
                .classes()
                .collect::<Vec<_>>()
                .join(" "),
        })
        .collect()
}

fn extract_headings(doc: &Html) -> Vec<Heading> {
    let heading_sel = sel("h1, h2, h3, h4");
    doc.select(&heading_sel)
        .take(20)
        .map(|h| Heading {
            level: h.value().name().to_string(),
            text: element_text(h).chars().take(100).collect(),
        })
        .collect()
}
