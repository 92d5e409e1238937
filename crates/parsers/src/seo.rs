//! SEO signal parsers: page meta tags, JSON-LD type sets, robots.txt
//! sitemap pointers, and sitemap contents.

use std::collections::BTreeMap;

use scraper::Html;
use serde::{Deserialize, Serialize};

use crate::html::{element_text, resolve_url, sel};

pub const SEO_PARSER_VERSION: &str = "1.1.0";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Output model
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SeoSnapshot {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub og_tags: BTreeMap<String, String>,
    pub twitter_tags: BTreeMap<String, String>,
    pub other_meta: BTreeMap<String, String>,
    /// Sorted set of JSON-LD `@type` values found on the page.
    pub json_ld_types: Vec<String>,
    pub canonical_urls: Vec<String>,
    pub hreflang: Vec<HreflangTag>,
    pub parser_version: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct HreflangTag {
    pub hreflang: String,
    pub href: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RobotsInfo {
    pub sitemap_urls: Vec<String>,
    pub disallow_count: usize,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SitemapInfo {
    pub url_count: usize,
    /// First entries only; the full list is unbounded on large sites.
    pub urls: Vec<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTML signals
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn parse_seo(html: &str, base_url: &str) -> SeoSnapshot {
    let doc = Html::parse_document(html);
    let mut snap = SeoSnapshot {
        parser_version: SEO_PARSER_VERSION.to_string(),
        ..SeoSnapshot::default()
    };

    let title_sel = sel("title");
    snap.title = doc.select(&title_sel).map(element_text).find(|t| !t.is_empty());

    let meta_sel = sel("meta");
    for tag in doc.select(&meta_sel) {
        let content = tag.value().attr("content").unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        if let Some(name) = tag.value().attr("name") {
            match name {
                "description" => snap.description = Some(content.to_string()),
                "keywords" => snap.keywords = Some(content.to_string()),
                other => {
                    if let Some(key) = other.strip_prefix("twitter:") {
                        snap.twitter_tags.insert(key.to_string(), content.to_string());
                    } else {
                        snap.other_meta.insert(other.to_string(), content.to_string());
                    }
                }
            }
        }
        if let Some(property) = tag.value().attr("property") {
            if let Some(key) = property.strip_prefix("og:") {
                snap.og_tags.insert(key.to_string(), content.to_string());
            }
        }
    }

    snap.json_ld_types = extract_json_ld_types(&doc);

    let canonical_sel = sel(r#"link[rel="canonical"]"#);
    for link in doc.select(&canonical_sel) {
        if let Some(href) = link.value().attr("href") {
            if let Some(url) = resolve_url(base_url, href) {
                snap.canonical_urls.push(url);
            }
        }
    }

    let alternate_sel = sel(r#"link[rel="alternate"]"#);
    for link in doc.select(&alternate_sel) {
        let Some(lang) = link.value().attr("hreflang") else { continue };
        let Some(href) = link.value().attr("href") else { continue };
        if lang == "x-default" {
            if let Some(url) = resolve_url(base_url, href) {
                snap.canonical_urls.push(url);
            }
            continue;
        }
        if let Some(url) = resolve_url(base_url, href) {
            snap.hreflang.push(HreflangTag { hreflang: lang.to_string(), href: url });
        }
    }
    snap.hreflang.sort();

    snap
}

/// Collect `@type` values from JSON-LD scripts, recursing into arrays
/// and `@graph` containers. Returns a sorted, deduplicated set.
fn extract_json_ld_types(doc: &Html) -> Vec<String> {
    let script_sel = sel(r#"script[type="application/ld+json"]"#);
    let mut types = Vec::new();
    for script in doc.select(&script_sel) {
        let raw = script.text().collect::<String>();
        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) => collect_types(&value, &mut types),
            Err(_) => tracing::debug!("skipping unparsable JSON-LD block"),
        }
    }
    types.sort();
    types.dedup();
    types
}

fn collect_types(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::Array(items) => {
            for item in items {
                collect_types(item, out);
            }
        }
        serde_json::Value::Object(map) => {
            match map.get("@type") {
                Some(serde_json::Value::String(t)) => out.push(t.clone()),
                Some(serde_json::Value::Array(ts)) => {
                    out.extend(ts.iter().filter_map(|t| t.as_str().map(str::to_string)));
                }
                _ => {}
            }
            if let Some(graph) = map.get("@graph") {
                collect_types(graph, out);
            }
        }
        _ => {}
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// robots.txt / sitemap.xml
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn parse_robots(text: &str) -> RobotsInfo {
    let mut info = RobotsInfo::default();
    for line in text.lines() {
        let line = line.trim();
        if let Some(rest) = strip_directive(line, "sitemap") {
            if !rest.is_empty() {
                info.sitemap_urls.push(rest.to_string());
            }
        } else if strip_directive(line, "disallow").is_some_and(|v| !v.is_empty()) {
            info.disallow_count += 1;
        }
    }
    info.sitemap_urls.sort();
    info.sitemap_urls.dedup();
    info
}

fn strip_directive<'a>(line: &'a str, directive: &str) -> Option<&'a str> {
    let (key, value) = line.split_once(':')?;
    if key.trim().eq_ignore_ascii_case(directive) {
        Some(value.trim())
    } else {
        None
    }
}

/// Extract `<loc>` entries from a sitemap or sitemap-index document.
/// The stored list is truncated to `max_urls`; the count is exact.
pub fn parse_sitemap(xml: &str, max_urls: usize) -> SitemapInfo {
    let mut urls = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find("<loc>") {
        let after = &rest[start + 5..];
        match after.find("</loc>") {
            Some(end) => {
                let loc = after[..end].trim();
                if !loc.is_empty() {
                    urls.push(loc.to_string());
                }
                rest = &after[end + 6..];
            }
            None => break,
        }
    }
    let url_count = urls.len();
    urls.truncate(max_urls);
    SitemapInfo { url_count, urls }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_and_og_extraction() {
        let html = r#"
            <head>
              <title>Ex</title>
              <meta name="description" content="desc">
              <meta name="robots" content="index,follow">
              <meta property="og:type" content="website">
            </head>
        "#;
        let snap = parse_seo(html, "https://ex.com");
        assert_eq!(snap.description.as_deref(), Some("desc"));
        assert_eq!(snap.other_meta.get("robots").map(String::as_str), Some("index,follow"));
        assert_eq!(snap.og_tags.get("type").map(String::as_str), Some("website"));
    }

    #[test]
    fn json_ld_type_set_is_sorted_and_deduped() {
        let html = r#"
            <script type="application/ld+json">{"@type": "Organization"}</script>
            <script type="application/ld+json">[{"@type": "Product"}, {"@type": "Organization"}]</script>
            <script type="application/ld+json">not json</script>
        "#;
        let snap = parse_seo(html, "https://ex.com");
        assert_eq!(snap.json_ld_types, vec!["Organization", "Product"]);
    }

    #[test]
    fn robots_sitemaps_and_disallows() {
        let robots = "User-agent: *\nDisallow: /admin\nDisallow:\nSitemap: https://ex.com/sitemap.xml\nsitemap: https://ex.com/news.xml\n";
        let info = parse_robots(robots);
        assert_eq!(
            info.sitemap_urls,
            vec!["https://ex.com/news.xml", "https://ex.com/sitemap.xml"]
        );
        assert_eq!(info.disallow_count, 1);
    }

    #[test]
    fn sitemap_count_exact_list_truncated() {
        let xml: String = (0..10)
            .map(|i| format!("<url><loc>https://ex.com/p{i}</loc></url>"))
            .collect();
        let info = parse_sitemap(&xml, 3);
        assert_eq!(info.url_count, 10);
        assert_eq!(info.urls.len(), 3);
        assert_eq!(info.urls[0], "https://ex.com/p0");
    }

    #[test]
    fn hreflang_and_canonical() {
        let html = r#"
            <head>
              <link rel="canonical" href="/home">
              <link rel="alternate" hreflang="de" href="/de">
              <link rel="alternate" hreflang="x-default" href="/">
            </head>
        "#;
        let snap = parse_seo(html, "https://ex.com");
        assert!(snap.canonical_urls.contains(&"https://ex.com/home".to_string()));
        assert!(snap.canonical_urls.contains(&"https://ex.com/".to_string()));
        assert_eq!(snap.hreflang.len(), 1);
        assert_eq!(snap.hreflang[0].hreflang, "de");
    }
}
