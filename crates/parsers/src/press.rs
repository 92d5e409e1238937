//! Press-release list parser for newsroom / press pages.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use scraper::Html;
use serde::{Deserialize, Serialize};

use crate::html::{class_string, element_text, resolve_url, sel};

pub const PRESS_PARSER_VERSION: &str = "1.1.0";

const CLASS_KEYWORDS: &[&str] = &["press", "release", "news", "announcement"];

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PressItem {
    pub title: String,
    pub url: String,
    pub summary: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

pub fn parse_press_list(html: &str, base_url: &str) -> Vec<PressItem> {
    let doc = Html::parse_document(html);
    let containers = sel("article, div, li, section");
    let date_sel = sel("time, span, div");
    let summary_sel = sel("p, div, span");
    let link_sel = sel("a[href]");
    let heading_sel = sel("h1, h2, h3, h4, h5, h6");

    let mut items = Vec::new();
    let mut seen_urls = std::collections::HashSet::new();

    for el in doc.select(&containers) {
        let is_article = el.value().name() == "article";
        let classes = class_string(el);
        if !is_article && !CLASS_KEYWORDS.iter().any(|k| classes.contains(k)) {
            continue;
        }

        let title = el
            .select(&heading_sel)
            .map(element_text)
            .find(|t| !t.is_empty())
            .or_else(|| el.select(&link_sel).map(element_text).find(|t| !t.is_empty()));
        let Some(title) = title else { continue };

        let url = el
            .select(&link_sel)
            .find_map(|a| a.value().attr("href"))
            .and_then(|href| resolve_url(base_url, href))
            .unwrap_or_else(|| base_url.to_string());
        if !seen_urls.insert(url.clone()) {
            continue;
        }

        // <time datetime=".."> wins over free-text date fragments.
        let published_at = el
            .select(&date_sel)
            .find_map(|d| {
                if d.value().name() == "time" {
                    if let Some(iso) = d.value().attr("datetime") {
                        return parse_date(iso);
                    }
                }
                let c = class_string(d);
                if c.contains("date") || c.contains("time") || c.contains("published") || c.contains("created") {
                    parse_date(&element_text(d))
                } else {
                    None
                }
            });

        let summary = el
            .select(&summary_sel)
            .find(|d| {
                let c = class_string(*d);
                c.contains("summary") || c.contains("excerpt") || c.contains("description") || c.contains("intro")
            })
            .or_else(|| el.select(&sel("p")).next())
            .map(|d| element_text(d).chars().take(500).collect::<String>())
            .filter(|s| !s.is_empty());

        items.push(PressItem { title, url, summary, published_at });
    }
    items
}

/// Recognize the common date shapes on press pages: ISO dates or
/// datetimes, MM/DD/YYYY, and DD.MM.YYYY.
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    static ISO: OnceLock<Regex> = OnceLock::new();
    static SLASH: OnceLock<Regex> = OnceLock::new();
    static DOTTED: OnceLock<Regex> = OnceLock::new();

    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    let iso = ISO.get_or_init(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").unwrap());
    if let Some(caps) = iso.captures(text) {
        return ymd(&caps[1], &caps[2], &caps[3]);
    }
    let slash = SLASH.get_or_init(|| Regex::new(r"(\d{2})/(\d{2})/(\d{4})").unwrap());
    if let Some(caps) = slash.captures(text) {
        return ymd(&caps[3], &caps[1], &caps[2]);
    }
    let dotted = DOTTED.get_or_init(|| Regex::new(r"(\d{2})\.(\d{2})\.(\d{4})").unwrap());
    if let Some(caps) = dotted.captures(text) {
        return ymd(&caps[3], &caps[2], &caps[1]);
    }
    None
}

fn ymd(y: &str, m: &str, d: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)?;
    Some(DateTime::from_naive_utc_and_offset(date.and_hms_opt(0, 0, 0)?, Utc))
}
