//! Small helpers over `scraper` shared by the typed parsers.

use scraper::{ElementRef, Selector};
use url::Url;

/// Compile a static selector. Only called with literals that are known
/// to parse.
pub(crate) fn sel(selector: &str) -> Selector {
    Selector::parse(selector).unwrap()
}

/// Visible text of an element: text nodes joined by single spaces with
/// runs of whitespace collapsed.
pub fn element_text(el: ElementRef<'_>) -> String {
    let joined = el.text().collect::<Vec<_>>().join(" ");
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercased space-joined class list of an element.
pub fn class_string(el: ElementRef<'_>) -> String {
    el.value()
        .classes()
        .map(|c| c.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the first heading (h1..h5) under `el`, capped at `max_len`
/// characters.
pub fn first_heading_text(el: ElementRef<'_>, max_len: usize) -> Option<String> {
    let headings = sel("h1, h2, h3, h4, h5");
    for h in el.select(&headings) {
        let text = element_text(h);
        if !text.is_empty() && text.chars().count() <= max_len {
            return Some(text);
        }
    }
    None
}

/// Resolve `href` against `base`, dropping fragments. Returns `None`
/// for unparsable inputs or non-http(s) results.
pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    let mut joined = base.join(href).ok()?;
    joined.set_fragment(None);
    match joined.scheme() {
        "http" | "https" => Some(joined.to_string()),
        _ => None,
    }
}

/// Canonical form of a URL used as a stable identity: lowercased
/// scheme/host, no fragment, no trailing slash on non-root paths.
pub fn normalize_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw).ok()?;
    url.set_fragment(None);
    let mut out = url.to_string();
    if out.ends_with('/') && url.path() != "/" {
        out.pop();
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn element_text_collapses_whitespace() {
        let doc = Html::parse_fragment("<div>  Pro   plan \n <span>$49</span></div>");
        let root = doc.select(&sel("div")).next().unwrap();
        assert_eq!(element_text(root), "Pro plan $49");
    }

    #[test]
    fn first_heading_respects_cap() {
        let doc = Html::parse_fragment("<div><h2>Team</h2><p>text</p></div>");
        let root = doc.select(&sel("div")).next().unwrap();
        assert_eq!(first_heading_text(root, 80).as_deref(), Some("Team"));
        assert!(first_heading_text(root, 2).is_none());
    }

    #[test]
    fn resolve_url_joins_relative() {
        assert_eq!(
            resolve_url("https://ex.com/pricing", "/careers").as_deref(),
            Some("https://ex.com/careers")
        );
        assert!(resolve_url("https://ex.com", "javascript:void(0)").is_none());
    }

    #[test]
    fn normalize_url_strips_trailing_slash_and_fragment() {
        assert_eq!(
            normalize_url("https://Ex.com/blog/#latest").as_deref(),
            Some("https://ex.com/blog")
        );
        assert_eq!(normalize_url("https://ex.com/").as_deref(), Some("https://ex.com/"));
    }
}
