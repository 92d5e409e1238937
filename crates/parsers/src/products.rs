//! Product list parser for product/solutions pages.

use scraper::Html;
use serde::{Deserialize, Serialize};

use crate::html::{class_string, element_text, resolve_url, sel};

pub const PRODUCTS_PARSER_VERSION: &str = "1.0.1";

const CLASS_KEYWORDS: &[&str] = &["product", "feature", "solution", "service"];
const NAME_ATTRS: &[&str] = &["data-product", "data-name", "data-title"];

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProductItem {
    pub name: String,
    pub description: String,
    pub url: Option<String>,
}

/// Extract the product cards on a page, deduplicated by lowercased
/// name in document order.
pub fn parse_products(html: &str, base_url: &str) -> Vec<ProductItem> {
    let doc = Html::parse_document(html);
    let containers = sel("div, section, article, li");
    let desc_sel = sel("p, div, span");
    let link_sel = sel("a[href]");

    let mut items = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for el in doc.select(&containers) {
        let classes = class_string(el);
        let class_hit = CLASS_KEYWORDS.iter().any(|k| classes.contains(k));
        let attr_hit = NAME_ATTRS.iter().any(|a| el.value().attr(a).is_some());
        if !class_hit && !attr_hit {
            continue;
        }

        let Some(name) = extract_name(el, NAME_ATTRS) else { continue };
        let key = name.to_lowercase();
        if !seen.insert(key) {
            continue;
        }

        let description = el
            .select(&desc_sel)
            .find(|d| {
                let c = class_string(*d);
                c.contains("desc") || c.contains("text") || c.contains("summary")
            })
            .map(|d| element_text(d).chars().take(200).collect())
            .unwrap_or_default();

        let url = el
            .select(&link_sel)
            .find_map(|a| a.value().attr("href"))
            .and_then(|href| resolve_url(base_url, href));

        items.push(ProductItem { name, description, url });
    }
    items
}

/// Name resolution shared with the job parser: heading, data
/// attribute, then first link text.
pub(crate) fn extract_name(el: scraper::ElementRef<'_>, attrs: &[&str]) -> Option<String> {
    let heading_sel = sel("h1, h2, h3, h4, h5, h6");
    if let Some(h) = el.select(&heading_sel).next() {
        let text = element_text(h);
        if !text.is_empty() {
            return Some(text);
        }
    }
    for attr in attrs {
        if let Some(value) = el.value().attr(attr) {
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    let link_sel = sel("a");
    el.select(&link_sel)
        .map(element_text)
        .find(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_named_products_with_links() {
        let html = r#"
            <div class="product-card">
              <h3>Widget API</h3>
              <p class="description">Programmatic widgets.</p>
              <a href="/products/widget-api">Learn more</a>
            </div>
            <div class="product-card">
              <h3>Widget API</h3>
            </div>
            <div class="product-card"><a href="/x">Dash Console</a></div>
        "#;
        let items = parse_products(html, "https://ex.com");
        assert_eq!(items.len(), 2, "duplicate names collapse");
        assert_eq!(items[0].name, "Widget API");
        assert_eq!(items[0].description, "Programmatic widgets.");
        assert_eq!(items[0].url.as_deref(), Some("https://ex.com/products/widget-api"));
        assert_eq!(items[1].name, "Dash Console");
    }

    #[test]
    fn ignores_unrelated_containers() {
        let html = r#"<div class="testimonial"><h3>Great stuff</h3></div>"#;
        assert!(parse_products(html, "https://ex.com").is_empty());
    }
}
