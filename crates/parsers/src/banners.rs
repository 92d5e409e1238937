//! Banner parser: hero/header imagery on landing pages. Banners are
//! identified by resolved image URL; loading image bytes would be far
//! more expensive than the signal is worth.

use scraper::Html;
use serde::{Deserialize, Serialize};

use crate::html::{class_string, resolve_url, sel};

pub const BANNERS_PARSER_VERSION: &str = "1.0.0";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Banner {
    pub url: String,
    pub alt: String,
}

pub fn parse_banners(html: &str, base_url: &str) -> Vec<Banner> {
    let doc = Html::parse_document(html);
    let hero_sel = sel("header, section, div");
    let img_sel = sel("img[src]");

    let mut banners = Vec::new();
    let mut seen = std::collections::HashSet::new();

    let heroes = doc
        .select(&hero_sel)
        .filter(|el| {
            let c = class_string(*el);
            c.contains("hero") || c.contains("banner") || c.contains("header") || c.contains("slider")
        })
        .take(5);

    for hero in heroes {
        for img in hero.select(&img_sel) {
            let Some(src) = img.value().attr("src") else { continue };
            let Some(url) = resolve_url(base_url, src) else { continue };
            if seen.insert(url.clone()) {
                banners.push(Banner {
                    url,
                    alt: img.value().attr("alt").unwrap_or("").to_string(),
                });
            }
        }
    }
    banners
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_hero_images_once() {
        let html = r#"
            <section class="hero">
              <img src="/img/launch.png" alt="Launch">
              <img src="/img/launch.png" alt="Launch again">
            </section>
            <div class="banner-strip"><img src="https://cdn.ex.com/promo.jpg"></div>
            <div class="content"><img src="/img/ignored.png"></div>
        "#;
        let banners = parse_banners(html, "https://ex.com");
        assert_eq!(banners.len(), 2);
        assert_eq!(banners[0].url, "https://ex.com/img/launch.png");
        assert_eq!(banners[0].alt, "Launch");
        assert_eq!(banners[1].url, "https://cdn.ex.com/promo.jpg");
    }
}
