//! Structured diffs between consecutive snapshots, one strategy per
//! snapshot kind. All functions are pure over the parsed payloads.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use rw_parsers::banners::Banner;
use rw_parsers::jobs::JobPosting;
use rw_parsers::pricing::{BillingCycle, PricingParse};
use rw_parsers::products::ProductItem;
use rw_parsers::seo::{RobotsInfo, SeoSnapshot, SitemapInfo};
use rw_parsers::structure::StructureSnapshot;

/// How many sitemap URLs a diff carries as a sample.
const SITEMAP_SAMPLE: usize = 10;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Typed diff entries
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangedField {
    PriceChange {
        plan: String,
        previous: Option<f64>,
        current: Option<f64>,
        currency: Option<String>,
        billing: Option<BillingCycle>,
    },
    AddedPlan {
        plan: String,
        price: Option<f64>,
        currency: Option<String>,
        billing: Option<BillingCycle>,
    },
    RemovedPlan {
        plan: String,
    },
    NavLinkAdded {
        url: String,
        text: String,
    },
    NavLinkRemoved {
        url: String,
        text: String,
    },
    KeyPageChange {
        kind: String,
        previously_found: bool,
        now_found: bool,
    },
    MetadataChange {
        field: String,
        previous: Option<String>,
        current: Option<String>,
    },
    OutlineChange {
        previous_sections: usize,
        current_sections: usize,
        previous_headings: usize,
        current_headings: usize,
    },
    MetaTagChange {
        tag: String,
        previous: Option<String>,
        current: Option<String>,
    },
    JsonLdTypesChange {
        added: Vec<String>,
        removed: Vec<String>,
    },
    RobotsSitemapChange {
        added: Vec<String>,
        removed: Vec<String>,
    },
    SitemapChange {
        previous_count: usize,
        current_count: usize,
        sample_added: Vec<String>,
    },
    ItemAdded {
        kind: String,
        name: String,
        detail: Option<String>,
    },
    ItemRemoved {
        kind: String,
        name: String,
        detail: Option<String>,
    },
}

impl ChangedField {
    fn describe(&self) -> String {
        match self {
            ChangedField::PriceChange { plan, previous, current, .. } => format!(
                "price change for '{plan}' ({} -> {})",
                fmt_price(*previous),
                fmt_price(*current)
            ),
            ChangedField::AddedPlan { plan, .. } => format!("added plan '{plan}'"),
            ChangedField::RemovedPlan { plan } => format!("removed plan '{plan}'"),
            ChangedField::NavLinkAdded { text, .. } => format!("new navigation link '{text}'"),
            ChangedField::NavLinkRemoved { text, .. } => format!("removed navigation link '{text}'"),
            ChangedField::KeyPageChange { kind, now_found, .. } => {
                if *now_found {
                    format!("{kind} page appeared")
                } else {
                    format!("{kind} page disappeared")
                }
            }
            ChangedField::MetadataChange { field, .. } => format!("{field} changed"),
            ChangedField::OutlineChange { .. } => "page outline changed".to_string(),
            ChangedField::MetaTagChange { tag, .. } => format!("meta tag '{tag}' changed"),
            ChangedField::JsonLdTypesChange { .. } => "structured data types changed".to_string(),
            ChangedField::RobotsSitemapChange { .. } => "robots.txt sitemaps changed".to_string(),
            ChangedField::SitemapChange { previous_count, current_count, .. } => {
                format!("sitemap size {previous_count} -> {current_count}")
            }
            ChangedField::ItemAdded { kind, name, .. } => format!("new {kind} '{name}'"),
            ChangedField::ItemRemoved { kind, name, .. } => format!("removed {kind} '{name}'"),
        }
    }
}

fn fmt_price(price: Option<f64>) -> String {
    match price {
        Some(p) => format!("{p}"),
        None => "n/a".to_string(),
    }
}

/// Human summary over the first few entries.
pub fn summarize_fields(fields: &[ChangedField]) -> String {
    let described: Vec<String> = fields.iter().take(3).map(ChangedField::describe).collect();
    let mut summary = described.join(", ");
    if fields.len() > 3 {
        summary.push_str(&format!(" (+{} more)", fields.len() - 3));
    }
    summary
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pricing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Plan-keyed diff: added and removed plans plus per-plan price
/// changes for plans present on both sides.
pub fn diff_pricing(previous: &PricingParse, current: &PricingParse) -> Vec<ChangedField> {
    let prev: BTreeMap<String, _> = previous
        .plans
        .iter()
        .map(|p| (p.plan.trim().to_lowercase(), p))
        .collect();
    let cur: BTreeMap<String, _> = current
        .plans
        .iter()
        .map(|p| (p.plan.trim().to_lowercase(), p))
        .collect();

    let mut fields = Vec::new();
    for (key, plan) in &cur {
        match prev.get(key) {
            None => fields.push(ChangedField::AddedPlan {
                plan: key.clone(),
                price: plan.price,
                currency: plan.currency.clone(),
                billing: plan.billing_cycle,
            }),
            Some(old) => {
                if old.price != plan.price || old.currency != plan.currency {
                    fields.push(ChangedField::PriceChange {
                        plan: key.clone(),
                        previous: old.price,
                        current: plan.price,
                        currency: plan.currency.clone().or_else(|| old.currency.clone()),
                        billing: plan.billing_cycle.or(old.billing_cycle),
                    });
                }
            }
        }
    }
    for key in prev.keys() {
        if !cur.contains_key(key) {
            fields.push(ChangedField::RemovedPlan { plan: key.clone() });
        }
    }
    fields
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Landing structure
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn diff_structure(previous: &StructureSnapshot, current: &StructureSnapshot) -> Vec<ChangedField> {
    let mut fields = Vec::new();

    let prev_links: BTreeSet<(String, String)> = previous
        .nav_links
        .iter()
        .map(|l| (l.url.clone(), l.text.clone()))
        .collect();
    let cur_links: BTreeSet<(String, String)> = current
        .nav_links
        .iter()
        .map(|l| (l.url.clone(), l.text.clone()))
        .collect();
    for (url, text) in cur_links.difference(&prev_links) {
        fields.push(ChangedField::NavLinkAdded { url: url.clone(), text: text.clone() });
    }
    for (url, text) in prev_links.difference(&cur_links) {
        fields.push(ChangedField::NavLinkRemoved { url: url.clone(), text: text.clone() });
    }

    for cur_page in &current.key_pages {
        let prev_found = previous
            .key_pages
            .iter()
            .find(|p| p.kind == cur_page.kind)
            .map(|p| p.found)
            .unwrap_or(false);
        if prev_found != cur_page.found {
            fields.push(ChangedField::KeyPageChange {
                kind: cur_page.kind.clone(),
                previously_found: prev_found,
                now_found: cur_page.found,
            });
        }
    }

    for (field, prev_value, cur_value) in [
        ("title", &previous.metadata.title, &current.metadata.title),
        ("description", &previous.metadata.description, &current.metadata.description),
        ("keywords", &previous.metadata.keywords, &current.metadata.keywords),
    ] {
        if prev_value != cur_value {
            fields.push(ChangedField::MetadataChange {
                field: field.to_string(),
                previous: prev_value.clone(),
                current: cur_value.clone(),
            });
        }
    }
    for (tag, prev_value) in &previous.metadata.og_tags {
        if current.metadata.og_tags.get(tag) != Some(prev_value) {
            fields.push(ChangedField::MetaTagChange {
                tag: format!("og:{tag}"),
                previous: Some(prev_value.clone()),
                current: current.metadata.og_tags.get(tag).cloned(),
            });
        }
    }
    for (tag, cur_value) in &current.metadata.og_tags {
        if !previous.metadata.og_tags.contains_key(tag) {
            fields.push(ChangedField::MetaTagChange {
                tag: format!("og:{tag}"),
                previous: None,
                current: Some(cur_value.clone()),
            });
        }
    }

    if rw_parsers::content_hash(&previous.headings) != rw_parsers::content_hash(&current.headings)
        || rw_parsers::content_hash(&previous.sections) != rw_parsers::content_hash(&current.sections)
    {
        fields.push(ChangedField::OutlineChange {
            previous_sections: previous.sections.len(),
            current_sections: current.sections.len(),
            previous_headings: previous.headings.len(),
            current_headings: current.headings.len(),
        });
    }

    fields
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SEO signals
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Combined SEO observation persisted per snapshot: on-page signals
/// plus robots.txt and sitemap probes.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SeoObservation {
    pub page: SeoSnapshot,
    pub robots: RobotsInfo,
    pub sitemap: SitemapInfo,
}

pub fn diff_seo(previous: &SeoObservation, current: &SeoObservation) -> Vec<ChangedField> {
    let mut fields = Vec::new();

    for (field, prev_value, cur_value) in [
        ("title", &previous.page.title, &current.page.title),
        ("description", &previous.page.description, &current.page.description),
        ("keywords", &previous.page.keywords, &current.page.keywords),
    ] {
        if prev_value != cur_value {
            fields.push(ChangedField::MetaTagChange {
                tag: field.to_string(),
                previous: prev_value.clone(),
                current: cur_value.clone(),
            });
        }
    }

    let prev_types: BTreeSet<&String> = previous.page.json_ld_types.iter().collect();
    let cur_types: BTreeSet<&String> = current.page.json_ld_types.iter().collect();
    if prev_types != cur_types {
        fields.push(ChangedField::JsonLdTypesChange {
            added: cur_types.difference(&prev_types).map(|t| (*t).clone()).collect(),
            removed: prev_types.difference(&cur_types).map(|t| (*t).clone()).collect(),
        });
    }

    let prev_maps: BTreeSet<&String> = previous.robots.sitemap_urls.iter().collect();
    let cur_maps: BTreeSet<&String> = current.robots.sitemap_urls.iter().collect();
    if prev_maps != cur_maps {
        fields.push(ChangedField::RobotsSitemapChange {
            added: cur_maps.difference(&prev_maps).map(|u| (*u).clone()).collect(),
            removed: prev_maps.difference(&cur_maps).map(|u| (*u).clone()).collect(),
        });
    }

    if previous.sitemap.url_count != current.sitemap.url_count
        || previous.sitemap.urls != current.sitemap.urls
    {
        let prev_urls: BTreeSet<&String> = previous.sitemap.urls.iter().collect();
        let sample_added: Vec<String> = current
            .sitemap
            .urls
            .iter()
            .filter(|u| !prev_urls.contains(u))
            .take(SITEMAP_SAMPLE)
            .cloned()
            .collect();
        fields.push(ChangedField::SitemapChange {
            previous_count: previous.sitemap.url_count,
            current_count: current.sitemap.url_count,
            sample_added,
        });
    }

    fields
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Content-addressed set diffs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn diff_banners(previous: &[Banner], current: &[Banner]) -> Vec<ChangedField> {
    keyed_set_diff(
        "banner",
        previous.iter().map(|b| (b.url.clone(), Some(b.alt.clone()))),
        current.iter().map(|b| (b.url.clone(), Some(b.alt.clone()))),
    )
}

pub fn diff_products(previous: &[ProductItem], current: &[ProductItem]) -> Vec<ChangedField> {
    keyed_set_diff(
        "product",
        previous.iter().map(|p| (p.name.to_lowercase(), p.url.clone())),
        current.iter().map(|p| (p.name.to_lowercase(), p.url.clone())),
    )
}

/// Jobs are keyed by (name, location).
pub fn diff_jobs(previous: &[JobPosting], current: &[JobPosting]) -> Vec<ChangedField> {
    let key = |j: &JobPosting| {
        let (name, location) = j.key();
        (format!("{name} @ {location}"), j.url.clone())
    };
    keyed_set_diff("job", previous.iter().map(key), current.iter().map(key))
}

fn keyed_set_diff(
    kind: &str,
    previous: impl Iterator<Item = (String, Option<String>)>,
    current: impl Iterator<Item = (String, Option<String>)>,
) -> Vec<ChangedField> {
    let prev: BTreeMap<String, Option<String>> = previous.collect();
    let cur: BTreeMap<String, Option<String>> = current.collect();

    let mut fields = Vec::new();
    for (name, detail) in &cur {
        if !prev.contains_key(name) {
            fields.push(ChangedField::ItemAdded {
                kind: kind.to_string(),
                name: name.clone(),
                detail: detail.clone(),
            });
        }
    }
    for (name, detail) in &prev {
        if !cur.contains_key(name) {
            fields.push(ChangedField::ItemRemoved {
                kind: kind.to_string(),
                name: name.clone(),
                detail: detail.clone(),
            });
        }
    }
    fields
}
