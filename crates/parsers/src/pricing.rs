//! Pricing page parser: plan cards and feature matrices to normalized
//! plans with currency, amount, and billing cycle.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};

use crate::html::{class_string, element_text, first_heading_text, sel};

pub const PRICING_PARSER_VERSION: &str = "1.2.0";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Output model
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Monthly,
    Annual,
    Quarterly,
    Weekly,
    Daily,
    Lifetime,
    OneTime,
    PerUser,
    UsageBased,
}

/// Non-numeric price labels.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PriceLabel {
    Free,
    Contact,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PlanFeature {
    pub feature_group: String,
    pub value: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PricingPlan {
    pub plan: String,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub billing_cycle: Option<BillingCycle>,
    pub raw_price: Option<String>,
    pub price_label: Option<PriceLabel>,
    pub features: Vec<PlanFeature>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ExtractionMetadata {
    pub url: Option<String>,
    pub plan_candidates: usize,
    pub table_candidates: usize,
    pub plan_count: usize,
    pub currencies: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PricingParse {
    pub plans: Vec<PricingPlan>,
    pub warnings: Vec<String>,
    pub extraction_metadata: ExtractionMetadata,
    pub parser_version: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Vocabulary tables
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const CURRENCY_SYMBOLS: &[(&str, &str)] = &[
    ("$", "USD"),
    ("€", "EUR"),
    ("£", "GBP"),
    ("¥", "JPY"),
    ("₽", "RUB"),
    ("₩", "KRW"),
    ("₺", "TRY"),
    ("₹", "INR"),
    ("₫", "VND"),
    ("₴", "UAH"),
    ("C$", "CAD"),
    ("CA$", "CAD"),
    ("A$", "AUD"),
    ("AU$", "AUD"),
    ("NZ$", "NZD"),
    ("HK$", "HKD"),
    ("S$", "SGD"),
    ("₦", "NGN"),
    ("R$", "BRL"),
    ("CHF", "CHF"),
];

const CURRENCY_CODES: &[&str] = &[
    "USD", "EUR", "GBP", "AUD", "CAD", "NZD", "SGD", "HKD", "SEK", "NOK", "DKK", "PLN", "RUB",
    "TRY", "INR", "JPY", "CNY", "TWD", "KRW", "BRL", "ZAR", "VND", "NGN", "ILS", "MXN", "CHF",
];

const FREE_KEYWORDS: &[&str] = &["free", "complimentary", "no cost"];
const CUSTOM_KEYWORDS: &[&str] = &["contact", "custom", "quote", "request", "talk to sales"];

const CARD_CLASS_KEYWORDS: &[&str] = &["plan", "pricing", "tier", "package", "bundle", "card"];

fn billing_for(token: &str) -> Option<BillingCycle> {
    let cycle = match token {
        "month" | "mo" | "monthly" => BillingCycle::Monthly,
        "year" | "yr" | "annual" | "annually" => BillingCycle::Annual,
        "quarter" => BillingCycle::Quarterly,
        "week" | "weekly" => BillingCycle::Weekly,
        "day" | "daily" => BillingCycle::Daily,
        "lifetime" => BillingCycle::Lifetime,
        "one-time" | "onetime" | "once" => BillingCycle::OneTime,
        "per user" | "per seat" | "per member" | "per teammate" | "user" | "seat" | "member" => {
            BillingCycle::PerUser
        }
        "per credit" | "per run" | "per request" | "per prompt" | "credit" | "prompt"
        | "request" | "usage" => BillingCycle::UsageBased,
        _ => return None,
    };
    Some(cycle)
}

fn price_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?P<currency>(?:USD|EUR|GBP|AUD|CAD|NZD|SGD|HKD|SEK|NOK|DKK|PLN|RUB|TRY|INR|JPY|CNY|TWD|KRW|BRL|ZAR|MXN|CHF)|[₹$€£¥₽₩₺₫₴₦]|(?:[A-Z]{1,2}\$))\s*(?P<amount>\d[\d\s.,]*)(?:\s*(?:/|per)?\s*(?P<cycle>month|mo|monthly|year|yr|annual|annually|quarter|week|weekly|day|daily|user|seat|member|credit|prompt|request))?",
        )
        .unwrap()
    })
}

fn price_class_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)price|cost|amount").unwrap())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Parser
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse a pricing page into normalized plans. Deterministic for a
/// fixed input document.
pub fn parse_pricing(html: &str, url: Option<&str>) -> PricingParse {
    let doc = Html::parse_document(html);
    let mut warnings = Vec::new();

    let card_nodes = collect_plan_cards(&doc);
    let card_count = card_nodes.len();

    let mut plans: Vec<PricingPlan> = Vec::new();
    let mut unnamed = 0usize;
    for node in &card_nodes {
        if let Some(mut plan) = parse_plan_card(*node, &mut warnings) {
            if plan.plan.is_empty() {
                unnamed += 1;
                plan.plan = format!("Plan {unnamed}");
            }
            plans.push(plan);
        }
    }

    let table_plans = parse_pricing_tables(&doc, &mut warnings);
    let table_count = table_plans.len();
    plans.extend(table_plans);

    let plans = deduplicate_plans(plans);

    let mut currencies: Vec<String> = plans.iter().filter_map(|p| p.currency.clone()).collect();
    currencies.sort();
    currencies.dedup();

    if plans.is_empty() {
        warnings.push("No pricing plans detected on page.".to_string());
    }

    PricingParse {
        extraction_metadata: ExtractionMetadata {
            url: url.map(str::to_string),
            plan_candidates: card_count,
            table_candidates: table_count,
            plan_count: plans.len(),
            currencies,
        },
        plans,
        warnings,
        parser_version: PRICING_PARSER_VERSION.to_string(),
    }
}

/// Candidate plan cards: container elements whose class list carries a
/// pricing keyword and whose text carries a price indicator. Ancestors
/// of other candidates are dropped so a wrapping grid does not swallow
/// its cards.
fn collect_plan_cards<'a>(doc: &'a Html) -> Vec<ElementRef<'a>> {
    let containers = sel("section, div, article, li");
    let mut candidates: Vec<ElementRef<'a>> = Vec::new();
    for el in doc.select(&containers) {
        let classes = class_string(el);
        if classes.is_empty() {
            continue;
        }
        if !CARD_CLASS_KEYWORDS.iter().any(|k| classes.contains(k)) {
            continue;
        }
        let text = element_text(el);
        if text.is_empty() || !contains_price_indicator(&text) {
            continue;
        }
        candidates.push(el);
    }

    let ids: std::collections::HashSet<_> = candidates.iter().map(|el| el.id()).collect();
    let mut dropped: std::collections::HashSet<_> = std::collections::HashSet::new();
    for el in &candidates {
        for ancestor in el.ancestors() {
            if ids.contains(&ancestor.id()) {
                dropped.insert(ancestor.id());
            }
        }
    }
    candidates.retain(|el| !dropped.contains(&el.id()));
    candidates
}

fn contains_price_indicator(text: &str) -> bool {
    let lower = text.to_lowercase();
    if FREE_KEYWORDS.iter().chain(CUSTOM_KEYWORDS).any(|k| lower.contains(k)) {
        return true;
    }
    price_regex().is_match(text)
}

fn parse_plan_card(node: ElementRef<'_>, warnings: &mut Vec<String>) -> Option<PricingPlan> {
    let plan_name = extract_plan_name(node).unwrap_or_default();
    let price_text = extract_price_string(node);
    let parsed = parse_price(&price_text);
    let features = extract_features(node);

    if plan_name.is_empty() && parsed.amount.is_none() && parsed.label.is_none() && features.is_empty() {
        return None;
    }

    if parsed.amount.is_none() && parsed.label.is_none() {
        let subject = if plan_name.is_empty() { price_text.as_str() } else { plan_name.as_str() };
        warnings.push(format!("Unable to parse numeric price for plan '{subject}'."));
    }

    Some(PricingPlan {
        plan: plan_name,
        price: parsed.amount,
        currency: parsed.currency,
        billing_cycle: parsed.cycle,
        raw_price: Some(price_text),
        price_label: parsed.label,
        features,
    })
}

fn extract_plan_name(node: ElementRef<'_>) -> Option<String> {
    if let Some(heading) = first_heading_text(node, 80) {
        return Some(heading);
    }
    if let Some(label) = node.value().attr("data-plan") {
        return Some(label.to_string());
    }
    let tiered = sel("[data-tier]");
    node.select(&tiered)
        .find_map(|el| el.value().attr("data-tier"))
        .map(str::to_string)
}

/// Price-bearing text: class-matched descendants first, then the first
/// paragraphs with a price indicator, then the whole element text.
fn extract_price_string(node: ElementRef<'_>) -> String {
    let any = sel("*");
    let texts: Vec<String> = node
        .select(&any)
        .filter(|el| price_class_regex().is_match(&class_string(*el)))
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect();
    if !texts.is_empty() {
        return texts.join(" ");
    }

    let paragraphs = sel("p");
    for para in node.select(&paragraphs).take(2) {
        let text = element_text(para);
        if contains_price_indicator(&text) {
            return text;
        }
    }

    element_text(node)
}

struct ParsedPrice {
    amount: Option<f64>,
    currency: Option<String>,
    cycle: Option<BillingCycle>,
    label: Option<PriceLabel>,
}

fn parse_price(price_text: &str) -> ParsedPrice {
    let none = ParsedPrice { amount: None, currency: None, cycle: None, label: None };
    if price_text.is_empty() {
        return none;
    }

    let lower = price_text.to_lowercase();
    if FREE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return ParsedPrice {
            amount: Some(0.0),
            currency: None,
            cycle: None,
            label: Some(PriceLabel::Free),
        };
    }
    if CUSTOM_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return ParsedPrice {
            amount: None,
            currency: None,
            cycle: None,
            label: Some(PriceLabel::Contact),
        };
    }

    let Some(caps) = price_regex().captures(price_text) else {
        return none;
    };

    let amount = caps.name("amount").and_then(|m| normalize_amount(m.as_str()));
    let currency = caps
        .name("currency")
        .and_then(|m| normalize_currency(m.as_str(), price_text));
    let cycle = normalize_billing(caps.name("cycle").map(|m| m.as_str()), price_text);

    ParsedPrice { amount, currency, cycle, label: None }
}

/// Separator rule: with both `,` and `.` present the last one is the
/// decimal separator; a lone `,` is treated as decimal; repeated
/// separators of one kind are thousands groupings.
fn normalize_amount(raw: &str) -> Option<f64> {
    let mut cleaned: String = raw.trim().replace(' ', "");
    if cleaned.is_empty() {
        return None;
    }
    let commas = cleaned.matches(',').count();
    let dots = cleaned.matches('.').count();
    if commas > 1 && dots == 0 {
        cleaned = cleaned.replace(',', "");
    } else if dots > 1 && commas == 0 {
        cleaned = cleaned.replace('.', "");
    } else if commas >= 1 && dots >= 1 {
        if cleaned.rfind('.') > cleaned.rfind(',') {
            cleaned = cleaned.replace(',', "");
        } else {
            cleaned = cleaned.replace('.', "").replace(',', ".");
        }
    } else {
        cleaned = cleaned.replace(',', ".");
    }
    cleaned.parse::<f64>().ok()
}

fn normalize_currency(raw: &str, context: &str) -> Option<String> {
    let raw = raw.trim();
    if let Some((_, iso)) = CURRENCY_SYMBOLS.iter().find(|(sym, _)| *sym == raw) {
        return Some((*iso).to_string());
    }
    let upper = raw.to_uppercase();
    if CURRENCY_CODES.contains(&upper.as_str()) {
        return Some(upper);
    }
    // Prefixed dollar variants matched case-insensitively (ca$, a$).
    if let Some((_, iso)) = CURRENCY_SYMBOLS.iter().find(|(sym, _)| sym.to_uppercase() == upper) {
        return Some((*iso).to_string());
    }
    let context_upper = context.to_uppercase();
    CURRENCY_CODES
        .iter()
        .find(|code| context_upper.contains(*code))
        .map(|code| (*code).to_string())
}

fn normalize_billing(fragment: Option<&str>, context: &str) -> Option<BillingCycle> {
    static PER_RE: OnceLock<Regex> = OnceLock::new();
    let per_re = PER_RE.get_or_init(|| Regex::new(r"per\s+[a-z]+").unwrap());

    let lower = context.to_lowercase();
    let mut candidates: Vec<String> = Vec::new();
    if let Some(fragment) = fragment {
        candidates.push(fragment.to_lowercase());
    }
    candidates.extend(per_re.find_iter(&lower).map(|m| m.as_str().to_string()));
    candidates.extend(lower.split_whitespace().map(str::to_string));

    for candidate in candidates {
        let candidate = candidate.trim();
        if let Some(cycle) = billing_for(candidate) {
            return Some(cycle);
        }
        if let Some(stripped) = candidate.strip_prefix("per ") {
            if let Some(cycle) = billing_for(stripped) {
                return Some(cycle);
            }
        }
    }
    None
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Feature lists
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn extract_features(node: ElementRef<'_>) -> Vec<PlanFeature> {
    let lists = sel("ul");
    let items = sel("li");
    let mut features = Vec::new();

    for ul in node.select(&lists) {
        let li_count = ul.select(&items).count();
        if li_count < 2 || !looks_like_feature_list(ul) {
            continue;
        }
        let group = derive_feature_group(ul).unwrap_or_else(|| "general".to_string());
        for li in ul.select(&items) {
            let value = element_text(li);
            if !value.is_empty() {
                features.push(PlanFeature { feature_group: group.clone(), value });
            }
        }
    }
    features
}

fn looks_like_feature_list(ul: ElementRef<'_>) -> bool {
    let classes = class_string(ul);
    if ["feature", "benefit", "include"].iter().any(|k| classes.contains(k)) {
        return true;
    }
    // Bare nested lists are submenus, not feature lists.
    !has_list_ancestor(ul)
}

fn has_list_ancestor(el: ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| matches!(a.value().name(), "ul" | "ol"))
}

/// Group label: nearest heading-like previous sibling, else the first
/// heading of the enclosing section.
fn derive_feature_group(ul: ElementRef<'_>) -> Option<String> {
    for sibling in ul.prev_siblings().filter_map(ElementRef::wrap) {
        let name = sibling.value().name();
        if matches!(name, "h3" | "h4" | "h5" | "h6" | "strong") {
            let text = element_text(sibling);
            if !text.is_empty() && text.chars().count() <= 60 {
                return Some(text);
            }
        }
    }

    let parent = ul
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| matches!(a.value().name(), "section" | "div"))?;
    let headings = sel("h3, h4, h5, strong");
    parent
        .select(&headings)
        .map(element_text)
        .find(|t| !t.is_empty())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tables
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Matrix tables: the first header row names the plans, each following
/// row is a feature whose numeric cells double as prices.
fn parse_pricing_tables(doc: &Html, warnings: &mut Vec<String>) -> Vec<PricingPlan> {
    let tables = sel("table");
    let mut plans = Vec::new();
    for table in doc.select(&tables) {
        let classes = class_string(table);
        if classes.is_empty() && !element_text(table).to_lowercase().contains("pricing") {
            continue;
        }
        plans.extend(parse_table(table, warnings));
    }
    plans
}

fn parse_table(table: ElementRef<'_>, warnings: &mut Vec<String>) -> Vec<PricingPlan> {
    let th = sel("th");
    let tr = sel("tr");
    let cells_sel = sel("td, th");

    let headers: Vec<String> = table
        .select(&th)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect();
    let rows: Vec<ElementRef<'_>> = table.select(&tr).collect();
    if headers.len() <= 1 || rows.is_empty() {
        return Vec::new();
    }

    let mut columns: Vec<PricingPlan> = headers[1..]
        .iter()
        .map(|name| PricingPlan {
            plan: name.clone(),
            price: None,
            currency: None,
            billing_cycle: None,
            raw_price: None,
            price_label: None,
            features: Vec::new(),
        })
        .collect();

    for row in rows.iter().skip(1) {
        let cells: Vec<ElementRef<'_>> = row.select(&cells_sel).collect();
        if cells.len() != headers.len() {
            continue;
        }
        let feature_label = element_text(cells[0]);
        for (idx, cell) in cells.iter().enumerate().skip(1) {
            let Some(plan) = columns.get_mut(idx - 1) else { continue };
            let text = element_text(*cell);
            if text.is_empty() {
                continue;
            }
            let parsed = parse_price(&text);
            if parsed.amount.is_some() && plan.price.is_none() {
                plan.price = parsed.amount;
                plan.currency = parsed.currency;
                plan.billing_cycle = parsed.cycle;
                plan.raw_price = Some(text);
                plan.price_label = parsed.label;
            } else {
                plan.features.push(PlanFeature {
                    feature_group: "table".to_string(),
                    value: format!("{feature_label}: {text}"),
                });
            }
        }
    }

    let mut parsed = Vec::new();
    for plan in columns {
        if plan.plan.trim().is_empty() {
            continue;
        }
        if plan.price.is_none() && plan.features.is_empty() {
            warnings.push(format!(
                "Pricing table plan '{}' contains no parsable values.",
                plan.plan
            ));
        }
        parsed.push(plan);
    }
    parsed
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dedup
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Merge plans by lowercased name: first non-null price wins, richer
/// feature list wins. Insertion order is preserved.
fn deduplicate_plans(plans: Vec<PricingPlan>) -> Vec<PricingPlan> {
    let mut ordered: Vec<(String, PricingPlan)> = Vec::new();
    for plan in plans {
        let key = plan.plan.trim().to_lowercase();
        let key = if key.is_empty() { format!("plan_{}", ordered.len() + 1) } else { key };
        match ordered.iter().position(|(k, _)| *k == key) {
            Some(i) => {
                let existing = &mut ordered[i].1;
                if existing.price.is_none() && plan.price.is_some() {
                    existing.price = plan.price;
                    existing.currency = plan.currency.clone();
                    existing.billing_cycle = plan.billing_cycle;
                    existing.raw_price = plan.raw_price.clone();
                    existing.price_label = plan.price_label;
                }
                if existing.features.len() < plan.features.len() {
                    existing.features = plan.features;
                }
            }
            None => ordered.push((key, plan)),
        }
    }
    ordered.into_iter().map(|(_, plan)| plan).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_hash;

    const CARDS: &str = r#"
        <html><body>
          <div class="pricing-grid">
            <div class="plan-card">
              <h3>Free</h3>
              <p class="price">$0/mo</p>
              <ul class="features"><li>1 project</li><li>Community support</li></ul>
            </div>
            <div class="plan-card">
              <h3>Pro</h3>
              <p class="price">$49 / month</p>
              <ul class="features"><li>10 projects</li><li>Email support</li><li>API access</li></ul>
            </div>
            <div class="plan-card">
              <h3>Enterprise</h3>
              <p class="price">Contact sales</p>
              <ul class="features"><li>Unlimited projects</li><li>SLA</li></ul>
            </div>
          </div>
        </body></html>
    "#;

    #[test]
    fn parses_plan_cards() {
        let result = parse_pricing(CARDS, Some("https://ex.com/pricing"));
        assert_eq!(result.plans.len(), 3);

        let free = &result.plans[0];
        assert_eq!(free.plan, "Free");
        assert_eq!(free.price, Some(0.0));
        assert_eq!(free.currency.as_deref(), Some("USD"));

        let pro = &result.plans[1];
        assert_eq!(pro.plan, "Pro");
        assert_eq!(pro.price, Some(49.0));
        assert_eq!(pro.currency.as_deref(), Some("USD"));
        assert_eq!(pro.billing_cycle, Some(BillingCycle::Monthly));
        assert_eq!(pro.features.len(), 3);

        let ent = &result.plans[2];
        assert_eq!(ent.price, None);
        assert_eq!(ent.price_label, Some(PriceLabel::Contact));
    }

    #[test]
    fn wrapping_grid_does_not_swallow_cards() {
        // The outer div carries a "pricing" class and a price indicator
        // through its children; the inner cards must still win.
        let result = parse_pricing(CARDS, None);
        assert_eq!(result.extraction_metadata.plan_candidates, 3);
    }

    #[test]
    fn parses_pricing_table() {
        let html = r#"
            <table class="pricing-table">
              <tr><th>Feature</th><th>Starter</th><th>Team</th></tr>
              <tr><td>Price</td><td>$19/mo</td><td>$99/mo</td></tr>
              <tr><td>Seats</td><td>1</td><td>25</td></tr>
            </table>
        "#;
        let result = parse_pricing(html, None);
        assert_eq!(result.plans.len(), 2);
        let starter = &result.plans[0];
        assert_eq!(starter.plan, "Starter");
        assert_eq!(starter.price, Some(19.0));
        assert_eq!(starter.billing_cycle, Some(BillingCycle::Monthly));
        assert_eq!(starter.features.len(), 1);
        assert!(starter.features[0].value.contains("Seats"));
    }

    #[test]
    fn card_and_table_merge_by_name() {
        let html = r#"
            <div class="plan"><h3>Team</h3><span class="price">$99/mo</span></div>
            <table class="pricing">
              <tr><th>Feature</th><th>Team</th></tr>
              <tr><td>Projects</td><td>Unlimited</td></tr>
              <tr><td>Members</td><td>25 included</td></tr>
            </table>
        "#;
        let result = parse_pricing(html, None);
        assert_eq!(result.plans.len(), 1);
        let team = &result.plans[0];
        assert_eq!(team.price, Some(99.0));
        assert_eq!(team.features.len(), 2);
    }

    #[test]
    fn free_and_contact_labels() {
        let free = parse_price("Free forever");
        assert_eq!(free.amount, Some(0.0));
        assert_eq!(free.label, Some(PriceLabel::Free));

        let contact = parse_price("Talk to sales");
        assert_eq!(contact.amount, None);
        assert_eq!(contact.label, Some(PriceLabel::Contact));
    }

    #[test]
    fn amount_separator_rules() {
        assert_eq!(normalize_amount("1,299.50"), Some(1299.5));
        assert_eq!(normalize_amount("1.299,50"), Some(1299.5));
        assert_eq!(normalize_amount("1,299"), Some(1.299));
        assert_eq!(normalize_amount("1,000,000"), Some(1_000_000.0));
        assert_eq!(normalize_amount("12 500"), Some(12500.0));
        assert_eq!(normalize_amount("49"), Some(49.0));
        assert_eq!(normalize_amount(""), None);
    }

    #[test]
    fn currency_normalization() {
        assert_eq!(normalize_currency("$", "$49/mo").as_deref(), Some("USD"));
        assert_eq!(normalize_currency("€", "€29").as_deref(), Some("EUR"));
        assert_eq!(normalize_currency("C$", "C$59").as_deref(), Some("CAD"));
        assert_eq!(normalize_currency("eur", "eur 29").as_deref(), Some("EUR"));
        assert_eq!(
            normalize_currency("?", "price in NOK per month").as_deref(),
            Some("NOK")
        );
    }

    #[test]
    fn billing_cycle_normalization() {
        assert_eq!(normalize_billing(Some("yr"), "$490/yr"), Some(BillingCycle::Annual));
        assert_eq!(
            normalize_billing(None, "$8 per seat billed monthly"),
            Some(BillingCycle::PerUser)
        );
        assert_eq!(
            normalize_billing(None, "billed per request"),
            Some(BillingCycle::UsageBased)
        );
        assert_eq!(normalize_billing(None, "one-time payment"), Some(BillingCycle::OneTime));
        assert_eq!(normalize_billing(None, "no cycle here"), None);
    }

    #[test]
    fn unparsable_price_accumulates_warning() {
        let html = r#"<div class="plan"><h3>Mystery</h3><p class="price">TBD</p><p>was $49</p></div>"#;
        let result = parse_pricing(html, None);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("Unable to parse numeric price")));
    }

    #[test]
    fn empty_page_warns_no_plans() {
        let result = parse_pricing("<html><body><p>Hello</p></body></html>", None);
        assert!(result.plans.is_empty());
        assert!(result.warnings.iter().any(|w| w.contains("No pricing plans")));
    }

    #[test]
    fn parse_is_deterministic() {
        let a = parse_pricing(CARDS, Some("https://ex.com/pricing"));
        let b = parse_pricing(CARDS, Some("https://ex.com/pricing"));
        assert_eq!(content_hash(&a.plans), content_hash(&b.plans));
    }

    #[test]
    fn data_plan_attribute_names_unnamed_cards() {
        let html = r#"<div class="tier" data-plan="Scale"><span class="price">$199/mo</span></div>"#;
        let result = parse_pricing(html, None);
        assert_eq!(result.plans.len(), 1);
        assert_eq!(result.plans[0].plan, "Scale");
    }
}
