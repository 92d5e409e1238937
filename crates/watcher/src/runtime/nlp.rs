//! Heuristic NLP pipeline: topic classification, sentiment, priority
//! scoring, extractive summaries, and keyword relevances. Keyword
//! tables plus frequency/recency features; deterministic for a fixed
//! input.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use rw_domain::model::{NewsTopic, Sentiment};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Vocabulary tables
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const TOPIC_KEYWORDS: &[(&[&str], NewsTopic)] = &[
    (&["funding", "seed", "series a", "series b", "ipo", "investment"], NewsTopic::Finance),
    (&["launch", "introducing", "release", "feature", "update", "roadmap"], NewsTopic::Product),
    (&["security", "breach", "vulnerability", "patch", "compliance"], NewsTopic::Security),
    (&["api", "sdk", "integration", "partner", "partnership"], NewsTopic::Market),
    (&["performance", "benchmark", "speed", "latency", "scaling"], NewsTopic::Technology),
    (&["research", "paper", "arxiv", "publication"], NewsTopic::Research),
    (&["event", "conference", "webinar", "community"], NewsTopic::Community),
    (&["hire", "hires", "team", "leadership", "ceo", "cto", "cso"], NewsTopic::Talent),
    (&["regulation", "policy", "legal", "governance"], NewsTopic::Regulation),
    (&["market", "customer", "growth", "traction"], NewsTopic::Market),
    (&["strategy", "vision", "mission", "initiative"], NewsTopic::Strategy),
];

const POSITIVE_WORDS: &[&str] = &[
    "best", "improved", "faster", "secure", "efficient", "optimised", "optimized", "growth",
    "success", "great", "positive", "win", "winner", "benefit", "enable", "leading", "strong",
    "accelerate",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bug", "breach", "incident", "failure", "slow", "delay", "issue", "problem", "negative",
    "lawsuit", "regression", "attack", "downtime", "outage", "risk", "warning", "critical",
    "vulnerability",
];

const STOPWORDS: &[&str] = &[
    "the", "and", "that", "with", "from", "this", "have", "been", "will", "into", "about", "your",
    "their", "after", "before", "were", "there", "over", "under", "between", "through", "major",
    "minor", "very", "much", "more", "also", "many", "most", "such", "other", "only", "where",
    "when", "while", "because", "since", "until", "within", "without",
];

const HIGH_IMPACT_WORDS: &[(&str, f64)] = &[
    ("launch", 0.18),
    ("release", 0.18),
    ("funding", 0.22),
    ("breach", 0.25),
    ("incident", 0.20),
    ("acquisition", 0.20),
    ("partnership", 0.15),
];

fn word_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-zA-Z][a-zA-Z\-]{3,}").unwrap())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pipeline
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn normalize_text(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// First keyword-table hit wins; the provider's category hint is the
/// fallback when no table matches.
pub fn classify_topic(text: &str, fallback: Option<NewsTopic>) -> Option<NewsTopic> {
    let lower = text.to_lowercase();
    for (keywords, topic) in TOPIC_KEYWORDS {
        if keywords.iter().any(|k| lower.contains(k)) {
            return Some(*topic);
        }
    }
    fallback.filter(|t| *t != NewsTopic::Other)
}

pub fn sentiment(text: &str) -> Sentiment {
    let lower = text.to_lowercase();
    let positive = POSITIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
    let negative = NEGATIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();

    if positive > negative && positive > 0 {
        Sentiment::Positive
    } else if negative > positive && negative > 0 {
        Sentiment::Negative
    } else if positive > 0 && negative > 0 {
        Sentiment::Mixed
    } else {
        Sentiment::Neutral
    }
}

/// First sentences of the text, used when a provider returned none.
pub fn summarize(text: &str, max_sentences: usize) -> String {
    let mut sentences: Vec<String> = Vec::new();
    let mut current = String::new();
    for ch in text.trim().chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            let sentence = current.trim().to_string();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            current.clear();
            if sentences.len() >= max_sentences {
                break;
            }
        }
    }
    if sentences.len() < max_sentences {
        let tail = current.trim();
        if !tail.is_empty() {
            sentences.push(tail.to_string());
        }
    }
    sentences.join(" ")
}

/// Keyword relevances normalized by the max term frequency, top
/// `limit` in frequency order.
pub fn extract_keywords(text: &str, limit: usize) -> Vec<(String, f64)> {
    let mut frequencies: HashMap<String, usize> = HashMap::new();
    for word in word_regex().find_iter(text) {
        let word = word.as_str().to_lowercase();
        if word.len() > 3 && !STOPWORDS.contains(&word.as_str()) {
            *frequencies.entry(word).or_default() += 1;
        }
    }
    let Some(&max_freq) = frequencies.values().max() else {
        return Vec::new();
    };
    let mut keywords: Vec<(String, usize)> = frequencies.into_iter().collect();
    // Stable order for equal frequencies keeps the pipeline
    // deterministic across runs.
    keywords.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    keywords
        .into_iter()
        .take(limit)
        .map(|(word, freq)| (word, ((freq as f64 / max_freq as f64) * 1000.0).round() / 1000.0))
        .collect()
}

/// Priority in [0.1, 1.0] from high-impact title words, topic weight,
/// and recency.
pub fn priority_score(title: &str, published_at: DateTime<Utc>, topic: Option<NewsTopic>) -> f64 {
    priority_score_at(title, published_at, topic, Utc::now())
}

pub fn priority_score_at(
    title: &str,
    published_at: DateTime<Utc>,
    topic: Option<NewsTopic>,
    now: DateTime<Utc>,
) -> f64 {
    let mut score = 0.45;
    let title_lower = title.to_lowercase();

    for (word, bonus) in HIGH_IMPACT_WORDS {
        if title_lower.contains(word) {
            score += bonus;
        }
    }

    match topic {
        Some(NewsTopic::Finance) | Some(NewsTopic::Security) => score += 0.1,
        Some(NewsTopic::Product) => score += 0.05,
        _ => {}
    }

    let age_days = (now - published_at).num_seconds() as f64 / 86_400.0;
    let recency_bonus = (0.25 - age_days.clamp(0.0, 30.0) * 0.008).max(0.0);
    score += recency_bonus;

    score.clamp(0.1, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn topic_table_hit_beats_fallback() {
        let topic = classify_topic("Series B funding round closed", Some(NewsTopic::Product));
        assert_eq!(topic, Some(NewsTopic::Finance));
    }

    #[test]
    fn fallback_used_when_no_table_hit() {
        assert_eq!(
            classify_topic("quarterly housekeeping note", Some(NewsTopic::Community)),
            Some(NewsTopic::Community)
        );
        assert_eq!(classify_topic("quarterly housekeeping note", Some(NewsTopic::Other)), None);
        assert_eq!(classify_topic("quarterly housekeeping note", None), None);
    }

    #[test]
    fn sentiment_counts_hits() {
        assert_eq!(sentiment("improved and faster, a great win"), Sentiment::Positive);
        assert_eq!(sentiment("outage caused by a critical bug"), Sentiment::Negative);
        assert_eq!(sentiment("nothing noteworthy here"), Sentiment::Neutral);
    }

    #[test]
    fn summarize_takes_leading_sentences() {
        let text = "First sentence. Second one! Third? Fourth.";
        let summary = summarize(text, 2);
        assert!(summary.contains("First sentence."));
        assert!(summary.contains("Second one!"));
        assert!(!summary.contains("Third"));
    }

    #[test]
    fn keywords_are_normalized_and_deterministic() {
        let text = "runtime runtime runtime latency latency benchmark";
        let keywords = extract_keywords(text, 8);
        assert_eq!(keywords[0], ("runtime".to_string(), 1.0));
        assert_eq!(keywords[1].0, "latency");
        assert!((keywords[1].1 - 0.667).abs() < 1e-9);
        assert_eq!(keywords, extract_keywords(text, 8));
    }

    #[test]
    fn priority_prefers_fresh_high_impact_news() {
        let now = Utc::now();
        let fresh = priority_score_at("Major funding announcement", now, Some(NewsTopic::Finance), now);
        let stale = priority_score_at(
            "Major funding announcement",
            now - Duration::days(30),
            Some(NewsTopic::Finance),
            now,
        );
        assert!(fresh > stale);
        assert!(fresh <= 1.0);

        let dull = priority_score_at("weekly notes", now - Duration::days(60), None, now);
        assert!(dull >= 0.1);
        assert!(dull < fresh);
    }
}
