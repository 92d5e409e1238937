//! Closed vocabularies shared by the pipeline. Every enum here maps to
//! a closed column set in the persisted stores; serde uses snake_case
//! tags so the JSON on disk stays readable.

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sources & crawling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Kind of public surface a source profile observes.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Blog,
    NewsSite,
    Twitter,
    Github,
    Reddit,
    PressRelease,
    Facebook,
    Instagram,
    Linkedin,
    Youtube,
    Tiktok,
}

impl SourceKind {
    pub fn all() -> &'static [SourceKind] {
        &[
            SourceKind::Blog,
            SourceKind::NewsSite,
            SourceKind::Twitter,
            SourceKind::Github,
            SourceKind::Reddit,
            SourceKind::PressRelease,
            SourceKind::Facebook,
            SourceKind::Instagram,
            SourceKind::Linkedin,
            SourceKind::Youtube,
            SourceKind::Tiktok,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Blog => "blog",
            SourceKind::NewsSite => "news_site",
            SourceKind::Twitter => "twitter",
            SourceKind::Github => "github",
            SourceKind::Reddit => "reddit",
            SourceKind::PressRelease => "press_release",
            SourceKind::Facebook => "facebook",
            SourceKind::Instagram => "instagram",
            SourceKind::Linkedin => "linkedin",
            SourceKind::Youtube => "youtube",
            SourceKind::Tiktok => "tiktok",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a source profile treats fetched content.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CrawlMode {
    /// Every run ingests items directly into the news corpus.
    #[default]
    AlwaysUpdate,
    /// Runs route through the change detector; items are emitted only
    /// when a snapshot diff fires.
    ChangeDetection,
}

/// Specificity scope of a crawl schedule rule.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CrawlScope {
    SourceKind,
    Company,
    Source,
}

/// Lifecycle of a single crawl run. Terminal statuses are immutable.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Scheduled,
    Running,
    Success,
    Failed,
    Skipped,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Failed | RunStatus::Skipped)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// News classification
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Topic vocabulary. Provider category hints share this vocabulary and
/// feed the classifier as a fallback.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum NewsTopic {
    Product,
    Strategy,
    Finance,
    Technology,
    Security,
    Research,
    Community,
    Talent,
    Regulation,
    Market,
    Other,
}

impl NewsTopic {
    pub fn parse(tag: &str) -> Option<NewsTopic> {
        match tag {
            "product" => Some(NewsTopic::Product),
            "strategy" => Some(NewsTopic::Strategy),
            "finance" => Some(NewsTopic::Finance),
            "technology" => Some(NewsTopic::Technology),
            "security" => Some(NewsTopic::Security),
            "research" => Some(NewsTopic::Research),
            "community" => Some(NewsTopic::Community),
            "talent" => Some(NewsTopic::Talent),
            "regulation" => Some(NewsTopic::Regulation),
            "market" => Some(NewsTopic::Market),
            "other" => Some(NewsTopic::Other),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
    Mixed,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Snapshots & change events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Variant of a content-addressed snapshot; selects the parser and the
/// structured diff strategy.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    Pricing,
    Structure,
    Seo,
    Banners,
    Products,
    Jobs,
}

impl SnapshotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotKind::Pricing => "pricing",
            SnapshotKind::Structure => "structure",
            SnapshotKind::Seo => "seo",
            SnapshotKind::Banners => "banners",
            SnapshotKind::Products => "products",
            SnapshotKind::Jobs => "jobs",
        }
    }
}

impl std::fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Success,
    Skipped,
    Error,
}

/// Notification fan-out state recorded on a change event.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeNotificationStatus {
    Pending,
    Sent,
    Failed,
    Skipped,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Notifications
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Email,
    Telegram,
    Webhook,
    Slack,
    Zapier,
}

/// Logical notification categories subscriptions match on.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    CompetitorChange,
    NewsItem,
    DailyTrend,
    CompanyActivity,
    System,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Queued,
    Dispatched,
    Delivered,
    Failed,
    Suppressed,
    Expired,
}

impl EventStatus {
    /// Active events participate in deduplication.
    pub fn is_active(&self) -> bool {
        matches!(self, EventStatus::Queued | EventStatus::Dispatched)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
    Cancelled,
    Retrying,
}

impl DeliveryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Sent | DeliveryStatus::Failed | DeliveryStatus::Cancelled
        )
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Digests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DigestFrequency {
    #[default]
    Daily,
    Weekly,
    Custom,
    Off,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DigestFormat {
    #[default]
    Short,
    Detailed,
}

/// Which news population feeds a user's digest.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DigestScope {
    /// All news visible to the user.
    #[default]
    All,
    /// Only news for companies the user tracks.
    Tracked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_kind_serde_roundtrip() {
        for kind in SourceKind::all() {
            let json = serde_json::to_string(kind).unwrap();
            let back: SourceKind = serde_json::from_str(&json).unwrap();
            assert_eq!(*kind, back);
        }
    }

    #[test]
    fn source_kind_uses_snake_case_tags() {
        let json = serde_json::to_string(&SourceKind::PressRelease).unwrap();
        assert_eq!(json, "\"press_release\"");
        assert_eq!(SourceKind::PressRelease.as_str(), "press_release");
    }

    #[test]
    fn run_status_terminality() {
        assert!(!RunStatus::Scheduled.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Success.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Skipped.is_terminal());
    }

    #[test]
    fn event_status_active_set() {
        assert!(EventStatus::Queued.is_active());
        assert!(EventStatus::Dispatched.is_active());
        assert!(!EventStatus::Delivered.is_active());
        assert!(!EventStatus::Suppressed.is_active());
        assert!(!EventStatus::Expired.is_active());
    }

    #[test]
    fn delivery_status_terminal_set() {
        assert!(DeliveryStatus::Sent.is_terminal());
        assert!(DeliveryStatus::Failed.is_terminal());
        assert!(DeliveryStatus::Cancelled.is_terminal());
        assert!(!DeliveryStatus::Pending.is_terminal());
        assert!(!DeliveryStatus::Retrying.is_terminal());
    }

    #[test]
    fn topic_parse_matches_tags() {
        assert_eq!(NewsTopic::parse("finance"), Some(NewsTopic::Finance));
        assert_eq!(NewsTopic::parse("nonsense"), None);
    }
}
