//! Persistent stores for the pipeline aggregates. Each store owns one
//! JSON file under the state directory, keeps its working set in a
//! `tokio::sync::RwLock`, and enforces the uniqueness invariants of
//! its aggregate at the API boundary.

pub mod companies;
pub mod events;
pub mod kv;
pub mod news;
pub mod notifications;
pub mod preferences;
pub mod profiles;
pub mod runs;
pub mod schedules;
pub mod snapshots;

pub(crate) mod persist;

pub use companies::{Company, CompanyStore};
pub use events::{ChangeEvent, ChangeEventStore};
pub use kv::KvStore;
pub use news::{NewsItem, NewsKeyword, NewsStore};
pub use notifications::{
    NotificationChannel, NotificationDelivery, NotificationEvent, NotificationStore,
    NotificationSubscription, SubscriptionFilters,
};
pub use preferences::{DigestPreferences, PreferencesStore};
pub use profiles::{ProfileStore, SourceProfile};
pub use runs::{CrawlRun, RunStore};
pub use schedules::{CrawlSchedule, RunWindow, ScheduleStore, ScheduleUpsert};
pub use snapshots::{Snapshot, SnapshotStore};
