//! Shared application state threaded into every runtime component.

use std::sync::Arc;
use std::time::Duration;

use rw_domain::config::Config;
use rw_domain::model::SourceKind;
use rw_fetch::{Fetcher, HealthLedger, SlidingWindowLimiter, SnapshotWriter};
use rw_providers::curated::{CuratedProvider, CuratedSource};
use rw_providers::universal::UniversalProvider;
use rw_providers::SourceRegistry;
use rw_store::{
    ChangeEventStore, CompanyStore, KvStore, NewsStore, NotificationStore, PreferencesStore,
    ProfileStore, RunStore, ScheduleStore, SnapshotStore,
};

use crate::runtime::transports::Transports;

/// Shared state for workers and the beat loop.
///
/// Fields are grouped by concern:
/// - **Config** — immutable, loaded once at startup
/// - **Fetching** — HTTP client, health ledger, source registry
/// - **Stores** — the persistent aggregates
/// - **Coordination** — KV locks, Telegram rate limiter
#[derive(Clone)]
pub struct AppState {
    // ── Config ────────────────────────────────────────────────────────
    pub config: Arc<Config>,

    // ── Fetching ──────────────────────────────────────────────────────
    pub fetcher: Arc<Fetcher>,
    pub health: Arc<HealthLedger>,
    pub registry: Arc<SourceRegistry>,

    // ── Stores ────────────────────────────────────────────────────────
    pub companies: Arc<CompanyStore>,
    pub profiles: Arc<ProfileStore>,
    pub runs: Arc<RunStore>,
    pub schedules: Arc<ScheduleStore>,
    pub news: Arc<NewsStore>,
    pub snapshots: Arc<SnapshotStore>,
    pub change_events: Arc<ChangeEventStore>,
    pub notifications: Arc<NotificationStore>,
    pub preferences: Arc<PreferencesStore>,

    // ── Coordination ──────────────────────────────────────────────────
    /// Dedup locks and shared counters (SET-if-absent with TTL).
    pub kv: Arc<KvStore>,
    /// Per-bot Telegram send budget, shared across all deliveries.
    pub telegram_limiter: Arc<SlidingWindowLimiter>,
    /// Channel transports used by the dispatcher and the digests.
    pub transports: Arc<Transports>,
}

impl AppState {
    pub fn build(config: Arc<Config>) -> rw_domain::Result<Self> {
        let state_dir = config.storage.state_dir.clone();

        let health = Arc::new(HealthLedger::new(
            &state_dir,
            config.scraper.health_fail_threshold,
            config.scraper.health_transient_weight,
            config.scraper.health_probation_secs,
        ));
        let snapshots_writer = config
            .scraper
            .snapshots_enabled
            .then(|| SnapshotWriter::new(config.storage.snapshot_dir.clone()));
        let fetcher = Arc::new(Fetcher::new(config.scraper.clone(), snapshots_writer)?);

        let registry = {
            let fetcher = fetcher.clone();
            let health = health.clone();
            let mut registry = SourceRegistry::new({
                let fetcher = fetcher.clone();
                let health = health.clone();
                move || {
                    Arc::new(UniversalProvider::new(fetcher.clone(), health.clone(), SourceKind::Blog))
                        as Arc<dyn rw_providers::Provider>
                }
            });
            let curated = curated_sources();
            if !curated.is_empty() {
                let sources = curated.clone();
                registry.register_provider(
                    move |company| CuratedProvider::covers(&sources, company),
                    move || {
                        Arc::new(CuratedProvider::new(
                            fetcher.clone(),
                            health.clone(),
                            curated.clone(),
                        )) as Arc<dyn rw_providers::Provider>
                    },
                );
            }
            Arc::new(registry)
        };

        let telegram_limiter = Arc::new(SlidingWindowLimiter::new(
            config.telegram.max_per_second,
            Duration::from_secs(1),
        ));
        let transports = Arc::new(Transports::new(config.clone(), telegram_limiter.clone())?);

        Ok(Self {
            fetcher,
            health,
            registry,
            companies: Arc::new(CompanyStore::new(&state_dir)),
            profiles: Arc::new(ProfileStore::new(&state_dir)),
            runs: Arc::new(RunStore::new(&state_dir)),
            schedules: Arc::new(ScheduleStore::new(&state_dir)),
            news: Arc::new(NewsStore::new(&state_dir)),
            snapshots: Arc::new(SnapshotStore::new(&state_dir)),
            change_events: Arc::new(ChangeEventStore::new(&state_dir)),
            notifications: Arc::new(NotificationStore::new(&state_dir)),
            preferences: Arc::new(PreferencesStore::new(&state_dir)),
            kv: Arc::new(KvStore::new()),
            telegram_limiter,
            transports,
            config,
        })
    }
}

/// Curated newsroom listings for companies whose blogs live off the
/// path heuristics.
fn curated_sources() -> Vec<CuratedSource> {
    vec![
        CuratedSource {
            company_key: "openai".into(),
            listing_url: "https://openai.com/news".into(),
            kind: SourceKind::Blog,
            category: Some("research".into()),
        },
        CuratedSource {
            company_key: "anthropic".into(),
            listing_url: "https://www.anthropic.com/news".into(),
            kind: SourceKind::Blog,
            category: Some("research".into()),
        },
        CuratedSource {
            company_key: "google".into(),
            listing_url: "https://blog.google/technology/ai/".into(),
            kind: SourceKind::Blog,
            category: Some("technology".into()),
        },
    ]
}
