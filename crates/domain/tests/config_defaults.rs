//! Guards the documented defaults of the full config tree: a process
//! started with an empty environment must come up with these values.

use rw_domain::config::Config;

#[test]
fn full_tree_defaults() {
    let cfg = Config::default();

    assert_eq!(cfg.scraper.timeout_secs, 30);
    assert_eq!(cfg.scraper.max_retries, 3);
    assert_eq!(cfg.scraper.rate_limit_requests, 6);
    assert_eq!(cfg.scraper.max_articles, 10);

    assert_eq!(cfg.schedule.beat_tick_secs, 30);
    assert_eq!(cfg.schedule.task_soft_deadline_secs, 25 * 60);
    assert_eq!(cfg.schedule.task_hard_deadline_secs, 30 * 60);
    assert_eq!(cfg.schedule.dedup_ttl_secs, 900);

    assert_eq!(cfg.notifications.dispatch_batch_size, 25);
    assert_eq!(cfg.notifications.max_retries, 3);

    assert_eq!(cfg.digest.tick_secs, 3600);
    assert_eq!(cfg.digest.default_hour, 9);

    assert_eq!(cfg.telegram.max_per_second, 20);
    assert_eq!(cfg.telegram.max_message_chars, 4000);

    assert_eq!(cfg.observability.metrics_port, 9464);
    assert!(cfg.observability.otlp_endpoint.is_none());

    assert_eq!(cfg.storage.prune_news_days, 180);
    assert_eq!(cfg.storage.prune_notifications_days, 30);
}

#[test]
fn empty_toml_matches_defaults() {
    let parsed: Config = toml::from_str("").unwrap();
    let default = Config::default();
    assert_eq!(
        serde_json::to_value(&parsed).unwrap(),
        serde_json::to_value(&default).unwrap()
    );
}
