//! Startup, revalidation and gating through the public API.

mod common;

use chrono::{DateTime, Utc};
use common::{MockServer, Reply};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use ticketwarden::cache::hash_license_key;
use ticketwarden::cache::memory::MemoryCache;
use ticketwarden::cache::sqlite::SqliteCache;
use ticketwarden::protocol::models::parse_validation_response;
use ticketwarden::{
    CacheRecord, CacheStore, Clock, LicenseConfig, LicenseIssue, LicenseManager, LicenseNotifier,
    LicenseStatus, MockClock, TickOutcome, TicketwardenError, ValidationClient, ValidationResponse,
    Validator,
};

const KEY: &str = "TW-TEST-KEY";

fn clock() -> Arc<MockClock> {
    Arc::new(MockClock::from_rfc3339("2025-01-15T12:00:00Z"))
}

#[derive(Default)]
struct Recorder(Mutex<Vec<LicenseIssue>>);

impl Recorder {
    fn issues(&self) -> Vec<LicenseIssue> {
        self.0.lock().unwrap().clone()
    }
}

impl LicenseNotifier for Recorder {
    fn notify(&self, issue: LicenseIssue, _status: &LicenseStatus) {
        self.0.lock().unwrap().push(issue);
    }
}

#[derive(Clone, Default)]
struct Script(Arc<Mutex<VecDeque<Result<ValidationResponse, TicketwardenError>>>>);

impl Script {
    fn push(&self, result: Result<ValidationResponse, TicketwardenError>) {
        self.0.lock().unwrap().push_back(result);
    }
}

impl Validator for Script {
    async fn validate(
        &self,
        _issued_at: DateTime<Utc>,
    ) -> Result<ValidationResponse, TicketwardenError> {
        let next = self.0.lock().unwrap().pop_front();
        next.unwrap_or(Err(TicketwardenError::Timeout))
    }
}

fn response(body: &str) -> ValidationResponse {
    parse_validation_response(body.as_bytes()).unwrap()
}

fn config(url: &str) -> LicenseConfig {
    LicenseConfig::new(KEY, url, "123456789")
}

fn http_manager(
    config: LicenseConfig,
    cache: Arc<dyn CacheStore>,
    clock: Arc<MockClock>,
    notifier: Arc<Recorder>,
) -> LicenseManager {
    let client = ValidationClient::new(&config).unwrap();
    LicenseManager::with_parts(config, client, cache, clock, notifier)
}

#[tokio::test]
async fn fresh_cache_skips_network_on_startup() {
    let server = MockServer::start(Reply::json(200, r#"{"valid":true}"#)).await;
    let clock = clock();
    let cache = Arc::new(MemoryCache::new());
    cache.insert(CacheRecord::new(
        hash_license_key(KEY),
        response(r#"{"valid":true,"tier":"basic"}"#),
        clock.now_utc() - chrono::Duration::seconds(10),
        4,
    ));
    let notifier = Arc::new(Recorder::default());

    let manager = http_manager(config(&server.url), cache, clock, notifier.clone());
    let status = manager.initialize().await;

    assert!(status.valid);
    assert!(server.requests().is_empty());
    assert!(manager.check_feature_access("tickets"));
    assert!(notifier.issues().is_empty());
}

#[tokio::test]
async fn empty_key_stays_invalid_without_network() {
    let server = MockServer::start(Reply::json(200, r#"{"valid":true}"#)).await;
    let notifier = Arc::new(Recorder::default());
    let manager = http_manager(
        LicenseConfig::new("", &server.url, "123456789"),
        Arc::new(MemoryCache::new()),
        clock(),
        notifier.clone(),
    );

    let status = manager.initialize().await;

    assert!(!status.valid);
    assert!(server.requests().is_empty());
    assert_eq!(notifier.issues(), vec![LicenseIssue::Invalid]);
    assert!(matches!(
        manager.force_validation().await,
        Err(TicketwardenError::ConfigError(_))
    ));
}

#[tokio::test]
async fn live_validation_sets_limits_and_features() {
    let server = MockServer::start(Reply::json(
        200,
        r#"{"valid":true,"tier":"pro","features":{"api_access":true,"max_tickets":1000}}"#,
    ))
    .await;
    let cache = Arc::new(SqliteCache::open_in_memory().unwrap());
    let manager = http_manager(
        config(&server.url),
        cache.clone(),
        clock(),
        Arc::new(Recorder::default()),
    );

    let status = manager.initialize().await;

    assert!(status.valid);
    assert_eq!(status.tier, "pro");
    assert_eq!(manager.get_feature_limit("max_tickets"), 1000);
    assert!(manager.check_feature_access("api_access"));
    assert!(manager.check_feature_access("tickets"));
    assert!(!manager.check_feature_access("priority_support"));

    let record = cache.load(KEY).unwrap().unwrap();
    assert_eq!(record.validation_count, 1);
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn timeout_with_fresh_cache_degrades_softly() {
    let script = Script::default();
    script.push(Ok(response(r#"{"valid":true,"tier":"pro"}"#)));
    let clock = clock();
    let cache = Arc::new(MemoryCache::new());
    let notifier = Arc::new(Recorder::default());
    let manager = LicenseManager::with_parts(
        config("http://license.invalid"),
        script.clone(),
        cache.clone(),
        clock.clone(),
        notifier.clone(),
    );

    assert!(manager.initialize().await.valid);

    clock.advance(chrono::Duration::hours(2));
    cache.insert(CacheRecord::new(
        hash_license_key(KEY),
        response(r#"{"valid":true,"tier":"pro"}"#),
        clock.now_utc() - chrono::Duration::seconds(30),
        2,
    ));

    assert_eq!(manager.revalidate_tick().await, TickOutcome::Degraded);
    assert!(manager.current_status().valid);
    assert_eq!(notifier.issues(), vec![LicenseIssue::ValidationFailed]);

    // Repeated failures never flip a fresh-cache license to invalid.
    for _ in 0..10 {
        clock.advance(chrono::Duration::minutes(5));
        assert_eq!(manager.revalidate_tick().await, TickOutcome::Degraded);
        assert!(manager.current_status().valid);
    }
}

#[tokio::test]
async fn timeout_without_cache_is_invalid() {
    let server =
        MockServer::start(Reply::json(200, r#"{"valid":true}"#).delayed(Duration::from_secs(3)))
            .await;
    let mut config = config(&server.url);
    config.license_server.timeout = 1;
    let notifier = Arc::new(Recorder::default());
    let manager = http_manager(
        config,
        Arc::new(MemoryCache::new()),
        clock(),
        notifier.clone(),
    );

    let status = manager.initialize().await;

    assert!(!status.valid);
    assert_eq!(notifier.issues(), vec![LicenseIssue::Invalid]);
    assert_eq!(manager.get_feature_limit("max_tickets"), 50);
    assert!(!manager.check_feature_access("tickets"));
}

#[tokio::test]
async fn stale_cache_falls_through_to_invalid() {
    let script = Script::default();
    script.push(Ok(response(r#"{"valid":true,"tier":"pro"}"#)));
    let clock = clock();
    let notifier = Arc::new(Recorder::default());
    let manager = LicenseManager::with_parts(
        config("http://license.invalid"),
        script.clone(),
        Arc::new(MemoryCache::new()),
        clock.clone(),
        notifier.clone(),
    );

    manager.initialize().await;
    clock.advance(chrono::Duration::hours(1));

    assert_eq!(manager.revalidate_tick().await, TickOutcome::Revoked);
    assert!(!manager.current_status().valid);
    assert_eq!(notifier.issues(), vec![LicenseIssue::Invalid]);
}

#[tokio::test]
async fn readers_see_whole_entitlements() {
    let script = Script::default();
    for tier in ["basic", "pro", "enterprise", "pro"] {
        script.push(Ok(response(&format!(
            r#"{{"valid":true,"tier":"{tier}","features":{{"max_tickets":{}}}}}"#,
            match tier {
                "basic" => 100,
                "pro" => 1000,
                _ => -1,
            }
        ))));
    }
    let manager = Arc::new(LicenseManager::with_parts(
        config("http://license.invalid"),
        script.clone(),
        Arc::new(MemoryCache::new()),
        clock(),
        Arc::new(Recorder::default()),
    ));

    let reader = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            for _ in 0..1000 {
                let ent = manager.entitlement();
                let limit = ent.features.get("max_tickets").and_then(|v| v.as_limit());
                match ent.tier.as_str() {
                    "basic" => assert_eq!(limit, Some(100)),
                    "pro" => assert_eq!(limit, Some(1000)),
                    "enterprise" => assert_eq!(limit, Some(-1)),
                    _ => assert_eq!(limit, None),
                }
                tokio::task::yield_now().await;
            }
        })
    };

    for _ in 0..4 {
        manager.force_validation().await.unwrap();
        tokio::task::yield_now().await;
    }
    reader.await.unwrap();
}
