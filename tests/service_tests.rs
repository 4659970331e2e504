//! Integration tests for the password cache service.
//!
//! The LAPS server is replaced by a scripted `PasswordSource` that counts
//! its calls, and time is driven by a `ManualClock`.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use zeroize::Zeroizing;

use lapscache::access::{Actor, Role};
use lapscache::audit::{
    AuditEntry, AuditEvent, AuditFilter, AuditSink, AuditStats, NewAuditEntry, Outcome,
};
use lapscache::clock::ManualClock;
use lapscache::config::{ConfigUpdate, Configuration, SecretUpdate};
use lapscache::crypto::MasterKey;
use lapscache::errors::{LapsError, RemoteError, Result};
use lapscache::remote::{ConnectivityReport, PasswordSource, RemotePassword};
use lapscache::service::PasswordCacheService;
use lapscache::store::{ConfigRepository, CredentialRepository, CredentialStatus, Database};

const API_KEY: &str = "k-SECRET-123";
const PASSWORD: &str = "Xq7!mP2#vL9k";

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

struct FakeState {
    password: std::result::Result<String, RemoteError>,
    expires_at: Option<DateTime<Utc>>,
    probe: std::result::Result<ConnectivityReport, RemoteError>,
    fetch_calls: usize,
    probe_calls: usize,
}

#[derive(Clone)]
struct FakeSource {
    state: Arc<Mutex<FakeState>>,
}

impl FakeSource {
    fn returning(password: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                password: Ok(password.to_string()),
                expires_at: None,
                probe: Ok(ConnectivityReport {
                    endpoint: "https://laps.example.com/test".into(),
                    version: Some("2.1".into()),
                    message: "connection successful (LAPS v2.1)".into(),
                }),
                fetch_calls: 0,
                probe_calls: 0,
            })),
        }
    }

    fn set_password(&self, password: &str) {
        self.state.lock().unwrap().password = Ok(password.to_string());
    }

    fn set_expiry(&self, at: DateTime<Utc>) {
        self.state.lock().unwrap().expires_at = Some(at);
    }

    fn fail_with(&self, err: RemoteError) {
        self.state.lock().unwrap().password = Err(err);
    }

    fn fail_probe_with(&self, err: RemoteError) {
        self.state.lock().unwrap().probe = Err(err);
    }

    fn fetch_calls(&self) -> usize {
        self.state.lock().unwrap().fetch_calls
    }

    fn probe_calls(&self) -> usize {
        self.state.lock().unwrap().probe_calls
    }
}

impl PasswordSource for FakeSource {
    fn fetch_password(
        &self,
        _host: &str,
        _config: &Configuration,
    ) -> std::result::Result<RemotePassword, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.fetch_calls += 1;
        match &state.password {
            Ok(p) => Ok(RemotePassword {
                password: Zeroizing::new(p.clone()),
                expires_at: state.expires_at,
            }),
            Err(e) => Err(e.clone()),
        }
    }

    fn probe(&self, _config: &Configuration) -> std::result::Result<ConnectivityReport, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.probe_calls += 1;
        state.probe.clone()
    }
}

/// An audit sink whose storage is gone.
struct BrokenSink;

impl AuditSink for BrokenSink {
    fn append(&self, _entry: &NewAuditEntry) -> Result<i64> {
        Err(LapsError::Persistence("disk full".into()))
    }
    fn query(&self, _f: &AuditFilter, _l: usize, _o: usize) -> Result<Vec<AuditEntry>> {
        Err(LapsError::Persistence("disk full".into()))
    }
    fn purge_older_than(&self, _cutoff: DateTime<Utc>) -> Result<usize> {
        Err(LapsError::Persistence("disk full".into()))
    }
    fn stats(&self, _s: Option<DateTime<Utc>>, _u: Option<DateTime<Utc>>) -> Result<AuditStats> {
        Err(LapsError::Persistence("disk full".into()))
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn t(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_800_000_000 + secs, 0).unwrap()
}

fn admin() -> Actor {
    Actor::new("alice", Role::Admin)
}

fn master_key() -> MasterKey {
    MasterKey::new([7u8; 32])
}

struct Fixture {
    db: Database,
    remote: FakeSource,
    clock: Arc<ManualClock>,
    service: PasswordCacheService,
}

/// An unconfigured service at t=0.
fn bare() -> Fixture {
    let db = Database::open_in_memory().unwrap();
    let remote = FakeSource::returning(PASSWORD);
    let clock = Arc::new(ManualClock::new(t(0)));
    let service = PasswordCacheService::initialize(&db, remote.clone(), master_key())
        .unwrap()
        .with_clock(clock.clone());
    Fixture {
        db,
        remote,
        clock,
        service,
    }
}

/// A service pointed at a LAPS server with the default TTL of 300 s.
fn configured() -> Fixture {
    let f = bare();
    f.service
        .update_configuration(
            &admin(),
            &ConfigUpdate {
                server_url: Some("https://laps.example.com".into()),
                api_key: SecretUpdate::Replace(Zeroizing::new(API_KEY.into())),
                ..ConfigUpdate::default()
            },
        )
        .unwrap();
    f
}

fn entries_for(service: &PasswordCacheService, host: &str) -> Vec<AuditEntry> {
    let filter = AuditFilter {
        host: Some(host.into()),
        ..AuditFilter::default()
    };
    service.query_audit(&filter, 100, 0).unwrap()
}

fn all_entries(service: &PasswordCacheService) -> Vec<AuditEntry> {
    service.query_audit(&AuditFilter::default(), 1000, 0).unwrap()
}

// ---------------------------------------------------------------------------
// Cache policy
// ---------------------------------------------------------------------------

#[test]
fn absent_entry_fetches_once_and_persists() {
    let f = configured();
    let expiry = t(86_400);
    f.remote.set_expiry(expiry);

    let view = f.service.get_password(&admin(), "PC01", false).unwrap();
    assert_eq!(view.password.as_str(), PASSWORD);
    assert!(!view.from_cache);
    assert_eq!(view.status, CredentialStatus::Fresh);
    assert_eq!(view.expires_at, Some(expiry));
    assert_eq!(f.remote.fetch_calls(), 1);

    let row = f.db.credentials().get("PC01").unwrap().unwrap();
    assert_eq!(row.status, CredentialStatus::Fresh);
    assert_eq!(row.fetched_at, Some(t(0)));
    assert_eq!(row.expires_at, Some(expiry));
    let sealed = row.secret.unwrap();
    assert!(
        !sealed.windows(PASSWORD.len()).any(|w| w == PASSWORD.as_bytes()),
        "password must be stored encrypted"
    );

    let audit = entries_for(&f.service, "PC01");
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].event, AuditEvent::PasswordSync);
    assert_eq!(audit[0].outcome, Outcome::Success);
    assert_eq!(audit[0].actor, "alice");
}

#[test]
fn clock_stepping_back_does_not_extend_freshness() {
    let f = configured();
    f.clock.set(t(1000));
    f.service.get_password(&admin(), "PC01", false).unwrap();

    f.clock.set(t(0));
    let view = f.service.get_password(&admin(), "PC01", true).unwrap();
    let row = f.db.credentials().get("PC01").unwrap().unwrap();
    assert_eq!(view.fetched_at, Some(t(0)));
    assert_eq!(row.fetched_at, view.fetched_at);

    f.clock.set(t(400));
    let view = f.service.get_password(&admin(), "PC01", false).unwrap();
    assert!(!view.from_cache);
    assert_eq!(f.remote.fetch_calls(), 3);
}

#[test]
fn fresh_entry_is_served_without_remote_call() {
    let f = configured();
    f.service.get_password(&admin(), "PC01", false).unwrap();

    f.clock.set(t(100));
    let view = f.service.get_password(&admin(), "PC01", false).unwrap();
    assert!(view.from_cache);
    assert_eq!(view.password.as_str(), PASSWORD);
    assert_eq!(view.fetched_at, Some(t(0)));
    assert_eq!(f.remote.fetch_calls(), 1);

    // A cache hit leaves no audit entry of its own.
    assert_eq!(entries_for(&f.service, "PC01").len(), 1);
}

#[test]
fn ttl_scenario_fetch_cache_fetch() {
    let f = configured();

    f.service.get_password(&admin(), "PC01", false).unwrap();
    assert_eq!(f.remote.fetch_calls(), 1);

    f.clock.set(t(100));
    assert!(f.service.get_password(&admin(), "PC01", false).unwrap().from_cache);
    assert_eq!(f.remote.fetch_calls(), 1);

    f.clock.set(t(400));
    f.remote.set_password("N3w-Pa55!");
    let view = f.service.get_password(&admin(), "PC01", false).unwrap();
    assert!(!view.from_cache);
    assert_eq!(view.password.as_str(), "N3w-Pa55!");
    assert_eq!(f.remote.fetch_calls(), 2);

    let row = f.db.credentials().get("PC01").unwrap().unwrap();
    assert_eq!(row.fetched_at, Some(t(400)));
}

#[test]
fn entry_expires_exactly_at_ttl() {
    let f = configured();
    f.service.get_password(&admin(), "PC01", false).unwrap();

    f.clock.set(t(299));
    f.service.get_password(&admin(), "PC01", false).unwrap();
    assert_eq!(f.remote.fetch_calls(), 1);

    f.clock.set(t(300));
    f.service.get_password(&admin(), "PC01", false).unwrap();
    assert_eq!(f.remote.fetch_calls(), 2);
}

#[test]
fn forced_refresh_always_calls_remote() {
    let f = configured();
    f.service.get_password(&admin(), "PC01", false).unwrap();

    f.clock.set(t(10));
    let view = f.service.get_password(&admin(), "PC01", true).unwrap();
    assert!(!view.from_cache);
    assert_eq!(f.remote.fetch_calls(), 2);

    let audit = entries_for(&f.service, "PC01");
    assert_eq!(audit[0].event, AuditEvent::ManualRefresh);
    assert_eq!(audit[0].outcome, Outcome::Success);
}

#[test]
fn failed_forced_refresh_keeps_previous_password() {
    let f = configured();
    f.remote.set_password("old-pass");
    f.service.get_password(&admin(), "PC01", false).unwrap();

    f.clock.set(t(50));
    f.remote.fail_with(RemoteError::HttpStatus(500));
    let err = f.service.get_password(&admin(), "PC01", true).unwrap_err();
    assert!(matches!(
        err,
        LapsError::RemoteFetchFailed(RemoteError::HttpStatus(500))
    ));

    let row = f.db.credentials().get("PC01").unwrap().unwrap();
    assert_eq!(row.status, CredentialStatus::Error);
    assert_eq!(row.fetched_at, Some(t(0)));
    assert!(row.last_error.as_deref().unwrap().contains("500"));
    assert!(row.secret.is_some());

    // Still inside the TTL of the last good fetch: served from cache.
    f.clock.set(t(60));
    let view = f.service.get_password(&admin(), "PC01", false).unwrap();
    assert!(view.from_cache);
    assert_eq!(view.password.as_str(), "old-pass");
    assert_eq!(view.status, CredentialStatus::Error);
    assert_eq!(f.remote.fetch_calls(), 2);

    let events: Vec<(AuditEvent, Outcome)> = entries_for(&f.service, "PC01")
        .iter()
        .map(|e| (e.event, e.outcome))
        .collect();
    assert!(events.contains(&(AuditEvent::RemoteFetchError, Outcome::Failure)));
    assert!(events.contains(&(AuditEvent::ManualRefresh, Outcome::Failure)));
}

#[test]
fn failed_first_fetch_records_error_row() {
    let f = configured();
    f.remote.fail_with(RemoteError::ConnectionTimeout);

    let err = f.service.get_password(&admin(), "PC09", false).unwrap_err();
    assert_eq!(err.remote_kind(), Some(&RemoteError::ConnectionTimeout));

    let row = f.db.credentials().get("PC09").unwrap().unwrap();
    assert!(row.secret.is_none());
    assert!(row.fetched_at.is_none());
    assert_eq!(row.status, CredentialStatus::Error);

    // No usable secret: the next call goes to the server again.
    f.service.get_password(&admin(), "PC09", false).unwrap_err();
    assert_eq!(f.remote.fetch_calls(), 2);

    let audit = entries_for(&f.service, "PC09");
    assert!(audit
        .iter()
        .all(|e| e.event == AuditEvent::RemoteFetchError && e.outcome == Outcome::Failure));
}

#[test]
fn host_names_are_trimmed_and_validated() {
    let f = configured();
    f.service.get_password(&admin(), "  PC01 ", false).unwrap();
    assert!(f.db.credentials().get("PC01").unwrap().is_some());

    assert!(matches!(
        f.service.get_password(&admin(), "", false),
        Err(LapsError::InvalidHost(_))
    ));
    assert!(matches!(
        f.service.get_password(&admin(), "PC\u{7}01", false),
        Err(LapsError::InvalidHost(_))
    ));
    assert_eq!(f.remote.fetch_calls(), 1);
}

// ---------------------------------------------------------------------------
// Configuration gates
// ---------------------------------------------------------------------------

#[test]
fn unconfigured_service_never_calls_remote() {
    let f = bare();
    assert!(matches!(
        f.service.get_password(&admin(), "PC01", false),
        Err(LapsError::NotConfigured(_))
    ));
    assert_eq!(f.remote.fetch_calls(), 0);
}

#[test]
fn missing_api_key_is_not_configured() {
    let f = configured();
    f.service
        .update_configuration(
            &admin(),
            &ConfigUpdate {
                api_key: SecretUpdate::Clear,
                ..ConfigUpdate::default()
            },
        )
        .unwrap();
    assert!(matches!(
        f.service.get_password(&admin(), "PC01", false),
        Err(LapsError::NotConfigured(_))
    ));
    assert_eq!(f.remote.fetch_calls(), 0);
}

#[test]
fn inactive_integration_refuses() {
    let f = configured();
    f.service.get_password(&admin(), "PC01", false).unwrap();
    f.service
        .update_configuration(
            &admin(),
            &ConfigUpdate {
                is_active: Some(false),
                ..ConfigUpdate::default()
            },
        )
        .unwrap();

    // Even a fresh cached entry is not handed out.
    assert!(matches!(
        f.service.get_password(&admin(), "PC01", false),
        Err(LapsError::Inactive)
    ));
    assert_eq!(f.remote.fetch_calls(), 1);
}

#[test]
fn configured_ttl_is_applied_on_next_call() {
    let f = configured();
    f.service.get_password(&admin(), "PC01", false).unwrap();
    f.service
        .update_configuration(
            &admin(),
            &ConfigUpdate {
                cache_ttl_secs: Some(60),
                ..ConfigUpdate::default()
            },
        )
        .unwrap();

    f.clock.set(t(100));
    f.service.get_password(&admin(), "PC01", false).unwrap();
    assert_eq!(f.remote.fetch_calls(), 2);
}

// ---------------------------------------------------------------------------
// Clear cache
// ---------------------------------------------------------------------------

#[test]
fn clear_cache_is_idempotent() {
    let f = configured();
    f.service.get_password(&admin(), "PC01", false).unwrap();

    assert!(f.service.clear_cache(&admin(), "PC01").unwrap());
    assert!(!f.service.clear_cache(&admin(), "PC01").unwrap());
    assert!(f.db.credentials().get("PC01").unwrap().is_none());

    let clears = entries_for(&f.service, "PC01")
        .into_iter()
        .filter(|e| e.event == AuditEvent::CacheClear)
        .count();
    assert_eq!(clears, 2);

    f.clock.set(t(1));
    assert!(!f.service.get_password(&admin(), "PC01", false).unwrap().from_cache);
    assert_eq!(f.remote.fetch_calls(), 2);
}

// ---------------------------------------------------------------------------
// Redaction
// ---------------------------------------------------------------------------

#[test]
fn audit_details_never_contain_secrets() {
    let f = configured();
    f.service.get_password(&admin(), "PC01", false).unwrap();

    f.clock.set(t(10));
    f.remote.fail_with(RemoteError::Connection(format!(
        "POST https://laps.example.com/api.php?api_key={API_KEY} refused"
    )));
    f.service.get_password(&admin(), "PC01", true).unwrap_err();

    f.remote.fail_with(RemoteError::RemoteRejected(format!(
        "key {API_KEY} is not allowed to read {PASSWORD}"
    )));
    f.service.get_password(&admin(), "PC01", true).unwrap_err();

    f.remote.fail_probe_with(RemoteError::Connection(format!(
        "GET https://laps.example.com/test?api_key={API_KEY}: timed out"
    )));
    f.service
        .test_remote_connectivity(&admin(), &f.service.configuration().unwrap())
        .unwrap_err();

    let entries = all_entries(&f.service);
    assert!(entries.len() >= 5);
    for entry in &entries {
        let detail = entry.detail.as_deref().unwrap_or("");
        assert!(!detail.contains(API_KEY), "API key leaked: {detail}");
        assert!(!detail.contains(PASSWORD), "password leaked: {detail}");
    }

    let row = f.db.credentials().get("PC01").unwrap().unwrap();
    assert!(!row.last_error.unwrap().contains(API_KEY));
}

#[test]
fn config_change_is_audited_with_key_masked() {
    let f = configured();
    let changes: Vec<AuditEntry> = all_entries(&f.service)
        .into_iter()
        .filter(|e| e.event == AuditEvent::ConfigChange)
        .collect();
    assert_eq!(changes.len(), 1);

    let detail = changes[0].detail.as_deref().unwrap();
    assert!(detail.contains("server_url=https://laps.example.com"));
    assert!(detail.contains("api_key=[REDACTED]"));
    assert!(!detail.contains(API_KEY));
}

// ---------------------------------------------------------------------------
// Configuration storage
// ---------------------------------------------------------------------------

#[test]
fn api_key_is_encrypted_at_rest() {
    let f = configured();
    let stored = f.db.config_store().load().unwrap();
    let sealed = stored.api_key.unwrap();
    assert!(!sealed.windows(API_KEY.len()).any(|w| w == API_KEY.as_bytes()));

    let config = f.service.configuration().unwrap();
    assert_eq!(config.api_key.as_deref().map(String::as_str), Some(API_KEY));
}

#[test]
fn invalid_update_is_rejected_and_not_saved() {
    let f = configured();
    let err = f
        .service
        .update_configuration(
            &admin(),
            &ConfigUpdate {
                cache_ttl_secs: Some(5),
                ..ConfigUpdate::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, LapsError::InvalidConfig(_)));
    assert_eq!(f.service.configuration().unwrap().cache_ttl_secs, 300);

    let failures = service_failures(&f.service, AuditEvent::ConfigChange);
    assert_eq!(failures, 1);
}

#[test]
fn unchanged_update_reports_nothing() {
    let f = configured();
    let before = all_entries(&f.service).len();
    let changed = f
        .service
        .update_configuration(
            &admin(),
            &ConfigUpdate {
                cache_ttl_secs: Some(300),
                ..ConfigUpdate::default()
            },
        )
        .unwrap();
    assert!(changed.is_empty());
    assert_eq!(all_entries(&f.service).len(), before);
}

fn service_failures(service: &PasswordCacheService, event: AuditEvent) -> usize {
    let filter = AuditFilter {
        event: Some(event),
        outcome: Some(Outcome::Failure),
        ..AuditFilter::default()
    };
    service.query_audit(&filter, 100, 0).unwrap().len()
}

// ---------------------------------------------------------------------------
// Connectivity test
// ---------------------------------------------------------------------------

#[test]
fn connectivity_test_with_empty_url_is_not_configured() {
    let f = bare();
    let candidate = Configuration {
        api_key: Some(Zeroizing::new(API_KEY.into())),
        ..Configuration::default()
    };
    let err = f
        .service
        .test_remote_connectivity(&admin(), &candidate)
        .unwrap_err();
    assert!(matches!(err, LapsError::NotConfigured(_)));
    assert_eq!(f.remote.probe_calls(), 0);
    assert_eq!(service_failures(&f.service, AuditEvent::ConnectionTest), 1);
}

#[test]
fn connectivity_test_reports_and_audits() {
    let f = configured();
    let report = f
        .service
        .test_remote_connectivity(&admin(), &f.service.configuration().unwrap())
        .unwrap();
    assert_eq!(report.version.as_deref(), Some("2.1"));

    let tests: Vec<AuditEntry> = all_entries(&f.service)
        .into_iter()
        .filter(|e| e.event == AuditEvent::ConnectionTest)
        .collect();
    assert_eq!(tests.len(), 1);
    assert_eq!(tests[0].outcome, Outcome::Success);
    assert!(tests[0].host.is_none());

    // The cache is never touched.
    assert!(f.service.cached_entries().unwrap().is_empty());
    assert_eq!(f.remote.fetch_calls(), 0);
}

#[test]
fn connectivity_test_surfaces_invalid_api_key() {
    let f = configured();
    f.remote.fail_probe_with(RemoteError::InvalidApiKey);
    let err = f
        .service
        .test_remote_connectivity(&admin(), &f.service.configuration().unwrap())
        .unwrap_err();
    assert_eq!(err.remote_kind(), Some(&RemoteError::InvalidApiKey));
}

#[test]
fn connectivity_test_uses_unsaved_candidate() {
    let f = configured();
    let (candidate, _) = ConfigUpdate {
        server_url: Some("ftp://elsewhere".into()),
        ..ConfigUpdate::default()
    }
    .apply(&f.service.configuration().unwrap());

    let err = f
        .service
        .test_remote_connectivity(&admin(), &candidate)
        .unwrap_err();
    assert!(matches!(err, LapsError::InvalidConfig(_)));
    assert_eq!(f.remote.probe_calls(), 0);
    assert_eq!(
        f.service.configuration().unwrap().server_url,
        "https://laps.example.com"
    );
}

// ---------------------------------------------------------------------------
// Audit plumbing
// ---------------------------------------------------------------------------

#[test]
fn broken_audit_sink_does_not_fail_operations() {
    let f = configured();
    let service = PasswordCacheService::open(&f.db, f.remote.clone(), master_key())
        .unwrap()
        .with_audit_sink(BrokenSink);

    let view = service.get_password(&admin(), "PC01", false).unwrap();
    assert_eq!(view.password.as_str(), PASSWORD);
    assert!(service.clear_cache(&admin(), "PC01").unwrap());
    service.record_view(&admin(), "PC01").unwrap();
}

#[test]
fn view_and_copy_are_recorded() {
    let f = configured();
    let viewer = Actor::new("bob", Role::Viewer);
    f.service.record_view(&viewer, "PC01").unwrap();
    f.service.record_copy(&viewer, "PC01").unwrap();

    let audit = entries_for(&f.service, "PC01");
    let events: Vec<AuditEvent> = audit.iter().map(|e| e.event).collect();
    assert!(events.contains(&AuditEvent::View));
    assert!(events.contains(&AuditEvent::Copy));
    assert!(audit.iter().all(|e| e.actor == "bob"));
}

#[test]
fn purge_removes_old_entries_and_records_itself() {
    let f = configured();
    f.service.record_view(&admin(), "PC01").unwrap();

    f.clock.advance(Duration::days(100));
    f.service.record_view(&admin(), "PC02").unwrap();

    let removed = f.service.purge_audit(&admin(), 90).unwrap();
    assert_eq!(removed, 2); // config change + first view

    let left: Vec<AuditEvent> = all_entries(&f.service).iter().map(|e| e.event).collect();
    assert_eq!(left, vec![AuditEvent::AuditPurge, AuditEvent::View]);

    assert!(matches!(
        f.service.purge_audit(&admin(), 0),
        Err(LapsError::InvalidConfig(_))
    ));
}

#[test]
fn purge_with_huge_retention_removes_nothing() {
    let f = configured();
    f.service.record_view(&admin(), "PC01").unwrap();

    let removed = f.service.purge_audit(&admin(), u32::MAX).unwrap();
    assert_eq!(removed, 0);

    let audit = all_entries(&f.service);
    assert_eq!(audit[0].event, AuditEvent::AuditPurge);
    assert_eq!(audit.len(), 3); // config change + view + purge
}

#[test]
fn stats_summarise_activity() {
    let f = configured();
    f.service.get_password(&admin(), "PC01", false).unwrap();
    f.remote.fail_with(RemoteError::HttpStatus(503));
    f.service.get_password(&admin(), "PC02", false).unwrap_err();

    let stats = f.service.audit_stats(None, None).unwrap();
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.successes, 2); // config change + password sync
    assert_eq!(stats.top_actors, vec![("alice".to_string(), 3)]);
}

// ---------------------------------------------------------------------------
// Listing and unlocking
// ---------------------------------------------------------------------------

#[test]
fn cached_entries_report_derived_status() {
    let f = configured();
    f.service.get_password(&admin(), "PC01", false).unwrap();
    f.clock.set(t(200));
    f.service.get_password(&admin(), "PC02", false).unwrap();

    f.clock.set(t(350));
    let entries = f.service.cached_entries().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].host, "PC01");
    assert_eq!(entries[0].status, CredentialStatus::Stale);
    assert_eq!(entries[1].status, CredentialStatus::Fresh);
    assert!(entries.iter().all(|e| e.has_password));
}

#[test]
fn wrong_master_key_is_rejected() {
    let f = configured();
    let result = PasswordCacheService::open(&f.db, f.remote.clone(), MasterKey::new([8u8; 32]));
    assert!(matches!(result, Err(LapsError::WrongMasterKey)));
}

#[test]
fn uninitialized_database_is_rejected() {
    let db = Database::open_in_memory().unwrap();
    let result = PasswordCacheService::open(&db, FakeSource::returning(PASSWORD), master_key());
    assert!(matches!(result, Err(LapsError::NotInitialized(_))));
}

#[test]
fn initialize_twice_is_rejected() {
    let f = bare();
    let result = PasswordCacheService::initialize(&f.db, f.remote.clone(), master_key());
    assert!(matches!(result, Err(LapsError::AlreadyInitialized(_))));
}
