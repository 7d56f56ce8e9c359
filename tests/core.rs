//! Core infrastructure tests.

mod common;

use chrono::{Duration, TimeZone, Utc};
use common::*;
use geni_am::auth::keys;
use geni_am::core::config::{Config, ConfigOverrides};
use geni_am::core::error::{AmError, AuthorizationError, GeniCode};
use geni_am::core::runtime::{load_trust_roots, Runtime};
use geni_am::core::time::{format_timestamp, parse_timestamp, Clock, ManualClock};
use geni_am::protocol::Options;

// ============================================================================
// Config tests
// ============================================================================

#[test]
fn parse_full_config() {
    let file = create_config(
        r#"
[aggregate]
authority = "lab//example"
am_type = "reference"
url = "https://am.lab.example:8443/"

[catalog]
size = 8
resource_type = "pc"

[leases]
allocation_window_seconds = 300
max_lease_days = 30

[listener]
bind = "0.0.0.0:8443"
insecure = true
max_connections = 16
max_frame_bytes = 65536

[credentials.trusted_issuers]
"urn:publicid:IDN+lab:example+authority+sa" = "iojj3XQJ8ZX9UtstPLpdcspnCb8dlBIb83SIAbQPb1w="

[telemetry]
log_level = "debug"
"#,
    );

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.aggregate.authority, "lab//example");
    assert_eq!(config.catalog.size, 8);
    assert!(config.listener.insecure);

    let settings = config.aggregate_settings();
    assert_eq!(settings.am_type, "reference");
    assert_eq!(settings.resource_type, "pc");
    assert_eq!(settings.allocation_window, Duration::seconds(300));
    assert_eq!(settings.max_lease, Duration::days(30));

    let issuers = config.issuer_keys().unwrap();
    assert_eq!(issuers[0].1, issuer_key().verifying_key());

    let server = config.server_config().unwrap();
    assert_eq!(server.bind_addr.port(), 8443);
    assert_eq!(server.max_connections, 16);
    assert_eq!(server.max_frame_bytes, 65536);
}

#[test]
fn parse_partial_config_fills_defaults() {
    let file = create_config("[catalog]\nsize = 10\n");
    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.catalog.size, 10);
    assert_eq!(config.catalog.resource_type, "fakevm");
    assert_eq!(config.leases.max_lease_days, 365);
    assert_eq!(config.url(), "https://127.0.0.1:8001/");
}

#[test]
fn reject_window_longer_than_max_lease() {
    let file = create_config(
        "[leases]\nallocation_window_seconds = 172800\nmax_lease_days = 1\n",
    );
    let result = Config::from_file(file.path());
    assert!(result.is_err());
    assert!(format!("{:#}", result.unwrap_err()).contains("allocation_window_seconds"));
}

#[test]
fn reject_unparseable_toml() {
    let file = create_config("[catalog\nsize = 1");
    assert!(Config::from_file(file.path()).is_err());
}

#[test]
fn reject_missing_trust_roots_dir() {
    let file = create_config("[credentials]\ntrust_roots_dir = \"/nonexistent/roots\"\n");
    assert!(Config::from_file(file.path()).is_err());
}

#[test]
fn overrides_take_precedence() {
    let file = create_config("[listener]\nbind = \"127.0.0.1:9000\"\n");
    let mut config = Config::from_file(file.path()).unwrap();
    config.apply_overrides(&ConfigOverrides {
        log_level: Some("warn".into()),
        bind: Some("127.0.0.1:9100".into()),
    });
    config.validate().unwrap();
    assert_eq!(config.bind_addr().unwrap().port(), 9100);
    assert_eq!(config.telemetry.log_level, "warn");
}

// ============================================================================
// Runtime tests
// ============================================================================

#[tokio::test]
async fn runtime_merges_trust_roots() {
    let roots = tempfile::tempdir().unwrap();
    let issuer_public = issuer_key().verifying_key();
    std::fs::write(
        roots.path().join("lab.txt"),
        format!("{} {}\n", ISSUER, keys::encode_public_key(&issuer_public)),
    )
    .unwrap();

    let mut config = Config::default();
    config.credentials.trust_roots_dir = Some(roots.path().to_path_buf());
    assert_eq!(
        load_trust_roots(roots.path()).unwrap(),
        vec![(ISSUER.to_string(), issuer_public)]
    );

    let clock = std::sync::Arc::new(ManualClock::new(start_time()));
    let mut runtime = Runtime::with_clock(config, clock).unwrap();
    runtime.start_for_tests().await.unwrap();

    let manager = runtime.manager().unwrap();
    let env = manager.list_resources(&alice(), &user_cred(), &geni3_options());
    assert!(env.is_success(), "{}", env.output);

    let env = manager.get_version(&Options::new());
    assert_eq!(env.geni_api, Some(3));
}

#[test]
fn runtime_rejects_invalid_config() {
    let mut config = Config::default();
    config.catalog.size = 0;
    assert!(Runtime::new(config).is_err());
}

// ============================================================================
// Error tests
// ============================================================================

#[test]
fn error_codes() {
    let cases = [
        (AmError::bad_arguments("x"), GeniCode::BadArgs, 1),
        (AmError::bad_version("x"), GeniCode::BadVersion, 4),
        (AmError::server_error("x"), GeniCode::Error, 5),
        (
            AmError::InsufficientResources {
                requested: 4,
                available: 3,
            },
            GeniCode::TooBig,
            6,
        ),
        (AmError::unavailable("s"), GeniCode::Unavailable, 11),
        (AmError::search_failed("s"), GeniCode::SearchFailed, 12),
        (
            AmError::DuplicateSlice {
                slice_urn: "s".into(),
            },
            GeniCode::AlreadyExists,
            17,
        ),
        (AmError::out_of_range("x"), GeniCode::OutOfRange, 19),
        (AmError::internal("x"), GeniCode::GenericFailure, 102),
    ];
    for (err, code, number) in cases {
        assert_eq!(err.geni_code(), code, "{}", err);
        assert_eq!(code.as_i32(), number);
        assert_eq!(GeniCode::from_i32(number), Some(code));
    }
}

#[test]
fn faults_are_only_authorization_and_internal() {
    assert!(AmError::from(AuthorizationError::new("denied")).is_fault());
    assert!(AmError::internal("boom").is_fault());
    assert!(!AmError::search_failed("s").is_fault());
    assert!(!AmError::unavailable("s").is_fault());
}

#[test]
fn error_messages() {
    assert_eq!(
        AmError::unavailable("urn:x").to_string(),
        "Unavailable: Slice urn:x is unavailable."
    );
    assert!(AmError::DuplicateSlice {
        slice_urn: "urn:x".into()
    }
    .to_string()
    .contains("already exists"));
}

// ============================================================================
// Time tests
// ============================================================================

#[test]
fn timestamps_round_trip_with_microseconds() {
    let instant = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
        + Duration::microseconds(250);
    let text = format_timestamp(&instant);
    assert_eq!(text, "2026-10-16T12:00:00.000250Z");
    assert_eq!(parse_timestamp(&text).unwrap(), instant);
}

#[test]
fn timestamps_normalize_offsets() {
    let parsed = parse_timestamp("2026-10-16T14:00:00+02:00").unwrap();
    assert_eq!(parsed, Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap());

    let naive = parse_timestamp("2026-10-16").unwrap();
    assert_eq!(naive, Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap());

    assert!(parse_timestamp("next tuesday").is_err());
}

#[test]
fn manual_clock_moves_only_when_told() {
    let clock = ManualClock::new(start_time());
    assert_eq!(clock.now(), start_time());
    clock.advance(Duration::seconds(90));
    assert_eq!(clock.now(), start_time() + Duration::seconds(90));
    clock.set(start_time());
    assert_eq!(clock.now(), start_time());
}
