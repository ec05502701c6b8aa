//! End-to-end pipeline tests against mock archive endpoints.
//!
//! Each test spins up mockito servers for the mirror/archive endpoints and a
//! throwaway cache directory, then drives the public `get_data` entry point.

use airlog_core::config::{ColumnSpec, EndpointConfig, PipelineConfig};
use airlog_core::fingerprint::series_fingerprint;
use airlog_core::pipeline::{get_data, PipelineError};
use chrono::NaiveDate;
use tempfile::TempDir;

const SUFFIX: &str = "sds011_sensor_3659.csv";

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn day_path(d: &str) -> String {
    format!("/{d}/{d}_{SUFFIX}")
}

fn day_body(d: &str) -> String {
    format!(
        "sensor_id;sensor_type;location;lat;lon;timestamp;P1;durP1;ratioP1;P2;durP2;ratioP2\n\
         3659;SDS011;1847;48.800;9.003;{d}T00:00:00;10.00;;;5.00;;\n\
         3659;SDS011;1847;48.800;9.003;{d}T00:05:00;12.00;;;6.00;;\n"
    )
}

fn config(cache: &TempDir, archive_url: String, mirror_url: Option<String>) -> PipelineConfig {
    PipelineConfig {
        archive: EndpointConfig {
            base_url: archive_url,
            accept_invalid_certs: false,
        },
        mirror: mirror_url.map(|base_url| EndpointConfig {
            base_url,
            accept_invalid_certs: false,
        }),
        sensor_csv_suffix: SUFFIX.into(),
        columns: vec![
            ColumnSpec { source: "timestamp".into(), target: None },
            ColumnSpec { source: "P1".into(), target: Some("PM10".into()) },
            ColumnSpec { source: "P2".into(), target: Some("PM2.5".into()) },
        ],
        timestamp_column: "timestamp".into(),
        cache_dir: cache.path().join("archive"),
        first_transmission_date: None,
        resample_minutes: 5,
        request_timeout_secs: 5,
    }
}

#[test]
fn multi_day_run_produces_a_normalized_series() {
    let cache = TempDir::new().unwrap();
    let mut server = mockito::Server::new();
    let m1 = server
        .mock("GET", day_path("2020-03-08").as_str())
        .with_body(day_body("2020-03-08"))
        .create();
    let m2 = server
        .mock("GET", day_path("2020-03-09").as_str())
        .with_body(day_body("2020-03-09"))
        .create();

    let cfg = config(&cache, server.url(), None);
    let series = get_data(date("2020-03-10"), date("2020-03-09"), &cfg, 2, 0.0).unwrap();

    m1.assert();
    m2.assert();
    assert_eq!(series.columns(), ["PM10", "PM2.5"]);
    assert!(series.is_strictly_increasing());
    assert_eq!(
        series.first_ts().unwrap(),
        date("2020-03-08").and_hms_opt(0, 0, 0).unwrap()
    );
    assert_eq!(
        series.last_ts().unwrap(),
        date("2020-03-09").and_hms_opt(0, 5, 0).unwrap()
    );
    // Real samples survive; the overnight gap is carried forward.
    assert_eq!(series.rows()[0].values, [10.0, 5.0]);
    assert_eq!(series.rows()[1].values, [12.0, 6.0]);
    let noon_gap = &series.rows()[series.len() / 2];
    assert_eq!(noon_gap.values, [12.0, 6.0]);
}

#[test]
fn warm_cache_rerun_is_byte_identical() {
    let cache = TempDir::new().unwrap();
    let mut server = mockito::Server::new();
    // The non-trailing day must be fetched exactly once across both runs;
    // the trailing day is re-fetched on every run.
    let m1 = server
        .mock("GET", day_path("2020-03-08").as_str())
        .with_body(day_body("2020-03-08"))
        .expect(1)
        .create();
    let m2 = server
        .mock("GET", day_path("2020-03-09").as_str())
        .with_body(day_body("2020-03-09"))
        .expect(2)
        .create();

    let cfg = config(&cache, server.url(), None);
    let first = get_data(date("2020-03-10"), date("2020-03-09"), &cfg, 2, 0.2).unwrap();
    let second = get_data(date("2020-03-10"), date("2020-03-09"), &cfg, 2, 0.2).unwrap();

    m1.assert();
    m2.assert();
    assert_eq!(series_fingerprint(&first), series_fingerprint(&second));
}

#[test]
fn mirror_error_page_is_bypassed_and_never_cached() {
    let cache = TempDir::new().unwrap();
    let mut mirror = mockito::Server::new();
    let mut archive = mockito::Server::new();
    let _mirror_mock = mirror
        .mock("GET", day_path("2020-03-08").as_str())
        .with_body("<html><body>offline for maintenance</body></html>")
        .create();
    let _archive_mock = archive
        .mock("GET", day_path("2020-03-08").as_str())
        .with_body(day_body("2020-03-08"))
        .create();
    // Trailing day served by both so the run completes.
    let _mirror_trailing = mirror
        .mock("GET", day_path("2020-03-09").as_str())
        .with_body(day_body("2020-03-09"))
        .create();

    let cfg = config(&cache, archive.url(), Some(mirror.url()));
    let series = get_data(date("2020-03-10"), date("2020-03-09"), &cfg, 2, 0.0).unwrap();
    assert!(!series.is_empty());

    let cached = std::fs::read_to_string(
        cfg.cache_dir
            .join("2020-03-08")
            .join(format!("2020-03-08_{SUFFIX}")),
    )
    .unwrap();
    assert!(!cached.contains('<'), "HTML error page must never be cached");
    assert_eq!(cached, day_body("2020-03-08"));
}

#[test]
fn days_before_first_transmission_are_never_requested() {
    let cache = TempDir::new().unwrap();
    let mut server = mockito::Server::new();
    let early = server
        .mock("GET", day_path("2020-02-28").as_str())
        .expect(0)
        .create();
    let early2 = server
        .mock("GET", day_path("2020-02-29").as_str())
        .expect(0)
        .create();
    let m1 = server
        .mock("GET", day_path("2020-03-01").as_str())
        .with_body(day_body("2020-03-01"))
        .create();
    let m2 = server
        .mock("GET", day_path("2020-03-02").as_str())
        .with_body(day_body("2020-03-02"))
        .create();

    let mut cfg = config(&cache, server.url(), None);
    cfg.first_transmission_date = Some(date("2020-03-01"));

    let series = get_data(date("2020-03-03"), date("2020-03-02"), &cfg, 4, 0.0).unwrap();

    early.assert();
    early2.assert();
    m1.assert();
    m2.assert();
    assert_eq!(
        series.first_ts().unwrap(),
        date("2020-03-01").and_hms_opt(0, 0, 0).unwrap()
    );
}

#[test]
fn failed_day_is_skipped_not_fatal() {
    let cache = TempDir::new().unwrap();
    let mut server = mockito::Server::new();
    let _m1 = server
        .mock("GET", day_path("2020-03-07").as_str())
        .with_body(day_body("2020-03-07"))
        .create();
    let _gone = server
        .mock("GET", day_path("2020-03-08").as_str())
        .with_status(404)
        .create();
    let _m3 = server
        .mock("GET", day_path("2020-03-09").as_str())
        .with_body(day_body("2020-03-09"))
        .create();

    let cfg = config(&cache, server.url(), None);
    let series = get_data(date("2020-03-10"), date("2020-03-09"), &cfg, 3, 0.0).unwrap();

    assert_eq!(
        series.first_ts().unwrap(),
        date("2020-03-07").and_hms_opt(0, 0, 0).unwrap()
    );
    assert_eq!(
        series.last_ts().unwrap(),
        date("2020-03-09").and_hms_opt(0, 5, 0).unwrap()
    );
}

#[test]
fn missing_whitelisted_column_aborts_the_run() {
    let cache = TempDir::new().unwrap();
    let mut server = mockito::Server::new();
    let _m1 = server
        .mock("GET", day_path("2020-03-08").as_str())
        .with_body("timestamp;P2\n2020-03-08T00:00:00;5.0\n")
        .create();

    let cfg = config(&cache, server.url(), None);
    let err = get_data(date("2020-03-10"), date("2020-03-09"), &cfg, 2, 0.0).unwrap_err();

    match err {
        PipelineError::Schema { column, day } => {
            assert_eq!(column, "P1");
            assert_eq!(day.to_string(), "2020-03-08");
        }
        other => panic!("expected schema abort, got {other:?}"),
    }
}

#[test]
fn range_with_no_usable_day_is_a_terminal_error() {
    let cache = TempDir::new().unwrap();
    let mut server = mockito::Server::new();
    let _any = server
        .mock("GET", mockito::Matcher::Any)
        .with_status(503)
        .with_body("<html>try later</html>")
        .create();

    let cfg = config(&cache, server.url(), None);
    let err = get_data(date("2020-03-10"), date("2020-03-09"), &cfg, 2, 0.0).unwrap_err();
    assert!(matches!(err, PipelineError::EmptyRange { .. }));
}
