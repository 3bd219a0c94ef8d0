//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and drive the real
//! HTTP fetcher through complete listing and details runs.

use orgsweep::config::{
    Config, CrawlerConfig, DetailsConfig, ListingConfig, OutputConfig, OutputFormat, RetryConfig,
    UserAgentConfig,
};
use orgsweep::crawler::jobs::{details_job, listing_sink};
use orgsweep::crawler::{run_details, run_listing, HaltReason, ResumeOptions};
use orgsweep::output::{OrganizationDetail, OrganizationSummary, Record};
use orgsweep::storage::{CheckpointStore, FileCheckpointStore};
use orgsweep::{CrawlState, WorkUnit};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, dir: &Path, last_page: u64, format: OutputFormat) -> Config {
    let file = |name: &str| dir.join(name).to_string_lossy().into_owned();
    let (listing_output, details_output) = match format {
        OutputFormat::Csv => (file("orgs.csv"), file("details.csv")),
        OutputFormat::Sqlite => (file("orgs.db"), file("orgs.db")),
    };

    Config {
        crawler: CrawlerConfig {
            politeness_delay_ms: 1, // Very short for testing
            request_timeout_secs: 5,
            progress_interval: 1,
        },
        retry: RetryConfig {
            max_attempts: 3,
            backoff_ms: vec![5, 10, 20],
            rate_limit_wait_ms: 5,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig { format },
        listing: ListingConfig {
            base_url: format!("{}/organizations", base_url),
            page_param: "p".to_string(),
            first_page: 0,
            last_page,
            output: listing_output,
            checkpoint: file("listing.checkpoint.json"),
        },
        details: Some(DetailsConfig {
            output: details_output,
            checkpoint: file("details.checkpoint.json"),
        }),
    }
}

fn listing_page(cards: &[(&str, &str)]) -> String {
    let cards: String = cards
        .iter()
        .map(|(slug, name)| format!(r#"<a href="/{}">{} • 12 followers</a>"#, slug, name))
        .collect();
    format!("<html><body>{}</body></html>", cards)
}

async fn mount_page(server: &MockServer, page: u64, body: String) {
    Mock::given(method("GET"))
        .and(path("/organizations"))
        .and(query_param("p", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Pages 0..=2: page 0 lists Acme, page 1 fails twice then is empty, page 2 lists Beta
async fn mount_scenario(server: &MockServer) {
    mount_page(server, 0, listing_page(&[("acme", "Acme")])).await;

    Mock::given(method("GET"))
        .and(path("/organizations"))
        .and(query_param("p", "1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(server)
        .await;
    mount_page(server, 1, listing_page(&[])).await;

    mount_page(server, 2, listing_page(&[("beta", "Beta")])).await;
}

fn listing_rows(config: &Config) -> Vec<Record<OrganizationSummary>> {
    listing_sink(config).read_records().unwrap()
}

fn listing_checkpoint(config: &Config) -> Option<WorkUnit> {
    FileCheckpointStore::new(&config.listing.checkpoint, "listing", None)
        .load()
        .unwrap()
}

fn expected_scenario_rows(base_url: &str) -> Vec<Record<OrganizationSummary>> {
    vec![
        Record::new(
            WorkUnit(0),
            OrganizationSummary::new("Acme", format!("{}/acme", base_url)),
        ),
        Record::new(
            WorkUnit(2),
            OrganizationSummary::new("Beta", format!("{}/beta", base_url)),
        ),
    ]
}

#[tokio::test]
async fn test_listing_survives_transient_failures() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_scenario(&mock_server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&base_url, dir.path(), 2, OutputFormat::Csv);

    let report = run_listing(
        &config,
        Some("hash"),
        &ResumeOptions::default(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.state, CrawlState::Completed);
    assert_eq!(report.units_completed, 3);
    assert_eq!(report.records_written, 2);
    assert_eq!(listing_rows(&config), expected_scenario_rows(&base_url));
    assert_eq!(listing_checkpoint(&config), Some(WorkUnit(2)));

    // Page 1 was requested three times, the others once each.
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 5);
    for request in &requests {
        let agent = request.headers.get("user-agent").unwrap().to_str().unwrap();
        assert!(agent.starts_with("TestBot/1.0.0"));
    }
}

#[tokio::test]
async fn test_listing_halts_and_resumes_at_failed_page() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, 0, listing_page(&[("acme", "Acme")])).await;
    Mock::given(method("GET"))
        .and(path("/organizations"))
        .and(query_param("p", "1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&base_url, dir.path(), 2, OutputFormat::Csv);

    let report = run_listing(
        &config,
        None,
        &ResumeOptions::default(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.state, CrawlState::Halted);
    assert_eq!(
        report.halt,
        Some(HaltReason::FetchGaveUp {
            unit: WorkUnit(1),
            reason: "HTTP 500".to_string()
        })
    );
    assert_eq!(listing_checkpoint(&config), Some(WorkUnit(0)));
    assert_eq!(listing_rows(&config).len(), 1);

    // The server recovers; the next run starts at page 1 and never refetches page 0.
    mock_server.reset().await;
    mount_scenario(&mock_server).await;

    let report = run_listing(
        &config,
        None,
        &ResumeOptions::default(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.state, CrawlState::Completed);
    assert_eq!(report.first_unit, WorkUnit(1));
    assert_eq!(listing_rows(&config), expected_scenario_rows(&base_url));

    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests
        .iter()
        .all(|r| r.url.query() != Some("p=0")));
}

#[tokio::test]
async fn test_partial_rows_of_crashed_page_are_discarded() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_scenario(&mock_server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&base_url, dir.path(), 2, OutputFormat::Csv);

    let first = run_listing(
        &config,
        None,
        &ResumeOptions {
            end: Some(0),
            ..Default::default()
        },
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(first.last_completed, Some(WorkUnit(0)));

    // A crash mid-write of page 1: one complete row and one torn row, no checkpoint.
    let mut file = OpenOptions::new()
        .append(true)
        .open(&config.listing.output)
        .unwrap();
    write!(file, "1,Ghost,http://ghost.example/\n2,Torn").unwrap();
    drop(file);

    let report = run_listing(
        &config,
        None,
        &ResumeOptions::default(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.state, CrawlState::Completed);
    assert_eq!(report.first_unit, WorkUnit(1));
    assert_eq!(listing_rows(&config), expected_scenario_rows(&base_url));
}

#[tokio::test]
async fn test_rows_without_checkpoint_refuse_to_run() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_scenario(&mock_server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&base_url, dir.path(), 2, OutputFormat::Csv);

    run_listing(&config, None, &ResumeOptions::default(), CancellationToken::new())
        .await
        .unwrap();
    std::fs::remove_file(&config.listing.checkpoint).unwrap();

    let err = run_listing(&config, None, &ResumeOptions::default(), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, orgsweep::SweepError::OutputConflict { rows: 2, .. }));

    // --reset starts over from page 0.
    let report = run_listing(
        &config,
        None,
        &ResumeOptions {
            reset: true,
            ..Default::default()
        },
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(report.first_unit, WorkUnit(0));
    assert_eq!(listing_rows(&config).len(), 2);
}

#[tokio::test]
async fn test_rate_limit_does_not_use_attempts() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/organizations"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(5)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, 0, listing_page(&[("acme", "Acme")])).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&base_url, dir.path(), 0, OutputFormat::Csv);

    let report = run_listing(&config, None, &ResumeOptions::default(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.state, CrawlState::Completed);
    assert_eq!(listing_rows(&config).len(), 1);
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 6);
}

#[tokio::test]
async fn test_details_record_failed_pages_and_continue() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_page(
        &mock_server,
        0,
        listing_page(&[("acme", "Acme"), ("beta", "Beta"), ("gamma", "Gamma")]),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/acme"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head><meta name="description" content="We build rockets."></head>
               <body><a href="https://github.com/acme">GitHub</a></body></html>"#,
        ))
        .mount(&mock_server)
        .await;
    // /beta is not mounted: wiremock answers 404 every time.
    Mock::given(method("GET"))
        .and(path("/gamma"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&base_url, dir.path(), 0, OutputFormat::Csv);

    run_listing(&config, None, &ResumeOptions::default(), CancellationToken::new())
        .await
        .unwrap();

    let report = run_details(&config, None, &ResumeOptions::default(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.state, CrawlState::Completed);
    assert_eq!(report.units_completed, 3);
    assert_eq!(report.soft_failures, 1);

    let job = details_job(&config, None).unwrap();
    let rows = job.sink.read_records().unwrap();
    let details: Vec<&OrganizationDetail> = rows.iter().map(|r| &r.data).collect();
    let units: Vec<u64> = rows.iter().map(|r| r.unit.index()).collect();
    assert_eq!(units, vec![0, 1, 2]);

    assert_eq!(details[0].organization_name, "Acme");
    assert_eq!(details[0].github_links, vec!["https://github.com/acme".to_string()]);
    assert_eq!(details[0].description.as_deref(), Some("We build rockets."));
    assert_eq!(details[0].scrape_status, OrganizationDetail::STATUS_SUCCESS);

    assert_eq!(details[1].organization_name, "Beta");
    assert_eq!(
        details[1].scrape_status,
        OrganizationDetail::STATUS_FAILED_AFTER_RETRIES
    );
    assert!(details[1].github_links.is_empty());

    assert_eq!(details[2].scrape_status, OrganizationDetail::STATUS_SUCCESS);
    assert_eq!(job.checkpoint.load().unwrap(), Some(WorkUnit(2)));

    let stats = job.statistics().unwrap();
    assert_eq!(stats.total_rows, 3);
    assert_eq!(stats.rows_by_status.get("success"), Some(&2));
    assert_eq!(stats.rows_by_status.get("failed_after_retries"), Some(&1));
}

#[tokio::test]
async fn test_sqlite_jobs_share_one_database() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_scenario(&mock_server).await;
    for slug in ["acme", "beta"] {
        Mock::given(method("GET"))
            .and(path(format!("/{}", slug)))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&mock_server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&base_url, dir.path(), 2, OutputFormat::Sqlite);

    let listing = run_listing(&config, None, &ResumeOptions::default(), CancellationToken::new())
        .await
        .unwrap();
    assert!(listing.is_complete());
    assert_eq!(listing_rows(&config), expected_scenario_rows(&base_url));

    let details = run_details(&config, None, &ResumeOptions::default(), CancellationToken::new())
        .await
        .unwrap();
    assert!(details.is_complete());
    assert_eq!(details.units_completed, 2);

    // Running again finds nothing to do.
    let again = run_details(&config, None, &ResumeOptions::default(), CancellationToken::new())
        .await
        .unwrap();
    assert!(again.is_complete());
    assert_eq!(again.units_completed, 0);

    let job = details_job(&config, None).unwrap();
    assert_eq!(job.sink.read_records().unwrap().len(), 2);
    assert_eq!(listing_rows(&config).len(), 2);
}

#[tokio::test]
async fn test_cancelled_run_keeps_completed_pages() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_scenario(&mock_server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&base_url, dir.path(), 2, OutputFormat::Csv);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = run_listing(&config, None, &ResumeOptions::default(), cancel)
        .await
        .unwrap();

    assert_eq!(report.state, CrawlState::Halted);
    assert_eq!(report.halt, Some(HaltReason::Interrupted { unit: WorkUnit(0) }));
    assert_eq!(listing_checkpoint(&config), None);
    assert!(mock_server.received_requests().await.unwrap().is_empty());

    // The header-only output is picked up by the next run.
    let report = run_listing(&config, None, &ResumeOptions::default(), CancellationToken::new())
        .await
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(listing_rows(&config), expected_scenario_rows(&base_url));
}
