//! Integration tests for the crawl pipeline
//!
//! These tests use wiremock to stand in for both the feed source and the
//! media hosts, and a fake extractor in place of the external tool.

mod common;

use common::{
    create_test_config, file_names, link_post, listing, media_bytes, video_post, FakeExtractor,
    FirstPage, FEED_PATH, TARGET,
};
use feed_harvest::config::Config;
use feed_harvest::crawler::{ExtractionOutcome, Pipeline, StopReason, VideoExtractor};
use feed_harvest::output::read_stats_file;
use feed_harvest::storage::JobOutcome;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JOB: &str = "job_test";

fn pipeline(config: Config, extractor: Arc<dyn VideoExtractor>) -> Pipeline {
    Pipeline::new(Arc::new(config), extractor).expect("pipeline")
}

async fn mount_first_page(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .and(FirstPage)
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_media(server: &MockServer, media_path: &str, body: Vec<u8>, mime: &str) {
    Mock::given(method("GET"))
        .and(path(media_path))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, mime))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_single_image_downloaded() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();
    let uri = server.uri();

    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .and(query_param("limit", "100"))
        .and(header("user-agent", "TestHarvester/1.0"))
        .and(FirstPage)
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(
            vec![link_post("p1", &format!("{}/media/cat.jpg", uri))],
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;
    mount_media(&server, "/media/cat.jpg", media_bytes(20_000), "image/jpeg").await;

    let config = create_test_config(&uri, root.path());
    let jobs = config.jobs.clone();
    let report = pipeline(config, Arc::new(FakeExtractor::writing_file()))
        .run(TARGET, JOB, CancellationToken::new())
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.stats.images(), 1);
    assert_eq!(report.stats.files_downloaded(), 1);
    assert!(report.stats.is_finished());
    assert_eq!(report.stop_reason, Some(StopReason::EndOfFeed));
    assert_eq!(report.job_outcome(), JobOutcome::Completed);

    let images = jobs.job_media_dir(JOB).join("images");
    assert_eq!(file_names(&images), vec!["cat.jpg".to_string()]);
    assert_eq!(std::fs::metadata(images.join("cat.jpg")).unwrap().len(), 20_000);

    let written = read_stats_file(&jobs.stats_path(JOB)).unwrap().unwrap();
    assert_eq!(written, report.stats);
}

#[tokio::test]
async fn test_content_type_mismatch_yields_nothing() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();
    let uri = server.uri();

    mount_first_page(
        &server,
        listing(vec![link_post("p1", &format!("{}/media/page.jpg", uri))], None),
    )
    .await;
    mount_media(&server, "/media/page.jpg", media_bytes(20_000), "text/html").await;

    let config = create_test_config(&uri, root.path());
    let jobs = config.jobs.clone();
    let report = pipeline(config, Arc::new(FakeExtractor::writing_file()))
        .run(TARGET, JOB, CancellationToken::new())
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.stats.files_downloaded(), 0);
    assert_eq!(report.tally.skipped, 1);
    assert_eq!(
        report.job_outcome().error(),
        Some("no valid media downloaded")
    );
    assert!(file_names(&jobs.job_media_dir(JOB).join("images")).is_empty());
}

#[tokio::test]
async fn test_feed_error_ends_run_with_stats_file() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), root.path());
    let jobs = config.jobs.clone();
    let report = pipeline(config, Arc::new(FakeExtractor::writing_file()))
        .run(TARGET, JOB, CancellationToken::new())
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.pages, 0);
    assert!(matches!(report.stop_reason, Some(StopReason::SourceError(_))));

    let written = read_stats_file(&jobs.stats_path(JOB)).unwrap().unwrap();
    assert_eq!(written.files_downloaded(), 0);
    assert!(written.is_finished());
}

#[tokio::test]
async fn test_empty_pages_stop_the_walk() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();
    let uri = server.uri();

    mount_first_page(
        &server,
        listing(vec![link_post("p1", &format!("{}/media/a.png", uri))], Some("t3_p1")),
    )
    .await;

    // An empty page without a cursor is requested again with the same cursor
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .and(query_param("after", "t3_p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(vec![], None)))
        .expect(3)
        .mount(&server)
        .await;
    mount_media(&server, "/media/a.png", media_bytes(10_000), "image/png").await;

    let config = create_test_config(&uri, root.path());
    let report = pipeline(config, Arc::new(FakeExtractor::writing_file()))
        .run(TARGET, JOB, CancellationToken::new())
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.pages, 4);
    assert_eq!(report.stop_reason, Some(StopReason::EmptyPageLimit(3)));
}

#[tokio::test]
async fn test_cursor_pagination() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();
    let uri = server.uri();

    mount_first_page(
        &server,
        listing(vec![link_post("p1", &format!("{}/media/one.jpg", uri))], Some("t3_p1")),
    )
    .await;
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .and(query_param("after", "t3_p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(
            vec![link_post("p2", &format!("{}/media/two.gif", uri))],
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;
    mount_media(&server, "/media/one.jpg", media_bytes(9_000), "image/jpeg").await;
    mount_media(&server, "/media/two.gif", media_bytes(9_000), "image/gif").await;

    let config = create_test_config(&uri, root.path());
    let jobs = config.jobs.clone();
    let report = pipeline(config, Arc::new(FakeExtractor::writing_file()))
        .run(TARGET, JOB, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.pages, 2);
    assert_eq!(report.stats.images(), 1);
    assert_eq!(report.stats.gifs(), 1);
    assert_eq!(report.stop_reason, Some(StopReason::EndOfFeed));
    assert_eq!(
        file_names(&jobs.job_media_dir(JOB).join("gifs")),
        vec!["two.gif".to_string()]
    );
}

#[tokio::test]
async fn test_duplicate_urls_fetched_once() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();
    let uri = server.uri();
    let media = format!("{}/media/same.jpg", uri);

    mount_first_page(
        &server,
        listing(
            vec![
                link_post("p1", &media),
                link_post("p2", &format!("{}?width=640", media)),
            ],
            None,
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/media/same.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(media_bytes(9_000), "image/jpeg"))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&uri, root.path());
    let report = pipeline(config, Arc::new(FakeExtractor::writing_file()))
        .run(TARGET, JOB, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.stats.images(), 1);
    assert_eq!(report.tally.succeeded, 1);
    assert_eq!(report.tally.skipped, 1);
}

#[tokio::test]
async fn test_small_body_discarded() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();
    let uri = server.uri();

    mount_first_page(
        &server,
        listing(vec![link_post("p1", &format!("{}/media/tiny.jpg", uri))], None),
    )
    .await;
    mount_media(&server, "/media/tiny.jpg", media_bytes(1_000), "image/jpeg").await;

    let config = create_test_config(&uri, root.path());
    let jobs = config.jobs.clone();
    let report = pipeline(config, Arc::new(FakeExtractor::writing_file()))
        .run(TARGET, JOB, CancellationToken::new())
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.tally.succeeded, 0);
    assert!(file_names(&jobs.job_media_dir(JOB).join("images")).is_empty());
}

#[tokio::test]
async fn test_existing_file_not_fetched_again() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();
    let uri = server.uri();

    mount_first_page(
        &server,
        listing(vec![link_post("p1", &format!("{}/media/kept.jpg", uri))], None),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/media/kept.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(media_bytes(9_000), "image/jpeg"))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&uri, root.path());
    let images = config.jobs.job_media_dir(JOB).join("images");
    std::fs::create_dir_all(&images).unwrap();
    std::fs::write(images.join("kept.jpg"), media_bytes(9_000)).unwrap();

    let report = pipeline(config, Arc::new(FakeExtractor::writing_file()))
        .run(TARGET, JOB, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.stats.files_downloaded(), 0);
    assert_eq!(report.tally.skipped, 1);
}

#[tokio::test]
async fn test_video_delegated_to_extractor() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();
    let uri = server.uri();
    let fallback = format!("{}/video/v1/DASH_720.mp4", uri);

    mount_first_page(
        &server,
        listing(vec![video_post("v1", &format!("{}?source=fallback", fallback))], None),
    )
    .await;

    let extractor = Arc::new(FakeExtractor::writing_file());
    let config = create_test_config(&uri, root.path());
    let jobs = config.jobs.clone();
    let report = pipeline(config, extractor.clone())
        .run(TARGET, JOB, CancellationToken::new())
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.stats.videos(), 1);
    assert_eq!(extractor.urls(), vec![fallback]);
    assert_eq!(
        file_names(&jobs.job_media_dir(JOB).join("videos")),
        vec!["video_0.mp4".to_string()]
    );
}

#[tokio::test]
async fn test_extractor_without_output_is_a_failure() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();
    let uri = server.uri();

    mount_first_page(
        &server,
        listing(vec![video_post("v1", &format!("{}/video/v1.mp4", uri))], None),
    )
    .await;

    let extractor = Arc::new(FakeExtractor::silent_success());
    let config = create_test_config(&uri, root.path());
    let report = pipeline(config, extractor.clone())
        .run(TARGET, JOB, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(extractor.calls(), 1);
    assert_eq!(report.stats.videos(), 0);
    assert_eq!(report.tally.failed, 1);
    assert!(!report.success);
}

#[tokio::test]
async fn test_extractor_exit_status_trusted_without_verification() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();
    let uri = server.uri();

    mount_first_page(
        &server,
        listing(vec![video_post("v1", &format!("{}/video/v1.mp4", uri))], None),
    )
    .await;

    let mut config = create_test_config(&uri, root.path());
    config.extractor.verify_output = false;
    let report = pipeline(config, Arc::new(FakeExtractor::silent_success()))
        .run(TARGET, JOB, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.stats.videos(), 1);
    assert!(report.success);
}

#[tokio::test]
async fn test_cancelled_before_first_page() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(vec![], None)))
        .expect(0)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let config = create_test_config(&server.uri(), root.path());
    let jobs = config.jobs.clone();
    let report = pipeline(config, Arc::new(FakeExtractor::writing_file()))
        .run(TARGET, JOB, cancel)
        .await
        .unwrap();

    assert_eq!(report.pages, 0);
    assert_eq!(report.stop_reason, Some(StopReason::Cancelled));
    assert!(jobs.stats_path(JOB).exists());
}

async fn run_with_failing_extractor(outcome: ExtractionOutcome) {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();
    let uri = server.uri();

    mount_first_page(
        &server,
        listing(
            vec![
                video_post("v1", &format!("{}/video/v1.mp4", uri)),
                link_post("p2", &format!("{}/media/after.jpg", uri)),
            ],
            None,
        ),
    )
    .await;
    mount_media(&server, "/media/after.jpg", media_bytes(9_000), "image/jpeg").await;

    let extractor = Arc::new(FakeExtractor::failing(outcome));
    let config = create_test_config(&uri, root.path());
    let jobs = config.jobs.clone();
    let report = pipeline(config, extractor.clone())
        .run(TARGET, JOB, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(extractor.calls(), 1);
    assert_eq!(report.stats.videos(), 0);
    assert_eq!(report.stats.images(), 1);
    assert_eq!(report.tally.failed, 1);
    assert_eq!(report.stop_reason, Some(StopReason::EndOfFeed));
    assert_eq!(
        file_names(&jobs.job_media_dir(JOB).join("images")),
        vec!["after.jpg".to_string()]
    );
}

#[tokio::test]
async fn test_extractor_exit_code_does_not_end_walk() {
    run_with_failing_extractor(ExtractionOutcome::NonZeroExit(Some(1))).await;
}

#[tokio::test]
async fn test_extractor_timeout_does_not_end_walk() {
    run_with_failing_extractor(ExtractionOutcome::TimedOut).await;
}

#[tokio::test]
async fn test_gallery_items_downloaded() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();
    let uri = server.uri();

    let gallery = json!({
        "id": "g1",
        "is_video": false,
        "url": "https://www.reddit.com/gallery/g1",
        "media_metadata": {
            "a1": {"s": {"u": format!("{}/gallery/first.jpg?width=1080&amp;s=abc", uri)}},
            "b2": {"s": {"u": format!("{}/gallery/second.png?width=640&amp;s=def", uri)}}
        }
    });
    mount_first_page(&server, listing(vec![gallery], None)).await;
    mount_media(&server, "/gallery/first.jpg", media_bytes(9_000), "image/jpeg").await;
    mount_media(&server, "/gallery/second.png", media_bytes(9_000), "image/png").await;

    let config = create_test_config(&uri, root.path());
    let jobs = config.jobs.clone();
    let report = pipeline(config, Arc::new(FakeExtractor::writing_file()))
        .run(TARGET, JOB, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.stats.images(), 2);
    assert_eq!(
        file_names(&jobs.job_media_dir(JOB).join("images")),
        vec!["first.jpg".to_string(), "second.png".to_string()]
    );
}

#[tokio::test]
async fn test_idle_timeout_ends_walk() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    // An endless feed whose posts never carry media
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(
            vec![link_post("p1", "https://example.com/comments/p1")],
            Some("t3_next"),
        )))
        .mount(&server)
        .await;

    let mut config = create_test_config(&server.uri(), root.path());
    config.feed.page_delay_ms = 100;
    config.stop.idle_timeout_secs = Some(1);

    let report = tokio::time::timeout(
        std::time::Duration::from_secs(10),
        pipeline(config, Arc::new(FakeExtractor::writing_file())).run(
            TARGET,
            JOB,
            CancellationToken::new(),
        ),
    )
    .await
    .expect("walk should stop on its own")
    .unwrap();

    assert!(matches!(report.stop_reason, Some(StopReason::IdleTimeout(_))));
    assert!(report.pages >= 2);
    assert!(!report.success);
}
