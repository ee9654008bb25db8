//! Integration tests for the job scheduler
//!
//! Jobs run the real pipeline against a wiremock feed; the extractor is faked.

mod common;

use common::{
    create_test_config, link_post, listing, media_bytes, FakeExtractor, FEED_PATH, TARGET,
};
use feed_harvest::config::Config;
use feed_harvest::crawler::Pipeline;
use feed_harvest::jobs::JobScheduler;
use feed_harvest::storage::{FsJobStore, JobDescriptor, JobStore, SqliteJobStore};
use feed_harvest::JobState;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serves a one-page feed with a single image, or an empty page
async fn mount_feed(server: &MockServer, with_image: bool) {
    let posts = if with_image {
        vec![link_post("p1", &format!("{}/media/cat.jpg", server.uri()))]
    } else {
        vec![]
    };

    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(posts, None)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/cat.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(media_bytes(9_000), "image/jpeg"))
        .mount(server)
        .await;
}

fn write_descriptor(queue_dir: &Path, job_id: &str) {
    std::fs::create_dir_all(queue_dir).unwrap();
    std::fs::write(
        queue_dir.join(format!("{}.json", job_id)),
        format!(r#"{{"target": "{}"}}"#, TARGET),
    )
    .unwrap();
}

fn fs_store(config: &Config) -> Arc<dyn JobStore> {
    Arc::new(FsJobStore::new(&config.jobs.queue_dir, &config.jobs.status_dir).unwrap())
}

fn scheduler(config: Config, store: Arc<dyn JobStore>) -> JobScheduler {
    let jobs = config.jobs.clone();
    let pipeline =
        Arc::new(Pipeline::new(Arc::new(config), Arc::new(FakeExtractor::writing_file())).unwrap());
    JobScheduler::new(store, pipeline, &jobs, CancellationToken::new())
}

#[tokio::test]
async fn test_job_completes_through_file_store() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();
    mount_feed(&server, true).await;

    let config = create_test_config(&server.uri(), root.path());
    write_descriptor(&config.jobs.queue_dir, "job_1");
    let status_dir = config.jobs.status_dir.clone();
    let store = fs_store(&config);

    let mut scheduler = scheduler(config, store.clone());
    assert_eq!(scheduler.scan_once().await.unwrap(), 1);
    scheduler.drain().await;

    let status = store.get_status("job_1").unwrap().unwrap();
    assert_eq!(status.state, JobState::Completed);
    assert_eq!(status.error, None);
    assert_eq!(status.stats.unwrap().images(), 1);

    // Only finished files are left behind
    let leftovers: Vec<_> = std::fs::read_dir(&status_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
    assert!(status_dir.join("job_1_stats.json").exists());
}

#[tokio::test]
async fn test_zero_yield_job_fails() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();
    mount_feed(&server, false).await;

    let config = create_test_config(&server.uri(), root.path());
    write_descriptor(&config.jobs.queue_dir, "job_empty");
    let store = fs_store(&config);

    let mut scheduler = scheduler(config, store.clone());
    assert_eq!(scheduler.scan_once().await.unwrap(), 1);
    scheduler.drain().await;

    let status = store.get_status("job_empty").unwrap().unwrap();
    assert_eq!(status.state, JobState::Failed);
    assert_eq!(status.error.as_deref(), Some("no valid media downloaded"));
    assert_eq!(status.stats.unwrap().files_downloaded(), 0);
}

#[tokio::test]
async fn test_finished_job_not_dispatched_again() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(vec![], None)))
        .expect(3)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), root.path());
    write_descriptor(&config.jobs.queue_dir, "job_once");
    let store = fs_store(&config);

    let mut scheduler = scheduler(config, store.clone());
    assert_eq!(scheduler.scan_once().await.unwrap(), 1);
    scheduler.drain().await;

    assert_eq!(scheduler.scan_once().await.unwrap(), 0);
    assert_eq!(scheduler.running(), 0);
    assert!(store.get_status("job_once").unwrap().unwrap().state.is_terminal());
}

#[tokio::test]
async fn test_job_completes_through_sqlite_store() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();
    mount_feed(&server, true).await;

    let config = create_test_config(&server.uri(), root.path());
    let sqlite = SqliteJobStore::new_in_memory().unwrap();
    assert!(sqlite
        .enqueue(&JobDescriptor {
            job_id: "job_db".to_string(),
            target: TARGET.to_string(),
        })
        .unwrap());
    let store: Arc<dyn JobStore> = Arc::new(sqlite);

    let mut scheduler = scheduler(config, store.clone());
    assert_eq!(scheduler.scan_once().await.unwrap(), 1);
    scheduler.drain().await;

    let status = store.get_status("job_db").unwrap().unwrap();
    assert_eq!(status.state, JobState::Completed);
    assert_eq!(store.list_pending().unwrap(), vec![]);
}

#[tokio::test]
async fn test_concurrency_limit_defers_jobs() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();
    mount_feed(&server, true).await;

    let mut config = create_test_config(&server.uri(), root.path());
    config.jobs.max_concurrent_jobs = 1;
    write_descriptor(&config.jobs.queue_dir, "job_a");
    write_descriptor(&config.jobs.queue_dir, "job_b");
    let store = fs_store(&config);

    let mut scheduler = scheduler(config, store.clone());
    assert_eq!(scheduler.scan_once().await.unwrap(), 1);
    assert_eq!(store.get_status("job_b").unwrap(), None);

    scheduler.drain().await;
    assert_eq!(scheduler.scan_once().await.unwrap(), 1);
    scheduler.drain().await;

    for job_id in ["job_a", "job_b"] {
        let status = store.get_status(job_id).unwrap().unwrap();
        assert_eq!(status.state, JobState::Completed);
    }
}

#[tokio::test]
async fn test_pipeline_error_recorded_as_failure() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();
    mount_feed(&server, true).await;

    let config = create_test_config(&server.uri(), root.path());
    // A plain file where the media root should be
    std::fs::write(&config.jobs.media_dir, b"not a directory").unwrap();
    write_descriptor(&config.jobs.queue_dir, "job_broken");
    let store = fs_store(&config);

    let mut scheduler = scheduler(config, store.clone());
    assert_eq!(scheduler.scan_once().await.unwrap(), 1);
    scheduler.drain().await;

    let status = store.get_status("job_broken").unwrap().unwrap();
    assert_eq!(status.state, JobState::Failed);
    assert!(status.error.unwrap().starts_with("IO error"));
    assert_eq!(status.stats.unwrap().files_downloaded(), 0);
}

#[tokio::test]
async fn test_run_until_cancelled() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();
    mount_feed(&server, true).await;

    let config = create_test_config(&server.uri(), root.path());
    write_descriptor(&config.jobs.queue_dir, "job_loop");
    let store = fs_store(&config);
    let jobs = config.jobs.clone();
    let pipeline =
        Arc::new(Pipeline::new(Arc::new(config), Arc::new(FakeExtractor::writing_file())).unwrap());

    let cancel = CancellationToken::new();
    let scheduler = JobScheduler::new(store.clone(), pipeline, &jobs, cancel.clone());
    let handle = tokio::spawn(scheduler.run());

    let finished = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Some(status) = store.get_status("job_loop").unwrap() {
                if status.state.is_terminal() {
                    return status;
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("job should finish");
    assert_eq!(finished.state, JobState::Completed);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler should stop")
        .unwrap()
        .unwrap();
}
