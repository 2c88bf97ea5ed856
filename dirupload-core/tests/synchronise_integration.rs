use std::sync::atomic::Ordering;
use std::time::Duration;

use dirupload_core::config::{BlobNaming, PathFilter, UploadConfig};
use dirupload_core::contract::{BackendError, CreateContainerResponse, MockBlobBackend};
use dirupload_core::error::{ConfigError, DiscoveryError, RunError};
use dirupload_core::provision::ProvisionStatus;
use dirupload_core::synchronise::synchronise;
use tempfile::tempdir;

mod support;
use support::{write_files, RecordingBackend};

fn xml_config(root: &std::path::Path) -> UploadConfig {
    let mut config = UploadConfig::new(root, PathFilter::suffix(".xml"));
    config.container = Some("reports".to_string());
    config
}

#[tokio::test]
async fn uploads_25_files_with_at_most_20_in_flight() {
    let temp = tempdir().unwrap();
    let names: Vec<String> = (0..25).map(|i| format!("report{i:02}.xml")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    write_files(temp.path(), &refs);

    let backend = RecordingBackend::new(Duration::from_millis(20));
    let config = xml_config(temp.path());

    let report = synchronise(&config, &backend)
        .await
        .expect("run should finish");

    assert_eq!(report.container, "reports");
    assert_eq!(report.provisioning, ProvisionStatus::Created);
    assert_eq!(report.total(), 25);
    assert_eq!(report.succeeded.len(), 25);
    assert!(report.failed.is_empty());
    assert_eq!(backend.upload_calls.load(Ordering::SeqCst), 25);
    assert_eq!(backend.blob_names(), names);
    let peak = backend.max_in_flight.load(Ordering::SeqCst);
    assert!((1..=20).contains(&peak), "peak concurrency was {peak}");
    assert_eq!(report.summary_line(), "Uploaded 25 of 25 files (0 failed)");
}

#[tokio::test]
async fn uploaded_content_matches_local_files() {
    let temp = tempdir().unwrap();
    write_files(temp.path(), &["a.xml"]);

    let backend = RecordingBackend::new(Duration::from_millis(1));
    synchronise(&xml_config(temp.path()), &backend)
        .await
        .expect("run should finish");

    let uploaded = backend.uploaded.lock().unwrap();
    assert_eq!(uploaded.len(), 1);
    assert_eq!(uploaded[0].0, "a.xml");
    assert_eq!(uploaded[0].1, b"<doc>a.xml</doc>".to_vec());
}

#[tokio::test]
async fn only_matching_files_are_uploaded() {
    let temp = tempdir().unwrap();
    write_files(temp.path(), &["a.xml", "b.txt", "c.xml"]);

    let backend = RecordingBackend::new(Duration::from_millis(1));
    let report = synchronise(&xml_config(temp.path()), &backend)
        .await
        .expect("run should finish");

    assert_eq!(report.total(), 2);
    assert_eq!(backend.blob_names(), vec!["a.xml", "c.xml"]);
}

#[tokio::test]
async fn relative_path_naming_keeps_nested_names_apart() {
    let temp = tempdir().unwrap();
    write_files(temp.path(), &["x/same.xml", "y/same.xml"]);

    let backend = RecordingBackend::new(Duration::from_millis(1));
    let mut config = xml_config(temp.path());
    config.blob_naming = BlobNaming::RelativePath;

    let report = synchronise(&config, &backend).await.expect("run should finish");

    assert_eq!(report.succeeded.len(), 2);
    assert_eq!(backend.blob_names(), vec!["x/same.xml", "y/same.xml"]);
}

#[tokio::test]
async fn failed_file_is_reported_and_the_rest_still_upload() {
    let temp = tempdir().unwrap();
    write_files(temp.path(), &["a.xml", "b.xml", "c.xml", "d.xml"]);

    let backend = RecordingBackend::new(Duration::from_millis(5)).failing_on("b.xml");
    let report = synchronise(&xml_config(temp.path()), &backend)
        .await
        .expect("per-file failures must not abort the run");

    assert_eq!(report.total(), 4);
    assert_eq!(report.succeeded.len(), 3);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].blob_name, "b.xml");
    assert_eq!(report.failed[0].status_code(), Some(500));
    assert_eq!(report.summary_line(), "Uploaded 3 of 4 files (1 failed)");
}

#[tokio::test]
async fn existing_container_still_gets_uploads() {
    let temp = tempdir().unwrap();
    write_files(temp.path(), &["a.xml", "b.xml"]);

    let backend = RecordingBackend::new(Duration::from_millis(1)).with_existing_container();
    let report = synchronise(&xml_config(temp.path()), &backend)
        .await
        .expect("already-exists is success");

    assert_eq!(report.provisioning, ProvisionStatus::AlreadyExisted);
    assert_eq!(report.succeeded.len(), 2);
}

#[tokio::test]
async fn missing_root_aborts_before_any_backend_call() {
    let temp = tempdir().unwrap();
    let config = xml_config(&temp.path().join("missing"));

    let mut backend = MockBlobBackend::new();
    backend.expect_create_container().times(0);
    backend.expect_upload_blob().times(0);

    let err = synchronise(&config, &backend).await.unwrap_err();
    assert!(
        matches!(err, RunError::Discovery(DiscoveryError::RootMissing(_))),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn provisioning_failure_aborts_before_any_upload() {
    let temp = tempdir().unwrap();
    write_files(temp.path(), &["a.xml"]);

    let mut backend = MockBlobBackend::new();
    backend.expect_create_container().times(1).returning(|_| {
        CreateContainerResponse::Failed(BackendError::Status {
            code: 403,
            message: "AuthorizationFailure".into(),
        })
    });
    backend.expect_upload_blob().times(0);

    let err = synchronise(&xml_config(temp.path()), &backend)
        .await
        .unwrap_err();
    match err {
        RunError::Provisioning(e) => {
            assert_eq!(e.container, "reports");
            assert_eq!(e.source.status_code(), Some(403));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn invalid_config_aborts_before_any_backend_call() {
    let temp = tempdir().unwrap();
    let mut config = xml_config(temp.path());
    config.concurrency = 0;

    let backend = MockBlobBackend::new();
    let err = synchronise(&config, &backend).await.unwrap_err();
    assert!(matches!(err, RunError::Config(ConfigError::ZeroConcurrency)));
}

#[tokio::test]
async fn empty_directory_finishes_with_empty_report() {
    let temp = tempdir().unwrap();
    let backend = RecordingBackend::new(Duration::from_millis(1));

    let report = synchronise(&xml_config(temp.path()), &backend)
        .await
        .expect("run should finish");

    assert_eq!(report.total(), 0);
    assert_eq!(backend.create_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn generated_container_name_is_used_when_none_configured() {
    let temp = tempdir().unwrap();
    let config = UploadConfig::new(temp.path(), PathFilter::AllFiles);

    let mut backend = MockBlobBackend::new();
    backend
        .expect_create_container()
        .times(1)
        .returning(|name| {
            assert!(name.starts_with("quickstart"), "unexpected name {name}");
            CreateContainerResponse::Created
        });

    let report = synchronise(&config, &backend).await.expect("run should finish");
    assert!(report.container.starts_with("quickstart"));
}
