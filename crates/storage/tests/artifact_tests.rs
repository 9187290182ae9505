//! Tests for the atomic artifact store.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use radar_common::GeoBounds;
use storage::{ArtifactStore, FrameArtifact, StorageError};

fn artifact(png: &'static [u8], url: &str) -> FrameArtifact {
    FrameArtifact {
        png: Bytes::from_static(png),
        bounds: GeoBounds::new(30.0, -100.0, 40.0, -90.0),
        source_url: url.to_string(),
        frame_time: None,
    }
}

fn frame_at(png: &'static [u8], minute: u32) -> FrameArtifact {
    FrameArtifact {
        frame_time: Some(at(minute)),
        ..artifact(png, "https://a/frame")
    }
}

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()
}

#[tokio::test]
async fn test_read_before_commit_is_not_generated() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path().join("radar.png")).await.unwrap();

    assert!(store.current().await.is_none());
    assert_eq!(store.generation(), 0);
    assert!(matches!(
        store.read_current().await,
        Err(StorageError::NotYetGenerated)
    ));
}

#[tokio::test]
async fn test_stale_file_is_not_served() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("radar.png");
    std::fs::write(&path, b"old frame").unwrap();

    let store = ArtifactStore::open(&path).await.unwrap();
    assert!(matches!(
        store.read_current().await,
        Err(StorageError::NotYetGenerated)
    ));
}

#[tokio::test]
async fn test_commit_then_read() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path().join("out").join("radar.png"))
        .await
        .unwrap();

    let version = store.commit(artifact(b"png-1", "https://a/1")).await.unwrap();
    assert_eq!(version.generation, 1);
    assert_eq!(version.size_bytes, 5);

    let (read_version, data) = store.read_current().await.unwrap();
    assert_eq!(read_version, version);
    assert_eq!(&data[..], b"png-1");
    assert_eq!(std::fs::read(store.path()).unwrap(), b"png-1");
}

#[tokio::test]
async fn test_generations_and_timestamps_increase() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path().join("radar.png")).await.unwrap();

    let first = store.commit(artifact(b"a", "https://a/1")).await.unwrap();
    let second = store.commit(artifact(b"bb", "https://a/2")).await.unwrap();

    assert_eq!(second.generation, first.generation + 1);
    assert!(second.timestamp >= first.timestamp);
    assert_eq!(store.current().await.unwrap().source_url, "https://a/2");
}

#[tokio::test]
async fn test_empty_commit_leaves_previous_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path().join("radar.png")).await.unwrap();
    let committed = store.commit(artifact(b"good", "https://a/1")).await.unwrap();

    assert!(matches!(
        store.commit(artifact(b"", "https://a/2")).await,
        Err(StorageError::EmptyArtifact)
    ));

    let (version, data) = store.read_current().await.unwrap();
    assert_eq!(version, committed);
    assert_eq!(&data[..], b"good");
}

#[tokio::test]
async fn test_no_temporary_files_remain() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path().join("radar.png")).await.unwrap();
    store.commit(artifact(b"one", "u")).await.unwrap();
    store.commit(artifact(b"two", "u")).await.unwrap();

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["radar.png".to_string()]);
}

#[tokio::test]
async fn test_concurrent_commits_are_serialized() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ArtifactStore::open(dir.path().join("radar.png")).await.unwrap());

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let png = Bytes::from(format!("frame-{}", i));
            store
                .commit(FrameArtifact {
                    png,
                    bounds: GeoBounds::CONUS,
                    source_url: format!("https://a/{}", i),
                    frame_time: None,
                })
                .await
                .unwrap()
                .generation
        }));
    }

    let mut generations = Vec::new();
    for handle in handles {
        generations.push(handle.await.unwrap());
    }
    generations.sort_unstable();
    assert_eq!(generations, (1..=8).collect::<Vec<u64>>());

    // The file on disk belongs to the version the pointer names
    let (version, data) = store.read_current().await.unwrap();
    assert_eq!(version.generation, 8);
    let expected_suffix = version.source_url.rsplit('/').next().unwrap();
    assert_eq!(
        String::from_utf8(data.to_vec()).unwrap(),
        format!("frame-{}", expected_suffix)
    );
}

#[tokio::test]
async fn test_version_serializes_camel_case() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path().join("radar.png")).await.unwrap();
    let version = store.commit(artifact(b"x", "https://a/1")).await.unwrap();

    let json = serde_json::to_value(&version).unwrap();
    assert_eq!(json["sourceUrl"], "https://a/1");
    assert_eq!(json["generation"], 1);
    assert_eq!(json["sizeBytes"], 1);
}

#[tokio::test]
async fn test_older_frame_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path().join("radar.png")).await.unwrap();

    let newer = store.commit(frame_at(b"newer", 10)).await.unwrap();
    let err = store.commit(frame_at(b"older", 8)).await.unwrap_err();
    match err {
        StorageError::StaleFrame {
            frame_time,
            current,
        } => {
            assert_eq!(frame_time, at(8));
            assert_eq!(current, at(10));
        }
        other => panic!("expected StaleFrame, got {:?}", other),
    }

    let (version, data) = store.read_current().await.unwrap();
    assert_eq!(version, newer);
    assert_eq!(&data[..], b"newer");

    // Same frame again is a normal re-commit
    let again = store.commit(frame_at(b"again", 10)).await.unwrap();
    assert_eq!(again.generation, newer.generation + 1);
}
