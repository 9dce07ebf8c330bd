//! Consistency tests for FileManager.
//!
//! Drives uploads and deletes against stores that fail on demand and checks
//! what each store holds afterwards.

mod common;

use chrono::Duration;
use tempfile::TempDir;

use clouddrive::file::{Intent, NamingPolicy};
use clouddrive::{
    BlobStore, DeleteError, IntentJournal, ListError, ManagerConfig, MetadataStore, UploadError,
};
use common::Harness;

const MIB: usize = 1024 * 1024;

fn journal() -> (TempDir, IntentJournal) {
    let temp_dir = TempDir::new().unwrap();
    let journal = IntentJournal::open(temp_dir.path().join("journal")).unwrap();
    (temp_dir, journal)
}

// ============================================================================
// Upload
// ============================================================================

#[tokio::test]
async fn test_upload_then_list_contains_one_matching_record() {
    for size in [0usize, 1, 4096, MIB, 10 * MIB] {
        let h = Harness::new();
        let content = vec![7u8; size];

        let record = h.manager.upload(&content, "data.bin", "").await.unwrap();

        let listed = h.manager.list_all().await.unwrap();
        let matching: Vec<_> = listed.iter().filter(|r| r.id == record.id).collect();
        assert_eq!(matching.len(), 1, "size {size}");
        assert_eq!(matching[0].size_bytes, size as u64);
        assert!(h.blobs.inner.contains(&record.storage_path));
    }
}

#[tokio::test]
async fn test_upload_too_large_touches_no_store() {
    let h = Harness::new();
    let content = vec![0u8; 10 * MIB + 1];

    let result = h.manager.upload(&content, "big.bin", "").await;

    assert!(matches!(
        result,
        Err(UploadError::TooLarge {
            size,
            limit
        }) if size == (10 * MIB + 1) as u64 && limit == (10 * MIB) as u64
    ));
    assert_eq!(h.mutating_calls(), 0);
    assert_eq!(h.blobs.public_url.calls(), 0);
    assert!(h.blobs.inner.is_empty());
    assert!(h.metadata.inner.is_empty());
}

#[tokio::test]
async fn test_upload_too_large_respects_configured_limit() {
    let h = Harness::with_config(ManagerConfig {
        max_file_size_bytes: 100,
        ..ManagerConfig::default()
    });

    assert!(h.manager.upload(&[0u8; 100], "ok.bin", "").await.is_ok());
    assert!(matches!(
        h.manager.upload(&[0u8; 101], "no.bin", "").await,
        Err(UploadError::TooLarge { .. })
    ));
    assert_eq!(h.blobs.put.calls(), 1);
}

#[tokio::test]
async fn test_blob_write_failure_creates_no_metadata() {
    let h = Harness::new();
    h.manager.upload(b"first", "first.txt", "").await.unwrap();
    let before = h.manager.list_all().await.unwrap();

    h.blobs.put.fail(true);
    let result = h.manager.upload(b"second", "second.txt", "").await;

    assert!(matches!(result, Err(UploadError::BlobWriteFailed(_))));
    assert_eq!(h.metadata.insert.calls(), 1);
    assert_eq!(h.manager.list_all().await.unwrap(), before);
}

#[tokio::test]
async fn test_metadata_write_failure_compensates_exactly_once() {
    let h = Harness::new();
    h.metadata.insert.fail(true);

    let result = h.manager.upload(b"payload", "a.txt", "").await;

    assert!(matches!(
        result,
        Err(UploadError::MetadataWriteFailed {
            compensated: true,
            ..
        })
    ));
    assert_eq!(h.blobs.put.calls(), 1);
    assert_eq!(h.metadata.insert.calls(), 1);
    assert_eq!(h.blobs.delete.calls(), 1);
    assert!(h.blobs.inner.is_empty());
    assert!(h.metadata.inner.is_empty());
}

#[tokio::test]
async fn test_failed_compensation_is_reported_not_raised() {
    let h = Harness::new();
    h.metadata.insert.fail(true);
    h.blobs.delete.fail(true);

    let result = h.manager.upload(b"payload", "a.txt", "").await;

    assert!(matches!(
        result,
        Err(UploadError::MetadataWriteFailed {
            compensated: false,
            ..
        })
    ));
    assert_eq!(h.blobs.delete.calls(), 1);
    // The blob is orphaned.
    assert_eq!(h.blobs.inner.len(), 1);
}

#[tokio::test]
async fn test_public_url_failure_removes_blob() {
    let h = Harness::new();
    h.blobs.public_url.fail(true);

    let result = h.manager.upload(b"payload", "a.txt", "").await;

    assert!(matches!(result, Err(UploadError::BlobWriteFailed(_))));
    assert_eq!(h.metadata.insert.calls(), 0);
    assert_eq!(h.blobs.delete.calls(), 1);
    assert!(h.blobs.inner.is_empty());
}

#[tokio::test]
async fn test_same_second_uploads_share_a_key() {
    let h = Harness::new();

    let a = h.manager.upload(b"one", "same.txt", "").await.unwrap();
    let b = h.manager.upload(b"two", "same.txt", "").await.unwrap();

    assert_eq!(a.storage_path, b.storage_path);
    assert_ne!(a.id, b.id);
    // Last write wins at the blob store.
    assert_eq!(h.blobs.inner.len(), 1);
    assert_eq!(h.blobs.inner.get(&a.storage_path).await.unwrap(), b"two");
}

#[tokio::test]
async fn test_unique_naming_avoids_same_second_collision() {
    let h = Harness::with_config(ManagerConfig {
        naming: NamingPolicy::Unique,
        ..ManagerConfig::default()
    });

    let a = h.manager.upload(b"one", "same.txt", "").await.unwrap();
    let b = h.manager.upload(b"two", "same.txt", "").await.unwrap();

    assert_ne!(a.storage_path, b.storage_path);
    assert_eq!(h.blobs.inner.len(), 2);
}

// ============================================================================
// Listing and statistics
// ============================================================================

#[tokio::test]
async fn test_list_all_most_recent_first() {
    let h = Harness::new();

    for name in ["a.txt", "b.txt", "c.txt"] {
        h.manager.upload(b"x", name, "").await.unwrap();
        h.clock.advance(Duration::seconds(1));
    }

    let names: Vec<_> = h
        .manager
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.original_name)
        .collect();
    assert_eq!(names, vec!["c.txt", "b.txt", "a.txt"]);
}

#[tokio::test]
async fn test_stats_over_two_uploads() {
    let h = Harness::new();

    h.manager.upload(&vec![1u8; MIB], "one.bin", "").await.unwrap();
    h.clock.advance(Duration::seconds(1));
    h.manager
        .upload(&vec![2u8; 2 * MIB], "two.bin", "")
        .await
        .unwrap();

    let stats = h.manager.stats().await.unwrap();
    assert_eq!(stats.total_files, 2);
    assert_eq!(stats.total_size_bytes, 3_145_728);
    assert_eq!(stats.total_size_mb, 3.0);
}

#[tokio::test]
async fn test_list_failure_surfaces_as_list_error() {
    let h = Harness::new();
    h.metadata.list.fail(true);

    assert!(matches!(h.manager.list_all().await, Err(ListError(_))));
    assert!(matches!(h.manager.stats().await, Err(ListError(_))));
}

#[tokio::test]
async fn test_listing_ignores_out_of_band_blob_removal() {
    let h = Harness::new();
    let record = h.manager.upload(b"x", "stale.txt", "").await.unwrap();

    h.blobs.inner.delete(&record.storage_path).await.unwrap();

    let listed = h.manager.list_all().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(h.blobs.get.calls(), 0);
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_removes_record_from_listing() {
    let h = Harness::new();
    let keep = h.manager.upload(b"keep", "keep.txt", "").await.unwrap();
    h.clock.advance(Duration::seconds(1));
    let gone = h.manager.upload(b"gone", "gone.txt", "").await.unwrap();

    h.manager
        .delete(&gone.id, &gone.storage_path)
        .await
        .unwrap();

    let ids: Vec<_> = h
        .manager
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![keep.id]);
    assert!(!h.blobs.inner.contains(&gone.storage_path));
}

#[tokio::test]
async fn test_delete_twice_succeeds() {
    let h = Harness::new();
    let record = h.manager.upload(b"x", "twice.txt", "").await.unwrap();

    h.manager
        .delete(&record.id, &record.storage_path)
        .await
        .unwrap();
    h.manager
        .delete(&record.id, &record.storage_path)
        .await
        .unwrap();

    assert_eq!(h.blobs.delete.calls(), 2);
    assert_eq!(h.metadata.delete.calls(), 2);
}

#[tokio::test]
async fn test_blob_delete_failure_leaves_metadata() {
    let h = Harness::new();
    let record = h.manager.upload(b"x", "a.txt", "").await.unwrap();
    h.blobs.delete.fail(true);

    let result = h.manager.delete(&record.id, &record.storage_path).await;

    assert!(matches!(result, Err(DeleteError::BlobDeleteFailed(_))));
    assert_eq!(h.metadata.delete.calls(), 0);
    assert_eq!(h.manager.list_all().await.unwrap().len(), 1);
    assert!(h.blobs.inner.contains(&record.storage_path));
}

#[tokio::test]
async fn test_metadata_delete_failure_orphans_record() {
    let h = Harness::new();
    let record = h.manager.upload(b"x", "a.txt", "").await.unwrap();
    h.metadata.delete.fail(true);

    let result = h.manager.delete(&record.id, &record.storage_path).await;

    assert!(matches!(result, Err(DeleteError::MetadataDeleteFailed(_))));
    assert!(!h.blobs.inner.contains(&record.storage_path));
    assert_eq!(h.manager.list_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_rejects_path_outside_uploads() {
    let h = Harness::new();

    for path in ["", "uploads/", "config.toml", "../uploads/x"] {
        let result = h.manager.delete("id", path).await;
        assert!(
            matches!(result, Err(DeleteError::InvalidStoragePath(_))),
            "path {path:?} should be rejected"
        );
    }
    assert_eq!(h.mutating_calls(), 0);
}

// ============================================================================
// Journal and recovery
// ============================================================================

#[tokio::test]
async fn test_journal_failure_fails_closed() {
    let (temp_dir, journal) = journal();
    std::fs::remove_dir_all(temp_dir.path().join("journal")).unwrap();
    let h = Harness::new().with_journal(journal);

    let upload = h.manager.upload(b"x", "a.txt", "").await;
    assert!(matches!(upload, Err(UploadError::Journal(_))));

    let delete = h.manager.delete("id", "uploads/a.txt").await;
    assert!(matches!(delete, Err(DeleteError::Journal(_))));

    assert_eq!(h.mutating_calls(), 0);
}

#[tokio::test]
async fn test_blob_write_failure_keeps_intent_for_recovery() {
    let (_temp_dir, journal) = journal();
    let h = Harness::new().with_journal(journal.clone());
    h.blobs.put.fail(true);

    let result = h.manager.upload(b"x", "a.txt", "").await;
    assert!(matches!(result, Err(UploadError::BlobWriteFailed(_))));
    assert_eq!(journal.pending().await.unwrap().len(), 1);

    let report = h.manager.recover().await.unwrap();
    assert_eq!(report.orphan_blobs_removed, 1);
    assert!(journal.pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rejected_key_clears_intent() {
    let (_temp_dir, journal) = journal();
    let h = Harness::new().with_journal(journal.clone());
    h.blobs.put.reject(true);

    let result = h.manager.upload(b"x", "a.txt", "").await;

    assert!(matches!(result, Err(UploadError::BlobWriteFailed(_))));
    assert!(h.blobs.inner.is_empty());
    assert!(journal.pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_recovery_resolves_intent_for_rejected_key() {
    let (_temp_dir, journal) = journal();
    let h = Harness::new().with_journal(journal.clone());
    journal
        .begin(
            Intent::Upload {
                storage_path: "uploads/20240601_120000_a.txt".to_string(),
            },
            chrono::Utc::now(),
        )
        .await
        .unwrap();
    h.blobs.delete.reject(true);

    let report = h.manager.recover().await.unwrap();

    assert_eq!(report.failed, 0);
    assert_eq!(report.orphan_blobs_removed, 1);
    assert!(journal.pending().await.unwrap().is_empty());

    let report = h.manager.recover().await.unwrap();
    assert_eq!(report.total(), 0);
}

#[tokio::test]
async fn test_compensated_upload_clears_intent() {
    let (_temp_dir, journal) = journal();
    let h = Harness::new().with_journal(journal.clone());
    h.metadata.insert.fail(true);

    let result = h.manager.upload(b"x", "a.txt", "").await;

    assert!(matches!(
        result,
        Err(UploadError::MetadataWriteFailed {
            compensated: true,
            ..
        })
    ));
    assert!(journal.pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_recovery_removes_blob_after_failed_compensation() {
    let (_temp_dir, journal) = journal();
    let h = Harness::new().with_journal(journal.clone());
    h.metadata.insert.fail(true);
    h.blobs.delete.fail(true);

    let record = h.manager.upload(b"x", "a.txt", "").await;
    assert!(record.is_err());
    assert_eq!(h.blobs.inner.len(), 1);

    let pending = journal.pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert!(matches!(pending[0].intent, Intent::Upload { .. }));

    // Stores recover before the next start.
    h.metadata.insert.fail(false);
    h.blobs.delete.fail(false);

    let report = h.manager.recover().await.unwrap();
    assert_eq!(report.orphan_blobs_removed, 1);
    assert_eq!(report.failed, 0);
    assert!(h.blobs.inner.is_empty());
    assert!(journal.pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_recovery_finishes_delete_after_metadata_failure() {
    let (_temp_dir, journal) = journal();
    let h = Harness::new().with_journal(journal.clone());
    let record = h.manager.upload(b"x", "a.txt", "").await.unwrap();
    h.metadata.delete.fail(true);

    let result = h.manager.delete(&record.id, &record.storage_path).await;
    assert!(matches!(result, Err(DeleteError::MetadataDeleteFailed(_))));
    assert_eq!(journal.pending().await.unwrap().len(), 1);

    h.metadata.delete.fail(false);
    let report = h.manager.recover().await.unwrap();

    assert_eq!(report.deletes_completed, 1);
    assert!(h.manager.list_all().await.unwrap().is_empty());
    assert!(journal.pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_blob_delete_failure_clears_intent() {
    let (_temp_dir, journal) = journal();
    let h = Harness::new().with_journal(journal.clone());
    let record = h.manager.upload(b"x", "a.txt", "").await.unwrap();
    h.blobs.delete.fail(true);

    let result = h.manager.delete(&record.id, &record.storage_path).await;

    assert!(matches!(result, Err(DeleteError::BlobDeleteFailed(_))));
    assert!(journal.pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unresolved_intent_stays_journaled() {
    let (_temp_dir, journal) = journal();
    let h = Harness::new().with_journal(journal.clone());
    let record = h.manager.upload(b"x", "a.txt", "").await.unwrap();
    h.metadata.delete.fail(true);

    let _ = h.manager.delete(&record.id, &record.storage_path).await;

    let report = h.manager.recover().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(journal.pending().await.unwrap().len(), 1);
    assert!(h.metadata.inner.get_by_id(&record.id).await.unwrap().is_some());
}
