//! Cache Store Integration Tests
//!
//! Tests for expiry, eviction, invalidation, counters and persistence of the
//! on-disk caption cache.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use captionkit::cache::CacheKey;
use captionkit::{
    CacheConfig, CacheStore, Caption, CaptionLine, CaptionMetadata, CaptionType, StorageFormat,
};
use chrono::{Duration, Utc};
use tempfile::TempDir;

fn caption(video_id: &str, language: &str) -> Caption {
    let metadata = CaptionMetadata::new(video_id, language)
        .with_caption_type(CaptionType::Manual)
        .with_format("srt")
        .with_quality_score(0.87);
    Caption::new(
        metadata,
        vec![
            CaptionLine::new(0.5, 2.25, "Hello there").unwrap(),
            CaptionLine::new(2.5, 4.0, "General Kenobi")
                .unwrap()
                .with_speaker("Grievous"),
        ],
    )
}

fn no_extra() -> BTreeMap<String, String> {
    BTreeMap::new()
}

async fn open(dir: &TempDir, config: CacheConfig) -> CacheStore {
    CacheStore::open(dir.path(), config).await.unwrap()
}

#[tokio::test]
async fn test_store_then_get_returns_equal_caption() {
    for format in [StorageFormat::Json, StorageFormat::Binary] {
        let temp = TempDir::new().unwrap();
        let config = CacheConfig {
            format,
            ..CacheConfig::default()
        };
        let store = open(&temp, config).await;

        let original = caption("abc123", "en");
        store
            .store(&original, "manual", None, &no_extra())
            .await
            .unwrap();

        let cached = store
            .get("abc123", "en", "manual", &no_extra())
            .await
            .unwrap()
            .expect("entry should be cached");
        assert_eq!(cached, original, "{}", format);

        let file = temp
            .path()
            .join(format!("abc123_en_manual.{}", format.extension()));
        assert!(file.exists());
    }
}

#[tokio::test]
async fn test_extra_params_are_part_of_identity() {
    let temp = TempDir::new().unwrap();
    let store = open(&temp, CacheConfig::default()).await;

    let mut extra = BTreeMap::new();
    extra.insert("tlang".to_string(), "de".to_string());
    store
        .store(&caption("abc123", "en"), "manual", None, &extra)
        .await
        .unwrap();

    assert!(store
        .get("abc123", "en", "manual", &no_extra())
        .await
        .unwrap()
        .is_none());
    assert!(store
        .get("abc123", "en", "manual", &extra)
        .await
        .unwrap()
        .is_some());
    assert_eq!(store.keys().await, vec!["abc123_en_manual_tlang=de"]);
}

#[tokio::test]
async fn test_ttl_expiry() {
    let temp = TempDir::new().unwrap();
    let config = CacheConfig {
        max_age_secs: 1,
        refresh_on_access: false,
        ..CacheConfig::default()
    };
    let store = open(&temp, config).await;

    store
        .store(&caption("abc123", "en"), "manual", None, &no_extra())
        .await
        .unwrap();
    assert!(store
        .get("abc123", "en", "manual", &no_extra())
        .await
        .unwrap()
        .is_some());

    tokio::time::sleep(StdDuration::from_millis(1200)).await;

    assert!(store
        .get("abc123", "en", "manual", &no_extra())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_past_explicit_expiry_is_absent_immediately() {
    let temp = TempDir::new().unwrap();
    let config = CacheConfig {
        max_age_secs: 0,
        ..CacheConfig::default()
    };
    let store = open(&temp, config).await;

    let past = Utc::now() - Duration::seconds(5);
    store
        .store(&caption("abc123", "en"), "manual", Some(past), &no_extra())
        .await
        .unwrap();

    assert!(store
        .get("abc123", "en", "manual", &no_extra())
        .await
        .unwrap()
        .is_none());
    assert_eq!(store.purge_expired().await.unwrap(), 1);
    assert!(store.keys().await.is_empty());
}

#[tokio::test]
async fn test_explicit_expiry_outlives_ttl() {
    let temp = TempDir::new().unwrap();
    let config = CacheConfig {
        max_age_secs: 1,
        ..CacheConfig::default()
    };
    let store = open(&temp, config).await;

    let later = Utc::now() + Duration::hours(1);
    store
        .store(&caption("abc123", "en"), "manual", Some(later), &no_extra())
        .await
        .unwrap();

    tokio::time::sleep(StdDuration::from_millis(1200)).await;

    assert!(store
        .get("abc123", "en", "manual", &no_extra())
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_refresh_on_access_extends_ttl() {
    let temp = TempDir::new().unwrap();
    let config = CacheConfig {
        max_age_secs: 2,
        refresh_on_access: true,
        ..CacheConfig::default()
    };
    let store = open(&temp, config).await;

    store
        .store(&caption("abc123", "en"), "manual", None, &no_extra())
        .await
        .unwrap();

    // Each read lands inside the TTL and pushes it out again
    for _ in 0..3 {
        tokio::time::sleep(StdDuration::from_millis(1200)).await;
        assert!(store
            .get("abc123", "en", "manual", &no_extra())
            .await
            .unwrap()
            .is_some());
    }
}

#[tokio::test]
async fn test_refresh_never_extends_explicit_expiry() {
    let temp = TempDir::new().unwrap();
    let config = CacheConfig {
        max_age_secs: 0,
        refresh_on_access: true,
        ..CacheConfig::default()
    };
    let store = open(&temp, config).await;

    let soon = Utc::now() + Duration::milliseconds(1500);
    store
        .store(&caption("abc123", "en"), "manual", Some(soon), &no_extra())
        .await
        .unwrap();

    assert!(store
        .get("abc123", "en", "manual", &no_extra())
        .await
        .unwrap()
        .is_some());
    tokio::time::sleep(StdDuration::from_millis(1700)).await;
    assert!(store
        .get("abc123", "en", "manual", &no_extra())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_eviction_keeps_min_entries_newest() {
    let temp = TempDir::new().unwrap();
    let config = CacheConfig {
        max_size_bytes: 1,
        min_entries: 3,
        auto_clean: true,
        ..CacheConfig::default()
    };
    let store = open(&temp, config).await;

    for i in 1..=5 {
        store
            .store(&caption(&format!("vid{}", i), "en"), "manual", None, &no_extra())
            .await
            .unwrap();
        tokio::time::sleep(StdDuration::from_millis(5)).await;
    }

    assert_eq!(
        store.keys().await,
        vec!["vid3_en_manual", "vid4_en_manual", "vid5_en_manual"]
    );
    assert_eq!(store.stats().await.entry_count, 3);
    assert!(!temp.path().join("vid1_en_manual.json").exists());
}

#[tokio::test]
async fn test_no_eviction_without_auto_clean() {
    let temp = TempDir::new().unwrap();
    let config = CacheConfig {
        max_size_bytes: 1,
        min_entries: 1,
        auto_clean: false,
        ..CacheConfig::default()
    };
    let store = open(&temp, config).await;

    for i in 1..=3 {
        store
            .store(&caption(&format!("vid{}", i), "en"), "manual", None, &no_extra())
            .await
            .unwrap();
    }
    assert_eq!(store.keys().await.len(), 3);
}

#[tokio::test]
async fn test_invalidate_filters() {
    let temp = TempDir::new().unwrap();
    let store = open(&temp, CacheConfig::default()).await;

    store.store(&caption("abc123", "en"), "manual", None, &no_extra()).await.unwrap();
    store.store(&caption("abc123", "en"), "automatic", None, &no_extra()).await.unwrap();
    store.store(&caption("abc123", "de"), "manual", None, &no_extra()).await.unwrap();
    store.store(&caption("xyz789", "en"), "manual", None, &no_extra()).await.unwrap();

    assert_eq!(
        store
            .invalidate("abc123", Some("en"), Some("auto_generated"))
            .await
            .unwrap(),
        1
    );
    assert_eq!(store.invalidate("abc123", None, None).await.unwrap(), 2);
    assert_eq!(store.invalidate("abc123", None, None).await.unwrap(), 0);
    assert_eq!(store.keys().await, vec!["xyz789_en_manual"]);
}

#[tokio::test]
async fn test_counters_survive_clear() {
    let temp = TempDir::new().unwrap();
    let store = open(&temp, CacheConfig::default()).await;

    let stats = store.stats().await;
    assert_eq!(stats.hit_ratio, 0.0);

    store.store(&caption("abc123", "en"), "manual", None, &no_extra()).await.unwrap();
    store.get("abc123", "en", "manual", &no_extra()).await.unwrap();
    store.get("abc123", "en", "manual", &no_extra()).await.unwrap();
    store.get("missing", "en", "manual", &no_extra()).await.unwrap();
    store.get("abc123", "fr", "manual", &no_extra()).await.unwrap();

    let stats = store.stats().await;
    assert_eq!((stats.hits, stats.misses, stats.stores), (2, 2, 1));
    assert_eq!(stats.hit_ratio, 0.5);
    assert_eq!(stats.entry_count, 1);
    assert!(stats.total_size_bytes > 0);

    store.clear().await.unwrap();
    store.clear().await.unwrap();

    let stats = store.stats().await;
    assert_eq!(stats.entry_count, 0);
    assert_eq!(stats.total_size_bytes, 0);
    assert_eq!((stats.hits, stats.misses), (2, 2));
}

#[tokio::test]
async fn test_disabled_cache() {
    let temp = TempDir::new().unwrap();
    let config = CacheConfig {
        enabled: false,
        ..CacheConfig::default()
    };
    let store = open(&temp, config).await;

    store.store(&caption("abc123", "en"), "manual", None, &no_extra()).await.unwrap();
    assert!(store.get("abc123", "en", "manual", &no_extra()).await.unwrap().is_none());
    assert_eq!(store.invalidate("abc123", None, None).await.unwrap(), 0);

    let stats = store.stats().await;
    assert!(!stats.enabled);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.entry_count, 0);
}

#[tokio::test]
async fn test_reopen_rebuilds_index() {
    let temp = TempDir::new().unwrap();
    let config = CacheConfig {
        format: StorageFormat::Binary,
        ..CacheConfig::default()
    };

    {
        let store = open(&temp, config.clone()).await;
        store.store(&caption("abc123", "en"), "manual", None, &no_extra()).await.unwrap();
        store.store(&caption("abc123", "de"), "manual", None, &no_extra()).await.unwrap();
    }

    let store = open(&temp, config).await;
    assert_eq!(store.stats().await.entry_count, 2);
    assert_eq!(
        store.get("abc123", "de", "manual", &no_extra()).await.unwrap(),
        Some(caption("abc123", "de"))
    );
}

#[tokio::test]
async fn test_corrupt_entry_is_a_miss() {
    let temp = TempDir::new().unwrap();
    let store = open(&temp, CacheConfig::default()).await;

    store.store(&caption("abc123", "en"), "manual", None, &no_extra()).await.unwrap();
    tokio::fs::write(temp.path().join("abc123_en_manual.json"), b"{ truncated")
        .await
        .unwrap();

    assert!(store.get("abc123", "en", "manual", &no_extra()).await.unwrap().is_none());
    assert_eq!(store.stats().await.misses, 1);

    // A missing file is just absence too
    tokio::fs::remove_file(temp.path().join("abc123_en_manual.json"))
        .await
        .unwrap();
    assert!(store.get("abc123", "en", "manual", &no_extra()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_invalid_key_fields_are_rejected() {
    let temp = TempDir::new().unwrap();
    let store = open(&temp, CacheConfig::default()).await;

    let err = store
        .store(&caption("abc_123", "en"), "manual", None, &no_extra())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("video_id"));
    assert!(store.get("abc_123", "en", "manual", &no_extra()).await.is_err());

    // A failed lookup still counts
    let stats = store.stats().await;
    assert_eq!((stats.hits, stats.misses, stats.stores), (0, 1, 0));
}

#[tokio::test]
async fn test_open_removes_unreadable_entry_files() {
    let temp = TempDir::new().unwrap();
    let junk = temp.path().join("junk.json");
    tokio::fs::write(&junk, vec![b'x'; 5000]).await.unwrap();
    let unrelated = temp.path().join("notes.txt");
    tokio::fs::write(&unrelated, b"keep me").await.unwrap();

    let config = CacheConfig {
        max_size_bytes: 1000,
        ..CacheConfig::default()
    };
    let store = open(&temp, config).await;

    assert!(!junk.exists());
    assert!(unrelated.exists());
    assert_eq!(store.stats().await.total_size_bytes, 0);
    assert_eq!(store.config().max_size_bytes, 1000);
}

#[test]
fn test_key_codec_example() {
    let key = CacheKey::generate("abc123", "en", "manual", &BTreeMap::new()).unwrap();
    assert_eq!(key, "abc123_en_manual");

    let fields = CacheKey::parse(&key).unwrap().fields();
    let expected: BTreeMap<String, String> = [
        ("video_id", "abc123"),
        ("language", "en"),
        ("source", "manual"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    assert_eq!(fields, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_store_and_get() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(open(&temp, CacheConfig::default()).await);

    let mut tasks = Vec::new();
    for i in 0..16 {
        let store = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            let video_id = format!("vid{}", i % 4);
            let original = caption(&video_id, "en");
            for _ in 0..5 {
                store.store(&original, "manual", None, &BTreeMap::new()).await.unwrap();
                let cached = store
                    .get(&video_id, "en", "manual", &BTreeMap::new())
                    .await
                    .unwrap();
                // Writers to the same key store identical captions, so any
                // visible entry must be complete and equal
                assert_eq!(cached, Some(original.clone()));
            }
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }

    let stats = store.stats().await;
    assert_eq!(stats.entry_count, 4);
    assert_eq!(stats.stores, 80);
    assert_eq!(stats.hits, 80);
}
