//! Tests for the execution history.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use crate::history::{
    BODY_LIMIT, DeliveryStatus, FileLogStore, LoadResult, LogBook, LogEntry, LogStore,
    LogStoreError, Logger, MASK, MemoryLogStore, mask_headers, truncate_body,
};
use crate::settings::{Settings, StaticSettings};
use crate::time::mock::MockClock;

const DAY: u64 = 86_400;

fn entry(webhook_id: &str, timestamp: u64, code: u16) -> LogEntry {
    LogEntry {
        timestamp,
        webhook_id: webhook_id.to_string(),
        status_code: DeliveryStatus::Http(code),
        ..LogEntry::default()
    }
}

fn settings(retention_per_id: usize, ttl_days: u64) -> Arc<StaticSettings> {
    Arc::new(StaticSettings(Settings {
        retention_per_id,
        ttl_days,
        ..Settings::default()
    }))
}

mod masking {
    use super::*;

    #[test]
    fn sensitive_headers_are_masked() {
        let masked = mask_headers([
            ("Authorization", "Bearer abc"),
            ("X-API-Key", "k"),
            ("api_key", "k"),
            ("Api-Key", "k"),
            ("token", "t"),
            ("X-Auth-Token", "t"),
            ("Content-Type", "application/json"),
        ]);

        assert_eq!(masked["authorization"], MASK);
        assert_eq!(masked["x-api-key"], MASK);
        assert_eq!(masked["api_key"], MASK);
        assert_eq!(masked["api-key"], MASK);
        assert_eq!(masked["token"], MASK);
        assert_eq!(masked["x-auth-token"], MASK);
        assert_eq!(masked["content-type"], "application/json");
    }

    #[test]
    fn header_map_values_are_masked() {
        let mut headers = http::HeaderMap::new();
        headers.insert(
            http::header::AUTHORIZATION,
            http::HeaderValue::from_static("Bearer abc"),
        );
        headers.insert("x-request-id", http::HeaderValue::from_static("42"));

        let masked = crate::history::mask_header_map(&headers);
        assert_eq!(masked["authorization"], MASK);
        assert_eq!(masked["x-request-id"], "42");
    }
}

mod truncation {
    use super::*;

    #[test]
    fn short_body_is_unchanged() {
        assert_eq!(truncate_body("ok"), "ok");
        let exact = "a".repeat(BODY_LIMIT);
        assert_eq!(truncate_body(&exact), exact);
    }

    #[test]
    fn long_body_is_cut_with_ellipsis() {
        let body = "a".repeat(BODY_LIMIT + 10);
        let truncated = truncate_body(&body);

        assert_eq!(truncated.len(), BODY_LIMIT + 3);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn counts_characters_not_bytes() {
        let body = "ü".repeat(BODY_LIMIT + 1);
        let truncated = truncate_body(&body);

        assert_eq!(truncated.chars().count(), BODY_LIMIT + 3);
    }
}

mod delivery_status {
    use super::*;

    #[test]
    fn serializes_untagged() {
        assert_eq!(
            serde_json::to_value(DeliveryStatus::Http(404)).unwrap(),
            serde_json::json!(404)
        );
        assert_eq!(
            serde_json::to_value(DeliveryStatus::Transport("timeout".into())).unwrap(),
            serde_json::json!("timeout")
        );
    }

    #[test]
    fn success_only_for_2xx() {
        assert!(DeliveryStatus::Http(204).is_success());
        assert!(!DeliveryStatus::Http(500).is_success());
        assert!(!DeliveryStatus::Transport("timeout".into()).is_success());
    }
}

mod log_book {
    use super::*;

    #[test]
    fn append_prepends() {
        let mut book = LogBook::new();
        book.append(entry("a", 1, 200), 0, 0, 10);
        book.append(entry("a", 2, 201), 0, 0, 10);

        let bucket = book.bucket("a");
        assert_eq!(bucket.len(), 2);
        assert_eq!(bucket[0].status_code, DeliveryStatus::Http(201));
    }

    #[test]
    fn retention_keeps_newest() {
        let n = 4;
        let mut book = LogBook::new();
        for i in 0..(n + 5) {
            book.append(entry("a", 100, 200 + u16::try_from(i).unwrap()), n, 0, 100);
        }

        let codes: Vec<_> = book.bucket("a").iter().map(|e| e.status_code.clone()).collect();
        assert_eq!(
            codes,
            vec![
                DeliveryStatus::Http(208),
                DeliveryStatus::Http(207),
                DeliveryStatus::Http(206),
                DeliveryStatus::Http(205),
            ]
        );
    }

    #[test]
    fn ttl_drops_old_entries() {
        let now = 100 * DAY;
        let mut book = LogBook::new();
        book.append(entry("a", now - 10 * DAY, 200), 0, 0, now);
        book.append(entry("a", now - DAY, 201), 0, 0, now);
        book.append(entry("a", now, 202), 0, 7, now);

        let codes: Vec<_> = book.bucket("a").iter().map(|e| e.status_code.clone()).collect();
        assert_eq!(codes, vec![DeliveryStatus::Http(202), DeliveryStatus::Http(201)]);
    }

    #[test]
    fn buckets_are_independent() {
        let mut book = LogBook::new();
        book.append(entry("a", 1, 200), 1, 0, 1);
        book.append(entry("b", 1, 200), 1, 0, 1);
        book.append(entry("a", 1, 201), 1, 0, 1);

        assert_eq!(book.bucket("a").len(), 1);
        assert_eq!(book.bucket("b").len(), 1);
        assert!(book.bucket("c").is_empty());
    }

    #[test]
    fn remove_reports_count() {
        let mut book = LogBook::new();
        book.append(entry("a", 1, 200), 0, 0, 1);
        book.append(entry("a", 1, 200), 0, 0, 1);

        assert_eq!(book.remove("a"), 2);
        assert_eq!(book.remove("a"), 0);
        assert_eq!(book.webhook_ids().count(), 0);
    }
}

mod load_result {
    use super::*;

    #[test]
    fn into_book_is_empty_unless_loaded() {
        assert_eq!(LoadResult::NotFound.into_book(), LogBook::new());
        let corrupted = LoadResult::Corrupted {
            reason: "test".to_string(),
        };
        assert!(!corrupted.is_loaded());
        assert_eq!(corrupted.into_book(), LogBook::new());
    }

    #[test]
    fn unavailable_book_is_not_writable() {
        let unavailable = LoadResult::Unavailable {
            reason: "permission denied".to_string(),
        };
        assert!(matches!(
            unavailable.into_writable_book(),
            Err(LogStoreError::Unavailable(reason)) if reason == "permission denied"
        ));

        let corrupted = LoadResult::Corrupted {
            reason: "bad json".to_string(),
        };
        assert_eq!(corrupted.into_writable_book().unwrap(), LogBook::new());
    }
}

mod file_log_store {
    use super::*;

    #[test]
    fn load_returns_not_found_for_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = FileLogStore::new(dir.path().join("missing.json"));

        assert!(matches!(store.load(), LoadResult::NotFound));
    }

    #[tokio::test]
    async fn save_then_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FileLogStore::new(dir.path().join("nested").join("logs.json"));

        let mut book = LogBook::new();
        book.append(entry("a", 5, 200), 0, 0, 5);
        store.save(&book).await.unwrap();

        match store.load() {
            LoadResult::Loaded(loaded) => assert_eq!(loaded, book),
            other => panic!("expected Loaded, got {other:?}"),
        }
        assert!(!dir.path().join("nested").join("logs.json.tmp").exists());
    }

    #[test]
    fn invalid_json_is_corrupted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileLogStore::new(path);
        assert!(matches!(store.load(), LoadResult::Corrupted { .. }));
    }

    #[test]
    fn unreadable_bytes_are_unavailable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs.json");
        std::fs::write(&path, [b'{', 0xff, b'}']).unwrap();

        let store = FileLogStore::new(path);
        assert!(matches!(store.load(), LoadResult::Unavailable { .. }));
    }

    #[tokio::test]
    async fn lock_creates_sidecar_file() {
        let dir = TempDir::new().unwrap();
        let store = FileLogStore::new(dir.path().join("nested").join("logs.json"));

        let _lock = store.lock().await.unwrap();

        assert_eq!(store.lock_path(), dir.path().join("nested").join("logs.json.lock"));
        assert!(store.lock_path().exists());
    }

    #[tokio::test]
    async fn lock_is_exclusive_across_stores() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs.json");
        let first = FileLogStore::new(&path);
        let second = FileLogStore::new(&path);

        let held = first.lock().await.unwrap();
        let contended = tokio::time::timeout(Duration::from_millis(200), second.lock()).await;
        assert!(contended.is_err(), "second lock acquired while first was held");

        drop(held);
        let acquired = tokio::time::timeout(Duration::from_secs(5), second.lock()).await;
        assert!(matches!(acquired, Ok(Ok(_))));
    }

    #[test]
    fn other_version_is_corrupted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs.json");
        std::fs::write(&path, r#"{"version": 99, "webhooks": {}}"#).unwrap();

        let store = FileLogStore::new(path);
        match store.load() {
            LoadResult::Corrupted { reason } => assert!(reason.contains("99")),
            other => panic!("expected Corrupted, got {other:?}"),
        }
    }
}

mod logger {
    use super::*;

    fn logger(
        retention: usize,
        ttl_days: u64,
        clock: &Arc<MockClock>,
    ) -> Logger<Arc<MemoryLogStore>> {
        Logger::with_clock(
            Arc::new(MemoryLogStore::new()),
            settings(retention, ttl_days),
            clock.clone(),
        )
    }

    #[tokio::test]
    async fn stamps_timestamp_and_id() {
        let clock = Arc::new(MockClock::new(1_000));
        let logger = logger(0, 0, &clock);

        logger.log("crm", entry("ignored", 0, 200)).await;

        let entries = logger.entries("crm");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].timestamp, 1_000);
        assert_eq!(entries[0].webhook_id, "crm");
        assert!(logger.entries("ignored").is_empty());
    }

    #[tokio::test]
    async fn retention_trims_oldest() {
        let n = 3;
        let clock = Arc::new(MockClock::new(DAY));
        let logger = logger(n, 0, &clock);

        for i in 0..(n + 5) {
            clock.advance(1);
            logger.log("crm", entry("crm", 0, 200 + u16::try_from(i).unwrap())).await;
        }

        let entries = logger.entries("crm");
        assert_eq!(entries.len(), n);
        assert_eq!(entries[0].status_code, DeliveryStatus::Http(207));
        assert_eq!(entries[2].status_code, DeliveryStatus::Http(205));
        assert!(entries[0].timestamp > entries[2].timestamp);
    }

    #[tokio::test]
    async fn ttl_prunes_on_next_append() {
        let clock = Arc::new(MockClock::new(DAY));
        let logger = logger(50, 2, &clock);

        logger.log("crm", entry("crm", 0, 500)).await;
        clock.advance(3 * DAY);
        logger.log("crm", entry("crm", 0, 200)).await;

        let entries = logger.entries("crm");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status_code, DeliveryStatus::Http(200));
    }

    #[tokio::test]
    async fn starts_over_when_store_is_corrupted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs.json");
        std::fs::write(&path, "garbage").unwrap();

        let logger = Logger::new(FileLogStore::new(&path), settings(10, 0));
        logger.log("crm", entry("crm", 0, 200)).await;

        assert_eq!(logger.entries("crm").len(), 1);
    }

    #[tokio::test]
    async fn unreadable_store_keeps_history() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs.json");
        let logger = Logger::new(FileLogStore::new(&path), settings(10, 0));
        logger.log("a", entry("a", 0, 200)).await;
        logger.log("b", entry("b", 0, 200)).await;

        let mut bytes = std::fs::read(&path).unwrap();
        bytes.push(0xff);
        std::fs::write(&path, &bytes).unwrap();

        logger.log("c", entry("c", 0, 200)).await;
        assert_eq!(std::fs::read(&path).unwrap(), bytes);
        assert!(matches!(
            logger.clear("a").await,
            Err(LogStoreError::Unavailable(_))
        ));

        bytes.pop();
        std::fs::write(&path, &bytes).unwrap();
        assert_eq!(logger.entries("a").len(), 1);
        assert_eq!(logger.entries("b").len(), 1);
        assert!(logger.entries("c").is_empty());
    }

    #[tokio::test]
    async fn clear_removes_bucket() {
        let clock = Arc::new(MockClock::new(DAY));
        let logger = logger(0, 0, &clock);
        logger.log("crm", entry("crm", 0, 200)).await;
        logger.log("other", entry("other", 0, 200)).await;

        assert_eq!(logger.clear("crm").await.unwrap(), 1);
        assert!(logger.entries("crm").is_empty());
        assert_eq!(logger.entries("other").len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_are_serialized() {
        let clock = Arc::new(MockClock::new(DAY));
        let logger = Arc::new(logger(0, 0, &clock));

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let logger = logger.clone();
                tokio::spawn(async move { logger.log("crm", entry("crm", 0, 200)).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(logger.entries("crm").len(), 20);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn independent_loggers_on_one_file_keep_every_entry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs.json");
        let first = Arc::new(Logger::new(FileLogStore::new(&path), settings(0, 0)));
        let second = Arc::new(Logger::new(FileLogStore::new(&path), settings(0, 0)));

        let tasks: Vec<_> = (0..10)
            .flat_map(|_| [first.clone(), second.clone()])
            .map(|logger| {
                tokio::spawn(async move { logger.log("crm", entry("crm", 0, 200)).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(first.entries("crm").len(), 20);
        assert_eq!(second.entries("crm").len(), 20);
    }
}
