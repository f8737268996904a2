use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::store::IndexedStore;

/// Background task that rewrites the record log once enough appends have
/// piled up since the last compaction.
pub async fn run_compactor(store: Arc<IndexedStore>, threshold: u64, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        compact_if_due(&store, threshold).await;
    }
}

/// One compactor pass. Returns whether a compaction ran.
pub async fn compact_if_due(store: &IndexedStore, threshold: u64) -> bool {
    if !store.is_durable() {
        return false;
    }
    let appends = store.appends_since_compact().await;
    if appends < threshold {
        return false;
    }
    debug!(appends, threshold, "compaction due");
    match store.compact().await {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "record log compaction failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use std::path::PathBuf;

    fn test_log_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("roombook_test_compactor");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn user(i: usize) -> Record {
        Record::User(User {
            id: format!("u{i}"),
            name: format!("User {i}"),
            email: format!("u{i}@example.com"),
            role: Role::User,
            created_at: 0,
            updated_at: 0,
        })
    }

    #[tokio::test]
    async fn compacts_only_past_threshold() {
        let path = test_log_path("threshold.log");
        let store = IndexedStore::open(&path).unwrap();
        for i in 0..5 {
            store.put(user(i)).await.unwrap();
        }
        assert!(!compact_if_due(&store, 10).await);

        for i in 0..5 {
            store.put(user(i)).await.unwrap();
        }
        assert!(compact_if_due(&store, 10).await);
        assert_eq!(store.appends_since_compact().await, 0);

        drop(store);
        let reopened = IndexedStore::open(&path).unwrap();
        assert_eq!(reopened.count(RecordType::User), 5);
    }

    #[tokio::test]
    async fn in_memory_never_compacts() {
        let store = IndexedStore::in_memory();
        store.put(user(1)).await.unwrap();
        assert!(!compact_if_due(&store, 0).await);
    }

    #[tokio::test]
    async fn background_task_runs() {
        let path = test_log_path("background.log");
        let store = Arc::new(IndexedStore::open(&path).unwrap());
        for i in 0..3 {
            store.put(user(i)).await.unwrap();
        }
        let task = tokio::spawn(run_compactor(store.clone(), 1, Duration::from_millis(10)));
        tokio::time::sleep(Duration::from_millis(100)).await;
        task.abort();
        assert_eq!(store.appends_since_compact().await, 0);
    }
}
