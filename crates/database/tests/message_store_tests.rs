use std::time::Duration;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use parlor_chats::{ChatError, ChatMessage, MessageStore};
use parlor_config::DatabaseConfig;
use parlor_database::{initialize_database, SqliteMessageStore};

async fn store() -> (SqliteMessageStore, TempDir) {
    let temp_dir = TempDir::new().expect("temp dir");
    let config = DatabaseConfig {
        url: format!("sqlite://{}", temp_dir.path().join("relay.db").display()),
        max_connections: 2,
    };
    let pool = initialize_database(&config).await.expect("database initializes");
    (SqliteMessageStore::new(pool), temp_dir)
}

#[tokio::test]
async fn saved_message_reads_back_unchanged() {
    let (store, _dir) = store().await;
    let message = ChatMessage::new("r1", "u1", "hello from sqlite");

    store.save(&message).await.expect("save succeeds");
    let history = store.list_by_room("r1", 10).await.expect("list succeeds");

    assert_eq!(history, vec![message]);
}

#[tokio::test]
async fn history_is_latest_first_window_returned_oldest_first() {
    let (store, _dir) = store().await;

    for (second, content) in [(1, "one"), (2, "two"), (3, "three"), (4, "four")] {
        let mut message = ChatMessage::new("r1", "u1", content);
        message.created_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, second).unwrap();
        store.save(&message).await.unwrap();
    }
    store
        .save(&ChatMessage::new("r2", "u2", "elsewhere"))
        .await
        .unwrap();

    let history = store.list_by_room("r1", 2).await.unwrap();
    let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["three", "four"]);
}

#[tokio::test]
async fn messages_with_equal_timestamps_keep_insertion_order() {
    let (store, _dir) = store().await;
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

    for content in ["a", "b", "c"] {
        let mut message = ChatMessage::new("r1", "u1", content);
        message.created_at = at;
        store.save(&message).await.unwrap();
    }

    let contents: Vec<_> = store
        .list_by_room("r1", 10)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(contents, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn duplicate_id_is_a_storage_error() {
    let (store, _dir) = store().await;
    let message = ChatMessage::new("r1", "u1", "once");

    store.save(&message).await.unwrap();
    let err = store.save(&message).await.expect_err("duplicate rejected");
    assert!(matches!(err, ChatError::Storage { .. }));
}

#[tokio::test]
async fn closed_pool_surfaces_storage_error() {
    let (store, _dir) = store().await;
    store.pool().close().await;

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        store.save(&ChatMessage::new("r1", "u1", "late")),
    )
    .await
    .expect("save returns");
    assert!(matches!(result, Err(ChatError::Storage { .. })));
}
