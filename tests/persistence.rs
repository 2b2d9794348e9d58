//! Integration tests for the SQLite-backed state repository.

use std::sync::Arc;

use tokenwatch::{
    engine::DedupStore,
    models::ActivityKind,
    persistence::{sqlite::SqliteStateRepository, KeyValueStore},
    test_helpers::CollectionBuilder,
};

async fn setup_db() -> SqliteStateRepository {
    let repo = SqliteStateRepository::new("sqlite::memory:")
        .await
        .expect("Failed to set up in-memory database");
    repo.run_migrations().await.expect("Failed to run migrations");
    repo
}

#[tokio::test]
async fn dedup_sets_roundtrip_through_sqlite() {
    let repo = Arc::new(setup_db().await);
    let collection = CollectionBuilder::new("Test").build();

    let mut dedup = DedupStore::load(Arc::clone(&repo), &collection).await.unwrap();
    dedup.add(ActivityKind::Sale, "1-0xaaa");
    dedup.add(ActivityKind::Sale, "2-0xbbb");
    dedup.add(ActivityKind::Mint, "3-0xccc");
    dedup.flush().await.unwrap();

    let reloaded = DedupStore::load(Arc::clone(&repo), &collection).await.unwrap();
    assert!(reloaded.contains(ActivityKind::Sale, "1-0xaaa"));
    assert!(reloaded.contains(ActivityKind::Sale, "2-0xbbb"));
    assert!(reloaded.contains(ActivityKind::Mint, "3-0xccc"));
    assert!(!reloaded.contains(ActivityKind::Burn, "1-0xaaa"));
}

#[tokio::test]
async fn malformed_persisted_entries_are_pruned_on_load() {
    let repo = Arc::new(setup_db().await);
    let collection = CollectionBuilder::new("Test").build();
    let key = format!("dedup:{}:sale", collection.id());

    // A legacy or corrupt set: two valid entries around junk.
    repo.set_json_state(
        &key,
        &vec![
            "1-0xaaa".to_string(),
            "junk".to_string(),
            "not numeric-0xbbb".to_string(),
            "2-0xccc".to_string(),
        ],
    )
    .await
    .unwrap();

    let mut dedup = DedupStore::load(Arc::clone(&repo), &collection).await.unwrap();
    assert!(dedup.contains(ActivityKind::Sale, "1-0xaaa"));
    assert!(dedup.contains(ActivityKind::Sale, "2-0xccc"));
    assert_eq!(dedup.len(ActivityKind::Sale), 2);

    // The cleaned set is rewritten.
    dedup.flush().await.unwrap();
    let persisted: Vec<String> = repo.get_json_state(&key).await.unwrap().unwrap();
    assert_eq!(persisted, vec!["1-0xaaa".to_string(), "2-0xccc".to_string()]);
}

#[tokio::test]
async fn collections_do_not_share_dedup_keys() {
    let repo = Arc::new(setup_db().await);
    let collection_a = CollectionBuilder::new("A")
        .contract_address("0xaaaa000000000000000000000000000000000001")
        .build();
    let collection_b = CollectionBuilder::new("B")
        .contract_address("0xbbbb000000000000000000000000000000000002")
        .build();

    let mut dedup_a = DedupStore::load(Arc::clone(&repo), &collection_a).await.unwrap();
    dedup_a.add(ActivityKind::Sale, "1-0xaaa");
    dedup_a.flush().await.unwrap();

    let dedup_b = DedupStore::load(Arc::clone(&repo), &collection_b).await.unwrap();
    assert!(!dedup_b.contains(ActivityKind::Sale, "1-0xaaa"));
}

#[tokio::test]
async fn capacity_overflow_is_persisted_trimmed() {
    let repo = Arc::new(setup_db().await);
    let collection = CollectionBuilder::new("Test").max_known_sales(3).build();
    let key = format!("dedup:{}:sale", collection.id());

    let mut dedup = DedupStore::load(Arc::clone(&repo), &collection).await.unwrap();
    for i in 0..5 {
        dedup.add(ActivityKind::Sale, &format!("{i}-0xaaa"));
    }
    dedup.flush().await.unwrap();

    let persisted: Vec<String> = repo.get_json_state(&key).await.unwrap().unwrap();
    assert_eq!(
        persisted,
        vec!["2-0xaaa".to_string(), "3-0xaaa".to_string(), "4-0xaaa".to_string()]
    );
}
