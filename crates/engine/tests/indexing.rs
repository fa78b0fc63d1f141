//! End-to-end indexing behavior: change events applied against a real store.

use std::{path::Path, sync::Arc};

use pretty_assertions::{assert_eq, assert_ne};
use vantus_engine::{
  config::EmbeddingConfig,
  db::{EngineDb, Tag},
  embedding::{EmbeddingProvider, HashProvider},
  extract::ExtractorSet,
  indexer::{EngineStatus, Indexer},
  watch::ChangeEvent,
};

const DIM: usize = 16;

async fn indexer_with_db(data_dir: &Path) -> (Indexer, Arc<EngineDb>) {
  let db = Arc::new(EngineDb::open_at_path(data_dir.join("lancedb"), DIM).await.unwrap());
  let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashProvider::new(&EmbeddingConfig {
    dimensions: DIM,
    ..Default::default()
  }));

  let indexer = Indexer::new(
    Arc::clone(&db),
    Arc::new(ExtractorSet::with_defaults()),
    provider,
    EngineStatus::new(),
    1024 * 1024,
  );

  (indexer, db)
}

#[tokio::test]
async fn created_event_stores_row_and_embedding() {
  let dir = tempfile::tempdir().unwrap();
  let file = dir.path().join("notes.txt");
  std::fs::write(&file, "project notes about the indexer").unwrap();

  let (indexer, db) = indexer_with_db(dir.path()).await;
  indexer.handle_event(&ChangeEvent::created(file.clone())).await.unwrap();

  let path = file.to_string_lossy();
  let stored = db.get_file(&path).await.unwrap().unwrap();
  assert_eq!(stored.name, "notes.txt");
  assert_eq!(stored.extension, "txt");
  assert!(stored.content_hash.is_some());
  assert!(stored.content.as_deref().unwrap().contains("indexer"));

  let embedding = db.get_embedding(&path).await.unwrap().unwrap();
  assert_eq!(embedding.vector.len(), DIM);
}

#[tokio::test]
async fn replaying_an_event_is_idempotent() {
  let dir = tempfile::tempdir().unwrap();
  let file = dir.path().join("doc.md");
  std::fs::write(&file, "the same document").unwrap();

  let (indexer, db) = indexer_with_db(dir.path()).await;
  let event = ChangeEvent::created(file.clone());
  indexer.handle_event(&event).await.unwrap();
  indexer.handle_event(&event).await.unwrap();
  // A scan plus a watcher may deliver the same change as Modified too
  indexer.handle_event(&ChangeEvent::modified(file.clone())).await.unwrap();

  let path = file.to_string_lossy();
  assert_eq!(db.count_files().await.unwrap(), 1);
  assert_eq!(db.count_embeddings_for(&path).await.unwrap(), 1);
}

#[tokio::test]
async fn modified_event_updates_content_and_hash() {
  let dir = tempfile::tempdir().unwrap();
  let file = dir.path().join("doc.txt");
  std::fs::write(&file, "first version").unwrap();

  let (indexer, db) = indexer_with_db(dir.path()).await;
  indexer.handle_event(&ChangeEvent::created(file.clone())).await.unwrap();

  let path = file.to_string_lossy().to_string();
  let first = db.get_file(&path).await.unwrap().unwrap();

  std::fs::write(&file, "second version with new words").unwrap();
  indexer.handle_event(&ChangeEvent::modified(file.clone())).await.unwrap();

  let second = db.get_file(&path).await.unwrap().unwrap();
  assert_ne!(first.content_hash, second.content_hash);
  assert!(second.content.as_deref().unwrap().contains("second"));
  assert_eq!(db.count_embeddings_for(&path).await.unwrap(), 1);
}

#[tokio::test]
async fn delete_event_cascades_embeddings_and_tag_links() {
  let dir = tempfile::tempdir().unwrap();
  let file = dir.path().join("tagged.txt");
  std::fs::write(&file, "tagged content").unwrap();

  let (indexer, db) = indexer_with_db(dir.path()).await;
  indexer.handle_event(&ChangeEvent::created(file.clone())).await.unwrap();

  let path = file.to_string_lossy().to_string();
  let tag = db
    .add_tag(&Tag {
      id: String::new(),
      name: "Work".to_string(),
      source: "user".to_string(),
    })
    .await
    .unwrap();
  db.tag_file(&path, &tag.id, 0.9).await.unwrap();
  assert_eq!(db.list_file_tags(&path).await.unwrap().len(), 1);

  std::fs::remove_file(&file).unwrap();
  indexer.handle_event(&ChangeEvent::deleted(file.clone())).await.unwrap();

  assert!(db.get_file(&path).await.unwrap().is_none());
  assert!(db.get_embedding(&path).await.unwrap().is_none());
  assert!(db.list_file_tags(&path).await.unwrap().is_empty());
  // The tag itself survives
  assert_eq!(db.count_tags().await.unwrap(), 1);
}

#[tokio::test]
async fn rename_preserves_the_stored_embedding() {
  let dir = tempfile::tempdir().unwrap();
  let old = dir.path().join("before.txt");
  std::fs::write(&old, "stable content across renames").unwrap();

  let (indexer, db) = indexer_with_db(dir.path()).await;
  indexer.handle_event(&ChangeEvent::created(old.clone())).await.unwrap();

  let old_path = old.to_string_lossy().to_string();
  let before = db.get_embedding(&old_path).await.unwrap().unwrap();

  let new = dir.path().join("after.txt");
  std::fs::rename(&old, &new).unwrap();
  indexer
    .handle_event(&ChangeEvent::renamed(old.clone(), new.clone()))
    .await
    .unwrap();

  let new_path = new.to_string_lossy().to_string();
  assert!(db.get_file(&old_path).await.unwrap().is_none());
  let moved = db.get_file(&new_path).await.unwrap().unwrap();
  assert_eq!(moved.name, "after.txt");

  let after = db.get_embedding(&new_path).await.unwrap().unwrap();
  assert_eq!(before.vector, after.vector, "Rename must not re-embed");
}

#[tokio::test]
async fn rename_with_unknown_source_indexes_fresh() {
  let dir = tempfile::tempdir().unwrap();
  let new = dir.path().join("appeared.txt");
  std::fs::write(&new, "moved in from outside any watched root").unwrap();

  let (indexer, db) = indexer_with_db(dir.path()).await;
  let never_indexed = dir.path().join("never-seen.txt");
  indexer
    .handle_event(&ChangeEvent::renamed(never_indexed, new.clone()))
    .await
    .unwrap();

  let stored = db.get_file(&new.to_string_lossy()).await.unwrap().unwrap();
  assert_eq!(stored.name, "appeared.txt");
}

#[tokio::test]
async fn unsupported_extension_is_metadata_only() {
  let dir = tempfile::tempdir().unwrap();
  let file = dir.path().join("image.qoi");
  std::fs::write(&file, [0x71, 0x6f, 0x69, 0x66]).unwrap();

  let (indexer, db) = indexer_with_db(dir.path()).await;
  indexer.handle_event(&ChangeEvent::created(file.clone())).await.unwrap();

  let path = file.to_string_lossy();
  let stored = db.get_file(&path).await.unwrap().unwrap();
  assert!(stored.content.is_none());
  assert!(stored.content_hash.is_some(), "Hash is computed even without text");
  assert!(db.get_embedding(&path).await.unwrap().is_none());
}

#[tokio::test]
async fn oversized_file_skips_extraction() {
  let dir = tempfile::tempdir().unwrap();
  let file = dir.path().join("huge.txt");
  std::fs::write(&file, "x".repeat(4096)).unwrap();

  let db = Arc::new(EngineDb::open_at_path(dir.path().join("lancedb"), DIM).await.unwrap());
  let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashProvider::new(&EmbeddingConfig {
    dimensions: DIM,
    ..Default::default()
  }));
  // Size cap below the file size
  let indexer = Indexer::new(
    Arc::clone(&db),
    Arc::new(ExtractorSet::with_defaults()),
    provider,
    EngineStatus::new(),
    1024,
  );

  indexer.handle_event(&ChangeEvent::created(file.clone())).await.unwrap();

  let path = file.to_string_lossy();
  let stored = db.get_file(&path).await.unwrap().unwrap();
  assert_eq!(stored.size_bytes, 4096);
  assert!(stored.content.is_none());
  assert!(db.get_embedding(&path).await.unwrap().is_none());
}

#[tokio::test]
async fn vanished_file_is_skipped_quietly() {
  let dir = tempfile::tempdir().unwrap();
  let ghost = dir.path().join("ghost.txt");

  let (indexer, db) = indexer_with_db(dir.path()).await;
  indexer.handle_event(&ChangeEvent::created(ghost)).await.unwrap();

  assert_eq!(db.count_files().await.unwrap(), 0);
}
