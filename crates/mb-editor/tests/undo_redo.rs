//! Integration tests: undo/redo history (mb-editor).
//!
//! Drives the CanvasStore against in-memory storage and checks both the
//! live scene and what reached storage after each history move.

use mb_core::{CanvasItem, EngineConfig, ImageMeta, ItemId, ItemPatch};
use mb_editor::CanvasStore;
use mb_storage::{MemoryStorage, PersistenceGateway};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn setup_with(config: EngineConfig) -> (Arc<MemoryStorage>, CanvasStore) {
    init_logging();
    let storage = Arc::new(MemoryStorage::new());
    let gateway = PersistenceGateway::new(storage.clone());
    (storage, CanvasStore::new(gateway, config))
}

fn setup() -> (Arc<MemoryStorage>, CanvasStore) {
    setup_with(EngineConfig::default())
}

fn library_image(name: &str) -> ImageMeta {
    ImageMeta {
        id: format!("artifact-{name}"),
        image_path: format!("library/{name}.png"),
        width: 100.0,
        height: 100.0,
        ..ImageMeta::default()
    }
}

fn persistent(items: &[CanvasItem]) -> Vec<CanvasItem> {
    items.iter().map(CanvasItem::without_transient).collect()
}

fn stored_ids(storage: &MemoryStorage, canvas: &str) -> Vec<String> {
    storage
        .items_document(canvas)
        .and_then(|doc| doc.as_array().cloned())
        .unwrap_or_default()
        .iter()
        .map(|entry| entry["canvasId"].as_str().unwrap_or_default().to_string())
        .collect()
}

// ─── Scenario ───────────────────────────────────────────────────────────

#[tokio::test]
async fn moodboard_add_undo_redo() {
    let (storage, mut store) = setup();
    store.create_canvas("Moodboard").await.unwrap();
    store.switch_canvas("Moodboard").await.unwrap();

    let a = store.add_image(library_image("a"), Some((0.0, 0.0)));
    let b = store.add_image(
        ImageMeta {
            image_path: "temp-images/b.png".into(),
            width: 80.0,
            height: 60.0,
            ..ImageMeta::default()
        },
        None,
    );
    assert!(!store.commit(), "adds already committed");
    store.wait_for_saves().await;

    let doc = storage.items_document("Moodboard").unwrap();
    let entries = doc.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["canvasId"], a.as_str());
    assert_eq!(entries[0]["kind"], "ref");
    assert_eq!(entries[0]["id"], "artifact-a");
    assert_eq!(entries[1]["canvasId"], b.as_str());
    assert_eq!(entries[1]["kind"], "temp");
    assert!(entries[1].get("id").is_none());

    assert!(store.undo());
    let ids: Vec<ItemId> = store.items().iter().map(CanvasItem::id).collect();
    assert_eq!(ids, vec![a]);
    store.wait_for_saves().await;
    assert_eq!(stored_ids(&storage, "Moodboard"), vec![a.to_string()]);

    assert!(store.redo());
    let ids: Vec<ItemId> = store.items().iter().map(CanvasItem::id).collect();
    assert_eq!(ids, vec![a, b]);
    store.wait_for_saves().await;
    assert_eq!(
        stored_ids(&storage, "Moodboard"),
        vec![a.to_string(), b.to_string()]
    );
}

// ─── Round trips ────────────────────────────────────────────────────────

#[tokio::test]
async fn undo_all_then_redo_all_replays_every_state() {
    let (_storage, mut store) = setup();
    let mut states = vec![persistent(store.items())];

    let a = store.add_image(library_image("a"), None);
    states.push(persistent(store.items()));
    let t = store.add_text(10.0, 10.0, Some(32.0));
    states.push(persistent(store.items()));
    store.update(a, &ItemPatch::rotation(45.0));
    states.push(persistent(store.items()));
    store.update(t, &ItemPatch::text("Mood"));
    states.push(persistent(store.items()));
    store.update(a, &ItemPatch::scale(2.5));
    states.push(persistent(store.items()));
    store.remove(t);
    states.push(persistent(store.items()));

    for expected in states.iter().rev().skip(1) {
        assert!(store.undo());
        assert_eq!(&persistent(store.items()), expected);
    }
    assert!(!store.can_undo());

    for expected in states.iter().skip(1) {
        assert!(store.redo());
        assert_eq!(&persistent(store.items()), expected);
    }
    assert!(!store.can_redo());
}

#[tokio::test]
async fn boundaries_are_no_ops() {
    let (storage, mut store) = setup();
    assert!(!store.undo());
    assert!(!store.redo());

    store.add_text(0.0, 0.0, None);
    store.wait_for_saves().await;
    let before = store.snapshot();
    storage.clear_writes();

    assert!(!store.redo());
    assert_eq!(store.snapshot(), before);
    assert!(storage.writes().is_empty(), "no-op redo writes nothing");
}

#[tokio::test]
async fn undo_clears_selection() {
    let (_storage, mut store) = setup();
    let a = store.add_image(library_image("a"), None);
    store.add_image(library_image("b"), None);
    store.select(&[a]);

    store.undo();
    assert!(store.selected_ids().is_empty());
    assert!(store.items().iter().all(|item| !item.is_selected()));
}

#[tokio::test]
async fn history_cap_limits_undo_depth() {
    let config = EngineConfig {
        history_depth: 5,
        ..EngineConfig::default()
    };
    let (_storage, mut store) = setup_with(config);
    let id = store.add_text(0.0, 0.0, None);
    for i in 1..=10 {
        store.update(id, &ItemPatch::position(i as f64, 0.0));
    }

    let mut steps = 0;
    while store.undo() {
        steps += 1;
    }
    assert_eq!(steps, 4);
    assert_eq!(store.item(id).unwrap().placement().x, 6.0);
}

#[tokio::test]
async fn live_edits_after_undo_do_not_leak_into_history() {
    let (_storage, mut store) = setup();
    let id = store.add_text(0.0, 0.0, None);
    store.update(id, &ItemPatch::position(50.0, 0.0));
    store.undo();

    store.update_transient(id, &ItemPatch::position(999.0, 0.0));
    store.redo();
    assert_eq!(store.item(id).unwrap().placement().x, 50.0);
    store.undo();
    assert_eq!(store.item(id).unwrap().placement().x, 0.0);
}

#[tokio::test]
async fn storage_failures_leave_memory_authoritative() {
    let (storage, mut store) = setup();
    storage.set_fail_writes(true);

    let id = store.add_text(0.0, 0.0, None);
    store.update(id, &ItemPatch::text("still here"));
    store.wait_for_saves().await;
    assert!(storage.writes().is_empty());
    assert_eq!(store.items().len(), 1);

    storage.set_fail_writes(false);
    store.undo();
    store.wait_for_saves().await;
    assert_eq!(stored_ids(&storage, "Default"), vec![id.to_string()]);
}

#[tokio::test]
async fn non_positive_scale_never_lands() {
    let (_storage, mut store) = setup();
    let id = store.add_image(library_image("a"), None);
    store.update(id, &ItemPatch::scale(-1.0));
    store.update(id, &ItemPatch::scale(0.0));
    assert_eq!(store.item(id).unwrap().placement().scale, 1.0);
    assert!(store.items().iter().all(|item| item.placement().scale > 0.0));
}
