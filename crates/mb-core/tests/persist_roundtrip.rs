//! Integration tests: items → persisted document → items.

use mb_core::{
    CanvasItem, FilterList, ImageItem, ImageMeta, ItemId, ItemPatch, Placement, TextAlign,
    TextItem, decode_items, encode_items,
};
use pretty_assertions::assert_eq;

fn sample_scene() -> Vec<CanvasItem> {
    let mut hero = CanvasItem::Image(ImageItem::from_meta(
        ItemId::intern("rt_hero"),
        ImageMeta {
            id: "artifact-hero".into(),
            image_path: "library/hero.jpg".into(),
            width: 640.0,
            height: 480.0,
            dominant_color: Some("#aa3322".into()),
            tone: Some("warm".into()),
            page_url: Some("https://example.com/hero".into()),
            tags: vec!["red".into(), "poster".into()],
            created_at: Some(1_700_000_000_000),
        },
        12.5,
        -40.0,
    ));
    hero.apply_patch(&ItemPatch {
        rotation: Some(33.0),
        scale: Some(0.75),
        scale_x: Some(-1.0),
        filters: Some(FilterList::from_iter(["grayscale".to_string(), "blur".to_string()])),
        ..ItemPatch::default()
    });

    let dropped = CanvasItem::Image(ImageItem::from_meta(
        ItemId::intern("rt_drop"),
        ImageMeta {
            image_path: "temp-images/paste-1.png".into(),
            width: 300.0,
            height: 200.0,
            ..ImageMeta::default()
        },
        400.0,
        0.0,
    ));

    let mut note = CanvasItem::Text(TextItem {
        placement: Placement::new(ItemId::intern("rt_note"), 5.0, 6.0),
        text: "mood: dusk".into(),
        font_size: 48.0,
        fill: "#ffeedd".into(),
        width: 320.0,
        height: 58.0,
        scale_x: 1.0,
        align: Some(TextAlign::Center),
        is_auto_edit: true,
    });
    note.set_selected(true);

    vec![hero, dropped, note]
}

fn save(items: &[CanvasItem]) -> String {
    serde_json::to_string_pretty(&encode_items(items)).unwrap()
}

fn load(document: &str) -> Vec<CanvasItem> {
    decode_items(serde_json::from_str(document).unwrap())
}

#[test]
fn load_of_save_matches_modulo_transient_fields() {
    let scene = sample_scene();
    let loaded = load(&save(&scene));

    let expected: Vec<CanvasItem> = scene.iter().map(CanvasItem::without_transient).collect();
    assert_eq!(loaded, expected);
}

#[test]
fn saving_twice_is_byte_identical() {
    let scene = sample_scene();
    let first = save(&scene);
    assert_eq!(first, save(&scene));
    assert_eq!(first, save(&load(&first)));
}

#[test]
fn list_order_is_preserved() {
    let mut scene = sample_scene();
    scene.rotate_left(1);
    let ids: Vec<ItemId> = load(&save(&scene)).iter().map(CanvasItem::id).collect();
    let expected: Vec<ItemId> = scene.iter().map(CanvasItem::id).collect();
    assert_eq!(ids, expected);
}

#[test]
fn ref_and_temp_ids() {
    let value = serde_json::to_value(encode_items(&sample_scene())).unwrap();
    assert_eq!(value[0]["kind"], "ref");
    assert_eq!(value[0]["id"], "artifact-hero");
    assert_eq!(value[1]["kind"], "temp");
    assert!(value[1].get("id").is_none());
}
