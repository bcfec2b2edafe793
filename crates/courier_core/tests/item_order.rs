use chrono::{DateTime, TimeZone, Utc};
use courier_core::FeedItem;

fn make_item(id: &str, published: Option<DateTime<Utc>>) -> FeedItem {
    FeedItem {
        id: id.to_string(),
        title: format!("item {id}"),
        link: None,
        published,
        source_name: "test".to_string(),
        summary_html: None,
    }
}

#[test]
fn items_sort_newest_first() {
    engine_logging::initialize_for_tests();
    let old = make_item("old", Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
    let mid = make_item("mid", Some(Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()));
    let new = make_item("new", Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()));

    let mut items = vec![old, new, mid];
    items.sort();

    let ids: Vec<&str> = items.iter().map(|item| item.id.as_str()).collect();
    assert_eq!(ids, vec!["new", "mid", "old"]);
}

#[test]
fn undated_items_sink_to_the_bottom() {
    let dated = make_item("dated", Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()));
    let undated = make_item("undated", None);

    let mut items = vec![undated, dated];
    items.sort();

    assert_eq!(items[0].id, "dated");
    assert_eq!(items[1].id, "undated");
}

#[test]
fn equal_ids_mean_the_same_delivery_target() {
    let a = make_item("same", Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()));
    let mut b = a.clone();
    b.title = "content drifted since the last fetch".to_string();
    assert_eq!(a.id, b.id);
}
