use chrono::Utc;

use linkdock::types::bookmark::{Bookmark, BookmarkPatch};
use linkdock::types::events::ChangeEvent;

fn row(id: &str) -> Bookmark {
    Bookmark {
        id: id.to_string(),
        title: "Docs".to_string(),
        url: "https://example.com".to_string(),
        owner_id: "u1".to_string(),
        created_at: Utc::now(),
        thumbnail_url: None,
    }
}

#[test]
fn test_record_id_covers_every_variant() {
    assert_eq!(ChangeEvent::Created(row("a")).record_id(), "a");
    assert_eq!(
        ChangeEvent::Deleted {
            id: "b".to_string()
        }
        .record_id(),
        "b"
    );
    assert_eq!(
        ChangeEvent::Updated {
            id: "c".to_string(),
            patch: BookmarkPatch::default(),
        }
        .record_id(),
        "c"
    );
}

#[test]
fn test_events_serialize_with_kind_tag() {
    let json = serde_json::to_value(ChangeEvent::Deleted {
        id: "a".to_string(),
    })
    .unwrap();
    assert_eq!(json["kind"], "deleted");
    assert_eq!(json["id"], "a");

    let json = serde_json::to_value(ChangeEvent::Created(row("b"))).unwrap();
    assert_eq!(json["kind"], "created");
    assert_eq!(json["id"], "b");
}

#[test]
fn test_events_deserialize_from_tagged_payload() {
    let event: ChangeEvent = serde_json::from_str(
        r#"{"kind":"updated","id":"c","patch":{"thumbnail_url":"https://t/c.png"}}"#,
    )
    .unwrap();
    match event {
        ChangeEvent::Updated { id, patch } => {
            assert_eq!(id, "c");
            assert_eq!(patch.thumbnail_url.as_deref(), Some("https://t/c.png"));
            assert_eq!(patch.title, None);
        }
        other => panic!("expected updated, got {:?}", other),
    }
}
