//! Property tests for the chain record mapper.
//!
//! Uses proptest to verify:
//! 1. Slugs are stable: slugifying a slug changes nothing.
//! 2. Case and spacing variants of a column name share one slug.
//! 3. Priority and role codes map totally, with unknown codes defaulted.
//! 4. Loosely typed ids, options and numbers decode the same way whatever
//!    shape the node returns them in.
//! 5. `map_task` never panics on arbitrary field bags.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;
use serde_json::{Value, json};
use toad::mapper::{
    as_u64, column_defs, map_role, map_task, ms_to_rfc3339, normalize_id, slugify, unwrap_option,
};
use toad_proto::model::{Priority, Role};
use toad_proto::object::ObjectId;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_words() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[A-Za-z0-9]{1,8}", 1..5)
}

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<u64>().prop_map(|n| json!(n)),
        any::<i64>().prop_map(|n| json!(n)),
        ".{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::hash_map("[a-z_]{1,12}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn arb_task_fields() -> impl Strategy<Value = Value> {
    let keys = prop::sample::select(vec![
        "title",
        "description",
        "column",
        "priority",
        "due_at_ms",
        "tags",
        "assignees",
        "milestone",
        "is_encrypted",
        "subtasks",
        "comments",
        "created_at_ms",
    ]);
    prop::collection::vec((keys, arb_json()), 0..12).prop_map(|pairs| {
        Value::Object(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    })
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn slugify_is_idempotent(name in "[A-Za-z0-9 \t-]{0,30}") {
        let once = slugify(&name);
        prop_assert_eq!(slugify(&once), once.clone());
        prop_assert!(!once.chars().any(char::is_whitespace));
    }

    #[test]
    fn case_and_spacing_variants_collide(words in arb_words(), gap in 1usize..4) {
        let canonical = words.join(" ");
        let shouted = words.join(&" ".repeat(gap)).to_uppercase();
        prop_assert_eq!(slugify(&canonical), slugify(&shouted));
    }

    #[test]
    fn column_ids_are_slugs_of_titles(names in prop::collection::vec("[A-Za-z ]{1,16}", 1..6)) {
        let defs = column_defs(&names);
        prop_assert_eq!(defs.len(), names.len());
        for (def, name) in defs.iter().zip(&names) {
            prop_assert_eq!(&def.title, name);
            prop_assert_eq!(def.id.as_str(), slugify(name));
        }
    }

    #[test]
    fn priority_codes_are_total(code in any::<u64>()) {
        let priority = Priority::from_code(code);
        if code <= 2 {
            prop_assert_eq!(u64::from(priority.code()), code);
        } else {
            prop_assert_eq!(priority, Priority::Medium);
        }
    }

    #[test]
    fn role_ordinals_are_total(ordinal in any::<u64>()) {
        let role = map_role(Some(&json!(ordinal)));
        if ordinal <= 3 {
            prop_assert_eq!(u64::from(role.ordinal()), ordinal);
        } else {
            prop_assert_eq!(role, Role::Viewer);
        }
    }

    #[test]
    fn id_shapes_agree(id in "0x[0-9a-f]{1,64}", key in prop::sample::select(vec!["id", "bytes", "value"])) {
        let bare = normalize_id(&json!(id));
        prop_assert_eq!(bare.as_deref(), Some(id.as_str()));
        prop_assert_eq!(normalize_id(&json!({ key: id })), bare.clone());
        prop_assert_eq!(normalize_id(&json!({ "id": { key: id } })), bare);
    }

    #[test]
    fn u64_shapes_agree(n in any::<u64>()) {
        prop_assert_eq!(as_u64(&json!(n)), Some(n));
        prop_assert_eq!(as_u64(&json!(n.to_string())), Some(n));
        let wrapped = json!({ "vec": [n.to_string()] });
        prop_assert_eq!(unwrap_option(&wrapped).and_then(as_u64), Some(n));
    }

    #[test]
    fn timestamps_round_trip(ms in 0u64..253_402_300_799_000) {
        let text = ms_to_rfc3339(ms).unwrap();
        let parsed = chrono::DateTime::parse_from_rfc3339(&text).unwrap();
        prop_assert_eq!(u64::try_from(parsed.timestamp_millis()).unwrap(), ms);
    }

    #[test]
    fn map_task_accepts_any_field_bag(fields in arb_task_fields()) {
        let task = map_task(&ObjectId::new("0x7a"), &ObjectId::new("0xb0"), &fields, None);
        prop_assert!(!task.title.is_empty());
        prop_assert_eq!(task.chain.object_id.clone(), Some(ObjectId::new("0x7a")));
        prop_assert!(!task.column_id().as_str().chars().any(char::is_whitespace));
    }
}

#[test]
fn missing_role_is_contributor() {
    assert_eq!(map_role(None), Role::Contributor);
    assert_eq!(map_role(Some(&json!({"vec": []}))), Role::Contributor);
    assert_eq!(map_role(Some(&json!("2"))), Role::Commenter);
}
