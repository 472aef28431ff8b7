//! Integration tests for entities
//!
//! Tests identity assignment, layered construction, updates, and serialization.

use std::cell::RefCell;
use std::rc::Rc;

use usual_foundation::{SequentialIds, Value, attrs};
use usual_model::{Entity, EntityConfig, events};

// =============================================================================
// Identity
// =============================================================================

#[test]
fn identity_is_written_back_as_id() {
    let config = EntityConfig::new().with_id_generator(Rc::new(SequentialIds::new()));
    let entity = Entity::with_config(config, [attrs! { "name" => "anon" }]);

    assert_eq!(entity.identity().as_str(), "m-1");
    assert_eq!(entity.get("id"), Some(Value::from("m-1")));
}

#[test]
fn numeric_ids_keep_their_value() {
    let entity = Entity::new([attrs! { "id" => 42 }]);
    assert_eq!(entity.identity().as_str(), "42");
    assert_eq!(entity.get("id"), Some(Value::Int(42)));
    assert_eq!(entity.serialize().get("id"), Some(&Value::Int(42)));
}

#[test]
fn configured_id_property_wins_over_id() {
    let entity = Entity::with_config(
        EntityConfig::new().with_id_property("code"),
        [attrs! { "id" => "plain", "code" => "coded" }],
    );
    assert_eq!(entity.identity().as_str(), "coded");
    assert_eq!(entity.get("id"), Some(Value::from("coded")));
}

#[test]
fn falsy_id_property_falls_back_to_id() {
    let entity = Entity::with_config(
        EntityConfig::new().with_id_property("code"),
        [attrs! { "id" => "plain", "code" => "" }],
    );
    assert_eq!(entity.identity().as_str(), "plain");
}

#[test]
fn generated_identities_are_unique() {
    let a = Entity::default();
    let b = Entity::default();
    assert_ne!(a.identity(), b.identity());
    assert!(a.identity().as_str().starts_with("m-"));
}

// =============================================================================
// Layered construction
// =============================================================================

#[test]
fn child_defaults_layer_over_base_defaults() {
    let base = attrs! {
        "kind" => "base",
        "settings" => attrs! { "a" => 1, "b" => 1 },
    };
    let child = attrs! {
        "kind" => "child",
        "settings" => attrs! { "b" => 2 },
    };
    let instance = attrs! { "settings" => attrs! { "c" => 3 } };

    let entity = Entity::new([instance, child, base]);
    assert_eq!(entity.get("kind"), Some(Value::from("child")));
    assert_eq!(
        entity.get("settings"),
        Some(Value::Map(attrs! { "a" => 1, "b" => 2, "c" => 3 }))
    );
}

#[test]
fn construction_does_not_alias_layers() {
    let layer = attrs! { "nested" => attrs! { "x" => 1 } };
    let entity = Entity::new([layer.clone()]);
    entity.update(attrs! { "nested" => attrs! { "x" => 2 } });

    assert_eq!(layer.get("nested"), Some(&Value::Map(attrs! { "x" => 1 })));
}

#[test]
fn reserved_config_sets_delimiter() {
    let entity = Entity::new([attrs! {
        "usual" => attrs! { "eventConfig" => attrs! { "delimiter" => "/" } },
    }]);
    let hits = Rc::new(RefCell::new(0));
    let h = Rc::clone(&hits);
    entity.on("change/*", move |_| *h.borrow_mut() += 1);

    entity.emit("change/name", &[]);
    entity.emit("change.name", &[]);
    assert_eq!(*hits.borrow(), 1);
}

// =============================================================================
// Updates
// =============================================================================

#[test]
fn update_reports_nested_diff() {
    let entity = Entity::new([attrs! {
        "id" => "e",
        "profile" => attrs! { "name" => "a", "age" => 1 },
    }]);
    let diff = entity
        .update(attrs! { "profile" => attrs! { "age" => 2 } })
        .unwrap();

    assert_eq!(diff.attributes(), &attrs! { "profile" => attrs! { "age" => 2 } });
    assert_eq!(
        entity.get("profile"),
        Some(Value::Map(attrs! { "name" => "a", "age" => 2 }))
    );
}

#[test]
fn empty_update_still_emits() {
    let entity = Entity::default();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    entity.on(events::UPDATE, move |e| sink.borrow_mut().push(e.args().to_vec()));

    assert_eq!(entity.update(attrs! {}), None);
    assert_eq!(*seen.borrow(), vec![vec![Value::Map(attrs! {}), Value::Nil]]);
}

#[test]
fn entity_valued_attributes_compare_by_instance() {
    let child = Entity::new([attrs! { "id" => "child" }]);
    let twin = Entity::new([attrs! { "id" => "child" }]);
    let parent = Entity::new([attrs! { "child" => Value::from(&child) }]);

    assert_eq!(parent.update(attrs! { "child" => Value::from(&child) }), None);
    assert!(parent.update(attrs! { "child" => Value::from(&twin) }).is_some());
}

// =============================================================================
// Serialization
// =============================================================================

#[test]
fn serialize_keeps_entity_references() {
    let child = Entity::new([attrs! { "id" => "child" }]);
    let parent = Entity::new([attrs! { "id" => "p", "child" => Value::from(&child), "_tmp" => 1 }]);

    let out = parent.serialize();
    assert_eq!(out.get("child"), Some(&Value::from(&child)));
    assert!(!out.contains_key("_tmp"));
}

#[cfg(feature = "serde")]
#[test]
fn serde_writes_visible_attributes() {
    let child = Entity::new([attrs! { "id" => "child", "_hidden" => true }]);
    let parent = Entity::new([attrs! { "id" => "p", "child" => Value::from(&child), "n" => 1 }]);

    let json = serde_json::to_value(&parent).unwrap();
    assert_eq!(
        json,
        serde_json::json!({ "id": "p", "n": 1, "child": { "id": "child" } })
    );
}
