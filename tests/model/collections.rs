//! Integration tests for collections
//!
//! Tests membership, keying, coercion, ordering, and querying.

use std::cmp::Ordering;
use std::ops::ControlFlow;
use std::rc::Rc;

use proptest::prelude::*;
use usual_foundation::{Attributes, SequentialIds, Value, attrs};
use usual_model::{
    Collection, CollectionConfig, Entity, EntityConfig, EntityFactory, FnFactory,
};

fn by_index(a: &Value, b: &Value) -> Ordering {
    a.attr("index")
        .partial_cmp(&b.attr("index"))
        .unwrap_or(Ordering::Equal)
}

fn ids(collection: &Collection) -> Vec<String> {
    collection.keys().iter().map(ToString::to_string).collect()
}

// =============================================================================
// Membership
// =============================================================================

#[test]
fn membership_round_trip() {
    let c = Collection::default();
    c.add(Value::Map(attrs! { "id" => "one" }));
    assert!(c.get("one").is_some());

    assert!(c.remove("one"));
    assert!(c.get("one").is_none());
    assert!(c.is_empty());
}

#[test]
fn re_adding_a_key_updates_in_place() {
    let c = Collection::seeded(
        [Value::Map(attrs! { "id" => "one", "prop" => 1, "prop2" => "two" })],
        CollectionConfig::default(),
    );
    c.add(Value::Map(attrs! { "id" => "one", "prop" => 2 }));

    let member = c.get("one").unwrap();
    assert_eq!(member.attr("prop"), Some(Value::Int(2)));
    assert_eq!(member.attr("prop2"), Some(Value::from("two")));
    assert_eq!(c.len(), 1);
}

#[test]
fn entity_members_update_through_entity() {
    let c = Collection::with_config(CollectionConfig::new().with_factory(EntityFactory::default()));
    let first = c.add(Value::Map(attrs! { "id" => "a", "n" => 1 })).unwrap();
    let again = c.add(Value::Map(attrs! { "id" => "a", "n" => 2 })).unwrap();

    assert_eq!(first, again);
    let entity = Entity::from_value(&first).unwrap();
    assert_eq!(entity.get("n"), Some(Value::Int(2)));
}

#[test]
fn duplicate_keys_in_one_batch_collapse() {
    let c = Collection::default();
    let result = c.add_all([
        Value::Map(attrs! { "id" => "a", "v" => 1 }),
        Value::Map(attrs! { "id" => "a", "v" => 2 }),
    ]);

    assert_eq!(result.len(), 2);
    assert_eq!(c.len(), 1);
    assert_eq!(c.get("a").and_then(|m| m.attr("v")), Some(Value::Int(2)));
}

#[test]
fn numeric_keys_and_string_lookups_agree() {
    let c = Collection::seeded([Value::Map(attrs! { "id" => 7 })], CollectionConfig::default());
    assert!(c.contains(7));
    assert!(c.contains("7"));
}

// =============================================================================
// Coercion
// =============================================================================

#[test]
fn factory_rejects_a_single_scalar() {
    let c = Collection::with_config(CollectionConfig::new().with_factory(EntityFactory::default()));
    assert_eq!(c.add(Value::from("x")), None);
    assert_eq!(c.len(), 0);
}

#[test]
fn factory_builds_entities_from_maps() {
    let factory = EntityFactory::new(EntityConfig::new().with_id_generator(Rc::new(SequentialIds::new())))
        .with_base(attrs! { "kind" => "widget" });
    let c = Collection::with_config(CollectionConfig::new().with_factory(factory));
    let member = c.add(Value::Map(attrs! { "name" => "w" })).unwrap();

    let entity = Entity::from_value(&member).unwrap();
    assert_eq!(entity.get("kind"), Some(Value::from("widget")));
    assert_eq!(entity.identity().as_str(), "m-1");
    // The entity's own id becomes its member key
    assert!(c.contains("m-1"));
}

#[test]
fn factory_may_drop_entries() {
    let c = Collection::with_config(CollectionConfig::new().with_factory(FnFactory(
        |raw: Attributes| {
            if raw.contains_key("skip") {
                Value::Nil
            } else {
                Value::Map(raw)
            }
        },
    )));
    let added = c.add_all([
        Value::Map(attrs! { "id" => "a" }),
        Value::Map(attrs! { "id" => "b", "skip" => true }),
    ]);
    assert_eq!(added.len(), 1);
    assert_eq!(ids(&c), vec!["a"]);
}

#[test]
fn alternate_id_property_with_entities() {
    let config = CollectionConfig::new()
        .with_id_property("anson")
        .with_factory(EntityFactory::default())
        .with_id_generator(Rc::new(SequentialIds::new()));
    let c = Collection::seeded(
        [
            Value::Map(attrs! { "id" => "one", "prop" => "one" }),
            Value::Map(attrs! { "anson" => "three", "prop" => "three" }),
        ],
        config,
    );

    let first = Entity::from_value(&c.at(0).unwrap()).unwrap();
    assert_eq!(first.get("anson"), Some(Value::from("cid-1")));
    assert_eq!(first.identity().as_str(), "one");
    assert!(c.get("one").is_none());
    assert_eq!(c.get(&first), c.at(0));
    assert_eq!(c.get("three"), c.at(1));
}

// =============================================================================
// Ordering
// =============================================================================

#[test]
fn comparator_orders_seed() {
    let c = Collection::seeded(
        [
            Value::Map(attrs! { "id" => "one", "index" => 1 }),
            Value::Map(attrs! { "id" => "two", "index" => 0 }),
        ],
        CollectionConfig::new().with_comparator(by_index),
    );
    assert_eq!(c.at(0).and_then(|m| m.attr("id")), Some(Value::from("two")));
    assert_eq!(c.at(1).and_then(|m| m.attr("id")), Some(Value::from("one")));
}

#[test]
fn comparator_is_stable() {
    let c = Collection::seeded(
        [
            Value::Map(attrs! { "id" => "a", "index" => 1 }),
            Value::Map(attrs! { "id" => "b", "index" => 0 }),
            Value::Map(attrs! { "id" => "c", "index" => 1 }),
        ],
        CollectionConfig::new().with_comparator(by_index),
    );
    assert_eq!(ids(&c), vec!["b", "a", "c"]);
}

#[test]
fn without_comparator_insertion_order_holds() {
    let c = Collection::default();
    for id in ["z", "a", "m"] {
        c.add(Value::Map(attrs! { "id" => id }));
    }
    assert_eq!(ids(&c), vec!["z", "a", "m"]);
    assert_eq!(c.index_of("a"), Some(1));
}

// =============================================================================
// Querying
// =============================================================================

#[test]
fn filter_keeps_configuration() {
    let c = Collection::seeded(
        [
            Value::Map(attrs! { "id" => "a", "index" => 2, "odd" => false }),
            Value::Map(attrs! { "id" => "b", "index" => 1, "odd" => true }),
            Value::Map(attrs! { "id" => "c", "index" => 3, "odd" => true }),
        ],
        CollectionConfig::new().with_comparator(by_index),
    );
    let odd = c.filter_by(&attrs! { "odd" => true });
    assert_eq!(ids(&odd), vec!["b", "c"]);

    odd.add(Value::Map(attrs! { "id" => "d", "index" => 0 }));
    assert_eq!(ids(&odd), vec!["d", "b", "c"]);
    assert_eq!(c.len(), 3);
}

#[test]
fn filter_with_builds_wrapper_types() {
    struct Tagged {
        inner: Collection,
        tag: &'static str,
    }

    let c = Collection::seeded(
        [Value::Map(attrs! { "id" => "a" }), Value::Map(attrs! { "id" => "b" })],
        CollectionConfig::default(),
    );
    let tagged = c.filter_with(
        |m| m.attr("id") == Some(Value::from("b")),
        |members, config, attributes| Tagged {
            inner: Collection::from_parts(members, config, attributes),
            tag: "filtered",
        },
    );
    assert_eq!(tagged.tag, "filtered");
    assert_eq!(ids(&tagged.inner), vec!["b"]);
}

#[test]
fn find_by_requires_every_key() {
    let c = Collection::seeded(
        [
            Value::Map(attrs! { "id" => "a", "x" => 1, "y" => 1 }),
            Value::Map(attrs! { "id" => "b", "x" => 1, "y" => 2 }),
        ],
        CollectionConfig::default(),
    );
    assert_eq!(
        c.find_by(&attrs! { "x" => 1, "y" => 2 }).and_then(|m| m.attr("id")),
        Some(Value::from("b"))
    );
    assert_eq!(c.find_by(&attrs! { "x" => 1, "z" => 1 }), None);
}

#[test]
fn positional_access() {
    let c = Collection::seeded(
        (1..=3).map(|i| Value::Map(attrs! { "id" => i })),
        CollectionConfig::default(),
    );
    assert_eq!(c.first(), c.at(0));
    assert_eq!(c.last(), c.at(2));
    assert_eq!(c.at(-3), c.first());
    assert_eq!(c.at(-4), None);
    assert_eq!(c.at(3), None);
}

#[test]
fn for_each_breaks_early() {
    let c = Collection::seeded(
        (1..=5).map(|i| Value::Map(attrs! { "id" => i })),
        CollectionConfig::default(),
    );
    let mut count = 0;
    c.for_each(|member, _| {
        count += 1;
        if member.attr("id") == Some(Value::Int(3)) {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    assert_eq!(count, 3);
}

#[test]
fn collection_attributes_ignore_items() {
    let c = Collection::new(
        [Value::Map(attrs! { "id" => "seeded" })],
        CollectionConfig::default(),
        [attrs! { "items" => vec![Value::Map(attrs! { "id" => "nope" })], "title" => "list" }],
    );
    assert_eq!(ids(&c), vec!["seeded"]);
    assert_eq!(c.entity().get("title"), Some(Value::from("list")));
}

// =============================================================================
// Properties
// =============================================================================

#[derive(Clone, Debug)]
enum Op {
    Add(u8),
    Remove(u8),
    Reset(Vec<u8>),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (1u8..12).prop_map(Op::Add),
        3 => (1u8..12).prop_map(Op::Remove),
        1 => prop::collection::vec(1u8..12, 0..6).prop_map(Op::Reset),
    ]
}

fn member(n: u8) -> Value {
    Value::Map(attrs! { "id" => i64::from(n) })
}

proptest! {
    #[test]
    fn index_and_order_describe_the_same_members(ops in prop::collection::vec(op(), 0..48)) {
        let c = Collection::default();
        for op in ops {
            match op {
                Op::Add(n) => {
                    c.add(member(n));
                }
                Op::Remove(n) => {
                    c.remove(i64::from(n));
                }
                Op::Reset(ns) => {
                    c.reset(ns.into_iter().map(member));
                }
            }
        }

        let keys = c.keys();
        let mut unique = keys.clone();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(unique.len(), keys.len());
        prop_assert_eq!(c.len(), keys.len());
        for (index, key) in keys.iter().enumerate() {
            let member = c.get(key).unwrap();
            prop_assert_eq!(c.index_of(&member), Some(index));
        }
    }
}
