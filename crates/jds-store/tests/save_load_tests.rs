#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use common::*;
use jds_core::{JdsOptions, SharedEntity};
use jds_store::{LoadEngine, LoadFilter, SaveEngine};

fn save(registry: &jds_core::MetadataRegistry, conn: &mut jds_store::connection::sqlite::SqliteConnection, entities: &[SharedEntity]) {
    SaveEngine::new(registry, JdsOptions::default())
        .save(entities, conn)
        .unwrap();
}

fn load_one(
    registry: &jds_core::MetadataRegistry,
    conn: &mut jds_store::connection::sqlite::SqliteConnection,
    type_id: u64,
    uuid: &str,
) -> SharedEntity {
    let mut loaded = LoadEngine::new(registry, &JdsOptions::default())
        .load_all(type_id, &LoadFilter::by_uuid(uuid), conn)
        .unwrap();
    assert_eq!(loaded.len(), 1, "expected exactly one instance of {}", uuid);
    loaded.remove(0)
}

#[test]
fn test_every_value_kind_round_trips() {
    // Given: a sample with every scalar kind set and populated collections
    let registry = registry();
    let mut conn = database();
    let sample = full_sample(&registry);
    {
        let mut entity = sample.write();
        entity
            .set(&TAGS, vec!["a".to_string(), "b".to_string(), "a".to_string()])
            .unwrap();
        entity.set(&SCORES, vec![0.5, 1.5]).unwrap();
        entity
            .set(&HISTORY, vec![Status::Retired, Status::Active])
            .unwrap();
    }

    // When: saving and loading it back
    save(&registry, &mut conn, &[sample.clone()]);
    let loaded = load_one(&registry, &mut conn, SAMPLE, &sample.uuid());

    // Then: the loaded instance equals the saved one, collection order included
    assert_eq!(*loaded.read(), *sample.read());
    assert_eq!(
        loaded.read().get(&HISTORY),
        Some(vec![Status::Retired, Status::Active])
    );
    assert_eq!(loaded.read().get(&STATUS), Some(Status::Active));
}

#[test]
fn test_unset_fields_load_as_defaults() {
    // Given: a sample with a single field set
    let registry = registry();
    let mut conn = database();
    let mut entity = registry.create(SAMPLE).unwrap();
    entity.set(&TEXT, "only".to_string()).unwrap();
    let sample = SharedEntity::from(entity);

    // When: round tripping it
    save(&registry, &mut conn, &[sample.clone()]);
    let loaded = load_one(&registry, &mut conn, SAMPLE, &sample.uuid());

    // Then: scalars read as defaults and collections are empty
    let loaded = loaded.read();
    assert_eq!(loaded.get(&TEXT), Some("only".to_string()));
    assert_eq!(loaded.get(&INTEGER), None);
    assert_eq!(loaded.get_or_default(&INTEGER), 0);
    assert_eq!(loaded.get_or_default(&STATUS), Status::Unknown);
    assert_eq!(loaded.get(&TAGS), Some(Vec::new()));
    assert_eq!(loaded.get(&DATES), Some(Vec::new()));
}

#[test]
fn test_each_save_writes_a_new_version() {
    // Given: a person saved twice with a change in between
    let registry = registry();
    let mut conn = database();
    let alice = person(&registry, "Alice", 30);
    save(&registry, &mut conn, &[alice.clone()]);
    alice.write().set(&AGE, 31).unwrap();
    save(&registry, &mut conn, &[alice.clone()]);

    // Then: both versions are stored, the latest is loaded by default
    assert_eq!(alice.read().edit_version(), 2);
    assert_eq!(
        count(&mut conn, "SELECT COUNT(*) FROM jds_entity_overview"),
        2
    );
    let latest = load_one(&registry, &mut conn, PERSON, &alice.uuid());
    assert_eq!(latest.read().edit_version(), 2);
    assert_eq!(latest.read().get(&AGE), Some(31));

    // And: a version range returns both, oldest first
    let versions = LoadEngine::new(&registry, &JdsOptions::default())
        .load_all(
            PERSON,
            &LoadFilter::ByVersionRange {
                uuids: vec![alice.uuid()],
                from: 1,
                to: 2,
            },
            &mut conn,
        )
        .unwrap();
    let ages: Vec<Option<i32>> = versions.iter().map(|e| e.read().get(&AGE)).collect();
    assert_eq!(ages, vec![Some(30), Some(31)]);
}

#[test]
fn test_shrunk_collection_loads_without_stale_items() {
    // Given: a collection saved with five items, then with three
    let registry = registry();
    let mut conn = database();
    let sample = full_sample(&registry);
    let five: Vec<String> = (1..=5).map(|i| format!("t{}", i)).collect();
    sample.write().set(&TAGS, five).unwrap();
    save(&registry, &mut conn, &[sample.clone()]);
    let three: Vec<String> = (1..=3).map(|i| format!("t{}", i)).collect();
    sample.write().set(&TAGS, three.clone()).unwrap();
    save(&registry, &mut conn, &[sample.clone()]);

    // When: loading the latest version
    let loaded = load_one(&registry, &mut conn, SAMPLE, &sample.uuid());

    // Then: exactly the three current items come back
    assert_eq!(loaded.read().get(&TAGS), Some(three));
    assert_eq!(
        count(
            &mut conn,
            "SELECT COUNT(*) FROM jds_store_text_collection WHERE edit_version = 2"
        ),
        3
    );
}

#[test]
fn test_resaving_same_version_replaces_collection_rows() {
    // Given: a collection row set written for version 1
    let registry = registry();
    let mut conn = database();
    let sample = full_sample(&registry);
    sample
        .write()
        .set(&TAGS, vec!["x".into(), "y".into(), "z".into()])
        .unwrap();
    save(&registry, &mut conn, &[sample.clone()]);

    // When: the in-memory version is rolled back and the instance saved again with fewer items
    sample.write().overview_mut().edit_version = 0;
    sample.write().set(&TAGS, vec!["x".into()]).unwrap();
    save(&registry, &mut conn, &[sample.clone()]);

    // Then: the delete-then-insert left a single row for that version
    assert_eq!(
        count(
            &mut conn,
            "SELECT COUNT(*) FROM jds_store_text_collection WHERE edit_version = 1"
        ),
        1
    );
}

#[test]
fn test_shared_child_is_written_once_and_loaded_once() {
    // Given: two parents referencing the same child
    let registry = registry();
    let mut conn = database();
    let child = node(&registry, "shared");
    let first = node(&registry, "first");
    let second = node(&registry, "second");
    first.write().set(&CHILDREN, vec![child.clone()]).unwrap();
    second.write().set(&CHILDREN, vec![child.clone()]).unwrap();

    // When: saving both parents in one call
    save(&registry, &mut conn, &[first.clone(), second.clone()]);

    // Then: one overview row for the child, one binding per parent
    let child_rows = count(
        &mut conn,
        &format!(
            "SELECT COUNT(*) FROM jds_entity_overview WHERE uuid = '{}'",
            child.uuid()
        ),
    );
    assert_eq!(child_rows, 1);
    let bindings = count(
        &mut conn,
        &format!(
            "SELECT COUNT(*) FROM jds_entity_binding WHERE child_uuid = '{}'",
            child.uuid()
        ),
    );
    assert_eq!(bindings, 2);

    // And: loading both parents yields a single shared child instance
    let loaded = LoadEngine::new(&registry, &JdsOptions::default())
        .load_all(
            NODE,
            &LoadFilter::ByUuids(vec![first.uuid(), second.uuid()]),
            &mut conn,
        )
        .unwrap();
    assert_eq!(loaded.len(), 2);
    let a = loaded[0].read().get(&CHILDREN).unwrap();
    let b = loaded[1].read().get(&CHILDREN).unwrap();
    assert!(SharedEntity::ptr_eq(&a[0], &b[0]));
    assert_eq!(a[0].read().get(&LABEL), Some("shared".to_string()));
}

#[test]
fn test_nested_children_keep_order_and_parent_link() {
    let registry = registry();
    let mut conn = database();
    let parent = node(&registry, "parent");
    let kids: Vec<SharedEntity> = ["c", "a", "b"].iter().map(|l| node(&registry, l)).collect();
    parent.write().set(&CHILDREN, kids.clone()).unwrap();

    save(&registry, &mut conn, &[parent.clone()]);
    let loaded = load_one(&registry, &mut conn, NODE, &parent.uuid());

    let labels: Vec<Option<String>> = loaded
        .read()
        .get(&CHILDREN)
        .unwrap()
        .iter()
        .map(|k| k.read().get(&LABEL))
        .collect();
    assert_eq!(labels, vec![Some("c".into()), Some("a".into()), Some("b".into())]);
    assert_eq!(kids[0].read().overview().parent_uuid, Some(parent.uuid()));

    // ByParent returns the children themselves
    let children = LoadEngine::new(&registry, &JdsOptions::default())
        .load_all(NODE, &LoadFilter::ByParent(parent.uuid()), &mut conn)
        .unwrap();
    assert_eq!(children.len(), 3);
}

#[test]
fn test_cyclic_references_round_trip() {
    // Given: two nodes that are each other's favourite
    let registry = registry();
    let mut conn = database();
    let a = node(&registry, "a");
    let b = node(&registry, "b");
    a.write().set(&FAVOURITE, b.clone()).unwrap();
    b.write().set(&FAVOURITE, a.clone()).unwrap();

    // When: saving one and loading it back
    save(&registry, &mut conn, &[a.clone()]);
    let loaded = load_one(&registry, &mut conn, NODE, &a.uuid());

    // Then: the cycle closes on the same loaded instance
    let favourite = loaded.read().get(&FAVOURITE).unwrap();
    let back = favourite.read().get(&FAVOURITE).unwrap();
    assert!(SharedEntity::ptr_eq(&back, &loaded));
    assert_eq!(favourite.read().get(&LABEL), Some("b".into()));
}

#[test]
fn test_missing_uuid_loads_nothing() {
    let registry = registry();
    let mut conn = database();
    save(&registry, &mut conn, &[person(&registry, "Bob", 40)]);

    let loaded = LoadEngine::new(&registry, &JdsOptions::default())
        .load_all(PERSON, &LoadFilter::by_uuid("DOES_NOT_EXIST"), &mut conn)
        .unwrap();

    assert!(loaded.is_empty());
}

#[test]
fn test_empty_uuid_filter_loads_nothing() {
    let registry = registry();
    let mut conn = database();
    save(&registry, &mut conn, &[person(&registry, "Bob", 40)]);

    let loaded = LoadEngine::new(&registry, &JdsOptions::default())
        .load_all(PERSON, &LoadFilter::ByUuids(Vec::new()), &mut conn)
        .unwrap();

    assert!(loaded.is_empty());
}

#[test]
fn test_load_is_polymorphic_over_subtypes() {
    // Given: a person and an employee
    let registry = registry();
    let mut conn = database();
    let bob = person(&registry, "Bob", 40);
    let eve = employee(&registry, "Eve", 5000.0);
    save(&registry, &mut conn, &[bob.clone(), eve.clone()]);

    // Then: the employee has an instance row per type in its chain
    let rows = count(
        &mut conn,
        &format!(
            "SELECT COUNT(*) FROM jds_entity_instance WHERE uuid = '{}'",
            eve.uuid()
        ),
    );
    assert_eq!(rows, 2);

    // And: loading persons returns both, the employee as its concrete type
    let engine = LoadEngine::new(&registry, &JdsOptions::default());
    let people = engine.load_all(PERSON, &LoadFilter::All, &mut conn).unwrap();
    assert_eq!(people.len(), 2);
    let loaded_eve = people
        .iter()
        .find(|p| p.uuid() == eve.uuid())
        .unwrap();
    assert_eq!(loaded_eve.type_id(), EMPLOYEE);
    assert_eq!(loaded_eve.read().get(&SALARY), Some(5000.0));

    // And: loading employees returns only the employee
    let employees = engine.load_all(EMPLOYEE, &LoadFilter::All, &mut conn).unwrap();
    assert_eq!(employees.len(), 1);
}

#[test]
fn test_modified_between_filter() {
    let registry = registry();
    let mut conn = database();
    let before = Utc::now();
    let bob = person(&registry, "Bob", 40);
    save(&registry, &mut conn, &[bob.clone()]);
    let after = Utc::now();

    let engine = LoadEngine::new(&registry, &JdsOptions::default());
    let inside = engine
        .load_all(
            PERSON,
            &LoadFilter::ModifiedBetween {
                from: before,
                to: after,
            },
            &mut conn,
        )
        .unwrap();
    let later = engine
        .load_all(
            PERSON,
            &LoadFilter::ModifiedBetween {
                from: after + chrono::Duration::seconds(1),
                to: after + chrono::Duration::seconds(60),
            },
            &mut conn,
        )
        .unwrap();

    assert_eq!(inside.len(), 1);
    assert!(later.is_empty());
}

#[test]
fn test_stream_pages_lazily_and_keeps_order() {
    // Given: five people created in sequence
    let registry = registry();
    let mut conn = database();
    let base = Utc::now();
    let people: Vec<SharedEntity> = (0..5)
        .map(|i| {
            let p = person(&registry, &format!("p{}", i), i);
            p.write().overview_mut().date_created = base + chrono::Duration::seconds(i64::from(i));
            p
        })
        .collect();
    save(&registry, &mut conn, &people);

    // When: streaming with a page size of two
    let engine = LoadEngine::new(&registry, &JdsOptions::default()).with_page_size(2);
    let mut stream = engine.load(PERSON, &LoadFilter::All, &mut conn).unwrap();
    assert_eq!(stream.remaining(), 5);
    let first = stream.next().unwrap().unwrap();
    let rest: Vec<SharedEntity> = stream.map(|r| r.unwrap()).collect();

    // Then: creation order is preserved across pages
    let mut ages = vec![first.read().get(&AGE)];
    ages.extend(rest.iter().map(|p| p.read().get(&AGE)));
    assert_eq!(ages, (0..5).map(Some).collect::<Vec<_>>());
}

struct CountingListener {
    calls: Arc<AtomicUsize>,
}

impl jds_store::LoadListener for CountingListener {
    fn on_post_load(
        &self,
        args: &mut jds_store::EventArguments,
        entity: &SharedEntity,
    ) -> jds_store::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        args.batch(
            "INSERT INTO load_audit (uuid) VALUES (?)",
            vec![jds_store::SqlValue::from(entity.uuid())],
        );
        Ok(())
    }
}

#[test]
fn test_post_load_listener_runs_per_instance_and_its_statements_commit() {
    // Given: two saved people and an audit table
    let registry = registry();
    let mut conn = database();
    {
        use jds_store::SqlConnection;
        conn.execute_script("CREATE TABLE load_audit (uuid TEXT)").unwrap();
    }
    save(
        &registry,
        &mut conn,
        &[person(&registry, "A", 1), person(&registry, "B", 2)],
    );
    let calls = Arc::new(AtomicUsize::new(0));

    // When: loading them with a post-load listener
    let loaded = LoadEngine::new(&registry, &JdsOptions::default())
        .with_listener(CountingListener {
            calls: Arc::clone(&calls),
        })
        .load_all(PERSON, &LoadFilter::All, &mut conn)
        .unwrap();

    // Then: the hook ran once per instance and its inserts were committed
    assert_eq!(loaded.len(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(count(&mut conn, "SELECT COUNT(*) FROM load_audit"), 2);
}

#[test]
fn test_unknown_load_type_is_rejected() {
    let registry = registry();
    let mut conn = database();

    let err = LoadEngine::new(&registry, &JdsOptions::default())
        .load_all(999, &LoadFilter::All, &mut conn)
        .unwrap_err();

    assert_eq!(err.code(), "ERR_UNKNOWN_TYPE");
}

#[test]
fn test_stored_value_of_wrong_kind_is_a_population_error() {
    // Given: a person whose age row was written to the text table
    let registry = registry();
    let mut conn = database();
    let bob = person(&registry, "Bob", 40);
    save(&registry, &mut conn, &[bob.clone()]);
    {
        use jds_store::SqlConnection;
        conn.execute_script(&format!(
            "INSERT INTO jds_store_text (uuid, edit_version, field_id, value) VALUES ('{}', 1, {}, 'forty')",
            bob.uuid(),
            AGE.id()
        ))
        .unwrap();
    }

    // When: loading it
    let err = LoadEngine::new(&registry, &JdsOptions::default())
        .load_all(PERSON, &LoadFilter::All, &mut conn)
        .unwrap_err();

    // Then: the mismatch is reported against the instance and field
    assert_eq!(err.code(), "ERR_POPULATION");
    assert_eq!(err.field_id(), Some(AGE.id()));
    assert_eq!(err.entity_id(), Some(bob.uuid().as_str()));
}
