mod common;

use common::{init_tracing, names};
use std::{cell::RefCell, collections::HashMap, rc::Rc};
use uowtrack::{
    CollectionEventKind, CollectionTracker, ItemReport, PropertyChange, Record, Status,
    TrackError, Value,
    chrono::{TimeZone, Utc},
    record, records,
};

fn letters(letters: &[&str]) -> Vec<Record> {
    letters
        .iter()
        .map(|&letter| record! { "name" => letter })
        .collect()
}

fn people() -> Vec<Record> {
    let birthday = Utc.with_ymd_and_hms(2011, 11, 30, 0, 0, 0).single();
    records![
        { "name" => "Zhang", "birthday" => birthday, "age" => 8, "sex" => "male" },
        { "name" => "Li", "birthday" => birthday, "age" => 8, "sex" => "female" },
        { "name" => "Wang", "birthday" => birthday, "age" => 8, "sex" => "male" },
        { "name" => "Zhao", "birthday" => birthday, "age" => 8, "sex" => "female" }
    ]
}

fn items(reports: &[ItemReport]) -> Vec<Record> {
    reports.iter().map(|report| report.item.clone()).collect()
}

type EventCounts = Rc<RefCell<HashMap<CollectionEventKind, usize>>>;

fn count_events(tracker: &mut CollectionTracker) -> EventCounts {
    let counts = Rc::new(RefCell::new(HashMap::new()));
    for kind in [
        CollectionEventKind::Add,
        CollectionEventKind::Delete,
        CollectionEventKind::Change,
        CollectionEventKind::Apply,
        CollectionEventKind::Reset,
        CollectionEventKind::Clean,
    ] {
        let counts = Rc::clone(&counts);
        tracker.on(kind, move |_, event| {
            *counts.borrow_mut().entry(event.kind()).or_insert(0) += 1;
        });
    }
    counts
}

#[test]
fn delete_last_and_prepend() {
    init_tracing();
    let mut list = CollectionTracker::new(letters(&["a", "b", "c", "d"]));
    let baseline = list.items().to_vec();

    let d = list[3];
    list.delete(d).unwrap();
    list.add(record! { "name" => "e" }, Some(0)).unwrap();

    let metadata = list.metadata();
    assert_eq!(items(&metadata.added), letters(&["e"]));
    assert_eq!(items(&metadata.deleted), letters(&["d"]));
    assert_eq!(items(&metadata.original), letters(&["a", "b", "c"]));
    assert!(metadata.modified.is_empty());

    list.reset().unwrap();
    assert_eq!(list.records(), letters(&["a", "b", "c", "d"]));
    assert_eq!(list.items(), baseline);
    for &id in list.items() {
        assert_eq!(list.uow().status(id).unwrap(), Status::Original);
    }
}

#[test]
fn rollback_restores_order() {
    let mut list = CollectionTracker::new(letters(&["a", "b", "c", "d"]));
    list.delete(2usize).unwrap();
    assert_eq!(names(&list.records()), ["a", "b", "d"]);

    list.reset().unwrap();
    assert_eq!(list.records(), letters(&["a", "b", "c", "d"]));
    assert!(!list.is_changed());
}

#[test]
fn rolled_back_item_returns_to_its_index() {
    let mut list = CollectionTracker::new(letters(&["a", "b", "c", "d"]));
    let c = list[2];
    list.delete(c).unwrap();
    list.reset_item(c).unwrap();
    assert_eq!(names(&list.records()), ["a", "b", "c", "d"]);
    assert_eq!(list.deleted_count(), 0);
}

#[test]
fn pending_deletion_cannot_be_deleted_again() {
    let mut list = CollectionTracker::new(letters(&["a", "b"]));
    let a = list[0];
    list.delete(a).unwrap();
    assert_eq!(list.delete(a), Err(TrackError::NotTracked(a)));
    assert_eq!(list.deleted_count(), 1);

    assert_eq!(list.reset_item(a), Ok(a));
    assert_eq!(names(&list.records()), ["a", "b"]);
}

#[test]
fn metadata_partitions_every_item() {
    let mut list = CollectionTracker::new(letters(&["a", "b", "c", "d"]));
    list.entity(1).unwrap().set("name", "B").unwrap();
    list.delete(2usize).unwrap();
    list.push(record! { "name" => "e" }).unwrap();

    let metadata = list.metadata();
    assert_eq!(metadata.to_string(), "added=1 modified=1 deleted=1 original=2");
    let mut seen: Vec<_> = metadata.iter().map(|report| report.entity).collect();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 5);

    assert_eq!(list.added_count(), metadata.added.len());
    assert_eq!(list.modified_count(), metadata.modified.len());
    assert_eq!(list.deleted_count(), metadata.deleted.len());
}

#[test]
fn editing_session_on_a_list_of_people() {
    init_tracing();
    let mut list = CollectionTracker::new(people());
    let events = count_events(&mut list);
    assert_eq!(list.records(), people());

    list.entity(1).unwrap().set("name", "Haha").unwrap();
    assert!(list.is_changed());

    let birthday = Utc.with_ymd_and_hms(2011, 11, 30, 0, 0, 0).single();
    let added = record! { "name" => "Test", "age" => 18, "birthday" => birthday, "sex" => "male" };
    list.add(added.clone(), Some(0)).unwrap();
    assert_eq!(list.added_count(), 1);
    assert_eq!(list.count(), 5);
    assert_eq!(list.uow().record(list[0]).unwrap(), added);

    let last = list[4];
    list.delete(last).unwrap();
    assert_eq!(list.count(), 4);

    let metadata = list.metadata();
    assert_eq!(metadata.added.len(), 1);
    assert_eq!(metadata.added[0].item, added);
    let changes = &metadata.added[0].changes;
    assert_eq!(changes.len(), 4);
    assert_eq!(
        changes["age"],
        PropertyChange::Value {
            old_value: None,
            new_value: Some(Value::from(18)),
        }
    );
    assert_eq!(metadata.modified.len(), 1);
    assert_eq!(
        metadata.modified[0].changes["name"],
        PropertyChange::Value {
            old_value: Some("Li".into()),
            new_value: Some("Haha".into()),
        }
    );
    assert_eq!(metadata.deleted.len(), 1);
    assert_eq!(metadata.deleted[0].item, people()[3]);
    assert!(metadata.deleted[0].changes.is_empty());
    assert_eq!(items(&metadata.original), [people()[0].clone(), people()[2].clone()]);

    list.reset().unwrap();
    let metadata = list.metadata();
    assert!(!metadata.is_changed());
    assert_eq!(items(&metadata.original), people());
    assert!(!list.is_changed());

    list.entity(1).unwrap().set("name", "Haha").unwrap();
    list.delete(0usize).unwrap();
    assert_eq!(events.borrow()[&CollectionEventKind::Delete], 2);
    assert!(list.is_changed());
    assert_eq!(list.count(), 3);
    assert_eq!(names(&list.records())[0], "Haha");

    list.apply().unwrap();
    assert!(!list.is_changed());
    let metadata = list.metadata();
    assert!(!metadata.is_changed());
    assert_eq!(
        names(&items(&metadata.original)),
        ["Haha", "Wang", "Zhao"]
    );

    let events = events.borrow();
    assert_eq!(events[&CollectionEventKind::Add], 1);
    assert_eq!(events[&CollectionEventKind::Reset], 1);
    assert_eq!(events[&CollectionEventKind::Apply], 1);
    assert!(!events.contains_key(&CollectionEventKind::Clean));
}

#[test]
fn counters_follow_item_lifecycles() {
    let mut list = CollectionTracker::new(letters(&["a", "b"]));
    let a = list[0];

    // deleting and restoring through the item itself
    list.uow_mut().entity(a).unwrap().delete().unwrap();
    assert_eq!(list.deleted_count(), 1);
    assert_eq!(list.count(), 1);
    list.uow_mut().entity(a).unwrap().reset().unwrap();
    assert_eq!(list.deleted_count(), 0);
    assert_eq!(list.items()[0], a);

    let e = list.push(record! { "name" => "e" }).unwrap();
    list.uow_mut().entity(e).unwrap().delete().unwrap();
    assert_eq!(list.added_count(), 0);
    assert_eq!(list.uow().status(e).unwrap(), Status::Invalid);
    assert!(!list.is_changed());
}

#[test]
fn clean_deletes_everything_at_once() {
    let mut list = CollectionTracker::new(letters(&["a", "b", "c"]));
    list.push(record! { "name" => "d" }).unwrap();
    let events = count_events(&mut list);

    list.clean().unwrap();
    assert!(list.is_empty());
    assert_eq!(list.deleted_count(), 3);
    assert_eq!(list.added_count(), 0);
    assert_eq!(list.metadata().deleted.len(), 3);

    let counts = events.borrow();
    assert_eq!(counts.get(&CollectionEventKind::Delete), None);
    assert_eq!(counts[&CollectionEventKind::Clean], 1);
    drop(counts);

    list.reset().unwrap();
    assert_eq!(list.records(), letters(&["a", "b", "c"]));
}

#[test]
fn apply_then_reset_keeps_the_commit() {
    let mut list = CollectionTracker::new(letters(&["a", "b", "c"]));
    list.delete(0usize).unwrap();
    list.add(record! { "name" => "x" }, Some(1)).unwrap();
    list.apply().unwrap();
    let committed = list.records();
    assert_eq!(names(&committed), ["b", "x", "c"]);

    list.reset().unwrap();
    assert_eq!(list.records(), committed);
    assert_eq!(list.uow().status(list[1]).unwrap(), Status::Original);
}
