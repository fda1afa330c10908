//! Helpers shared by the integration tests.
#![allow(dead_code)]

use std::{cell::RefCell, collections::BTreeMap, rc::Rc};
use uowtrack::{EntityEventKind, EntityMut, Record, Value};

/// Installs a subscriber that prints the crate's logs for failing tests.
///
/// Use `RUST_LOG=uowtrack=trace` to see every property write and event dispatch.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Counts the events an entity raises, per kind.
#[derive(Clone, Default)]
pub struct Counter(Rc<RefCell<BTreeMap<&'static str, usize>>>);

impl Counter {
    pub fn watch(entity: &mut EntityMut<'_>) -> Self {
        let counter = Self::default();
        for (kind, name) in [
            (EntityEventKind::Change, "change"),
            (EntityEventKind::Modify, "modify"),
            (EntityEventKind::Reset, "reset"),
            (EntityEventKind::Apply, "apply"),
            (EntityEventKind::Delete, "delete"),
            (EntityEventKind::SubChange, "subchange"),
        ] {
            let counts = Rc::clone(&counter.0);
            entity.on(kind, move |_, _| *counts.borrow_mut().entry(name).or_default() += 1);
        }
        counter
    }

    pub fn get(&self, name: &str) -> usize {
        self.0.borrow().get(name).copied().unwrap_or_default()
    }
}

/// The `name` property of every record.
pub fn names(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            record
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned()
        })
        .collect()
}
