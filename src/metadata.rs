// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Structured change reports.
//!
//! Reports are plain data computed from the current tracker state; producing one never changes
//! anything. An entity reports its [`Changes`], a collection reports [`Metadata`]: every
//! attached item grouped by status and paired with its own changes.
use crate::{EntityId, Record, Value};
use std::{collections::BTreeMap, fmt, ops::Deref};

/// The change report of a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub struct Metadata {
    /// Items added since the last commit.
    pub added: Vec<ItemReport>,
    /// Items that differ from their baseline.
    pub modified: Vec<ItemReport>,
    /// Items deleted since the last commit, in the order they originally had.
    pub deleted: Vec<ItemReport>,
    /// Unchanged items.
    pub original: Vec<ItemReport>,
}

impl Metadata {
    /// Returns `true` if committing the collection would change anything.
    pub fn is_changed(&self) -> bool {
        !(self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty())
    }

    /// All reports, bucket by bucket.
    pub fn iter(&self) -> impl Iterator<Item = &ItemReport> {
        self.added
            .iter()
            .chain(&self.modified)
            .chain(&self.deleted)
            .chain(&self.original)
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "added={} modified={} deleted={} original={}",
            self.added.len(),
            self.modified.len(),
            self.deleted.len(),
            self.original.len()
        )
    }
}

/// One item of a [`Metadata`] bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub struct ItemReport {
    pub entity: EntityId,
    /// The item's current data.
    pub item: Record,
    pub changes: Changes,
}

/// The change report of an entity, keyed by property.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Changes(BTreeMap<String, PropertyChange>);

impl Changes {
    /// Returns `true` if any property or nested collection changed.
    pub fn is_changed(&self) -> bool {
        self.0.values().any(|change| match change {
            PropertyChange::Value { .. } => true,
            PropertyChange::Detail(metadata) => metadata.is_changed(),
        })
    }

    pub(crate) fn insert(&mut self, property: String, change: PropertyChange) {
        self.0.insert(property, change);
    }
}

impl Deref for Changes {
    type Target = BTreeMap<String, PropertyChange>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl IntoIterator for Changes {
    type Item = (String, PropertyChange);
    type IntoIter = std::collections::btree_map::IntoIter<String, PropertyChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Changes {
    type Item = (&'a String, &'a PropertyChange);
    type IntoIter = std::collections::btree_map::Iter<'a, String, PropertyChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(String, PropertyChange)> for Changes {
    fn from_iter<T: IntoIterator<Item = (String, PropertyChange)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// How a single property changed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub enum PropertyChange {
    /// An opaque value changed. `None` stands for "absent".
    Value {
        old_value: Option<Value>,
        new_value: Option<Value>,
    },
    /// The report of a nested record or array of records.
    Detail(Metadata),
}

impl PropertyChange {
    pub fn as_detail(&self) -> Option<&Metadata> {
        match self {
            PropertyChange::Detail(metadata) => Some(metadata),
            PropertyChange::Value { .. } => None,
        }
    }
}
