// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! The dynamic value model of tracked records.
//!
//! A [`Record`] is a plain string-keyed map of [`Value`]s. Whether a value can be tracked on its
//! own is decided by [`Value::shape`]: records and arrays made only of records are trackable,
//! everything else is an opaque leaf that is compared and stored as a whole.
use std::{collections::BTreeMap, fmt};

/// A plain data record: named properties in deterministic (sorted) order.
pub type Record = BTreeMap<String, Value>;

/// A value held by a property of a [`Record`].
// NOTE: Why no U32 or I32? Make this a serialization concern.
#[derive(Clone, Default)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    U64(u64),
    I64(i64),
    Double(f64),
    String(String),
    Bytes(#[cfg_attr(feature = "serde", serde(with = "serde_bytes"))] Vec<u8>),
    #[cfg(feature = "chrono")]
    Timestamp(chrono::DateTime<chrono::Utc>),
    Record(Record),
    Array(Vec<Value>),
}

/// How the tracking engine treats a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub enum Shape {
    /// A primitive or otherwise untrackable value.
    Opaque,
    /// A plain record that can be tracked as an entity.
    Record,
    /// An array whose every element is a record, trackable as a collection.
    Records,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Shape::Opaque => "opaque value",
            Shape::Record => "record",
            Shape::Records => "array of records",
        })
    }
}

impl Value {
    /// Classifies this value.
    ///
    /// The empty array is treated as an (empty) array of records, so that a property holding an
    /// empty list can later receive items through its nested collection. An array with at least
    /// one non-record element is opaque.
    pub fn shape(&self) -> Shape {
        match self {
            Value::Record(_) => Shape::Record,
            Value::Array(items) if items.iter().all(|v| matches!(v, Value::Record(_))) => {
                Shape::Records
            }
            _ => Shape::Opaque,
        }
    }

    /// Returns `true` if the engine cannot track this value on its own.
    pub fn is_opaque(&self) -> bool {
        self.shape() == Shape::Opaque
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::U64(v) => Some(v),
            Value::I64(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I64(v) => Some(v),
            Value::U64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// Splits an array of records into its records.
    ///
    /// Returns `None` unless [`Value::shape`] is [`Shape::Records`].
    pub fn into_records(self) -> Option<Vec<Record>> {
        match self {
            Value::Array(items) => items
                .into_iter()
                .map(|v| match v {
                    Value::Record(r) => Some(r),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }
}

macro_rules! impl_from {
(
    $(
        $source:ty => $target:ident $(with $conv:ident)?
    ),* $(,)?
    ) => {
        $(
            impl From<$source> for Value {
                fn from(value: $source) -> Self {
                    Self::$target(impl_from!(value$(, $conv)?))
                }
            }
        )*
    };

    ($value:ident, $conv:ident) => {
        $value.$conv()
    };

    ($value:ident) => {
        $value
    };
}

impl_from!(
    &[u8]      => Bytes with into,
    Vec<u8>    => Bytes,
    String     => String,
    &str       => String with to_string,
    f64        => Double,
    u8         => U64 with into,
    u16        => U64 with into,
    u32        => U64 with into,
    u64        => U64,
    i8         => I64 with into,
    i16        => I64 with into,
    i32        => I64 with into,
    i64        => I64,
    bool       => Bool,
    Record     => Record,
);

#[cfg(feature = "chrono")]
impl From<chrono::DateTime<chrono::Utc>> for Value {
    fn from(value: chrono::DateTime<chrono::Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl From<Vec<Record>> for Value {
    fn from(records: Vec<Record>) -> Self {
        Self::Array(records.into_iter().map(Value::Record).collect())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bytes(inner) => write!(f, "{inner:02X?}"),
            Self::String(inner) => inner.fmt(f),
            Self::Bool(inner) => inner.fmt(f),
            // Make sure to always print at least 1 decimal, so we can non-ambiguously
            // tell apart I64 and doubles (this is achieved by {:?} instead of {}).
            Self::Double(inner) => write!(f, "{inner:?}d"),
            Self::U64(inner) => write!(f, "{inner}u"),
            Self::I64(inner) => write!(f, "{inner}"),
            #[cfg(feature = "chrono")]
            Self::Timestamp(inner) => inner.fmt(f),
            Self::Record(inner) => f.debug_map().entries(inner).finish(),
            Self::Array(inner) => f.debug_list().entries(inner).finish(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Bytes(b1), Bytes(b2)) => b1.eq(b2),
            (String(s1), String(s2)) => s1.eq(s2),
            (Double(d1), Double(d2)) => d1.total_cmp(d2).is_eq(),
            (U64(u1), U64(u2)) => u1.eq(u2),
            (I64(i1), I64(i2)) => i1.eq(i2),
            (Bool(b1), Bool(b2)) => b1.eq(b2),
            #[cfg(feature = "chrono")]
            (Timestamp(t1), Timestamp(t2)) => t1.eq(t2),
            (Record(r1), Record(r2)) => r1.eq(r2),
            (Array(a1), Array(a2)) => a1.eq(a2),
            _ => false,
        }
    }
}
impl Eq for Value {}

impl PartialEq<str> for Value {
    fn eq(&self, other: &str) -> bool {
        matches!(self, Self::String(s) if s == other)
    }
}
impl PartialEq<&str> for Value {
    fn eq(&self, other: &&str) -> bool {
        matches!(self, Self::String(s) if s == other)
    }
}
impl PartialEq<bool> for Value {
    fn eq(&self, other: &bool) -> bool {
        matches!(self, Self::Bool(b) if b == other)
    }
}
impl PartialEq<u64> for Value {
    fn eq(&self, other: &u64) -> bool {
        matches!(self, Self::U64(u) if u == other)
    }
}
impl PartialEq<i64> for Value {
    fn eq(&self, other: &i64) -> bool {
        matches!(self, Self::I64(i) if i == other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    #[test]
    fn scalars_are_opaque() {
        assert_eq!(Value::from(8).shape(), Shape::Opaque);
        assert_eq!(Value::from("A").shape(), Shape::Opaque);
        assert_eq!(Value::Null.shape(), Shape::Opaque);
        assert_eq!(Value::from(vec![1u8, 2]).shape(), Shape::Opaque);
    }

    #[test]
    fn records_and_record_arrays_are_trackable() {
        let r = record! { "name" => "A" };
        assert_eq!(Value::from(r.clone()).shape(), Shape::Record);
        assert_eq!(Value::from(vec![r.clone(), r]).shape(), Shape::Records);
        assert_eq!(Value::Array(vec![]).shape(), Shape::Records);
    }

    #[test]
    fn mixed_arrays_are_opaque() {
        let v = Value::Array(vec![Value::from(record! { "a" => 1 }), Value::from(2)]);
        assert_eq!(v.shape(), Shape::Opaque);
        assert!(v.clone().into_records().is_none());
    }

    #[test]
    fn doubles_compare_totally() {
        assert_eq!(Value::Double(f64::NAN), Value::Double(f64::NAN));
        assert_ne!(Value::Double(0.0), Value::Double(-0.0));
        assert_ne!(Value::U64(1), Value::I64(1));
    }

    #[test]
    fn debug_tells_number_kinds_apart() {
        assert_eq!(format!("{:?}", Value::U64(1)), "1u");
        assert_eq!(format!("{:?}", Value::I64(1)), "1");
        assert_eq!(format!("{:?}", Value::Double(1.0)), "1.0d");
        assert_eq!(format!("{:?}", Value::from(record! { "a" => 1 })), r#"{"a": 1}"#);
    }
}
