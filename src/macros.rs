// (c) Copyright 2025 Helsing GmbH. All rights reserved.
/// Convenience macro for creating a [`Record`](crate::Record).
///
/// Values go through [`Value::from`](crate::Value), so anything with a `From` conversion can be
/// used directly. Nested records and arrays of records are written with nested macro calls.
///
/// ```rust
/// # use uowtrack::{record, records};
/// let person = record! {
///     "name" => "Alice",
///     "age" => 8,
///     "friends" => records![
///         { "name" => "Bob", "age" => 7 },
///         { "name" => "Carol", "age" => 9 }
///     ]
/// };
/// assert_eq!(person.len(), 3);
/// ```
#[macro_export]
macro_rules! record {
    () => {
        $crate::Record::new()
    };
    ($($k:literal => $v:expr),+ $(,)?) => {
        {
            let mut record = $crate::Record::new();
            $( record.insert(::std::string::String::from($k), $crate::Value::from($v)); )+
            record
        }
    };
}

/// Convenience macro for creating a `Vec` of [`Record`](crate::Record)s.
///
/// Each element uses the same `key => value` syntax as [`record!`](crate::record), wrapped in
/// braces.
///
/// ```rust
/// # use uowtrack::records;
/// let people = records![
///     { "name" => "Alice" },
///     { "name" => "Bob" }
/// ];
/// assert_eq!(people.len(), 2);
/// ```
#[macro_export]
macro_rules! records {
    ($({ $($k:literal => $v:expr),* $(,)? }),* $(,)?) => {
        {
            let records: ::std::vec::Vec<$crate::Record> =
                ::std::vec![ $( $crate::record! { $($k => $v),* } ),* ];
            records
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::Value;

    #[test]
    fn record_macro_converts_values() {
        let r = record! { "name" => "A", "age" => 8u64, "ok" => true };
        assert_eq!(r["name"], "A");
        assert_eq!(r["age"], 8u64);
        assert_eq!(r["ok"], true);
    }

    #[test]
    fn records_macro_nests() {
        let r = record! {
            "friends" => records![{ "name" => "B" }, { "name" => "C" }],
            "empty" => records![]
        };
        match &r["friends"] {
            Value::Array(items) => assert_eq!(items.len(), 2),
            other => panic!("expected array, got {other:?}"),
        }
        assert_eq!(r["empty"], Value::Array(vec![]));
    }
}
