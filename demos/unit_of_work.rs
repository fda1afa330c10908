// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! The example loads an order with its lines, edits it the way a form would, and prints the
//! change report a persistence layer would turn into requests. It then rolls the edits back and
//! finally commits a second round of edits.

use std::error::Error;
use uowtrack::{EntityEventKind, EntityTracker, Status, record, records};

fn main() -> Result<(), Box<dyn Error>> {
    // An order as it was read from storage. In the default deep mode, the `lines` array is
    // tracked as a nested collection of its own.
    let mut order = EntityTracker::original(record! {
        "id" => 17,
        "customer" => "ACME",
        "lines" => records![
            { "sku" => "bolt", "quantity" => 100 },
            { "sku" => "nut", "quantity" => 100 },
            { "sku" => "washer", "quantity" => 50 }
        ],
    });

    order.on(EntityEventKind::Modify, |id, _| println!("{id} has unsaved changes"));

    // --- Edit the order ---
    order.set("customer", "ACME Corp.")?;
    {
        let mut lines = order.detail("lines")?;
        lines.entity(1)?.set("quantity", 120)?;
        lines.delete(2usize)?;
        lines.push(record! { "sku" => "spring", "quantity" => 10 })?;
    }
    assert_eq!(order.status(), Status::Modified);

    // --- Report ---
    // The nested report of `lines` tells which lines to insert, update and delete.
    let changes = serde_json::Value::from(order.changes()?);
    println!("{}", serde_json::to_string_pretty(&changes)?);

    // --- Roll back ---
    // Everything returns to the state that was loaded, including the order of the lines.
    order.reset()?;
    assert_eq!(order.status(), Status::Original);
    println!("after reset: {:?}", order.record());

    // --- Commit ---
    order.detail("lines")?.push(record! { "sku" => "spring", "quantity" => 10 })?;
    order.apply()?;
    assert_eq!(order.detail("lines")?.count(), 4);
    println!("committed: {:?}", order.record());

    Ok(())
}
