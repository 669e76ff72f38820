use anyhow::{Result, bail};

use nutrilog_core::models::EntryPatch;
use nutrilog_core::service::TrackerService;

use super::helpers::{entry_line, exit_not_found, is_not_found, parse_meal_ref};

pub(crate) fn cmd_delete(svc: &TrackerService, entry_id: i64, json: bool) -> Result<()> {
    if !svc.delete_entry(entry_id)? {
        exit_not_found(&format!("Entry {entry_id} not found"), json);
    }

    if json {
        println!("{}", serde_json::json!({ "deleted": entry_id }));
    } else {
        println!("Deleted entry {entry_id}");
    }
    Ok(())
}

pub(crate) fn cmd_update(
    svc: &TrackerService,
    entry_id: i64,
    patch: &EntryPatch,
    json: bool,
) -> Result<()> {
    if patch.is_empty() {
        bail!(
            "Nothing to update. Provide at least one of --quantity, --meal, --date, --calories, --protein, --carbs, --fat, --fiber, --food-id or --manual"
        );
    }

    let entry = match svc.update_entry(entry_id, patch) {
        Ok(entry) => entry,
        Err(e) if is_not_found(&e) => exit_not_found(&format!("{e}"), json),
        Err(e) => return Err(e),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        let meal = entry.meal;
        let date = entry.date;
        println!("Updated ({meal} on {date}): {}", entry_line(&entry));
    }
    Ok(())
}

pub(crate) fn cmd_copy(svc: &TrackerService, from: &str, to: &str, json: bool) -> Result<()> {
    let (from_date, from_meal) = parse_meal_ref(from)?;
    let (to_date, to_meal) = parse_meal_ref(to)?;

    let copied = svc.copy_meal(from_date, from_meal, to_date, to_meal)?;

    if copied.is_empty() {
        exit_not_found(&format!("No entries found for {from_date}:{from_meal}"), json);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&copied)?);
    } else {
        let count = copied.len();
        println!("Copied {count} entries from {from_date}:{from_meal} to {to_date}:{to_meal}");
    }

    Ok(())
}
