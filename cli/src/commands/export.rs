use anyhow::{Context, Result};
use std::path::Path;

use nutrilog_core::service::TrackerService;

/// Write the owner's catalog and log as JSON, to a file or stdout.
pub(crate) fn cmd_export(svc: &TrackerService, output: Option<&Path>) -> Result<()> {
    let data = svc.export()?;
    let json = serde_json::to_string_pretty(&data)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write export: {}", path.display()))?;
            let foods = data.food_items.len();
            let entries = data.entries.len();
            eprintln!(
                "Exported {foods} food items and {entries} entries to {}",
                path.display()
            );
        }
        None => println!("{json}"),
    }

    Ok(())
}
