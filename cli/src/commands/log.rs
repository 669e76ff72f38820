use anyhow::Result;

use nutrilog_core::models::{EntryDraft, EntryMode, FoodItem};
use nutrilog_core::nutrition::preview_quantity;
use nutrilog_core::service::TrackerService;

use super::helpers::{entry_line, exit_not_found, print_food_table, prompt_choice};

/// Where the nutrition values of a new entry come from.
pub(crate) enum FoodSource {
    /// Values typed into the draft.
    Manual,
    /// A catalog item picked by id.
    Id(i64),
    /// A catalog item picked by searching its name.
    Search(String),
}

pub(crate) fn cmd_log(
    svc: &TrackerService,
    mut draft: EntryDraft,
    source: FoodSource,
    json: bool,
) -> Result<()> {
    let food_id = match source {
        FoodSource::Manual => None,
        FoodSource::Id(id) => Some(id),
        FoodSource::Search(term) => Some(pick_food(svc, &term, &draft.quantity, json)?.id),
    };
    if let Some(id) = food_id {
        draft.mode = EntryMode::Catalog;
        draft.meal_item = Some(id);
    }

    let entry = svc.log_entry(&draft)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        let meal = entry.meal;
        let date = entry.date;
        println!("Logged for {meal} on {date}: {}", entry_line(&entry));
    }

    Ok(())
}

fn pick_food(svc: &TrackerService, term: &str, quantity: &str, json: bool) -> Result<FoodItem> {
    let mut foods = svc.search_catalog(term)?;

    if foods.is_empty() {
        exit_not_found(&format!("No food found for '{term}'"), json);
    }
    if foods.len() == 1 {
        return Ok(foods.swap_remove(0));
    }

    print_food_table(&foods);
    let grams = preview_quantity(quantity);
    eprintln!("(values shown per 100g, logging {grams}g)");
    let idx = prompt_choice(foods.len())?;
    Ok(foods.swap_remove(idx))
}
