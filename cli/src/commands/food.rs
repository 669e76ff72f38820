use anyhow::Result;

use nutrilog_core::models::FoodDraft;
use nutrilog_core::service::TrackerService;

use super::helpers::{exit_not_found, fmt_macro, is_not_found, print_food_table};

pub(crate) fn cmd_food_add(svc: &TrackerService, draft: &FoodDraft, json: bool) -> Result<()> {
    let food = svc.add_food(draft)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&food)?);
    } else {
        let name = &food.name;
        let id = food.id;
        let cal = food.calories;
        println!("Added food: {name} (id: {id}, {cal} kcal/100g)");
    }

    Ok(())
}

pub(crate) fn cmd_food_list(svc: &TrackerService, json: bool) -> Result<()> {
    let foods = svc.list_catalog()?;

    if foods.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No foods in the catalog");
        }
        std::process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&foods)?);
    } else {
        print_food_table(&foods);
    }

    Ok(())
}

pub(crate) fn cmd_food_search(svc: &TrackerService, term: &str, json: bool) -> Result<()> {
    let foods = svc.search_catalog(term)?;

    if foods.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No foods matching '{term}'");
        }
        std::process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&foods)?);
    } else {
        print_food_table(&foods);
    }

    Ok(())
}

/// Fields left as `None` keep their stored value. An empty string clears a macro.
pub(crate) struct FoodEdit {
    pub name: Option<String>,
    pub calories: Option<String>,
    pub protein: Option<String>,
    pub carbs: Option<String>,
    pub fat: Option<String>,
    pub fiber: Option<String>,
}

impl FoodEdit {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.calories.is_none()
            && self.protein.is_none()
            && self.carbs.is_none()
            && self.fat.is_none()
            && self.fiber.is_none()
    }

    fn apply_to(self, mut draft: FoodDraft) -> FoodDraft {
        let fields = [
            (self.name, &mut draft.name),
            (self.calories, &mut draft.calories),
            (self.protein, &mut draft.protein),
            (self.carbs, &mut draft.carbs),
            (self.fat, &mut draft.fat),
            (self.fiber, &mut draft.fiber),
        ];
        for (value, slot) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
        draft
    }
}

pub(crate) fn cmd_food_edit(
    svc: &TrackerService,
    id: i64,
    edit: FoodEdit,
    json: bool,
) -> Result<()> {
    if edit.is_empty() {
        anyhow::bail!(
            "Nothing to update. Provide at least one of --name, --calories, --protein, --carbs, --fat, --fiber"
        );
    }

    let current = match svc.get_food(id) {
        Ok(food) => food,
        Err(e) if is_not_found(&e) => exit_not_found(&format!("{e}"), json),
        Err(e) => return Err(e),
    };
    let draft = edit.apply_to(FoodDraft::from(&current));
    let food = svc.edit_food(id, &draft)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&food)?);
    } else {
        let name = &food.name;
        let cal = food.calories;
        let p = fmt_macro(food.protein);
        let c = fmt_macro(food.carbs);
        let f = fmt_macro(food.fat);
        let fib = fmt_macro(food.fiber);
        println!(
            "Updated food {id}: {name}, {cal} kcal/100g | P:{p} C:{c} F:{f} Fib:{fib}"
        );
    }

    Ok(())
}

pub(crate) fn cmd_food_delete(svc: &TrackerService, id: i64, json: bool) -> Result<()> {
    if !svc.remove_food(id)? {
        exit_not_found(&format!("Food item {id} not found"), json);
    }

    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted food item {id}. Logged entries keep their values.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit() -> FoodEdit {
        FoodEdit {
            name: None,
            calories: None,
            protein: None,
            carbs: None,
            fat: None,
            fiber: None,
        }
    }

    #[test]
    fn test_food_edit_overlays_fields() {
        let draft = FoodDraft {
            name: "Oats".to_string(),
            calories: "389".to_string(),
            protein: "16.9".to_string(),
            fiber: "10.6".to_string(),
            ..FoodDraft::default()
        };
        let merged = FoodEdit {
            calories: Some("380".to_string()),
            fiber: Some(String::new()),
            ..edit()
        }
        .apply_to(draft);

        assert_eq!(merged.name, "Oats");
        assert_eq!(merged.calories, "380");
        assert_eq!(merged.protein, "16.9");
        assert!(merged.fiber.is_empty());
    }

    #[test]
    fn test_food_edit_is_empty() {
        assert!(edit().is_empty());
        assert!(
            !FoodEdit {
                name: Some("Rice".to_string()),
                ..edit()
            }
            .is_empty()
        );
    }
}
