//! Write gates for the food catalog and the calorie log.
//!
//! Both validators are pure: they either hand back a value that is safe to
//! persist or every field error found in the form.

use chrono::NaiveDate;

use crate::error::FieldErrors;
use crate::models::{
    EntryDraft, EntryMode, FoodDraft, FoodItem, MealSlot, NewCalorieLogEntry, NewFoodItem,
    NutritionValues,
};
use crate::nutrition::scale_to_quantity;

/// Largest quantity a single entry may log (100 kg).
pub const MAX_QUANTITY_G: i64 = 100_000;

/// Largest calorie value accepted on any form.
pub const MAX_CALORIES: i64 = 100_000;

/// Validate a calorie-log form.
///
/// In catalog mode `selected` must be the item referenced by
/// `draft.meal_item`; its per-100g values are scaled to the quantity and any
/// calories/macros typed into the draft are ignored.
pub fn validate_entry(
    draft: &EntryDraft,
    selected: Option<&FoodItem>,
) -> Result<NewCalorieLogEntry, FieldErrors> {
    let mut errors = FieldErrors::new();

    let meal = match draft.meal.parse::<MealSlot>() {
        Ok(meal) => Some(meal),
        Err(e) => {
            errors.push("meal", e.to_string());
            None
        }
    };

    let date = parse_date_field(&draft.date, &mut errors);
    let quantity_g = parse_quantity(&draft.quantity, &mut errors);

    let (values, meal_item) = match draft.mode {
        EntryMode::Catalog => match (draft.meal_item, selected) {
            (None, _) => {
                errors.push("meal_item", "Select a food item");
                (None, None)
            }
            (Some(id), Some(food)) if food.id == id => {
                let values = quantity_g.map(|g| scale_to_quantity(food, g));
                (values, Some(id))
            }
            (Some(id), _) => {
                errors.push("meal_item", format!("Food item {id} no longer exists"));
                (None, None)
            }
        },
        EntryMode::Manual => {
            let calories = parse_calories(&draft.calories, &mut errors);
            let values = NutritionValues {
                calories: calories.unwrap_or_default(),
                protein: parse_macro("protein", &draft.protein, &mut errors),
                carbs: parse_macro("carbs", &draft.carbs, &mut errors),
                fat: parse_macro("fat", &draft.fat, &mut errors),
                fiber: parse_macro("fiber", &draft.fiber, &mut errors),
            };
            (calories.map(|_| values), None)
        }
    };

    match (meal, date, quantity_g, values) {
        (Some(meal), Some(date), Some(quantity_g), Some(values)) if errors.is_empty() => {
            Ok(NewCalorieLogEntry {
                date,
                meal,
                quantity_g,
                values,
                meal_item,
            })
        }
        _ => Err(errors),
    }
}

/// Validate a catalog form: non-blank name, whole non-negative calories,
/// optional non-negative macros.
pub fn validate_food(draft: &FoodDraft) -> Result<NewFoodItem, FieldErrors> {
    let mut errors = FieldErrors::new();

    let name = draft.name.trim().to_string();
    if name.is_empty() {
        errors.push("name", "Food name is required");
    }
    let calories = parse_calories(&draft.calories, &mut errors);
    let food = NewFoodItem {
        name,
        calories: calories.unwrap_or_default(),
        protein: parse_macro("protein", &draft.protein, &mut errors),
        carbs: parse_macro("carbs", &draft.carbs, &mut errors),
        fat: parse_macro("fat", &draft.fat, &mut errors),
        fiber: parse_macro("fiber", &draft.fiber, &mut errors),
    };
    errors.into_result(food)
}

fn parse_date_field(input: &str, errors: &mut FieldErrors) -> Option<NaiveDate> {
    let input = input.trim();
    if input.is_empty() {
        errors.push("date", "Date is required");
        return None;
    }
    match NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            errors.push("date", format!("Invalid date '{input}'. Use YYYY-MM-DD"));
            None
        }
    }
}

fn parse_quantity(input: &str, errors: &mut FieldErrors) -> Option<i64> {
    let input = input.trim();
    if input.is_empty() {
        errors.push("quantity", "Quantity is required");
        return None;
    }
    match input.parse::<i64>() {
        Ok(g) if g > MAX_QUANTITY_G => {
            errors.push(
                "quantity",
                format!("Quantity must be at most {MAX_QUANTITY_G}g"),
            );
            None
        }
        Ok(g) if g > 0 => Some(g),
        Ok(_) => {
            errors.push("quantity", "Quantity must be greater than 0");
            None
        }
        Err(_) => {
            errors.push(
                "quantity",
                format!("Invalid quantity '{input}'. Use whole grams"),
            );
            None
        }
    }
}

fn parse_calories(input: &str, errors: &mut FieldErrors) -> Option<i64> {
    let input = input.trim();
    if input.is_empty() {
        errors.push("calories", "Calories are required");
        return None;
    }
    match input.parse::<i64>() {
        Ok(c) if c > MAX_CALORIES => {
            errors.push(
                "calories",
                format!("Calories must be at most {MAX_CALORIES}"),
            );
            None
        }
        Ok(c) if c >= 0 => Some(c),
        Ok(_) => {
            errors.push("calories", "Calories must not be negative");
            None
        }
        Err(_) => {
            errors.push(
                "calories",
                format!("Invalid calories '{input}'. Use a whole number"),
            );
            None
        }
    }
}

/// Blank means "unknown" and yields `None`, never zero.
fn parse_macro(field: &'static str, input: &str, errors: &mut FieldErrors) -> Option<f64> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    match input.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Some(v),
        Ok(_) => {
            errors.push(field, format!("{field} must be a non-negative number"));
            None
        }
        Err(_) => {
            errors.push(field, format!("Invalid {field} '{input}'"));
            None
        }
    }
}
