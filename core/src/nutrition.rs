//! Quantity scaling of per-100g catalog values.
//!
//! Rounding policy: half-up (away from zero, all inputs are non-negative).
//! Calories round to whole kcal using integer arithmetic; macros round to one
//! decimal place.

use serde::Serialize;

use crate::models::{FoodItem, NutritionValues};

const KCAL_PER_G_PROTEIN: f64 = 4.0;
const KCAL_PER_G_CARBS: f64 = 4.0;
const KCAL_PER_G_FAT: f64 = 9.0;

/// Scale a catalog item's per-100g values to `grams`.
///
/// Quantities below 1 g are treated as 1 g. Always compute from the stored
/// per-100g values, never from a previously scaled result.
#[must_use]
pub fn scale_to_quantity(food: &FoodItem, grams: i64) -> NutritionValues {
    let grams = grams.max(1);
    let multiplier = grams as f64 / 100.0;
    NutritionValues {
        calories: scale_calories(food.calories, grams),
        protein: food.protein.map(|v| round1(v * multiplier)),
        carbs: food.carbs.map(|v| round1(v * multiplier)),
        fat: food.fat.map(|v| round1(v * multiplier)),
        fiber: food.fiber.map(|v| round1(v * multiplier)),
    }
}

/// `round(calories_per_100g * grams / 100)`, half-up, in exact integer arithmetic.
#[must_use]
pub fn scale_calories(calories_per_100g: i64, grams: i64) -> i64 {
    let scaled = calories_per_100g.max(0).saturating_mul(grams.max(1));
    scaled.saturating_add(50) / 100
}

/// Round to one decimal place, half-up.
#[must_use]
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Parse a live form quantity for previews. Blank, unparsable or
/// non-positive input yields 1 so scaling never divides into nonsense.
#[must_use]
pub fn preview_quantity(input: &str) -> i64 {
    match input.trim().parse::<i64>() {
        Ok(g) if g >= 1 => g,
        _ => 1,
    }
}

/// Share of calories from each macro, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacroSplit {
    pub protein_pct: f64,
    pub carbs_pct: f64,
    pub fat_pct: f64,
}

impl MacroSplit {
    /// Returns `None` when the macros carry no energy at all.
    #[must_use]
    pub fn from_grams(protein: f64, carbs: f64, fat: f64) -> Option<Self> {
        let p = protein.max(0.0) * KCAL_PER_G_PROTEIN;
        let c = carbs.max(0.0) * KCAL_PER_G_CARBS;
        let f = fat.max(0.0) * KCAL_PER_G_FAT;
        let total = p + c + f;
        if total <= 0.0 {
            return None;
        }
        Some(Self {
            protein_pct: round1(p / total * 100.0),
            carbs_pct: round1(c / total * 100.0),
            fat_pct: round1(f / total * 100.0),
        })
    }
}
