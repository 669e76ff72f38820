use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::nutrition::MacroSplit;

/// A reusable catalog record of per-100g nutrition facts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FoodItem {
    pub id: i64,
    #[serde(default)]
    pub uuid: String,
    pub owner: String,
    pub name: String,
    pub calories: i64,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub fiber: Option<f64>,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewFoodItem {
    pub name: String,
    pub calories: i64,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub fiber: Option<f64>,
}

/// Raw catalog form input, validated by [`crate::validate::validate_food`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FoodDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub calories: String,
    #[serde(default)]
    pub protein: String,
    #[serde(default)]
    pub carbs: String,
    #[serde(default)]
    pub fat: String,
    #[serde(default)]
    pub fiber: String,
}

impl From<&FoodItem> for FoodDraft {
    fn from(food: &FoodItem) -> Self {
        Self {
            name: food.name.clone(),
            calories: food.calories.to_string(),
            protein: opt_to_field(food.protein),
            carbs: opt_to_field(food.carbs),
            fat: opt_to_field(food.fat),
            fiber: opt_to_field(food.fiber),
        }
    }
}

/// One of the four fixed meal slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealSlot {
    pub const ALL: [MealSlot; 4] = [
        MealSlot::Breakfast,
        MealSlot::Lunch,
        MealSlot::Dinner,
        MealSlot::Snack,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MealSlot::Breakfast => "breakfast",
            MealSlot::Lunch => "lunch",
            MealSlot::Dinner => "dinner",
            MealSlot::Snack => "snack",
        }
    }
}

impl fmt::Display for MealSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMealSlot(pub String);

impl fmt::Display for UnknownMealSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = MealSlot::ALL.iter().map(|m| m.as_str()).collect();
        write!(
            f,
            "Invalid meal '{}'. Must be one of: {}",
            self.0,
            names.join(", ")
        )
    }
}

impl std::error::Error for UnknownMealSlot {}

impl FromStr for MealSlot {
    type Err = UnknownMealSlot;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "breakfast" => Ok(MealSlot::Breakfast),
            "lunch" => Ok(MealSlot::Lunch),
            "dinner" => Ok(MealSlot::Dinner),
            "snack" => Ok(MealSlot::Snack),
            _ => Err(UnknownMealSlot(s.to_string())),
        }
    }
}

/// Absolute nutrition values for a concrete quantity of food.
///
/// Macros are `None` when unknown; `Some(0.0)` means "known to be zero".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NutritionValues {
    pub calories: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protein: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carbs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiber: Option<f64>,
}

impl NutritionValues {
    #[must_use]
    pub fn macro_split(&self) -> Option<MacroSplit> {
        MacroSplit::from_grams(
            self.protein.unwrap_or(0.0),
            self.carbs.unwrap_or(0.0),
            self.fat.unwrap_or(0.0),
        )
    }
}

/// A dated, meal-tagged consumption record carrying its own nutrition snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalorieLogEntry {
    pub id: i64,
    #[serde(default)]
    pub uuid: String,
    pub owner: String,
    pub date: NaiveDate,
    pub meal: MealSlot,
    pub quantity_g: i64,
    pub calories: i64,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub fiber: Option<f64>,
    /// Weak reference to the catalog item the values were derived from.
    pub meal_item: Option<i64>,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    // Joined for display only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub food_name: Option<String>,
}

impl CalorieLogEntry {
    #[must_use]
    pub fn mode(&self) -> EntryMode {
        if self.meal_item.is_some() {
            EntryMode::Catalog
        } else {
            EntryMode::Manual
        }
    }

    #[must_use]
    pub fn values(&self) -> NutritionValues {
        NutritionValues {
            calories: self.calories,
            protein: self.protein,
            carbs: self.carbs,
            fat: self.fat,
            fiber: self.fiber,
        }
    }

    /// Label for display. A linked item that no longer exists shows as "unknown item".
    #[must_use]
    pub fn display_name(&self) -> &str {
        match (&self.food_name, self.meal_item) {
            (Some(name), _) => name,
            (None, Some(_)) => "unknown item",
            (None, None) => "manual entry",
        }
    }
}

/// A validated entry ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCalorieLogEntry {
    pub date: NaiveDate,
    pub meal: MealSlot,
    pub quantity_g: i64,
    pub values: NutritionValues,
    pub meal_item: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryMode {
    #[default]
    Manual,
    Catalog,
}

/// Raw calorie-entry form input, validated by [`crate::validate::validate_entry`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryDraft {
    #[serde(default)]
    pub mode: EntryMode,
    #[serde(default)]
    pub meal: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub quantity: String,
    #[serde(default)]
    pub calories: String,
    #[serde(default)]
    pub protein: String,
    #[serde(default)]
    pub carbs: String,
    #[serde(default)]
    pub fat: String,
    #[serde(default)]
    pub fiber: String,
    #[serde(default)]
    pub meal_item: Option<i64>,
}

impl From<&CalorieLogEntry> for EntryDraft {
    fn from(entry: &CalorieLogEntry) -> Self {
        Self {
            mode: entry.mode(),
            meal: entry.meal.to_string(),
            date: entry.date.format("%Y-%m-%d").to_string(),
            quantity: entry.quantity_g.to_string(),
            calories: entry.calories.to_string(),
            protein: opt_to_field(entry.protein),
            carbs: opt_to_field(entry.carbs),
            fat: opt_to_field(entry.fat),
            fiber: opt_to_field(entry.fiber),
            meal_item: entry.meal_item,
        }
    }
}

/// Partial edit of an existing entry. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryPatch {
    pub mode: Option<EntryMode>,
    pub meal: Option<String>,
    pub date: Option<String>,
    pub quantity: Option<String>,
    pub calories: Option<String>,
    pub protein: Option<String>,
    pub carbs: Option<String>,
    pub fat: Option<String>,
    pub fiber: Option<String>,
    pub meal_item: Option<i64>,
}

impl EntryPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mode.is_none()
            && self.meal.is_none()
            && self.date.is_none()
            && self.quantity.is_none()
            && self.calories.is_none()
            && self.protein.is_none()
            && self.carbs.is_none()
            && self.fat.is_none()
            && self.fiber.is_none()
            && self.meal_item.is_none()
    }

    /// Overlay this patch on a draft built from the stored entry.
    #[must_use]
    pub fn apply_to(&self, mut draft: EntryDraft) -> EntryDraft {
        if let Some(mode) = self.mode {
            draft.mode = mode;
        }
        if let Some(item) = self.meal_item {
            draft.meal_item = Some(item);
            draft.mode = EntryMode::Catalog;
        }
        let fields = [
            (&self.meal, &mut draft.meal),
            (&self.date, &mut draft.date),
            (&self.quantity, &mut draft.quantity),
            (&self.calories, &mut draft.calories),
            (&self.protein, &mut draft.protein),
            (&self.carbs, &mut draft.carbs),
            (&self.fat, &mut draft.fat),
            (&self.fiber, &mut draft.fiber),
        ];
        for (patch, slot) in fields {
            if let Some(value) = patch {
                slot.clone_from(value);
            }
        }
        if draft.mode == EntryMode::Manual {
            draft.meal_item = None;
        }
        draft
    }
}

/// Per-bucket running sums.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NutritionTotals {
    pub calories: i64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub fiber: f64,
    pub quantity_g: i64,
    pub entry_count: i64,
}

impl NutritionTotals {
    pub fn add(&mut self, entry: &CalorieLogEntry) {
        self.calories = self.calories.saturating_add(entry.calories);
        self.protein += entry.protein.unwrap_or(0.0);
        self.carbs += entry.carbs.unwrap_or(0.0);
        self.fat += entry.fat.unwrap_or(0.0);
        self.fiber += entry.fiber.unwrap_or(0.0);
        self.quantity_g = self.quantity_g.saturating_add(entry.quantity_g);
        self.entry_count += 1;
    }

    #[must_use]
    pub fn macro_split(&self) -> Option<MacroSplit> {
        MacroSplit::from_grams(self.protein, self.carbs, self.fat)
    }
}

/// All four meal buckets. Every slot is always present, even when empty.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MealBuckets {
    pub breakfast: NutritionTotals,
    pub lunch: NutritionTotals,
    pub dinner: NutritionTotals,
    pub snack: NutritionTotals,
}

impl MealBuckets {
    #[must_use]
    pub fn get(&self, meal: MealSlot) -> &NutritionTotals {
        match meal {
            MealSlot::Breakfast => &self.breakfast,
            MealSlot::Lunch => &self.lunch,
            MealSlot::Dinner => &self.dinner,
            MealSlot::Snack => &self.snack,
        }
    }

    pub fn get_mut(&mut self, meal: MealSlot) -> &mut NutritionTotals {
        match meal {
            MealSlot::Breakfast => &mut self.breakfast,
            MealSlot::Lunch => &mut self.lunch,
            MealSlot::Dinner => &mut self.dinner,
            MealSlot::Snack => &mut self.snack,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (MealSlot, &NutritionTotals)> {
        MealSlot::ALL.into_iter().map(move |m| (m, self.get(m)))
    }
}

/// Derived, never persisted: one owner's nutrition for one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    pub owner: String,
    pub date: NaiveDate,
    pub totals: NutritionTotals,
    pub meals: MealBuckets,
    /// Ids of entries handed to the aggregator that did not belong to this day.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<i64>,
}

impl DailySummary {
    #[must_use]
    pub fn empty(owner: &str, date: NaiveDate) -> Self {
        Self {
            owner: owner.to_string(),
            date,
            totals: NutritionTotals::default(),
            meals: MealBuckets::default(),
            skipped: Vec::new(),
        }
    }
}

// --- Export types ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportData {
    pub version: i64,
    pub exported_at: String,
    pub owner: String,
    pub food_items: Vec<FoodItem>,
    pub entries: Vec<CalorieLogEntry>,
}

fn opt_to_field(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
