use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{Duration, NaiveDate};
use tracing::{debug, info};

use crate::db::Database;
use crate::error::TrackerError;
use crate::models::{
    CalorieLogEntry, DailySummary, EntryDraft, EntryMode, EntryPatch, ExportData, FoodDraft,
    FoodItem, MealSlot, NewCalorieLogEntry, NutritionTotals, NutritionValues,
};
use crate::nutrition::scale_to_quantity;
use crate::summary::{summarize_day, summarize_range};
use crate::validate::{validate_entry, validate_food};

/// Longest history window, roughly ten years.
pub const MAX_HISTORY_DAYS: i64 = 3660;

/// Owner-scoped operations over the catalog and the calorie log.
///
/// Every read and write is restricted to `owner`, which the caller resolves
/// once (from config) and injects here.
pub struct TrackerService {
    db: Database,
    owner: String,
}

impl TrackerService {
    pub fn new(db_path: &Path, owner: impl Into<String>) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self::with_database(db, owner))
    }

    pub fn new_in_memory(owner: impl Into<String>) -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self::with_database(db, owner))
    }

    #[must_use]
    pub fn with_database(db: Database, owner: impl Into<String>) -> Self {
        Self {
            db,
            owner: owner.into(),
        }
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    // --- Food catalog ---

    pub fn add_food(&self, draft: &FoodDraft) -> Result<FoodItem> {
        let food = validate_food(draft).map_err(TrackerError::from)?;
        self.db.insert_food(&self.owner, &food)
    }

    pub fn edit_food(&self, id: i64, draft: &FoodDraft) -> Result<FoodItem> {
        // Surface a missing item before complaining about the form
        self.db.get_food(&self.owner, id)?;
        let food = validate_food(draft).map_err(TrackerError::from)?;
        self.db.update_food(&self.owner, id, &food)
    }

    /// Existing log entries keep their values and show as "unknown item".
    pub fn remove_food(&self, id: i64) -> Result<bool> {
        self.db.delete_food(&self.owner, id)
    }

    pub fn get_food(&self, id: i64) -> Result<FoodItem> {
        self.db.get_food(&self.owner, id)
    }

    pub fn search_catalog(&self, term: &str) -> Result<Vec<FoodItem>> {
        self.db.search_catalog(&self.owner, term)
    }

    pub fn list_catalog(&self) -> Result<Vec<FoodItem>> {
        self.db.list_catalog(&self.owner)
    }

    /// What `grams` of a catalog item would log as, without writing anything.
    pub fn preview_scaling(&self, food_id: i64, grams: i64) -> Result<NutritionValues> {
        let food = self.db.get_food(&self.owner, food_id)?;
        Ok(scale_to_quantity(&food, grams))
    }

    // --- Calorie log ---

    pub fn log_entry(&self, draft: &EntryDraft) -> Result<CalorieLogEntry> {
        let selected = self.selected_food(draft)?;
        let entry = validate_entry(draft, selected.as_ref()).map_err(TrackerError::from)?;
        self.db.insert_entry(&self.owner, &entry)
    }

    pub fn get_entry(&self, id: i64) -> Result<CalorieLogEntry> {
        self.db.get_entry(&self.owner, id)
    }

    /// Merge `patch` into the stored entry and write it back.
    ///
    /// A linked entry is re-derived from the catalog item's per-100g values
    /// when its quantity or item changes. Changing only the meal or date keeps
    /// the stored snapshot.
    pub fn update_entry(&self, id: i64, patch: &EntryPatch) -> Result<CalorieLogEntry> {
        let stored = self.db.get_entry(&self.owner, id)?;
        if patch.is_empty() {
            return Ok(stored);
        }

        let draft = patch.apply_to(EntryDraft::from(&stored));
        let validated = match draft.mode {
            EntryMode::Catalog
                if draft.meal_item.is_some() && !Self::needs_rederive(&stored, &draft) =>
            {
                let snapshot = EntryDraft {
                    mode: EntryMode::Manual,
                    meal: draft.meal.clone(),
                    date: draft.date.clone(),
                    meal_item: None,
                    ..EntryDraft::from(&stored)
                };
                validate_entry(&snapshot, None).map(|entry| NewCalorieLogEntry {
                    meal_item: stored.meal_item,
                    ..entry
                })
            }
            EntryMode::Catalog => {
                let selected = self.selected_food(&draft)?;
                debug!(id, food_id = ?draft.meal_item, "re-deriving entry from catalog item");
                validate_entry(&draft, selected.as_ref())
            }
            EntryMode::Manual => validate_entry(&draft, None),
        }
        .map_err(TrackerError::from)?;

        self.db.update_entry(&self.owner, id, &validated)
    }

    pub fn delete_entry(&self, id: i64) -> Result<bool> {
        self.db.delete_entry(&self.owner, id)
    }

    /// Duplicate every entry of one meal onto another date/meal, snapshot
    /// values included.
    pub fn copy_meal(
        &self,
        from_date: NaiveDate,
        from_meal: MealSlot,
        to_date: NaiveDate,
        to_meal: MealSlot,
    ) -> Result<Vec<CalorieLogEntry>> {
        let entries = self
            .db
            .get_entries_for_date_and_meal(&self.owner, from_date, from_meal)?;
        let copies: Vec<NewCalorieLogEntry> = entries
            .iter()
            .map(|e| NewCalorieLogEntry {
                date: to_date,
                meal: to_meal,
                quantity_g: e.quantity_g,
                values: e.values(),
                meal_item: e.meal_item,
            })
            .collect();
        let copied = self.db.insert_entries(&self.owner, &copies)?;
        info!(
            count = copied.len(),
            %from_date, %from_meal, %to_date, %to_meal,
            "copied meal"
        );
        Ok(copied)
    }

    pub fn entries_for_date(&self, date: NaiveDate) -> Result<Vec<CalorieLogEntry>> {
        self.db.get_entries_for_date(&self.owner, date)
    }

    pub fn entries_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CalorieLogEntry>> {
        self.db.get_entries_in_range(&self.owner, start, end)
    }

    // --- Summaries ---

    pub fn daily_summary(&self, date: NaiveDate) -> Result<DailySummary> {
        let entries = self.db.get_entries_for_date(&self.owner, date)?;
        Ok(summarize_day(&self.owner, date, &entries))
    }

    /// The last `days` days ending at `today`, newest first.
    pub fn history(&self, days: i64, today: NaiveDate) -> Result<Vec<DailySummary>> {
        if days > MAX_HISTORY_DAYS {
            bail!("History is limited to {MAX_HISTORY_DAYS} days, got {days}");
        }
        let start = today
            .checked_sub_signed(Duration::days(days.max(1) - 1))
            .with_context(|| format!("{days} days before {today} is out of range"))?;
        let entries = self.db.get_entries_in_range(&self.owner, start, today)?;
        Ok(summarize_range(&self.owner, start, today, &entries))
    }

    pub fn totals(&self) -> Result<NutritionTotals> {
        self.db.nutrition_totals(&self.owner)
    }

    pub fn export(&self) -> Result<ExportData> {
        self.db.export_all(&self.owner)
    }

    fn selected_food(&self, draft: &EntryDraft) -> Result<Option<FoodItem>> {
        match (draft.mode, draft.meal_item) {
            (EntryMode::Catalog, Some(food_id)) => self.db.find_food(&self.owner, food_id),
            _ => Ok(None),
        }
    }

    fn needs_rederive(stored: &CalorieLogEntry, draft: &EntryDraft) -> bool {
        stored.meal_item != draft.meal_item
            || draft.quantity.trim() != stored.quantity_g.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldErrors;

    const OWNER: &str = "me@example.com";

    fn service() -> TrackerService {
        TrackerService::new_in_memory(OWNER).unwrap()
    }

    fn chicken_draft() -> FoodDraft {
        FoodDraft {
            name: "Chicken Breast".to_string(),
            calories: "165".to_string(),
            protein: "31".to_string(),
            carbs: "0".to_string(),
            fat: "3.6".to_string(),
            fiber: String::new(),
        }
    }

    fn catalog_draft(food_id: i64, quantity: &str) -> EntryDraft {
        EntryDraft {
            mode: EntryMode::Catalog,
            meal: "lunch".to_string(),
            date: "2024-01-01".to_string(),
            quantity: quantity.to_string(),
            meal_item: Some(food_id),
            ..EntryDraft::default()
        }
    }

    fn manual_draft(meal: &str, calories: &str) -> EntryDraft {
        EntryDraft {
            mode: EntryMode::Manual,
            meal: meal.to_string(),
            date: "2024-01-01".to_string(),
            quantity: "100".to_string(),
            calories: calories.to_string(),
            ..EntryDraft::default()
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn field_errors(err: &anyhow::Error) -> &FieldErrors {
        match err.downcast_ref::<TrackerError>() {
            Some(TrackerError::Validation(errors)) => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_add_food_validates() {
        let svc = service();
        let food = svc.add_food(&chicken_draft()).unwrap();
        assert_eq!(food.calories, 165);
        assert_eq!(food.fat, Some(3.6));
        assert!(food.fiber.is_none());

        let err = svc
            .add_food(&FoodDraft {
                name: String::new(),
                ..chicken_draft()
            })
            .unwrap_err();
        assert!(field_errors(&err).get("name").is_some());
    }

    #[test]
    fn test_edit_food_missing_is_not_found() {
        let svc = service();
        let err = svc.edit_food(42, &chicken_draft()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrackerError>(),
            Some(TrackerError::NotFound { id: 42, .. })
        ));
    }

    #[test]
    fn test_preview_scaling() {
        let svc = service();
        let food = svc.add_food(&chicken_draft()).unwrap();
        let preview = svc.preview_scaling(food.id, 150).unwrap();
        assert_eq!(preview.calories, 248);
        assert_eq!(preview.protein, Some(46.5));
        assert!(svc.preview_scaling(food.id + 1, 150).is_err());
    }

    #[test]
    fn test_log_catalog_entry_snapshots_scaled_values() {
        let svc = service();
        let food = svc.add_food(&chicken_draft()).unwrap();
        let entry = svc.log_entry(&catalog_draft(food.id, "150")).unwrap();
        assert_eq!(entry.calories, 248);
        assert_eq!(entry.protein, Some(46.5));
        assert_eq!(entry.fat, Some(5.4));
        assert_eq!(entry.meal_item, Some(food.id));
        assert_eq!(entry.food_name.as_deref(), Some("Chicken Breast"));
    }

    #[test]
    fn test_log_catalog_entry_with_missing_item() {
        let svc = service();
        let err = svc.log_entry(&catalog_draft(77, "100")).unwrap_err();
        assert!(field_errors(&err).get("meal_item").is_some());
    }

    #[test]
    fn test_log_manual_negative_calories_writes_nothing() {
        let svc = service();
        let err = svc.log_entry(&manual_draft("dinner", "-5")).unwrap_err();
        assert!(field_errors(&err).get("calories").is_some());
        assert!(svc.entries_for_date(date("2024-01-01")).unwrap().is_empty());
    }

    #[test]
    fn test_catalog_edit_does_not_touch_logged_entries() {
        let svc = service();
        let food = svc.add_food(&chicken_draft()).unwrap();
        let entry = svc.log_entry(&catalog_draft(food.id, "200")).unwrap();
        svc.edit_food(
            food.id,
            &FoodDraft {
                calories: "500".to_string(),
                ..chicken_draft()
            },
        )
        .unwrap();

        let fetched = svc.get_entry(entry.id).unwrap();
        assert_eq!(fetched.calories, 330);
    }

    #[test]
    fn test_remove_food_keeps_entry() {
        let svc = service();
        let food = svc.add_food(&chicken_draft()).unwrap();
        let entry = svc.log_entry(&catalog_draft(food.id, "100")).unwrap();
        assert!(svc.remove_food(food.id).unwrap());
        assert!(!svc.remove_food(food.id).unwrap());

        let fetched = svc.get_entry(entry.id).unwrap();
        assert_eq!(fetched.calories, 165);
        assert_eq!(fetched.display_name(), "unknown item");
    }

    #[test]
    fn test_update_quantity_rederives_from_catalog() {
        let svc = service();
        let food = svc.add_food(&chicken_draft()).unwrap();
        let entry = svc.log_entry(&catalog_draft(food.id, "1")).unwrap();
        assert_eq!(entry.calories, 2);

        let updated = svc
            .update_entry(
                entry.id,
                &EntryPatch {
                    quantity: Some("100".to_string()),
                    ..EntryPatch::default()
                },
            )
            .unwrap();
        // From the per-100g values, not 2 kcal * 100
        assert_eq!(updated.calories, 165);
        assert_eq!(updated.protein, Some(31.0));
        assert_eq!(updated.quantity_g, 100);
    }

    #[test]
    fn test_update_meal_only_keeps_snapshot() {
        let svc = service();
        let food = svc.add_food(&chicken_draft()).unwrap();
        let entry = svc.log_entry(&catalog_draft(food.id, "100")).unwrap();
        svc.edit_food(
            food.id,
            &FoodDraft {
                calories: "999".to_string(),
                ..chicken_draft()
            },
        )
        .unwrap();

        let updated = svc
            .update_entry(
                entry.id,
                &EntryPatch {
                    meal: Some("dinner".to_string()),
                    ..EntryPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.meal, MealSlot::Dinner);
        assert_eq!(updated.calories, 165);
        assert_eq!(updated.meal_item, Some(food.id));
    }

    #[test]
    fn test_update_quantity_after_item_deleted() {
        let svc = service();
        let food = svc.add_food(&chicken_draft()).unwrap();
        let entry = svc.log_entry(&catalog_draft(food.id, "100")).unwrap();
        svc.remove_food(food.id).unwrap();

        let err = svc
            .update_entry(
                entry.id,
                &EntryPatch {
                    quantity: Some("50".to_string()),
                    ..EntryPatch::default()
                },
            )
            .unwrap_err();
        assert!(field_errors(&err).get("meal_item").is_some());
        assert_eq!(svc.get_entry(entry.id).unwrap().quantity_g, 100);
    }

    #[test]
    fn test_update_switch_to_manual() {
        let svc = service();
        let food = svc.add_food(&chicken_draft()).unwrap();
        let entry = svc.log_entry(&catalog_draft(food.id, "100")).unwrap();

        let updated = svc
            .update_entry(
                entry.id,
                &EntryPatch {
                    mode: Some(EntryMode::Manual),
                    calories: Some("320".to_string()),
                    ..EntryPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.calories, 320);
        assert!(updated.meal_item.is_none());
        assert_eq!(updated.display_name(), "manual entry");
    }

    #[test]
    fn test_update_missing_entry() {
        let svc = service();
        let err = svc
            .update_entry(
                5,
                &EntryPatch {
                    meal: Some("lunch".to_string()),
                    ..EntryPatch::default()
                },
            )
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrackerError>(),
            Some(TrackerError::NotFound { .. })
        ));
    }

    #[test]
    fn test_daily_summary() {
        let svc = service();
        svc.log_entry(&manual_draft("breakfast", "300")).unwrap();
        svc.log_entry(&manual_draft("lunch", "500")).unwrap();

        let summary = svc.daily_summary(date("2024-01-01")).unwrap();
        assert_eq!(summary.totals.calories, 800);
        assert_eq!(summary.meals.breakfast.calories, 300);
        assert_eq!(summary.meals.lunch.calories, 500);
        assert_eq!(summary.meals.dinner.calories, 0);
        assert_eq!(summary.owner, OWNER);

        let other = TrackerService::with_database(Database::open_in_memory().unwrap(), "other");
        assert_eq!(
            other.daily_summary(date("2024-01-01")).unwrap().totals.entry_count,
            0
        );
    }

    #[test]
    fn test_copy_meal() {
        let svc = service();
        let food = svc.add_food(&chicken_draft()).unwrap();
        svc.log_entry(&catalog_draft(food.id, "150")).unwrap();
        svc.log_entry(&manual_draft("lunch", "90")).unwrap();
        svc.log_entry(&manual_draft("dinner", "700")).unwrap();

        let copied = svc
            .copy_meal(
                date("2024-01-01"),
                MealSlot::Lunch,
                date("2024-01-02"),
                MealSlot::Dinner,
            )
            .unwrap();
        assert_eq!(copied.len(), 2);
        assert!(copied.iter().all(|e| e.meal == MealSlot::Dinner));

        let summary = svc.daily_summary(date("2024-01-02")).unwrap();
        assert_eq!(summary.meals.dinner.calories, 248 + 90);
    }

    #[test]
    fn test_history_includes_empty_days() {
        let svc = service();
        svc.log_entry(&manual_draft("lunch", "500")).unwrap();

        let history = svc.history(3, date("2024-01-02")).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].date, date("2024-01-02"));
        assert_eq!(history[0].totals.calories, 0);
        assert_eq!(history[1].totals.calories, 500);
        assert_eq!(history[2].date, date("2023-12-31"));

        assert_eq!(svc.history(0, date("2024-01-02")).unwrap().len(), 1);
    }

    #[test]
    fn test_history_window_out_of_range_is_an_error() {
        let svc = service();
        assert!(svc.history(i64::from(u32::MAX), date("2024-01-01")).is_err());
        assert!(svc.history(MAX_HISTORY_DAYS + 1, date("2024-01-01")).is_err());
        assert!(svc.history(10, NaiveDate::MIN).is_err());

        let history = svc.history(MAX_HISTORY_DAYS, date("2024-01-01")).unwrap();
        assert_eq!(history.len(), 3660);
    }

    #[test]
    fn test_log_oversized_quantity_is_rejected() {
        let svc = service();
        let food = svc.add_food(&chicken_draft()).unwrap();
        let err = svc
            .log_entry(&catalog_draft(food.id, "100000000000000000"))
            .unwrap_err();
        assert!(field_errors(&err).get("quantity").is_some());
        assert!(svc.entries_for_date(date("2024-01-01")).unwrap().is_empty());
    }

    #[test]
    fn test_update_to_catalog_without_item_is_rejected() {
        let svc = service();
        let entry = svc.log_entry(&manual_draft("lunch", "300")).unwrap();

        let patch = EntryPatch {
            mode: Some(EntryMode::Catalog),
            ..EntryPatch::default()
        };
        let err = svc.update_entry(entry.id, &patch).unwrap_err();
        assert_eq!(
            field_errors(&err).get("meal_item").unwrap().message,
            "Select a food item"
        );

        let stored = svc.get_entry(entry.id).unwrap();
        assert_eq!(stored.calories, 300);
        assert!(stored.meal_item.is_none());
    }

    #[test]
    fn test_totals_and_export() {
        let svc = service();
        svc.add_food(&chicken_draft()).unwrap();
        svc.log_entry(&manual_draft("lunch", "500")).unwrap();
        svc.log_entry(&manual_draft("snack", "150")).unwrap();

        let totals = svc.totals().unwrap();
        assert_eq!(totals.calories, 650);
        assert_eq!(totals.entry_count, 2);

        let export = svc.export().unwrap();
        assert_eq!(export.food_items.len(), 1);
        assert_eq!(export.entries.len(), 2);
    }
}
