use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;
use uuid::Uuid;

use crate::error::TrackerError;
use crate::models::{
    CalorieLogEntry, ExportData, FoodItem, MealSlot, NewCalorieLogEntry, NewFoodItem,
    NutritionTotals,
};

/// Upper bound on catalog search results.
pub const CATALOG_SEARCH_LIMIT: usize = 50;

const EXPORT_VERSION: i64 = 1;

const FOOD_COLUMNS: &str =
    "id, uuid, owner, name, calories, protein, carbs, fat, fiber, created_at, updated_at";

const ENTRY_SELECT: &str = "SELECT e.id, e.uuid, e.owner, e.date, e.meal, e.quantity_g, e.calories,
        e.protein, e.carbs, e.fat, e.fiber, e.meal_item, e.created_at, e.updated_at,
        f.name
     FROM calorie_entries e
     LEFT JOIN food_items f ON e.meal_item = f.id AND f.owner = e.owner";

pub struct Database {
    conn: Connection,
}

/// An entry row as stored. Meal and date are still text so a bad row can be
/// reported instead of failing inside the row callback.
struct EntryRow {
    id: i64,
    uuid: Option<String>,
    owner: String,
    date: String,
    meal: String,
    quantity_g: i64,
    calories: i64,
    protein: Option<f64>,
    carbs: Option<f64>,
    fat: Option<f64>,
    fiber: Option<f64>,
    meal_item: Option<i64>,
    created_at: String,
    updated_at: Option<String>,
    food_name: Option<String>,
}

impl EntryRow {
    fn into_entry(self) -> Result<CalorieLogEntry> {
        let meal = self.meal.parse::<MealSlot>().map_err(|_| {
            TrackerError::AggregationInconsistency {
                entry_id: self.id,
                meal: self.meal.clone(),
            }
        })?;
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .with_context(|| format!("Entry {} has invalid date '{}'", self.id, self.date))?;
        Ok(CalorieLogEntry {
            id: self.id,
            uuid: self.uuid.unwrap_or_default(),
            owner: self.owner,
            date,
            meal,
            quantity_g: self.quantity_g,
            calories: self.calories,
            protein: self.protein,
            carbs: self.carbs,
            fat: self.fat,
            fiber: self.fiber,
            meal_item: self.meal_item,
            created_at: self.created_at,
            updated_at: self.updated_at.unwrap_or_default(),
            food_name: self.food_name,
        })
    }
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            // meal_item is a weak reference: deleting a food keeps its entries.
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS food_items (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL,
                    owner TEXT NOT NULL,
                    name TEXT NOT NULL,
                    calories INTEGER NOT NULL,
                    protein REAL,
                    carbs REAL,
                    fat REAL,
                    fiber REAL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS calorie_entries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL,
                    owner TEXT NOT NULL,
                    date TEXT NOT NULL,
                    meal TEXT NOT NULL,
                    quantity_g INTEGER NOT NULL,
                    calories INTEGER NOT NULL,
                    protein REAL,
                    carbs REAL,
                    fat REAL,
                    fiber REAL,
                    meal_item INTEGER,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE UNIQUE INDEX IF NOT EXISTS idx_food_items_uuid ON food_items(uuid);
                CREATE INDEX IF NOT EXISTS idx_food_items_owner ON food_items(owner, created_at);
                CREATE UNIQUE INDEX IF NOT EXISTS idx_calorie_entries_uuid ON calorie_entries(uuid);
                CREATE INDEX IF NOT EXISTS idx_calorie_entries_owner_date ON calorie_entries(owner, date);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn food_from_row(row: &rusqlite::Row) -> rusqlite::Result<FoodItem> {
        Ok(FoodItem {
            id: row.get(0)?,
            uuid: row.get(1)?,
            owner: row.get(2)?,
            name: row.get(3)?,
            calories: row.get(4)?,
            protein: row.get(5)?,
            carbs: row.get(6)?,
            fat: row.get(7)?,
            fiber: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    // Expects the column order of ENTRY_SELECT
    fn entry_row_from_row(row: &rusqlite::Row) -> rusqlite::Result<EntryRow> {
        Ok(EntryRow {
            id: row.get(0)?,
            uuid: row.get(1)?,
            owner: row.get(2)?,
            date: row.get(3)?,
            meal: row.get(4)?,
            quantity_g: row.get(5)?,
            calories: row.get(6)?,
            protein: row.get(7)?,
            carbs: row.get(8)?,
            fat: row.get(9)?,
            fiber: row.get(10)?,
            meal_item: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
            food_name: row.get(14)?,
        })
    }

    fn query_entries(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<CalorieLogEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, Self::entry_row_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(EntryRow::into_entry).collect()
    }

    // --- Food catalog ---

    pub fn insert_food(&self, owner: &str, food: &NewFoodItem) -> Result<FoodItem> {
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO food_items (uuid, owner, name, calories, protein, carbs, fat, fiber, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                uuid,
                owner,
                food.name,
                food.calories,
                food.protein,
                food.carbs,
                food.fat,
                food.fiber,
                now,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(id, name = %food.name, "inserted food item");
        self.get_food(owner, id)
    }

    pub fn find_food(&self, owner: &str, id: i64) -> Result<Option<FoodItem>> {
        let food = self
            .conn
            .query_row(
                &format!("SELECT {FOOD_COLUMNS} FROM food_items WHERE id = ?1 AND owner = ?2"),
                params![id, owner],
                Self::food_from_row,
            )
            .optional()?;
        Ok(food)
    }

    pub fn get_food(&self, owner: &str, id: i64) -> Result<FoodItem> {
        self.find_food(owner, id)?
            .ok_or_else(|| TrackerError::food_not_found(id).into())
    }

    pub fn update_food(&self, owner: &str, id: i64, food: &NewFoodItem) -> Result<FoodItem> {
        let now = Local::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE food_items
             SET name = ?1, calories = ?2, protein = ?3, carbs = ?4, fat = ?5, fiber = ?6, updated_at = ?7
             WHERE id = ?8 AND owner = ?9",
            params![
                food.name,
                food.calories,
                food.protein,
                food.carbs,
                food.fat,
                food.fiber,
                now,
                id,
                owner,
            ],
        )?;
        if rows == 0 {
            return Err(TrackerError::food_not_found(id).into());
        }
        debug!(id, "updated food item");
        self.get_food(owner, id)
    }

    /// Entries that referenced the item keep their values and the dangling id.
    pub fn delete_food(&self, owner: &str, id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM food_items WHERE id = ?1 AND owner = ?2",
            params![id, owner],
        )?;
        debug!(id, deleted = rows > 0, "delete food item");
        Ok(rows > 0)
    }

    /// Case-insensitive substring search over the owner's catalog, newest
    /// first. A blank term returns the most recent items.
    ///
    /// Matching folds full Unicode case in Rust since SQLite's `LIKE` only
    /// folds ASCII.
    pub fn search_catalog(&self, owner: &str, term: &str) -> Result<Vec<FoodItem>> {
        let needle = term.trim().to_lowercase();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FOOD_COLUMNS} FROM food_items
             WHERE owner = ?1
             ORDER BY created_at DESC, id DESC"
        ))?;
        let mut foods = Vec::new();
        for food in stmt.query_map(params![owner], Self::food_from_row)? {
            let food = food?;
            if food.name.to_lowercase().contains(&needle) {
                foods.push(food);
                if foods.len() == CATALOG_SEARCH_LIMIT {
                    break;
                }
            }
        }
        Ok(foods)
    }

    pub fn list_catalog(&self, owner: &str) -> Result<Vec<FoodItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FOOD_COLUMNS} FROM food_items WHERE owner = ?1 ORDER BY name COLLATE NOCASE, id"
        ))?;
        let foods = stmt
            .query_map(params![owner], Self::food_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(foods)
    }

    // --- Calorie log ---

    pub fn insert_entry(&self, owner: &str, entry: &NewCalorieLogEntry) -> Result<CalorieLogEntry> {
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        let date_str = entry.date.format("%Y-%m-%d").to_string();
        self.conn.execute(
            "INSERT INTO calorie_entries (uuid, owner, date, meal, quantity_g, calories, protein, carbs, fat, fiber, meal_item, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                uuid,
                owner,
                date_str,
                entry.meal.as_str(),
                entry.quantity_g,
                entry.values.calories,
                entry.values.protein,
                entry.values.carbs,
                entry.values.fat,
                entry.values.fiber,
                entry.meal_item,
                now,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(id, date = %date_str, meal = %entry.meal, calories = entry.values.calories, "inserted calorie entry");
        self.get_entry(owner, id)
    }

    /// Insert several entries atomically: either all are written or none.
    pub fn insert_entries(
        &self,
        owner: &str,
        entries: &[NewCalorieLogEntry],
    ) -> Result<Vec<CalorieLogEntry>> {
        let tx = self.conn.unchecked_transaction()?;
        let inserted = entries
            .iter()
            .map(|entry| self.insert_entry(owner, entry))
            .collect::<Result<Vec<_>>>()?;
        tx.commit()?;
        Ok(inserted)
    }

    pub fn find_entry(&self, owner: &str, id: i64) -> Result<Option<CalorieLogEntry>> {
        let row = self
            .conn
            .query_row(
                &format!("{ENTRY_SELECT} WHERE e.id = ?1 AND e.owner = ?2"),
                params![id, owner],
                Self::entry_row_from_row,
            )
            .optional()?;
        row.map(EntryRow::into_entry).transpose()
    }

    pub fn get_entry(&self, owner: &str, id: i64) -> Result<CalorieLogEntry> {
        self.find_entry(owner, id)?
            .ok_or_else(|| TrackerError::entry_not_found(id).into())
    }

    /// Overwrite every mutable column of an entry with a validated value.
    pub fn update_entry(
        &self,
        owner: &str,
        id: i64,
        entry: &NewCalorieLogEntry,
    ) -> Result<CalorieLogEntry> {
        let now = Local::now().to_rfc3339();
        let date_str = entry.date.format("%Y-%m-%d").to_string();
        let rows = self.conn.execute(
            "UPDATE calorie_entries
             SET date = ?1, meal = ?2, quantity_g = ?3, calories = ?4, protein = ?5, carbs = ?6,
                 fat = ?7, fiber = ?8, meal_item = ?9, updated_at = ?10
             WHERE id = ?11 AND owner = ?12",
            params![
                date_str,
                entry.meal.as_str(),
                entry.quantity_g,
                entry.values.calories,
                entry.values.protein,
                entry.values.carbs,
                entry.values.fat,
                entry.values.fiber,
                entry.meal_item,
                now,
                id,
                owner,
            ],
        )?;
        if rows == 0 {
            return Err(TrackerError::entry_not_found(id).into());
        }
        debug!(id, "updated calorie entry");
        self.get_entry(owner, id)
    }

    pub fn delete_entry(&self, owner: &str, id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM calorie_entries WHERE id = ?1 AND owner = ?2",
            params![id, owner],
        )?;
        debug!(id, deleted = rows > 0, "delete calorie entry");
        Ok(rows > 0)
    }

    pub fn get_entries_for_date(&self, owner: &str, date: NaiveDate) -> Result<Vec<CalorieLogEntry>> {
        let date_str = date.format("%Y-%m-%d").to_string();
        self.query_entries(
            &format!("{ENTRY_SELECT} WHERE e.owner = ?1 AND e.date = ?2 ORDER BY e.created_at, e.id"),
            &[&owner, &date_str],
        )
    }

    pub fn get_entries_for_date_and_meal(
        &self,
        owner: &str,
        date: NaiveDate,
        meal: MealSlot,
    ) -> Result<Vec<CalorieLogEntry>> {
        let date_str = date.format("%Y-%m-%d").to_string();
        self.query_entries(
            &format!(
                "{ENTRY_SELECT} WHERE e.owner = ?1 AND e.date = ?2 AND e.meal = ?3 ORDER BY e.created_at, e.id"
            ),
            &[&owner, &date_str, &meal.as_str()],
        )
    }

    /// Entries with `start <= date <= end`, newest date first, then newest write.
    pub fn get_entries_in_range(
        &self,
        owner: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CalorieLogEntry>> {
        let start_str = start.format("%Y-%m-%d").to_string();
        let end_str = end.format("%Y-%m-%d").to_string();
        self.query_entries(
            &format!(
                "{ENTRY_SELECT} WHERE e.owner = ?1 AND e.date >= ?2 AND e.date <= ?3
                 ORDER BY e.date DESC, e.created_at DESC, e.id DESC"
            ),
            &[&owner, &start_str, &end_str],
        )
    }

    pub fn get_all_entries(&self, owner: &str) -> Result<Vec<CalorieLogEntry>> {
        self.query_entries(
            &format!("{ENTRY_SELECT} WHERE e.owner = ?1 ORDER BY e.date DESC, e.created_at DESC, e.id DESC"),
            &[&owner],
        )
    }

    /// Lifetime sums over every entry the owner has logged.
    pub fn nutrition_totals(&self, owner: &str) -> Result<NutritionTotals> {
        let totals = self.conn.query_row(
            "SELECT COALESCE(SUM(calories), 0), COALESCE(SUM(protein), 0.0),
                    COALESCE(SUM(carbs), 0.0), COALESCE(SUM(fat), 0.0),
                    COALESCE(SUM(fiber), 0.0), COALESCE(SUM(quantity_g), 0), COUNT(*)
             FROM calorie_entries WHERE owner = ?1",
            params![owner],
            |row| {
                Ok(NutritionTotals {
                    calories: row.get(0)?,
                    protein: row.get(1)?,
                    carbs: row.get(2)?,
                    fat: row.get(3)?,
                    fiber: row.get(4)?,
                    quantity_g: row.get(5)?,
                    entry_count: row.get(6)?,
                })
            },
        )?;
        Ok(totals)
    }

    // --- Export ---

    pub fn export_all(&self, owner: &str) -> Result<ExportData> {
        let mut food_items = self.list_catalog(owner)?;
        food_items.sort_by_key(|f| f.id);
        let mut entries = self.get_all_entries(owner)?;
        entries.sort_by_key(|e| e.id);
        Ok(ExportData {
            version: EXPORT_VERSION,
            exported_at: Local::now().to_rfc3339(),
            owner: owner.to_string(),
            food_items,
            entries,
        })
    }

    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NutritionValues;

    const OWNER: &str = "me@example.com";

    fn chicken() -> NewFoodItem {
        NewFoodItem {
            name: "Chicken Breast".to_string(),
            calories: 165,
            protein: Some(31.0),
            carbs: Some(0.0),
            fat: Some(3.6),
            fiber: None,
        }
    }

    fn named(name: &str) -> NewFoodItem {
        NewFoodItem {
            name: name.to_string(),
            calories: 100,
            protein: None,
            carbs: None,
            fat: None,
            fiber: None,
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn manual(d: &str, meal: MealSlot, calories: i64) -> NewCalorieLogEntry {
        NewCalorieLogEntry {
            date: date(d),
            meal,
            quantity_g: 100,
            values: NutritionValues {
                calories,
                ..NutritionValues::default()
            },
            meal_item: None,
        }
    }

    #[test]
    fn test_insert_and_get_food() {
        let db = Database::open_in_memory().unwrap();
        let food = db.insert_food(OWNER, &chicken()).unwrap();

        assert_eq!(food.name, "Chicken Breast");
        assert_eq!(food.owner, OWNER);
        assert_eq!(food.calories, 165);
        assert_eq!(food.protein, Some(31.0));
        assert_eq!(food.carbs, Some(0.0));
        assert!(food.fiber.is_none());
        assert!(!food.uuid.is_empty());

        let fetched = db.get_food(OWNER, food.id).unwrap();
        assert_eq!(fetched, food);
    }

    #[test]
    fn test_food_is_owner_scoped() {
        let db = Database::open_in_memory().unwrap();
        let food = db.insert_food(OWNER, &chicken()).unwrap();

        assert!(db.find_food("intruder", food.id).unwrap().is_none());
        let err = db.get_food("intruder", food.id).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrackerError>(),
            Some(TrackerError::NotFound { .. })
        ));
        assert!(!db.delete_food("intruder", food.id).unwrap());
        assert!(db.search_catalog("intruder", "chicken").unwrap().is_empty());
    }

    #[test]
    fn test_update_food() {
        let db = Database::open_in_memory().unwrap();
        let food = db.insert_food(OWNER, &chicken()).unwrap();
        let updated = db
            .update_food(
                OWNER,
                food.id,
                &NewFoodItem {
                    calories: 170,
                    fiber: Some(0.5),
                    ..chicken()
                },
            )
            .unwrap();
        assert_eq!(updated.calories, 170);
        assert_eq!(updated.fiber, Some(0.5));
        assert_eq!(updated.uuid, food.uuid);

        assert!(db.update_food(OWNER, 999, &chicken()).is_err());
    }

    #[test]
    fn test_search_catalog_case_insensitive() {
        let db = Database::open_in_memory().unwrap();
        db.insert_food(OWNER, &named("Apple")).unwrap();
        db.insert_food(OWNER, &named("Pineapple")).unwrap();
        db.insert_food(OWNER, &named("Banana")).unwrap();

        let results = db.search_catalog(OWNER, "APP").unwrap();
        let names: Vec<&str> = results.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Pineapple", "Apple"]);

        assert!(db.search_catalog(OWNER, "pizza").unwrap().is_empty());
    }

    #[test]
    fn test_search_catalog_partial_name() {
        let db = Database::open_in_memory().unwrap();
        let chicken = db.insert_food(OWNER, &named("Chicken Breast")).unwrap();
        db.insert_food(OWNER, &named("Broccoli")).unwrap();

        let results = db.search_catalog(OWNER, "chick").unwrap();
        assert_eq!(results, vec![chicken]);
    }

    #[test]
    fn test_search_catalog_folds_non_ascii_case() {
        let db = Database::open_in_memory().unwrap();
        db.insert_food(OWNER, &named("Ärtsoppa")).unwrap();
        db.insert_food(OWNER, &named("ÉCLAIR")).unwrap();

        let results = db.search_catalog(OWNER, "ärt").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Ärtsoppa");

        let results = db.search_catalog(OWNER, "éclair").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "ÉCLAIR");
    }

    #[test]
    fn test_search_catalog_escapes_wildcards() {
        let db = Database::open_in_memory().unwrap();
        db.insert_food(OWNER, &named("Milk 2%")).unwrap();
        db.insert_food(OWNER, &named("Whole Milk")).unwrap();

        let results = db.search_catalog(OWNER, "%").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Milk 2%");
        assert!(db.search_catalog(OWNER, "_").unwrap().is_empty());
    }

    #[test]
    fn test_search_catalog_limit() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..60 {
            db.insert_food(OWNER, &named(&format!("Food {i}"))).unwrap();
        }
        let results = db.search_catalog(OWNER, "food").unwrap();
        assert_eq!(results.len(), 50);
        // Newest first
        assert_eq!(results[0].name, "Food 59");
        assert!(
            results
                .iter()
                .all(|f| f.name.to_lowercase().contains("food"))
        );
    }

    #[test]
    fn test_search_catalog_blank_term_returns_recent() {
        let db = Database::open_in_memory().unwrap();
        db.insert_food(OWNER, &named("Oats")).unwrap();
        db.insert_food(OWNER, &named("Yogurt")).unwrap();

        let results = db.search_catalog(OWNER, "   ").unwrap();
        let names: Vec<&str> = results.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Yogurt", "Oats"]);
    }

    #[test]
    fn test_list_catalog_sorted_by_name() {
        let db = Database::open_in_memory().unwrap();
        db.insert_food(OWNER, &named("banana")).unwrap();
        db.insert_food(OWNER, &named("Apple")).unwrap();
        db.insert_food("other", &named("Cherry")).unwrap();

        let names: Vec<String> = db
            .list_catalog(OWNER)
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["Apple", "banana"]);
    }

    #[test]
    fn test_insert_and_get_entry() {
        let db = Database::open_in_memory().unwrap();
        let food = db.insert_food(OWNER, &chicken()).unwrap();
        let entry = db
            .insert_entry(
                OWNER,
                &NewCalorieLogEntry {
                    date: date("2024-01-01"),
                    meal: MealSlot::Lunch,
                    quantity_g: 150,
                    values: NutritionValues {
                        calories: 248,
                        protein: Some(46.5),
                        carbs: Some(0.0),
                        fat: Some(5.4),
                        fiber: None,
                    },
                    meal_item: Some(food.id),
                },
            )
            .unwrap();

        assert_eq!(entry.meal, MealSlot::Lunch);
        assert_eq!(entry.date, date("2024-01-01"));
        assert_eq!(entry.calories, 248);
        assert_eq!(entry.meal_item, Some(food.id));
        assert_eq!(entry.food_name.as_deref(), Some("Chicken Breast"));
        assert_eq!(entry.display_name(), "Chicken Breast");
    }

    #[test]
    fn test_deleted_food_keeps_entry_snapshot() {
        let db = Database::open_in_memory().unwrap();
        let food = db.insert_food(OWNER, &chicken()).unwrap();
        let mut new_entry = manual("2024-01-01", MealSlot::Dinner, 248);
        new_entry.meal_item = Some(food.id);
        let entry = db.insert_entry(OWNER, &new_entry).unwrap();

        assert!(db.delete_food(OWNER, food.id).unwrap());
        let fetched = db.get_entry(OWNER, entry.id).unwrap();
        assert_eq!(fetched.calories, 248);
        assert_eq!(fetched.meal_item, Some(food.id));
        assert!(fetched.food_name.is_none());
        assert_eq!(fetched.display_name(), "unknown item");
    }

    #[test]
    fn test_update_and_delete_entry() {
        let db = Database::open_in_memory().unwrap();
        let entry = db
            .insert_entry(OWNER, &manual("2024-01-01", MealSlot::Snack, 120))
            .unwrap();

        let updated = db
            .update_entry(OWNER, entry.id, &manual("2024-01-02", MealSlot::Dinner, 300))
            .unwrap();
        assert_eq!(updated.meal, MealSlot::Dinner);
        assert_eq!(updated.date, date("2024-01-02"));
        assert_eq!(updated.calories, 300);
        assert_eq!(updated.uuid, entry.uuid);

        assert!(db.delete_entry(OWNER, entry.id).unwrap());
        assert!(!db.delete_entry(OWNER, entry.id).unwrap());
        assert!(db.find_entry(OWNER, entry.id).unwrap().is_none());
        assert!(
            db.update_entry(OWNER, entry.id, &manual("2024-01-02", MealSlot::Dinner, 1))
                .is_err()
        );
    }

    #[test]
    fn test_insert_entries_is_all_or_nothing() {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .execute_batch(
                "CREATE TRIGGER reject_huge BEFORE INSERT ON calorie_entries
                 WHEN NEW.quantity_g = 999
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let mut bad = manual("2024-01-01", MealSlot::Lunch, 200);
        bad.quantity_g = 999;
        let batch = [manual("2024-01-01", MealSlot::Lunch, 100), bad];
        assert!(db.insert_entries(OWNER, &batch).is_err());
        assert!(db.get_all_entries(OWNER).unwrap().is_empty());

        let ok = [
            manual("2024-01-01", MealSlot::Lunch, 100),
            manual("2024-01-01", MealSlot::Dinner, 200),
        ];
        let inserted = db.insert_entries(OWNER, &ok).unwrap();
        assert_eq!(inserted.len(), 2);
        assert_eq!(db.get_all_entries(OWNER).unwrap().len(), 2);
    }

    #[test]
    fn test_entries_for_date_and_meal() {
        let db = Database::open_in_memory().unwrap();
        db.insert_entry(OWNER, &manual("2024-01-01", MealSlot::Breakfast, 300))
            .unwrap();
        db.insert_entry(OWNER, &manual("2024-01-01", MealSlot::Lunch, 500))
            .unwrap();
        db.insert_entry(OWNER, &manual("2024-01-02", MealSlot::Lunch, 450))
            .unwrap();
        db.insert_entry("other", &manual("2024-01-01", MealSlot::Lunch, 999))
            .unwrap();

        let day = db.get_entries_for_date(OWNER, date("2024-01-01")).unwrap();
        assert_eq!(day.len(), 2);

        let lunch = db
            .get_entries_for_date_and_meal(OWNER, date("2024-01-01"), MealSlot::Lunch)
            .unwrap();
        assert_eq!(lunch.len(), 1);
        assert_eq!(lunch[0].calories, 500);
    }

    #[test]
    fn test_entries_in_range_newest_first() {
        let db = Database::open_in_memory().unwrap();
        db.insert_entry(OWNER, &manual("2024-01-01", MealSlot::Lunch, 1))
            .unwrap();
        db.insert_entry(OWNER, &manual("2024-01-03", MealSlot::Lunch, 3))
            .unwrap();
        db.insert_entry(OWNER, &manual("2024-01-02", MealSlot::Lunch, 2))
            .unwrap();
        db.insert_entry(OWNER, &manual("2024-01-05", MealSlot::Lunch, 5))
            .unwrap();

        let entries = db
            .get_entries_in_range(OWNER, date("2024-01-01"), date("2024-01-03"))
            .unwrap();
        let calories: Vec<i64> = entries.iter().map(|e| e.calories).collect();
        assert_eq!(calories, vec![3, 2, 1]);
    }

    #[test]
    fn test_unknown_meal_in_storage_is_reported() {
        let db = Database::open_in_memory().unwrap();
        let entry = db
            .insert_entry(OWNER, &manual("2024-01-01", MealSlot::Lunch, 500))
            .unwrap();
        db.conn()
            .execute(
                "UPDATE calorie_entries SET meal = 'brunch' WHERE id = ?1",
                params![entry.id],
            )
            .unwrap();

        let err = db
            .get_entries_for_date(OWNER, date("2024-01-01"))
            .unwrap_err();
        match err.downcast_ref::<TrackerError>() {
            Some(TrackerError::AggregationInconsistency { entry_id, meal }) => {
                assert_eq!(*entry_id, entry.id);
                assert_eq!(meal, "brunch");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_nutrition_totals() {
        let db = Database::open_in_memory().unwrap();
        let empty = db.nutrition_totals(OWNER).unwrap();
        assert_eq!(empty, NutritionTotals::default());

        let mut with_protein = manual("2024-01-01", MealSlot::Lunch, 500);
        with_protein.values.protein = Some(20.0);
        db.insert_entry(OWNER, &with_protein).unwrap();
        db.insert_entry(OWNER, &manual("2024-01-02", MealSlot::Dinner, 700))
            .unwrap();
        db.insert_entry("other", &manual("2024-01-02", MealSlot::Dinner, 900))
            .unwrap();

        let totals = db.nutrition_totals(OWNER).unwrap();
        assert_eq!(totals.calories, 1200);
        assert!((totals.protein - 20.0).abs() < 1e-9);
        assert_eq!(totals.quantity_g, 200);
        assert_eq!(totals.entry_count, 2);
    }

    #[test]
    fn test_export_all() {
        let db = Database::open_in_memory().unwrap();
        db.insert_food(OWNER, &chicken()).unwrap();
        db.insert_entry(OWNER, &manual("2024-01-01", MealSlot::Lunch, 500))
            .unwrap();
        db.insert_food("other", &named("Secret")).unwrap();

        let export = db.export_all(OWNER).unwrap();
        assert_eq!(export.version, 1);
        assert_eq!(export.owner, OWNER);
        assert_eq!(export.food_items.len(), 1);
        assert_eq!(export.entries.len(), 1);

        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["entries"][0]["meal"], "lunch");
        assert_eq!(json["entries"][0]["date"], "2024-01-01");
    }

    #[test]
    fn test_reopen_keeps_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        {
            let db = Database::open(&path).unwrap();
            db.insert_food(OWNER, &chicken()).unwrap();
        }
        let db = Database::open(&path).unwrap();
        let version: i64 = db
            .conn()
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);
        assert_eq!(db.list_catalog(OWNER).unwrap().len(), 1);
    }
}
