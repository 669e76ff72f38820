use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nutrilog_core::error::TrackerError;
use nutrilog_core::models::{CalorieLogEntry, FoodItem, MealSlot};

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// Resolve the keyword forms of a date to `YYYY-MM-DD`, leaving anything else
/// for the entry validator to judge.
pub(crate) fn date_field(date_str: Option<String>) -> String {
    match date_str.as_deref() {
        None | Some("today" | "yesterday" | "tomorrow") => parse_date(date_str)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        Some(other) => other.to_string(),
    }
}

pub(crate) fn parse_meal_ref(s: &str) -> Result<(NaiveDate, MealSlot)> {
    let parts: Vec<&str> = s.splitn(2, ':').collect();
    if parts.len() != 2 {
        bail!("Invalid meal reference '{s}'. Use format 'date:meal' (e.g. 'today:lunch')");
    }
    let date = parse_date(Some(parts[0].to_string()))?;
    let meal = parts[1].parse::<MealSlot>()?;
    Ok((date, meal))
}

pub(crate) fn prompt_choice(count: usize) -> Result<usize> {
    eprint!("\nSelect a food (1-{count}): ");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let line = stdin.lock().lines().next().context("No input")??;
    let n: usize = line.trim().parse().context("Invalid number")?;
    if n < 1 || n > count {
        bail!("Selection out of range");
    }
    Ok(n - 1)
}

pub(crate) fn print_food_table(foods: &[FoodItem]) {
    #[derive(Tabled)]
    struct FoodRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Cal/100g")]
        calories: i64,
        #[tabled(rename = "P/100g")]
        protein: String,
        #[tabled(rename = "C/100g")]
        carbs: String,
        #[tabled(rename = "F/100g")]
        fat: String,
        #[tabled(rename = "Fib/100g")]
        fiber: String,
    }

    let rows: Vec<FoodRow> = foods
        .iter()
        .enumerate()
        .map(|(i, f)| FoodRow {
            idx: i + 1,
            id: f.id,
            name: truncate(&f.name, 35),
            calories: f.calories,
            protein: fmt_macro(f.protein),
            carbs: fmt_macro(f.carbs),
            fat: fmt_macro(f.fat),
            fiber: fmt_macro(f.fiber),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..8)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

/// One-line rendering of a log entry, shared by `log`, `update` and `summary`.
pub(crate) fn entry_line(e: &CalorieLogEntry) -> String {
    let id = e.id;
    let name = e.display_name();
    let qty = e.quantity_g;
    let cal = e.calories;
    let p = e.protein.unwrap_or(0.0);
    let c = e.carbs.unwrap_or(0.0);
    let f = e.fat.unwrap_or(0.0);
    format!("[{id}] {name}: {qty}g, {cal} kcal | P:{p:.1}g C:{c:.1}g F:{f:.1}g")
}

pub(crate) fn fmt_macro(v: Option<f64>) -> String {
    v.map_or("-".into(), |v| format!("{v:.1}"))
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

/// Report a missing record or an empty result and exit with code 2.
pub(crate) fn exit_not_found(message: &str, json: bool) -> ! {
    if json {
        println!("{}", json_error(message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}

pub(crate) fn is_not_found(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<TrackerError>(),
        Some(TrackerError::NotFound { .. })
    )
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
