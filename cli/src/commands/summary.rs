use anyhow::Result;
use chrono::Local;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nutrilog_core::models::NutritionTotals;
use nutrilog_core::service::TrackerService;

use super::helpers::{entry_line, no_neg_zero, parse_date};

fn macro_line(t: &NutritionTotals) -> String {
    let p = no_neg_zero(t.protein);
    let c = no_neg_zero(t.carbs);
    let f = no_neg_zero(t.fat);
    let fib = no_neg_zero(t.fiber);
    format!("P:{p:.1}g C:{c:.1}g F:{f:.1}g Fib:{fib:.1}g")
}

pub(crate) fn cmd_summary(svc: &TrackerService, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    let summary = svc.daily_summary(date)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if summary.totals.entry_count == 0 {
        eprintln!("No entries for {date}");
        process::exit(2);
    }

    let entries = svc.entries_for_date(date)?;
    println!("=== {date} ===\n");

    for (meal, bucket) in summary.meals.iter() {
        if bucket.entry_count == 0 {
            continue;
        }
        let label = meal.as_str().to_uppercase();
        let cal = bucket.calories;
        println!("  {label} ({cal} kcal)");
        for e in entries.iter().filter(|e| e.meal == meal) {
            println!("    {}", entry_line(e));
        }
        println!();
    }

    let totals = &summary.totals;
    let cal = totals.calories;
    println!("  TOTAL: {cal} kcal | {}", macro_line(totals));
    if let Some(split) = totals.macro_split() {
        let p = split.protein_pct;
        let c = split.carbs_pct;
        let f = split.fat_pct;
        println!("  SPLIT: P:{p:.0}% C:{c:.0}% F:{f:.0}%");
    }

    Ok(())
}

pub(crate) fn cmd_history(svc: &TrackerService, days: u32, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Calories")]
        calories: i64,
        #[tabled(rename = "Entries")]
        entries: i64,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "Fat")]
        fat: String,
        #[tabled(rename = "Fiber")]
        fiber: String,
    }

    let today = Local::now().date_naive();
    let summaries = svc.history(i64::from(days), today)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.iter().all(|s| s.totals.entry_count == 0) {
        eprintln!("No entries in the last {days} days");
        process::exit(2);
    }

    let rows: Vec<HistoryRow> = summaries
        .iter()
        .map(|s| {
            let t = &s.totals;
            HistoryRow {
                date: s.date.to_string(),
                calories: t.calories,
                entries: t.entry_count,
                protein: format!("{:.0}g", no_neg_zero(t.protein)),
                carbs: format!("{:.0}g", no_neg_zero(t.carbs)),
                fat: format!("{:.0}g", no_neg_zero(t.fat)),
                fiber: format!("{:.0}g", no_neg_zero(t.fiber)),
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

pub(crate) fn cmd_totals(svc: &TrackerService, json: bool) -> Result<()> {
    let totals = svc.totals()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&totals)?);
        return Ok(());
    }

    if totals.entry_count == 0 {
        eprintln!("No entries logged yet");
        process::exit(2);
    }

    let cal = totals.calories;
    let count = totals.entry_count;
    let grams = totals.quantity_g;
    println!("{count} entries, {grams}g logged");
    println!("  {cal} kcal | {}", macro_line(&totals));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macro_line() {
        let totals = NutritionTotals {
            protein: 46.5,
            carbs: -0.0,
            fat: 5.4,
            ..NutritionTotals::default()
        };
        assert_eq!(macro_line(&totals), "P:46.5g C:0.0g F:5.4g Fib:0.0g");
    }
}
