mod commands;
mod config;
mod server;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    FoodEdit, FoodSource, cmd_copy, cmd_delete, cmd_export, cmd_food_add, cmd_food_delete,
    cmd_food_edit, cmd_food_list, cmd_food_search, cmd_history, cmd_log, cmd_summary, cmd_totals,
    cmd_update, date_field,
};
use crate::config::Config;
use nutrilog_core::models::{EntryDraft, EntryMode, EntryPatch, FoodDraft};
use nutrilog_core::service::{MAX_HISTORY_DAYS, TrackerService};

#[derive(Parser)]
#[command(
    name = "nutrilog",
    version,
    about = "A personal calorie and macro tracker",
    long_about = "Log what you eat per meal, keep a catalog of foods with per-100g \
                  values, and see daily totals."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Macro values in grams. Leave out what you don't know.
#[derive(Args)]
struct MacroArgs {
    #[arg(long)]
    protein: Option<String>,
    #[arg(long)]
    carbs: Option<String>,
    #[arg(long)]
    fat: Option<String>,
    #[arg(long)]
    fiber: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the food catalog
    Food {
        #[command(subcommand)]
        command: FoodCommands,
    },
    /// Log what you ate
    Log {
        /// Quantity in grams
        quantity: String,
        /// Meal: breakfast, lunch, dinner, snack
        #[arg(short, long, default_value = "snack")]
        meal: String,
        /// Date to log for (YYYY-MM-DD, today, yesterday; default: today)
        #[arg(long)]
        date: Option<String>,
        /// Use a catalog item by ID
        #[arg(long, conflicts_with = "food")]
        food_id: Option<i64>,
        /// Search the catalog by name and pick an item
        #[arg(long)]
        food: Option<String>,
        /// Calories for a manual entry
        #[arg(short, long, conflicts_with_all = ["food_id", "food"])]
        calories: Option<String>,
        #[command(flatten)]
        macros: MacroArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update a logged entry
    Update {
        /// Entry ID
        entry_id: i64,
        /// New quantity in grams
        #[arg(short, long)]
        quantity: Option<String>,
        /// New meal: breakfast, lunch, dinner, snack
        #[arg(long)]
        meal: Option<String>,
        /// New date (YYYY-MM-DD, today, yesterday)
        #[arg(long)]
        date: Option<String>,
        /// New calories (manual entries)
        #[arg(short, long)]
        calories: Option<String>,
        #[command(flatten)]
        macros: MacroArgs,
        /// Link the entry to another catalog item
        #[arg(long, conflicts_with = "manual")]
        food_id: Option<i64>,
        /// Unlink from the catalog and keep the values as a manual entry
        #[arg(long)]
        manual: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a logged entry
    Delete {
        /// Entry ID
        entry_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Copy a meal's entries to another date or meal
    Copy {
        /// Source as date:meal (e.g. "yesterday:lunch")
        from: String,
        /// Destination as date:meal (e.g. "today:lunch")
        to: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a day's entries grouped by meal
    Summary {
        /// Date (YYYY-MM-DD, today, yesterday; default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show daily totals for recent days
    History {
        /// Number of days to show
        #[arg(
            short,
            long,
            default_value = "7",
            value_parser = clap::value_parser!(u32).range(1..=MAX_HISTORY_DAYS)
        )]
        days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show lifetime totals
    Totals {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export the catalog and log as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum FoodCommands {
    /// Add a food to the catalog (values per 100g)
    Add {
        /// Food name
        name: String,
        /// Calories per 100g
        #[arg(short, long)]
        calories: String,
        #[command(flatten)]
        macros: MacroArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the whole catalog
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search the catalog by name
    Search {
        /// Case-insensitive name fragment
        term: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit a catalog item. Already logged entries keep their values.
    Edit {
        /// Food ID
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long)]
        calories: Option<String>,
        #[command(flatten)]
        macros: MacroArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a catalog item. Already logged entries keep their values.
    Delete {
        /// Food ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(serving: bool) {
    let default = if serving {
        "info,nutrilog=debug,nutrilog_core=debug,tower_http=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(matches!(cli.command, Commands::Serve { .. }));

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let svc = TrackerService::new(&config.db_path, config.owner.clone())?;

    match cli.command {
        Commands::Food { command } => match command {
            FoodCommands::Add {
                name,
                calories,
                macros,
                json,
            } => {
                let draft = FoodDraft {
                    name,
                    calories,
                    protein: macros.protein.unwrap_or_default(),
                    carbs: macros.carbs.unwrap_or_default(),
                    fat: macros.fat.unwrap_or_default(),
                    fiber: macros.fiber.unwrap_or_default(),
                };
                cmd_food_add(&svc, &draft, json)
            }
            FoodCommands::List { json } => cmd_food_list(&svc, json),
            FoodCommands::Search { term, json } => cmd_food_search(&svc, &term, json),
            FoodCommands::Edit {
                id,
                name,
                calories,
                macros,
                json,
            } => {
                let edit = FoodEdit {
                    name,
                    calories,
                    protein: macros.protein,
                    carbs: macros.carbs,
                    fat: macros.fat,
                    fiber: macros.fiber,
                };
                cmd_food_edit(&svc, id, edit, json)
            }
            FoodCommands::Delete { id, json } => cmd_food_delete(&svc, id, json),
        },
        Commands::Log {
            quantity,
            meal,
            date,
            food_id,
            food,
            calories,
            macros,
            json,
        } => {
            let source = match (food_id, food) {
                (Some(id), _) => FoodSource::Id(id),
                (None, Some(term)) => FoodSource::Search(term),
                (None, None) => FoodSource::Manual,
            };
            let draft = EntryDraft {
                mode: EntryMode::Manual,
                meal,
                date: date_field(date),
                quantity,
                calories: calories.unwrap_or_default(),
                protein: macros.protein.unwrap_or_default(),
                carbs: macros.carbs.unwrap_or_default(),
                fat: macros.fat.unwrap_or_default(),
                fiber: macros.fiber.unwrap_or_default(),
                meal_item: None,
            };
            cmd_log(&svc, draft, source, json)
        }
        Commands::Update {
            entry_id,
            quantity,
            meal,
            date,
            calories,
            macros,
            food_id,
            manual,
            json,
        } => {
            let patch = EntryPatch {
                mode: manual.then_some(EntryMode::Manual),
                meal,
                date: date.map(|d| date_field(Some(d))),
                quantity,
                calories,
                protein: macros.protein,
                carbs: macros.carbs,
                fat: macros.fat,
                fiber: macros.fiber,
                meal_item: food_id,
            };
            cmd_update(&svc, entry_id, &patch, json)
        }
        Commands::Delete { entry_id, json } => cmd_delete(&svc, entry_id, json),
        Commands::Copy { from, to, json } => cmd_copy(&svc, &from, &to, json),
        Commands::Summary { date, json } => cmd_summary(&svc, date, json),
        Commands::History { days, json } => cmd_history(&svc, days, json),
        Commands::Totals { json } => cmd_totals(&svc, json),
        Commands::Export { output } => cmd_export(&svc, output.as_deref()),
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                Some(config.load_or_create_api_key()?)
            };
            server::start_server(svc, port, &bind, api_key, config.base_url.as_deref()).await
        }
    }
}
