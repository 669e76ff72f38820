mod entry;
mod export;
mod food;
mod helpers;
mod log;
mod summary;

pub(crate) use entry::{cmd_copy, cmd_delete, cmd_update};
pub(crate) use export::cmd_export;
pub(crate) use food::{
    FoodEdit, cmd_food_add, cmd_food_delete, cmd_food_edit, cmd_food_list, cmd_food_search,
};
pub(crate) use helpers::date_field;
pub(crate) use log::{FoodSource, cmd_log};
pub(crate) use summary::{cmd_history, cmd_summary, cmd_totals};
