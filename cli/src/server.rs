use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use nutrilog_core::error::{FieldErrors, TrackerError};
use nutrilog_core::models::{
    CalorieLogEntry, DailySummary, EntryDraft, EntryMode, EntryPatch, ExportData, FoodDraft,
    FoodItem, NutritionTotals, NutritionValues,
};
use nutrilog_core::nutrition::{MacroSplit, preview_quantity};
use nutrilog_core::service::TrackerService;

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

#[derive(Clone)]
struct AppState {
    svc: Arc<Mutex<TrackerService>>,
    api_key: Option<String>,
}

impl AppState {
    fn svc(&self) -> MutexGuard<'_, TrackerService> {
        self.svc.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// --- Request / Response types ---

/// A form field sent either as a JSON number or as text.
#[derive(Deserialize)]
#[serde(untagged)]
enum FormValue {
    Number(serde_json::Number),
    Text(String),
}

impl FormValue {
    fn into_field(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}

fn field(value: Option<FormValue>) -> Option<String> {
    value.map(FormValue::into_field)
}

#[derive(Deserialize)]
struct FoodRequest {
    name: Option<String>,
    calories: Option<FormValue>,
    protein: Option<FormValue>,
    carbs: Option<FormValue>,
    fat: Option<FormValue>,
    fiber: Option<FormValue>,
}

impl FoodRequest {
    /// Overlay the fields present in the request on `draft`.
    fn apply_to(self, mut draft: FoodDraft) -> FoodDraft {
        let fields = [
            (self.name, &mut draft.name),
            (field(self.calories), &mut draft.calories),
            (field(self.protein), &mut draft.protein),
            (field(self.carbs), &mut draft.carbs),
            (field(self.fat), &mut draft.fat),
            (field(self.fiber), &mut draft.fiber),
        ];
        for (value, slot) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
        draft
    }
}

#[derive(Deserialize)]
struct EntryRequest {
    mode: Option<EntryMode>,
    meal: Option<String>,
    date: Option<String>,
    quantity: Option<FormValue>,
    calories: Option<FormValue>,
    protein: Option<FormValue>,
    carbs: Option<FormValue>,
    fat: Option<FormValue>,
    fiber: Option<FormValue>,
    meal_item: Option<i64>,
}

impl EntryRequest {
    fn into_patch(self) -> EntryPatch {
        EntryPatch {
            mode: self.mode,
            meal: self.meal,
            date: self.date,
            quantity: field(self.quantity),
            calories: field(self.calories),
            protein: field(self.protein),
            carbs: field(self.carbs),
            fat: field(self.fat),
            fiber: field(self.fiber),
            meal_item: self.meal_item,
        }
    }

    /// A new entry is linked to the catalog whenever an item is given, unless
    /// the client explicitly asks for manual mode.
    fn into_draft(self) -> EntryDraft {
        let mode = self.mode.unwrap_or(if self.meal_item.is_some() {
            EntryMode::Catalog
        } else {
            EntryMode::Manual
        });
        let patch = self.into_patch();
        EntryDraft {
            mode,
            meal: patch.meal.unwrap_or_default(),
            date: patch.date.unwrap_or_default(),
            quantity: patch.quantity.unwrap_or_default(),
            calories: patch.calories.unwrap_or_default(),
            protein: patch.protein.unwrap_or_default(),
            carbs: patch.carbs.unwrap_or_default(),
            fat: patch.fat.unwrap_or_default(),
            fiber: patch.fiber.unwrap_or_default(),
            meal_item: patch.meal_item,
        }
    }
}

#[derive(Deserialize)]
struct SearchQuery {
    q: Option<String>,
}

#[derive(Deserialize)]
struct ScaleQuery {
    grams: Option<String>,
}

#[derive(Serialize)]
struct ScaleResponse {
    food_id: i64,
    grams: i64,
    values: NutritionValues,
    macro_split: Option<MacroSplit>,
}

#[derive(Deserialize)]
struct RangeQuery {
    start: Option<String>,
    end: Option<String>,
}

#[derive(Serialize)]
struct SummaryResponse {
    #[serde(flatten)]
    summary: DailySummary,
    macro_split: Option<MacroSplit>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<FieldErrors>,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unprocessable(FieldErrors),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, fields) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            Self::Unprocessable(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Validation failed".to_string(),
                Some(errors),
            ),
            Self::Internal(err) => {
                error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
        };
        (
            status,
            Json(ErrorResponse {
                error: message,
                fields,
            }),
        )
            .into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<TrackerError>() {
            Ok(TrackerError::Validation(errors)) => Self::Unprocessable(errors),
            Ok(e @ TrackerError::NotFound { .. }) => Self::NotFound(e.to_string()),
            Ok(e @ TrackerError::AggregationInconsistency { .. }) => Self::Internal(e.into()),
            Err(err) => Self::Internal(err),
        }
    }
}

fn parse_date_param(s: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid date '{s}'. Use YYYY-MM-DD")))
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            warn!(path = %request.uri().path(), "rejected request without valid API key");
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                    fields: None,
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Food catalog handlers ---

async fn list_foods(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<Vec<FoodItem>>, ApiError> {
    let svc = state.svc();
    let foods = match params.q {
        Some(term) => svc.search_catalog(&term)?,
        None => svc.list_catalog()?,
    };
    Ok(Json(foods))
}

async fn create_food(
    State(state): State<AppState>,
    Json(req): Json<FoodRequest>,
) -> Result<(StatusCode, Json<FoodItem>), ApiError> {
    let draft = req.apply_to(FoodDraft::default());
    let food = state.svc().add_food(&draft)?;
    Ok((StatusCode::CREATED, Json(food)))
}

async fn get_food(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<FoodItem>, ApiError> {
    Ok(Json(state.svc().get_food(id)?))
}

async fn update_food(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<FoodRequest>,
) -> Result<Json<FoodItem>, ApiError> {
    let svc = state.svc();
    let current = svc.get_food(id)?;
    let draft = req.apply_to(FoodDraft::from(&current));
    Ok(Json(svc.edit_food(id, &draft)?))
}

async fn delete_food(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if state.svc().remove_food(id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(
            TrackerError::food_not_found(id).to_string(),
        ))
    }
}

async fn scale_food(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<ScaleQuery>,
) -> Result<Json<ScaleResponse>, ApiError> {
    let grams = preview_quantity(params.grams.as_deref().unwrap_or_default());
    let values = state.svc().preview_scaling(id, grams)?;
    Ok(Json(ScaleResponse {
        food_id: id,
        grams,
        macro_split: values.macro_split(),
        values,
    }))
}

// --- Calorie log handlers ---

async fn create_entry(
    State(state): State<AppState>,
    Json(req): Json<EntryRequest>,
) -> Result<(StatusCode, Json<CalorieLogEntry>), ApiError> {
    let draft = req.into_draft();
    let entry = state.svc().log_entry(&draft)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn list_entries(
    State(state): State<AppState>,
    Query(params): Query<RangeQuery>,
) -> Result<Json<Vec<CalorieLogEntry>>, ApiError> {
    let end = match params.end.as_deref() {
        Some(s) => parse_date_param(s)?,
        None => Local::now().date_naive(),
    };
    let start = match params.start.as_deref() {
        Some(s) => parse_date_param(s)?,
        None => end,
    };
    if start > end {
        return Err(ApiError::BadRequest(format!(
            "start ({start}) must not be after end ({end})"
        )));
    }
    Ok(Json(state.svc().entries_in_range(start, end)?))
}

async fn get_entry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<CalorieLogEntry>, ApiError> {
    Ok(Json(state.svc().get_entry(id)?))
}

async fn update_entry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<EntryRequest>,
) -> Result<Json<CalorieLogEntry>, ApiError> {
    let patch = req.into_patch();
    if patch.is_empty() {
        return Err(ApiError::BadRequest(
            "At least one field must be provided".to_string(),
        ));
    }
    Ok(Json(state.svc().update_entry(id, &patch)?))
}

async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if state.svc().delete_entry(id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Entry {id} not found")))
    }
}

// --- Summaries ---

async fn get_daily_summary(
    State(state): State<AppState>,
    Path(date_str): Path<String>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let date = parse_date_param(&date_str)?;
    let summary = state.svc().daily_summary(date)?;
    Ok(Json(SummaryResponse {
        macro_split: summary.totals.macro_split(),
        summary,
    }))
}

async fn get_totals(State(state): State<AppState>) -> Result<Json<NutritionTotals>, ApiError> {
    Ok(Json(state.svc().totals()?))
}

async fn export_data(State(state): State<AppState>) -> Result<Json<ExportData>, ApiError> {
    Ok(Json(state.svc().export()?))
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/foods", get(list_foods).post(create_food))
        .route(
            "/api/foods/{id}",
            get(get_food).put(update_food).delete(delete_food),
        )
        .route("/api/foods/{id}/scale", get(scale_food))
        .route("/api/entries", get(list_entries).post(create_entry))
        .route(
            "/api/entries/{id}",
            get(get_entry).put(update_entry).delete(delete_entry),
        )
        .route("/api/summary/{date}", get(get_daily_summary))
        .route("/api/totals", get(get_totals))
        .route("/api/export", get(export_data))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    svc: TrackerService,
    port: u16,
    bind: &str,
    api_key: Option<String>,
    base_url: Option<&str>,
) -> anyhow::Result<()> {
    let owner = svc.owner().to_string();
    let state = AppState {
        svc: Arc::new(Mutex::new(svc)),
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        eprintln!(
            "API key: {}...{} (see api_key file in data directory)",
            &key[..4.min(key.len())],
            &key[key.len().saturating_sub(4)..],
        );
    } else {
        warn!("authentication disabled (--no-auth), the API is open to anyone");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        warn!(
            %bind,
            "listening on a non-loopback address with no authentication"
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    let url = base_url.map_or_else(|| format!("http://{bind}:{port}"), str::to_string);
    info!(%owner, %url, "nutrilog server listening");
    eprintln!("Listening on {url}");
    axum::serve(listener, app).await?;

    Ok(())
}
