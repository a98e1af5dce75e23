use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use common::{with_deadline, AssetClass, Binding, Ticker, Timeframe};
use telegram_ctrl::render_report;

use crate::{ApiError, AppState};

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/api/strategies", get(list_strategies))
        .route("/api/tickers", get(list_tickers).post(register_ticker))
        .route("/api/bindings", post(register_binding))
        .route("/api/bindings/ticker/:ticker", get(bindings_for_ticker))
        .route("/api/bindings/timeframe/:timeframe", get(bindings_for_timeframe))
        .route(
            "/api/data/:ticker/:timeframe",
            get(preview_data).post(refresh_ticker_data),
        )
        .route("/api/data/:timeframe", post(refresh_timeframe_data))
        .route("/api/evaluate/:timeframe", post(evaluate_timeframe))
}

fn normalize_symbol(raw: &str) -> Result<String, ApiError> {
    let symbol = raw.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(ApiError::bad_request("symbol is required"));
    }
    Ok(symbol)
}

// ─── Strategies ───────────────────────────────────────────────────────────────

async fn list_strategies(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "strategies": state.strategies.names() }))
}

// ─── Tickers ──────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RegisterTickerReq {
    symbol: String,
    class: String,
}

async fn register_ticker(
    State(state): State<AppState>,
    body: Result<Json<RegisterTickerReq>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(req) = body?;
    let class: AssetClass = req.class.trim().to_lowercase().parse()?;
    let ticker = Ticker::new(normalize_symbol(&req.symbol)?, class);

    with_deadline("store write", state.timeouts.store_write, state.store.insert_ticker(&ticker))
        .await
        .map_err(|e| ApiError::with_context("error inserting data into database", e))?;

    info!(ticker = %ticker.symbol, class = %class, "Ticker registered");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("Ticker {} of class {class} created successfully", ticker.symbol)
        })),
    ))
}

async fn list_tickers(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let tickers = with_deadline("store read", state.timeouts.store_read, state.store.tickers())
        .await
        .map_err(|e| ApiError::with_context("error querying data from database", e))?;
    Ok(Json(json!({ "tickers": tickers })))
}

// ─── Bindings ─────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RegisterBindingReq {
    ticker_symbol: String,
    timeframe: String,
    strategy: String,
}

async fn register_binding(
    State(state): State<AppState>,
    body: Result<Json<RegisterBindingReq>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = body?;
    let symbol = normalize_symbol(&req.ticker_symbol)?;
    let timeframe: Timeframe = req.timeframe.parse()?;
    state.strategies.check_binding(&req.strategy, &symbol)?;

    let binding = Binding::new(symbol, timeframe, req.strategy);
    with_deadline("store write", state.timeouts.store_write, state.store.insert_binding(&binding))
        .await
        .map_err(|e| ApiError::with_context("insert binding", e))?;

    info!(
        ticker = %binding.ticker_symbol,
        timeframe = %binding.timeframe,
        strategy = %binding.strategy,
        "Binding registered"
    );
    Ok(Json(json!({
        "message": format!(
            "binding of {} {} {} inserted successfully",
            binding.ticker_symbol, binding.timeframe, binding.strategy
        )
    })))
}

async fn bindings_for_ticker(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let symbol = normalize_symbol(&ticker)?;
    let bindings = with_deadline(
        "store read",
        state.timeouts.store_read,
        state.store.bindings_for_ticker(&symbol),
    )
    .await
    .map_err(|e| ApiError::with_context("get bindings by ticker", e))?;
    Ok(Json(json!({ "bindings": bindings })))
}

async fn bindings_for_timeframe(
    State(state): State<AppState>,
    Path(timeframe): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let timeframe: Timeframe = timeframe.parse()?;
    let bindings = with_deadline(
        "store read",
        state.timeouts.store_read,
        state.store.bindings_for_timeframe(timeframe),
    )
    .await
    .map_err(|e| ApiError::with_context("get bindings by timeframe", e))?;
    Ok(Json(json!({ "bindings": bindings })))
}

// ─── Price data ───────────────────────────────────────────────────────────────

async fn preview_data(
    State(state): State<AppState>,
    Path((ticker, timeframe)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let timeframe: Timeframe = timeframe.parse()?;
    let symbol = normalize_symbol(&ticker)?;

    let points = state
        .refresher
        .preview(&symbol, timeframe)
        .await
        .map_err(|e| ApiError::with_context("fetch data", e))?;
    Ok(Json(json!({ "data": points })))
}

async fn refresh_ticker_data(
    State(state): State<AppState>,
    Path((ticker, timeframe)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let timeframe: Timeframe = timeframe.parse()?;
    let symbol = normalize_symbol(&ticker)?;

    let summary = state
        .refresher
        .refresh_one(&symbol, timeframe)
        .await
        .map_err(|e| ApiError::with_context("error refreshing data", e))?;
    Ok(Json(json!(summary)))
}

async fn refresh_timeframe_data(
    State(state): State<AppState>,
    Path(timeframe): Path<String>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let timeframe: Timeframe = timeframe.parse()?;
    let report = state
        .refresher
        .refresh_by_timeframe(timeframe)
        .await
        .map_err(|e| ApiError::with_context("refresh data by timeframe", e))?;

    let failures: Vec<Value> = report
        .failures
        .iter()
        .map(|f| json!({ "ticker": f.ticker, "error": f.error.to_string() }))
        .collect();

    match report.first_error() {
        None => Ok((
            StatusCode::OK,
            Json(json!({ "refreshed": report.refreshed, "failures": failures })),
        )),
        Some(first) => {
            warn!(timeframe = %timeframe, failed = failures.len(), "Timeframe refresh incomplete");
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "message": format!("refresh data by timeframe: {first}"),
                    "refreshed": report.refreshed,
                    "failures": failures,
                })),
            ))
        }
    }
}

// ─── Evaluation ───────────────────────────────────────────────────────────────

async fn evaluate_timeframe(
    State(state): State<AppState>,
    Path(timeframe): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let timeframe: Timeframe = timeframe.parse()?;

    let results = state.evaluator.evaluate(timeframe).await.map_err(|e| {
        ApiError::with_context(
            "error evaluating strategies for each ticker in the given timeframe",
            e,
        )
    })?;

    let report = render_report(timeframe, &results);
    if !report.is_empty() {
        state
            .notifier
            .send_html(state.chat_id, &report)
            .await
            .map_err(|e| ApiError::with_context("send updates to Telegram", e))?;
    }

    Ok(Json(json!({ "results": results })))
}
