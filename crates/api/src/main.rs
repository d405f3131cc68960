use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use cbr_rates_core::domain::rates::{RateHistory, RateRecord};
use cbr_rates_core::ingest::error::FeedError;
use cbr_rates_core::service::{RatesService, UnknownCurrency};
use cbr_rates_core::session::SessionStore;
use cbr_rates_core::time::calendar::{DEFAULT_HISTORY_DAYS, MAX_HISTORY_DAYS, MIN_HISTORY_DAYS};
use cbr_rates_core::view::catalog::{self, SortKey, SortOrder};
use cbr_rates_core::view::chart::{self, ChartSegment};
use cbr_rates_core::view::convert::{self, Conversion, Direction};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = cbr_rates_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let rates = RatesService::from_settings(&settings)?;
    let state = AppState {
        rates: Arc::new(rates),
        sessions: Arc::new(SessionStore::new(
            settings.session_idle_ttl(),
            settings.max_sessions,
        )),
    };

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, source = state.rates.source_name(), "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/currencies", get(list_currencies))
        .route("/currencies/:char_code", get(get_currency))
        .route("/currencies/:char_code/history", get(get_history))
        .route("/convert", get(get_conversion))
        .route("/sessions", post(create_session))
        .route("/sessions/:session_id", delete(delete_session))
        .route(
            "/sessions/:session_id/selection",
            get(get_selection).put(put_selection).delete(clear_selection),
        )
        .route("/cache/refresh", post(refresh_cache))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    rates: Arc<RatesService>,
    sessions: Arc<SessionStore<Uuid>>,
}

fn error_status(err: &anyhow::Error) -> StatusCode {
    if err.downcast_ref::<UnknownCurrency>().is_some() {
        return StatusCode::NOT_FOUND;
    }
    match err.downcast_ref::<FeedError>() {
        Some(feed) if feed.is_upstream_unavailable() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn internal(err: anyhow::Error) -> StatusCode {
    let status = error_status(&err);
    if status != StatusCode::NOT_FOUND {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %format!("{err:#}"), %status, "request failed");
    }
    status
}

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    q: Option<String>,
    sort: Option<String>,
    order: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiCurrency {
    #[serde(flatten)]
    record: RateRecord,
    label: String,
    rate_label: String,
}

impl From<&RateRecord> for ApiCurrency {
    fn from(record: &RateRecord) -> Self {
        Self {
            label: catalog::list_label(record),
            rate_label: catalog::rate_label(record),
            record: record.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiCurrencyList {
    as_of_date: NaiveDate,
    sort: SortKey,
    order: SortOrder,
    currencies: Vec<ApiCurrency>,
}

async fn list_currencies(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ApiCurrencyList>, StatusCode> {
    let sort = match params.sort.as_deref() {
        Some(s) => SortKey::parse(s).map_err(|_| StatusCode::BAD_REQUEST)?,
        None => SortKey::default(),
    };
    let order = match params.order.as_deref() {
        Some(s) => SortOrder::parse(s).map_err(|_| StatusCode::BAD_REQUEST)?,
        None => SortOrder::default(),
    };

    let snapshot = state.rates.snapshot().await.map_err(internal)?;
    let query = params.q.unwrap_or_default();
    let currencies = catalog::search_sorted(&snapshot.records, &query, sort, order)
        .into_iter()
        .map(ApiCurrency::from)
        .collect();

    Ok(Json(ApiCurrencyList {
        as_of_date: snapshot.as_of_date,
        sort,
        order,
        currencies,
    }))
}

async fn get_currency(
    State(state): State<AppState>,
    Path(char_code): Path<String>,
) -> Result<Json<ApiCurrency>, StatusCode> {
    let record = state.rates.resolve(&char_code).await.map_err(internal)?;
    Ok(Json(ApiCurrency::from(&record)))
}

#[derive(Debug, Default, Deserialize)]
struct HistoryParams {
    days: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ApiSegment {
    #[serde(flatten)]
    segment: ChartSegment,
    color: &'static str,
}

#[derive(Debug, Serialize)]
struct ApiHistory {
    char_code: String,
    days: u32,
    history: Option<RateHistory>,
    segments: Vec<ApiSegment>,
}

async fn get_history(
    State(state): State<AppState>,
    Path(char_code): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<ApiHistory>, StatusCode> {
    let days = params.days.unwrap_or(DEFAULT_HISTORY_DAYS);
    if !(MIN_HISTORY_DAYS..=MAX_HISTORY_DAYS).contains(&days) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let record = state.rates.resolve(&char_code).await.map_err(internal)?;
    let history = state
        .rates
        .history_for(&record, days)
        .await
        .map_err(internal)?;
    let segments = history
        .as_ref()
        .map(chart::segments)
        .unwrap_or_default()
        .into_iter()
        .map(|segment| ApiSegment {
            color: segment.trend.color_name(),
            segment,
        })
        .collect();

    Ok(Json(ApiHistory {
        char_code: record.char_code,
        days,
        history,
        segments,
    }))
}

#[derive(Debug, Deserialize)]
struct ConvertParams {
    char_code: String,
    amount: f64,
    direction: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiConversion {
    #[serde(flatten)]
    conversion: Conversion,
    label: String,
    summary: String,
}

async fn get_conversion(
    State(state): State<AppState>,
    Query(params): Query<ConvertParams>,
) -> Result<Json<ApiConversion>, StatusCode> {
    let direction = match params.direction.as_deref() {
        Some(s) => Direction::parse(s).map_err(|_| StatusCode::BAD_REQUEST)?,
        None => Direction::default(),
    };

    let record = state
        .rates
        .resolve(&params.char_code)
        .await
        .map_err(internal)?;
    let conversion = convert::convert(&record, params.amount, direction)
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    Ok(Json(ApiConversion {
        label: direction.label(&conversion.char_code),
        summary: conversion.summary(),
        conversion,
    }))
}

#[derive(Debug, Serialize)]
struct ApiSession {
    session_id: Uuid,
}

async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<ApiSession>) {
    let session_id = Uuid::new_v4();
    state.sessions.create(session_id, Utc::now()).await;
    let sessions = state.sessions.len().await;
    tracing::debug!(%session_id, sessions, "session created");
    (StatusCode::CREATED, Json(ApiSession { session_id }))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> StatusCode {
    if state.sessions.remove(&session_id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

#[derive(Debug, Serialize)]
struct ApiSelection {
    session_id: Uuid,
    /// Explicit choice; `None` means `currency` is the default.
    selected: Option<String>,
    currency: Option<ApiCurrency>,
}

async fn get_selection(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ApiSelection>, StatusCode> {
    let snapshot = state.rates.snapshot().await.map_err(internal)?;
    let (selected, currency) = state
        .sessions
        .with_session(&session_id, Utc::now(), |ctx| {
            (
                ctx.selected_char_code().map(str::to_string),
                ctx.current(&snapshot).map(ApiCurrency::from),
            )
        })
        .await
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(ApiSelection {
        session_id,
        selected,
        currency,
    }))
}

#[derive(Debug, Deserialize)]
struct SelectionBody {
    char_code: String,
}

async fn put_selection(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(body): Json<SelectionBody>,
) -> Result<Json<ApiSelection>, StatusCode> {
    let snapshot = state.rates.snapshot().await.map_err(internal)?;
    let record = state
        .sessions
        .with_session(&session_id, Utc::now(), |ctx| {
            ctx.select(&snapshot, &body.char_code).map(ApiCurrency::from)
        })
        .await
        .ok_or(StatusCode::NOT_FOUND)?
        .map_err(internal)?;

    Ok(Json(ApiSelection {
        session_id,
        selected: Some(record.record.char_code.clone()),
        currency: Some(record),
    }))
}

async fn clear_selection(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ApiSelection>, StatusCode> {
    let snapshot = state.rates.snapshot().await.map_err(internal)?;
    let currency = state
        .sessions
        .with_session(&session_id, Utc::now(), |ctx| {
            ctx.clear();
            ctx.current(&snapshot).map(ApiCurrency::from)
        })
        .await
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(ApiSelection {
        session_id,
        selected: None,
        currency,
    }))
}

async fn refresh_cache(State(state): State<AppState>) -> StatusCode {
    state.rates.refresh().await;
    StatusCode::NO_CONTENT
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &cbr_rates_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
