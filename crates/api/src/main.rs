use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use futures::{stream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use carteira_core::backend::{
    BackendError, HttpBackend, IndicesClient, InventoryClient, ValuationClient,
};
use carteira_core::domain::asset::{normalize_ticker, AssetClass};
use carteira_core::domain::indices::ReferenceIndex;
use carteira_core::radar::table::{detail_view, DetailView};
use carteira_core::radar::{
    start_scan, RadarProfile, RadarSession, ScanEvent, ScanHandle, ScanMode, ScanOptions,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = carteira_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let backend = HttpBackend::from_settings(&settings)?;
    tracing::info!(backend = backend.base_url(), "using portfolio backend");

    let state = AppState {
        backend: Arc::new(backend),
        scan_opts: ScanOptions::from_env(),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/categorias", get(list_categories))
        .route("/categorias/:category/ativos", get(list_tickers))
        .route("/indices", get(get_indices))
        .route("/radar/:class", get(radar_stream))
        .route("/radar/:class/:ticker", get(radar_detail))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    backend: Arc<HttpBackend>,
    scan_opts: ScanOptions,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, detail: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            detail: detail.into(),
        }),
    )
}

/// Unknown category → 404, backend trouble → 502. Message is passed through as the backend sent it.
fn backend_error(err: anyhow::Error) -> ApiError {
    let status = match err.downcast_ref::<BackendError>() {
        Some(e) if e.is_not_found() => StatusCode::NOT_FOUND,
        Some(e) if e.status() == Some(404) => StatusCode::NOT_FOUND,
        Some(_) => StatusCode::BAD_GATEWAY,
        None => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status != StatusCode::NOT_FOUND {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %err, "backend call failed");
    }
    api_error(status, err.to_string())
}

fn parse_class(raw: &str) -> Result<AssetClass, ApiError> {
    raw.parse::<AssetClass>()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))
}

#[derive(Debug, Serialize)]
struct CategoriesBody {
    categorias: Vec<String>,
}

async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<CategoriesBody>, ApiError> {
    let categorias = state
        .backend
        .list_categories()
        .await
        .map_err(backend_error)?;
    Ok(Json(CategoriesBody { categorias }))
}

#[derive(Debug, Serialize)]
struct TickersBody {
    categoria: String,
    tickers: Vec<String>,
}

async fn list_tickers(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<TickersBody>, ApiError> {
    let tickers = state
        .backend
        .list_tickers(&category)
        .await
        .map_err(backend_error)?;
    Ok(Json(TickersBody {
        categoria: category,
        tickers,
    }))
}

#[derive(Debug, Default, Deserialize)]
struct IndicesQuery {
    #[serde(default)]
    force: bool,
}

async fn get_indices(
    State(state): State<AppState>,
    Query(q): Query<IndicesQuery>,
) -> Result<Json<ReferenceIndex>, ApiError> {
    let indices = state
        .backend
        .fetch_reference_indices(q.force)
        .await
        .map_err(backend_error)?;
    Ok(Json(indices))
}

async fn radar_detail(
    State(state): State<AppState>,
    Path((class, ticker)): Path<(String, String)>,
) -> Result<Json<DetailView>, ApiError> {
    let class = parse_class(&class)?;
    let ticker = normalize_ticker(&ticker);
    if ticker.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Digite um ticker válido."));
    }

    let record = state
        .backend
        .fetch_valuation(class, &ticker)
        .await
        .map_err(backend_error)?;
    let indices = load_indices(&state.backend).await;

    let profile = RadarProfile::for_class(class);
    Ok(Json(detail_view(&profile, &record, indices.as_ref())))
}

#[derive(Debug, Default, Deserialize)]
struct StreamQuery {
    #[serde(default)]
    buy_only: bool,
    category: Option<String>,
}

/// Streams one radar scan as Server-Sent Events.
///
/// Every scanner event goes out twice: raw as `scan`, then folded into the session as a `table`
/// snapshot. Closing the connection drops the scan handle, which cancels the scan.
async fn radar_stream(
    State(state): State<AppState>,
    Path(class): Path<String>,
    Query(q): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let class = parse_class(&class)?;
    let mode = if q.buy_only {
        ScanMode::BuyOnly
    } else {
        ScanMode::Full
    };
    let profile = RadarProfile::for_class(class).with_mode(mode);
    let categories = q
        .category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .map(|c| vec![c]);

    let mut session = RadarSession::new(profile.clone());
    if let Some(indices) = load_indices(&state.backend).await {
        session.set_indices(indices);
    }

    let handle = start_scan(
        state.backend.clone(),
        &profile,
        categories,
        state.scan_opts.clone(),
    );
    session.begin(handle.session_id());
    tracing::info!(session_id = %handle.session_id(), %class, ?mode, "radar stream opened");

    let first = table_event(&session);
    let updates = stream::unfold((handle, session), next_events).flat_map(stream::iter);
    let events = stream::once(async move { first })
        .chain(updates)
        .map(Ok::<_, Infallible>);

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

async fn next_events(
    (mut handle, mut session): (ScanHandle, RadarSession),
) -> Option<(Vec<Event>, (ScanHandle, RadarSession))> {
    let Some(event) = handle.next_event().await else {
        tracing::debug!(session_id = %handle.session_id(), "radar stream drained");
        session.tear_down();
        return None;
    };

    let raw = json_event("scan", &event);
    let done = matches!(
        event,
        ScanEvent::Completed { .. } | ScanEvent::Failed { .. }
    );
    let changed = session.apply(event);

    let mut out = vec![raw];
    if changed || done {
        out.push(table_event(&session));
    }
    Some((out, (handle, session)))
}

fn table_event(session: &RadarSession) -> Event {
    json_event("table", &session.render())
}

fn json_event<T: Serialize>(name: &str, value: &T) -> Event {
    match Event::default().event(name).json_data(value) {
        Ok(ev) => ev,
        Err(err) => {
            tracing::warn!(error = %err, event = name, "failed to encode sse payload");
            Event::default().event("error").data(err.to_string())
        }
    }
}

/// Indices are a nice-to-have for the radar; on failure the table still renders.
async fn load_indices(backend: &HttpBackend) -> Option<ReferenceIndex> {
    match backend.fetch_reference_indices(false).await {
        Ok(indices) => Some(indices),
        Err(err) => {
            tracing::warn!(error = %err, "reference indices unavailable");
            None
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &carteira_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
