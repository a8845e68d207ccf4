//! REST endpoint handlers for the stocks API.
//!
//! | Method | Path                 | Description                          |
//! |--------|----------------------|--------------------------------------|
//! | `GET`  | `/api/stocks`        | All memes in collection order        |
//! | `GET`  | `/api/stocks/{name}` | A single meme                        |
//! | `GET`  | `/api/status`        | Tick counter and regime counts       |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use memestock_core::Trend;

use crate::error::ObserverError;
use crate::state::AppState;

/// Query parameters for `GET /api/stocks`.
#[derive(Debug, serde::Deserialize)]
pub struct StocksQuery {
    /// Only return memes in this regime: `random`, `up`, or `down`.
    pub trend: Option<String>,
}

fn parse_trend(raw: &str) -> Result<Trend, ObserverError> {
    match raw.to_ascii_lowercase().as_str() {
        "random" => Ok(Trend::Random),
        "up" => Ok(Trend::Up),
        "down" => Ok(Trend::Down),
        _ => Err(ObserverError::UnknownTrend {
            value: raw.to_owned(),
        }),
    }
}

/// List memes, optionally filtered by trend.
pub async fn list_stocks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StocksQuery>,
) -> Result<impl IntoResponse, ObserverError> {
    let filter = query.trend.as_deref().map(parse_trend).transpose()?;

    let mut memes = state.store.current_snapshot().await;
    if let Some(trend) = filter {
        memes.retain(|m| m.trend == trend);
    }

    Ok(Json(memes))
}

/// Return one meme by `name` or `id`.
pub async fn get_stock(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let meme = state.store.meme(&name).await;
    meme.map(Json).ok_or(ObserverError::UnknownMeme { name })
}

/// Tick counter, last tick time, and how many memes sit in each regime.
pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.store.status().await)
}
