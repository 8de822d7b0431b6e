//! Snapshot inspection: `GET /api/hazards/{day}`.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{instrument, warn};

use crate::state::AppState;
use hazard_common::{HazardError, HazardSnapshot};

/// JSON summary of a day's snapshot.
#[derive(Debug, Serialize)]
pub struct HazardSummary {
    pub day: u8,
    pub empty: bool,
    pub polygons: usize,
    /// Polygon count per category label.
    pub categories: BTreeMap<&'static str, usize>,
    pub fetched_at: String,
    pub age_secs: i64,
    pub issued_at: Option<String>,
    pub valid_at: Option<String>,
}

impl From<&HazardSnapshot> for HazardSummary {
    fn from(snapshot: &HazardSnapshot) -> Self {
        Self {
            day: snapshot.day,
            empty: snapshot.is_empty(),
            polygons: snapshot.polygons.len(),
            categories: snapshot
                .category_counts()
                .into_iter()
                .map(|(category, count)| (category.label(), count))
                .collect(),
            fetched_at: snapshot.fetched_at.to_rfc3339(),
            age_secs: snapshot.age().num_seconds(),
            issued_at: snapshot.issued_at.map(|t| t.to_rfc3339()),
            valid_at: snapshot.valid_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// GET /api/hazards/:day
#[instrument(skip(state))]
pub async fn hazards_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(day): Path<String>,
) -> Response {
    let day: u8 = match day.parse() {
        Ok(day) => day,
        Err(_) => {
            let err = HazardError::invalid("day", format!("'{}' is not a valid day", day));
            return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
        }
    };

    match state.tiles.snapshot(day).await {
        Ok(snapshot) => Json(HazardSummary::from(snapshot.as_ref())).into_response(),
        Err(e) if e.is_client_error() => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        Err(e) => {
            warn!(day = day, error = %e, "Snapshot unavailable");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({
                    "error": e.kind(),
                    "message": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}
