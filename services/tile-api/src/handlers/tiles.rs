//! XYZ tile endpoint: `GET /tiles/{day}/{z}/{x}/{y}[.png]`.

use axum::{
    body::Body,
    extract::{Extension, Path},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

use crate::metrics::Timer;
use crate::orchestrator::TileResponse;
use crate::state::AppState;
use hazard_common::{HazardError, HazardResult};

/// GET /tiles/:day/:z/:x/:y
#[instrument(skip(state))]
pub async fn tile_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((day, z, x, y)): Path<(String, String, String, String)>,
) -> Response {
    let timer = Timer::start();

    let (day, z, x, y) = match parse_tile_path(&day, &z, &x, &y) {
        Ok(coords) => coords,
        Err(e) => return bad_request(&state, e),
    };

    match state.tiles.get_tile(day, z, x, y).await {
        Ok(tile) => {
            debug!(
                cache = tile.status.as_str(),
                bytes = tile.png.len(),
                elapsed_ms = timer.elapsed_ms(),
                "Tile served"
            );
            png_response(&tile)
        }
        Err(e) if e.is_client_error() => bad_request(&state, e),
        Err(e) => {
            // The orchestrator only reports invalid input; anything else
            // still gets a blank tile rather than a server error.
            warn!(error = %e, "Unexpected tile error, serving transparent tile");
            png_response(&state.tiles.fallback_tile(day, z, "unexpected"))
        }
    }
}

fn bad_request(state: &AppState, err: HazardError) -> Response {
    state.metrics.record_invalid_request();
    (StatusCode::BAD_REQUEST, err.to_string()).into_response()
}

/// Parse the path segments, accepting an optional `.png` on `y`.
fn parse_tile_path(day: &str, z: &str, x: &str, y: &str) -> HazardResult<(u8, u32, u32, u32)> {
    let y = y.strip_suffix(".png").unwrap_or(y);
    Ok((
        parse_segment("day", day)?,
        parse_segment("z", z)?,
        parse_segment("x", x)?,
        parse_segment("y", y)?,
    ))
}

fn parse_segment<T: FromStr>(param: &str, raw: &str) -> HazardResult<T> {
    raw.parse()
        .map_err(|_| HazardError::invalid(param, format!("'{}' is not a valid {}", raw, param)))
}

fn png_response(tile: &TileResponse) -> Response {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/png")
        .header(
            header::CACHE_CONTROL,
            format!("public, max-age={}", tile.max_age.as_secs()),
        )
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header("X-Hazard-Day", tile.day.to_string())
        .header("X-Blur-Sigma", format!("{:.2}", tile.sigma_px))
        .header("X-Cache", tile.status.as_str());

    if let Some(issued) = tile.issued_at {
        builder = builder.header("X-Hazard-Issued", issued.to_rfc3339());
    }

    builder
        .body(Body::from(tile.png.clone()))
        .unwrap_or_else(|e| {
            error!(error = %e, "Failed to build tile response");
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "image/png")],
                tile.png.clone(),
            )
                .into_response()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_segment() {
        assert_eq!(parse_segment::<u32>("x", "17").unwrap(), 17);
        assert!(parse_segment::<u32>("x", "-1").is_err());
        assert!(parse_segment::<u8>("day", "300").is_err());

        let err = parse_segment::<u32>("z", "abc").unwrap_err();
        assert!(err.is_client_error());
        assert!(err.to_string().contains("'abc'"));
    }

    #[test]
    fn test_parse_tile_path_suffix() {
        assert_eq!(parse_tile_path("1", "4", "4", "5.png").unwrap(), (1, 4, 4, 5));
        assert_eq!(parse_tile_path("2", "0", "0", "0").unwrap(), (2, 0, 0, 0));
        assert!(parse_tile_path("1", "4", "4", "5.jpg").is_err());
    }
}
