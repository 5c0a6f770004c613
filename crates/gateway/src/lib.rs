//! HTTP server for the built-in weather tool.
//!
//! Serves `GET /getWeather?location=<city>` with a randomized
//! [`WeatherReport`], plus `GET /health`. This is the endpoint
//! `HttpToolClient` calls when the model asks for the weather.

use axum::{
    Router,
    extract::Query,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use toolrelay_config::ToolServerConfig;
use toolrelay_tools::weather::{CONDITIONS, WEATHER_TOOL, WeatherReport};

const MISSING_LOCATION: &str = "Missing 'location' query parameter";

/// Build the router with every tool route.
pub fn build_router() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(&format!("/{WEATHER_TOOL}"), get(weather_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Bind `host:port` from the config and serve until the process stops.
pub async fn start(config: &ToolServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Tool server listening");
    serve(listener).await?;
    Ok(())
}

/// Serve on an already-bound listener.
pub async fn serve(listener: TcpListener) -> std::io::Result<()> {
    axum::serve(listener, build_router()).await
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Deserialize)]
struct WeatherQuery {
    location: Option<String>,
}

async fn weather_handler(Query(query): Query<WeatherQuery>) -> Response {
    let Some(location) = query.location.filter(|l| !l.trim().is_empty()) else {
        warn!("Weather request without a location");
        return (StatusCode::BAD_REQUEST, MISSING_LOCATION).into_response();
    };

    let report = random_report(location, &mut rand::rng());
    debug!(
        location = %report.location,
        temperature = report.temperature_celsius,
        condition = %report.condition,
        "Serving weather"
    );
    Json(report).into_response()
}

fn random_report(location: String, rng: &mut impl Rng) -> WeatherReport {
    WeatherReport {
        location,
        temperature_celsius: rng.random_range(5..30),
        condition: CONDITIONS[rng.random_range(0..CONDITIONS.len())].to_string(),
        wind_speed_kph: rng.random_range(0..30),
    }
}
