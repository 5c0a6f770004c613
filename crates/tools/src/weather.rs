//! The `getWeather` tool: its declaration and the record its server returns.

use serde::{Deserialize, Serialize};
use toolrelay_core::tool::{ParamSpec, ParamType, ToolSpec};

/// Name the model uses to request the weather tool.
pub const WEATHER_TOOL: &str = "getWeather";

/// Conditions the weather server reports.
pub const CONDITIONS: [&str; 4] = ["Sunny", "Cloudy", "Rainy", "Windy"];

pub fn weather_tool_spec() -> ToolSpec {
    ToolSpec::new(
        WEATHER_TOOL,
        "Get the current weather for a specific location.",
    )
    .with_param(
        "location",
        ParamSpec::required(
            ParamType::String,
            "Any city in the United States, i.e. New_York_City",
        ),
    )
}

/// Current weather at a location, as served by `GET /getWeather`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub location: String,
    pub temperature_celsius: i32,
    pub condition: String,
    pub wind_speed_kph: i32,
}
