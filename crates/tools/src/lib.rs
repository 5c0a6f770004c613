//! Tool declarations and the HTTP tool client for toolrelay.
//!
//! Tools are described as data ([`ToolSpec`]) and executed remotely: the
//! model picks a tool, and [`HttpToolClient`] calls the endpoint that serves
//! it. The only built-in tool is the weather lookup.

pub mod client;
pub mod weather;

pub use client::HttpToolClient;
pub use weather::{WEATHER_TOOL, WeatherReport, weather_tool_spec};

use toolrelay_core::tool::ToolRegistry;

/// Create a registry holding every built-in tool.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    // A fresh registry cannot already contain the name.
    let _ = registry.register(weather_tool_spec());
    registry
}
