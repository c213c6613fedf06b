pub use self::error::{ToolError, ToolResult};
pub use self::weather::{
    DailyForecast, Forecast, ForecastQuery, ForecastSource, OpenMeteoClient, get_weather_forecast,
};

#[cfg(test)]
pub use self::weather::MockForecastSource;

pub mod error;
pub mod weather;
