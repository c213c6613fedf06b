use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::DispatchError;
use crate::tools::{ForecastSource, get_weather_forecast};
use crate::types::{FunctionCallRequest, FunctionDescriptor, ParamType, ParameterSpec};

pub const WEATHER_FUNCTION: &str = "get_weather_forecast";

/// Every function the relay knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownFunction {
    WeatherForecast,
}

impl KnownFunction {
    pub const ALL: [KnownFunction; 1] = [KnownFunction::WeatherForecast];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            KnownFunction::WeatherForecast => WEATHER_FUNCTION,
        }
    }

    pub fn descriptor(self) -> FunctionDescriptor {
        match self {
            KnownFunction::WeatherForecast => FunctionDescriptor {
                name: WEATHER_FUNCTION,
                description: "Get detailed weather forecast for a location including \
                              temperature and precipitation",
                parameters: vec![
                    ParameterSpec {
                        name: "latitude",
                        kind: ParamType::Number,
                        description: "The latitude of the location (e.g. 48.8566 for Paris)",
                        required: true,
                    },
                    ParameterSpec {
                        name: "longitude",
                        kind: ParamType::Number,
                        description: "The longitude of the location (e.g. 2.3522 for Paris)",
                        required: true,
                    },
                    ParameterSpec {
                        name: "timezone",
                        kind: ParamType::String,
                        description: "Timezone for the forecast (e.g. Europe/Paris)",
                        required: false,
                    },
                    ParameterSpec {
                        name: "days",
                        kind: ParamType::Integer,
                        description: "Number of forecast days, 1 to 16 (default 7)",
                        required: false,
                    },
                ],
            },
        }
    }
}

/// Function catalog offered to the model plus the dispatch table behind it.
#[derive(Clone)]
pub struct ToolRegistry {
    catalog: Vec<FunctionDescriptor>,
    forecast: Arc<dyn ForecastSource>,
}

impl ToolRegistry {
    pub fn new(forecast: Arc<dyn ForecastSource>) -> Self {
        let catalog = KnownFunction::ALL.iter().map(|f| f.descriptor()).collect();
        Self { catalog, forecast }
    }

    pub fn catalog(&self) -> &[FunctionDescriptor] {
        &self.catalog
    }

    /// The `tools` array as sent on the wire.
    pub fn schemas(&self) -> Value {
        Value::Array(self.catalog.iter().map(|d| d.to_tool_schema()).collect())
    }

    fn descriptor(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.catalog.iter().find(|d| d.name == name)
    }

    /// False when `call` targets a known function but its arguments are
    /// unparseable or lack a required parameter. Unknown names pass through so
    /// the dispatcher can report them.
    pub fn has_required_arguments(&self, call: &FunctionCallRequest) -> bool {
        let Some(descriptor) = self.descriptor(&call.name) else {
            return true;
        };
        match call.parsed_arguments() {
            Ok(args) => descriptor.missing_required(&args).is_empty(),
            Err(_) => false,
        }
    }

    /// Runs `call` and returns its output as text. Never fails: errors come back
    /// as a description the model can relay to the user.
    pub async fn dispatch(&self, call: &FunctionCallRequest) -> String {
        match self.try_dispatch(call).await {
            Ok(output) => output,
            Err(e) => {
                warn!(target: "tool_registry", function = %call.name, error = %e, "Dispatch failed");
                e.to_string()
            }
        }
    }

    async fn try_dispatch(&self, call: &FunctionCallRequest) -> Result<String, DispatchError> {
        let function = KnownFunction::from_name(&call.name)
            .ok_or_else(|| DispatchError::UnknownFunction(call.name.clone()))?;

        let args = call
            .parsed_arguments()
            .map_err(|message| DispatchError::InvalidArguments {
                function: call.name.clone(),
                message,
            })?;

        let missing = function.descriptor().missing_required(&args);
        if !missing.is_empty() {
            return Err(DispatchError::MissingParameters {
                function: call.name.clone(),
                missing,
            });
        }

        debug!(target: "tool_registry", function = %call.name, "Invoking function");

        match function {
            KnownFunction::WeatherForecast => {
                let forecast = get_weather_forecast(self.forecast.as_ref(), &args).await?;
                serde_json::to_string(&forecast).map_err(|e| {
                    DispatchError::Failed(crate::tools::ToolError::Internal(e.to_string()))
                })
            }
        }
    }
}
