use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{
        StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use fileforge_common::error::ForgeError;
use fileforge_jobs::WorkFunction;
use fileforge_tools::{
    DocumentFetcher, FormatConverter, ImageResizer, PasswordGenerator, QrGenerator,
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    error::ApiError,
    state::{AppState, Toolbox},
};

/// A work function reachable over HTTP.
pub trait Tool: WorkFunction<Input: DeserializeOwned, Config: DeserializeOwned> {
    fn select(tools: &Toolbox) -> Arc<Self>;
}

impl Tool for PasswordGenerator {
    fn select(tools: &Toolbox) -> Arc<Self> {
        Arc::clone(&tools.password)
    }
}

impl Tool for QrGenerator {
    fn select(tools: &Toolbox) -> Arc<Self> {
        Arc::clone(&tools.qr)
    }
}

impl Tool for DocumentFetcher {
    fn select(tools: &Toolbox) -> Arc<Self> {
        Arc::clone(&tools.fetch)
    }
}

impl Tool for FormatConverter {
    fn select(tools: &Toolbox) -> Arc<Self> {
        Arc::clone(&tools.convert)
    }
}

impl Tool for ImageResizer {
    fn select(tools: &Toolbox) -> Arc<Self> {
        Arc::clone(&tools.resize)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRequest {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default)]
    pub config: Value,
}

#[derive(Debug, Deserialize)]
pub struct SingleRequest {
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub config: Value,
}

/// `null` means "all defaults".
fn object_or_empty(value: Value) -> Value {
    match value {
        Value::Null => Value::Object(Default::default()),
        other => other,
    }
}

fn parse_config<C: DeserializeOwned>(value: Value) -> Result<C, ForgeError> {
    serde_json::from_value(object_or_empty(value))
        .map_err(|err| ForgeError::InvalidConfig(err.to_string()))
}

fn parse_items<I: DeserializeOwned>(items: Vec<Value>) -> Result<Vec<I>, ForgeError> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(object_or_empty(item))
                .map_err(|err| ForgeError::InvalidArgument(format!("items[{index}]: {err}")))
        })
        .collect()
}

/// Accepts a batch and answers `202 { jobId }` before any item runs.
pub async fn submit_bulk<T: Tool>(
    State(state): State<AppState>,
    Json(request): Json<BulkRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let config: T::Config = parse_config(request.config)?;
    let inputs: Vec<T::Input> = parse_items(request.items)?;
    let ticket = state
        .runner
        .submit(T::select(&state.tools), inputs, config, request.job_id)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(ticket)))
}

/// Runs one input and returns the artifact itself.
pub async fn run_single<T: Tool>(
    State(state): State<AppState>,
    Json(request): Json<SingleRequest>,
) -> Result<Response, ApiError> {
    let config: T::Config = parse_config(request.config)?;
    let input: T::Input = serde_json::from_value(object_or_empty(request.input))
        .map_err(|err| ForgeError::InvalidArgument(format!("input: {err}")))?;

    let outcome = state
        .runner
        .run_single(T::select(&state.tools), input, config)
        .await?;

    let response = match &outcome.result.artifact {
        Some(artifact) => (
            StatusCode::OK,
            [
                (CONTENT_TYPE, artifact.content_type.clone()),
                (CONTENT_DISPOSITION, attachment(&artifact.file_name)),
            ],
            outcome.content,
        )
            .into_response(),
        None => (StatusCode::OK, Json(outcome.result)).into_response(),
    };
    Ok(response)
}

pub(crate) fn attachment(file_name: &str) -> String {
    format!("attachment; filename=\"{}\"", file_name.replace('"', ""))
}

#[cfg(test)]
mod tests {
    use fileforge_tools::{PasswordConfig, QrConfig};

    use super::*;

    #[test]
    fn null_config_means_defaults() {
        let config: PasswordConfig = parse_config(Value::Null).unwrap();
        assert_eq!(config.length, PasswordConfig::default().length);
    }

    #[test]
    fn malformed_config_is_a_setup_error() {
        let err = parse_config::<QrConfig>(serde_json::json!({"size": "huge"})).unwrap_err();
        assert!(matches!(err, ForgeError::InvalidConfig(_)));
    }

    #[test]
    fn malformed_item_names_its_position() {
        let items = vec![serde_json::json!({"label": "a"}), serde_json::json!(42)];
        let err = parse_items::<fileforge_tools::PasswordInput>(items).unwrap_err();
        assert!(err.to_string().contains("items[1]"));
    }
}
