use std::sync::Arc;

use rocket::{
    serde::json::{self, Json},
    Route, State,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::GatewayError;
use crate::gateway::Gateway;
use crate::server::error::ApiError;
use crate::types::requests::{
    Ack, ChatRequest, ChatResponse, FileListing, ListFilesRequest, LoadModelRequest,
    ModelsReport, StatusReport, UnloadModelRequest,
};

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Request body as received: any JSON document, or why it could not be read
type Body<'r> = Result<Json<Value>, json::Error<'r>>;

/// Decodes a request body into `T`.
///
/// An unreadable, empty or non-JSON body is reported as no input. A JSON
/// document whose fields have the wrong type names the offending field.
fn body<T: DeserializeOwned>(data: Body<'_>) -> Result<T, ApiError> {
    match data {
        Ok(Json(value)) => decode(value).map_err(ApiError),
        Err(e) => {
            tracing::debug!("Unreadable request body: {}", e);
            Err(ApiError(GatewayError::NoInput))
        }
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, GatewayError> {
    let fields = match value {
        Value::Object(fields) => fields,
        Value::Null => return Err(GatewayError::NoInput),
        _ => {
            return Err(GatewayError::invalid_parameter(
                "body",
                "must be a JSON object",
            ))
        }
    };

    let document = Value::Object(fields);
    let err = match T::deserialize(&document) {
        Ok(request) => return Ok(request),
        Err(err) => err,
    };

    // Every request field is optional, so the field that fails on its own is
    // the one with the wrong type.
    let name = document
        .as_object()
        .and_then(|fields| {
            fields.iter().find_map(|(name, value)| {
                let mut single = Map::new();
                single.insert(name.clone(), value.clone());
                T::deserialize(&Value::Object(single))
                    .is_err()
                    .then(|| name.clone())
            })
        })
        .unwrap_or_else(|| "body".to_string());

    Err(GatewayError::invalid_parameter(name, err.to_string()))
}

#[post("/load", data = "<req>")]
pub async fn load(gateway: &State<Arc<Gateway>>, req: Body<'_>) -> ApiResult<Ack> {
    let request: LoadModelRequest = body(req)?;
    Ok(Json(gateway.load_model(request).await?))
}

#[post("/chat", data = "<req>")]
pub async fn chat(gateway: &State<Arc<Gateway>>, req: Body<'_>) -> ApiResult<ChatResponse> {
    let request: ChatRequest = body(req)?;
    let result = gateway.chat(request).await?;
    Ok(Json(result.into()))
}

#[post("/unload", data = "<req>")]
pub async fn unload(gateway: &State<Arc<Gateway>>, req: Body<'_>) -> ApiResult<Ack> {
    let request: UnloadModelRequest = body(req)?;
    Ok(Json(gateway.unload_model(request).await?))
}

#[get("/status")]
pub fn status(gateway: &State<Arc<Gateway>>) -> Json<StatusReport> {
    Json(gateway.status())
}

#[get("/models")]
pub fn models(gateway: &State<Arc<Gateway>>) -> Json<ModelsReport> {
    Json(ModelsReport {
        models: gateway.models(),
    })
}

#[post("/list-files", data = "<req>")]
pub async fn list_files(
    gateway: &State<Arc<Gateway>>,
    req: Body<'_>,
) -> ApiResult<FileListing> {
    let request: ListFilesRequest = body(req)?;
    let files = gateway.list_files(request).await?;
    Ok(Json(FileListing {
        success: true,
        files,
    }))
}

pub fn routes() -> Vec<Route> {
    routes![load, chat, unload, status, models, list_files]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_valid_body() {
        let request: ChatRequest =
            decode(json!({"model_id": "m", "messages": [], "max_tokens": 5})).unwrap();

        assert_eq!(request.model_id.as_deref(), Some("m"));
        assert_eq!(request.max_tokens, Some(5));
    }

    #[test]
    fn test_decode_names_mistyped_field() {
        let err = decode::<ChatRequest>(json!({"model_id": "m", "max_tokens": -5})).unwrap_err();
        assert!(matches!(
            err,
            GatewayError::InvalidParameter { ref name, .. } if name == "max_tokens"
        ));

        let err = decode::<ChatRequest>(json!({"messages": {"role": "user"}})).unwrap_err();
        assert!(matches!(
            err,
            GatewayError::InvalidParameter { ref name, .. } if name == "messages"
        ));
    }

    #[test]
    fn test_decode_null_and_non_object() {
        assert!(matches!(
            decode::<UnloadModelRequest>(Value::Null),
            Err(GatewayError::NoInput)
        ));
        assert!(matches!(
            decode::<UnloadModelRequest>(json!([1, 2])),
            Err(GatewayError::InvalidParameter { ref name, .. }) if name == "body"
        ));
    }
}
