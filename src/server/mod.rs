//! HTTP transport
//!
//! Thin rocket layer over [`Gateway`]: every route deserializes its body,
//! calls one gateway operation and renders the outcome as JSON.

use std::sync::Arc;

use rocket::{
    data::{Limits, ToByteUnit},
    serde::json::Json,
    Build, Config, Request, Rocket,
};
use serde_json::{json, Value};

use crate::gateway::Gateway;
use crate::storage::settings::GatewaySettings;

pub mod error;
pub mod routes;

pub use error::ApiError;

/// Long conversations are sent whole on every chat request
pub const JSON_BODY_LIMIT_MIB: u64 = 64;

#[catch(404)]
fn not_found(request: &Request<'_>) -> Json<Value> {
    Json(json!({
        "success": false,
        "message": format!("No route for {} {}.", request.method(), request.uri()),
        "error": "not_found",
    }))
}

#[catch(500)]
fn internal_error() -> Json<Value> {
    Json(json!({
        "success": false,
        "message": "Internal server error.",
        "error": "internal",
    }))
}

/// Builds the rocket instance serving `gateway` on the configured address
pub fn build(gateway: Arc<Gateway>, settings: &GatewaySettings) -> Rocket<Build> {
    let figment = Config::figment()
        .merge(("port", settings.port))
        .merge(("address", settings.host.clone()))
        .merge((
            "limits",
            Limits::default().limit("json", JSON_BODY_LIMIT_MIB.mebibytes()),
        ));

    rocket::custom(figment)
        .manage(gateway)
        .mount("/", routes::routes())
        .register("/", catchers![not_found, internal_error])
}
