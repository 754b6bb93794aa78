use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use rocket_okapi::JsonSchema;

/// JSON body returned for every rejected operation.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct Status {
    pub message: String,
}

pub fn new_status(message: String) -> Json<Status> {
    Json(Status { message })
}
