pub mod oauth;

use serde::Serialize;

/// Success envelope matching the `{status, msg, data}` error body.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: &'static str,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: "ok",
            msg: String::new(),
            sub: None,
            name: None,
            data,
        }
    }

    pub fn error(msg: impl Into<String>, data: T) -> Self {
        Self {
            status: "error",
            msg: msg.into(),
            sub: None,
            name: None,
            data,
        }
    }
}
