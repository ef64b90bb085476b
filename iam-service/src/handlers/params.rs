//! OAuth parameter extraction.

use axum::{
    async_trait,
    body::to_bytes,
    extract::{FromRequest, Request},
    http::header,
};
use iam_core::error::AppError;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

const MAX_FORM_BODY: usize = 64 * 1024;

/// Parameters merged from the query string and an urlencoded form body.
/// Form values take precedence.
#[derive(Debug, Clone)]
pub struct OAuthParams<T>(pub T);

fn parse_pairs(raw: &str, into: &mut BTreeMap<String, String>) -> Result<(), AppError> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw)
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Malformed parameters: {}", e)))?;
    into.extend(pairs);
    Ok(())
}

fn is_form(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

#[async_trait]
impl<T, S> FromRequest<S> for OAuthParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let mut params = BTreeMap::new();
        if let Some(query) = req.uri().query() {
            parse_pairs(query, &mut params)?;
        }

        if is_form(&req) {
            let body = to_bytes(req.into_body(), MAX_FORM_BODY)
                .await
                .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Failed to read form: {}", e)))?;
            let body = std::str::from_utf8(&body)
                .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Form body is not UTF-8")))?;
            parse_pairs(body, &mut params)?;
        }

        let encoded = serde_urlencoded::to_string(&params)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!(e)))?;
        let value = serde_urlencoded::from_str(&encoded)
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid parameters: {}", e)))?;
        Ok(OAuthParams(value))
    }
}
