//! Request authorization gate.
//!
//! Every request is reduced to `(subOwner, subName, method, urlPath,
//! objOwner, objName)` and checked against the policy engine. The subject
//! comes from [`SessionUser`]; the object from `?id=owner/name` on GET, or
//! from the `owner`/`name` fields of a JSON body otherwise.

use axum::{
    body::Body,
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use http_body_util::{BodyExt, Limited};
use iam_core::error::AppError;
use serde::Deserialize;

use super::auto_signin::SessionUser;
use crate::services::{metrics, AccessRequest};
use crate::utils::split_owner_name;
use crate::AppState;

const ANONYMOUS: &str = "anonymous";
const MAX_INSPECTED_BODY: usize = 2 * 1024 * 1024;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ObjectRef {
    owner: String,
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IdQuery {
    id: String,
}

/// `("", "")` unless `id` is a well-formed `owner/name`.
fn object_from_id(id: &str) -> (String, String) {
    split_owner_name(id)
        .map(|(owner, name)| (owner.to_string(), name.to_string()))
        .unwrap_or_default()
}

fn object_from_body(body: &[u8]) -> (String, String) {
    if body.is_empty() {
        return Default::default();
    }
    serde_json::from_slice::<ObjectRef>(body)
        .map(|obj| (obj.owner, obj.name))
        .unwrap_or_default()
}

/// Requests the login page makes before anyone signs in.
fn is_quiet(req: &AccessRequest<'_>) -> bool {
    req.sub_owner == ANONYMOUS
        && req.sub_name == ANONYMOUS
        && req.method == "GET"
        && (req.url_path == "/api/get-account" || req.url_path == "/api/get-app-login")
        && req.obj_owner.is_empty()
        && req.obj_name.is_empty()
}

pub async fn authz_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (sub_owner, sub_name) = match req.extensions().get::<SessionUser>() {
        Some(user) => (user.owner.clone(), user.name.clone()),
        None => (ANONYMOUS.to_string(), ANONYMOUS.to_string()),
    };

    let (req, (obj_owner, obj_name)) = if req.method() == Method::GET {
        let id = req
            .uri()
            .query()
            .and_then(|q| serde_urlencoded::from_str::<IdQuery>(q).ok())
            .unwrap_or_default()
            .id;
        let object = object_from_id(&id);
        (req, object)
    } else {
        let (parts, body) = req.into_parts();
        let bytes = Limited::new(body, MAX_INSPECTED_BODY)
            .collect()
            .await
            .map_err(|e| {
                tracing::warn!("Body read error: {}", e);
                AppError::BadRequest(anyhow::anyhow!("Failed to read request body"))
            })?
            .to_bytes();
        let object = object_from_body(&bytes);
        (Request::from_parts(parts, Body::from(bytes)), object)
    };

    let method = req.method().as_str().to_string();
    let url_path = req.uri().path().to_string();
    let access = AccessRequest {
        sub_owner: &sub_owner,
        sub_name: &sub_name,
        method: &method,
        url_path: &url_path,
        obj_owner: &obj_owner,
        obj_name: &obj_name,
    };

    let decision = state.core.policy.decide(&access);
    metrics::record_decision(decision);

    if !is_quiet(&access) {
        tracing::info!(
            sub_owner = %sub_owner,
            sub_name = %sub_name,
            method = %method,
            url_path = %url_path,
            obj_owner = %obj_owner,
            obj_name = %obj_name,
            result = decision.as_str(),
            "Authorization decision"
        );
    }

    if !decision.is_allowed() {
        return Err(AppError::Forbidden(anyhow::anyhow!("Unauthorized operation")));
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_must_have_two_parts() {
        assert_eq!(
            object_from_id("built-in/admin"),
            ("built-in".to_string(), "admin".to_string())
        );
        assert_eq!(object_from_id("admin"), (String::new(), String::new()));
        assert_eq!(object_from_id("a/b/c"), (String::new(), String::new()));
        assert_eq!(object_from_id(""), (String::new(), String::new()));
    }

    #[test]
    fn object_body_tolerates_non_json() {
        assert_eq!(
            object_from_body(br#"{"owner":"org1","name":"alice","email":"a@x"}"#),
            ("org1".to_string(), "alice".to_string())
        );
        assert_eq!(
            object_from_body(b"grant_type=refresh_token"),
            (String::new(), String::new())
        );
        assert_eq!(object_from_body(b""), (String::new(), String::new()));
    }

    #[test]
    fn anonymous_login_checks_are_quiet() {
        let login_check = AccessRequest {
            sub_owner: ANONYMOUS,
            sub_name: ANONYMOUS,
            method: "GET",
            url_path: "/api/get-account",
            obj_owner: "",
            obj_name: "",
        };
        assert!(is_quiet(&login_check));
        assert!(!is_quiet(&AccessRequest {
            sub_owner: "org1",
            ..login_check.clone()
        }));
        assert!(!is_quiet(&AccessRequest {
            url_path: "/api/get-users",
            ..login_check
        }));
    }
}
