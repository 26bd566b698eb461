use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use crate::{error::ApiError, routes::AppState};

pub const WORKER_ID_HEADER: &str = "X-Worker-Id";
pub const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("缺少Worker标识")]
    MissingWorkerId,
    #[error("缺少API密钥")]
    MissingApiKey,
    #[error("API密钥无效")]
    InvalidApiKey,
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// 已通过密钥校验的Worker请求；Worker标识可能缺失（注册时可由请求体提供）
#[derive(Debug, Clone)]
pub struct WorkerCredentials {
    pub worker_id: Option<String>,
}

impl FromRequestParts<AppState> for WorkerCredentials {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if state.auth.enabled {
            let key = header_value(parts, API_KEY_HEADER);
            if key.is_none() {
                return Err(AuthError::MissingApiKey.into());
            }
            if !state.auth.accepts(key) {
                warn!(path = %parts.uri.path(), "Worker请求携带的API密钥无效");
                return Err(AuthError::InvalidApiKey.into());
            }
        }

        Ok(Self {
            worker_id: header_value(parts, WORKER_ID_HEADER).map(str::to_string),
        })
    }
}

/// 必须携带Worker标识的请求
#[derive(Debug, Clone)]
pub struct WorkerIdentity(pub String);

impl FromRequestParts<AppState> for WorkerIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let credentials = WorkerCredentials::from_request_parts(parts, state).await?;
        credentials
            .worker_id
            .map(WorkerIdentity)
            .ok_or(ApiError::Authentication(AuthError::MissingWorkerId))
    }
}
