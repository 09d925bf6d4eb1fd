use std::str::FromStr;

use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::IntoParams;

use crate::error::{AppError, AppResult};

/// `Json` whose rejections surface as a validation error
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// `Query` whose rejections surface as a validation error
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PaginationParams {
    #[param(default = 20, minimum = 1, maximum = 100)]
    pub limit: Option<i64>,
    #[param(default = 0, minimum = 0)]
    pub offset: Option<i64>,
}

impl PaginationParams {
    /// Clamp to a `(limit, offset)` window
    pub fn window(&self) -> (u64, u64) {
        let limit = self.limit.unwrap_or(20).clamp(1, 100) as u64;
        let offset = self.offset.unwrap_or(0).max(0) as u64;
        (limit, offset)
    }
}

/// Treat a missing or whitespace-only query value as absent
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Parse an optional query value, blank meaning "not given"
pub fn parse_optional<T>(field: &str, value: Option<&str>) -> AppResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    non_blank(value)
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| AppError::Validation(format!("Invalid `{}`: {}", field, e)))
        })
        .transpose()
}

/// Accepts `0`/`1` and `false`/`true`
pub fn parse_flag(field: &str, value: Option<&str>) -> AppResult<bool> {
    match non_blank(value) {
        None => Ok(false),
        Some(v) => match v.to_ascii_lowercase().as_str() {
            "1" | "true" => Ok(true),
            "0" | "false" => Ok(false),
            other => Err(AppError::Validation(format!(
                "Invalid `{}`: expected 0 or 1, got `{}`",
                field, other
            ))),
        },
    }
}
