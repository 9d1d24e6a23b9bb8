use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, OptionalFromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;

use obstacle_common::ObstacleError;

use crate::ApiError;

/// `Json<T>` whose rejections become validation errors, so malformed bodies
/// get the same `{"error": ...}` 400 as every other bad input.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

fn rejected(rejection: JsonRejection) -> ApiError {
    ApiError(ObstacleError::Validation(rejection.body_text()))
}

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = <Json<T> as FromRequest<S>>::from_request(req, state)
            .await
            .map_err(rejected)?;
        Ok(JsonBody(value))
    }
}

/// Absent when the request carries no JSON content type.
impl<S, T> OptionalFromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Option<Self>, Self::Rejection> {
        let body = <Json<T> as OptionalFromRequest<S>>::from_request(req, state)
            .await
            .map_err(rejected)?;
        Ok(body.map(|Json(value)| JsonBody(value)))
    }
}
