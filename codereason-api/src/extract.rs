/// Request extractors with JSON error bodies
///
/// Drop-in replacements for `axum::Json`, `axum::extract::Query` and
/// `axum::extract::Path`. A body, query string or path segment that fails to
/// parse becomes `ApiError::BadRequest`, so clients always get a 400 with the
/// usual `{error, message}` body instead of axum's plain-text rejection.
///
/// `Json` is also a response type and serializes like `axum::Json`.
/// `OptionalJson` accepts an empty body as `None`.

use crate::error::ApiError;
use axum::{
    async_trait,
    body::Bytes,
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Request,
    },
    http::request::Parts,
    response::{IntoResponse, Response},
};
use serde::{de::DeserializeOwned, Serialize};

#[derive(Debug, Clone, Copy, Default)]
pub struct Json<T>(pub T);

/// JSON body that may be left out entirely
#[derive(Debug, Clone, Default)]
pub struct OptionalJson<T>(pub Option<T>);

#[derive(Debug, Clone, Copy, Default)]
pub struct Query<T>(pub T);

#[derive(Debug, Clone, Copy, Default)]
pub struct Path<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state).await?;
        Ok(Json(value))
    }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

#[async_trait]
impl<S, T> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(OptionalJson(None));
        }

        serde_json::from_slice(&bytes)
            .map(|value| OptionalJson(Some(value)))
            .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))
    }
}

#[async_trait]
impl<S, T> FromRequestParts<S> for Query<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let axum::extract::Query(value) =
            axum::extract::Query::<T>::from_request_parts(parts, state).await?;
        Ok(Query(value))
    }
}

#[async_trait]
impl<S, T> FromRequestParts<S> for Path<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let axum::extract::Path(value) =
            axum::extract::Path::<T>::from_request_parts(parts, state).await?;
        Ok(Path(value))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected JSON body");
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, routing::post, Router};
    use serde::Deserialize;
    use tower::ServiceExt;
    use uuid::Uuid;

    #[derive(Debug, Deserialize, Serialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    enum Level {
        Low,
        High,
    }

    #[derive(Debug, Deserialize, Serialize)]
    struct Payload {
        token: String,
        level: Level,
    }

    #[derive(Debug, Deserialize)]
    struct Filter {
        org: Uuid,
    }

    async fn echo(
        Path(id): Path<Uuid>,
        Query(filter): Query<Filter>,
        Json(body): Json<Payload>,
    ) -> Json<(Uuid, Uuid, Payload)> {
        Json((id, filter.org, body))
    }

    async fn optional(OptionalJson(body): OptionalJson<Payload>) -> Json<Option<String>> {
        Json(body.map(|p| p.token))
    }

    fn app() -> Router {
        Router::new()
            .route("/items/:id", post(echo))
            .route("/optional", post(optional))
    }

    async fn call(uri: &str, body: &'static str) -> (StatusCode, serde_json::Value) {
        let response = app()
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn uri(id: &str, org: &str) -> String {
        format!("/items/{}?org={}", id, org)
    }

    #[tokio::test]
    async fn test_well_formed_request_passes() {
        let (id, org) = (Uuid::new_v4(), Uuid::new_v4());
        let (status, body) = call(
            &uri(&id.to_string(), &org.to_string()),
            r#"{"token":"abc","level":"HIGH"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0], id.to_string());
        assert_eq!(body[2]["level"], "HIGH");
    }

    #[tokio::test]
    async fn test_missing_field_is_json_400() {
        let valid = Uuid::new_v4().to_string();
        let (status, body) = call(&uri(&valid, &valid), "{}").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
        assert!(body["message"].as_str().unwrap().contains("token"));
    }

    #[tokio::test]
    async fn test_unknown_enum_value_is_json_400() {
        let valid = Uuid::new_v4().to_string();
        let (status, body) = call(&uri(&valid, &valid), r#"{"token":"abc","level":"high"}"#).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn test_syntax_error_is_json_400() {
        let valid = Uuid::new_v4().to_string();
        let (status, body) = call(&uri(&valid, &valid), "{not json").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn test_bad_query_and_path_are_json_400() {
        let valid = Uuid::new_v4().to_string();
        let json = r#"{"token":"abc","level":"LOW"}"#;

        let (status, body) = call(&uri(&valid, "zzz"), json).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");

        let (status, body) = call(&uri("not-a-uuid", &valid), json).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn test_optional_body() {
        let (status, body) = call("/optional", "").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_null());

        let (status, body) = call("/optional", r#"{"token":"abc","level":"LOW"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "abc");

        let (status, body) = call("/optional", r#"{"level":"LOW"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }
}
