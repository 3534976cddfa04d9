//! Input sanitization and the validating JSON extractor.

use std::sync::LazyLock;

use axum::{
    extract::{FromRequest, Request},
    Json,
};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use validator::Validate;

use crate::error::AppError;

static SCRIPT_OR_STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").expect("Invalid regex"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)</?[a-zA-Z!][^>]*>").expect("Invalid regex"));
static JS_URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)javascript\s*:").expect("Invalid regex"));
static EVENT_HANDLER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bon[a-z]+\s*=").expect("Invalid regex"));

/// Strips markup and script vectors from free text and trims it.
pub fn sanitize_text(input: &str) -> String {
    let text = SCRIPT_OR_STYLE_RE.replace_all(input, "");
    let text = TAG_RE.replace_all(&text, "");
    let text = JS_URL_RE.replace_all(&text, "");
    let text = EVENT_HANDLER_RE.replace_all(&text, "");
    text.trim().to_string()
}

/// Sanitizes every string in a JSON document in place. Object keys are left alone.
pub fn sanitize_value(value: &mut Value) {
    match value {
        Value::String(s) => *s = sanitize_text(s),
        Value::Array(items) => items.iter_mut().for_each(sanitize_value),
        Value::Object(map) => map.values_mut().for_each(sanitize_value),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// JSON body extractor that sanitizes, deserializes and validates.
///
/// Malformed JSON, type mismatches and validation failures all answer 400.
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(mut value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        sanitize_value(&mut value);
        let parsed: T =
            serde_json::from_value(value).map_err(|e| AppError::BadRequest(format!("Invalid request body: {e}")))?;
        parsed.validate()?;
        Ok(Self(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header::CONTENT_TYPE, StatusCode};
    use axum::response::IntoResponse;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_strips_script_blocks_and_tags() {
        assert_eq!(sanitize_text("  <script>alert('x')</script>ساعة <b>فاخرة</b> "), "ساعة فاخرة");
        assert_eq!(sanitize_text("<STYLE type=\"text/css\">body{}</STYLE>ok"), "ok");
        assert_eq!(sanitize_text("<img src=x onerror=alert(1)>hi"), "hi");
    }

    #[test]
    fn test_strips_js_urls_and_handlers() {
        assert_eq!(sanitize_text("JavaScript:alert(1)"), "alert(1)");
        assert_eq!(sanitize_text("x onclick = steal()"), "x  steal()");
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(sanitize_text("3 < 5 and 7 > 2"), "3 < 5 and 7 > 2");
        assert_eq!(sanitize_text("عطر العود الملكي 100ml"), "عطر العود الملكي 100ml");
    }

    #[test]
    fn test_sanitize_value_recurses() {
        let mut value = json!({ "name": "<i>Oud</i>", "tags": ["<b>new</b>", 3], "specs": { "<k>": " <u>v</u> " } });
        sanitize_value(&mut value);
        assert_eq!(value, json!({ "name": "Oud", "tags": ["new", 3], "specs": { "<k>": "v" } }));
    }

    #[derive(Debug, Deserialize, Validate)]
    struct Review {
        #[validate(length(min = 2))]
        title: String,
    }

    fn json_request(body: &str) -> Request {
        axum::http::Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_json_sanitizes_before_validating() {
        let ValidJson(review) = ValidJson::<Review>::from_request(json_request(r#"{"title":"<b>Great</b>"}"#), &()).await.unwrap();
        assert_eq!(review.title, "Great");

        let err = ValidJson::<Review>::from_request(json_request(r#"{"title":"<b>x</b>"}"#), &()).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_valid_json_rejects_malformed_body() {
        let err = ValidJson::<Review>::from_request(json_request("{not json"), &()).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        let err = ValidJson::<Review>::from_request(json_request(r#"{"title": 5}"#), &()).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
