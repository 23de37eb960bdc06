//! Response rendering.
//!
//! # Responsibilities
//! - Render HTML fragments for the form endpoint
//! - Render JSON bodies for the API endpoint
//!
//! # Design Decisions
//! - Workflow failures reach clients as a generic message; detail stays in logs
//! - Everything interpolated into HTML is escaped

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Message shown when a workflow fails.
pub const GENERIC_FAILURE: &str = "Unable to resolve your address, please try again later";
pub const NAME_REQUIRED: &str = "Name is required";
pub const INVALID_BODY: &str = "Invalid request body";

#[derive(Debug, Serialize)]
struct ResultBody<'a> {
    result: &'a str,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

pub fn html_success(message: &str) -> Html<String> {
    Html(format!(r#"<p class="success">{}</p>"#, escape_html(message)))
}

pub fn html_error(message: &str) -> Html<String> {
    Html(format!(r#"<p class="error">{}</p>"#, escape_html(message)))
}

pub fn json_result(result: &str) -> Response {
    (StatusCode::OK, Json(ResultBody { result })).into_response()
}

pub fn json_error(status: StatusCode, error: &str) -> Response {
    (status, Json(ErrorBody { error })).into_response()
}

/// Escape the five HTML-significant characters.
pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape_html(r#"<script>alert("x & 'y'")</script>"#),
            "&lt;script&gt;alert(&#34;x &amp; &#39;y&#39;&#34;)&lt;/script&gt;"
        );
        assert_eq!(escape_html("Hello, Ada."), "Hello, Ada.");
    }

    #[test]
    fn test_fragments() {
        assert_eq!(html_success("a<b").0, r#"<p class="success">a&lt;b</p>"#);
        assert_eq!(html_error(NAME_REQUIRED).0, r#"<p class="error">Name is required</p>"#);
    }

    #[test]
    fn test_json_status() {
        assert_eq!(json_result("ok").status(), StatusCode::OK);
        assert_eq!(json_error(StatusCode::BAD_REQUEST, INVALID_BODY).status(), StatusCode::BAD_REQUEST);
    }
}
