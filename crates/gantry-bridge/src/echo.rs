//! Built-in echo application.
//!
//! Serves as the default application when the binary runs without an
//! embedded one, and as a convenient dispatcher for tests: it reflects
//! the query string back as JSON.

use async_trait::async_trait;

use gantry_common::DispatchError;

use crate::dispatch::Dispatch;
use crate::request::RequestContext;
use crate::response::AppResponse;

/// Reflects request query parameters back as a JSON object.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoApp;

#[async_trait]
impl Dispatch for EchoApp {
    async fn dispatch(&self, ctx: RequestContext) -> Result<AppResponse, DispatchError> {
        if ctx.path == "/health" {
            return Ok(AppResponse::text(200, "OK"));
        }

        let mut body = serde_json::Map::new();
        for (name, value) in &ctx.query {
            body.insert(name.clone(), serde_json::Value::String(value.clone()));
        }

        Ok(AppResponse::json(
            200,
            &serde_json::Value::Object(body).to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health() {
        let response = EchoApp
            .dispatch(RequestContext::new("GET", "/health"))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"OK");
    }

    #[tokio::test]
    async fn test_echoes_query() {
        let mut ctx = RequestContext::new("GET", "/anything");
        ctx.query.push(("a".to_string(), "1".to_string()));
        ctx.query.push(("b".to_string(), "two".to_string()));

        let response = EchoApp.dispatch(ctx).await.unwrap();
        assert_eq!(response.body, br#"{"a":"1","b":"two"}"#);
    }
}
