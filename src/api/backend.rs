use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

/// Capability set the resolver and workflow need from the REST backend.
/// Injected at construction so the core never reaches for global state.
#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value>;
    async fn post(&self, path: &str, body: Value) -> Result<Value>;
    async fn patch(&self, path: &str, body: Value) -> Result<Value>;
}

/// Source of the bearer token attached to every request.
pub trait TokenProvider: Send + Sync {
    fn bearer_token(&self) -> String;
}

/// Normalize a backend list response. List endpoints return either a bare
/// array or a `{results: [...]}` page wrapper; both are accepted
/// transparently. `source` names the endpoint for error reporting.
pub fn unwrap_page<T: DeserializeOwned>(source: &str, raw: Value) -> Result<Vec<T>> {
    let items = match raw {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(Error::Decode {
                    url: source.to_string(),
                    message: "expected an array or a {results: [...]} page".to_string(),
                })
            }
        },
        _ => {
            return Err(Error::Decode {
                url: source.to_string(),
                message: "expected an array or a {results: [...]} page".to_string(),
            })
        }
    };

    items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item).map_err(|e| Error::Decode {
                url: source.to_string(),
                message: e.to_string(),
            })
        })
        .collect()
}
