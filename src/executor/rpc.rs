//! Executor that forwards SQL to a remote `exec_sql`-style procedure over HTTP.
//!
//! Request: `POST {base}/rest/v1/rpc/{function}` with body `{"query": sql}`.
//! A JSON array of objects in the response becomes rows.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use super::{ExecutionError, Executor, Row};

#[derive(Debug, Serialize)]
struct ExecRequest<'a> {
    query: &'a str,
}

pub struct RpcExecutor {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl RpcExecutor {
    pub fn new(
        base_url: &str,
        function: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ExecutionError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExecutionError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint(base_url, function),
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn endpoint(base_url: &str, function: &str) -> String {
    format!("{}/rest/v1/rpc/{}", base_url.trim_end_matches('/'), function)
}

#[async_trait]
impl Executor for RpcExecutor {
    async fn execute(&self, sql: &str) -> Result<Option<Vec<Row>>, ExecutionError> {
        let mut request = self.client.post(&self.endpoint).json(&ExecRequest { query: sql });
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(ExecutionError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        decode_rows(&body)
    }
}

fn transport_error(err: reqwest::Error) -> ExecutionError {
    if err.is_timeout() {
        ExecutionError::Timeout(err.to_string())
    } else {
        ExecutionError::Transport(err.to_string())
    }
}

/// Turn a response body into rows.
///
/// Empty bodies, `null` and `[]` mean "no rows". An object carrying an
/// `error` string is a failure reported in-band by the procedure.
fn decode_rows(body: &str) -> Result<Option<Vec<Row>>, ExecutionError> {
    if body.trim().is_empty() {
        return Ok(None);
    }

    let value: Value =
        serde_json::from_str(body).map_err(|e| ExecutionError::Decode(e.to_string()))?;

    match value {
        Value::Null => Ok(None),
        Value::Array(items) if items.is_empty() => Ok(None),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                other => Err(ExecutionError::Decode(format!("expected a row object, got {}", other))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Value::Object(row) => match row.get("error") {
            Some(Value::String(message)) => Err(ExecutionError::Database(message.clone())),
            _ => Ok(Some(vec![row])),
        },
        // Scalar results (e.g. a procedure returning `void` or a status flag)
        // carry no rows.
        _ => Ok(None),
    }
}
