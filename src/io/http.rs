//! JSON over HTTP through `ureq`.

use crate::core::context::NodeConfig;
use crate::core::dataset::Dataset;
use crate::core::error::{IoError, IoResult};
use serde_json::Value as JsonValue;

fn check_endpoint(endpoint: &str) -> IoResult<()> {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Ok(())
    } else {
        Err(IoError::InvalidLocation {
            location: endpoint.to_string(),
            reason: "endpoint must be an http or https URL".to_string(),
        })
    }
}

fn text_of(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn request(agent: &ureq::Agent, method: &str, endpoint: &str, options: &NodeConfig) -> ureq::Request {
    let mut request = agent.request(method, endpoint);
    if let Some(headers) = options.object("headers") {
        for (name, value) in headers {
            request = request.set(name, &text_of(value));
        }
    }
    if let Some(params) = options.object("params") {
        for (name, value) in params {
            request = request.query(name, &text_of(value));
        }
    }
    request
}

fn call_failed(endpoint: &str, error: ureq::Error) -> IoError {
    match error {
        ureq::Error::Status(code, _) => IoError::Http(format!("{} returned status {}", endpoint, code)),
        ureq::Error::Transport(transport) => IoError::Http(transport.to_string()),
    }
}

/// Interpret a response body as rows.
///
/// A list is one row per element, `{"data": [...]}` is the list inside and
/// any other object is a single row.
pub(crate) fn dataset_from_response(body: JsonValue) -> IoResult<Dataset> {
    let records = match body {
        JsonValue::Array(records) => records,
        JsonValue::Object(mut object) => match object.remove("data") {
            Some(JsonValue::Array(records)) => records,
            Some(other) => {
                object.insert("data".to_string(), other);
                vec![JsonValue::Object(object)]
            }
            None => vec![JsonValue::Object(object)],
        },
        other => return Err(IoError::Http(format!("unexpected response body: {}", other))),
    };
    Ok(Dataset::from_json_records(&records)?)
}

/// Fetch rows from an endpoint, GET unless `method` says otherwise.
pub(crate) fn read(agent: &ureq::Agent, endpoint: &str, options: &NodeConfig) -> IoResult<Dataset> {
    check_endpoint(endpoint)?;
    let method = options.str("method").unwrap_or("GET").to_uppercase();
    let response = request(agent, &method, endpoint, options)
        .call()
        .map_err(|e| call_failed(endpoint, e))?;
    let body: JsonValue = response
        .into_json()
        .map_err(|e| IoError::Http(format!("invalid JSON response from {}: {}", endpoint, e)))?;
    dataset_from_response(body)
}

/// Send the records as a JSON array, POST unless `method` says otherwise.
pub(crate) fn write(agent: &ureq::Agent, data: &Dataset, endpoint: &str, options: &NodeConfig) -> IoResult<String> {
    check_endpoint(endpoint)?;
    let method = options.str("method").unwrap_or("POST").to_uppercase();
    let body = JsonValue::Array(data.to_json_records());
    request(agent, &method, endpoint, options)
        .send_json(body)
        .map_err(|e| call_failed(endpoint, e))?;
    Ok(format!("api://{}", endpoint))
}
