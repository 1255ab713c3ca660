use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::error::ClientError;

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: &OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let Some(data_value) = data {
                response["data"] = data_value;
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output a client error in the appropriate format
pub fn output_client_error(
    output_format: &OutputFormat,
    error: &ClientError,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": error.to_string(),
                "error_code": error.error_code()
            });

            if let Some(status) = error.status() {
                response["status"] = json!(status.as_u16());
            }
            if let ClientError::Api { body: Some(body), .. } = error {
                response["body"] = body.clone();
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", error);
        }
    }
    Ok(())
}

/// Output an API payload in the appropriate format
pub fn output_value(output_format: &OutputFormat, value: &Value) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => match value {
            Value::Null => println!("(empty response)"),
            Value::String(s) => println!("{}", s),
            other => println!("{}", serde_json::to_string_pretty(other)?),
        },
    }
    Ok(())
}

/// Output current item information in the appropriate format
pub fn output_current_item(
    output_format: &OutputFormat,
    item_type: &str,
    name: &str,
    details: Value,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({
                format!("current_{}", item_type): details
            }))?);
        }
        OutputFormat::Text => {
            println!("Current {}: {}", item_type, name);
            if let Some(details) = details.as_object() {
                for (key, value) in details {
                    match value {
                        Value::String(s) if !s.is_empty() => println!("{}: {}", key, s),
                        Value::Null | Value::String(_) => {}
                        other => println!("{}: {}", key, other),
                    }
                }
            }
        }
    }
    Ok(())
}

/// Parse `key=value` pairs given on the command line into a JSON object.
/// Repeated keys collect into an array.
pub fn parse_query_pairs(pairs: &[String]) -> anyhow::Result<Value> {
    let mut query = serde_json::Map::new();

    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Query parameter '{}' must be key=value", pair))?;
        let value = Value::String(value.to_string());

        match query.get_mut(key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                query.insert(key.to_string(), value);
            }
        }
    }

    Ok(Value::Object(query))
}

/// Read a JSON body from the `--data` argument, falling back to stdin
pub fn read_json_body(data: Option<String>) -> anyhow::Result<Value> {
    let raw = match data {
        Some(data) => data,
        None => std::io::read_to_string(std::io::stdin())?,
    };

    if raw.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&raw).map_err(|e| anyhow::anyhow!("Request body is not valid JSON: {}", e))
}
