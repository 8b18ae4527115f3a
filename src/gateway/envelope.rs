use serde_json::Value;

use crate::utils::{Result, TaxChatError};

/// Strip the `{data, success}` wrapper the API puts around most bodies.
///
/// Bodies without a non-null `data` field are returned as-is. An explicit
/// `success: false` on a 2xx response is treated as a failed request.
pub fn unwrap_envelope(body: Value) -> Result<Value> {
    let Value::Object(mut map) = body else {
        return Ok(body);
    };

    if let Some(Value::Bool(false)) = map.get("success") {
        let message = map
            .get("message")
            .or_else(|| map.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string);
        return Err(TaxChatError::RequestFailed {
            status: None,
            message,
        });
    }

    match map.remove("data") {
        Some(Value::Null) | None => Ok(Value::Object(map)),
        Some(data) => Ok(data),
    }
}
