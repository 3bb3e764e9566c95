use serde_json::Value;

use crate::Params;

/// Largest float that still converts to an integer exactly.
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_991.0;

/// Render a scalar parameter the way a query string expects it.
///
/// Strings are used verbatim; booleans and null use their JSON text. Numbers
/// print like JavaScript's `String(n)`, so `1e5` becomes `100000`, not
/// `100000.0`.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() <= MAX_EXACT_FLOAT => {
                (f as i64).to_string()
            }
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

/// Values the unsigned encoder leaves out: `""`, `0`, `false` and `null`.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Unsigned query encoding: form-urlencoded, insertion order, empty values
/// omitted.
pub fn encode_plain(params: &Params) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        if is_empty_value(value) {
            continue;
        }
        serializer.append_pair(key, &scalar_to_string(value));
    }
    serializer.finish()
}
