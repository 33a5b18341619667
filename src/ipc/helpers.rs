use chrono::NaiveDate;
use serde_json::Value;

/// Required string param: present, trimmed, non-empty.
pub fn required_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Optional string param; absent or blank collapses to None.
pub fn opt_str(params: &Value, key: &str) -> Option<String> {
    required_str(params, key)
}

/// Optional string param with an empty-string default.
pub fn str_or_empty(params: &Value, key: &str) -> String {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Amounts and ages arrive as numbers or numeric strings; anything malformed
/// coerces to zero rather than rejecting the request.
pub fn coerced_i64(params: &Value, key: &str) -> i64 {
    match params.get(key) {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Optional ISO date param. `Err` carries a bad_params message.
pub fn opt_date(params: &Value, key: &str) -> Result<Option<NaiveDate>, String> {
    let Some(v) = params.get(key) else {
        return Ok(None);
    };
    if v.is_null() {
        return Ok(None);
    }
    let Some(s) = v.as_str() else {
        return Err(format!("{key} must be a YYYY-MM-DD string"));
    };
    s.parse()
        .map(Some)
        .map_err(|_| format!("{key} must be YYYY-MM-DD, got: {s}"))
}

/// The `today` param pins date arithmetic for callers and tests; wall clock
/// otherwise.
pub fn today_param(params: &Value) -> Result<NaiveDate, String> {
    Ok(opt_date(params, "today")?.unwrap_or_else(|| chrono::Local::now().date_naive()))
}
