use serde_json::Value;

pub fn mean(data: &[f64]) -> Option<f64> {
    let sum = data.iter().sum::<f64>();
    let count = data.len();

    match count {
        positive if positive > 0 => Some(sum / count as f64),
        _ => None,
    }
}

/// Safe numeric parse: finite numbers and numeric strings, everything else is absent.
pub fn finite(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// First key of `keys` present (and not null) on `value`.
pub fn probe<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let obj = value.as_object()?;
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

/// First numeric field among `keys`.
pub fn probe_finite(value: &Value, keys: &[&str]) -> Option<f64> {
    let obj = value.as_object()?;
    keys.iter().filter_map(|k| obj.get(*k)).find_map(finite)
}

/// Scalar as text: strings as-is, numbers formatted, everything else absent.
pub fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
