use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// A numeric field as the backend sent it.
///
/// The backend may omit a field, send `null`, a number, a numeric string, or something else
/// entirely. The raw JSON is kept for display; [`Metric::value`] only yields finite numbers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metric(Value);

impl Metric {
    pub fn missing() -> Self {
        Self(Value::Null)
    }

    pub fn from_json(v: Value) -> Self {
        Self(v)
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }

    pub fn is_missing(&self) -> bool {
        self.0.is_null()
    }

    pub fn value(&self) -> Option<f64> {
        parse_finite(&self.0)
    }
}

impl From<f64> for Metric {
    fn from(v: f64) -> Self {
        // serde_json maps NaN/inf to null.
        Self(Value::from(v))
    }
}

impl From<Option<f64>> for Metric {
    fn from(v: Option<f64>) -> Self {
        v.map(Metric::from).unwrap_or_default()
    }
}

impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Metric {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Metric)
    }
}

pub fn parse_finite(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                return None;
            }
            t.parse::<f64>().ok()
        }
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    };
    n.filter(|x| x.is_finite())
}

/// JavaScript-style truthiness, used for backend flags such as `comprar`.
pub fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|x| x != 0.0 && !x.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub(crate) fn deserialize_truthy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let v = Value::deserialize(deserializer)?;
    Ok(is_truthy(&v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_numbers_and_numeric_strings() {
        assert_eq!(parse_finite(&json!(12.5)), Some(12.5));
        assert_eq!(parse_finite(&json!(" 7 ")), Some(7.0));
        assert_eq!(parse_finite(&json!("-0.25")), Some(-0.25));
    }

    #[test]
    fn rejects_non_numeric_and_non_finite() {
        assert_eq!(parse_finite(&json!(null)), None);
        assert_eq!(parse_finite(&json!("")), None);
        assert_eq!(parse_finite(&json!("abc")), None);
        assert_eq!(parse_finite(&json!("NaN")), None);
        assert_eq!(parse_finite(&json!("inf")), None);
        assert_eq!(parse_finite(&json!(true)), None);
        assert_eq!(parse_finite(&json!([1])), None);
        assert_eq!(parse_finite(&json!({"v": 1})), None);
        assert_eq!(Metric::from(f64::NAN).value(), None);
    }

    #[test]
    fn truthiness_matches_backend_flags() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!("sim")));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(null)));
    }
}
