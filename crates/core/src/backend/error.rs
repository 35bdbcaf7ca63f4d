use serde_json::Value;

/// Failures talking to the portfolio backend.
///
/// `Transport` and `NotFound` carry the backend's own `detail`/`message` text verbatim when it
/// sent one.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("{message}")]
    Transport { status: Option<u16>, message: String },

    #[error("{message}")]
    NotFound { category: String, message: String },

    #[error("failed to decode {what} response: {detail}")]
    Decode { what: &'static str, detail: String },
}

impl BackendError {
    /// Unknown category. Without a backend message the text names the category.
    pub fn not_found(category: &str, message: Option<String>) -> Self {
        let category = category.trim().to_string();
        let message = message.unwrap_or_else(|| format!("category not found: {category}"));
        BackendError::NotFound { category, message }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Transport { status, .. } => *status,
            BackendError::NotFound { .. } => Some(404),
            BackendError::Decode { .. } => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound { .. })
    }
}

/// Pulls the human-readable message out of an error body, preferring `detail` over `message`.
pub fn extract_error_message(body: &str) -> Option<String> {
    let v = serde_json::from_str::<Value>(body).ok()?;
    for key in ["detail", "message"] {
        match v.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.clone()),
            Some(Value::Null) | None => continue,
            Some(Value::String(_)) => continue,
            Some(other) => return Some(other.to_string()),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_detail_over_message() {
        let body = r#"{"detail": "Ticker XPTO3 não encontrado", "message": "erro"}"#;
        assert_eq!(
            extract_error_message(body).as_deref(),
            Some("Ticker XPTO3 não encontrado")
        );
    }

    #[test]
    fn falls_back_to_message_then_none() {
        assert_eq!(
            extract_error_message(r#"{"message": "falhou"}"#).as_deref(),
            Some("falhou")
        );
        assert_eq!(extract_error_message(r#"{"other": 1}"#), None);
        assert_eq!(extract_error_message("<html>502</html>"), None);
    }

    #[test]
    fn structured_detail_is_kept_as_json() {
        let body = r#"{"detail": [{"loc": ["query", "ticker"], "msg": "field required"}]}"#;
        let msg = extract_error_message(body).unwrap();
        assert!(msg.contains("field required"));
    }

    #[test]
    fn transport_display_is_the_backend_message() {
        let err = BackendError::Transport {
            status: Some(400),
            message: "Ativo já cadastrado".to_string(),
        };
        assert_eq!(err.to_string(), "Ativo já cadastrado");
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn not_found_keeps_backend_message_or_names_the_category() {
        let err = BackendError::not_found("papel", Some("Categoria papel inexistente".to_string()));
        assert_eq!(err.to_string(), "Categoria papel inexistente");
        assert!(err.is_not_found());
        assert_eq!(err.status(), Some(404));

        let err = BackendError::not_found(" xyz ", None);
        assert_eq!(err.to_string(), "category not found: xyz");
        assert!(matches!(err, BackendError::NotFound { ref category, .. } if category == "xyz"));
    }
}
