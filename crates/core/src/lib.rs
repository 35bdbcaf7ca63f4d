pub mod backend;
pub mod domain;
pub mod radar;

pub mod config {
    use anyhow::Context;

    pub const DEFAULT_BACKEND_BASE_URL: &str = "http://localhost:8000";
    pub const DEFAULT_CARTEIRA_ID: i64 = 1;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub backend_base_url: Option<String>,
        pub carteira_id: Option<i64>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let carteira_id = match std::env::var("CARTEIRA_ID") {
                Ok(s) => Some(
                    s.trim()
                        .parse::<i64>()
                        .with_context(|| format!("CARTEIRA_ID must be an integer (got {s:?})"))?,
                ),
                Err(_) => None,
            };

            Ok(Self {
                backend_base_url: std::env::var("BACKEND_BASE_URL")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                carteira_id,
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn backend_base_url(&self) -> &str {
            self.backend_base_url
                .as_deref()
                .unwrap_or(DEFAULT_BACKEND_BASE_URL)
        }

        pub fn carteira_id(&self) -> i64 {
            self.carteira_id.unwrap_or(DEFAULT_CARTEIRA_ID)
        }
    }
}
