use crate::backend::error::{extract_error_message, BackendError};
use crate::backend::{IndicesClient, InventoryClient, ValuationClient};
use crate::config::Settings;
use crate::domain::asset::{normalize_ticker, AssetClass};
use crate::domain::indices::{RawIndices, ReferenceIndex};
use crate::domain::portfolio::{NewTransaction, Position, Transaction};
use crate::domain::radar::RadarRecord;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// REST client for the portfolio backend. One instance is shared by every radar session.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
    carteira_id: i64,
}

impl HttpBackend {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout_secs = std::env::var("BACKEND_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self::new(
            settings.backend_base_url(),
            Duration::from_secs(timeout_secs),
            settings.carteira_id(),
        )
    }

    pub fn new(base_url: &str, timeout: Duration, carteira_id: i64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build backend http client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            carteira_id,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn carteira_id(&self) -> i64 {
        self.carteira_id
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Sends the request and returns the JSON body. Non-2xx responses become
    /// [`BackendError::Transport`] with the backend's message, or `fallback` and the status.
    async fn execute(&self, req: reqwest::RequestBuilder, fallback: &'static str) -> Result<Value> {
        let (status, text) = self.send(req, fallback).await?;
        json_body(status, &text, fallback)
    }

    /// Sends the request and reads the body whatever the status.
    async fn send(
        &self,
        req: reqwest::RequestBuilder,
        fallback: &'static str,
    ) -> Result<(reqwest::StatusCode, String)> {
        let res = req
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|err| BackendError::Transport {
                status: None,
                message: format!("{fallback}: {err}"),
            })?;

        let status = res.status();
        let text = res.text().await.map_err(|err| BackendError::Transport {
            status: Some(status.as_u16()),
            message: format!("{fallback}: failed to read response body: {err}"),
        })?;
        Ok((status, text))
    }

    pub async fn add_asset(&self, category: &str, ticker: &str) -> Result<Value> {
        let ticker = normalize_ticker(ticker);
        let req = self
            .http
            .post(self.url("/indicadores/admin/adicionar"))
            .query(&[("tipo", category.trim()), ("ticker", ticker.as_str())]);
        self.execute(req, "Erro ao adicionar ativo").await
    }

    pub async fn remove_asset(&self, category: &str, ticker: &str) -> Result<Value> {
        let ticker = normalize_ticker(ticker);
        let req = self
            .http
            .delete(self.url("/indicadores/admin/remover"))
            .query(&[("tipo", category.trim()), ("ticker", ticker.as_str())]);
        self.execute(req, "Erro ao remover ativo").await
    }

    pub async fn list_transactions(&self, class: AssetClass) -> Result<Vec<Transaction>> {
        let req = self
            .http
            .get(self.url(&format!("/transacoes/{}/listar", class.as_str())))
            .query(&[("carteira_id", self.carteira_id)]);
        let body = self.execute(req, "Erro ao buscar transações").await?;
        decode_list(body, "transactions")
    }

    pub async fn add_transaction(&self, class: AssetClass, tx: &NewTransaction) -> Result<Value> {
        tx.validate()?;
        let req = self
            .http
            .post(self.url(&format!("/transacoes/{}/adicionar", class.as_str())))
            .query(&tx.query_params(self.carteira_id));
        self.execute(req, "Erro ao adicionar transação").await
    }

    pub async fn update_transaction(
        &self,
        class: AssetClass,
        id: i64,
        tx: &NewTransaction,
    ) -> Result<Value> {
        tx.validate()?;
        let req = self
            .http
            .put(self.url(&format!("/transacoes/{}/atualizar/{id}", class.as_str())))
            .query(&tx.query_params(self.carteira_id));
        self.execute(req, "Erro ao atualizar transação").await
    }

    pub async fn delete_transaction(&self, class: AssetClass, id: i64) -> Result<Value> {
        let req = self
            .http
            .delete(self.url(&format!("/transacoes/{}/deletar/{id}", class.as_str())))
            .query(&[("carteira_id", self.carteira_id)]);
        self.execute(req, "Erro ao deletar transação").await
    }

    pub async fn portfolio_positions(&self, class: AssetClass) -> Result<Vec<Position>> {
        let req = self
            .http
            .get(self.url(&format!("/carteira/{}", class.as_str())))
            .query(&[("carteira_id", self.carteira_id)]);
        let body = self.execute(req, "Erro ao buscar carteira").await?;
        decode_list(body, "portfolio")
    }

    pub async fn portfolio_summary(&self) -> Result<Value> {
        let req = self
            .http
            .get(self.url("/carteira/resumo"))
            .query(&[("carteira_id", self.carteira_id)]);
        self.execute(req, "Erro ao buscar resumo da carteira").await
    }
}

#[async_trait::async_trait]
impl InventoryClient for HttpBackend {
    async fn list_categories(&self) -> Result<Vec<String>> {
        let req = self.http.get(self.url("/indicadores/admin/categorias"));
        let body = self.execute(req, "Erro ao buscar categorias").await?;
        string_list(&body, "categorias")
    }

    async fn list_tickers(&self, category: &str) -> Result<Vec<String>> {
        let category = category.trim();
        let req = self
            .http
            .get(self.url("/indicadores/admin/listar"))
            .query(&[("tipo", category)]);

        let fallback = "Erro ao buscar ativos da categoria";
        let (status, text) = self.send(req, fallback).await?;
        if status == reqwest::StatusCode::NOT_FOUND {
            let err = BackendError::not_found(category, extract_error_message(&text));
            tracing::debug!(%category, message = %err, "backend does not know category");
            return Err(err.into());
        }
        let body = json_body(status, &text, fallback)?;

        string_list(&body, "tickers")
    }
}

#[async_trait::async_trait]
impl ValuationClient for HttpBackend {
    async fn fetch_valuation(&self, class: AssetClass, ticker: &str) -> Result<RadarRecord> {
        let fallback = match class {
            AssetClass::Acoes => "Erro ao buscar radar da ação",
            AssetClass::Fii => "Erro ao buscar radar do FII",
        };
        let req = self
            .http
            .get(self.url(&format!("/{}/radar", class.as_str())))
            .query(&[("ticker", normalize_ticker(ticker))]);
        let body = self.execute(req, fallback).await?;
        decode(body, "radar")
    }
}

#[async_trait::async_trait]
impl IndicesClient for HttpBackend {
    async fn fetch_reference_indices(&self, force: bool) -> Result<ReferenceIndex> {
        let req = self
            .http
            .get(self.url("/indices/atualiza"))
            .query(&[("force", force)]);
        let body = self.execute(req, "Erro ao buscar índices").await?;
        let raw: RawIndices = decode(body, "indices")?;
        Ok(raw.into())
    }
}

fn json_body(status: reqwest::StatusCode, text: &str, fallback: &'static str) -> Result<Value> {
    if !status.is_success() {
        let message =
            extract_error_message(text).unwrap_or_else(|| format!("{fallback} (HTTP {status})"));
        tracing::debug!(http_status = %status, %message, "backend returned error");
        return Err(BackendError::Transport {
            status: Some(status.as_u16()),
            message,
        }
        .into());
    }

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str::<Value>(text).map_err(|err| {
        BackendError::Decode {
            what: fallback,
            detail: err.to_string(),
        }
        .into()
    })
}

fn decode<T: DeserializeOwned>(body: Value, what: &'static str) -> Result<T> {
    serde_json::from_value::<T>(body).map_err(|err| {
        BackendError::Decode {
            what,
            detail: err.to_string(),
        }
        .into()
    })
}

fn decode_list<T: DeserializeOwned>(body: Value, what: &'static str) -> Result<Vec<T>> {
    if body.is_null() {
        return Ok(Vec::new());
    }
    decode(body, what)
}

/// Reads `{"<key>": ["A", "B"]}`. A missing key or `null` is an empty list.
fn string_list(body: &Value, key: &'static str) -> Result<Vec<String>> {
    let list = match body {
        Value::Array(_) => body,
        Value::Object(obj) => match obj.get(key) {
            Some(v) if !v.is_null() => v,
            _ => return Ok(Vec::new()),
        },
        Value::Null => return Ok(Vec::new()),
        other => {
            return Err(BackendError::Decode {
                what: key,
                detail: format!("expected object or array, got {other}"),
            }
            .into())
        }
    };

    let items = list.as_array().ok_or_else(|| BackendError::Decode {
        what: key,
        detail: format!("expected array, got {list}"),
    })?;

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item.as_str() {
            Some(s) if !s.trim().is_empty() => out.push(s.trim().to_string()),
            Some(_) => {}
            None => {
                return Err(BackendError::Decode {
                    what: key,
                    detail: format!("expected string items, got {item}"),
                }
                .into())
            }
        }
    }
    Ok(out)
}
