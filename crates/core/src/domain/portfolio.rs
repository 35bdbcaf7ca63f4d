use crate::domain::metric::Metric;
use anyhow::{bail, ensure};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeKind {
    Compra,
    Venda,
}

impl TradeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeKind::Compra => "compra",
            TradeKind::Venda => "venda",
        }
    }
}

impl fmt::Display for TradeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compra" | "buy" => Ok(TradeKind::Compra),
            "venda" | "sell" => Ok(TradeKind::Venda),
            other => Err(format!("unknown trade kind {other:?} (expected compra or venda)")),
        }
    }
}

/// A recorded buy/sell, as listed by `/transacoes/{acoes|fii}/listar`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub ticker: String,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub tipo: String,
    #[serde(default)]
    pub preco: Metric,
    #[serde(default)]
    pub quantidade: Metric,
    #[serde(default)]
    pub valor_total: Metric,
}

/// Input for adding or updating a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub ticker: String,
    pub quantidade: f64,
    pub preco: f64,
    pub tipo: TradeKind,
    pub data: NaiveDate,
}

impl NewTransaction {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.ticker.trim().is_empty(), "ticker must be non-empty");
        ensure!(
            self.quantidade.is_finite() && self.quantidade > 0.0,
            "quantidade must be positive (got {})",
            self.quantidade
        );
        ensure!(
            self.preco.is_finite() && self.preco > 0.0,
            "preco must be positive (got {})",
            self.preco
        );
        Ok(())
    }

    /// Query parameters in the order the backend documents them. Dates go as `dd/mm/yyyy`.
    pub fn query_params(&self, carteira_id: i64) -> Vec<(&'static str, String)> {
        vec![
            ("ticker", crate::domain::asset::normalize_ticker(&self.ticker)),
            ("quantidade", self.quantidade.to_string()),
            ("preco", self.preco.to_string()),
            ("tipo", self.tipo.as_str().to_string()),
            ("carteira_id", carteira_id.to_string()),
            ("data", self.data.format("%d/%m/%Y").to_string()),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "COMPRAR ou APORTAR")]
    Comprar,
    #[serde(rename = "MANTER com cautela")]
    Manter,
    #[serde(rename = "VENDER")]
    Vender,
}

impl Recommendation {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "COMPRAR ou APORTAR" => Some(Recommendation::Comprar),
            "MANTER com cautela" => Some(Recommendation::Manter),
            "VENDER" => Some(Recommendation::Vender),
            _ => None,
        }
    }
}

/// One holding from `/carteira/acoes` or `/carteira/fii`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub ticker: String,
    #[serde(default)]
    pub quantidade: Metric,
    #[serde(default)]
    pub preco_medio: Metric,
    #[serde(default)]
    pub preco_atual: Metric,
    #[serde(default)]
    pub variacao: Metric,
    #[serde(default)]
    pub valor_investido: Metric,
    #[serde(default)]
    pub saldo: Metric,
    #[serde(default)]
    pub recomendacao: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Position {
    pub fn recommendation(&self) -> Option<Recommendation> {
        self.recomendacao.as_deref().and_then(Recommendation::parse)
    }

    pub fn metric(&self, field: &str) -> Metric {
        match field {
            "quantidade" => self.quantidade.clone(),
            "preco_medio" => self.preco_medio.clone(),
            "preco_atual" => self.preco_atual.clone(),
            "variacao" => self.variacao.clone(),
            "valor_investido" => self.valor_investido.clone(),
            "saldo" => self.saldo.clone(),
            other => self
                .extra
                .get(other)
                .cloned()
                .map(Metric::from_json)
                .unwrap_or_default(),
        }
    }
}

/// Sorts holdings by a column. `recomendacao` sorts buy → hold → sell; `ticker` alphabetically;
/// anything else numerically with missing values last.
pub fn sort_positions(positions: &mut [Position], key: &str, ascending: bool) -> anyhow::Result<()> {
    if key.trim().is_empty() {
        bail!("sort key must be non-empty");
    }

    positions.sort_by(|a, b| {
        let ord = match key {
            "ticker" => a.ticker.cmp(&b.ticker),
            "recomendacao" => rank(a.recommendation()).cmp(&rank(b.recommendation())),
            field => {
                return compare_missing_last(a.metric(field).value(), b.metric(field).value(), ascending)
            }
        };
        if ascending {
            ord
        } else {
            ord.reverse()
        }
    });
    Ok(())
}

fn rank(r: Option<Recommendation>) -> u8 {
    match r {
        Some(Recommendation::Comprar) => 0,
        Some(Recommendation::Manter) => 1,
        Some(Recommendation::Vender) => 2,
        None => 3,
    }
}

pub(crate) fn compare_missing_last(a: Option<f64>, b: Option<f64>, ascending: bool) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => {
            let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            if ascending {
                ord
            } else {
                ord.reverse()
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn position(ticker: &str, saldo: Option<f64>, rec: &str) -> Position {
        Position {
            ticker: ticker.to_string(),
            saldo: saldo.into(),
            recomendacao: Some(rec.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn sorts_by_recommendation_order() {
        let mut ps = vec![
            position("C", None, "VENDER"),
            position("A", None, "MANTER com cautela"),
            position("B", None, "COMPRAR ou APORTAR"),
        ];
        sort_positions(&mut ps, "recomendacao", true).unwrap();
        let tickers: Vec<_> = ps.iter().map(|p| p.ticker.as_str()).collect();
        assert_eq!(tickers, ["B", "A", "C"]);

        sort_positions(&mut ps, "recomendacao", false).unwrap();
        assert_eq!(ps[0].ticker, "C");
    }

    #[test]
    fn numeric_sort_keeps_missing_last_both_ways() {
        let mut ps = vec![
            position("A", None, "VENDER"),
            position("B", Some(10.0), "VENDER"),
            position("C", Some(5.0), "VENDER"),
        ];
        sort_positions(&mut ps, "saldo", true).unwrap();
        assert_eq!(ps.iter().map(|p| p.ticker.as_str()).collect::<Vec<_>>(), ["C", "B", "A"]);
        sort_positions(&mut ps, "saldo", false).unwrap();
        assert_eq!(ps.iter().map(|p| p.ticker.as_str()).collect::<Vec<_>>(), ["B", "C", "A"]);
    }

    #[test]
    fn new_transaction_query_uses_backend_formats() {
        let tx = NewTransaction {
            ticker: "vale3".to_string(),
            quantidade: 10.0,
            preco: 61.5,
            tipo: "COMPRA".parse().unwrap(),
            data: NaiveDate::from_ymd_opt(2025, 3, 7).unwrap(),
        };
        tx.validate().unwrap();
        let q = tx.query_params(1);
        assert!(q.contains(&("ticker", "VALE3".to_string())));
        assert!(q.contains(&("tipo", "compra".to_string())));
        assert!(q.contains(&("data", "07/03/2025".to_string())));
        assert!(q.contains(&("preco", "61.5".to_string())));
    }

    #[test]
    fn rejects_non_positive_quantities() {
        let tx = NewTransaction {
            ticker: "VALE3".to_string(),
            quantidade: 0.0,
            preco: 10.0,
            tipo: TradeKind::Venda,
            data: NaiveDate::from_ymd_opt(2025, 3, 7).unwrap(),
        };
        assert!(tx.validate().is_err());
    }

    #[test]
    fn decodes_fund_position_extras() {
        let p: Position = serde_json::from_value(json!({
            "ticker": "HGLG11",
            "quantidade": 3,
            "preco_medio": 150.0,
            "pvp": 0.95,
            "recomendacao": "MANTER com cautela"
        }))
        .unwrap();
        assert_eq!(p.metric("pvp").value(), Some(0.95));
        assert_eq!(p.recommendation(), Some(Recommendation::Manter));
    }
}
