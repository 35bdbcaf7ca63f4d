use crate::domain::metric::{deserialize_truthy, Metric};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Valuation snapshot for one ticker, as returned by `/acoes/radar` or `/fii/radar`.
///
/// Equities carry `teto_por_lucro`/`valor_teto_por_dy`/`earning_yield`; funds carry
/// `vpa`/`teto_div`. Fields the backend adds later land in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RadarRecord {
    pub ticker: String,
    #[serde(default)]
    pub cotacao: Metric,
    #[serde(default)]
    pub teto_por_lucro: Metric,
    #[serde(default)]
    pub valor_teto_por_dy: Metric,
    #[serde(default)]
    pub vpa: Metric,
    #[serde(default)]
    pub teto_div: Metric,
    #[serde(default)]
    pub dy_estimado: Metric,
    #[serde(default)]
    pub rendimento_real: Metric,
    #[serde(default)]
    pub potencial: Metric,
    #[serde(default)]
    pub earning_yield: Metric,
    #[serde(default)]
    pub nota_risco: Metric,
    #[serde(default)]
    pub score: Metric,
    #[serde(default, deserialize_with = "deserialize_truthy")]
    pub comprar: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl RadarRecord {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            ..Default::default()
        }
    }

    /// Field lookup by backend name. Unknown names fall back to `extra`.
    pub fn metric(&self, field: &str) -> Metric {
        let m = match field {
            "cotacao" => &self.cotacao,
            "teto_por_lucro" => &self.teto_por_lucro,
            "valor_teto_por_dy" => &self.valor_teto_por_dy,
            "vpa" => &self.vpa,
            "teto_div" => &self.teto_div,
            "dy_estimado" => &self.dy_estimado,
            "rendimento_real" => &self.rendimento_real,
            "potencial" => &self.potencial,
            "earning_yield" => &self.earning_yield,
            "nota_risco" => &self.nota_risco,
            "score" => &self.score,
            other => {
                return self
                    .extra
                    .get(other)
                    .cloned()
                    .map(Metric::from_json)
                    .unwrap_or_default()
            }
        };
        m.clone()
    }

    pub fn with_metric(mut self, field: &str, value: impl Into<Metric>) -> Self {
        let value = value.into();
        match field {
            "cotacao" => self.cotacao = value,
            "teto_por_lucro" => self.teto_por_lucro = value,
            "valor_teto_por_dy" => self.valor_teto_por_dy = value,
            "vpa" => self.vpa = value,
            "teto_div" => self.teto_div = value,
            "dy_estimado" => self.dy_estimado = value,
            "rendimento_real" => self.rendimento_real = value,
            "potencial" => self.potencial = value,
            "earning_yield" => self.earning_yield = value,
            "nota_risco" => self.nota_risco = value,
            "score" => self.score = value,
            other => {
                self.extra.insert(other.to_string(), value.raw().clone());
            }
        }
        self
    }

    pub fn with_comprar(mut self, comprar: bool) -> Self {
        self.comprar = comprar;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_partial_records_without_error() {
        let v = json!({
            "ticker": "AAAA3",
            "cotacao": 10,
            "teto_por_lucro": "12.0",
            "dy_estimado": null,
            "score": "n/d",
            "comprar": 1,
            "setor": "energia"
        });

        let r: RadarRecord = serde_json::from_value(v).unwrap();
        assert_eq!(r.ticker, "AAAA3");
        assert_eq!(r.cotacao.value(), Some(10.0));
        assert_eq!(r.teto_por_lucro.value(), Some(12.0));
        assert!(r.dy_estimado.is_missing());
        assert_eq!(r.score.value(), None);
        assert!(!r.score.is_missing());
        assert!(r.potencial.is_missing());
        assert!(r.comprar);
        assert_eq!(r.metric("setor").raw(), &json!("energia"));
    }

    #[test]
    fn missing_comprar_is_false() {
        let r: RadarRecord = serde_json::from_value(json!({"ticker": "HGLG11"})).unwrap();
        assert!(!r.comprar);
        assert!(r.metric("nao_existe").is_missing());
    }
}
