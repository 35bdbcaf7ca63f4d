use crate::domain::metric::Metric;
use serde::{Deserialize, Serialize};

/// Body of `/indices/atualiza`. Older backends send `selic`/`ipca` only.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawIndices {
    #[serde(default)]
    pub selic_atual: Metric,
    #[serde(default)]
    pub selic: Metric,
    #[serde(default)]
    pub ipca_atual: Metric,
    #[serde(default)]
    pub ipca: Metric,
    #[serde(default)]
    pub ipca_media5: Metric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Current Selic minus current IPCA; reference for equity yields.
    JurosReais,
    /// max(5y Selic, 5y IPCA mean); reference for fund yields.
    Spread,
}

/// Macro benchmarks fetched once per radar session and read-only afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceIndex {
    pub selic_atual: Option<f64>,
    pub selic_5anos: Option<f64>,
    pub ipca_atual: Option<f64>,
    pub ipca_5anos: Option<f64>,
    pub juros_reais: Option<f64>,
    pub spread_indices: f64,
}

impl ReferenceIndex {
    pub fn get(&self, kind: IndexKind) -> Option<f64> {
        match kind {
            IndexKind::JurosReais => self.juros_reais,
            IndexKind::Spread => Some(self.spread_indices),
        }
    }
}

impl From<RawIndices> for ReferenceIndex {
    fn from(raw: RawIndices) -> Self {
        let selic_atual = raw.selic_atual.value().or(raw.selic.value());
        let ipca_atual = raw.ipca_atual.value().or(raw.ipca.value());
        let selic_5anos = raw.selic.value();
        let ipca_5anos = raw.ipca_media5.value();

        let juros_reais = match (selic_atual, ipca_atual) {
            (Some(s), Some(i)) => Some(s - i),
            _ => None,
        };
        let spread_indices = selic_5anos.unwrap_or(0.0).max(ipca_5anos.unwrap_or(0.0));

        Self {
            selic_atual,
            selic_5anos,
            ipca_atual,
            ipca_5anos,
            juros_reais,
            spread_indices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn from_json(v: serde_json::Value) -> ReferenceIndex {
        serde_json::from_value::<RawIndices>(v).unwrap().into()
    }

    #[test]
    fn derives_real_interest_from_current_rates() {
        let idx = from_json(json!({"selic_atual": 14.65, "ipca_atual": 5.2}));
        let juros = idx.get(IndexKind::JurosReais).unwrap();
        assert!((juros - 9.45).abs() < 1e-9, "got {juros}");
    }

    #[test]
    fn falls_back_to_legacy_fields() {
        let idx = from_json(json!({"selic": 11.0, "ipca": 4.0, "ipca_media5": 12.5}));
        assert_eq!(idx.selic_atual, Some(11.0));
        assert_eq!(idx.ipca_atual, Some(4.0));
        assert_eq!(idx.juros_reais, Some(7.0));
        assert_eq!(idx.spread_indices, 12.5);
        assert_eq!(idx.ipca_5anos, Some(12.5));
    }

    #[test]
    fn missing_inputs_leave_real_interest_unknown() {
        let idx = from_json(json!({"selic_atual": 14.65}));
        assert_eq!(idx.juros_reais, None);
        assert_eq!(idx.spread_indices, 0.0);
        assert_eq!(idx.get(IndexKind::Spread), Some(0.0));
    }
}
