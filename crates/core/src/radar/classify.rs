use crate::domain::metric::Metric;
use serde::{Deserialize, Serialize};

/// Qualitative verdict for one cell. Higher-than-reference is favourable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Favorable,
    Neutral,
    Unfavorable,
    Unclassifiable,
}

pub fn classify(value: Option<f64>, reference: Option<f64>) -> Signal {
    let (Some(v), Some(r)) = (value, reference) else {
        return Signal::Unclassifiable;
    };
    if !v.is_finite() || !r.is_finite() {
        return Signal::Unclassifiable;
    }

    if v == r {
        Signal::Neutral
    } else if v > r {
        Signal::Favorable
    } else {
        Signal::Unfavorable
    }
}

pub fn classify_metric(value: &Metric, reference: &Metric) -> Signal {
    classify(value.value(), reference.value())
}
