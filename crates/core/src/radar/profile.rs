use crate::domain::asset::{AssetClass, EQUITY_CATEGORY};
use crate::domain::indices::IndexKind;
use crate::domain::radar::RadarRecord;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Keep every fetched record.
    Full,
    /// Keep only records flagged `comprar`. Progress still counts every candidate.
    BuyOnly,
}

impl ScanMode {
    pub fn retains(&self, record: &RadarRecord) -> bool {
        match self {
            ScanMode::Full => true,
            ScanMode::BuyOnly => record.comprar,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueFormat {
    Currency,
    Percent,
    Plain,
}

/// What a column's value is compared against.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    None,
    Constant(f64),
    /// Another field of the same record, e.g. a ceiling price against `cotacao`.
    Field(&'static str),
    Index(IndexKind),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnKind {
    Ticker,
    Metric {
        field: &'static str,
        format: ValueFormat,
        reference: Reference,
    },
    /// The backend's `comprar` flag: "Sim" favourable or "-" unfavourable.
    BuyFlag,
    /// Equity verdict for buy-flagged records: "Talvez" when the price is above the earnings
    /// ceiling, else "Sim". Records without `comprar` show "-" like [`ColumnKind::BuyFlag`].
    EquityVerdict,
    /// Free text from the record's extra fields (e.g. fund `tipo`).
    Text { field: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub id: &'static str,
    pub header: &'static str,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    fn ticker() -> Self {
        Self {
            id: "ticker",
            header: "Ativo",
            kind: ColumnKind::Ticker,
        }
    }

    fn metric(
        field: &'static str,
        header: &'static str,
        format: ValueFormat,
        reference: Reference,
    ) -> Self {
        Self {
            id: field,
            header,
            kind: ColumnKind::Metric {
                field,
                format,
                reference,
            },
        }
    }
}

/// Per-asset-class radar configuration: which valuation endpoint, which columns and references,
/// and which records stay visible.
#[derive(Debug, Clone)]
pub struct RadarProfile {
    pub asset_class: AssetClass,
    pub title: &'static str,
    pub columns: Vec<ColumnSpec>,
    pub detail_fields: Vec<ColumnSpec>,
    pub mode: ScanMode,
}

impl RadarProfile {
    pub fn acoes() -> Self {
        use Reference::{Constant, Field, Index};
        use ValueFormat::{Currency, Percent, Plain};

        let juros = Index(IndexKind::JurosReais);
        Self {
            asset_class: AssetClass::Acoes,
            title: "Radar Ações",
            columns: vec![
                ColumnSpec::ticker(),
                ColumnSpec::metric("cotacao", "Cotação", Currency, Reference::None),
                ColumnSpec::metric("teto_por_lucro", "Cotação/Lucro", Currency, Field("cotacao")),
                ColumnSpec::metric("valor_teto_por_dy", "Valor Teto DY", Currency, Field("cotacao")),
                ColumnSpec::metric("dy_estimado", "DY Estimado", Percent, juros.clone()),
                ColumnSpec::metric("rendimento_real", "Rendimento Real", Percent, Constant(0.0)),
                ColumnSpec::metric("potencial", "Potencial", Percent, Constant(0.0)),
                ColumnSpec::metric("earning_yield", "Earning Yield", Percent, juros.clone()),
                ColumnSpec::metric("nota_risco", "Nota Risco", Plain, Constant(5.0)),
                ColumnSpec::metric("score", "Score", Plain, Constant(5.0)),
                ColumnSpec {
                    id: "comprar",
                    header: "Comprar",
                    kind: ColumnKind::EquityVerdict,
                },
            ],
            detail_fields: vec![
                ColumnSpec {
                    id: "comprar",
                    header: "Comprar",
                    kind: ColumnKind::BuyFlag,
                },
                ColumnSpec::metric("nota_risco", "Nota de Risco", Plain, Constant(5.0)),
                ColumnSpec::metric("score", "Score", Plain, Constant(5.0)),
                ColumnSpec::metric("cotacao", "Cotação", Currency, Field("teto_por_lucro")),
                ColumnSpec::metric("teto_por_lucro", "Teto por Lucro", Currency, Field("cotacao")),
                ColumnSpec::metric("valor_teto_por_dy", "Teto por DY", Currency, Field("cotacao")),
                ColumnSpec::metric("dy_estimado", "DY Estimado", Percent, juros.clone()),
                ColumnSpec::metric("rendimento_real", "Rendimento Real", Percent, Constant(0.0)),
                ColumnSpec::metric("potencial", "Potencial", Percent, Constant(0.0)),
                ColumnSpec::metric("earning_yield", "Earning Yield", Percent, juros),
            ],
            mode: ScanMode::Full,
        }
    }

    pub fn fii() -> Self {
        use Reference::{Constant, Field, Index};
        use ValueFormat::{Currency, Percent, Plain};

        let spread = Index(IndexKind::Spread);
        Self {
            asset_class: AssetClass::Fii,
            title: "Radar FIIs",
            columns: vec![
                ColumnSpec::ticker(),
                ColumnSpec::metric("cotacao", "Cotação", Currency, Reference::None),
                ColumnSpec::metric("vpa", "Valor Patrimonial", Currency, Field("cotacao")),
                ColumnSpec::metric("teto_div", "Valor Teto por DY", Currency, Field("cotacao")),
                ColumnSpec::metric("dy_estimado", "DY", Percent, spread.clone()),
                ColumnSpec::metric("rendimento_real", "Rendimento Real", Percent, spread.clone()),
                ColumnSpec::metric("potencial", "Potencial", Percent, Constant(0.0)),
                ColumnSpec::metric("nota_risco", "Nota Risco", Plain, Constant(5.0)),
                ColumnSpec::metric("score", "Score", Plain, Constant(5.0)),
                ColumnSpec {
                    id: "comprar",
                    header: "Comprar",
                    kind: ColumnKind::BuyFlag,
                },
            ],
            detail_fields: vec![
                ColumnSpec {
                    id: "comprar",
                    header: "Comprar",
                    kind: ColumnKind::BuyFlag,
                },
                ColumnSpec::metric("nota_risco", "Nota de Risco", Plain, Constant(5.0)),
                ColumnSpec::metric("score", "Score", Plain, Constant(5.0)),
                ColumnSpec::metric("cotacao", "Cotação", Currency, Field("teto_div")),
                ColumnSpec::metric("vpa", "Valor Patrimonial", Currency, Field("cotacao")),
                ColumnSpec::metric("teto_div", "Teto por DY", Currency, Field("cotacao")),
                ColumnSpec::metric("dy_estimado", "DY Estimado", Percent, spread.clone()),
                ColumnSpec::metric("rendimento_real", "Rendimento Real", Percent, spread),
                ColumnSpec::metric("potencial", "Potencial", Percent, Constant(0.0)),
                ColumnSpec {
                    id: "tipo",
                    header: "Tipo",
                    kind: ColumnKind::Text { field: "tipo" },
                },
            ],
            mode: ScanMode::Full,
        }
    }

    pub fn for_class(class: AssetClass) -> Self {
        match class {
            AssetClass::Acoes => Self::acoes(),
            AssetClass::Fii => Self::fii(),
        }
    }

    pub fn with_mode(mut self, mode: ScanMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn column(&self, id: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.id == id)
    }

    /// Categories this radar scans, given everything the backend knows about.
    pub fn categories(&self, all: &[String]) -> Vec<String> {
        match self.asset_class {
            AssetClass::Acoes => vec![EQUITY_CATEGORY.to_string()],
            AssetClass::Fii => all
                .iter()
                .filter(|c| AssetClass::of_category(c) == AssetClass::Fii)
                .cloned()
                .collect(),
        }
    }

    pub fn empty_message(&self) -> &'static str {
        match (self.asset_class, self.mode) {
            (AssetClass::Acoes, ScanMode::BuyOnly) => "Sem ativos bons no momento.",
            (AssetClass::Fii, ScanMode::BuyOnly) => "Nenhum FII recomendado no momento.",
            (_, ScanMode::Full) => "Nenhum dado carregado.",
        }
    }

    pub fn progress_label(&self) -> &'static str {
        match (self.asset_class, self.mode) {
            (AssetClass::Acoes, ScanMode::BuyOnly) => "Procurando Ações para Compra",
            (AssetClass::Fii, ScanMode::BuyOnly) => "Procurando FIIs para Compra",
            (_, ScanMode::Full) => "Ativos Carregados",
        }
    }
}
