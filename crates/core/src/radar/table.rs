use crate::domain::indices::{IndexKind, ReferenceIndex};
use crate::domain::metric::Metric;
use crate::domain::portfolio::compare_missing_last;
use crate::domain::radar::RadarRecord;
use crate::radar::classify::{classify, Signal};
use crate::radar::profile::{ColumnKind, ColumnSpec, RadarProfile, Reference, ValueFormat};
use crate::radar::scanner::ScanProgress;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeSet;

const MISSING: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortState {
    pub column: String,
    pub direction: SortDirection,
}

/// What the user did to the table. Survives appended rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub sort: Option<SortState>,
    pub filter: String,
    pub hidden: BTreeSet<String>,
}

impl ViewState {
    /// Clicking a header: ascending becomes descending, anything else becomes ascending.
    pub fn toggle_sort(&mut self, column: &str) {
        let direction = match &self.sort {
            Some(s) if s.column == column && s.direction == SortDirection::Asc => {
                SortDirection::Desc
            }
            _ => SortDirection::Asc,
        };
        self.sort = Some(SortState {
            column: column.to_string(),
            direction,
        });
    }

    pub fn set_sort(&mut self, column: &str, direction: SortDirection) {
        self.sort = Some(SortState {
            column: column.to_string(),
            direction,
        });
    }

    pub fn set_filter(&mut self, text: impl Into<String>) {
        self.filter = text.into();
    }

    pub fn toggle_column(&mut self, column: &str) {
        if !self.hidden.remove(column) {
            self.hidden.insert(column.to_string());
        }
    }

    fn matches(&self, ticker: &str) -> bool {
        let needle = self.filter.trim();
        needle.is_empty() || ticker.to_uppercase().contains(&needle.to_uppercase())
    }
}

/// A retained record plus where it came from. `seq` is arrival order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScannedRecord {
    pub category: String,
    pub record: RadarRecord,
    pub seq: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellView {
    pub column: &'static str,
    pub text: String,
    pub signal: Option<Signal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnHeader {
    pub id: &'static str,
    pub header: &'static str,
    pub sorted: Option<SortDirection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowView {
    pub ticker: String,
    pub category: String,
    pub cells: Vec<CellView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressView {
    pub processed: usize,
    pub total: usize,
    pub percent: f64,
    pub label: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TableStatus {
    Loading,
    Empty { message: String },
    Failed { message: String },
    Ready,
}

/// Everything a front end needs to draw the radar table at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableView {
    pub title: &'static str,
    pub columns: Vec<ColumnHeader>,
    pub rows: Vec<RowView>,
    pub progress: Option<ProgressView>,
    pub status: TableStatus,
}

impl TableView {
    pub fn row(&self, ticker: &str) -> Option<&RowView> {
        self.rows.iter().find(|r| r.ticker == ticker)
    }
}

impl RowView {
    pub fn cell(&self, column: &str) -> Option<&CellView> {
        self.cells.iter().find(|c| c.column == column)
    }
}

pub struct RenderInput<'a> {
    pub profile: &'a RadarProfile,
    pub records: &'a [ScannedRecord],
    pub indices: Option<&'a ReferenceIndex>,
    pub view: &'a ViewState,
    pub progress: Option<ScanProgress>,
    pub status: TableStatus,
}

pub fn render(input: RenderInput<'_>) -> TableView {
    let RenderInput {
        profile,
        records,
        indices,
        view,
        progress,
        status,
    } = input;

    let visible: Vec<&ColumnSpec> = profile
        .columns
        .iter()
        .filter(|c| !view.hidden.contains(c.id))
        .collect();

    let columns = visible
        .iter()
        .map(|c| ColumnHeader {
            id: c.id,
            header: c.header,
            sorted: view
                .sort
                .as_ref()
                .filter(|s| s.column == c.id)
                .map(|s| s.direction),
        })
        .collect();

    let mut kept: Vec<&ScannedRecord> = records
        .iter()
        .filter(|r| view.matches(&r.record.ticker))
        .collect();
    kept.sort_by_key(|r| r.seq);
    if let Some(sort) = &view.sort {
        if let Some(spec) = profile.column(&sort.column) {
            let ascending = sort.direction == SortDirection::Asc;
            kept.sort_by(|a, b| compare_rows(spec, &a.record, &b.record, ascending, indices));
        }
    }

    let rows = kept
        .into_iter()
        .map(|r| RowView {
            ticker: r.record.ticker.clone(),
            category: r.category.clone(),
            cells: visible
                .iter()
                .map(|c| evaluate(c, &r.record, indices))
                .collect(),
        })
        .collect();

    let progress = progress
        .filter(|p| !p.is_complete())
        .map(|p| ProgressView {
            processed: p.processed,
            total: p.total,
            percent: p.percent(),
            label: profile.progress_label(),
        });

    TableView {
        title: profile.title,
        columns,
        rows,
        progress,
        status,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRow {
    pub header: &'static str,
    pub text: String,
    pub signal: Option<Signal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailView {
    pub ticker: String,
    pub rows: Vec<DetailRow>,
}

/// Single-ticker card: every detail field of the profile, classified like the table cells.
pub fn detail_view(
    profile: &RadarProfile,
    record: &RadarRecord,
    indices: Option<&ReferenceIndex>,
) -> DetailView {
    let rows = profile
        .detail_fields
        .iter()
        .map(|spec| {
            let cell = evaluate(spec, record, indices);
            DetailRow {
                header: spec.header,
                text: cell.text,
                signal: cell.signal,
            }
        })
        .collect();

    DetailView {
        ticker: record.ticker.clone(),
        rows,
    }
}

pub fn evaluate(
    spec: &ColumnSpec,
    record: &RadarRecord,
    indices: Option<&ReferenceIndex>,
) -> CellView {
    let (text, signal) = match &spec.kind {
        ColumnKind::Ticker => (record.ticker.clone(), None),
        ColumnKind::Metric {
            field,
            format,
            reference,
        } => {
            let value = record.metric(field);
            let signal = reference_value(reference, record, indices)
                .map(|r| classify(value.value(), r));
            (format_metric(&value, *format), signal)
        }
        ColumnKind::BuyFlag => {
            if record.comprar {
                ("Sim".to_string(), Some(Signal::Favorable))
            } else {
                ("-".to_string(), Some(Signal::Unfavorable))
            }
        }
        ColumnKind::EquityVerdict if !record.comprar => {
            ("-".to_string(), Some(Signal::Unfavorable))
        }
        ColumnKind::EquityVerdict => {
            let above_ceiling = match classify(
                record.cotacao.value(),
                record.teto_por_lucro.value(),
            ) {
                Signal::Favorable => true,
                Signal::Neutral | Signal::Unfavorable | Signal::Unclassifiable => false,
            };
            if above_ceiling {
                ("Talvez".to_string(), Some(Signal::Neutral))
            } else {
                ("Sim".to_string(), Some(Signal::Favorable))
            }
        }
        ColumnKind::Text { field } => {
            let text = match record.extra.get(*field) {
                Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
                Some(Value::Null) | None => MISSING.to_string(),
                Some(other) => other.to_string(),
            };
            (text, None)
        }
    };

    CellView {
        column: spec.id,
        text,
        signal,
    }
}

/// `None` means "do not classify". `Some(None)` means the reference itself is unusable.
fn reference_value(
    reference: &Reference,
    record: &RadarRecord,
    indices: Option<&ReferenceIndex>,
) -> Option<Option<f64>> {
    match reference {
        Reference::None => None,
        Reference::Constant(c) => Some(Some(*c)),
        Reference::Field(f) => Some(record.metric(f).value()),
        // Indices not loaded yet compare against zero.
        Reference::Index(kind) => Some(match indices {
            Some(idx) => idx.get(*kind),
            None => Some(0.0),
        }),
    }
}

fn compare_rows(
    spec: &ColumnSpec,
    a: &RadarRecord,
    b: &RadarRecord,
    ascending: bool,
    indices: Option<&ReferenceIndex>,
) -> Ordering {
    match &spec.kind {
        ColumnKind::Metric { field, .. } => {
            compare_missing_last(a.metric(field).value(), b.metric(field).value(), ascending)
        }
        ColumnKind::Ticker => directed(a.ticker.cmp(&b.ticker), ascending),
        ColumnKind::BuyFlag | ColumnKind::EquityVerdict | ColumnKind::Text { .. } => {
            let ta = evaluate(spec, a, indices).text;
            let tb = evaluate(spec, b, indices).text;
            directed(ta.cmp(&tb), ascending)
        }
    }
}

fn directed(ord: Ordering, ascending: bool) -> Ordering {
    if ascending {
        ord
    } else {
        ord.reverse()
    }
}

pub fn format_metric(m: &Metric, format: ValueFormat) -> String {
    let Some(v) = m.value() else {
        return match m.raw() {
            Value::String(s) if !s.trim().is_empty() => s.clone(),
            _ => MISSING.to_string(),
        };
    };
    match format {
        ValueFormat::Currency => format!("R$ {v:.2}"),
        ValueFormat::Percent => format!("{}%", plain_number(v)),
        ValueFormat::Plain => plain_number(v),
    }
}

fn plain_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        return format!("{v:.0}");
    }
    let s = format!("{v:.2}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indices::RawIndices;
    use serde_json::json;

    fn equity(ticker: &str, cotacao: f64, teto: f64, risco: f64, score: f64) -> RadarRecord {
        RadarRecord::new(ticker)
            .with_metric("cotacao", cotacao)
            .with_metric("teto_por_lucro", teto)
            .with_metric("nota_risco", risco)
            .with_metric("score", score)
    }

    fn scanned(records: Vec<RadarRecord>) -> Vec<ScannedRecord> {
        records
            .into_iter()
            .enumerate()
            .map(|(seq, record)| ScannedRecord {
                category: "acoes".to_string(),
                record,
                seq,
            })
            .collect()
    }

    fn render_with(
        profile: &RadarProfile,
        records: &[ScannedRecord],
        indices: Option<&ReferenceIndex>,
        view: &ViewState,
    ) -> TableView {
        render(RenderInput {
            profile,
            records,
            indices,
            view,
            progress: None,
            status: TableStatus::Ready,
        })
    }

    fn signal(view: &TableView, ticker: &str, column: &str) -> Option<Signal> {
        view.row(ticker).and_then(|r| r.cell(column)).and_then(|c| c.signal)
    }

    #[test]
    fn ceiling_and_constant_references_classify_per_row() {
        let profile = RadarProfile::acoes();
        let records = scanned(vec![
            equity("AAAA3", 10.0, 12.0, 5.0, 6.0).with_comprar(true),
            equity("BBBB4", 20.0, 15.0, 8.0, 3.0).with_comprar(true),
            equity("CCCC3", 10.0, 12.0, 5.0, 6.0),
        ]);
        let view = render_with(&profile, &records, None, &ViewState::default());

        assert_eq!(view.rows.len(), 3);
        assert_eq!(signal(&view, "AAAA3", "teto_por_lucro"), Some(Signal::Favorable));
        assert_eq!(signal(&view, "BBBB4", "teto_por_lucro"), Some(Signal::Unfavorable));
        assert_eq!(signal(&view, "AAAA3", "nota_risco"), Some(Signal::Neutral));
        assert_eq!(signal(&view, "BBBB4", "score"), Some(Signal::Unfavorable));
        assert_eq!(signal(&view, "AAAA3", "cotacao"), None);

        let verdict = |t: &str| view.row(t).and_then(|r| r.cell("comprar")).map(|c| c.text.clone());
        assert_eq!(verdict("AAAA3").as_deref(), Some("Sim"));
        assert_eq!(signal(&view, "AAAA3", "comprar"), Some(Signal::Favorable));
        assert_eq!(verdict("BBBB4").as_deref(), Some("Talvez"));
        assert_eq!(signal(&view, "BBBB4", "comprar"), Some(Signal::Neutral));
        // Below its ceiling, but the backend does not flag it as a buy.
        assert_eq!(verdict("CCCC3").as_deref(), Some("-"));
        assert_eq!(signal(&view, "CCCC3", "comprar"), Some(Signal::Unfavorable));
    }

    #[test]
    fn fund_buy_flag_is_signalled_both_ways() {
        let profile = RadarProfile::fii();
        let records = scanned(vec![
            RadarRecord::new("MXRF11").with_comprar(true),
            RadarRecord::new("HGLG11"),
        ]);
        let view = render_with(&profile, &records, None, &ViewState::default());

        let flag = |t: &str| view.row(t).and_then(|r| r.cell("comprar")).map(|c| (c.text.clone(), c.signal));
        assert_eq!(flag("MXRF11"), Some(("Sim".to_string(), Some(Signal::Favorable))));
        assert_eq!(flag("HGLG11"), Some(("-".to_string(), Some(Signal::Unfavorable))));
    }

    #[test]
    fn yields_compare_against_the_reference_index() {
        let indices: ReferenceIndex = serde_json::from_value::<RawIndices>(
            json!({"selic_atual": 14.65, "ipca_atual": 5.2}),
        )
        .unwrap()
        .into();

        let profile = RadarProfile::acoes();
        let records = scanned(vec![
            RadarRecord::new("AAAA3").with_metric("dy_estimado", 12.0),
            RadarRecord::new("BBBB4").with_metric("dy_estimado", 6.0),
            RadarRecord::new("CCCC3"),
        ]);
        let view = render_with(&profile, &records, Some(&indices), &ViewState::default());

        assert_eq!(signal(&view, "AAAA3", "dy_estimado"), Some(Signal::Favorable));
        assert_eq!(signal(&view, "BBBB4", "dy_estimado"), Some(Signal::Unfavorable));
        assert_eq!(signal(&view, "CCCC3", "dy_estimado"), Some(Signal::Unclassifiable));

        // Before the indices arrive, yields compare against zero.
        let early = render_with(&profile, &records, None, &ViewState::default());
        assert_eq!(signal(&early, "BBBB4", "dy_estimado"), Some(Signal::Favorable));

        // Loaded but incomplete indices leave the cell unclassifiable.
        let partial = ReferenceIndex::default();
        let view = render_with(&profile, &records, Some(&partial), &ViewState::default());
        assert_eq!(signal(&view, "AAAA3", "dy_estimado"), Some(Signal::Unclassifiable));
    }

    #[test]
    fn formats_values_and_missing_fields() {
        assert_eq!(format_metric(&Metric::from(10.0), ValueFormat::Currency), "R$ 10.00");
        assert_eq!(format_metric(&Metric::from(8.5), ValueFormat::Percent), "8.5%");
        assert_eq!(format_metric(&Metric::from(7.0), ValueFormat::Plain), "7");
        assert_eq!(format_metric(&Metric::from(1.0 / 3.0), ValueFormat::Plain), "0.33");
        assert_eq!(format_metric(&Metric::missing(), ValueFormat::Currency), "N/A");
        assert_eq!(format_metric(&Metric::from_json(json!("n/d")), ValueFormat::Plain), "n/d");
        assert_eq!(format_metric(&Metric::from_json(json!("9.5")), ValueFormat::Percent), "9.5%");
    }

    #[test]
    fn sort_toggle_alternates_and_resets_per_column() {
        let mut view = ViewState::default();
        view.toggle_sort("score");
        assert_eq!(view.sort.as_ref().map(|s| s.direction), Some(SortDirection::Asc));
        view.toggle_sort("score");
        assert_eq!(view.sort.as_ref().map(|s| s.direction), Some(SortDirection::Desc));
        view.toggle_sort("score");
        assert_eq!(view.sort.as_ref().map(|s| s.direction), Some(SortDirection::Asc));
        view.toggle_sort("score");
        view.toggle_sort("cotacao");
        assert_eq!(
            view.sort,
            Some(SortState {
                column: "cotacao".to_string(),
                direction: SortDirection::Asc
            })
        );
    }

    #[test]
    fn numeric_sort_is_stable_and_puts_missing_last() {
        let profile = RadarProfile::acoes();
        let mut records = scanned(vec![
            RadarRecord::new("AAAA3").with_metric("score", 6.0),
            RadarRecord::new("BBBB4"),
            RadarRecord::new("CCCC3").with_metric("score", 3.0),
            RadarRecord::new("DDDD3").with_metric("score", 6.0),
        ]);

        let mut state = ViewState::default();
        state.set_sort("score", SortDirection::Desc);
        let tickers = |v: &TableView| v.rows.iter().map(|r| r.ticker.clone()).collect::<Vec<_>>();

        let view = render_with(&profile, &records, None, &state);
        assert_eq!(tickers(&view), ["AAAA3", "DDDD3", "CCCC3", "BBBB4"]);

        // A record arriving mid-scan slots in without disturbing ties.
        records.push(ScannedRecord {
            category: "acoes".to_string(),
            record: RadarRecord::new("EEEE3").with_metric("score", 6.0),
            seq: 4,
        });
        let view = render_with(&profile, &records, None, &state);
        assert_eq!(tickers(&view), ["AAAA3", "DDDD3", "EEEE3", "CCCC3", "BBBB4"]);

        state.set_sort("score", SortDirection::Asc);
        let view = render_with(&profile, &records, None, &state);
        assert_eq!(tickers(&view), ["CCCC3", "AAAA3", "DDDD3", "EEEE3", "BBBB4"]);
        assert_eq!(
            view.columns.iter().find(|c| c.id == "score").and_then(|c| c.sorted),
            Some(SortDirection::Asc)
        );
    }

    #[test]
    fn filter_and_hidden_columns_apply_to_new_rows() {
        let profile = RadarProfile::fii();
        let records = scanned(vec![
            RadarRecord::new("HGLG11"),
            RadarRecord::new("MXRF11"),
            RadarRecord::new("HGRU11"),
        ]);
        let mut state = ViewState::default();
        state.set_filter("hg");
        state.toggle_column("vpa");

        let view = render_with(&profile, &records, None, &state);
        assert_eq!(view.rows.len(), 2);
        assert!(view.columns.iter().all(|c| c.id != "vpa"));
        assert!(view.rows.iter().all(|r| r.cell("vpa").is_none()));
        assert_eq!(view.rows[0].cells.len(), profile.columns.len() - 1);

        state.toggle_column("vpa");
        let view = render_with(&profile, &records, None, &state);
        assert!(view.columns.iter().any(|c| c.id == "vpa"));
    }

    #[test]
    fn progress_is_shown_only_while_incomplete() {
        let profile = RadarProfile::acoes().with_mode(crate::radar::ScanMode::BuyOnly);
        let state = ViewState::default();
        let mk = |processed, total| {
            render(RenderInput {
                profile: &profile,
                records: &[],
                indices: None,
                view: &state,
                progress: Some(ScanProgress { processed, total }),
                status: TableStatus::Loading,
            })
        };

        let running = mk(1, 4);
        let p = running.progress.unwrap();
        assert_eq!((p.processed, p.total), (1, 4));
        assert_eq!(p.label, "Procurando Ações para Compra");
        assert!(mk(4, 4).progress.is_none());
        assert!(mk(0, 0).progress.is_none());
    }

    #[test]
    fn detail_view_uses_profile_references() {
        let record = RadarRecord::new("HGLG11")
            .with_metric("cotacao", 150.0)
            .with_metric("teto_div", 160.0)
            .with_metric("dy_estimado", 9.0)
            .with_metric("tipo", Metric::from_json(json!("logistica")))
            .with_comprar(true);
        let indices = ReferenceIndex {
            spread_indices: 11.0,
            ..Default::default()
        };
        let detail = detail_view(&RadarProfile::fii(), &record, Some(&indices));

        let row = |h: &str| detail.rows.iter().find(|r| r.header == h).cloned();
        assert_eq!(detail.ticker, "HGLG11");
        assert_eq!(row("Comprar").map(|r| r.text), Some("Sim".to_string()));
        assert_eq!(row("Cotação").and_then(|r| r.signal), Some(Signal::Unfavorable));
        assert_eq!(row("Teto por DY").and_then(|r| r.signal), Some(Signal::Favorable));
        assert_eq!(row("DY Estimado").and_then(|r| r.signal), Some(Signal::Unfavorable));
        assert_eq!(row("Tipo").map(|r| r.text), Some("logistica".to_string()));
        assert_eq!(row("Potencial").map(|r| r.text), Some("N/A".to_string()));
    }
}
