use carteira_core::domain::metric::Metric;
use carteira_core::domain::portfolio::{Position, Recommendation, Transaction};
use carteira_core::radar::table::{format_metric, DetailView, TableView};
use carteira_core::radar::{Signal, SortDirection, TableStatus, ValueFormat};
use crossterm::style::{style, Color as TermColor, Print, Stylize};
use crossterm::terminal::{self, ClearType};
use crossterm::{cursor, execute};
use ratatui::backend::CrosstermBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Span;
use ratatui::widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table, Widget};
use ratatui::{Frame, Terminal};
use std::io::{self, Stdout};

const COLUMN_SPACING: u16 = 2;

fn signal_style(signal: Option<Signal>, color: bool) -> Style {
    let fg = match (signal, color) {
        (_, false) | (None, true) => return Style::default(),
        (Some(Signal::Favorable), true) => Color::Green,
        (Some(Signal::Neutral), true) => Color::Yellow,
        (Some(Signal::Unfavorable), true) => Color::Red,
        (Some(Signal::Unclassifiable), true) => Color::DarkGray,
    };
    Style::default().fg(fg)
}

fn header_style(color: bool) -> Style {
    if color {
        Style::default().add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    }
}

fn marker(signal: Signal) -> char {
    match signal {
        Signal::Favorable => '+',
        Signal::Neutral => '=',
        Signal::Unfavorable => '-',
        Signal::Unclassifiable => '?',
    }
}

#[derive(Debug, Clone)]
struct Entry {
    text: String,
    signal: Option<Signal>,
}

impl Entry {
    fn plain(text: impl Into<String>) -> Self {
        Self::signed(text, None)
    }

    fn signed(text: impl Into<String>, signal: Option<Signal>) -> Self {
        Self {
            text: text.into(),
            signal,
        }
    }

    /// Without colour the signal becomes a trailing marker.
    fn visible(&self, color: bool) -> String {
        match (self.signal, color) {
            (Some(s), false) => format!("{} {}", self.text, marker(s)),
            _ => self.text.clone(),
        }
    }

    fn cell(&self, color: bool) -> Cell<'static> {
        Cell::from(self.visible(color)).style(signal_style(self.signal, color))
    }
}

/// Headers plus rows, laid out by a ratatui [`Table`] sized to its content.
struct Sheet {
    headers: Vec<String>,
    rows: Vec<Vec<Entry>>,
}

impl Sheet {
    fn new(headers: &[&str], rows: Vec<Vec<Entry>>) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    fn widths(&self, color: bool) -> Vec<u16> {
        let width = |text: &str| u16::try_from(Span::raw(text).width()).unwrap_or(u16::MAX);
        let mut widths: Vec<u16> = self.headers.iter().map(|h| width(h)).collect();
        for row in &self.rows {
            for (w, entry) in widths.iter_mut().zip(row) {
                *w = (*w).max(width(&entry.visible(color)));
            }
        }
        widths
    }

    fn table(&self, color: bool) -> Table<'static> {
        let header = Row::new(self.headers.iter().map(|h| Cell::from(h.clone())))
            .style(header_style(color))
            .height(1)
            .bottom_margin(1);
        let rows = self
            .rows
            .iter()
            .map(|r| Row::new(r.iter().map(|e| e.cell(color))).height(1));

        Table::new(rows, self.widths(color).into_iter().map(Constraint::Length))
            .header(header)
            .column_spacing(COLUMN_SPACING)
    }

    /// Off-screen buffer exactly as large as the table.
    fn buffer(&self, color: bool) -> Buffer {
        let widths = self.widths(color);
        let gap_count = u16::try_from(widths.len().saturating_sub(1)).unwrap_or(u16::MAX);
        let gaps = COLUMN_SPACING.saturating_mul(gap_count);
        let width = widths.iter().fold(gaps, |acc, w| acc.saturating_add(*w)).max(1);
        let height = u16::try_from(self.rows.len() + 2).unwrap_or(u16::MAX);

        let area = Rect::new(0, 0, width, height);
        let mut buf = Buffer::empty(area);
        self.table(color).render(area, &mut buf);
        buf
    }

    fn to_text(&self, color: bool) -> String {
        buffer_text(&self.buffer(color), color)
    }
}

/// Writes buffer lines, trailing blanks trimmed, styling each run of equal cells through crossterm.
fn buffer_text(buf: &Buffer, color: bool) -> String {
    let width = usize::from(buf.area.width).max(1);
    let mut out = String::new();
    for line in buf.content.chunks(width) {
        let end = line
            .iter()
            .rposition(|c| c.symbol() != " ")
            .map_or(0, |i| i + 1);

        let mut run = String::new();
        let mut current: Option<(Color, Modifier)> = None;
        for cell in &line[..end] {
            let next = (cell.fg, cell.modifier);
            if current != Some(next) {
                if let Some((fg, modifier)) = current {
                    out.push_str(&paint(&run, fg, modifier, color));
                }
                run.clear();
                current = Some(next);
            }
            run.push_str(cell.symbol());
        }
        if let Some((fg, modifier)) = current {
            out.push_str(&paint(&run, fg, modifier, color));
        }
        out.push('\n');
    }
    out
}

fn paint(text: &str, fg: Color, modifier: Modifier, color: bool) -> String {
    let term = match fg {
        Color::Green => Some(TermColor::Green),
        Color::Yellow => Some(TermColor::Yellow),
        Color::Red => Some(TermColor::Red),
        Color::DarkGray => Some(TermColor::DarkGrey),
        _ => None,
    };
    let bold = modifier.contains(Modifier::BOLD);
    if !color || (term.is_none() && !bold) {
        return text.to_string();
    }

    let mut styled = style(text);
    if let Some(c) = term {
        styled = styled.with(c);
    }
    if bold {
        styled = styled.bold();
    }
    styled.to_string()
}

fn radar_sheet(view: &TableView) -> Sheet {
    let labels: Vec<String> = view
        .columns
        .iter()
        .map(|c| match c.sorted {
            Some(SortDirection::Asc) => format!("{} ↑", c.header),
            Some(SortDirection::Desc) => format!("{} ↓", c.header),
            None => c.header.to_string(),
        })
        .collect();
    let rows = view
        .rows
        .iter()
        .map(|r| {
            r.cells
                .iter()
                .map(|c| Entry::signed(c.text.clone(), c.signal))
                .collect()
        })
        .collect();
    let headers: Vec<&str> = labels.iter().map(String::as_str).collect();
    Sheet::new(&headers, rows)
}

/// Text shown instead of the table, if any.
fn status_message(view: &TableView) -> Option<String> {
    match &view.status {
        TableStatus::Failed { message } => Some(format!("Erro: {message}")),
        TableStatus::Empty { message } => Some(message.to_string()),
        TableStatus::Loading if view.rows.is_empty() => Some("Carregando...".to_string()),
        TableStatus::Loading | TableStatus::Ready => None,
    }
}

pub fn radar_table(view: &TableView, color: bool) -> String {
    let mut out = format!("{}\n\n", paint(view.title, Color::Reset, Modifier::BOLD, color));

    if let Some(message) = status_message(view) {
        out.push_str(&message);
        out.push('\n');
        if !matches!(view.status, TableStatus::Loading) {
            return out;
        }
    }

    if !view.rows.is_empty() {
        out.push_str(&radar_sheet(view).to_text(color));
    }

    if let Some(p) = &view.progress {
        out.push_str(&format!(
            "\n{}: {}/{} ({:.0}%)\n",
            p.label, p.processed, p.total, p.percent
        ));
    }
    out
}

/// One `--live` frame: title, the table (or its status text) and a progress gauge while scanning.
pub fn draw_radar(frame: &mut Frame, view: &TableView, color: bool) {
    let [title_area, body_area, progress_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(3),
        Constraint::Length(3),
    ])
    .areas(frame.area());

    frame.render_widget(
        Paragraph::new(view.title).style(header_style(color)),
        title_area,
    );

    let block = Block::default().borders(Borders::ALL);
    match status_message(view) {
        Some(message) => frame.render_widget(Paragraph::new(message).block(block), body_area),
        None => frame.render_widget(radar_sheet(view).table(color).block(block), body_area),
    }

    if let Some(p) = &view.progress {
        let ratio = if p.total == 0 {
            0.0
        } else {
            (p.processed as f64 / p.total as f64).clamp(0.0, 1.0)
        };
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL))
            .gauge_style(signal_style(Some(Signal::Favorable), color))
            .ratio(ratio)
            .label(progress_line(p.label, p.processed, p.total));
        frame.render_widget(gauge, progress_area);
    }
}

/// Alternate-screen terminal for `--live`. Dropping it restores the normal screen.
pub struct LiveScreen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl LiveScreen {
    pub fn enter() -> io::Result<Self> {
        let mut stdout = io::stdout();
        execute!(stdout, terminal::EnterAlternateScreen)?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        terminal.clear()?;
        Ok(Self { terminal })
    }

    pub fn draw(&mut self, view: &TableView, color: bool) -> io::Result<()> {
        self.terminal.draw(|frame| draw_radar(frame, view, color))?;
        Ok(())
    }
}

impl Drop for LiveScreen {
    fn drop(&mut self) {
        let _ = execute!(self.terminal.backend_mut(), terminal::LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

pub fn progress_line(label: &str, processed: usize, total: usize) -> String {
    format!("{label}: {processed}/{total}")
}

/// Rewrites the current stderr line with the scan progress.
pub fn print_progress(label: &str, processed: usize, total: usize) -> io::Result<()> {
    let mut stderr = io::stderr();
    execute!(
        stderr,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(progress_line(label, processed, total))
    )
}

pub fn detail(view: &DetailView, color: bool) -> String {
    let rows = view
        .rows
        .iter()
        .map(|r| vec![Entry::plain(r.header), Entry::signed(r.text.clone(), r.signal)])
        .collect();
    let sheet = Sheet::new(&["Campo", "Valor"], rows);
    format!("{}\n\n{}", view.ticker, sheet.to_text(color))
}

fn against_zero(m: &Metric) -> Option<Signal> {
    // Zero counts as a gain, as on the portfolio page.
    m.value().map(|v| {
        if v >= 0.0 {
            Signal::Favorable
        } else {
            Signal::Unfavorable
        }
    })
}

pub fn positions(positions: &[Position], color: bool) -> String {
    if positions.is_empty() {
        return "Nenhum ativo na carteira.\n".to_string();
    }

    let rows = positions
        .iter()
        .map(|p| {
            let rec = p.recomendacao.clone().unwrap_or_else(|| "N/A".to_string());
            let rec_signal = p.recommendation().map(|r| match r {
                Recommendation::Comprar => Signal::Favorable,
                Recommendation::Manter => Signal::Neutral,
                Recommendation::Vender => Signal::Unfavorable,
            });
            vec![
                Entry::plain(p.ticker.clone()),
                Entry::plain(format_metric(&p.quantidade, ValueFormat::Plain)),
                Entry::plain(format_metric(&p.preco_medio, ValueFormat::Currency)),
                Entry::plain(format_metric(&p.preco_atual, ValueFormat::Currency)),
                Entry::signed(
                    format_metric(&p.variacao, ValueFormat::Percent),
                    against_zero(&p.variacao),
                ),
                Entry::plain(format_metric(&p.valor_investido, ValueFormat::Currency)),
                Entry::signed(
                    format_metric(&p.saldo, ValueFormat::Currency),
                    against_zero(&p.saldo),
                ),
                Entry::signed(rec, rec_signal),
            ]
        })
        .collect();

    Sheet::new(
        &[
            "Ativo",
            "Quantidade",
            "Preço Médio",
            "Preço Atual",
            "Variação",
            "Investido",
            "Saldo",
            "Recomendação",
        ],
        rows,
    )
    .to_text(color)
}

pub fn transactions(txs: &[Transaction]) -> String {
    if txs.is_empty() {
        return "Nenhuma transação encontrada.\n".to_string();
    }

    let rows = txs
        .iter()
        .map(|t| {
            vec![
                Entry::plain(t.id.to_string()),
                Entry::plain(t.ticker.clone()),
                Entry::plain(t.data.clone()),
                Entry::plain(t.tipo.clone()),
                Entry::plain(format_metric(&t.preco, ValueFormat::Currency)),
                Entry::plain(format_metric(&t.quantidade, ValueFormat::Plain)),
                Entry::plain(format_metric(&t.valor_total, ValueFormat::Currency)),
            ]
        })
        .collect();
    Sheet::new(
        &["ID", "Ativo", "Data", "Tipo", "Preço", "Quantidade", "Total"],
        rows,
    )
    .to_text(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use carteira_core::domain::radar::RadarRecord;
    use carteira_core::radar::{RadarProfile, RadarSession, ScanEvent};
    use ratatui::backend::TestBackend;
    use uuid::Uuid;

    fn session_with(records: Vec<RadarRecord>) -> RadarSession {
        let mut session = RadarSession::new(RadarProfile::acoes());
        session.apply(ScanEvent::Started {
            session_id: Uuid::nil(),
            total: records.len(),
        });
        for record in records {
            session.apply(ScanEvent::Record {
                category: "acoes".to_string(),
                record,
            });
        }
        session
    }

    #[test]
    fn plain_output_marks_signals() {
        let session = session_with(vec![RadarRecord::new("AAAA3")
            .with_metric("cotacao", 10.0)
            .with_metric("teto_por_lucro", 12.0)
            .with_metric("nota_risco", 5.0)
            .with_metric("score", 3.0)]);

        let out = radar_table(&session.render(), false);
        assert!(out.starts_with("Radar Ações"));
        assert!(out.contains("R$ 12.00 +"));
        assert!(out.contains("5 ="));
        assert!(out.contains("3 -"));
        assert!(out.contains("N/A ?"));
        assert!(!out.contains('\x1b'));
        // One record out of one ticker: still scanning until the progress tick.
        assert!(out.contains("Ativos Carregados: 0/1"));
    }

    #[test]
    fn columns_align_and_signals_colour_cells() {
        let sheet = Sheet::new(
            &["A", "B"],
            vec![
                vec![Entry::signed("1", Some(Signal::Favorable)), Entry::plain("x")],
                vec![Entry::plain("long"), Entry::plain("y")],
            ],
        );

        let plain = sheet.to_text(false);
        let lines: Vec<&str> = plain.lines().collect();
        assert_eq!(lines, ["A     B", "", "1 +   x", "long  y"]);

        let buf = sheet.buffer(true);
        let width = usize::from(buf.area.width);
        let first_row = &buf.content[2 * width..3 * width];
        assert_eq!(first_row[0].symbol(), "1");
        assert_eq!(first_row[0].fg, Color::Green);
        assert_eq!(first_row[6].symbol(), "x");
        assert_eq!(first_row[6].fg, Color::Reset);
        assert!(buf.content[0].modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn failed_scan_prints_backend_message() {
        let mut session = RadarSession::new(RadarProfile::fii());
        session.apply(ScanEvent::Failed {
            message: "Erro ao buscar categorias".to_string(),
        });
        let out = radar_table(&session.render(), false);
        assert!(out.contains("Erro: Erro ao buscar categorias"));
        assert!(!out.contains("Carregando"));
    }

    #[test]
    fn live_frame_shows_rows_and_progress_gauge() {
        let session = session_with(vec![RadarRecord::new("AAAA3").with_metric("score", 7.0)]);
        let mut terminal = Terminal::new(TestBackend::new(200, 12)).unwrap();
        terminal
            .draw(|frame| draw_radar(frame, &session.render(), true))
            .unwrap();

        let screen: String = terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(screen.contains("Radar Ações"));
        assert!(screen.contains("AAAA3"));
        assert!(screen.contains("Ativos Carregados: 0/1"));
    }
}
