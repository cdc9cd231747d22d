use std::collections::VecDeque;
use std::io;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::{Diagnostic, IntoDiagnostic};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Bar, BarChart, BarGroup, Block, Borders, Cell, Paragraph, Row, Table, Tabs, Wrap,
};

use crate::chart::ChartOutcome;
use crate::dashboard::{self, Dashboard, Panel, PanelContent, Tab, UnitTable};
use crate::domain::{Aggregate, Orientation};
use crate::error::PainelError;
use crate::filter::{FilterStage, StageView};
use crate::remote::RemoteSource;
use crate::session::{ProgressEvent, ProgressSink, Session};

type Term = Terminal<CrosstermBackend<io::Stdout>>;

const EVENTS_MAX: usize = 6;
const SIDEBAR_WIDTH: u16 = 36;
const KEYS: &str = "←/→ filtro  ↑/↓ valor  espaço marcar  c limpar  tab aba  r recarregar  q sair";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    None,
    Quit,
    Reload,
    Toggle(FilterStage, String),
    ClearStage(FilterStage),
}

struct TuiProgress {
    events: Arc<Mutex<VecDeque<String>>>,
}

impl ProgressSink for TuiProgress {
    fn event(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            let message = match event.elapsed {
                Some(elapsed) => format!("{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
                None => event.message,
            };
            push_event(&mut events, message);
        }
    }
}

pub struct Tui {
    events: Arc<Mutex<VecDeque<String>>>,
    tab: usize,
    stage: usize,
    cursor: usize,
    scroll: usize,
    status: String,
}

impl Default for Tui {
    fn default() -> Self {
        Self::new()
    }
}

impl Tui {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            tab: 0,
            stage: 0,
            cursor: 0,
            scroll: 0,
            status: "pronto".to_string(),
        }
    }

    // Setup failures halt on an error screen and are then returned.
    pub fn run<F, R>(&mut self, open: F) -> miette::Result<()>
    where
        F: FnOnce(&dyn ProgressSink) -> Result<Session<R>, PainelError> + Send + 'static,
        R: RemoteSource + Send + 'static,
    {
        let mut terminal = enter_terminal()?;
        let result = self.run_inner(&mut terminal, open);
        leave_terminal(&mut terminal)?;
        result
    }

    fn run_inner<F, R>(&mut self, terminal: &mut Term, open: F) -> miette::Result<()>
    where
        F: FnOnce(&dyn ProgressSink) -> Result<Session<R>, PainelError> + Send + 'static,
        R: RemoteSource + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let sink = self.sink();
        let handle = thread::spawn(move || tx.send(open(&sink)));

        let mut tick = 0usize;
        let opened = loop {
            let events = self.recent_events();
            terminal
                .draw(|frame| draw_loading(frame, &events, tick))
                .into_diagnostic()?;

            if let Ok(result) = rx.try_recv() {
                break result;
            }
            if event::poll(Duration::from_millis(120)).into_diagnostic()? {
                if let Event::Key(key) = event::read().into_diagnostic()? {
                    if key.kind == KeyEventKind::Press
                        && matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
                    {
                        return Err(miette::Report::msg("aborted"));
                    }
                }
            }
            tick = tick.wrapping_add(1);
        };
        handle.join().ok();

        match opened {
            Ok(session) => self.dashboard_loop(terminal, session),
            Err(err) => self.fatal(terminal, err),
        }
    }

    fn dashboard_loop<R: RemoteSource>(
        &mut self,
        terminal: &mut Term,
        mut session: Session<R>,
    ) -> miette::Result<()> {
        let sink = self.sink();
        let mut view = session.dashboard();
        loop {
            terminal
                .draw(|frame| self.draw(frame, &session, &view))
                .into_diagnostic()?;

            if !event::poll(Duration::from_millis(200)).into_diagnostic()? {
                continue;
            }
            let Event::Key(key) = event::read().into_diagnostic()? else {
                continue;
            };
            let changed = match self.handle_key(key, session.outcome().stages.as_slice()) {
                Action::None => false,
                Action::Quit => return Ok(()),
                Action::Reload => {
                    self.status = "recarregando dados...".to_string();
                    terminal
                        .draw(|frame| self.draw(frame, &session, &view))
                        .into_diagnostic()?;
                    if let Err(err) = session.reload(&sink) {
                        return self.fatal(terminal, err);
                    }
                    self.status = "dados recarregados".to_string();
                    true
                }
                Action::Toggle(stage, value) => {
                    self.report(session.toggle(stage, &value).map(|_| ()));
                    true
                }
                Action::ClearStage(stage) => {
                    self.report(session.clear_stage(stage).map(|_| ()));
                    true
                }
            };
            if changed {
                view = session.dashboard();
                self.scroll = 0;
            }
        }
    }

    fn fatal(&self, terminal: &mut Term, err: PainelError) -> miette::Result<()> {
        tracing::error!(error = %err, "dashboard halted");
        let help = err.help().map(|help| help.to_string());
        loop {
            terminal
                .draw(|frame| draw_fatal(frame, &err, help.as_deref()))
                .into_diagnostic()?;
            if event::poll(Duration::from_millis(200)).into_diagnostic()? {
                if let Event::Key(key) = event::read().into_diagnostic()? {
                    if key.kind == KeyEventKind::Press
                        && matches!(key.code, KeyCode::Char('q') | KeyCode::Esc | KeyCode::Enter)
                    {
                        break;
                    }
                }
            }
        }
        Err(miette::Report::new(err))
    }

    fn handle_key(&mut self, key: KeyEvent, stages: &[StageView]) -> Action {
        if key.kind != KeyEventKind::Press {
            return Action::None;
        }
        let options_len = stages.get(self.stage).map(|s| s.options.len()).unwrap_or(0);
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
            KeyCode::Char('r') => Action::Reload,
            KeyCode::Tab => {
                self.tab = (self.tab + 1) % Tab::ALL.len();
                self.scroll = 0;
                Action::None
            }
            KeyCode::BackTab => {
                self.tab = (self.tab + Tab::ALL.len() - 1) % Tab::ALL.len();
                self.scroll = 0;
                Action::None
            }
            KeyCode::Char(c @ '1'..='5') => {
                self.tab = (c as usize) - ('1' as usize);
                self.scroll = 0;
                Action::None
            }
            KeyCode::Left => {
                self.stage = (self.stage + FilterStage::ALL.len() - 1) % FilterStage::ALL.len();
                self.cursor = 0;
                Action::None
            }
            KeyCode::Right => {
                self.stage = (self.stage + 1) % FilterStage::ALL.len();
                self.cursor = 0;
                Action::None
            }
            KeyCode::Up => {
                self.cursor = self.cursor.saturating_sub(1);
                Action::None
            }
            KeyCode::Down => {
                if self.cursor + 1 < options_len {
                    self.cursor += 1;
                }
                Action::None
            }
            KeyCode::PageDown => {
                self.scroll = self.scroll.saturating_add(10);
                Action::None
            }
            KeyCode::PageUp => {
                self.scroll = self.scroll.saturating_sub(10);
                Action::None
            }
            KeyCode::Char(' ') | KeyCode::Enter => stages
                .get(self.stage)
                .and_then(|stage| {
                    stage
                        .options
                        .get(self.cursor)
                        .map(|value| Action::Toggle(stage.stage, value.clone()))
                })
                .unwrap_or(Action::None),
            KeyCode::Char('c') => stages
                .get(self.stage)
                .map(|stage| Action::ClearStage(stage.stage))
                .unwrap_or(Action::None),
            _ => Action::None,
        }
    }

    fn report(&mut self, result: Result<(), PainelError>) {
        if let Err(err) = result {
            tracing::warn!(error = %err, "filter update failed");
            self.status = err.to_string();
        }
    }

    fn sink(&self) -> TuiProgress {
        TuiProgress {
            events: self.events.clone(),
        }
    }

    fn recent_events(&self) -> Vec<String> {
        self.events
            .lock()
            .map(|events| events.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn draw<R: RemoteSource>(
        &self,
        frame: &mut ratatui::Frame,
        session: &Session<R>,
        view: &Dashboard,
    ) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(3),
            ])
            .split(frame.area());

        frame.render_widget(
            draw_header(view, session.config().data_dir.as_str()),
            chunks[0],
        );

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(20)])
            .split(chunks[1]);
        self.draw_sidebar(frame, body[0], session);

        let main = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(4)])
            .split(body[1]);
        let titles: Vec<Line> = Tab::ALL.iter().map(|tab| Line::from(tab.title())).collect();
        let tabs = Tabs::new(titles)
            .select(self.tab)
            .block(Block::default().borders(Borders::ALL))
            .highlight_style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            );
        frame.render_widget(tabs, main[0]);
        if let Some(tab) = view.tabs.get(self.tab) {
            draw_panels(frame, main[1], &tab.panels, self.scroll);
        }

        frame.render_widget(self.draw_footer(view), chunks[2]);
    }

    fn draw_sidebar<R: RemoteSource>(
        &self,
        frame: &mut ratatui::Frame,
        area: Rect,
        session: &Session<R>,
    ) {
        let mut lines = Vec::new();
        for (index, stage) in session.outcome().stages.iter().enumerate() {
            let focused = index == self.stage;
            let summary = if !stage.available {
                "indisponível".to_string()
            } else if stage.explicit {
                format!("{} de {}", stage.selected.len(), stage.options.len())
            } else {
                "todos".to_string()
            };
            let style = if focused {
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            lines.push(Line::from(vec![
                Span::styled(stage.label, style),
                Span::raw(" "),
                Span::styled(format!("({summary})"), Style::default().fg(Color::DarkGray)),
            ]));
            if !focused {
                continue;
            }

            let budget = (area.height as usize).saturating_sub(2 + 2 * FilterStage::ALL.len());
            let start = window_start(self.cursor, budget.max(1));
            for (offset, value) in stage.options.iter().enumerate().skip(start).take(budget.max(1)) {
                let marker = if session.filters().is_picked(stage.stage, value) {
                    "[x]"
                } else {
                    "[ ]"
                };
                let style = if offset == self.cursor {
                    Style::default().fg(Color::Black).bg(Color::Cyan)
                } else {
                    Style::default()
                };
                lines.push(Line::from(Span::styled(format!(" {marker} {value}"), style)));
            }
        }

        let sidebar = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Filtros"))
            .wrap(Wrap { trim: false });
        frame.render_widget(sidebar, area);
    }

    fn draw_footer(&self, view: &Dashboard) -> Paragraph<'static> {
        let mut status = vec![Span::styled(
            self.status.clone(),
            Style::default().fg(Color::Gray),
        )];
        if let Some(diagnostic) = view.diagnostics.first() {
            status.push(Span::raw("   "));
            status.push(Span::styled(
                format!(
                    "{} ({} arquivo(s) com erro)",
                    diagnostic.message,
                    view.diagnostics.len()
                ),
                Style::default().fg(Color::Yellow),
            ));
        } else if let Some(event) = self.recent_events().last() {
            status.push(Span::raw("   "));
            status.push(Span::styled(event.clone(), Style::default().fg(Color::DarkGray)));
        }
        Paragraph::new(vec![
            Line::from(Span::styled(KEYS, Style::default().fg(Color::DarkGray))),
            Line::from(status),
        ])
        .block(Block::default().borders(Borders::TOP))
    }
}

fn enter_terminal() -> miette::Result<Term> {
    let mut stdout = io::stdout();
    enable_raw_mode().into_diagnostic()?;
    stdout.execute(EnterAlternateScreen).into_diagnostic()?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).into_diagnostic()?;
    terminal.clear().into_diagnostic()?;
    Ok(terminal)
}

fn leave_terminal(terminal: &mut Term) -> miette::Result<()> {
    disable_raw_mode().into_diagnostic()?;
    terminal
        .backend_mut()
        .execute(LeaveAlternateScreen)
        .into_diagnostic()?;
    terminal.show_cursor().into_diagnostic()?;
    Ok(())
}

fn draw_header(view: &Dashboard, data_dir: &str) -> Paragraph<'static> {
    let mut title = vec![
        Span::styled(
            "PSH PAINEL",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(env!("CARGO_PKG_VERSION"), Style::default().fg(Color::Gray)),
        Span::raw(format!(
            "   Microbacias selecionadas: {}   Dados: {data_dir}",
            dashboard::format_count(view.selected_units)
        )),
    ];
    if view.fallback {
        title.push(Span::styled(
            "   combinação sem resultados; exibindo o filtro anterior",
            Style::default().fg(Color::Yellow),
        ));
    }
    Paragraph::new(vec![
        Line::from(title),
        Line::from(Span::styled(
            "IDR-Paraná | Programa de Segurança Hídrica",
            Style::default().fg(Color::DarkGray),
        )),
    ])
    .block(Block::default().borders(Borders::BOTTOM))
}

fn draw_loading(frame: &mut ratatui::Frame, events: &[String], tick: usize) {
    let spinner = ["|", "/", "-", "\\"][tick % 4];
    let mut lines = vec![
        Line::from(Span::styled(
            format!("{spinner} Carregando dados..."),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    lines.extend(events.iter().map(|event| Line::from(event.clone())));
    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("PSH Painel"));
    frame.render_widget(paragraph, frame.area());
}

fn draw_fatal(frame: &mut ratatui::Frame, err: &PainelError, help: Option<&str>) {
    let mut lines = vec![
        Line::from(Span::styled(
            "Não foi possível carregar o painel",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(err.to_string()),
    ];
    if let Some(help) = help {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            help.to_string(),
            Style::default().fg(Color::Yellow),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "q para sair",
        Style::default().fg(Color::DarkGray),
    )));
    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Erro"));
    frame.render_widget(paragraph, frame.area());
}

fn draw_panels(frame: &mut ratatui::Frame, area: Rect, panels: &[Panel], scroll: usize) {
    let (metrics, others): (Vec<&Panel>, Vec<&Panel>) = panels
        .iter()
        .partition(|panel| matches!(panel.content, PanelContent::Metric { .. }));

    let mut constraints = Vec::new();
    if !metrics.is_empty() {
        constraints.push(Constraint::Length(3));
    }
    constraints.extend(others.iter().map(|_| Constraint::Ratio(1, others.len() as u32)));
    if constraints.is_empty() {
        return;
    }
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let mut slots = rows.iter().copied();
    if !metrics.is_empty() {
        if let Some(row) = slots.next() {
            let cells = Layout::default()
                .direction(Direction::Horizontal)
                .constraints(metrics.iter().map(|_| Constraint::Ratio(1, metrics.len() as u32)))
                .split(row);
            for (panel, cell) in metrics.iter().zip(cells.iter()) {
                draw_panel(frame, *cell, panel, scroll);
            }
        }
    }
    for (panel, slot) in others.iter().zip(slots) {
        draw_panel(frame, slot, panel, scroll);
    }
}

fn draw_panel(frame: &mut ratatui::Frame, area: Rect, panel: &Panel, scroll: usize) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(panel.title.clone());
    match &panel.content {
        PanelContent::Metric { display, .. } => {
            let text = Paragraph::new(Line::from(Span::styled(
                display.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )))
            .alignment(Alignment::Center)
            .block(block);
            frame.render_widget(text, area);
        }
        PanelContent::Chart { outcome } => draw_chart(frame, area, block, outcome),
        PanelContent::Units { table } => draw_units(frame, area, block, table, scroll),
        PanelContent::Error { message } => {
            let text = Paragraph::new(message.clone())
                .style(Style::default().fg(Color::Red))
                .wrap(Wrap { trim: true })
                .block(block);
            frame.render_widget(text, area);
        }
    }
}

fn draw_chart(frame: &mut ratatui::Frame, area: Rect, block: Block<'_>, outcome: &ChartOutcome) {
    match outcome {
        ChartOutcome::NoData => {
            let text = Paragraph::new("Sem dados para a seleção")
                .style(Style::default().fg(Color::DarkGray))
                .block(block);
            frame.render_widget(text, area);
        }
        ChartOutcome::MissingColumns {
            group_column,
            value_column,
            missing,
        } => {
            let text = Paragraph::new(format!(
                "Colunas ausentes: {} (esperado: {group_column}, {value_column})",
                missing.join(", ")
            ))
            .style(Style::default().fg(Color::Yellow))
            .wrap(Wrap { trim: true })
            .block(block);
            frame.render_widget(text, area);
        }
        ChartOutcome::Chart(spec) => {
            let decimals = if spec.aggregate == Aggregate::Count { 0 } else { 1 };
            let bars: Vec<Bar> = spec
                .bars
                .iter()
                .map(|bar| {
                    Bar::default()
                        .value(bar_height(bar.value))
                        .label(Line::from(bar.category.clone()))
                        .text_value(dashboard::format_decimal(bar.value, decimals))
                })
                .collect();
            let block = block.title_bottom(Line::from(format!(
                "{} × {}",
                spec.category_label, spec.value_label
            )));
            let chart = BarChart::default()
                .block(block)
                .data(BarGroup::default().bars(&bars))
                .bar_gap(1);
            let chart = match spec.orientation {
                Orientation::Horizontal => chart.direction(Direction::Horizontal).bar_width(1),
                Orientation::Vertical => chart.bar_width(vertical_bar_width(area.width, bars.len())),
            };
            frame.render_widget(chart, area);
        }
    }
}

fn draw_units(
    frame: &mut ratatui::Frame,
    area: Rect,
    block: Block<'_>,
    table: &UnitTable,
    scroll: usize,
) {
    if table.columns.is_empty() {
        frame.render_widget(Paragraph::new("Nenhuma coluna").block(block), area);
        return;
    }
    let header = Row::new(table.columns.iter().map(|name| Cell::from(name.clone())))
        .style(Style::default().add_modifier(Modifier::BOLD));
    let rows = table
        .rows
        .iter()
        .skip(scroll.min(table.rows.len().saturating_sub(1)))
        .map(|row| Row::new(row.iter().map(|value| Cell::from(value.clone()))));
    let widths = vec![Constraint::Ratio(1, table.columns.len() as u32); table.columns.len()];
    frame.render_widget(Table::new(rows, widths).header(header).block(block), area);
}

fn bar_height(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.ceil() as u64
    } else {
        0
    }
}

fn vertical_bar_width(width: u16, bars: usize) -> u16 {
    if bars == 0 {
        return 1;
    }
    let inner = width.saturating_sub(2) as usize;
    let per_bar = inner / bars;
    per_bar.saturating_sub(1).clamp(1, 12) as u16
}

fn window_start(cursor: usize, height: usize) -> usize {
    cursor.saturating_sub(height.saturating_sub(1))
}

fn push_event(buffer: &mut VecDeque<String>, item: String) {
    buffer.push_back(item);
    while buffer.len() > EVENTS_MAX {
        buffer.pop_front();
    }
}
