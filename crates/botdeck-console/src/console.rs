//! Interactive terminal console.
//!
//! The application table and the log panel share the screen; a command line
//! at the bottom takes slash commands with history. Row actions are single
//! keys on the selected row. The configuration editor opens as an overlay.
//!
//! Network calls never run on the UI task: each one is spawned and reports
//! back through an outcome channel drained once per frame.

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

use botdeck_client::{
    ConnectionState, PollingTransport, PushTransport, RestClient, Transport, TransportEvent,
    TransportMode,
};
use botdeck_protocol::{Application, Envelope, FleetAction, Status};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table},
    Frame, Terminal,
};
use tokio::sync::mpsc;

use crate::config::ConsoleConfig;
use crate::dispatch::{Dashboard, EditorSource};
use crate::editor::{AlertKind, EditorError, EditorPhase, InlineAlert, TerminalModal};
use crate::table::{RowAction, RowIntent, TokenDisplay};

/// Result of a spawned network call, delivered back to the UI task.
#[derive(Debug)]
pub enum Outcome {
    /// Application fetched for the editor (poll mode).
    Lookup {
        app_id: String,
        result: Result<Option<Application>, String>,
    },
    /// A configuration submit failed before any verdict arrived.
    SaveFailed(String),
    Failed { context: String, error: String },
    Fleet { action: FleetAction, ack: Envelope },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Table,
    Command,
}

/// The operator console state.
pub struct OperatorConsole {
    dashboard: Dashboard<TerminalModal>,
    transport: Arc<dyn Transport>,
    /// Set in push mode so `/connect` can re-open the socket.
    push: Option<Arc<PushTransport>>,
    outcomes: mpsc::UnboundedSender<Outcome>,
    server_url: String,
    focus: Focus,
    /// Current text in the command line.
    input: String,
    /// Cursor position within the command line, in characters.
    cursor_pos: usize,
    history: Vec<String>,
    history_pos: Option<usize>,
    /// `/shutdown` must be entered twice.
    shutdown_armed: bool,
    quit: bool,
}

impl OperatorConsole {
    pub fn new(
        dashboard: Dashboard<TerminalModal>,
        transport: Arc<dyn Transport>,
        outcomes: mpsc::UnboundedSender<Outcome>,
        server_url: impl Into<String>,
    ) -> Self {
        let mut console = Self {
            dashboard,
            transport,
            push: None,
            outcomes,
            server_url: server_url.into(),
            focus: Focus::Table,
            input: String::new(),
            cursor_pos: 0,
            history: Vec::new(),
            history_pos: None,
            shutdown_armed: false,
            quit: false,
        };
        console.dashboard.report(
            Status::Info,
            "botdeck ready. Keys: s/r/l/x start/restart/reload/stop, e edit, / commands",
        );
        console
    }

    pub fn with_push(mut self, push: Arc<PushTransport>) -> Self {
        self.push = Some(push);
        self
    }

    pub fn dashboard(&self) -> &Dashboard<TerminalModal> {
        &self.dashboard
    }

    pub fn dashboard_mut(&mut self) -> &mut Dashboard<TerminalModal> {
        &mut self.dashboard
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn apply_event(&mut self, event: TransportEvent) {
        self.dashboard.apply(event);
    }

    pub fn apply_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Lookup { app_id, result } => {
                if let Err(error) = &result {
                    self.dashboard.report_error("fetch app", error);
                }
                self.dashboard.editor.finish_open(&app_id, result);
            }
            Outcome::SaveFailed(error) => {
                self.dashboard.report_error("save config", &error);
                self.dashboard.editor.fail_save(&error);
            }
            Outcome::Failed { context, error } => {
                self.dashboard.report_error(&context, &error);
            }
            Outcome::Fleet { action, ack } => {
                let message = ack.message.unwrap_or_else(|| action.route().to_string());
                self.dashboard
                    .report(ack.status, format!("{}: {message}", action.route()));
            }
        }
    }

    // ── Row actions ─────────────────────────────────────────────────────────

    /// Act on a row intent: lifecycle actions go to the transport, Edit
    /// opens the editor.
    pub fn trigger(&mut self, intent: RowIntent) {
        let Some(action) = intent.action.lifecycle() else {
            self.open_editor(&intent.app_id);
            return;
        };

        tracing::info!(app_id = %intent.app_id, %action, "row action");
        let transport = Arc::clone(&self.transport);
        let outcomes = self.outcomes.clone();
        tokio::spawn(async move {
            if let Err(e) = transport.perform_action(&intent.app_id, action).await {
                let _ = outcomes.send(Outcome::Failed {
                    context: format!("{action} {}", intent.app_id),
                    error: e.to_string(),
                });
            }
        });
    }

    fn open_editor(&mut self, app_id: &str) {
        match self.dashboard.open_editor(app_id) {
            Ok(EditorSource::Resolved) => {}
            Ok(EditorSource::Fetch(app_id)) => {
                let transport = Arc::clone(&self.transport);
                let outcomes = self.outcomes.clone();
                tokio::spawn(async move {
                    let result = transport
                        .fetch_app(&app_id)
                        .await
                        .map_err(|e| e.to_string());
                    let _ = outcomes.send(Outcome::Lookup { app_id, result });
                });
            }
            Err(e) => tracing::debug!(error = %e, "editor busy"),
        }
    }

    /// Validate the editor text locally and submit it.
    pub fn save_config(&mut self) {
        let request = match self.dashboard.editor.begin_save() {
            Ok(request) => request,
            Err(EditorError::InvalidJson(reason)) => {
                tracing::debug!(%reason, "config not submitted");
                return;
            }
            Err(e) => {
                tracing::debug!(error = %e, "save ignored");
                return;
            }
        };

        let transport = Arc::clone(&self.transport);
        let outcomes = self.outcomes.clone();
        tokio::spawn(async move {
            if let Err(e) = transport
                .submit_config(&request.app_id, request.config)
                .await
            {
                let _ = outcomes.send(Outcome::SaveFailed(e.to_string()));
            }
        });
    }

    fn spawn_fleet(&mut self, action: FleetAction) {
        let transport = Arc::clone(&self.transport);
        let outcomes = self.outcomes.clone();
        tokio::spawn(async move {
            let outcome = match transport.fleet(action).await {
                Ok(ack) => Outcome::Fleet { action, ack },
                Err(e) => Outcome::Failed {
                    context: action.route().to_string(),
                    error: e.to_string(),
                },
            };
            let _ = outcomes.send(outcome);
        });
    }

    fn spawn_refresh(&mut self) {
        let transport = Arc::clone(&self.transport);
        let outcomes = self.outcomes.clone();
        tokio::spawn(async move {
            if let Err(e) = transport.refresh_all().await {
                let _ = outcomes.send(Outcome::Failed {
                    context: "refresh".to_string(),
                    error: e.to_string(),
                });
            }
        });
    }

    fn spawn_connect(&mut self) {
        let Some(push) = self.push.clone() else {
            self.dashboard
                .report(Status::Warning, "poll mode has no push connection");
            return;
        };
        let outcomes = self.outcomes.clone();
        tokio::spawn(async move {
            if let Err(e) = push.connect().await {
                let _ = outcomes.send(Outcome::Failed {
                    context: "connect".to_string(),
                    error: e.to_string(),
                });
                return;
            }
            if let Err(e) = push.refresh_all().await {
                let _ = outcomes.send(Outcome::Failed {
                    context: "refresh".to_string(),
                    error: e.to_string(),
                });
            }
        });
    }

    // ── Commands ────────────────────────────────────────────────────────────

    /// Process the command line.
    fn process_input(&mut self) {
        let input = self.input.trim().to_string();
        self.input.clear();
        self.cursor_pos = 0;
        if input.is_empty() {
            return;
        }
        self.history.push(input.clone());
        self.history_pos = None;
        self.process_command(&input);
    }

    pub fn process_command(&mut self, cmd: &str) {
        let command = cmd.split_whitespace().next().unwrap_or("");
        if command != "/shutdown" {
            self.shutdown_armed = false;
        }

        match command {
            "/help" => {
                for line in [
                    "Keys (table): Up/Down select, s start, r restart, l reload, x stop, e edit",
                    "              PageUp/PageDown/End scroll the log, / command line, q quit",
                    "Keys (editor): Ctrl+S save, Esc cancel",
                    "  /refresh        - Re-read the application list",
                    "  /reload-config  - Reload the manager's application config",
                    "  /start-all      - Start every application",
                    "  /stop-all       - Stop every application",
                    "  /shutdown       - Stop the bot manager (enter twice)",
                    "  /connect        - Re-open the push connection",
                    "  /quit           - Exit the console",
                ] {
                    self.dashboard.report(Status::Info, line);
                }
            }
            "/refresh" => self.spawn_refresh(),
            "/reload-config" => self.spawn_fleet(FleetAction::ReloadConfig),
            "/start-all" => self.spawn_fleet(FleetAction::StartAll),
            "/stop-all" => self.spawn_fleet(FleetAction::StopAll),
            "/shutdown" => {
                if self.shutdown_armed {
                    self.shutdown_armed = false;
                    self.spawn_fleet(FleetAction::Shutdown);
                } else {
                    self.shutdown_armed = true;
                    self.dashboard.report(
                        Status::Warning,
                        "This stops the bot manager. Enter /shutdown again to confirm.",
                    );
                }
            }
            "/connect" => self.spawn_connect(),
            "/quit" | "/exit" | "/q" => self.quit = true,
            other => {
                self.dashboard.report(
                    Status::Warning,
                    format!("Unknown command: {other}. Type /help for commands."),
                );
            }
        }
    }

    // ── Keyboard ────────────────────────────────────────────────────────────

    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        if code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
            self.quit = true;
            return;
        }
        if self.dashboard.editor.is_active() {
            self.handle_editor_key(code, modifiers);
            return;
        }
        match self.focus {
            Focus::Table => self.handle_table_key(code),
            Focus::Command => self.handle_command_key(code),
        }
    }

    fn handle_table_key(&mut self, code: KeyCode) {
        let page = self.dashboard.log.viewport().max(1);
        match code {
            KeyCode::Up | KeyCode::Char('k') => self.dashboard.table.select_prev(),
            KeyCode::Down | KeyCode::Char('j') => self.dashboard.table.select_next(),
            KeyCode::PageUp => self.dashboard.log.scroll_up(page),
            KeyCode::PageDown => self.dashboard.log.scroll_down(page),
            KeyCode::End => self.dashboard.log.scroll_to_bottom(),
            KeyCode::F(5) => self.spawn_refresh(),
            KeyCode::Enter => self.trigger_selected(RowAction::Edit),
            KeyCode::Char('q') => self.quit = true,
            KeyCode::Char(c @ ('/' | ':')) => {
                self.focus = Focus::Command;
                self.input = if c == '/' { "/".to_string() } else { String::new() };
                self.cursor_pos = self.input.chars().count();
            }
            KeyCode::Char(c) => {
                if let Some(action) = RowAction::from_key(c) {
                    self.trigger_selected(action);
                }
            }
            _ => {}
        }
    }

    fn trigger_selected(&mut self, action: RowAction) {
        match self.dashboard.table.intent(action) {
            Some(intent) => self.trigger(intent),
            None => tracing::debug!(action = action.label(), "no enabled row action"),
        }
    }

    fn handle_command_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.focus = Focus::Table;
                self.input.clear();
                self.cursor_pos = 0;
            }
            KeyCode::Enter => {
                let raw = self.input.trim().to_string();
                self.process_input();
                if !raw.is_empty() {
                    self.focus = Focus::Table;
                }
            }
            KeyCode::Char(c) => {
                let at = byte_index(&self.input, self.cursor_pos);
                self.input.insert(at, c);
                self.cursor_pos += 1;
            }
            KeyCode::Backspace => {
                if self.cursor_pos > 0 {
                    self.cursor_pos -= 1;
                    let at = byte_index(&self.input, self.cursor_pos);
                    self.input.remove(at);
                }
            }
            KeyCode::Delete => {
                if self.cursor_pos < self.input.chars().count() {
                    let at = byte_index(&self.input, self.cursor_pos);
                    self.input.remove(at);
                }
            }
            KeyCode::Left => self.cursor_pos = self.cursor_pos.saturating_sub(1),
            KeyCode::Right => {
                if self.cursor_pos < self.input.chars().count() {
                    self.cursor_pos += 1;
                }
            }
            KeyCode::Home => self.cursor_pos = 0,
            KeyCode::End => self.cursor_pos = self.input.chars().count(),
            KeyCode::Up => {
                if !self.history.is_empty() {
                    let pos = match self.history_pos {
                        Some(p) if p > 0 => p - 1,
                        Some(p) => p,
                        None => self.history.len() - 1,
                    };
                    self.history_pos = Some(pos);
                    self.input = self.history[pos].clone();
                    self.cursor_pos = self.input.chars().count();
                }
            }
            KeyCode::Down => {
                if let Some(pos) = self.history_pos {
                    if pos + 1 < self.history.len() {
                        self.history_pos = Some(pos + 1);
                        self.input = self.history[pos + 1].clone();
                    } else {
                        self.history_pos = None;
                        self.input.clear();
                    }
                    self.cursor_pos = self.input.chars().count();
                }
            }
            _ => {}
        }
    }

    fn handle_editor_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        if code == KeyCode::Esc {
            self.dashboard.editor.cancel();
            return;
        }
        if code == KeyCode::Char('s') && modifiers.contains(KeyModifiers::CONTROL) {
            self.save_config();
            return;
        }
        if self.dashboard.editor.phase() != EditorPhase::Open {
            return;
        }
        let Some(form) = self.dashboard.editor.form_mut() else {
            return;
        };
        let text = &mut form.text;
        match code {
            KeyCode::Char(c) => text.insert_char(c),
            KeyCode::Enter => text.insert_newline(),
            KeyCode::Tab => text.insert_str("    "),
            KeyCode::Backspace => text.backspace(),
            KeyCode::Delete => text.delete(),
            KeyCode::Left => text.move_left(),
            KeyCode::Right => text.move_right(),
            KeyCode::Up => text.move_up(),
            KeyCode::Down => text.move_down(),
            KeyCode::Home => text.home(),
            KeyCode::End => text.end(),
            _ => {}
        }
    }

    // ── Rendering ───────────────────────────────────────────────────────────

    /// Render the full console layout.
    pub fn render(&mut self, frame: &mut Frame) {
        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),      // Status bar
                Constraint::Percentage(50), // Applications
                Constraint::Min(5),         // Log
                Constraint::Length(4),      // Command line
            ])
            .split(frame.area());

        self.render_status_bar(frame, outer[0]);
        self.render_table(frame, outer[1]);
        self.render_log(frame, outer[2]);
        self.render_input(frame, outer[3]);

        if self.dashboard.editor.is_active() {
            self.render_editor(frame, centered(frame.area(), 80, 80));
        }
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(" botdeck ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));

        let (link, link_color) = match self.dashboard.connection() {
            ConnectionState::Connected => ("connected", Color::Green),
            ConnectionState::Connecting => ("connecting", Color::Yellow),
            ConnectionState::Disconnected => ("disconnected", Color::Red),
        };
        let registry = &self.dashboard.registry;

        let status_line = Line::from(vec![
            Span::styled("  Server: ", Style::default().fg(Color::Gray)),
            Span::styled(self.server_url.as_str(), Style::default().fg(Color::White)),
            Span::styled("  |  Mode: ", Style::default().fg(Color::Gray)),
            Span::styled(
                self.dashboard.mode().to_string(),
                Style::default().fg(Color::Cyan),
            ),
            Span::styled("  |  Link: ", Style::default().fg(Color::Gray)),
            Span::styled(link, Style::default().fg(link_color)),
            Span::styled("  |  Apps: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{} ({} running)", registry.len(), registry.running_count()),
                Style::default().fg(Color::Magenta),
            ),
        ]);

        frame.render_widget(Paragraph::new(status_line).block(block), area);
    }

    fn render_table(&self, frame: &mut Frame, area: Rect) {
        let table_view = &self.dashboard.table;
        let block = Block::default()
            .title(format!(" Applications ({}) ", table_view.rows().len()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if self.focus == Focus::Table {
                Color::Yellow
            } else {
                Color::White
            }));

        if table_view.rows().is_empty() {
            let text = Paragraph::new(Line::from(Span::styled(
                "  No applications yet. Waiting for the first list...",
                Style::default().fg(Color::DarkGray),
            )))
            .block(block);
            frame.render_widget(text, area);
            return;
        }

        let selected = table_view.selected_index();
        let rows: Vec<Row> = table_view
            .rows()
            .iter()
            .enumerate()
            .map(|(index, row)| {
                let content = &row.content;
                let actions: Vec<Span> = content
                    .buttons
                    .iter()
                    .flat_map(|button| {
                        let style = if button.enabled {
                            Style::default().fg(Color::White)
                        } else {
                            Style::default().fg(Color::DarkGray)
                        };
                        [
                            Span::styled(
                                format!("[{}]{}", button.action.key(), button.action.label()),
                                style,
                            ),
                            Span::raw(" "),
                        ]
                    })
                    .collect();

                let style = if Some(index) == selected {
                    Style::default()
                        .bg(Color::DarkGray)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };

                Row::new(vec![
                    Cell::from(format!("  {}", content.id)),
                    Cell::from(Span::styled(
                        content.bot_label.clone(),
                        Style::default().fg(Color::Cyan),
                    )),
                    Cell::from(Span::styled(
                        content.token.clone(),
                        Style::default().fg(Color::Gray),
                    )),
                    Cell::from(content.running_glyph()),
                    Cell::from(Line::from(actions)),
                ])
                .style(style)
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Length(8),
                Constraint::Percentage(20),
                Constraint::Percentage(25),
                Constraint::Length(4),
                Constraint::Min(40),
            ],
        )
        .block(block)
        .header(
            Row::new(vec!["  ID", "Bot", "Token", "Run", "Actions"])
                .style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD)),
        );

        frame.render_widget(table, area);
    }

    fn render_log(&mut self, frame: &mut Frame, area: Rect) {
        let log = &mut self.dashboard.log;
        log.set_viewport(area.height.saturating_sub(2) as usize);

        let title = if log.is_at_bottom() {
            format!(" Log ({}) ", log.len())
        } else {
            format!(" Log ({}) [scrolled, End to follow] ", log.len())
        };
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White));

        let lines: Vec<Line> = log
            .visible()
            .map(|line| {
                Line::from(Span::styled(
                    format!("  {}", line.text),
                    Style::default().fg(status_color(line.status)),
                ))
            })
            .collect();

        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn render_input(&self, frame: &mut Frame, area: Rect) {
        let focused = self.focus == Focus::Command;
        let block = Block::default()
            .title(" Command (/help for commands, /quit to exit) ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if focused { Color::Green } else { Color::White }));

        let input_display = if self.input.is_empty() && !focused {
            Line::from(vec![
                Span::styled("  > ", Style::default().fg(Color::Green)),
                Span::styled(
                    "Press / to type a command...",
                    Style::default().fg(Color::DarkGray),
                ),
            ])
        } else {
            Line::from(vec![
                Span::styled("  > ", Style::default().fg(Color::Green)),
                Span::styled(self.input.as_str(), Style::default().fg(Color::White)),
            ])
        };

        // An editor alert left behind by a failed open is shown here.
        let hint_line = match self.dashboard.editor.alert() {
            Some(alert) if !self.dashboard.editor.is_active() => alert_line(alert),
            _ => Line::from(Span::styled(
                "  Ctrl+C or /quit to exit  |  Up/Down for history  |  Esc back to table",
                Style::default().fg(Color::DarkGray),
            )),
        };

        frame.render_widget(Paragraph::new(vec![input_display, hint_line]).block(block), area);

        if focused {
            let cursor_x = area.x + 5 + self.cursor_pos as u16;
            frame.set_cursor_position((cursor_x, area.y + 1));
        }
    }

    fn render_editor(&self, frame: &mut Frame, area: Rect) {
        let editor = &self.dashboard.editor;
        let Some(form) = editor.form() else {
            return;
        };
        frame.render_widget(Clear, area);

        let saving = editor.phase() == EditorPhase::Saving;
        let block = Block::default()
            .title(format!(" {} ", form.title))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let fields_height = if form.fields.is_empty() {
            0
        } else {
            (form.fields.len() as u16 + 3).min(10)
        };
        let parts = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),             // Id
                Constraint::Min(3),                // Text
                Constraint::Length(fields_height), // Field descriptors
                Constraint::Length(1),             // Alert
                Constraint::Length(1),             // Hints
            ])
            .split(inner);

        frame.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled(" App ID: ", Style::default().fg(Color::Gray)),
                Span::styled(form.app_id.as_str(), Style::default().fg(Color::White)),
            ])),
            parts[0],
        );

        let text_block = Block::default()
            .title(" Configuration (JSON) ")
            .borders(Borders::ALL);
        let text_area = text_block.inner(parts[1]);
        let height = text_area.height as usize;
        let (row, col) = form.text.cursor();
        let top = row.saturating_sub(height.saturating_sub(1));
        let lines: Vec<Line> = form
            .text
            .lines()
            .iter()
            .skip(top)
            .take(height)
            .map(|l| Line::from(l.as_str()))
            .collect();
        frame.render_widget(Paragraph::new(lines).block(text_block), parts[1]);
        if !saving {
            frame.set_cursor_position((
                text_area.x + col as u16,
                text_area.y + (row - top) as u16,
            ));
        }

        if !form.fields.is_empty() {
            let rows: Vec<Row> = form
                .fields
                .iter()
                .map(|f| {
                    Row::new(vec![
                        f.name.clone(),
                        f.kind.clone(),
                        f.default.clone(),
                        if f.required { "yes".into() } else { "no".into() },
                    ])
                })
                .collect();
            let table = Table::new(
                rows,
                [
                    Constraint::Percentage(30),
                    Constraint::Percentage(20),
                    Constraint::Percentage(35),
                    Constraint::Percentage(15),
                ],
            )
            .header(
                Row::new(vec!["Field", "Type", "Default", "Required"])
                    .style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD)),
            )
            .block(Block::default().title(" Fields ").borders(Borders::ALL));
            frame.render_widget(table, parts[2]);
        }

        if let Some(alert) = editor.alert() {
            frame.render_widget(Paragraph::new(alert_line(alert)), parts[3]);
        } else if saving {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    "  Saving...",
                    Style::default().fg(Color::Cyan),
                )),
                parts[3],
            );
        }

        frame.render_widget(
            Paragraph::new(Span::styled(
                "  Ctrl+S save  |  Esc cancel  |  Tab indents",
                Style::default().fg(Color::DarkGray),
            )),
            parts[4],
        );
    }
}

fn alert_line(alert: &InlineAlert) -> Line<'_> {
    let (label, color) = match alert.kind {
        AlertKind::Danger => ("  ✖ ", Color::Red),
        AlertKind::Warning => ("  ⚠ ", Color::Yellow),
    };
    Line::from(vec![
        Span::styled(label, Style::default().fg(color)),
        Span::styled(alert.message.as_str(), Style::default().fg(color)),
    ])
}

fn status_color(status: Status) -> Color {
    match status {
        Status::Success => Color::Green,
        Status::Error => Color::Red,
        Status::Warning => Color::Yellow,
        Status::Info => Color::Cyan,
    }
}

fn byte_index(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map(|(i, _)| i).unwrap_or(s.len())
}

/// A rectangle of `percent_x` by `percent_y` centred in `area`.
fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

/// Set up the terminal for TUI rendering.
fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

/// Restore the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Run the operator console until the operator quits.
pub async fn run_console(config: &ConsoleConfig) -> anyhow::Result<()> {
    use std::io::IsTerminal;
    if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
        anyhow::bail!("The console requires a terminal (TTY). Use a subcommand instead.");
    }

    let rest = RestClient::new(&config.server_url, config.request_timeout())?;
    let tokens = if config.mask_tokens {
        TokenDisplay::Masked
    } else {
        TokenDisplay::Plain
    };
    let dashboard = Dashboard::new(
        config.mode,
        config.log_capacity,
        tokens,
        TerminalModal::default(),
    );
    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();

    let mut poller = None;
    let (mut console, mut events) = match config.mode {
        TransportMode::Poll => {
            let (transport, events) = PollingTransport::new(rest, config.poll_interval());
            poller = Some(transport.spawn_poller());
            let transport: Arc<dyn Transport> = transport;
            (
                OperatorConsole::new(dashboard, transport, outcome_tx, &config.server_url),
                events,
            )
        }
        TransportMode::Push => {
            let (push, events) = PushTransport::new(rest, config.connect_timeout())?;
            let transport: Arc<dyn Transport> = push.clone();
            let mut console =
                OperatorConsole::new(dashboard, transport, outcome_tx, &config.server_url)
                    .with_push(push);
            console.spawn_connect();
            (console, events)
        }
    };
    tracing::info!(mode = %config.mode, url = %config.server_url, "console started");

    // Set up panic hook to restore terminal.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let mut terminal = setup_terminal()?;
    let tick_rate = Duration::from_millis(100);

    let result: anyhow::Result<()> = async {
        loop {
            while let Ok(event) = events.try_recv() {
                console.apply_event(event);
            }
            while let Ok(outcome) = outcome_rx.try_recv() {
                console.apply_outcome(outcome);
            }

            terminal.draw(|frame| console.render(frame))?;
            if console.should_quit() {
                return Ok(());
            }

            if event::poll(tick_rate)? {
                if let Event::Key(key_event) = event::read()? {
                    if key_event.kind == KeyEventKind::Press {
                        console.handle_key(key_event.code, key_event.modifiers);
                    }
                }
            }
        }
    }
    .await;

    restore_terminal(&mut terminal)?;
    if let Some(poller) = poller {
        poller.abort();
    }
    if let Some(push) = &console.push {
        push.disconnect().await;
    }
    tracing::info!("console stopped");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use botdeck_client::{ClientError, Result as ClientResult};
    use botdeck_protocol::{AppAction, BotInfo};
    use ratatui::backend::TestBackend;
    use ratatui::buffer::Buffer;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tokio::time::timeout;

    /// Transport that records every call and never touches the network.
    #[derive(Default)]
    struct RecordingTransport {
        calls: Mutex<Vec<String>>,
        fail_fetch: AtomicBool,
    }

    impl RecordingTransport {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        fn mode(&self) -> TransportMode {
            TransportMode::Push
        }

        async fn refresh_all(&self) -> ClientResult<()> {
            self.record("refresh".into());
            Ok(())
        }

        async fn perform_action(&self, app_id: &str, action: AppAction) -> ClientResult<()> {
            self.record(format!("{} {app_id}", action.event_name()));
            Ok(())
        }

        async fn submit_config(&self, app_id: &str, config: Value) -> ClientResult<()> {
            self.record(format!("edit {app_id} {config}"));
            Err(ClientError::NotConnected)
        }

        async fn fetch_app(&self, app_id: &str) -> ClientResult<Option<Application>> {
            self.record(format!("fetch {app_id}"));
            if self.fail_fetch.load(Ordering::SeqCst) {
                return Err(ClientError::WebSocket("connection refused".into()));
            }
            Ok(None)
        }

        async fn fleet(&self, action: FleetAction) -> ClientResult<Envelope> {
            self.record(action.route().to_string());
            Ok(Envelope::success(format!("{} done", action.route())))
        }
    }

    fn app(id: &str, running: bool) -> Application {
        Application {
            id: id.into(),
            bot: BotInfo {
                username: format!("bot{id}"),
                link: format!("https://t.me/bot{id}"),
                ..BotInfo::default()
            },
            telegram_token: format!("{id}:tok"),
            running,
            config: json!({"a": 1}),
            kind: None,
            fields: None,
        }
    }

    fn console(
        mode: TransportMode,
    ) -> (
        OperatorConsole,
        Arc<RecordingTransport>,
        mpsc::UnboundedReceiver<Outcome>,
    ) {
        let transport = Arc::new(RecordingTransport::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let dashboard = Dashboard::new(mode, 100, TokenDisplay::Plain, TerminalModal::default());
        let mut console = OperatorConsole::new(
            dashboard,
            transport.clone() as Arc<dyn Transport>,
            tx,
            "http://127.0.0.1:8000",
        );
        console.apply_event(TransportEvent::Snapshot(vec![app("7", false), app("8", true)]));
        (console, transport, rx)
    }

    async fn wait_for_calls(transport: &RecordingTransport, n: usize) -> Vec<String> {
        timeout(Duration::from_secs(2), async {
            loop {
                let calls = transport.calls();
                if calls.len() >= n {
                    return calls;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("transport calls")
    }

    fn draw(console: &mut OperatorConsole) -> String {
        let mut terminal = Terminal::new(TestBackend::new(140, 40)).unwrap();
        terminal.draw(|frame| console.render(frame)).unwrap();
        buffer_to_string(terminal.backend().buffer())
    }

    fn buffer_to_string(buffer: &Buffer) -> String {
        let area = buffer.area;
        let mut out = String::new();
        for y in 0..area.height {
            for x in 0..area.width {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    #[tokio::test]
    async fn malformed_json_is_never_submitted() {
        let (mut console, transport, _rx) = console(TransportMode::Push);
        console.handle_key(KeyCode::Char('e'), KeyModifiers::NONE);
        assert_eq!(console.dashboard().editor.phase(), EditorPhase::Open);

        console
            .dashboard_mut()
            .editor
            .form_mut()
            .unwrap()
            .text
            .set_text("{a:1");
        console.handle_key(KeyCode::Char('s'), KeyModifiers::CONTROL);
        tokio::task::yield_now().await;

        assert!(transport.calls().is_empty());
        let editor = &console.dashboard().editor;
        assert_eq!(editor.phase(), EditorPhase::Open);
        let alert = editor.alert().expect("alert");
        assert_eq!(alert.kind, AlertKind::Danger);
        assert!(alert.message.starts_with("Invalid JSON: "), "{}", alert.message);
        assert!(alert.message.contains("line 1"), "{}", alert.message);
    }

    #[tokio::test]
    async fn failed_submit_reopens_with_danger_alert() {
        let (mut console, transport, mut rx) = console(TransportMode::Push);
        console.handle_key(KeyCode::Char('e'), KeyModifiers::NONE);
        console.handle_key(KeyCode::Char('s'), KeyModifiers::CONTROL);
        assert_eq!(console.dashboard().editor.phase(), EditorPhase::Saving);

        let calls = wait_for_calls(&transport, 1).await;
        assert_eq!(calls, [r#"edit 7 {"a":1}"#]);

        let outcome = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        console.apply_outcome(outcome);
        let editor = &console.dashboard().editor;
        assert_eq!(editor.phase(), EditorPhase::Open);
        assert_eq!(editor.alert().unwrap().kind, AlertKind::Danger);
    }

    #[tokio::test]
    async fn row_keys_respect_disabled_buttons() {
        let (mut console, transport, _rx) = console(TransportMode::Push);
        // Row 7 is stopped: Stop is disabled, Start is not.
        console.handle_key(KeyCode::Char('x'), KeyModifiers::NONE);
        console.handle_key(KeyCode::Char('s'), KeyModifiers::NONE);
        console.handle_key(KeyCode::Down, KeyModifiers::NONE);
        // Row 8 is running: Start is disabled.
        console.handle_key(KeyCode::Char('s'), KeyModifiers::NONE);
        console.handle_key(KeyCode::Char('r'), KeyModifiers::NONE);

        let mut calls = wait_for_calls(&transport, 2).await;
        calls.sort();
        assert_eq!(calls, ["app_restart 8", "app_start 7"]);
    }

    #[tokio::test]
    async fn poll_mode_editor_fetches_before_opening() {
        let (mut console, transport, mut rx) = console(TransportMode::Poll);
        console.handle_key(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(console.dashboard().editor.phase(), EditorPhase::Opening);

        assert_eq!(wait_for_calls(&transport, 1).await, ["fetch 7"]);
        let outcome = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        console.apply_outcome(outcome);

        let editor = &console.dashboard().editor;
        assert_eq!(editor.phase(), EditorPhase::Closed);
        assert_eq!(
            editor.alert().unwrap().message,
            "No app found with ID 7"
        );
    }

    #[tokio::test]
    async fn failed_lookup_is_logged_and_alerted() {
        let (mut console, transport, mut rx) = console(TransportMode::Poll);
        transport.fail_fetch.store(true, Ordering::SeqCst);
        console.handle_key(KeyCode::Enter, KeyModifiers::NONE);

        assert_eq!(wait_for_calls(&transport, 1).await, ["fetch 7"]);
        let before = console.dashboard().log.len();
        let outcome = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        console.apply_outcome(outcome);

        let log = &console.dashboard().log;
        assert_eq!(log.len(), before + 1);
        let last = log.lines().last().unwrap();
        assert_eq!(last.status, Status::Error);
        assert!(
            last.text.ends_with("fetch app: websocket error: connection refused"),
            "{}",
            last.text
        );
        let editor = &console.dashboard().editor;
        assert_eq!(editor.phase(), EditorPhase::Closed);
        assert_eq!(editor.alert().unwrap().kind, AlertKind::Danger);
    }

    #[tokio::test]
    async fn shutdown_needs_confirmation() {
        let (mut console, transport, mut rx) = console(TransportMode::Push);
        console.process_command("/shutdown");
        tokio::task::yield_now().await;
        assert!(transport.calls().is_empty());

        console.process_command("/shutdown");
        assert_eq!(wait_for_calls(&transport, 1).await, ["shutdown"]);

        let outcome = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        console.apply_outcome(outcome);
        let last = console.dashboard().log.lines().last().unwrap().clone();
        assert!(last.text.ends_with("SUCCESS: shutdown: shutdown done"), "{}", last.text);
    }

    #[tokio::test]
    async fn command_line_runs_fleet_commands_and_keeps_history() {
        let (mut console, transport, _rx) = console(TransportMode::Push);
        console.handle_key(KeyCode::Char('/'), KeyModifiers::NONE);
        for c in "start-all".chars() {
            console.handle_key(KeyCode::Char(c), KeyModifiers::NONE);
        }
        console.handle_key(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(wait_for_calls(&transport, 1).await, ["start_all"]);
        assert_eq!(console.history, ["/start-all"]);

        console.handle_key(KeyCode::Char('/'), KeyModifiers::NONE);
        console.handle_key(KeyCode::Up, KeyModifiers::NONE);
        assert_eq!(console.input, "/start-all");
    }

    #[tokio::test]
    async fn screen_shows_rows_and_editor() {
        let (mut console, _transport, _rx) = console(TransportMode::Push);
        let screen = draw(&mut console);
        assert!(screen.contains("Applications (2)"));
        assert!(screen.contains("@bot7"));
        assert!(screen.contains("7:tok"));
        assert!(screen.contains(crate::table::STOPPED_GLYPH));
        assert!(screen.contains(crate::table::RUNNING_GLYPH));
        assert!(screen.contains("Mode: push"));

        console.handle_key(KeyCode::Char('e'), KeyModifiers::NONE);
        let screen = draw(&mut console);
        assert!(screen.contains("Edit config for @bot7"));
        assert!(screen.contains("\"a\": 1"));
    }
}
