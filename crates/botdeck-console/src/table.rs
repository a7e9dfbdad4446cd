//! Headless application table.
//!
//! Rows carry a node identity that changes only when that row is rebuilt, so
//! a frontend (or a test) can tell a targeted row replacement from a full
//! re-render. Row content is a pure projection of one [`Application`].

use botdeck_protocol::{AppAction, Application};

/// Identity of one rendered row. Fresh on every rebuild of that row.
pub type NodeId = u64;

pub const RUNNING_GLYPH: &str = "✅";
pub const STOPPED_GLYPH: &str = "❌";

/// Buttons in a row's action cluster, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowAction {
    Start,
    Restart,
    Reload,
    Stop,
    Edit,
}

impl RowAction {
    pub const ALL: [RowAction; 5] = [
        RowAction::Start,
        RowAction::Restart,
        RowAction::Reload,
        RowAction::Stop,
        RowAction::Edit,
    ];

    /// Lifecycle action this button maps to; `None` for Edit.
    pub fn lifecycle(&self) -> Option<AppAction> {
        match self {
            RowAction::Start => Some(AppAction::Start),
            RowAction::Restart => Some(AppAction::Restart),
            RowAction::Reload => Some(AppAction::Reload),
            RowAction::Stop => Some(AppAction::Stop),
            RowAction::Edit => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RowAction::Start => "Start",
            RowAction::Restart => "Restart",
            RowAction::Reload => "Reload",
            RowAction::Stop => "Stop",
            RowAction::Edit => "Edit",
        }
    }

    /// Console key bound to this action.
    pub fn key(&self) -> char {
        match self {
            RowAction::Start => 's',
            RowAction::Restart => 'r',
            RowAction::Reload => 'l',
            RowAction::Stop => 'x',
            RowAction::Edit => 'e',
        }
    }

    pub fn from_key(key: char) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.key() == key)
    }
}

/// What the operator asked for on one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowIntent {
    pub app_id: String,
    pub action: RowAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionButton {
    pub action: RowAction,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenDisplay {
    #[default]
    Plain,
    Masked,
}

/// Everything a row shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowContent {
    pub id: String,
    /// `@username`, or the id when the bot is unresolved.
    pub bot_label: String,
    pub bot_link: String,
    pub token: String,
    pub running: bool,
    pub buttons: [ActionButton; 5],
}

impl RowContent {
    pub fn running_glyph(&self) -> &'static str {
        if self.running {
            RUNNING_GLYPH
        } else {
            STOPPED_GLYPH
        }
    }

    pub fn button(&self, action: RowAction) -> ActionButton {
        self.buttons
            .iter()
            .copied()
            .find(|b| b.action == action)
            .unwrap_or(ActionButton {
                action,
                enabled: false,
            })
    }
}

/// Project one application onto its row content.
pub fn project_row(app: &Application, tokens: TokenDisplay) -> RowContent {
    let buttons = RowAction::ALL.map(|action| ActionButton {
        action,
        enabled: match action {
            RowAction::Start => !app.running,
            RowAction::Stop => app.running,
            RowAction::Restart | RowAction::Reload | RowAction::Edit => true,
        },
    });

    RowContent {
        id: app.id.clone(),
        bot_label: app.handle(),
        bot_link: app.bot.link.clone(),
        token: match tokens {
            TokenDisplay::Plain => app.telegram_token.clone(),
            TokenDisplay::Masked => mask_token(&app.telegram_token),
        },
        running: app.running,
        buttons,
    }
}

/// Keep the numeric bot id before `:` and hide the secret part.
pub fn mask_token(token: &str) -> String {
    match token.split_once(':') {
        Some((bot_id, _)) => format!("{bot_id}:********"),
        None if token.is_empty() => String::new(),
        None => "********".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub node: NodeId,
    pub app_id: String,
    pub content: RowContent,
}

/// Sink for registry changes.
pub trait RowSink {
    fn render_all(&mut self, apps: &[Application]);
    fn render_one(&mut self, app: &Application);
}

#[derive(Debug, Default)]
pub struct TableView {
    rows: Vec<TableRow>,
    next_node: NodeId,
    selected: usize,
    tokens: TokenDisplay,
}

impl TableView {
    pub fn new(tokens: TokenDisplay) -> Self {
        Self {
            tokens,
            ..Self::default()
        }
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn row(&self, app_id: &str) -> Option<&TableRow> {
        self.rows.iter().find(|r| r.app_id == app_id)
    }

    pub fn selected_index(&self) -> Option<usize> {
        (!self.rows.is_empty()).then_some(self.selected)
    }

    pub fn selected_row(&self) -> Option<&TableRow> {
        self.rows.get(self.selected)
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.rows.len() {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select(&mut self, app_id: &str) -> bool {
        match self.rows.iter().position(|r| r.app_id == app_id) {
            Some(index) => {
                self.selected = index;
                true
            }
            None => false,
        }
    }

    /// Intent for `action` on the selected row. Disabled buttons yield `None`.
    pub fn intent(&self, action: RowAction) -> Option<RowIntent> {
        let row = self.selected_row()?;
        Self::row_intent(row, action)
    }

    /// Intent for `action` on the row showing `app_id`.
    pub fn intent_for(&self, app_id: &str, action: RowAction) -> Option<RowIntent> {
        let row = self.row(app_id)?;
        Self::row_intent(row, action)
    }

    fn row_intent(row: &TableRow, action: RowAction) -> Option<RowIntent> {
        row.content.button(action).enabled.then(|| RowIntent {
            app_id: row.app_id.clone(),
            action,
        })
    }

    fn build_row(&mut self, app: &Application) -> TableRow {
        self.next_node += 1;
        TableRow {
            node: self.next_node,
            app_id: app.id.clone(),
            content: project_row(app, self.tokens),
        }
    }
}

impl RowSink for TableView {
    fn render_all(&mut self, apps: &[Application]) {
        let keep = self.selected_row().map(|r| r.app_id.clone());
        self.rows.clear();
        for app in apps {
            let row = self.build_row(app);
            self.rows.push(row);
        }
        match keep {
            Some(id) if self.select(&id) => {}
            _ => self.selected = self.selected.min(self.rows.len().saturating_sub(1)),
        }
    }

    fn render_one(&mut self, app: &Application) {
        let row = self.build_row(app);
        match self.rows.iter().position(|r| r.app_id == app.id) {
            Some(index) => self.rows[index] = row,
            None => self.rows.push(row),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use botdeck_protocol::BotInfo;
    use serde_json::json;

    fn app(id: &str, running: bool) -> Application {
        Application {
            id: id.into(),
            bot: BotInfo {
                username: format!("bot{id}"),
                link: format!("https://t.me/bot{id}"),
                ..BotInfo::default()
            },
            telegram_token: format!("{id}00:secret"),
            running,
            config: json!({}),
            kind: None,
            fields: None,
        }
    }

    #[test]
    fn start_and_stop_follow_running_flag() {
        let running = project_row(&app("1", true), TokenDisplay::Plain);
        assert!(!running.button(RowAction::Start).enabled);
        assert!(running.button(RowAction::Stop).enabled);

        let stopped = project_row(&app("1", false), TokenDisplay::Plain);
        assert!(stopped.button(RowAction::Start).enabled);
        assert!(!stopped.button(RowAction::Stop).enabled);

        for content in [&running, &stopped] {
            assert!(content.button(RowAction::Restart).enabled);
            assert!(content.button(RowAction::Reload).enabled);
            assert!(content.button(RowAction::Edit).enabled);
        }
        assert_eq!(running.running_glyph(), RUNNING_GLYPH);
        assert_eq!(stopped.running_glyph(), STOPPED_GLYPH);
    }

    #[test]
    fn token_masking_is_opt_in() {
        let plain = project_row(&app("4", false), TokenDisplay::Plain);
        assert_eq!(plain.token, "400:secret");
        let masked = project_row(&app("4", false), TokenDisplay::Masked);
        assert_eq!(masked.token, "400:********");
        assert_eq!(mask_token(""), "");
        assert_eq!(mask_token("opaque"), "********");
    }

    #[test]
    fn disabled_button_yields_no_intent() {
        let mut table = TableView::default();
        table.render_all(&[app("1", true)]);
        assert_eq!(table.intent(RowAction::Start), None);
        assert_eq!(
            table.intent(RowAction::Stop),
            Some(RowIntent {
                app_id: "1".into(),
                action: RowAction::Stop
            })
        );
        assert_eq!(table.intent_for("missing", RowAction::Edit), None);
    }

    #[test]
    fn selection_survives_full_render_when_row_remains() {
        let mut table = TableView::default();
        table.render_all(&[app("1", false), app("2", false), app("3", false)]);
        table.select_next();
        table.select_next();
        assert_eq!(table.selected_row().unwrap().app_id, "3");

        table.render_all(&[app("3", false), app("1", false)]);
        assert_eq!(table.selected_row().unwrap().app_id, "3");

        table.render_all(&[app("9", false)]);
        assert_eq!(table.selected_index(), Some(0));

        table.render_all(&[]);
        assert_eq!(table.selected_index(), None);
    }

    #[test]
    fn render_one_appends_unknown_row() {
        let mut table = TableView::default();
        table.render_all(&[app("1", false)]);
        table.render_one(&app("2", true));
        let ids: Vec<_> = table.rows().iter().map(|r| r.app_id.as_str()).collect();
        assert_eq!(ids, ["1", "2"]);
    }

    #[test]
    fn keys_map_to_actions() {
        assert_eq!(RowAction::from_key('x'), Some(RowAction::Stop));
        assert_eq!(RowAction::from_key('e'), Some(RowAction::Edit));
        assert_eq!(RowAction::from_key('q'), None);
        assert_eq!(RowAction::Edit.lifecycle(), None);
    }
}
