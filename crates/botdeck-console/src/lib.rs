//! botdeck console - operator dashboard for a fleet of bot applications
//!
//! A headless view model ([`dispatch::Dashboard`]: registry, table, log
//! panel, configuration editor) fed by a [`botdeck_client::Transport`], a
//! ratatui frontend that draws it, and one-shot CLI subcommands.

pub mod cli;
pub mod commands;
pub mod config;
pub mod console;
pub mod dispatch;
pub mod editor;
pub mod log_panel;
pub mod logging;
pub mod registry;
pub mod table;
pub mod text_buffer;

pub use config::{ConfigError, ConsoleConfig};
pub use dispatch::{Dashboard, EditorSource};
pub use editor::{AlertKind, ConfigEditor, EditorError, EditorPhase, InlineAlert, Modal};
pub use log_panel::{LogPanel, LogRecord};
pub use registry::{AppRegistry, RegistryError};
pub use table::{NodeId, RowAction, RowIntent, RowSink, TableView, TokenDisplay};
