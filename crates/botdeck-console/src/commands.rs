//! One-shot subcommands. Each talks REST only and prints to stdout.

use std::io::Write;

use anyhow::{bail, Context};
use botdeck_client::RestClient;
use botdeck_protocol::{AppAction, Application, Envelope, FleetAction, Status};

use crate::cli::Command;
use crate::editor::pretty_config;
use crate::log_panel::LogRecord;
use crate::table::{project_row, TokenDisplay};

pub async fn run(
    command: &Command,
    rest: &RestClient,
    tokens: TokenDisplay,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match command {
        Command::Console => bail!("the console is not a one-shot command"),
        Command::List => {
            let apps = rest.list().await.context("listing applications")?;
            for line in format_list(&apps, tokens) {
                writeln!(out, "{line}")?;
            }
        }
        Command::Show { id } => {
            let Some(app) = rest.app(id).await.context("fetching application")? else {
                bail!("No app found with ID {id}");
            };
            for line in format_list(std::slice::from_ref(&app), tokens) {
                writeln!(out, "{line}")?;
            }
            writeln!(out, "{}", pretty_config(&app.config))?;
        }
        Command::Start { id } => act(rest, id, AppAction::Start, out).await?,
        Command::Restart { id } => act(rest, id, AppAction::Restart, out).await?,
        Command::Reload { id } => act(rest, id, AppAction::Reload, out).await?,
        Command::Stop { id } => act(rest, id, AppAction::Stop, out).await?,
        Command::Logs { since } => {
            let entries = rest.logs(*since).await.context("fetching logs")?;
            for entry in entries {
                writeln!(out, "{}", LogRecord::Runtime(entry).format())?;
            }
        }
        Command::ReloadConfig => fleet(rest, FleetAction::ReloadConfig, out).await?,
        Command::StartAll => fleet(rest, FleetAction::StartAll, out).await?,
        Command::StopAll => fleet(rest, FleetAction::StopAll, out).await?,
        Command::Shutdown => fleet(rest, FleetAction::Shutdown, out).await?,
    }
    Ok(())
}

async fn act(
    rest: &RestClient,
    id: &str,
    action: AppAction,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let ack = rest
        .action(id, action)
        .await
        .with_context(|| format!("{action} {id}"))?;
    report(&ack, &format!("{action} {id}"), out)
}

async fn fleet(rest: &RestClient, action: FleetAction, out: &mut impl Write) -> anyhow::Result<()> {
    let ack = rest
        .fleet(action)
        .await
        .with_context(|| action.to_string())?;
    report(&ack, action.route(), out)
}

fn report(ack: &Envelope, what: &str, out: &mut impl Write) -> anyhow::Result<()> {
    let message = ack.message.clone().unwrap_or_else(|| what.to_string());
    writeln!(out, "{}: {message}", ack.status.as_str().to_uppercase())?;
    if ack.status == Status::Error {
        bail!("{what} rejected: {message}");
    }
    Ok(())
}

/// Aligned `id  handle  state  token` lines.
pub fn format_list(apps: &[Application], tokens: TokenDisplay) -> Vec<String> {
    let rows: Vec<_> = apps.iter().map(|app| project_row(app, tokens)).collect();
    let id_w = rows.iter().map(|r| r.id.len()).max().unwrap_or(0).max(2);
    let bot_w = rows
        .iter()
        .map(|r| r.bot_label.chars().count())
        .max()
        .unwrap_or(0)
        .max(3);

    let mut lines = vec![format!("{:<id_w$}  {:<bot_w$}  {:<7}  TOKEN", "ID", "BOT", "STATE")];
    for row in rows {
        let state = if row.running { "running" } else { "stopped" };
        lines.push(format!(
            "{:<id_w$}  {:<bot_w$}  {state:<7}  {}",
            row.id, row.bot_label, row.token
        ));
    }
    lines
}
