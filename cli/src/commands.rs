//! Parsing of interactive input lines.

use anyhow::{bail, Context, Result};
use tipchat_core::filters::FilterKind;
use tipchat_core::RetrievalMode;

/// What a filter command applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterTarget {
    All,
    None,
    Key(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    Exit,
    Help,
    Clear,
    Retry,
    Settings,
    /// Turn indices are 0-based; the user types them 1-based
    Citation { turn: usize, number: usize },
    Thoughts(usize),
    Support(usize),
    Followups(usize),
    Filter { kind: FilterKind, target: FilterTarget },
    AudienceSearch(String),
    Top(String),
    Mode(RetrievalMode),
    Stream(bool),
    SuggestFollowups(bool),
    Images(bool),
}

pub fn parse_command(input: &str) -> Result<Command> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
        return Ok(Command::Exit);
    }
    let Some(rest) = input.strip_prefix('/') else {
        return Ok(Command::Ask(input.to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    let command = match name {
        "help" => Command::Help,
        "clear" => Command::Clear,
        "retry" => Command::Retry,
        "settings" => Command::Settings,
        "citation" => {
            let mut parts = arg.split_whitespace();
            let turn = turn_index(parts.next().unwrap_or(""))?;
            let number = parts
                .next()
                .context("Usage: /citation <turn> <n>")?
                .parse::<usize>()
                .context("Citation number must be a positive integer")?;
            Command::Citation { turn, number }
        }
        "thoughts" => Command::Thoughts(turn_index(arg)?),
        "support" => Command::Support(turn_index(arg)?),
        "followups" if arg.parse::<usize>().is_ok() => Command::Followups(turn_index(arg)?),
        "followups" => Command::SuggestFollowups(on_off(arg)?),
        "category" => filter(FilterKind::Category, arg)?,
        "version" => filter(FilterKind::Version, arg)?,
        "audience" => filter(FilterKind::Audience, arg)?,
        "audience-search" => {
            if arg.is_empty() {
                bail!("Usage: /audience-search <term>");
            }
            Command::AudienceSearch(arg.to_string())
        }
        "top" => Command::Top(arg.to_string()),
        "mode" => Command::Mode(arg.parse::<RetrievalMode>().map_err(anyhow::Error::msg)?),
        "stream" => Command::Stream(on_off(arg)?),
        "images" => Command::Images(on_off(arg)?),
        other => bail!("Unknown command '/{}'. Type /help for a list of commands.", other),
    };
    Ok(command)
}

fn turn_index(raw: &str) -> Result<usize> {
    let turn = raw
        .trim()
        .parse::<usize>()
        .with_context(|| format!("'{}' is not a turn number", raw.trim()))?;
    turn.checked_sub(1).context("Turns are numbered from 1")
}

fn on_off(raw: &str) -> Result<bool> {
    match raw.to_lowercase().as_str() {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        other => bail!("Expected 'on' or 'off', got '{}'", other),
    }
}

fn filter(kind: FilterKind, arg: &str) -> Result<Command> {
    let target = match arg {
        "" => bail!("Usage: /{} <key|all|none>", kind.name()),
        "all" => FilterTarget::All,
        "none" => FilterTarget::None,
        key => FilterTarget::Key(key.to_string()),
    };
    Ok(Command::Filter { kind, target })
}
