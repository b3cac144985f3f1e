//! Grammar for `-`-prefixed task commands.
//!
//! Verbs are case-insensitive, arguments keep their case. Parsing is pure and
//! never consults a model.

use std::sync::LazyLock;

use regex::Regex;

use super::{DEFAULT_INSIGHT_PERIOD_DAYS, ToolCall, ToolName};

pub const TASK_PREFIX: char = '-';

const KNOWN_VERBS: &[&str] = &[
    "log", "record", "edit", "put", "set", "history", "show", "get", "insights", "analyze",
    "form", "check", "help",
];

pub const EDIT_USAGE: &str =
    "-edit interaction <id> [change] <field> to <value>  or  -edit interaction with <name> [change <field> to <value>]";
pub const PUT_USAGE: &str = "-put <field> as <value>";
pub const HISTORY_USAGE: &str = "-history for <HCP name>";
pub const INSIGHTS_USAGE: &str = "-insights [for <HCP name>] [last <N> days]";
pub const LOG_USAGE: &str = "-log <description of the interaction>";
pub const FORM_USAGE: &str = "-form";

const MAX_PERIOD_DAYS: u32 = 3650;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("Type a command after '-'. Try -help to see what I can do.")]
    EmptyCommand,
    #[error("Unknown command '{verb}'.{}", suggestion_hint(.suggestion))]
    UnrecognizedCommand {
        verb: String,
        suggestion: Option<&'static str>,
    },
    #[error("Invalid {verb} command. Use: {usage}")]
    InvalidUsage {
        verb: &'static str,
        usage: &'static str,
    },
    #[error("I need a {param} to run {tool}.")]
    MissingParameter {
        tool: ToolName,
        param: &'static str,
    },
}

fn suggestion_hint(suggestion: &Option<&'static str>) -> String {
    match suggestion {
        Some(verb) => format!(" Did you mean '-{verb}'? Try -help for the full list."),
        None => " Try -help for the full list.".to_string(),
    }
}

fn closest_verb(verb: &str) -> Option<&'static str> {
    KNOWN_VERBS
        .iter()
        .map(|known| (*known, strsim::levenshtein(verb, known)))
        .filter(|(_, distance)| *distance <= 2)
        .min_by_key(|(_, distance)| *distance)
        .map(|(known, _)| known)
}

static EDIT_BY_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^edit\s+interaction\s+(\d+)(?:\s+(?:change\s+)?(.*))?$")
        .expect("valid edit-by-id regex")
});
static EDIT_BY_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^edit\s+interaction\s+(?:with|for)\s+(.+?)(?:\s+change\s+(.+))?$")
        .expect("valid edit-by-name regex")
});
static PUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^(?:put|set)\s+(.+?)\s+(?:as|to)\s+(.+)$").expect("valid put regex")
});
static HISTORY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^(?:(?:show|get)\s+(?:me\s+)?(?:the\s+)?)?history\s+(?:for|of)\s+(.+)$")
        .expect("valid history regex")
});
static FORM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(?:show|check)\s+(?:me\s+)?(?:the\s+)?)?form$").expect("valid form regex")
});
static INSIGHTS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)^(?:insights|analyze)(?:\s+(?:for|about)\s+(.+?))?(?:\s+(?:last|past)\s+(\d+)\s+days?)?$",
    )
    .expect("valid insights regex")
});

fn trimmed(m: Option<regex::Match<'_>>) -> String {
    m.map(|m| m.as_str().trim().to_string()).unwrap_or_default()
}

/// Parse the text after the task prefix.
pub fn parse_command(command: &str) -> Result<ToolCall, RouteError> {
    let command = command.trim();
    let Some(first) = command.split_whitespace().next() else {
        return Err(RouteError::EmptyCommand);
    };
    let verb = first.to_lowercase();
    let rest = command[first.len()..].trim();

    match verb.as_str() {
        "log" | "record" => {
            if rest.is_empty() {
                return Err(RouteError::InvalidUsage {
                    verb: "log",
                    usage: LOG_USAGE,
                });
            }
            Ok(ToolCall::LogInteraction {
                text: rest.to_string(),
            })
        }
        "edit" => parse_edit(command),
        "put" | "set" => {
            let caps = PUT_RE.captures(command).ok_or(RouteError::InvalidUsage {
                verb: "put",
                usage: PUT_USAGE,
            })?;
            Ok(ToolCall::UpdateFormField {
                field: trimmed(caps.get(1)),
                value: strip_quotes(&trimmed(caps.get(2))),
            })
        }
        "history" | "show" | "get" | "check" | "form" => {
            if FORM_RE.is_match(command) {
                return Ok(ToolCall::FormInformation);
            }
            if verb == "form" || verb == "check" {
                return Err(RouteError::InvalidUsage {
                    verb: "form",
                    usage: FORM_USAGE,
                });
            }
            let caps = HISTORY_RE.captures(command).ok_or(RouteError::InvalidUsage {
                verb: "history",
                usage: HISTORY_USAGE,
            })?;
            Ok(ToolCall::GetInteractionHistory {
                hcp_name: trimmed(caps.get(1)),
            })
        }
        "insights" | "analyze" => parse_insights(command),
        "help" => Ok(ToolCall::Help),
        _ => Err(RouteError::UnrecognizedCommand {
            suggestion: closest_verb(&verb),
            verb: first.to_string(),
        }),
    }
}

fn parse_edit(command: &str) -> Result<ToolCall, RouteError> {
    let usage = RouteError::InvalidUsage {
        verb: "edit",
        usage: EDIT_USAGE,
    };

    if let Some(caps) = EDIT_BY_ID_RE.captures(command) {
        let id = caps[1].parse::<i64>().map_err(|_| usage.clone())?;
        return Ok(ToolCall::EditInteraction {
            id,
            instructions: trimmed(caps.get(2)),
        });
    }
    if let Some(caps) = EDIT_BY_NAME_RE.captures(command) {
        return Ok(ToolCall::EditInteractionByName {
            hcp_name: trimmed(caps.get(1)),
            instructions: trimmed(caps.get(2)),
        });
    }
    Err(usage)
}

fn parse_insights(command: &str) -> Result<ToolCall, RouteError> {
    let usage = RouteError::InvalidUsage {
        verb: "insights",
        usage: INSIGHTS_USAGE,
    };
    let caps = INSIGHTS_RE.captures(command).ok_or_else(|| usage.clone())?;

    let period_days = match caps.get(2) {
        Some(m) => m
            .as_str()
            .parse::<u32>()
            .ok()
            .filter(|days| (1..=MAX_PERIOD_DAYS).contains(days))
            .ok_or(usage)?,
        None => DEFAULT_INSIGHT_PERIOD_DAYS,
    };
    let hcp_name = Some(trimmed(caps.get(1))).filter(|n| !n.is_empty());

    Ok(ToolCall::GenerateSalesInsights {
        hcp_name,
        period_days,
    })
}

fn strip_quotes(value: &str) -> String {
    value.trim_matches(|c: char| c == '"' || c == '\'').trim().to_string()
}
