//! Mechanical check that tool arguments come from the latest user message.
//!
//! Every string in the arguments is split into words, and at least one
//! word of two or more characters must also appear in the latest user
//! message. Comparison is case-insensitive and ignores punctuation.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use tracing::warn;
use waymark_core::ToolCall;

/// Error text reported to the model when a call is refused.
pub const GUARD_REJECTION: &str = "Tool arguments must come from the latest user message";

/// What to do when a call's arguments share no word with the latest user
/// message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuardMode {
    /// Skip the check.
    Off,
    /// Log the mismatch and run the tool anyway.
    Warn,
    /// Refuse the call with an error tool result.
    #[default]
    Reject,
}

/// Returned when parsing an unknown [`GuardMode`] name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown guard mode {0:?}, expected one of: off, warn, reject")]
pub struct ParseGuardModeError(String);

impl FromStr for GuardMode {
    type Err = ParseGuardModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "warn" => Ok(Self::Warn),
            "reject" => Ok(Self::Reject),
            _ => Err(ParseGuardModeError(s.to_owned())),
        }
    }
}

impl fmt::Display for GuardMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::Warn => "warn",
            Self::Reject => "reject",
        })
    }
}

impl GuardMode {
    /// Checks `call` against the latest user message.
    ///
    /// Returns the error text to report when the call must not run.
    pub fn check(self, call: &ToolCall, latest_user_text: &str) -> Result<(), String> {
        if self == Self::Off || arguments_match(&call.arguments, latest_user_text) {
            return Ok(());
        }
        warn!(
            tool = %call.name,
            arguments = %call.arguments,
            mode = %self,
            "tool arguments do not come from the latest user message"
        );
        match self {
            Self::Reject => Err(GUARD_REJECTION.to_owned()),
            Self::Off | Self::Warn => Ok(()),
        }
    }
}

/// Whether the string values in `arguments` share a significant word with
/// `message`.
///
/// Arguments without any string value have nothing to check and match.
pub fn arguments_match(arguments: &Value, message: &str) -> bool {
    let mut strings = Vec::new();
    collect_strings(arguments, &mut strings);
    if strings.is_empty() {
        return true;
    }
    let message_words = significant_words(message);
    strings
        .iter()
        .flat_map(|s| significant_words(s))
        .any(|word| message_words.contains(&word))
}

fn collect_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) => out.push(s),
        Value::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_strings(v, out)),
        _ => {}
    }
}

fn significant_words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 2)
        .map(str::to_lowercase)
        .collect()
}
