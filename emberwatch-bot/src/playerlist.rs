//! Tolerant parser for the panel's player-list field.
//!
//! The panel does not serialize the player list as JSON: it sends a
//! Python-literal-style array with single quotes and `True`/`False`
//! booleans, e.g. `['Steve', 'Alex']` or plain `False` when the list is
//! unavailable. This is a permanent upstream constraint, so the parser
//! degrades instead of failing: callers log the warning and fall back to
//! an empty list.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlayerListWarning {
    #[error("player list is not valid even after requoting: {0}")]
    Unparseable(String),

    #[error("player list is not an array: got {0}")]
    NotAnArray(&'static str),
}

/// Parse the panel's pseudo-JSON player list into display names.
///
/// Non-string entries are discarded entry-by-entry (partial data beats no
/// data on a monitoring display). A bare boolean payload means "no list
/// right now" and yields an empty vec.
pub fn parse_player_list(raw: &str) -> Result<Vec<String>, PlayerListWarning> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    // Single quotes -> double quotes, then Python booleans -> JSON ones.
    // The second pass only runs when the first parse fails, so names that
    // legitimately contain "True" survive the common path.
    let requoted = trimmed.replace('\'', "\"");
    let value: Value = serde_json::from_str(&requoted)
        .or_else(|_| {
            serde_json::from_str(&requoted.replace("True", "true").replace("False", "false"))
        })
        .map_err(|err| PlayerListWarning::Unparseable(err.to_string()))?;

    match value {
        Value::Array(entries) => Ok(entries
            .iter()
            .filter_map(|entry| entry.as_str().map(clean_name))
            .collect()),
        // The panel reports `False` instead of an empty list while the
        // server is down or still starting.
        Value::Bool(_) => Ok(Vec::new()),
        Value::Null => Ok(Vec::new()),
        Value::Object(_) => Err(PlayerListWarning::NotAnArray("object")),
        Value::String(_) => Err(PlayerListWarning::NotAnArray("string")),
        Value::Number(_) => Err(PlayerListWarning::NotAnArray("number")),
    }
}

/// Strip artifacts the panel leaves in names: stray double quotes and the
/// leading `.` it prefixes onto Bedrock players.
fn clean_name(name: &str) -> String {
    let name = name.replace('"', "");
    name.strip_prefix('.').unwrap_or(&name).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_single_quoted_list() {
        let players = parse_player_list("['Steve', 'Alex', 'jeb_']").unwrap();
        assert_eq!(players, vec!["Steve", "Alex", "jeb_"]);
    }

    #[test]
    fn test_parses_plain_json_list() {
        let players = parse_player_list(r#"["Steve"]"#).unwrap();
        assert_eq!(players, vec!["Steve"]);
    }

    #[test]
    fn test_empty_inputs_yield_empty_list() {
        assert!(parse_player_list("").unwrap().is_empty());
        assert!(parse_player_list("  ").unwrap().is_empty());
        assert!(parse_player_list("[]").unwrap().is_empty());
    }

    #[test]
    fn test_boolean_payload_means_no_list() {
        assert!(parse_player_list("False").unwrap().is_empty());
        assert!(parse_player_list("True").unwrap().is_empty());
    }

    #[test]
    fn test_strips_bedrock_dot_prefix() {
        let players = parse_player_list("['.BedrockKid', 'JavaGuy']").unwrap();
        assert_eq!(players, vec!["BedrockKid", "JavaGuy"]);
    }

    #[test]
    fn test_strips_embedded_quotes() {
        let players = parse_player_list(r#"["\"Steve\""]"#).unwrap();
        assert_eq!(players, vec!["Steve"]);
    }

    #[test]
    fn test_discards_non_string_entries() {
        let players = parse_player_list("['Steve', 3, True, 'Alex']").unwrap();
        assert_eq!(players, vec!["Steve", "Alex"]);
    }

    #[test]
    fn test_name_containing_true_survives() {
        let players = parse_player_list("['TrueSteel']").unwrap();
        assert_eq!(players, vec!["TrueSteel"]);
    }

    #[test]
    fn test_garbage_is_a_warning_not_a_panic() {
        assert!(parse_player_list("['unterminated").is_err());
        assert!(parse_player_list("42").is_err());
        assert!(parse_player_list("{'a': 1}").is_err());
    }
}
