//! Command string syntax
//!
//! Letters and digits stand for their own key. Braces name a key, with an
//! optional repeat count: `{enter}`, `{left 3}`, `{control}`.

use crate::error::ConfigError;
use crate::key::Key;

pub fn parse_sequence(command: &str) -> Result<Vec<Key>, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidCommand {
        command: command.to_string(),
        reason,
    };

    let mut keys = Vec::new();
    let mut rest = command;
    while let Some(c) = rest.chars().next() {
        match c {
            '{' => {
                let end = rest
                    .find('}')
                    .ok_or_else(|| invalid("no closing '}' for '{'".to_string()))?;
                let group = rest[1..end].trim();
                if group.is_empty() {
                    return Err(invalid("empty key group".to_string()));
                }
                keys.extend(parse_group(group, invalid)?);
                rest = &rest[end + 1..];
            }
            '}' => return Err(invalid("unexpected '}'".to_string())),
            c => {
                let key = Key::from_char(c).ok_or_else(|| invalid(format!("illegal character '{c}'")))?;
                keys.push(key);
                rest = &rest[c.len_utf8()..];
            }
        }
    }

    validate(&keys)?;
    Ok(keys)
}

fn parse_group(
    group: &str,
    invalid: impl Fn(String) -> ConfigError,
) -> Result<impl Iterator<Item = Key>, ConfigError> {
    let mut parts = group.split_whitespace();
    let key: Key = parts.next().unwrap_or_default().parse()?;
    let count = match parts.next() {
        Some(count) => count
            .parse::<usize>()
            .map_err(|_| invalid(format!("bad repeat count '{count}'")))?,
        None => 1,
    };
    if parts.next().is_some() {
        return Err(invalid(format!("unexpected text in '{{{group}}}'")));
    }
    Ok(std::iter::repeat(key).take(count))
}

/// A command needs at least one key and no mouse input
pub fn validate(keys: &[Key]) -> Result<(), ConfigError> {
    if keys.is_empty() {
        return Err(ConfigError::EmptyCommand);
    }
    match keys.iter().find(|key| key.is_mouse()) {
        Some(key) => Err(ConfigError::MouseKeyInCommand(*key)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_characters() {
        assert_eq!(parse_sequence("hi").unwrap(), vec![Key::H, Key::I]);
        assert_eq!(parse_sequence("A1").unwrap(), vec![Key::A, Key::D1]);
    }

    #[test]
    fn test_groups() {
        assert_eq!(
            parse_sequence("{a 3}b").unwrap(),
            vec![Key::A, Key::A, Key::A, Key::B]
        );
        assert_eq!(
            parse_sequence("{control}{Enter}").unwrap(),
            vec![Key::Ctrl, Key::Enter]
        );
        assert_eq!(parse_sequence("{7}").unwrap(), vec![Key::D7]);
    }

    #[test]
    fn test_malformed_commands() {
        for command in ["{a", "a}", "{}", "{ }", "{a x}", "{a 2 3}", "a b", "ä"] {
            assert!(
                matches!(
                    parse_sequence(command),
                    Err(ConfigError::InvalidCommand { .. })
                ),
                "{command} should be invalid"
            );
        }
    }

    #[test]
    fn test_unknown_key_name() {
        assert_eq!(
            parse_sequence("{nope}"),
            Err(ConfigError::UnknownKey("nope".to_string()))
        );
    }

    #[test]
    fn test_empty_and_mouse_sequences() {
        assert_eq!(parse_sequence(""), Err(ConfigError::EmptyCommand));
        assert_eq!(parse_sequence("{a 0}"), Err(ConfigError::EmptyCommand));
        assert_eq!(
            parse_sequence("a{lbutton}"),
            Err(ConfigError::MouseKeyInCommand(Key::LButton))
        );
    }
}
