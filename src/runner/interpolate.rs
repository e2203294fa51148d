//! Placeholder substitution for templates
//!
//! Templates reference variables as `$(NAME)`. `$$` is a literal `$`, and any
//! other `$` sequence (`${HOME}`, `$(cat file)`, `$1`) is handed to the shell
//! untouched. `$(NAME` not followed by `)` or whitespace is an error; use
//! `$$(` for command substitution that does not fit that shape.

use crate::error::{VariableError, VariableResult};
use regex::{Captures, Regex};
use std::sync::OnceLock;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$(?:\$|\(([A-Za-z_][A-Za-z0-9_]*)(\))?)").expect("placeholder pattern is valid")
    })
}

/// One recognized `$` sequence
enum Token<'a> {
    Escape,
    Variable(&'a str),
    Passthrough,
}

fn classify<'a>(template: &str, caps: &Captures<'a>) -> VariableResult<Token<'a>> {
    let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
    match (caps.get(1), caps.get(2)) {
        (Some(name), Some(_)) => Ok(Token::Variable(name.as_str())),
        // `$(cmd args` is shell command substitution; `$(NAME` followed by
        // anything else, or by nothing, is a placeholder missing its `)`
        (Some(_), None) => match template[end..].chars().next() {
            Some(c) if c.is_whitespace() => Ok(Token::Passthrough),
            _ => Err(VariableError::InvalidPlaceholder {
                template: template.to_string(),
            }),
        },
        (None, _) => Ok(Token::Escape),
    }
}

/// Substitute every placeholder in a single pass.
///
/// Replacement text is not rescanned; a value containing `$(X)` is
/// inserted as-is.
pub fn expand<F>(template: &str, mut lookup: F) -> VariableResult<String>
where
    F: FnMut(&str) -> VariableResult<String>,
{
    let re = placeholder_regex();
    let mut result = String::with_capacity(template.len());
    let mut last = 0;

    for caps in re.captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        result.push_str(&template[last..whole.start()]);
        match classify(template, &caps)? {
            Token::Escape => result.push('$'),
            Token::Variable(name) => result.push_str(&lookup(name)?),
            Token::Passthrough => result.push_str(whole.as_str()),
        }
        last = whole.end();
    }
    result.push_str(&template[last..]);

    Ok(result)
}

/// Names referenced by a template, first occurrence order, without duplicates
pub fn references(template: &str) -> VariableResult<Vec<String>> {
    let mut names: Vec<String> = Vec::new();
    for caps in placeholder_regex().captures_iter(template) {
        if let Token::Variable(name) = classify(template, &caps)? {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    Ok(names)
}
