//! Rule expression validation and compilation.
//!
//! An expression is a dot-segment domain pattern with an optional
//! `cookieName@` qualifier. Within the pattern, a leading `*` matches the
//! remaining segments with any chain of subdomains in front (including
//! none), while a `*` in any other position matches exactly one segment:
//!
//! - `*.example.com` matches `example.com`, `a.example.com`, `a.b.example.com`
//! - `a.*.com` matches `a.b.com` but not `a.com` or `a.b.c.com`
//! - `sess*@*.example.com` is invalid (`*` must stand alone); `sessionid@*.example.com` is fine
//!
//! Compilation happens once per rule-set change; lookups only run the
//! compiled regex.

use crate::base::error::CleanupError;
use regex::Regex;

/// A compiled rule expression: domain matcher plus optional cookie name.
#[derive(Debug)]
pub struct CompiledExpression {
    pub regex: Regex,
    pub cookie_name: Option<String>,
}

/// Compile `expression`, rejecting malformed input.
pub fn compile_expression(expression: &str) -> Result<CompiledExpression, CleanupError> {
    let lower = expression.trim().to_lowercase();
    if lower.is_empty() {
        return Err(CleanupError::invalid_expression(expression, "empty expression"));
    }

    let (cookie_name, pattern) = match lower.split_once('@') {
        None => (None, lower.as_str()),
        Some((name, domain)) => {
            if name.is_empty() {
                return Err(CleanupError::invalid_expression(expression, "empty cookie name"));
            }
            if domain.contains('@') {
                return Err(CleanupError::invalid_expression(expression, "multiple '@'"));
            }
            (Some(name.to_string()), domain)
        }
    };

    let regex = compile_domain_pattern(expression, pattern)?;
    Ok(CompiledExpression { regex, cookie_name })
}

fn compile_domain_pattern(original: &str, pattern: &str) -> Result<Regex, CleanupError> {
    if pattern.is_empty() {
        return Err(CleanupError::invalid_expression(original, "empty domain pattern"));
    }

    let segments: Vec<&str> = pattern.split('.').collect();
    let mut source = String::from("^");

    for (index, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            return Err(CleanupError::invalid_expression(original, "empty segment"));
        }
        if segment.contains('*') && *segment != "*" {
            return Err(CleanupError::invalid_expression(
                original,
                "'*' must be a whole segment",
            ));
        }
        if *segment != "*"
            && !segment.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(CleanupError::invalid_expression(original, "invalid characters"));
        }

        if *segment == "*" && index == 0 {
            // Any chain of subdomains, or none at all.
            source.push_str(r"(?:[^.]+\.)*");
            if segments.len() == 1 {
                source.push_str(r"[^.]+");
            }
            continue;
        }
        if index > 0 && !(index == 1 && segments[0] == "*") {
            source.push_str(r"\.");
        }
        if *segment == "*" {
            source.push_str(r"[^.]+");
        } else {
            source.push_str(&regex::escape(segment));
        }
    }
    source.push('$');

    Regex::new(&source)
        .map_err(|e| CleanupError::invalid_expression(original, e.to_string()))
}
