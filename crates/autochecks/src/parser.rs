//! Line parser for autochecks files.
//!
//! Records are recognized line by line without evaluating the file as a
//! whole, so a damaged line can be reported with its line number and the
//! parameter column can be carried through untouched.

use std::path::Path;

use tracing::warn;

use crate::error::{AutochecksError, Result};
use crate::literal::Value;
use crate::record::{AutocheckRecord, ServiceKey};

/// How to react to a malformed record line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Keep the records read so far, warn, and drop the rest of the file.
    #[default]
    Lenient,
    /// Fail with a parse error.
    Strict,
}

/// Split `text` at top-level commas.
///
/// A comma separates fields only outside of quotes and at bracket depth 0.
/// A backslash protects the following character. Fields are trimmed.
pub fn split_fields(text: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut quote: Option<char> = None;
    let mut depth: i32 = 0;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            c if quote == Some(c) => quote = None,
            '"' | '\'' if quote.is_none() => quote = Some(c),
            _ if quote.is_some() => {}
            '(' | '{' | '[' => depth += 1,
            ')' | '}' | ']' => depth -= 1,
            ',' if depth == 0 => {
                fields.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    fields.push(text[start..].trim());
    fields
}

/// Drop a trailing `#` comment unless a quote follows the last `#`.
fn strip_comment(line: &str) -> &str {
    match line.rfind('#') {
        Some(i) if i > 0 => {
            let rest = &line[i..];
            if rest.contains('"') || rest.contains('\'') {
                line
            } else {
                line[..i].trim()
            }
        }
        _ => line,
    }
}

/// Parse one line of an autochecks file.
///
/// Returns `Ok(None)` for lines that carry no record (the list brackets,
/// blank lines, comments).
pub fn parse_line(line: &str) -> std::result::Result<Option<AutocheckRecord>, String> {
    let line = line.trim();
    if !line.starts_with('(') {
        return Ok(None);
    }

    let line = strip_comment(line);
    let line = line.strip_suffix(',').unwrap_or(line).trim_end();
    let inner = line
        .strip_prefix('(')
        .and_then(|l| l.strip_suffix(')'))
        .ok_or_else(|| "record is not enclosed in parentheses".to_string())?;

    let mut fields = split_fields(inner);
    match fields.len() {
        3 => {}
        // Legacy layout with the host name in front.
        4 => {
            fields.remove(0);
        }
        n => return Err(format!("Invalid number of parts: {n}")),
    }

    let check_type = match Value::parse(fields[0]) {
        Ok(Value::Str(s)) if !s.is_empty() => s,
        Ok(other) => return Err(format!("check type must be a string, got {}", other.type_name())),
        Err(e) => return Err(format!("check type: {e}")),
    };

    let item = match Value::parse(fields[1]) {
        Ok(Value::Str(s)) => Some(s),
        Ok(Value::None) => None,
        Ok(other) => return Err(format!("item must be a string or None, got {}", other.type_name())),
        Err(e) => return Err(format!("item: {e}")),
    };

    let paramstring = fields[2];
    if paramstring.is_empty() {
        return Err("empty parameter column".to_string());
    }

    Ok(Some(AutocheckRecord::new(
        ServiceKey::new(check_type, item),
        paramstring,
    )))
}

/// Parse the content of an autochecks file. `path` is used for diagnostics.
pub fn parse_autochecks(content: &str, path: &Path, mode: ParseMode) -> Result<Vec<AutocheckRecord>> {
    let mut records = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let lineno = index + 1;
        match parse_line(line) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(reason) => {
                if mode == ParseMode::Strict {
                    return Err(AutochecksError::parse(path, lineno, reason));
                }
                warn!(
                    path = %path.display(),
                    line = lineno,
                    %reason,
                    kept = records.len(),
                    "Invalid autochecks line, ignoring the rest of the file"
                );
                break;
            }
        }
    }
    Ok(records)
}
