//! Allow-listing for operator-supplied SQL.
//!
//! The text is scanned once, skipping string literals, quoted identifiers and
//! comments, so that keywords are only matched where SQLite would read them.

use crate::error::QueryError;

const LEADING_KEYWORDS: [&str; 3] = ["SELECT", "WITH", "VALUES"];

// REPLACE is also a scalar function; a REPLACE INTO statement is caught by the
// leading keyword check instead.
const WRITE_KEYWORDS: [&str; 12] = [
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "ATTACH", "DETACH", "PRAGMA",
    "VACUUM", "REINDEX", "TRUNCATE",
];

/// Returns the statement with any trailing semicolon removed when it is a
/// single read-only query.
pub fn check(sql: &str) -> Result<&str, QueryError> {
    let scan = scan(sql);

    if scan.words.is_empty() {
        return Err(QueryError::Empty);
    }

    if scan.content_after_semicolon {
        return Err(QueryError::MultipleStatements);
    }

    if let Some(word) = scan
        .words
        .iter()
        .find(|word| WRITE_KEYWORDS.contains(&word.as_str()))
    {
        return Err(QueryError::NotReadOnly {
            keyword: word.clone(),
        });
    }

    let first = &scan.words[0];
    if !LEADING_KEYWORDS.contains(&first.as_str()) {
        return Err(QueryError::UnsupportedStatement {
            keyword: first.clone(),
        });
    }

    let statement = match scan.first_semicolon {
        Some(pos) => &sql[..pos],
        None => sql,
    };
    Ok(statement.trim())
}

struct Scan {
    words: Vec<String>,
    content_after_semicolon: bool,
    first_semicolon: Option<usize>,
}

fn scan(sql: &str) -> Scan {
    let bytes = sql.as_bytes();
    let mut words = Vec::new();
    let mut content_after_semicolon = false;
    let mut first_semicolon = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let is_comment = (b == b'-' && bytes.get(i + 1) == Some(&b'-'))
            || (b == b'/' && bytes.get(i + 1) == Some(&b'*'));
        if first_semicolon.is_some() && b != b';' && !b.is_ascii_whitespace() && !is_comment {
            content_after_semicolon = true;
        }
        match b {
            b'\'' | b'"' | b'`' => {
                i = skip_quoted(bytes, i, b);
            }
            b'[' => {
                i = skip_quoted(bytes, i, b']');
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                i += 2;
            }
            b';' => {
                if first_semicolon.is_none() {
                    first_semicolon = Some(i);
                }
                i += 1;
            }
            _ if b.is_ascii_alphabetic() || b == b'_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                if first_semicolon.is_none() {
                    words.push(sql[start..i].to_ascii_uppercase());
                }
            }
            _ => i += 1,
        }
    }

    Scan {
        words,
        content_after_semicolon,
        first_semicolon,
    }
}

/// Index just past the closing quote. A doubled quote is an escaped quote.
fn skip_quoted(bytes: &[u8], open: usize, close: u8) -> usize {
    let mut i = open + 1;
    while i < bytes.len() {
        if bytes[i] == close {
            if close != b']' && bytes.get(i + 1) == Some(&close) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}
