//! Migration Loader - turns an artifact location into its up/down statements
//!
//! Artifacts are SQL files split into sections by marker comments:
//!
//! ```sql
//! -- migrate:up
//! CREATE TABLE widgets (id serial PRIMARY KEY);
//!
//! -- migrate:down
//! DROP TABLE widgets;
//! ```

use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::tokenizer::{Token, Tokenizer};
use std::fs;
use std::path::Path;

use crate::definitions::{MigrationDirection, MigrationSource};
use crate::error::{MigrateError, MigrateResult};

/// Maps an artifact location to its forward and reverse statements
pub trait MigrationLoader: Send + Sync {
    fn load(&self, location: &Path) -> MigrateResult<MigrationSource>;
}

/// Loader for `.sql` artifacts with `-- migrate:up` / `-- migrate:down` sections
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlFileLoader;

impl MigrationLoader for SqlFileLoader {
    fn load(&self, location: &Path) -> MigrateResult<MigrationSource> {
        let content = fs::read_to_string(location).map_err(|e| MigrateError::ArtifactRead {
            path: location.to_path_buf(),
            source: e,
        })?;
        parse_migration_content(&content).map_err(|reason| MigrateError::InvalidArtifact {
            path: location.to_path_buf(),
            reason,
        })
    }
}

/// Recognize a section marker line
fn section_marker(line: &str) -> Option<MigrationDirection> {
    let comment = line.trim().strip_prefix("--")?.trim().to_lowercase();
    match comment.as_str() {
        "migrate:up" | "up migration" => Some(MigrationDirection::Up),
        "migrate:down" | "down migration" => Some(MigrationDirection::Down),
        _ => None,
    }
}

/// Split artifact content into up and down statements
pub fn parse_migration_content(content: &str) -> Result<MigrationSource, String> {
    let mut up = String::new();
    let mut down = String::new();
    let mut current = None;
    let mut seen_up = false;

    for line in content.lines() {
        if let Some(direction) = section_marker(line) {
            if direction == MigrationDirection::Up {
                if seen_up {
                    return Err("more than one up section".to_string());
                }
                seen_up = true;
            } else if current == Some(MigrationDirection::Down) {
                return Err("more than one down section".to_string());
            }
            current = Some(direction);
            continue;
        }

        // Anything before the first marker is a header.
        let section = match current {
            Some(MigrationDirection::Up) => &mut up,
            Some(MigrationDirection::Down) => &mut down,
            None => continue,
        };
        section.push_str(line);
        section.push('\n');
    }

    if !seen_up {
        return Err("missing `-- migrate:up` section".to_string());
    }

    Ok(MigrationSource {
        up: split_statements(&up),
        down: split_statements(&down),
    })
}

/// Split SQL text into statements at top-level semicolons.
///
/// Uses the Postgres tokenizer so semicolons inside strings, comments and
/// dollar-quoted bodies are left alone; statement text is kept verbatim.
pub fn split_statements(sql: &str) -> Vec<String> {
    let dialect = PostgreSqlDialect {};
    let tokens = match Tokenizer::new(&dialect, sql).tokenize_with_location() {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::warn!("SQL tokenizing failed, using naive semicolon splitting: {}", e);
            return sql
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty() && !is_comment_only(s))
                .map(str::to_string)
                .collect();
        }
    };

    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(sql.match_indices('\n').map(|(i, _)| i + 1))
        .collect();

    let mut statements = Vec::new();
    let mut start = 0;
    let mut has_content = false;

    for token in tokens {
        match token.token {
            Token::SemiColon => {
                let end = byte_offset(
                    sql,
                    &line_starts,
                    token.location.line as usize,
                    token.location.column as usize,
                );
                if has_content {
                    statements.push(sql[start..end].trim().to_string());
                }
                start = (end + 1).min(sql.len());
                has_content = false;
            }
            Token::Whitespace(_) | Token::EOF => {}
            _ => has_content = true,
        }
    }

    if has_content {
        statements.push(sql[start..].trim().to_string());
    }
    statements
}

/// Byte offset of a 1-based line/column (columns count characters)
fn byte_offset(sql: &str, line_starts: &[usize], line: usize, column: usize) -> usize {
    let line_start = line_starts
        .get(line.saturating_sub(1))
        .copied()
        .unwrap_or(sql.len());
    sql[line_start..]
        .char_indices()
        .nth(column.saturating_sub(1))
        .map(|(offset, _)| line_start + offset)
        .unwrap_or(sql.len())
}

fn is_comment_only(sql: &str) -> bool {
    sql.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}
