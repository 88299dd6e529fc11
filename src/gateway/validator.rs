//! SQL Query Validator
//!
//! Read-mostly policy for user statements: a statement must open with an
//! allowed prefix and must not contain a mutating or escaping pattern.
//! Uses the Chain of Responsibility pattern for validation rules.

use crate::core::{Result, StageError};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::fmt;

/// Statement openings accepted by the gateway, in normalized form.
pub const ALLOWED_PREFIXES: &[&str] = &[
    "select",
    "with",
    "pragma",
    "explain",
    "create temporary table",
    "create temp table",
    "create view",
    "create temporary view",
    "create temp view",
    "drop view",
    "drop temporary table",
    "drop temp table",
];

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref DENY_PATTERNS: Vec<(Regex, &'static str)> = vec![
        (Regex::new(r"\bdrop\s+table\b").unwrap(), "DROP TABLE"),
        (Regex::new(r"\bdelete\b.*?\bfrom\b").unwrap(), "DELETE FROM"),
        (Regex::new(r"\bupdate\b.*?\bset\b").unwrap(), "UPDATE ... SET"),
        (Regex::new(r"\balter\s+table\b").unwrap(), "ALTER TABLE"),
        (Regex::new(r"\bcreate\s+table\b").unwrap(), "CREATE TABLE"),
        (Regex::new(r"\battach\b").unwrap(), "ATTACH"),
        (Regex::new(r"\bdetach\b").unwrap(), "DETACH"),
    ];
    // INSERT, INSERT OR <action> and REPLACE all name their target after INTO.
    static ref INSERT_INTO: Regex = Regex::new(r"\b(?:insert|replace)\b.*?\binto\b\s*").unwrap();
    static ref TEMP_QUALIFIER: Regex =
        Regex::new(r#"^(?:temp|"temp"|\[temp\]|`temp`)\s*\."#).unwrap();
}

/// Kind of an accepted statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Select,
    Cte,
    Pragma,
    Explain,
    CreateTemp,
}

impl QueryType {
    /// Classifies a normalized statement that passed the prefix check.
    pub fn of(normalized: &str) -> Self {
        if normalized.starts_with("select") {
            QueryType::Select
        } else if normalized.starts_with("with") {
            QueryType::Cte
        } else if normalized.starts_with("pragma") {
            QueryType::Pragma
        } else if normalized.starts_with("explain") {
            QueryType::Explain
        } else {
            QueryType::CreateTemp
        }
    }

    /// Whether the statement returns data rows of user tables.
    pub fn is_read(self) -> bool {
        matches!(self, QueryType::Select | QueryType::Cte)
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryType::Select => "select",
            QueryType::Cte => "cte",
            QueryType::Pragma => "pragma",
            QueryType::Explain => "explain",
            QueryType::CreateTemp => "create_temp",
        };
        write!(f, "{}", name)
    }
}

/// Trims, collapses whitespace and lower-cases a statement.
pub fn normalize(sql: &str) -> String {
    WHITESPACE.replace_all(sql.trim(), " ").to_lowercase()
}

/// Trait for validation rules (Chain of Responsibility pattern)
pub trait ValidationRule: Send + Sync {
    fn validate(&self, normalized: &str) -> Result<()>;
}

/// Statement must open with one of `ALLOWED_PREFIXES`
#[derive(Debug, Clone, Default)]
pub struct AllowedPrefixRule;

impl AllowedPrefixRule {
    fn allowed_list() -> String {
        ALLOWED_PREFIXES
            .iter()
            .map(|p| p.to_uppercase())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl ValidationRule for AllowedPrefixRule {
    fn validate(&self, normalized: &str) -> Result<()> {
        let allowed = ALLOWED_PREFIXES.iter().any(|prefix| {
            normalized
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.is_empty() || !is_word_char(rest.chars().next()))
        });

        if allowed {
            Ok(())
        } else {
            Err(StageError::QueryNotAllowed {
                allowed: Self::allowed_list(),
            })
        }
    }
}

fn is_word_char(c: Option<char>) -> bool {
    c.is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Rejects statements that modify or escape the staged tables
#[derive(Debug, Clone, Default)]
pub struct ForbiddenPatternRule;

impl ValidationRule for ForbiddenPatternRule {
    fn validate(&self, normalized: &str) -> Result<()> {
        for (pattern, name) in DENY_PATTERNS.iter() {
            if pattern.is_match(normalized) {
                return Err(StageError::ForbiddenStatement(format!(
                    "{} is not permitted on staged data",
                    name
                )));
            }
        }

        for found in INSERT_INTO.find_iter(normalized) {
            if !TEMP_QUALIFIER.is_match(&normalized[found.end()..]) {
                return Err(StageError::ForbiddenStatement(
                    "INSERT INTO is only permitted on temp.* tables".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Main query validator using Chain of Responsibility
pub struct QueryValidator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl QueryValidator {
    /// Create validator with default rules. Prefix check runs first.
    pub fn new() -> Self {
        Self {
            rules: vec![Box::new(AllowedPrefixRule), Box::new(ForbiddenPatternRule)],
        }
    }

    /// Validate a statement against all rules and classify it
    pub fn validate(&self, sql: &str) -> Result<QueryType> {
        let normalized = normalize(sql);
        if normalized.is_empty() {
            return Err(StageError::Validation("Empty query".to_string()));
        }

        for rule in &self.rules {
            rule.validate(&normalized)?;
        }

        Ok(QueryType::of(&normalized))
    }
}

impl Default for QueryValidator {
    fn default() -> Self {
        Self::new()
    }
}
