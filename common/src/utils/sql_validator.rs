//! SQL statement validator.
//!
//! Keeps generated statements to a single read-only statement before they
//! reach the database. The text is tokenized just far enough to tell code
//! from string literals, quoted identifiers and comments, and to find
//! top-level `;` separators.

use std::iter::Peekable;
use std::str::Chars;

use crate::errors::AppError;

/// Validates SQL statements for security.
pub struct SqlValidator;

/// Statements allowed to start a generated query.
const READ_KEYWORDS: [&str; 6] = ["SELECT", "WITH", "SHOW", "DESCRIBE", "DESC", "EXPLAIN"];

/// List of forbidden SQL keywords for security.
const FORBIDDEN_KEYWORDS: [&str; 6] = ["DROP", "TRUNCATE", "DELETE", "ALTER", "INSERT", "UPDATE"];

/// Lexical rules a statement is scanned under.
///
/// Both are checked and the stricter verdict wins, so a literal that one
/// database would close early cannot hide a second statement from the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    /// Doubled quotes escape, `--` always starts a comment.
    Standard,
    /// Backslash escapes, `#` comments, `--` needs trailing whitespace and
    /// the body of `/*! ... */` is executed.
    MySql,
}

const DIALECTS: [Dialect; 2] = [Dialect::Standard, Dialect::MySql];

type Cursor<'a> = Peekable<Chars<'a>>;

/// One `;`-separated statement, reduced to its bare words.
#[derive(Debug, Default)]
struct Statement {
    /// Uppercased words outside literals and comments.
    words: Vec<String>,
    /// Something other than `(` came before the first word.
    opaque_start: bool,
    has_content: bool,
}

impl Statement {
    fn push_word(&mut self, word: String) {
        self.has_content = true;
        self.words.push(word);
    }

    fn mark_opaque(&mut self) {
        if self.words.is_empty() {
            self.opaque_start = true;
        }
        self.has_content = true;
    }

    fn leading_keyword(&self) -> Option<&str> {
        if self.opaque_start {
            return None;
        }
        self.words.first().map(String::as_str)
    }
}

impl SqlValidator {
    /// Validates that the text holds exactly one statement.
    ///
    /// A trailing `;` and separators inside literals or comments do not count.
    ///
    /// # Errors
    /// Returns `AppError::UnsafeSql` for an empty text or more than one
    /// statement.
    pub fn validate_single_statement(sql: &str) -> Result<(), AppError> {
        for dialect in DIALECTS {
            Self::single_statement(sql, dialect)?;
        }
        Ok(())
    }

    /// Validates that the text is one statement that only reads data.
    ///
    /// # Errors
    /// Returns `AppError::UnsafeSql` for an empty text, more than one
    /// statement, a statement that does not start with a read keyword, or one
    /// containing a forbidden keyword as a whole word outside string literals
    /// (e.g. a data-modifying CTE).
    pub fn validate_read_only(sql: &str) -> Result<(), AppError> {
        for dialect in DIALECTS {
            let statement = Self::single_statement(sql, dialect)?;
            let first = statement.leading_keyword().ok_or_else(|| {
                AppError::UnsafeSql("statement does not start with a keyword".into())
            })?;
            if !READ_KEYWORDS.contains(&first) {
                return Err(AppError::UnsafeSql(format!(
                    "only read statements are allowed, got {}",
                    first
                )));
            }

            if let Some(keyword) = statement
                .words
                .iter()
                .find(|w| FORBIDDEN_KEYWORDS.contains(&w.as_str()))
            {
                return Err(AppError::UnsafeSql(format!(
                    "forbidden operation: {}",
                    keyword
                )));
            }
        }
        Ok(())
    }

    fn single_statement(sql: &str, dialect: Dialect) -> Result<Statement, AppError> {
        let mut statements = split_statements(sql, dialect);
        match statements.len() {
            0 => Err(AppError::UnsafeSql("empty statement".into())),
            1 => Ok(statements.remove(0)),
            n => Err(AppError::UnsafeSql(format!(
                "multiple statements are not allowed ({} found)",
                n
            ))),
        }
    }
}

fn split_statements(sql: &str, dialect: Dialect) -> Vec<Statement> {
    let mut statements = Vec::new();
    let mut current = Statement::default();
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ';' => {
                let done = std::mem::take(&mut current);
                if done.has_content {
                    statements.push(done);
                }
            }
            '\'' | '"' | '`' => {
                skip_quoted(&mut chars, c, dialect);
                current.mark_opaque();
            }
            '-' if chars.peek() == Some(&'-') => {
                chars.next();
                if dialect == Dialect::MySql && !chars.peek().map_or(true, |c| c.is_whitespace()) {
                    current.mark_opaque();
                } else {
                    skip_line(&mut chars);
                }
            }
            '#' if dialect == Dialect::MySql => skip_line(&mut chars),
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                if dialect == Dialect::MySql && chars.next_if_eq(&'!').is_some() {
                    while chars.next_if(|c| c.is_ascii_digit()).is_some() {}
                } else {
                    skip_block_comment(&mut chars);
                }
            }
            c if is_word_char(c) => {
                let mut word = String::from(c);
                while let Some(next) = chars.next_if(|c| is_word_char(*c)) {
                    word.push(next);
                }
                current.push_word(word.to_uppercase());
            }
            c if c.is_whitespace() => {}
            '(' => current.has_content = true,
            _ => current.mark_opaque(),
        }
    }

    if current.has_content {
        statements.push(current);
    }
    statements
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Consumes up to and including the closing quote. Unterminated text runs to the end.
fn skip_quoted(chars: &mut Cursor<'_>, quote: char, dialect: Dialect) {
    while let Some(c) = chars.next() {
        if c == '\\' && quote != '`' && dialect == Dialect::MySql {
            chars.next();
            continue;
        }
        if c == quote {
            if chars.next_if_eq(&quote).is_some() {
                continue;
            }
            return;
        }
    }
}

fn skip_line(chars: &mut Cursor<'_>) {
    for c in chars.by_ref() {
        if c == '\n' {
            return;
        }
    }
}

fn skip_block_comment(chars: &mut Cursor<'_>) {
    let mut prev = '\0';
    for c in chars.by_ref() {
        if prev == '*' && c == '/' {
            return;
        }
        prev = c;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_is_allowed() {
        assert!(SqlValidator::validate_read_only("SELECT * FROM sales").is_ok());
        assert!(SqlValidator::validate_read_only("  with t AS (SELECT 1) SELECT * FROM t").is_ok());
        assert!(SqlValidator::validate_read_only("(SELECT 1) UNION (SELECT 2)").is_ok());
        assert!(SqlValidator::validate_read_only("SELECT 1;").is_ok());
        assert!(SqlValidator::validate_read_only("-- total\nSELECT SUM(total_amount) FROM sales").is_ok());
    }

    #[test]
    fn test_drop_is_forbidden() {
        assert!(SqlValidator::validate_read_only("DROP TABLE sales").is_err());
    }

    #[test]
    fn test_writes_are_forbidden() {
        assert!(SqlValidator::validate_read_only("INSERT INTO sales VALUES (1)").is_err());
        assert!(SqlValidator::validate_read_only("update sales set x = 1").is_err());
        assert!(SqlValidator::validate_read_only(
            "WITH gone AS (DELETE FROM sales RETURNING *) SELECT * FROM gone"
        )
        .is_err());
    }

    #[test]
    fn test_empty_is_rejected() {
        assert!(matches!(
            SqlValidator::validate_read_only("   "),
            Err(AppError::UnsafeSql(_))
        ));
        assert!(SqlValidator::validate_single_statement(" ; ;").is_err());
        assert!(SqlValidator::validate_single_statement("/* nothing */").is_err());
    }

    #[test]
    fn test_keyword_must_be_whole_word() {
        assert!(SqlValidator::validate_read_only("SELECTED FROM x").is_err());
        assert!(SqlValidator::validate_read_only("select * FROM sales").is_ok());
        assert!(SqlValidator::validate_read_only("SELECT last_update, dropped_at FROM sales").is_ok());
    }

    #[test]
    fn test_keywords_inside_literals_are_ignored() {
        let allowed = [
            "SELECT COUNT(*) AS n FROM sales WHERE customer_id = 'WALTER DROP CUSTOMER'",
            "SELECT * FROM sales WHERE customer_id = 'Walter White'",
            "SELECT * FROM sales WHERE product_category = 'backdrop '",
            "SELECT * FROM sales WHERE gender <> 'delete from'",
            "SELECT 'it''s; DROP TABLE sales' AS note",
            "SELECT `update` FROM sales",
            "SELECT 1 /* ; DELETE FROM sales */",
        ];
        for sql in allowed {
            assert!(SqlValidator::validate_read_only(sql).is_ok(), "rejected {:?}", sql);
        }
    }

    #[test]
    fn test_multiple_statements_are_rejected() {
        let err = SqlValidator::validate_single_statement(
            "SELECT 1; INSERT INTO sales VALUES (99, '2023-01-01')",
        )
        .unwrap_err();
        assert!(err.to_string().contains("multiple statements"));

        assert!(SqlValidator::validate_single_statement("SELECT 1; SELECT 2").is_err());
        assert!(SqlValidator::validate_read_only("SELECT 1; SELECT 2").is_err());
        assert!(SqlValidator::validate_single_statement("SELECT 'a;b' ;").is_ok());
        assert!(SqlValidator::validate_single_statement("SELECT 1 -- ; DROP TABLE sales").is_ok());
    }

    #[test]
    fn test_escape_rules_of_either_database_cannot_hide_a_statement() {
        // MySQL closes this literal after `\'`, SQLite after `'\'`.
        assert!(SqlValidator::validate_single_statement(
            r"SELECT '\''; DROP TABLE sales; -- '"
        )
        .is_err());
        // MySQL reads `1--1` as arithmetic, not a comment.
        assert!(SqlValidator::validate_single_statement("SELECT 1--1; DROP TABLE sales").is_err());
        // MySQL executes the body of versioned comments.
        assert!(SqlValidator::validate_read_only("SELECT 1 /*!50000 , (DELETE) */").is_err());
    }
}
