//! Cleanup of model-generated SQL text.
//!
//! Language models like to wrap statements in markdown fences and quote
//! identifiers with backticks. This is a textual cleanup, not a parser:
//! anything it does not recognize is left for the database to reject.

/// Alias the model tends to emit with spaces.
const SPACED_ALIAS: &str = "Number of Customers";
const JOINED_ALIAS: &str = "Number_of_Customers";

/// Normalizes generated SQL text.
pub struct SqlSanitizer;

impl SqlSanitizer {
    /// Cleans a generated statement.
    ///
    /// One pass strips surrounding backticks, strips a leading `sql` language
    /// tag and surrounding whitespace, removes every remaining backtick and
    /// joins the `Number of Customers` alias. Passes repeat until the text
    /// stops changing, so the result is a fixed point and sanitizing it again
    /// returns it unchanged.
    pub fn sanitize(generated: &str) -> String {
        let mut current = Self::pass(generated);
        loop {
            let next = Self::pass(&current);
            if next == current {
                return current;
            }
            current = next;
        }
    }

    fn pass(text: &str) -> String {
        let text = text.trim_matches('`');
        let text = text.strip_prefix("sql").unwrap_or(text).trim();
        text.replace('`', "").replace(SPACED_ALIAS, JOINED_ALIAS)
    }
}
