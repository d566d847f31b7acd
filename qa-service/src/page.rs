//! The single-page shell: title, connection banner, question form, output
//! region and the example sidebar.

use std::fmt;

use common::models::question::{AskOutcome, EXAMPLE_QUESTIONS};

use crate::render::{Escaped, OutcomeHtml};

pub const CONNECTED_BANNER: &str = "Connected successfully to the database!";
pub const INPUT_LABEL: &str = "Enter your question about the retail sales database:";
pub const SIDEBAR_TITLE: &str = "Example Questions";

const STYLE: &str = "\
body{margin:0;font-family:system-ui,sans-serif;display:flex;color:#262730}
aside{width:280px;min-height:100vh;background:#f0f2f6;padding:1.5rem;box-sizing:border-box}
main{flex:1;padding:2rem 3rem;max-width:960px}
.banner{background:#dff5e3;color:#1b5e20;padding:.75rem 1rem;border-radius:.4rem}
.error{background:#fde8e8;color:#8a1c1c;padding:.75rem 1rem;border-radius:.4rem;margin:1rem 0}
.notice{color:#555}
form input[type=text]{width:100%;padding:.5rem;font-size:1rem;box-sizing:border-box}
form button{margin-top:.75rem;padding:.4rem 1.2rem;font-size:1rem}
pre.sql{background:#f6f8fa;padding:.75rem;border-radius:.4rem;overflow-x:auto}
table.result{border-collapse:collapse;margin:.5rem 0}
table.result th,table.result td{border:1px solid #ddd;padding:.3rem .6rem}
td.num{text-align:right}
svg.chart .bar{fill:#4c78a8}
svg.chart .axis{stroke:#888}
svg.chart text{font-size:11px;fill:#444}
";

/// A rendered page, with or without an outcome to show.
pub struct Page<'a> {
    pub title: &'a str,
    pub question: &'a str,
    pub outcome: Option<&'a AskOutcome>,
}

impl<'a> Page<'a> {
    pub fn new(title: &'a str) -> Self {
        Self {
            title,
            question: "",
            outcome: None,
        }
    }

    pub fn with_outcome(mut self, question: &'a str, outcome: &'a AskOutcome) -> Self {
        self.question = question;
        self.outcome = Some(outcome);
        self
    }
}

impl fmt::Display for Page<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<!DOCTYPE html>")?;
        writeln!(f, "<html lang=\"en\">")?;
        writeln!(f, "<head>")?;
        writeln!(f, "<meta charset=\"utf-8\">")?;
        writeln!(f, "<title>{}</title>", Escaped(self.title))?;
        writeln!(f, "<style>\n{}</style>", STYLE)?;
        writeln!(f, "</head>")?;
        writeln!(f, "<body>")?;

        writeln!(f, "<aside>")?;
        writeln!(f, "<h2>{}</h2>", SIDEBAR_TITLE)?;
        for (i, example) in EXAMPLE_QUESTIONS.iter().enumerate() {
            writeln!(f, "<p>{}. {}</p>", i + 1, Escaped(example))?;
        }
        writeln!(f, "</aside>")?;

        writeln!(f, "<main>")?;
        writeln!(f, "<h1>{}</h1>", Escaped(self.title))?;
        writeln!(f, "<div class=\"banner\">{}</div>", CONNECTED_BANNER)?;
        writeln!(f, "<form method=\"post\" action=\"/\">")?;
        writeln!(f, "<label for=\"question\">{}</label>", INPUT_LABEL)?;
        writeln!(
            f,
            "<input type=\"text\" id=\"question\" name=\"question\" value=\"{}\" autocomplete=\"off\">",
            Escaped(self.question)
        )?;
        writeln!(f, "<button type=\"submit\">Execute</button>")?;
        writeln!(f, "</form>")?;
        writeln!(f, "<section id=\"output\">")?;
        if let Some(outcome) = self.outcome {
            write!(f, "{}", OutcomeHtml(outcome))?;
        }
        writeln!(f, "</section>")?;
        writeln!(f, "</main>")?;

        writeln!(f, "</body>")?;
        writeln!(f, "</html>")
    }
}
