//! HTML rendering of pipeline outcomes.
//!
//! Each view is a `Display` wrapper so the page can be assembled with plain
//! `write!` calls. Every piece of text that came from the user, the model or
//! the database goes through [`Escaped`].

use std::fmt;

use common::models::query::{display_value, BarChart, QueryResult};
use common::models::question::{Answer, AskOutcome, PipelineStage};

pub const RAW_QUERY_LABEL: &str = "Raw Generated SQL Query:";
pub const CLEAN_QUERY_LABEL: &str = "Cleaned SQL Query:";
pub const RESULT_LABEL: &str = "Query Result:";
pub const NO_RESULT_NOTICE: &str = "No result returned due to an error.";
pub const NO_ROWS_NOTICE: &str = "The query returned no rows.";

const CHART_WIDTH: f64 = 640.0;
const CHART_HEIGHT: f64 = 320.0;
const CHART_LEFT: f64 = 70.0;
const CHART_TOP: f64 = 20.0;
const CHART_BOTTOM: f64 = 70.0;
const CHART_RIGHT: f64 = 20.0;

/// HTML-escaped text.
pub struct Escaped<'a>(pub &'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut last = 0;
        for (i, c) in self.0.char_indices() {
            let entity = match c {
                '&' => "&amp;",
                '<' => "&lt;",
                '>' => "&gt;",
                '"' => "&quot;",
                '\'' => "&#39;",
                _ => continue,
            };
            f.write_str(&self.0[last..i])?;
            f.write_str(entity)?;
            last = i + c.len_utf8();
        }
        f.write_str(&self.0[last..])
    }
}

/// The output region for one Execute press.
pub struct OutcomeHtml<'a>(pub &'a AskOutcome);

impl fmt::Display for OutcomeHtml<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            AskOutcome::NeedsQuestion { message } => {
                writeln!(f, "<p class=\"notice\">{}</p>", Escaped(message))
            }
            AskOutcome::Answered(answer) => write_answer(f, answer),
        }
    }
}

fn write_answer(f: &mut fmt::Formatter<'_>, answer: &Answer) -> fmt::Result {
    if let Some(error) = &answer.error {
        writeln!(
            f,
            "<div class=\"error\" data-stage=\"{}\">An error occurred during {}: {}</div>",
            stage_key(error.stage),
            stage_label(error.stage),
            Escaped(&error.message)
        )?;
    }
    if let Some(sql) = &answer.generated_query {
        write_query_block(f, RAW_QUERY_LABEL, sql)?;
    }
    if let Some(sql) = &answer.sanitized_query {
        write_query_block(f, CLEAN_QUERY_LABEL, sql)?;
    }

    match &answer.result {
        Some(result) => {
            writeln!(f, "<p class=\"label\">{}</p>", RESULT_LABEL)?;
            write!(f, "{}", TableHtml(result))?;
            if let Some(chart) = &answer.chart {
                write!(f, "{}", ChartSvg(chart))?;
            }
            Ok(())
        }
        None => writeln!(f, "<p class=\"notice\">{}</p>", NO_RESULT_NOTICE),
    }
}

fn write_query_block(f: &mut fmt::Formatter<'_>, label: &str, sql: &str) -> fmt::Result {
    writeln!(f, "<p class=\"label\">{}</p>", label)?;
    writeln!(f, "<pre class=\"sql\"><code>{}</code></pre>", Escaped(sql))
}

fn stage_key(stage: PipelineStage) -> &'static str {
    match stage {
        PipelineStage::Schema => "schema",
        PipelineStage::Generation => "generation",
        PipelineStage::Execution => "execution",
    }
}

fn stage_label(stage: PipelineStage) -> &'static str {
    match stage {
        PipelineStage::Schema => "schema introspection",
        PipelineStage::Generation => "query generation",
        PipelineStage::Execution => "query execution",
    }
}

/// Result set as an HTML table.
pub struct TableHtml<'a>(pub &'a QueryResult);

impl fmt::Display for TableHtml<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = self.0;
        writeln!(f, "<table class=\"result\">")?;
        write!(f, "<thead><tr>")?;
        for column in &result.columns {
            write!(
                f,
                "<th title=\"{}\">{}</th>",
                Escaped(&column.data_type),
                Escaped(&column.name)
            )?;
        }
        writeln!(f, "</tr></thead>")?;
        writeln!(f, "<tbody>")?;
        for row in &result.rows {
            write!(f, "<tr>")?;
            for value in row {
                let class = if value.is_number() { " class=\"num\"" } else { "" };
                write!(f, "<td{}>{}</td>", class, Escaped(&display_value(value)))?;
            }
            writeln!(f, "</tr>")?;
        }
        writeln!(f, "</tbody>")?;
        writeln!(f, "</table>")?;
        if result.rows.is_empty() {
            writeln!(f, "<p class=\"notice\">{}</p>", NO_ROWS_NOTICE)?;
        }
        Ok(())
    }
}

/// Vertical bar chart as inline SVG.
pub struct ChartSvg<'a>(pub &'a BarChart);

impl fmt::Display for ChartSvg<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chart = self.0;
        let hi = chart.bars.iter().map(|b| b.value).fold(0.0_f64, f64::max);
        let lo = chart.bars.iter().map(|b| b.value).fold(0.0_f64, f64::min);
        let span = if hi - lo > 0.0 { hi - lo } else { 1.0 };

        let plot_w = CHART_WIDTH - CHART_LEFT - CHART_RIGHT;
        let plot_h = CHART_HEIGHT - CHART_TOP - CHART_BOTTOM;
        let y_of = |v: f64| CHART_TOP + (hi - v) / span * plot_h;
        let zero = y_of(0.0);
        let slot = plot_w / chart.bars.len().max(1) as f64;

        writeln!(
            f,
            "<svg class=\"chart\" xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" \
viewBox=\"0 0 {w} {h}\" role=\"img\" aria-label=\"{v} by {c}\">",
            w = CHART_WIDTH,
            h = CHART_HEIGHT,
            v = Escaped(&chart.value_label),
            c = Escaped(&chart.category_label),
        )?;
        writeln!(
            f,
            "<line class=\"axis\" x1=\"{x1}\" y1=\"{y}\" x2=\"{x2}\" y2=\"{y}\"/>",
            x1 = CHART_LEFT,
            x2 = CHART_LEFT + plot_w,
            y = fmt_coord(zero),
        )?;
        writeln!(
            f,
            "<text class=\"tick\" x=\"{}\" y=\"{}\" text-anchor=\"end\">{}</text>",
            fmt_coord(CHART_LEFT - 6.0),
            fmt_coord(CHART_TOP + 4.0),
            format_number(hi)
        )?;
        if lo < 0.0 {
            writeln!(
                f,
                "<text class=\"tick\" x=\"{}\" y=\"{}\" text-anchor=\"end\">{}</text>",
                fmt_coord(CHART_LEFT - 6.0),
                fmt_coord(CHART_TOP + plot_h),
                format_number(lo)
            )?;
        }

        for (i, bar) in chart.bars.iter().enumerate() {
            let x = CHART_LEFT + i as f64 * slot + slot * 0.1;
            let y = y_of(bar.value);
            let (top, height) = if y < zero { (y, zero - y) } else { (zero, y - zero) };
            writeln!(
                f,
                "<rect class=\"bar\" x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\">\
<title>{}: {}</title></rect>",
                fmt_coord(x),
                fmt_coord(top),
                fmt_coord(slot * 0.8),
                fmt_coord(height),
                Escaped(&bar.category),
                format_number(bar.value)
            )?;
            writeln!(
                f,
                "<text class=\"category\" x=\"{}\" y=\"{}\" text-anchor=\"middle\">{}</text>",
                fmt_coord(x + slot * 0.4),
                fmt_coord(CHART_TOP + plot_h + 18.0),
                Escaped(&bar.category)
            )?;
        }

        writeln!(
            f,
            "<text class=\"axis-label\" x=\"{}\" y=\"{}\" text-anchor=\"middle\">{}</text>",
            fmt_coord(CHART_LEFT + plot_w / 2.0),
            fmt_coord(CHART_HEIGHT - 12.0),
            Escaped(&chart.category_label)
        )?;
        writeln!(f, "</svg>")
    }
}

fn fmt_coord(v: f64) -> String {
    format!("{:.1}", v)
}

/// Whole numbers print without a fraction.
fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{:.0}", v)
    } else {
        format!("{}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::query::ColumnInfo;
    use serde_json::json;

    fn two_column(rows: Vec<Vec<serde_json::Value>>) -> QueryResult {
        QueryResult::new(
            vec![
                ColumnInfo::new("product_category", "TEXT"),
                ColumnInfo::new("revenue", "REAL"),
            ],
            rows,
        )
    }

    #[test]
    fn test_escaping() {
        assert_eq!(
            Escaped("<script>alert('x') & \"y\"</script>").to_string(),
            "&lt;script&gt;alert(&#39;x&#39;) &amp; &quot;y&quot;&lt;/script&gt;"
        );
        assert_eq!(Escaped("plain é text").to_string(), "plain é text");
    }

    #[test]
    fn test_needs_question_message() {
        let html = OutcomeHtml(&AskOutcome::needs_question()).to_string();
        assert!(html.contains("Please enter a question."));
        assert!(!html.contains(RAW_QUERY_LABEL));
    }

    #[test]
    fn test_success_shows_queries_table_and_chart() {
        let mut answer = Answer::new("revenue per category");
        answer.generated_query = Some("```sql\nSELECT a FROM b WHERE c < 1\n```".into());
        answer.sanitized_query = Some("SELECT a FROM b WHERE c < 1".into());
        let answer = answer.with_result(two_column(vec![
            vec![json!("Beauty"), json!(150.0)],
            vec![json!("Clothing"), json!(1500.0)],
        ]));
        let html = OutcomeHtml(&AskOutcome::Answered(answer)).to_string();

        let raw = html.find(RAW_QUERY_LABEL).unwrap();
        let clean = html.find(CLEAN_QUERY_LABEL).unwrap();
        let result = html.find(RESULT_LABEL).unwrap();
        assert!(raw < clean && clean < result);
        assert!(html.contains("WHERE c &lt; 1"));
        assert!(html.contains("<td>Clothing</td><td class=\"num\">1500.0</td>"));
        assert_eq!(html.matches("<rect class=\"bar\"").count(), 2);
        assert!(html.contains("<title>Clothing: 1500</title>"));
        assert!(!html.contains(NO_RESULT_NOTICE));
    }

    #[test]
    fn test_failure_keeps_queries_and_shows_notice() {
        let mut answer = Answer::new("How many unique customers are in the sales table?");
        answer.generated_query = Some("SELECT `Number of Customers` FROM sales".into());
        answer.sanitized_query = Some("SELECT Number_of_Customers FROM sales".into());
        let answer = answer.fail(
            PipelineStage::Execution,
            "no such column: Number_of_Customers",
        );
        let html = OutcomeHtml(&AskOutcome::Answered(answer)).to_string();

        assert!(html.contains(RAW_QUERY_LABEL));
        assert!(html.contains(CLEAN_QUERY_LABEL));
        assert!(html.contains("data-stage=\"execution\""));
        assert!(html.contains("no such column: Number_of_Customers"));
        assert!(html.contains(NO_RESULT_NOTICE));
        assert!(!html.contains("<table"));
        assert!(!html.contains("<svg"));
    }

    #[test]
    fn test_generation_failure_has_no_query_blocks() {
        let answer = Answer::new("q").fail(PipelineStage::Generation, "quota exceeded");
        let html = OutcomeHtml(&AskOutcome::Answered(answer)).to_string();
        assert!(!html.contains(RAW_QUERY_LABEL));
        assert!(html.contains("query generation"));
        assert!(html.contains(NO_RESULT_NOTICE));
    }

    #[test]
    fn test_empty_result_shows_header_and_note() {
        let html = TableHtml(&two_column(Vec::new())).to_string();
        assert!(html.contains("<th title=\"TEXT\">product_category</th>"));
        assert!(html.contains(NO_ROWS_NOTICE));
    }

    #[test]
    fn test_non_numeric_second_column_has_no_chart() {
        let answer = Answer::new("q").with_result(two_column(vec![vec![
            json!("Beauty"),
            json!("n/a"),
        ]]));
        let html = OutcomeHtml(&AskOutcome::Answered(answer)).to_string();
        assert!(html.contains("<table"));
        assert!(!html.contains("<svg"));
    }

    #[test]
    fn test_chart_handles_negative_values() {
        let chart = two_column(vec![
            vec![json!("up"), json!(10)],
            vec![json!("down"), json!(-5)],
        ])
        .bar_chart()
        .unwrap();
        let svg = ChartSvg(&chart).to_string();
        assert!(svg.contains(">-5</text>"));
        assert!(!svg.contains("height=\"-"));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1500.0), "1500");
        assert_eq!(format_number(2.5), "2.5");
    }
}
