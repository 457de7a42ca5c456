use crate::checker::{CheckReport, Match};
use crate::errors::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

/// Defines the possible output formats for check results.
#[derive(Debug, Clone)]
pub enum OutputFormat {
    /// A simple, human-readable text format.
    Text,
    /// JSON format, suitable for machine processing.
    Json,
    /// Comma-Separated Values format.
    Csv,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "csv" => OutputFormat::Csv,
            _ => OutputFormat::Text,
        }
    }
}

/// Handles the formatting of check results into various output formats.
pub struct OutputFormatter {
    format: OutputFormat,
    include_summary: bool,
    tool_name: String,
    tool_version: String,
}

impl OutputFormatter {
    /// Creates a new `OutputFormatter`.
    ///
    /// # Arguments
    ///
    /// * `format` - The `OutputFormat` to use.
    /// * `include_summary` - Whether to append a summary (only supported for
    ///   the `Text` format).
    pub fn new(format: OutputFormat, include_summary: bool) -> Self {
        Self {
            format,
            include_summary,
            tool_name: "sitefix".to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Writes the formatted check results to a given writer.
    pub fn write_output<W: Write>(&self, writer: &mut W, report: &CheckReport) -> Result<()> {
        let output = match self.format {
            OutputFormat::Text => self.format_text(report)?,
            OutputFormat::Json => self.format_json(report)?,
            OutputFormat::Csv => self.format_csv(&report.matches)?,
        };

        writer.write_all(output.as_bytes())?;

        if self.include_summary && matches!(self.format, OutputFormat::Text) {
            let summary = self.format_summary(report)?;
            writer.write_all(summary.as_bytes())?;
        }

        Ok(())
    }

    /// Formats a report into a simple, human-readable text format.
    fn format_text(&self, report: &CheckReport) -> Result<String> {
        let mut output = String::new();

        for m in &report.matches {
            output.push_str(&format!(
                "[{}] {}:{}: {}\n",
                m.pattern_name,
                m.file_path.display(),
                m.line_number,
                m.line_content
            ));
        }

        if !report.errors.is_empty() {
            output.push_str("\nCheck errors:\n");
            for (path, message) in &report.errors {
                output.push_str(&format!("  {}: {}\n", path.display(), message));
            }
        }

        Ok(output)
    }

    /// Formats a report into a structured JSON format.
    fn format_json(&self, report: &CheckReport) -> Result<String> {
        #[derive(Serialize)]
        struct JsonOutput {
            tool: ToolInfo,
            check_time: DateTime<Utc>,
            total_matches: usize,
            total_errors: usize,
            matches: Vec<JsonMatch>,
            errors: Vec<JsonError>,
        }

        #[derive(Serialize)]
        struct ToolInfo {
            name: String,
            version: String,
        }

        #[derive(Serialize)]
        struct JsonMatch {
            pattern: String,
            file: String,
            line: usize,
            content: String,
        }

        #[derive(Serialize)]
        struct JsonError {
            file: String,
            error: String,
        }

        let json_matches: Vec<JsonMatch> = report
            .matches
            .iter()
            .map(|m| JsonMatch {
                pattern: m.pattern_name.clone(),
                file: m.file_path.display().to_string(),
                line: m.line_number,
                content: m.line_content.trim().to_string(),
            })
            .collect();

        let json_errors: Vec<JsonError> = report
            .errors
            .iter()
            .map(|(path, message)| JsonError {
                file: path.display().to_string(),
                error: message.clone(),
            })
            .collect();

        let output = JsonOutput {
            tool: ToolInfo {
                name: self.tool_name.clone(),
                version: self.tool_version.clone(),
            },
            check_time: Utc::now(),
            total_matches: report.matches.len(),
            total_errors: report.errors.len(),
            matches: json_matches,
            errors: json_errors,
        };

        Ok(serde_json::to_string_pretty(&output)?)
    }

    /// Formats matches into a CSV table. The table holds matches only;
    /// check errors are reported on stderr and through the exit code.
    fn format_csv(&self, matches: &[Match]) -> Result<String> {
        use csv::Writer;

        let mut wtr = Writer::from_writer(vec![]);

        wtr.write_record(["Pattern", "File", "Line", "Content"])?;

        for m in matches {
            wtr.write_record([
                m.pattern_name.as_str(),
                &m.file_path.display().to_string(),
                &m.line_number.to_string(),
                m.line_content.trim(),
            ])?;
        }

        let data = wtr
            .into_inner()
            .map_err(|e| format!("CSV writer error: {}", e))?;
        Ok(String::from_utf8(data).unwrap_or_default())
    }

    /// Generates a summary of check results. Every pattern that matched is
    /// listed with its count; nothing is elided.
    fn format_summary(&self, report: &CheckReport) -> Result<String> {
        use std::collections::HashMap;

        let mut pattern_counts: HashMap<String, usize> = HashMap::new();
        let mut file_counts: HashMap<PathBuf, usize> = HashMap::new();

        for m in &report.matches {
            *pattern_counts.entry(m.pattern_name.clone()).or_insert(0) += 1;
            *file_counts.entry(m.file_path.clone()).or_insert(0) += 1;
        }

        let mut summary = String::new();
        summary.push_str(&format!("\n{} Summary {}\n", "=".repeat(20), "=".repeat(20)));
        summary.push_str(&format!("Total matches: {}\n", report.matches.len()));
        summary.push_str(&format!("Files with matches: {}\n", file_counts.len()));
        summary.push_str(&format!("Unique patterns: {}\n", pattern_counts.len()));
        if !report.errors.is_empty() {
            summary.push_str(&format!("Files with errors: {}\n", report.errors.len()));
        }

        if !pattern_counts.is_empty() {
            summary.push_str("\nMatches by pattern:\n");
            let mut patterns: Vec<_> = pattern_counts.into_iter().collect();
            // Highest count first; ties break on name for stable output
            patterns.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

            for (pattern, count) in patterns {
                summary.push_str(&format!("  {} - {} matches\n", pattern, count));
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn create_test_report() -> CheckReport {
        CheckReport {
            matches: vec![
                Match {
                    pattern_name: "leftover_reviews".to_string(),
                    file_path: PathBuf::from("site/index.html"),
                    line_number: 42,
                    line_content: "<a href=\"#\">Leave a Review</a>".to_string(),
                },
                Match {
                    pattern_name: "old_analytics".to_string(),
                    file_path: PathBuf::from("site/about.html"),
                    line_number: 10,
                    line_content: "gtag('config', 'G-OLDID123');".to_string(),
                },
            ],
            errors: BTreeMap::new(),
        }
    }

    #[test]
    fn json_output_round_trips() {
        let formatter = OutputFormatter::new(OutputFormat::Json, false);

        let output = formatter.format_json(&create_test_report()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(parsed["total_matches"], 2);
        assert_eq!(parsed["total_errors"], 0);
        assert_eq!(parsed["tool"]["name"], "sitefix");
        assert_eq!(parsed["matches"][0]["pattern"], "leftover_reviews");
        assert_eq!(parsed["matches"][1]["line"], 10);
    }

    #[test]
    fn csv_output_has_headers_and_rows() {
        let formatter = OutputFormatter::new(OutputFormat::Csv, false);

        let output = formatter.format_csv(&create_test_report().matches).unwrap();

        let mut rdr = csv::Reader::from_reader(output.as_bytes());
        let headers = rdr.headers().unwrap();
        assert_eq!(headers.get(0), Some("Pattern"));
        assert_eq!(headers.get(3), Some("Content"));

        let records: Vec<_> = rdr
            .records()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn text_output_is_one_line_per_match() {
        let formatter = OutputFormatter::new(OutputFormat::Text, false);
        let output = formatter.format_text(&create_test_report()).unwrap();

        assert!(output.contains("[leftover_reviews] site/index.html:42:"));
        assert!(output.contains("[old_analytics] site/about.html:10:"));
        assert_eq!(output.lines().count(), 2);
    }

    #[test]
    fn read_errors_appear_in_text_output() {
        let mut report = create_test_report();
        report.errors.insert(
            PathBuf::from("site/broken.html"),
            "Permission denied (os error 13)".to_string(),
        );

        let formatter = OutputFormatter::new(OutputFormat::Text, false);
        let output = formatter.format_text(&report).unwrap();
        assert!(output.contains("Check errors:"));
        assert!(output.contains("site/broken.html: Permission denied"));

        let summary = formatter.format_summary(&report).unwrap();
        assert!(summary.contains("Files with errors: 1"));
    }

    #[test]
    fn read_errors_appear_in_json_output() {
        let mut report = create_test_report();
        report
            .errors
            .insert(PathBuf::from("site/broken.html"), "read failed".to_string());

        let formatter = OutputFormatter::new(OutputFormat::Json, false);
        let output = formatter.format_json(&report).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(parsed["total_errors"], 1);
        assert_eq!(parsed["errors"][0]["file"], "site/broken.html");
        assert_eq!(parsed["errors"][0]["error"], "read failed");
    }

    #[test]
    fn summary_lists_every_pattern() {
        let report = CheckReport {
            matches: (0..15)
                .map(|i| Match {
                    pattern_name: format!("pattern_{i:02}"),
                    file_path: PathBuf::from("a.html"),
                    line_number: i + 1,
                    line_content: "x".to_string(),
                })
                .collect(),
            errors: BTreeMap::new(),
        };

        let formatter = OutputFormatter::new(OutputFormat::Text, true);
        let summary = formatter.format_summary(&report).unwrap();

        for i in 0..15 {
            assert!(summary.contains(&format!("pattern_{i:02}")));
        }
        assert!(summary.contains("Total matches: 15"));
    }

    #[test]
    fn unknown_format_string_falls_back_to_text() {
        assert!(matches!(OutputFormat::from("yaml"), OutputFormat::Text));
        assert!(matches!(OutputFormat::from("JSON"), OutputFormat::Json));
        assert!(matches!(OutputFormat::from("csv"), OutputFormat::Csv));
    }
}
