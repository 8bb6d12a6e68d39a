//! Output formatting for check results.

use serde::Serialize;

use crate::label::Label;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub url: String,
    pub label: Label,
    pub verdict: String,
}

/// How `check` results are rendered on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// One verdict line per URL, plus a summary for batches.
    #[default]
    Plain,
    Json,
}

impl std::str::FromStr for ReportFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("text") || s.eq_ignore_ascii_case("plain") {
            Ok(ReportFormat::Plain)
        } else if s.eq_ignore_ascii_case("json") {
            Ok(ReportFormat::Json)
        } else {
            Err(format!("report format '{s}' not supported (expected text or json)"))
        }
    }
}

pub fn print_results(results: &[CheckResult], format: ReportFormat) {
    println!("{}", render(results, format));
}

pub fn render(results: &[CheckResult], format: ReportFormat) -> String {
    match format {
        ReportFormat::Plain => render_text(results),
        ReportFormat::Json => render_json(results),
    }
}

fn render_text(results: &[CheckResult]) -> String {
    let phishing = results
        .iter()
        .filter(|r| r.label == Label::Phishing)
        .count();

    let mut out = String::new();
    for r in results {
        out.push_str(&format!("{}  {}\n", r.verdict, r.url));
    }
    if results.len() > 1 {
        out.push_str(&format!(
            "\nSUMMARY: {} checked, {} phishing, {} safe\n",
            results.len(),
            phishing,
            results.len() - phishing
        ));
    }
    out.trim_end().to_string()
}

fn render_json(results: &[CheckResult]) -> String {
    let output = serde_json::json!({
        "results": results,
        "summary": {
            "total": results.len(),
            "phishing": results.iter().filter(|r| r.label == Label::Phishing).count(),
            "safe": results.iter().filter(|r| r.label == Label::Safe).count(),
        }
    });
    serde_json::to_string_pretty(&output).unwrap_or_default()
}
