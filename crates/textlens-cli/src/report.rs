use std::io::{self, Write};

use clap::ValueEnum;
use textlens_core::{CandidateReport, ClassificationResult, RunReport};

const RULE_WIDTH: usize = 80;

/// How the run report is written to stdout.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    #[default]
    Json,
    /// Human-readable listing, one block per image
    Text,
}

pub fn write_report<W: Write>(
    report: &RunReport,
    format: OutputFormat,
    out: &mut W,
) -> io::Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, report)?;
            writeln!(out)
        }
        OutputFormat::Text => render_text(report, out),
    }
}

/// Writes one block per checked image, followed by pages that failed.
pub fn render_text<W: Write>(report: &RunReport, out: &mut W) -> io::Result<()> {
    writeln!(out, "Images of text check results (run {}):", report.run_id)?;
    writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;

    if report.reports.is_empty() && report.page_failures.is_empty() {
        writeln!(out, "No images were checked.")?;
        return Ok(());
    }

    for entry in &report.reports {
        render_candidate(entry, out)?;
        writeln!(out, "{}", "-".repeat(RULE_WIDTH))?;
    }

    for failure in &report.page_failures {
        writeln!(out, "\nURL: {}", failure.page_url)?;
        writeln!(out, "Error: {}", failure.error)?;
        writeln!(out, "{}", "-".repeat(RULE_WIDTH))?;
    }

    writeln!(
        out,
        "\nTotal: {} images, {} non-compliant, {} errors, {} failed pages",
        report.reports.len(),
        report.non_compliant_count(),
        report.error_count(),
        report.page_failures.len(),
    )
}

fn render_candidate<W: Write>(entry: &CandidateReport, out: &mut W) -> io::Result<()> {
    writeln!(out, "\nURL: {}", entry.page_url)?;
    writeln!(out, "Image URL: {}", entry.candidate_url)?;
    writeln!(out, "XPath: {}", entry.locator)?;
    writeln!(out, "Element: {}", entry.raw_markup)?;
    writeln!(out, "Alt text: {}", entry.alt_text)?;

    let result = &entry.result;
    if let Some(error) = &result.error {
        writeln!(out, "Error: {error}")?;
        return Ok(());
    }

    writeln!(out, "\nContains text: {}", yes_no(result.contains_text))?;
    if result.contains_text {
        render_judgments(result, out)?;
    }

    if !result.recommendations.is_empty() {
        writeln!(out, "\nRecommendations:")?;
        for recommendation in &result.recommendations {
            writeln!(out, "- {recommendation}")?;
        }
    }
    Ok(())
}

fn render_judgments<W: Write>(result: &ClassificationResult, out: &mut W) -> io::Result<()> {
    writeln!(out, "Detected text: {}", or_unknown(&result.detected_text))?;
    writeln!(out, "Purpose: {}", or_unknown(&result.purpose))?;

    writeln!(
        out,
        "\nSignificant visual content: {}",
        yes_no(result.has_significant_visual_content)
    )?;
    if result.has_significant_visual_content {
        writeln!(
            out,
            "Visual content: {}",
            or_unknown(&result.visual_content_description)
        )?;
    }

    writeln!(out, "\nLogo or brand: {}", yes_no(result.is_logo))?;
    writeln!(out, "Essential presentation: {}", yes_no(result.is_essential))?;
    if result.is_essential {
        writeln!(out, "Why essential: {}", or_unknown(&result.essential_reason))?;
    }
    writeln!(out, "Customizable: {}", yes_no(result.is_customizable))?;
    writeln!(out, "Possible in HTML/CSS: {}", yes_no(result.can_be_html_css))?;
    writeln!(out, "Text alternative: {}", yes_no(result.has_text_alternative))?;

    writeln!(out, "\nCompliant: {}", yes_no(result.compliant))?;
    writeln!(out, "Reason: {}", or_unknown(&result.reason))
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn or_unknown(value: &str) -> &str {
    if value.trim().is_empty() { "unknown" } else { value }
}
