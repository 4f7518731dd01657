//! Markdown and JSON rendering of an analysis result.

use crate::models::{AnalysisOutcome, AnalysisReport, ReportMetadata};
use anyhow::Result;
use std::io::Write;
use std::path::Path;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &AnalysisReport) -> String {
    let mut output = String::new();

    output.push_str("# Chemical Compound Analysis\n\n");

    output.push_str(&generate_metadata_section(&report.metadata, &report.result));
    output.push_str(&generate_banner(&report.result));

    output.push_str("## Analysis Result\n\n");
    output.push_str(report.result.text().trim());
    output.push_str("\n\n");

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata, outcome: &AnalysisOutcome) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Image:** `{}` ({} bytes)\n",
        metadata.image, metadata.image_bytes
    ));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analyzed_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    match outcome {
        // No model was called
        AnalysisOutcome::DemoFallback { .. } => section.push_str("- **Models:** none (demo)\n"),
        _ => section.push_str(&format!(
            "- **Models:** `{}` + `{}`\n",
            metadata.vision_model, metadata.refinement_model
        )),
    }
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Warning line for anything other than a live result.
fn generate_banner(outcome: &AnalysisOutcome) -> String {
    match outcome {
        AnalysisOutcome::Success { .. } => String::new(),
        AnalysisOutcome::DemoFallback { .. } => {
            "> ⚠️ **Demo mode:** local inference unavailable. The text below is a fixed example.\n\n"
                .to_string()
        }
        AnalysisOutcome::ErrorFallback { kind, stage, .. } => format!(
            "> ❌ **Analysis failed** at the {} stage ({}).\n\n",
            stage, kind
        ),
    }
}

fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Generated by ChemLens. Academic demonstration project.*\n");

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &AnalysisReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write rendered output to a file.
pub fn write_output(content: &str, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}
