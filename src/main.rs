use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use pharmassist_lib::config::ExtractionConfig;
use pharmassist_lib::pipeline::analysis::analyze_content;
use pharmassist_lib::pipeline::export::{format_caretend, to_json};
use pharmassist_lib::pipeline::extraction::{
    DocumentPipeline, ExtractionError, ExtractionRequest, ExtractionResult, RequestedMethod,
};

/// Extract medication names and dosages from a PDF.
#[derive(Debug, Parser)]
#[command(name = "pharmassist", version, about = "PDF medication extraction")]
struct Cli {
    /// PDF file to process
    file: PathBuf,

    /// Extraction strategy (auto, fast-text, table-aware, ocr)
    #[arg(long, default_value = "auto", value_parser = parse_method)]
    method: RequestedMethod,

    /// Output rendering
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Caretend,
    Analysis,
}

fn parse_method(raw: &str) -> Result<RequestedMethod, String> {
    raw.parse().map_err(|e: ExtractionError| e.to_string())
}

fn main() -> ExitCode {
    pharmassist_lib::init_tracing();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(result) if result.success => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            if e.is_rejection() {
                tracing::warn!(error = %e, "Request rejected");
            } else {
                tracing::error!(error = %e, "Request could not be processed");
            }
            eprintln!("error: {e}");
            ExitCode::from(exit_status(&e))
        }
    }
}

/// 2 for a rejected request, 1 for anything else that stopped the run.
fn exit_status(err: &ExtractionError) -> u8 {
    if err.is_rejection() {
        2
    } else {
        1
    }
}

fn run(cli: &Cli) -> Result<ExtractionResult, ExtractionError> {
    let config = ExtractionConfig::from_env()?;
    let pipeline = DocumentPipeline::from_config(config);

    let content = std::fs::read(&cli.file)?;
    let filename = cli
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| cli.file.display().to_string());

    let request = ExtractionRequest::new(content, filename, cli.method);
    let result = pipeline.extract(&request)?;

    println!("{}", render(&result, cli.format)?);
    Ok(result)
}

fn render(result: &ExtractionResult, format: OutputFormat) -> Result<String, ExtractionError> {
    match format {
        OutputFormat::Json => Ok(to_json(result)?),
        OutputFormat::Caretend => Ok(format_caretend(
            &result.fields,
            &result.filename,
            &chrono::Local::now(),
        )),
        OutputFormat::Analysis => match analyze_content(result) {
            Some(analysis) => Ok(serde_json::to_string_pretty(&analysis)?),
            None => Ok(render_text(result)),
        },
        OutputFormat::Text => Ok(render_text(result)),
    }
}

fn render_text(result: &ExtractionResult) -> String {
    let mut lines = vec![format!(
        "{} via {} ({} pages)",
        result.filename,
        result.method_used.label(),
        result.pages_processed
    )];

    if let Some(error) = &result.error {
        lines.push(error.clone());
        return lines.join("\n");
    }

    if result.fields.is_empty() {
        lines.push("No medications recognized.".to_string());
    }
    for field in &result.fields {
        match field.dosage.as_str() {
            "" => lines.push(format!("- {} [{}]", field.name, field.provenance)),
            dosage => lines.push(format!("- {} {} [{}]", field.name, dosage, field.provenance)),
        }
    }
    for warning in &result.warnings {
        lines.push(format!("warning: {warning:?}"));
    }
    lines.join("\n")
}
