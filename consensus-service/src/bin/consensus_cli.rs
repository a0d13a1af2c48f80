//! Command-line entry point: run one case through the consensus workflow and write
//! the markdown report.

use anyhow::Context;
use clap::Parser;
use consensus_service::{
    ConsensusWorkflow,
    config::Settings,
    logging::{LogFormat, init_tracing},
    models::CaseInput,
    report::{render_markdown, write_report},
};
use std::path::PathBuf;
use tracing::error;

#[derive(Parser)]
#[command(name = "consensus-cli")]
#[command(version, about = "Multi-agent consensus diagnosis for a patient case")]
struct Cli {
    /// Medical topic or suspected condition
    topic: String,

    /// Reported symptoms
    #[arg(short, long, default_value = "")]
    symptoms: String,

    /// Relevant medical history
    #[arg(short, long, default_value = "")]
    medical_history: String,

    /// Test results (imaging, labs, pathology)
    #[arg(short, long, default_value = "")]
    test_results: String,

    /// Report path (defaults to medical_diagnosis_<timestamp>.md)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Use live web search instead of the built-in source set
    #[arg(long)]
    realtime: bool,

    /// Translate the report (ISO 639-1 code or English name)
    #[arg(short, long)]
    language: Option<String>,
}

impl Cli {
    fn case(&self) -> CaseInput {
        let mut case = CaseInput::new(self.topic.clone())
            .with_symptoms(self.symptoms.clone())
            .with_medical_history(self.medical_history.clone())
            .with_test_results(self.test_results.clone())
            .with_realtime_search(self.realtime);
        if let Some(language) = &self.language {
            case = case.with_target_language(language.clone());
        }
        case
    }
}

async fn run(cli: &Cli, settings: &Settings) -> anyhow::Result<PathBuf> {
    let workflow = ConsensusWorkflow::from_settings(settings)?;
    let report = workflow
        .run(cli.case())
        .await
        .context("consensus workflow failed")?;

    println!("{}", render_markdown(&report));
    let path = write_report(&report, cli.output.as_deref())
        .await
        .context("failed to save report")?;
    Ok(path)
}

#[tokio::main]
async fn main() {
    init_tracing(LogFormat::Pretty);
    let cli = Cli::parse();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    match run(&cli, &settings).await {
        Ok(path) => println!("\nReport saved to {}", path.display()),
        Err(e) => {
            error!(error = %format!("{e:#}"), "Run failed");
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}
