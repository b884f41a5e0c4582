use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use stepchain::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stepchain")]
#[command(about = "Run declarative automations", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single automation file
    Run {
        /// Path to the automation YAML or JSON file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Trigger fields as a JSON object
        #[arg(long, value_name = "JSON", default_value = "{}")]
        fields: String,

        /// Print the full run result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate an automation file without running it
    Check {
        /// Path to the automation YAML or JSON file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    let outcome = match cli.command {
        Commands::Run { file, fields, json } => cmd_run(&file, &fields, json).await,
        Commands::Check { file } => cmd_check(&file),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn cmd_run(file: &PathBuf, fields: &str, json: bool) -> anyhow::Result<bool> {
    let automation = AutomationLoader::load_file(file)?;

    let fields: serde_json::Map<String, serde_json::Value> = serde_json::from_str(fields)
        .map_err(|e| anyhow::anyhow!("--fields must be a JSON object: {}", e))?;
    let payload = TriggerPayload { fields };

    let runner = AutomationRunner::new(Arc::new(StepRegistry::builtin()));
    let result = runner.run(&automation, payload).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(result.is_success());
    }

    println!("automation: {} (run {})", result.automation, result.run_id);
    for record in &result.steps {
        let marker = if record.is_success() { "ok" } else { "failed" };
        println!("  [{}] {} ({})", marker, record.id, record.step_type);
        if let Some(error) = record.outputs.get("error").and_then(|e| e.as_str()) {
            println!("        {}", error);
        }
    }
    match &result.status {
        RunStatus::Success => println!("run completed: {} step(s)", result.steps.len()),
        RunStatus::Error { message } => println!("run stopped: {}", message),
    }

    Ok(result.is_success())
}

fn cmd_check(file: &PathBuf) -> anyhow::Result<bool> {
    let automation = AutomationLoader::load_file(file)?;
    automation.validate()?;
    println!(
        "{}: ok (trigger + {} action step(s))",
        automation.name,
        automation.actions().len()
    );
    Ok(true)
}
