pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "cloudcost",
    about = "Cloud cost estimator operator CLI",
    long_about = "Run cost estimations locally or against a deployed runtime, and inspect configuration readiness.",
    after_help = "Examples:\n  cloudcost estimate \"2 t3.medium EC2 instances and an RDS MySQL db.t3.micro in us-east-1\"\n  cloudcost invoke \"100 GB of S3 Standard\"\n  cloudcost doctor --json\n  cloudcost config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Estimate the monthly cost of an architecture with the configured model, sandbox and pricing server")]
    Estimate {
        #[arg(required = true, num_args = 1.., help = "Architecture description")]
        description: Vec<String>,
    },
    #[command(about = "Send an estimation prompt to a deployed runtime with a bearer token")]
    Invoke {
        #[arg(required = true, num_args = 1.., help = "Architecture description")]
        description: Vec<String>,
        #[arg(long, help = "Runtime invocation URL (overrides runtime.url)")]
        url: Option<String>,
        #[arg(long, help = "Bearer token issued by the identity provider (overrides runtime.bearer_token)")]
        token: Option<String>,
    },
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config,
    #[command(about = "Validate config, model credentials, sandbox endpoint and pricing server readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Estimate { description } => commands::estimate::run(&description.join(" ")),
        Command::Invoke { description, url, token } => {
            commands::invoke::run(&description.join(" "), url, token)
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
