pub mod commands;
pub mod orchestrator;
pub mod vapi;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "crosstalk",
    about = "Crosstalk operator CLI",
    long_about = "Orchestrate agent-on-agent phone call batches, apply database migrations, and inspect the topic catalog.",
    after_help = "Examples:\n  crosstalk orchestrate --dry-run\n  crosstalk orchestrate --topic internet_outage\n  crosstalk orchestrate --limit 2 --delay-ms 15000\n  crosstalk migrate\n  crosstalk topics"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Initiate a rate-limited batch of agent-on-agent calls")]
    Orchestrate {
        #[arg(long, help = "Preview the batch without contacting the call platform")]
        dry_run: bool,
        #[arg(long, help = "Only run the first N topics")]
        limit: Option<usize>,
        #[arg(long, help = "Run only the named topic")]
        topic: Option<String>,
        #[arg(long, help = "Delay between calls in milliseconds (default: 10000)")]
        delay_ms: Option<u64>,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "List the built-in conversation topic catalog")]
    Topics,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Orchestrate { dry_run, limit, topic, delay_ms } => {
            commands::orchestrate::run(commands::orchestrate::OrchestrateArgs {
                dry_run,
                limit,
                topic,
                delay_ms,
            })
        }
        Command::Migrate => commands::migrate::run(),
        Command::Topics => commands::topics::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
