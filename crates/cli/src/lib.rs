pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "atelier",
    about = "Atelier operator CLI",
    long_about = "Operate the Atelier customization catalog: migrations, demo data, config inspection, readiness checks, and variant generation.",
    after_help = "Examples:\n  atelier doctor --json\n  atelier variants necklace-classic\n  atelier filename necklace chain_type=black_leather first_stone=black_onyx metal=white_gold"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo jewelry catalog and verify every expected row")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, database, catalog schema, storage, and email readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Generate every image variant of a product and record the snapshot")]
    Variants {
        #[arg(help = "Product id, e.g. necklace-classic")]
        product_id: String,
    },
    #[command(about = "Compose the variant image filename for a set of selections")]
    Filename {
        #[arg(help = "Product type, e.g. necklace")]
        product_type: String,
        #[arg(help = "Selections as setting=option, in display order")]
        selections: Vec<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Variants { product_id } => commands::variants::run(&product_id),
        Command::Filename { product_type, selections } => {
            commands::filename::run(&product_type, &selections)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
