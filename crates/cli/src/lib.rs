pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pagecraft_core::config::{AppConfig, LogFormat};

use crate::commands::run::RunArgs;

#[derive(Debug, Parser)]
#[command(
    name = "pagecraft",
    about = "Pagecraft content pipeline CLI",
    long_about = "Turn a raw product description into product, FAQ and comparison pages.",
    after_help = "Examples:\n  pagecraft run --input product.txt\n  pagecraft run --input - --template < product.txt\n  pagecraft show faq_page\n  pagecraft config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a pagecraft.toml config file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run the pipeline on a product description and write the three pages")]
    Run {
        #[arg(long, help = "Input text file, or `-` to read stdin")]
        input: PathBuf,
        #[arg(long, help = "Directory the page artifacts are written to")]
        output_dir: Option<PathBuf>,
        #[arg(long, help = "Assemble pages deterministically instead of asking the model")]
        template: bool,
        #[arg(long, help = "Author the three pages concurrently")]
        concurrent: bool,
    },
    #[command(about = "Print a persisted page artifact")]
    Show {
        #[arg(help = "product_page | faq_page | comparison_page")]
        page_type: String,
        #[arg(long, help = "Directory the page artifacts were written to")]
        output_dir: Option<PathBuf>,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run { input, output_dir, template, concurrent } => {
            commands::run::run(&RunArgs {
                input,
                config_path: cli.config,
                output_dir,
                template,
                concurrent,
            })
        }
        Command::Show { page_type, output_dir } => {
            commands::show::run(&page_type, output_dir, cli.config)
        }
        Command::Config => commands::config::run(cli.config),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Installs the stderr subscriber. Later calls are no-ops.
pub fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
