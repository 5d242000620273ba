use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use cmd::commands::{check_command, ingest_command, serve_command};
use cmd::config_template::parse_variables;
use cmd::load_config;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "sluice")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Log level: off, error, warn, info, debug (overridden by SLUICE_LOG)
    #[arg(long, global = true, default_value = "info")]
    log: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the upload form server
    Serve {
        #[command(flatten)]
        config: ConfigArgs,
        /// Listen address, overriding the config file
        #[arg(short, long)]
        listen: Option<String>,
    },
    /// Validate the configuration and show what it points at
    Check {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Store and load one CSV file without the web form
    Ingest {
        #[command(flatten)]
        config: ConfigArgs,
        /// CSV file to upload
        file: PathBuf,
        /// Blob name to store it under (default: the file's name)
        #[arg(short, long)]
        name: Option<String>,
    },
}

#[derive(Args)]
struct ConfigArgs {
    /// YAML configuration file
    #[arg(short, long, default_value = "sluice.yaml")]
    config: PathBuf,
    /// Template variable for the config file (key=value)
    #[arg(short = 'v', long = "var")]
    vars: Vec<String>,
}

impl ConfigArgs {
    fn load(&self) -> Result<cmd::SluiceConfig> {
        load_config(&self.config, &parse_variables(&self.vars)?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    diagnostics::init(&cli.log);

    match &cli.command {
        Commands::Serve { config, listen } => serve_command(config.load()?, listen.clone()).await,
        Commands::Check { config } => check_command(&config.load()?),
        Commands::Ingest { config, file, name } => {
            ingest_command(&config.load()?, file, name.as_deref())
                .await
                .map(|_| ())
        }
    }
}
