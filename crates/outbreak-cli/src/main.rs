//! CLI for outbreak: drive an epidemic simulation service from your terminal.

mod commands;
mod tui;

use clap::{Parser, Subcommand};

use commands::{ParamArgs, ServiceArgs};

#[derive(Parser)]
#[command(name = "outbreak")]
#[command(about = "outbreak: step, auto-play and intervene in a remote epidemic simulation")]
#[command(version = outbreak_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive dashboard: compartment chart, live contact graph,
    /// auto-play and interventions
    Monitor {
        #[command(flatten)]
        service: ServiceArgs,

        #[command(flatten)]
        params: ParamArgs,

        /// Starting lockdown strength for the `l` key (0-1)
        #[arg(long, default_value = "0.5")]
        lockdown: f64,

        /// Starting vaccination fraction for the `v` key (0-1)
        #[arg(long, default_value = "0.1")]
        vaccinate: f64,

        /// Write log output to this file (the terminal is busy drawing)
        #[arg(long)]
        log_file: Option<String>,
    },

    /// Headless run: start a session, apply interventions, step N days and
    /// print the rolling series
    Run {
        #[command(flatten)]
        service: ServiceArgs,

        #[command(flatten)]
        params: ParamArgs,

        /// Number of days to step
        #[arg(long, default_value = "30")]
        steps: u32,

        /// Apply a lockdown of this strength right after starting
        #[arg(long)]
        lockdown: Option<f64>,

        /// Vaccinate this fraction of the population right after starting
        #[arg(long)]
        vaccinate: Option<f64>,

        /// Output format
        #[arg(long, default_value = "csv", value_parser = ["csv", "json"])]
        format: String,

        /// Write output to a file instead of stdout
        #[arg(long)]
        output: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Monitor {
            service,
            params,
            lockdown,
            vaccinate,
            log_file,
        } => commands::monitor::run(&service, &params, lockdown, vaccinate, log_file.as_deref()),
        Commands::Run {
            service,
            params,
            steps,
            lockdown,
            vaccinate,
            format,
            output,
        } => commands::run::run(
            &service,
            &params,
            steps,
            lockdown,
            vaccinate,
            &format,
            output.as_deref(),
        ),
    }
}
