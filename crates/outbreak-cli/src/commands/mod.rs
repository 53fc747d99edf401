pub mod monitor;
pub mod run;

use std::time::Duration;

use clap::Args;

use outbreak_core::series;
use outbreak_core::{ControllerConfig, HttpBackend, RenderState, SimulationParameters};

/// Where the simulation service lives and how the controller paces itself.
#[derive(Args, Debug, Clone)]
pub struct ServiceArgs {
    /// Base URL of the simulation service
    #[arg(long, default_value = outbreak_core::config::DEFAULT_BASE_URL)]
    pub url: String,

    /// Days kept in the rolling chart
    #[arg(long, default_value = "100")]
    pub window: usize,

    /// Delay between auto-play steps, in milliseconds
    #[arg(long, default_value = "500")]
    pub cadence_ms: u64,

    /// Per-request timeout in seconds (0 = wait forever)
    #[arg(long, default_value = "30")]
    pub timeout: u64,
}

impl ServiceArgs {
    pub fn config(&self) -> ControllerConfig {
        ControllerConfig {
            window: self.window,
            cadence: Duration::from_millis(self.cadence_ms),
            ..ControllerConfig::default()
        }
        .with_base_url(self.url.clone())
        .with_timeout_secs(self.timeout)
    }
}

/// Parameters of the simulated outbreak. Defaults match the service's.
#[derive(Args, Debug, Clone)]
pub struct ParamArgs {
    /// Number of people in the contact network
    #[arg(long, default_value = "500")]
    pub population: u32,

    /// People infected on day 0
    #[arg(long, default_value = "5")]
    pub initial_infected: u32,

    /// Per-contact, per-day transmission probability (0-1)
    #[arg(long, default_value = "0.3")]
    pub transmission: f64,

    /// Days until an infected person recovers
    #[arg(long, default_value = "14")]
    pub recovery_time: u32,

    /// Transmission multiplier for mask wearing (1.0 = no masks)
    #[arg(long, default_value = "1.0")]
    pub mask_multiplier: f64,

    /// Average contacts per person
    #[arg(long, default_value = "6")]
    pub avg_degree: u32,

    /// Small-world rewiring probability (0-1)
    #[arg(long, default_value = "0.1")]
    pub rewire: f64,
}

impl ParamArgs {
    pub fn parameters(&self) -> SimulationParameters {
        SimulationParameters {
            population_size: self.population,
            initial_infected: self.initial_infected,
            transmission_prob: self.transmission,
            recovery_time: self.recovery_time,
            mask_multiplier: self.mask_multiplier,
            avg_degree: self.avg_degree,
            rewire_prob: self.rewire,
        }
    }
}

/// Build the HTTP client or exit.
pub fn make_backend(config: &ControllerConfig) -> HttpBackend {
    match HttpBackend::new(&config.base_url, config.request_timeout) {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("Error: cannot create HTTP client: {e}");
            std::process::exit(1);
        }
    }
}

pub fn make_runtime() -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: cannot start async runtime: {e}");
            std::process::exit(1);
        }
    }
}

/// Initialise `env_logger` (`RUST_LOG` overrides the `warn` default).
///
/// With `log_file` set, output goes to that file. Otherwise `silent` turns
/// logging off entirely, for commands that own the terminal.
pub fn init_logging(log_file: Option<&str>, silent: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    match log_file {
        Some(path) => match std::fs::File::create(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => {
                eprintln!("Error: cannot open log file {path}: {e}");
                std::process::exit(1);
            }
        },
        None if silent => {
            builder.filter_level(log::LevelFilter::Off);
        }
        None => {}
    }
    let _ = builder.try_init();
}

/// Machine-readable summary of a session.
pub fn series_json(state: &RenderState) -> serde_json::Value {
    serde_json::json!({
        "session_id": state.session_id.map(|id| id.to_string()),
        "state": state.state.label(),
        "status": state.status,
        "parameters": state.parameters,
        "day": state.day,
        "stats": state.stats,
        "window": state.window,
        "series": state.series,
    })
}

/// Render the series as `csv` or `json`.
pub fn render_series(state: &RenderState, format: &str) -> String {
    match format {
        "json" => serde_json::to_string_pretty(&series_json(state)).unwrap_or_default(),
        _ => series::to_csv(&state.series),
    }
}

/// Write to `path`, or stdout when `None`.
pub fn write_output(contents: &str, path: Option<&str>) {
    match path {
        Some(path) => {
            if let Err(e) = std::fs::write(path, contents) {
                eprintln!("Error: cannot write {path}: {e}");
                std::process::exit(1);
            }
            eprintln!("Wrote {path}");
        }
        None => print!("{contents}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outbreak_core::{SeriesPoint, SessionState};

    fn state() -> RenderState {
        RenderState {
            state: SessionState::Running,
            status: "Day 1".into(),
            parameters: Some(SimulationParameters::default()),
            series: vec![
                SeriesPoint {
                    day: 0,
                    susceptible: 495,
                    infected: 5,
                    recovered: 0,
                },
                SeriesPoint {
                    day: 1,
                    susceptible: 490,
                    infected: 9,
                    recovered: 1,
                },
            ],
            window: 100,
            ..RenderState::default()
        }
    }

    #[test]
    fn default_args_match_service_defaults() {
        let params = ParamArgs {
            population: 500,
            initial_infected: 5,
            transmission: 0.3,
            recovery_time: 14,
            mask_multiplier: 1.0,
            avg_degree: 6,
            rewire: 0.1,
        };
        assert_eq!(params.parameters(), SimulationParameters::default());
    }

    #[test]
    fn service_args_build_config() {
        let args = ServiceArgs {
            url: "http://sim:9000".into(),
            window: 50,
            cadence_ms: 250,
            timeout: 0,
        };
        let cfg = args.config();
        assert_eq!(cfg.base_url, "http://sim:9000");
        assert_eq!(cfg.window, 50);
        assert_eq!(cfg.cadence, Duration::from_millis(250));
        assert_eq!(cfg.request_timeout, None);
    }

    #[test]
    fn csv_output() {
        assert_eq!(
            render_series(&state(), "csv"),
            "day,susceptible,infected,recovered\n0,495,5,0\n1,490,9,1\n"
        );
    }

    #[test]
    fn json_output() {
        let out = render_series(&state(), "json");
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["state"], "running");
        assert_eq!(v["series"].as_array().unwrap().len(), 2);
        assert_eq!(v["series"][1]["infected"], 9);
        assert_eq!(v["parameters"]["population_size"], 500);
        assert!(v["session_id"].is_null());
    }

    #[test]
    fn write_output_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series.csv");
        write_output("day\n", Some(path.to_str().unwrap()));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "day\n");
    }
}
