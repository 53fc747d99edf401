use outbreak_core::{ControlResult, Session, SimulationBackend, SimulationParameters};

use super::{ParamArgs, ServiceArgs};

pub fn run(
    service: &ServiceArgs,
    params: &ParamArgs,
    steps: u32,
    lockdown: Option<f64>,
    vaccinate: Option<f64>,
    format: &str,
    output: Option<&str>,
) {
    super::init_logging(None, false);

    let config = service.config();
    let backend = super::make_backend(&config);
    let rt = super::make_runtime();
    let mut session = Session::new(backend, config);

    let failed = match rt.block_on(drive(
        &mut session,
        params.parameters(),
        steps,
        lockdown,
        vaccinate,
    )) {
        Ok(failed) => failed,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if let Some(snapshot) = session.latest() {
        eprintln!(
            "Day {}  S={} I={} R={}{}",
            snapshot.day,
            snapshot.stats.susceptible,
            snapshot.stats.infected,
            snapshot.stats.recovered,
            if failed > 0 {
                format!("  ({failed} failed step(s))")
            } else {
                String::new()
            }
        );
    }
    let state = session.render_state();
    super::write_output(&super::render_series(&state, format), output);
}

/// Start, intervene, then step. Setup failures are fatal; a failed step is
/// reported and the run carries on. Returns the number of failed steps.
async fn drive<B: SimulationBackend>(
    session: &mut Session<B>,
    params: SimulationParameters,
    steps: u32,
    lockdown: Option<f64>,
    vaccinate: Option<f64>,
) -> ControlResult<u32> {
    session.start(params).await?;
    if let Some(strength) = lockdown {
        session.apply_lockdown(strength).await?;
    }
    if let Some(fraction) = vaccinate {
        session.apply_vaccinate(fraction).await?;
    }

    let mut failed = 0;
    for _ in 0..steps {
        if let Err(e) = session.step().await {
            eprintln!("Warning: {e}");
            failed += 1;
        }
    }
    Ok(failed)
}
