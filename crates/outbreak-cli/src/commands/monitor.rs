use outbreak_core::{DriverHandle, Intent, Session};

use super::{ParamArgs, ServiceArgs};

pub fn run(
    service: &ServiceArgs,
    params: &ParamArgs,
    lockdown: f64,
    vaccinate: f64,
    log_file: Option<&str>,
) {
    // The terminal belongs to the dashboard: log to a file or not at all.
    super::init_logging(log_file, true);

    let config = service.config();
    let backend = super::make_backend(&config);
    let rt = super::make_runtime();
    let driver = DriverHandle::spawn_on(Session::new(backend, config), rt.handle());

    let mut app = crate::tui::app::App::new(
        driver.intents(),
        driver.render(),
        params.parameters(),
        lockdown,
        vaccinate,
    );
    let result = app.run();
    driver.submit(Intent::Shutdown);

    if let Err(e) = result {
        eprintln!("TUI error: {e}");
        std::process::exit(1);
    }
    if let Some(path) = app.last_export() {
        println!("Series exported to {}", path.display());
    }
}
