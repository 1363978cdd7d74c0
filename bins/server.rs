use std::process::ExitCode;

use tracing::{error, info};
use uuid::Uuid;

fn main() -> ExitCode {
    // .env before logging so RUST_LOG and LOG_FORMAT apply
    dotenvy::dotenv().ok();
    common::utils::logging::init_logging_from_env();

    let instance = Uuid::new_v4();
    std::panic::set_hook(Box::new(move |panic| {
        error!(event = "panic", %instance, message = %panic, "unhandled panic");
    }));

    let cfg = match server::startup::load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(event = "config_invalid", error = %e, "refusing to start");
            return ExitCode::FAILURE;
        }
    };

    let mut runtime = tokio::runtime::Builder::new_multi_thread();
    runtime.enable_all();
    if let Some(threads) = cfg.server.worker_threads {
        runtime.worker_threads(threads);
    }
    let runtime = match runtime.build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(event = "runtime_build_failed", error = %e, "cannot build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    info!(
        event = "start",
        %instance,
        pid = std::process::id(),
        version = env!("CARGO_PKG_VERSION"),
        backend = %cfg.storage.backend,
        threads = cfg.server.worker_threads.unwrap_or_default(),
        "deptos starting"
    );

    match runtime.block_on(server::run(cfg)) {
        Ok(()) => {
            info!(event = "stop", %instance, "deptos stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(event = "run_failed", %instance, error = %format!("{e:#}"), "deptos exited with an error");
            ExitCode::FAILURE
        }
    }
}
