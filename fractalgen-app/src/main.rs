mod app;
mod app_dir;
mod io_worker;
mod preferences;
mod ui;

use std::process::ExitCode;

use tracing::error;

fn main() -> ExitCode {
    match app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Fatal: {e}");
            ExitCode::FAILURE
        }
    }
}
