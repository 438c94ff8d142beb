use log::error;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match noteboard::ui::io::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
