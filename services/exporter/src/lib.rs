mod cli;
mod commands;

use fault_export::error::AppError;

pub fn run() -> Result<(), AppError> {
    cli::run()
}
