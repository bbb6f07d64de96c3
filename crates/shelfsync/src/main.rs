//! The main function for the shelfsync command
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    shelfsync_lib::run().await
}
