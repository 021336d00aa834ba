use std::time::Instant;

use chef_migrator_cli::{
    cli::{CLI, init_tracing},
    report::emit_error_report,
};
use clap::Parser;

#[tokio::main]
async fn main() {
    let started_at = Instant::now();
    let CLI { command } = CLI::parse();
    init_tracing();
    let json = command.json_output();

    match command.run(started_at).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(error) => {
            emit_error_report(json, started_at, &error);
            std::process::exit(1);
        }
    }
}
