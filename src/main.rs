use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use tsguard::cli::CommandLineInterface;

fn main() -> anyhow::Result<ExitCode> {
    let command_line_interface = CommandLineInterface::load();
    let default_level = match command_line_interface.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
    command_line_interface.run()
}
