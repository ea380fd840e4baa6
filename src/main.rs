use clap::Parser;
use std::process;
use tracing_subscriber::EnvFilter;
use xlunlock::{Cli, OutputFormatter, OutputMode, UnlockError, XlUnlock};

fn main() {
    let exit_code = run();
    process::exit(exit_code);
}

fn run() -> i32 {
    let cli = Cli::parse();
    setup_logging(&cli);

    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    let app = match XlUnlock::from_cli(&cli) {
        Ok(app) => app,
        Err(e) => {
            print_startup_error(&e);
            return exit_code_for(&e);
        }
    };

    if cli.dry_run {
        return match app.dry_run() {
            Ok(_) => 0,
            Err(e) => {
                app.handle_error(&e);
                exit_code_for(&e)
            }
        };
    }

    match app.run() {
        Ok((report, _)) => {
            if report.cancelled {
                130
            } else if report.has_failures() {
                2
            } else {
                0
            }
        }
        Err(e) => {
            app.handle_error(&e);
            exit_code_for(&e)
        }
    }
}

fn exit_code_for(error: &UnlockError) -> i32 {
    match error {
        UnlockError::Cancelled => 130,
        UnlockError::NotFound { .. } => 3,
        UnlockError::Parse { .. } => 4,
        UnlockError::Config { .. } => 5,
        _ => 1,
    }
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli.sample_config_path();
    let formatter = OutputFormatter::new(cli.output_mode(), cli.verbosity_level(), cli.quiet);

    match XlUnlock::generate_sample_config(&config_path) {
        Ok(()) => {
            formatter.success(&format!(
                "Generated sample configuration file: {}",
                config_path.display()
            ));
            if formatter.mode() != OutputMode::Human {
                return 0;
            }
            println!("\nTo use this configuration:");
            println!("  xlunlock --config {}", config_path.display());
            println!("\nEdit the file to list your platforms and policy rules.");
            0
        }
        Err(e) => {
            formatter.print_user_friendly_error(&e);
            1
        }
    }
}

fn print_startup_error(error: &UnlockError) {
    let formatter = OutputFormatter::new(OutputMode::Human, 0, false);
    formatter.print_user_friendly_error(error);
}

/// Log lines go to stderr so JSON output on stdout stays parseable.
fn setup_logging(cli: &Cli) {
    let filter = if cli.quiet {
        EnvFilter::new("error")
    } else {
        match cli.verbose {
            0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
