//! Kolosal Boundary - Main Entry Point

use clap::Parser;
use kolosal_boundary::cli::{cmd_colors, cmd_scatter, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kolosal_boundary=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scatter {
            data,
            target,
            reference,
            method,
            params,
            step,
            threshold,
            multiplier,
            seed,
            config,
            output,
        } => {
            cmd_scatter(
                &data,
                &target,
                reference.as_deref(),
                &method,
                params.as_deref(),
                step,
                threshold,
                multiplier,
                seed,
                config.as_deref(),
                output.as_deref(),
            )?;
        }
        Commands::Colors { data, target, method } => {
            cmd_colors(&data, &target, &method)?;
        }
    }

    Ok(())
}
