#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod error_fmt;
mod run;

use clap::Parser;
use cli::{Cli, Commands};
use eyre::WrapErr;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn load_config(path: Option<&Path>) -> eyre::Result<soc_config::Config> {
    let Some(path) = path else {
        return Ok(soc_config::Config::default());
    };
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    Ok(soc_config::load_toml(&text)?)
}

fn init_tracing(cli: &Cli, logging: &soc_config::Logging) -> eyre::Result<()> {
    // RUST_LOG wins, then --log-level, then [logging].level
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        let level = cli
            .log_level
            .as_deref()
            .or(logging.level.as_deref())
            .unwrap_or("info");
        EnvFilter::try_new(level)
    })?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    let res = if cli.json || logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    res.map_err(|e| eyre::eyre!("init tracing: {e}"))
}

fn real_main(cli: &Cli) -> eyre::Result<()> {
    let cfg = load_config(cli.config.as_deref())?;
    init_tracing(cli, &cfg.logging)?;
    cfg.validate()?;
    tracing::debug!(chemistry = %cfg.battery.chemistry, "config validated");

    match &cli.cmd {
        Commands::Run(args) => run::run_closed_loop(&cfg, args, cli.json),
        Commands::CheckConfig => run::check_config(&cfg, cli.json),
    }
}

fn main() {
    // Plain eyre reports on stderr; panics get color-eyre's hook
    let _ = color_eyre::install();
    let cli = Cli::parse();
    if let Err(e) = real_main(&cli) {
        if cli.json {
            eprintln!("{}", error_fmt::format_error_json(&e));
        } else {
            eprintln!("{}", error_fmt::humanize(&e));
        }
        std::process::exit(error_fmt::exit_code_for_error(&e));
    }
}
