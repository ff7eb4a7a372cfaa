use std::process::ExitCode;

use rtu_gateway::{boot, cli};

fn main() -> ExitCode {
    let matches = cli::parse_args();
    boot::init_logging(matches.get_one::<String>("log-file").map(String::as_str));

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(cli::DEFAULT_CONFIG_PATH);
    let config = match cli::config::GatewayConfig::from_file(config_path) {
        Ok(config) => config,
        Err(err) => {
            log::error!("{err:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = match matches.subcommand() {
        Some(("run", _)) => cli::run_gateway(&config),
        Some(("coil-cycle", sub)) => cli::run_coil_cycle(&config, sub),
        Some(("timer-program", sub)) => cli::run_timer_program(&config, sub),
        Some(("validate", sub)) => match cli::run_validate(&config, sub) {
            Ok(true) => Ok(()),
            Ok(false) => return ExitCode::FAILURE,
            Err(err) => Err(err),
        },
        Some((other, _)) => Err(anyhow::anyhow!("Unknown subcommand {other}")),
        None => Err(anyhow::anyhow!("No subcommand given")),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
