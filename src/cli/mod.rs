pub mod config;
pub mod drivers;
pub mod mqtt;

use anyhow::{anyhow, Result};
use clap::{Arg, ArgMatches, Command};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use crate::{
    api::{open_shared_port, SharedPort},
    core::{Controller, Dispatcher, Invoker, Router, SharedController},
    protocol::RtuDevice,
};
use config::{DeviceConfig, GatewayConfig};
use mqtt::MqttSource;

pub const DEFAULT_CONFIG_PATH: &str = "gateway.json";

fn device_arg() -> Arg {
    Arg::new("device")
        .long("device")
        .short('d')
        .help("Device id from the config file (defaults to the first device)")
        .value_name("ID")
}

/// Build the command line definition.
pub fn command() -> Command {
    Command::new("rtu-gateway")
        .about("Bridge MQTT commands to MODBUS-RTU coils and timer registers")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Path to the JSON configuration file")
                .value_name("FILE")
                .default_value(DEFAULT_CONFIG_PATH)
                .global(true),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .help("Also append log records to this file")
                .value_name("FILE")
                .global(true),
        )
        .subcommand(Command::new("run").about("Subscribe to the broker and serve commands"))
        .subcommand(
            Command::new("coil-cycle")
                .about("Drive random coil patterns and validate after each write")
                .arg(device_arg())
                .arg(
                    Arg::new("delay-ms")
                        .long("delay-ms")
                        .help("Pause between steps")
                        .value_name("MS")
                        .default_value("2000")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    Arg::new("rounds")
                        .long("rounds")
                        .help("Number of on/off rounds; 0 runs until interrupted")
                        .value_name("N")
                        .default_value("0")
                        .value_parser(clap::value_parser!(u32)),
                ),
        )
        .subcommand(
            Command::new("timer-program")
                .about("Program timer blocks T1..T4")
                .arg(device_arg())
                .arg(
                    Arg::new("reset")
                        .long("reset")
                        .help("Restore the previous timer values afterwards")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("validate")
                .about("Compare the coil bank with a fresh all-off cache once")
                .arg(device_arg()),
        )
}

/// Parse command line arguments and return ArgMatches.
pub fn parse_args() -> ArgMatches {
    command().get_matches()
}

/// Open every distinct serial line once and bind one controller per device.
pub fn build_controllers(config: &GatewayConfig) -> Result<Vec<SharedController>> {
    let mut ports: HashMap<&str, SharedPort> = HashMap::new();
    let mut controllers = Vec::with_capacity(config.devices.len());

    for device in &config.devices {
        let port = match ports.get(device.port_name.as_str()) {
            Some(port) => Arc::clone(port),
            None => {
                let port = open_shared_port(
                    &device.port_name,
                    device.baud_rate,
                    Duration::from_millis(device.timeout_ms),
                )?;
                ports.insert(device.port_name.as_str(), Arc::clone(&port));
                port
            }
        };
        controllers.push(controller_for(device, port));
    }

    Ok(controllers)
}

fn controller_for(device: &DeviceConfig, port: SharedPort) -> SharedController {
    let rtu = RtuDevice::new(port, &device.port_name, device.station_id);
    Controller::new(&device.id, Box::new(rtu), device.num_coils).into_shared()
}

fn select_device<'a>(config: &'a GatewayConfig, matches: &ArgMatches) -> Result<&'a DeviceConfig> {
    match matches.get_one::<String>("device") {
        Some(id) => config
            .device(id)
            .ok_or_else(|| anyhow!("Device '{id}' is not in the config file")),
        None => config
            .devices
            .first()
            .ok_or_else(|| anyhow!("No devices configured")),
    }
}

fn open_selected(config: &GatewayConfig, matches: &ArgMatches) -> Result<SharedController> {
    let device = select_device(config, matches)?;
    let port = open_shared_port(
        &device.port_name,
        device.baud_rate,
        Duration::from_millis(device.timeout_ms),
    )?;
    Ok(controller_for(device, port))
}

fn interrupt_flag() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Interrupted, stopping");
        flag.store(false, Ordering::SeqCst);
    })?;
    Ok(running)
}

/// Serve MQTT commands until interrupted.
///
/// The MQTT event loop delivers on its own thread; the invoker consumer runs
/// on the calling thread.
pub fn run_gateway(config: &GatewayConfig) -> Result<()> {
    let controllers = build_controllers(config)?;
    let router = Router::from_iter(controllers);
    log::info!("Serving devices {:?}", router.device_ids());

    let invoker = Invoker::new();
    let handle = invoker.handle();
    let dispatcher = Dispatcher::new(router, invoker.handle());

    let source = MqttSource::connect(&config.mqtt)?;
    let control = source.control();
    {
        let control = control.clone();
        let handle = handle.clone();
        ctrlc::set_handler(move || {
            log::info!("Interrupted, shutting down");
            control.stop();
            handle.shutdown();
        })?;
    }

    let listener = thread::Builder::new()
        .name("mqtt".to_string())
        .spawn(move || {
            source.run(&dispatcher);
            // The consumer exits once the event loop is gone.
            handle.shutdown();
        })?;

    invoker.run();
    control.stop();
    if listener.join().is_err() {
        log::error!("MQTT thread panicked");
    }
    Ok(())
}

pub fn run_coil_cycle(config: &GatewayConfig, matches: &ArgMatches) -> Result<()> {
    let plc = open_selected(config, matches)?;
    let delay = Duration::from_millis(*matches.get_one::<u64>("delay-ms").unwrap_or(&2000));
    let rounds = *matches.get_one::<u32>("rounds").unwrap_or(&0);
    let running = interrupt_flag()?;

    let summary = drivers::coil_cycle(&Invoker::new(), &plc, delay, rounds, &running);
    log::info!(
        "Coil cycle finished: {} round(s), {} consistent, {} diverged, {} unknown, {} failed write(s)",
        summary.rounds,
        summary.consistent,
        summary.diverged,
        summary.unknown,
        summary.failed_writes
    );
    Ok(())
}

pub fn run_timer_program(config: &GatewayConfig, matches: &ArgMatches) -> Result<()> {
    let plc = open_selected(config, matches)?;
    let reports = drivers::timer_program(&Invoker::new(), &plc, matches.get_flag("reset"));

    let failed = reports
        .iter()
        .filter(|report| report.outcome.is_failure())
        .count();
    if failed > 0 {
        return Err(anyhow!("{failed} timer command(s) failed"));
    }
    Ok(())
}

/// Returns whether the coil bank matched the cache.
pub fn run_validate(config: &GatewayConfig, matches: &ArgMatches) -> Result<bool> {
    let plc = open_selected(config, matches)?;
    let result = drivers::validate_once(&Invoker::new(), &plc);
    log::info!("Validation result: {result:?}");
    Ok(result.is_consistent())
}
