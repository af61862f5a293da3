//! # Scheduling Simulator Daemon
//!
//! Main entry point for the headless simulator host.

use schedsimd::{HostMode, HostRuntime, HostRuntimeConfig};
use services_logger::{LogLevel, Logger};
use sim_kernel::{SchedulingAlgorithm, SimConfig};
use std::env;
use std::fs;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    let (config, log_level) = parse_args(&args).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        print_usage(&args[0]);
        process::exit(1);
    });
    Logger::install_stderr(log_level);

    let mut runtime = HostRuntime::new(config).unwrap_or_else(|e| {
        eprintln!("Failed to create runtime: {}", e);
        process::exit(1);
    });

    if let Err(e) = runtime.run() {
        eprintln!("Runtime error: {}", e);
        process::exit(1);
    }

    for line in runtime.output() {
        println!("{}", line);
    }
    if let Some(snapshot) = runtime.final_snapshot() {
        match snapshot.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to serialize snapshot: {}", e);
                process::exit(1);
            }
        }
    }
}

fn parse_args(args: &[String]) -> Result<(HostRuntimeConfig, LogLevel), String> {
    let mut config = HostRuntimeConfig::default();
    let mut log_level = LogLevel::Info;
    let mut seed = None;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--mode" | "-m" => {
                let value = next_value(args, &mut i, "--mode")?;
                config.mode = match value {
                    "multicore" | "smp" => HostMode::MultiCore,
                    "rtos" => HostMode::Rtos,
                    other => return Err(format!("Invalid mode: {}", other)),
                };
            }
            "--algorithm" | "-a" => {
                let value = next_value(args, &mut i, "--algorithm")?;
                config.algorithm = SchedulingAlgorithm::parse(value)
                    .ok_or_else(|| format!("Invalid algorithm: {}", value))?;
            }
            "--config" | "-c" => {
                let path = next_value(args, &mut i, "--config")?;
                config.sim = SimConfig::from_file(path)
                    .map_err(|e| format!("Failed to load config: {}", e))?;
            }
            "--script" | "-s" => {
                let path = next_value(args, &mut i, "--script")?;
                let script_text = fs::read_to_string(path)
                    .map_err(|e| format!("Failed to read script file: {}", e))?;
                config.script = Some(script_text);
            }
            "--duration-ms" => {
                let value = next_value(args, &mut i, "--duration-ms")?;
                config.duration_ms = value
                    .parse()
                    .map_err(|_| format!("Invalid duration-ms value: {}", value))?;
            }
            "--interrupt-after-ms" => {
                let value = next_value(args, &mut i, "--interrupt-after-ms")?;
                config.interrupt_after_ms = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Invalid interrupt-after-ms value: {}", value))?,
                );
            }
            "--seed" => {
                let value = next_value(args, &mut i, "--seed")?;
                seed = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Invalid seed value: {}", value))?,
                );
            }
            "--log-level" => {
                let value = next_value(args, &mut i, "--log-level")?;
                log_level = match value {
                    "debug" => LogLevel::Debug,
                    "info" => LogLevel::Info,
                    "warn" => LogLevel::Warn,
                    "error" => LogLevel::Error,
                    other => return Err(format!("Invalid log level: {}", other)),
                };
            }
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other => {
                return Err(format!("Unknown option: {}", other));
            }
        }
        i += 1;
    }

    // --seed wins over the config file regardless of argument order
    if seed.is_some() {
        config.sim.seed = seed;
    }
    Ok((config, log_level))
}

fn next_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("Missing value for {}", flag))
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [OPTIONS]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -m, --mode <MODE>          multicore (default) or rtos");
    eprintln!("  -a, --algorithm <NAME>     FCFS (default), RR, Priority or SJF");
    eprintln!("  -c, --config <FILE>        JSON engine configuration");
    eprintln!("  -s, --script <FILE>        Control script (replaces the fixed run)");
    eprintln!("  --duration-ms <N>          Length of the fixed run (default 2000)");
    eprintln!("  --interrupt-after-ms <N>   Raise one interrupt during an RTOS run");
    eprintln!("  --seed <N>                 Seed for reproducible runs");
    eprintln!("  --log-level <LEVEL>        debug, info (default), warn or error");
    eprintln!("  -h, --help                 Show this help message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} --algorithm RR --duration-ms 5000", program);
    eprintln!(
        "  {} --mode rtos --interrupt-after-ms 1000 --seed 7",
        program
    );
}
