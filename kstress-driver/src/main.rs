//! kstress driver - runs N instances of one stressor.
//!
//! Usage: kstress-driver <stressor> [--instances N] [--ops N] [--timeout SECS]
//!                       [--verify] [--temp-path DIR] [-v]...

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::{ Duration, Instant };

use kstress::insights::{ init_logging, level_for_verbosity, stressor_span };
use kstress::{ config_error, ExitStatus, MetricsSnapshot, RunControl, StressArgs, Stressor, STRESSORS };
use tracing::{ error, info, warn };

struct Options {
    stressor: &'static dyn Stressor,
    instances: u32,
    max_ops: u64,
    timeout: Option<Duration>,
    verify: bool,
    temp_path: PathBuf,
    verbosity: u8,
}

fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    if argv.is_empty() || argv.iter().any(|a| a == "--help" || a == "-h") {
        usage();
        return ExitCode::from(ExitStatus::Failure.code() as u8);
    }

    let options = match parse(&argv) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("kstress-driver: {}", err);
            usage();
            return ExitCode::from(ExitStatus::Failure.code() as u8);
        }
    };
    init_logging(level_for_verbosity(options.verbosity));

    let control = match options.timeout {
        Some(timeout) => RunControl::with_timeout(timeout),
        None => RunControl::new(),
    };
    let c = control.clone();
    if let Err(err) = ctrlc::set_handler(move || c.stop()) {
        warn!(%err, "cannot install Ctrl-C handler");
    }

    info!(
        stressor = options.stressor.name(),
        instances = options.instances,
        max_ops = options.max_ops,
        verify = options.verify,
        "starting"
    );

    let status = run(&options, &control);
    ExitCode::from(status.code() as u8)
}

/// Run every instance to completion, print the totals and return the worst
/// instance status.
fn run(options: &Options, control: &Arc<RunControl>) -> ExitStatus {
    let start = Instant::now();
    let stressor = options.stressor;
    let args: Vec<StressArgs> = (0..options.instances)
        .map(|instance| {
            StressArgs::new(stressor.name(), control.clone())
                .with_instance(instance)
                .with_max_ops(options.max_ops)
                .with_verify(options.verify)
                .with_temp_base(&options.temp_path)
        })
        .collect();

    let statuses: Vec<ExitStatus> = thread::scope(|s| {
        let handles: Vec<_> = args
            .iter()
            .map(|args| {
                s.spawn(move || {
                    let _span = stressor_span(args.name(), args.instance()).entered();
                    let result = stressor.run(args);
                    if let Err(err) = &result {
                        error!(%err, "instance failed");
                    }
                    match ExitStatus::from(&result) {
                        ExitStatus::Success if args.snapshot().failures > 0 => ExitStatus::NotSuccess,
                        status => status,
                    }
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or(ExitStatus::Failure))
            .collect()
    });

    let mut total = MetricsSnapshot::default();
    for args in &args {
        total.merge(&args.snapshot());
    }
    total.elapsed = start.elapsed();

    println!("{}: {} instance(s), {}", stressor.name(), args.len(), total);

    ExitStatus::worst(statuses)
}

fn parse(argv: &[String]) -> kstress::Result<Options> {
    let mut iter = argv.iter();
    let name = iter.next().ok_or_else(|| config_error!("missing stressor name"))?;
    let stressor = kstress::stressor::find(name).ok_or_else(|| config_error!("unknown stressor '{}'", name))?;

    let mut options = Options {
        stressor,
        instances: 1,
        max_ops: 0,
        timeout: None,
        verify: false,
        temp_path: PathBuf::from("."),
        verbosity: 0,
    };

    while let Some(flag) = iter.next() {
        let mut value = || iter.next().ok_or_else(|| config_error!("{} needs a value", flag));
        match flag.as_str() {
            "--instances" | "-n" => options.instances = number(flag, value()?)?,
            "--ops" => options.max_ops = number(flag, value()?)?,
            "--timeout" | "-t" => options.timeout = Some(Duration::from_secs(number(flag, value()?)?)),
            "--temp-path" => options.temp_path = PathBuf::from(value()?),
            "--verify" => options.verify = true,
            "-v" | "--verbose" => options.verbosity += 1,
            "-vv" => options.verbosity += 2,
            other => return Err(config_error!("unknown option '{}'", other)),
        }
    }

    if options.instances == 0 {
        return Err(config_error!("--instances must be at least 1"));
    }
    Ok(options)
}

fn number<T: std::str::FromStr>(flag: &str, value: &str) -> kstress::Result<T> {
    value.parse().map_err(|_| config_error!("{}: '{}' is not a number", flag, value))
}

fn usage() {
    eprintln!("Usage: kstress-driver <stressor> [--instances N] [--ops N] [--timeout SECS]");
    eprintln!("                      [--verify] [--temp-path DIR] [-v]...");
    eprintln!();
    eprintln!("Stressors:");
    for stressor in STRESSORS {
        for help in stressor.help() {
            let short = help.short.map(|s| format!("-{}", s)).unwrap_or_default();
            eprintln!("  {:>4} --{:<12} {}", short, help.long, help.description);
        }
    }
}
