use std::fs::File;
use std::path::PathBuf;

use clap::Clap;
use eyre::WrapErr;
use itertools::izip;

use bufsim::theory::estimated_station_arrival_rate;
use bufsim::{DisciplineKind, MmckModel, ResolvedConfig, SimulationConfig, Statistics};

#[derive(Clap, Debug)]
#[clap(name = "sim", about = "Discrete-event simulation of a buffet restaurant")]
struct Opt {
    /// Path to the JSON configuration file.
    #[clap(long)]
    config: PathBuf,

    /// Overrides the arrival horizon from the configuration, in seconds.
    #[clap(long)]
    horizon: Option<f64>,

    /// Overrides the RNG seed from the configuration.
    #[clap(long)]
    seed: Option<u64>,

    /// Each occurrence increases verbosity (`-v` debug, `-vv` trace).
    #[clap(short, long, parse(from_occurrences))]
    verbose: i32,

    /// Writes the log to this file.
    #[clap(long)]
    log_output: Option<PathBuf>,

    /// Disables logging to stderr.
    #[clap(long)]
    no_stderr: bool,

    /// Disables the progress bar.
    #[clap(long)]
    no_progress: bool,

    /// Prints the statistics as JSON instead of a report.
    #[clap(long)]
    json: bool,
}

fn set_up_logger(opt: &Opt) -> Result<(), fern::InitError> {
    let level = match opt.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let mut dispatch = fern::Dispatch::new().level(level).format(|out, message, record| {
        out.finish(format_args!(
            "[{}][{}] {}",
            record.target(),
            record.level(),
            message
        ));
    });
    if !opt.no_stderr {
        dispatch = dispatch.chain(std::io::stderr());
    }
    if let Some(path) = &opt.log_output {
        dispatch = dispatch.chain(fern::log_file(path)?);
    }
    dispatch.apply()?;
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn print_report(config: &ResolvedConfig, stats: &Statistics) {
    println!("=== Totals ===============================================");
    println!("arrivals       {:>12}", stats.arrivals);
    println!("exits          {:>12}", stats.exits);
    println!("balked         {:>12}", stats.balked);
    println!("reneged        {:>12}", stats.reneged);
    println!("mean wait      {:>12.3}s", stats.mean_wait);
    println!("mean visit     {:>12.3}s", stats.mean_system_time);
    println!("throughput     {:>12.5}/s", stats.throughput);
    println!("=== Stations =============================================");
    println!(
        "{:<12} {:>10} {:>10} {:>10} {:>10}",
        "station", "attempts", "blocked", "P(block)", "mean wait"
    );
    for (station, attempts, blocked, p_block, wait) in izip!(
        &config.stations,
        &stats.attempts,
        &stats.blocking_events,
        &stats.blocking_probability,
        &stats.mean_wait_per_station
    ) {
        println!(
            "{:<12} {:>10} {:>10} {:>10.4} {:>9.3}s",
            station.name, attempts, blocked, p_block, wait
        );
    }
    println!("=== M/M/c/K comparison ===================================");
    println!(
        "{:<12} {:>12} {:>12} {:>12}",
        "station", "P(block) sim", "P(block) thr", "E[wait] thr"
    );
    for (idx, (station, p_block)) in config
        .stations
        .iter()
        .zip(&stats.blocking_probability)
        .enumerate()
    {
        if station.discipline == DisciplineKind::Dynamic {
            // Shared serving slots put dynamic stations outside the M/M/c/K
            // model.
            println!("{:<12} {:>12.4} {:>12} {:>12}", station.name, p_block, "-", "-");
            continue;
        }
        let model = MmckModel {
            arrival_rate: estimated_station_arrival_rate(config, idx.into()),
            service_rate: 1.0 / station.mean_service_time,
            servers: station.servers,
            capacity: station.capacity,
        };
        println!(
            "{:<12} {:>12.4} {:>12.4} {:>11.3}s",
            station.name,
            p_block,
            model.blocking_probability(),
            model.expected_wait()
        );
    }
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let opt = Opt::parse();
    set_up_logger(&opt).wrap_err("failed to set up the logger")?;
    let file = File::open(&opt.config)
        .wrap_err_with(|| format!("failed to open {}", opt.config.display()))?;
    let mut config = SimulationConfig::from_json(file)?;
    if let Some(horizon) = opt.horizon {
        config.horizon = horizon;
    }
    if let Some(seed) = opt.seed {
        config.seed = seed;
    }
    let config = config.resolve()?;
    log::info!(
        "simulating {} stations and {} gates for {}s (seed {})",
        config.stations.len(),
        config.gates.len(),
        config.horizon,
        config.seed
    );
    let mut built = bufsim::build(&config);
    if opt.no_progress {
        bufsim::run(&mut built);
    } else {
        bufsim::run_with_progress(&mut built);
    }
    let stats = built
        .sim
        .state
        .get(built.analysis)
        .expect("analysis lives in the state")
        .calculate_statistics();
    if opt.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_report(&config, &stats);
    }
    Ok(())
}
