use clap::{Parser, Subcommand};
use runlog::{
    config::{Config, ConfigStore, FileConfigStore},
    controller::TrackingController,
    geo_math::{GeoPoint, PathRegion},
    history::{newest_first, DeleteOutcome, HistoryStore, SqliteHistoryStore},
    location::{self, ReplayLocationSource},
    runtime::TrackerEvent,
    SessionSummary, TrackerError,
};
use std::{error::Error, fs::File, path::PathBuf, sync::mpsc, time::Duration};

/// headless run tracker: replay recorded fixes and review saved runs
#[derive(Parser, Debug)]
#[clap(version, about)]
struct Cli {
    /// history database to use instead of the configured one
    #[clap(long, global = true)]
    db: Option<PathBuf>,

    /// config file to use instead of the default location
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// run a session from a CSV of `latitude,longitude` fixes
    Replay {
        file: PathBuf,

        /// seconds of elapsed time between consecutive fixes
        #[clap(short = 's', long, default_value_t = 5)]
        seconds_per_fix: u64,

        /// pause before the delivered fix with this index (0-based, after the
        /// configured min-distance filter)
        #[clap(long)]
        pause_at: Option<usize>,

        /// resume before the delivered fix with this index
        #[clap(long, requires = "pause_at")]
        resume_at: Option<usize>,

        /// print the summary without saving it
        #[clap(long)]
        no_save: bool,
    },
    /// list saved runs, newest first
    History,
    /// show one saved run
    Show { id: i64 },
    /// delete a saved run
    Delete { id: i64 },
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUNLOG_LOG", "runlog=info"),
    )
    .init();

    let cli = Cli::parse();
    let config_store = match &cli.config {
        Some(path) => FileConfigStore::with_path(path),
        None => FileConfigStore::new(),
    };
    let config = config_store.load();
    let db_path = cli.db.clone().unwrap_or_else(|| config.resolve_db_path());

    match cli.command {
        Command::Replay {
            file,
            seconds_per_fix,
            pause_at,
            resume_at,
            no_save,
        } => {
            let fixes = ReplayLocationSource::read_csv(File::open(&file)?)?;
            let mut controller = replay(&config, fixes, seconds_per_fix, pause_at, resume_at)?;

            let summary = if no_save {
                let summary = controller.summary()?;
                controller.discard()?;
                summary
            } else {
                let mut store = SqliteHistoryStore::open(&db_path)?;
                let summary = controller.save(&mut store)?;
                store.close()?;
                summary
            };
            print_run(&summary);
        }
        Command::History => {
            let store = SqliteHistoryStore::open(&db_path)?;
            let runs = newest_first(store.list_all()?);
            if runs.is_empty() {
                println!("No runs saved yet");
            }
            for run in &runs {
                println!(
                    "#{:<4} {:>10} {}  {:>6} km  {}  {} min/km  {:.2} km/h",
                    run.id.unwrap_or_default(),
                    run.date,
                    run.start_time,
                    run.distance_km,
                    run.duration,
                    run.pace_min_per_km,
                    run.avg_speed_kmh
                );
            }
        }
        Command::Show { id } => {
            let store = SqliteHistoryStore::open(&db_path)?;
            match store.get(id)? {
                Some(run) => print_run(&run),
                None => {
                    eprintln!("run {} not found", id);
                    std::process::exit(1);
                }
            }
        }
        Command::Delete { id } => {
            let mut store = SqliteHistoryStore::open(&db_path)?;
            match store.delete_by_id(id)? {
                DeleteOutcome::Deleted => println!("deleted run {}", id),
                DeleteOutcome::NotFound => {
                    eprintln!("run {} not found", id);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

/// Play recorded fixes through a tracking session on a simulated clock.
///
/// Fixes arrive through a real watch opened with the configured options, and each
/// delivered fix is followed by `seconds_per_fix` ticks. Returns the stopped session.
fn replay(
    config: &Config,
    fixes: Vec<GeoPoint>,
    seconds_per_fix: u64,
    pause_at: Option<usize>,
    resume_at: Option<usize>,
) -> runlog::Result<TrackingController<ReplayLocationSource>> {
    let expected = location::distance_filtered(&fixes, config.watch.min_distance_meters).len();
    let source = ReplayLocationSource::new(fixes, Duration::ZERO);
    let (tx, rx) = mpsc::channel();
    let mut controller = TrackingController::new(source, config.watch, tx)
        .with_date_format(config.date_format.clone());

    controller.start()?;
    if let Some(e) = controller.location_error() {
        return Err(e.clone());
    }

    let timeout = Duration::from_millis(config.watch.timeout_ms);
    for i in 0..expected {
        let event = rx
            .recv_timeout(timeout)
            .map_err(|e| TrackerError::LocationUnavailable {
                message: format!("fix {} not delivered: {}", i, e),
            })?;
        if pause_at == Some(i) {
            controller.pause()?;
        }
        if resume_at == Some(i) {
            controller.resume()?;
        }
        controller.handle_event(event);
        for _ in 0..seconds_per_fix {
            controller.handle_event(TrackerEvent::Tick);
        }
    }

    controller.stop()?;
    Ok(controller)
}

fn print_run(run: &SessionSummary) {
    if let Some(id) = run.id {
        println!("Run #{}", id);
    }
    println!("Date:       {}", run.date);
    println!("Started:    {}", run.start_time);
    println!("Finished:   {}", run.end_time);
    println!("Distance:   {} km", run.distance_km);
    println!("Duration:   {}", run.duration);
    println!("Pace:       {} min/km", run.pace_min_per_km);
    println!("Avg speed:  {:.2} km/h", run.avg_speed_kmh);
    println!("Points:     {}", run.path.len());
    if let Some(region) = PathRegion::from_path(&run.path) {
        println!(
            "Center:     {:.5}, {:.5}",
            region.center.latitude, region.center.longitude
        );
    }
}
