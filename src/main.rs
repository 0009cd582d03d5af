use anyhow::Context;
use chrono::Local;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use incbak::{
    dump_config, init_logging, load_settings, save_settings, settings_path, synchronize,
    BackupConfig, CountdownDisplay, IncbakError, RunScheduler, Settings, StopSignal, SyncEvent,
    MAX_INTERVAL_SECS, MIN_INTERVAL_SECS,
};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

fn main() {
    let result = run();
    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(error) => {
            eprintln!("Error: {error:#}");

            if let Some(incbak_error) = error.downcast_ref::<IncbakError>() {
                let suggestions = incbak_error.suggestions();
                if !suggestions.is_empty() {
                    eprintln!("\nSuggestions:");
                    for suggestion in suggestions {
                        eprintln!("  - {suggestion}");
                    }
                }
                process::exit(incbak_error.exit_code());
            }

            process::exit(1);
        }
    }
}

fn cli() -> Command {
    Command::new("incbak")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Periodically mirror new and modified files into a backup folder")
        .long_about(
            "incbak copies every file that is new or newer than its backup from the\n\
             source folder into the same relative path under the backup folder,\n\
             then waits for the configured interval and does it again.",
        )
        .arg(
            Arg::new("source")
                .short('s')
                .long("source")
                .help("Folder to back up")
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("backup")
                .short('b')
                .long("backup")
                .help("Folder that receives the copies")
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("filter")
                .short('f')
                .long("filter")
                .help("Comma-separated file types to back up, e.g. \".txt,.pdf\" (empty = all)")
                .value_name("TYPES"),
        )
        .arg(
            Arg::new("interval")
                .short('i')
                .long("interval")
                .help("Seconds between backup runs")
                .value_name("SECONDS")
                .value_parser(value_parser!(u64).range(MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS)),
        )
        .arg(
            Arg::new("live-countdown")
                .long("live-countdown")
                .help("Show a live countdown to the next run")
                .action(ArgAction::SetTrue)
                .conflicts_with("no-live-countdown"),
        )
        .arg(
            Arg::new("no-live-countdown")
                .long("no-live-countdown")
                .help("Hide the live countdown")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("once")
                .long("once")
                .help("Run a single backup pass and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("save")
                .long("save")
                .help("Store the given options in the settings file")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("Settings file to use instead of the default location")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("dump-config")
                .long("dump-config")
                .help("Display current settings and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Show per-file details")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Suppress all output except errors")
                .action(ArgAction::SetTrue)
                .conflicts_with("verbose"),
        )
}

fn run() -> anyhow::Result<i32> {
    let matches = cli().get_matches();

    let verbose = matches.get_flag("verbose");
    let quiet = matches.get_flag("quiet");
    init_logging(verbose, quiet);

    let settings_file = match matches.get_one::<PathBuf>("config") {
        Some(path) => path.clone(),
        None => settings_path()?,
    };
    let mut settings = load_settings(&settings_file)
        .with_context(|| format!("Could not load settings from {}", settings_file.display()))?;
    apply_overrides(&mut settings, &matches);

    if matches.get_flag("dump-config") {
        dump_config(&settings_file, &settings);
        return Ok(0);
    }

    if matches.get_flag("save") {
        save_settings(&settings_file, &settings)?;
        if !quiet {
            println!("Saved settings to {}", settings_file.display());
        }
    }

    let config = settings.to_backup_config()?;

    if matches.get_flag("once") {
        return run_once(&config, quiet);
    }

    run_scheduled(config, settings.live_countdown, quiet)
}

/// Command line options take precedence over the settings file
fn apply_overrides(settings: &mut Settings, matches: &ArgMatches) {
    if let Some(source) = matches.get_one::<PathBuf>("source") {
        settings.source_dir = source.clone();
    }
    if let Some(backup) = matches.get_one::<PathBuf>("backup") {
        settings.backup_dir = backup.clone();
    }
    if let Some(filter) = matches.get_one::<String>("filter") {
        settings.filter_types = filter.clone();
    }
    if let Some(interval) = matches.get_one::<u64>("interval") {
        settings.interval = *interval;
    }
    if matches.get_flag("live-countdown") {
        settings.live_countdown = true;
    } else if matches.get_flag("no-live-countdown") {
        settings.live_countdown = false;
    }
}

fn timestamped(line: &str) -> String {
    format!("{} {line}", Local::now().format("[%H:%M:%S]"))
}

/// Single pass without the scheduler; Ctrl-C stops after the current file
fn run_once(config: &BackupConfig, quiet: bool) -> anyhow::Result<i32> {
    let stop = StopSignal::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || handler_stop.request())
        .context("Could not install Ctrl-C handler")?;

    Ok(run_pass(config, &stop, quiet))
}

fn run_pass(config: &BackupConfig, stop: &StopSignal, quiet: bool) -> i32 {
    let result = synchronize(config, stop, &mut |event| {
        if let SyncEvent::Failed(failure) = event {
            eprintln!("{}", timestamped(&format!("Error: {}", failure.message)));
        }
    });

    if !quiet {
        println!("{}", timestamped(&format!("Backup finished: {}", result.summary())));
    }

    if !result.completed {
        130
    } else if !result.errors.is_empty() {
        1
    } else {
        0
    }
}

fn run_scheduled(config: BackupConfig, live_countdown: bool, quiet: bool) -> anyhow::Result<i32> {
    let scheduler = Arc::new(RunScheduler::new());
    let display = Arc::new(CountdownDisplay::new(live_countdown && !quiet));

    if quiet {
        scheduler.on_run_summary(|result| {
            for failure in &result.errors {
                eprintln!("{}", timestamped(&format!("Error: {}", failure.message)));
            }
        });
    } else {
        let log_display = Arc::clone(&display);
        scheduler.on_log(move |line| log_display.println(&timestamped(line)));
    }

    if display.is_enabled() {
        let tick_display = Arc::clone(&display);
        scheduler.on_tick(move |tick| tick_display.update(tick));
    }

    let handler_scheduler = Arc::clone(&scheduler);
    ctrlc::set_handler(move || handler_scheduler.stop())
        .context("Could not install Ctrl-C handler")?;

    scheduler.start(config)?;
    scheduler.wait();
    display.finish();

    Ok(0)
}
