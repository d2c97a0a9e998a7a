use std::{
    fs::{self, OpenOptions},
    io::{self, stdin, Write},
    path::PathBuf,
    time::Duration,
};

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use env_logger::{Env, Target};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};

use studytime::{
    app::App,
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    export::write_csv,
    format::{format_duration, TimeFormat},
    metrics::WeeklySummary,
    recorder::{RecorderHandle, SessionRecorder},
    runtime::{spawn_terminal_reader, ChannelEventSource, EventSource, Runner},
    store::{open_store, StoreBackend},
    tick::{ThreadTickSource, TickSource},
    timer::{TimerEngine, TimerMode},
    ui::screen::draw,
};

const POLL_INTERVAL_MS: u64 = 250;

/// pomodoro timer and stopwatch with a weekly study log
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal study companion: a pomodoro timer and stopwatch that log study sessions and chart the last seven days."
)]
pub struct Cli {
    #[clap(subcommand)]
    command: Option<Command>,

    /// timer to start with
    #[clap(short = 'm', long, value_enum, default_value_t = TimerMode::Pomodoro)]
    mode: TimerMode,

    /// starting study block length in minutes
    #[clap(long)]
    study_mins: Option<u64>,

    /// starting break length in minutes
    #[clap(long)]
    break_mins: Option<u64>,

    /// show MM:SS while under an hour
    #[clap(long)]
    compact: bool,

    /// session storage backend
    #[clap(long, value_enum, global = true)]
    backend: Option<StoreBackend>,

    /// database file (sqlite) or document root (document)
    #[clap(long, global = true)]
    data_path: Option<PathBuf>,

    /// account whose sessions are read and written (document backend)
    #[clap(long, global = true)]
    account: Option<String>,

    /// config file to use instead of the platform default
    #[clap(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// print totals for the last seven days
    Summary {
        /// print machine-readable JSON
        #[clap(long)]
        json: bool,
    },
    /// write logged sessions as CSV
    Export {
        /// how many days back to include
        #[clap(short, long, default_value_t = 7)]
        days: u32,

        /// output file, stdout when omitted
        #[clap(short, long)]
        out: Option<PathBuf>,
    },
}

impl Cli {
    /// Persisted config with this run's flags layered on top.
    fn resolve_config(&self) -> Config {
        let store = match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        };
        let mut cfg = store.load();

        if let Some(mins) = self.study_mins {
            cfg.study_secs = mins.saturating_mul(60);
        }
        if let Some(mins) = self.break_mins {
            cfg.break_secs = mins.saturating_mul(60);
        }
        if self.compact {
            cfg.time_format = TimeFormat::Compact;
        }
        if let Some(backend) = self.backend {
            cfg.backend = backend;
        }
        if let Some(path) = &self.data_path {
            cfg.data_path = Some(path.clone());
        }
        if let Some(account) = &self.account {
            cfg.account = Some(account.clone());
        }
        cfg
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = cli.resolve_config();

    match &cli.command {
        None => {
            if !stdin().is_tty() {
                let mut cmd = Cli::command();
                cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
            }
            init_logging(true);
            run_tui(&cfg, cli.mode)
        }
        Some(Command::Summary { json }) => {
            init_logging(false);
            run_summary(&cfg, *json)
        }
        Some(Command::Export { days, out }) => {
            init_logging(false);
            run_export(&cfg, *days, out.as_deref())
        }
    }
}

/// The terminal UI owns stdout and stderr, so it logs to a file instead.
fn init_logging(to_file: bool) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));

    if to_file {
        let file = AppDirs::log_path().and_then(|path| {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).ok()?;
            }
            OpenOptions::new().create(true).append(true).open(path).ok()
        });
        match file {
            Some(file) => {
                builder.target(Target::Pipe(Box::new(file)));
            }
            None => {
                builder.filter_level(log::LevelFilter::Off);
            }
        }
    }

    // A second init (tests, embedding) is harmless.
    let _ = builder.try_init();
}

fn run_tui(cfg: &Config, mode: TimerMode) -> Result<()> {
    let store = open_store(&cfg.store_settings()).context("failed to open session store")?;
    let recorder = RecorderHandle::spawn(store).context("failed to start recorder")?;

    let (tx, events) = ChannelEventSource::channel();
    let engine = TimerEngine::new(mode, cfg.durations(), ThreadTickSource::new(tx.clone()));
    let mut app = App::new(engine, recorder, tx.clone(), cfg.time_format);
    spawn_terminal_reader(tx);
    let runner = Runner::new(events, Duration::from_millis(POLL_INTERVAL_MS));

    log::info!("studytime starting in {mode} mode");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend, T: TickSource, E: EventSource>(
    terminal: &mut Terminal<B>,
    app: &mut App<T>,
    runner: &Runner<E>,
) -> Result<()> {
    terminal.draw(|f| draw(&*app, f))?;

    while !app.should_quit() {
        if let Some(event) = runner.step() {
            if app.handle_event(event) {
                terminal.draw(|f| draw(&*app, f))?;
            }
        }
    }

    log::info!("studytime exiting");
    Ok(())
}

fn run_summary(cfg: &Config, json: bool) -> Result<()> {
    let store = open_store(&cfg.store_settings()).context("failed to open session store")?;
    let recorder = SessionRecorder::new(store);
    let summary = recorder
        .weekly_summary(&Local::now())
        .context("failed to load weekly summary")?;

    let mut out = io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &summary)?;
        writeln!(out)?;
    } else {
        print_summary(&mut out, &summary)?;
    }

    recorder.close().context("failed to close session store")?;
    Ok(())
}

fn print_summary<W: Write>(out: &mut W, summary: &WeeklySummary) -> io::Result<()> {
    writeln!(out, "Last 7 days")?;
    for day in &summary.days {
        writeln!(
            out,
            "  {}  {:>8}  {} blocks",
            day.date.format("%a %Y-%m-%d"),
            format_duration(day.time as f64),
            day.blocks
        )?;
    }
    writeln!(out)?;
    writeln!(out, "Total:          {}", format_duration(summary.total_time as f64))?;
    writeln!(out, "Weekly average: {}", format_duration(summary.weekly_average_secs))?;
    writeln!(out, "Blocks:         {}", summary.total_blocks)?;
    writeln!(out, "Avg per block:  {}", format_duration(summary.avg_time_per_block_secs))?;
    Ok(())
}

fn run_export(cfg: &Config, days: u32, out: Option<&std::path::Path>) -> Result<()> {
    let store = open_store(&cfg.store_settings()).context("failed to open session store")?;
    let recorder = SessionRecorder::new(store);
    let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
    let records = recorder
        .sessions_since(&cutoff)
        .context("failed to read sessions")?;

    let written = match out {
        Some(path) => {
            let file = fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            write_csv(&records, file)?
        }
        None => write_csv(&records, io::stdout().lock())?,
    };
    log::info!("exported {written} sessions");

    recorder.close().context("failed to close session store")?;
    Ok(())
}
