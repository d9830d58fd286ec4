use crate::services::naming;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::sync::OnceLock;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{
    EnvFilter, Registry, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

/// Size above which the primary log is moved aside (10 MiB).
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Line format `YYYY-MM-DD HH:MM:SS,mmm - LEVEL: message`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S,%3f");
        write!(writer, "{} - {}: ", now, event.metadata().level())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Append-only log file that moves itself aside once it grows past a limit.
///
/// Wraps the primary log file; the size check runs when the file is opened
/// and before every write. Backups are named
/// `<stem>_backup_YYYYMMDD_HHMMSS<.ext>` next to the primary.
pub struct RotatingLogFile {
    path: Utf8PathBuf,
    max_bytes: u64,
    file: File,
    written: u64,
}

impl RotatingLogFile {
    pub fn open(path: impl Into<Utf8PathBuf>, max_bytes: u64) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let (file, written) = Self::open_primary(&path)?;
        let mut log = Self {
            path,
            max_bytes,
            file,
            written,
        };
        log.rotate_if_needed()?;
        Ok(log)
    }

    fn open_primary(path: &Utf8Path) -> io::Result<(File, u64)> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let written = file.metadata()?.len();
        Ok((file, written))
    }

    fn rotate_if_needed(&mut self) -> io::Result<()> {
        if self.written <= self.max_bytes {
            return Ok(());
        }

        self.file.flush()?;
        let mut backup = backup_path(&self.path, chrono::Local::now());
        if let (Some(dir), Some(name)) = (backup.parent(), backup.file_name()) {
            // Two rotations in the same second must not clobber each other
            backup = naming::unique_destination(dir, name);
        }
        fs::rename(&self.path, &backup)?;

        let (file, written) = Self::open_primary(&self.path)?;
        self.file = file;
        self.written = written;
        Ok(())
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl Write for RotatingLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Err(e) = self.rotate_if_needed() {
            // Keep logging into the oversized file rather than dropping lines
            eprintln!("Log rotation failed for {}: {}", self.path, e);
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Backup name for a rotated log.
pub fn backup_path<Tz>(log_path: &Utf8Path, now: chrono::DateTime<Tz>) -> Utf8PathBuf
where
    Tz: chrono::TimeZone,
    Tz::Offset: fmt::Display,
{
    let stem = log_path.file_stem().unwrap_or("log");
    let stamp = now.format("%Y%m%d_%H%M%S");
    let name = match log_path.extension() {
        Some(ext) => format!("{}_backup_{}.{}", stem, stamp, ext),
        None => format!("{}_backup_{}", stem, stamp),
    };
    log_path.with_file_name(name)
}

/// Recognizes the log file and its rotated backups by name.
///
/// Built once per log path; the backup pattern is compiled up front.
#[derive(Debug, Clone)]
pub struct LogArtifacts {
    log_path: Utf8PathBuf,
    backups: Option<Regex>,
}

impl LogArtifacts {
    pub fn new(log_path: &Utf8Path) -> Self {
        let backups = log_path.file_name().and_then(|log_name| {
            let stem = log_path.file_stem().unwrap_or(log_name);
            let ext = log_path
                .extension()
                .map(|e| format!(r"\.{}", regex::escape(e)))
                .unwrap_or_default();
            let pattern = format!(
                r"^{}_backup_\d{{8}}_\d{{6}}(_\d+)?{}$",
                regex::escape(stem),
                ext
            );
            Regex::new(&pattern).ok()
        });

        Self {
            log_path: log_path.to_path_buf(),
            backups,
        }
    }

    pub fn log_path(&self) -> &Utf8Path {
        &self.log_path
    }

    /// Whether `file_name` is the log itself or one of its rotated backups.
    pub fn matches(&self, file_name: &str) -> bool {
        if self.log_path.file_name() == Some(file_name) {
            return true;
        }
        self.backups
            .as_ref()
            .is_some_and(|re| re.is_match(file_name))
    }
}

/// Reload handle for the installed level filter.
static LOG_LEVEL: OnceLock<LogLevel> = OnceLock::new();

/// Switches the running subscriber between info and debug level.
pub struct LogLevel {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl LogLevel {
    pub fn set_debug(&self, enabled: bool) -> Result<()> {
        self.handle
            .reload(level_filter(enabled))
            .context("Failed to reload log level")
    }
}

fn level_filter(debug_mode: bool) -> EnvFilter {
    if debug_mode {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    }
}

/// Apply a debug mode toggle to the subscriber installed by
/// [`setup_logging`]. Does nothing when no subscriber was installed here.
pub fn set_debug_mode(enabled: bool) {
    let Some(level) = LOG_LEVEL.get() else {
        return;
    };
    match level.set_debug(enabled) {
        Ok(()) => tracing::info!("Debug logging {}", if enabled { "on" } else { "off" }),
        Err(e) => tracing::warn!("{:#}", e),
    }
}

/// Setup logging into the organizer's log file.
///
/// # Arguments
/// * `log_file` - Primary log file (its parent directory is created)
/// * `debug_mode` - If true, use debug level; otherwise use info level
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active
pub fn setup_logging(
    log_file: &Utf8Path,
    debug_mode: bool,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    setup_logging_with_console(log_file, debug_mode, false)
}

/// Setup logging with optional console output for debugging.
///
/// # Arguments
/// * `log_file` - Primary log file
/// * `debug_mode` - If true, use debug level; otherwise use info level
/// * `console_output` - If true, also log to console
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active
pub fn setup_logging_with_console(
    log_file: &Utf8Path,
    debug_mode: bool,
    console_output: bool,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let writer = RotatingLogFile::open(log_file, MAX_LOG_BYTES)
        .with_context(|| format!("Failed to open log file: {}", log_file))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(writer);

    let (env_filter, reload_handle) = reload::Layer::new(level_filter(debug_mode));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(LineFormat);

    if console_output {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(console_layer)
            .try_init()
            .context("Failed to install tracing subscriber")?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .try_init()
            .context("Failed to install tracing subscriber")?;
    }

    let _ = LOG_LEVEL.set(LogLevel {
        handle: reload_handle,
    });

    tracing::info!(
        "Logging initialized: file={}, debug={}, console={}",
        log_file,
        debug_mode,
        console_output
    );

    Ok(guard)
}
