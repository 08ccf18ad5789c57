//! Process-wide logging bootstrap.
//!
//! # Responsibility
//! - Start the logger once per process, to stderr or to rolling files.
//! - Record panics as single-line `event=panic_captured` entries.
//!
//! # Invariants
//! - A second init with identical settings is a no-op.
//! - A second init with different settings is rejected, never applied.
//! - Initialization reports failures as values and never panics.

use crate::config::LogConfig;
use flexi_logger::{
    Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{error, info, LevelFilter};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

const FILE_BASENAME: &str = "metis";
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_FILES: usize = 5;
const PANIC_PAYLOAD_LIMIT: usize = 160;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

/// Where log records go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    /// Rolling files under an absolute directory; warnings are echoed to stderr.
    Dir(PathBuf),
}

impl Display for LogTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stderr => f.write_str("stderr"),
            Self::Dir(dir) => write!(f, "{}", dir.display()),
        }
    }
}

struct ActiveLogger {
    level: LevelFilter,
    target: LogTarget,
    _handle: LoggerHandle,
}

#[derive(Debug)]
pub enum LoggingError {
    UnsupportedLevel(String),
    RelativeDir(PathBuf),
    CreateDir { dir: PathBuf, source: std::io::Error },
    Backend(flexi_logger::FlexiLoggerError),
    /// Logging already runs with other settings.
    Conflict { active: String, requested: String },
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected off|error|warn|info|debug|trace"
            ),
            Self::RelativeDir(dir) => {
                write!(f, "log directory must be absolute, got `{}`", dir.display())
            }
            Self::CreateDir { dir, source } => {
                write!(f, "cannot create log directory `{}`: {source}", dir.display())
            }
            Self::Backend(err) => write!(f, "logger backend failed to start: {err}"),
            Self::Conflict { active, requested } => write!(
                f,
                "logging already active as {active}; refusing to switch to {requested}"
            ),
        }
    }
}

impl Error for LoggingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateDir { source, .. } => Some(source),
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }
}

/// Starts logging from the `Log` config section. An empty `Dir` logs to stderr.
pub fn init_logging_from_config(config: &LogConfig) -> Result<(), LoggingError> {
    init_logging(&config.level, &config.dir)
}

/// Starts logging at `level`; `log_dir` empty means stderr.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), LoggingError> {
    let level = parse_level(level)?;
    let target = parse_target(log_dir)?;

    let active = ACTIVE.get_or_try_init(|| start(level, &target))?;
    if active.level != level || active.target != target {
        return Err(LoggingError::Conflict {
            active: describe(active.level, &active.target),
            requested: describe(level, &target),
        });
    }
    Ok(())
}

/// Level and target of the running logger, if any.
pub fn logging_status() -> Option<(LevelFilter, LogTarget)> {
    ACTIVE
        .get()
        .map(|active| (active.level, active.target.clone()))
}

/// `debug` in debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start(level: LevelFilter, target: &LogTarget) -> Result<ActiveLogger, LoggingError> {
    let logger = Logger::with(flexi_logger::LogSpecification::builder().default(level).build());
    let logger = match target {
        LogTarget::Stderr => logger
            .log_to_stderr()
            .format_for_stderr(flexi_logger::detailed_format),
        LogTarget::Dir(dir) => {
            std::fs::create_dir_all(dir).map_err(|source| LoggingError::CreateDir {
                dir: dir.clone(),
                source,
            })?;
            logger
                .log_to_file(FileSpec::default().directory(dir).basename(FILE_BASENAME))
                .rotate(
                    Criterion::Size(ROTATE_AT_BYTES),
                    Naming::Numbers,
                    Cleanup::KeepLogFiles(KEEP_FILES),
                )
                .append()
                .duplicate_to_stderr(Duplicate::Warn)
                .format_for_files(flexi_logger::detailed_format)
        }
    };
    let handle = logger
        .write_mode(WriteMode::BufferAndFlush)
        .start()
        .map_err(LoggingError::Backend)?;

    hook_panics();
    info!(
        "event=logging_init module=core status=ok level={} target={} version={}",
        level,
        target,
        env!("CARGO_PKG_VERSION")
    );

    Ok(ActiveLogger {
        level,
        target: target.clone(),
        _handle: handle,
    })
}

fn describe(level: LevelFilter, target: &LogTarget) -> String {
    format!("level={level} target={target}")
}

fn parse_level(level: &str) -> Result<LevelFilter, LoggingError> {
    let trimmed = level.trim();
    let normalized = if trimmed.eq_ignore_ascii_case("warning") {
        "warn"
    } else {
        trimmed
    };
    LevelFilter::from_str(normalized)
        .map_err(|_| LoggingError::UnsupportedLevel(trimmed.to_string()))
}

fn parse_target(log_dir: &str) -> Result<LogTarget, LoggingError> {
    let trimmed = log_dir.trim();
    if trimmed.is_empty() {
        return Ok(LogTarget::Stderr);
    }
    let dir = Path::new(trimmed);
    if dir.is_relative() {
        return Err(LoggingError::RelativeDir(dir.to_path_buf()));
    }
    Ok(LogTarget::Dir(dir.to_path_buf()))
}

fn hook_panics() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }

    let chained = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        // Payloads can echo request fields.
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(String::as_str))
            .unwrap_or("<non-string payload>");
        let location = info.location().map_or_else(
            || "unknown".to_string(),
            |at| format!("{}:{}", at.file(), at.line()),
        );
        error!(
            "event=panic_captured module=core status=error location={} payload={}",
            location,
            one_line(payload, PANIC_PAYLOAD_LIMIT)
        );
        chained(info);
    }));
}

fn one_line(value: &str, limit: usize) -> String {
    let mut line: String = value
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .take(limit)
        .collect();
    if value.chars().nth(limit).is_some() {
        line.push_str("...");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::{init_logging, logging_status, one_line, parse_level, parse_target};
    use super::{LogTarget, LoggingError};
    use log::LevelFilter;

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!(parse_level("INFO").unwrap(), LevelFilter::Info);
        assert_eq!(parse_level(" warning ").unwrap(), LevelFilter::Warn);
        assert!(matches!(
            parse_level("verbose"),
            Err(LoggingError::UnsupportedLevel(level)) if level == "verbose"
        ));
    }

    #[test]
    fn empty_dir_means_stderr_and_relative_dir_is_rejected() {
        assert_eq!(parse_target("  ").unwrap(), LogTarget::Stderr);
        assert!(matches!(
            parse_target("logs/dev"),
            Err(LoggingError::RelativeDir(_))
        ));
    }

    #[test]
    fn one_line_strips_control_chars_and_caps_length() {
        assert_eq!(one_line("a\nb\rc", 10), "a b c");
        assert_eq!(one_line("abcdefgh", 4), "abcd...");
        assert_eq!(one_line("abcd", 4), "abcd");
    }

    #[test]
    fn second_init_must_match_the_first() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let dir_str = dir.path().to_str().unwrap().to_string();
        let other_str = other.path().to_str().unwrap().to_string();

        init_logging("info", &dir_str).expect("first init");
        init_logging("INFO", &dir_str).expect("same settings are a no-op");

        let err = init_logging("debug", &dir_str).unwrap_err();
        assert!(matches!(err, LoggingError::Conflict { .. }));
        let err = init_logging("info", &other_str).unwrap_err();
        assert!(err.to_string().contains("refusing to switch"));
        let err = init_logging("info", "").unwrap_err();
        assert!(matches!(err, LoggingError::Conflict { .. }));

        let (level, target) = logging_status().expect("logger is active");
        assert_eq!(level, LevelFilter::Info);
        assert_eq!(target, LogTarget::Dir(dir.path().to_path_buf()));
    }
}
