use std::any::Any;
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

const DEFAULT_FILTER: &str = "info,tower_http=warn";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Logging knobs read from the environment:
/// `CM_LOG_FORMAT` (`text` | `json`), `CM_LOG_DIR` (daily-rotated file
/// output instead of stdout) and `CM_LOG_INCLUDE_BACKTRACE`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    pub format: LogFormat,
    pub dir: Option<PathBuf>,
    pub include_backtrace: bool,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            format: lookup("CM_LOG_FORMAT")
                .map(|raw| LogFormat::parse(&raw))
                .unwrap_or_default(),
            dir: lookup("CM_LOG_DIR")
                .filter(|raw| !raw.trim().is_empty())
                .map(PathBuf::from),
            include_backtrace: lookup("CM_LOG_INCLUDE_BACKTRACE")
                .map(|raw| raw == "1" || raw.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Report panics (including ones inside engine tasks) as `tracing` errors.
/// Only the first call installs the hook.
pub fn install_tracing_panic_hook(app_name: &'static str) {
    static INSTALLED: OnceLock<()> = OnceLock::new();

    INSTALLED.get_or_init(|| {
        let settings = LogSettings::from_env();
        let default_hook = panic::take_hook();

        panic::set_hook(Box::new(move |info| {
            let thread = std::thread::current();
            let location = info
                .location()
                .map(|loc| format!("{}:{}", loc.file(), loc.line()))
                .unwrap_or_else(|| "unknown".into());

            tracing::error!(
                application = app_name,
                thread = thread.name().unwrap_or("unnamed"),
                %location,
                panic_message = %panic_message(info.payload()),
                "panic"
            );

            if settings.include_backtrace {
                default_hook(info);
            }
        }));
    });
}

fn file_writer(app_name: &str, dir: &Path) -> Option<BoxMakeWriter> {
    if let Err(err) = std::fs::create_dir_all(dir) {
        eprintln!("{app_name}: cannot create log dir {}: {err}", dir.display());
        return None;
    }

    let appender = tracing_appender::rolling::daily(dir, format!("{app_name}.log"));
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);
    Some(BoxMakeWriter::new(writer))
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
/// Repeated calls are ignored.
pub fn init_tracing_subscriber(app_name: &'static str) {
    let settings = LogSettings::from_env();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let writer = settings
        .dir
        .as_ref()
        .and_then(|dir| file_writer(app_name, dir))
        .unwrap_or_else(|| BoxMakeWriter::new(std::io::stdout));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false);

    let _ = match settings.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };

    tracing::debug!(application = app_name, format = ?settings.format, "tracing_initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(vars: &[(&str, &str)]) -> LogSettings {
        LogSettings::from_lookup(|key| {
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.to_string())
        })
    }

    #[test]
    fn defaults_to_text_on_stdout() {
        assert_eq!(settings(&[]), LogSettings::default());
    }

    #[test]
    fn reads_format_dir_and_backtrace() {
        let parsed = settings(&[
            ("CM_LOG_FORMAT", "JSON"),
            ("CM_LOG_DIR", "/var/log/cm"),
            ("CM_LOG_INCLUDE_BACKTRACE", "true"),
        ]);
        assert_eq!(parsed.format, LogFormat::Json);
        assert_eq!(parsed.dir, Some(PathBuf::from("/var/log/cm")));
        assert!(parsed.include_backtrace);
    }

    #[test]
    fn blank_dir_and_unknown_format_fall_back() {
        let parsed = settings(&[("CM_LOG_FORMAT", "yaml"), ("CM_LOG_DIR", "  ")]);
        assert_eq!(parsed.format, LogFormat::Text);
        assert_eq!(parsed.dir, None);
    }

    #[test]
    fn panic_payloads_are_stringified() {
        let boxed: Box<dyn Any + Send> = Box::new("engine blew up");
        assert_eq!(panic_message(boxed.as_ref()), "engine blew up");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "non-string panic payload");
    }
}
