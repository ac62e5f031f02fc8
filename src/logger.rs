use chrono::Utc;
use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
    sync::{Mutex, OnceLock},
};

/// Flight log file, attached once the data directory is known.
static LOG_FILE: OnceLock<Mutex<File>> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Event,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Level {
    fn label(self) -> &'static str {
        match self {
            Level::Event => "EVENT",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Level::Event => "\x1b[36m",
            Level::Debug => "\x1b[33m",
            Level::Info => "\x1b[32m",
            Level::Warning => "\x1b[35m",
            Level::Error => "\x1b[31m",
            Level::Critical => "\x1b[1;31m",
        }
    }
}

/// Starts mirroring every record into `path` (append mode).
pub fn init_file<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    // A second call keeps the first file; the log of one flight is never split.
    let _ = LOG_FILE.set(Mutex::new(file));
    Ok(())
}

/// Renders one record as `<timestamp> <level> <logger>:<function>: <message>`.
pub fn format_record(ts: f64, level: Level, logger: &str, function: &str, msg: &str) -> String {
    format!("{ts:.6} {:<8} {logger}:{function}: {msg}", level.label())
}

#[doc(hidden)]
pub fn emit(level: Level, logger: &str, function: &str, msg: &str) {
    #[allow(clippy::cast_precision_loss)]
    let ts = Utc::now().timestamp_micros() as f64 / 1_000_000.0;
    let line = format_record(ts, level, logger, function, msg);
    println!("{}[{}]\x1b[0m {line}", level.color(), level.label());
    if level >= Level::Error {
        eprintln!("{line}");
    }
    if let Some(file) = LOG_FILE.get() {
        if let Ok(mut f) = file.lock() {
            let _ = writeln!(f, "{line}");
        }
    }
}

/// Strips the helper item and any async closure frames off a `type_name` path.
#[doc(hidden)]
pub fn short_fn_name(path: &'static str) -> &'static str {
    let mut name = path.strip_suffix("::__f").unwrap_or(path);
    while let Some(stripped) = name.strip_suffix("::{{closure}}") {
        name = stripped;
    }
    name.rsplit("::").next().unwrap_or(name)
}

#[macro_export]
macro_rules! function_name {
    () => {{
        fn __f() {}
        fn type_name_of<T>(_: T) -> &'static str { std::any::type_name::<T>() }
        $crate::logger::short_fn_name(type_name_of(__f))
    }};
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::logger::emit($crate::logger::Level::Info, module_path!(), $crate::function_name!(), &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log {
    ($($arg:tt)*) => {
        $crate::logger::emit($crate::logger::Level::Debug, module_path!(), $crate::function_name!(), &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::logger::emit($crate::logger::Level::Warning, module_path!(), $crate::function_name!(), &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::logger::emit($crate::logger::Level::Error, module_path!(), $crate::function_name!(), &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! fatal {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::logger::emit($crate::logger::Level::Critical, module_path!(), $crate::function_name!(), &msg);
        panic!("{msg}")
    }};
}

#[macro_export]
macro_rules! event {
    ($($arg:tt)*) => {
        if std::env::var("LOG_SRP_EVENTS").is_ok() {
            $crate::logger::emit($crate::logger::Level::Event, module_path!(), $crate::function_name!(), &format!($($arg)*))
        }
    };
}
