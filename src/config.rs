use alloc::string::ToString;
use alloc::sync::Arc;
use core::any::Any;
use core::fmt;

use crate::memory::{Allocator, DefaultAllocator};
use crate::Error;

bitflags::bitflags! {
    /// Behaviour switches that apply to a whole operation.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ConfigFlags: u32 {
        /// Consume the values of unknown mapping keys instead of failing.
        const IGNORE_UNKNOWN_KEYS = 1 << 0;
        /// Emit mappings and sequences in block style by default.
        const STYLE_BLOCK = 1 << 1;
        /// Emit mappings and sequences in flow style by default.
        const STYLE_FLOW = 1 << 2;
        /// Emit `---` and `...` around the document.
        const DOCUMENT_DELIM = 1 << 3;
        /// Compare keys and names case-insensitively unless a value says
        /// otherwise.
        const CASE_INSENSITIVE = 1 << 4;
        /// Reject aliases and skip anchor recording.
        const NO_ALIAS = 1 << 5;
        /// Log a warning for each ignored key.
        const IGNORED_KEY_WARNING = 1 << 6;
    }
}

/// Message severity.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    #[default]
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Notice => "NOTICE",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        })
    }
}

/// Receives each log message the engine composes.
pub type LogFn = Arc<dyn Fn(LogLevel, &str) + Send + Sync>;

/// Client data handed to every validator.
pub type Context = Arc<dyn Any + Send + Sync>;

/// Settings shared by [`load_bytes()`](crate::load_bytes),
/// [`save_bytes()`](crate::save_bytes), [`copy()`](crate::copy) and
/// [`free()`](crate::free).
///
/// Without a log function, messages go to [`tracing`].
#[derive(Clone)]
pub struct Config {
    /// Behaviour switches.
    pub flags: ConfigFlags,
    /// Messages below this level are dropped.
    pub log_level: LogLevel,
    log_fn: Option<LogFn>,
    allocator: Arc<dyn Allocator>,
    context: Option<Context>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("flags", &self.flags)
            .field("log_level", &self.log_level)
            .field("log_fn", &self.log_fn.is_some())
            .field("context", &self.context.is_some())
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn new() -> Config {
        Config {
            flags: ConfigFlags::empty(),
            log_level: LogLevel::default(),
            log_fn: None,
            allocator: Arc::new(DefaultAllocator),
            context: None,
        }
    }

    #[must_use]
    pub fn with_flags(mut self, flags: ConfigFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    #[must_use]
    pub fn with_log_fn(mut self, log_fn: impl Fn(LogLevel, &str) + Send + Sync + 'static) -> Self {
        self.log_fn = Some(Arc::new(log_fn));
        self
    }

    #[must_use]
    pub fn with_allocator(mut self, allocator: Arc<dyn Allocator>) -> Self {
        self.allocator = allocator;
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    pub fn allocator(&self) -> &dyn Allocator {
        &*self.allocator
    }

    pub fn context(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.context.as_deref()
    }

    pub(crate) fn log(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        if level < self.log_level {
            return;
        }
        if let Some(log_fn) = &self.log_fn {
            log_fn(level, &args.to_string());
            return;
        }
        match level {
            LogLevel::Debug => tracing::debug!("{args}"),
            LogLevel::Info | LogLevel::Notice => tracing::info!("{args}"),
            LogLevel::Warning => tracing::warn!("{args}"),
            LogLevel::Error => tracing::error!("{args}"),
        }
    }

    /// Report a failed operation, with the path to the offending value.
    pub(crate) fn log_failure(&self, operation: &str, err: &Error) {
        self.log(LogLevel::Error, format_args!("{operation}: {err}"));
    }
}
