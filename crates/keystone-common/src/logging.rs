//! Hierarchical component loggers
//!
//! Every container owns a root [`Logger`]; each component it drives receives
//! a child bound to a dotted path (`app`, `app.cache`, `app.jobs.worker`).
//! Children share the root's level state, so changing the level anywhere in
//! the tree applies to the whole tree.
//!
//! Output goes through `tracing`: each message becomes an event carrying a
//! `logger` field with the node's path and the node's tags rendered as
//! `key=value` pairs in front of the message.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Log levels, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl LogLevel {
    /// Parse log level from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "DEBUG" => Some(LogLevel::Debug),
            "INFO" => Some(LogLevel::Info),
            "WARN" | "WARNING" => Some(LogLevel::Warn),
            "ERROR" => Some(LogLevel::Error),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Subscriber options for [`init`]
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Maximum level the subscriber records
    pub level: Option<LogLevel>,
    /// Emit ANSI colors
    pub ansi: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            level: Some(LogLevel::Info),
            ansi: true,
        }
    }
}

/// Install a `tracing_subscriber::fmt` subscriber as the global default.
///
/// Fails if another subscriber is already installed; hosts that manage their
/// own subscriber simply skip this.
pub fn init(options: LogOptions) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let level: tracing::Level = options.level.unwrap_or(LogLevel::Info).into();
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(options.ansi)
        .try_init()
}

/// Structured field tags for logging
pub type Tags = HashMap<String, serde_json::Value>;

/// Logger bound to a dotted path in a container's logger tree
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

struct LoggerInner {
    path: String,
    tags: Tags,
    state: Arc<LoggerState>,
}

struct LoggerState {
    min_level: AtomicU8,
}

impl Logger {
    /// Create the root node of a logger tree
    pub fn root(name: impl Into<String>, level: LogLevel) -> Self {
        Self {
            inner: Arc::new(LoggerInner {
                path: name.into(),
                tags: Tags::new(),
                state: Arc::new(LoggerState {
                    min_level: AtomicU8::new(level as u8),
                }),
            }),
        }
    }

    /// Derive a child logger at `<path>.<name>`, inheriting tags and level state
    pub fn child(&self, name: &str) -> Self {
        let path = if self.inner.path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.inner.path, name)
        };

        Self {
            inner: Arc::new(LoggerInner {
                path,
                tags: self.inner.tags.clone(),
                state: Arc::clone(&self.inner.state),
            }),
        }
    }

    /// Copy of this logger with an extra tag
    pub fn with_tag(&self, key: impl Into<String>, value: serde_json::Value) -> Self {
        let mut tags = self.inner.tags.clone();
        tags.insert(key.into(), value);

        Self {
            inner: Arc::new(LoggerInner {
                path: self.inner.path.clone(),
                tags,
                state: Arc::clone(&self.inner.state),
            }),
        }
    }

    /// Dotted path of this node
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Tags attached to this node
    pub fn tags(&self) -> &Tags {
        &self.inner.tags
    }

    /// Current minimum level of the tree
    pub fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.inner.state.min_level.load(Ordering::Relaxed))
    }

    /// Change the minimum level for every logger in the tree
    pub fn set_level(&self, level: LogLevel) {
        self.inner.state.min_level.store(level as u8, Ordering::Relaxed);
    }

    /// Whether messages at `level` pass the tree's minimum level
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level >= self.level()
    }

    /// Log a debug message
    pub fn debug(&self, message: &str, extra: Option<Tags>) {
        self.log(LogLevel::Debug, message, extra);
    }

    /// Log an info message
    pub fn info(&self, message: &str, extra: Option<Tags>) {
        self.log(LogLevel::Info, message, extra);
    }

    /// Log a warning message
    pub fn warn(&self, message: &str, extra: Option<Tags>) {
        self.log(LogLevel::Warn, message, extra);
    }

    /// Log an error message
    pub fn error(&self, message: &str, extra: Option<Tags>) {
        self.log(LogLevel::Error, message, extra);
    }

    /// Start a performance timer; it logs again with the elapsed time on drop
    pub fn time(&self, message: impl Into<String>, extra: Option<Tags>) -> Timer {
        let message = message.into();
        let extra = extra.unwrap_or_default();
        let mut start_fields = extra.clone();
        start_fields.insert(
            "status".to_string(),
            serde_json::Value::String("started".to_string()),
        );
        self.debug(&message, Some(start_fields));

        Timer {
            message,
            start: Instant::now(),
            extra,
            logger: self.clone(),
        }
    }

    fn log(&self, level: LogLevel, message: &str, extra: Option<Tags>) {
        if !self.is_enabled(level) {
            return;
        }
        let formatted = self.build_message(message, extra);
        self.write_log(level, &formatted);
    }

    /// Render tags and extra fields as sorted `key=value` pairs before the message
    pub(crate) fn build_message(&self, message: &str, extra: Option<Tags>) -> String {
        let mut all_fields = self.inner.tags.clone();
        if let Some(extra_fields) = extra {
            all_fields.extend(extra_fields);
        }

        let mut fields: Vec<String> = all_fields
            .iter()
            .filter_map(|(key, value)| {
                let formatted_value = match value {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Number(n) => n.to_string(),
                    serde_json::Value::Bool(b) => b.to_string(),
                    serde_json::Value::Null => return None,
                    other => other.to_string(),
                };
                Some(format!("{}={}", key, formatted_value))
            })
            .collect();
        fields.sort();

        let parts: Vec<String> = vec![fields.join(" "), message.to_string()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();

        parts.join(" ")
    }

    fn write_log(&self, level: LogLevel, message: &str) {
        let path = self.inner.path.as_str();
        match level {
            LogLevel::Debug => tracing::debug!(logger = path, "{}", message),
            LogLevel::Info => tracing::info!(logger = path, "{}", message),
            LogLevel::Warn => tracing::warn!(logger = path, "{}", message),
            LogLevel::Error => tracing::error!(logger = path, "{}", message),
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("path", &self.inner.path)
            .field("level", &self.level())
            .finish()
    }
}

/// Performance timing helper
pub struct Timer {
    message: String,
    start: Instant,
    extra: Tags,
    logger: Logger,
}

impl Timer {
    /// Stop the timer and log duration
    pub fn stop(self) {
        // logged by Drop
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let mut fields = std::mem::take(&mut self.extra);
        fields.insert(
            "status".to_string(),
            serde_json::Value::String("completed".to_string()),
        );
        fields.insert(
            "duration".to_string(),
            serde_json::Value::Number(serde_json::Number::from(duration.as_millis() as u64)),
        );
        self.logger.debug(&self.message, Some(fields));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_str("info"), Some(LogLevel::Info));
        assert_eq!(LogLevel::from_str("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str("error"), Some(LogLevel::Error));
        assert_eq!(LogLevel::from_str("invalid"), None);
    }

    #[test]
    fn test_child_paths() {
        let root = Logger::root("app", LogLevel::Info);
        let child = root.child("jobs");
        let grandchild = child.child("worker");

        assert_eq!(root.path(), "app");
        assert_eq!(child.path(), "app.jobs");
        assert_eq!(grandchild.path(), "app.jobs.worker");
    }

    #[test]
    fn test_level_is_shared_across_tree() {
        let root = Logger::root("app", LogLevel::Info);
        let child = root.child("cache");

        assert!(!child.is_enabled(LogLevel::Debug));
        child.set_level(LogLevel::Debug);
        assert!(root.is_enabled(LogLevel::Debug));
        assert_eq!(root.level(), LogLevel::Debug);
    }

    #[test]
    fn test_tags_are_inherited_and_sorted() {
        let root = Logger::root("app", LogLevel::Info)
            .with_tag("zone", serde_json::json!("eu"))
            .with_tag("attempt", serde_json::json!(2));
        let child = root.child("db");

        let mut extra = Tags::new();
        extra.insert("skipped".to_string(), serde_json::Value::Null);
        let message = child.build_message("connected", Some(extra));

        assert_eq!(message, "attempt=2 zone=eu connected");
    }

    #[test]
    fn test_with_tag_does_not_mutate_original() {
        let root = Logger::root("app", LogLevel::Info);
        let tagged = root.with_tag("role", serde_json::json!("random"));

        assert!(root.tags().is_empty());
        assert_eq!(tagged.tags().len(), 1);
    }

    #[test]
    fn test_timer_logs_without_subscriber() {
        let logger = Logger::root("app", LogLevel::Debug);
        let timer = logger.time("drive", None);
        timer.stop();
    }
}
