// Log console for evaluation diagnostics

use std::fmt;

/// Severity of a console entry, ordered `Debug < Info < Warning < Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// Ordered record of the messages produced during one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogConsole {
    entries: Vec<(LogLevel, String)>,
}

impl LogConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and mirror it to `tracing` at the matching level
    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Debug => tracing::debug!(target: "hexpat::console", "{}", message),
            LogLevel::Info => tracing::info!(target: "hexpat::console", "{}", message),
            LogLevel::Warning => tracing::warn!(target: "hexpat::console", "{}", message),
            LogLevel::Error => tracing::error!(target: "hexpat::console", "{}", message),
        }
        self.entries.push((level, message));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[(LogLevel, String)] {
        &self.entries
    }

    /// Messages logged at exactly `level`, in order
    pub fn messages(&self, level: LogLevel) -> impl Iterator<Item = &str> + '_ {
        self.entries
            .iter()
            .filter(move |(l, _)| *l == level)
            .map(|(_, m)| m.as_str())
    }

    pub fn into_entries(self) -> Vec<(LogLevel, String)> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_entries_keep_order() {
        let mut console = LogConsole::new();
        console.log(LogLevel::Info, "first");
        console.log(LogLevel::Warning, "second");
        console.log(LogLevel::Info, "third");

        assert_eq!(console.entries().len(), 3);
        assert_eq!(console.messages(LogLevel::Info).collect::<Vec<_>>(), vec!["first", "third"]);

        console.clear();
        assert!(console.entries().is_empty());
    }
}
