//! SQLite configuration.

use std::path::{Path, PathBuf};

use crate::error::{SqliteError, SqliteResult};

/// SQLite database configuration.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database path (or ":memory:" for in-memory).
    pub path: DatabasePath,
    /// Enable foreign keys.
    pub foreign_keys: bool,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: Option<u32>,
    /// Synchronous mode.
    pub synchronous: SynchronousMode,
    /// Journal mode.
    pub journal_mode: JournalMode,
    /// Prepared statements kept per connection.
    pub statement_cache: usize,
}

/// Database path configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DatabasePath {
    /// In-memory database.
    #[default]
    Memory,
    /// File-based database.
    File(PathBuf),
}

impl DatabasePath {
    /// Check if this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

/// SQLite synchronous mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SynchronousMode {
    /// No syncing.
    Off,
    /// Sync at critical moments.
    #[default]
    Normal,
    /// Sync on every commit.
    Full,
}

impl SynchronousMode {
    /// Get the SQLite pragma value.
    pub fn as_pragma(&self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Normal => "NORMAL",
            Self::Full => "FULL",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "off" => Some(Self::Off),
            "normal" => Some(Self::Normal),
            "full" => Some(Self::Full),
            _ => None,
        }
    }
}

/// SQLite journal mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JournalMode {
    /// Delete the journal after each transaction.
    Delete,
    /// Keep the journal in memory.
    Memory,
    /// Write-ahead logging.
    #[default]
    Wal,
}

impl JournalMode {
    /// Get the SQLite pragma value.
    pub fn as_pragma(&self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Memory => "MEMORY",
            Self::Wal => "WAL",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "delete" => Some(Self::Delete),
            "memory" => Some(Self::Memory),
            "wal" => Some(Self::Wal),
            _ => None,
        }
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: DatabasePath::Memory,
            foreign_keys: true,
            busy_timeout_ms: Some(5000),
            synchronous: SynchronousMode::Normal,
            journal_mode: JournalMode::Wal,
            statement_cache: 64,
        }
    }
}

impl SqliteConfig {
    /// Configuration for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Configuration for a file-based database.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            path: DatabasePath::File(path.as_ref().to_path_buf()),
            ..Default::default()
        }
    }

    /// Parse a SQLite URL into configuration.
    ///
    /// Supported formats:
    /// - `sqlite::memory:` - In-memory database
    /// - `sqlite://path/to/db.sqlite` - File-based database
    /// - `file:path/to/db.sqlite` - Alternative format
    ///
    /// Query parameters `foreign_keys`, `busy_timeout`, `synchronous` and
    /// `journal_mode` override the defaults.
    pub fn from_url(url: impl AsRef<str>) -> SqliteResult<Self> {
        let url = url.as_ref().trim();
        let (location, query) = match url.split_once('?') {
            Some((location, query)) => (location, Some(query)),
            None => (url, None),
        };

        let mut config = match location {
            "sqlite::memory:" | ":memory:" | "sqlite://:memory:" => Self::memory(),
            _ => {
                let path = location
                    .strip_prefix("sqlite://")
                    .or_else(|| location.strip_prefix("sqlite:"))
                    .or_else(|| location.strip_prefix("file:"))
                    .unwrap_or(location);
                if path.is_empty() {
                    return Err(SqliteError::config("database path is required"));
                }
                Self::file(path)
            }
        };

        for pair in query.into_iter().flat_map(|q| q.split('&')) {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            match key {
                "mode" if value == "memory" => config.path = DatabasePath::Memory,
                "foreign_keys" => config.foreign_keys = value == "true" || value == "1",
                "busy_timeout" => {
                    let ms = value
                        .parse()
                        .map_err(|_| SqliteError::config(format!("invalid busy_timeout: {value}")))?;
                    config.busy_timeout_ms = Some(ms);
                }
                "synchronous" => {
                    config.synchronous = SynchronousMode::parse(value)
                        .ok_or_else(|| SqliteError::config(format!("invalid synchronous mode: {value}")))?;
                }
                "journal_mode" => {
                    config.journal_mode = JournalMode::parse(value)
                        .ok_or_else(|| SqliteError::config(format!("invalid journal mode: {value}")))?;
                }
                _ => {}
            }
        }

        Ok(config)
    }

    /// The pragmas applied when a connection opens.
    pub fn init_sql(&self) -> String {
        let mut sql = String::new();

        if self.foreign_keys {
            sql.push_str("PRAGMA foreign_keys = ON;\n");
        }
        if !self.path.is_memory() {
            sql.push_str(&format!("PRAGMA journal_mode = {};\n", self.journal_mode.as_pragma()));
        }
        sql.push_str(&format!("PRAGMA synchronous = {};\n", self.synchronous.as_pragma()));
        if let Some(timeout) = self.busy_timeout_ms {
            sql.push_str(&format!("PRAGMA busy_timeout = {timeout};\n"));
        }

        sql
    }

    /// Enable or disable foreign keys.
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Set the busy timeout in milliseconds.
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = Some(ms);
        self
    }

    /// Set the synchronous mode.
    pub fn synchronous(mut self, mode: SynchronousMode) -> Self {
        self.synchronous = mode;
        self
    }

    /// Set the journal mode.
    pub fn journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = mode;
        self
    }

    /// Set the prepared statement cache capacity.
    pub fn statement_cache(mut self, capacity: usize) -> Self {
        self.statement_cache = capacity;
        self
    }
}
