//! Configuration management.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables (with `.env` loaded through `dotenvy`). The result
//! is a [`DalConfig`] that [`RepositoryFactory`](crate::RepositoryFactory)
//! turns into a repository.

mod source;

pub use source::{ConfigSource, EnvSource, MapSource};

use crate::{Error, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable names read by [`DalConfig`].
pub mod vars {
    /// Backend selection.
    pub const DATABASE_TYPE: &str = "DATABASE_TYPE";
    /// Explicit configuration file.
    pub const CONFIG_PATH: &str = "ARCHON_CONFIG_PATH";
    /// Supabase project URL.
    pub const SUPABASE_URL: &str = "SUPABASE_URL";
    /// Supabase service-role key.
    pub const SUPABASE_SERVICE_KEY: &str = "SUPABASE_SERVICE_KEY";
    /// Supabase request timeout in seconds.
    pub const SUPABASE_TIMEOUT_SECS: &str = "SUPABASE_TIMEOUT_SECS";
    /// SQLite database file.
    pub const SQLITE_PATH: &str = "SQLITE_PATH";
    /// SQLite busy timeout in milliseconds.
    pub const SQLITE_BUSY_TIMEOUT_MS: &str = "SQLITE_BUSY_TIMEOUT_MS";
    /// Migration checksum policy.
    pub const MIGRATION_CHECKSUM_POLICY: &str = "ARCHON_MIGRATION_CHECKSUM_POLICY";
    /// Log filter directives.
    pub const LOG: &str = "ARCHON_LOG";
    /// Log format (`pretty` or `json`).
    pub const LOG_FORMAT: &str = "ARCHON_LOG_FORMAT";
    /// Log file path.
    pub const LOG_FILE: &str = "ARCHON_LOG_FILE";
}

/// Default SQLite busy timeout.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;
/// Default Supabase request timeout.
pub const DEFAULT_SUPABASE_TIMEOUT_SECS: u64 = 30;
/// Table prefix used by the hosted schema.
pub const DEFAULT_TABLE_PREFIX: &str = "archon_";
/// File name of the default SQLite database.
pub const DEFAULT_SQLITE_FILE: &str = "archon.db";

/// Which repository implementation to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepositoryKind {
    /// Hosted PostgreSQL through PostgREST.
    #[default]
    Supabase,
    /// Embedded SQLite file.
    Sqlite,
    /// In-memory double.
    Fake,
}

impl RepositoryKind {
    /// Parses a backend name (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "supabase" => Some(Self::Supabase),
            "sqlite" => Some(Self::Sqlite),
            "fake" | "memory" => Some(Self::Fake),
            _ => None,
        }
    }

    /// Parses a backend name, falling back to Supabase for unknown values.
    #[must_use]
    pub fn parse_or_default(s: &str) -> Self {
        Self::parse(s).unwrap_or_else(|| {
            tracing::warn!(
                database_type = s,
                "Unknown DATABASE_TYPE, falling back to supabase"
            );
            Self::Supabase
        })
    }

    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Supabase => "supabase",
            Self::Sqlite => "sqlite",
            Self::Fake => "fake",
        }
    }
}

impl fmt::Display for RepositoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when an applied migration file no longer matches its checksum.
///
/// A drifted file is never re-applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumPolicy {
    /// Accept silently.
    Ignore,
    /// Log a warning and continue.
    #[default]
    Warn,
    /// Refuse to open the database.
    Reject,
}

impl ChecksumPolicy {
    /// Parses a policy name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "ignore" => Some(Self::Ignore),
            "warn" => Some(Self::Warn),
            "reject" | "strict" => Some(Self::Reject),
            _ => None,
        }
    }
}

/// SQLite backend settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    /// Database file.
    pub path: PathBuf,
    /// `busy_timeout` pragma in milliseconds.
    pub busy_timeout_ms: u64,
    /// Migration checksum drift handling.
    pub checksum_policy: ChecksumPolicy,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: default_sqlite_path(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            checksum_policy: ChecksumPolicy::default(),
        }
    }
}

/// Supabase backend settings.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub url: Option<String>,
    /// Service-role key.
    pub service_key: Option<SecretString>,
    /// Prefix prepended to every table name.
    pub table_prefix: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            service_key: None,
            table_prefix: DEFAULT_TABLE_PREFIX.to_string(),
            timeout_secs: DEFAULT_SUPABASE_TIMEOUT_SECS,
        }
    }
}

/// Raw logging settings, interpreted by [`crate::observability`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingSettings {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// `EnvFilter` directives.
    pub filter: Option<String>,
    /// Optional log file.
    pub file: Option<PathBuf>,
}

/// Main configuration for the data access layer.
#[derive(Debug, Clone, Default)]
pub struct DalConfig {
    /// Selected backend.
    pub repository: RepositoryKind,
    /// SQLite settings.
    pub sqlite: SqliteConfig,
    /// Supabase settings.
    pub supabase: SupabaseConfig,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// `[database]` section.
    pub database: Option<ConfigFileDatabase>,
    /// `[sqlite]` section.
    pub sqlite: Option<ConfigFileSqlite>,
    /// `[supabase]` section.
    pub supabase: Option<ConfigFileSupabase>,
    /// `[logging]` section.
    pub logging: Option<ConfigFileLogging>,
}

/// `[database]` section.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileDatabase {
    /// Backend name.
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// `[sqlite]` section.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileSqlite {
    /// Database file.
    pub path: Option<String>,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: Option<u64>,
    /// Checksum policy name.
    pub checksum_policy: Option<String>,
}

/// `[supabase]` section.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileSupabase {
    /// Project URL.
    pub url: Option<String>,
    /// Service-role key.
    pub service_key: Option<String>,
    /// Table prefix.
    pub table_prefix: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
}

/// `[logging]` section.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Filter directives.
    pub filter: Option<String>,
    /// Log file.
    pub file: Option<String>,
}

impl DalConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration for the running process.
    ///
    /// Reads `.env` if present, then the file named by `ARCHON_CONFIG_PATH`
    /// (or the platform config file if it exists), then the environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `ARCHON_CONFIG_PATH` names a missing
    /// file, or [`Error::InvalidInput`] if the file does not parse.
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }
        Self::load_with(&EnvSource, None)
    }

    /// Loads configuration from an explicit file (if given) and a source.
    ///
    /// # Errors
    ///
    /// See [`DalConfig::load`].
    pub fn load_with(source: &dyn ConfigSource, file: Option<&Path>) -> Result<Self> {
        let explicit = file
            .map(Path::to_path_buf)
            .or_else(|| source.get_non_empty(vars::CONFIG_PATH).map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => Self::load_from_file(&path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::load_from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_source(source);
        Ok(config)
    }

    /// Builds configuration from defaults and a source only.
    #[must_use]
    pub fn from_source(source: &dyn ConfigSource) -> Self {
        let mut config = Self::default();
        config.apply_source(source);
        config
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the file does not exist and
    /// [`Error::InvalidInput`] if it cannot be parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound(format!(
                "configuration file {}",
                path.display()
            )));
        }
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: e.to_string(),
        })?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the text is not a valid config file.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents)
            .map_err(|e| Error::InvalidInput(format!("invalid configuration file: {e}")))?;
        Ok(Self::from_config_file(file))
    }

    /// Converts a `ConfigFile` to `DalConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(kind) = file.database.and_then(|d| d.kind) {
            config.repository = RepositoryKind::parse_or_default(&kind);
        }
        if let Some(sqlite) = file.sqlite {
            if let Some(path) = sqlite.path {
                config.sqlite.path = PathBuf::from(path);
            }
            if let Some(ms) = sqlite.busy_timeout_ms {
                config.sqlite.busy_timeout_ms = ms;
            }
            if let Some(policy) = sqlite.checksum_policy.as_deref().and_then(ChecksumPolicy::parse) {
                config.sqlite.checksum_policy = policy;
            }
        }
        if let Some(supabase) = file.supabase {
            config.supabase.url = supabase.url;
            config.supabase.service_key = supabase.service_key.map(SecretString::from);
            if let Some(prefix) = supabase.table_prefix {
                config.supabase.table_prefix = prefix;
            }
            if let Some(secs) = supabase.timeout_secs {
                config.supabase.timeout_secs = secs;
            }
        }
        if let Some(logging) = file.logging {
            config.logging = LoggingSettings {
                format: logging.format,
                filter: logging.filter,
                file: logging.file.map(PathBuf::from),
            };
        }

        config
    }

    /// Overlays values present in `source`.
    fn apply_source(&mut self, source: &dyn ConfigSource) {
        if let Some(kind) = source.get_non_empty(vars::DATABASE_TYPE) {
            self.repository = RepositoryKind::parse_or_default(&kind);
        }
        if let Some(path) = source.get_non_empty(vars::SQLITE_PATH) {
            self.sqlite.path = PathBuf::from(path);
        }
        if let Some(ms) = parse_number(source, vars::SQLITE_BUSY_TIMEOUT_MS) {
            self.sqlite.busy_timeout_ms = ms;
        }
        if let Some(policy) = source
            .get_non_empty(vars::MIGRATION_CHECKSUM_POLICY)
            .as_deref()
            .and_then(ChecksumPolicy::parse)
        {
            self.sqlite.checksum_policy = policy;
        }
        if let Some(url) = source.get_non_empty(vars::SUPABASE_URL) {
            self.supabase.url = Some(url);
        }
        if let Some(key) = source.get_non_empty(vars::SUPABASE_SERVICE_KEY) {
            self.supabase.service_key = Some(SecretString::from(key));
        }
        if let Some(secs) = parse_number(source, vars::SUPABASE_TIMEOUT_SECS) {
            self.supabase.timeout_secs = secs;
        }
        if let Some(filter) = source.get_non_empty(vars::LOG) {
            self.logging.filter = Some(filter);
        }
        if let Some(format) = source.get_non_empty(vars::LOG_FORMAT) {
            self.logging.format = Some(format);
        }
        if let Some(file) = source.get_non_empty(vars::LOG_FILE) {
            self.logging.file = Some(PathBuf::from(file));
        }
    }

    /// Selects a backend.
    #[must_use]
    pub const fn with_repository(mut self, kind: RepositoryKind) -> Self {
        self.repository = kind;
        self
    }

    /// Sets the SQLite database file.
    #[must_use]
    pub fn with_sqlite_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.sqlite.path = path.into();
        self
    }
}

fn parse_number(source: &dyn ConfigSource, key: &str) -> Option<u64> {
    let raw = source.get_non_empty(key)?;
    match raw.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring non-numeric configuration value");
            None
        },
    }
}

/// Returns the platform config file location.
///
/// `~/.config/archon/config.toml` on Linux,
/// `~/Library/Application Support/archon/config.toml` on macOS.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "archon").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Returns the default SQLite file in the platform data directory.
#[must_use]
pub fn default_sqlite_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "archon").map_or_else(
        || PathBuf::from(DEFAULT_SQLITE_FILE),
        |dirs| dirs.data_dir().join(DEFAULT_SQLITE_FILE),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use test_case::test_case;

    #[test_case("supabase", Some(RepositoryKind::Supabase))]
    #[test_case("SQLite", Some(RepositoryKind::Sqlite))]
    #[test_case("fake", Some(RepositoryKind::Fake))]
    #[test_case(" memory ", Some(RepositoryKind::Fake))]
    #[test_case("mongodb", None)]
    fn test_repository_kind_parse(input: &str, expected: Option<RepositoryKind>) {
        assert_eq!(RepositoryKind::parse(input), expected);
    }

    #[test]
    fn test_unknown_kind_falls_back_to_supabase() {
        assert_eq!(
            RepositoryKind::parse_or_default("oracle"),
            RepositoryKind::Supabase
        );
    }

    #[test]
    fn test_from_source_overrides_defaults() {
        let source = MapSource::new()
            .with("DATABASE_TYPE", "sqlite")
            .with("SQLITE_PATH", "/tmp/test.db")
            .with("SQLITE_BUSY_TIMEOUT_MS", "250")
            .with("SUPABASE_SERVICE_KEY", "secret")
            .with("ARCHON_MIGRATION_CHECKSUM_POLICY", "reject");
        let config = DalConfig::from_source(&source);
        assert_eq!(config.repository, RepositoryKind::Sqlite);
        assert_eq!(config.sqlite.path, PathBuf::from("/tmp/test.db"));
        assert_eq!(config.sqlite.busy_timeout_ms, 250);
        assert_eq!(config.sqlite.checksum_policy, ChecksumPolicy::Reject);
        assert_eq!(
            config
                .supabase
                .service_key
                .as_ref()
                .map(|k| k.expose_secret().to_string())
                .as_deref(),
            Some("secret")
        );
    }

    #[test]
    fn test_non_numeric_values_are_ignored() {
        let source = MapSource::new().with("SQLITE_BUSY_TIMEOUT_MS", "soon");
        let config = DalConfig::from_source(&source);
        assert_eq!(config.sqlite.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
    }

    #[test]
    fn test_from_toml() {
        let config = DalConfig::from_toml(
            r#"
            [database]
            type = "fake"

            [sqlite]
            path = "data/archon.db"
            checksum_policy = "ignore"

            [supabase]
            url = "https://example.supabase.co"
            table_prefix = ""

            [logging]
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.repository, RepositoryKind::Fake);
        assert_eq!(config.sqlite.path, PathBuf::from("data/archon.db"));
        assert_eq!(config.sqlite.checksum_policy, ChecksumPolicy::Ignore);
        assert_eq!(config.supabase.table_prefix, "");
        assert_eq!(config.logging.format.as_deref(), Some("json"));
    }

    #[test]
    fn test_from_toml_rejects_unknown_sections() {
        let err = DalConfig::from_toml("[redis]\nurl = \"x\"").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[database]\ntype = \"sqlite\"\n").unwrap();
        let source = MapSource::new().with("DATABASE_TYPE", "fake");
        let config = DalConfig::load_with(&source, Some(&path)).unwrap();
        assert_eq!(config.repository, RepositoryKind::Fake);
    }

    #[test]
    fn test_missing_explicit_file_is_not_found() {
        let source = MapSource::new().with("ARCHON_CONFIG_PATH", "/nonexistent/archon.toml");
        let err = DalConfig::load_with(&source, None).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
