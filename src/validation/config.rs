//! Environment configuration checks per database.
//!
//! Each database has a fixed list of [`ConfigRule`]s. A run reads the
//! current values from a [`ConfigSource`] and reports, per variable, whether
//! it is missing, defaulted or malformed. Nothing is cached between runs.
// Allow expect() on static regex patterns - these are guaranteed to compile
#![allow(clippy::expect_used)]

use crate::config::{ConfigSource, DEFAULT_SQLITE_FILE, EnvSource, vars};
use crate::schema::DatabaseType;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::{Arc, LazyLock};

static HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?)(\.[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$")
        .expect("static regex: hostname")
});

static HTTP_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("static regex: url"));

/// Value used by `DATABASE_TYPE` for the in-memory backend.
pub const FAKE_DATABASE: &str = "fake";

/// Severity of one configuration finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Noted; a default applies.
    Info,
    /// Works, but should be fixed.
    Warning,
    /// The backend cannot be used.
    Error,
}

/// Result of checking one variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigValidationResult {
    /// Variable name.
    pub field: String,
    /// Whether the variable is usable as configured.
    pub valid: bool,
    /// Finding severity; `None` when the value passed every check.
    pub severity: Option<Severity>,
    /// Human-readable finding.
    pub message: String,
    /// Value to use instead, when one is known.
    pub suggested_value: Option<String>,
}

impl ConfigValidationResult {
    fn ok(field: &str) -> Self {
        Self {
            field: field.to_string(),
            valid: true,
            severity: None,
            message: "ok".to_string(),
            suggested_value: None,
        }
    }

    fn finding(field: &str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            valid: severity != Severity::Error,
            severity: Some(severity),
            message: message.into(),
            suggested_value: None,
        }
    }

    fn suggest(mut self, value: impl Into<String>) -> Self {
        self.suggested_value = Some(value.into());
        self
    }
}

/// Aggregated configuration report for one database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseConfigValidation {
    /// Database the rules belong to (or the unrecognized selection).
    pub database_type: String,
    /// True iff there are no errors.
    pub valid: bool,
    /// `max(0, 100 - 20 * errors - 5 * warnings)`.
    pub score: u8,
    /// Per-variable results, in rule order.
    pub results: Vec<ConfigValidationResult>,
}

impl DatabaseConfigValidation {
    fn from_results(database_type: impl Into<String>, results: Vec<ConfigValidationResult>) -> Self {
        let count = |s| {
            u32::try_from(results.iter().filter(|r| r.severity == Some(s)).count())
                .unwrap_or(u32::MAX)
        };
        let penalty = count(Severity::Error)
            .saturating_mul(20)
            .saturating_add(count(Severity::Warning).saturating_mul(5));
        let score = u8::try_from(100_u32.saturating_sub(penalty)).unwrap_or(0);
        Self {
            database_type: database_type.into(),
            valid: count(Severity::Error) == 0,
            score,
            results,
        }
    }

    /// Findings of the given severity.
    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &ConfigValidationResult> {
        self.results
            .iter()
            .filter(move |r| r.severity == Some(severity))
    }

    /// Number of errors.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.with_severity(Severity::Error).count()
    }

    /// Number of warnings.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.with_severity(Severity::Warning).count()
    }
}

/// A format check: `None` when the value is acceptable.
pub type Check = fn(&str) -> Option<(Severity, String)>;

/// One environment variable of a database's configuration.
#[derive(Debug, Clone, Copy)]
pub struct ConfigRule {
    /// Variable name.
    pub field: &'static str,
    /// Whether a value must be present.
    pub required: bool,
    /// Format check applied to present values.
    pub check: Check,
    /// Value assumed when absent.
    pub default: Option<&'static str>,
    /// Template comment.
    pub description: &'static str,
}

impl ConfigRule {
    const fn required(field: &'static str, check: Check, description: &'static str) -> Self {
        Self {
            field,
            required: true,
            check,
            default: None,
            description,
        }
    }

    const fn optional(
        field: &'static str,
        check: Check,
        default: &'static str,
        description: &'static str,
    ) -> Self {
        Self {
            field,
            required: false,
            check,
            default: Some(default),
            description,
        }
    }

    fn evaluate(&self, value: Option<&str>) -> ConfigValidationResult {
        match value {
            None if self.required => ConfigValidationResult::finding(
                self.field,
                Severity::Error,
                format!("{} is required", self.field),
            ),
            None => {
                let default = self.default.unwrap_or_default();
                ConfigValidationResult::finding(
                    self.field,
                    Severity::Info,
                    format!("{} not set, using default '{default}'", self.field),
                )
                .suggest(default)
            },
            Some(value) => match (self.check)(value) {
                None => ConfigValidationResult::ok(self.field),
                Some((severity, message)) => {
                    let result = ConfigValidationResult::finding(self.field, severity, message);
                    match self.default {
                        Some(default) if severity == Severity::Error => result.suggest(default),
                        _ => result,
                    }
                },
            },
        }
    }
}

const SUPABASE_RULES: &[ConfigRule] = &[
    ConfigRule::required(vars::SUPABASE_URL, check_supabase_url, "Supabase project URL"),
    ConfigRule::required(
        vars::SUPABASE_SERVICE_KEY,
        check_service_key,
        "Supabase service-role key (not the anon key)",
    ),
];

const POSTGRES_RULES: &[ConfigRule] = &[
    ConfigRule::required("POSTGRES_HOST", check_hostname, "PostgreSQL server hostname"),
    ConfigRule::optional("POSTGRES_PORT", check_port, "5432", "PostgreSQL server port"),
    ConfigRule::required("POSTGRES_DB", check_non_empty, "Database name"),
    ConfigRule::required("POSTGRES_USER", check_non_empty, "Database user"),
    ConfigRule::required("POSTGRES_PASSWORD", check_password, "Database password"),
    ConfigRule::optional("POSTGRES_SSL_MODE", check_ssl_mode, "prefer", "TLS mode"),
    ConfigRule::optional("POSTGRES_POOL_SIZE", check_positive, "10", "Connection pool size"),
];

const MYSQL_RULES: &[ConfigRule] = &[
    ConfigRule::required("MYSQL_HOST", check_hostname, "MySQL server hostname"),
    ConfigRule::optional("MYSQL_PORT", check_port, "3306", "MySQL server port"),
    ConfigRule::required("MYSQL_DATABASE", check_non_empty, "Database name"),
    ConfigRule::required("MYSQL_USER", check_non_empty, "Database user"),
    ConfigRule::required("MYSQL_PASSWORD", check_password, "Database password"),
    ConfigRule::optional("MYSQL_CHARSET", check_non_empty, "utf8mb4", "Connection character set"),
];

const SQLITE_RULES: &[ConfigRule] = &[
    ConfigRule::optional(vars::SQLITE_PATH, check_non_empty, DEFAULT_SQLITE_FILE, "Database file"),
    ConfigRule::optional(
        vars::SQLITE_BUSY_TIMEOUT_MS,
        check_positive,
        "5000",
        "Lock wait in milliseconds",
    ),
];

/// The rule list for a database.
#[must_use]
pub const fn rules_for(database: DatabaseType) -> &'static [ConfigRule] {
    match database {
        DatabaseType::Supabase => SUPABASE_RULES,
        DatabaseType::Postgresql => POSTGRES_RULES,
        DatabaseType::Mysql => MYSQL_RULES,
        DatabaseType::Sqlite => SQLITE_RULES,
    }
}

/// Validates database configuration read from a [`ConfigSource`].
#[derive(Clone)]
pub struct DatabaseConfigValidator {
    source: Arc<dyn ConfigSource>,
}

impl std::fmt::Debug for DatabaseConfigValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfigValidator").finish_non_exhaustive()
    }
}

impl Default for DatabaseConfigValidator {
    fn default() -> Self {
        Self::from_env()
    }
}

impl DatabaseConfigValidator {
    /// Validator over the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(Arc::new(EnvSource))
    }

    /// Validator over any source.
    #[must_use]
    pub fn new(source: Arc<dyn ConfigSource>) -> Self {
        Self { source }
    }

    /// Checks every rule of one database.
    #[must_use]
    pub fn validate_database(&self, database: DatabaseType) -> DatabaseConfigValidation {
        let results = rules_for(database)
            .iter()
            .map(|rule| rule.evaluate(self.source.get_non_empty(rule.field).as_deref()))
            .collect();
        let report = DatabaseConfigValidation::from_results(database.as_str(), results);
        tracing::debug!(
            database = database.as_str(),
            score = report.score,
            errors = report.error_count(),
            warnings = report.warning_count(),
            "validated configuration"
        );
        report
    }

    /// Checks every known database, keyed by name.
    #[must_use]
    pub fn validate_all_databases(&self) -> BTreeMap<String, DatabaseConfigValidation> {
        DatabaseType::ALL
            .iter()
            .map(|db| (db.as_str().to_string(), self.validate_database(*db)))
            .collect()
    }

    /// Checks the database named by `DATABASE_TYPE` (default `supabase`).
    ///
    /// `fake` needs no configuration; an unrecognized name yields an error
    /// on `DATABASE_TYPE` itself.
    #[must_use]
    pub fn get_current_database_validation(&self) -> DatabaseConfigValidation {
        let selected = self
            .source
            .get_non_empty(vars::DATABASE_TYPE)
            .map_or_else(|| DatabaseType::Supabase.as_str().to_string(), |v| v.trim().to_lowercase());

        if selected == FAKE_DATABASE || selected == "memory" {
            let result = ConfigValidationResult::finding(
                vars::DATABASE_TYPE,
                Severity::Info,
                "in-memory repository needs no configuration",
            );
            return DatabaseConfigValidation::from_results(FAKE_DATABASE, vec![result]);
        }

        match DatabaseType::parse(&selected) {
            Some(database) => self.validate_database(database),
            None => {
                let known: Vec<&str> = DatabaseType::ALL.iter().map(DatabaseType::as_str).collect();
                let result = ConfigValidationResult::finding(
                    vars::DATABASE_TYPE,
                    Severity::Error,
                    format!(
                        "unknown database type '{selected}', expected one of: {}, {FAKE_DATABASE}",
                        known.join(", ")
                    ),
                )
                .suggest(DatabaseType::Supabase.as_str());
                DatabaseConfigValidation::from_results(selected, vec![result])
            },
        }
    }

    /// Renders a `.env` template for one database.
    #[must_use]
    pub fn export_configuration_template(&self, database: DatabaseType) -> String {
        let mut template = String::new();
        let _ = writeln!(template, "# Archon database configuration ({database})");
        let _ = writeln!(template, "{}={database}", vars::DATABASE_TYPE);
        for rule in rules_for(database) {
            template.push('\n');
            let necessity = match rule.default {
                _ if rule.required => "required".to_string(),
                Some(default) => format!("optional, default {default}"),
                None => "optional".to_string(),
            };
            let _ = writeln!(template, "# {} ({necessity})", rule.description);
            let _ = writeln!(template, "{}={}", rule.field, rule.default.unwrap_or_default());
        }
        template
    }
}

fn check_non_empty(value: &str) -> Option<(Severity, String)> {
    value
        .trim()
        .is_empty()
        .then(|| (Severity::Error, "value is empty".to_string()))
}

fn check_hostname(value: &str) -> Option<(Severity, String)> {
    let host = value.trim();
    if HOSTNAME.is_match(host) || host.parse::<std::net::IpAddr>().is_ok() {
        None
    } else {
        Some((Severity::Error, format!("'{host}' is not a valid hostname")))
    }
}

fn check_port(value: &str) -> Option<(Severity, String)> {
    match value.trim().parse::<u32>() {
        Ok(port) if (1..=65_535).contains(&port) => None,
        _ => Some((
            Severity::Error,
            format!("'{value}' is not a port between 1 and 65535"),
        )),
    }
}

fn check_positive(value: &str) -> Option<(Severity, String)> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => None,
        _ => Some((Severity::Error, format!("'{value}' is not a positive integer"))),
    }
}

fn check_password(value: &str) -> Option<(Severity, String)> {
    (value.chars().count() < 8).then(|| {
        (
            Severity::Warning,
            "password is shorter than 8 characters".to_string(),
        )
    })
}

fn check_ssl_mode(value: &str) -> Option<(Severity, String)> {
    const MODES: [&str; 6] = ["disable", "allow", "prefer", "require", "verify-ca", "verify-full"];
    let mode = value.trim().to_lowercase();
    (!MODES.contains(&mode.as_str())).then(|| {
        (
            Severity::Error,
            format!("'{value}' is not one of {}", MODES.join(", ")),
        )
    })
}

fn check_supabase_url(value: &str) -> Option<(Severity, String)> {
    let url = value.trim();
    if !HTTP_URL.is_match(url) {
        return Some((Severity::Error, format!("'{url}' is not an http(s) URL")));
    }
    let local = url.contains("://localhost") || url.contains("://127.0.0.1");
    (url.starts_with("http://") && !local).then(|| {
        (
            Severity::Warning,
            "Supabase URL does not use https".to_string(),
        )
    })
}

/// Checks that a service key is JWT-shaped and not the public `anon` key.
fn check_service_key(value: &str) -> Option<(Severity, String)> {
    let parts: Vec<&str> = value.trim().split('.').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        return Some((
            Severity::Error,
            "service key is not a JWT (expected three dot-separated segments)".to_string(),
        ));
    }
    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .ok()
        .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).ok());
    let Some(payload) = payload else {
        return Some((
            Severity::Warning,
            "service key payload could not be decoded".to_string(),
        ));
    };
    match payload.get("role").and_then(Value::as_str) {
        Some("anon") => Some((
            Severity::Error,
            "this is the anon key; the repository needs the service_role key".to_string(),
        )),
        Some("service_role") => None,
        Some(other) => Some((
            Severity::Warning,
            format!("service key has unexpected role '{other}'"),
        )),
        None => Some((Severity::Warning, "service key has no role claim".to_string())),
    }
}
