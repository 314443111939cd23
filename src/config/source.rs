//! Where configuration values come from.

use std::collections::HashMap;

/// A read-only view of key/value configuration.
///
/// Validators and [`DalConfig`](super::DalConfig) read through this trait on
/// every call, so tests can substitute a map for the process environment.
pub trait ConfigSource: Send + Sync {
    /// Returns the value for `key`, if set.
    fn get(&self, key: &str) -> Option<String>;

    /// Returns the value for `key` if it is set and not blank.
    fn get_non_empty(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }
}

/// Reads the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Reads from an in-memory map.
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    values: HashMap<String, String>,
}

impl MapSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Sets a value in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapSource {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl ConfigSource for MapSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_source_non_empty() {
        let source = MapSource::new().with("A", "1").with("B", "   ");
        assert_eq!(source.get("A").as_deref(), Some("1"));
        assert_eq!(source.get("B").as_deref(), Some("   "));
        assert!(source.get_non_empty("B").is_none());
        assert!(source.get("C").is_none());
    }

    #[test]
    fn test_map_source_from_iter() {
        let source: MapSource = [("DATABASE_TYPE", "sqlite")].into_iter().collect();
        assert_eq!(source.get("DATABASE_TYPE").as_deref(), Some("sqlite"));
    }
}
