//! Driver options

use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

pub const THREADS_ENV: &str = "TIMEOUT_ENFORCER_THREADS";
pub const FAIL_FAST_ENV: &str = "TIMEOUT_ENFORCER_FAIL_FAST";
pub const CLASSPATH_ENV: &str = "TIMEOUT_ENFORCER_CLASSPATH";

/// Options for a [`Driver`](crate::driver::Driver) run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Worker threads; 0 lets rayon decide
    pub threads: usize,
    /// Abort on the first failing class instead of collecting errors
    pub fail_fast: bool,
    /// Classify only, never write
    pub dry_run: bool,
    /// Extra directories searched for superclasses
    pub classpath: Vec<PathBuf>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_classpath(mut self, dir: impl Into<PathBuf>) -> Self {
        self.classpath.push(dir.into());
        self
    }

    /// Defaults overridden by `TIMEOUT_ENFORCER_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(threads) = lookup(THREADS_ENV).filter(|v| !v.trim().is_empty()) {
            config.threads = threads
                .trim()
                .parse()
                .map_err(|_| Error::config(format!("{} must be a thread count, got {:?}", THREADS_ENV, threads)))?;
        }
        if let Some(fail_fast) = lookup(FAIL_FAST_ENV) {
            config.fail_fast = parse_flag(FAIL_FAST_ENV, &fail_fast)?;
        }
        if let Some(classpath) = lookup(CLASSPATH_ENV).filter(|v| !v.is_empty()) {
            config.classpath = env::split_paths(&classpath).filter(|p| !p.as_os_str().is_empty()).collect();
        }
        Ok(config)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "off" => Ok(false),
        "1" | "true" | "yes" | "on" => Ok(true),
        _ => Err(Error::config(format!("{} must be a boolean, got {:?}", key, value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        assert_eq!(Config::from_lookup(lookup_from(&[])).unwrap(), Config::default());
    }

    #[test]
    fn test_env_overrides() {
        let joined = env::join_paths(["/a/classes", "/b/classes"]).unwrap();
        let joined = joined.to_str().unwrap().to_string();
        let config = Config::from_lookup(lookup_from(&[
            (THREADS_ENV, "4"),
            (FAIL_FAST_ENV, "true"),
            (CLASSPATH_ENV, joined.as_str()),
        ]))
        .unwrap();
        assert_eq!(config.threads, 4);
        assert!(config.fail_fast);
        assert_eq!(config.classpath, vec![PathBuf::from("/a/classes"), PathBuf::from("/b/classes")]);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(Config::from_lookup(lookup_from(&[(THREADS_ENV, "many")])), Err(Error::Config { .. })));
        assert!(matches!(Config::from_lookup(lookup_from(&[(FAIL_FAST_ENV, "maybe")])), Err(Error::Config { .. })));
    }

    #[test]
    fn test_builder() {
        let config = Config::new().with_threads(2).with_dry_run(true).with_classpath("/lib");
        assert_eq!(config.threads, 2);
        assert!(config.dry_run);
        assert!(!config.fail_fast);
        assert_eq!(config.classpath, vec![PathBuf::from("/lib")]);
    }
}
