//! Named timeout policies

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Name of the policy applied to test classes when none is configured
pub const DEFAULT_POLICY_NAME: &str = "test";
/// Timeout of the default policy, in [`DEFAULT_TIMEOUT_UNITS`]
pub const DEFAULT_TIMEOUT: u64 = 10;
pub const DEFAULT_TIMEOUT_UNITS: TimeUnit = TimeUnit::Minutes;

/// The units of `java.util.concurrent.TimeUnit`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    pub const ALL: [TimeUnit; 7] = [
        TimeUnit::Nanoseconds,
        TimeUnit::Microseconds,
        TimeUnit::Milliseconds,
        TimeUnit::Seconds,
        TimeUnit::Minutes,
        TimeUnit::Hours,
        TimeUnit::Days,
    ];

    /// Name of the Java enum constant
    pub fn java_name(&self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "NANOSECONDS",
            TimeUnit::Microseconds => "MICROSECONDS",
            TimeUnit::Milliseconds => "MILLISECONDS",
            TimeUnit::Seconds => "SECONDS",
            TimeUnit::Minutes => "MINUTES",
            TimeUnit::Hours => "HOURS",
            TimeUnit::Days => "DAYS",
        }
    }

    /// Convert `amount` of this unit to milliseconds. Sub-millisecond units truncate;
    /// overflow saturates at `u64::MAX`.
    pub fn to_millis(&self, amount: u64) -> u64 {
        match self {
            TimeUnit::Nanoseconds => amount / 1_000_000,
            TimeUnit::Microseconds => amount / 1_000,
            TimeUnit::Milliseconds => amount,
            TimeUnit::Seconds => amount.saturating_mul(1_000),
            TimeUnit::Minutes => amount.saturating_mul(60_000),
            TimeUnit::Hours => amount.saturating_mul(3_600_000),
            TimeUnit::Days => amount.saturating_mul(86_400_000),
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.java_name())
    }
}

impl FromStr for TimeUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TimeUnit::ALL
            .into_iter()
            .find(|unit| unit.java_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownTimeUnit(s.to_string()))
    }
}

/// A timeout to enforce on the test classes of one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutSpec {
    pub name: String,
    pub timeout: u64,
    pub units: TimeUnit,
}

impl TimeoutSpec {
    pub fn new(name: impl Into<String>, timeout: u64, units: TimeUnit) -> Self {
        Self { name: name.into(), timeout, units }
    }

    pub fn timeout_millis(&self) -> u64 {
        self.units.to_millis(self.timeout)
    }
}

impl Default for TimeoutSpec {
    fn default() -> Self {
        Self::new(DEFAULT_POLICY_NAME, DEFAULT_TIMEOUT, DEFAULT_TIMEOUT_UNITS)
    }
}

impl fmt::Display for TimeoutSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} {}", self.name, self.timeout, self.units)
    }
}

/// One `NAME=AMOUNT:UNIT:DIR` assignment: a policy and a class directory it governs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyBinding {
    pub spec: TimeoutSpec,
    pub dir: PathBuf,
}

impl FromStr for PolicyBinding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || Error::config(format!("expected NAME=AMOUNT:UNIT:DIR, got '{}'", s));
        let (name, rest) = s.split_once('=').ok_or_else(malformed)?;
        let mut parts = rest.splitn(3, ':');
        let (Some(amount), Some(units), Some(dir)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(malformed());
        };
        if name.trim().is_empty() || dir.is_empty() {
            return Err(malformed());
        }
        let timeout = amount
            .trim()
            .parse::<u64>()
            .map_err(|e| Error::config(format!("invalid timeout amount '{}' in '{}': {}", amount, s, e)))?;
        Ok(Self { spec: TimeoutSpec::new(name.trim(), timeout, units.parse()?), dir: PathBuf::from(dir) })
    }
}

/// Policies keyed by name, iterated in name order, each with the class directories it
/// applies to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyRegistry {
    policies: BTreeMap<String, TimeoutSpec>,
    targets: BTreeMap<String, Vec<PathBuf>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding only the default `test` policy
    pub fn with_default() -> Self {
        let mut registry = Self::new();
        registry.add(TimeoutSpec::default());
        registry
    }

    /// Register `spec`, returning the policy it replaced. Directories already assigned
    /// to the name stay assigned.
    pub fn add(&mut self, spec: TimeoutSpec) -> Option<TimeoutSpec> {
        self.policies.insert(spec.name.clone(), spec)
    }

    /// Drop a policy together with its directories
    pub fn remove(&mut self, name: &str) -> Option<TimeoutSpec> {
        self.targets.remove(name);
        self.policies.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&TimeoutSpec> {
        self.policies.get(name)
    }

    /// Put the classes under `dir` under the policy called `name`
    pub fn assign(&mut self, name: &str, dir: impl Into<PathBuf>) -> Result<()> {
        if !self.policies.contains_key(name) {
            return Err(Error::config(format!("no timeout policy named '{}'", name)));
        }
        let dir = dir.into();
        let dirs = self.targets.entry(name.to_string()).or_default();
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
        Ok(())
    }

    /// Register the binding's policy and assign its directory. A policy that is already
    /// registered under the same name must agree on the timeout.
    pub fn bind(&mut self, binding: PolicyBinding) -> Result<()> {
        let PolicyBinding { spec, dir } = binding;
        match self.policies.get(&spec.name) {
            Some(existing) if *existing != spec => {
                let message = format!("conflicting timeouts for policy '{}': {} and {}", spec.name, existing, spec);
                return Err(Error::config(message));
            }
            Some(_) => {}
            None => {
                self.add(spec.clone());
            }
        }
        self.assign(&spec.name, dir)
    }

    /// Directories assigned to the policy called `name`, in assignment order
    pub fn targets(&self, name: &str) -> &[PathBuf] {
        self.targets.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimeoutSpec> {
        self.policies.values()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
