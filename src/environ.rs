// src/environ.rs

//! Environment variable names, entries and the parent environment.
//!
//! Variable names are part of the contract with scripts and must not
//! change.

use std::collections::{HashMap, HashSet};
use std::fmt;

pub const NAMESPACE: &str = "CHORE_NAMESPACE";
pub const CALLER: &str = "CHORE_CALLER";
pub const PATH_CALLER: &str = "CHORE_PATH_CALLER";
pub const PATH_DATA: &str = "CHORE_PATH_DATA";
pub const PATH_CACHE: &str = "CHORE_PATH_CACHE";
pub const PATH_STATE: &str = "CHORE_PATH_STATE";
pub const PATH_RUNTIME: &str = "CHORE_PATH_RUNTIME";
pub const PATH_TEMP: &str = "CHORE_PATH_TEMP";

pub const PARAMETER_PREFIX: &str = "CHORE_P_";
pub const FLAG_PREFIX: &str = "CHORE_F_";

pub const STARTED_AT_RFC3339: &str = "CHORE_STARTED_AT_RFC3339";
pub const STARTED_AT_UNIX: &str = "CHORE_STARTED_AT_UNIX";
pub const STARTED_AT_YEAR: &str = "CHORE_STARTED_AT_YEAR";
pub const STARTED_AT_YEAR_DAY: &str = "CHORE_STARTED_AT_YEAR_DAY";
pub const STARTED_AT_DAY: &str = "CHORE_STARTED_AT_DAY";
pub const STARTED_AT_MONTH: &str = "CHORE_STARTED_AT_MONTH";
pub const STARTED_AT_MONTH_STR: &str = "CHORE_STARTED_AT_MONTH_STR";
pub const STARTED_AT_HOUR: &str = "CHORE_STARTED_AT_HOUR";
pub const STARTED_AT_MINUTE: &str = "CHORE_STARTED_AT_MINUTE";
pub const STARTED_AT_SECOND: &str = "CHORE_STARTED_AT_SECOND";
pub const STARTED_AT_NANOSECOND: &str = "CHORE_STARTED_AT_NANOSECOND";
pub const STARTED_AT_OFFSET: &str = "CHORE_STARTED_AT_OFFSET";
pub const STARTED_AT_TIMEZONE: &str = "CHORE_STARTED_AT_TIMEZONE";
pub const STARTED_AT_WEEKDAY: &str = "CHORE_STARTED_AT_WEEKDAY";
pub const STARTED_AT_WEEKDAY_STR: &str = "CHORE_STARTED_AT_WEEKDAY_STR";

pub const ID_UNIQUE: &str = "CHORE_ID_UNIQUE";
pub const ID_ISOLATED: &str = "CHORE_ID_ISOLATED";
pub const CHAIN_ID_ISOLATED: &str = "CHORE_CHAIN_ID_ISOLATED";
pub const CHAIN_ID_RUN: &str = "CHORE_CHAIN_ID_RUN";

pub const MACHINE_ID: &str = "CHORE_MACHINE_ID";

pub const OS_TYPE: &str = "CHORE_OS_TYPE";
pub const OS_ARCH: &str = "CHORE_OS_ARCH";
pub const OS_ID: &str = "CHORE_OS_ID";
pub const OS_VERSION: &str = "CHORE_OS_VERSION";
pub const OS_CODENAME: &str = "CHORE_OS_CODENAME";
pub const OS_VERSION_MAJOR: &str = "CHORE_OS_VERSION_MAJOR";
pub const OS_VERSION_MINOR: &str = "CHORE_OS_VERSION_MINOR";

pub const GIT_REFERENCE: &str = "CHORE_GIT_REFERENCE";
pub const GIT_REFERENCE_SHORT: &str = "CHORE_GIT_REFERENCE_SHORT";
pub const GIT_REFERENCE_TYPE: &str = "CHORE_GIT_REFERENCE_TYPE";
pub const GIT_COMMIT_HASH: &str = "CHORE_GIT_COMMIT_HASH";
pub const GIT_COMMIT_HASH_SHORT: &str = "CHORE_GIT_COMMIT_HASH_SHORT";

pub const NETWORK_IPV4: &str = "CHORE_NETWORK_IPV4";
pub const NETWORK_IPV6: &str = "CHORE_NETWORK_IPV6";
pub const NETWORK_HOSTNAME: &str = "CHORE_NETWORK_HOSTNAME";
pub const NETWORK_CITY: &str = "CHORE_NETWORK_CITY";
pub const NETWORK_REGION: &str = "CHORE_NETWORK_REGION";
pub const NETWORK_COUNTRY: &str = "CHORE_NETWORK_COUNTRY";
pub const NETWORK_POSTAL: &str = "CHORE_NETWORK_POSTAL";
pub const NETWORK_TIMEZONE: &str = "CHORE_NETWORK_TIMEZONE";
pub const NETWORK_ASN: &str = "CHORE_NETWORK_ASN";
pub const NETWORK_ORGANIZATION: &str = "CHORE_NETWORK_ORGANIZATION";
pub const NETWORK_LATITUDE: &str = "CHORE_NETWORK_LATITUDE";
pub const NETWORK_LONGITUDE: &str = "CHORE_NETWORK_LONGITUDE";

pub const HOSTNAME: &str = "CHORE_HOSTNAME";
pub const HOSTNAME_FQDN: &str = "CHORE_HOSTNAME_FQDN";

pub const USER_UID: &str = "CHORE_USER_UID";
pub const USER_GID: &str = "CHORE_USER_GID";
pub const USER_NAME: &str = "CHORE_USER_NAME";

pub const SELF: &str = "CHORE_SELF";
pub const RECURSION: &str = "CHORE_RECURSION";

/// Variables that describe one invocation only. They are stripped from the
/// parent environment before the child environment is assembled; every
/// other `CHORE_*` fact is inherited and blocks its source from running
/// again.
const PER_INVOCATION: &[&str] = &[
    NAMESPACE,
    CALLER,
    ID_UNIQUE,
    ID_ISOLATED,
    CHAIN_ID_ISOLATED,
    CHAIN_ID_RUN,
    SELF,
    RECURSION,
];

const PER_INVOCATION_PREFIXES: &[&str] = &[
    "CHORE_PATH_",
    PARAMETER_PREFIX,
    FLAG_PREFIX,
    "CHORE_STARTED_AT_",
];

/// One `NAME=VALUE` pair of the child environment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvironmentEntry {
    name: String,
    value: String,
}

impl EnvironmentEntry {
    /// Returns `None` for an empty value: empty values are never emitted.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.is_empty() {
            return None;
        }
        Some(Self {
            name: name.into(),
            value,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for EnvironmentEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Read-only snapshot of the parent process environment.
#[derive(Debug, Clone, Default)]
pub struct ParentEnv {
    vars: HashMap<String, String>,
}

impl ParentEnv {
    /// Snapshot the current process environment. Non UTF-8 variables are
    /// skipped.
    pub fn from_process() -> Self {
        Self::from_pairs(std::env::vars_os().filter_map(|(k, v)| {
            Some((k.into_string().ok()?, v.into_string().ok()?))
        }))
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// True if `name` is set to a non-empty value. This is the idempotency
    /// check used by every source.
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| !v.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// True if `name` is a per-invocation variable that must not leak into a
/// nested run.
pub fn is_injected(name: &str) -> bool {
    PER_INVOCATION.contains(&name)
        || PER_INVOCATION_PREFIXES
            .iter()
            .any(|prefix| name.starts_with(prefix))
}

/// Parent environment without the per-invocation variables of a previous
/// run, as `NAME=VALUE` lines.
pub fn strip_injected(parent: &ParentEnv) -> Vec<String> {
    parent
        .iter()
        .filter(|(name, _)| !is_injected(name))
        .map(|(name, value)| format!("{name}={value}"))
        .collect()
}

/// The complete child environment: the stripped parent environment followed
/// by the collected entries. A collected entry replaces any parent variable
/// of the same name.
pub fn child_environ(parent: &ParentEnv, entries: &[EnvironmentEntry]) -> Vec<String> {
    let emitted: HashSet<&str> = entries.iter().map(EnvironmentEntry::name).collect();
    let mut environ: Vec<String> = parent
        .iter()
        .filter(|(name, _)| !is_injected(name) && !emitted.contains(name))
        .map(|(name, value)| format!("{name}={value}"))
        .collect();
    environ.extend(entries.iter().map(ToString::to_string));
    environ
}

/// `CHORE_P_<NAME>` / `CHORE_F_<NAME>` style name for a parameter or flag.
pub fn argument_var(prefix: &str, name: &str) -> String {
    let normalized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("{prefix}{normalized}")
}
