use std::sync::OnceLock;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{BenchError, BenchResult};

/// Default `ARRAY_SIZE` of the four-operation benchmark.
pub const DEFAULT_BENCH_SIZE: usize = 30_000_000;

/// Default `ARRAY_SIZE` of the single run and sum reduction programs.
pub const DEFAULT_RUN_SIZE: usize = 1_000_000;

fn default_num_pes() -> usize {
    match std::thread::available_parallelism() {
        Ok(n) => n.into(),
        Err(_) => 4,
    }
}

fn default_iterations() -> usize {
    100
}

fn default_deadlock_timeout() -> f64 {
    600.0
}

fn default_verify() -> bool {
    false
}

fn default_pin_threads() -> bool {
    false
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    /// Number of PEs launched for a run, default: available parallelism
    #[serde(default = "default_num_pes")]
    pub num_pes: usize,

    /// Repetitions of the timed benchmark loop, default: 100
    #[serde(default = "default_iterations")]
    pub iterations: usize,

    /// Base seed for the input generator, default: wall clock seconds
    pub seed: Option<u64>,

    /// Seconds a PE may wait in a collective before warning about a potential deadlock, default: 600.0
    #[serde(default = "default_deadlock_timeout")]
    pub deadlock_timeout: f64,

    /// Gather the distributed results every iteration and compare them to the sequential ones
    #[serde(default = "default_verify")]
    pub verify: bool,

    /// Pin each PE thread to its own core
    #[serde(default = "default_pin_threads")]
    pub pin_threads: bool,
}

/// The unprefixed problem size variable, kept raw so bad values can be reported.
#[derive(Deserialize, Debug)]
struct ProblemSize {
    array_size: Option<String>,
}

impl Config {
    pub const PREFIX: &'static str = "ARRAYOPS_";

    pub fn from_env() -> BenchResult<Config> {
        envy::prefixed(Self::PREFIX)
            .from_env::<Config>()
            .map_err(|e| BenchError::Config(format!("invalid configuration: {}", e)))
            .and_then(Config::validate)
    }

    pub fn from_iter<I>(vars: I) -> BenchResult<Config>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(Self::PREFIX)
            .from_iter::<_, Config>(vars)
            .map_err(|e| BenchError::Config(format!("invalid configuration: {}", e)))
            .and_then(Config::validate)
    }

    fn validate(self) -> BenchResult<Config> {
        if self.num_pes == 0 {
            return Err(BenchError::Config(
                "number of processes must be at least 1".to_owned(),
            ));
        }
        if self.iterations == 0 {
            return Err(BenchError::Config(
                "iteration count must be at least 1".to_owned(),
            ));
        }
        deadlock_timeout(self.deadlock_timeout)?;
        Ok(self)
    }
}

/// Convert a deadlock timeout in seconds, rejecting values that are not positive or too large
/// for a [Duration].
pub(crate) fn deadlock_timeout(secs: f64) -> BenchResult<Duration> {
    if !(secs > 0.0) {
        return Err(BenchError::Config(format!(
            "invalid deadlock timeout {}",
            secs
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|_| BenchError::Config(format!("invalid deadlock timeout {}", secs)))
}

/// Get the current Environment Variable configuration
pub fn config() -> BenchResult<&'static Config> {
    static CONFIG: OnceLock<Config> = OnceLock::new();
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }
    let config = Config::from_env()?;
    Ok(CONFIG.get_or_init(|| config))
}

/// Read `ARRAY_SIZE`, falling back to `default` when it is not set.
pub fn array_size(default: usize) -> BenchResult<usize> {
    let raw = envy::from_env::<ProblemSize>()
        .map_err(|e| BenchError::Config(format!("invalid configuration: {}", e)))?;
    parse_array_size(raw.array_size.as_deref(), default)
}

/// Validate a raw `ARRAY_SIZE` value. Zero, negative and non-numeric values are configuration errors.
pub fn parse_array_size(raw: Option<&str>, default: usize) -> BenchResult<usize> {
    let raw = match raw {
        Some(raw) => raw.trim(),
        None => return Ok(default),
    };
    match raw.parse::<i64>() {
        Ok(size) if size > 0 => usize::try_from(size)
            .map_err(|_| BenchError::Config(format!("Invalid array size {}", raw))),
        _ => Err(BenchError::Config(format!(
            "Invalid array size {}",
            raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults() {
        let config = Config::from_iter(vars(&[])).unwrap();
        assert!(config.num_pes >= 1);
        assert_eq!(config.iterations, 100);
        assert_eq!(config.seed, None);
        assert!(!config.verify);
        assert!(!config.pin_threads);
    }

    #[test]
    fn prefixed_overrides() {
        let config = Config::from_iter(vars(&[
            ("ARRAYOPS_NUM_PES", "3"),
            ("ARRAYOPS_ITERATIONS", "7"),
            ("ARRAYOPS_SEED", "42"),
            ("ARRAYOPS_VERIFY", "true"),
            ("NUM_PES", "9"),
        ]))
        .unwrap();
        assert_eq!(config.num_pes, 3);
        assert_eq!(config.iterations, 7);
        assert_eq!(config.seed, Some(42));
        assert!(config.verify);
    }

    #[test]
    fn zero_pes_rejected() {
        assert!(Config::from_iter(vars(&[("ARRAYOPS_NUM_PES", "0")])).is_err());
        assert!(Config::from_iter(vars(&[("ARRAYOPS_NUM_PES", "many")])).is_err());
        assert!(Config::from_iter(vars(&[("ARRAYOPS_ITERATIONS", "0")])).is_err());
    }

    #[test]
    fn deadlock_timeout_bounds() {
        for bad in ["0", "-1", "NaN", "inf", "1e30"] {
            match Config::from_iter(vars(&[("ARRAYOPS_DEADLOCK_TIMEOUT", bad)])) {
                Err(BenchError::Config(msg)) => assert!(msg.contains("deadlock timeout"), "{}", msg),
                other => panic!("{} accepted: {:?}", bad, other),
            }
        }
        let config = Config::from_iter(vars(&[("ARRAYOPS_DEADLOCK_TIMEOUT", "0.5")])).unwrap();
        assert_eq!(config.deadlock_timeout, 0.5);
        assert_eq!(
            deadlock_timeout(2.5).unwrap(),
            Duration::from_millis(2500)
        );
    }

    #[test]
    fn array_size_parsing() {
        assert_eq!(parse_array_size(None, 30).unwrap(), 30);
        assert_eq!(parse_array_size(Some("8"), 30).unwrap(), 8);
        assert_eq!(parse_array_size(Some(" 16 "), 30).unwrap(), 16);
        for bad in ["0", "-4", "abc", ""] {
            let err = parse_array_size(Some(bad), 30).unwrap_err();
            assert!(err.to_string().contains("Invalid array size"), "{}", err);
        }
    }
}
