//! Testbench configuration: defaults, overrides from the environment, validation.

use once_cell::sync::OnceCell;
use std::fmt;
use std::str::FromStr;

use crate::bfm::PIPELINE_DEPTH;
use crate::ops::Operation;
use crate::{TbError, TbResult};

/// Operand selection of the stimulus generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    Random,
    Boundary,
}

/// How the sequencer waits for the stimulus generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Sequential,
    Objection,
}

impl FromStr for PolicyKind {
    type Err = TbError;

    fn from_str(s: &str) -> TbResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(PolicyKind::Random),
            "boundary" => Ok(PolicyKind::Boundary),
            _ => Err(TbError::Config(format!("unknown operand policy '{}'", s))),
        }
    }
}

impl FromStr for Flavor {
    type Err = TbError;

    fn from_str(s: &str) -> TbResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(Flavor::Sequential),
            "objection" => Ok(Flavor::Objection),
            _ => Err(TbError::Config(format!("unknown sequencer flavor '{}'", s))),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PolicyKind::Random => "random",
            PolicyKind::Boundary => "boundary",
        })
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Flavor::Sequential => "sequential",
            Flavor::Objection => "objection",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TbConfig {
    pub clock_period_ns: u64,
    /// Falling edges `reset_n` is held low.
    pub reset_cycles: u32,
    /// Filler transactions after the last real one. At least the BFM's pipeline depth.
    pub filler_count: usize,
    /// Clock cycles waited after the stimulus before the scoreboard is checked.
    pub drain_cycles: u32,
    pub timeout_ns: u64,
    /// Random operand seed. Without one, a per-process seed is used.
    pub seed: Option<u64>,
    pub policy: PolicyKind,
    pub flavor: Flavor,
    /// Operations the stimulus generator issues, one transaction each.
    pub ops: Vec<Operation>,
}

impl Default for TbConfig {
    fn default() -> Self {
        TbConfig {
            clock_period_ns: 10,
            reset_cycles: 1,
            filler_count: PIPELINE_DEPTH,
            drain_cycles: 10,
            timeout_ns: 1_000_000,
            seed: None,
            policy: PolicyKind::Random,
            flavor: Flavor::Sequential,
            ops: Operation::ALL.to_vec(),
        }
    }
}

static PROCESS_SEED: OnceCell<u64> = OnceCell::new();

/// Seed shared by every random scenario of this process, chosen on first use.
pub fn process_seed() -> u64 {
    *PROCESS_SEED.get_or_init(rand::random)
}

impl TbConfig {
    /// Defaults overridden by `TINYALU_*` environment variables.
    pub fn from_env() -> TbResult<Self> {
        TbConfig::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> TbResult<Self> {
        let mut config = TbConfig::default();
        if let Some(seed) = parse_var(&lookup, "TINYALU_SEED")? {
            config.seed = Some(seed);
        }
        if let Some(fillers) = parse_var(&lookup, "TINYALU_FILLERS")? {
            config.filler_count = fillers;
        }
        if let Some(cycles) = parse_var(&lookup, "TINYALU_DRAIN_CYCLES")? {
            config.drain_cycles = cycles;
        }
        if let Some(timeout) = parse_var(&lookup, "TINYALU_TIMEOUT_NS")? {
            config.timeout_ns = timeout;
        }
        if let Some(flavor) = parse_var(&lookup, "TINYALU_FLAVOR")? {
            config.flavor = flavor;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TbResult<()> {
        if self.clock_period_ns < 2 {
            return Err(TbError::Config("clock period must be at least 2ns".to_string()));
        }
        if self.filler_count < PIPELINE_DEPTH {
            return Err(TbError::Config(format!(
                "{} filler transactions can't flush a pipeline of depth {}",
                self.filler_count, PIPELINE_DEPTH
            )));
        }
        // a filler handshake takes two clock cycles
        let min_drain = 2 * self.filler_count as u64;
        if u64::from(self.drain_cycles) < min_drain {
            return Err(TbError::Config(format!(
                "{} drain cycles are too few to observe {} filler results, need {}",
                self.drain_cycles, self.filler_count, min_drain
            )));
        }
        if self.ops.is_empty() {
            return Err(TbError::Config("no operations to issue".to_string()));
        }
        Ok(())
    }

    pub fn seed_or_default(&self) -> u64 {
        self.seed.unwrap_or_else(process_seed)
    }

    pub fn with_policy(mut self, policy: PolicyKind) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_flavor(mut self, flavor: Flavor) -> Self {
        self.flavor = flavor;
        self
    }

    pub fn with_ops(mut self, ops: &[Operation]) -> Self {
        self.ops = ops.to_vec();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> TbResult<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| TbError::Config(format!("{}: can't parse '{}'", key, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = TbConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.filler_count, 2);
        assert_eq!(config.ops, Operation::ALL.to_vec());
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = TbConfig::from_lookup(lookup(&[
            ("TINYALU_SEED", "1234"),
            ("TINYALU_FILLERS", "3"),
            ("TINYALU_FLAVOR", "Objection"),
        ]))
        .unwrap();
        assert_eq!(config.seed, Some(1234));
        assert_eq!(config.filler_count, 3);
        assert_eq!(config.flavor, Flavor::Objection);
    }

    #[test]
    fn unparsable_variable_is_rejected() {
        let err = TbConfig::from_lookup(lookup(&[("TINYALU_SEED", "lots")])).unwrap_err();
        assert!(matches!(err, TbError::Config(msg) if msg.contains("TINYALU_SEED")));
    }

    #[test]
    fn filler_count_must_cover_pipeline_depth() {
        let config = TbConfig { filler_count: 1, ..TbConfig::default() };
        assert!(matches!(config.validate(), Err(TbError::Config(_))));
    }

    #[test]
    fn drain_must_cover_fillers() {
        let config = TbConfig { filler_count: 6, drain_cycles: 10, ..TbConfig::default() };
        assert!(config.validate().is_err());
        let config = TbConfig { filler_count: 5, drain_cycles: 10, ..TbConfig::default() };
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn explicit_seed_wins_over_process_seed() {
        assert_eq!(TbConfig::default().with_seed(7).seed_or_default(), 7);
        assert_eq!(TbConfig::default().seed_or_default(), process_seed());
    }
}
