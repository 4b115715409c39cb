//! The test sequencer walks one test through its phases:
//! `Init -> Resetting -> Running -> Draining -> Checking -> Done`.

use std::fmt;

use crate::bfm::AluBfm;
use crate::config::{Flavor, TbConfig};
use crate::objection::Objections;
use crate::prelude::*;
use crate::scoreboard::{Scoreboard, Verdict};
use crate::tester::{policy_for, OperandPolicy, Tester};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Resetting,
    Running,
    Draining,
    Checking,
    Done,
}

impl Phase {
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Init => Some(Phase::Resetting),
            Phase::Resetting => Some(Phase::Running),
            Phase::Running => Some(Phase::Draining),
            Phase::Draining => Some(Phase::Checking),
            Phase::Checking => Some(Phase::Done),
            Phase::Done => None,
        }
    }

    pub fn transition(self, to: Phase) -> TbResult<Phase> {
        match self.next() {
            Some(next) if next == to => Ok(to),
            _ => Err(TbError::PhaseOrder { from: self, to }),
        }
    }

    /// Moves to `to` and logs the transition.
    pub fn advance(&mut self, to: Phase) -> TbResult {
        let from = *self;
        *self = from.transition(to)?;
        SIM_IF.log(&format!("Phase {} -> {}", from, to));
        Ok(())
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

pub struct AluTest {
    config: TbConfig,
    phase: Phase,
    bfm: AluBfm,
    scoreboard: Scoreboard,
    tester: Tester,
}

impl AluTest {
    /// Test with the operand policy named by the configuration.
    pub fn new(dut: SimObject, config: TbConfig) -> TbResult<Self> {
        let policy = policy_for(config.policy, config.seed_or_default());
        AluTest::with_policy(dut, config, policy)
    }

    pub fn with_policy(dut: SimObject, config: TbConfig, policy: Box<dyn OperandPolicy>) -> TbResult<Self> {
        config.validate()?;
        let tester = Tester::builder()
            .policy(policy)
            .ops(&config.ops)
            .filler_count(config.filler_count)
            .build()?;
        Ok(AluTest {
            bfm: AluBfm::new(dut, config.reset_cycles)?,
            scoreboard: Scoreboard::with_fillers(config.filler_count),
            tester,
            phase: Phase::Init,
            config,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn bfm(&self) -> &AluBfm {
        &self.bfm
    }

    pub fn scoreboard(&self) -> &Scoreboard {
        &self.scoreboard
    }

    /// Runs all phases. The verdict is returned whether it passed or not; errors are
    /// protocol or simulation failures.
    pub async fn run(mut self) -> TbResult<Verdict> {
        self.phase.advance(Phase::Resetting)?;
        self.bfm.reset().await?;

        self.phase.advance(Phase::Running)?;
        self.bfm.start_tasks()?;
        self.scoreboard
            .start_tasks(self.bfm.take_cmd_receiver()?, self.bfm.take_result_receiver()?)?;
        let tester = self.tester;
        let issued = match self.config.flavor {
            Flavor::Sequential => tester.run(self.bfm.clone()).await?,
            Flavor::Objection => {
                let objections = Objections::new();
                let objection = objections.raise("tester");
                let bfm = self.bfm.clone();
                let handle = Task::spawn(
                    async move {
                        let _objection = objection;
                        tester.run(bfm).await
                    },
                    "tester",
                );
                objections.cleared().await;
                handle.await??
            }
        };

        self.phase.advance(Phase::Draining)?;
        utils::clock_cycles(self.bfm.clk(), self.config.drain_cycles).await?;
        self.scoreboard.check_counts(issued)?;

        self.phase.advance(Phase::Checking)?;
        let verdict = self.scoreboard.check_results()?;

        self.phase.advance(Phase::Done)?;
        SIM_IF.log(&format!(
            "{}: {}",
            if verdict.passed() { "PASS" } else { "FAIL" },
            verdict.summary()
        ));
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_advance_in_order() {
        let mut phase = Phase::Init;
        let mut seen = vec![phase];
        while let Some(next) = phase.next() {
            phase = phase.transition(next).unwrap();
            seen.push(phase);
        }
        assert_eq!(
            seen,
            vec![
                Phase::Init,
                Phase::Resetting,
                Phase::Running,
                Phase::Draining,
                Phase::Checking,
                Phase::Done
            ]
        );
    }

    #[test]
    fn skipping_or_repeating_a_phase_is_rejected() {
        assert_eq!(
            Phase::Init.transition(Phase::Running),
            Err(TbError::PhaseOrder { from: Phase::Init, to: Phase::Running })
        );
        assert!(Phase::Draining.transition(Phase::Draining).is_err());
        assert!(Phase::Done.transition(Phase::Init).is_err());
    }
}
