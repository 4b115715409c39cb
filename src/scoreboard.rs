use futures::StreamExt;
use futures_channel::mpsc::UnboundedReceiver;
use std::collections::BTreeSet;
use std::fmt;

use crate::ops::{Command, Operation};
use crate::oracle::predict_cmd;
use crate::prelude::*;

/// Collects observed commands and results, then checks them against the oracle.
#[derive(Clone, Default)]
pub struct Scoreboard(TbObj<ScoreboardInner>);

#[derive(Default)]
struct ScoreboardInner {
    cmds: Vec<Command>,
    results: Vec<u16>,
    // trailing commands that only flush the pipeline
    fillers: usize,
    started: bool,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scoreboard whose last `fillers` commands are value checked but don't count
    /// towards coverage.
    pub fn with_fillers(fillers: usize) -> Self {
        Scoreboard(TbObj::new(ScoreboardInner { fillers, ..Default::default() }))
    }

    pub fn add_cmd(&self, cmd: Command) {
        self.0.with_mut(|s| s.cmds.push(cmd));
    }

    pub fn add_result(&self, result: u16) {
        self.0.with_mut(|s| s.results.push(result));
    }

    pub fn cmd_count(&self) -> usize {
        self.0.get().cmds.len()
    }

    pub fn result_count(&self) -> usize {
        self.0.get().results.len()
    }

    /// Both histories must hold exactly one entry per issued command.
    pub fn check_counts(&self, issued: usize) -> TbResult {
        let (cmds, results) = (self.cmd_count(), self.result_count());
        if cmds != issued {
            return Err(TbError::DroppedTransactions { issued, observed: cmds });
        }
        if results != issued {
            return Err(TbError::ResultCount { issued, observed: results });
        }
        Ok(())
    }

    /// Spawns one task per channel appending everything it receives to the history.
    pub fn start_tasks(
        &self,
        mut cmd_rx: UnboundedReceiver<Command>,
        mut result_rx: UnboundedReceiver<u16>,
    ) -> TbResult {
        self.0.with_mut(|s| match s.started {
            true => Err(TbError::TasksAlreadyStarted),
            false => {
                s.started = true;
                Ok(())
            }
        })?;
        let sb = self.clone();
        Task::spawn(
            async move {
                while let Some(cmd) = cmd_rx.next().await {
                    sb.add_cmd(cmd);
                }
            },
            "scoreboard_cmds",
        );
        let sb = self.clone();
        Task::spawn(
            async move {
                while let Some(result) = result_rx.next().await {
                    sb.add_result(result);
                }
            },
            "scoreboard_results",
        );
        Ok(())
    }

    /// Checks everything recorded so far and logs every comparison. The histories are left
    /// untouched, so checking again gives the same verdict.
    pub fn check_results(&self) -> TbResult<Verdict> {
        let (cmds, results, fillers) = {
            let inner = self.0.get();
            (inner.cmds.clone(), inner.results.clone(), inner.fillers)
        };
        let verdict = check(&cmds, &results, fillers)?;
        for line in verdict.log_lines() {
            SIM_IF.log(&line);
        }
        Ok(verdict)
    }
}

/// Pairs command `i` with result `i` and compares each result with the oracle.
/// The last `fillers` commands are compared too but left out of the coverage.
/// A command without a result means the check ran before the pipeline was drained.
pub fn check(cmds: &[Command], results: &[u16], fillers: usize) -> TbResult<Verdict> {
    let real = cmds.len().saturating_sub(fillers);
    let mut results = results.iter();
    let mut comparisons = Vec::with_capacity(cmds.len());
    let mut coverage = BTreeSet::new();
    for (index, cmd) in cmds.iter().enumerate() {
        let actual = *results
            .next()
            .ok_or(TbError::MissingResult { index, cmd: *cmd })?;
        if index < real {
            coverage.insert(cmd.op);
        }
        comparisons.push(Comparison {
            cmd: *cmd,
            actual,
            expected: predict_cmd(cmd),
        });
    }
    Ok(Verdict {
        comparisons,
        coverage,
        unpaired_results: results.len(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparison {
    pub cmd: Command,
    pub actual: u16,
    pub expected: u16,
}

impl Comparison {
    pub fn passed(&self) -> bool {
        self.actual == self.expected
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.passed() {
            true => write!(f, "PASSED: {} = {:04x}", self.cmd, self.actual),
            false => write!(
                f,
                "FAILED: {} = {:04x} - expected {:04x}",
                self.cmd, self.actual, self.expected
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    Mismatch(Comparison),
    CoverageGap(Vec<Operation>),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Mismatch(c) => c.fmt(f),
            Failure::CoverageGap(missed) => {
                let names: Vec<_> = missed.iter().map(|op| op.name()).collect();
                write!(f, "Functional coverage error. Missed: {}", names.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub comparisons: Vec<Comparison>,
    pub coverage: BTreeSet<Operation>,
    /// Results observed after the last command was paired.
    pub unpaired_results: usize,
}

impl Verdict {
    pub fn mismatches(&self) -> impl Iterator<Item = &Comparison> {
        self.comparisons.iter().filter(|c| !c.passed())
    }

    pub fn missed(&self) -> Vec<Operation> {
        Operation::ALL
            .into_iter()
            .filter(|op| !self.coverage.contains(op))
            .collect()
    }

    pub fn failures(&self) -> Vec<Failure> {
        let mut failures: Vec<_> = self.mismatches().copied().map(Failure::Mismatch).collect();
        let missed = self.missed();
        if !missed.is_empty() {
            failures.push(Failure::CoverageGap(missed));
        }
        failures
    }

    pub fn passed(&self) -> bool {
        self.mismatches().next().is_none() && self.missed().is_empty()
    }

    /// One line per comparison, followed by the coverage result.
    pub fn log_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.comparisons.iter().map(|c| c.to_string()).collect();
        let missed = self.missed();
        match missed.is_empty() {
            true => lines.push("Covered all operations".to_string()),
            false => lines.push(Failure::CoverageGap(missed).to_string()),
        }
        if self.unpaired_results > 0 {
            lines.push(format!("Warning: {} results without a command", self.unpaired_results));
        }
        lines
    }

    pub fn summary(&self) -> String {
        format!(
            "checked={}, mismatches={}, covered={}/{}, unpaired={}",
            self.comparisons.len(),
            self.mismatches().count(),
            self.coverage.len(),
            Operation::ALL.len(),
            self.unpaired_results
        )
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {}", if self.passed() { "PASS" } else { "FAIL" }, self.summary())?;
        for line in self.log_lines() {
            writeln!(f, "  {}", line)?;
        }
        Ok(())
    }
}
