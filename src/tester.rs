//! Stimulus generation: one transaction per operation, then fillers to flush the pipeline.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::bfm::{AluBfm, PIPELINE_DEPTH};
use crate::config::PolicyKind;
use crate::ops::{Command, Operation};
use crate::prelude::*;

/// Picks the operands of each transaction.
pub trait OperandPolicy: Send {
    fn name(&self) -> String;
    fn operands(&mut self, op: Operation) -> (u8, u8);
}

pub struct RandomOperands {
    seed: u64,
    rng: StdRng,
}

impl RandomOperands {
    pub fn from_seed(seed: u64) -> Self {
        RandomOperands {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl OperandPolicy for RandomOperands {
    fn name(&self) -> String {
        format!("random (seed {})", self.seed)
    }
    fn operands(&mut self, _op: Operation) -> (u8, u8) {
        (self.rng.gen(), self.rng.gen())
    }
}

/// Same operands for every operation.
pub struct FixedOperands {
    a: u8,
    b: u8,
}

impl FixedOperands {
    pub fn new(a: u8, b: u8) -> Self {
        FixedOperands { a, b }
    }

    pub fn boundary() -> Self {
        FixedOperands::new(0xff, 0xff)
    }
}

impl OperandPolicy for FixedOperands {
    fn name(&self) -> String {
        format!("fixed {:02x}/{:02x}", self.a, self.b)
    }
    fn operands(&mut self, _op: Operation) -> (u8, u8) {
        (self.a, self.b)
    }
}

pub fn policy_for(kind: PolicyKind, seed: u64) -> Box<dyn OperandPolicy> {
    match kind {
        PolicyKind::Random => Box::new(RandomOperands::from_seed(seed)),
        PolicyKind::Boundary => Box::new(FixedOperands::boundary()),
    }
}

pub struct Tester {
    policy: Box<dyn OperandPolicy>,
    ops: Vec<Operation>,
    filler_count: usize,
}

#[derive(Default)]
pub struct TesterBuilder {
    policy: Option<Box<dyn OperandPolicy>>,
    ops: Option<Vec<Operation>>,
    filler_count: Option<usize>,
}

impl TesterBuilder {
    pub fn policy(mut self, policy: Box<dyn OperandPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn ops(mut self, ops: &[Operation]) -> Self {
        self.ops = Some(ops.to_vec());
        self
    }

    pub fn filler_count(mut self, n: usize) -> Self {
        self.filler_count = Some(n);
        self
    }

    pub fn build(self) -> TbResult<Tester> {
        let policy = self.policy.ok_or(TbError::MissingPolicy)?;
        let filler_count = self.filler_count.unwrap_or(PIPELINE_DEPTH);
        if filler_count < PIPELINE_DEPTH {
            return Err(TbError::Config(format!(
                "{} filler transactions can't flush a pipeline of depth {}",
                filler_count, PIPELINE_DEPTH
            )));
        }
        Ok(Tester {
            policy,
            ops: self.ops.unwrap_or_else(|| Operation::ALL.to_vec()),
            filler_count,
        })
    }
}

impl Tester {
    pub fn builder() -> TesterBuilder {
        TesterBuilder::default()
    }

    pub fn transaction_count(&self) -> usize {
        self.ops.len() + self.filler_count
    }

    /// The real transactions followed by the fillers, in issue order.
    pub fn commands(&mut self) -> Vec<Command> {
        let mut cmds: Vec<Command> = self
            .ops
            .iter()
            .map(|&op| {
                let (a, b) = self.policy.operands(op);
                Command::new(a, b, op)
            })
            .collect();
        cmds.extend(std::iter::repeat(Command::filler()).take(self.filler_count));
        cmds
    }

    /// Sends every transaction through the BFM and returns how many were issued.
    pub async fn run(mut self, bfm: AluBfm) -> TbResult<usize> {
        SIM_IF.log(&format!("Tester: operands {}", self.policy.name()));
        let cmds = self.commands();
        let real = self.ops.len();
        for (i, cmd) in cmds.iter().enumerate() {
            if i < real {
                SIM_IF.log(&format!("Tester: sending {}", cmd));
            }
            bfm.send_op(cmd.a, cmd.b, cmd.op).await?;
        }
        Ok(cmds.len())
    }
}
