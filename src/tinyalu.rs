//! Behavioral model of the TinyALU.
//!
//! Ports: `clk`, `reset_n` (active low, synchronous), `A[8]`, `B[8]`, `op[3]`, `start`,
//! `done`, `result[16]`. A command is accepted when `start` is high while the ALU is idle.
//! ADD, AND and XOR finish on the accepting edge, MUL two edges later. On completion
//! `result` is driven and `done` is high for exactly one cycle. The no-op opcode and the
//! unused opcodes are accepted but never complete.

use crate::device::{Device, Port, PortIo};
use crate::ops::Operation;
use crate::TbResult;

/// Deliberate design bugs, so that the checking side of the testbench can be exercised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Product truncated to 8 bits.
    TruncatedMul,
    /// Sum loses its carry out of bit 7.
    DroppedCarry,
    /// Once the bus goes quiet, `done` is pulsed again for the last result without a
    /// command behind it.
    SpuriousDone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AluState {
    Idle,
    Busy { remaining: u32, result: u16 },
    // result is out, done drops on the next edge
    Done,
    // start seen with an op that never completes; wait for start to drop
    Stalled,
}

#[derive(Debug)]
pub struct TinyAlu {
    state: AluState,
    fault: Option<Fault>,
    last_result: Option<u16>,
    spurious_sent: bool,
}

impl Default for TinyAlu {
    fn default() -> Self {
        TinyAlu::new()
    }
}

impl TinyAlu {
    pub fn new() -> Self {
        TinyAlu {
            state: AluState::Idle,
            fault: None,
            last_result: None,
            spurious_sent: false,
        }
    }

    pub fn with_fault(fault: Fault) -> Self {
        TinyAlu { fault: Some(fault), ..TinyAlu::new() }
    }

    /// Clock edges from accepting `op` until `done` is raised, counting the accepting edge.
    pub fn latency(op: Operation) -> u32 {
        match op {
            Operation::Mul => 3,
            _ => 1,
        }
    }

    fn compute(&self, a: u16, b: u16, op: Operation) -> u16 {
        match (op, self.fault) {
            (Operation::Add, Some(Fault::DroppedCarry)) => (a + b) & 0xff,
            (Operation::Add, _) => a + b,
            (Operation::And, _) => a & b,
            (Operation::Xor, _) => a ^ b,
            (Operation::Mul, Some(Fault::TruncatedMul)) => (a * b) & 0xff,
            (Operation::Mul, _) => a * b,
        }
    }

    fn complete(&mut self, io: &mut PortIo<'_>, result: u16) -> TbResult<()> {
        io.set("result", u64::from(result))?;
        io.set("done", 1)?;
        self.state = AluState::Done;
        self.last_result = Some(result);
        Ok(())
    }

    /// Result to repeat on an idle edge, at most once per run.
    fn spurious_result(&mut self) -> Option<u16> {
        if self.fault != Some(Fault::SpuriousDone) || self.spurious_sent {
            return None;
        }
        let result = self.last_result?;
        self.spurious_sent = true;
        Some(result)
    }
}

impl Device for TinyAlu {
    fn name(&self) -> &str {
        "tinyalu"
    }

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::new("clk", 1),
            Port::new("reset_n", 1),
            Port::new("A", 8),
            Port::new("B", 8),
            Port::new("op", 3),
            Port::new("start", 1),
            Port::new("done", 1),
            Port::new("result", 16),
        ]
    }

    fn on_rising_edge(&mut self, io: &mut PortIo<'_>) -> TbResult<()> {
        if io.get("reset_n")? == 0 {
            self.state = AluState::Idle;
            self.last_result = None;
            io.set("done", 0)?;
            return io.set("result", 0);
        }
        match self.state {
            AluState::Done => {
                io.set("done", 0)?;
                self.state = AluState::Idle;
            }
            AluState::Busy { remaining, result } => {
                if remaining <= 1 {
                    self.complete(io, result)?;
                } else {
                    self.state = AluState::Busy { remaining: remaining - 1, result };
                }
            }
            AluState::Stalled => {
                if io.get("start")? == 0 {
                    self.state = AluState::Idle;
                }
            }
            AluState::Idle => {
                if io.get("start")? == 0 {
                    if let Some(result) = self.spurious_result() {
                        self.complete(io, result)?;
                    }
                    return Ok(());
                }
                let opcode = io.get("op")? as u32;
                let Some(op) = Operation::from_opcode(opcode) else {
                    self.state = AluState::Stalled;
                    return Ok(());
                };
                let (a, b) = (io.get("A")? as u16, io.get("B")? as u16);
                let result = self.compute(a, b, op);
                match TinyAlu::latency(op) {
                    1 => self.complete(io, result)?,
                    n => self.state = AluState::Busy { remaining: n - 1, result },
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiply_takes_longer() {
        assert_eq!(TinyAlu::latency(Operation::Add), 1);
        assert_eq!(TinyAlu::latency(Operation::Mul), 3);
    }

    #[test]
    fn faults_only_touch_their_operation() {
        let alu = TinyAlu::with_fault(Fault::TruncatedMul);
        assert_eq!(alu.compute(0xff, 0xff, Operation::Mul), 0x01);
        assert_eq!(alu.compute(0xff, 0xff, Operation::Add), 0x1fe);
        let alu = TinyAlu::with_fault(Fault::DroppedCarry);
        assert_eq!(alu.compute(0xff, 0x01, Operation::Add), 0x00);
        assert_eq!(TinyAlu::new().compute(0xff, 0xff, Operation::Mul), 0xfe01);
    }

    #[test]
    fn spurious_done_repeats_the_last_result_once() {
        let mut alu = TinyAlu::with_fault(Fault::SpuriousDone);
        assert_eq!(alu.spurious_result(), None);
        alu.last_result = Some(0x0007);
        assert_eq!(alu.spurious_result(), Some(0x0007));
        assert_eq!(alu.spurious_result(), None);

        let mut healthy = TinyAlu::new();
        healthy.last_result = Some(0x0007);
        assert_eq!(healthy.spurious_result(), None);
    }
}
