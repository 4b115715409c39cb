//! Reference model: the result the device must produce for a command.

use crate::ops::{Command, Operation};

/// Expected 16 bit result of `a op b`. ADD keeps its carry, MUL is a full 8x8->16 product.
pub fn predict(a: u8, b: u8, op: Operation) -> u16 {
    let (a, b) = (u16::from(a), u16::from(b));
    match op {
        Operation::Add => a + b,
        Operation::And => a & b,
        Operation::Xor => a ^ b,
        Operation::Mul => a * b,
    }
}

pub fn predict_cmd(cmd: &Command) -> u16 {
    predict(cmd.a, cmd.b, cmd.op)
}
