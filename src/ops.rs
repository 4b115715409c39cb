use std::fmt;

/// Opcode the device treats as "do nothing". It never produces a result.
pub const NO_OP: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    Add,
    And,
    Xor,
    Mul,
}

impl Operation {
    pub const ALL: [Operation; 4] = [Operation::Add, Operation::And, Operation::Xor, Operation::Mul];

    /// Encoding on the device's 3 bit `op` input.
    pub fn opcode(self) -> u32 {
        match self {
            Operation::Add => 1,
            Operation::And => 2,
            Operation::Xor => 3,
            Operation::Mul => 4,
        }
    }

    pub fn from_opcode(code: u32) -> Option<Self> {
        Operation::ALL.into_iter().find(|op| op.opcode() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            Operation::Add => "ADD",
            Operation::And => "AND",
            Operation::Xor => "XOR",
            Operation::Mul => "MUL",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One transaction as sent to, and observed on, the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command {
    pub a: u8,
    pub b: u8,
    pub op: Operation,
}

impl Command {
    pub fn new(a: u8, b: u8, op: Operation) -> Self {
        Command { a, b, op }
    }

    /// Benign transaction used to push the last real one through the pipeline.
    pub fn filler() -> Self {
        Command::new(0, 0, Operation::And)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x} {} {:02x}", self.a, self.op, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcodes_round_trip() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_opcode(op.opcode()), Some(op));
        }
        assert_eq!(Operation::from_opcode(NO_OP), None);
        assert_eq!(Operation::from_opcode(7), None);
    }

    #[test]
    fn command_display() {
        assert_eq!(Command::new(0x03, 0xff, Operation::Mul).to_string(), "03 MUL ff");
    }
}
