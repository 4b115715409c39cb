//! The bundled TinyALU tests.

use crate::config::{PolicyKind, TbConfig};
use crate::prelude::*;
use crate::runner::TestSuite;
use crate::scoreboard::Verdict;
use crate::sequencer::AluTest;

/// Random operands for every operation.
pub fn alu_test_random(dut: SimObject, config: TbConfig) -> BoxFuture<'static, TbResult<Verdict>> {
    async move {
        let test = AluTest::new(dut, config.with_policy(PolicyKind::Random))?;
        test.run().await
    }
    .boxed()
}

/// 0xFF on both operands for every operation.
pub fn alu_test_boundary(dut: SimObject, config: TbConfig) -> BoxFuture<'static, TbResult<Verdict>> {
    async move {
        let test = AluTest::new(dut, config.with_policy(PolicyKind::Boundary))?;
        test.run().await
    }
    .boxed()
}

pub fn default_suite() -> TestSuite {
    TestSuite::new("tinyalu_tb")
        .add("alu_test_random", alu_test_random)
        .add("alu_test_boundary", alu_test_boundary)
}
