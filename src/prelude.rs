pub use crate::executor::{JoinHandle, Task};
pub use crate::trigger::{EdgeKind, Trigger};
pub use crate::signal::SimObject;
pub use crate::sim_if::{TimeUnit, SIM_IF};
pub use futures::future::{BoxFuture, FutureExt};
pub use crate::{TbError, TbResult};
pub use crate::tb_obj::TbObj;
pub use crate::utils;
pub use crate::testbench::clock;
pub use crate::ops::{Command, Operation};
pub use crate::oracle::predict;
pub use crate::bfm::{AluBfm, PIPELINE_DEPTH};
pub use crate::scoreboard::{Scoreboard, Verdict};
pub use crate::tester::{FixedOperands, OperandPolicy, RandomOperands, Tester};
pub use crate::sequencer::{AluTest, Phase};
pub use crate::config::{Flavor, PolicyKind, TbConfig};
pub use crate::runner::{fail_test, run_test, TestCase, TestSuite};
pub use crate::tinyalu::{Fault, TinyAlu};
