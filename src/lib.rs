pub mod bfm;
pub mod config;
pub mod device;
mod executor;
mod junit;
mod native;
pub mod objection;
pub mod ops;
pub mod oracle;
pub mod prelude;
pub mod runner;
pub mod scenarios;
pub mod scoreboard;
pub mod sequencer;
mod signal;
pub mod sim_if;
mod tb_obj;
pub mod testbench;
pub mod tester;
pub mod tinyalu;
mod trigger;
pub mod utils;

use ops::Command;
use sequencer::Phase;

pub type TbResult<T = ()> = Result<T, TbError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TbError {
    // protocol violations
    #[error("no result observed for command #{index} ({cmd})")]
    MissingResult { index: usize, cmd: Command },
    #[error("reset requested after the BFM tasks were started")]
    ResetAfterStart,
    #[error("BFM tasks are not running")]
    TasksNotStarted,
    #[error("BFM tasks were already started")]
    TasksAlreadyStarted,
    #[error("{0} channel receiver was already taken")]
    ChannelTaken(&'static str),
    #[error("{0} channel closed")]
    ChannelClosed(&'static str),
    #[error("device drove undefined opcode {0}")]
    UnknownOpcode(u32),
    #[error("{issued} commands issued but {observed} observed")]
    DroppedTransactions { issued: usize, observed: usize },
    #[error("{issued} commands issued but {observed} results observed")]
    ResultCount { issued: usize, observed: usize },
    #[error("another task is already sending on the stimulus mailbox")]
    ConcurrentSend,
    #[error("illegal phase transition {from} -> {to}")]
    PhaseOrder { from: Phase, to: Phase },

    // policy misuse
    #[error("stimulus generator has no operand policy")]
    MissingPolicy,

    #[error("configuration: {0}")]
    Config(String),

    // simulation
    #[error("unknown signal '{0}'")]
    UnknownSignal(String),
    #[error("simulated time limit of {0} ns reached")]
    Timeout(u64),
    #[error("no events left at step {0} while the test is still running")]
    Starved(u64),
    #[error("task '{0}' was cancelled")]
    Cancelled(String),
    #[error("simulator: {0}")]
    Simulator(String),

    #[error("report: {0}")]
    Report(String),
}
