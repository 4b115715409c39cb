//! Bus functional model of the TinyALU.
//!
//! The BFM is the only component touching the device's signals. Stimulus enters through a
//! single slot mailbox that the driver task empties into the start/done handshake. Two
//! monitor tasks independently rebuild the issued commands and the produced results from
//! the signals and publish them on unbounded channels.

use futures::future::poll_fn;
use futures_channel::mpsc::{self, Receiver, Sender, UnboundedReceiver, UnboundedSender};

use crate::ops::{Command, Operation};
use crate::prelude::*;
use crate::runner::spawn_checked;

/// Commands that can be in flight between `send_op` returning and the result of the
/// preceding command being observable: one in the mailbox, one in the handshake.
pub const PIPELINE_DEPTH: usize = 2;

#[derive(Clone)]
pub struct AluBfm {
    clk: SimObject,
    reset_n: SimObject,
    a: SimObject,
    b: SimObject,
    op: SimObject,
    start: SimObject,
    done: SimObject,
    result: SimObject,
    reset_cycles: u32,
    state: TbObj<BfmState>,
}

struct BfmState {
    started: bool,
    stim_tx: Option<Sender<Command>>,
    stim_rx: Option<Receiver<Command>>,
    cmd_tx: Option<UnboundedSender<Command>>,
    cmd_rx: Option<UnboundedReceiver<Command>>,
    result_tx: Option<UnboundedSender<u16>>,
    result_rx: Option<UnboundedReceiver<u16>>,
}

impl AluBfm {
    pub fn new(dut: SimObject, reset_cycles: u32) -> TbResult<Self> {
        // buffer 0 plus the sender's own slot: one command waits while one is driven
        let (stim_tx, stim_rx) = mpsc::channel(0);
        let (cmd_tx, cmd_rx) = mpsc::unbounded();
        let (result_tx, result_rx) = mpsc::unbounded();
        Ok(Self {
            clk: dut.c("clk")?,
            reset_n: dut.c("reset_n")?,
            a: dut.c("A")?,
            b: dut.c("B")?,
            op: dut.c("op")?,
            start: dut.c("start")?,
            done: dut.c("done")?,
            result: dut.c("result")?,
            reset_cycles,
            state: TbObj::new(BfmState {
                started: false,
                stim_tx: Some(stim_tx),
                stim_rx: Some(stim_rx),
                cmd_tx: Some(cmd_tx),
                cmd_rx: Some(cmd_rx),
                result_tx: Some(result_tx),
                result_rx: Some(result_rx),
            }),
        })
    }

    pub fn clk(&self) -> SimObject {
        self.clk
    }

    pub fn tasks_started(&self) -> bool {
        self.state.get().started
    }

    /// Holds the device in reset. Only valid before [`AluBfm::start_tasks`].
    pub async fn reset(&self) -> TbResult {
        if self.tasks_started() {
            return Err(TbError::ResetAfterStart);
        }
        self.clk.falling_edge().await?;
        self.reset_n.set_u32(0)?;
        self.a.set_u32(0)?;
        self.b.set_u32(0)?;
        self.op.set_u32(0)?;
        self.start.set_u32(0)?;
        utils::falling_edges(self.clk, self.reset_cycles.max(1)).await?;
        self.reset_n.set_u32(1)?;
        self.clk.falling_edge().await?;
        SIM_IF.log("TinyALU reset done");
        Ok(())
    }

    /// Starts the driver and both monitors. They run until the test is torn down.
    pub fn start_tasks(&self) -> TbResult {
        let (stim_rx, cmd_tx, result_tx) = self.state.with_mut(|s| {
            if s.started {
                return Err(TbError::TasksAlreadyStarted);
            }
            s.started = true;
            match (s.stim_rx.take(), s.cmd_tx.take(), s.result_tx.take()) {
                (Some(stim_rx), Some(cmd_tx), Some(result_tx)) => Ok((stim_rx, cmd_tx, result_tx)),
                _ => Err(TbError::TasksAlreadyStarted),
            }
        })?;
        spawn_checked("tinyalu_driver", self.clone().driver_bfm(stim_rx));
        spawn_checked("tinyalu_cmd_mon", self.clone().cmd_mon_bfm(cmd_tx));
        spawn_checked("tinyalu_result_mon", self.clone().result_mon_bfm(result_tx));
        Ok(())
    }

    /// Queues one command for the driver. Returns once the mailbox took it, which is when
    /// the driver has accepted the previous command into the handshake.
    ///
    /// There is a single producer: while one call waits for the mailbox, a second
    /// concurrent call fails with [`TbError::ConcurrentSend`].
    pub async fn send_op(&self, a: u8, b: u8, op: Operation) -> TbResult {
        let mut tx = self.state.with_mut(|s| {
            if !s.started {
                return Err(TbError::TasksNotStarted);
            }
            // the sender is put back below
            s.stim_tx.take().ok_or(TbError::ConcurrentSend)
        })?;
        let cmd = Command::new(a, b, op);
        let ready = poll_fn(|cx| tx.poll_ready(cx)).await;
        let sent = ready.and_then(|()| tx.start_send(cmd));
        self.state.with_mut(|s| s.stim_tx = Some(tx));
        sent.map_err(|_| TbError::ChannelClosed("stimulus"))
    }

    pub fn take_cmd_receiver(&self) -> TbResult<UnboundedReceiver<Command>> {
        self.state
            .with_mut(|s| s.cmd_rx.take())
            .ok_or(TbError::ChannelTaken("command"))
    }

    pub fn take_result_receiver(&self) -> TbResult<UnboundedReceiver<u16>> {
        self.state
            .with_mut(|s| s.result_rx.take())
            .ok_or(TbError::ChannelTaken("result"))
    }

    async fn driver_bfm(self, mut stim_rx: Receiver<Command>) -> TbResult {
        self.start.set_u32(0)?;
        self.a.set_u32(0)?;
        self.b.set_u32(0)?;
        self.op.set_u32(0)?;
        loop {
            self.clk.falling_edge().await?;
            let st = self.start.u32()?;
            let dn = self.done.u32()?;
            if st == 0 && dn == 0 {
                match stim_rx.try_next() {
                    Ok(Some(cmd)) => {
                        self.a.set_u32(u32::from(cmd.a))?;
                        self.b.set_u32(u32::from(cmd.b))?;
                        self.op.set_u32(cmd.op.opcode())?;
                        self.start.set_u32(1)?;
                    }
                    // all senders gone, no more stimulus
                    Ok(None) => return Ok(()),
                    // mailbox empty
                    Err(_) => {}
                }
            } else if st == 1 && dn == 1 {
                self.start.set_u32(0)?;
            }
        }
    }

    async fn cmd_mon_bfm(self, cmd_tx: UnboundedSender<Command>) -> TbResult {
        let mut prev_start = 0;
        loop {
            self.clk.falling_edge().await?;
            let st = self.start.u32()?;
            if st == 1 && prev_start == 0 {
                let opcode = self.op.u32()?;
                let op = Operation::from_opcode(opcode).ok_or(TbError::UnknownOpcode(opcode))?;
                let cmd = Command::new(self.a.u32()? as u8, self.b.u32()? as u8, op);
                cmd_tx
                    .unbounded_send(cmd)
                    .map_err(|_| TbError::ChannelClosed("command"))?;
            }
            prev_start = st;
        }
    }

    async fn result_mon_bfm(self, result_tx: UnboundedSender<u16>) -> TbResult {
        let mut prev_done = 0;
        loop {
            self.clk.falling_edge().await?;
            let dn = self.done.u32()?;
            if dn == 1 && prev_done == 0 {
                let result = self.result.u32()? as u16;
                result_tx
                    .unbounded_send(result)
                    .map_err(|_| TbError::ChannelClosed("result"))?;
            }
            prev_done = dn;
        }
    }
}
