use intmap::IntMap;
use num_format::{Locale, ToFormattedString};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use crate::device::{Device, Port};
use crate::executor;
use crate::signal::{ObjectKind, SimObject};
use crate::sim_if::{SimCallback, SimIf};
use crate::trigger::{self, EdgeKind};
use crate::{TbError, TbResult};

// picoseconds
const PRECISION: i8 = -12;
const ROOT_HANDLE: usize = 0;
// per time step
const MAX_DELTAS: u32 = 10_000;

thread_local! {
    static KERNEL: RefCell<Option<Kernel>> = const { RefCell::new(None) };
}

/// In-process event driven simulator. Writes are non-blocking: they are applied at the
/// end of the current delta cycle, after every task woken in it has run.
pub(crate) struct NativeSim;

#[derive(Debug)]
pub(crate) struct Signal {
    name: String,
    width: u32,
    value: u64,
}

#[derive(Debug, Clone, Copy)]
enum CbKind {
    Time(u64),
    Edge(usize),
    ReadWrite,
    ReadOnly,
}

struct Kernel {
    root: String,
    time: u64,
    // handle of signals[i] is i + 1, handle 0 is the root scope
    signals: Vec<Signal>,
    names: HashMap<String, usize>,
    pending: Vec<(usize, u64)>,
    device: Box<dyn Device>,
    clock: usize,
    next_cb: usize,
    callbacks: IntMap<CbKind>,
    timers: BTreeMap<u64, usize>,
    edges: IntMap<usize>,
    read_write: Option<usize>,
    read_only: Option<usize>,
}

impl Kernel {
    fn new(device: Box<dyn Device>) -> TbResult<Self> {
        let root = device.name().to_string();
        let mut signals = Vec::new();
        let mut names = HashMap::new();
        for Port { name, width } in device.ports() {
            if width == 0 || width > 64 {
                return Err(TbError::Config(format!("port {} has unsupported width {}", name, width)));
            }
            let full_name = format!("{}.{}", root, name);
            signals.push(Signal { name: full_name.clone(), width, value: 0 });
            names.insert(full_name, signals.len());
        }
        let clock_name = format!("{}.{}", root, device.clock());
        let clock = *names
            .get(&clock_name)
            .ok_or_else(|| TbError::UnknownSignal(clock_name.clone()))?;
        Ok(Kernel {
            root,
            time: 0,
            signals,
            names,
            pending: Vec::new(),
            device,
            clock,
            next_cb: 1,
            callbacks: IntMap::new(),
            timers: BTreeMap::new(),
            edges: IntMap::new(),
            read_write: None,
            read_only: None,
        })
    }

    fn signal(&self, handle: usize) -> TbResult<&Signal> {
        handle
            .checked_sub(1)
            .and_then(|i| self.signals.get(i))
            .ok_or_else(|| TbError::Simulator(format!("invalid signal handle {}", handle)))
    }

    /// Applies the writes of the last delta cycle and returns the signals that changed.
    fn apply_pending(&mut self) -> Vec<(usize, EdgeKind)> {
        let mut before: Vec<(usize, u64)> = Vec::new();
        for (handle, value) in std::mem::take(&mut self.pending) {
            let sig = &mut self.signals[handle - 1];
            if !before.iter().any(|(h, _)| *h == handle) {
                before.push((handle, sig.value));
            }
            sig.value = value;
        }
        before
            .into_iter()
            .filter_map(|(handle, old)| {
                let sig = &self.signals[handle - 1];
                if sig.value == old {
                    return None;
                }
                let edge = match (sig.width, sig.value) {
                    (1, 0) => EdgeKind::Falling,
                    (1, _) => EdgeKind::Rising,
                    _ => EdgeKind::Any,
                };
                Some((handle, edge))
            })
            .collect()
    }

    fn eval_device(&mut self) -> TbResult<()> {
        let mut io = PortIo {
            scope: &self.root,
            signals: &self.signals,
            names: &self.names,
            writes: Vec::new(),
        };
        self.device.on_rising_edge(&mut io)?;
        let writes = io.writes;
        self.pending.extend(writes);
        Ok(())
    }

    fn new_cb(&mut self, kind: CbKind) -> usize {
        let hdl = self.next_cb;
        self.next_cb += 1;
        self.callbacks.insert(hdl as u64, kind);
        hdl
    }
}

/// A device's view of its ports during one clock edge. Reads see the values from before
/// the edge, writes land in the next delta cycle.
pub struct PortIo<'a> {
    scope: &'a str,
    signals: &'a [Signal],
    names: &'a HashMap<String, usize>,
    writes: Vec<(usize, u64)>,
}

impl PortIo<'_> {
    fn lookup(&self, port: &str) -> TbResult<usize> {
        let full_name = format!("{}.{}", self.scope, port);
        self.names
            .get(&full_name)
            .copied()
            .ok_or(TbError::UnknownSignal(full_name))
    }

    pub fn get(&self, port: &str) -> TbResult<u64> {
        let handle = self.lookup(port)?;
        Ok(self.signals[handle - 1].value)
    }

    pub fn set(&mut self, port: &str, value: u64) -> TbResult<()> {
        let handle = self.lookup(port)?;
        let value = value & mask(self.signals[handle - 1].width);
        self.writes.push((handle, value));
        Ok(())
    }
}

fn mask(width: u32) -> u64 {
    match width {
        64 => u64::MAX,
        w => (1 << w) - 1,
    }
}

fn with_kernel<R>(f: impl FnOnce(&mut Kernel) -> TbResult<R>) -> TbResult<R> {
    KERNEL.with(|k| match k.borrow_mut().as_mut() {
        Some(kernel) => f(kernel),
        None => Err(TbError::Simulator("no simulation running on this thread".to_string())),
    })
}

/// Elaborates `device` and returns the root scope.
pub(crate) fn init(device: Box<dyn Device>) -> TbResult<SimObject> {
    let kernel = Kernel::new(device)?;
    KERNEL.with(|k| {
        let mut k = k.borrow_mut();
        if k.is_some() {
            return Err(TbError::Simulator("a simulation is already running on this thread".to_string()));
        }
        *k = Some(kernel);
        Ok(())
    })?;
    Ok(SimObject { handle: ROOT_HANDLE, kind: ObjectKind::Hier })
}

pub(crate) fn shutdown() {
    KERNEL.with(|k| k.borrow_mut().take());
}

/// Advances simulated time until `finished` holds or `limit` steps are reached.
pub(crate) fn run_until(finished: impl Fn() -> bool, limit: u64) -> TbResult<()> {
    executor::run_once();
    settle()?;
    while !finished() {
        let next = with_kernel(|k| Ok(k.timers.first_key_value().map(|(t, h)| (*t, *h))))?;
        let Some((t, cb_hdl)) = next else {
            return Err(TbError::Starved(with_kernel(|k| Ok(k.time))?));
        };
        if t > limit {
            return Err(TbError::Timeout(limit / 1_000));
        }
        with_kernel(|k| {
            k.time = t;
            k.timers.remove(&t);
            k.callbacks.remove(cb_hdl as u64);
            Ok(())
        })?;
        trigger::react_time(t)?;
        settle()?;
    }
    Ok(())
}

// Runs delta cycles until no writes are pending, then the read-only phase.
fn settle() -> TbResult<()> {
    let mut deltas = 0;
    loop {
        deltas += 1;
        if deltas > MAX_DELTAS {
            return Err(TbError::Simulator(format!("no convergence after {} delta cycles", MAX_DELTAS)));
        }
        let (changes, clock) = with_kernel(|k| Ok((k.apply_pending(), k.clock)))?;
        if !changes.is_empty() {
            // registers update on the clock edge before anyone observes it
            if changes.contains(&(clock, EdgeKind::Rising)) {
                with_kernel(|k| k.eval_device())?;
            }
            for (handle, edge) in changes {
                if with_kernel(|k| Ok(k.edges.contains_key(handle as u64)))? {
                    trigger::react_edge(handle, edge)?;
                }
            }
            continue;
        }
        let rw = with_kernel(|k| Ok(k.read_write.take()))?;
        match rw {
            Some(hdl) => {
                with_kernel(|k| Ok(k.callbacks.remove(hdl as u64)))?;
                trigger::react_rw()?;
            }
            None => break,
        }
    }
    if let Some(hdl) = with_kernel(|k| Ok(k.read_only.take()))? {
        with_kernel(|k| Ok(k.callbacks.remove(hdl as u64)))?;
        trigger::react_ro()?;
        if with_kernel(|k| Ok(!k.pending.is_empty()))? {
            return Err(TbError::Simulator("signal written in read-only phase".to_string()));
        }
    }
    Ok(())
}

impl SimIf for NativeSim {
    fn set_value(&self, obj: &SimObject, value: u64) -> TbResult<()> {
        with_kernel(|k| {
            let width = k.signal(obj.handle)?.width;
            k.pending.push((obj.handle, value & mask(width)));
            Ok(())
        })
    }
    fn get_value(&self, obj: &SimObject) -> TbResult<u64> {
        with_kernel(|k| Ok(k.signal(obj.handle)?.value))
    }
    fn get_object_by_name(&self, name: &str) -> TbResult<SimObject> {
        with_kernel(|k| {
            if name == k.root {
                return Ok(SimObject { handle: ROOT_HANDLE, kind: ObjectKind::Hier });
            }
            let handle = *k
                .names
                .get(name)
                .ok_or_else(|| TbError::UnknownSignal(name.to_string()))?;
            Ok(SimObject {
                handle,
                kind: ObjectKind::Int(k.signal(handle)?.width),
            })
        })
    }
    fn get_root_object(&self) -> TbResult<SimObject> {
        with_kernel(|_| Ok(SimObject { handle: ROOT_HANDLE, kind: ObjectKind::Hier }))
    }
    fn get_full_name(&self, obj: &SimObject) -> TbResult<String> {
        with_kernel(|k| match obj.handle {
            ROOT_HANDLE => Ok(k.root.clone()),
            h => Ok(k.signal(h)?.name.clone()),
        })
    }
    fn get_sim_time_steps(&self) -> u64 {
        KERNEL.with(|k| k.try_borrow().ok().and_then(|k| k.as_ref().map(|k| k.time)).unwrap_or(0))
    }
    fn get_sim_precision(&self) -> i8 {
        PRECISION
    }
    fn log(&self, msg: &str) {
        let t = self.get_sim_time_steps();
        let int = t / 1_000;
        let frac = t % 1_000;
        println!("{}.{:03}ns {}", int.to_formatted_string(&Locale::en), frac, msg);
    }
    fn register_callback(&self, cb: SimCallback) -> TbResult<usize> {
        with_kernel(|k| match cb {
            SimCallback::Time(delay) => {
                let abs = k.time + delay;
                if k.timers.contains_key(&abs) {
                    return Err(TbError::Simulator(format!("timer callback at t={} registered twice", abs)));
                }
                let hdl = k.new_cb(CbKind::Time(abs));
                k.timers.insert(abs, hdl);
                Ok(hdl)
            }
            SimCallback::Edge(sig_hdl) => {
                k.signal(sig_hdl)?;
                if k.edges.contains_key(sig_hdl as u64) {
                    return Err(TbError::Simulator(format!("edge callback for handle {} registered twice", sig_hdl)));
                }
                let hdl = k.new_cb(CbKind::Edge(sig_hdl));
                k.edges.insert(sig_hdl as u64, hdl);
                Ok(hdl)
            }
            SimCallback::ReadWrite => {
                let hdl = k.new_cb(CbKind::ReadWrite);
                k.read_write = Some(hdl);
                Ok(hdl)
            }
            SimCallback::ReadOnly => {
                let hdl = k.new_cb(CbKind::ReadOnly);
                k.read_only = Some(hdl);
                Ok(hdl)
            }
        })
    }
    fn cancel_callback(&self, cb_hdl: usize) -> TbResult<()> {
        with_kernel(|k| {
            let kind = k
                .callbacks
                .remove(cb_hdl as u64)
                .ok_or_else(|| TbError::Simulator(format!("unknown callback handle {}", cb_hdl)))?;
            match kind {
                CbKind::Time(abs) => {
                    k.timers.remove(&abs);
                }
                CbKind::Edge(sig_hdl) => {
                    k.edges.remove(sig_hdl as u64);
                }
                CbKind::ReadWrite => k.read_write = None,
                CbKind::ReadOnly => k.read_only = None,
            }
            Ok(())
        })
    }
}
