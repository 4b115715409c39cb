use intmap::IntMap;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use crate::executor;
use crate::{
    signal::SimObject,
    sim_if::{SimCallback, TimeUnit, SIM_IF},
    TbError, TbResult,
};

// One simulator callback per signal / absolute time / sync phase. All tasks awaiting the
// same event are queued behind it.
thread_local! {
    // key is signal handle
    static EDGE_MAP: RefCell<IntMap<CallbackHandles>> = RefCell::new(IntMap::new());
    // key is absolute callback time
    static TIMER_MAP: RefCell<IntMap<CallbackHandles>> = RefCell::new(IntMap::new());
    static READ_ONLY: RefCell<CallbackHandles> = RefCell::new(CallbackHandles::default());
    static READ_WRITE: RefCell<CallbackHandles> = RefCell::new(CallbackHandles::default());
}

#[derive(Default)]
struct CallbackHandles {
    handle: Option<usize>,
    callbacks: VecDeque<TrigShared>,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum EdgeKind {
    Any,
    Rising,
    Falling,
}

/// Drops every pending trigger and cancels the simulator callbacks behind them.
pub(crate) fn cancel_all_triggers() -> TbResult<()> {
    let mut handles = Vec::new();
    for sync in [&READ_ONLY, &READ_WRITE] {
        sync.with(|s| {
            let mut s = s.borrow_mut();
            s.callbacks.clear();
            handles.extend(s.handle.take());
        });
    }
    for map in [&TIMER_MAP, &EDGE_MAP] {
        map.with(|m| {
            for (_, cb) in m.borrow_mut().drain() {
                handles.extend(cb.handle);
            }
        });
    }
    for handle in handles {
        SIM_IF.cancel_callback(handle)?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct TrigShared {
    waker: Waker,
    // Edge callbacks fire on any change; the waiter's kind decides if it is woken or kept.
    edge_kind: EdgeKind,
    fired: Arc<AtomicBool>,
}

impl TrigShared {
    fn fire(self) {
        self.fired.store(true, Ordering::Release);
        self.waker.wake();
    }
}

#[derive(Clone, Copy, Debug)]
enum TrigKind {
    Edge(usize, EdgeKind),
    Timer(u64, TimeUnit),
    ReadWrite,
    ReadOnly,
}

#[derive(Debug)]
pub struct Trigger {
    kind: TrigKind,
    fired: Option<Arc<AtomicBool>>,
}

impl Trigger {
    fn new(kind: TrigKind) -> Self {
        Trigger { kind, fired: None }
    }
    pub fn timer(time: u64, unit: TimeUnit) -> Self {
        Trigger::new(TrigKind::Timer(time, unit))
    }
    pub fn edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Any))
    }
    pub fn rising_edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Rising))
    }
    pub fn falling_edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Falling))
    }
    pub fn read_write() -> Self {
        Trigger::new(TrigKind::ReadWrite)
    }
    pub fn read_only() -> Self {
        Trigger::new(TrigKind::ReadOnly)
    }

    fn register(&self, shared: TrigShared) -> TbResult<()> {
        match self.kind {
            TrigKind::ReadWrite => register_sync(&READ_WRITE, SimCallback::ReadWrite, shared),
            TrigKind::ReadOnly => register_sync(&READ_ONLY, SimCallback::ReadOnly, shared),
            TrigKind::Timer(time, unit) => {
                let steps = SIM_IF.get_sim_steps(time, unit)?;
                // simulator reports back absolute time, not the delay
                let abs_time = steps + SIM_IF.get_sim_time_steps();
                register_keyed(&TIMER_MAP, abs_time, SimCallback::Time(steps), shared)
            }
            TrigKind::Edge(sig_hdl, edge_kind) => {
                let shared = TrigShared { edge_kind, ..shared };
                register_keyed(&EDGE_MAP, sig_hdl as u64, SimCallback::Edge(sig_hdl), shared)
            }
        }
    }
}

fn register_sync(
    slot: &'static std::thread::LocalKey<RefCell<CallbackHandles>>,
    cb: SimCallback,
    shared: TrigShared,
) -> TbResult<()> {
    slot.with(|s| {
        let mut s = s.borrow_mut();
        s.callbacks.push_back(shared);
        if s.handle.is_none() {
            s.handle = Some(SIM_IF.register_callback(cb)?);
        }
        Ok(())
    })
}

fn register_keyed(
    map: &'static std::thread::LocalKey<RefCell<IntMap<CallbackHandles>>>,
    key: u64,
    cb: SimCallback,
    shared: TrigShared,
) -> TbResult<()> {
    map.with(|m| {
        let mut m = m.borrow_mut();
        if let Some(callbacks) = m.get_mut(key) {
            callbacks.callbacks.push_back(shared);
        } else {
            let handle = SIM_IF.register_callback(cb)?;
            let callbacks = CallbackHandles {
                handle: Some(handle),
                callbacks: VecDeque::from([shared]),
            };
            m.insert(key, callbacks);
        }
        Ok(())
    })
}

impl Future for Trigger {
    type Output = TbResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(fired) = &self.fired {
            // woken by something else than this trigger
            return match fired.load(Ordering::Acquire) {
                true => Poll::Ready(Ok(())),
                false => Poll::Pending,
            };
        }
        let fired = Arc::new(AtomicBool::new(false));
        let shared = TrigShared {
            waker: cx.waker().clone(),
            edge_kind: EdgeKind::Any,
            fired: fired.clone(),
        };
        self.fired = Some(fired);
        match self.register(shared) {
            Ok(()) => Poll::Pending,
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}

fn wake_all(callbacks: VecDeque<TrigShared>) {
    for shared in callbacks {
        shared.fire();
    }
    // execute woken tasks
    executor::run_once();
}

pub(crate) fn react_rw() -> TbResult<()> {
    react_sync(&READ_WRITE, "ReadWrite")
}

pub(crate) fn react_ro() -> TbResult<()> {
    react_sync(&READ_ONLY, "ReadOnly")
}

fn react_sync(
    slot: &'static std::thread::LocalKey<RefCell<CallbackHandles>>,
    what: &str,
) -> TbResult<()> {
    let callbacks = slot.with(|s| {
        let mut s = s.borrow_mut();
        // callback is done
        s.handle = None;
        std::mem::take(&mut s.callbacks)
    });
    if callbacks.is_empty() {
        return Err(TbError::Simulator(format!("did not expect {} callback", what)));
    }
    wake_all(callbacks);
    Ok(())
}

pub(crate) fn react_time(t: u64) -> TbResult<()> {
    match TIMER_MAP.with(|m| m.borrow_mut().remove(t)) {
        Some(callbacks) => {
            wake_all(callbacks.callbacks);
            Ok(())
        }
        None => Err(TbError::Simulator(format!("did not expect timer callback at t={}", t))),
    }
}

pub(crate) fn react_edge(sig_hdl: usize, edge: EdgeKind) -> TbResult<()> {
    let Some(mut callbacks) = EDGE_MAP.with(|m| m.borrow_mut().remove(sig_hdl as u64)) else {
        return Err(TbError::Simulator(format!(
            "did not expect edge callback for handle {}",
            sig_hdl
        )));
    };
    let (wake, resched): (VecDeque<_>, VecDeque<_>) = callbacks
        .callbacks
        .drain(..)
        .partition(|trig| trig.edge_kind == EdgeKind::Any || edge == EdgeKind::Any || trig.edge_kind == edge);
    if resched.is_empty() {
        // nobody left waiting on this signal
        if let Some(handle) = callbacks.handle {
            SIM_IF.cancel_callback(handle)?;
        }
    } else {
        callbacks.callbacks = resched;
        EDGE_MAP.with(|m| m.borrow_mut().insert(sig_hdl as u64, callbacks));
    }
    if !wake.is_empty() {
        wake_all(wake);
    }
    Ok(())
}
