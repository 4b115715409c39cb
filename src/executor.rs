use futures::future::{BoxFuture, FutureExt};
use futures::task::{waker_ref, ArcWake, Context, Poll};
use futures_channel::oneshot;
use queues::{IsQueue, Queue};
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use crate::tb_obj::lock;
use crate::{TbError, TbResult};

// The executor is single threaded. Every simulation thread (one per `cargo test` thread)
// gets its own ready queue.
thread_local! {
    static READY_QUEUE: RefCell<Queue<Arc<Task>>> = RefCell::new(Queue::new());
    // tasks spawned during the current test, reaped on teardown
    static LIVE_TASKS: RefCell<Vec<Arc<Task>>> = RefCell::new(Vec::new());
}

pub(crate) fn schedule_task(task: Arc<Task>) {
    READY_QUEUE.with(|q| {
        // Queue::add never rejects a value
        let _ = q.borrow_mut().add(task);
    });
}

fn next_task() -> Option<Arc<Task>> {
    READY_QUEUE.with(|q| q.borrow_mut().remove().ok())
}

/// Polls ready tasks until none is left. Tasks woken while this runs are polled too.
#[inline]
pub fn run_once() {
    while let Some(task) = next_task() {
        process_task(task);
    }
}

#[inline]
fn process_task(task: Arc<Task>) {
    if task.state() != TaskState::Pending {
        // cancelled or finished tasks may still be woken by a stale waker
        return;
    }
    let mut fut_slot = lock(&task.future);
    let Some(mut fut) = fut_slot.take() else {
        return;
    };
    let waker = waker_ref(&task);
    let context = &mut Context::from_waker(&waker);
    match fut.as_mut().poll(context) {
        Poll::Pending => {
            if task.state() == TaskState::Pending {
                *fut_slot = Some(fut);
            }
        }
        Poll::Ready(()) => *lock(&task.state) = TaskState::Done,
    }
}

/// Cancels every task spawned on this thread and drops their futures, which closes the
/// channel ends they own. Returns how many tasks were still running.
pub(crate) fn reap_all() -> usize {
    let tasks = LIVE_TASKS.with(|l| std::mem::take(&mut *l.borrow_mut()));
    let mut reaped = 0;
    for task in tasks {
        if task.state() == TaskState::Pending {
            reaped += 1;
        }
        task.cancel();
    }
    // dropping futures above may have woken others
    READY_QUEUE.with(|q| *q.borrow_mut() = Queue::new());
    reaped
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
enum TaskState {
    Pending,
    Done,
    Cancelled,
}

pub struct Task {
    future: Mutex<Option<BoxFuture<'static, ()>>>,
    state: Mutex<TaskState>,
    name: String,
}

impl Task {
    pub fn spawn<T: Send + 'static>(
        future: impl Future<Output = T> + Send + 'static,
        name: &str,
    ) -> JoinHandle<T> {
        let (tx, join_rx) = oneshot::channel::<T>();
        let wrapped = async move {
            // receiver may be gone, nobody is waiting for the result then
            let _ = tx.send(future.await);
        };
        let task = Arc::new(Task {
            future: Mutex::new(Some(wrapped.boxed())),
            state: Mutex::new(TaskState::Pending),
            name: name.to_string(),
        });
        LIVE_TASKS.with(|l| {
            let mut live = l.borrow_mut();
            live.retain(|t| t.state() == TaskState::Pending);
            live.push(task.clone());
        });
        schedule_task(task.clone());
        JoinHandle { task, join_rx }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cancel(&self) {
        *lock(&self.state) = TaskState::Cancelled;
        // the future is locked while the task cancels itself; process_task drops it then
        if let Ok(mut fut) = self.future.try_lock() {
            fut.take();
        }
    }

    fn state(&self) -> TaskState {
        *lock(&self.state)
    }
}

impl ArcWake for Task {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        schedule_task(arc_self.clone());
    }
}

pub struct JoinHandle<T> {
    task: Arc<Task>,
    join_rx: oneshot::Receiver<T>,
}

impl<T> JoinHandle<T> {
    pub fn cancel(&self) {
        self.task.cancel();
    }
    pub fn is_finished(&self) -> bool {
        self.task.state() != TaskState::Pending
    }
    pub fn name(&self) -> &str {
        self.task.name()
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = TbResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.join_rx.poll_unpin(cx) {
            Poll::Ready(Ok(value)) => Poll::Ready(Ok(value)),
            Poll::Ready(Err(_)) => Poll::Ready(Err(TbError::Cancelled(self.task.name.clone()))),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tb_obj::TbObj;
    use futures_channel::mpsc;
    use futures::StreamExt;

    #[test]
    fn join_handle_yields_task_output() {
        let out = TbObj::new(None);
        let o = out.clone();
        let inner = Task::spawn(async { 21 * 2 }, "inner");
        Task::spawn(async move { let r = inner.await; o.with_mut(|v| *v = Some(r)) }, "outer");
        run_once();
        assert_eq!(*out.get(), Some(Ok(42)));
        reap_all();
    }

    #[test]
    fn tasks_resume_when_woken() {
        let (tx, mut rx) = mpsc::unbounded::<u32>();
        let seen = TbObj::new(Vec::new());
        let s = seen.clone();
        Task::spawn(
            async move {
                while let Some(v) = rx.next().await {
                    s.with_mut(|seen| seen.push(v));
                }
            },
            "drain",
        );
        run_once();
        tx.unbounded_send(1).unwrap();
        tx.unbounded_send(2).unwrap();
        run_once();
        assert_eq!(*seen.get(), vec![1, 2]);
        assert_eq!(reap_all(), 1);
    }

    #[test]
    fn cancelled_task_resolves_join_handle_with_error() {
        let (_tx, mut rx) = mpsc::unbounded::<u32>();
        let handle = Task::spawn(async move { rx.next().await }, "stuck");
        run_once();
        handle.cancel();
        assert!(handle.is_finished());
        let out = TbObj::new(None);
        let o = out.clone();
        Task::spawn(async move { let r = handle.await; o.with_mut(|v| *v = Some(r)) }, "joiner");
        run_once();
        assert_eq!(*out.get(), Some(Err(TbError::Cancelled("stuck".to_string()))));
        reap_all();
    }

    #[test]
    fn reap_all_cancels_running_tasks() {
        let (_tx, mut rx) = mpsc::unbounded::<u32>();
        let handle = Task::spawn(async move { rx.next().await }, "observer");
        run_once();
        assert!(!handle.is_finished());
        assert_eq!(reap_all(), 1);
        assert!(handle.is_finished());
        assert_eq!(reap_all(), 0);
    }
}
