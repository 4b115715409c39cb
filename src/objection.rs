//! Objection counting: a phase may only end once nobody objects to it anymore.

use futures::future::poll_fn;
use std::task::{Poll, Waker};

use crate::prelude::*;

#[derive(Clone, Default)]
pub struct Objections(TbObj<ObjectionState>);

#[derive(Default)]
struct ObjectionState {
    count: usize,
    waiters: Vec<Waker>,
}

/// Held while a component objects. Dropping it withdraws the objection.
#[must_use = "the objection is withdrawn as soon as this is dropped"]
pub struct Objection {
    objections: Objections,
    who: String,
}

impl Objections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self, who: &str) -> Objection {
        self.0.with_mut(|s| s.count += 1);
        SIM_IF.log(&format!("{} raised an objection", who));
        Objection {
            objections: self.clone(),
            who: who.to_string(),
        }
    }

    pub fn count(&self) -> usize {
        self.0.get().count
    }

    /// Resolves once no objection is raised.
    pub async fn cleared(&self) {
        poll_fn(|cx| {
            self.0.with_mut(|s| match s.count {
                0 => Poll::Ready(()),
                _ => {
                    if !s.waiters.iter().any(|w| w.will_wake(cx.waker())) {
                        s.waiters.push(cx.waker().clone());
                    }
                    Poll::Pending
                }
            })
        })
        .await
    }
}

impl Objection {
    pub fn who(&self) -> &str {
        &self.who
    }
}

impl Drop for Objection {
    fn drop(&mut self) {
        let waiters = self.objections.0.with_mut(|s| {
            s.count = s.count.saturating_sub(1);
            match s.count {
                0 => std::mem::take(&mut s.waiters),
                _ => Vec::new(),
            }
        });
        waiters.into_iter().for_each(Waker::wake);
    }
}
