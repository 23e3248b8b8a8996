use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Wake, Waker};

/// A waker which fans a single wake event out to every registered task.
#[derive(Debug, Default)]
pub(crate) struct BroadcastWaker {
    wakers: Mutex<Vec<Waker>>,
}

impl BroadcastWaker {
    /// Create a new broadcaster, returned together with the waker feeding it.
    pub(crate) fn new() -> (Arc<Self>, Waker) {
        let this = Arc::new(Self::default());
        let waker = Waker::from(this.clone());
        (this, waker)
    }

    /// Register interest of the task owning `waker`.
    pub(crate) fn register(&self, waker: &Waker) {
        let mut wakers = self.wakers.lock().unwrap_or_else(PoisonError::into_inner);
        if !wakers.iter().any(|w| w.will_wake(waker)) {
            wakers.push(waker.clone());
        }
    }

    /// Wake and forget every registered task.
    pub(crate) fn wake_all(&self) {
        let wakers = std::mem::take(
            &mut *self.wakers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for waker in wakers {
            waker.wake();
        }
    }
}

impl Wake for BroadcastWaker {
    fn wake(self: Arc<Self>) {
        self.wake_all();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.wake_all();
    }
}
