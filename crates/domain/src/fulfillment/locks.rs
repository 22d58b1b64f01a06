//! Per-order serialization.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as MapMutex, PoisonError};

use common::AggregateId;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = HashMap<AggregateId, Arc<Mutex<()>>>;

/// Hands out one async mutex per order.
///
/// Every state-changing command on an order runs under its guard, so a
/// hold can never interleave with a transition on the same order while
/// different orders proceed in parallel. An order's entry lives only while
/// someone holds or waits for it.
#[derive(Debug, Default)]
pub(crate) struct OrderLocks {
    locks: Arc<MapMutex<LockMap>>,
}

/// Exclusive access to one order. Dropping it releases the order and
/// forgets the entry once nobody else is waiting.
#[derive(Debug)]
pub(crate) struct OrderGuard {
    order_id: AggregateId,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<MapMutex<LockMap>>,
}

impl OrderLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `order_id`.
    pub(crate) async fn acquire(&self, order_id: AggregateId) -> OrderGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks
                .entry(order_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        OrderGuard {
            order_id,
            guard: Some(lock.lock_owned().await),
            locks: self.locks.clone(),
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Drop for OrderGuard {
    fn drop(&mut self) {
        // New acquirers clone under the map lock, so the count is stable here.
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        drop(self.guard.take());

        let idle = locks
            .get(&self.order_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            locks.remove(&self.order_id);
        }
    }
}
