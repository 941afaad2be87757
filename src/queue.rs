//! FIFO operation queue serializing all work on one expander.
//!
//! [`OpQueue`] owns the state it protects.  A unit of work calls [`OpQueue::enqueue()`], awaits
//! the returned [`Pending`] and gets a [`Turn`] once every unit submitted before it has finished.
//! Only the holder of the `Turn` can touch the state, so in-memory state and hardware transactions
//! never interleave.
//!
//! Submission order is the order in which `enqueue()` is called.  A unit that fails or is dropped
//! simply gives up its place; the queue keeps draining.
//!
//! The queue is meant for a single execution context (it is `!Sync`), like the `RefCell` based
//! port mutex of the blocking drivers.

use core::cell::{Cell, RefCell, RefMut};
use core::future::Future;
use core::ops::{Deref, DerefMut};
use core::pin::Pin;
use core::task::{Context, Poll, Waker};
use heapless::Vec;

/// The queue already holds its maximum number of units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFull;

#[derive(Debug)]
struct Slot {
    id: u32,
    waker: Option<Waker>,
}

pub struct OpQueue<T, const N: usize> {
    value: RefCell<T>,
    slots: RefCell<Vec<Slot, N>>,
    next_id: Cell<u32>,
}

impl<T, const N: usize> OpQueue<T, N> {
    pub fn new(value: T) -> Self {
        Self {
            value: RefCell::new(value),
            slots: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    /// Append a unit of work to the queue.
    pub fn enqueue(&self) -> Result<Pending<'_, T, N>, QueueFull> {
        let id = self.next_id.get();
        self.slots
            .borrow_mut()
            .push(Slot { id, waker: None })
            .map_err(|_| QueueFull)?;
        self.next_id.set(id.wrapping_add(1));
        Ok(Pending {
            queue: self,
            id: Some(id),
        })
    }

    /// Number of units queued or executing.
    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    fn leave(&self, id: u32) {
        let mut slots = self.slots.borrow_mut();
        let Some(pos) = slots.iter().position(|s| s.id == id) else {
            return;
        };
        slots.remove(pos);
        if pos == 0 {
            if let Some(waker) = slots.first_mut().and_then(|s| s.waker.take()) {
                waker.wake();
            }
        }
    }
}

/// A unit of work waiting for its turn.
pub struct Pending<'q, T, const N: usize> {
    queue: &'q OpQueue<T, N>,
    id: Option<u32>,
}

impl<'q, T, const N: usize> Future for Pending<'q, T, N> {
    type Output = Turn<'q, T, N>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let me = self.get_mut();
        let Some(id) = me.id else {
            panic!("`Pending` polled after completion");
        };

        let mut slots = me.queue.slots.borrow_mut();
        if slots.first().map(|s| s.id) == Some(id) {
            drop(slots);
            me.id = None;
            // Only the head of the queue ever borrows the value.
            let value = me.queue.value.borrow_mut();
            return Poll::Ready(Turn {
                queue: me.queue,
                id,
                value,
            });
        }

        if let Some(slot) = slots.iter_mut().find(|s| s.id == id) {
            if !slot
                .waker
                .as_ref()
                .is_some_and(|w| w.will_wake(cx.waker()))
            {
                slot.waker = Some(cx.waker().clone());
            }
        }
        Poll::Pending
    }
}

impl<'q, T, const N: usize> Drop for Pending<'q, T, N> {
    fn drop(&mut self) {
        if let Some(id) = self.id {
            self.queue.leave(id);
        }
    }
}

/// Exclusive access to the queued state.  Dropping it starts the next unit.
pub struct Turn<'q, T, const N: usize> {
    queue: &'q OpQueue<T, N>,
    id: u32,
    value: RefMut<'q, T>,
}

impl<'q, T, const N: usize> Deref for Turn<'q, T, N> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<'q, T, const N: usize> DerefMut for Turn<'q, T, N> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<'q, T, const N: usize> Drop for Turn<'q, T, N> {
    fn drop(&mut self) {
        // The next unit is only woken here; `value` is released before it can be polled.
        self.queue.leave(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::{OpQueue, QueueFull};
    use core::cell::RefCell;
    use embassy_futures::join::{join, join3};
    use embassy_futures::{block_on, yield_now};

    #[test]
    fn fifo_order() {
        let queue: OpQueue<std::vec::Vec<u8>, 4> = OpQueue::new(std::vec::Vec::new());

        let unit = |n: u8, yields: usize| {
            let pending = queue.enqueue();
            async move {
                let mut turn = pending.unwrap().await;
                for _ in 0..yields {
                    yield_now().await;
                }
                turn.push(n);
            }
        };

        // The first unit suspends longest, the others must still wait for it.
        block_on(join3(unit(1, 3), unit(2, 0), unit(3, 1)));
        assert_eq!(*block_on(queue.enqueue().unwrap()), [1, 2, 3]);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn failure_does_not_block() {
        let queue: OpQueue<u32, 4> = OpQueue::new(0);
        let log = RefCell::new(std::vec::Vec::new());

        let failing = async {
            let mut turn = queue.enqueue().unwrap().await;
            *turn += 1;
            yield_now().await;
            Err::<(), _>("failed")
        };
        let next = async {
            let mut turn = queue.enqueue().unwrap().await;
            *turn += 1;
            log.borrow_mut().push(*turn);
            Ok::<(), &str>(())
        };

        let (a, b) = block_on(join(failing, next));
        assert_eq!(a, Err("failed"));
        assert_eq!(b, Ok(()));
        assert_eq!(*log.borrow(), [2]);
    }

    #[test]
    fn dropped_pending_gives_up_slot() {
        let queue: OpQueue<u32, 4> = OpQueue::new(0);

        let first = block_on(queue.enqueue().unwrap());
        let abandoned = queue.enqueue().unwrap();
        let waiting = queue.enqueue().unwrap();
        assert_eq!(queue.len(), 3);

        drop(abandoned);
        assert_eq!(queue.len(), 2);
        drop(first);

        let mut turn = block_on(waiting);
        *turn = 7;
        drop(turn);
        assert_eq!(queue.len(), 0);
        assert_eq!(*block_on(queue.enqueue().unwrap()), 7);
    }

    #[test]
    fn depth_limit() {
        let queue: OpQueue<(), 2> = OpQueue::new(());
        let a = queue.enqueue().unwrap();
        let _b = queue.enqueue().unwrap();
        assert_eq!(queue.enqueue().err(), Some(QueueFull));
        drop(a);
        assert!(queue.enqueue().is_ok());
    }
}
