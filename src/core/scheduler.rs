// Copyright (c) 2026 Emberchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Timed-operation scheduler.
//!
//! A single priority queue of thunks keyed by wakeup time, guarded by a
//! mutex and condition variable. Workers call [`Scheduler::run`] and block
//! until the earliest wakeup is due or a signal fires; the op executes
//! outside the lock. Ops due at the same instant fire in insertion order.
//! Thunks must not hold a worker longer than the gossip period; long work
//! re-enqueues itself.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Condvar, Mutex};
use std::time::Instant;

type Thunk = Box<dyn FnOnce() + Send>;

struct Op {
    wakeup: Instant,
    seq: u64,
    thunk: Thunk,
}

// Min-heap on (wakeup, seq): BinaryHeap is a max-heap, so compare reversed.
impl Ord for Op {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.wakeup, other.seq).cmp(&(self.wakeup, self.seq))
    }
}
impl PartialOrd for Op {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl PartialEq for Op {
    fn eq(&self, other: &Self) -> bool {
        self.wakeup == other.wakeup && self.seq == other.seq
    }
}
impl Eq for Op {}

struct Inner {
    done: bool,
    seq: u64,
    queue: BinaryHeap<Op>,
}

/// Timed-operation queue with blocking workers.
pub struct Scheduler {
    inner: Mutex<Inner>,
    condition: Condvar,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Create an empty scheduler. Workers are supplied by callers invoking
    /// [`Scheduler::run`] on their own threads.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                done: false,
                seq: 0,
                queue: BinaryHeap::new(),
            }),
            condition: Condvar::new(),
        }
    }

    /// Enqueue `thunk` to run at `wakeup`. No-op after [`Scheduler::stop`].
    pub fn add(&self, wakeup: Instant, thunk: impl FnOnce() + Send + 'static) {
        let Ok(mut guard) = self.inner.lock() else {
            return;
        };
        if guard.done {
            return;
        }
        let seq = guard.seq;
        guard.seq += 1;
        guard.queue.push(Op {
            wakeup,
            seq,
            thunk: Box::new(thunk),
        });
        drop(guard);
        self.condition.notify_one();
    }

    /// Worker loop: blocks until ops come due, exits on stop.
    pub fn run(&self) {
        let Ok(mut guard) = self.inner.lock() else {
            return;
        };
        loop {
            if guard.done {
                return;
            }
            let now = Instant::now();
            let head = guard.queue.peek().map(|op| op.wakeup);
            let next_wakeup = match head {
                Some(wakeup) if wakeup <= now => {
                    if let Some(op) = guard.queue.pop() {
                        drop(guard);
                        (op.thunk)();
                        guard = match self.inner.lock() {
                            Ok(g) => g,
                            Err(_) => return,
                        };
                    }
                    continue;
                }
                Some(wakeup) => Some(wakeup - now),
                None => None,
            };
            let next_guard = match next_wakeup {
                Some(timeout) => match self.condition.wait_timeout(guard, timeout) {
                    Ok((g, _)) => Some(g),
                    Err(_) => None,
                },
                None => match self.condition.wait(guard) {
                    Ok(g) => Some(g),
                    Err(_) => None,
                },
            };
            guard = match next_guard {
                Some(g) => g,
                None => return,
            };
        }
    }

    /// Execute every op already due, without blocking. Returns the count.
    pub fn poll(&self) -> usize {
        let mut count = 0;
        while self.poll_one() != 0 {
            count += 1;
        }
        count
    }

    /// Execute at most one due op. Returns the count (0 or 1).
    pub fn poll_one(&self) -> usize {
        let op = {
            let Ok(mut guard) = self.inner.lock() else {
                return 0;
            };
            let due = guard
                .queue
                .peek()
                .map(|op| op.wakeup <= Instant::now())
                .unwrap_or(false);
            if due {
                guard.queue.pop()
            } else {
                None
            }
        };
        match op {
            Some(op) => {
                (op.thunk)();
                1
            }
            None => 0,
        }
    }

    /// Mark done and wake every worker; pending ops are abandoned.
    pub fn stop(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.done = true;
        }
        self.condition.notify_all();
    }

    /// Whether [`Scheduler::stop`] has run.
    pub fn stopped(&self) -> bool {
        self.inner.lock().map(|g| g.done).unwrap_or(true)
    }

    /// Number of pending ops.
    pub fn size(&self) -> usize {
        self.inner.lock().map(|g| g.queue.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn poll_runs_due_ops_in_order() {
        let scheduler = Scheduler::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let now = Instant::now();

        for (delay_ms, tag) in [(0u64, 1u32), (0, 2), (0, 3)] {
            let log = Arc::clone(&log);
            scheduler.add(now + Duration::from_millis(delay_ms), move || {
                log.lock().unwrap().push(tag);
            });
        }
        assert_eq!(scheduler.poll(), 3);
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(scheduler.size(), 0);
    }

    #[test]
    fn poll_skips_future_ops() {
        let scheduler = Scheduler::new();
        scheduler.add(Instant::now() + Duration::from_secs(60), || {});
        assert_eq!(scheduler.poll(), 0);
        assert_eq!(scheduler.size(), 1);
    }

    #[test]
    fn add_after_stop_is_noop() {
        let scheduler = Scheduler::new();
        scheduler.stop();
        scheduler.add(Instant::now(), || panic!("must not run"));
        assert_eq!(scheduler.size(), 0);
        assert!(scheduler.stopped());
    }

    #[test]
    fn worker_executes_and_exits_on_stop() {
        let scheduler = Arc::new(Scheduler::new());
        let ran = Arc::new(AtomicUsize::new(0));
        {
            let ran = Arc::clone(&ran);
            scheduler.add(Instant::now(), move || {
                ran.fetch_add(1, AtomicOrdering::SeqCst);
            });
        }
        let worker = {
            let scheduler = Arc::clone(&scheduler);
            std::thread::spawn(move || scheduler.run())
        };
        while ran.load(AtomicOrdering::SeqCst) == 0 {
            std::thread::sleep(Duration::from_millis(1));
        }
        scheduler.stop();
        worker.join().unwrap();
        assert_eq!(ran.load(AtomicOrdering::SeqCst), 1);
    }
}
