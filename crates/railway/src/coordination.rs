//! Shared-resource coordination for parallel calls.
//!
//! A parallel call spawns one OS thread per requested worker. Workers
//! share a [`ThreadManager`] holding the named barriers and mutexes of
//! that call, plus a panic flag. When any worker fails, the manager
//! aborts every blocked rendezvous so peers wake up and raise a
//! sympathetic error instead of deadlocking.

use std::sync::{
    Arc, Condvar, Mutex,
    atomic::{AtomicBool, Ordering},
};

use ahash::AHashMap;

/// Why a blocking coordination call returned without succeeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CoordinationError {
    /// A peer thread panicked; this thread should abort quietly.
    Aborted,
    /// The caller's direction disagrees with the mutex's recorded
    /// direction.
    CounterFlow,
}

/// Per-parallel-call coordination state shared by all workers.
pub(crate) struct ThreadManager {
    num_threads: usize,
    panicked: AtomicBool,
    barriers: Mutex<AHashMap<String, Arc<SyncBarrier>>>,
    mutexes: Mutex<AHashMap<String, Arc<TurnMutex>>>,
}

impl ThreadManager {
    pub fn new(num_threads: usize) -> Self {
        Self {
            num_threads,
            panicked: AtomicBool::new(false),
            barriers: Mutex::new(AHashMap::new()),
            mutexes: Mutex::new(AHashMap::new()),
        }
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    pub fn panicked(&self) -> bool {
        self.panicked.load(Ordering::SeqCst)
    }

    /// Marks the whole parallel call as failed and wakes every thread
    /// blocked on a barrier or mutex turn.
    pub fn abort(&self) {
        self.panicked.store(true, Ordering::SeqCst);
        let barriers = lock_clean(&self.barriers);
        for barrier in barriers.values() {
            barrier.abort();
        }
        drop(barriers);
        let mutexes = lock_clean(&self.mutexes);
        for mutex in mutexes.values() {
            mutex.abort();
        }
    }

    /// The named barrier, created for `num_threads` participants on
    /// first use.
    pub fn barrier(&self, name: &str) -> Arc<SyncBarrier> {
        let mut barriers = lock_clean(&self.barriers);
        let barrier = barriers
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(SyncBarrier::new(self.num_threads)))
            .clone();
        // A barrier created after a peer's abort must start broken, or
        // its waiters would never be woken.
        if self.panicked() {
            barrier.abort();
        }
        barrier
    }

    /// The named mutex, created on first use.
    pub fn mutex(&self, name: &str) -> Arc<TurnMutex> {
        let mut mutexes = lock_clean(&self.mutexes);
        let mutex = mutexes
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(TurnMutex::new(self.num_threads)))
            .clone();
        if self.panicked() {
            mutex.abort();
        }
        mutex
    }
}

/// A thread's view of the parallel call it runs in.
#[derive(Clone)]
pub(crate) struct ThreadContext {
    pub manager: Arc<ThreadManager>,
    pub thread_id: usize,
}

struct BarrierState {
    arrived: usize,
    generation: u64,
    broken: bool,
}

/// A reusable rendezvous for exactly `size` threads.
///
/// Unlike `std::sync::Barrier` it can be broken: [`SyncBarrier::abort`]
/// wakes all waiters with [`CoordinationError::Aborted`]. Direction is
/// irrelevant; barriers are symmetric under time reversal.
pub(crate) struct SyncBarrier {
    size: usize,
    state: Mutex<BarrierState>,
    cond: Condvar,
}

impl SyncBarrier {
    fn new(size: usize) -> Self {
        Self {
            size,
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                broken: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Blocks until all `size` participants have arrived.
    pub fn wait(&self) -> Result<(), CoordinationError> {
        let mut state = lock_clean(&self.state);
        if state.broken {
            return Err(CoordinationError::Aborted);
        }
        state.arrived += 1;
        if state.arrived == self.size {
            state.arrived = 0;
            state.generation += 1;
            self.cond.notify_all();
            return Ok(());
        }
        let generation = state.generation;
        while state.generation == generation {
            if state.broken {
                return Err(CoordinationError::Aborted);
            }
            state = wait_clean(&self.cond, state);
        }
        Ok(())
    }

    fn abort(&self) {
        let mut state = lock_clean(&self.state);
        state.broken = true;
        self.cond.notify_all();
    }

    #[cfg(test)]
    fn state_arrived(&self) -> usize {
        lock_clean(&self.state).arrived
    }
}

struct TurnState {
    /// Direction claimed by the current ring pass; `None` between
    /// passes.
    direction: Option<bool>,
    /// One signal slot per thread; a thread may proceed once its slot
    /// is raised.
    turn: Vec<bool>,
    broken: bool,
}

/// A direction-aware mutex: an ordered ring of per-thread turn signals.
///
/// The first thread to enter claims the direction and raises the first
/// slot in ring order (thread 0 forward, thread N-1 backward). Each
/// exit lowers the caller's slot and raises the next neighbour's; the
/// last thread in ring order clears the direction so the mutex can be
/// reused, possibly the other way, on the next pass.
pub(crate) struct TurnMutex {
    size: usize,
    state: Mutex<TurnState>,
    cond: Condvar,
}

impl TurnMutex {
    fn new(size: usize) -> Self {
        Self {
            size,
            state: Mutex::new(TurnState {
                direction: None,
                turn: vec![false; size],
                broken: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Blocks until it is `thread_id`'s turn to hold the mutex.
    ///
    /// Fails with [`CoordinationError::CounterFlow`] when the mutex is
    /// already claimed for the opposite direction.
    pub fn enter(&self, thread_id: usize, backwards: bool) -> Result<(), CoordinationError> {
        let mut state = lock_clean(&self.state);
        if state.broken {
            return Err(CoordinationError::Aborted);
        }
        match state.direction {
            None => {
                state.direction = Some(backwards);
                let first = if backwards { self.size - 1 } else { 0 };
                state.turn[first] = true;
                self.cond.notify_all();
            }
            Some(direction) if direction != backwards => {
                return Err(CoordinationError::CounterFlow);
            }
            Some(_) => {}
        }
        while !state.turn[thread_id] {
            if state.broken {
                return Err(CoordinationError::Aborted);
            }
            state = wait_clean(&self.cond, state);
        }
        Ok(())
    }

    /// Releases the mutex, handing the turn to the next thread in ring
    /// order. `backwards` must be the direction passed to `enter`.
    pub fn exit(&self, thread_id: usize, backwards: bool) {
        let mut state = lock_clean(&self.state);
        state.turn[thread_id] = false;
        let last = if backwards { 0 } else { self.size - 1 };
        if thread_id == last {
            state.direction = None;
        } else if backwards {
            state.turn[thread_id - 1] = true;
        } else {
            state.turn[thread_id + 1] = true;
        }
        self.cond.notify_all();
    }

    fn abort(&self) {
        let mut state = lock_clean(&self.state);
        state.broken = true;
        self.cond.notify_all();
    }
}

/// Locks a mutex, recovering the guard if a panicking thread poisoned
/// it; interpreter state stays consistent because workers fail via
/// `Result`, not panic.
fn lock_clean<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn wait_clean<'a, T>(
    cond: &Condvar,
    guard: std::sync::MutexGuard<'a, T>,
) -> std::sync::MutexGuard<'a, T> {
    cond.wait(guard).unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn barrier_releases_all_participants() {
        let manager = Arc::new(ThreadManager::new(4));
        let results: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let manager = Arc::clone(&manager);
                    scope.spawn(move || manager.barrier("sync").wait())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(results.iter().all(Result::is_ok));
    }

    #[test]
    fn abort_wakes_blocked_barrier_waiters() {
        let manager = Arc::new(ThreadManager::new(2));
        let waiter = {
            let manager = Arc::clone(&manager);
            thread::spawn(move || manager.barrier("sync").wait())
        };
        // Ensure the waiter has registered before aborting.
        while manager.barrier("sync").state_arrived() == 0 {
            thread::yield_now();
        }
        manager.abort();
        assert_eq!(waiter.join().unwrap(), Err(CoordinationError::Aborted));
    }

    #[test]
    fn mutex_orders_threads_by_direction_ring() {
        let manager = Arc::new(ThreadManager::new(3));
        let order = Arc::new(Mutex::new(Vec::new()));
        thread::scope(|scope| {
            for tid in [2, 0, 1] {
                let manager = Arc::clone(&manager);
                let order = Arc::clone(&order);
                scope.spawn(move || {
                    let mutex = manager.mutex("m");
                    mutex.enter(tid, false).unwrap();
                    order.lock().unwrap().push(tid);
                    mutex.exit(tid, false);
                });
            }
        });
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn mutex_rejects_counter_flow() {
        let manager = ThreadManager::new(2);
        let mutex = manager.mutex("m");
        mutex.enter(0, false).unwrap();
        assert_eq!(mutex.enter(1, true), Err(CoordinationError::CounterFlow));
        mutex.exit(0, false);
    }

    #[test]
    fn mutex_direction_resets_after_full_pass() {
        let manager = ThreadManager::new(1);
        let mutex = manager.mutex("m");
        mutex.enter(0, false).unwrap();
        mutex.exit(0, false);
        // A full pass completed, so the opposite direction is legal now.
        mutex.enter(0, true).unwrap();
        mutex.exit(0, true);
    }
}
