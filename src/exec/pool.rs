// src/exec/pool.rs

//! Admission control for a finite resource (CPU cores, memory-MB).
//!
//! [`ConstraintPool::allocate`] never blocks: it either grants the request or
//! fails with [`PoolError::Unavailable`]. Waiting is built on top of the
//! callback queue: a caller registers a callback, retries, and if the retry
//! fails it waits for the callback, which fires on the next return of *any*
//! allocation. [`ConstraintPool::acquire`] and [`ResourcePools::admit`]
//! package that retry loop.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, trace};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("{pool} capacity unavailable: requested {requested}, {in_use} of {capacity} in use")]
    Unavailable {
        pool: String,
        requested: u64,
        in_use: u64,
        capacity: u64,
    },

    #[error("{pool} request of {requested} exceeds total capacity {capacity}")]
    ExceedsCapacity {
        pool: String,
        requested: u64,
        capacity: u64,
    },
}

type Callback = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct PoolState {
    /// Outstanding allocations keyed by ID (value is the allocated amount).
    allocations: BTreeMap<u64, u64>,
    callbacks: Vec<Callback>,
}

impl PoolState {
    fn in_use(&self) -> u64 {
        self.allocations.values().sum()
    }

    /// Lowest ID not held by an outstanding allocation.
    fn next_id(&self) -> u64 {
        (0..)
            .find(|id| !self.allocations.contains_key(id))
            .unwrap_or(u64::MAX)
    }
}

/// A finite quantity handed out in [`PoolAllocation`]s.
pub struct ConstraintPool {
    name: String,
    capacity: u64,
    state: Mutex<PoolState>,
}

impl fmt::Debug for ConstraintPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintPool")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("in_use", &self.in_use())
            .finish_non_exhaustive()
    }
}

impl ConstraintPool {
    pub fn new(name: impl Into<String>, capacity: u64) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            capacity,
            state: Mutex::new(PoolState::default()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Sum of all outstanding allocations.
    pub fn in_use(&self) -> u64 {
        self.lock().in_use()
    }

    /// Number of outstanding allocations.
    pub fn outstanding(&self) -> usize {
        self.lock().allocations.len()
    }

    /// Try to take `amount` from the pool without waiting.
    pub fn allocate(self: &Arc<Self>, amount: u64) -> Result<PoolAllocation, PoolError> {
        let mut state = self.lock();
        let in_use = state.in_use();
        if amount.saturating_add(in_use) > self.capacity {
            return Err(PoolError::Unavailable {
                pool: self.name.clone(),
                requested: amount,
                in_use,
                capacity: self.capacity,
            });
        }

        let id = state.next_id();
        state.allocations.insert(id, amount);
        trace!(pool = %self.name, id, amount, in_use = in_use + amount, "allocated");

        Ok(PoolAllocation {
            pool: Arc::clone(self),
            id,
            amount,
            returned: false,
        })
    }

    /// Register a callback for the next returned allocation.
    ///
    /// If the pool holds no allocations there is nothing to wait for and the
    /// callback runs immediately. Queued callbacks each run on their own
    /// blocking task when a tokio runtime is available, and inline on the
    /// returning thread otherwise.
    pub fn add_callback<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.lock();
        if state.allocations.is_empty() {
            drop(state);
            callback();
        } else {
            state.callbacks.push(Box::new(callback));
        }
    }

    /// Receiver that resolves on the next return (or immediately if the pool
    /// is empty).
    ///
    /// Register this *before* retrying an allocation so a return that happens
    /// between the failed attempt and the wait is not missed.
    pub fn released(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.add_callback(move || {
            let _ = tx.send(());
        });
        rx
    }

    /// Take `amount` from the pool, waiting for returns until it fits.
    pub async fn acquire(self: &Arc<Self>, amount: u64) -> Result<PoolAllocation, PoolError> {
        self.check_fits(amount)?;
        loop {
            let wake = self.released();
            match self.allocate(amount) {
                Ok(alloc) => return Ok(alloc),
                Err(PoolError::Unavailable { .. }) => {
                    let _ = wake.await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn check_fits(&self, amount: u64) -> Result<(), PoolError> {
        if amount > self.capacity {
            return Err(PoolError::ExceedsCapacity {
                pool: self.name.clone(),
                requested: amount,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    fn return_allocation(&self, id: u64) {
        let callbacks = {
            let mut state = self.lock();
            state.allocations.remove(&id);
            trace!(pool = %self.name, id, in_use = state.in_use(), "returned");
            std::mem::take(&mut state.callbacks)
        };
        let runtime = tokio::runtime::Handle::try_current().ok();
        for callback in callbacks {
            match &runtime {
                Some(handle) => {
                    handle.spawn_blocking(callback);
                }
                None => callback(),
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PoolState> {
        // Every update under this lock is a single map operation; poisoning
        // cannot leave it inconsistent.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// An amount held from a [`ConstraintPool`].
///
/// Returned to the pool by [`PoolAllocation::release`] or on drop, so every
/// exit path of the holder gives the capacity back.
#[derive(Debug)]
pub struct PoolAllocation {
    pool: Arc<ConstraintPool>,
    id: u64,
    amount: u64,
    returned: bool,
}

impl PoolAllocation {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn release(mut self) {
        self.give_back();
    }

    fn give_back(&mut self) {
        if !self.returned {
            self.returned = true;
            self.pool.return_allocation(self.id);
        }
    }
}

impl Drop for PoolAllocation {
    fn drop(&mut self) {
        self.give_back();
    }
}

/// CPU and memory held together for one command.
#[derive(Debug)]
pub struct Admission {
    pub cpu: PoolAllocation,
    pub mem: PoolAllocation,
}

/// The CPU and memory pools used together by the local runner.
#[derive(Debug, Clone)]
pub struct ResourcePools {
    pub cpu: Arc<ConstraintPool>,
    pub mem: Arc<ConstraintPool>,
}

impl ResourcePools {
    pub fn new(cpus: u64, mem_mb: u64) -> Self {
        Self {
            cpu: ConstraintPool::new("cpu", cpus),
            mem: ConstraintPool::new("mem", mem_mb),
        }
    }

    /// Acquire CPU then memory, waiting until both fit.
    ///
    /// When memory is short the CPU allocation is handed back before waiting
    /// on the memory pool, so a waiting command never sits on cores it
    /// cannot use. There is no FIFO fairness between competing callers.
    pub async fn admit(&self, ncpus: u64, mem_mb: u64) -> Result<Admission, PoolError> {
        self.cpu.check_fits(ncpus)?;
        self.mem.check_fits(mem_mb)?;

        loop {
            let cpu_wake = self.cpu.released();
            let cpu = match self.cpu.allocate(ncpus) {
                Ok(alloc) => alloc,
                Err(PoolError::Unavailable { .. }) => {
                    debug!(cpus = ncpus, "waiting for cpu capacity");
                    let _ = cpu_wake.await;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let mem_wake = self.mem.released();
            match self.mem.allocate(mem_mb) {
                Ok(mem) => return Ok(Admission { cpu, mem }),
                Err(PoolError::Unavailable { .. }) => {
                    cpu.release();
                    debug!(mem_mb, "waiting for memory capacity");
                    let _ = mem_wake.await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
