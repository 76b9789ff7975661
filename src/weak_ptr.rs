// src/weak_ptr.rs

//! Non-owning, lifetime-checked handles
//!
//! A [`Guard`] is the liveness cell of an owner (normally a [`Base`](crate::Base)).
//! Every [`Handle`] issued under a guard shares that cell and holds only a weak
//! reference to its target. Once the owner invalidates the guard, every handle
//! reports `is_valid() == false` and every access fails with
//! [`Error::Invalidated`]. Invalidation is one-way.
//!
//! Access goes through owned read/write guards (`HandleRef`/`HandleMut`), so a
//! borrow taken before the owner is dropped keeps the target's storage alive
//! until the borrow ends; new borrows are refused as soon as the guard is dead.

use crate::error::{Error, Result};
use parking_lot::RawRwLock;
use parking_lot::RwLock;
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Shared read access to a handle's target
pub type HandleRef<T> = ArcRwLockReadGuard<RawRwLock, T>;

/// Exclusive access to a handle's target
pub type HandleMut<T> = ArcRwLockWriteGuard<RawRwLock, T>;

#[derive(Debug)]
struct Liveness {
    alive: AtomicBool,
}

/// Liveness cell shared between an owner and all handles derived from it
#[derive(Debug, Clone)]
pub struct Guard {
    cell: Arc<Liveness>,
}

impl Guard {
    /// Create a live guard
    pub fn new() -> Self {
        Self {
            cell: Arc::new(Liveness {
                alive: AtomicBool::new(true),
            }),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.cell.alive.load(Ordering::Acquire)
    }

    /// Mark the guard dead. Every handle issued under it becomes invalid.
    pub fn invalidate(&self) {
        self.cell.alive.store(false, Ordering::Release);
    }

    /// Issue a handle to `target` under this guard
    pub fn handle<T>(&self, target: &Arc<RwLock<T>>) -> Handle<T> {
        Handle {
            guard: Arc::clone(&self.cell),
            target: Arc::downgrade(target),
        }
    }

    /// Whether `handle` was issued under this guard
    pub fn issued<T>(&self, handle: &Handle<T>) -> bool {
        Arc::ptr_eq(&self.cell, &handle.guard)
    }
}

impl Default for Guard {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-owning reference to an object owned by a guarded owner
pub struct Handle<T> {
    guard: Arc<Liveness>,
    target: Weak<RwLock<T>>,
}

impl<T> Handle<T> {
    /// Whether the owner is still alive
    pub fn is_valid(&self) -> bool {
        self.guard.alive.load(Ordering::Acquire) && self.target.strong_count() > 0
    }

    /// Shared access to the target.
    ///
    /// Fails with [`Error::Invalidated`] once the owner is gone and with
    /// [`Error::Busy`] while the target is exclusively borrowed.
    pub fn get(&self) -> Result<HandleRef<T>> {
        self.upgrade()?
            .try_read_arc()
            .ok_or(Error::Busy(short_type_name::<T>()))
    }

    /// Exclusive access to the target
    pub fn get_mut(&self) -> Result<HandleMut<T>> {
        self.upgrade()?
            .try_write_arc()
            .ok_or(Error::Busy(short_type_name::<T>()))
    }

    /// Run `f` against the target
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let target = self.get()?;
        Ok(f(&target))
    }

    /// Run `f` against the target with exclusive access
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let mut target = self.get_mut()?;
        Ok(f(&mut target))
    }

    /// Whether both handles were issued under the same guard
    pub fn has_same_guard<U>(&self, other: &Handle<U>) -> bool {
        Arc::ptr_eq(&self.guard, &other.guard)
    }

    fn upgrade(&self) -> Result<Arc<RwLock<T>>> {
        if !self.guard.alive.load(Ordering::Acquire) {
            return Err(Error::Invalidated(short_type_name::<T>()));
        }
        self.target
            .upgrade()
            .ok_or(Error::Invalidated(short_type_name::<T>()))
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            guard: Arc::clone(&self.guard),
            target: Weak::clone(&self.target),
        }
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.target, &other.target)
    }
}

impl<T> Eq for Handle<T> {}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("target", &short_type_name::<T>())
            .field("valid", &self.is_valid())
            .finish()
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}
