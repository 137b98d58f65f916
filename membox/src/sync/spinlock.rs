use std::fmt;
use std::hint::spin_loop;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};

use atomic::Atomic;

use crate::platform::{CoreId, HostPlatform, Platform};

const UNLOCKED: usize = 0;
const LOCKED: usize = 1;

/// Busy-waiting lock for short critical sections shared between cores.
///
/// Holding the lock keeps preemption disabled on the owning core, so the owner
/// can never be switched out in favour of a task that then spins on the same
/// lock. Use [`Spinlock::lock_irqsave`] when the section is also entered from
/// interrupt handlers.
///
/// Acquiring a lock the current core already holds deadlocks. With the
/// `lockdep` feature it panics instead.
pub struct Spinlock<P: Platform = HostPlatform> {
    raw: AtomicUsize,
    owner: Atomic<Option<CoreId>>,
    name: &'static str,
    phantom: PhantomData<fn() -> P>,
}

impl<P: Platform> Spinlock<P> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            raw: AtomicUsize::new(UNLOCKED),
            owner: Atomic::new(None),
            name,
            phantom: PhantomData,
        }
    }

    /// Reset to the unlocked state.
    pub fn init(&mut self) {
        *self.raw.get_mut() = UNLOCKED;
        self.owner = Atomic::new(None);
    }

    pub fn lock(&self) -> SpinGuard<'_, P> {
        P::sched_lock();
        self.acquire();
        SpinGuard::new(self, None)
    }

    pub fn try_lock(&self) -> Option<SpinGuard<'_, P>> {
        P::sched_lock();
        if self
            .raw
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            if P::sched_unlock() {
                P::schedule();
            }
            return None;
        }
        self.owner.store(Some(P::core_id()), Ordering::Relaxed);
        Some(SpinGuard::new(self, None))
    }

    /// Mask interrupts, then [`lock`](Self::lock). The saved interrupt state is
    /// restored when the guard is dropped, after the lock is released.
    pub fn lock_irqsave(&self) -> SpinGuard<'_, P> {
        let int_save = P::int_lock();
        P::sched_lock();
        self.acquire();
        SpinGuard::new(self, Some(int_save))
    }

    /// Release the lock held by `guard`. Same as dropping it.
    pub fn unlock(guard: SpinGuard<'_, P>) {
        drop(guard);
    }

    /// Advisory only. The answer may be stale by the time it is returned.
    pub fn held(&self) -> bool {
        self.raw.load(Ordering::Relaxed) != UNLOCKED
    }

    pub fn owner(&self) -> Option<CoreId> {
        self.owner.load(Ordering::Relaxed)
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    fn acquire(&self) {
        if cfg!(feature = "lockdep") {
            let me = P::core_id();
            if self.owner.load(Ordering::Relaxed) == Some(me) {
                panic!("spinlock `{}` acquired recursively on {:?}", self.name, me);
            }
        }
        while self.raw.swap(LOCKED, Ordering::Acquire) != UNLOCKED {
            while self.raw.load(Ordering::Relaxed) != UNLOCKED {
                spin_loop();
            }
        }
        self.owner.store(Some(P::core_id()), Ordering::Relaxed);
    }

    fn release(&self) {
        if cfg!(feature = "lockdep") {
            let me = P::core_id();
            let owner = self.owner.load(Ordering::Relaxed);
            if owner != Some(me) {
                panic!(
                    "spinlock `{}` released on {:?}, owned by {:?}",
                    self.name, me, owner
                );
            }
        }
        self.owner.store(None, Ordering::Relaxed);
        self.raw.store(UNLOCKED, Ordering::Release);
        if P::sched_unlock() {
            P::schedule();
        }
    }
}

impl<P: Platform> fmt::Debug for Spinlock<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spinlock")
            .field("name", &self.name)
            .field("held", &self.held())
            .field("owner", &self.owner())
            .finish()
    }
}

/// Proof that a [`Spinlock`] is held. Dropping it unlocks.
#[must_use = "dropping the guard releases the lock immediately"]
pub struct SpinGuard<'a, P: Platform = HostPlatform> {
    lock: &'a Spinlock<P>,
    int_save: Option<P::IntSave>,
    // Must be released on the core that took it.
    _not_send: PhantomData<*const ()>,
}

impl<'a, P: Platform> SpinGuard<'a, P> {
    fn new(lock: &'a Spinlock<P>, int_save: Option<P::IntSave>) -> Self {
        Self {
            lock,
            int_save,
            _not_send: PhantomData,
        }
    }
}

impl<P: Platform> Drop for SpinGuard<'_, P> {
    fn drop(&mut self) {
        self.lock.release();
        if let Some(state) = self.int_save.take() {
            P::int_restore(state);
        }
    }
}
