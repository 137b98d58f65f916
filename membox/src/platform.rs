//! Services the spinlock borrows from the rest of the kernel: interrupt
//! masking, the scheduler lock and the identity of the current core.

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct CoreId(pub u32);

impl fmt::Debug for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "core#{}", self.0)
    }
}

impl fmt::Display for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub trait Platform: 'static {
    /// Interrupt state returned by [`Platform::int_lock`].
    type IntSave: Copy;

    /// Mask interrupts on the current core, returning the previous state.
    fn int_lock() -> Self::IntSave;
    fn int_restore(state: Self::IntSave);

    /// Disable preemption on the current core. Nests.
    fn sched_lock();
    /// Undo one [`Platform::sched_lock`]. Returns `true` if preemption is
    /// enabled again and a reschedule became due in the meantime.
    fn sched_unlock() -> bool;
    fn schedule();

    fn core_id() -> CoreId;
}

/// [`Platform`] for hosted builds, where every OS thread plays the role of a
/// core.
pub struct HostPlatform;

static NEXT_CORE: AtomicU32 = AtomicU32::new(0);

thread_local! {
    static CORE: CoreId = CoreId(NEXT_CORE.fetch_add(1, Ordering::Relaxed));
    static INT_MASKED: Cell<bool> = const { Cell::new(false) };
    static PREEMPT_DEPTH: Cell<u32> = const { Cell::new(0) };
    static RESCHED_PENDING: Cell<bool> = const { Cell::new(false) };
}

impl HostPlatform {
    /// Mark a reschedule as due on the current core. It runs when preemption
    /// is next enabled, or immediately if it is enabled now.
    pub fn request_reschedule() {
        if Self::preempt_depth() == 0 {
            Self::schedule();
        } else {
            RESCHED_PENDING.with(|p| p.set(true));
        }
    }

    pub fn preempt_depth() -> u32 {
        PREEMPT_DEPTH.with(|d| d.get())
    }

    pub fn interrupts_masked() -> bool {
        INT_MASKED.with(|m| m.get())
    }
}

impl Platform for HostPlatform {
    type IntSave = bool;

    fn int_lock() -> bool {
        INT_MASKED.with(|m| m.replace(true))
    }

    fn int_restore(state: bool) {
        INT_MASKED.with(|m| m.set(state))
    }

    fn sched_lock() {
        PREEMPT_DEPTH.with(|d| d.set(d.get() + 1))
    }

    fn sched_unlock() -> bool {
        let depth = PREEMPT_DEPTH.with(|d| {
            debug_assert!(d.get() > 0, "unbalanced sched_unlock");
            let depth = d.get().saturating_sub(1);
            d.set(depth);
            depth
        });
        depth == 0 && RESCHED_PENDING.with(|p| p.get())
    }

    fn schedule() {
        RESCHED_PENDING.with(|p| p.set(false));
        unsafe {
            libc::sched_yield();
        }
    }

    fn core_id() -> CoreId {
        CORE.with(|c| *c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_thread_is_a_distinct_core() {
        let here = HostPlatform::core_id();
        assert_eq!(here, HostPlatform::core_id());
        let there = std::thread::spawn(HostPlatform::core_id).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn interrupt_state_nests() {
        assert!(!HostPlatform::interrupts_masked());
        let outer = HostPlatform::int_lock();
        let inner = HostPlatform::int_lock();
        assert!(HostPlatform::interrupts_masked());
        HostPlatform::int_restore(inner);
        assert!(HostPlatform::interrupts_masked());
        HostPlatform::int_restore(outer);
        assert!(!HostPlatform::interrupts_masked());
    }

    #[test]
    fn pending_reschedule_fires_on_outermost_unlock() {
        HostPlatform::sched_lock();
        HostPlatform::sched_lock();
        HostPlatform::request_reschedule();
        assert!(!HostPlatform::sched_unlock());
        assert!(HostPlatform::sched_unlock());
        HostPlatform::schedule();
        assert_eq!(HostPlatform::preempt_depth(), 0);
        HostPlatform::sched_lock();
        assert!(!HostPlatform::sched_unlock());
    }
}
