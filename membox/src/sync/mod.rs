mod spinlock;

pub use spinlock::*;
