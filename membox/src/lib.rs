//! Static memory boxes: a fixed-block-size pool carved out of a caller-supplied
//! region, and the SMP spinlock that serializes it.
//!
//! ```text
//! [ free-list head ][ block 0 ][ block 1 ] ... [ block N-1 ]
//! block i: [ header word ][ payload ]
//! ```

#[cfg(not(any(target_pointer_width = "32", target_pointer_width = "64")))]
compile_error!("membox supports 32-bit and 64-bit targets only");

#[macro_use]
pub mod log;
pub mod platform;
pub mod pool;
pub mod stat;
pub mod sync;
pub mod util;

mod error;

pub use error::Error;
pub use platform::{CoreId, HostPlatform, Platform};
pub use pool::{Block, MemPool, PoolStats};
pub use sync::{SpinGuard, Spinlock};
