use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::slice;

use crate::platform::Platform;

use super::MemPool;

/// A checked-out block's payload.
///
/// The handle is the only way to reach the payload, and [`MemPool::free`]
/// consumes it, so a block cannot be freed twice through handles. Dropping a
/// handle without freeing it leaks the block for the lifetime of the pool.
///
/// A freed handle is gone:
///
/// ```compile_fail,E0382
/// let mut region = [0u8; 256];
/// let pool = membox::MemPool::init(&mut region, 16).unwrap();
/// let block = pool.alloc().unwrap();
/// pool.free(block).unwrap();
/// pool.free(block).unwrap();
/// ```
///
/// and freeing by address needs `unsafe`, since a handle may still be live:
///
/// ```compile_fail,E0133
/// let mut region = [0u8; 256];
/// let pool = membox::MemPool::init(&mut region, 16).unwrap();
/// let block = pool.alloc().unwrap();
/// pool.free_raw(block.as_ptr() as *mut u8).unwrap();
/// ```
#[must_use = "dropping a block leaks it until the pool is discarded"]
pub struct Block<'pool> {
    ptr: NonNull<u8>,
    len: usize,
    _pool: PhantomData<&'pool mut [u8]>,
}

unsafe impl Send for Block<'_> {}
unsafe impl Sync for Block<'_> {}

impl<'pool> Block<'pool> {
    pub(super) unsafe fn new(ptr: NonNull<u8>, len: usize) -> Self {
        Self {
            ptr,
            len,
            _pool: PhantomData,
        }
    }

    /// Rebuild a handle from a pointer produced by [`Block::into_raw`] or
    /// [`MemPool::alloc_raw`].
    ///
    /// # Safety
    ///
    /// `ptr` must be the payload of a block currently allocated from `pool`,
    /// and no other handle to that block may exist.
    pub unsafe fn from_raw<P: Platform>(pool: &'pool MemPool<'_, P>, ptr: NonNull<u8>) -> Self {
        Self::new(ptr, pool.payload_size())
    }

    pub fn into_raw(self) -> NonNull<u8> {
        self.ptr
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

impl Deref for Block<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for Block<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl fmt::Debug for Block<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}
