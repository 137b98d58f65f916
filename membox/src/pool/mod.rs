//! Fixed-block memory pool ("membox").
//!
//! The caller hands over a region. Its first word becomes the head of a
//! singly linked free list, and the rest is cut into equal blocks, each
//! starting with a one-word header. A free block's header links to the next
//! free block. An allocated block's header holds [`MAGIC`], which is how
//! [`MemPool::free`] tells a live block from a stray or already-freed
//! pointer.

use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::Error;
use crate::log::Console;
use crate::platform::{HostPlatform, Platform};
use crate::stat;
use crate::sync::Spinlock;
use crate::util::Address;

mod block;

pub use block::Block;

/// Header word of an allocated block. Odd, so it can never be mistaken for a
/// link to a word-aligned block.
#[cfg(target_pointer_width = "64")]
pub const MAGIC: usize = 0xa55a_5aa5_a55a_5aa5;
#[cfg(target_pointer_width = "32")]
pub const MAGIC: usize = 0xa55a_5aa5;

/// Terminates the free list.
const END: usize = 0;

#[repr(C)]
struct FreeNode {
    next: usize,
}

#[repr(C)]
struct PoolHeader {
    free_list: FreeNode,
}

pub const NODE_HEAD_SIZE: usize = mem::size_of::<FreeNode>();
pub const POOL_HEAD_SIZE: usize = mem::size_of::<PoolHeader>();

/// Size of one block holding `block_size` payload bytes: payload plus header,
/// rounded up to the word size. `None` if that does not fit in a `u32`.
pub const fn aligned_block_size(block_size: u32) -> Option<u32> {
    let mask = (Address::BYTES - 1) as u32;
    match block_size.checked_add(NODE_HEAD_SIZE as u32 + mask) {
        Some(v) => Some(v & !mask),
        None => None,
    }
}

/// Bytes a word-aligned region needs to hold `block_count` blocks of
/// `block_size` payload bytes.
pub fn required_size(block_size: u32, block_count: u32) -> Option<usize> {
    let block_size = aligned_block_size(block_size)? as usize;
    block_size
        .checked_mul(block_count as usize)?
        .checked_add(POOL_HEAD_SIZE)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub total_blocks: u32,
    pub allocated_blocks: u32,
    /// Including the block header.
    pub block_size: u32,
}

impl PoolStats {
    pub const fn free_blocks(&self) -> u32 {
        self.total_blocks - self.allocated_blocks
    }
}

pub struct MemPool<'region, P: Platform = HostPlatform> {
    header: NonNull<PoolHeader>,
    block_size: u32,
    block_count: u32,
    allocated: AtomicU32,
    lock: Spinlock<P>,
    _region: PhantomData<&'region mut [u8]>,
}

unsafe impl<P: Platform> Send for MemPool<'_, P> {}
unsafe impl<P: Platform> Sync for MemPool<'_, P> {}

impl<'region> MemPool<'region, HostPlatform> {
    /// Build a pool of `block_size`-byte blocks over `region`.
    ///
    /// The region's start is rounded up to the word size; the bytes skipped
    /// are unused. Every block header in the region is written.
    pub fn init(region: &'region mut [u8], block_size: u32) -> Result<Self, Error> {
        Self::with_platform(region, block_size)
    }
}

impl<'region, P: Platform> MemPool<'region, P> {
    /// [`MemPool::init`] for a pool locked through platform `P`.
    pub fn with_platform(region: &'region mut [u8], block_size: u32) -> Result<Self, Error> {
        if region.is_empty() {
            return Err(Error::InvalidRegion);
        }
        if block_size == 0 {
            return Err(Error::InvalidBlockSize);
        }
        let block_size = aligned_block_size(block_size).ok_or(Error::InvalidBlockSize)?;
        let start = Address::from(region.as_mut_ptr());
        let skip = start.align_up(Address::BYTES) - start;
        let usable = region
            .len()
            .checked_sub(skip + POOL_HEAD_SIZE)
            .ok_or(Error::RegionTooSmall)?;
        let block_count = (usable / block_size as usize).min(u32::MAX as usize) as u32;
        if block_count == 0 {
            return Err(Error::RegionTooSmall);
        }
        let header = NonNull::from(&mut region[skip..]).cast::<PoolHeader>();
        let pool = Self {
            header,
            block_size,
            block_count,
            allocated: AtomicU32::new(0),
            lock: Spinlock::new("membox"),
            _region: PhantomData,
        };
        pool.format();
        Ok(pool)
    }

    /// Link every block into the free list, in address order.
    fn format(&self) {
        let count = self.block_count as usize;
        unsafe {
            (*self.header.as_ptr()).free_list.next = self.block_address(0).as_usize();
            for i in 0..count {
                let next = if i + 1 < count {
                    self.block_address(i + 1).as_usize()
                } else {
                    END
                };
                (*self.node(self.block_address(i))).next = next;
            }
        }
    }

    /// Block size including the header.
    pub const fn block_size(&self) -> u32 {
        self.block_size
    }

    pub const fn payload_size(&self) -> usize {
        self.block_size as usize - NODE_HEAD_SIZE
    }

    pub const fn block_count(&self) -> u32 {
        self.block_count
    }

    pub fn alloc(&self) -> Option<Block<'_>> {
        let ptr = self.alloc_raw()?;
        Some(unsafe { Block::new(ptr, self.payload_size()) })
    }

    /// Return `block` to the pool.
    ///
    /// Fails only for a block of another pool; that block stays allocated in
    /// its own pool.
    pub fn free(&self, block: Block<'_>) -> Result<(), Error> {
        self.release(block.into_raw().as_ptr())
    }

    /// Zero the payload of `block`. Its allocation state is unchanged.
    pub fn clear(&self, block: &mut Block<'_>) {
        let _guard = self.lock.lock_irqsave();
        block.fill(0);
    }

    /// Pop the head of the free list. Returns the payload address, or `None`
    /// when every block is allocated.
    pub fn alloc_raw(&self) -> Option<NonNull<u8>> {
        let guard = self.lock.lock_irqsave();
        let head = self.header.as_ptr();
        let first = unsafe { (*head).free_list.next };
        if first == END {
            drop(guard);
            stat::track_allocation(true);
            return None;
        }
        let node = self.node(Address::from(first));
        unsafe {
            (*head).free_list.next = (*node).next;
            (*node).next = MAGIC;
        }
        self.allocated.fetch_add(1, Ordering::Relaxed);
        drop(guard);
        stat::track_allocation(false);
        NonNull::new(unsafe { node.cast::<u8>().add(NODE_HEAD_SIZE) })
    }

    /// Push the block whose payload starts at `ptr` back onto the free list.
    ///
    /// A pointer that is not the payload of an allocated block of this pool is
    /// rejected with [`Error::InvalidBlock`] and the pool is left untouched.
    ///
    /// # Safety
    ///
    /// No [`Block`] handle to the block at `ptr` may still exist. Once freed,
    /// the block can be handed out again by the next `alloc`.
    pub unsafe fn free_raw(&self, ptr: *mut u8) -> Result<(), Error> {
        self.release(ptr)
    }

    fn release(&self, ptr: *mut u8) -> Result<(), Error> {
        if ptr.is_null() {
            stat::track_free(true);
            return Err(Error::InvalidBlock);
        }
        let node = Address::from(ptr).wrapping_sub(NODE_HEAD_SIZE);
        let guard = self.lock.lock_irqsave();
        if !self.check(node) {
            drop(guard);
            stat::track_free(true);
            return Err(Error::InvalidBlock);
        }
        let head = self.header.as_ptr();
        unsafe {
            (*self.node(node)).next = (*head).free_list.next;
            (*head).free_list.next = node.as_usize();
        }
        self.allocated.fetch_sub(1, Ordering::Relaxed);
        drop(guard);
        stat::track_free(false);
        Ok(())
    }

    /// Zero the payload at `ptr`. A null `ptr` is ignored.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must be the payload of a block allocated from this
    /// pool and held by the caller. Nothing else is checked.
    pub unsafe fn clear_raw(&self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        let _guard = self.lock.lock_irqsave();
        std::ptr::write_bytes(ptr, 0, self.payload_size());
    }

    /// Whether the block header at `node` belongs to an allocated block of this
    /// pool. Does not read memory outside the pool's blocks.
    ///
    /// A pointer that lands on a block boundary whose header happens to hold
    /// [`MAGIC`] passes, whether or not the caller got it from `alloc`.
    pub fn validate(&self, node: Address) -> bool {
        let _guard = self.lock.lock_irqsave();
        self.check(node)
    }

    pub fn stats(&self) -> PoolStats {
        let _guard = self.lock.lock_irqsave();
        PoolStats {
            total_blocks: self.block_count,
            allocated_blocks: self.allocated.load(Ordering::Relaxed),
            block_size: self.block_size,
        }
    }

    /// Length of the free list. Walks the list under the lock.
    pub fn free_count(&self) -> u32 {
        let _guard = self.lock.lock_irqsave();
        let mut count = 0;
        self.walk_free_list(|_| count += 1);
        count
    }

    /// Print the pool's free list and every block header.
    pub fn dump(&self) {
        let _ = self.dump_to(&mut Console);
    }

    pub fn dump_to(&self, out: &mut impl fmt::Write) -> fmt::Result {
        let _guard = self.lock.lock_irqsave();
        writeln!(
            out,
            "membox({:?}, {:#x}, {:#x}):",
            Address::from(self.header.as_ptr()),
            self.block_size,
            self.block_count
        )?;
        writeln!(out, "free node list:")?;
        let mut result = Ok(());
        let mut index = 0;
        self.walk_free_list(|node| {
            if result.is_ok() {
                result = writeln!(out, "({}, {:?})", index, node);
            }
            index += 1;
        });
        result?;
        writeln!(out, "all node list:")?;
        for i in 0..self.block_count as usize {
            let node = self.block_address(i);
            let word = unsafe { (*self.node(node)).next };
            writeln!(out, "({}, {:?}, {:#x})", i, node, word)?;
        }
        Ok(())
    }

    #[cfg(test)]
    fn lock(&self) -> &Spinlock<P> {
        &self.lock
    }

    /// Lock must be held. Stops at the first link that is not a block of this
    /// pool, and after `block_count` nodes.
    fn walk_free_list(&self, mut f: impl FnMut(Address)) {
        let mut next = unsafe { (*self.header.as_ptr()).free_list.next };
        for _ in 0..self.block_count {
            let node = Address::from(next);
            if next == END || self.block_index(node).is_none() {
                break;
            }
            f(node);
            next = unsafe { (*self.node(node)).next };
        }
    }

    /// Lock must be held.
    fn check(&self, node: Address) -> bool {
        match self.block_index(node) {
            Some(_) => unsafe { (*self.node(node)).next == MAGIC },
            None => false,
        }
    }

    /// Index of the block starting exactly at `node`.
    fn block_index(&self, node: Address) -> Option<usize> {
        let first = self.first_block();
        if node < first {
            return None;
        }
        let offset = node - first;
        let block_size = self.block_size as usize;
        if offset % block_size != 0 || offset / block_size >= self.block_count as usize {
            return None;
        }
        Some(offset / block_size)
    }

    fn first_block(&self) -> Address {
        Address::from(self.header.as_ptr()) + POOL_HEAD_SIZE
    }

    fn block_address(&self, index: usize) -> Address {
        self.first_block() + index * self.block_size as usize
    }

    /// Header of the block at `node`, derived from the region pointer.
    fn node(&self, node: Address) -> *mut FreeNode {
        let offset = node - Address::from(self.header.as_ptr());
        self.header
            .as_ptr()
            .cast::<u8>()
            .wrapping_add(offset)
            .cast::<FreeNode>()
    }
}

impl<P: Platform> fmt::Debug for MemPool<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemPool")
            .field("region", &Address::from(self.header.as_ptr()))
            .field("block_size", &self.block_size)
            .field("block_count", &self.block_count)
            .field("allocated", &self.allocated.load(Ordering::Relaxed))
            .field("lock", &self.lock)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C, align(16))]
    struct Region<const N: usize>([u8; N]);

    impl<const N: usize> Region<N> {
        fn new() -> Self {
            Self([0; N])
        }
    }

    fn drain(pool: &MemPool) -> Vec<NonNull<u8>> {
        std::iter::from_fn(|| pool.alloc_raw()).collect()
    }

    #[test]
    fn block_size_rounds_to_word() {
        let w = Address::BYTES as u32;
        assert_eq!(aligned_block_size(1), Some(2 * w));
        assert_eq!(aligned_block_size(w), Some(2 * w));
        assert_eq!(aligned_block_size(w + 1), Some(3 * w));
        assert_eq!(aligned_block_size(u32::MAX), None);
        assert_eq!(aligned_block_size(u32::MAX - NODE_HEAD_SIZE as u32), None);
    }

    #[test]
    fn required_size_fits_exactly() {
        let size = required_size(24, 5).unwrap();
        let mut region = Region::<4096>::new();
        {
            let pool = MemPool::init(&mut region.0[..size], 24).unwrap();
            assert_eq!(pool.block_count(), 5);
        }
        let pool = MemPool::init(&mut region.0[..size - 1], 24).unwrap();
        assert_eq!(pool.block_count(), 4);
        assert_eq!(required_size(u32::MAX, 1), None);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn sixty_four_byte_region_holds_three_blocks() {
        let mut region = Region::<64>::new();
        let pool = MemPool::init(&mut region.0, 8).unwrap();
        assert_eq!(
            pool.stats(),
            PoolStats {
                total_blocks: 3,
                allocated_blocks: 0,
                block_size: 16,
            }
        );
        assert_eq!(pool.payload_size(), 8);
        let blocks = drain(&pool);
        assert_eq!(blocks.len(), 3);
        assert!(pool.alloc_raw().is_none());
        assert_eq!(pool.stats().allocated_blocks, 3);
    }

    #[test]
    fn init_rejects_bad_arguments() {
        let mut empty: [u8; 0] = [];
        assert_eq!(MemPool::init(&mut empty, 8).unwrap_err(), Error::InvalidRegion);
        let mut region = Region::<64>::new();
        assert_eq!(
            MemPool::init(&mut region.0, 0).unwrap_err(),
            Error::InvalidBlockSize
        );
        assert_eq!(
            MemPool::init(&mut region.0, u32::MAX).unwrap_err(),
            Error::InvalidBlockSize
        );
        assert_eq!(
            MemPool::init(&mut region.0[..4], 8).unwrap_err(),
            Error::RegionTooSmall
        );
        assert_eq!(
            MemPool::init(&mut region.0, 64).unwrap_err(),
            Error::RegionTooSmall
        );
    }

    #[test]
    fn unaligned_region_is_rounded_up() {
        let mut region = Region::<256>::new();
        let pool = MemPool::init(&mut region.0[1..], 8).unwrap();
        let block_size = aligned_block_size(8).unwrap() as usize;
        let expected = (256 - Address::BYTES - POOL_HEAD_SIZE) / block_size;
        assert_eq!(pool.block_count() as usize, expected);
        let p = pool.alloc_raw().unwrap();
        assert!(Address::from(p.as_ptr()).is_aligned_to(Address::BYTES));
    }

    #[test]
    fn blocks_are_distinct_and_in_bounds() {
        let mut region = Region::<1024>::new();
        let start = Address::from(region.0.as_ptr());
        let pool = MemPool::init(&mut region.0, 20).unwrap();
        let mut blocks = drain(&pool);
        assert_eq!(blocks.len(), pool.block_count() as usize);
        blocks.sort();
        for pair in blocks.windows(2) {
            let gap = Address::from(pair[1].as_ptr()) - Address::from(pair[0].as_ptr());
            assert!(gap >= pool.block_size() as usize);
        }
        let last = Address::from(blocks[blocks.len() - 1].as_ptr());
        assert!(last + pool.payload_size() <= start + 1024);
    }

    #[test]
    fn freed_block_is_reused_first() {
        let mut region = Region::<256>::new();
        let pool = MemPool::init(&mut region.0, 8).unwrap();
        let a = pool.alloc_raw().unwrap();
        let b = pool.alloc_raw().unwrap();
        assert_ne!(a, b);
        unsafe { pool.free_raw(a.as_ptr()) }.unwrap();
        assert_eq!(pool.alloc_raw(), Some(a));
        unsafe { pool.free_raw(b.as_ptr()) }.unwrap();
        unsafe { pool.free_raw(a.as_ptr()) }.unwrap();
        assert_eq!(pool.alloc_raw(), Some(a));
        assert_eq!(pool.alloc_raw(), Some(b));
    }

    #[test]
    fn double_free_is_rejected() {
        let mut region = Region::<64>::new();
        let pool = MemPool::init(&mut region.0, 8).unwrap();
        let p = pool.alloc_raw().unwrap();
        let _q = pool.alloc_raw().unwrap();
        unsafe { pool.free_raw(p.as_ptr()) }.unwrap();
        let before = pool.stats();
        assert_eq!(unsafe { pool.free_raw(p.as_ptr()) }, Err(Error::InvalidBlock));
        assert_eq!(pool.stats(), before);
        assert_eq!(pool.free_count(), before.free_blocks());
    }

    #[test]
    fn foreign_pointers_are_rejected() {
        let mut region = Region::<512>::new();
        let pool = MemPool::init(&mut region.0, 16).unwrap();
        let p = pool.alloc_raw().unwrap();
        let before = pool.stats();
        let mut outside = [0u8; 64];
        let inside = p.as_ptr();
        let bad = [
            std::ptr::null_mut(),
            inside.wrapping_add(1),
            inside.wrapping_sub(1),
            inside.wrapping_add(pool.block_size() as usize * pool.block_count() as usize),
            outside.as_mut_ptr().wrapping_add(NODE_HEAD_SIZE),
            1 as *mut u8,
        ];
        for ptr in bad {
            assert_eq!(unsafe { pool.free_raw(ptr) }, Err(Error::InvalidBlock), "{:?}", ptr);
        }
        assert_eq!(pool.stats(), before);
        assert_eq!(pool.free_count(), before.free_blocks());
        unsafe { pool.free_raw(inside) }.unwrap();
    }

    #[test]
    fn free_block_header_never_validates() {
        let mut region = Region::<256>::new();
        let pool = MemPool::init(&mut region.0, 8).unwrap();
        let p = pool.alloc_raw().unwrap();
        let node = Address::from(p.as_ptr()) - NODE_HEAD_SIZE;
        assert!(pool.validate(node));
        assert!(!pool.validate(node + pool.block_size() as usize));
        unsafe { pool.free_raw(p.as_ptr()) }.unwrap();
        assert!(!pool.validate(node));
    }

    #[test]
    fn handles_free_once() {
        let mut region = Region::<256>::new();
        let pool = MemPool::init(&mut region.0, 32).unwrap();
        let mut block = pool.alloc().unwrap();
        assert_eq!(block.len(), pool.payload_size());
        block.copy_from_slice(&[0x5a; 32]);
        pool.free(block).unwrap();
        assert_eq!(pool.stats().allocated_blocks, 0);
    }

    #[test]
    fn live_handles_never_alias() {
        let mut region = Region::<256>::new();
        let pool = MemPool::init(&mut region.0, 16).unwrap();
        let mut a = pool.alloc().unwrap();
        let reused = {
            let b = pool.alloc().unwrap();
            let addr = b.as_ptr();
            pool.free(b).unwrap();
            addr
        };
        let mut b = pool.alloc().unwrap();
        assert_eq!(b.as_ptr(), reused);
        assert_ne!(a.as_ptr(), b.as_ptr());
        a.fill(0x11);
        b.fill(0x22);
        assert!(a.iter().all(|x| *x == 0x11));
        assert!(b.iter().all(|x| *x == 0x22));
        pool.free(a).unwrap();
        pool.free(b).unwrap();
        assert_eq!(pool.stats().allocated_blocks, 0);
    }

    #[test]
    fn free_rejects_block_of_another_pool() {
        let mut a = Region::<256>::new();
        let mut b = Region::<256>::new();
        let pa = MemPool::init(&mut a.0, 8).unwrap();
        let pb = MemPool::init(&mut b.0, 8).unwrap();
        let block = pa.alloc().unwrap();
        assert_eq!(pb.free(block), Err(Error::InvalidBlock));
        assert_eq!(pa.stats().allocated_blocks, 1);
        assert_eq!(pb.stats().allocated_blocks, 0);
    }

    #[test]
    fn raw_round_trip_through_handle() {
        let mut region = Region::<256>::new();
        let pool = MemPool::init(&mut region.0, 8).unwrap();
        let block = pool.alloc().unwrap();
        let raw = block.into_raw();
        let block = unsafe { Block::from_raw(&pool, raw) };
        assert_eq!(block.as_ptr(), raw.as_ptr());
        assert_eq!(block.len(), pool.payload_size());
        pool.free(block).unwrap();
    }

    #[test]
    fn clear_zeroes_payload_only() {
        let mut region = Region::<256>::new();
        let pool = MemPool::init(&mut region.0, 24).unwrap();
        let mut a = pool.alloc().unwrap();
        let b = pool.alloc().unwrap();
        a.fill(0xab);
        pool.clear(&mut a);
        assert!(a.iter().all(|x| *x == 0));
        assert_eq!(pool.stats().allocated_blocks, 2);
        pool.free(b).unwrap();
        pool.free(a).unwrap();
        assert_eq!(pool.free_count(), pool.block_count());
    }

    #[test]
    fn clear_raw_zeroes_payload() {
        let mut region = Region::<256>::new();
        let pool = MemPool::init(&mut region.0, 24).unwrap();
        let p = pool.alloc_raw().unwrap();
        unsafe {
            std::ptr::write_bytes(p.as_ptr(), 0xcd, pool.payload_size());
            pool.clear_raw(p.as_ptr());
            pool.clear_raw(std::ptr::null_mut());
            let payload = std::slice::from_raw_parts(p.as_ptr(), pool.payload_size());
            assert!(payload.iter().all(|x| *x == 0));
        }
        assert!(pool.validate(Address::from(p.as_ptr()) - NODE_HEAD_SIZE));
        unsafe { pool.free_raw(p.as_ptr()) }.unwrap();
    }

    #[test]
    fn allocated_plus_free_is_constant() {
        let mut region = Region::<2048>::new();
        let pool = MemPool::init(&mut region.0, 40).unwrap();
        let total = pool.block_count();
        let mut live = Vec::new();
        let mut seed = 0x2545_f491_u32;
        for _ in 0..500 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            if seed % 3 != 0 {
                if let Some(b) = pool.alloc() {
                    live.push(b);
                }
            } else if !live.is_empty() {
                let b = live.swap_remove(seed as usize % live.len());
                pool.free(b).unwrap();
            }
            let stats = pool.stats();
            assert_eq!(stats.allocated_blocks as usize, live.len());
            assert_eq!(stats.allocated_blocks + pool.free_count(), total);
        }
    }

    #[test]
    fn payload_writes_do_not_disturb_neighbours() {
        let mut region = Region::<512>::new();
        let pool = MemPool::init(&mut region.0, 16).unwrap();
        let mut blocks: Vec<_> = std::iter::from_fn(|| pool.alloc()).collect();
        for b in blocks.iter_mut() {
            b.fill(0xff);
        }
        for b in blocks {
            pool.free(b).unwrap();
        }
        assert_eq!(pool.free_count(), pool.block_count());
    }

    #[test]
    fn dump_lists_free_and_all_nodes() {
        let mut region = Region::<256>::new();
        let pool = MemPool::init(&mut region.0, 8).unwrap();
        let count = pool.block_count() as usize;
        let _a = pool.alloc().unwrap();
        let mut out = String::new();
        pool.dump_to(&mut out).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("membox(0x"));
        assert!(lines[0].ends_with(&format!(
            ", {:#x}, {:#x}):",
            pool.block_size(),
            count
        )));
        assert_eq!(lines[1], "free node list:");
        assert_eq!(lines[2 + count - 1], "all node list:");
        assert_eq!(lines.len(), 2 + (count - 1) + 1 + count);
        assert!(lines[2 + count].ends_with(&format!("{:#x})", MAGIC)));
        assert!(lines[lines.len() - 1].ends_with(", 0x0)"));
    }

    #[test]
    fn lock_is_released_after_every_operation() {
        let mut region = Region::<128>::new();
        let pool = MemPool::init(&mut region.0, 8).unwrap();
        let p = pool.alloc_raw().unwrap();
        assert!(!pool.lock().held());
        assert!(unsafe { pool.free_raw(p.as_ptr().wrapping_add(1)) }.is_err());
        assert!(!pool.lock().held());
        unsafe { pool.free_raw(p.as_ptr()) }.unwrap();
        drain(&pool);
        assert!(pool.alloc_raw().is_none());
        assert!(!pool.lock().held());
        assert_eq!(HostPlatform::preempt_depth(), 0);
        assert!(!HostPlatform::interrupts_masked());
    }
}
