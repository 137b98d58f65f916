use std::fmt;

use super::Address;

pub const LOG_PAGE_BYTES: usize = 12;
pub const PAGE_BYTES: usize = 1 << LOG_PAGE_BYTES;
const PAGE_MASK: usize = PAGE_BYTES - 1;

#[derive(Debug)]
pub struct MemoryMapError;

impl fmt::Display for MemoryMapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to map anonymous memory")
    }
}

impl std::error::Error for MemoryMapError {}

pub struct RawMemory {
    _private: (),
}

impl RawMemory {
    pub fn map_anonymous(size: usize) -> Result<Address, MemoryMapError> {
        debug_assert!((size & PAGE_MASK) == 0, "mmap size is not page aligned");
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            Err(MemoryMapError)
        } else {
            Ok(ptr.into())
        }
    }

    pub fn unmap(start: Address, size: usize) {
        debug_assert!((size & PAGE_MASK) == 0, "mmap size is not page aligned");
        unsafe {
            libc::munmap(start.as_mut_ptr(), size);
        }
    }
}

/// Page-backed region, unmapped on drop.
pub struct Mapping {
    start: Address,
    size: usize,
}

impl Mapping {
    /// Map at least `bytes` bytes, rounded up to whole pages.
    pub fn new(bytes: usize) -> Result<Self, MemoryMapError> {
        let size = bytes
            .max(1)
            .checked_add(PAGE_MASK)
            .ok_or(MemoryMapError)?
            & !PAGE_MASK;
        let start = RawMemory::map_anonymous(size)?;
        Ok(Self { start, size })
    }

    pub const fn start(&self) -> Address {
        self.start
    }

    pub const fn len(&self) -> usize {
        self.size
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.start.as_mut_ptr(), self.size) }
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        RawMemory::unmap(self.start, self.size);
    }
}
