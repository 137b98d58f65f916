use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The region is empty.
    InvalidRegion,
    /// The requested block size is zero, or too large once the header is added.
    InvalidBlockSize,
    /// The region cannot hold the pool header plus a single block.
    RegionTooSmall,
    /// The pointer is outside the pool, not on a block boundary, or not
    /// currently allocated.
    InvalidBlock,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::InvalidRegion => "invalid memory region",
            Error::InvalidBlockSize => "invalid block size",
            Error::RegionTooSmall => "region too small for a single block",
            Error::InvalidBlock => "invalid or unallocated block",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for Error {}
