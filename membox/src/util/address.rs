use std::fmt;
use std::mem;
use std::ops::{Add, Sub};

/// A raw machine address. Used for range and alignment arithmetic only; memory
/// is always accessed through pointers derived from the owning region.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub(crate) usize);

impl Address {
    pub const LOG_BYTES: usize = mem::size_of::<usize>().trailing_zeros() as usize;
    pub const BYTES: usize = 1 << Self::LOG_BYTES;

    /// Round up to `align`. Saturates instead of wrapping past the end of the
    /// address space.
    #[inline(always)]
    pub const fn align_up(&self, align: usize) -> Address {
        debug_assert!(align.is_power_of_two());
        let mask = align - 1;
        match self.0.checked_add(mask) {
            Some(v) => Self(v & !mask),
            None => Self(usize::MAX & !mask),
        }
    }

    #[inline(always)]
    pub const fn is_aligned_to(&self, align: usize) -> bool {
        debug_assert!(align.is_power_of_two());
        (self.0 & (align - 1)) == 0
    }

    #[inline(always)]
    pub const fn as_usize(&self) -> usize {
        self.0
    }

    #[inline(always)]
    pub const fn as_ptr<T>(&self) -> *const T {
        self.0 as _
    }

    #[inline(always)]
    pub const fn as_mut_ptr<T>(&self) -> *mut T {
        self.0 as _
    }

    #[inline(always)]
    pub const fn wrapping_sub(self, bytes: usize) -> Self {
        Self(self.0.wrapping_sub(bytes))
    }
}

impl From<usize> for Address {
    #[inline(always)]
    fn from(value: usize) -> Self {
        Self(value)
    }
}

impl<T> From<*const T> for Address {
    #[inline(always)]
    fn from(value: *const T) -> Self {
        Self(value as usize)
    }
}

impl<T> From<*mut T> for Address {
    #[inline(always)]
    fn from(value: *mut T) -> Self {
        Self(value as usize)
    }
}

impl Add<usize> for Address {
    type Output = Self;

    #[inline(always)]
    fn add(self, other: usize) -> Self::Output {
        Self(self.0 + other)
    }
}

impl Sub<Self> for Address {
    type Output = usize;

    #[inline(always)]
    fn sub(self, other: Self) -> Self::Output {
        debug_assert!(self.0 >= other.0);
        self.0 - other.0
    }
}

impl Sub<usize> for Address {
    type Output = Self;

    #[inline(always)]
    fn sub(self, other: usize) -> Self::Output {
        Self(self.0 - other)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_ptr::<u8>())
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment() {
        assert_eq!(Address(10).align_up(4), Address(12));
        assert_eq!(Address(16).align_up(8), Address(16));
        assert!(Address(24).is_aligned_to(8));
        assert!(!Address(20).is_aligned_to(8));
        assert_eq!(Address(usize::MAX - 2).align_up(8), Address(usize::MAX & !7));
    }

    #[test]
    fn arithmetic() {
        let a = Address::from(0x1000usize);
        assert_eq!(a + 0x20, Address(0x1020));
        assert_eq!((a + 0x20) - a, 0x20);
        assert_eq!(a - 0x10usize, Address(0xff0));
        assert_eq!(Address(4).wrapping_sub(8), Address(usize::MAX - 3));
        assert_eq!(format!("{:x}", a), "1000");
    }
}
