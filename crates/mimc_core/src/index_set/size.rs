//! Size parameter bookkeeping for index-set enumeration.

/// Tracks how far the size parameter driving index-set enumeration has
/// advanced.
///
/// The current size is reset at the start of every tolerance run, while the
/// largest size ever reached persists across runs. The invariant
/// `max_reached() >= current()` holds after every mutation.
///
/// # Examples
///
/// ```
/// use mimc_core::index_set::IndexSetSize;
///
/// let mut size = IndexSetSize::new();
/// assert!(size.increment());
/// assert!(size.increment());
/// assert_eq!(size.current(), 2);
///
/// size.reset();
/// assert_eq!(size.current(), 0);
/// assert_eq!(size.max_reached(), 2);
/// assert!(!size.increment());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexSetSize {
    current: usize,
    max_reached: usize,
}

impl IndexSetSize {
    /// Creates a size tracker at zero.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current size parameter.
    #[inline]
    pub fn current(&self) -> usize {
        self.current
    }

    /// Largest size parameter ever reached.
    #[inline]
    pub fn max_reached(&self) -> usize {
        self.max_reached
    }

    /// Sets the current size; returns `true` if this is a new maximum.
    pub fn set(&mut self, size: usize) -> bool {
        self.current = size;
        if size > self.max_reached {
            self.max_reached = size;
            true
        } else {
            false
        }
    }

    /// Advances the current size by one; returns `true` if this is a new
    /// maximum.
    #[inline]
    pub fn increment(&mut self) -> bool {
        self.set(self.current + 1)
    }

    /// Resets the current size to zero, keeping the maximum.
    #[inline]
    pub fn reset(&mut self) {
        self.current = 0;
    }

    /// Forgets both the current size and the maximum.
    #[inline]
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
