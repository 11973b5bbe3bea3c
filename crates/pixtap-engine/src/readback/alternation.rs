/// Which of the two transfer buffers plays which role this tick.
///
/// Invariant: `next_index == 1 - index`. `advance` toggles `index` exactly once
/// and must run before any buffer is touched in a tick.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Alternation {
    index: usize,
    next_index: usize,
}

impl Alternation {
    pub const fn new() -> Self {
        Self { index: 0, next_index: 1 }
    }

    /// Swaps the roles of the two buffers.
    #[inline]
    pub fn advance(&mut self) {
        self.index = (self.index + 1) % 2;
        self.next_index = (self.index + 1) % 2;
    }

    /// Slot read back to the host this tick (populated on the previous tick).
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Slot receiving this tick's render target copy.
    #[inline]
    pub fn next_index(&self) -> usize {
        self.next_index
    }
}

impl Default for Alternation {
    fn default() -> Self {
        Self::new()
    }
}
