use std::fmt;

/// Fixed-capacity ring buffer that overwrites its oldest element when full
///
/// Storage is an inline array, so pushing never allocates. `N` must be a power of two.
pub(crate) struct FixedRing<T, const N: usize> {
    /// Slots addressed relative to `head`
    buffer: [Option<T>; N],
    /// Index of the oldest element
    head: usize,
    /// Number of occupied slots, starting at `head`
    len: usize,
}

impl<T, const N: usize> FixedRing<T, N> {
    const MASK: usize = {
        assert!(N.is_power_of_two(), "ring capacity must be a power of two");
        N - 1
    };

    pub(crate) fn new() -> Self {
        Self {
            buffer: std::array::from_fn(|_| None),
            head: 0,
            len: 0,
        }
    }

    /// Buffer index of the element `step` positions after the oldest one
    fn index(&self, step: usize) -> usize {
        (self.head + step) & Self::MASK
    }

    /// Append `value`, returning the oldest element if it had to make room
    pub(crate) fn push(&mut self, value: T) -> Option<T> {
        if self.len == N {
            let displaced = self.buffer[self.head].replace(value);
            self.head = self.index(1);
            return displaced;
        }
        let index = self.index(self.len);
        self.buffer[index] = Some(value);
        self.len += 1;
        None
    }

    /// Remove and return the oldest element
    pub(crate) fn pop_front(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let value = self.buffer[self.head].take();
        self.head = self.index(1);
        self.len -= 1;
        value
    }

    /// Remove every element matching `predicate`
    ///
    /// Removed elements are returned oldest first; the remaining ones keep their relative order.
    pub(crate) fn remove_where(&mut self, mut predicate: impl FnMut(&T) -> bool) -> Self {
        let mut removed = Self::new();
        let mut kept = 0;
        for step in 0..self.len {
            let index = self.index(step);
            let Some(value) = self.buffer[index].take() else {
                continue;
            };
            if predicate(&value) {
                removed.push(value);
            } else {
                // `kept <= step`, so the destination slot has already been emptied
                let dest = self.index(kept);
                self.buffer[dest] = Some(value);
                kept += 1;
            }
        }
        self.len = kept;
        removed
    }

    /// Iterate over the elements, oldest first
    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.len).filter_map(move |step| self.buffer[self.index(step)].as_ref())
    }

    pub(crate) fn clear(&mut self) {
        for slot in self.buffer.iter_mut() {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn is_full(&self) -> bool {
        self.len == N
    }
}

impl<T, const N: usize> Default for FixedRing<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug, const N: usize> fmt::Debug for FixedRing<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T, const N: usize> IntoIterator for FixedRing<T, N> {
    type Item = T;
    type IntoIter = IntoIter<T, N>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter(self)
    }
}

/// Owning iterator over a [`FixedRing`], oldest first
pub(crate) struct IntoIter<T, const N: usize>(FixedRing<T, N>);

impl<T, const N: usize> Iterator for IntoIter<T, N> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.0.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.0.len, Some(self.0.len))
    }
}

impl<T, const N: usize> ExactSizeIterator for IntoIter<T, N> {}
