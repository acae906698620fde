//! The [`CompressedPair`] container.

use std::mem;

/// Whether a slot of type `T` is elided from a pair's layout.
///
/// A type is elided when it is zero-sized: it carries no state, so there is
/// nothing to store.
pub const fn is_elided<T>() -> bool {
    mem::size_of::<T>() == 0
}

/// Two logical slots, `first: F` and `second: S`.
///
/// A zero-sized slot contributes nothing to `size_of::<CompressedPair<F, S>>()`,
/// so a pointer paired with a stateless companion is exactly pointer-sized.
/// Observable semantics match a plain two-field aggregate.
///
/// ```
/// use holdfast_pair::CompressedPair;
///
/// #[derive(Default)]
/// struct Stateless;
///
/// let pair = CompressedPair::new(7u64, Stateless);
/// assert_eq!(*pair.first(), 7);
/// assert_eq!(std::mem::size_of_val(&pair), std::mem::size_of::<u64>());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CompressedPair<F, S> {
    first: F,
    second: S,
}

impl<F, S> CompressedPair<F, S> {
    /// Build a pair from its two slots.
    #[inline]
    pub const fn new(first: F, second: S) -> Self {
        Self { first, second }
    }

    /// The first slot.
    #[inline]
    pub fn first(&self) -> &F {
        &self.first
    }

    /// The first slot, mutably.
    #[inline]
    pub fn first_mut(&mut self) -> &mut F {
        &mut self.first
    }

    /// The second slot.
    #[inline]
    pub fn second(&self) -> &S {
        &self.second
    }

    /// The second slot, mutably.
    #[inline]
    pub fn second_mut(&mut self) -> &mut S {
        &mut self.second
    }

    /// Borrow both slots mutably at once.
    #[inline]
    pub fn split_mut(&mut self) -> (&mut F, &mut S) {
        (&mut self.first, &mut self.second)
    }

    /// Consume the pair, returning both slots.
    #[inline]
    pub fn into_parts(self) -> (F, S) {
        (self.first, self.second)
    }

    /// Whether the first slot takes no space.
    pub const fn first_is_elided() -> bool {
        is_elided::<F>()
    }

    /// Whether the second slot takes no space.
    pub const fn second_is_elided() -> bool {
        is_elided::<S>()
    }
}

impl<F, S> From<(F, S)> for CompressedPair<F, S> {
    fn from((first, second): (F, S)) -> Self {
        Self::new(first, second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    struct Empty;

    #[derive(Clone, Debug, Default, PartialEq, Eq)]
    struct Tagged {
        tag: u32,
    }

    #[test]
    fn empty_second_adds_no_size() {
        assert_eq!(size_of::<CompressedPair<u64, Empty>>(), size_of::<u64>());
        assert_eq!(size_of::<CompressedPair<*mut u8, Empty>>(), size_of::<*mut u8>());
        assert!(CompressedPair::<u64, Empty>::second_is_elided());
        assert!(!CompressedPair::<u64, Empty>::first_is_elided());
    }

    #[test]
    fn empty_first_adds_no_size() {
        assert_eq!(size_of::<CompressedPair<Empty, u32>>(), size_of::<u32>());
        assert!(CompressedPair::<Empty, u32>::first_is_elided());
    }

    #[test]
    fn two_empty_slots_take_nothing() {
        assert_eq!(size_of::<CompressedPair<Empty, ()>>(), 0);
    }

    #[test]
    fn two_stateful_slots_take_at_least_their_sum() {
        let size = size_of::<CompressedPair<u64, Tagged>>();
        assert!(size >= size_of::<u64>() + size_of::<Tagged>());
        assert_eq!(size % align_of::<u64>(), 0);
    }

    #[test]
    fn accessors_reach_both_layouts() {
        let mut folded = CompressedPair::new(String::from("a"), Empty);
        folded.first_mut().push('b');
        assert_eq!(folded.first(), "ab");
        assert_eq!(*folded.second(), Empty);

        let mut inline = CompressedPair::new(1u8, Tagged { tag: 3 });
        inline.second_mut().tag += 1;
        *inline.first_mut() += 1;
        assert_eq!(*inline.first(), 2);
        assert_eq!(inline.second().tag, 4);
    }

    #[test]
    fn default_builds_both_slots() {
        let pair: CompressedPair<u32, Tagged> = CompressedPair::default();
        assert_eq!(*pair.first(), 0);
        assert_eq!(pair.second().tag, 0);
    }

    #[test]
    fn split_mut_and_into_parts() {
        let mut pair = CompressedPair::from((vec![1, 2], Tagged { tag: 9 }));
        {
            let (v, t) = pair.split_mut();
            v.push(t.tag);
        }
        let (v, t) = pair.into_parts();
        assert_eq!(v, vec![1, 2, 9]);
        assert_eq!(t.tag, 9);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn behaves_like_a_tuple(a in any::<i64>(), b in any::<u16>(), c in any::<i64>()) {
                let mut pair = CompressedPair::new(a, b);
                *pair.first_mut() = pair.first().wrapping_add(c);
                prop_assert_eq!(pair.into_parts(), (a.wrapping_add(c), b));
            }
        }
    }
}
