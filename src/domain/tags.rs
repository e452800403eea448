use serde::{Deserialize, Serialize};

/// One classification tag: a single bit inside a [`CounterTagSet`]. Each tag
/// keys its own pair of root unread counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CounterTag(pub u32);

/// Compact bit set of classification tags, cheap to union and subtract
/// during commit-time delta computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterTagSet(u32);

impl CounterTagSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, tag: CounterTag) -> bool {
        self.0 & tag.0 != 0
    }

    pub fn with(self, tag: CounterTag) -> Self {
        Self(self.0 | tag.0)
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Iterates the contained tags in ascending bit order.
    pub fn iter(self) -> impl Iterator<Item = CounterTag> {
        (0..u32::BITS)
            .map(|bit| 1u32 << bit)
            .filter(move |mask| self.0 & mask != 0)
            .map(CounterTag)
    }
}

impl FromIterator<CounterTag> for CounterTagSet {
    fn from_iter<I: IntoIterator<Item = CounterTag>>(tags: I) -> Self {
        tags.into_iter().fold(Self::empty(), Self::with)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTACTS: CounterTag = CounterTag(1 << 0);
    const CHANNELS: CounterTag = CounterTag(1 << 1);
    const BOTS: CounterTag = CounterTag(1 << 4);

    #[test]
    fn set_operations_work_on_bits() {
        let set = CounterTagSet::empty().with(CONTACTS).with(BOTS);

        assert!(set.contains(CONTACTS));
        assert!(set.contains(BOTS));
        assert!(!set.contains(CHANNELS));
        assert!(set.without(CounterTagSet::empty().with(CONTACTS)).contains(BOTS));
        assert!(!set
            .without(CounterTagSet::empty().with(CONTACTS))
            .contains(CONTACTS));
        assert_eq!(
            set.union(CounterTagSet::empty().with(CHANNELS)).bits(),
            0b10011
        );
    }

    #[test]
    fn iteration_yields_each_tag_once_in_bit_order() {
        let set: CounterTagSet = [BOTS, CONTACTS, CHANNELS].into_iter().collect();

        let tags: Vec<CounterTag> = set.iter().collect();

        assert_eq!(tags, vec![CONTACTS, CHANNELS, BOTS]);
    }

    #[test]
    fn empty_set_iterates_nothing() {
        assert_eq!(CounterTagSet::empty().iter().count(), 0);
        assert!(CounterTagSet::empty().is_empty());
    }
}
