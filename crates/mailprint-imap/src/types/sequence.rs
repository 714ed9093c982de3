//! Compact sequence sets.

use super::SeqNum;

/// Ordered, deduplicated set of sequence numbers.
///
/// Numbers are kept as sorted, non-adjacent inclusive ranges, so the wire
/// form stays short however the set was built: inserting 1, 3, 2, 7 renders
/// as `1:3,7`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceSet {
    ranges: Vec<(u32, u32)>,
}

impl SequenceSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { ranges: Vec::new() }
    }

    /// Adds a sequence number. Returns false if it was already present.
    pub fn insert(&mut self, seq: SeqNum) -> bool {
        let n = seq.get();
        let idx = self.ranges.partition_point(|&(_, end)| end < n);

        if idx < self.ranges.len() && self.ranges[idx].0 <= n {
            return false;
        }

        let joins_prev = idx > 0 && self.ranges[idx - 1].1 + 1 == n;
        let joins_next = idx < self.ranges.len() && self.ranges[idx].0 - 1 == n;

        match (joins_prev, joins_next) {
            (true, true) => {
                self.ranges[idx - 1].1 = self.ranges[idx].1;
                self.ranges.remove(idx);
            }
            (true, false) => self.ranges[idx - 1].1 = n,
            (false, true) => self.ranges[idx].0 = n,
            (false, false) => self.ranges.insert(idx, (n, n)),
        }
        true
    }

    /// Returns true if `seq` is in the set.
    #[must_use]
    pub fn contains(&self, seq: SeqNum) -> bool {
        let n = seq.get();
        let idx = self.ranges.partition_point(|&(_, end)| end < n);
        idx < self.ranges.len() && self.ranges[idx].0 <= n
    }

    /// Returns the number of sequence numbers in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges
            .iter()
            .map(|&(start, end)| (end - start) as usize + 1)
            .sum()
    }

    /// Returns true if the set holds no numbers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Iterates the numbers in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = SeqNum> + '_ {
        self.ranges
            .iter()
            .flat_map(|&(start, end)| (start..=end).filter_map(SeqNum::new))
    }
}

impl FromIterator<SeqNum> for SequenceSet {
    fn from_iter<I: IntoIterator<Item = SeqNum>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl Extend<SeqNum> for SequenceSet {
    fn extend<I: IntoIterator<Item = SeqNum>>(&mut self, iter: I) {
        for seq in iter {
            self.insert(seq);
        }
    }
}

impl std::fmt::Display for SequenceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, &(start, end)) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            if start == end {
                write!(f, "{start}")?;
            } else {
                write!(f, "{start}:{end}")?;
            }
        }
        Ok(())
    }
}
