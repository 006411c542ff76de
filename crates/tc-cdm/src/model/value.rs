//! Transient data values and their run-length tag assignment.
//!
//! A [`Value`] is an event parameter: `size` bytes of data, optionally the
//! bytes themselves, and optionally a per-byte provenance tag assignment
//! stored as runs of `(length, tag_id)`. Runs are the only stored form; a
//! per-byte table is produced on demand with [`TagRuns::expand`].

use crate::error::RunLengthFault;
use crate::limits::MAX_EXPANDED_TAG_LEN;
use crate::model::builder::ValueBuilder;

/// A run of consecutive bytes sharing one tag id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagRun {
    pub(crate) length: u32,
    pub(crate) tag_id: i32,
}

impl TagRun {
    pub fn new(length: u32, tag_id: i32) -> Self {
        Self { length, tag_id }
    }

    /// Number of bytes covered.
    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn tag_id(&self) -> i32 {
        self.tag_id
    }
}

/// The run-length tag assignment of one value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagRuns(pub(crate) Vec<TagRun>);

impl TagRuns {
    pub fn new(runs: Vec<TagRun>) -> Self {
        Self(runs)
    }

    /// Builds runs from the flat `(length, tag_id)*` wire form.
    pub fn from_pairs(pairs: &[i32]) -> Result<Self, RunLengthFault> {
        if pairs.len() % 2 != 0 {
            return Err(RunLengthFault::OddCount { count: pairs.len() });
        }
        let mut runs = Vec::with_capacity(pairs.len() / 2);
        for (index, pair) in pairs.chunks_exact(2).enumerate() {
            let length = u32::try_from(pair[0])
                .ok()
                .filter(|len| *len > 0)
                .ok_or(RunLengthFault::EmptyRun { index })?;
            runs.push(TagRun::new(length, pair[1]));
        }
        Ok(Self(runs))
    }

    /// Returns the flat `(length, tag_id)*` form.
    ///
    /// Only meaningful for runs that passed [`TagRuns::check`], which rejects
    /// lengths above `i32::MAX`.
    pub fn to_pairs(&self) -> Vec<i32> {
        self.0
            .iter()
            .flat_map(|run| [run.length as i32, run.tag_id])
            .collect()
    }

    pub fn runs(&self) -> &[TagRun] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of bytes covered by all runs.
    pub fn covered_bytes(&self) -> u64 {
        self.0.iter().map(|run| run.length as u64).sum()
    }

    /// Checks that every run is non-empty and the runs cover exactly `size` bytes.
    pub fn check(&self, size: u32) -> Result<(), RunLengthFault> {
        if let Some(index) = self.0.iter().position(|run| run.length == 0) {
            return Err(RunLengthFault::EmptyRun { index });
        }
        if let Some(index) = self.0.iter().position(|run| run.length > i32::MAX as u32) {
            return Err(RunLengthFault::RunTooLong { index });
        }
        let total = self.covered_bytes();
        if total != size as u64 {
            return Err(RunLengthFault::SumMismatch {
                size: size as u64,
                total,
            });
        }
        Ok(())
    }

    /// Expands to one tag id per byte, or `None` if the runs cover more than
    /// [`MAX_EXPANDED_TAG_LEN`] bytes.
    pub fn expand(&self) -> Option<Vec<i32>> {
        let total = self.covered_bytes();
        if total > MAX_EXPANDED_TAG_LEN as u64 {
            return None;
        }
        let mut tags = Vec::with_capacity(total as usize);
        for run in &self.0 {
            tags.extend(std::iter::repeat_n(run.tag_id, run.length as usize));
        }
        Some(tags)
    }

    /// Returns the tag id of the byte at `offset` without expanding.
    pub fn tag_at(&self, offset: u64) -> Option<i32> {
        let mut start = 0u64;
        for run in &self.0 {
            let end = start + run.length as u64;
            if offset < end {
                return Some(run.tag_id);
            }
            start = end;
        }
        None
    }
}

/// A decoded tag assignment in the form the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagAssignment {
    /// Compact runs, as stored.
    Runs(TagRuns),
    /// One tag id per byte.
    PerByte(Vec<i32>),
}

/// A transient datum attached to an event parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    pub(crate) size: u32,
    pub(crate) type_name: Option<String>,
    pub(crate) bytes: Option<Vec<u8>>,
    pub(crate) tag: Option<TagRuns>,
}

impl Value {
    pub fn builder() -> ValueBuilder {
        ValueBuilder::new()
    }

    /// Size of the datum in bytes.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Declared runtime type name, e.g. `char*`.
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }

    pub fn tag(&self) -> Option<&TagRuns> {
        self.tag.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pairs() {
        let runs = TagRuns::from_pairs(&[4, 0, 6, 1]).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs.covered_bytes(), 10);
        assert_eq!(runs.to_pairs(), vec![4, 0, 6, 1]);
    }

    #[test]
    fn test_from_pairs_rejects_odd_and_empty() {
        assert_eq!(
            TagRuns::from_pairs(&[4, 0, 6]),
            Err(RunLengthFault::OddCount { count: 3 })
        );
        assert_eq!(
            TagRuns::from_pairs(&[4, 0, 0, 1]),
            Err(RunLengthFault::EmptyRun { index: 1 })
        );
        assert_eq!(
            TagRuns::from_pairs(&[-2, 0]),
            Err(RunLengthFault::EmptyRun { index: 0 })
        );
    }

    #[test]
    fn test_check_sum() {
        let runs = TagRuns::from_pairs(&[4, 0, 6, 1]).unwrap();
        assert!(runs.check(10).is_ok());
        assert_eq!(
            runs.check(9),
            Err(RunLengthFault::SumMismatch { size: 9, total: 10 })
        );
        assert_eq!(
            runs.check(11),
            Err(RunLengthFault::SumMismatch { size: 11, total: 10 })
        );
    }

    #[test]
    fn test_expand_and_lookup() {
        let runs = TagRuns::from_pairs(&[2, 7, 3, 9]).unwrap();
        assert_eq!(runs.expand(), Some(vec![7, 7, 9, 9, 9]));
        assert_eq!(runs.tag_at(0), Some(7));
        assert_eq!(runs.tag_at(2), Some(9));
        assert_eq!(runs.tag_at(4), Some(9));
        assert_eq!(runs.tag_at(5), None);
    }

    #[test]
    fn test_expand_is_capped() {
        // 2 GiB of tags from four runs; only the lookup works without allocating.
        let huge = TagRuns::new(vec![TagRun::new(i32::MAX as u32, 1); 4]);
        assert!(huge.covered_bytes() > MAX_EXPANDED_TAG_LEN as u64);
        assert_eq!(huge.expand(), None);
        assert_eq!(huge.tag_at(3 * i32::MAX as u64), Some(1));
    }
}
