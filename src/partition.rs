use crate::error::{BenchError, BenchResult};

use std::ops::Range;

/// Contiguous, equal sized block distribution of `total_len` elements over `num_pes` PEs.
///
/// PE `k` owns indices `[k * local_len, (k + 1) * local_len)`. The total length must be
/// evenly divisible by the number of PEs; anything else is a configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockedPartition {
    total_len: usize,
    num_pes: usize,
    local_len: usize,
}

impl BlockedPartition {
    pub fn new(total_len: usize, num_pes: usize) -> BenchResult<BlockedPartition> {
        if num_pes == 0 {
            return Err(BenchError::Config(
                "number of processes must be at least 1".to_owned(),
            ));
        }
        if total_len % num_pes != 0 {
            return Err(BenchError::Indivisible {
                array_size: total_len,
                num_pes,
            });
        }
        Ok(BlockedPartition {
            total_len,
            num_pes,
            local_len: total_len / num_pes,
        })
    }

    pub fn total_len(&self) -> usize {
        self.total_len
    }

    pub fn num_pes(&self) -> usize {
        self.num_pes
    }

    pub fn local_len(&self) -> usize {
        self.local_len
    }

    /// The global index range owned by `pe`.
    pub fn range(&self, pe: usize) -> Range<usize> {
        assert!(pe < self.num_pes, "invalid pe: {:?}", pe);
        let start = pe * self.local_len;
        start..start + self.local_len
    }

    /// The PE owning global index `index`, if it is in bounds.
    pub fn pe_for_index(&self, index: usize) -> Option<usize> {
        if index >= self.total_len {
            None
        } else {
            Some(index / self.local_len)
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, Range<usize>)> + '_ {
        (0..self.num_pes).map(move |pe| (pe, self.range(pe)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eight_over_two() {
        let part = BlockedPartition::new(8, 2).unwrap();
        assert_eq!(part.local_len(), 4);
        assert_eq!(part.range(0), 0..4);
        assert_eq!(part.range(1), 4..8);
        assert_eq!(part.pe_for_index(3), Some(0));
        assert_eq!(part.pe_for_index(4), Some(1));
        assert_eq!(part.pe_for_index(8), None);
    }

    #[test]
    fn covers_every_index_once() {
        for (len, pes) in [(0, 1), (0, 4), (12, 1), (12, 3), (12, 4), (12, 12), (96, 8)] {
            let part = BlockedPartition::new(len, pes).unwrap();
            assert_eq!(part.local_len() * pes, len);
            let mut seen = vec![0usize; len];
            let mut next = 0;
            for (pe, range) in part.iter() {
                assert_eq!(range.start, next, "gap or overlap before pe {}", pe);
                next = range.end;
                for i in range {
                    seen[i] += 1;
                    assert_eq!(part.pe_for_index(i), Some(pe));
                }
            }
            assert_eq!(next, len);
            assert!(seen.iter().all(|&c| c == 1));
        }
    }

    #[test]
    fn indivisible_is_rejected() {
        match BlockedPartition::new(10, 3) {
            Err(BenchError::Indivisible {
                array_size: 10,
                num_pes: 3,
            }) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert!(BlockedPartition::new(10, 0).is_err());
    }
}
