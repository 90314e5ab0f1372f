//! Row partitioning of the world across ranks.

use ringlife_core::error::{Result, RingLifeError};
use ringlife_core::Rank;

/// Rows owned by one rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowPartition {
    /// Owning rank.
    pub rank: Rank,
    /// Number of real rows owned.
    pub local_rows: usize,
    /// Global index (0-based) of the first owned row.
    pub start: usize,
}

impl RowPartition {
    /// Compute the partition owned by `rank` when `rows` are split across
    /// `workers` ranks.
    ///
    /// The first `rows % workers` ranks get one extra row. Fails if any rank
    /// would end up with zero rows.
    pub fn for_rank(rows: usize, workers: usize, rank: Rank) -> Result<Self> {
        if workers == 0 {
            return Err(RingLifeError::Config(
                "worker count must be at least 1".to_string(),
            ));
        }
        if rows < workers {
            return Err(RingLifeError::Config(format!(
                "{} rows cannot be split across {} workers without empty partitions",
                rows, workers
            )));
        }
        let r = rank.index();
        if r >= workers {
            return Err(RingLifeError::Config(format!(
                "{} is outside a ring of {} workers",
                rank, workers
            )));
        }

        let quotient = rows / workers;
        let remainder = rows % workers;
        let (local_rows, start) = if r < remainder {
            (quotient + 1, r * (quotient + 1))
        } else {
            (quotient, remainder * (quotient + 1) + (r - remainder) * quotient)
        };

        Ok(Self {
            rank,
            local_rows,
            start,
        })
    }

    /// Partitions of every rank, in rank order.
    pub fn all(rows: usize, workers: usize) -> Result<Vec<Self>> {
        (0..workers)
            .map(|r| Self::for_rank(rows, workers, Rank(r)))
            .collect()
    }

    /// One past the last owned global row.
    pub fn end(&self) -> usize {
        self.start + self.local_rows
    }

    /// Global index of local buffer row `local` (1-based, margin coordinates).
    pub fn global_row(&self, local: usize) -> usize {
        self.start + local - 1
    }

    /// True if global row `row` is owned by this partition.
    pub fn contains(&self, row: usize) -> bool {
        (self.start..self.end()).contains(&row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_split() {
        let parts = RowPartition::all(12, 3).unwrap();
        let ranges: Vec<_> = parts.iter().map(|p| (p.local_rows, p.start)).collect();
        assert_eq!(ranges, vec![(4, 0), (4, 4), (4, 8)]);
    }

    #[test]
    fn test_remainder_goes_to_low_ranks() {
        let parts = RowPartition::all(10, 4).unwrap();
        let ranges: Vec<_> = parts.iter().map(|p| (p.local_rows, p.start)).collect();
        assert_eq!(ranges, vec![(3, 0), (3, 3), (2, 6), (2, 8)]);
    }

    #[test]
    fn test_cover_exactly_once() {
        for rows in 1..=40 {
            for workers in 1..=rows {
                let parts = RowPartition::all(rows, workers).unwrap();

                let mut next = 0;
                for p in &parts {
                    assert_eq!(p.start, next, "rows={} workers={}", rows, workers);
                    assert!(p.local_rows >= 1);
                    next = p.end();
                }
                assert_eq!(next, rows);

                let max = parts.iter().map(|p| p.local_rows).max().unwrap();
                let min = parts.iter().map(|p| p.local_rows).min().unwrap();
                assert!(max - min <= 1);
            }
        }
    }

    #[test]
    fn test_invalid_worker_counts() {
        assert!(matches!(
            RowPartition::for_rank(10, 0, Rank(0)),
            Err(RingLifeError::Config(_))
        ));
        assert!(matches!(
            RowPartition::for_rank(3, 4, Rank(0)),
            Err(RingLifeError::Config(_))
        ));
        assert!(RowPartition::for_rank(8, 4, Rank(4)).is_err());
    }

    #[test]
    fn test_global_row_mapping() {
        let p = RowPartition::for_rank(10, 4, Rank(2)).unwrap();
        assert_eq!(p.global_row(1), 6);
        assert_eq!(p.global_row(p.local_rows), 7);
        assert!(p.contains(7));
        assert!(!p.contains(8));
    }
}
