//! Scan lowering: split a scan with a known row count into row ranges.

use std::ops::Range;

use tracing::debug;

use shardplan_core::dag::LogicalPlan;
use shardplan_core::error::{Error, Result};

use crate::lower::{LowerNode, Lowered, LoweringContext};
use crate::partition::PartitionInfo;

/// Contiguous row ranges of at most `max_rows` rows covering `0..num_rows`.
///
/// An empty source still yields one (empty) range so the scan has one task.
pub fn scan_ranges(num_rows: u64, max_rows: u64) -> Vec<Range<u64>> {
    let max_rows = max_rows.max(1);
    if num_rows == 0 {
        return vec![0..0];
    }
    (0..num_rows.div_ceil(max_rows))
        .map(|i| {
            let start = i * max_rows;
            start..(start + max_rows).min(num_rows)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanLowering;

impl LowerNode for ScanLowering {
    fn lower(
        &self,
        node: &LogicalPlan,
        children: Vec<LogicalPlan>,
        ctx: &LoweringContext<'_>,
    ) -> Result<Lowered> {
        let LogicalPlan::Scan {
            source, num_rows, ..
        } = node
        else {
            return Err(Error::coverage(
                node.kind().name(),
                "scan handler received a non-scan node",
            ));
        };
        if !children.is_empty() {
            return Err(Error::Invariant("scan nodes have no inputs".into()));
        }
        let count = match num_rows {
            Some(rows) => scan_ranges(*rows, ctx.config.max_rows_per_partition).len(),
            None => 1,
        };
        debug!(source = %source, rows = ?num_rows, partitions = count, "scan lowering");
        Ok(Lowered::new(node.clone(), PartitionInfo::new(count)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ranges_cover_rows_without_overlap() {
        let ranges = scan_ranges(250, 100);
        assert_eq!(ranges, vec![0..100, 100..200, 200..250]);
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        assert_eq!(scan_ranges(200, 100).len(), 2);
        assert_eq!(scan_ranges(0, 100), vec![0..0]);
        assert_eq!(scan_ranges(5, 100), vec![0..5]);
    }

    proptest! {
        #[test]
        fn ranges_tile_the_source(rows in 0u64..10_000, max in 1u64..500) {
            let ranges = scan_ranges(rows, max);
            prop_assert!(!ranges.is_empty());
            prop_assert_eq!(ranges[0].start, 0);
            prop_assert_eq!(ranges[ranges.len() - 1].end, rows);
            for pair in ranges.windows(2) {
                prop_assert_eq!(pair[0].end, pair[1].start);
            }
            prop_assert!(ranges.iter().all(|r| r.end - r.start <= max));
        }
    }
}
