//! Byte-range planning for segmented transfers.

/// A byte range `[start, end)` of the remote file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start: u64,
    pub end: u64,
}

impl Segment {
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Range in the form curl's `CURLOPT_RANGE` expects: `start-end`, end inclusive.
    pub fn curl_range(&self) -> String {
        format!("{}-{}", self.start, self.end.saturating_sub(1))
    }
}

/// Splits `total_size` bytes into `segment_count` contiguous ranges.
///
/// Sizes differ by at most one byte (the first `total % count` ranges get the
/// extra byte). Never returns more ranges than bytes, and returns nothing for
/// an empty file or a zero count.
pub fn plan_segments(total_size: u64, segment_count: usize) -> Vec<Segment> {
    let count = (segment_count as u64).min(total_size);
    if count == 0 {
        return Vec::new();
    }

    let base = total_size / count;
    let remainder = total_size % count;

    let mut start = 0u64;
    (0..count)
        .map(|i| {
            let len = base + u64::from(i < remainder);
            let seg = Segment {
                start,
                end: start + len,
            };
            start = seg.end;
            seg
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_split() {
        let segs = plan_segments(1000, 4);
        assert_eq!(
            segs,
            vec![
                Segment { start: 0, end: 250 },
                Segment { start: 250, end: 500 },
                Segment { start: 500, end: 750 },
                Segment { start: 750, end: 1000 },
            ]
        );
    }

    #[test]
    fn remainder_goes_to_leading_segments() {
        let lens: Vec<u64> = plan_segments(10, 4).iter().map(Segment::len).collect();
        assert_eq!(lens, vec![3, 3, 2, 2]);
    }

    #[test]
    fn more_segments_than_bytes() {
        let segs = plan_segments(3, 8);
        assert_eq!(segs.len(), 3);
        assert!(segs.iter().all(|s| s.len() == 1));
    }

    #[test]
    fn empty_inputs() {
        assert!(plan_segments(0, 4).is_empty());
        assert!(plan_segments(100, 0).is_empty());
    }

    #[test]
    fn curl_range_is_inclusive() {
        assert_eq!(Segment { start: 0, end: 99 }.curl_range(), "0-98");
        assert_eq!(Segment { start: 42, end: 43 }.curl_range(), "42-42");
    }
}
