//! Stable subsequence selection for keyed sibling groups
//!
//! After keys are matched, each new child knows the old index it came from
//! (or `None` when it is new). Children whose old indices form the longest
//! strictly increasing run are already in relative order and stay put; every
//! other matched child needs a `Move`.
//!
//! # Complexity
//!
//! - Time: O(n log n) (patience sorting with predecessor links)
//! - Space: O(n)
//!
//! Common prefix/suffix trimming is skipped: prefix and suffix entries are
//! increasing by construction and the binary search handles them cheaply.

/// Mark which entries of `sources` belong to the longest increasing
/// subsequence of old indices. `None` entries are never marked.
///
/// Ties between equally long subsequences resolve to the one ending at the
/// smallest old index at every length, so results are deterministic.
pub fn stable_mask(sources: &[Option<usize>]) -> Vec<bool> {
    let mut mask = vec![false; sources.len()];

    // Fast path: already in order (append/remove-only edits)
    let mut last = None;
    if sources.iter().flatten().all(|&old| {
        let ordered = last.is_none_or(|prev| prev < old);
        last = Some(old);
        ordered
    }) {
        for (slot, source) in mask.iter_mut().zip(sources) {
            *slot = source.is_some();
        }
        return mask;
    }

    // tails[k]: position (in `sources`) of the smallest tail of an increasing
    // run of length k + 1
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; sources.len()];

    for (pos, source) in sources.iter().enumerate() {
        let Some(old) = *source else { continue };
        let len = tails.partition_point(|&t| old_index(sources, t) < old);
        if len > 0 {
            prev[pos] = Some(tails[len - 1]);
        }
        if len == tails.len() {
            tails.push(pos);
        } else {
            tails[len] = pos;
        }
    }

    let mut cursor = tails.last().copied();
    while let Some(pos) = cursor {
        mask[pos] = true;
        cursor = prev[pos];
    }
    mask
}

#[inline]
fn old_index(sources: &[Option<usize>], pos: usize) -> usize {
    // Only positions holding `Some` are ever stored in `tails`
    sources[pos].unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(indices: &[usize]) -> Vec<Option<usize>> {
        indices.iter().copied().map(Some).collect()
    }

    fn stable_len(sources: &[Option<usize>]) -> usize {
        stable_mask(sources).into_iter().filter(|&kept| kept).count()
    }

    fn moved(sources: &[Option<usize>]) -> usize {
        let mask = stable_mask(sources);
        sources
            .iter()
            .zip(&mask)
            .filter(|(source, kept)| source.is_some() && !**kept)
            .count()
    }

    #[test]
    fn test_in_order_keeps_everything() {
        assert_eq!(stable_mask(&some(&[0, 1, 2])), vec![true, true, true]);
        assert!(stable_mask(&[]).is_empty());
    }

    #[test]
    fn test_rotation_moves_one() {
        // [a, b, c] -> [c, a, b]
        let sources = some(&[2, 0, 1]);
        assert_eq!(stable_mask(&sources), vec![false, true, true]);
        assert_eq!(moved(&sources), 1);
    }

    #[test]
    fn test_reverse_keeps_one() {
        let sources = some(&[3, 2, 1, 0]);
        assert_eq!(stable_len(&sources), 1);
        assert_eq!(moved(&sources), 3);
    }

    #[test]
    fn test_gaps_from_removals_are_not_moves() {
        // [a, b, c, d] -> [a, c, d]: b removed
        assert_eq!(moved(&some(&[0, 2, 3])), 0);
    }

    #[test]
    fn test_inserted_entries_are_skipped() {
        // [a, b] -> [x, b, a, y]
        let sources = vec![None, Some(1), Some(0), None];
        let mask = stable_mask(&sources);
        assert!(!mask[0] && !mask[3]);
        assert_eq!(mask.iter().filter(|&&kept| kept).count(), 1);
    }

    #[test]
    fn test_swap_in_long_list() {
        // swap first and last of ten
        let mut order: Vec<usize> = (0..10).collect();
        order.swap(0, 9);
        let sources = some(&order);
        assert_eq!(stable_len(&sources), 8);
        assert_eq!(moved(&sources), 2);
    }
}
