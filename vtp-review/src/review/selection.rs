//! Active-segment selection over the pending view

use std::collections::HashSet;

/// Reconcile the active index after the pending view changed
///
/// - Nothing pending: no selection
/// - Active still pending: unchanged
/// - Active gone: the nearest following element of the old view that is
///   still pending, else the nearest preceding one, else the first pending
/// - No active index: the first pending
pub fn reconcile(old_view: &[u32], new_view: &[u32], active: Option<u32>) -> Option<u32> {
    let first = new_view.first().copied()?;
    let Some(active) = active else {
        return Some(first);
    };
    let still_pending: HashSet<u32> = new_view.iter().copied().collect();
    if still_pending.contains(&active) {
        return Some(active);
    }

    let Some(pos) = old_view.iter().position(|i| *i == active) else {
        return Some(first);
    };

    old_view[pos + 1..]
        .iter()
        .find(|i| still_pending.contains(i))
        .or_else(|| old_view[..pos].iter().rev().find(|i| still_pending.contains(i)))
        .copied()
        .or(Some(first))
}

/// Index after `active` in the view, else the one before it
pub fn move_next(view: &[u32], active: Option<u32>) -> Option<u32> {
    step(view, active, Direction::Forward)
}

/// Index before `active` in the view, else the one after it
pub fn move_prev(view: &[u32], active: Option<u32>) -> Option<u32> {
    step(view, active, Direction::Backward)
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

fn step(view: &[u32], active: Option<u32>, direction: Direction) -> Option<u32> {
    let Some(pos) = active.and_then(|a| view.iter().position(|i| *i == a)) else {
        return view.first().copied();
    };
    let next = view.get(pos + 1).copied();
    let prev = pos.checked_sub(1).map(|p| view[p]);
    match direction {
        Direction::Forward => next.or(prev).or(active),
        Direction::Backward => prev.or(next).or(active),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconcile_advances_to_next_then_previous() {
        let old = [1, 4, 7, 9];
        assert_eq!(reconcile(&old, &[1, 7, 9], Some(4)), Some(7));
        assert_eq!(reconcile(&old, &[1, 4, 7], Some(9)), Some(7));
        assert_eq!(reconcile(&old, &[1, 9], Some(4)), Some(9));
    }

    #[test]
    fn test_reconcile_empty_and_unset() {
        assert_eq!(reconcile(&[1, 2], &[], Some(1)), None);
        assert_eq!(reconcile(&[], &[5, 6], None), Some(5));
        assert_eq!(reconcile(&[5, 6], &[5, 6], Some(6)), Some(6));
    }

    #[test]
    fn test_reconcile_across_a_large_batch_removal() {
        // A batch decided 30k rows after the active one, perf-mode scale
        let old: Vec<u32> = (0..40_000).collect();
        let new: Vec<u32> = old.iter().copied().filter(|i| !(5_000..35_000).contains(i)).collect();
        assert_eq!(reconcile(&old, &new, Some(5_000)), Some(35_000));

        let tail_gone: Vec<u32> = (0..5_000).collect();
        assert_eq!(reconcile(&old, &tail_gone, Some(20_000)), Some(4_999));
    }

    #[test]
    fn test_reconcile_unknown_active_falls_back_to_first() {
        assert_eq!(reconcile(&[1, 2], &[2, 3], Some(42)), Some(2));
    }

    #[test]
    fn test_move_next_and_prev_wrap_to_other_side_at_edges() {
        let view = [3, 5, 8];
        assert_eq!(move_next(&view, Some(3)), Some(5));
        assert_eq!(move_next(&view, Some(8)), Some(5));
        assert_eq!(move_prev(&view, Some(5)), Some(3));
        assert_eq!(move_prev(&view, Some(3)), Some(5));
        assert_eq!(move_next(&[3], Some(3)), Some(3));
        assert_eq!(move_next(&view, None), Some(3));
        assert_eq!(move_prev(&[], None), None);
    }
}
