//! Pure structural transforms over array values.
//!
//! Each function returns a new vector, leaving the input untouched;
//! `None` means the operation is defined as a no-op for those
//! arguments (out-of-range indices never error).

/// Move the element at `from` to `to`, shifting the elements between
/// them by one position.
///
/// No-op (`None`) when `from == to` or either index is out of range.
pub fn move_item<T: Clone>(items: &[T], from: usize, to: usize) -> Option<Vec<T>> {
    if from == to || from >= items.len() || to >= items.len() {
        return None;
    }
    let mut out = items.to_vec();
    let item = out.remove(from);
    out.insert(to, item);
    Some(out)
}

/// Wrapping target index for a move-up: index 0 wraps to the end.
#[inline]
pub fn wrap_up(index: usize, len: usize) -> usize {
    if index == 0 {
        len.saturating_sub(1)
    } else {
        index - 1
    }
}

/// Wrapping target index for a move-down: the last index wraps to 0.
#[inline]
pub fn wrap_down(index: usize, len: usize) -> usize {
    if index + 1 >= len {
        0
    } else {
        index + 1
    }
}

/// Splice `new` in at `index`, shifting later elements right.
///
/// No-op (`None`) when `index > len` (`index == len` appends).
pub fn insert_items<T: Clone>(items: &[T], index: usize, new: Vec<T>) -> Option<Vec<T>> {
    if index > items.len() {
        return None;
    }
    let mut out = items.to_vec();
    out.splice(index..index, new);
    Some(out)
}

/// Splice out exactly one element at `index`.
///
/// No-op (`None`) when `index >= len`.
pub fn remove_at<T: Clone>(items: &[T], index: usize) -> Option<Vec<T>> {
    if index >= items.len() {
        return None;
    }
    let mut out = items.to_vec();
    out.remove(index);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_basic() {
        assert_eq!(move_item(&[1, 2, 3], 0, 2), Some(vec![2, 3, 1]));
        assert_eq!(move_item(&[1, 2, 3], 2, 0), Some(vec![3, 1, 2]));
    }

    #[test]
    fn test_move_noop_bounds() {
        let items = [1, 2, 3];
        assert_eq!(move_item(&items, 1, 1), None);
        assert_eq!(move_item(&items, 3, 0), None);
        assert_eq!(move_item(&items, 0, 3), None);
    }

    #[test]
    fn test_move_is_rotate_over_subrange() {
        // forward move shifts the [from+1, to] range left
        assert_eq!(move_item(&[1, 2, 3, 4], 1, 3), Some(vec![1, 3, 4, 2]));
        // backward move shifts the [to, from-1] range right
        assert_eq!(move_item(&[1, 2, 3, 4], 3, 1), Some(vec![1, 4, 2, 3]));
    }

    #[test]
    fn test_wraparound() {
        // moveUp(0) on a 3-element array is move(0, 2)
        assert_eq!(wrap_up(0, 3), 2);
        assert_eq!(wrap_up(2, 3), 1);
        // moveDown(2) on a 3-element array is move(2, 0)
        assert_eq!(wrap_down(2, 3), 0);
        assert_eq!(wrap_down(0, 3), 1);
    }

    #[test]
    fn test_insert() {
        assert_eq!(insert_items(&[1, 3], 1, vec![2]), Some(vec![1, 2, 3]));
        assert_eq!(insert_items(&[1], 1, vec![2]), Some(vec![1, 2]));
        assert_eq!(insert_items(&[1], 2, vec![2]), None);
    }

    #[test]
    fn test_remove() {
        assert_eq!(remove_at(&[1, 2, 3], 1), Some(vec![1, 3]));
        assert_eq!(remove_at::<i32>(&[], 0), None);
        assert_eq!(remove_at(&[1], 5), None);
    }
}
