//! Count-before scan over a shadow list.

/// Returns how many items before `pos` satisfy `is_present`.
///
/// This is the derived index of the item at `pos` when the derived list holds
/// exactly the present items in source order. The scan is linear, which suits
/// the small working sets change streams usually carry.
///
/// # Panics
///
/// Panics if `pos > items.len()`.
#[inline]
pub fn count_before<S, F>(items: &[S], pos: usize, mut is_present: F) -> usize
where
    F: FnMut(&S) -> bool,
{
    items[..pos].iter().filter(|item| is_present(item)).count()
}
