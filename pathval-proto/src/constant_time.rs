// Kept out of line so the optimizer can't short-circuit the loop at the call site.
#[inline(never)]
fn constant_time_ne(a: &[u8], b: &[u8]) -> u8 {
    debug_assert_eq!(a.len(), b.len());

    a.iter().zip(b).fold(0, |acc, (x, y)| acc | (x ^ y))
}

/// Compares byte strings without exiting early on the first mismatch
pub(crate) fn eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && constant_time_ne(a, b) == 0
}
