//! Ranked candidates: try alternatives in priority order, first success wins.

/// Apply `attempt` to each candidate in order and return the first `Some`.
///
/// Later candidates are never attempted once one succeeds.
pub fn first_match<C, T>(
    candidates: impl IntoIterator<Item = C>,
    mut attempt: impl FnMut(C) -> Option<T>,
) -> Option<T> {
    candidates.into_iter().find_map(|c| attempt(c))
}
