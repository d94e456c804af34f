//! Circular distances and windows on periodic cycles (months, days of year).

/// Distance between two 1-based labels on a cycle of length `period`,
/// measured the short way round.
///
/// `circular_distance(1, 12, 12)` is 1: December and January are adjacent.
pub fn circular_distance(a: u16, b: u16, period: u16) -> u16 {
    if period == 0 {
        return 0;
    }
    let d = a.abs_diff(b) % period;
    d.min(period - d)
}

/// Returns every 1-based label within `half_width` of `center` on a cycle of
/// length `period`, sorted ascending.
///
/// Wrap-around is handled by circular distance, so a window centred on day 1
/// includes the last days of the previous year. When the window spans the
/// whole cycle every label is returned exactly once.
///
/// # Example
///
/// ```ignore
/// assert_eq!(circular_window(1, 1, 12), vec![1, 2, 12]);
/// ```
pub fn circular_window(center: u16, half_width: u16, period: u16) -> Vec<u16> {
    if period == 0 || center == 0 || center > period {
        return Vec::new();
    }
    (1..=period)
        .filter(|&label| circular_distance(center, label, period) <= half_width)
        .collect()
}
