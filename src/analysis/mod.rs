/// Statistical reductions used by the livability comparison.
///
/// Submodules:
/// - `statistics`: top-ten median, percentage change, display rounding.

pub mod statistics;
