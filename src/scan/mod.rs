/// Multi-coordinate drivers built on top of `assess::ClimateComparator`.
///
/// Submodules:
/// - `batch`: classify a list of labelled coordinates (e.g. cities) with
///             bounded parallelism.
/// - `grid` : resumable brute-force sweep over a lat/lon grid, written
///             incrementally as JSON lines.

pub mod batch;
pub mod grid;

/// What a scan computes per coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Climate deviation checks plus the sea-level check.
    Full,
    /// Elevation lookup and sea-level check only; no climate requests.
    SeaLevelOnly,
}
