//! Reductions from daily series to the scalars compared across periods.
//!
//! The top-ten median captures extreme-weather days rather than the annual
//! mean, while staying robust against a single anomalous reading.

use crate::model::ClimateError;

/// Number of extreme days kept by `summarize_top_ten`.
pub const TOP_N: usize = 10;

/// Median of the `TOP_N` largest values of `series`.
///
/// Values are sorted descending (stable) and the prefix of length
/// `min(TOP_N, series.len())` is reduced to its median. The result does not
/// depend on input order and is not rounded.
///
/// Returns `InvalidInput` for an empty series.
pub fn summarize_top_ten(series: &[f64]) -> Result<f64, ClimateError> {
    if series.is_empty() {
        return Err(ClimateError::InvalidInput(
            "cannot summarize an empty observation series".to_string(),
        ));
    }

    let mut sorted = series.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    sorted.truncate(TOP_N);

    median(&sorted)
}

/// Statistical median. Averages the two middle values for even lengths.
pub fn median(values: &[f64]) -> Result<f64, ClimateError> {
    if values.is_empty() {
        return Err(ClimateError::InvalidInput("median of empty sequence".to_string()));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Ok((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Ok(sorted[mid])
    }
}

/// Relative change from `baseline` to `projected`, in percent. Unrounded.
///
/// Returns `DivisionByZero` when `baseline == 0`.
pub fn percentage_change(baseline: f64, projected: f64) -> Result<f64, ClimateError> {
    if baseline == 0.0 {
        return Err(ClimateError::DivisionByZero);
    }
    Ok((projected - baseline) / baseline * 100.0)
}

/// Round to `decimals` places for reporting.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // --- summarize_top_ten --------------------------------------------------

    #[test]
    fn test_short_series_reduces_to_plain_median() {
        let series = [3.0, 1.0, 2.0];
        assert_eq!(summarize_top_ten(&series).unwrap(), median(&series).unwrap());
        assert_eq!(summarize_top_ten(&series).unwrap(), 2.0);
    }

    #[test]
    fn test_exactly_ten_values_reduce_to_plain_median() {
        let series: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_eq!(summarize_top_ten(&series).unwrap(), 5.5);
    }

    #[test]
    fn test_median_is_not_rounded() {
        assert_eq!(summarize_top_ten(&[1.23456]).unwrap(), 1.23456);
        // Rounding both medians to 3 places first would give exactly +10%.
        let baseline = summarize_top_ten(&[10.0004]).unwrap();
        let projected = summarize_top_ten(&[11.0]).unwrap();
        assert!(percentage_change(baseline, projected).unwrap() < 10.0);
    }

    #[test]
    fn test_single_value_series() {
        assert_eq!(summarize_top_ten(&[7.25]).unwrap(), 7.25);
    }

    #[test]
    fn test_only_top_ten_values_contribute() {
        // 1..=365: top ten are 356..=365, median is 360.5.
        let series: Vec<f64> = (1..=365).map(f64::from).collect();
        assert_eq!(summarize_top_ten(&series).unwrap(), 360.5);
    }

    #[test]
    fn test_result_is_independent_of_input_order() {
        let ascending: Vec<f64> = (0..40).map(|i| i as f64 * 0.5).collect();
        let mut descending = ascending.clone();
        descending.reverse();
        // 17 is coprime with 40, so this visits every index exactly once.
        let shuffled: Vec<f64> = (0..40).map(|i| ascending[(i * 17) % 40]).collect();

        let expected = summarize_top_ten(&ascending).unwrap();
        assert_eq!(expected, 17.25); // top ten 15.0..=19.5
        assert_eq!(summarize_top_ten(&descending).unwrap(), expected);
        assert_eq!(summarize_top_ten(&shuffled).unwrap(), expected);
    }

    #[test]
    fn test_duplicates_among_extremes_are_kept() {
        let mut series = vec![0.0; 300];
        series.extend([50.0; 6]);
        series.extend([40.0; 6]);
        // top ten: six 50s, four 40s → median of sorted [40,40,40,40,50,...] = 50
        assert_eq!(summarize_top_ten(&series).unwrap(), 50.0);
    }

    #[test]
    fn test_empty_series_is_invalid_input() {
        let result = summarize_top_ten(&[]);
        assert!(
            matches!(result, Err(ClimateError::InvalidInput(_))),
            "empty series should fail with InvalidInput, got {:?}",
            result
        );
    }

    // --- percentage_change --------------------------------------------------

    #[test]
    fn test_percentage_increase_and_decrease() {
        assert_eq!(percentage_change(100.0, 150.0).unwrap(), 50.0);
        assert_eq!(percentage_change(100.0, 50.0).unwrap(), -50.0);
        assert_eq!(percentage_change(30.0, 36.0).unwrap().round(), 20.0);
    }

    #[test]
    fn test_percentage_change_against_negative_baseline() {
        // Sub-zero max temperatures keep the raw formula's sign behaviour.
        assert_eq!(percentage_change(-10.0, -5.0).unwrap(), -50.0);
    }

    #[test]
    fn test_zero_baseline_is_division_by_zero() {
        assert_eq!(percentage_change(0.0, 12.0), Err(ClimateError::DivisionByZero));
    }

    // --- round_to -----------------------------------------------------------

    #[test]
    fn test_round_to_three_decimals() {
        assert_eq!(round_to(19.99949, 3), 19.999);
        assert_eq!(round_to(19.9995, 3), 20.0);
        assert_eq!(round_to(-3.14159, 3), -3.142);
    }
}
