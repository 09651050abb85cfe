//! Utilities.

fn mean_var(xs: impl Iterator<Item = f32> + Clone) -> (f32, f32) {
    let n = xs.clone().count() as f32;
    let mean = xs.clone().sum::<f32>() / n;
    let var = xs.map(|x| (x - mean).powi(2)).sum::<f32>() / n;
    (mean, var)
}

/// Computes `1 - Var[target - pred] / Var[target]`.
///
/// Returns NaN if `Var[target]` is zero or the inputs are empty. The result is 1 for
/// a perfect prediction, 0 for a constant prediction of the mean, and negative for
/// predictions worse than that.
pub fn explained_variance(pred: &[f32], target: &[f32]) -> f32 {
    debug_assert_eq!(pred.len(), target.len());
    if target.is_empty() {
        return f32::NAN;
    }
    let (_, var_y) = mean_var(target.iter().copied());
    if var_y == 0.0 {
        return f32::NAN;
    }
    let (_, var_res) = mean_var(target.iter().zip(pred).map(|(y, p)| y - p));
    1.0 - var_res / var_y
}
