use eyre::Result;
use ndarray::{Array1, Array2};

use super::dataset::DelayedRevenueSample;

/// A trained delayed-revenue model
pub trait DelayedRevenueModel {
    /// Predicted delayed revenue for each row, in row order. Targets on the
    /// rows are ignored.
    fn predict(&self, rows: &[DelayedRevenueSample]) -> Vec<f64>;
}

/// Swappable training capability. The backtest engine trains one model per
/// decision week and discards it; any regression technique satisfying this
/// contract can stand in for the reference OLS backend.
pub trait ModelBackend: Sync {
    type Model: DelayedRevenueModel;

    fn train(&self, dataset: &[DelayedRevenueSample]) -> Result<Self::Model>;
}

/// Ordinary least squares with intercept over the fixed feature set
pub struct OlsBackend;

/// Fitted OLS coefficients: intercept followed by one weight per feature
pub struct OlsModel {
    coefficients: Array1<f64>,
}

impl ModelBackend for OlsBackend {
    type Model = OlsModel;

    fn train(&self, dataset: &[DelayedRevenueSample]) -> Result<OlsModel> {
        if dataset.is_empty() {
            return Err(eyre::eyre!("Cannot train on an empty dataset"));
        }

        let n = dataset.len();
        let p = DelayedRevenueSample::NUM_FEATURES + 1;

        let mut design = Array2::zeros((n, p));
        let mut target = Array1::zeros(n);
        for (i, sample) in dataset.iter().enumerate() {
            design[[i, 0]] = 1.0;
            for (j, feature) in sample.features().into_iter().enumerate() {
                design[[i, j + 1]] = feature;
            }
            target[i] = sample.delayed_revenue;
        }

        // Normal equations: (X^T X) beta = X^T y
        let xtx = design.t().dot(&design);
        let xty = design.t().dot(&target);
        let coefficients = solve_linear_system(xtx, xty);

        Ok(OlsModel { coefficients })
    }
}

impl DelayedRevenueModel for OlsModel {
    fn predict(&self, rows: &[DelayedRevenueSample]) -> Vec<f64> {
        rows.iter()
            .map(|sample| {
                let mut value = self.coefficients[0];
                for (j, feature) in sample.features().into_iter().enumerate() {
                    value += self.coefficients[j + 1] * feature;
                }
                value
            })
            .collect()
    }
}

const PIVOT_EPS: f64 = 1e-10;

/// Gaussian elimination with partial pivoting.
///
/// Columns whose best pivot falls below `PIVOT_EPS` (collinear or constant
/// features, tiny datasets) are skipped and their coefficient stays zero, so
/// a rank-deficient system degrades gracefully instead of producing NaNs.
fn solve_linear_system(mut a: Array2<f64>, mut b: Array1<f64>) -> Array1<f64> {
    let n = a.nrows();
    // column -> the elimination row that pivots on it
    let mut pivot_row_for_col: Vec<Option<usize>> = vec![None; n];

    let mut row = 0;
    for col in 0..n {
        if row == n {
            break;
        }

        let mut best_row = row;
        let mut best_abs = a[[row, col]].abs();
        for r in row + 1..n {
            let abs = a[[r, col]].abs();
            if abs > best_abs {
                best_abs = abs;
                best_row = r;
            }
        }
        if best_abs < PIVOT_EPS {
            continue;
        }

        if best_row != row {
            for c in 0..n {
                let tmp = a[[row, c]];
                a[[row, c]] = a[[best_row, c]];
                a[[best_row, c]] = tmp;
            }
            b.swap(row, best_row);
        }

        for r in row + 1..n {
            let factor = a[[r, col]] / a[[row, col]];
            for c in col..n {
                a[[r, c]] -= factor * a[[row, c]];
            }
            b[r] -= factor * b[row];
        }

        pivot_row_for_col[col] = Some(row);
        row += 1;
    }

    // Back substitution; skipped columns keep a zero coefficient
    let mut x = Array1::zeros(n);
    for col in (0..n).rev() {
        if let Some(r) = pivot_row_for_col[col] {
            let mut sum = b[r];
            for c in col + 1..n {
                sum -= a[[r, c]] * x[c];
            }
            x[col] = sum / a[[r, col]];
        }
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::array;

    fn sample(spend: f64, revenue: f64, delayed_revenue: f64) -> DelayedRevenueSample {
        DelayedRevenueSample {
            week_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            channel: "Email".to_string(),
            spend,
            clicks: 0.0,
            conversions: 0.0,
            revenue,
            roi: 0.0,
            spend_lag1: 0.0,
            revenue_lag1: 0.0,
            roi_lag1: 0.0,
            delayed_revenue,
        }
    }

    #[test]
    fn solves_a_well_conditioned_system() {
        // 2x + y = 5, x + 3y = 10 => x = 1, y = 3
        let a = array![[2.0, 1.0], [1.0, 3.0]];
        let b = array![5.0, 10.0];
        let x = solve_linear_system(a, b);
        assert!((x[0] - 1.0).abs() < 1e-9);
        assert!((x[1] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn singular_system_yields_zero_for_dead_columns() {
        // Second column is identically zero
        let a = array![[2.0, 0.0], [0.0, 0.0]];
        let b = array![4.0, 0.0];
        let x = solve_linear_system(a, b);
        assert!((x[0] - 2.0).abs() < 1e-9);
        assert_eq!(x[1], 0.0);
    }

    #[test]
    fn recovers_an_exact_linear_relationship() {
        // delayed_revenue = 3 * spend + 2 * revenue, no noise. With plenty of
        // distinct rows OLS should reproduce the relationship on unseen data.
        let train: Vec<DelayedRevenueSample> = (1..=20)
            .map(|i| {
                let spend = i as f64 * 10.0;
                let revenue = 1000.0 / i as f64;
                sample(spend, revenue, 3.0 * spend + 2.0 * revenue)
            })
            .collect();

        let model = OlsBackend.train(&train).unwrap();
        let probe = sample(55.0, 123.0, 0.0);
        let predicted = model.predict(std::slice::from_ref(&probe))[0];
        let expected = 3.0 * 55.0 + 2.0 * 123.0;
        assert!(
            (predicted - expected).abs() < 1e-3,
            "predicted {predicted}, expected {expected}"
        );
    }

    #[test]
    fn predicts_one_value_per_row_in_order() {
        let train: Vec<DelayedRevenueSample> =
            (1..=10).map(|i| sample(i as f64, 0.0, 2.0 * i as f64)).collect();
        let model = OlsBackend.train(&train).unwrap();
        let out = model.predict(&train[..3]);
        assert_eq!(out.len(), 3);
        assert!((out[0] - 2.0).abs() < 1e-6);
        assert!((out[2] - 6.0).abs() < 1e-6);
    }

    #[test]
    fn training_on_an_empty_dataset_is_an_error() {
        assert!(OlsBackend.train(&[]).is_err());
    }
}
