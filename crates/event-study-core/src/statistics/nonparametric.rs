use statrs::distribution::{Binomial, ContinuousCDF, DiscreteCDF, Normal};
use tracing::error;

use super::{StatisticKind, StatisticalTests, TestDetails, TestResult};
use crate::descriptive;

/// Largest sample for which the Wilcoxon null distribution is enumerated.
pub const WILCOXON_EXACT_MAX_N: usize = 50;

impl StatisticalTests {
    /// Two-sided exact binomial sign test of `median = 0`. Zeros count
    /// towards neither side.
    pub fn sign_test(&self, values: &[f64]) -> TestResult {
        const NAME: &str = "sign-test";
        let ar: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if ar.is_empty() {
            return TestResult::invalid(NAME, "No valid observations");
        }

        let n_positive = ar.iter().filter(|v| **v > 0.0).count();
        let n_negative = ar.iter().filter(|v| **v < 0.0).count();
        let n_total = n_positive + n_negative;
        if n_total == 0 {
            return TestResult::invalid(NAME, "All returns are zero");
        }

        let dist = match Binomial::new(0.5, n_total as u64) {
            Ok(d) => d,
            Err(e) => {
                error!("Binomial distribution with n={} failed: {}", n_total, e);
                return TestResult::invalid(NAME, "Binomial distribution unavailable");
            }
        };
        let k = n_positive as u64;
        let lower = dist.cdf(k);
        // P(X >= k); CDF(-1) is zero.
        let upper = if k == 0 { 1.0 } else { 1.0 - dist.cdf(k - 1) };
        let p_value = (2.0 * lower.min(upper)).min(1.0);

        TestResult::computed(
            NAME,
            self.outcome(
                None,
                None,
                p_value,
                n_total,
                TestDetails::Sign {
                    n_positive,
                    n_negative,
                    n_total,
                },
            ),
        )
    }

    /// Two-sided Wilcoxon signed-rank test of `median = 0`.
    ///
    /// Zero differences are dropped and ties get average ranks; the statistic
    /// is `min(W+, W-)`. Samples of at most [`WILCOXON_EXACT_MAX_N`]
    /// observations with no zeros and no ties use the exact null
    /// distribution, everything else the normal approximation with tie
    /// correction.
    pub fn wilcoxon_signed_rank_test(&self, values: &[f64]) -> TestResult {
        const NAME: &str = "wilcoxon";
        let ar: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if ar.len() < 3 {
            return TestResult::invalid(NAME, "Insufficient observations (need at least 3)");
        }

        let nonzero: Vec<f64> = ar.iter().copied().filter(|v| *v != 0.0).collect();
        if nonzero.is_empty() {
            return TestResult::invalid(NAME, "All returns are zero");
        }
        let has_zeros = nonzero.len() < ar.len();

        let (ranks, tie_sizes) = average_ranks(&nonzero);
        let w_plus: f64 = nonzero
            .iter()
            .zip(&ranks)
            .filter(|(v, _)| **v > 0.0)
            .map(|(_, r)| r)
            .sum();
        let w_minus: f64 = nonzero
            .iter()
            .zip(&ranks)
            .filter(|(v, _)| **v < 0.0)
            .map(|(_, r)| r)
            .sum();
        let statistic = w_plus.min(w_minus);

        let has_ties = tie_sizes.iter().any(|t| *t > 1);
        let p_value = if ar.len() <= WILCOXON_EXACT_MAX_N && !has_zeros && !has_ties {
            exact_signed_rank_p_value(nonzero.len(), statistic)
        } else {
            match normal_signed_rank_p_value(nonzero.len(), statistic, &tie_sizes) {
                Some(p) => p,
                None => {
                    return TestResult::invalid(NAME, "Zero variance in signed-rank statistic")
                }
            }
        };

        let median = descriptive::median(&ar).unwrap_or_default();
        TestResult::computed(
            NAME,
            self.outcome(
                Some((StatisticKind::Generic, statistic)),
                None,
                p_value,
                ar.len(),
                TestDetails::Wilcoxon { median },
            ),
        )
    }
}

/// Average ranks of `|values|` (1-based, in input order) and the size of
/// every tie group.
fn average_ranks(values: &[f64]) -> (Vec<f64>, Vec<usize>) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|a, b| values[*a].abs().total_cmp(&values[*b].abs()));

    let mut ranks = vec![0.0; values.len()];
    let mut tie_sizes = Vec::new();
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]].abs() == values[order[i]].abs() {
            j += 1;
        }
        // positions i..=j share ranks i+1..=j+1
        let rank = (i + j + 2) as f64 / 2.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        tie_sizes.push(j - i + 1);
        i = j + 1;
    }
    (ranks, tie_sizes)
}

/// Exact two-sided p-value: `2 * P(T <= statistic)` under the null, where T
/// is the rank sum of a random sign assignment over ranks `1..=n`.
fn exact_signed_rank_p_value(n: usize, statistic: f64) -> f64 {
    let max_sum = n * (n + 1) / 2;
    // counts[s] = number of subsets of {1..=k} summing to s
    let mut counts = vec![0.0f64; max_sum + 1];
    counts[0] = 1.0;
    for k in 1..=n {
        for s in (k..=max_sum).rev() {
            counts[s] += counts[s - k];
        }
    }

    let total = 2f64.powi(n as i32);
    let cutoff = statistic.floor() as usize;
    let lower: f64 = counts.iter().take(cutoff.min(max_sum) + 1).sum::<f64>() / total;
    (2.0 * lower).min(1.0)
}

/// Normal approximation with tie correction and no continuity correction.
fn normal_signed_rank_p_value(n: usize, statistic: f64, tie_sizes: &[usize]) -> Option<f64> {
    let n = n as f64;
    let mean = n * (n + 1.0) / 4.0;
    let tie_correction: f64 = tie_sizes
        .iter()
        .map(|t| {
            let t = *t as f64;
            t * t * t - t
        })
        .sum::<f64>()
        / 48.0;
    let variance = n * (n + 1.0) * (2.0 * n + 1.0) / 24.0 - tie_correction;
    if variance <= 0.0 {
        return None;
    }
    let z = (statistic - mean) / variance.sqrt();
    let normal = Normal::new(0.0, 1.0).ok()?;
    Some((2.0 * normal.sf(z.abs())).min(1.0))
}
