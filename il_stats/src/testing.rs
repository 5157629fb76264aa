//! Group-comparison and association tests.
//!
//! Statistic computation lives here; statistic-to-p-value conversion is
//! delegated to `statrs` distributions.

use crate::descriptive::mean;
use crate::error::StatsError;
use crate::rank::average_rank;
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, StudentsT};

/// The result of one hypothesis test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestOutcome {
    pub statistic: f64,
    pub p_value: f64,
    pub degrees_of_freedom: Option<f64>,
}

fn validate_groups(groups: &[Vec<f64>]) -> Result<usize, StatsError> {
    if groups.len() < 2 {
        return Err(StatsError::InsufficientGroups { found: groups.len() });
    }
    if let Some(index) = groups.iter().position(Vec::is_empty) {
        return Err(StatsError::EmptyGroup { group: index });
    }
    Ok(groups.iter().map(Vec::len).sum())
}

/// One-way analysis of variance across `groups`.
///
/// Requires at least two groups, no empty group, and more observations than
/// groups. The F statistic's p-value comes from the Fisher-Snedecor
/// distribution with (k - 1, N - k) degrees of freedom.
pub fn anova_oneway(groups: &[Vec<f64>]) -> Result<TestOutcome, StatsError> {
    let k = groups.len();
    let n_total = validate_groups(groups)?;
    if n_total <= k {
        return Err(StatsError::InsufficientObservations {
            found: n_total,
            required: k + 1,
        });
    }

    let grand_sum: f64 = groups.iter().flatten().sum();
    let grand_mean = grand_sum / n_total as f64;

    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for group in groups {
        let group_mean = mean(group).expect("group verified non-empty");
        ss_between += group.len() as f64 * (group_mean - grand_mean).powi(2);
        ss_within += group.iter().map(|x| (x - group_mean).powi(2)).sum::<f64>();
    }

    let df_between = (k - 1) as f64;
    let df_within = (n_total - k) as f64;
    let ms_between = ss_between / df_between;
    let ms_within = ss_within / df_within;

    if ms_within == 0.0 {
        // Zero within-group spread: identical groups carry no evidence,
        // otherwise the separation is exact.
        let (statistic, p_value) = if ms_between == 0.0 {
            (0.0, 1.0)
        } else {
            (f64::INFINITY, 0.0)
        };
        return Ok(TestOutcome {
            statistic,
            p_value,
            degrees_of_freedom: Some(df_between),
        });
    }

    let f_stat = ms_between / ms_within;
    let dist = FisherSnedecor::new(df_between, df_within)
        .map_err(|e| StatsError::Distribution(e.to_string()))?;
    Ok(TestOutcome {
        statistic: f_stat,
        p_value: 1.0 - dist.cdf(f_stat),
        degrees_of_freedom: Some(df_between),
    })
}

/// Kruskal-Wallis rank test across `groups`, with the standard tie
/// correction. The H statistic's p-value uses the chi-squared approximation
/// with k - 1 degrees of freedom.
pub fn kruskal_wallis(groups: &[Vec<f64>]) -> Result<TestOutcome, StatsError> {
    let k = groups.len();
    let n_total = validate_groups(groups)?;
    if n_total < 3 {
        return Err(StatsError::InsufficientObservations {
            found: n_total,
            required: 3,
        });
    }

    let combined: Vec<f64> = groups.iter().flatten().copied().collect();
    let ranks = average_rank(&combined);

    let n_f = n_total as f64;
    let mut h = 0.0;
    let mut offset = 0;
    for group in groups {
        let r_sum: f64 = ranks[offset..offset + group.len()].iter().sum();
        h += r_sum * r_sum / group.len() as f64;
        offset += group.len();
    }
    h = 12.0 / (n_f * (n_f + 1.0)) * h - 3.0 * (n_f + 1.0);

    // Tie correction: 1 - sum(t^3 - t) / (N^3 - N) over tie groups.
    let mut sorted = combined;
    sorted.sort_unstable_by(f64::total_cmp);
    let mut tie_term = 0.0;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i + 1;
        while j < sorted.len() && sorted[j].total_cmp(&sorted[i]).is_eq() {
            j += 1;
        }
        let t = (j - i) as f64;
        tie_term += t * t * t - t;
        i = j;
    }
    let correction = 1.0 - tie_term / (n_f * n_f * n_f - n_f);
    if correction == 0.0 {
        // Every observation tied: no evidence of separation.
        return Ok(TestOutcome {
            statistic: 0.0,
            p_value: 1.0,
            degrees_of_freedom: Some((k - 1) as f64),
        });
    }
    let h = h / correction;

    let df = (k - 1) as f64;
    let dist = ChiSquared::new(df).map_err(|e| StatsError::Distribution(e.to_string()))?;
    Ok(TestOutcome {
        statistic: h,
        p_value: 1.0 - dist.cdf(h),
        degrees_of_freedom: Some(df),
    })
}

/// Spearman rank correlation between paired observations, with a two-tailed
/// p-value from the t approximation on n - 2 degrees of freedom.
pub fn spearman(x: &[f64], y: &[f64]) -> Result<TestOutcome, StatsError> {
    if x.len() != y.len() {
        return Err(StatsError::LengthMismatch {
            left: x.len(),
            right: y.len(),
        });
    }
    let n = x.len();
    if n < 3 {
        return Err(StatsError::InsufficientObservations { found: n, required: 3 });
    }

    let rx = average_rank(x);
    let ry = average_rank(y);

    let mean_rx = mean(&rx).expect("non-empty");
    let mean_ry = mean(&ry).expect("non-empty");
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in rx.iter().zip(&ry) {
        let dx = a - mean_rx;
        let dy = b - mean_ry;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        // A constant series carries no rank information.
        return Ok(TestOutcome {
            statistic: 0.0,
            p_value: 1.0,
            degrees_of_freedom: Some((n - 2) as f64),
        });
    }
    let rho = cov / denom;

    let df = (n - 2) as f64;
    let p_value = if rho.abs() >= 1.0 {
        0.0
    } else {
        let t = rho * (df / (1.0 - rho * rho)).sqrt();
        let dist = StudentsT::new(0.0, 1.0, df)
            .map_err(|e| StatsError::Distribution(e.to_string()))?;
        2.0 * (1.0 - dist.cdf(t.abs()))
    };

    Ok(TestOutcome {
        statistic: rho,
        p_value,
        degrees_of_freedom: Some(df),
    })
}
