//! Average ranking for rank-based tests.

/// Assign 1-based ranks to `data`, giving tied values the average of their
/// would-be ranks. This is the tie convention required by Kruskal-Wallis and
/// Spearman.
///
/// Empty input produces empty output.
pub fn average_rank(data: &[f64]) -> Vec<f64> {
    let n = data.len();
    if n == 0 {
        return Vec::new();
    }

    let mut indexed: Vec<(f64, usize)> = data.iter().copied().zip(0..).collect();
    indexed.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && indexed[j].0.total_cmp(&indexed[i].0).is_eq() {
            j += 1;
        }
        // Ranks in the tie group are (i+1)..=j; all members get the average.
        let rank_val = (i + j + 1) as f64 / 2.0;
        for k in i..j {
            ranks[indexed[k].1] = rank_val;
        }
        i = j;
    }
    ranks
}
