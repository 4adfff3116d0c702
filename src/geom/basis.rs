//! B-spline basis functions, knot vector rules and the dense solver shared by
//! the approximators.

use super::core::{Tolerance, Vec3};
use super::error::{FitError, FitResult};

/// Knot span index `i` with `knots[i] <= u < knots[i + 1]`, clamped to the
/// last non-empty span at the right end of the domain.
///
/// `n` is the index of the last control point.
pub(crate) fn find_span(n: usize, p: usize, u: f64, knots: &[f64]) -> usize {
    if u >= knots[n + 1] {
        return n;
    }
    if u <= knots[p] {
        return p;
    }

    let mut low = p;
    let mut high = n + 1;
    let mut mid = (low + high) / 2;
    while u < knots[mid] || u >= knots[mid + 1] {
        if u < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

/// The `p + 1` non-zero basis functions `N_{span-p..=span, p}(u)`.
pub(crate) fn basis_funs(span: usize, u: f64, p: usize, knots: &[f64]) -> Vec<f64> {
    let mut n = vec![0.0; p + 1];
    let mut left = vec![0.0; p + 1];
    let mut right = vec![0.0; p + 1];
    n[0] = 1.0;

    for j in 1..=p {
        left[j] = u - knots[span + 1 - j];
        right[j] = knots[span + j] - u;
        let mut saved = 0.0;
        for r in 0..j {
            let denom = right[r + 1] + left[j - r];
            let temp = if denom == 0.0 { 0.0 } else { n[r] / denom };
            n[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        n[j] = saved;
    }
    n
}

/// Basis functions and their derivatives up to order `n_ders` (capped at `p`).
///
/// `ders[k][j]` is the k-th derivative of `N_{span-p+j, p}` at `u`.
pub(crate) fn ders_basis_funs(
    span: usize,
    u: f64,
    p: usize,
    n_ders: usize,
    knots: &[f64],
) -> Vec<Vec<f64>> {
    let n_ders = n_ders.min(p);
    let mut ndu = vec![vec![0.0; p + 1]; p + 1];
    let mut left = vec![0.0; p + 1];
    let mut right = vec![0.0; p + 1];
    ndu[0][0] = 1.0;

    for j in 1..=p {
        left[j] = u - knots[span + 1 - j];
        right[j] = knots[span + j] - u;
        let mut saved = 0.0;
        for r in 0..j {
            // Lower triangle holds knot differences.
            ndu[j][r] = right[r + 1] + left[j - r];
            let temp = safe_div(ndu[r][j - 1], ndu[j][r]);
            // Upper triangle holds basis values.
            ndu[r][j] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        ndu[j][j] = saved;
    }

    let mut ders = vec![vec![0.0; p + 1]; n_ders + 1];
    for j in 0..=p {
        ders[0][j] = ndu[j][p];
    }

    let mut a = vec![vec![0.0; p + 1]; 2];
    for r in 0..=p {
        let (mut s1, mut s2) = (0usize, 1usize);
        a[0][0] = 1.0;

        for k in 1..=n_ders {
            let mut d = 0.0;
            let pk = p - k;
            let rk = r as isize - k as isize;

            if r >= k {
                let rk = r - k;
                a[s2][0] = safe_div(a[s1][0], ndu[pk + 1][rk]);
                d = a[s2][0] * ndu[rk][pk];
            }

            let j1 = if rk >= -1 { 1 } else { rk.unsigned_abs() };
            let j2 = if r <= pk + 1 { k - 1 } else { p - r };

            for j in j1..=j2 {
                let col = (rk + j as isize) as usize;
                a[s2][j] = safe_div(a[s1][j] - a[s1][j - 1], ndu[pk + 1][col]);
                d += a[s2][j] * ndu[col][pk];
            }

            if r <= pk {
                a[s2][k] = safe_div(-a[s1][k - 1], ndu[pk + 1][r]);
                d += a[s2][k] * ndu[r][pk];
            }

            ders[k][r] = d;
            std::mem::swap(&mut s1, &mut s2);
        }
    }

    let mut factor = p as f64;
    for k in 1..=n_ders {
        for value in &mut ders[k] {
            *value *= factor;
        }
        factor *= (p - k) as f64;
    }

    ders
}

fn safe_div(num: f64, denom: f64) -> f64 {
    if denom == 0.0 { 0.0 } else { num / denom }
}

pub(crate) fn is_non_decreasing(knots: &[f64]) -> bool {
    knots.windows(2).all(|w| w[0] <= w[1])
}

/// Clamped knot vector by the averaging method, for `params.len()` control points.
///
/// For a degree-p B-spline interpolating n points with parameters t_0 ... t_{n-1},
/// the interior knots are computed as:
///   u_{j+p} = (t_j + t_{j+1} + ... + t_{j+p-1}) / p  for j = 1, ..., n-p-1
pub(crate) fn averaging_knot_vector(params: &[f64], degree: usize) -> Vec<f64> {
    let n = params.len();
    let p = degree;
    let mut knots = Vec::with_capacity(n + p + 1);

    knots.extend(std::iter::repeat_n(0.0, p + 1));

    let interior_count = n.saturating_sub(p + 1);
    for j in 1..=interior_count {
        let sum: f64 = params[j..j + p].iter().sum();
        knots.push(sum / p as f64);
    }

    knots.extend(std::iter::repeat_n(1.0, p + 1));
    knots
}

/// Clamped knot vector for least-squares approximation of sorted `params`
/// with `ctrl_count` control points.
///
/// Each interior knot is a blend of the two parameters around position
/// `j * d`, `d = params.len() / (ctrl_count - p)`, so every knot span holds
/// roughly the same number of samples:
///   u_{p+j} = (1 - a) t_{i-1} + a t_i,  i = floor(j d),  a = j d - i
pub(crate) fn approximation_knot_vector(params: &[f64], ctrl_count: usize, degree: usize) -> Vec<f64> {
    let p = degree;
    let sample_count = params.len();
    let mut knots = Vec::with_capacity(ctrl_count + p + 1);

    knots.extend(std::iter::repeat_n(0.0, p + 1));

    let interior_count = ctrl_count.saturating_sub(p + 1);
    let d = sample_count as f64 / (interior_count + 1) as f64;
    for j in 1..=interior_count {
        let jd = j as f64 * d;
        let i = (jd.floor() as usize).clamp(1, sample_count - 1);
        let alpha = jd - i as f64;
        knots.push((1.0 - alpha) * params[i - 1] + alpha * params[i]);
    }

    knots.extend(std::iter::repeat_n(1.0, p + 1));
    knots
}

/// Clamped knot vector with evenly spaced interior knots.
pub(crate) fn uniform_knot_vector(ctrl_count: usize, degree: usize) -> Vec<f64> {
    let p = degree;
    let mut knots = Vec::with_capacity(ctrl_count + p + 1);

    knots.extend(std::iter::repeat_n(0.0, p + 1));

    let interior_count = ctrl_count.saturating_sub(p + 1);
    for i in 1..=interior_count {
        knots.push(i as f64 / (interior_count + 1) as f64);
    }

    knots.extend(std::iter::repeat_n(1.0, p + 1));
    knots
}

/// Interior knots must lie strictly inside the domain and strictly increase,
/// otherwise some basis function has no support among the samples.
pub(crate) fn check_interior_knots(knots: &[f64], degree: usize) -> FitResult<()> {
    let start = knots[degree];
    let end = knots[knots.len() - degree - 1];
    let interior = &knots[degree..=knots.len() - degree - 1];

    if interior.windows(2).all(|w| w[0] < w[1]) && start < end {
        return Ok(());
    }

    Err(FitError::fitting(
        "too few distinct parameters for the requested control point count; \
         reduce control points or supply more samples",
    ))
}

/// Solves `A X = B` for a dense square `A` and three right-hand columns
/// (one per coordinate), using Gaussian elimination with partial pivoting.
pub(crate) fn solve_linear_system(matrix: &[Vec<f64>], rhs: &[Vec3]) -> FitResult<Vec<Vec3>> {
    let n = matrix.len();
    if n == 0 || rhs.len() != n || matrix.iter().any(|row| row.len() != n) {
        return Err(FitError::fitting("invalid matrix dimensions"));
    }

    let scale = matrix
        .iter()
        .flat_map(|row| row.iter())
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if !scale.is_finite() || scale == 0.0 {
        return Err(FitError::fitting("least-squares matrix is zero or non-finite"));
    }
    let threshold = Tolerance::PIVOT.relative_to(scale);

    let mut a: Vec<Vec<f64>> = matrix.to_vec();
    let mut b: Vec<Vec3> = rhs.to_vec();

    // Forward elimination with partial pivoting
    for k in 0..n {
        let mut max_row = k;
        let mut max_val = a[k][k].abs();
        for (i, row) in a.iter().enumerate().skip(k + 1) {
            if row[k].abs() > max_val {
                max_val = row[k].abs();
                max_row = i;
            }
        }

        if max_val <= threshold {
            return Err(FitError::fitting(format!(
                "singular least-squares system (pivot {max_val:.3e} at column {k})"
            )));
        }

        if max_row != k {
            a.swap(k, max_row);
            b.swap(k, max_row);
        }

        let pivot = a[k][k];
        for i in (k + 1)..n {
            let factor = a[i][k] / pivot;
            if factor == 0.0 {
                continue;
            }
            for j in k..n {
                a[i][j] -= factor * a[k][j];
            }
            b[i] = b[i] - b[k] * factor;
        }
    }

    // Back substitution
    let mut x = vec![Vec3::ZERO; n];
    for i in (0..n).rev() {
        let mut sum = b[i];
        for j in (i + 1)..n {
            sum = sum - x[j] * a[i][j];
        }
        x[i] = sum / a[i][i];
    }

    if x.iter().any(|v| !v.x.is_finite() || !v.y.is_finite() || !v.z.is_finite()) {
        return Err(FitError::fitting("ill-conditioned least-squares system"));
    }

    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cubic_knots() -> Vec<f64> {
        vec![0.0, 0.0, 0.0, 0.0, 0.25, 0.5, 0.75, 1.0, 1.0, 1.0, 1.0]
    }

    #[test]
    fn basis_is_partition_of_unity() {
        let knots = cubic_knots();
        let n = knots.len() - 3 - 2;
        for step in 0..=20 {
            let u = f64::from(step) / 20.0;
            let span = find_span(n, 3, u, &knots);
            let sum: f64 = basis_funs(span, u, 3, &knots).iter().sum();
            assert!((sum - 1.0).abs() < 1e-12, "u = {u}, sum = {sum}");
        }
    }

    #[test]
    fn find_span_clamps_domain_ends() {
        let knots = cubic_knots();
        let n = knots.len() - 3 - 2;
        assert_eq!(find_span(n, 3, 0.0, &knots), 3);
        assert_eq!(find_span(n, 3, 1.0, &knots), n);
        assert_eq!(find_span(n, 3, 0.3, &knots), 4);
    }

    #[test]
    fn derivative_basis_matches_finite_differences() {
        let knots = cubic_knots();
        let n = knots.len() - 3 - 2;
        let h = 1e-6;
        for &u in &[0.1, 0.3, 0.6, 0.9] {
            let span = find_span(n, 3, u, &knots);
            let ders = ders_basis_funs(span, u, 3, 2, &knots);
            let plus = basis_funs(span, u + h, 3, &knots);
            let minus = basis_funs(span, u - h, 3, &knots);
            for j in 0..=3 {
                let fd = (plus[j] - minus[j]) / (2.0 * h);
                assert!((ders[1][j] - fd).abs() < 1e-5, "u = {u}, j = {j}");
            }
            assert_eq!(ders[0], basis_funs(span, u, 3, &knots));
            let second_sum: f64 = ders[2].iter().sum();
            assert!(second_sum.abs() < 1e-9);
        }
    }

    #[test]
    fn averaging_knots_are_clamped() {
        let params = [0.0, 0.2, 0.5, 0.7, 0.9, 1.0];
        let knots = averaging_knot_vector(&params, 3);
        assert_eq!(knots.len(), params.len() + 4);
        assert_eq!(&knots[..4], &[0.0; 4]);
        assert_eq!(&knots[knots.len() - 4..], &[1.0; 4]);
        assert!((knots[4] - (0.2 + 0.5 + 0.7) / 3.0).abs() < 1e-12);
        assert!((knots[5] - (0.5 + 0.7 + 0.9) / 3.0).abs() < 1e-12);
        assert!(is_non_decreasing(&knots));
    }

    #[test]
    fn approximation_knots_spread_over_samples() {
        let params: Vec<f64> = (0..101).map(|i| f64::from(i) / 100.0).collect();
        let knots = approximation_knot_vector(&params, 8, 3);
        assert_eq!(knots.len(), 8 + 4);
        assert!(is_non_decreasing(&knots));
        assert!(check_interior_knots(&knots, 3).is_ok());
        // Uniform samples give (nearly) uniform knots.
        for (j, knot) in knots[4..8].iter().enumerate() {
            let expected = (j + 1) as f64 / 5.0;
            assert!((knot - expected).abs() < 0.02, "knot {j}: {knot}");
        }
    }

    #[test]
    fn coincident_interior_knots_are_rejected() {
        let params = [0.0, 0.0, 0.0, 0.0, 0.0, 1.0];
        let knots = approximation_knot_vector(&params, 6, 3);
        assert!(matches!(
            check_interior_knots(&knots, 3),
            Err(FitError::Fitting { .. })
        ));
    }

    #[test]
    fn solver_handles_pivoting_and_singularity() {
        let matrix = vec![vec![0.0, 2.0], vec![3.0, 1.0]];
        let rhs = vec![Vec3::new(2.0, 4.0, 0.0), Vec3::new(4.0, 5.0, 3.0)];
        let x = solve_linear_system(&matrix, &rhs).unwrap();
        assert!((x[0].x - 1.0).abs() < 1e-12);
        assert!((x[1].x - 1.0).abs() < 1e-12);
        assert!((x[1].y - 2.0).abs() < 1e-12);
        assert!((x[0].z - 1.0).abs() < 1e-12);

        let singular = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(matches!(
            solve_linear_system(&singular, &rhs),
            Err(FitError::Fitting { .. })
        ));
    }
}
