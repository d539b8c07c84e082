//! Per-instance initialization.

use crate::state::{InitView, SharedS};
use mixsat_core::ProblemDims;
use mixsat_dense::{axpy, dot, scal, zero};

/// Write the analytic input rows, renormalize the output rows, build the
/// permuted visitation order, and establish the running product `W`.
///
/// Input rows become `(-cos(pi z), sign * sin(pi z), 0, ...)` where the
/// sign of component 1 is preserved from whatever the row held before:
/// random on first call, stable afterwards, so the input's phase stays
/// consistent with the gradient assembly that later multiplies by it.
/// Output rows are scaled to unit norm from the caller-seeded direction.
///
/// `index` receives the output variables in the order of the caller's
/// permutation of `{0, ..., n-2}` shifted by one (the truth variable is
/// never visited), padded with the zero sentinel.
///
/// `w` leaves here equal to `V' S`; the sweep kernel maintains that
/// equality incrementally from then on and never recomputes it.
pub(crate) fn mix_init(dims: ProblemDims, shared: &SharedS<'_>, view: InitView<'_>) {
    let ProblemDims { n, m, k, .. } = dims;
    for i in 0..n {
        let vi = &mut view.v[i * k..(i + 1) * k];
        if view.is_input[i] {
            let sign_carrier = vi[1];
            zero(vi);
            let zp = f64::from(view.z[i]) * std::f64::consts::PI;
            vi[0] = (-zp.cos()) as f32;
            vi[1] = (zp.sin() as f32).copysign(sign_carrier);
        } else {
            let norm_sq = dot(vi, vi);
            scal(vi, 1.0 / norm_sq.sqrt());
        }
    }

    let mut j = 0;
    for &p in view.perm {
        let i = (p + 1) as usize;
        if !view.is_input[i] {
            view.index[j] = i as i32;
            j += 1;
        }
    }
    for slot in view.index[j..].iter_mut() {
        *slot = 0;
    }

    zero(view.w);
    for i in 0..n {
        let si = &shared.s[i * m..(i + 1) * m];
        for kk in 0..k {
            axpy(&mut view.w[kk * m..(kk + 1) * m], view.v[i * k + kk], si);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MixBatch;
    use mixsat_core::ProblemDims;
    use ndarray::Array2;

    fn init_one(n: usize, k: usize, is_input: &[bool], z: &[f32], v_seed: &[f32]) -> MixBatch {
        let dims = ProblemDims::new(1, n, 4, k).unwrap();
        let s = Array2::<f32>::ones((n, 4));
        let mut batch = MixBatch::new(dims, s.view(), is_input, z).unwrap();
        batch.v_mut().copy_from_slice(v_seed);
        let perm: Vec<i32> = (0..n as i32 - 1).collect();
        let (shared, mut views) = batch.init_views(&perm);
        mix_init(dims, &shared, views.pop().unwrap());
        batch
    }

    #[test]
    fn test_rows_unit_norm_after_init() {
        let n = 4;
        let k = 4;
        let v_seed: Vec<f32> = (0..n * k).map(|i| 0.3 + 0.1 * i as f32).collect();
        let batch = init_one(
            n,
            k,
            &[false, true, false, false],
            &[1.0, 0.5, 0.0, 0.0],
            &v_seed,
        );
        for i in 0..n {
            let row = &batch.v()[i * k..(i + 1) * k];
            let norm: f32 = row.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5, "row {i} norm {norm}");
        }
    }

    #[test]
    fn test_input_row_analytic_values() {
        let k = 4;
        let z = 0.25f32;
        let v_seed = vec![0.1; 2 * k];
        let batch = init_one(2, k, &[false, true], &[1.0, z], &v_seed);
        let row = &batch.v()[k..2 * k];
        let zp = f64::from(z) * std::f64::consts::PI;
        assert!((row[0] - (-(zp.cos()) as f32)).abs() < 1e-6);
        assert!((row[1] - zp.sin() as f32).abs() < 1e-6);
        assert_eq!(&row[2..], &[0.0, 0.0]);
    }

    #[test]
    fn test_input_row_preserves_component_one_sign() {
        let k = 4;
        let mut v_seed = vec![0.1; 2 * k];
        v_seed[k + 1] = -0.7;
        let batch = init_one(2, k, &[false, true], &[1.0, 0.25], &v_seed);
        let row = &batch.v()[k..2 * k];
        assert!(row[1] < 0.0, "sign of component 1 must be preserved");
    }

    #[test]
    fn test_index_lists_outputs_once_zero_terminated() {
        let n = 6;
        let k = 4;
        let is_input = [false, true, false, true, false, false];
        let v_seed: Vec<f32> = (0..n * k).map(|i| 1.0 + i as f32 * 0.01).collect();
        let batch = init_one(n, k, &is_input, &[1.0, 0.5, 0.0, 0.25, 0.0, 0.0], &v_seed);

        let index = batch.index();
        let mut seen: Vec<i32> = index.iter().copied().take_while(|&i| i != 0).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![2, 4, 5]);
        // Everything after the outputs is sentinel.
        for &i in &index[3..] {
            assert_eq!(i, 0);
        }
    }

    #[test]
    fn test_index_respects_permutation_order() {
        let n = 4;
        let k = 4;
        let dims = ProblemDims::new(1, n, 4, k).unwrap();
        let s = Array2::<f32>::ones((n, 4));
        let mut batch =
            MixBatch::new(dims, s.view(), &[false, false, false, false], &[0.0; 4]).unwrap();
        batch.v_mut().fill(0.5);
        // Permutation {2, 0, 1} of {0..2} maps to variables {3, 1, 2}.
        let perm = [2, 0, 1];
        let (shared, mut views) = batch.init_views(&perm);
        mix_init(dims, &shared, views.pop().unwrap());
        assert_eq!(&batch.index()[..3], &[3, 1, 2]);
        assert_eq!(batch.index()[3], 0);
    }

    #[test]
    fn test_init_establishes_running_product() {
        let n = 4;
        let k = 4;
        let m = 4;
        let dims = ProblemDims::new(1, n, m, k).unwrap();
        let s = Array2::from_shape_fn((n, m), |(i, j)| 0.3 * i as f32 - 0.2 * j as f32 + 0.1);
        let mut batch = MixBatch::new(
            dims,
            s.view(),
            &[false, true, false, false],
            &[1.0, 0.4, 0.0, 0.0],
        )
        .unwrap();
        let v_seed: Vec<f32> = (0..n * k).map(|i| (i as f32 * 0.713).sin() + 0.01).collect();
        batch.v_mut().copy_from_slice(&v_seed);
        let perm: Vec<i32> = (0..n as i32 - 1).collect();
        let (shared, mut views) = batch.init_views(&perm);
        mix_init(dims, &shared, views.pop().unwrap());

        for kk in 0..k {
            for j in 0..m {
                let mut expect = 0.0f64;
                for i in 0..n {
                    expect +=
                        f64::from(batch.v()[i * k + kk]) * f64::from(batch.s()[i * m + j]);
                }
                let got = batch.w()[kk * m + j];
                assert!(
                    (got - expect as f32).abs() < 1e-5,
                    "w[{kk},{j}] = {got}, expect {expect}"
                );
            }
        }
    }
}
