//! Integration scenarios for the batched solver.


use crate::{mix_forward_batch, mix_init_batch, BatchConfig, MixBatch};
use mixsat_core::{ForwardParams, ProblemDims};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Force the serial dispatch path.
pub(crate) fn serial() -> BatchConfig {
    BatchConfig {
        min_batch_for_parallel: usize::MAX,
        max_threads: None,
    }
}

/// Identity permutations for every instance.
pub(crate) fn identity_perm(dims: ProblemDims) -> Vec<i32> {
    let one: Vec<i32> = (0..(dims.n - 1) as i32).collect();
    one.repeat(dims.batch)
}

/// Seed the relaxation rows: row 0 of each instance is pinned to the
/// truth direction, every other row is uniform in [-1, 1]. Instance `b`
/// draws from `seed + b`, so a batch entry reproduces bit-for-bit as a
/// standalone batch of one seeded with `seed + b`.
pub(crate) fn seed_v(batch: &mut MixBatch, seed: u64) {
    let dims = batch.dims();
    let stride = dims.n * dims.k;
    for b in 0..dims.batch {
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(b as u64));
        let rows = &mut batch.v_mut()[b * stride..(b + 1) * stride];
        for x in rows.iter_mut() {
            *x = rng.gen_range(-1.0f32..1.0);
        }
        rows[..dims.k].fill(0.0);
        rows[0] = 1.0;
    }
}

/// Largest |W - V'S| entry across the batch, with the reference product
/// accumulated in f64.
pub(crate) fn max_w_drift(batch: &MixBatch) -> f32 {
    let ProblemDims { batch: b, n, m, k } = batch.dims();
    let mut worst = 0.0f32;
    for bi in 0..b {
        let v = &batch.v()[bi * n * k..(bi + 1) * n * k];
        let w = &batch.w()[bi * k * m..(bi + 1) * k * m];
        for kk in 0..k {
            for j in 0..m {
                let mut expect = 0.0f64;
                for i in 0..n {
                    expect += f64::from(v[i * k + kk]) * f64::from(batch.s()[i * m + j]);
                }
                worst = worst.max((w[kk * m + j] - expect as f32).abs());
            }
        }
    }
    worst
}

pub(crate) const SOFT_IS_INPUT: [bool; 6] = [false, true, true, false, false, false];

/// Mid-range input probabilities, varied a little per instance.
pub(crate) fn soft_z(i: usize) -> [f32; 6] {
    [1.0, 0.3 + 0.07 * i as f32, 0.65 - 0.04 * i as f32, 0.5, 0.5, 0.5]
}

/// A weakly coupled random clause matrix; keeps the fixed point away
/// from the probability boundaries.
pub(crate) fn soft_s(seed: u64) -> Array2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((6, 8), |_| rng.gen_range(-0.4f32..0.4))
}

/// Random soft problem over `b` instances: n = 6 (truth, two inputs,
/// three outputs), m = 8, k = 8.
pub(crate) fn soft_batch(b: usize, s_seed: u64, v_seed: u64) -> (ProblemDims, MixBatch, Vec<i32>) {
    let dims = ProblemDims::new(b, 6, 8, 8).unwrap();
    let s = soft_s(s_seed);
    let mut is_input = Vec::with_capacity(b * 6);
    let mut z = Vec::with_capacity(b * 6);
    for i in 0..b {
        is_input.extend_from_slice(&SOFT_IS_INPUT);
        z.extend_from_slice(&soft_z(i));
    }
    let mut state = MixBatch::new(dims, s.view(), &is_input, &z).unwrap();
    seed_v(&mut state, v_seed);
    let perm = identity_perm(dims);
    (dims, state, perm)
}

pub(crate) fn bits(xs: &[f32]) -> Vec<u32> {
    xs.iter().map(|x| x.to_bits()).collect()
}

#[test]
fn test_rows_stay_unit_norm_through_forward() {
    let (dims, mut state, perm) = soft_batch(2, 11, 17);
    let cfg = serial();
    mix_init_batch(&mut state, &perm, &cfg).unwrap();
    mix_forward_batch(&mut state, &ForwardParams::default(), &cfg).unwrap();
    for bi in 0..dims.batch {
        for i in 0..dims.n {
            let row = &state.v()[(bi * dims.n + i) * dims.k..(bi * dims.n + i + 1) * dims.k];
            let norm: f32 = row.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!(
                (norm - 1.0).abs() < 1e-4,
                "instance {bi} row {i} norm {norm}"
            );
        }
    }
}

#[test]
fn test_running_product_tracks_after_ten_sweeps() {
    let (_, mut state, perm) = soft_batch(1, 23, 29);
    let cfg = serial();
    mix_init_batch(&mut state, &perm, &cfg).unwrap();
    let params = ForwardParams {
        max_iter: 10,
        eps: 1e-9,
    };
    mix_forward_batch(&mut state, &params, &cfg).unwrap();
    let drift = max_w_drift(&state);
    assert!(drift < 1e-4, "running product drifted by {drift}");
}

#[test]
fn test_all_inputs_forward_is_noop() {
    let dims = ProblemDims::new(1, 5, 4, 4).unwrap();
    let s = Array2::from_elem((5, 4), 0.3f32);
    let z = [1.0, 0.2, 0.4, 0.6, 0.8];
    let mut state = MixBatch::new(dims, s.view(), &[true; 5], &z).unwrap();
    seed_v(&mut state, 3);
    let perm = identity_perm(dims);
    let cfg = serial();
    mix_init_batch(&mut state, &perm, &cfg).unwrap();

    let z_before = state.z().to_vec();
    let v_before = state.v().to_vec();
    mix_forward_batch(&mut state, &ForwardParams::default(), &cfg).unwrap();

    assert_eq!(bits(state.z()), bits(&z_before));
    assert_eq!(bits(state.v()), bits(&v_before));
    assert_eq!(state.niter(), &[1]);
}
