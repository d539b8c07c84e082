//! Per-instance forward solve.

use crate::kernel::mix_sweep;
use crate::state::{ForwardView, SharedS};
use mixsat_core::{ForwardParams, ProblemDims};
use mixsat_dense::saturate;
use tracing::trace;

/// Recover a probability from the truth component of a relaxation row.
///
/// Because the truth direction is `(1, 0, ..., 0)`, the angle against it
/// reduces to `acos` of component 0, and `1 - acos(x)/pi == acos(-x)/pi`
/// matches the `-cos(pi z)` convention the initializer writes.
#[inline]
pub(crate) fn prob_from_v0(v0: f32) -> f32 {
    let x = saturate((v0 + 1.0) / 2.0) * 2.0 - 1.0;
    saturate(1.0 - x.acos() / std::f32::consts::PI)
}

/// Run coordinate-descent sweeps until the per-sweep decrease falls below
/// the ratio threshold seeded by the first sweep, then map the output
/// rows back to probabilities.
///
/// A sweep decrease of exactly zero counts as converged, so an instance
/// whose sweep does no work (every variable an input) stops after the
/// second sweep with `niter = 1`. A run that exhausts `max_iter` is not an
/// error; it simply records `niter = max_iter`.
pub(crate) fn mix_forward(
    dims: ProblemDims,
    shared: &SharedS<'_>,
    view: &mut ForwardView<'_>,
    params: &ForwardParams,
) {
    let ProblemDims { m, k, .. } = dims;
    let mut eps_abs = 0.0f32;
    let mut iter = 0u32;
    while iter < params.max_iter {
        let delta = mix_sweep(
            m,
            k,
            view.index,
            shared.s,
            shared.snrms,
            view.v,
            view.w,
            view.gnrm,
            view.cache,
            None,
        );
        if iter > 0 && (delta < eps_abs || delta == 0.0) {
            break;
        }
        if iter == 0 {
            eps_abs = params.eps * delta;
        }
        iter += 1;
    }
    *view.niter = iter;
    trace!(sweeps = iter, "forward instance done");

    for &idx in view.index {
        if idx == 0 {
            break;
        }
        let i = idx as usize;
        view.z[i] = prob_from_v0(view.v[i * k]);
    }
}
