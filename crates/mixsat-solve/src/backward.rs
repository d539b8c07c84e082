//! Per-instance backward solve: the linearized adjoint of the forward
//! fixed point, plus gradient assembly.
//!
//! The adjoint projection follows the forward implementation's sign
//! convention for the external source term (it enters the projection
//! before negation, and component 0 is then shifted by the raw source).
//! A textbook derivation of the tangent-space adjoint writes that last
//! sign the other way; both variants train, and this one is the shipped
//! behavior, so it is deliberately left alone.

use crate::kernel::{mix_sweep, AdjointCtx};
use crate::state::{BackwardView, SharedS};
use mixsat_core::{BackwardParams, ProblemDims, MEPS};
use mixsat_dense::{axpy, dot, zero};
use std::f64::consts::PI;
use tracing::debug;

/// Solve the adjoint system for `niter` sweeps and assemble the clause
/// and probability gradients.
///
/// Degenerate instances (an output probability pinned at the boundary, a
/// collapsed forward gradient norm, or a non-finite adjoint) zero the
/// outgoing `dz` and leave `ds` untouched; the caller sees a normal
/// return either way. An instance with no output variables passes `dz`
/// through unchanged.
pub(crate) fn mix_backward(
    dims: ProblemDims,
    shared: &SharedS<'_>,
    view: &mut BackwardView<'_>,
    params: &BackwardParams,
) {
    let ProblemDims { n, m, k, .. } = dims;

    if view.index.first() == Some(&0) {
        return;
    }

    // Pull the incoming gradients through the probability map:
    // dz[o] <- dz[o] / (pi sin(pi z[o])). A boundary probability makes
    // the factor blow up (or 0/0 into NaN); a collapsed gnrm means the
    // forward iterate carries no usable curvature. Either way the whole
    // instance degenerates to a zero gradient.
    let mut invalid = false;
    for &idx in view.index {
        if idx == 0 {
            break;
        }
        let i = idx as usize;
        let zi = view.z[i];
        let dzi = (f64::from(view.dz[i]) / PI / (f64::from(zi) * PI).sin()) as f32;
        if !(zi > 0.0 && zi < 1.0) || !dzi.is_finite() || view.gnrm[i] < MEPS {
            invalid = true;
        }
        view.dz[i] = dzi;
    }
    if invalid {
        zero(view.dz);
        debug!("degenerate backward instance, gradients zeroed");
        return;
    }

    // The adjoint runs the same sweep for exactly the sweep count the
    // forward pass used, with U/Phi as the working pair and forward's V
    // as the tangent projection.
    zero(view.u);
    zero(view.phi);
    for _ in 0..view.niter {
        let ctx = AdjointCtx {
            prox_lam: params.prox_lam,
            dz: &view.dz[..],
            vproj: view.v,
        };
        mix_sweep(
            m,
            k,
            view.index,
            shared.s,
            shared.snrms,
            view.u,
            view.phi,
            view.gnrm,
            view.cache,
            Some(&ctx),
        );
    }

    if view.u.iter().any(|x| !x.is_finite()) {
        zero(view.dz);
        debug!("non-finite adjoint, gradients zeroed");
        return;
    }

    // dS row i accumulates U[i] (x) W + V[i] (x) Phi.
    for i in 0..n {
        let ds_i = &mut view.ds[i * m..(i + 1) * m];
        for kk in 0..k {
            axpy(ds_i, view.u[i * k + kk], &view.w[kk * m..(kk + 1) * m]);
            axpy(ds_i, view.v[i * k + kk], &view.phi[kk * m..(kk + 1) * m]);
        }
    }

    // Outgoing probability gradients. Only components 0 and 1 of Phi
    // carry signal for an input row, mirroring how the initializer
    // writes inputs into those two components.
    for i in 1..n {
        if !view.is_input[i] {
            view.dz[i] = 0.0;
            continue;
        }
        let si = &shared.s[i * m..(i + 1) * m];
        let val1 = f64::from(dot(si, &view.phi[..m]));
        let val2 = f64::from(dot(si, &view.phi[m..2 * m]));
        let zp = f64::from(view.z[i]) * PI;
        let sign = f64::from(view.v[i * k + 1].signum());
        view.dz[i] =
            ((f64::from(view.dz[i]) + val1) * zp.sin() * PI + val2 * sign * zp.cos() * PI * PI)
                as f32;
    }
}
