//! The shared coordinate-descent sweep.
//!
//! One routine serves both passes. In the forward direction it minimizes
//! the relaxation energy over the unit sphere; in the adjoint direction it
//! runs the same iteration on the linearized fixed-point system, with the
//! buffers reread as their duals: `v` holds U, `w` holds Phi, and the
//! forward pass's V enters through the projection context.
//!
//! The efficiency of the whole method rests on `w` being the live product
//! `V' S`, maintained by a rank-1 correction after every coordinate
//! update instead of ever being recomputed.

use mixsat_dense::{axpy, dot, nrm2, scal};

/// Read-only context that switches a sweep into the adjoint direction.
pub(crate) struct AdjointCtx<'a> {
    /// Diagonal regularizer added to the recorded gradient norms.
    pub prox_lam: f32,
    /// Transformed incoming probability gradients, length `n`.
    pub dz: &'a [f32],
    /// The forward pass's relaxation rows, used to project onto the
    /// tangent plane at each coordinate.
    pub vproj: &'a [f32],
}

/// One sweep over the instance's output variables, in `index` order until
/// the zero sentinel. Returns the accumulated energy decrease (forward
/// direction only; the adjoint direction returns 0).
///
/// `v` and `w` are the working pair (V/W forward, U/Phi adjoint); `gnrm`
/// is written in the forward direction and read in the adjoint one; `g`
/// is the length-`k` scratch row.
#[allow(clippy::too_many_arguments)]
pub(crate) fn mix_sweep(
    m: usize,
    k: usize,
    index: &[i32],
    s: &[f32],
    snrms: &[f32],
    v: &mut [f32],
    w: &mut [f32],
    gnrm: &mut [f32],
    g: &mut [f32],
    adjoint: Option<&AdjointCtx<'_>>,
) -> f32 {
    let mut delta = 0.0f32;
    for &idx in index {
        if idx == 0 {
            break;
        }
        let i = idx as usize;
        let sii = snrms[i];
        let si = &s[i * m..(i + 1) * m];

        // g = W' Si - sii * vi: the projection of this row against all
        // other rows, with its own contribution cancelled.
        for (kk, gk) in g.iter_mut().enumerate() {
            *gk = dot(si, &w[kk * m..(kk + 1) * m]);
        }
        axpy(g, -sii, &v[i * k..(i + 1) * k]);

        let gnrmi = match adjoint {
            None => {
                let norm = nrm2(g);
                scal(g, -1.0);
                norm
            }
            Some(ctx) => {
                // g <- -(I - vi vi')(g + dz[i] e0), scaled below. The
                // external source term touches only component 0 because
                // the truth direction is (1, 0, ..., 0).
                let norm = gnrm[i] + ctx.prox_lam;
                let vp = &ctx.vproj[i * k..(i + 1) * k];
                let c = dot(vp, g) + ctx.dz[i] * vp[0];
                scal(g, -1.0);
                axpy(g, c, vp);
                g[0] -= ctx.dz[i];
                norm
            }
        };
        scal(g, 1.0 / gnrmi);

        // Install the new row; g becomes the row delta.
        let vi = &mut v[i * k..(i + 1) * k];
        for (gk, vk) in g.iter_mut().zip(vi.iter_mut()) {
            let t = *gk;
            *gk -= *vk;
            *vk = t;
        }
        // Rank-1 refresh keeps w equal to the working rows times S.
        for kk in 0..k {
            axpy(&mut w[kk * m..(kk + 1) * m], g[kk], si);
        }

        if adjoint.is_none() {
            delta += gnrmi * dot(g, g);
            gnrm[i] = gnrmi;
        }
    }
    delta
}
