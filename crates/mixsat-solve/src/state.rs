//! Batched solver state.
//!
//! [`MixBatch`] owns every buffer the three entry points touch and is
//! allocated exactly once per batch shape; the solver routines themselves
//! never allocate. The clause matrix and its row norms are shared across
//! the batch, everything else is strictly partitioned by instance, which
//! is what lets the launcher hand disjoint mutable views to worker
//! threads.

use mixsat_core::{MixError, ProblemDims, Result};
use mixsat_dense::{dot, AlignedVec};
use ndarray::ArrayView2;

/// All buffers for a batch of mixing problems.
///
/// Layout per instance follows the shared dimensions: `z`, `dz`, `gnrm`,
/// `index`, `is_input` are strided by `n`; `v`, `u` by `n * k`; `w`, `phi`
/// by `k * m`; `ds` by `n * m`; `cache` by `k`. `s` (`n * m`) and `snrms`
/// (`n`) are batch-global.
pub struct MixBatch {
    dims: ProblemDims,
    s: AlignedVec,
    snrms: AlignedVec,
    is_input: Vec<bool>,
    index: Vec<i32>,
    niter: Vec<u32>,
    z: AlignedVec,
    v: AlignedVec,
    w: AlignedVec,
    gnrm: AlignedVec,
    dz: AlignedVec,
    u: AlignedVec,
    phi: AlignedVec,
    ds: AlignedVec,
    cache: AlignedVec,
}

/// Batch-global read-only state handed to every worker.
#[derive(Clone, Copy)]
pub(crate) struct SharedS<'a> {
    pub s: &'a [f32],
    pub snrms: &'a [f32],
}

/// Per-instance view for `mix_init`.
pub(crate) struct InitView<'a> {
    pub is_input: &'a [bool],
    pub index: &'a mut [i32],
    pub z: &'a [f32],
    pub v: &'a mut [f32],
    pub w: &'a mut [f32],
    pub perm: &'a [i32],
}

/// Per-instance view for the forward solve.
pub(crate) struct ForwardView<'a> {
    pub index: &'a [i32],
    pub niter: &'a mut u32,
    pub z: &'a mut [f32],
    pub v: &'a mut [f32],
    pub w: &'a mut [f32],
    pub gnrm: &'a mut [f32],
    pub cache: &'a mut [f32],
}

/// Per-instance view for the backward solve.
pub(crate) struct BackwardView<'a> {
    pub is_input: &'a [bool],
    pub index: &'a [i32],
    pub niter: u32,
    pub z: &'a [f32],
    pub dz: &'a mut [f32],
    pub v: &'a [f32],
    pub u: &'a mut [f32],
    pub w: &'a [f32],
    pub phi: &'a mut [f32],
    pub gnrm: &'a mut [f32],
    pub ds: &'a mut [f32],
    pub cache: &'a mut [f32],
}

impl MixBatch {
    /// Allocate a batch around a shared clause matrix.
    ///
    /// `s` is the `n x m` clause matrix; `is_input` and `z` are flat
    /// batch-major buffers of length `batch * n`. Row norms are computed
    /// here once. The relaxation rows `v` start zeroed: callers seed them
    /// (randomized directions for output variables) through
    /// [`MixBatch::v_mut`] before calling init.
    pub fn new(
        dims: ProblemDims,
        s: ArrayView2<'_, f32>,
        is_input: &[bool],
        z: &[f32],
    ) -> Result<Self> {
        let ProblemDims { batch, n, m, k } = dims;
        if s.dim() != (n, m) {
            return Err(MixError::LengthMismatch {
                name: "s",
                expected: n * m,
                got: s.len(),
            });
        }
        if is_input.len() != batch * n {
            return Err(MixError::LengthMismatch {
                name: "is_input",
                expected: batch * n,
                got: is_input.len(),
            });
        }
        if z.len() != batch * n {
            return Err(MixError::LengthMismatch {
                name: "z",
                expected: batch * n,
                got: z.len(),
            });
        }

        let s = AlignedVec::from_array2(s);
        let mut snrms = AlignedVec::zeros(n);
        {
            let sn = snrms.as_mut_slice();
            let sf = s.as_slice();
            for i in 0..n {
                let row = &sf[i * m..(i + 1) * m];
                sn[i] = dot(row, row);
            }
        }

        Ok(Self {
            dims,
            s,
            snrms,
            is_input: is_input.to_vec(),
            index: vec![0; batch * n],
            niter: vec![0; batch],
            z: AlignedVec::from_slice(z),
            v: AlignedVec::zeros(batch * n * k),
            w: AlignedVec::zeros(batch * k * m),
            gnrm: AlignedVec::zeros(batch * n),
            dz: AlignedVec::zeros(batch * n),
            u: AlignedVec::zeros(batch * n * k),
            phi: AlignedVec::zeros(batch * k * m),
            ds: AlignedVec::zeros(batch * n * m),
            cache: AlignedVec::zeros(batch * k),
        })
    }

    #[inline]
    pub fn dims(&self) -> ProblemDims {
        self.dims
    }

    /// Shared clause matrix, row-major `n x m`.
    pub fn s(&self) -> &[f32] {
        self.s.as_slice()
    }

    /// Per-row squared norms of the clause matrix.
    pub fn snrms(&self) -> &[f32] {
        self.snrms.as_slice()
    }

    pub fn is_input(&self) -> &[bool] {
        &self.is_input
    }

    /// Probabilities, batch-major `batch * n`. Inputs are read by the
    /// solver, outputs are written by the forward pass.
    pub fn z(&self) -> &[f32] {
        self.z.as_slice()
    }

    pub fn z_mut(&mut self) -> &mut [f32] {
        self.z.as_mut_slice()
    }

    /// Replace the whole probability buffer, checking its length.
    pub fn set_z(&mut self, z: &[f32]) -> Result<()> {
        self.z.fill_from("z", z)
    }

    /// Sphere relaxation rows, batch-major `batch * n * k`.
    pub fn v(&self) -> &[f32] {
        self.v.as_slice()
    }

    pub fn v_mut(&mut self) -> &mut [f32] {
        self.v.as_mut_slice()
    }

    /// Running products `V' S`, batch-major `batch * k * m`.
    pub fn w(&self) -> &[f32] {
        self.w.as_slice()
    }

    pub fn gnrm(&self) -> &[f32] {
        self.gnrm.as_slice()
    }

    /// Sweep counts recorded by the most recent forward pass.
    pub fn niter(&self) -> &[u32] {
        &self.niter
    }

    /// Output-variable visitation order, zero-terminated, per instance.
    pub fn index(&self) -> &[i32] {
        &self.index
    }

    /// Incoming (then outgoing) probability gradients, `batch * n`.
    pub fn dz(&self) -> &[f32] {
        self.dz.as_slice()
    }

    pub fn dz_mut(&mut self) -> &mut [f32] {
        self.dz.as_mut_slice()
    }

    /// Replace the incoming gradient buffer, checking its length. This is
    /// the intended way to hand a loss gradient to the backward pass.
    pub fn set_dz(&mut self, dz: &[f32]) -> Result<()> {
        self.dz.fill_from("dz", dz)
    }

    /// Clause-matrix gradient accumulator, batch-major `batch * n * m`.
    pub fn ds(&self) -> &[f32] {
        self.ds.as_slice()
    }

    /// Zero the gradient buffers between training steps.
    pub fn zero_grad(&mut self) {
        mixsat_dense::zero(self.dz.as_mut_slice());
        mixsat_dense::zero(self.ds.as_mut_slice());
    }

    #[cfg(test)]
    pub(crate) fn gnrm_mut(&mut self) -> &mut [f32] {
        self.gnrm.as_mut_slice()
    }

    /// Split into the shared state and disjoint per-instance init views.
    /// `perm` is the flat `batch * (n - 1)` array of caller-supplied
    /// permutations.
    pub(crate) fn init_views<'a>(
        &'a mut self,
        perm: &'a [i32],
    ) -> (SharedS<'a>, Vec<InitView<'a>>) {
        let ProblemDims { batch, n, m, k } = self.dims;
        let mut views = Vec::with_capacity(batch);
        let mut index = &mut self.index[..];
        let mut v = self.v.as_mut_slice();
        let mut w = self.w.as_mut_slice();
        for i in 0..batch {
            let (index_i, rest) = std::mem::take(&mut index).split_at_mut(n);
            index = rest;
            let (v_i, rest) = std::mem::take(&mut v).split_at_mut(n * k);
            v = rest;
            let (w_i, rest) = std::mem::take(&mut w).split_at_mut(k * m);
            w = rest;
            views.push(InitView {
                is_input: &self.is_input[i * n..(i + 1) * n],
                index: index_i,
                z: &self.z.as_slice()[i * n..(i + 1) * n],
                v: v_i,
                w: w_i,
                perm: &perm[i * (n - 1)..(i + 1) * (n - 1)],
            });
        }
        (
            SharedS {
                s: self.s.as_slice(),
                snrms: self.snrms.as_slice(),
            },
            views,
        )
    }

    /// Split into the shared state and disjoint per-instance forward views.
    pub(crate) fn forward_views(&mut self) -> (SharedS<'_>, Vec<ForwardView<'_>>) {
        let ProblemDims { batch, n, m, k } = self.dims;
        let mut views = Vec::with_capacity(batch);
        let mut niter = &mut self.niter[..];
        let mut z = self.z.as_mut_slice();
        let mut v = self.v.as_mut_slice();
        let mut w = self.w.as_mut_slice();
        let mut gnrm = self.gnrm.as_mut_slice();
        let mut cache = self.cache.as_mut_slice();
        for i in 0..batch {
            let (niter_i, rest) = std::mem::take(&mut niter).split_at_mut(1);
            niter = rest;
            let (z_i, rest) = std::mem::take(&mut z).split_at_mut(n);
            z = rest;
            let (v_i, rest) = std::mem::take(&mut v).split_at_mut(n * k);
            v = rest;
            let (w_i, rest) = std::mem::take(&mut w).split_at_mut(k * m);
            w = rest;
            let (gnrm_i, rest) = std::mem::take(&mut gnrm).split_at_mut(n);
            gnrm = rest;
            let (cache_i, rest) = std::mem::take(&mut cache).split_at_mut(k);
            cache = rest;
            views.push(ForwardView {
                index: &self.index[i * n..(i + 1) * n],
                niter: &mut niter_i[0],
                z: z_i,
                v: v_i,
                w: w_i,
                gnrm: gnrm_i,
                cache: cache_i,
            });
        }
        (
            SharedS {
                s: self.s.as_slice(),
                snrms: self.snrms.as_slice(),
            },
            views,
        )
    }

    /// Split into the shared state and disjoint per-instance backward views.
    pub(crate) fn backward_views(&mut self) -> (SharedS<'_>, Vec<BackwardView<'_>>) {
        let ProblemDims { batch, n, m, k } = self.dims;
        let mut views = Vec::with_capacity(batch);
        let mut dz = self.dz.as_mut_slice();
        let mut u = self.u.as_mut_slice();
        let mut phi = self.phi.as_mut_slice();
        let mut gnrm = self.gnrm.as_mut_slice();
        let mut ds = self.ds.as_mut_slice();
        let mut cache = self.cache.as_mut_slice();
        for i in 0..batch {
            let (dz_i, rest) = std::mem::take(&mut dz).split_at_mut(n);
            dz = rest;
            let (u_i, rest) = std::mem::take(&mut u).split_at_mut(n * k);
            u = rest;
            let (phi_i, rest) = std::mem::take(&mut phi).split_at_mut(k * m);
            phi = rest;
            let (gnrm_i, rest) = std::mem::take(&mut gnrm).split_at_mut(n);
            gnrm = rest;
            let (ds_i, rest) = std::mem::take(&mut ds).split_at_mut(n * m);
            ds = rest;
            let (cache_i, rest) = std::mem::take(&mut cache).split_at_mut(k);
            cache = rest;
            views.push(BackwardView {
                is_input: &self.is_input[i * n..(i + 1) * n],
                index: &self.index[i * n..(i + 1) * n],
                niter: self.niter[i],
                z: &self.z.as_slice()[i * n..(i + 1) * n],
                dz: dz_i,
                v: &self.v.as_slice()[i * n * k..(i + 1) * n * k],
                u: u_i,
                w: &self.w.as_slice()[i * k * m..(i + 1) * k * m],
                phi: phi_i,
                gnrm: gnrm_i,
                ds: ds_i,
                cache: cache_i,
            });
        }
        (
            SharedS {
                s: self.s.as_slice(),
                snrms: self.snrms.as_slice(),
            },
            views,
        )
    }
}
