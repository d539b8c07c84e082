//! Aligned dense storage and vector primitives for the mixing solver.
//!
//! The solver's hot loop contracts over the clause rank `m` and the
//! embedding dimension `k`, both of which callers pad to multiples of 4.
//! [`AlignedVec`] encodes the storage half of that contract: its base
//! pointer is 16-byte aligned and its backing capacity is always a whole
//! number of 4-float lanes, with any tail padding zeroed.
//!
//! The primitives themselves live in [`simd`].

pub mod simd;

pub use simd::{axpy, copy, dot, nrm2, saturate, scal, zero};

use mixsat_core::{MixError, Result};
use ndarray::ArrayView2;

/// One 4-float lane. The alignment of this type is what makes the backing
/// storage of [`AlignedVec`] 16-byte aligned.
#[derive(Clone, Copy, Default)]
#[repr(C, align(16))]
struct Lane([f32; 4]);

/// A 16-byte-aligned `f32` buffer.
///
/// The logical length is whatever the caller asked for; the backing
/// storage is rounded up to a whole number of lanes and the padding floats
/// are kept at zero. Slices taken at lane-multiple offsets (which is how
/// the solver partitions its `k`- and `m`-strided buffers) stay 16-byte
/// aligned.
#[derive(Clone)]
pub struct AlignedVec {
    lanes: Vec<Lane>,
    len: usize,
}

impl AlignedVec {
    /// A zero-filled buffer of `len` floats.
    pub fn zeros(len: usize) -> Self {
        Self {
            lanes: vec![Lane::default(); len.div_ceil(4)],
            len,
        }
    }

    /// Copy `data` into a fresh aligned buffer, zero-padding the tail lane.
    pub fn from_slice(data: &[f32]) -> Self {
        let mut out = Self::zeros(data.len());
        out.as_mut_slice().copy_from_slice(data);
        out
    }

    /// Flatten a row-major matrix view into a fresh aligned buffer.
    ///
    /// Rows are laid out contiguously; callers that need lane-aligned rows
    /// must pad the column count to a multiple of 4 themselves (the solver
    /// validates this at its API boundary).
    pub fn from_array2(a: ArrayView2<'_, f32>) -> Self {
        let (rows, cols) = a.dim();
        let mut out = Self::zeros(rows * cols);
        let dst = out.as_mut_slice();
        if let Some(src) = a.as_slice() {
            dst.copy_from_slice(src);
        } else {
            for (i, row) in a.rows().into_iter().enumerate() {
                for (j, &v) in row.iter().enumerate() {
                    dst[i * cols + j] = v;
                }
            }
        }
        out
    }

    /// Copy `data` into an existing buffer of the same logical length.
    pub fn fill_from(&mut self, name: &'static str, data: &[f32]) -> Result<()> {
        if data.len() != self.len {
            return Err(MixError::LengthMismatch {
                name,
                expected: self.len,
                got: data.len(),
            });
        }
        self.as_mut_slice().copy_from_slice(data);
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        // SAFETY: Lane is repr(C) over [f32; 4], so the lane storage is
        // `4 * lanes.len()` contiguous initialized floats, of which the
        // first `len` are the logical contents.
        unsafe { std::slice::from_raw_parts(self.lanes.as_ptr().cast(), self.len) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        // SAFETY: as for `as_slice`; the padding floats past `len` are
        // never exposed mutably, so they stay zero.
        unsafe { std::slice::from_raw_parts_mut(self.lanes.as_mut_ptr().cast(), self.len) }
    }
}

impl std::fmt::Debug for AlignedVec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedVec").field("len", &self.len).finish()
    }
}
