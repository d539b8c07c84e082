//! Core types for the mixsat differentiable MAXSAT solver.
//!
//! This crate provides the shared vocabulary of the solver stack: problem
//! shapes, solver parameters, the error type, and the numerical constants
//! the forward and backward passes agree on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Floor below which a gradient norm recorded by the forward pass is
/// treated as collapsed during the backward pass.
pub const MEPS: f32 = 1e-24;

/// Errors for mixsat operations.
///
/// Numerical degeneracy during the backward pass is deliberately not an
/// error: the solver zeroes its outgoing gradients and returns normally so
/// the enclosing optimizer can take a no-op step for that instance.
#[derive(Debug, Error)]
pub enum MixError {
    /// A contracted dimension must be padded to a multiple of 4.
    #[error("dimension {name} = {value} must be a nonzero multiple of 4")]
    UnpaddedDim { name: &'static str, value: usize },

    /// A dimension is outside its valid range.
    #[error("invalid dimension {name} = {value}")]
    InvalidDim { name: &'static str, value: usize },

    /// A caller-supplied buffer has the wrong length.
    #[error("buffer {name}: expected length {expected}, got {got}")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        got: usize,
    },

    /// A solver parameter is outside its valid range.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// Worker pool construction failed.
    #[error("thread pool: {0}")]
    ThreadPool(String),
}

pub type Result<T> = std::result::Result<T, MixError>;

/// Shape of a batched problem.
///
/// Every instance in the batch shares the clause matrix and therefore the
/// `n`, `m`, `k` dimensions; only the per-instance buffers are replicated
/// along `batch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemDims {
    /// Number of independent instances in the batch.
    pub batch: usize,
    /// Variables per instance, including the reserved truth variable 0.
    pub n: usize,
    /// Rank of the clause matrix (columns of S). Multiple of 4.
    pub m: usize,
    /// Embedding dimension of the sphere relaxation. Multiple of 4.
    pub k: usize,
}

impl ProblemDims {
    /// Validate and construct a problem shape.
    ///
    /// `m` and `k` are contracted dimensions of the dense kernels and must
    /// be nonzero multiples of 4; callers pad their clause matrices and
    /// embeddings accordingly. `n` counts the reserved truth variable, so
    /// any nonzero value is accepted; an instance holding only the truth
    /// variable has an empty permutation and nothing to solve.
    pub fn new(batch: usize, n: usize, m: usize, k: usize) -> Result<Self> {
        if batch == 0 {
            return Err(MixError::InvalidDim {
                name: "batch",
                value: batch,
            });
        }
        if n == 0 {
            return Err(MixError::InvalidDim { name: "n", value: n });
        }
        if m == 0 || m % 4 != 0 {
            return Err(MixError::UnpaddedDim { name: "m", value: m });
        }
        if k == 0 || k % 4 != 0 {
            return Err(MixError::UnpaddedDim { name: "k", value: k });
        }
        Ok(Self { batch, n, m, k })
    }

    /// Elements in one instance's V (or U) buffer.
    #[inline]
    pub fn v_len(&self) -> usize {
        self.n * self.k
    }

    /// Elements in one instance's W (or Phi) buffer.
    #[inline]
    pub fn w_len(&self) -> usize {
        self.k * self.m
    }

    /// Elements in the shared clause matrix.
    #[inline]
    pub fn s_len(&self) -> usize {
        self.n * self.m
    }
}

/// Parameters of the forward solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForwardParams {
    /// Hard cap on coordinate-descent sweeps.
    pub max_iter: u32,
    /// Stopping ratio: iteration stops once a sweep's decrease falls below
    /// `eps` times the first sweep's decrease.
    pub eps: f32,
}

impl Default for ForwardParams {
    fn default() -> Self {
        Self {
            max_iter: 40,
            eps: 1e-4,
        }
    }
}

impl ForwardParams {
    pub fn validate(&self) -> Result<()> {
        if self.max_iter == 0 {
            return Err(MixError::InvalidParam("max_iter must be >= 1".into()));
        }
        if !(self.eps > 0.0 && self.eps < 1.0) {
            return Err(MixError::InvalidParam(format!(
                "eps must lie in (0, 1), got {}",
                self.eps
            )));
        }
        Ok(())
    }
}

/// Parameters of the backward solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackwardParams {
    /// Diagonal regularizer on the adjoint linear system.
    pub prox_lam: f32,
}

impl Default for BackwardParams {
    fn default() -> Self {
        Self { prox_lam: 1e-2 }
    }
}

impl BackwardParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.prox_lam >= 0.0 && self.prox_lam.is_finite()) {
            return Err(MixError::InvalidParam(format!(
                "prox_lam must be finite and >= 0, got {}",
                self.prox_lam
            )));
        }
        Ok(())
    }
}
