//! Batched mixing-method solver for differentiable MAXSAT layers.
//!
//! Given a batch of partially specified Boolean assignments and a shared
//! low-rank clause matrix, the forward pass relaxes each variable to a
//! unit vector and runs coordinate descent on the sphere until the
//! per-sweep energy decrease stalls, then reads the output probabilities
//! back off the truth component. The backward pass treats that fixed
//! point as a linear system and runs the same sweep in adjoint form,
//! producing analytic gradients with respect to the clause matrix and
//! the input probabilities.
//!
//! # Usage
//! ```ignore
//! use mixsat_core::{BackwardParams, ForwardParams, ProblemDims};
//! use mixsat_solve::{mix_backward_batch, mix_forward_batch, mix_init_batch};
//! use mixsat_solve::{BatchConfig, MixBatch};
//!
//! let dims = ProblemDims::new(batch, n, m, k)?;
//! let mut state = MixBatch::new(dims, s.view(), &is_input, &z)?;
//! seed_output_rows(state.v_mut());
//!
//! let cfg = BatchConfig::default();
//! mix_init_batch(&mut state, &perm, &cfg)?;
//! mix_forward_batch(&mut state, &ForwardParams::default(), &cfg)?;
//!
//! state.set_dz(&loss_grad)?;
//! mix_backward_batch(&mut state, &BackwardParams::default(), &cfg)?;
//! // state.dz() and state.ds() now hold the outgoing gradients.
//! ```

mod backward;
mod forward;
mod init;
mod kernel;
mod parallel;
mod state;

#[cfg(test)]
mod tests;

pub use parallel::{mix_backward_batch, mix_forward_batch, mix_init_batch, BatchConfig};
pub use state::MixBatch;
