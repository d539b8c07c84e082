//! Batched entry points.
//!
//! Instances are independent: per-instance buffers are disjoint and the
//! clause matrix is read-only during both passes, so the batch dimension
//! is dispatched over rayon's work-stealing pool. Per-instance cost
//! varies with the sweep count, which is exactly the load shape dynamic
//! stealing absorbs. Coordinate updates inside one instance stay strictly
//! sequential; the running-product invariant does not survive concurrent
//! updates.

use crate::state::MixBatch;
use crate::{backward, forward, init};
use mixsat_core::{BackwardParams, ForwardParams, MixError, Result};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info};

/// How the batch dimension is dispatched.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Below this batch size, instances run serially on the calling
    /// thread; the pool overhead isn't worth it.
    pub min_batch_for_parallel: usize,
    /// Maximum worker threads. `None` uses rayon's global pool.
    pub max_threads: Option<usize>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            min_batch_for_parallel: 4,
            max_threads: None,
        }
    }
}

fn run_batch<V, F>(views: Vec<V>, config: &BatchConfig, run: F) -> Result<()>
where
    V: Send,
    F: Fn(V) + Sync + Send,
{
    if views.len() < config.min_batch_for_parallel || config.max_threads == Some(1) {
        debug!(batch = views.len(), "dispatching serially");
        views.into_iter().for_each(run);
        return Ok(());
    }
    match config.max_threads {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| MixError::ThreadPool(e.to_string()))?;
            pool.install(|| views.into_par_iter().for_each(&run));
        }
        None => views.into_par_iter().for_each(&run),
    }
    Ok(())
}

/// Initialize every instance: analytic input rows, renormalized output
/// rows, permuted visitation order.
///
/// `perm` is the flat `batch * (n - 1)` array of per-instance
/// permutations of `{0, ..., n - 2}`.
pub fn mix_init_batch(batch: &mut MixBatch, perm: &[i32], config: &BatchConfig) -> Result<()> {
    let dims = batch.dims();
    let expected = dims.batch * (dims.n - 1);
    if perm.len() != expected {
        return Err(MixError::LengthMismatch {
            name: "perm",
            expected,
            got: perm.len(),
        });
    }
    debug!(batch = dims.batch, n = dims.n, "init batch");
    let (shared, views) = batch.init_views(perm);
    run_batch(views, config, |view| init::mix_init(dims, &shared, view))
}

/// Run the forward solve on every instance. Writes `z` (outputs), `v`,
/// `w`, `gnrm` and `niter`.
pub fn mix_forward_batch(
    batch: &mut MixBatch,
    params: &ForwardParams,
    config: &BatchConfig,
) -> Result<()> {
    params.validate()?;
    let dims = batch.dims();
    let start = Instant::now();
    let (shared, views) = batch.forward_views();
    run_batch(views, config, |mut view| {
        forward::mix_forward(dims, &shared, &mut view, params)
    })?;
    info!(
        batch = dims.batch,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "forward batch done"
    );
    Ok(())
}

/// Run the backward solve on every instance. Consumes the forward pass's
/// `v`, `w`, `gnrm`, `niter` and the incoming `dz`; accumulates into `ds`
/// and rewrites `dz` with the outgoing gradients.
pub fn mix_backward_batch(
    batch: &mut MixBatch,
    params: &BackwardParams,
    config: &BatchConfig,
) -> Result<()> {
    params.validate()?;
    let dims = batch.dims();
    let start = Instant::now();
    let (shared, views) = batch.backward_views();
    run_batch(views, config, |mut view| {
        backward::mix_backward(dims, &shared, &mut view, params)
    })?;
    info!(
        batch = dims.batch,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "backward batch done"
    );
    Ok(())
}
