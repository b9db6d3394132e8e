//! Worker sub-domains and the parallel map over them.
//!
//! Every target tile is split into row blocks, one per worker. Workers run on
//! the rayon pool and share nothing mutable; `map_jobs` returns once all of
//! them have finished, in job order, which is the only synchronisation point
//! the reductions need.

use crate::error::Result;
use mosaic_grid::{decompose, Domain, Mosaic};
use rayon::prelude::*;

/// One worker's share of one target tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Job {
    pub target_tile: usize,
    pub domain: Domain,
}

/// Decompose every target tile into `workers` row blocks.
pub fn plan_jobs(target: &Mosaic, workers: usize) -> Result<Vec<Job>> {
    let mut jobs = Vec::new();
    for (n, tile) in target.tiles().iter().enumerate() {
        for domain in decompose(tile.nx(), tile.ny(), workers)? {
            jobs.push(Job {
                target_tile: n,
                domain,
            });
        }
    }
    Ok(jobs)
}

/// Run `f` on every item in parallel and collect the results in order.
///
/// The first error aborts the collection.
pub fn map_jobs<T, R, F>(items: &[T], f: F) -> Result<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> Result<R> + Sync + Send,
{
    items.par_iter().map(f).collect()
}
