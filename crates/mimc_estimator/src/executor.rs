//! Batch execution of sampling jobs.
//!
//! A batch is an order-independent list of jobs. Executors only evaluate
//! jobs; the estimator merges the returned records into its accumulators
//! after the whole batch has completed, so no accumulator is ever written
//! from a worker thread.

use crate::error::SamplingError;
use crate::sampler::SampleOutput;
use mimc_core::types::Index;
use rayon::prelude::*;

/// One sample evaluation to perform.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleJob {
    /// Index to sample at.
    pub index: Index,
    /// Shift (replicate) the sample belongs to; always 0 for Monte Carlo.
    pub shift: usize,
    /// Realisation of the uncertain inputs.
    pub inputs: Vec<f64>,
}

/// Result of one evaluated [`SampleJob`].
#[derive(Clone, Debug, PartialEq)]
pub struct SampleRecord {
    /// Index sampled at.
    pub index: Index,
    /// Shift the sample belongs to.
    pub shift: usize,
    /// Sampler output.
    pub output: SampleOutput,
    /// Measured wall-clock time in seconds.
    pub elapsed: f64,
}

/// Job evaluation function handed to executors.
pub type JobFn<'a> = dyn Fn(&SampleJob) -> Result<SampleRecord, SamplingError> + Sync + 'a;

/// Strategy for evaluating a batch of jobs.
///
/// Results are returned in job order.
pub trait BatchExecutor: Send + Sync {
    /// Evaluates every job of the batch.
    fn execute(
        &self,
        jobs: &[SampleJob],
        run: &JobFn<'_>,
    ) -> Vec<Result<SampleRecord, SamplingError>>;

    /// Short name used in log events.
    fn name(&self) -> &'static str;
}

/// Evaluates jobs one at a time on the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct SequentialExecutor;

impl BatchExecutor for SequentialExecutor {
    fn execute(
        &self,
        jobs: &[SampleJob],
        run: &JobFn<'_>,
    ) -> Vec<Result<SampleRecord, SamplingError>> {
        jobs.iter().map(run).collect()
    }

    fn name(&self) -> &'static str {
        "sequential"
    }
}

/// Evaluates jobs in parallel with rayon.
///
/// Uses the global rayon pool unless built with
/// [`RayonExecutor::with_workers`].
///
/// # Examples
///
/// ```rust
/// use mimc_estimator::executor::{BatchExecutor, RayonExecutor, SampleJob, SampleRecord};
/// use mimc_estimator::SampleOutput;
/// use mimc_core::types::Index;
///
/// let executor = RayonExecutor::with_workers(2).unwrap();
/// let jobs: Vec<SampleJob> = (0..8)
///     .map(|k| SampleJob { index: Index::zero(1), shift: 0, inputs: vec![k as f64] })
///     .collect();
/// let results = executor.execute(&jobs, &|job: &SampleJob| {
///     Ok(SampleRecord {
///         index: job.index.clone(),
///         shift: job.shift,
///         output: SampleOutput::scalar(job.inputs[0], job.inputs[0]),
///         elapsed: 0.0,
///     })
/// });
/// assert_eq!(results.len(), 8);
/// assert_eq!(results[5].as_ref().unwrap().output.value, vec![5.0]);
/// ```
#[derive(Debug, Default)]
pub struct RayonExecutor {
    pool: Option<rayon::ThreadPool>,
}

impl RayonExecutor {
    /// Executor running on the global rayon pool.
    pub fn new() -> Self {
        Self { pool: None }
    }

    /// Executor running on a dedicated pool of `workers` threads.
    pub fn with_workers(workers: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|k| format!("mimc-worker-{}", k))
            .build()?;
        Ok(Self { pool: Some(pool) })
    }

    /// Number of worker threads in use.
    pub fn workers(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }
}

impl BatchExecutor for RayonExecutor {
    fn execute(
        &self,
        jobs: &[SampleJob],
        run: &JobFn<'_>,
    ) -> Vec<Result<SampleRecord, SamplingError>> {
        let evaluate =
            || -> Vec<Result<SampleRecord, SamplingError>> { jobs.par_iter().map(run).collect() };
        match &self.pool {
            Some(pool) => pool.install(evaluate),
            None => evaluate(),
        }
    }

    fn name(&self) -> &'static str {
        "rayon"
    }
}
