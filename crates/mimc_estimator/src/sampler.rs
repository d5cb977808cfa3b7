//! User-facing contracts: the sampling function and the optional cost model.

use crate::error::SamplingError;
use mimc_core::types::Index;

/// One realisation returned by a [`Sampler`].
///
/// `difference` holds `ΔQ_α`, the quantity of interest at `α` minus the
/// combination of coarser evaluations; at the root index it equals `value`.
/// `value` holds the non-differenced `Q_α`. Both have one entry per quantity
/// of interest.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleOutput {
    /// Telescoping difference per quantity of interest.
    pub difference: Vec<f64>,
    /// Non-differenced value per quantity of interest.
    pub value: Vec<f64>,
    /// Cost reported by the sampler, in any consistent unit.
    pub cost: Option<f64>,
}

impl SampleOutput {
    /// Output with separate difference and value vectors.
    pub fn new(difference: Vec<f64>, value: Vec<f64>) -> Self {
        Self {
            difference,
            value,
            cost: None,
        }
    }

    /// Scalar output for a single quantity of interest.
    ///
    /// # Examples
    ///
    /// ```
    /// use mimc_estimator::SampleOutput;
    ///
    /// let out = SampleOutput::scalar(0.25, 1.25).with_cost(4.0);
    /// assert_eq!(out.difference, vec![0.25]);
    /// assert_eq!(out.cost, Some(4.0));
    /// ```
    pub fn scalar(difference: f64, value: f64) -> Self {
        Self::new(vec![difference], vec![value])
    }

    /// Attaches a sampler-reported cost.
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    /// Validates shape and finiteness against the configured number of
    /// quantities of interest.
    pub fn check(&self, nb_of_qoi: usize) -> Result<(), SamplingError> {
        for found in [self.difference.len(), self.value.len()] {
            if found != nb_of_qoi {
                return Err(SamplingError::QoiMismatch {
                    expected: nb_of_qoi,
                    found,
                });
            }
        }
        let non_finite = self
            .difference
            .iter()
            .zip(&self.value)
            .position(|(d, v)| !(d.is_finite() && v.is_finite()));
        if let Some(qoi) = non_finite {
            return Err(SamplingError::NonFinite { qoi });
        }
        if let Some(cost) = self.cost {
            if !(cost.is_finite() && cost >= 0.0) {
                return Err(SamplingError::failed(format!(
                    "reported cost must be finite and non-negative, got {}",
                    cost
                )));
            }
        }
        Ok(())
    }
}

/// Sampling function evaluated at a discretisation index.
///
/// `inputs` holds one realisation of the uncertain inputs (empty if the
/// estimator was built without distributions). Implementations must be free
/// of side effects on estimator state; they may be called concurrently from
/// several worker threads.
///
/// Any `Fn(&Index, &[f64]) -> Result<SampleOutput, SamplingError> + Sync`
/// closure is a sampler.
pub trait Sampler: Sync {
    /// Draws one sample at `index` for the given inputs.
    fn sample(&self, index: &Index, inputs: &[f64]) -> Result<SampleOutput, SamplingError>;
}

impl<F> Sampler for F
where
    F: Fn(&Index, &[f64]) -> Result<SampleOutput, SamplingError> + Sync,
{
    #[inline]
    fn sample(&self, index: &Index, inputs: &[f64]) -> Result<SampleOutput, SamplingError> {
        self(index, inputs)
    }
}

/// Cost of one sample at an index.
///
/// Returning `None` lets the estimator fall back to the sampler-reported cost
/// or, failing that, to measured wall-clock time.
pub trait CostModel: Send + Sync {
    /// Cost of one sample at `index`.
    fn cost(&self, index: &Index) -> Option<f64>;
}

impl<F> CostModel for F
where
    F: Fn(&Index) -> f64 + Send + Sync,
{
    #[inline]
    fn cost(&self, index: &Index) -> Option<f64> {
        Some(self(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_shape() {
        let out = SampleOutput::new(vec![1.0, 2.0], vec![1.0]);
        assert_eq!(
            out.check(2),
            Err(SamplingError::QoiMismatch {
                expected: 2,
                found: 1
            })
        );
        assert!(SampleOutput::scalar(1.0, 1.0).check(1).is_ok());
    }

    #[test]
    fn test_check_finiteness() {
        let out = SampleOutput::new(vec![1.0, f64::NAN], vec![1.0, 1.0]);
        assert_eq!(out.check(2), Err(SamplingError::NonFinite { qoi: 1 }));
        let out = SampleOutput::scalar(1.0, 1.0).with_cost(-1.0);
        assert!(matches!(out.check(1), Err(SamplingError::Failed(_))));
    }

    #[test]
    fn test_closures_implement_contracts() {
        let sampler = |index: &Index, inputs: &[f64]| {
            Ok::<_, SamplingError>(SampleOutput::scalar(index.sum() as f64, inputs[0]))
        };
        let out = sampler.sample(&Index::from([1, 2]), &[0.5]).unwrap();
        assert_eq!(out.difference, vec![3.0]);

        let cost = |index: &Index| 2f64.powi(index.sum() as i32);
        assert_eq!(cost.cost(&Index::from([3])), Some(8.0));
    }
}
