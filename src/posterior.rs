//! Posterior draws grouped by chain.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Retained draws of one chain, in iteration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainDraws {
    /// Chain index, 0-based.
    pub chain_id: usize,
    /// One full parameter vector per retained iteration.
    pub draws: Vec<Vec<f64>>,
}

impl ChainDraws {
    /// Number of retained iterations.
    pub fn len(&self) -> usize {
        self.draws.len()
    }

    /// True when the chain retained nothing.
    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    /// Sequence of one parameter across iterations.
    pub fn parameter(&self, index: usize) -> Vec<f64> {
        self.draws.iter().map(|d| d[index]).collect()
    }
}

/// Post-warm-up draws of every chain with their parameter names.
///
/// Every draw has exactly one value per parameter name; this is checked on
/// construction and on deserialization through [`PosteriorDraws::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteriorDraws {
    parameter_names: Vec<String>,
    chains: Vec<ChainDraws>,
}

impl PosteriorDraws {
    /// Bundle chains under a shared parameter list.
    ///
    /// # Errors
    /// `FitFailed` if there are no chains, a chain is empty, or a draw's
    /// length differs from the number of parameters.
    pub fn new(parameter_names: Vec<String>, chains: Vec<ChainDraws>) -> Result<Self, ModelError> {
        let draws = Self {
            parameter_names,
            chains,
        };
        draws.check()?;
        Ok(draws)
    }

    pub(crate) fn check(&self) -> Result<(), ModelError> {
        if self.chains.is_empty() {
            return Err(ModelError::fit_failed("posterior has no chains"));
        }
        let p = self.parameter_names.len();
        for chain in &self.chains {
            if chain.is_empty() {
                return Err(ModelError::fit_failed(format!(
                    "chain {} has no draws",
                    chain.chain_id
                )));
            }
            if let Some(bad) = chain.draws.iter().find(|d| d.len() != p) {
                return Err(ModelError::fit_failed(format!(
                    "chain {} has a draw of length {}, expected {}",
                    chain.chain_id,
                    bad.len(),
                    p
                )));
            }
        }
        Ok(())
    }

    /// Parameter names in draw-vector order.
    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    /// Position of `name` in the draw vectors.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.parameter_names.iter().position(|n| n == name)
    }

    /// The chains.
    pub fn chains(&self) -> &[ChainDraws] {
        &self.chains
    }

    /// Number of chains.
    pub fn n_chains(&self) -> usize {
        self.chains.len()
    }

    /// Draws across all chains.
    pub fn total_draws(&self) -> usize {
        self.chains.iter().map(ChainDraws::len).sum()
    }

    /// Per-chain sequences of one parameter, in original draw order.
    pub fn trace(&self, index: usize) -> Vec<Vec<f64>> {
        self.chains.iter().map(|c| c.parameter(index)).collect()
    }

    /// All draws of one parameter, chains concatenated in chain order.
    pub fn pooled(&self, index: usize) -> Vec<f64> {
        self.chains
            .iter()
            .flat_map(|c| c.draws.iter().map(move |d| d[index]))
            .collect()
    }

    /// Iterate over every draw vector, chains in order.
    pub fn iter_draws(&self) -> impl Iterator<Item = &[f64]> {
        self.chains
            .iter()
            .flat_map(|c| c.draws.iter().map(Vec::as_slice))
    }

    /// Mean of every parameter over the pooled draws.
    pub fn means(&self) -> Vec<f64> {
        let p = self.parameter_names.len();
        let mut sums = vec![0.0; p];
        let mut count = 0usize;
        for draw in self.iter_draws() {
            for (s, v) in sums.iter_mut().zip(draw) {
                *s += v;
            }
            count += 1;
        }
        sums.into_iter().map(|s| s / count as f64).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draws() -> PosteriorDraws {
        PosteriorDraws::new(
            vec!["a".into(), "b".into()],
            vec![
                ChainDraws {
                    chain_id: 0,
                    draws: vec![vec![1.0, 10.0], vec![2.0, 20.0]],
                },
                ChainDraws {
                    chain_id: 1,
                    draws: vec![vec![3.0, 30.0], vec![4.0, 40.0]],
                },
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_trace_keeps_chain_order() {
        let d = draws();
        assert_eq!(d.trace(0), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn test_pooled_and_means() {
        let d = draws();
        assert_eq!(d.pooled(1), vec![10.0, 20.0, 30.0, 40.0]);
        assert_eq!(d.means(), vec![2.5, 25.0]);
        assert_eq!(d.total_draws(), 4);
        assert_eq!(d.index_of("b"), Some(1));
    }

    #[test]
    fn test_ragged_draw_rejected() {
        let err = PosteriorDraws::new(
            vec!["a".into(), "b".into()],
            vec![ChainDraws {
                chain_id: 0,
                draws: vec![vec![1.0]],
            }],
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::FitFailed { .. }));
    }

    #[test]
    fn test_no_chains_rejected() {
        assert!(PosteriorDraws::new(vec!["a".into()], vec![]).is_err());
    }
}
