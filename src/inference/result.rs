//! Everything one trajectory produces.

use ndarray::{Array1, Array2, Array3, Array5, ArrayD};
use serde::{Deserialize, Serialize};

use crate::{Result, model::ModelDims, model::Policy};

/// Result of a trajectory.
///
/// Time-indexed arrays keep one column per time step of the horizon. When the
/// trajectory terminates early only the first [`steps`](Self::steps) columns
/// hold realized data; later columns keep the predictions made at termination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryResult {
    pub dims: ModelDims,

    /// Number of time steps actually simulated
    pub steps: usize,

    /// Realized hidden states, `[factor][t]`
    pub states: Vec<Vec<usize>>,

    /// Realized outcomes, `[modality][t]`
    pub outcomes: Vec<Vec<usize>>,

    /// Outcome distributions the agent conditioned on, `[modality][t]`
    pub outcome_distributions: Vec<Vec<Array1<f64>>>,

    /// Actions taken, `[factor][t]` for every step but the last
    pub actions: Vec<Vec<usize>>,

    /// Sharpened joint action probabilities, one tensor per action taken
    pub action_probabilities: Vec<ArrayD<f64>>,

    /// Policy set at the end of the trajectory
    pub policies: Vec<Policy>,

    /// Final per-policy beliefs, per factor `(Ns, T, Np)`
    pub policy_beliefs: Vec<Array3<f64>>,

    /// Bayesian model averages of the beliefs, per factor `(Ns, T)`
    pub averaged_beliefs: Vec<Array2<f64>>,

    /// Policy posterior per time step, `(Np, T)`
    pub policy_posterior: Array2<f64>,

    /// Negative variational free energy per policy and time, `(Np, T)`
    pub free_energy: Array2<f64>,

    /// Negative expected free energy per policy and time, `(Np, T)`
    pub expected_free_energy: Array2<f64>,

    /// Expected precision after every precision iteration
    pub precision: Vec<f64>,

    /// Policy posterior after every precision iteration, `(Np, Ni·steps)`
    pub policy_posterior_trace: Array2<f64>,

    /// Phasic precision signal derived from the precision trace
    pub phasic_precision: Vec<f64>,

    /// Beliefs after every sweep, per factor `(Ni, Ns, T, T, Np)`
    /// indexed `[sweep, level, time point, time step, policy]`
    pub belief_trace: Vec<Array5<f64>>,

    /// Mean-centred free-energy gradients, same layout as `belief_trace`
    pub gradient_trace: Vec<Array5<f64>>,

    /// Updated concentration parameters, when learning ran
    pub learned: Option<LearnedParameters>,
}

/// Concentration parameters after learning and their complexity cost.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearnedParameters {
    pub likelihood: Option<Vec<ArrayD<f64>>>,
    pub transitions: Option<Vec<Array3<f64>>>,
    pub initial_states: Option<Vec<Array1<f64>>>,
    /// KL divergence from prior to posterior concentration, per tensor
    pub complexity: Complexity,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Complexity {
    pub likelihood: Vec<f64>,
    pub transitions: Vec<f64>,
    pub initial_states: Vec<f64>,
}

impl TrajectoryResult {
    /// Realized joint action at step `t`.
    pub fn action_at(&self, t: usize) -> Option<Vec<usize>> {
        self.actions.iter().map(|row| row.get(t).copied()).collect()
    }

    /// Mean expected precision over the whole trajectory.
    pub fn mean_precision(&self) -> f64 {
        if self.precision.is_empty() {
            return 0.0;
        }
        self.precision.iter().sum::<f64>() / self.precision.len() as f64
    }

    /// Save result to JSON file
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), self)?;
        Ok(())
    }

    /// Load result from JSON file
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let result = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(result)
    }
}
