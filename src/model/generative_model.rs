//! Serializable model definition and its validation.

use ndarray::{Array1, Array2, Array3, ArrayD, Axis};
use serde::{Deserialize, Serialize};

use super::policies::{MovingPolicy, Policy};
use crate::{Error, Result};

/// Problem definition for one trajectory.
///
/// The likelihood, transition, and initial-state tensors describe the true
/// generative process from which states and outcomes are sampled. When the
/// corresponding concentration parameters are present the agent infers with
/// their normalized expectations instead, and learns them after the trajectory.
///
/// Tensor conventions (axis 0 is always the distribution axis):
/// - `likelihood[g]`: `(No(g), Ns(1), …, Ns(Nf))`
/// - `transitions[f]`: `(Ns(f), Ns(f), Nu(f))`, indexed `[next, previous, action]`
/// - `preferences[g]`: `(No(g), 1)` or `(No(g), T)`, unnormalized log preferences
/// - `initial_states[f]`: `(Ns(f))`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerativeModel {
    /// Likelihood mappings A
    pub likelihood: Vec<ArrayD<f64>>,
    /// Transition kernels B
    pub transitions: Vec<Array3<f64>>,
    /// Preferences C; empty means flat preferences for every modality
    #[serde(default)]
    pub preferences: Vec<Array2<f64>>,
    /// Initial-state prior D; empty means uniform for every factor
    #[serde(default)]
    pub initial_states: Vec<Array1<f64>>,
    /// Policy prior E; defaults to uniform
    #[serde(default)]
    pub policy_prior: Option<Array1<f64>>,
    /// Allowable policies; may be empty only in moving-policy mode
    #[serde(default)]
    pub policies: Vec<Policy>,
    /// Number of time steps; defaults to the policy length plus one
    #[serde(default)]
    pub horizon: Option<usize>,
    /// Concentration parameters a for the likelihood
    #[serde(default)]
    pub likelihood_concentration: Option<Vec<ArrayD<f64>>>,
    /// Concentration parameters b for the transitions
    #[serde(default)]
    pub transition_concentration: Option<Vec<Array3<f64>>>,
    /// Concentration parameters d for the initial states
    #[serde(default)]
    pub initial_concentration: Option<Vec<Array1<f64>>>,
    /// Single-step action repertoire; enables moving-policy mode
    #[serde(default)]
    pub moving_policy: Option<MovingPolicy>,
    /// Caller-supplied states, outcomes, and actions
    #[serde(default)]
    pub overrides: Overrides,
}

/// Ground-truth values injected by the caller instead of being sampled.
///
/// Each table is indexed `[factor or modality][time]`; missing rows, short rows,
/// and `None` entries are sampled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overrides {
    #[serde(default)]
    pub states: Vec<Vec<Option<usize>>>,
    #[serde(default)]
    pub outcomes: Vec<Vec<Option<usize>>>,
    #[serde(default)]
    pub actions: Vec<Vec<Option<usize>>>,
}

impl Overrides {
    pub fn state(&self, factor: usize, t: usize) -> Option<usize> {
        lookup(&self.states, factor, t)
    }

    pub fn outcome(&self, modality: usize, t: usize) -> Option<usize> {
        lookup(&self.outcomes, modality, t)
    }

    pub fn action(&self, factor: usize, t: usize) -> Option<usize> {
        lookup(&self.actions, factor, t)
    }

    /// Set (or clear) the state of `factor` at time `t`, growing the table as needed.
    pub fn set_state(&mut self, factor: usize, t: usize, state: Option<usize>) {
        if self.states.len() <= factor {
            self.states.resize(factor + 1, Vec::new());
        }
        let row = &mut self.states[factor];
        if row.len() <= t {
            row.resize(t + 1, None);
        }
        row[t] = state;
    }
}

fn lookup(table: &[Vec<Option<usize>>], row: usize, t: usize) -> Option<usize> {
    table.get(row).and_then(|r| r.get(t)).copied().flatten()
}

/// Dimensions of a validated model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDims {
    /// Levels per hidden-state factor, Ns(f)
    pub states: Vec<usize>,
    /// Levels per outcome modality, No(g)
    pub outcomes: Vec<usize>,
    /// Control levels per factor, Nu(f)
    pub controls: Vec<usize>,
    /// Number of time steps T
    pub horizon: usize,
    /// Number of policies Np
    pub policies: usize,
}

impl ModelDims {
    pub fn factors(&self) -> usize {
        self.states.len()
    }

    pub fn modalities(&self) -> usize {
        self.outcomes.len()
    }
}

impl GenerativeModel {
    /// Create a model from its required parts; optional parts default.
    pub fn new(likelihood: Vec<ArrayD<f64>>, transitions: Vec<Array3<f64>>, policies: Vec<Policy>) -> Self {
        Self {
            likelihood,
            transitions,
            preferences: Vec::new(),
            initial_states: Vec::new(),
            policy_prior: None,
            policies,
            horizon: None,
            likelihood_concentration: None,
            transition_concentration: None,
            initial_concentration: None,
            moving_policy: None,
            overrides: Overrides::default(),
        }
    }

    pub fn with_preferences(mut self, preferences: Vec<Array2<f64>>) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn with_initial_states(mut self, initial_states: Vec<Array1<f64>>) -> Self {
        self.initial_states = initial_states;
        self
    }

    pub fn with_policy_prior(mut self, prior: Array1<f64>) -> Self {
        self.policy_prior = Some(prior);
        self
    }

    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = Some(horizon);
        self
    }

    pub fn with_likelihood_concentration(mut self, a: Vec<ArrayD<f64>>) -> Self {
        self.likelihood_concentration = Some(a);
        self
    }

    pub fn with_transition_concentration(mut self, b: Vec<Array3<f64>>) -> Self {
        self.transition_concentration = Some(b);
        self
    }

    pub fn with_initial_concentration(mut self, d: Vec<Array1<f64>>) -> Self {
        self.initial_concentration = Some(d);
        self
    }

    pub fn with_moving_policy(mut self, moving: MovingPolicy) -> Self {
        self.moving_policy = Some(moving);
        self
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Load a model from a JSON file.
    pub fn from_json_file(path: &std::path::Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|source| Error::Io {
            operation: format!("open model file '{}'", path.display()),
            source,
        })?;
        let model = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(model)
    }

    /// Check every shape and range before any inference runs.
    pub fn validate(&self) -> Result<ModelDims> {
        if self.likelihood.is_empty() {
            return Err(Error::missing("likelihood"));
        }
        if self.transitions.is_empty() {
            return Err(Error::missing("transitions"));
        }
        if self.policies.is_empty() && self.moving_policy.is_none() {
            return Err(Error::missing("policies"));
        }

        let mut states = Vec::with_capacity(self.transitions.len());
        let mut controls = Vec::with_capacity(self.transitions.len());
        for (f, b) in self.transitions.iter().enumerate() {
            let (ns, ns_prev, nu) = b.dim();
            if ns == 0 || nu == 0 {
                return Err(Error::shape(format!("transitions[{f}]"), "non-empty kernel", format!("{:?}", b.shape())));
            }
            if ns != ns_prev {
                return Err(Error::shape(format!("transitions[{f}]"), format!("square ({ns}, {ns}, Nu)"), format!("{:?}", b.shape())));
            }
            check_non_negative(b.iter(), &format!("transitions[{f}]"))?;
            states.push(ns);
            controls.push(nu);
        }

        let mut outcomes = Vec::with_capacity(self.likelihood.len());
        for (g, a) in self.likelihood.iter().enumerate() {
            let mut expected = vec![a.len_of(Axis(0))];
            expected.extend_from_slice(&states);
            if a.ndim() != states.len() + 1 || a.shape() != expected.as_slice() {
                return Err(Error::shape(format!("likelihood[{g}]"), format!("{expected:?}"), format!("{:?}", a.shape())));
            }
            if expected[0] == 0 {
                return Err(Error::shape(format!("likelihood[{g}]"), "at least one outcome level", "0"));
            }
            check_non_negative(a.iter(), &format!("likelihood[{g}]"))?;
            outcomes.push(expected[0]);
        }

        let moving_policies = self
            .moving_policy
            .as_ref()
            .map(|moving| moving.repertoire.len());
        let policy_len = self.policies.first().map(Policy::len);
        let horizon = match (self.horizon, policy_len) {
            (Some(h), _) => h,
            (None, Some(len)) => len + 1,
            (None, None) => return Err(Error::missing("horizon")),
        };
        if horizon == 0 {
            return Err(Error::InvalidConfiguration {
                message: "horizon must be at least 1".to_string(),
            });
        }

        if let Some(moving) = &self.moving_policy {
            if moving.repertoire.is_empty() {
                return Err(Error::missing("moving_policy.repertoire"));
            }
            check_joint_action(&moving.default_action, &controls, "moving_policy.default_action")?;
            for (k, action) in moving.repertoire.iter().enumerate() {
                check_joint_action(action, &controls, &format!("moving_policy.repertoire[{k}]"))?;
            }
        } else {
            for (k, policy) in self.policies.iter().enumerate() {
                if policy.len() < horizon - 1 {
                    return Err(Error::shape(format!("policies[{k}]"), format!("at least {} steps", horizon - 1), policy.len()));
                }
                for (j, action) in policy.steps().iter().take(horizon - 1).enumerate() {
                    check_joint_action(action, &controls, &format!("policies[{k}][{j}]"))?;
                }
            }
        }
        let num_policies = moving_policies.unwrap_or(self.policies.len());

        if !self.preferences.is_empty() {
            if self.preferences.len() != outcomes.len() {
                return Err(Error::shape("preferences", outcomes.len(), self.preferences.len()));
            }
            for (g, c) in self.preferences.iter().enumerate() {
                let (rows, cols) = c.dim();
                if rows != outcomes[g] || (cols != 1 && cols < horizon) {
                    return Err(Error::shape(
                        format!("preferences[{g}]"),
                        format!("({}, 1) or ({}, >= {horizon})", outcomes[g], outcomes[g]),
                        format!("({rows}, {cols})"),
                    ));
                }
            }
        }

        if !self.initial_states.is_empty() {
            check_vectors(&self.initial_states, &states, "initial_states")?;
            for (f, prior) in self.initial_states.iter().enumerate() {
                check_non_negative(prior.iter(), &format!("initial_states[{f}]"))?;
            }
        }

        if let Some(prior) = &self.policy_prior
            && prior.len() != num_policies
        {
            return Err(Error::shape("policy_prior", num_policies, prior.len()));
        }

        if let Some(a) = &self.likelihood_concentration {
            if a.len() != self.likelihood.len() {
                return Err(Error::shape("likelihood_concentration", self.likelihood.len(), a.len()));
            }
            for (g, (conc, likelihood)) in a.iter().zip(&self.likelihood).enumerate() {
                let field = format!("likelihood_concentration[{g}]");
                if conc.shape() != likelihood.shape() {
                    return Err(Error::shape(field, format!("{:?}", likelihood.shape()), format!("{:?}", conc.shape())));
                }
                check_concentration(conc.iter(), &field)?;
            }
        }
        if let Some(b) = &self.transition_concentration {
            if b.len() != self.transitions.len() {
                return Err(Error::shape("transition_concentration", self.transitions.len(), b.len()));
            }
            for (f, (conc, kernel)) in b.iter().zip(&self.transitions).enumerate() {
                let field = format!("transition_concentration[{f}]");
                if conc.shape() != kernel.shape() {
                    return Err(Error::shape(field, format!("{:?}", kernel.shape()), format!("{:?}", conc.shape())));
                }
                check_concentration(conc.iter(), &field)?;
            }
        }
        if let Some(d) = &self.initial_concentration {
            check_vectors(d, &states, "initial_concentration")?;
            for (f, conc) in d.iter().enumerate() {
                check_concentration(conc.iter(), &format!("initial_concentration[{f}]"))?;
            }
        }

        self.validate_overrides(&states, &outcomes, &controls)?;

        Ok(ModelDims {
            states,
            outcomes,
            controls,
            horizon,
            policies: num_policies,
        })
    }

    fn validate_overrides(&self, states: &[usize], outcomes: &[usize], controls: &[usize]) -> Result<()> {
        let overrides = &self.overrides;
        if overrides.states.len() > states.len() {
            return Err(Error::shape("overrides.states", states.len(), overrides.states.len()));
        }
        if overrides.outcomes.len() > outcomes.len() {
            return Err(Error::shape("overrides.outcomes", outcomes.len(), overrides.outcomes.len()));
        }
        if overrides.actions.len() > controls.len() {
            return Err(Error::shape("overrides.actions", controls.len(), overrides.actions.len()));
        }
        for (factor, row) in overrides.states.iter().enumerate() {
            for &state in row.iter().flatten() {
                if state >= states[factor] {
                    return Err(Error::InvalidState { factor, state, levels: states[factor] });
                }
            }
        }
        for (modality, row) in overrides.outcomes.iter().enumerate() {
            for &outcome in row.iter().flatten() {
                if outcome >= outcomes[modality] {
                    return Err(Error::InvalidOutcome { modality, outcome, levels: outcomes[modality] });
                }
            }
        }
        for (factor, row) in overrides.actions.iter().enumerate() {
            for &action in row.iter().flatten() {
                if action >= controls[factor] {
                    return Err(Error::InvalidAction { factor, action, levels: controls[factor] });
                }
            }
        }
        Ok(())
    }
}

fn check_joint_action(action: &[usize], controls: &[usize], field: &str) -> Result<()> {
    if action.len() != controls.len() {
        return Err(Error::shape(field, controls.len(), action.len()));
    }
    for (factor, (&u, &levels)) in action.iter().zip(controls).enumerate() {
        if u >= levels {
            return Err(Error::InvalidAction { factor, action: u, levels });
        }
    }
    Ok(())
}

fn check_vectors(vectors: &[Array1<f64>], states: &[usize], field: &str) -> Result<()> {
    if vectors.len() != states.len() {
        return Err(Error::shape(field, states.len(), vectors.len()));
    }
    for (f, (v, &ns)) in vectors.iter().zip(states).enumerate() {
        if v.len() != ns {
            return Err(Error::shape(format!("{field}[{f}]"), ns, v.len()));
        }
    }
    Ok(())
}

fn check_non_negative<'a>(mut values: impl Iterator<Item = &'a f64>, field: &str) -> Result<()> {
    if values.any(|&v| !v.is_finite() || v < 0.0) {
        return Err(Error::InvalidConfiguration {
            message: format!("'{field}' must contain finite, non-negative probabilities"),
        });
    }
    Ok(())
}

fn check_concentration<'a>(mut values: impl Iterator<Item = &'a f64>, field: &str) -> Result<()> {
    if values.any(|&v| !v.is_finite() || v < 0.0) {
        return Err(Error::NegativeConcentration {
            field: field.to_string(),
        });
    }
    Ok(())
}
