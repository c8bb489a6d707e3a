//! The per-trajectory loop: sample, infer, evaluate, act, and finally learn.
//!
//! All mutable state of one trajectory lives in a context object owned
//! by a single [`TrajectoryRunner::run`] call, so independent trajectories can
//! run side by side as long as each gets its own model.

use ndarray::{Array1, Array2, Array3, Array5, ArrayD, ArrayView1, s};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{debug, info};

use super::{
    action::{action_marginal, select_action, sharpen_actions},
    learning::{learn_initial_states, learn_likelihood, learn_transitions},
    policy_evaluation::{prune_policies, score_policy},
    precision::{PrecisionState, update_precision},
    result::{Complexity, LearnedParameters, TrajectoryResult},
    state_estimation::{EstimationSettings, anneal, estimate_states, initial_beliefs},
};
use crate::{
    Error, InferenceOptions, Result,
    efe::{dirichlet_kl, predicted_outcome},
    model::{
        GenerativeModel, GenerativeProcess, ModelStore, MovingPolicy, Policy, store::joint_likelihood,
    },
    ports::{ModulationContext, OutcomeModulator, StepSummary, TrajectoryObserver},
    utils::{LOG_EPSILON, gradient, normalize_vector},
};

/// Runs one trajectory of a generative model.
///
/// # Examples
///
/// ```
/// use active_mdp::{InferenceOptions, TrajectoryRunner, scenarios::cue_reward_model};
///
/// let model = cue_reward_model();
/// let options = InferenceOptions::default().with_seed(7);
/// let result = TrajectoryRunner::new(&model, options).run().unwrap();
/// assert_eq!(result.steps, 3);
/// ```
pub struct TrajectoryRunner<'a> {
    model: &'a GenerativeModel,
    options: InferenceOptions,
    observers: Vec<Box<dyn TrajectoryObserver>>,
    modulator: Option<Box<dyn OutcomeModulator>>,
}

impl<'a> TrajectoryRunner<'a> {
    pub fn new(model: &'a GenerativeModel, options: InferenceOptions) -> Self {
        Self {
            model,
            options,
            observers: Vec::new(),
            modulator: None,
        }
    }

    /// Add an observer to the run
    pub fn with_observer(mut self, observer: Box<dyn TrajectoryObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Install a modulator that may replace outcome distributions
    pub fn with_modulator(mut self, modulator: Box<dyn OutcomeModulator>) -> Self {
        self.modulator = Some(modulator);
        self
    }

    /// Validate, simulate every time step, learn, and return the result.
    pub fn run(mut self) -> Result<TrajectoryResult> {
        self.options.validate()?;
        let store = ModelStore::new(self.model)?;
        let process = GenerativeProcess::new(self.model, &store.dims);
        let mut rng = match self.options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::seed_from_u64(rand::random::<u64>()),
        };

        info!(
            factors = store.dims.factors(),
            modalities = store.dims.modalities(),
            policies = store.dims.policies,
            horizon = store.dims.horizon,
            "starting trajectory"
        );
        for observer in &mut self.observers {
            observer.on_trajectory_start(&store.dims)?;
        }

        let mut context = TrajectoryContext::new(&store, self.model, &self.options);
        let horizon = store.dims.horizon;
        for t in 0..horizon {
            context.realize(t, &process, &mut rng);
            context.condition(t, &mut self.modulator)?;
            context.estimate(t);
            context.evaluate(t);
            context.average(t);

            let terminate = context.resolved();
            let action = if t + 1 < horizon && !terminate {
                Some(context.act(t, &mut rng))
            } else {
                None
            };

            let states = context.states_at(t);
            let outcomes = context.outcomes_at(t);
            let summary = context.summary(t, &states, &outcomes, action.as_deref());
            for observer in &mut self.observers {
                observer.on_step(&summary)?;
            }

            if terminate {
                info!(t, "no residual uncertainty about initial states; stopping early");
                context.steps = t + 1;
                break;
            }
        }

        let result = context.finish();
        info!(
            steps = result.steps,
            mean_precision = result.mean_precision(),
            "trajectory complete"
        );
        for observer in &mut self.observers {
            observer.on_trajectory_end(&result)?;
        }
        Ok(result)
    }
}

/// Run one trajectory without observers or modulation.
pub fn run_trajectory(model: &GenerativeModel, options: &InferenceOptions) -> Result<TrajectoryResult> {
    TrajectoryRunner::new(model, options.clone()).run()
}

fn one_hot(levels: usize, index: usize) -> Array1<f64> {
    let mut distribution = Array1::zeros(levels);
    distribution[index] = 1.0;
    distribution
}

/// Mutable state of one trajectory.
struct TrajectoryContext<'a> {
    store: &'a ModelStore,
    model: &'a GenerativeModel,
    options: &'a InferenceOptions,
    moving: Option<&'a MovingPolicy>,

    policies: Vec<Policy>,
    live: Vec<usize>,
    /// Per-policy beliefs, `[policy][factor]`, each `(Ns, T)`
    beliefs: Vec<Vec<Array2<f64>>>,
    averaged: Vec<Array2<f64>>,

    states: Vec<Vec<usize>>,
    outcomes: Vec<Vec<usize>>,
    outcome_distributions: Vec<Vec<Array1<f64>>>,
    evidence: Vec<ArrayD<f64>>,
    actions: Vec<Vec<usize>>,
    action_probabilities: Vec<ArrayD<f64>>,

    posterior: Array2<f64>,
    free_energy: Array2<f64>,
    expected_free_energy: Array2<f64>,
    precision: PrecisionState,
    precision_trace: Vec<f64>,
    posterior_trace: Vec<Array1<f64>>,
    belief_trace: Vec<Array5<f64>>,
    gradient_trace: Vec<Array5<f64>>,

    steps: usize,
}

impl<'a> TrajectoryContext<'a> {
    fn new(store: &'a ModelStore, model: &'a GenerativeModel, options: &'a InferenceOptions) -> Self {
        let dims = &store.dims;
        let horizon = dims.horizon;
        let moving = model.moving_policy.as_ref();
        let policies = match moving {
            Some(moving) => moving.initial_policies(horizon),
            None => model.policies.clone(),
        };
        let np = policies.len();
        let beliefs = vec![initial_beliefs(store); np];
        let averaged = initial_beliefs(store);
        let trace_shape = |ns: usize| (options.iterations, ns, horizon, horizon, np);

        Self {
            store,
            model,
            options,
            moving,
            live: (0..np).collect(),
            policies,
            beliefs,
            averaged,
            states: vec![Vec::with_capacity(horizon); dims.factors()],
            outcomes: vec![Vec::with_capacity(horizon); dims.modalities()],
            outcome_distributions: vec![Vec::with_capacity(horizon); dims.modalities()],
            evidence: Vec::with_capacity(horizon),
            actions: vec![Vec::with_capacity(horizon); dims.factors()],
            action_probabilities: Vec::with_capacity(horizon),
            posterior: Array2::zeros((np, horizon)),
            free_energy: Array2::zeros((np, horizon)),
            expected_free_energy: Array2::zeros((np, horizon)),
            precision: PrecisionState::new(options.beta),
            precision_trace: Vec::with_capacity(options.iterations * horizon),
            posterior_trace: Vec::with_capacity(options.iterations * horizon),
            belief_trace: dims.states.iter().map(|&ns| Array5::zeros(trace_shape(ns))).collect(),
            gradient_trace: dims.states.iter().map(|&ns| Array5::zeros(trace_shape(ns))).collect(),
            steps: horizon,
        }
    }

    /// Sample (or take from the overrides) the hidden states and outcomes at `t`.
    fn realize<R: Rng + ?Sized>(&mut self, t: usize, process: &GenerativeProcess, rng: &mut R) {
        let overrides = &self.model.overrides;
        for f in 0..self.states.len() {
            let state = match overrides.state(f, t) {
                Some(state) => state,
                None if t == 0 => process.sample_initial(rng, f),
                None => process.sample_transition(rng, f, self.states[f][t - 1], self.actions[f][t - 1]),
            };
            self.states[f].push(state);
        }

        let joint = self.states_at(t);
        for g in 0..self.outcomes.len() {
            let outcome = overrides
                .outcome(g, t)
                .unwrap_or_else(|| process.sample_outcome(rng, g, &joint));
            self.outcomes[g].push(outcome);
            self.outcome_distributions[g].push(one_hot(self.store.dims.outcomes[g], outcome));
        }
    }

    /// Apply the modulator, if any, and record the evidence of time `t`.
    fn condition(&mut self, t: usize, modulator: &mut Option<Box<dyn OutcomeModulator>>) -> Result<()> {
        if let Some(modulator) = modulator.as_mut() {
            let predicted = self.predicted_outcomes(t);
            let states = self.states_at(t);
            let outcomes = self.outcomes_at(t);
            let context = ModulationContext {
                t,
                states: &states,
                outcomes: &outcomes,
                predicted: &predicted,
                precision: self.precision.precision(),
            };
            for (g, distribution) in modulator.modulate(&context)? {
                let levels = self.store.dims.outcomes.get(g).copied().ok_or_else(|| Error::InvalidConfiguration {
                    message: format!("modulator returned unknown modality {g}"),
                })?;
                if distribution.len() != levels {
                    return Err(Error::shape(format!("modulated outcome[{g}]"), levels, distribution.len()));
                }
                self.outcome_distributions[g][t] = normalize_vector(distribution.view());
            }
        }

        let current: Vec<Array1<f64>> = self
            .outcome_distributions
            .iter()
            .map(|row| row[t].clone())
            .collect();
        self.evidence.push(joint_likelihood(&self.store.likelihood, &current));
        Ok(())
    }

    /// Outcomes predicted for time `t` under the current model-averaged beliefs.
    fn predicted_outcomes(&self, t: usize) -> Vec<Array1<f64>> {
        let states: Vec<ArrayView1<'_, f64>> = self.averaged.iter().map(|x| x.column(t)).collect();
        self.store
            .likelihood
            .iter()
            .map(|a| predicted_outcome(a, &states))
            .collect()
    }

    /// Refine the beliefs of every live policy.
    fn estimate(&mut self, t: usize) {
        if t == 0 {
            for &k in &self.live {
                anneal(&mut self.beliefs[k], self.options.annealing);
            }
        }

        let settings = EstimationSettings {
            iterations: self.options.iterations,
            tau: self.options.tau,
        };
        for &k in &self.live {
            let trace = estimate_states(self.store, &self.policies[k], &self.evidence, &mut self.beliefs[k], settings);
            self.free_energy[[k, t]] = trace.free_energy;
            for (f, (beliefs, gradients)) in trace.beliefs.iter().zip(&trace.gradients).enumerate() {
                self.belief_trace[f].slice_mut(s![.., .., .., t, k]).assign(beliefs);
                self.gradient_trace[f].slice_mut(s![.., .., .., t, k]).assign(gradients);
            }
        }
    }

    /// Prune, score, and update precision and the policy posterior.
    fn evaluate(&mut self, t: usize) {
        let horizon = self.store.dims.horizon;
        let fixed = self.options.fixed_precision || self.moving.is_some();
        if self.moving.is_none() && t + 1 < horizon {
            let free_energy: Vec<f64> = self.free_energy.column(t).to_vec();
            let before = self.live.len();
            self.live = prune_policies(&self.live, &free_energy, self.options.prune_threshold);
            if self.live.len() < before {
                debug!(t, pruned = before - self.live.len(), live = self.live.len(), "pruned policies");
            }
        }

        for &k in &self.live {
            let score = score_policy(self.store, &self.beliefs[k], t);
            self.expected_free_energy[[k, t]] = score.total();
        }

        let select = |values: ArrayView1<'_, f64>| -> Array1<f64> { self.live.iter().map(|&k| values[k]).collect() };
        let log_prior = select(self.store.log_policy_prior.view());
        let scores = select(self.expected_free_energy.column(t));
        let free_energy = select(self.free_energy.column(t));

        let update = update_precision(
            &mut self.precision,
            log_prior.view(),
            scores.view(),
            free_energy.view(),
            self.options.iterations,
            fixed,
        );

        let np = self.policies.len();
        self.posterior.column_mut(t).fill(0.0);
        for (i, &k) in self.live.iter().enumerate() {
            self.posterior[[k, t]] = update.posterior[i];
        }
        for posterior in &update.posterior_trace {
            let mut full = Array1::zeros(np);
            for (i, &k) in self.live.iter().enumerate() {
                full[k] = posterior[i];
            }
            self.posterior_trace.push(full);
        }
        self.precision_trace.extend(update.precision_trace);

        debug!(
            t,
            live = self.live.len(),
            precision = self.precision.precision(),
            "policy posterior updated"
        );
    }

    /// Bayesian model average of the per-policy beliefs.
    fn average(&mut self, t: usize) {
        for (f, averaged) in self.averaged.iter_mut().enumerate() {
            averaged.fill(0.0);
            for &k in &self.live {
                averaged.scaled_add(self.posterior[[k, t]], &self.beliefs[k][f]);
            }
        }
    }

    /// Whether early termination applies: no uncertainty left about initial states.
    fn resolved(&self) -> bool {
        if !self.options.terminate_early || self.moving.is_some() {
            return false;
        }
        let negative_entropy: f64 = self
            .averaged
            .iter()
            .map(|x| x.column(0).iter().map(|&p| p * (p + LOG_EPSILON).ln()).sum::<f64>())
            .sum();
        negative_entropy > -self.options.chi
    }

    /// Select and record the action taken at `t`.
    fn act<R: Rng + ?Sized>(&mut self, t: usize, rng: &mut R) -> Vec<usize> {
        let marginal = action_marginal(
            &self.policies,
            &self.live,
            self.posterior.column(t),
            t,
            &self.store.dims.controls,
        );
        let probabilities = sharpen_actions(&marginal, self.options.alpha);
        let forced: Vec<Option<usize>> = (0..self.actions.len())
            .map(|f| self.model.overrides.action(f, t))
            .collect();
        let action = select_action(rng, &probabilities, &forced);

        for (row, &u) in self.actions.iter_mut().zip(&action) {
            row.push(u);
        }
        self.action_probabilities.push(probabilities);

        if let Some(moving) = self.moving {
            moving.advance(&mut self.policies, t, &action);
            for beliefs in &mut self.beliefs {
                for x in beliefs.iter_mut() {
                    let ns = x.nrows();
                    x.fill(1.0 / ns as f64);
                }
            }
        }
        debug!(t, action = ?action, "action selected");
        action
    }

    fn states_at(&self, t: usize) -> Vec<usize> {
        self.states.iter().map(|row| row[t]).collect()
    }

    fn outcomes_at(&self, t: usize) -> Vec<usize> {
        self.outcomes.iter().map(|row| row[t]).collect()
    }

    fn summary<'s>(
        &'s self,
        t: usize,
        states: &'s [usize],
        outcomes: &'s [usize],
        action: Option<&'s [usize]>,
    ) -> StepSummary<'s> {
        StepSummary {
            t,
            horizon: self.store.dims.horizon,
            states,
            outcomes,
            action,
            precision: self.precision.precision(),
            live_policies: self.live.len(),
            policy_posterior: self.posterior.column(t),
        }
    }

    /// Learn concentration parameters and assemble the result.
    fn finish(self) -> TrajectoryResult {
        let learned = if self.options.learning {
            Some(self.learn())
        } else {
            None
        };

        let np = self.policies.len();
        let horizon = self.store.dims.horizon;
        let policy_beliefs = self
            .store
            .dims
            .states
            .iter()
            .enumerate()
            .map(|(f, &ns)| Array3::from_shape_fn((ns, horizon, np), |(s, j, k)| self.beliefs[k][f][[s, j]]))
            .collect();
        let policy_posterior_trace =
            Array2::from_shape_fn((np, self.posterior_trace.len()), |(k, i)| self.posterior_trace[i][k]);
        let phasic_precision = gradient(&self.precision_trace)
            .iter()
            .zip(&self.precision_trace)
            .map(|(&slope, &level)| 8.0 * slope + level / 8.0)
            .collect();

        TrajectoryResult {
            dims: self.store.dims.clone(),
            steps: self.steps,
            states: self.states,
            outcomes: self.outcomes,
            outcome_distributions: self.outcome_distributions,
            actions: self.actions,
            action_probabilities: self.action_probabilities,
            policies: self.policies,
            policy_beliefs,
            averaged_beliefs: self.averaged,
            policy_posterior: self.posterior,
            free_energy: self.free_energy,
            expected_free_energy: self.expected_free_energy,
            precision: self.precision_trace,
            policy_posterior_trace,
            phasic_precision,
            belief_trace: self.belief_trace,
            gradient_trace: self.gradient_trace,
            learned,
        }
    }

    fn learn(&self) -> LearnedParameters {
        let eta = self.options.eta;
        let mut complexity = Complexity::default();

        let likelihood = self.model.likelihood_concentration.as_ref().map(|prior| {
            let observed: Vec<Vec<Array1<f64>>> = self
                .outcomes
                .iter()
                .zip(&self.store.dims.outcomes)
                .map(|(row, &levels)| row.iter().map(|&o| one_hot(levels, o)).collect())
                .collect();
            let mut posterior = prior.clone();
            learn_likelihood(&mut posterior, &observed, &self.averaged, eta);
            complexity.likelihood = posterior.iter().zip(prior).map(|(q, p)| dirichlet_kl(q, p)).collect();
            posterior
        });

        let transitions = self.model.transition_concentration.as_ref().map(|prior| {
            let mut posterior = prior.clone();
            learn_transitions(&mut posterior, &self.policies, &self.beliefs, &self.posterior, self.steps, eta);
            complexity.transitions = posterior.iter().zip(prior).map(|(q, p)| dirichlet_kl(q, p)).collect();
            posterior
        });

        let initial_states = self.model.initial_concentration.as_ref().map(|prior| {
            let mut posterior = prior.clone();
            learn_initial_states(&mut posterior, &self.averaged);
            complexity.initial_states = posterior.iter().zip(prior).map(|(q, p)| dirichlet_kl(q, p)).collect();
            posterior
        });

        debug!(
            likelihood = ?complexity.likelihood,
            transitions = ?complexity.transitions,
            initial_states = ?complexity.initial_states,
            "concentration parameters learned"
        );

        LearnedParameters {
            likelihood,
            transitions,
            initial_states,
            complexity,
        }
    }
}
