//! A subordinate inference instance that modulates its parent's outcomes.
//!
//! At every parent time step a child model is built from the parent's
//! predictions and realized outcomes, run for one full trajectory, and its
//! mean posterior precision decides how sharply the parent's evidence on the
//! target modalities is weighted. Each step is a pure function of the child
//! template, the configuration, and the parent's [`ModulationContext`]; the
//! adapter only keeps a record of what the child reported.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    Error, InferenceOptions, Result,
    inference::{TrajectoryResult, run_trajectory},
    model::GenerativeModel,
    ports::{ModulationContext, OutcomeModulator},
    utils::normalize_vector,
};

/// Lower bound of the reweighting exponent.
pub const DEFAULT_PRECISION_FLOOR: f64 = 0.03;

/// How the parent and child are wired together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedInferenceConfig {
    /// Parent modality whose predicted distribution rescales the child's initial-state concentration
    pub prior_modality: usize,
    /// Child factor whose initial-state concentration is rescaled
    pub prior_factor: usize,
    /// Two-level parent modality whose prediction interpolates the child's β
    pub precision_modality: usize,
    /// Child β when the precision modality predicts level 0 and level 1
    pub beta_range: (f64, f64),
    /// Parent modality whose realized outcome fixes the child's initial state
    pub state_modality: usize,
    /// Child factor whose initial state is fixed
    pub state_factor: usize,
    /// Parent modalities whose outcome distributions are reweighted
    pub targets: Vec<usize>,
    /// Precision against which the child's mean precision is compared
    pub reference_precision: f64,
    /// Smallest reweighting exponent
    pub floor: f64,
}

impl Default for NestedInferenceConfig {
    fn default() -> Self {
        Self {
            prior_modality: 0,
            prior_factor: 0,
            precision_modality: 0,
            beta_range: (1.0, 1.0),
            state_modality: 0,
            state_factor: 0,
            targets: Vec::new(),
            reference_precision: 1.0,
            floor: DEFAULT_PRECISION_FLOOR,
        }
    }
}

/// What one child run reported back.
#[derive(Debug, Clone)]
pub struct NestedStep {
    /// Parent time step the child ran for
    pub t: usize,
    /// β the child was given
    pub child_beta: f64,
    /// Mean posterior precision of the child
    pub child_precision: f64,
    /// Exponent applied to the parent's target distributions
    pub exponent: f64,
    /// Replacement outcome distributions for the parent
    pub replacements: Vec<(usize, Array1<f64>)>,
    /// Full child trajectory
    pub child: TrajectoryResult,
}

/// Build the child model and options for one parent time step.
pub fn child_inputs(
    template: &GenerativeModel,
    options: &InferenceOptions,
    config: &NestedInferenceConfig,
    context: &ModulationContext<'_>,
) -> Result<(GenerativeModel, InferenceOptions)> {
    let mut child = template.clone();

    let predicted = parent_prediction(context, config.prior_modality)?;
    let concentration = child
        .initial_concentration
        .as_mut()
        .and_then(|d| d.get_mut(config.prior_factor))
        .ok_or_else(|| Error::missing(format!("initial_concentration[{}]", config.prior_factor)))?;
    if concentration.len() != predicted.len() {
        return Err(Error::shape(
            format!("initial_concentration[{}]", config.prior_factor),
            predicted.len(),
            concentration.len(),
        ));
    }
    let total = concentration.sum();
    let scale = if total > 0.0 { total } else { 1.0 };
    *concentration = predicted.mapv(|p| p * scale);

    let two_level = parent_prediction(context, config.precision_modality)?;
    if two_level.len() != 2 {
        return Err(Error::shape(format!("predicted outcome[{}]", config.precision_modality), 2, two_level.len()));
    }
    let (low, high) = config.beta_range;
    let beta = two_level[0] * low + two_level[1] * high;

    let state = context
        .outcomes
        .get(config.state_modality)
        .copied()
        .ok_or_else(|| Error::missing(format!("outcome[{}]", config.state_modality)))?;
    child.overrides.set_state(config.state_factor, 0, Some(state));

    let mut child_options = options.clone().with_beta(beta);
    if let Some(seed) = options.seed {
        child_options.seed = Some(seed.wrapping_add(context.t as u64));
    }
    Ok((child, child_options))
}

/// Reweight the parent's evidence on `targets` by the child's precision.
///
/// Each target's evidence is the average of its one-hot outcome and its
/// predicted distribution, raised to `exponent` and renormalized.
pub fn reweight(context: &ModulationContext<'_>, targets: &[usize], exponent: f64) -> Result<Vec<(usize, Array1<f64>)>> {
    targets
        .iter()
        .map(|&g| {
            let predicted = parent_prediction(context, g)?;
            let outcome = context
                .outcomes
                .get(g)
                .copied()
                .ok_or_else(|| Error::missing(format!("outcome[{g}]")))?;
            let mut evidence = predicted.clone();
            evidence[outcome] += 1.0;
            let evidence = normalize_vector(evidence.view());
            Ok((g, normalize_vector(evidence.mapv(|p| p.powf(exponent)).view())))
        })
        .collect()
}

/// Run one child trajectory and derive the parent's replacement distributions.
pub fn nested_step(
    template: &GenerativeModel,
    options: &InferenceOptions,
    config: &NestedInferenceConfig,
    context: &ModulationContext<'_>,
) -> Result<NestedStep> {
    let (child_model, child_options) = child_inputs(template, options, config, context)?;
    let child = run_trajectory(&child_model, &child_options)?;
    let child_precision = child.mean_precision();
    let exponent = (child_precision / config.reference_precision).max(config.floor);
    let replacements = reweight(context, &config.targets, exponent)?;

    debug!(
        t = context.t,
        child_beta = child_options.beta,
        child_precision,
        exponent,
        "nested inference step"
    );

    Ok(NestedStep {
        t: context.t,
        child_beta: child_options.beta,
        child_precision,
        exponent,
        replacements,
        child,
    })
}

fn parent_prediction<'c>(context: &'c ModulationContext<'_>, modality: usize) -> Result<&'c Array1<f64>> {
    context
        .predicted
        .get(modality)
        .ok_or_else(|| Error::missing(format!("predicted outcome[{modality}]")))
}

/// [`OutcomeModulator`] backed by a child model.
pub struct NestedInference {
    template: GenerativeModel,
    options: InferenceOptions,
    config: NestedInferenceConfig,
    history: Vec<NestedStep>,
}

impl NestedInference {
    /// Check the child template and configuration up front.
    pub fn new(template: GenerativeModel, options: InferenceOptions, config: NestedInferenceConfig) -> Result<Self> {
        let dims = template.validate()?;
        options.validate()?;
        if config.prior_factor >= dims.factors() || config.state_factor >= dims.factors() {
            return Err(Error::InvalidConfiguration {
                message: format!("nested factor out of range for a child with {} factors", dims.factors()),
            });
        }
        if template.initial_concentration.is_none() {
            return Err(Error::missing("initial_concentration"));
        }
        let (beta_low, beta_high) = config.beta_range;
        for (name, value) in [
            ("reference_precision", config.reference_precision),
            ("floor", config.floor),
            ("beta_range", beta_low),
            ("beta_range", beta_high),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidHyperparameter {
                    name: name.to_string(),
                    value,
                });
            }
        }
        Ok(Self {
            template,
            options,
            config,
            history: Vec::new(),
        })
    }

    /// Every child run so far, in parent time order
    pub fn history(&self) -> &[NestedStep] {
        &self.history
    }
}

impl OutcomeModulator for NestedInference {
    fn modulate(&mut self, context: &ModulationContext<'_>) -> Result<Vec<(usize, Array1<f64>)>> {
        let step = nested_step(&self.template, &self.options, &self.config, context)?;
        let replacements = step.replacements.clone();
        self.history.push(step);
        Ok(replacements)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn context<'a>(predicted: &'a [Array1<f64>], outcomes: &'a [usize]) -> ModulationContext<'a> {
        ModulationContext {
            t: 0,
            states: &[],
            outcomes,
            predicted,
            precision: 1.0,
        }
    }

    #[test]
    fn reweighting_sharpens_with_large_exponent() {
        let predicted = vec![array![0.5, 0.5]];
        let ctx = context(&predicted, &[0]);
        let flat = reweight(&ctx, &[0], DEFAULT_PRECISION_FLOOR).unwrap();
        let sharp = reweight(&ctx, &[0], 4.0).unwrap();
        assert!(sharp[0].1[0] > flat[0].1[0]);
        assert!(flat[0].1[0] < 0.55, "floor exponent nearly flattens the evidence");
        assert!((sharp[0].1.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn non_positive_beta_range_is_rejected() {
        let template = crate::scenarios::cue_reward_model();
        for beta_range in [(0.0, 2.0), (1.0, -1.0), (f64::NAN, 1.0)] {
            let config = NestedInferenceConfig { beta_range, ..NestedInferenceConfig::default() };
            let err = NestedInference::new(template.clone(), InferenceOptions::default(), config).err();
            assert!(
                matches!(err, Some(Error::InvalidHyperparameter { ref name, .. }) if name == "beta_range"),
                "{beta_range:?} accepted"
            );
        }
        let config = NestedInferenceConfig { beta_range: (0.5, 2.0), ..NestedInferenceConfig::default() };
        assert!(NestedInference::new(template, InferenceOptions::default(), config).is_ok());
    }

    #[test]
    fn reweighting_unknown_modality_is_an_error() {
        let predicted = vec![array![0.5, 0.5]];
        let ctx = context(&predicted, &[0]);
        assert!(reweight(&ctx, &[3], 1.0).is_err());
    }
}
