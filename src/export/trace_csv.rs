//! CSV export of trajectory traces
//!
//! Two tables are written from a [`TrajectoryResult`]: one row per precision
//! iteration (the tonic and phasic precision signals) and one row per time
//! step (realized states, outcomes, action, and the policy posterior mode).

use std::path::Path;

use serde::Serialize;

use crate::{Error, Result, inference::TrajectoryResult, utils::argmax};

/// A single row of the precision trace.
#[derive(Debug, Clone, Serialize)]
pub struct PrecisionRecord {
    pub iteration: usize,
    pub t: usize,
    pub precision: f64,
    pub phasic: f64,
    pub best_policy: usize,
    pub best_posterior: f64,
}

/// A single row of the step table.
///
/// Multi-factor values are joined with `;` so each table stays flat.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub t: usize,
    pub states: String,
    pub outcomes: String,
    pub action: String,
    pub precision: f64,
    pub best_policy: usize,
    pub best_posterior: f64,
}

/// Exporter for trajectory CSV files
pub struct TraceCsvExporter;

impl TraceCsvExporter {
    /// Rows of the precision trace.
    pub fn precision_records(result: &TrajectoryResult) -> Vec<PrecisionRecord> {
        let per_step = iterations_per_step(result);
        result
            .precision
            .iter()
            .enumerate()
            .map(|(i, &precision)| {
                let column = result.policy_posterior_trace.column(i);
                let best_policy = argmax(column).unwrap_or(0);
                PrecisionRecord {
                    iteration: i,
                    t: i / per_step.max(1),
                    precision,
                    phasic: result.phasic_precision.get(i).copied().unwrap_or(0.0),
                    best_policy,
                    best_posterior: column.get(best_policy).copied().unwrap_or(0.0),
                }
            })
            .collect()
    }

    /// Rows of the step table, one per simulated time step.
    pub fn step_records(result: &TrajectoryResult) -> Vec<StepRecord> {
        let per_step = iterations_per_step(result);
        (0..result.steps)
            .map(|t| {
                let posterior = result.policy_posterior.column(t);
                let best_policy = argmax(posterior).unwrap_or(0);
                let precision = (per_step * (t + 1))
                    .checked_sub(1)
                    .and_then(|i| result.precision.get(i))
                    .copied()
                    .unwrap_or(0.0);
                StepRecord {
                    t,
                    states: join(result.states.iter().map(|row| row[t])),
                    outcomes: join(result.outcomes.iter().map(|row| row[t])),
                    action: result.action_at(t).map(|a| join(a.into_iter())).unwrap_or_default(),
                    precision,
                    best_policy,
                    best_posterior: posterior[best_policy],
                }
            })
            .collect()
    }

    /// Write the precision trace to `path`, returning the number of rows.
    pub fn export_precision(result: &TrajectoryResult, path: &Path) -> Result<usize> {
        write_records(path, &Self::precision_records(result))
    }

    /// Write the step table to `path`, returning the number of rows.
    pub fn export_steps(result: &TrajectoryResult, path: &Path) -> Result<usize> {
        write_records(path, &Self::step_records(result))
    }
}

fn iterations_per_step(result: &TrajectoryResult) -> usize {
    if result.steps == 0 {
        0
    } else {
        result.precision.len() / result.steps
    }
}

fn join(values: impl Iterator<Item = usize>) -> String {
    values.map(|v| v.to_string()).collect::<Vec<_>>().join(";")
}

fn write_records<R: Serialize>(path: &Path, records: &[R]) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush().map_err(|source| Error::Io {
        operation: format!("flush {}", path.display()),
        source,
    })?;
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InferenceOptions, inference::run_trajectory, scenarios::cue_reward_model};

    #[test]
    fn records_cover_every_iteration_and_step() {
        let options = InferenceOptions::default().with_seed(5);
        let result = run_trajectory(&cue_reward_model(), &options).unwrap();

        let precision = TraceCsvExporter::precision_records(&result);
        assert_eq!(precision.len(), result.precision.len());
        assert_eq!(precision.last().map(|r| r.t), Some(result.steps - 1));

        let steps = TraceCsvExporter::step_records(&result);
        assert_eq!(steps.len(), result.steps);
        assert!(steps.last().is_some_and(|r| r.action.is_empty()));
        assert_eq!(steps[0].states.split(';').count(), 2);
    }
}
