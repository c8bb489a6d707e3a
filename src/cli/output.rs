//! Output formatting and progress bars for CLI

use indicatif::{ProgressBar, ProgressStyle};

use crate::{Error, Result, inference::TrajectoryResult, utils::argmax};

/// Create a spinner for a running trajectory
pub fn create_spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .map_err(|e| Error::ProgressBarTemplate {
                message: e.to_string(),
            })?,
    );
    pb.set_message(message.to_string());
    Ok(pb)
}

/// Print a section header
pub fn print_section(title: &str) {
    println!("\n{}", "=".repeat(60));
    println!("{title}");
    println!("{}", "=".repeat(60));
}

/// Print a subsection header
pub fn print_subsection(title: &str) {
    println!("\n{title}");
    println!("{}", "-".repeat(40));
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:20} {}", format!("{}:", key), value);
}

/// Print the per-step table and the headline numbers of a trajectory
pub fn print_trajectory(result: &TrajectoryResult) {
    print_kv("Steps", &result.steps.to_string());
    print_kv("Mean precision", &format!("{:.4}", result.mean_precision()));
    print_kv("Policies", &result.policies.len().to_string());

    print_subsection("Trajectory");
    println!("  {:>3}  {:12} {:12} {:10} {:>6}", "t", "states", "outcomes", "action", "π*");
    for t in 0..result.steps {
        let states: Vec<usize> = result.states.iter().map(|row| row[t]).collect();
        let outcomes: Vec<usize> = result.outcomes.iter().map(|row| row[t]).collect();
        let action = result
            .action_at(t)
            .map(|a| format!("{a:?}"))
            .unwrap_or_else(|| "-".to_string());
        let best = argmax(result.policy_posterior.column(t))
            .map(|k| k.to_string())
            .unwrap_or_default();
        println!(
            "  {:>3}  {:12} {:12} {:10} {:>6}",
            t,
            format!("{states:?}"),
            format!("{outcomes:?}"),
            action,
            best
        );
    }

    if let Some(learned) = &result.learned {
        print_subsection("Learning complexity (nats)");
        let fmt = |values: &[f64]| {
            values
                .iter()
                .map(|v| format!("{v:.4}"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        if !learned.complexity.likelihood.is_empty() {
            print_kv("Likelihood", &fmt(&learned.complexity.likelihood));
        }
        if !learned.complexity.transitions.is_empty() {
            print_kv("Transitions", &fmt(&learned.complexity.transitions));
        }
        if !learned.complexity.initial_states.is_empty() {
            print_kv("Initial states", &fmt(&learned.complexity.initial_states));
        }
    }
}
