//! Dependency graph validation for deployment plans.
//!
//! Rejects duplicate ids, unknown reference targets, references to later
//! steps, and cycles. Cycle detection is a depth-first walk with
//! visiting/visited marks; it runs before the declaration-order check so that
//! a genuine cycle is reported as such rather than as an out-of-order
//! reference.

use std::collections::HashMap;

use crate::error::PlanError;
use crate::plan::DeploymentStep;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Visited,
}

/// Validate a step sequence, returning the id -> index map on success.
pub(crate) fn validate(steps: &[DeploymentStep]) -> Result<HashMap<String, usize>, PlanError> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(steps.len());
    for (i, step) in steps.iter().enumerate() {
        if index.insert(step.id.clone(), i).is_some() {
            return Err(PlanError::DuplicateStep(step.id.clone()));
        }
    }

    // Every reference target must exist before we walk the graph.
    for step in steps {
        for target in step.dependencies() {
            if !index.contains_key(target) {
                return Err(PlanError::UnknownReference {
                    step: step.id.clone(),
                    target: target.to_string(),
                });
            }
        }
    }

    let mut marks = vec![Mark::Unvisited; steps.len()];
    for i in 0..steps.len() {
        if marks[i] == Mark::Unvisited {
            visit(i, steps, &index, &mut marks)?;
        }
    }

    // Acyclic but out of declaration order: a valid plan resolves every
    // reference to an earlier step, so its document order is topological.
    for (i, step) in steps.iter().enumerate() {
        for target in step.dependencies() {
            if index[target] >= i {
                return Err(PlanError::ForwardReference {
                    step: step.id.clone(),
                    target: target.to_string(),
                });
            }
        }
    }

    Ok(index)
}

/// Prerequisite step indices for each step, aligned with the input order.
pub(crate) fn dependency_indices(
    steps: &[DeploymentStep],
    index: &HashMap<String, usize>,
) -> Vec<Vec<usize>> {
    steps
        .iter()
        .map(|step| {
            let mut deps: Vec<usize> = step.dependencies().map(|t| index[t]).collect();
            deps.sort_unstable();
            deps.dedup();
            deps
        })
        .collect()
}

fn visit(
    i: usize,
    steps: &[DeploymentStep],
    index: &HashMap<String, usize>,
    marks: &mut [Mark],
) -> Result<(), PlanError> {
    marks[i] = Mark::Visiting;
    for target in steps[i].dependencies() {
        let j = index[target];
        match marks[j] {
            Mark::Visiting => return Err(PlanError::Cycle(steps[j].id.clone())),
            Mark::Unvisited => visit(j, steps, index, marks)?,
            Mark::Visited => {}
        }
    }
    marks[i] = Mark::Visited;
    Ok(())
}
