// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The plan parser contract and one concrete implementation,
//! [`JsonPlanParser`], which accepts a JSON document of the shape
//! `{"goal": "...", "tasks": {id: {description, dependencies, ...}}}`.
//!
//! Richer plan formats (an HCL-based runbook DSL, a template registry)
//! belong to a separate, out-of-scope plan parser subsystem and are not
//! reproduced here.

use crate::error::PlanError;
use harness_core::{Task, WorkflowState};
use indexmap::IndexMap;
use serde::Deserialize;

/// A validated, graph-checked plan ready to become a `WorkflowState`.
#[derive(Debug, Clone)]
pub struct ParsedPlan {
    pub goal: String,
    pub tasks: IndexMap<String, Task>,
}

impl ParsedPlan {
    pub fn to_workflow_state(&self) -> Result<WorkflowState, PlanError> {
        Ok(WorkflowState::new(self.tasks.clone())?)
    }

    pub fn validate_dag(&self) -> Result<(), PlanError> {
        self.to_workflow_state().map(|_| ())
    }
}

/// `parse_plan_content(content) -> ParsedPlan | error`.
pub trait PlanParser: Send + Sync {
    fn parse(&self, content: &str) -> Result<ParsedPlan, PlanError>;
}

#[derive(Debug, Deserialize)]
struct PlanDocument {
    #[serde(default)]
    goal: String,
    tasks: IndexMap<String, TaskTemplate>,
}

#[derive(Debug, Deserialize)]
struct TaskTemplate {
    #[serde(default)]
    description: String,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

/// Accepts `{"goal": "...", "tasks": {id: {description, dependencies, ...}}}`.
pub struct JsonPlanParser;

impl PlanParser for JsonPlanParser {
    fn parse(&self, content: &str) -> Result<ParsedPlan, PlanError> {
        let doc: PlanDocument = serde_json::from_str(content).map_err(|e| {
            PlanError::Unrecognized(format!(
                "no recognized plan in content: {e} (see `harness plan-import --help` for the expected document shape)"
            ))
        })?;

        let mut tasks = IndexMap::new();
        for (id, template) in doc.tasks {
            let mut task = Task::new(id.clone(), template.description, template.dependencies)?;
            apply_extended_fields(&mut task, &template.rest);
            tasks.insert(id, task);
        }

        let plan = ParsedPlan { goal: doc.goal, tasks };
        plan.validate_dag()?;
        Ok(plan)
    }
}

/// Copies recognized extended-packet fields (opaque to the core) from the
/// template's leftover JSON object onto the task, if present.
fn apply_extended_fields(task: &mut Task, rest: &serde_json::Map<String, serde_json::Value>) {
    macro_rules! opt_string {
        ($field:ident) => {
            if let Some(v) = rest.get(stringify!($field)).and_then(|v| v.as_str()) {
                task.$field = Some(v.to_string());
            }
        };
    }
    macro_rules! opt_value {
        ($field:ident) => {
            if let Some(v) = rest.get(stringify!($field)) {
                task.$field = Some(v.clone());
            }
        };
    }

    opt_string!(instructions);
    opt_string!(role);
    opt_string!(model);
    if let Some(v) = rest.get("timeout_seconds").and_then(|v| v.as_i64()) {
        task.timeout_seconds = v;
    }
    opt_value!(files_in_scope);
    opt_value!(files_out_of_scope);
    opt_value!(input_context);
    opt_value!(output_contract);
    opt_value!(constraints);
    opt_value!(tools);
    opt_value!(verification_commands);
    opt_value!(success_criteria);
    opt_value!(artifacts_to_read);
    opt_value!(artifacts_to_write);
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
