//! Prompt rendering for the reasoning phases.

use anyhow::{Context, Result};
use minijinja::{Environment, context};

use crate::core::types::ExecutionResult;

const CLARIFY_TEMPLATE: &str = include_str!("prompts/clarify.md");
const PLAN_TEMPLATE: &str = include_str!("prompts/plan.md");
const REPORT_TEMPLATE: &str = include_str!("prompts/report.md");

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("clarify", CLARIFY_TEMPLATE)
            .expect("clarify template should be valid");
        env.add_template("plan", PLAN_TEMPLATE)
            .expect("plan template should be valid");
        env.add_template("report", REPORT_TEMPLATE)
            .expect("report template should be valid");
        Self { env }
    }

    /// Ask for a sharper version of the raw goal.
    pub fn clarify(&self, goal: &str) -> Result<String> {
        let template = self.env.get_template("clarify")?;
        let rendered = template.render(context! { goal => goal.trim() })?;
        Ok(rendered)
    }

    /// Ask for an ordered list of steps.
    pub fn plan(&self, clarified_goal: &str) -> Result<String> {
        let template = self.env.get_template("plan")?;
        let rendered = template.render(context! { goal => clarified_goal.trim() })?;
        Ok(rendered)
    }

    /// Ask for a Markdown report over the execution log.
    pub fn report(&self, clarified_goal: &str, results: &[ExecutionResult]) -> Result<String> {
        let execution_log =
            serde_json::to_string_pretty(results).context("serialize execution log")?;
        let template = self.env.get_template("report")?;
        let rendered = template.render(context! {
            goal => clarified_goal.trim(),
            execution_log => execution_log,
        })?;
        Ok(rendered)
    }
}
