//! Logical optimizer trace
//!
//! Records what each rule did to the plan, step by step. Recording is
//! optional: a disabled [`LogicalOptimizeOp`] drops every step. Steps are
//! also emitted as `trace!` events regardless of recording.

use std::fmt::Display;

use serde::Serialize;
use tracing::trace;

/// What a trace step did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepKind {
    ColumnPrune,
    FunctionPrune,
    GroupByItemsPrune,
    ByItemsPrune,
    ApplyEliminate,
}

impl StepKind {
    fn item_name(self) -> &'static str {
        match self {
            StepKind::ColumnPrune => "columns",
            StepKind::FunctionPrune => "aggregation functions",
            StepKind::GroupByItemsPrune => "group by items",
            StepKind::ByItemsPrune => "by-items",
            StepKind::ApplyEliminate => "plans",
        }
    }
}

/// One recorded rewrite of one plan node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceStep {
    /// Plan id of the rewritten node
    pub id: usize,
    /// Operator name of the rewritten node
    pub tp: String,
    pub kind: StepKind,
    pub action: String,
    pub reason: String,
    /// Position within the rule
    pub index: usize,
}

/// Steps recorded while one rule ran
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleTrace {
    /// Position of the rule in the optimizer
    pub index: usize,
    pub name: String,
    pub steps: Vec<TraceStep>,
}

/// Trace sink passed to every logical rule
#[derive(Debug, Clone, Default)]
pub struct LogicalOptimizeOp {
    tracer: Option<Vec<RuleTrace>>,
}

impl LogicalOptimizeOp {
    /// Sink that records steps
    pub fn enabled() -> Self {
        Self {
            tracer: Some(Vec::new()),
        }
    }

    /// Sink that drops steps
    pub fn disabled() -> Self {
        Self { tracer: None }
    }

    /// Check if steps are recorded
    pub fn is_enabled(&self) -> bool {
        self.tracer.is_some()
    }

    /// Recorded rules; empty when disabled
    pub fn rules(&self) -> &[RuleTrace] {
        self.tracer.as_deref().unwrap_or(&[])
    }

    /// All recorded steps in order
    pub fn steps(&self) -> impl Iterator<Item = &TraceStep> {
        self.rules().iter().flat_map(|r| r.steps.iter())
    }

    /// Serialize the recorded rules as JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self.rules())
    }

    /// Start recording steps for a rule
    pub fn append_before_rule_optimize(&mut self, index: usize, name: &str) {
        if let Some(rules) = &mut self.tracer {
            rules.push(RuleTrace {
                index,
                name: name.to_string(),
                steps: Vec::new(),
            });
        }
    }

    /// Columns dropped from a node's schema
    pub fn append_column_prune_step<T: Display>(&mut self, tp: &str, id: usize, pruned: &[T]) {
        self.append_prune_step(tp, id, StepKind::ColumnPrune, pruned);
    }

    /// Aggregate functions dropped from an aggregation
    pub fn append_function_prune_step<T: Display>(&mut self, tp: &str, id: usize, pruned: &[T]) {
        self.append_prune_step(tp, id, StepKind::FunctionPrune, pruned);
    }

    /// Group-by items dropped from an aggregation
    pub fn append_group_by_items_prune_step<T: Display>(
        &mut self,
        tp: &str,
        id: usize,
        pruned: &[T],
    ) {
        self.append_prune_step(tp, id, StepKind::GroupByItemsPrune, pruned);
    }

    /// Ordering keys dropped from a node
    pub fn append_by_items_prune_step<T: Display>(&mut self, tp: &str, id: usize, pruned: &[T]) {
        self.append_prune_step(tp, id, StepKind::ByItemsPrune, pruned);
    }

    /// The inner side of an apply was removed
    pub fn apply_eliminate_step(&mut self, tp: &str, id: usize) {
        let action = format!("{}_{} is eliminated.", tp, id);
        let reason = format!(
            "{}_{} can be eliminated because it hasn't been used by it's parent.",
            tp, id
        );
        self.append_step(tp, id, StepKind::ApplyEliminate, action, reason);
    }

    fn append_prune_step<T: Display>(&mut self, tp: &str, id: usize, kind: StepKind, pruned: &[T]) {
        if pruned.is_empty() {
            return;
        }
        if self.tracer.is_none() && !tracing::enabled!(tracing::Level::TRACE) {
            return;
        }
        let items: Vec<String> = pruned.iter().map(|p| p.to_string()).collect();
        let action = format!(
            "{}_{}'s {}[{}] have been pruned",
            tp,
            id,
            kind.item_name(),
            items.join(",")
        );
        self.append_step(tp, id, kind, action, String::new());
    }

    fn append_step(&mut self, tp: &str, id: usize, kind: StepKind, action: String, reason: String) {
        trace!(plan = %format!("{}_{}", tp, id), ?kind, %action, "optimizer step");
        let Some(rules) = &mut self.tracer else {
            return;
        };
        if rules.is_empty() {
            rules.push(RuleTrace {
                index: 0,
                name: String::new(),
                steps: Vec::new(),
            });
        }
        if let Some(rule) = rules.last_mut() {
            let index = rule.steps.len();
            rule.steps.push(TraceStep {
                id,
                tp: tp.to_string(),
                kind,
                action,
                reason,
                index,
            });
        }
    }
}
