//! Logical optimizer
//!
//! Applies logical rewrite rules to a plan in order, recording what each
//! rule did in an optional trace.

pub mod column_pruning;
pub mod trace;

pub use column_pruning::ColumnPruner;
pub use trace::{LogicalOptimizeOp, RuleTrace, StepKind, TraceStep};

use tracing::debug;

use crate::planner::context::PlanContext;
use crate::planner::error::PlannerResult;
use crate::planner::logical::LogicalPlan;

/// Logical rewrite rule
pub trait LogicalOptRule: Send + Sync {
    /// Rule name for tracing
    fn name(&self) -> &'static str;

    /// Rewrite a plan; the flag reports whether other rules should run again
    fn optimize(
        &self,
        plan: LogicalPlan,
        ctx: &mut PlanContext,
        opt: &mut LogicalOptimizeOp,
    ) -> PlannerResult<(LogicalPlan, bool)>;
}

/// Query optimizer that applies a sequence of logical rules
pub struct Optimizer {
    rules: Vec<Box<dyn LogicalOptRule>>,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Optimizer {
    /// Create a new optimizer with default rules
    pub fn new() -> Self {
        Self {
            rules: vec![Box::new(ColumnPruner)],
        }
    }

    /// Create an optimizer with custom rules
    pub fn with_rules(rules: Vec<Box<dyn LogicalOptRule>>) -> Self {
        Self { rules }
    }

    /// Optimize a logical plan by applying all rules
    ///
    /// The first failing rule aborts optimization.
    pub fn optimize(
        &self,
        plan: LogicalPlan,
        ctx: &mut PlanContext,
        opt: &mut LogicalOptimizeOp,
    ) -> PlannerResult<LogicalPlan> {
        let mut current = plan;
        for (index, rule) in self.rules.iter().enumerate() {
            opt.append_before_rule_optimize(index, rule.name());
            let (next, changed) = rule.optimize(current, ctx, opt)?;
            debug!(rule = rule.name(), changed, "applied logical rule");
            current = next;
        }
        Ok(current)
    }

    /// Get the names of all rules
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Expr;
    use crate::planner::context::SessionVars;
    use crate::planner::error::PlannerError;
    use crate::planner::logical::{JoinType, LogicalPlanBuilder};
    use crate::planner::test_utils::{table_t, table_u};

    struct Failing;

    impl LogicalOptRule for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn optimize(
            &self,
            _plan: LogicalPlan,
            _ctx: &mut PlanContext,
            _opt: &mut LogicalOptimizeOp,
        ) -> PlannerResult<(LogicalPlan, bool)> {
            Err(PlannerError::Schema("broken".to_string()))
        }
    }

    #[test]
    fn test_default_rules() {
        assert_eq!(Optimizer::new().rule_names(), vec!["column_prune"]);
    }

    #[test]
    fn test_optimizer_prunes_join_inputs() {
        let mut ctx = PlanContext::new(SessionVars::new());
        let t = LogicalPlanBuilder::scan(&mut ctx, "test", table_t()).build();
        let u = LogicalPlanBuilder::scan(&mut ctx, "test", table_u()).build();
        let a = t.schema().columns[0].clone();
        let d = u.schema().columns[0].clone();
        let plan = LogicalPlanBuilder::from_plan(&mut ctx, t)
            .join(u, JoinType::Inner, vec![Expr::eq(Expr::col(&a), Expr::col(&d))], vec![])
            .project(vec![Expr::col(&a)])
            .build();

        let mut opt = LogicalOptimizeOp::enabled();
        let optimized = Optimizer::new().optimize(plan, &mut ctx, &mut opt).unwrap();
        let join = optimized.children()[0];
        assert_eq!(join.children()[0].schema().columns, vec![a]);
        assert_eq!(join.children()[1].schema().columns, vec![d]);
        assert_eq!(opt.rules().len(), 1);
        assert_eq!(opt.rules()[0].name, "column_prune");
    }

    #[test]
    fn test_rule_error_aborts() {
        let mut ctx = PlanContext::new(SessionVars::new());
        let plan = LogicalPlanBuilder::scan(&mut ctx, "test", table_t()).build();
        let optimizer = Optimizer::with_rules(vec![Box::new(Failing), Box::new(ColumnPruner)]);
        let mut opt = LogicalOptimizeOp::enabled();
        let err = optimizer.optimize(plan, &mut ctx, &mut opt).unwrap_err();
        assert_eq!(err, PlannerError::Schema("broken".to_string()));
        assert_eq!(opt.rules().len(), 1);
    }
}
