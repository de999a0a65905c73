//! EXPLAIN output formatting
//!
//! Formats logical plans for display, one node per line, children indented
//! below their parent.

use std::fmt::{self, Write};

use crate::planner::logical::LogicalPlan;

/// Format a logical plan for EXPLAIN output
pub struct ExplainOutput;

impl ExplainOutput {
    /// Format a logical plan as a string
    pub fn format(plan: &LogicalPlan) -> String {
        let mut output = String::new();
        // writing into a String cannot fail
        let _ = Self::format_node(plan, 0, &mut output);
        output
    }

    fn format_node(plan: &LogicalPlan, indent: usize, out: &mut String) -> fmt::Result {
        let prefix = "  ".repeat(indent);
        write!(out, "{}{}_{} {}", prefix, plan.tp(), plan.id(), plan.schema())?;

        match plan {
            LogicalPlan::DataSource(ds) => {
                write!(out, " table:{}", ds.table_info.name)?;
                if !ds.all_conds.is_empty() {
                    write!(out, " conds:{}", join(&ds.all_conds))?;
                }
                if let Some(handle) = &ds.handle_cols {
                    write!(out, " handle:{}", handle)?;
                }
            }
            LogicalPlan::Join(join_plan) => {
                write!(out, " {}", join_plan.join_type)?;
                let conds: Vec<_> = join_plan.conditions().collect();
                if !conds.is_empty() {
                    write!(out, " conds:{}", join(conds))?;
                }
            }
            LogicalPlan::Apply(apply) => {
                write!(out, " {}", apply.join.join_type)?;
                if !apply.cor_cols.is_empty() {
                    write!(out, " cor:{}", join(&apply.cor_cols))?;
                }
            }
            LogicalPlan::Projection(proj) => write!(out, " exprs:{}", join(&proj.exprs))?,
            LogicalPlan::Aggregation(agg) => {
                write!(out, " funcs:{}", join(&agg.agg_funcs))?;
                if !agg.group_by_items.is_empty() {
                    write!(out, " group by:{}", join(&agg.group_by_items))?;
                }
            }
            LogicalPlan::Selection(sel) => write!(out, " conds:{}", join(&sel.conditions))?,
            LogicalPlan::Sort(sort) => write!(out, " by:{}", join(&sort.by_items))?,
            LogicalPlan::TopN(top_n) => write!(
                out,
                " by:{} offset:{} count:{}",
                join(&top_n.by_items),
                top_n.offset,
                top_n.count
            )?,
            LogicalPlan::Limit(limit) => {
                write!(out, " offset:{} count:{}", limit.offset, limit.count)?
            }
            LogicalPlan::TableDual(dual) => write!(out, " rows:{}", dual.row_count)?,
            LogicalPlan::Cte(cte) => write!(out, " name:{}", cte.cte_name)?,
            LogicalPlan::CteTable(cte) => write!(out, " name:{}", cte.cte_name)?,
            _ => {}
        }
        writeln!(out)?;

        for child in plan.children() {
            Self::format_node(child, indent + 1, out)?;
        }
        Ok(())
    }
}

fn join<T: fmt::Display>(items: impl IntoIterator<Item = T>) -> String {
    let parts: Vec<String> = items.into_iter().map(|i| i.to_string()).collect();
    format!("[{}]", parts.join(", "))
}
