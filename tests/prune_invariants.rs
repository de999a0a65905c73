//! Column pruning properties over randomly generated plans
//!
//! Each seed builds a plan tree from every logical operator, in a session
//! that may enforce MPP over tables that may have a TiFlash replica, prunes
//! it with a random demand, and checks what must hold for every pruned tree.

use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use colprune::catalog::{ColumnInfo, FieldType, SqlType, TableInfo};
use colprune::expression::{extract_columns, Column, Expr};
use colprune::planner::logical::{AggFuncDesc, ByItem, JoinType, PropertyItem, WindowFuncDesc};
use colprune::planner::{
    LogicalOptimizeOp, LogicalPlan, LogicalPlanBuilder, Optimizer, PlanContext, SessionVars,
};

const SEEDS: u64 = 200;
const MAX_DEPTH: u32 = 4;

fn tables() -> Vec<Arc<TableInfo>> {
    vec![
        Arc::new(
            TableInfo::new(1, "t")
                .column(ColumnInfo::new("a", FieldType::new(SqlType::Int)))
                .column(ColumnInfo::new("b", FieldType::varchar(64)))
                .column(ColumnInfo::new("c", FieldType::new(SqlType::BigInt)))
                .tiflash_replica(1),
        ),
        Arc::new(
            TableInfo::new(2, "u")
                .column(ColumnInfo::new("d", FieldType::new(SqlType::Int)))
                .column(ColumnInfo::new("e", FieldType::new(SqlType::Double))),
        ),
        Arc::new(
            TableInfo::new(3, "pk")
                .column(ColumnInfo::new("id", FieldType::new(SqlType::BigInt)))
                .column(ColumnInfo::new("v", FieldType::new(SqlType::Int)))
                .column(ColumnInfo::new("w", FieldType::new(SqlType::TinyInt)))
                .int_handle("id")
                .tiflash_replica(2),
        ),
    ]
}

fn gen_session(rng: &mut StdRng) -> PlanContext {
    PlanContext::new(SessionVars::new().with_enforce_mpp(rng.gen_bool(0.5)))
}

fn pick_column(rng: &mut StdRng, plan: &LogicalPlan) -> Column {
    plan.schema()
        .columns
        .choose(rng)
        .cloned()
        .expect("generated plans never have an empty schema")
}

fn project_columns(
    rng: &mut StdRng,
    ctx: &mut PlanContext,
    plan: LogicalPlan,
    width: usize,
) -> LogicalPlan {
    let exprs = plan
        .schema()
        .columns
        .choose_multiple(rng, width)
        .map(Expr::col)
        .collect();
    LogicalPlanBuilder::from_plan(ctx, plan).project(exprs).build()
}

fn gen_leaf(rng: &mut StdRng, ctx: &mut PlanContext) -> LogicalPlan {
    let cols = [
        ("x", FieldType::new(SqlType::Int)),
        ("y", FieldType::new(SqlType::BigInt)),
    ];
    match rng.gen_range(0..8) {
        0 => LogicalPlanBuilder::table_dual(ctx, 1, &cols).build(),
        1 => LogicalPlanBuilder::cte(ctx, "cte", &cols).build(),
        _ => {
            let table = tables().choose(rng).cloned().unwrap();
            let scan = LogicalPlanBuilder::scan(ctx, "test", table).build();
            if !rng.gen_bool(0.4) {
                return scan;
            }
            let col = pick_column(rng, &scan);
            LogicalPlanBuilder::from_plan(ctx, scan)
                .push_conds(vec![Expr::gt(Expr::col(&col), Expr::int(0))])
                .unwrap()
                .build()
        }
    }
}

fn gen_plan(rng: &mut StdRng, ctx: &mut PlanContext, depth: u32) -> LogicalPlan {
    if depth == 0 || rng.gen_bool(0.2) {
        return gen_leaf(rng, ctx);
    }

    let child = gen_plan(rng, ctx, depth - 1);
    match rng.gen_range(0..13) {
        0 => {
            let col = pick_column(rng, &child);
            LogicalPlanBuilder::from_plan(ctx, child)
                .select(vec![Expr::gt(Expr::col(&col), Expr::int(0))])
                .build()
        }
        1 => {
            let mut exprs: Vec<Expr> = child
                .schema()
                .columns
                .iter()
                .filter(|_| rng.gen_bool(0.6))
                .map(Expr::col)
                .collect();
            let col = pick_column(rng, &child);
            exprs.push(Expr::plus(Expr::col(&col), Expr::int(1)));
            LogicalPlanBuilder::from_plan(ctx, child).project(exprs).build()
        }
        2 => {
            let by_items = (0..rng.gen_range(1..4))
                .map(|_| ByItem::asc(Expr::col(&pick_column(rng, &child))))
                .chain(Some(ByItem::desc(Expr::int(7))))
                .collect();
            LogicalPlanBuilder::from_plan(ctx, child).sort(by_items).build()
        }
        3 => LogicalPlanBuilder::from_plan(ctx, child)
            .limit(0, rng.gen_range(1..100))
            .build(),
        4 => {
            let key = pick_column(rng, &child);
            LogicalPlanBuilder::from_plan(ctx, child)
                .top_n(vec![ByItem::desc(Expr::col(&key))], 0, 10)
                .build()
        }
        5 => {
            let group = pick_column(rng, &child);
            let arg = pick_column(rng, &child);
            let key = pick_column(rng, &child);
            let funcs = vec![
                AggFuncDesc::new("count", vec![Expr::col(&arg)], false).unwrap(),
                AggFuncDesc::new("first_row", vec![Expr::col(&group)], false).unwrap(),
                AggFuncDesc::new("group_concat", vec![Expr::col(&arg)], false)
                    .unwrap()
                    .with_order_by(vec![
                        ByItem::asc(Expr::col(&key)),
                        ByItem::desc(Expr::col(&key)),
                        ByItem::asc(Expr::int(1)),
                    ]),
            ];
            LogicalPlanBuilder::from_plan(ctx, child)
                .aggregate(vec![Expr::col(&group)], funcs)
                .build()
        }
        6 => {
            let right = gen_plan(rng, ctx, depth - 1);
            let join_type = *[
                JoinType::Inner,
                JoinType::LeftOuter,
                JoinType::RightOuter,
                JoinType::Semi,
                JoinType::LeftOuterSemi,
            ]
            .choose(rng)
            .unwrap();
            let left_key = pick_column(rng, &child);
            let right_key = pick_column(rng, &right);
            LogicalPlanBuilder::from_plan(ctx, child)
                .join(
                    right,
                    join_type,
                    vec![Expr::eq(Expr::col(&left_key), Expr::col(&right_key))],
                    vec![],
                )
                .build()
        }
        7 => LogicalPlanBuilder::from_plan(ctx, child).max_one_row().build(),
        8 => {
            let arg = pick_column(rng, &child);
            let partition = PropertyItem {
                col: pick_column(rng, &child),
                desc: false,
            };
            let func = WindowFuncDesc::new("first_value", vec![Expr::col(&arg)]).unwrap();
            LogicalPlanBuilder::from_plan(ctx, child)
                .window(vec![func], vec![partition], vec![])
                .build()
        }
        9 => {
            let right = gen_plan(rng, ctx, depth - 1);
            let width = child.schema().len().min(right.schema().len()).min(2);
            let left = project_columns(rng, ctx, child, width);
            let right = project_columns(rng, ctx, right, width);
            LogicalPlanBuilder::union_all(ctx, vec![left, right])
                .unwrap()
                .build()
        }
        10 => {
            // grouping sets expand the output of a projection
            let width = child.schema().len();
            let proj = project_columns(rng, ctx, child, width);
            let group = pick_column(rng, &proj);
            LogicalPlanBuilder::from_plan(ctx, proj)
                .expand(vec![group])
                .build()
        }
        11 => {
            let first = gen_plan(rng, ctx, depth - 1);
            LogicalPlanBuilder::sequence(ctx, vec![first, child])
                .unwrap()
                .build()
        }
        _ => {
            let inner = gen_plan(rng, ctx, depth - 1);
            let outer_col = pick_column(rng, &child);
            let inner_col = pick_column(rng, &inner);
            let inner = LogicalPlanBuilder::from_plan(ctx, inner)
                .select(vec![Expr::eq(Expr::col(&inner_col), Expr::cor_col(&outer_col))])
                .build();
            let join_type = *[
                JoinType::Inner,
                JoinType::LeftOuter,
                JoinType::Semi,
                JoinType::LeftOuterSemi,
            ]
            .choose(rng)
            .unwrap();
            LogicalPlanBuilder::from_plan(ctx, child)
                .apply(inner, join_type, vec![])
                .build()
        }
    }
}

/// A projection over a random tree plus a random non-empty demand on it
fn gen_case(seed: u64) -> (LogicalPlan, Vec<Column>, PlanContext) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut ctx = gen_session(&mut rng);
    let tree = gen_plan(&mut rng, &mut ctx, MAX_DEPTH);
    let exprs = tree.schema().columns.iter().map(Expr::col).collect();
    let root = LogicalPlanBuilder::from_plan(&mut ctx, tree)
        .project(exprs)
        .build();

    let mut demand: Vec<Column> = root
        .schema()
        .columns
        .iter()
        .filter(|_| rng.gen_bool(0.4))
        .cloned()
        .collect();
    if demand.is_empty() {
        demand.push(pick_column(&mut rng, &root));
    }
    (root, demand, ctx)
}

fn prune(plan: LogicalPlan, demand: Vec<Column>, ctx: &mut PlanContext) -> LogicalPlan {
    let mut opt = LogicalOptimizeOp::disabled();
    plan.prune_columns(demand, ctx, &mut opt).unwrap()
}

fn walk<'a>(plan: &'a LogicalPlan, out: &mut Vec<&'a LogicalPlan>) {
    out.push(plan);
    for child in plan.children() {
        walk(child, out);
    }
}

fn nodes(plan: &LogicalPlan) -> Vec<&LogicalPlan> {
    let mut out = Vec::new();
    walk(plan, &mut out);
    out
}

fn shape(plan: &LogicalPlan) -> Vec<(&'static str, usize)> {
    nodes(plan)
        .into_iter()
        .map(|n| (n.tp(), n.schema().len()))
        .collect()
}

fn is_ordered_subsequence(sub: &[Column], full: &[Column]) -> bool {
    let mut rest = full.iter();
    sub.iter().all(|c| rest.any(|f| f == c))
}

// ============ Properties ============

#[test]
fn test_root_schema_is_ordered_subset_covering_demand() {
    for seed in 0..SEEDS {
        let (root, demand, mut ctx) = gen_case(seed);
        let original = root.schema().columns.clone();
        let pruned = prune(root, demand.clone(), &mut ctx);

        let after = &pruned.schema().columns;
        assert!(
            is_ordered_subsequence(after, &original),
            "seed {}: root schema is not an ordered subset",
            seed
        );
        for col in &demand {
            assert!(
                pruned.schema().contains(col),
                "seed {}: demanded {} missing",
                seed,
                col
            );
        }
    }
}

#[test]
fn test_every_node_keeps_original_columns_in_order() {
    for seed in 0..SEEDS {
        let (root, demand, mut ctx) = gen_case(seed);
        let before: HashMap<usize, Vec<Column>> = nodes(&root)
            .into_iter()
            .map(|n| (n.id(), n.schema().columns.clone()))
            .collect();
        let pruned = prune(root, demand, &mut ctx);

        for node in nodes(&pruned) {
            // wrappers added while pruning have no earlier schema
            let Some(original) = before.get(&node.id()) else {
                continue;
            };
            // constant fillers and synthesized handles are new columns
            let surviving: Vec<Column> = node
                .schema()
                .columns
                .iter()
                .filter(|c| original.contains(c))
                .cloned()
                .collect();
            assert!(
                is_ordered_subsequence(&surviving, original),
                "seed {}: {}_{} reordered its columns",
                seed,
                node.tp(),
                node.id()
            );
        }
    }
}

#[test]
fn test_every_node_reads_only_what_its_inputs_produce() {
    for seed in 0..SEEDS {
        let (root, demand, mut ctx) = gen_case(seed);
        let pruned = prune(root, demand, &mut ctx);

        for node in nodes(&pruned) {
            let children = node.children();
            for expr in node.expressions() {
                for col in extract_columns(expr) {
                    let produced = if children.is_empty() {
                        node.schema().contains(&col)
                    } else {
                        children.iter().any(|c| c.schema().contains(&col))
                    };
                    assert!(
                        produced,
                        "seed {}: {}_{} reads {} which no input produces",
                        seed,
                        node.tp(),
                        node.id(),
                        col
                    );
                }
            }
        }
    }
}

#[test]
fn test_scans_never_empty_and_no_empty_projection() {
    for seed in 0..SEEDS {
        let (root, demand, mut ctx) = gen_case(seed);
        let pruned = prune(root, demand, &mut ctx);

        for node in nodes(&pruned) {
            assert!(
                !node.is_empty_projection(),
                "seed {}: empty Projection_{}",
                seed,
                node.id()
            );
            if let LogicalPlan::DataSource(ds) = node {
                assert!(!ds.schema.is_empty(), "seed {}: empty scan", seed);
                assert_eq!(ds.schema.len(), ds.columns.len());
            }
        }
    }
}

#[test]
fn test_int_handle_is_produced_or_cleared() {
    for seed in 0..SEEDS {
        let (root, demand, mut ctx) = gen_case(seed);
        let pruned = prune(root, demand, &mut ctx);

        for node in nodes(&pruned) {
            let LogicalPlan::DataSource(ds) = node else {
                continue;
            };
            if let Some(handle) = ds.handle_cols.as_ref().filter(|h| h.is_int()) {
                let col = handle.get_col(0).unwrap();
                assert!(
                    ds.schema.contains(col),
                    "seed {}: DataSource_{} keeps handle {} it does not produce",
                    seed,
                    ds.base.id,
                    col
                );
            }
        }
    }
}

#[test]
fn test_pruning_twice_keeps_the_shape() {
    for seed in 0..SEEDS {
        let (root, demand, mut ctx) = gen_case(seed);
        let once = prune(root, demand.clone(), &mut ctx);
        let expected = shape(&once);
        let twice = prune(once, demand, &mut ctx);
        assert_eq!(shape(&twice), expected, "seed {}", seed);
    }
}

#[test]
fn test_full_demand_keeps_root_schema() {
    for seed in 0..SEEDS {
        let (root, _, mut ctx) = gen_case(seed);
        let original = root.schema().columns.clone();
        let mut opt = LogicalOptimizeOp::enabled();
        let pruned = Optimizer::new().optimize(root, &mut ctx, &mut opt).unwrap();
        assert_eq!(pruned.schema().columns, original, "seed {}", seed);
        assert!(opt.to_json().is_ok());
    }
}

#[test]
fn test_unused_left_outer_apply_collapses_to_outer_side() {
    for seed in 0..SEEDS / 4 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut ctx = gen_session(&mut rng);
        let outer = gen_plan(&mut rng, &mut ctx, 2);
        // the outer tree may hold applies of its own; a projection marks its root
        let width = outer.schema().len();
        let outer = project_columns(&mut rng, &mut ctx, outer, width);
        let outer_col = pick_column(&mut rng, &outer);
        let inner = gen_plan(&mut rng, &mut ctx, 2);
        let inner_col = pick_column(&mut rng, &inner);
        let inner = LogicalPlanBuilder::from_plan(&mut ctx, inner)
            .select(vec![Expr::eq(Expr::col(&inner_col), Expr::cor_col(&outer_col))])
            .build();
        let outer_id = outer.id();
        let apply = LogicalPlanBuilder::from_plan(&mut ctx, outer)
            .apply(inner, JoinType::LeftOuter, vec![])
            .build();
        let apply_id = apply.id();

        let pruned = prune(apply, vec![outer_col.clone()], &mut ctx);
        assert!(
            nodes(&pruned).iter().all(|n| n.id() != apply_id),
            "seed {}: apply kept",
            seed
        );
        assert!(
            nodes(&pruned).iter().any(|n| n.id() == outer_id),
            "seed {}: outer side lost",
            seed
        );
        assert!(pruned.schema().contains(&outer_col), "seed {}", seed);
    }
}
