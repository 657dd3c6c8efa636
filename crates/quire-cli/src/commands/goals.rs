//! Goal graph inspection

use super::Context;
use anyhow::{Context as _, Result};
use quire_build::GoalGraph;

/// Print every goal in dependency order, or the plan for one goal
pub fn run(ctx: &Context, goal: Option<&str>) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;
    let graph = orchestrator.graph();

    let order = match goal {
        Some(goal) => graph
            .plan(goal)
            .with_context(|| format!("Cannot plan goal '{}'", goal))?,
        None => graph.compute_order()?,
    };

    if ctx.json {
        let goals: Vec<_> = order
            .iter()
            .map(|name| {
                serde_json::json!({
                    "name": name,
                    "prerequisites": prerequisites(graph, name),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&goals)?);
        return Ok(());
    }

    for name in &order {
        let prerequisites = prerequisites(graph, name);
        if prerequisites.is_empty() {
            println!("{}", name);
        } else {
            println!("{} <- {}", name, prerequisites.join(", "));
        }
    }
    Ok(())
}

fn prerequisites<'g>(graph: &'g GoalGraph, name: &str) -> Vec<&'g str> {
    graph
        .get_goal(name)
        .map(|goal| goal.prerequisites.iter().map(String::as_str).collect())
        .unwrap_or_default()
}
