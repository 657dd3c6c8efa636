//! Goal graph
//!
//! Build goals are named nodes with ordered prerequisites. The graph is plain
//! data: the orchestrator asks it for a plan and then executes each goal's
//! action in order.

use crate::error::{BuildError, BuildResult};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

pub const DISCOVER: &str = "discover";
pub const BUILD_ALL: &str = "build-all";
pub const CLEAN_DERIVED: &str = "clean-derived";
pub const CLEAN_SCRATCH: &str = "clean-scratch";
pub const CLEAN_ALL: &str = "clean-all";
pub const DEFAULT: &str = "default";

/// Name of a profile's conversion goal
pub fn convert_goal(profile: &str) -> String {
    format!("convert:{}", profile)
}

/// Name of a profile's compilation goal
pub fn compile_goal(profile: &str) -> String {
    format!("compile:{}", profile)
}

/// What a goal does once its prerequisites have run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoalAction {
    /// Build the source catalog and check for naming collisions
    Discover,
    /// Convert stale intermediates of a profile
    Convert(String),
    /// Compile stale finals of a profile
    Compile(String),
    /// Remove derived artifacts and scratch contents
    CleanDerived,
    /// Remove scratch contents and compiler byproducts
    CleanScratch,
    /// Remove configured caches
    CleanCaches,
    /// Nothing beyond the prerequisites
    Aggregate,
}

/// A named goal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Goal {
    pub name: String,
    /// Prerequisites, run in this order
    pub prerequisites: Vec<String>,
    pub action: GoalAction,
}

impl Goal {
    pub fn new(name: impl Into<String>, action: GoalAction) -> Self {
        Self {
            name: name.into(),
            prerequisites: Vec::new(),
            action,
        }
    }

    /// Add prerequisites
    pub fn with_prerequisites<I, S>(mut self, prerequisites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prerequisites
            .extend(prerequisites.into_iter().map(Into::into));
        self
    }
}

/// Goals by name
#[derive(Debug, Clone, Default)]
pub struct GoalGraph {
    goals: BTreeMap<String, Goal>,
}

impl GoalGraph {
    /// Create a new empty goal graph
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard goals for a set of profiles
    pub fn standard<S: AsRef<str>>(profiles: &[S]) -> Self {
        let mut graph = Self::new();
        graph.add_goal(Goal::new(DISCOVER, GoalAction::Discover));

        for profile in profiles {
            let profile = profile.as_ref();
            graph.add_goal(
                Goal::new(convert_goal(profile), GoalAction::Convert(profile.to_string()))
                    .with_prerequisites([DISCOVER]),
            );
            graph.add_goal(
                Goal::new(compile_goal(profile), GoalAction::Compile(profile.to_string()))
                    .with_prerequisites([convert_goal(profile)]),
            );
        }

        graph.add_goal(
            Goal::new(BUILD_ALL, GoalAction::Aggregate)
                .with_prerequisites(profiles.iter().map(|p| compile_goal(p.as_ref()))),
        );
        graph.add_goal(
            Goal::new(CLEAN_DERIVED, GoalAction::CleanDerived).with_prerequisites([DISCOVER]),
        );
        graph.add_goal(
            Goal::new(CLEAN_SCRATCH, GoalAction::CleanScratch).with_prerequisites([DISCOVER]),
        );
        graph.add_goal(
            Goal::new(CLEAN_ALL, GoalAction::CleanCaches)
                .with_prerequisites([CLEAN_DERIVED, CLEAN_SCRATCH]),
        );
        graph.add_goal(
            Goal::new(DEFAULT, GoalAction::Aggregate)
                .with_prerequisites([BUILD_ALL, CLEAN_SCRATCH]),
        );
        graph
    }

    /// Add a goal, replacing any goal of the same name
    pub fn add_goal(&mut self, goal: Goal) {
        self.goals.insert(goal.name.clone(), goal);
    }

    /// Get a goal by name
    pub fn get_goal(&self, name: &str) -> Option<&Goal> {
        self.goals.get(name)
    }

    /// All goals, sorted by name
    pub fn goals(&self) -> impl Iterator<Item = &Goal> {
        self.goals.values()
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }

    /// Check that every prerequisite names a goal and that there are no cycles
    pub fn validate(&self) -> BuildResult<()> {
        for (name, goal) in &self.goals {
            for prerequisite in &goal.prerequisites {
                if !self.goals.contains_key(prerequisite) {
                    return Err(BuildError::UnknownGoal {
                        goal: format!("{} (required by {})", prerequisite, name),
                    });
                }
            }
        }
        self.compute_order().map(|_| ())
    }

    /// Topological order of the whole graph using Kahn's algorithm
    ///
    /// Ties are broken by name so the order is stable.
    pub fn compute_order(&self) -> BuildResult<Vec<String>> {
        let mut remaining: HashMap<&str, usize> = self
            .goals
            .iter()
            .map(|(name, goal)| (name.as_str(), goal.prerequisites.len()))
            .collect();

        let mut ready: BTreeSet<&str> = remaining
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(name, _)| *name)
            .collect();
        let mut order = Vec::with_capacity(self.goals.len());

        while let Some(name) = ready.pop_first() {
            order.push(name.to_string());
            for (dependent, goal) in &self.goals {
                let uses = goal.prerequisites.iter().filter(|p| *p == name).count();
                if uses == 0 {
                    continue;
                }
                if let Some(count) = remaining.get_mut(dependent.as_str()) {
                    *count -= uses;
                    if *count == 0 {
                        ready.insert(dependent.as_str());
                    }
                }
            }
        }

        if order.len() != self.goals.len() {
            return Err(BuildError::CircularGoal(self.find_cycle()));
        }

        Ok(order)
    }

    /// Execution order for one goal
    ///
    /// Depth-first post-order: prerequisites run in declared order, before the
    /// goal itself, and each goal runs at most once.
    pub fn plan(&self, goal: &str) -> BuildResult<Vec<String>> {
        if !self.goals.contains_key(goal) {
            return Err(BuildError::UnknownGoal {
                goal: goal.to_string(),
            });
        }

        let mut done = HashSet::new();
        let mut stack = Vec::new();
        let mut order = Vec::new();
        self.visit(goal, &mut done, &mut stack, &mut order)?;
        Ok(order)
    }

    fn visit(
        &self,
        name: &str,
        done: &mut HashSet<String>,
        stack: &mut Vec<String>,
        order: &mut Vec<String>,
    ) -> BuildResult<()> {
        if done.contains(name) {
            return Ok(());
        }
        if let Some(start) = stack.iter().position(|g| g == name) {
            let mut cycle = stack[start..].to_vec();
            cycle.push(name.to_string());
            return Err(BuildError::CircularGoal(cycle.join(" -> ")));
        }

        let goal = self.goals.get(name).ok_or_else(|| BuildError::UnknownGoal {
            goal: match stack.last() {
                Some(parent) => format!("{} (required by {})", name, parent),
                None => name.to_string(),
            },
        })?;

        stack.push(name.to_string());
        for prerequisite in &goal.prerequisites {
            self.visit(prerequisite, done, stack, order)?;
        }
        stack.pop();

        done.insert(name.to_string());
        order.push(name.to_string());
        Ok(())
    }

    /// Find a cycle in the graph (for error reporting)
    fn find_cycle(&self) -> String {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for name in self.goals.keys() {
            if let Some(cycle) = self.dfs_find_cycle(name, &mut visited, &mut rec_stack, &mut path)
            {
                return cycle;
            }
        }

        "unknown cycle".to_string()
    }

    fn dfs_find_cycle(
        &self,
        name: &str,
        visited: &mut HashSet<String>,
        rec_stack: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Option<String> {
        if rec_stack.contains(name) {
            path.push(name.to_string());
            let start = path.iter().position(|g| g == name).unwrap_or(0);
            return Some(path[start..].join(" -> "));
        }
        if !visited.insert(name.to_string()) {
            return None;
        }

        rec_stack.insert(name.to_string());
        path.push(name.to_string());

        if let Some(goal) = self.goals.get(name) {
            for prerequisite in &goal.prerequisites {
                if let Some(cycle) = self.dfs_find_cycle(prerequisite, visited, rec_stack, path) {
                    return Some(cycle);
                }
            }
        }

        rec_stack.remove(name);
        path.pop();
        None
    }
}
