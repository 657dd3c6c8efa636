//! Build orchestration
//!
//! The orchestrator resolves a goal into a plan, then runs each goal's action.
//! Every run starts from scratch: sources are rediscovered and staleness is
//! re-evaluated from the filesystem, so nothing is carried between runs.

use crate::catalog::{SourceCatalog, SourceDocument};
use crate::clean;
use crate::compile::CompilationStage;
use crate::convert::ConversionStage;
use crate::error::{BuildError, BuildResult, StageError};
use crate::goals::{GoalAction, GoalGraph};
use crate::naming;
use crate::profile::{BuildProfile, ProfileSet};
use crate::report::{FailureReporter, UnitFailure};
use crate::scratch::ScratchDir;
use crate::staleness::{self, DependencySet, Staleness};
use crate::unit::{DerivedArtifact, Stage, Unit};
use quire_config::Config;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

/// Outcome of one goal run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Goal that was requested
    pub goal: String,
    /// Goals executed, in order
    pub plan: Vec<String>,
    /// Number of sources discovered
    pub sources: usize,
    /// Units whose intermediate was regenerated
    pub converted: Vec<Unit>,
    /// Units whose final was regenerated
    pub compiled: Vec<Unit>,
    /// Compile units skipped because their conversion failed in this run
    pub skipped: Vec<Unit>,
    /// Units found up to date
    pub up_to_date: usize,
    /// Paths removed by cleanup goals
    pub removed: usize,
    /// External tool invocations
    pub invocations: usize,
    /// Failed units, in report order
    pub failed: Vec<UnitFailure>,
    /// Wall-clock time
    pub elapsed_ms: u64,
}

impl RunSummary {
    fn new(goal: &str, plan: Vec<String>) -> Self {
        Self {
            goal: goal.to_string(),
            plan,
            ..Default::default()
        }
    }

    /// The run succeeded iff no unit failed
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

/// Staleness of one unit, as reported by a dry run
#[derive(Debug, Clone, Serialize)]
pub struct UnitStatus {
    pub unit: Unit,
    pub path: PathBuf,
    pub staleness: Staleness,
}

/// Drives goals over a project
pub struct Orchestrator {
    config: Config,
    profiles: ProfileSet,
    graph: GoalGraph,
    scratch: ScratchDir,
    reporter: FailureReporter,
    parallel: bool,
    jobs: Option<usize>,
}

/// A stale unit waiting for its tool
struct WorkItem<'c> {
    doc: &'c SourceDocument,
    unit: Unit,
}

type StageResults = Vec<(Unit, Result<PathBuf, StageError>)>;

impl Orchestrator {
    /// Create an orchestrator for a loaded configuration
    pub fn new(config: Config) -> BuildResult<Self> {
        config.validate_scratch()?;
        let profiles = ProfileSet::from_config(&config)?;
        let graph = GoalGraph::standard(&profiles.list_profiles());
        graph.validate()?;

        Ok(Self {
            scratch: ScratchDir::new(config.scratch_dir()),
            parallel: config.parallel(),
            jobs: config.jobs(),
            config,
            profiles,
            graph,
            reporter: FailureReporter::stderr(),
        })
    }

    /// Send failure blocks somewhere other than stderr
    pub fn with_reporter(mut self, reporter: FailureReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Enable/disable concurrent units within a stage
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set worker count for parallel mode
    pub fn with_jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn profiles(&self) -> &ProfileSet {
        &self.profiles
    }

    pub fn graph(&self) -> &GoalGraph {
        &self.graph
    }

    /// Run a goal and everything it depends on
    ///
    /// Unit failures are reported and recorded in the summary; only fatal
    /// errors (discovery, collisions, cleanup I/O) are returned as `Err`.
    pub fn run(&mut self, goal: &str) -> BuildResult<RunSummary> {
        let start = Instant::now();
        let plan = self.graph.plan(goal)?;
        let pool = self.worker_pool()?;
        self.reporter.take_failures();

        let mut summary = RunSummary::new(goal, plan.clone());
        let mut catalog: Option<SourceCatalog> = None;
        let mut failed_conversions: HashSet<Unit> = HashSet::new();

        for name in &plan {
            let action = self
                .graph
                .get_goal(name)
                .map(|g| g.action.clone())
                .ok_or_else(|| BuildError::UnknownGoal { goal: name.clone() })?;
            debug!(goal = %name, "running goal");

            match action {
                GoalAction::Discover => {
                    let discovered = self.discover()?;
                    summary.sources = discovered.len();
                    catalog = Some(discovered);
                }
                GoalAction::Convert(profile) => {
                    let catalog = self.ensure_catalog(&mut catalog)?;
                    let profile = self.profiles.get(&profile)?;
                    let (results, fresh) = self.convert_profile(catalog, profile, pool.as_ref());
                    summary.up_to_date += fresh;
                    summary.invocations += results.len();
                    for (unit, result) in results {
                        match result {
                            Ok(_) => summary.converted.push(unit),
                            Err(e) => {
                                self.reporter.report(&e);
                                failed_conversions.insert(unit);
                            }
                        }
                    }
                }
                GoalAction::Compile(profile) => {
                    let catalog = self.ensure_catalog(&mut catalog)?;
                    let profile = self.profiles.get(&profile)?;
                    let (results, fresh, skipped) =
                        self.compile_profile(catalog, profile, &failed_conversions, pool.as_ref());
                    summary.up_to_date += fresh;
                    summary.invocations += results.len();
                    summary.skipped.extend(skipped);
                    for (unit, result) in results {
                        match result {
                            Ok(_) => summary.compiled.push(unit),
                            Err(e) => self.reporter.report(&e),
                        }
                    }
                }
                GoalAction::CleanDerived => {
                    let catalog = self.ensure_catalog(&mut catalog)?;
                    let removed = clean::clean_derived(
                        catalog,
                        &self.profiles,
                        &self.scratch,
                        &self.config.config_path,
                    )?;
                    info!(removed, "removed derived artifacts");
                    summary.removed += removed;
                }
                GoalAction::CleanScratch => {
                    let catalog = self.ensure_catalog(&mut catalog)?;
                    let removed = clean::clean_scratch(
                        catalog,
                        &self.profiles,
                        &self.scratch,
                        &self.config.config_path,
                    )?;
                    info!(removed, "removed scratch output");
                    summary.removed += removed;
                }
                GoalAction::CleanCaches => {
                    let removed = clean::clean_caches(&self.config.cache_paths())?;
                    info!(removed, "removed caches");
                    summary.removed += removed;
                }
                GoalAction::Aggregate => {}
            }
        }

        summary.failed = self.reporter.take_failures();
        summary.elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            goal,
            converted = summary.converted.len(),
            compiled = summary.compiled.len(),
            failed = summary.failed.len(),
            "run finished"
        );
        Ok(summary)
    }

    /// Evaluate every unit without invoking any tool
    pub fn status(&self) -> BuildResult<Vec<UnitStatus>> {
        let catalog = self.discover()?;
        let mut statuses = Vec::new();

        for doc in catalog.iter() {
            for profile in self.profiles.iter().filter(|p| doc.has_profile(&p.name)) {
                for stage in Stage::all() {
                    if let Some(artifact) = self.artifact(doc, profile, stage) {
                        statuses.push(UnitStatus {
                            staleness: staleness::check(&artifact.path, &artifact.dependencies),
                            unit: artifact.unit,
                            path: artifact.path,
                        });
                    }
                }
            }
        }

        Ok(statuses)
    }

    /// Enumerate sources and verify that derived names are unique
    pub fn discover(&self) -> BuildResult<SourceCatalog> {
        let catalog = SourceCatalog::discover(
            self.config.project_root(),
            &self.config.project.sources.pattern,
            &self.profiles,
        )?;
        naming::check_collisions(&catalog, &self.profiles)?;
        info!(sources = catalog.len(), "discovered sources");
        Ok(catalog)
    }

    /// The artifact a unit produces and what it depends on
    pub fn artifact(
        &self,
        doc: &SourceDocument,
        profile: &BuildProfile,
        stage: Stage,
    ) -> Option<DerivedArtifact> {
        let path = naming::artifact_path(&doc.path, profile, stage)?;

        let mut dependencies = DependencySet::new();
        if stage == Stage::Compile {
            dependencies = dependencies.with_file(naming::intermediate_path(&doc.path, profile));
        }
        dependencies = dependencies
            .with_file(&doc.path)
            .with_file(&self.config.config_path);
        if profile.uses_aux {
            if let Some(aux) = self.config.aux_dir() {
                dependencies = dependencies.with_tree(aux);
            }
        }

        Some(DerivedArtifact::new(
            Unit::new(&doc.relative, &profile.name, stage),
            path,
            dependencies,
        ))
    }

    fn ensure_catalog<'s>(
        &self,
        slot: &'s mut Option<SourceCatalog>,
    ) -> BuildResult<&'s SourceCatalog> {
        let catalog = match slot.take() {
            Some(catalog) => catalog,
            None => self.discover()?,
        };
        Ok(slot.insert(catalog))
    }

    fn convert_profile(
        &self,
        catalog: &SourceCatalog,
        profile: &BuildProfile,
        pool: Option<&ThreadPool>,
    ) -> (StageResults, usize) {
        let (items, fresh) = self.stale_units(catalog, profile, Stage::Convert);
        if items.is_empty() {
            info!(profile = %profile.name, "conversions up to date");
            return (Vec::new(), fresh);
        }

        let stage = ConversionStage::new(self.profiles.converter(), self.config.project_root());
        let results = execute(&items, pool, |item| stage.convert(item.doc, profile));
        (results, fresh)
    }

    fn compile_profile(
        &self,
        catalog: &SourceCatalog,
        profile: &BuildProfile,
        failed_conversions: &HashSet<Unit>,
        pool: Option<&ThreadPool>,
    ) -> (StageResults, usize, Vec<Unit>) {
        if !profile.compiles() {
            debug!(profile = %profile.name, "profile has no compilation stage");
            return (Vec::new(), 0, Vec::new());
        }

        let (items, fresh) = self.stale_units(catalog, profile, Stage::Compile);
        let (items, skipped): (Vec<_>, Vec<_>) = items.into_iter().partition(|item| {
            let conversion = Unit::new(&item.unit.source, &item.unit.profile, Stage::Convert);
            !failed_conversions.contains(&conversion)
        });
        let skipped: Vec<Unit> = skipped.into_iter().map(|item| item.unit).collect();
        for unit in &skipped {
            debug!(unit = %unit, "skipping compile after failed conversion");
        }

        if items.is_empty() {
            if skipped.is_empty() {
                info!(profile = %profile.name, "compilations up to date");
            }
            return (Vec::new(), fresh, skipped);
        }

        let stage = CompilationStage::new(self.config.project_root());
        let shared = &self.scratch;
        let partitioned = pool.is_some();
        let results = execute(&items, pool, |item| {
            let scratch = if partitioned {
                shared.partition(&item.unit)
            } else {
                shared.path().to_path_buf()
            };
            stage.compile(item.doc, profile, &scratch)
        });
        (results, fresh, skipped)
    }

    fn stale_units<'c>(
        &self,
        catalog: &'c SourceCatalog,
        profile: &BuildProfile,
        stage: Stage,
    ) -> (Vec<WorkItem<'c>>, usize) {
        let mut items = Vec::new();
        let mut fresh = 0;

        for doc in catalog.iter().filter(|d| d.has_profile(&profile.name)) {
            let Some(artifact) = self.artifact(doc, profile, stage) else {
                continue;
            };
            match staleness::check(&artifact.path, &artifact.dependencies) {
                Staleness::UpToDate => {
                    debug!(unit = %artifact.unit, "up to date");
                    fresh += 1;
                }
                reason => {
                    debug!(unit = %artifact.unit, reason = %reason.describe(), "stale");
                    items.push(WorkItem {
                        doc,
                        unit: artifact.unit,
                    });
                }
            }
        }

        (items, fresh)
    }

    fn worker_pool(&self) -> BuildResult<Option<ThreadPool>> {
        if !self.parallel {
            return Ok(None);
        }
        let mut builder = ThreadPoolBuilder::new();
        if let Some(jobs) = self.jobs {
            builder = builder.num_threads(jobs);
        }
        let pool = builder
            .build()
            .map_err(|e| BuildError::WorkerPool(e.to_string()))?;
        debug!(workers = pool.current_num_threads(), "worker pool started");
        Ok(Some(pool))
    }
}

/// Run a stage over its work items, keeping source order in the results
fn execute<'c, F>(items: &[WorkItem<'c>], pool: Option<&ThreadPool>, run: F) -> StageResults
where
    F: Fn(&WorkItem<'c>) -> Result<PathBuf, StageError> + Sync,
{
    match pool {
        Some(pool) => pool.install(|| {
            items
                .par_iter()
                .map(|item| (item.unit.clone(), run(item)))
                .collect()
        }),
        None => items
            .iter()
            .map(|item| (item.unit.clone(), run(item)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_config::project::STARTER_TEMPLATE;
    use quire_config::ProjectConfig;
    use std::fs;
    use tempfile::TempDir;

    fn orchestrator(temp: &TempDir, toml: &str) -> Orchestrator {
        fs::write(temp.path().join("quire.toml"), toml).unwrap();
        let config = Config::from_project(ProjectConfig::parse(toml).unwrap(), temp.path());
        Orchestrator::new(config)
            .unwrap()
            .with_reporter(FailureReporter::silent())
    }

    #[test]
    fn test_graph_covers_profiles() {
        let temp = TempDir::new().unwrap();
        let orch = orchestrator(&temp, STARTER_TEMPLATE);
        assert!(orch.graph().get_goal("convert:slides").is_some());
        assert!(orch.graph().get_goal("compile:outline").is_some());
    }

    #[test]
    fn test_unknown_goal() {
        let temp = TempDir::new().unwrap();
        let mut orch = orchestrator(&temp, STARTER_TEMPLATE);
        assert!(matches!(
            orch.run("convert:poster"),
            Err(BuildError::UnknownGoal { .. })
        ));
    }

    #[test]
    fn test_empty_project_builds_nothing() {
        let temp = TempDir::new().unwrap();
        let mut orch = orchestrator(&temp, STARTER_TEMPLATE);

        let summary = orch.run("build-all").unwrap();
        assert!(summary.is_success());
        assert_eq!(summary.sources, 0);
        assert_eq!(summary.invocations, 0);
    }

    #[test]
    fn test_artifact_dependencies() {
        let temp = TempDir::new().unwrap();
        let orch = orchestrator(&temp, STARTER_TEMPLATE);
        let doc = SourceDocument {
            path: temp.path().join("talk.md"),
            relative: PathBuf::from("talk.md"),
            profiles: vec!["slides".to_string(), "outline".to_string()],
        };

        let slides = orch.profiles().get("slides").unwrap();
        let compile = orch.artifact(&doc, slides, Stage::Compile).unwrap();
        assert_eq!(compile.path, temp.path().join("talk.slides.pdf"));
        assert_eq!(
            compile.dependencies.files(),
            &[
                temp.path().join("talk.slides.tex"),
                temp.path().join("talk.md"),
                temp.path().join("quire.toml")
            ]
        );
        assert_eq!(compile.dependencies.trees(), &[temp.path().join("assets")]);

        let outline = orch.profiles().get("outline").unwrap();
        assert!(orch.artifact(&doc, outline, Stage::Compile).is_none());
        let convert = orch.artifact(&doc, outline, Stage::Convert).unwrap();
        assert_eq!(
            convert.dependencies.files(),
            &[temp.path().join("talk.md"), temp.path().join("quire.toml")]
        );
        assert!(convert.dependencies.trees().is_empty());
    }

    #[test]
    fn test_status_reports_missing() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("talk.md"), "# Talk").unwrap();
        let orch = orchestrator(&temp, STARTER_TEMPLATE);

        let statuses = orch.status().unwrap();
        // outline: convert; slides: convert + compile
        assert_eq!(statuses.len(), 3);
        assert!(statuses.iter().all(|s| s.staleness == Staleness::Missing));
    }
}
