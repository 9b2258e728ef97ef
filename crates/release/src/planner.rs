//! Release planning.
//!
//! The planner composes the impact analyzer, version calculator and cascade
//! detector into one immutable [`Plan`]. It performs no I/O: the caller
//! fetches packages, commits, tags and the dependency graph up front.

use crate::analyzer::{CommitLog, Impact, ImpactAnalyzer};
use crate::cascade::{CascadeDetector, DependencyGraph};
use crate::error::{Error, Result};
use crate::package::Package;
use crate::plan::{Plan, ReleaseItem};
use crate::tag::TagIndex;
use crate::version::{Lifecycle, PrContext, ReleaseMode, VersionCalculator};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Pre-fetched inputs of a planning run.
#[derive(Debug, Clone, Copy)]
pub struct PlanInput<'a> {
    /// Every package in the workspace.
    pub packages: &'a [Package],
    /// Classified commits per package since its last stable tag.
    pub commits: &'a CommitLog,
    /// All tag names in the repository.
    pub tags: &'a [String],
    /// Workspace dependency graph.
    pub graph: &'a DependencyGraph,
}

/// Options of a planning run.
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Restrict the plan to these packages.
    pub packages: Option<Vec<String>>,
    /// Pull request coordinates (required for the PR lifecycle).
    pub pr: Option<PrContext>,
    /// Plan timestamp, defaults to now.
    pub timestamp: Option<DateTime<Utc>>,
}

impl PlanOptions {
    /// Create default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the plan to a package subset.
    #[must_use]
    pub fn with_packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.packages = Some(packages.into_iter().map(Into::into).collect());
        self
    }

    /// Set the pull request context.
    #[must_use]
    pub fn with_pr(mut self, pr: PrContext) -> Self {
        self.pr = Some(pr);
        self
    }

    /// Pin the plan timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Composes analysis, versioning and cascade detection into a [`Plan`].
pub struct Planner;

impl Planner {
    /// Produce a release plan.
    ///
    /// # Errors
    ///
    /// Returns an error if the package filter names an unknown package, the
    /// PR lifecycle lacks PR context, or the dependency graph has a cycle.
    pub fn plan(lifecycle: Lifecycle, input: PlanInput<'_>, options: &PlanOptions) -> Result<Plan> {
        let mode = ReleaseMode::new(lifecycle, options.pr.clone())?;
        let timestamp = options.timestamp.unwrap_or_else(Utc::now);
        let allowed = Self::package_filter(input.packages, options.packages.as_deref())?;

        let packages: Vec<Package> = input
            .packages
            .iter()
            .filter(|p| allowed.as_ref().is_none_or(|set| set.contains(&p.name)))
            .cloned()
            .collect();

        let tags = TagIndex::from_tags(input.tags);
        let impacts = ImpactAnalyzer::new(&tags).analyze(&packages, input.commits);

        let calculator = VersionCalculator::new(&tags);
        let releases: Vec<ReleaseItem> = impacts
            .into_iter()
            .map(|impact| Self::release_item(&calculator, impact, &mode))
            .collect();

        let cascades = CascadeDetector::new(input.graph, &tags).detect(
            input.packages,
            &releases,
            &mode,
            timestamp,
            allowed.as_ref(),
        )?;

        info!(
            lifecycle = %lifecycle,
            releases = releases.len(),
            cascades = cascades.len(),
            "Release plan computed"
        );

        Ok(Plan {
            lifecycle,
            timestamp,
            releases,
            cascades,
        })
    }

    fn package_filter(
        packages: &[Package],
        requested: Option<&[String]>,
    ) -> Result<Option<BTreeSet<String>>> {
        let Some(requested) = requested else {
            return Ok(None);
        };
        let known: BTreeSet<&str> = packages.iter().map(|p| p.name.as_str()).collect();
        if let Some(unknown) = requested.iter().find(|name| !known.contains(name.as_str())) {
            return Err(Error::package_not_found(unknown.clone()));
        }
        Ok(Some(requested.iter().cloned().collect()))
    }

    fn release_item(
        calculator: &VersionCalculator<'_>,
        impact: Impact,
        mode: &ReleaseMode,
    ) -> ReleaseItem {
        let next = calculator.calculate(
            &impact.package,
            impact.current_version.as_ref(),
            impact.bump,
            mode,
        );
        let bump = impact
            .current_version
            .clone()
            .unwrap_or_default()
            .adjusted_bump_type(impact.bump);
        debug!(
            package = %impact.package,
            bump = %bump,
            current = ?impact.current_version.as_ref().map(ToString::to_string),
            next = %next.version,
            "Planned release"
        );
        ReleaseItem {
            package: impact.package,
            scope: impact.scope,
            bump,
            current_version: impact.current_version,
            next_version: next.version,
            target_version: next.target,
            commits: impact.commits,
            lifecycle: next.lifecycle,
        }
    }
}

/// Produce a release plan. See [`Planner::plan`].
///
/// # Errors
///
/// Propagates [`Planner::plan`] errors.
pub fn plan(lifecycle: Lifecycle, input: PlanInput<'_>, options: &PlanOptions) -> Result<Plan> {
    Planner::plan(lifecycle, input, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::{Classification, CommitType, ReleaseCommit};
    use crate::plan::ItemLifecycle;
    use crate::version::{BumpType, Version};

    fn commit(message: &str) -> ReleaseCommit {
        let (head, description) = message.split_once(": ").unwrap();
        let breaking = head.ends_with('!');
        let commit_type: CommitType = head.trim_end_matches('!').parse().unwrap();
        ReleaseCommit {
            hash: "1234567890abcdef".to_string(),
            author: "dev".to_string(),
            date: Utc::now(),
            classification: Classification::Single {
                commit_type,
                scopes: vec![],
                breaking,
                message: description.to_string(),
            },
        }
    }

    struct Fixture {
        packages: Vec<Package>,
        commits: CommitLog,
        tags: Vec<String>,
        graph: DependencyGraph,
    }

    impl Fixture {
        fn single(tags: &[&str], messages: &[&str]) -> Self {
            let mut commits = CommitLog::new();
            commits.insert(
                "@pkg".to_string(),
                messages.iter().copied().map(commit).collect(),
            );
            Self {
                packages: vec![Package::new("@pkg", "/repo/packages/pkg")],
                commits,
                tags: tags.iter().map(|t| (*t).to_string()).collect(),
                graph: DependencyGraph::from_dependencies([("@pkg", Vec::<String>::new())]),
            }
        }

        fn input(&self) -> PlanInput<'_> {
            PlanInput {
                packages: &self.packages,
                commits: &self.commits,
                tags: &self.tags,
                graph: &self.graph,
            }
        }

        fn plan(&self, lifecycle: Lifecycle, options: &PlanOptions) -> Plan {
            Planner::plan(lifecycle, self.input(), options).unwrap()
        }
    }

    fn only(plan: &Plan) -> &ReleaseItem {
        assert_eq!(plan.releases.len(), 1);
        &plan.releases[0]
    }

    #[test]
    fn test_fix_is_patch() {
        let fixture = Fixture::single(&["@pkg@1.0.0"], &["fix: x"]);
        let plan = fixture.plan(Lifecycle::Stable, &PlanOptions::new());
        let item = only(&plan);
        assert_eq!(item.next_version, Version::new(1, 0, 1));
        assert_eq!(item.bump, BumpType::Patch);
        assert_eq!(item.current_version, Some(Version::new(1, 0, 0)));
    }

    #[test]
    fn test_feat_is_minor() {
        let fixture = Fixture::single(&["@pkg@1.0.0"], &["feat: x"]);
        let item = fixture.plan(Lifecycle::Stable, &PlanOptions::new());
        assert_eq!(only(&item).next_version, Version::new(1, 1, 0));
        assert_eq!(only(&item).bump, BumpType::Minor);
    }

    #[test]
    fn test_breaking_is_major() {
        let fixture = Fixture::single(&["@pkg@1.0.0"], &["feat!: x"]);
        let plan = fixture.plan(Lifecycle::Stable, &PlanOptions::new());
        assert_eq!(only(&plan).next_version, Version::new(2, 0, 0));
        assert_eq!(only(&plan).bump, BumpType::Major);
    }

    #[test]
    fn test_first_release_below_one() {
        let fixture = Fixture::single(&[], &["feat: init"]);
        let plan = fixture.plan(Lifecycle::Stable, &PlanOptions::new());
        assert_eq!(only(&plan).next_version, Version::new(0, 1, 0));
        assert_eq!(only(&plan).current_version, None);
    }

    #[test]
    fn test_initial_development_breaking_is_minor() {
        let fixture = Fixture::single(&["@pkg@0.4.2"], &["feat!: x"]);
        let plan = fixture.plan(Lifecycle::Stable, &PlanOptions::new());
        assert_eq!(only(&plan).next_version, Version::new(0, 5, 0));
        assert_eq!(only(&plan).bump, BumpType::Minor);
    }

    #[test]
    fn test_chore_only_plans_nothing() {
        let fixture = Fixture::single(&["@pkg@1.0.0"], &["chore: x", "ci: y"]);
        let plan = fixture.plan(Lifecycle::Stable, &PlanOptions::new());
        assert!(plan.is_empty());
    }

    #[test]
    fn test_preview_iteration() {
        let fixture = Fixture::single(
            &["@pkg@1.0.0", "@pkg@1.1.0-next.1", "@pkg@1.1.0-next.2"],
            &["feat: x"],
        );
        let plan = fixture.plan(Lifecycle::Preview, &PlanOptions::new());
        assert_eq!(plan.lifecycle, Lifecycle::Preview);
        assert_eq!(only(&plan).next_version.to_string(), "1.1.0-next.3");
    }

    #[test]
    fn test_pr_iteration() {
        let fixture = Fixture::single(&["@pkg@1.0.0"], &["fix: x"]);
        let options = PlanOptions::new().with_pr(PrContext::new(42, "abcdef1234567"));
        let plan = fixture.plan(Lifecycle::Pr, &options);
        let item = only(&plan);
        assert_eq!(item.next_version.to_string(), "0.0.0-pr.42.1.abcdef1");
        assert_eq!(item.target_version, Version::new(1, 0, 1));

        let fixture = Fixture::single(&["@pkg@1.0.0", "@pkg@0.0.0-pr.42.1.0000000"], &["fix: x"]);
        let options = PlanOptions::new().with_pr(PrContext::new(42, "ffffffffffff"));
        let plan = fixture.plan(Lifecycle::Pr, &options);
        assert!(matches!(
            only(&plan).lifecycle,
            ItemLifecycle::PullRequest { iteration: 2, pr_number: 42, .. }
        ));
    }

    #[test]
    fn test_pr_requires_context() {
        let fixture = Fixture::single(&[], &["fix: x"]);
        let err = Planner::plan(Lifecycle::Pr, fixture.input(), &PlanOptions::new()).unwrap_err();
        assert!(matches!(err, Error::MissingPrContext { .. }));
    }

    fn workspace() -> Fixture {
        let packages = vec![
            Package::new("a", "/repo/a"),
            Package::new("b", "/repo/b"),
            Package::new("c", "/repo/c"),
            Package::new("d", "/repo/d"),
        ];
        let mut commits = CommitLog::new();
        commits.insert("a".to_string(), vec![commit("feat: new api")]);
        commits.insert("d".to_string(), vec![commit("fix: typo")]);
        Fixture {
            packages,
            commits,
            tags: vec!["a@1.0.0".to_string(), "b@1.0.0".to_string(), "c@1.0.0".to_string()],
            graph: DependencyGraph::from_dependencies([
                ("a", vec![]),
                ("b", vec!["a"]),
                ("c", vec!["b"]),
                ("d", vec![]),
            ]),
        }
    }

    #[test]
    fn test_transitive_cascades() {
        let fixture = workspace();
        let plan = fixture.plan(Lifecycle::Stable, &PlanOptions::new());
        let releases: Vec<&str> = plan.releases.iter().map(|r| r.package.as_str()).collect();
        let cascades: Vec<&str> = plan.cascades.iter().map(|r| r.package.as_str()).collect();
        assert_eq!(releases, vec!["a", "d"]);
        assert_eq!(cascades, vec!["b", "c"]);
        assert!(plan.cascades.iter().all(|c| c.bump == BumpType::Patch));
        assert_eq!(plan.cascades[1].next_version, Version::new(1, 0, 1));
    }

    #[test]
    fn test_package_filter() {
        let fixture = workspace();
        let plan = fixture.plan(Lifecycle::Stable, &PlanOptions::new().with_packages(["a", "b"]));
        let releases: Vec<&str> = plan.releases.iter().map(|r| r.package.as_str()).collect();
        let cascades: Vec<&str> = plan.cascades.iter().map(|r| r.package.as_str()).collect();
        assert_eq!(releases, vec!["a"]);
        assert_eq!(cascades, vec!["b"]);
    }

    #[test]
    fn test_unknown_package_filter() {
        let fixture = workspace();
        let err = Planner::plan(
            Lifecycle::Stable,
            fixture.input(),
            &PlanOptions::new().with_packages(["zzz"]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::PackageNotFound { name } if name == "zzz"));
    }

    #[test]
    fn test_timestamp_is_stamped() {
        let fixture = workspace();
        let at = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let plan = fixture.plan(Lifecycle::Stable, &PlanOptions::new().with_timestamp(at));
        assert_eq!(plan.timestamp, at);
        // identical inputs produce identical plans and workflow ids
        let again = fixture.plan(Lifecycle::Stable, &PlanOptions::new().with_timestamp(at));
        assert_eq!(plan.workflow_id().unwrap(), again.workflow_id().unwrap());
    }
}
