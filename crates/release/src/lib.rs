//! Release planning for multi-package repositories.
//!
//! This crate turns a repository's classified commit history into an
//! immutable release [`Plan`]: which packages release, at which version, and
//! which packages must follow because one of their dependencies released.
//!
//! # Architecture
//!
//! - [`analyzer`] - Folds commits since the last stable tag into one bump per package
//! - [`version`] - Semantic versions, phase-aware bumps and lifecycle suffixes
//! - [`cascade`] - Dependency graph and transitive cascade detection
//! - [`monotonic`] - Validates that commit order implies version order
//! - [`planner`] - Composes the above into a [`Plan`] without any I/O
//! - [`plan`] - Plan items, persistence and workflow identity
//! - [`workspace`] - Cargo workspace scanning
//! - [`config`] - `monorel.toml` configuration
//!
//! Version control and commit parsing are consumed through the
//! [`VersionControl`] and [`CommitClassifier`] traits.
//!
//! # Example
//!
//! ```rust,ignore
//! use monorel_release::{Lifecycle, PlanInput, PlanOptions, Planner};
//!
//! let plan = Planner::plan(
//!     Lifecycle::Stable,
//!     PlanInput { packages: &packages, commits: &commits, tags: &tags, graph: &graph },
//!     &PlanOptions::new(),
//! )?;
//! plan.save(&config.plan_path(root))?;
//! ```

pub mod analyzer;
pub mod cascade;
pub mod commit;
pub mod config;
pub mod env;
pub mod error;
pub mod monotonic;
pub mod package;
pub mod plan;
pub mod planner;
pub mod tag;
pub mod vcs;
pub mod version;
pub mod workspace;

pub use analyzer::{CommitLog, Impact, ImpactAnalyzer};
pub use cascade::{CascadeDetector, DependencyGraph};
pub use commit::{
    Classification, CommitClassifier, CommitType, ReleaseCommit, ScopeTarget, ScopedCommit,
};
pub use config::{
    PlanConfig, PreflightConfig, PublishConfig, ReleaseConfig, ReleaseGitConfig, WorkflowConfig,
};
pub use env::{Environment, ProcessEnvironment, detect_pr_number};
pub use error::{Error, Result};
pub use monotonic::{MonotonicValidator, Relationship, Violation};
pub use package::Package;
pub use plan::{ItemLifecycle, Plan, ReleaseItem};
pub use planner::{PlanInput, PlanOptions, Planner, plan};
pub use tag::{ReleaseTag, TagIndex, format_tag};
pub use vcs::VersionControl;
pub use version::{BumpType, Lifecycle, PrContext, ReleaseMode, Version, VersionCalculator};
pub use workspace::{Workspace, manifest_version};
