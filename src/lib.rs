//! # Stitch Library
//!
//! This library assembles a runnable script artifact from a graph of
//! composable projects. It backs the `stitch` command-line tool and can be
//! embedded by anything that wants the composed result directly.
//!
//! ## Quick Example
//!
//! ```
//! use stitch::link::{LinkKind, ProjectLink};
//!
//! let link = ProjectLink::parse("@stdlib/shell#ref=tag/v1").unwrap();
//! assert_eq!(link.kind(), LinkKind::Registry);
//! assert_eq!(link.normalized, "registry:stdlib/shell#ref=tag/v1");
//!
//! // Normalized links parse back to the same link
//! assert_eq!(ProjectLink::parse(&link.normalized).unwrap(), link);
//! ```
//!
//! ## Core Concepts
//!
//! - **Links (`link`, `resolver`)**: where a project lives. Registry links go
//!   through one templated registry hop, every link gets one chance at a
//!   regex redirect, and git links map to a checkout under the workspace.
//! - **Declarations (`setting`, `profile`)**: each project directory holds a
//!   `stitch.yaml` declaring options, dependencies and resources; a profile
//!   names the main project and adjusts the run.
//! - **Options (`options`, `value`)**: typed values resolved from exports,
//!   assigns, computed expressions and defaults, with conflicts detected
//!   across sources.
//! - **Projects (`project`, `phases::discovery`)**: an arena of loaded
//!   projects, expanded breadth-first and deduplicated by directory.
//! - **Resources (`phases::resources`)**: files classified into config
//!   fragments, templates, template libraries and plain files, each mapped to
//!   an output target.
//! - **Config merge (`merge`)**: fragments merged by priority into one tree
//!   with a trace of which file wrote each leaf.
//!
//! ## Execution Flow
//!
//! [`phases::orchestrator::compose`] runs a composition:
//!
//! 1.  **Discovery**: load the main project, its additions and everything they
//!     reach; options resolve and resources are scanned per project.
//! 2.  **Config merge**: merge every config fragment of the loaded set.
//!
//! [`phases::write::materialize`] then renders templates, links plain files
//! and records the merged config in the output directory.

pub mod cache;
pub mod defaults;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod git;
pub mod link;
pub mod merge;
pub mod options;
pub mod output;
pub mod path;
pub mod phases;
pub mod profile;
pub mod project;
pub mod repository;
pub mod resolver;
pub mod setting;
pub mod structured;
pub mod value;

#[cfg(test)]
mod link_proptest;
