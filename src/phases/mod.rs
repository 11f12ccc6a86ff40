//! The phases of a `stitch` composition.
//!
//! ## Overview
//!
//! A composition runs in three phases:
//! 1. Discovery - Load the main project, its additions and every project they
//!    reach; options resolve and resources are scanned as each project loads
//! 2. Config merge - Merge the config fragments of the loaded closure
//! 3. Writing - Render templates, link plain files and record metadata
//!
//! Resource scanning lives in [`resources`] and is driven by phase 1.
//! [`orchestrator`] ties the phases together.

pub mod discovery;
pub mod orchestrator;
pub mod resources;
pub mod write;

pub use discovery::Loader;
pub use orchestrator::{build, compose, compose_with, Composition};
pub use resources::{Resource, ResourceFile, ResourceKind, TargetIndex};
