//! # Tree Command Implementation
//!
//! Displays the loaded project graph, starting at the main project and then
//! each addition. Every node shows the project name and the link it was
//! reached through. A project already shown higher up is printed once more
//! with a `(*)` marker and not expanded again, which also keeps cycles finite.
//!
//! This command composes the graph but writes nothing.

use std::borrow::Cow;
use std::collections::HashSet;
use std::io;

use anyhow::Result;
use clap::Args;
use ptree::{print_tree, Style, TreeItem};

use super::ProfileArgs;
use stitch::output::OutputConfig;
use stitch::phases::{orchestrator, Composition};
use stitch::project::ProjectId;

/// Display the project dependency graph
#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Maximum depth to display.
    ///
    /// 0 shows only the roots, 1 their direct dependencies, and so on.
    #[arg(long, value_name = "NUM")]
    pub depth: Option<usize>,
}

/// Execute the `tree` command.
pub fn execute(args: TreeArgs, profile_args: &ProfileArgs, output: &OutputConfig) -> Result<()> {
    let profile = profile_args.load()?;
    let composition = orchestrator::compose(&profile)?;

    println!("{}", output.heading("Project graph"));
    for root in roots(&composition) {
        let node = build_tree_node(
            &composition,
            root,
            None,
            args.depth.unwrap_or(usize::MAX),
            0,
            &mut HashSet::new(),
        );
        print_tree(&node)?;
    }
    Ok(())
}

/// The main project followed by each addition.
fn roots(composition: &Composition) -> Vec<ProjectId> {
    let main = composition.order[0];
    std::iter::once(main)
        .chain(
            composition
                .loaded()
                .filter(|project| project.addition)
                .map(|project| project.id),
        )
        .collect()
}

fn build_tree_node(
    composition: &Composition,
    id: ProjectId,
    via: Option<&str>,
    max_depth: usize,
    current_depth: usize,
    seen: &mut HashSet<ProjectId>,
) -> TreeNode {
    let project = composition.projects.get(id);
    let mut label = match via {
        Some(link) => format!("{} ({})", project.name(), link),
        None => format!("{} ({})", project.name(), project.dir().display()),
    };

    if !seen.insert(id) {
        label.push_str(" (*)");
        return TreeNode {
            label,
            children: Vec::new(),
        };
    }
    if current_depth >= max_depth {
        return TreeNode {
            label,
            children: Vec::new(),
        };
    }

    let children = project
        .dependency
        .edges
        .iter()
        .filter_map(|edge| edge.project.map(|dep| (dep, edge.link.to_string())))
        .map(|(dep, link)| {
            build_tree_node(composition, dep, Some(&link), max_depth, current_depth + 1, seen)
        })
        .collect();
    TreeNode { label, children }
}

/// Tree node structure for ptree visualization
#[derive(Clone)]
struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl TreeItem for TreeNode {
    type Child = TreeNode;

    fn write_self<W: io::Write>(&self, f: &mut W, _style: &Style) -> io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> Cow<'_, [Self::Child]> {
        Cow::Borrowed(&self.children)
    }
}
