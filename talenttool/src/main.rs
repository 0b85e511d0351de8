use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use talentcore::serial::{export_tree_json, import_build_json, import_build, import_tree_json};
use talentcore::sim::{allocate_point, can_allocate_point, TalentTreeState};
use talentcore::tree::{TalentTree, TreeMetadata};
use talentcore::validate::validate_tree;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "talenttool")]
#[command(about = "Create, inspect, and validate talent tree files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write an empty tree file.
    New {
        out: PathBuf,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Print a summary of a tree file.
    Info { file: PathBuf },
    /// Run structural validation; exits nonzero on findings.
    Validate { file: PathBuf },
    /// Replay a saved build against a tree through the allocation rules.
    Replay { tree: PathBuf, build: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::New {
            out,
            name,
            description,
        } => cmd_new(&out, name, description),
        Commands::Info { file } => cmd_info(&file),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Replay { tree, build } => cmd_replay(&tree, &build),
    }
}

fn load_tree(path: &Path) -> Result<TalentTree> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    import_tree_json(&text).with_context(|| format!("Failed to import {}", path.display()))
}

fn cmd_new(out: &Path, name: Option<String>, description: Option<String>) -> Result<()> {
    let tree = TalentTree::empty(TreeMetadata { name, description });
    fs::write(out, export_tree_json(&tree))
        .with_context(|| format!("Failed to write {}", out.display()))?;
    println!("Wrote {} ({})", out.display(), tree.id);
    Ok(())
}

fn cmd_info(file: &Path) -> Result<()> {
    let tree = load_tree(file)?;

    let mut per_tier: BTreeMap<i32, usize> = BTreeMap::new();
    for node in &tree.nodes {
        *per_tier.entry(node.tier()).or_insert(0) += 1;
    }

    println!("{} ({})", tree.name, tree.id);
    if !tree.description.is_empty() {
        println!("  {}", tree.description);
    }
    println!("  budget: {} points", tree.total_points);
    println!(
        "  {} nodes, {} connections",
        tree.nodes.len(),
        tree.connections.len()
    );
    for (tier, count) in per_tier {
        println!("  tier {tier}: {count} node(s)");
    }
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<()> {
    let tree = load_tree(file)?;
    let errors = validate_tree(&tree);
    if errors.is_empty() {
        println!(
            "OK: {} nodes, {} connections, structure valid",
            tree.nodes.len(),
            tree.connections.len()
        );
        return Ok(());
    }
    for error in &errors {
        eprintln!("error: {error}");
    }
    bail!("{} validation finding(s)", errors.len());
}

/// Greedy replay: keep allocating any still-owed rank that is currently
/// legal until nothing moves, then report what could not be placed.
fn cmd_replay(tree_path: &Path, build_path: &Path) -> Result<()> {
    let tree = load_tree(tree_path)?;
    let text = fs::read_to_string(build_path)
        .with_context(|| format!("Failed to read {}", build_path.display()))?;
    let build = import_build_json(&text)
        .with_context(|| format!("Failed to parse {}", build_path.display()))?;

    if build.tree_id != tree.id {
        eprintln!(
            "warning: build was saved against tree {}, replaying on {}",
            build.tree_id, tree.id
        );
    }

    let target = import_build(&build, tree.total_points);
    let mut owed: BTreeMap<String, u32> = target
        .selected_nodes
        .iter()
        .map(|(id, ranks)| (id.clone(), *ranks))
        .collect();

    let mut state = TalentTreeState::new(tree.total_points);
    loop {
        let mut progressed = false;
        for (id, remaining) in owed.iter_mut() {
            if *remaining > 0 && can_allocate_point(id, &state, &tree) {
                state = allocate_point(id, &state, &tree);
                *remaining -= 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    let mut unplaced = 0usize;
    for (id, remaining) in &owed {
        if *remaining == 0 {
            continue;
        }
        unplaced += 1;
        let name = tree.node(id).map_or("<deleted node>", |n| n.name.as_str());
        eprintln!("error: could not place {remaining} rank(s) in {name} ({id})");
    }
    if unplaced == 0 {
        println!(
            "OK: replayed {} point(s), {} remaining in budget",
            state.spent_points, state.available_points
        );
        return Ok(());
    }
    bail!("build no longer replays against this tree");
}
