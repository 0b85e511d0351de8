//! JSON contracts: the full tree file and the smaller saved-build file.
//!
//! The tree format keeps compatibility padding from older exports
//! (`currentRanks`, per-node `connections`, `isActive`, `spentPoints`);
//! those fields are derived on export and ignored on import.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use crate::grid::GridPosition;
use crate::sim::TalentTreeState;
use crate::tree::{DEFAULT_POINT_BUDGET, TalentConnection, TalentNode, TalentTree};

/// The only hard failure in the system: an unparseable or shapeless import.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to parse tree JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("tree JSON is missing required field `{0}`")]
    MissingField(&'static str),
}

fn default_budget() -> u32 {
    DEFAULT_POINT_BUDGET
}

fn default_max_ranks() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TreeFile {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_budget")]
    total_points: u32,
    #[serde(default)]
    spent_points: u32,
    #[serde(default)]
    nodes: Vec<NodeFile>,
    #[serde(default)]
    connections: Vec<ConnectionFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeFile {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: String,
    #[serde(default = "default_max_ranks")]
    max_ranks: u32,
    #[serde(default)]
    current_ranks: u32,
    #[serde(default)]
    required_points: u32,
    #[serde(default)]
    prerequisites: Vec<String>,
    #[serde(default)]
    connections: Vec<String>,
    #[serde(default)]
    grid_x: i32,
    #[serde(default)]
    grid_y: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionFile {
    id: String,
    from: String,
    to: String,
    #[serde(default)]
    is_active: bool,
}

fn to_file(tree: &TalentTree) -> TreeFile {
    TreeFile {
        id: tree.id.clone(),
        name: tree.name.clone(),
        description: tree.description.clone(),
        total_points: tree.total_points,
        spent_points: 0,
        nodes: tree
            .nodes
            .iter()
            .map(|n| NodeFile {
                id: n.id.clone(),
                name: n.name.clone(),
                description: n.description.clone(),
                icon: n.icon.clone(),
                max_ranks: n.max_ranks,
                current_ranks: 0,
                required_points: n.required_points,
                prerequisites: n.prerequisites.clone(),
                connections: tree
                    .connections
                    .iter()
                    .filter(|c| c.from == n.id)
                    .map(|c| c.to.clone())
                    .collect(),
                grid_x: n.position.x,
                grid_y: n.position.y,
            })
            .collect(),
        connections: tree
            .connections
            .iter()
            .map(|c| ConnectionFile {
                id: c.id.clone(),
                from: c.from.clone(),
                to: c.to.clone(),
                is_active: false,
            })
            .collect(),
    }
}

fn from_file(file: TreeFile) -> TalentTree {
    TalentTree {
        id: file.id,
        name: file.name,
        description: file.description,
        total_points: file.total_points,
        nodes: file
            .nodes
            .into_iter()
            .map(|n| TalentNode {
                id: n.id,
                name: n.name,
                description: n.description,
                icon: n.icon,
                max_ranks: n.max_ranks.max(1),
                required_points: n.required_points,
                prerequisites: n.prerequisites,
                position: GridPosition::new(n.grid_x, n.grid_y),
            })
            .collect(),
        connections: file
            .connections
            .into_iter()
            .map(|c| TalentConnection {
                id: c.id,
                from: c.from,
                to: c.to,
            })
            .collect(),
    }
}

pub fn export_tree_json(tree: &TalentTree) -> String {
    serde_json::to_string_pretty(&to_file(tree)).unwrap_or_else(|err| {
        error!(%err, tree = %tree.id, "tree export failed to serialize");
        "{}".to_string()
    })
}

/// Permissive import: the payload must parse and carry `id`, `name`, and a
/// `nodes` array; every other field defaults when absent. Malformed nested
/// data is the caller's problem once it fails downstream lookups.
pub fn import_tree_json(json: &str) -> Result<TalentTree, ImportError> {
    let value: Value = serde_json::from_str(json)?;
    for field in ["id", "name"] {
        if !value.get(field).is_some_and(Value::is_string) {
            return Err(ImportError::MissingField(field));
        }
    }
    if !value.get("nodes").is_some_and(Value::is_array) {
        return Err(ImportError::MissingField("nodes"));
    }
    let file: TreeFile = serde_json::from_value(value)?;
    let tree = from_file(file);
    debug!(tree = %tree.id, nodes = tree.nodes.len(), "imported tree");
    Ok(tree)
}

/// Saved-build snapshot; references the tree by id only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildFile {
    pub tree_id: String,
    pub selected_nodes: HashMap<String, u32>,
    pub timestamp: DateTime<Utc>,
}

pub fn export_build(state: &TalentTreeState, tree: &TalentTree) -> BuildFile {
    BuildFile {
        tree_id: tree.id.clone(),
        selected_nodes: state.selected_nodes.clone(),
        timestamp: Utc::now(),
    }
}

pub fn export_build_json(state: &TalentTreeState, tree: &TalentTree) -> String {
    serde_json::to_string_pretty(&export_build(state, tree)).unwrap_or_else(|err| {
        error!(%err, tree = %tree.id, "build export failed to serialize");
        "{}".to_string()
    })
}

pub fn import_build_json(json: &str) -> Result<BuildFile, ImportError> {
    Ok(serde_json::from_str(json)?)
}

/// Rebuilds simulation state from a saved build. Spent points are recomputed
/// from the rank sum; legality under the current tree rules is NOT
/// re-checked, so a build saved against an older tree revision may come back
/// inconsistent until the next allocation attempt re-evaluates state.
pub fn import_build(build: &BuildFile, total_points: u32) -> TalentTreeState {
    let selected_nodes: HashMap<String, u32> = build
        .selected_nodes
        .iter()
        .filter(|(_, ranks)| **ranks > 0)
        .map(|(id, ranks)| (id.clone(), *ranks))
        .collect();
    let spent_points: u32 = selected_nodes.values().sum();
    TalentTreeState {
        selected_nodes,
        available_points: total_points as i32 - spent_points as i32,
        spent_points,
        hovered_node: None,
    }
}
