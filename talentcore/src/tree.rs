use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::grid::GridPosition;

/// Default point budget for a freshly created tree.
pub const DEFAULT_POINT_BUDGET: u32 = 51;

/// Ids are epoch millis plus a process-local counter; uniqueness within the
/// process lifetime is the only requirement.
fn generate_id(prefix: &str) -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{millis}_{n:04x}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TalentNode {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    /// Always >= 1.
    pub max_ranks: u32,
    /// Minimum cumulative spend in earlier tiers before this node unlocks.
    pub required_points: u32,
    /// Node ids that must each hold at least one rank. Kept in lockstep with
    /// the tree's connection list by every editor operation.
    pub prerequisites: Vec<String>,
    pub position: GridPosition,
}

impl TalentNode {
    pub fn from_template(position: GridPosition, template: Option<&NodeTemplate>) -> Self {
        Self {
            id: generate_id("node"),
            name: template.map_or_else(|| "New Talent".to_string(), |t| t.name.clone()),
            description: template
                .map_or_else(|| "A new talent ability".to_string(), |t| t.description.clone()),
            icon: template.map_or_else(|| "star".to_string(), |t| t.icon.clone()),
            max_ranks: template.map_or(1, |t| t.max_ranks.max(1)),
            required_points: template.map_or(0, |t| t.required_points),
            prerequisites: Vec::new(),
            position,
        }
    }

    pub const fn tier(&self) -> i32 {
        self.position.tier()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTemplate {
    pub name: String,
    pub description: String,
    pub icon: String,
    pub max_ranks: u32,
    pub required_points: u32,
}

/// Built-in starting points for node creation.
pub fn node_templates() -> Vec<NodeTemplate> {
    let t = |name: &str, description: &str, icon: &str, max_ranks: u32, required_points: u32| {
        NodeTemplate {
            name: name.to_string(),
            description: description.to_string(),
            icon: icon.to_string(),
            max_ranks,
            required_points,
        }
    };
    vec![
        t("Basic Ability", "A basic talent ability", "sword", 1, 0),
        t("Passive Skill", "A passive enhancement", "shield", 3, 0),
        t("Ultimate Ability", "A powerful ultimate ability", "burst", 1, 20),
        t("Mastery", "A mastery talent with multiple ranks", "star", 5, 5),
    ]
}

/// Directed edge: `from` is a prerequisite of `to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TalentConnection {
    pub id: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeMetadata {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Partial node update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub max_ranks: Option<u32>,
    pub required_points: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    UnknownNode,
    UnknownConnection,
    CellOccupied,
    OffGrid,
    SelfConnection,
    DuplicateConnection,
    SameTierConnection,
    NoPendingConnection,
    AllocationBlocked,
    WrongMode,
}

/// Every editor operation reports whether it changed the tree. Callers that
/// only care about the resulting value can ignore it: a rejected operation
/// always returns the input tree unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Applied,
    Rejected(RejectReason),
}

impl EditOutcome {
    pub fn is_applied(self) -> bool {
        matches!(self, EditOutcome::Applied)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TalentTree {
    pub id: String,
    pub name: String,
    pub description: String,
    pub total_points: u32,
    pub nodes: Vec<TalentNode>,
    pub connections: Vec<TalentConnection>,
}

impl TalentTree {
    pub fn empty(metadata: TreeMetadata) -> Self {
        Self {
            id: generate_id("tree"),
            name: metadata.name.unwrap_or_else(|| "New Talent Tree".to_string()),
            description: metadata
                .description
                .unwrap_or_else(|| "A custom talent tree".to_string()),
            total_points: DEFAULT_POINT_BUDGET,
            nodes: Vec::new(),
            connections: Vec::new(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&TalentNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn connection(&self, id: &str) -> Option<&TalentConnection> {
        self.connections.iter().find(|c| c.id == id)
    }

    pub fn is_cell_occupied(&self, cell: GridPosition) -> bool {
        self.nodes.iter().any(|n| n.position == cell)
    }

    /// Appends `node`. Rejects when the destination cell is off-grid or
    /// already holds a node; one node per cell is an engine invariant.
    pub fn add_node(&self, node: TalentNode) -> (Self, EditOutcome) {
        if !node.position.is_valid() {
            return (self.clone(), EditOutcome::Rejected(RejectReason::OffGrid));
        }
        if self.is_cell_occupied(node.position) {
            debug!(node = %node.id, x = node.position.x, y = node.position.y, "cell already occupied");
            return (self.clone(), EditOutcome::Rejected(RejectReason::CellOccupied));
        }
        let mut next = self.clone();
        next.nodes.push(node);
        (next, EditOutcome::Applied)
    }

    /// Removes the node, every connection touching it, and the id from every
    /// remaining prerequisite list.
    pub fn remove_node(&self, node_id: &str) -> (Self, EditOutcome) {
        if self.node(node_id).is_none() {
            return (self.clone(), EditOutcome::Rejected(RejectReason::UnknownNode));
        }
        let mut next = self.clone();
        next.nodes.retain(|n| n.id != node_id);
        next.connections.retain(|c| c.from != node_id && c.to != node_id);
        for node in &mut next.nodes {
            node.prerequisites.retain(|p| p != node_id);
        }
        (next, EditOutcome::Applied)
    }

    pub fn update_node(&self, node_id: &str, patch: &NodePatch) -> (Self, EditOutcome) {
        if self.node(node_id).is_none() {
            return (self.clone(), EditOutcome::Rejected(RejectReason::UnknownNode));
        }
        let mut next = self.clone();
        if let Some(node) = next.nodes.iter_mut().find(|n| n.id == node_id) {
            if let Some(name) = &patch.name {
                node.name = name.clone();
            }
            if let Some(description) = &patch.description {
                node.description = description.clone();
            }
            if let Some(icon) = &patch.icon {
                node.icon = icon.clone();
            }
            if let Some(max_ranks) = patch.max_ranks {
                node.max_ranks = max_ranks.max(1);
            }
            if let Some(required_points) = patch.required_points {
                node.required_points = required_points;
            }
        }
        (next, EditOutcome::Applied)
    }

    /// Moves the node to `dest`, subject to the same occupancy rule as
    /// `add_node`. A node may "move" onto its own cell.
    pub fn move_node(&self, node_id: &str, dest: GridPosition) -> (Self, EditOutcome) {
        if self.node(node_id).is_none() {
            return (self.clone(), EditOutcome::Rejected(RejectReason::UnknownNode));
        }
        if !dest.is_valid() {
            return (self.clone(), EditOutcome::Rejected(RejectReason::OffGrid));
        }
        if self.nodes.iter().any(|n| n.position == dest && n.id != node_id) {
            debug!(node = node_id, x = dest.x, y = dest.y, "destination cell occupied");
            return (self.clone(), EditOutcome::Rejected(RejectReason::CellOccupied));
        }
        let mut next = self.clone();
        if let Some(node) = next.nodes.iter_mut().find(|n| n.id == node_id) {
            node.position = dest;
        }
        (next, EditOutcome::Applied)
    }

    /// Adds a prerequisite edge from -> to and records `from` in `to`'s
    /// prerequisite list. Rejects unknown endpoints, self-edges, duplicate
    /// pairs in either direction, and edges within a single tier.
    pub fn add_connection(&self, from: &str, to: &str) -> (Self, EditOutcome) {
        let (Some(from_node), Some(to_node)) = (self.node(from), self.node(to)) else {
            return (self.clone(), EditOutcome::Rejected(RejectReason::UnknownNode));
        };
        if from == to {
            return (self.clone(), EditOutcome::Rejected(RejectReason::SelfConnection));
        }
        let duplicate = self
            .connections
            .iter()
            .any(|c| (c.from == from && c.to == to) || (c.from == to && c.to == from));
        if duplicate {
            return (
                self.clone(),
                EditOutcome::Rejected(RejectReason::DuplicateConnection),
            );
        }
        if from_node.tier() == to_node.tier() {
            warn!(from, to, tier = from_node.tier(), "rejecting connection within a single tier");
            return (
                self.clone(),
                EditOutcome::Rejected(RejectReason::SameTierConnection),
            );
        }

        let mut next = self.clone();
        next.connections.push(TalentConnection {
            id: generate_id("conn"),
            from: from.to_string(),
            to: to.to_string(),
        });
        if let Some(node) = next.nodes.iter_mut().find(|n| n.id == to) {
            node.prerequisites.push(from.to_string());
        }
        (next, EditOutcome::Applied)
    }

    /// Removes the connection and scrubs its `from` id out of the `to`
    /// node's prerequisites.
    pub fn remove_connection(&self, connection_id: &str) -> (Self, EditOutcome) {
        let Some(connection) = self.connection(connection_id).cloned() else {
            return (
                self.clone(),
                EditOutcome::Rejected(RejectReason::UnknownConnection),
            );
        };
        let mut next = self.clone();
        next.connections.retain(|c| c.id != connection_id);
        if let Some(node) = next.nodes.iter_mut().find(|n| n.id == connection.to) {
            node.prerequisites.retain(|p| p != &connection.from);
        }
        (next, EditOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_at(x: i32, y: i32) -> TalentNode {
        TalentNode::from_template(GridPosition::new(x, y), None)
    }

    fn tree_with_nodes(nodes: Vec<TalentNode>) -> TalentTree {
        let mut tree = TalentTree::empty(TreeMetadata::default());
        tree.nodes = nodes;
        tree
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = TalentNode::from_template(GridPosition::new(0, 0), None);
        let b = TalentNode::from_template(GridPosition::new(1, 0), None);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn empty_tree_gets_default_budget_and_metadata() {
        let tree = TalentTree::empty(TreeMetadata::default());
        assert_eq!(tree.total_points, DEFAULT_POINT_BUDGET);
        assert_eq!(tree.name, "New Talent Tree");
        assert!(tree.nodes.is_empty());
        assert!(tree.connections.is_empty());

        let named = TalentTree::empty(TreeMetadata {
            name: Some("Fury".to_string()),
            description: None,
        });
        assert_eq!(named.name, "Fury");
    }

    #[test]
    fn add_node_rejects_occupied_cell() {
        let (tree, outcome) = tree_with_nodes(vec![]).add_node(node_at(2, 3));
        assert!(outcome.is_applied());

        let (next, outcome) = tree.add_node(node_at(2, 3));
        assert_eq!(outcome, EditOutcome::Rejected(RejectReason::CellOccupied));
        assert_eq!(next, tree);
    }

    #[test]
    fn add_node_rejects_off_grid_cell() {
        let tree = tree_with_nodes(vec![]);
        let (next, outcome) = tree.add_node(node_at(99, 0));
        assert_eq!(outcome, EditOutcome::Rejected(RejectReason::OffGrid));
        assert_eq!(next, tree);
    }

    #[test]
    fn remove_node_scrubs_connections_and_prerequisites() {
        let a = node_at(0, 0);
        let b = node_at(0, 1);
        let a_id = a.id.clone();
        let b_id = b.id.clone();
        let tree = tree_with_nodes(vec![a, b]);
        let (tree, outcome) = tree.add_connection(&a_id, &b_id);
        assert!(outcome.is_applied());

        let (tree, outcome) = tree.remove_node(&a_id);
        assert!(outcome.is_applied());
        assert!(tree.connections.is_empty());
        let b = tree.node(&b_id).unwrap();
        assert!(b.prerequisites.is_empty());
    }

    #[test]
    fn remove_unknown_node_is_a_no_op() {
        let tree = tree_with_nodes(vec![node_at(1, 1)]);
        let (next, outcome) = tree.remove_node("nonexistent");
        assert_eq!(outcome, EditOutcome::Rejected(RejectReason::UnknownNode));
        assert_eq!(next, tree);
    }

    #[test]
    fn update_node_merges_partial_fields_and_clamps_max_ranks() {
        let node = node_at(0, 0);
        let id = node.id.clone();
        let tree = tree_with_nodes(vec![node]);

        let patch = NodePatch {
            name: Some("Bloodlust".to_string()),
            max_ranks: Some(0),
            ..NodePatch::default()
        };
        let (tree, outcome) = tree.update_node(&id, &patch);
        assert!(outcome.is_applied());
        let node = tree.node(&id).unwrap();
        assert_eq!(node.name, "Bloodlust");
        assert_eq!(node.max_ranks, 1);
        assert_eq!(node.description, "A new talent ability");

        let (next, outcome) = tree.update_node("nonexistent", &NodePatch::default());
        assert_eq!(outcome, EditOutcome::Rejected(RejectReason::UnknownNode));
        assert_eq!(next, tree);
    }

    #[test]
    fn move_node_respects_occupancy_but_allows_own_cell() {
        let a = node_at(0, 0);
        let b = node_at(1, 0);
        let a_id = a.id.clone();
        let tree = tree_with_nodes(vec![a, b]);

        let (next, outcome) = tree.move_node(&a_id, GridPosition::new(1, 0));
        assert_eq!(outcome, EditOutcome::Rejected(RejectReason::CellOccupied));
        assert_eq!(next, tree);

        let (_, outcome) = tree.move_node(&a_id, GridPosition::new(0, 0));
        assert!(outcome.is_applied());

        let (tree, outcome) = tree.move_node(&a_id, GridPosition::new(4, 5));
        assert!(outcome.is_applied());
        assert_eq!(tree.node(&a_id).unwrap().position, GridPosition::new(4, 5));
    }

    #[test]
    fn add_connection_records_prerequisite() {
        let a = node_at(0, 0);
        let b = node_at(0, 1);
        let a_id = a.id.clone();
        let b_id = b.id.clone();
        let (tree, outcome) = tree_with_nodes(vec![a, b]).add_connection(&a_id, &b_id);
        assert!(outcome.is_applied());
        assert_eq!(tree.connections.len(), 1);
        assert_eq!(tree.connections[0].from, a_id);
        assert_eq!(tree.connections[0].to, b_id);
        assert_eq!(tree.node(&b_id).unwrap().prerequisites, vec![a_id]);
    }

    #[test]
    fn add_connection_rejects_duplicates_in_either_direction() {
        let a = node_at(0, 0);
        let b = node_at(0, 1);
        let a_id = a.id.clone();
        let b_id = b.id.clone();
        let (tree, _) = tree_with_nodes(vec![a, b]).add_connection(&a_id, &b_id);

        let (next, outcome) = tree.add_connection(&a_id, &b_id);
        assert_eq!(outcome, EditOutcome::Rejected(RejectReason::DuplicateConnection));
        assert_eq!(next, tree);

        let (next, outcome) = tree.add_connection(&b_id, &a_id);
        assert_eq!(outcome, EditOutcome::Rejected(RejectReason::DuplicateConnection));
        assert_eq!(next, tree);
    }

    #[test]
    fn add_connection_rejects_same_tier_endpoints() {
        let a = node_at(0, 2);
        let b = node_at(5, 2);
        let a_id = a.id.clone();
        let b_id = b.id.clone();
        let tree = tree_with_nodes(vec![a, b]);
        let (next, outcome) = tree.add_connection(&a_id, &b_id);
        assert_eq!(outcome, EditOutcome::Rejected(RejectReason::SameTierConnection));
        assert_eq!(next, tree);
    }

    #[test]
    fn add_connection_rejects_unknown_endpoints_and_self_edges() {
        let a = node_at(0, 0);
        let a_id = a.id.clone();
        let tree = tree_with_nodes(vec![a]);

        let (next, outcome) = tree.add_connection(&a_id, "nonexistent");
        assert_eq!(outcome, EditOutcome::Rejected(RejectReason::UnknownNode));
        assert_eq!(next, tree);

        let (next, outcome) = tree.add_connection(&a_id, &a_id);
        assert_eq!(outcome, EditOutcome::Rejected(RejectReason::SelfConnection));
        assert_eq!(next, tree);
    }

    #[test]
    fn remove_connection_scrubs_prerequisite() {
        let a = node_at(0, 0);
        let b = node_at(0, 1);
        let a_id = a.id.clone();
        let b_id = b.id.clone();
        let (tree, _) = tree_with_nodes(vec![a, b]).add_connection(&a_id, &b_id);
        let conn_id = tree.connections[0].id.clone();

        let (tree, outcome) = tree.remove_connection(&conn_id);
        assert!(outcome.is_applied());
        assert!(tree.connections.is_empty());
        assert!(tree.node(&b_id).unwrap().prerequisites.is_empty());

        let (next, outcome) = tree.remove_connection(&conn_id);
        assert_eq!(outcome, EditOutcome::Rejected(RejectReason::UnknownConnection));
        assert_eq!(next, tree);
    }
}
