use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::tree::{TalentConnection, TalentNode, TalentTree};

/// Derived per-node display state, recomputed on every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TalentState {
    Locked,
    Available,
    Unlocked,
    Selected,
    Maxed,
}

/// Simulation state for one session; the tree itself stays untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TalentTreeState {
    /// Node id -> allocated ranks. Zero-rank entries are removed, never
    /// stored.
    pub selected_nodes: HashMap<String, u32>,
    /// Signed so an imported build that overshoots the budget is
    /// representable until the next allocation attempt rejects it.
    pub available_points: i32,
    pub spent_points: u32,
    pub hovered_node: Option<String>,
}

impl TalentTreeState {
    /// Fresh state with the full budget; also serves as the reset operation.
    pub fn new(total_points: u32) -> Self {
        Self {
            selected_nodes: HashMap::new(),
            available_points: total_points as i32,
            spent_points: 0,
            hovered_node: None,
        }
    }

    pub fn ranks(&self, node_id: &str) -> u32 {
        self.selected_nodes.get(node_id).copied().unwrap_or(0)
    }
}

/// Cumulative ranks allocated across all nodes at or above `tier`.
pub fn tier_spent_points(tier: i32, state: &TalentTreeState, tree: &TalentTree) -> u32 {
    tree.nodes
        .iter()
        .filter(|n| n.tier() <= tier)
        .map(|n| state.ranks(&n.id))
        .sum()
}

pub fn talent_state(node: &TalentNode, state: &TalentTreeState, tree: &TalentTree) -> TalentState {
    let ranks = state.ranks(&node.id);
    if ranks >= node.max_ranks {
        return TalentState::Maxed;
    }
    if ranks > 0 {
        return TalentState::Selected;
    }

    let prerequisites_met = node
        .prerequisites
        .iter()
        .all(|p| tree.node(p).is_some() && state.ranks(p) > 0);
    // Spend gate counts only tiers strictly above this node's row.
    let tier_met = tier_spent_points(node.tier() - 1, state, tree) >= node.required_points;

    if prerequisites_met && tier_met && state.available_points > 0 {
        TalentState::Available
    } else if prerequisites_met && tier_met {
        TalentState::Unlocked
    } else {
        TalentState::Locked
    }
}

pub fn can_allocate_point(node_id: &str, state: &TalentTreeState, tree: &TalentTree) -> bool {
    let Some(node) = tree.node(node_id) else {
        return false;
    };
    if state.ranks(node_id) >= node.max_ranks {
        return false;
    }
    talent_state(node, state, tree) == TalentState::Available
}

/// Adds one rank to `node_id`. Illegal requests return the input state
/// unchanged; the rank map and both counters always move together.
pub fn allocate_point(node_id: &str, state: &TalentTreeState, tree: &TalentTree) -> TalentTreeState {
    if !can_allocate_point(node_id, state, tree) {
        return state.clone();
    }
    let mut next = state.clone();
    *next.selected_nodes.entry(node_id.to_string()).or_insert(0) += 1;
    next.available_points -= 1;
    next.spent_points += 1;
    next
}

/// A node holding its last rank cannot shed it while any dependent has ranks
/// allocated. A multi-rank node above rank 1 may always shed a rank; the
/// asymmetry is intentional gameplay behavior, not an oversight.
pub fn can_deallocate_point(node_id: &str, state: &TalentTreeState, tree: &TalentTree) -> bool {
    if tree.node(node_id).is_none() {
        return false;
    }
    let ranks = state.ranks(node_id);
    if ranks == 0 {
        return false;
    }
    if ranks == 1 {
        let dependent_active = tree
            .nodes
            .iter()
            .any(|n| n.prerequisites.iter().any(|p| p == node_id) && state.ranks(&n.id) > 0);
        if dependent_active {
            return false;
        }
    }
    true
}

pub fn deallocate_point(
    node_id: &str,
    state: &TalentTreeState,
    tree: &TalentTree,
) -> TalentTreeState {
    if !can_deallocate_point(node_id, state, tree) {
        return state.clone();
    }
    let mut next = state.clone();
    let remaining = next.ranks(node_id).saturating_sub(1);
    if remaining == 0 {
        next.selected_nodes.remove(node_id);
    } else {
        next.selected_nodes.insert(node_id.to_string(), remaining);
    }
    next.available_points += 1;
    next.spent_points -= 1;
    next
}

/// Drives "active" edge rendering: both endpoints hold at least one rank.
pub fn connection_is_active(connection: &TalentConnection, state: &TalentTreeState) -> bool {
    state.ranks(&connection.from) > 0 && state.ranks(&connection.to) > 0
}
