//! Explicit host-side state container: one owner for the current tree and
//! simulation state, mutated only through `apply`. Embedders that need
//! threading must serialize access behind a single writer; the core itself
//! is single-threaded and lock-free.

use serde::{Deserialize, Serialize};

use crate::grid::GridPosition;
use crate::serial::{ImportError, export_tree_json, import_tree_json};
use crate::sim::{TalentTreeState, allocate_point, can_allocate_point, can_deallocate_point, deallocate_point};
use crate::tree::{
    EditOutcome, NodePatch, NodeTemplate, RejectReason, TalentNode, TalentTree, TreeMetadata,
};
use crate::validate::validate_tree;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EditorMode {
    Edit,
    Simulate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetMode(EditorMode),
    NewTree(TreeMetadata),
    CreateNode {
        position: GridPosition,
        template: Option<NodeTemplate>,
    },
    DeleteNode(String),
    UpdateNode {
        node_id: String,
        patch: NodePatch,
    },
    MoveNode {
        node_id: String,
        position: GridPosition,
    },
    BeginConnection(String),
    CompleteConnection(String),
    CancelConnection,
    DeleteConnection(String),
    AllocatePoint(String),
    DeallocatePoint(String),
    ResetAllocations,
    Hover(Option<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditorSession {
    pub tree: TalentTree,
    pub sim: TalentTreeState,
    pub mode: EditorMode,
    pub selected_node: Option<String>,
    pub connect_from: Option<String>,
    pub status: Option<String>,
}

impl EditorSession {
    pub fn new(tree: TalentTree) -> Self {
        let sim = TalentTreeState::new(tree.total_points);
        Self {
            tree,
            sim,
            mode: EditorMode::Edit,
            selected_node: None,
            connect_from: None,
            status: None,
        }
    }

    pub fn apply(&mut self, action: Action) -> EditOutcome {
        match action {
            Action::SetMode(mode) => {
                if mode == EditorMode::Simulate && self.mode != EditorMode::Simulate {
                    // Every simulation session starts from a clean slate.
                    self.sim = TalentTreeState::new(self.tree.total_points);
                }
                self.mode = mode;
                self.connect_from = None;
                self.status = Some(format!("MODE {mode:?}"));
                EditOutcome::Applied
            }
            Action::Hover(node_id) => {
                self.sim.hovered_node = node_id;
                EditOutcome::Applied
            }

            Action::NewTree(metadata) => self.in_edit_mode(|s| {
                s.tree = TalentTree::empty(metadata);
                s.sim = TalentTreeState::new(s.tree.total_points);
                s.selected_node = None;
                s.connect_from = None;
                s.status = Some("NEW TREE".to_string());
                EditOutcome::Applied
            }),
            Action::CreateNode { position, template } => self.in_edit_mode(|s| {
                let node = TalentNode::from_template(position, template.as_ref());
                let id = node.id.clone();
                let outcome = s.commit_edit(|tree| tree.add_node(node));
                if outcome.is_applied() {
                    s.selected_node = Some(id.clone());
                    s.status = Some(format!("NODE {id}"));
                }
                outcome
            }),
            Action::DeleteNode(node_id) => self.in_edit_mode(|s| {
                let outcome = s.commit_edit(|tree| tree.remove_node(&node_id));
                if outcome.is_applied() {
                    if s.selected_node.as_deref() == Some(node_id.as_str()) {
                        s.selected_node = None;
                    }
                    if s.connect_from.as_deref() == Some(node_id.as_str()) {
                        s.connect_from = None;
                    }
                    s.status = Some(format!("DEL {node_id}"));
                }
                outcome
            }),
            Action::UpdateNode { node_id, patch } => {
                self.in_edit_mode(|s| s.commit_edit(|tree| tree.update_node(&node_id, &patch)))
            }
            Action::MoveNode { node_id, position } => self.in_edit_mode(|s| {
                let outcome = s.commit_edit(|tree| tree.move_node(&node_id, position));
                if outcome.is_applied() {
                    s.status = Some(format!("MOVE {node_id}"));
                }
                outcome
            }),
            Action::BeginConnection(node_id) => self.in_edit_mode(|s| {
                if s.tree.node(&node_id).is_none() {
                    return EditOutcome::Rejected(RejectReason::UnknownNode);
                }
                s.connect_from = Some(node_id);
                EditOutcome::Applied
            }),
            Action::CompleteConnection(to) => self.in_edit_mode(|s| {
                let Some(from) = s.connect_from.take() else {
                    return EditOutcome::Rejected(RejectReason::NoPendingConnection);
                };
                let outcome = s.commit_edit(|tree| tree.add_connection(&from, &to));
                if outcome.is_applied() {
                    s.status = Some(format!("CONNECT {from} -> {to}"));
                }
                outcome
            }),
            Action::CancelConnection => self.in_edit_mode(|s| {
                s.connect_from = None;
                EditOutcome::Applied
            }),
            Action::DeleteConnection(connection_id) => self.in_edit_mode(|s| {
                s.commit_edit(|tree| tree.remove_connection(&connection_id))
            }),

            Action::AllocatePoint(node_id) => self.in_simulate_mode(|s| {
                if !can_allocate_point(&node_id, &s.sim, &s.tree) {
                    return EditOutcome::Rejected(RejectReason::AllocationBlocked);
                }
                s.sim = allocate_point(&node_id, &s.sim, &s.tree);
                EditOutcome::Applied
            }),
            Action::DeallocatePoint(node_id) => self.in_simulate_mode(|s| {
                if !can_deallocate_point(&node_id, &s.sim, &s.tree) {
                    return EditOutcome::Rejected(RejectReason::AllocationBlocked);
                }
                s.sim = deallocate_point(&node_id, &s.sim, &s.tree);
                EditOutcome::Applied
            }),
            Action::ResetAllocations => self.in_simulate_mode(|s| {
                s.sim = TalentTreeState::new(s.tree.total_points);
                s.status = Some("RESET".to_string());
                EditOutcome::Applied
            }),
        }
    }

    /// Replaces the whole tree from an exported file; the previous tree and
    /// simulation state are dropped wholesale.
    pub fn import_tree(&mut self, json: &str) -> Result<(), ImportError> {
        let tree = import_tree_json(json)?;
        self.sim = TalentTreeState::new(tree.total_points);
        self.tree = tree;
        self.selected_node = None;
        self.connect_from = None;
        self.status = Some("IMPORT".to_string());
        Ok(())
    }

    pub fn export_tree(&self) -> String {
        export_tree_json(&self.tree)
    }

    pub fn validation_errors(&self) -> Vec<String> {
        validate_tree(&self.tree)
    }

    fn in_edit_mode(&mut self, f: impl FnOnce(&mut Self) -> EditOutcome) -> EditOutcome {
        if self.mode != EditorMode::Edit {
            return EditOutcome::Rejected(RejectReason::WrongMode);
        }
        f(self)
    }

    fn in_simulate_mode(&mut self, f: impl FnOnce(&mut Self) -> EditOutcome) -> EditOutcome {
        if self.mode != EditorMode::Simulate {
            return EditOutcome::Rejected(RejectReason::WrongMode);
        }
        f(self)
    }

    fn commit_edit(
        &mut self,
        op: impl FnOnce(&TalentTree) -> (TalentTree, EditOutcome),
    ) -> EditOutcome {
        let (tree, outcome) = op(&self.tree);
        if outcome.is_applied() {
            self.tree = tree;
        }
        outcome
    }
}
