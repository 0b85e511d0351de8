use std::collections::HashMap;

use crate::tree::TalentTree;

/// Advisory structural checks; errors accumulate and never block editing.
pub fn validate_tree(tree: &TalentTree) -> Vec<String> {
    let mut errors = Vec::new();

    for connection in &tree.connections {
        if tree.node(&connection.from).is_none() || tree.node(&connection.to).is_none() {
            errors.push(format!("Invalid connection: {}", connection.id));
        }
    }

    // Same-tier edges cannot be created by the editor any more, but trees
    // loaded from older exports may still carry them.
    for connection in &tree.connections {
        if let (Some(from), Some(to)) = (tree.node(&connection.from), tree.node(&connection.to)) {
            if from.tier() == to.tier() {
                errors.push(format!(
                    "Connection {} links same-tier nodes: {} and {}",
                    connection.id, from.name, to.name
                ));
            }
        }
    }

    if let Some(name) = first_cycle_node(tree) {
        errors.push(format!("Circular dependency detected involving node: {name}"));
    }

    errors
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Depth-first search over the prerequisite relation with an explicit stack;
/// returns the name of the first scan root that reaches a cycle. Scanning
/// stops at the first hit, so one cycle produces one report.
fn first_cycle_node(tree: &TalentTree) -> Option<String> {
    let index: HashMap<&str, usize> = tree
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();
    let mut marks = vec![Mark::Unvisited; tree.nodes.len()];

    for root in 0..tree.nodes.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }

        // Stack entries are (node index, cursor into its prerequisites).
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        marks[root] = Mark::InProgress;

        while let Some(top) = stack.last_mut() {
            let node = top.0;
            let prerequisites = &tree.nodes[node].prerequisites;
            if top.1 >= prerequisites.len() {
                marks[node] = Mark::Done;
                stack.pop();
                continue;
            }
            let prereq = &prerequisites[top.1];
            top.1 += 1;

            // Dangling prerequisite ids are the orphan check's concern.
            let Some(&next) = index.get(prereq.as_str()) else {
                continue;
            };
            match marks[next] {
                Mark::InProgress => return Some(tree.nodes[root].name.clone()),
                Mark::Unvisited => {
                    marks[next] = Mark::InProgress;
                    stack.push((next, 0));
                }
                Mark::Done => {}
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridPosition;
    use crate::tree::{TalentConnection, TalentNode, TalentTree, TreeMetadata};

    fn named_node(id: &str, tier: i32, x: i32) -> TalentNode {
        let mut n = TalentNode::from_template(GridPosition::new(x, tier), None);
        n.id = id.to_string();
        n.name = id.to_uppercase();
        n
    }

    fn raw_connection(id: &str, from: &str, to: &str) -> TalentConnection {
        TalentConnection {
            id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    #[test]
    fn editor_built_tree_validates_clean() {
        let mut tree = TalentTree::empty(TreeMetadata::default());
        tree.nodes = vec![named_node("a", 0, 0), named_node("b", 1, 0)];
        let (tree, _) = tree.add_connection("a", "b");
        assert!(validate_tree(&tree).is_empty());
    }

    #[test]
    fn reports_orphaned_connections() {
        let mut tree = TalentTree::empty(TreeMetadata::default());
        tree.nodes = vec![named_node("a", 0, 0)];
        tree.connections = vec![raw_connection("c1", "a", "gone")];

        let errors = validate_tree(&tree);
        assert_eq!(errors, vec!["Invalid connection: c1".to_string()]);
    }

    #[test]
    fn reports_same_tier_connections_from_legacy_data() {
        let mut tree = TalentTree::empty(TreeMetadata::default());
        tree.nodes = vec![named_node("a", 2, 0), named_node("b", 2, 4)];
        tree.connections = vec![raw_connection("c1", "a", "b")];

        let errors = validate_tree(&tree);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("same-tier"));
        assert!(errors[0].contains("c1"));
    }

    #[test]
    fn reports_exactly_one_cycle_error_for_a_three_node_loop() {
        let mut a = named_node("a", 0, 0);
        let mut b = named_node("b", 1, 0);
        let mut c = named_node("c", 2, 0);
        a.prerequisites = vec!["c".to_string()];
        b.prerequisites = vec!["a".to_string()];
        c.prerequisites = vec!["b".to_string()];

        let mut tree = TalentTree::empty(TreeMetadata::default());
        tree.nodes = vec![a, b, c];

        let errors = validate_tree(&tree);
        let cycle_errors: Vec<_> = errors
            .iter()
            .filter(|e| e.contains("Circular dependency"))
            .collect();
        assert_eq!(cycle_errors.len(), 1);
        assert!(cycle_errors[0].contains('A'));
    }

    #[test]
    fn self_referential_prerequisite_counts_as_a_cycle() {
        let mut a = named_node("a", 0, 0);
        a.prerequisites = vec!["a".to_string()];
        let mut tree = TalentTree::empty(TreeMetadata::default());
        tree.nodes = vec![a];

        let errors = validate_tree(&tree);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Circular dependency"));
    }

    #[test]
    fn dangling_prerequisites_do_not_trip_cycle_detection() {
        let mut a = named_node("a", 0, 0);
        a.prerequisites = vec!["missing".to_string()];
        let mut tree = TalentTree::empty(TreeMetadata::default());
        tree.nodes = vec![a];

        assert!(validate_tree(&tree).is_empty());
    }

    #[test]
    fn diamond_dependencies_are_not_cycles() {
        let mut b = named_node("b", 1, 0);
        let mut c = named_node("c", 1, 1);
        let mut d = named_node("d", 2, 0);
        b.prerequisites = vec!["a".to_string()];
        c.prerequisites = vec!["a".to_string()];
        d.prerequisites = vec!["b".to_string(), "c".to_string()];

        let mut tree = TalentTree::empty(TreeMetadata::default());
        tree.nodes = vec![named_node("a", 0, 0), b, c, d];

        assert!(validate_tree(&tree).is_empty());
    }
}
