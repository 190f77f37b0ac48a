use crate::document::{FieldPath, Node, NodeKind};
use crate::engine::errors::SubstError;

/// Callbacks for [`walk`]. Parents are visited before their children.
pub trait Visitor {
    fn visit_mapping(&mut self, _node: &mut Node, _path: &FieldPath) -> Result<(), SubstError> {
        Ok(())
    }

    fn visit_sequence(&mut self, _node: &mut Node, _path: &FieldPath) -> Result<(), SubstError> {
        Ok(())
    }

    fn visit_scalar(&mut self, node: &mut Node, path: &FieldPath) -> Result<(), SubstError>;
}

/// Depth-first traversal of `root`. The first visitor error aborts the walk.
///
/// Alias nodes are skipped; their content is visited at the anchor.
pub fn walk<V: Visitor + ?Sized>(root: &mut Node, visitor: &mut V) -> Result<(), SubstError> {
    walk_at(root, &FieldPath::root(), visitor)
}

fn walk_at<V: Visitor + ?Sized>(
    node: &mut Node,
    path: &FieldPath,
    visitor: &mut V,
) -> Result<(), SubstError> {
    if node.is_alias() {
        return Ok(());
    }
    match node.kind {
        NodeKind::Mapping(_) => {
            visitor.visit_mapping(node, path)?;
            if let Some(entries) = node.entries_mut() {
                for entry in entries.iter_mut() {
                    let child = path.field(entry.key_str());
                    walk_at(&mut entry.value, &child, visitor)?;
                }
            }
            Ok(())
        }
        NodeKind::Sequence(_) => {
            visitor.visit_sequence(node, path)?;
            if let Some(items) = node.items_mut() {
                for (idx, item) in items.iter_mut().enumerate() {
                    walk_at(item, &path.index(idx), visitor)?;
                }
            }
            Ok(())
        }
        NodeKind::Scalar(_) => visitor.visit_scalar(node, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_node;

    #[derive(Default)]
    struct Collect {
        seen: Vec<String>,
    }

    impl Visitor for Collect {
        fn visit_mapping(&mut self, _node: &mut Node, path: &FieldPath) -> Result<(), SubstError> {
            self.seen.push(format!("map {path}"));
            Ok(())
        }

        fn visit_sequence(&mut self, _node: &mut Node, path: &FieldPath) -> Result<(), SubstError> {
            self.seen.push(format!("seq {path}"));
            Ok(())
        }

        fn visit_scalar(&mut self, node: &mut Node, path: &FieldPath) -> Result<(), SubstError> {
            self.seen
                .push(format!("{path}={}", node.scalar_value().unwrap_or_default()));
            Ok(())
        }
    }

    #[test]
    fn parents_before_children_in_document_order() {
        let mut root = parse_node("a: 1\nb:\n  - x\n  - c: y\n").unwrap();
        let mut visitor = Collect::default();
        walk(&mut root, &mut visitor).unwrap();
        assert_eq!(
            visitor.seen,
            vec!["map ", "a=1", "seq b", "b[0]=x", "map b[1]", "b[1].c=y"]
        );
    }

    #[test]
    fn aliases_are_not_traversed() {
        let mut root = crate::document::load_str("a: &x\n  b: 1\nc: *x\n", "r.yaml")
            .unwrap()
            .remove(0)
            .root;
        let mut visitor = Collect::default();
        walk(&mut root, &mut visitor).unwrap();
        assert_eq!(visitor.seen, vec!["map ", "map a", "a.b=1"]);
    }

    struct FailOn(&'static str);

    impl Visitor for FailOn {
        fn visit_scalar(&mut self, node: &mut Node, _path: &FieldPath) -> Result<(), SubstError> {
            if node.scalar_value() == Some(self.0) {
                return Err(SubstError::UnresolvedCaptureGroups);
            }
            node.kind = NodeKind::Scalar(crate::document::Scalar {
                value: "seen".to_string(),
                tag: None,
            });
            Ok(())
        }
    }

    #[test]
    fn first_error_stops_the_walk() {
        let mut root = parse_node("a: 1\nb: stop\nc: 3\n").unwrap();
        let err = walk(&mut root, &mut FailOn("stop")).unwrap_err();
        assert!(matches!(err, SubstError::UnresolvedCaptureGroups));
        assert_eq!(root.get("a").and_then(Node::scalar_value), Some("seen"));
        assert_eq!(root.get("c").and_then(Node::scalar_value), Some("3"));
    }
}
