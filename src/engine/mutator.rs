use crate::document::{parse_node, Node, NodeKind, Style};
use crate::engine::errors::SubstError;

/// Set a scalar's value. The tag is cleared so the type is inferred from
/// the new text; a quoted style is kept.
pub fn set_scalar(node: &mut Node, value: &str) -> Result<(), SubstError> {
    let found = node.kind_name();
    match &mut node.kind {
        NodeKind::Scalar(scalar) => {
            scalar.value = value.to_string();
            scalar.tag = None;
            Ok(())
        }
        _ => Err(SubstError::KindMismatch {
            expected: "scalar",
            found,
        }),
    }
}

/// Replace a sequence's items with the elements of a YAML list literal.
///
/// The sequence renders as a block list afterwards. Comments on the node
/// are left alone. Nothing changes unless `literal` parses as a sequence.
pub fn set_sequence(node: &mut Node, literal: &str) -> Result<(), SubstError> {
    if !node.is_sequence() {
        return Err(SubstError::KindMismatch {
            expected: "sequence",
            found: node.kind_name(),
        });
    }
    let not_a_sequence = || SubstError::NotASequence {
        value: literal.to_string(),
    };
    let parsed = parse_node(literal).map_err(|_| not_a_sequence())?;
    let NodeKind::Sequence(items) = parsed.kind else {
        return Err(not_a_sequence());
    };
    node.kind = NodeKind::Sequence(items);
    node.style = Style::Folded;
    Ok(())
}
