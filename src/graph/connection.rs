//! Edges between pipeline nodes.

use crate::core::error::NodeId;

/// Side of a multi-input operator that an edge feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputPort {
    /// Primary (left-hand) input
    Left,
    /// Secondary (right-hand) input
    Right,
}

impl InputPort {
    /// Parse a port tag. Unrecognised tags yield `None`.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "left" | "primary" => Some(InputPort::Left),
            "right" | "secondary" => Some(InputPort::Right),
            _ => None,
        }
    }

    fn tag(&self) -> &'static str {
        match self {
            InputPort::Left => "left",
            InputPort::Right => "right",
        }
    }
}

/// A directed edge: the output of `from` is an input of `to`.
///
/// Endpoints are optional because definitions arrive from outside and are
/// checked, not assumed; the validator reports missing endpoints per edge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Edge {
    /// Upstream node
    pub from: Option<NodeId>,
    /// Downstream node
    pub to: Option<NodeId>,
    /// Optional input port tag on the downstream node
    pub port: Option<String>,
}

impl Edge {
    /// Create an edge between two nodes.
    pub fn new(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self {
            from: Some(from.into()),
            to: Some(to.into()),
            port: None,
        }
    }

    /// Tag the downstream input port.
    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    /// Resolved input port, if the edge carries a recognised tag.
    pub fn input_port(&self) -> Option<InputPort> {
        self.port.as_deref().and_then(InputPort::parse)
    }

    /// Both endpoints, when present.
    pub fn endpoints(&self) -> Option<(&NodeId, &NodeId)> {
        Some((self.from.as_ref()?, self.to.as_ref()?))
    }

    /// Check whether the edge starts at `id`.
    pub fn is_from(&self, id: &str) -> bool {
        self.from.as_ref().map(|f| f.as_str() == id).unwrap_or(false)
    }

    /// Check whether the edge ends at `id`.
    pub fn is_to(&self, id: &str) -> bool {
        self.to.as_ref().map(|t| t.as_str() == id).unwrap_or(false)
    }
}

/// Pick the left and right upstream nodes of a two-input node.
///
/// An edge tagged `right`/`secondary` feeds the right side and one tagged
/// `left`/`primary` the left side; an untagged edge fills whichever side is
/// still open. With no tags at all, the lexicographically smaller upstream
/// ID is the left input. More than two inbound edges, or two edges tagged
/// for the same side, are rejected with a message naming `kind`.
pub fn split_inputs<'e>(
    kind: &str,
    inbound: &[&'e Edge],
) -> Result<(Option<&'e NodeId>, Option<&'e NodeId>), String> {
    if inbound.len() > 2 {
        return Err(format!(
            "{} takes two inputs but has {} inbound edges",
            kind,
            inbound.len()
        ));
    }
    let tagged = |port: InputPort| -> Result<Option<usize>, String> {
        let mut positions = (0..inbound.len()).filter(|&i| inbound[i].input_port() == Some(port));
        let first = positions.next();
        if positions.next().is_some() {
            return Err(format!("{} has two inputs tagged '{}'", kind, port.tag()));
        }
        Ok(first)
    };
    let left_at = tagged(InputPort::Left)?;
    let right_at = tagged(InputPort::Right)?;

    let (left_at, right_at) = if left_at.is_none() && right_at.is_none() {
        let mut positions: Vec<usize> = (0..inbound.len()).collect();
        positions.sort_by(|&a, &b| inbound[a].from.cmp(&inbound[b].from));
        (positions.first().copied(), positions.get(1).copied())
    } else {
        let untagged = |taken: usize| (0..inbound.len()).find(|&i| i != taken);
        match (left_at, right_at) {
            (Some(l), None) => (Some(l), untagged(l)),
            (None, Some(r)) => (untagged(r), Some(r)),
            both => both,
        }
    };

    let from = |at: Option<usize>| at.and_then(|i| inbound[i].from.as_ref());
    Ok((from(left_at), from(right_at)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge() {
        let edge = Edge::new("a", "b");
        assert!(edge.is_from("a"));
        assert!(edge.is_to("b"));
        assert_eq!(edge.endpoints().map(|(f, t)| (f.as_str(), t.as_str())), Some(("a", "b")));
        assert_eq!(edge.input_port(), None);
    }

    #[test]
    fn test_port_tags() {
        assert_eq!(Edge::new("a", "j").with_port("Right").input_port(), Some(InputPort::Right));
        assert_eq!(InputPort::parse("primary"), Some(InputPort::Left));
        assert_eq!(InputPort::parse("handle-3"), None);
    }

    fn ids<'e>(sides: (Option<&'e NodeId>, Option<&'e NodeId>)) -> (Option<&'e str>, Option<&'e str>) {
        (sides.0.map(NodeId::as_str), sides.1.map(NodeId::as_str))
    }

    #[test]
    fn test_split_inputs_untagged_order() {
        let a = Edge::new("b_node", "j");
        let b = Edge::new("a_node", "j");
        assert_eq!(ids(split_inputs("JOIN", &[&a, &b]).unwrap()), (Some("a_node"), Some("b_node")));

        let only = Edge::new("a_node", "j");
        assert_eq!(ids(split_inputs("JOIN", &[&only]).unwrap()), (Some("a_node"), None));
    }

    #[test]
    fn test_split_inputs_tags_win_over_order() {
        let right = Edge::new("a_node", "j").with_port("right");
        let plain = Edge::new("z_node", "j");
        assert_eq!(ids(split_inputs("JOIN", &[&right, &plain]).unwrap()), (Some("z_node"), Some("a_node")));

        let left = Edge::new("z_node", "j").with_port("primary");
        let plain = Edge::new("a_node", "j");
        assert_eq!(ids(split_inputs("JOIN", &[&plain, &left]).unwrap()), (Some("z_node"), Some("a_node")));
    }

    #[test]
    fn test_split_inputs_rejects_conflicting_tags() {
        let a = Edge::new("a_node", "j").with_port("right");
        let b = Edge::new("b_node", "j").with_port("secondary");
        assert_eq!(
            split_inputs("JOIN", &[&a, &b]).unwrap_err(),
            "JOIN has two inputs tagged 'right'"
        );

        let a = Edge::new("a_node", "j").with_port("left");
        let b = Edge::new("b_node", "j").with_port("left");
        assert_eq!(split_inputs("JOIN", &[&a, &b]).unwrap_err(), "JOIN has two inputs tagged 'left'");
    }

    #[test]
    fn test_split_inputs_rejects_extra_edges() {
        let edges = [Edge::new("a", "j"), Edge::new("b", "j"), Edge::new("c", "j")];
        let inbound: Vec<&Edge> = edges.iter().collect();
        assert_eq!(
            split_inputs("JOIN", &inbound).unwrap_err(),
            "JOIN takes two inputs but has 3 inbound edges"
        );
    }

    #[test]
    fn test_missing_endpoint() {
        let edge = Edge {
            from: None,
            to: Some(NodeId::from("b")),
            port: None,
        };
        assert!(edge.endpoints().is_none());
        assert!(!edge.is_from("b"));
    }
}
