#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    /// Text accepted by the `direction` register.
    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }

    /// Decode the first byte of the `direction` register.
    pub(crate) const fn from_register(byte: u8) -> Option<Self> {
        match byte {
            b'i' => Some(Direction::In),
            b'o' => Some(Direction::Out),
            _ => None,
        }
    }
}

/// Signal transition that raises an interrupt, as written to the `edge`
/// register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Edge {
    #[default]
    None,
    Rising,
    Falling,
    Both,
}

impl Edge {
    pub const fn as_str(self) -> &'static str {
        match self {
            Edge::None => "none",
            Edge::Rising => "rising",
            Edge::Falling => "falling",
            Edge::Both => "both",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_register_bytes() {
        assert_eq!(Direction::from_register(b'i'), Some(Direction::In));
        assert_eq!(Direction::from_register(b'o'), Some(Direction::Out));
        assert_eq!(Direction::from_register(b'x'), None);
    }

    #[test]
    fn edge_text() {
        let all = [Edge::None, Edge::Rising, Edge::Falling, Edge::Both];
        let text: Vec<_> = all.iter().map(|e| e.as_str()).collect();
        assert_eq!(text, ["none", "rising", "falling", "both"]);
        assert_eq!(Edge::default(), Edge::None);
    }
}
