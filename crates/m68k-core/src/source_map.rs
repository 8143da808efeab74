//! Address -> source-line mapping (§4.F), consulted by the trace formatter
//! so each executed instruction's dump can show the line it came from.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct SourceLine {
    pub line_number: usize,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    lines: HashMap<u32, SourceLine>,
}

impl SourceMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, address: u32, line_number: usize, text: &str) {
        self.lines.insert(
            address,
            SourceLine {
                line_number,
                text: text.to_string(),
            },
        );
    }

    #[must_use]
    pub fn get(&self, address: u32) -> Option<&SourceLine> {
        self.lines.get(&address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_mapped_address() {
        let mut map = SourceMap::new();
        map.insert(0x1000, 12, "MOVE.L #1,D0");
        let entry = map.get(0x1000).unwrap();
        assert_eq!(entry.line_number, 12);
        assert_eq!(entry.text, "MOVE.L #1,D0");
    }

    #[test]
    fn unmapped_address_is_none() {
        let map = SourceMap::new();
        assert!(map.get(0x1000).is_none());
    }
}
