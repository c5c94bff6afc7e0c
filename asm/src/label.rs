use crate::msg::Pos;
use indexmap::IndexMap;

/// Code labels: name -> (ROM index, definition).
#[derive(Debug, Clone, Default)]
pub struct Labels {
    labels: IndexMap<String, (u16, Pos)>,
}

impl Labels {
    pub fn new() -> Self {
        Labels {
            labels: IndexMap::new(),
        }
    }

    /// Returns the previous definition when `name` was already defined.
    pub fn insert(&mut self, name: String, pc: u16, pos: Pos) -> Option<(u16, Pos)> {
        self.labels.insert(name, (pc, pos))
    }

    pub fn get(&self, name: &str) -> Option<u16> {
        self.labels.get(name).map(|(pc, _)| *pc)
    }
}
