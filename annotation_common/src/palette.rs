//! Class names, their display colors and the class used for new boxes.

use crate::error::{Error, Result};

/// Display colors, indexed by class id. Cycled when there are more classes.
pub const CLASS_COLORS: [(u8, u8, u8); 10] = [
    (30, 45, 69),
    (87, 52, 32),
    (33, 66, 41),
    (77, 31, 32),
    (51, 45, 70),
    (58, 47, 38),
    (85, 55, 76),
    (55, 55, 55),
    (80, 73, 45),
    (39, 71, 80),
];

/// Keys bound to the first classes, in class order.
pub const CLASS_SHORTCUTS: [char; 10] = ['1', '2', '3', '4', '5', '6', '7', '8', '9', '0'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassEntry {
    pub name: String,
    pub color: (u8, u8, u8),
    pub shortcut: Option<char>,
}

#[derive(Debug, Clone)]
pub struct ClassPalette {
    classes: Vec<ClassEntry>,
    active: usize,
}

impl ClassPalette {
    pub fn new(names: &[String]) -> Result<Self> {
        if names.is_empty() {
            return Err(Error::Config("at least one class name is required".into()));
        }
        if names.len() > CLASS_SHORTCUTS.len() {
            log::warn!(
                "{} classes configured, only the first {} get a shortcut key",
                names.len(),
                CLASS_SHORTCUTS.len()
            );
        }
        if names.len() > CLASS_COLORS.len() {
            log::warn!("More classes than colors, colors will repeat");
        }

        let classes = names
            .iter()
            .enumerate()
            .map(|(idx, name)| ClassEntry {
                name: name.clone(),
                color: CLASS_COLORS[idx % CLASS_COLORS.len()],
                shortcut: CLASS_SHORTCUTS.get(idx).copied(),
            })
            .collect();

        Ok(Self { classes, active: 0 })
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn classes(&self) -> &[ClassEntry] {
        &self.classes
    }

    pub fn get(&self, class_id: usize) -> Option<&ClassEntry> {
        self.classes.get(class_id)
    }

    /// Color for any class id, including ids from rows written with a larger palette.
    pub fn color(&self, class_id: usize) -> (u8, u8, u8) {
        CLASS_COLORS[class_id % CLASS_COLORS.len()]
    }

    pub fn active(&self) -> usize {
        self.active
    }

    /// Sets the class for new boxes. Out of range ids are ignored.
    pub fn set_active(&mut self, class_id: usize) -> bool {
        if class_id < self.classes.len() {
            self.active = class_id;
            true
        } else {
            false
        }
    }

    pub fn toggle(&mut self) {
        self.active = (self.active + 1) % self.classes.len();
    }

    /// Class that follows `class_id`, wrapping to 0.
    pub fn next_class(&self, class_id: usize) -> usize {
        (class_id + 1) % self.classes.len()
    }

    /// Class bound to a shortcut key.
    pub fn class_for_key(&self, key: char) -> Option<usize> {
        self.classes.iter().position(|c| c.shortcut == Some(key))
    }
}
