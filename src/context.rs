//! Per-request creation state
//!
//! A [`CreationContext`] travels with one top-level bean request through the
//! whole creation pipeline and records which prototype beans are being built
//! on this path. Prototypes have no early-exposure mechanism, so meeting one
//! of them again on the same path is always an unresolvable cycle.

use crate::{BeanError, Result};

#[derive(Debug, Default)]
pub struct CreationContext {
    prototypes: Vec<String>,
}

impl CreationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `name` as being created. Fails if it already is.
    pub fn begin_prototype(&mut self, name: &str) -> Result<()> {
        if self.is_prototype_in_creation(name) {
            return Err(BeanError::currently_in_creation(name));
        }
        self.prototypes.push(name.to_owned());
        Ok(())
    }

    pub fn end_prototype(&mut self, name: &str) {
        if let Some(pos) = self.prototypes.iter().rposition(|n| n == name) {
            self.prototypes.remove(pos);
        }
    }

    pub fn is_prototype_in_creation(&self, name: &str) -> bool {
        self.prototypes.iter().any(|n| n == name)
    }
}
