//! Entry store: per-entry stepped data plus the handler lists bound at
//! declaration.

use std::collections::HashMap;
use std::sync::Arc;

use crate::binding::HandlerBinding;
use crate::error::{FloggerError, Result};
use crate::models::{Series, Snapshot, Value};

/// Handler lists of one entry, fixed at declaration.
#[derive(Debug, Clone, Default)]
pub struct EntryHandlers {
    pub on_push: Vec<HandlerBinding>,
    pub on_dump: Vec<HandlerBinding>,
    pub on_reset: Vec<HandlerBinding>,
}

#[derive(Debug)]
struct Entry {
    data: Series,
    /// Pushes since declaration or the last clear.
    pushes: u64,
    handlers: Arc<EntryHandlers>,
}

/// Declared entries in declaration order.
///
/// Re-declaring a name is rejected with [`FloggerError::DuplicateEntry`].
#[derive(Debug, Default)]
pub struct EntryStore {
    entries: HashMap<String, Entry>,
    order: Vec<String>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, name: &str, handlers: EntryHandlers) -> Result<()> {
        if self.entries.contains_key(name) {
            return Err(FloggerError::DuplicateEntry(name.to_string()));
        }
        self.entries.insert(
            name.to_string(),
            Entry {
                data: Series::new(),
                pushes: 0,
                handlers: Arc::new(handlers),
            },
        );
        self.order.push(name.to_string());
        Ok(())
    }

    /// Insert `value` at `step`. An existing step is overwritten.
    pub fn append(&mut self, name: &str, step: u64, value: Value) -> Result<()> {
        let entry = self.entry_mut(name)?;
        entry.data.insert(step, value);
        entry.pushes += 1;
        Ok(())
    }

    pub fn snapshot(&self, name: &str) -> Result<Snapshot> {
        Ok(Arc::new(self.entry(name)?.data.clone()))
    }

    /// Empty the data of `name`; its handler lists stay bound.
    pub fn clear(&mut self, name: &str) -> Result<()> {
        let entry = self.entry_mut(name)?;
        entry.data.clear();
        entry.pushes = 0;
        Ok(())
    }

    /// Declared names in declaration order. Call again to restart.
    pub fn all_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.order.iter().map(String::as_str)
    }

    pub fn handlers(&self, name: &str) -> Result<Arc<EntryHandlers>> {
        Ok(Arc::clone(&self.entry(name)?.handlers))
    }

    pub fn len(&self, name: &str) -> Result<usize> {
        Ok(self.entry(name)?.data.len())
    }

    /// Number of appends since declaration or the last clear. Overwrites
    /// of an existing step count too.
    pub fn pushes(&self, name: &str) -> Result<u64> {
        Ok(self.entry(name)?.pushes)
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    fn entry(&self, name: &str) -> Result<&Entry> {
        self.entries
            .get(name)
            .ok_or_else(|| FloggerError::UnknownEntry(name.to_string()))
    }

    fn entry_mut(&mut self, name: &str) -> Result<&mut Entry> {
        self.entries
            .get_mut(name)
            .ok_or_else(|| FloggerError::UnknownEntry(name.to_string()))
    }
}
