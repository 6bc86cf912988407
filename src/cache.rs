//! Process-lifetime cache of the last loaded source.
//!
//! Holds at most one [`SheetSet`]. The key digests the source bytes together
//! with every load option that changes the parse, so the same upload read
//! with another delimiter or header threshold is parsed again.

use std::sync::Arc;

use log::debug;
use sha2::{Digest, Sha256};

use crate::{
    loader::{self, LoadError, LoadOptions, Source},
    table::SheetSet,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceKey([u8; 32]);

impl SourceKey {
    pub fn new(source: &Source, options: &LoadOptions) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((source.bytes.len() as u64).to_le_bytes());
        hasher.update(&source.bytes);
        // The sheet name of a text source comes from its file name.
        hasher.update(source.name.as_bytes());
        hasher.update([0]);
        hasher.update((options.header.scan_rows as u64).to_le_bytes());
        hasher.update((options.header.min_filled as u64).to_le_bytes());
        match options.delimiter {
            Some(delimiter) => hasher.update([1, delimiter]),
            None => hasher.update([0, 0]),
        }
        hasher.update(options.encoding.name().as_bytes());
        Self(hasher.finalize().into())
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[derive(Debug, Default)]
pub struct SourceCache {
    entry: Option<(SourceKey, Arc<SheetSet>)>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached sheets for `source`, loading and caching them on a miss.
    /// A miss replaces whatever was cached before.
    pub fn get_or_load(
        &mut self,
        source: &Source,
        options: &LoadOptions,
    ) -> Result<Arc<SheetSet>, LoadError> {
        let key = SourceKey::new(source, options);
        if let Some((cached, sheets)) = &self.entry
            && *cached == key
        {
            debug!("Cache hit for '{}' ({})", source.name, &key.to_hex()[..12]);
            return Ok(Arc::clone(sheets));
        }
        debug!("Cache miss for '{}'", source.name);
        let sheets = Arc::new(loader::load_with(source, options)?);
        self.entry = Some((key, Arc::clone(&sheets)));
        Ok(sheets)
    }

    pub fn is_cached(&self, source: &Source, options: &LoadOptions) -> bool {
        let key = SourceKey::new(source, options);
        self.entry.as_ref().is_some_and(|(cached, _)| *cached == key)
    }

    pub fn invalidate(&mut self) {
        if self.entry.take().is_some() {
            debug!("Source cache cleared");
        }
    }
}
