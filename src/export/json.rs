//! JSON import/export of review items.
//! Items are written as a pretty-printed array and read back unchanged.

use crate::database::{Result, StoreError};
use crate::models::ReviewItem;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

/// Exports review items to a JSON file at the specified path.
pub fn export_json_to_path(items: &[ReviewItem], path: impl AsRef<Path>) -> Result<()> {
    let json_string = serde_json::to_string_pretty(items)?;
    let mut file = File::create(path.as_ref())?;
    file.write_all(json_string.as_bytes())?;
    tracing::info!(count = items.len(), path = %path.as_ref().display(), "review items exported");
    Ok(())
}

/// Imports review items from a JSON file.
/// Fails if the file doesn't exist, an item is malformed, or an ease
/// factor is below the 1.3 floor.
pub fn import_json(path: impl AsRef<Path>) -> Result<Vec<ReviewItem>> {
    let file = File::open(path.as_ref())?;
    let items: Vec<ReviewItem> = serde_json::from_reader(BufReader::new(file))?;
    for item in &items {
        item.validate().map_err(StoreError::InvalidRecord)?;
    }
    tracing::info!(count = items.len(), path = %path.as_ref().display(), "review items imported");
    Ok(items)
}
