//! Editable, persisted TOML documents.
//!
//! A [`ConfigDocument`] wraps one file on disk (the project file, the lock
//! file or the local state file) as a [`toml_edit::DocumentMut`]. The parsed
//! document is the *working copy*; the text last read from or written to disk
//! is kept separately so that:
//!
//! - [`ConfigDocument::load`] throws the working copy away and re-reads the file
//! - [`ConfigDocument::save`] writes atomically, and only when the working copy
//!   was touched and its text really differs from disk
//! - a caller committing two documents can undo the first write with
//!   [`ConfigDocument::restore_disk_snapshot`] when the second one fails
//!
//! Edits address values by key path (`&["env_specs", "default", "packages"]`).
//! Intermediate tables are created on demand; arrays are edited in place through
//! the helpers in [`array`] so comments around untouched entries survive.

pub mod array;

use crate::core::ProjkitError;
use crate::utils::fs::atomic_write;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use toml_edit::{Array, DocumentMut, InlineTable, Item, Table, Value};
use tracing::debug;

/// One persisted TOML document with a working copy.
#[derive(Debug, Clone)]
pub struct ConfigDocument {
    path: PathBuf,
    template: String,
    doc: DocumentMut,
    disk_text: Option<String>,
    parse_error: Option<String>,
    dirty: bool,
}

impl ConfigDocument {
    /// Open the document at `path`, reading it from disk.
    ///
    /// `template` is the content used when the file does not exist yet.
    ///
    /// # Errors
    ///
    /// Fails only when the file exists but cannot be read. A file that does not
    /// parse is not an error; see [`ConfigDocument::parse_error`].
    pub fn open(path: impl Into<PathBuf>, template: impl Into<String>) -> Result<Self> {
        let mut document = Self {
            path: path.into(),
            template: template.into(),
            doc: DocumentMut::new(),
            disk_text: None,
            parse_error: None,
            dirty: false,
        };
        document.load()?;
        Ok(document)
    }

    /// Discard the working copy and re-read the file.
    pub fn load(&mut self) -> Result<()> {
        let disk_text = match std::fs::read_to_string(&self.path) {
            Ok(text) => Some(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read {}", self.path.display()));
            }
        };

        let source = disk_text.as_deref().unwrap_or(&self.template);
        match source.parse::<DocumentMut>() {
            Ok(doc) => {
                self.doc = doc;
                self.parse_error = None;
            }
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "Document does not parse");
                self.doc = DocumentMut::new();
                self.parse_error = Some(format!("{}: {}", self.basename(), e.message()));
            }
        }

        self.disk_text = disk_text;
        self.dirty = false;
        Ok(())
    }

    /// Persist the working copy.
    ///
    /// Nothing is written when the working copy was not modified since the last
    /// load/save, or when its text equals what is already on disk.
    ///
    /// # Errors
    ///
    /// Refuses to save a document whose file did not parse, so a broken file is
    /// never silently replaced. I/O failures are returned with context.
    pub fn save(&mut self) -> Result<()> {
        if let Some(reason) = &self.parse_error {
            return Err(ProjkitError::ProjectFileParseError {
                file: self.basename(),
                reason: reason.clone(),
            }
            .into());
        }

        if !self.dirty {
            return Ok(());
        }

        let text = self.doc.to_string();
        if self.disk_text.as_deref() != Some(text.as_str()) {
            debug!(path = %self.path.display(), "Writing document");
            atomic_write(&self.path, text.as_bytes())
                .with_context(|| format!("Failed to save {}", self.path.display()))?;
            self.disk_text = Some(text);
        }
        self.dirty = false;
        Ok(())
    }

    /// Mark the working copy as the state to validate and eventually save.
    pub fn use_changes_without_saving(&mut self) {
        self.dirty = true;
    }

    /// The text currently on disk (`None` when the file does not exist).
    pub fn disk_snapshot(&self) -> Option<String> {
        self.disk_text.clone()
    }

    /// Put `snapshot` back on disk and reload the working copy from it.
    pub fn restore_disk_snapshot(&mut self, snapshot: Option<String>) -> Result<()> {
        match &snapshot {
            Some(text) => atomic_write(&self.path, text.as_bytes())
                .with_context(|| format!("Failed to restore {}", self.path.display()))?,
            None => {
                if self.path.exists() {
                    std::fs::remove_file(&self.path)
                        .with_context(|| format!("Failed to remove {}", self.path.display()))?;
                }
            }
        }
        self.load()
    }

    /// Path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without directories.
    pub fn basename(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Parser message when the file on disk is not valid TOML.
    pub fn parse_error(&self) -> Option<&str> {
        self.parse_error.as_deref()
    }

    /// Whether the working copy was touched since the last load/save.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether the file exists on disk.
    pub fn exists_on_disk(&self) -> bool {
        self.disk_text.is_some()
    }

    /// The root table of the working copy.
    pub fn root(&self) -> &Table {
        self.doc.as_table()
    }

    /// Serialized working copy.
    pub fn to_text(&self) -> String {
        self.doc.to_string()
    }

    /// Look up an item by key path.
    pub fn get(&self, path: &[&str]) -> Option<&Item> {
        let mut item = self.doc.as_item();
        for key in path {
            item = item.get(key)?;
        }
        Some(item)
    }

    /// Look up an item by key path for modification.
    pub fn get_mut(&mut self, path: &[&str]) -> Option<&mut Item> {
        self.dirty = true;
        descend_mut(self.doc.as_item_mut(), path, false)
    }

    /// String value at `path`.
    pub fn get_str(&self, path: &[&str]) -> Option<&str> {
        self.get(path).and_then(Item::as_str)
    }

    /// Boolean value at `path`.
    pub fn get_bool(&self, path: &[&str]) -> Option<bool> {
        self.get(path).and_then(Item::as_bool)
    }

    /// Array value at `path`.
    pub fn get_array(&self, path: &[&str]) -> Option<&Array> {
        self.get(path).and_then(Item::as_array)
    }

    /// Table-like (standard or inline) value at `path`.
    pub fn get_table_like(&self, path: &[&str]) -> Option<&dyn toml_edit::TableLike> {
        self.get(path).and_then(Item::as_table_like)
    }

    /// Set the item at `path`, creating intermediate tables as needed.
    ///
    /// An intermediate key holding a non-table value is replaced by a table.
    pub fn set_value(&mut self, path: &[&str], value: impl Into<Item>) {
        let Some((last, parents)) = path.split_last() else {
            return;
        };
        let value = value.into();
        self.dirty = true;
        if let Some(parent) = descend_mut(self.doc.as_item_mut(), parents, true) {
            insert_into(parent, last, value);
        }
    }

    /// Remove the item at `path`. Returns whether something was removed.
    pub fn unset_value(&mut self, path: &[&str]) -> bool {
        let Some((last, parents)) = path.split_last() else {
            return false;
        };
        let removed = descend_mut(self.doc.as_item_mut(), parents, false)
            .and_then(Item::as_table_like_mut)
            .and_then(|table| table.remove(last))
            .is_some();
        if removed {
            self.dirty = true;
        }
        removed
    }

    /// The array at `path`, created empty when missing.
    ///
    /// Returns `None` when `path` holds something other than an array.
    pub fn array_mut(&mut self, path: &[&str]) -> Option<&mut Array> {
        if self.get(path).is_none() {
            self.set_value(path, toml_edit::value(Array::new()));
        }
        self.dirty = true;
        descend_mut(self.doc.as_item_mut(), path, false).and_then(Item::as_array_mut)
    }
}

fn descend_mut<'a>(item: &'a mut Item, path: &[&str], create: bool) -> Option<&'a mut Item> {
    let Some((first, rest)) = path.split_first() else {
        return Some(item);
    };

    if create && !item.get(first).is_some_and(Item::is_table_like) {
        let child = if item.is_inline_table() {
            Item::Value(Value::InlineTable(InlineTable::new()))
        } else {
            let mut table = Table::new();
            table.set_implicit(true);
            Item::Table(table)
        };
        item.as_table_like_mut()?.insert(first, child);
    }

    let next = item.get_mut(first)?;
    descend_mut(next, rest, create)
}

fn insert_into(parent: &mut Item, key: &str, value: Item) {
    if parent.is_inline_table() {
        // inline tables can only hold values
        if let (Some(table), Ok(value)) = (parent.as_inline_table_mut(), value.into_value()) {
            table.insert(key, value);
        }
    } else if let Some(table) = parent.as_table_like_mut() {
        table.insert(key, value);
    }
}
