//! Module-wide DWARF-like debug-entry tree (spec.md §4.7): "entries tree of
//! typed debug entries (types, subprograms, variables, lexical blocks,
//! parameters, enumerators) keyed by a dense `debug_entry_id`. Each entry has
//! a parent, a tag, an ordered attribute map (tag -> payload), and an ordered
//! child list. Adding an attribute replaces any attribute with the same tag."

use std::collections::BTreeMap;

use crate::containers::DenseTable;
use crate::define_id;
use crate::error::{Error, Result};
use crate::ir::entities::{DataId, StringLiteralId, SymbolId, TypeId};

define_id! {
    /// An entry in a module's debug-entry tree.
    pub struct DebugEntryId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugEntryTag {
    Type,
    Subprogram,
    Variable,
    LexicalBlock,
    Parameter,
    Enumerator,
}

/// Attribute tags, the DWARF-like "what kind of payload is this" key. The
/// ordered map is keyed by this so re-adding the same tag replaces the prior
/// value, per spec.md §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugAttributeTag {
    Name,
    TypeRef,
    LowPc,
    HighPc,
    ByteSize,
    ConstValue,
    DataMemberLocation,
    Declaration,
    External,
    SymbolRef,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DebugAttributeValue {
    String(StringLiteralId),
    UInt(u64),
    Int(i64),
    Flag(bool),
    TypeRef(TypeId),
    EntryRef(DebugEntryId),
    SymbolRef(SymbolId),
    DataRef(DataId),
}

#[derive(Debug, Clone)]
pub struct DebugEntry {
    pub id: DebugEntryId,
    pub parent: DebugEntryId,
    pub tag: DebugEntryTag,
    pub attributes: BTreeMap<DebugAttributeTag, DebugAttributeValue>,
    pub children: Vec<DebugEntryId>,
}

impl DebugEntry {
    fn new(id: DebugEntryId, parent: DebugEntryId, tag: DebugEntryTag) -> Self {
        Self {
            id,
            parent,
            tag,
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct DebugEntryTree {
    entries: DenseTable<DebugEntryId, DebugEntry>,
    roots: Vec<DebugEntryId>,
}

impl DebugEntryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new entry under `parent` (`DebugEntryId::NONE` for a
    /// module-level root).
    pub fn new_entry(&mut self, parent: DebugEntryId, tag: DebugEntryTag) -> Result<DebugEntryId> {
        if !parent.is_none() && !self.entries.is_alive(parent) {
            return Err(Error::NotFound(format!("debug entry {parent:?}")));
        }
        let id = self.entries.push_with(|id| DebugEntry::new(id, parent, tag));
        if parent.is_none() {
            self.roots.push(id);
        } else {
            self.entries.get_mut(parent).unwrap().children.push(id);
        }
        Ok(id)
    }

    pub fn set_attribute(&mut self, id: DebugEntryId, tag: DebugAttributeTag, value: DebugAttributeValue) -> Result<()> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("debug entry {id:?}")))?;
        entry.attributes.insert(tag, value);
        Ok(())
    }

    pub fn attribute(&self, id: DebugEntryId, tag: DebugAttributeTag) -> Option<&DebugAttributeValue> {
        self.entries.get(id)?.attributes.get(&tag)
    }

    pub fn entry(&self, id: DebugEntryId) -> Result<&DebugEntry> {
        self.entries.get(id).ok_or_else(|| Error::NotFound(format!("debug entry {id:?}")))
    }

    pub fn children(&self, id: DebugEntryId) -> Result<&[DebugEntryId]> {
        Ok(&self.entry(id)?.children)
    }

    pub fn roots(&self) -> &[DebugEntryId] {
        &self.roots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_replace_keeps_latest() {
        let mut tree = DebugEntryTree::new();
        let e = tree.new_entry(DebugEntryId::NONE, DebugEntryTag::Subprogram).unwrap();
        tree.set_attribute(e, DebugAttributeTag::LowPc, DebugAttributeValue::UInt(10)).unwrap();
        tree.set_attribute(e, DebugAttributeTag::LowPc, DebugAttributeValue::UInt(20)).unwrap();
        assert_eq!(tree.attribute(e, DebugAttributeTag::LowPc), Some(&DebugAttributeValue::UInt(20)));
    }

    #[test]
    fn children_are_ordered_by_creation() {
        let mut tree = DebugEntryTree::new();
        let parent = tree.new_entry(DebugEntryId::NONE, DebugEntryTag::Subprogram).unwrap();
        let c1 = tree.new_entry(parent, DebugEntryTag::Parameter).unwrap();
        let c2 = tree.new_entry(parent, DebugEntryTag::Variable).unwrap();
        assert_eq!(tree.children(parent).unwrap(), &[c1, c2]);
    }
}
