//! The artifact map: generated WAT text keyed by artifact name.

use indexmap::IndexMap;
use quill_types::tree::QualifiedName;
use serde::Serialize;

use crate::error::{CodegenError, CodegenResult};

/// Where the entry shim lives and what it calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryShim {
    /// Name of the artifact that defines the shim.
    pub artifact: String,
    /// Exported symbol of the shim function.
    pub symbol: String,
    /// The user callable the shim invokes.
    pub callable: QualifiedName,
}

/// Artifact name → WAT text, in insertion order, plus the entry shim
/// registry.
///
/// Names are unique: [`ArtifactMap::insert`] refuses to overwrite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArtifactMap {
    artifacts: IndexMap<String, String>,
    entry_shim: Option<EntryShim>,
}

impl ArtifactMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) -> CodegenResult<()> {
        let name = name.into();
        if self.artifacts.contains_key(&name) {
            return Err(CodegenError::ArtifactCollision(name));
        }
        self.artifacts.insert(name, text.into());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.artifacts.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.artifacts.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Artifact names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.artifacts.keys().map(String::as_str)
    }

    /// `(name, text)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.artifacts
            .iter()
            .map(|(name, text)| (name.as_str(), text.as_str()))
    }

    pub fn entry_shim(&self) -> Option<&EntryShim> {
        self.entry_shim.as_ref()
    }

    pub fn set_entry_shim(&mut self, shim: EntryShim) {
        self.entry_shim = Some(shim);
    }

    /// Move every artifact of `other` into `self`, keeping order.
    ///
    /// Fails without modifying `self` if any name already exists. The entry
    /// shim of `other`, if any, replaces the current one.
    pub fn merge(&mut self, other: ArtifactMap) -> CodegenResult<()> {
        if let Some(name) = other.names().find(|name| self.contains(name)) {
            return Err(CodegenError::ArtifactCollision(name.to_string()));
        }
        self.artifacts.extend(other.artifacts);
        if other.entry_shim.is_some() {
            self.entry_shim = other.entry_shim;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_order_and_rejects_duplicates() {
        let mut map = ArtifactMap::new();
        map.insert("b.ql", "(func $B)").unwrap();
        map.insert("a.ql", "(func $A)").unwrap();
        assert_eq!(map.names().collect::<Vec<_>>(), ["b.ql", "a.ql"]);
        assert_eq!(
            map.insert("b.ql", ""),
            Err(CodegenError::ArtifactCollision("b.ql".into()))
        );
        assert_eq!(map.get("b.ql"), Some("(func $B)"));
    }

    #[test]
    fn merge_is_all_or_nothing() {
        let mut map = ArtifactMap::new();
        map.insert("a.ql", "1").unwrap();

        let mut other = ArtifactMap::new();
        other.insert("b.ql", "2").unwrap();
        other.insert("a.ql", "3").unwrap();
        assert!(map.merge(other).is_err());
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("a.ql"), Some("1"));
    }

    #[test]
    fn merge_carries_the_entry_shim() {
        let mut other = ArtifactMap::new();
        other.insert("a.ql.g.EntryPoint.wat", "").unwrap();
        other.set_entry_shim(EntryShim {
            artifact: "a.ql.g.EntryPoint.wat".into(),
            symbol: "__QuillEntryPoint__".into(),
            callable: QualifiedName::new("A", "Main"),
        });
        let mut map = ArtifactMap::new();
        map.merge(other).unwrap();
        assert_eq!(
            map.entry_shim().map(|s| s.artifact.as_str()),
            Some("a.ql.g.EntryPoint.wat")
        );
    }
}
