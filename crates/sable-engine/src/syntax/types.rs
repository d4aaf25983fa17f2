//! Resolved type identities
//!
//! The semantic analyzer hands over a table of the class types a unit can
//! throw or test against. Only identity, name and the base-class link are
//! needed by lowering: runtime type tests walk the base chain.

use std::fmt;

/// Resolved type identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type{}", self.0)
    }
}

/// A declared class type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    /// Fully qualified name as emitted into target code
    pub name: String,
    /// Direct base class, if any
    pub base: Option<TypeId>,
}

/// Table of resolved class types
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeTable {
    types: Vec<TypeInfo>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a class type. `base` must already be declared.
    pub fn declare(&mut self, name: impl Into<String>, base: Option<TypeId>) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeInfo {
            name: name.into(),
            base,
        });
        id
    }

    pub fn get(&self, id: TypeId) -> Option<&TypeInfo> {
        self.types.get(id.0 as usize)
    }

    /// Name of a type, or a placeholder for ids the table does not know
    pub fn name(&self, id: TypeId) -> String {
        self.get(id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| format!("<unknown {}>", id))
    }

    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.types
            .iter()
            .position(|t| t.name == name)
            .map(|i| TypeId(i as u32))
    }

    /// True if `ty` is `ancestor` or derives from it
    pub fn is_subtype(&self, ty: TypeId, ancestor: TypeId) -> bool {
        let mut current = Some(ty);
        // Base chains are acyclic by construction (a base is declared first),
        // but bound the walk by the table size anyway.
        for _ in 0..=self.types.len() {
            match current {
                Some(t) if t == ancestor => return true,
                Some(t) => current = self.get(t).and_then(|info| info.base),
                None => return false,
            }
        }
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &TypeInfo)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, t)| (TypeId(i as u32), t))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
