//! Lowered functions and units

use super::origin::Origin;
use super::stmt::LStmt;
use crate::syntax::TypeTable;

/// A lowered top-level function
#[derive(Debug, Clone, PartialEq)]
pub struct LFunction {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<LStmt>,
    pub origin: Option<Origin>,
}

impl LFunction {
    pub fn new(name: impl Into<String>, params: Vec<String>, body: Vec<LStmt>) -> Self {
        Self {
            name: name.into(),
            params,
            body,
            origin: None,
        }
    }
}

/// The lowered form of one compilation unit
#[derive(Debug, Clone, PartialEq)]
pub struct LoweredUnit {
    pub name: String,
    pub functions: Vec<LFunction>,
    /// Type table the runtime type tests refer to
    pub types: TypeTable,
}

impl LoweredUnit {
    pub fn new(name: impl Into<String>, types: TypeTable) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
            types,
        }
    }

    pub fn add_function(&mut self, function: LFunction) {
        self.functions.push(function);
    }

    pub fn get_function(&self, name: &str) -> Option<&LFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }
}
