//! Symbol table interface (§6 "Symbol table").
//!
//! Owned by the declaration parser in a real compiler; this crate only
//! needs to look entries up and read their storage class, type and
//! offset. `TestSymbolTable` is a minimal in-memory stand-in used by
//! this crate's own tests.

use crate::types::Type;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Auto,
    Register,
    Static,
    Global,
    /// Named function.
    Function,
    /// `enum`/`#define`-style compile-time constant.
    EnumConst,
    /// Variadic parameter (needs a `leavariadic` base-pointer
    /// adjustment to address, §9 Design Notes).
    VariadicParam,
}

#[derive(Debug, Clone)]
pub struct SymEntry {
    pub name: String,
    pub ty: Type,
    pub storage: StorageClass,
    /// Frame offset for `Auto`/`VariadicParam`; zero-page slot index for
    /// `Register`; unused otherwise.
    pub offset: i32,
    /// For `EnumConst`, the constant's value.
    pub const_value: Option<i64>,
    /// Qualifier: this entry denotes a `const`-qualified object.
    pub is_const: bool,
}

pub trait SymbolTable {
    fn find(&self, name: &str) -> Option<&SymEntry>;
    fn add_local(&mut self, entry: SymEntry);
    fn add_global(&mut self, entry: SymEntry);
    fn add_label(&mut self, name: &str) -> u32;
}

#[derive(Debug, Default)]
pub struct TestSymbolTable {
    entries: HashMap<String, SymEntry>,
    labels: HashMap<String, u32>,
    next_label: u32,
}

impl TestSymbolTable {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SymbolTable for TestSymbolTable {
    fn find(&self, name: &str) -> Option<&SymEntry> {
        self.entries.get(name)
    }

    fn add_local(&mut self, entry: SymEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    fn add_global(&mut self, entry: SymEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    fn add_label(&mut self, name: &str) -> u32 {
        let id = self.next_label;
        self.next_label += 1;
        self.labels.insert(name.to_string(), id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_inserted_local() {
        let mut tab = TestSymbolTable::new();
        tab.add_local(SymEntry {
            name: "a".into(),
            ty: Type::INT,
            storage: StorageClass::Auto,
            offset: -2,
            const_value: None,
            is_const: false,
        });
        let entry = tab.find("a").expect("present");
        assert_eq!(entry.offset, -2);
        assert_eq!(entry.storage, StorageClass::Auto);
    }

    #[test]
    fn unknown_name_is_absent() {
        let tab = TestSymbolTable::new();
        assert!(tab.find("nope").is_none());
    }
}
