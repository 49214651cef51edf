//! `Module` — spec.md §3: "A set of named identifiers ...; a set of types;
//! a set of named data objects; a set of string literals ...; a set of
//! function declarations; a set of functions; a module-wide debug-entry
//! tree." Invariant: identifier names are unique; a function id has exactly
//! one declaration.

use std::collections::HashMap;

use cranelift_entity::PrimaryMap;

use crate::debuginfo::DebugEntryTree;
use crate::error::{Error, Result};

use super::entities::{DataId, FunctionDeclarationId, FunctionId, StringLiteralId, SymbolId, TypeId};
use super::function::Function;
use super::operand::StringElementType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Function,
    GlobalData,
    ThreadLocalData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    Export,
    ExportWeak,
    Import,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolVisibility {
    Default,
    Hidden,
    Internal,
    Protected,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    pub scope: SymbolScope,
    pub visibility: SymbolVisibility,
    pub alias_of: Option<SymbolId>,
}

/// An entry in the module's type set. A full C type system is out of scope
/// here (the front end owns type construction); the core only needs a
/// stable id other structures can cross-reference, plus a size for layout
/// decisions made downstream (stack allocation, bitfield offsets).
#[derive(Debug, Clone)]
pub struct TypeEntry {
    pub id: TypeId,
    pub byte_size: u32,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DataObject {
    pub id: DataId,
    pub symbol: SymbolId,
    pub bytes: Vec<u8>,
    pub align: u32,
}

#[derive(Debug, Clone)]
pub struct StringLiteral {
    pub id: StringLiteralId,
    pub element_type: StringElementType,
    pub bytes: Vec<u8>,
}

/// Signature + linkage for a function known to the module, independent of
/// whether a body has been built yet (spec.md §3: "a function id has exactly
/// one declaration").
#[derive(Debug, Clone)]
pub struct FunctionDeclaration {
    pub id: FunctionDeclarationId,
    pub symbol: SymbolId,
    pub parameter_types: Vec<TypeId>,
    pub return_type: Option<TypeId>,
    pub is_variadic: bool,
}

#[derive(Default)]
pub struct Module {
    symbols: PrimaryMap<SymbolId, Symbol>,
    names: HashMap<String, SymbolId>,
    types: PrimaryMap<TypeId, TypeEntry>,
    data_objects: PrimaryMap<DataId, DataObject>,
    string_literals: PrimaryMap<StringLiteralId, StringLiteral>,
    declarations: PrimaryMap<FunctionDeclarationId, FunctionDeclaration>,
    functions: PrimaryMap<FunctionId, Function>,
    /// `FunctionDeclarationId -> FunctionId`, enforcing "a function id has
    /// exactly one declaration" from the other direction: a declaration
    /// gets at most one body.
    bodies_by_declaration: HashMap<FunctionDeclarationId, FunctionId>,
    pub debug_entries: DebugEntryTree,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_symbol(
        &mut self,
        name: impl Into<String>,
        kind: SymbolKind,
        scope: SymbolScope,
        visibility: SymbolVisibility,
    ) -> Result<SymbolId> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(Error::AlreadyExists(format!("identifier name '{name}' already declared")));
        }
        let id = self.symbols.push(Symbol {
            id: SymbolId::NONE,
            name: name.clone(),
            kind,
            scope,
            visibility,
            alias_of: None,
        });
        self.symbols[id].id = id;
        self.names.insert(name, id);
        Ok(id)
    }

    pub fn alias_symbol(&mut self, name: impl Into<String>, target: SymbolId, visibility: SymbolVisibility) -> Result<SymbolId> {
        if self.symbols.get(target).is_none() {
            return Err(Error::NotFound(format!("symbol {target:?}")));
        }
        let kind = self.symbols[target].kind;
        let id = self.declare_symbol(name, kind, SymbolScope::Local, visibility)?;
        self.symbols[id].alias_of = Some(target);
        Ok(id)
    }

    pub fn symbol(&self, id: SymbolId) -> Result<&Symbol> {
        self.symbols.get(id).ok_or_else(|| Error::NotFound(format!("symbol {id:?}")))
    }

    pub fn symbol_by_name(&self, name: &str) -> Option<SymbolId> {
        self.names.get(name).copied()
    }

    pub fn new_type(&mut self, byte_size: u32, name: Option<String>) -> TypeId {
        let id = self.types.push(TypeEntry { id: TypeId::NONE, byte_size, name });
        self.types[id].id = id;
        id
    }

    pub fn type_entry(&self, id: TypeId) -> Result<&TypeEntry> {
        self.types.get(id).ok_or_else(|| Error::NotFound(format!("type {id:?}")))
    }

    pub fn new_data_object(&mut self, symbol: SymbolId, bytes: Vec<u8>, align: u32) -> Result<DataId> {
        self.symbol(symbol)?;
        let id = self.data_objects.push(DataObject { id: DataId::NONE, symbol, bytes, align });
        self.data_objects[id].id = id;
        Ok(id)
    }

    pub fn data_object(&self, id: DataId) -> Result<&DataObject> {
        self.data_objects.get(id).ok_or_else(|| Error::NotFound(format!("data object {id:?}")))
    }

    pub fn new_string_literal(&mut self, element_type: StringElementType, bytes: Vec<u8>) -> StringLiteralId {
        let id = self.string_literals.push(StringLiteral { id: StringLiteralId::NONE, element_type, bytes });
        self.string_literals[id].id = id;
        id
    }

    pub fn string_literal(&self, id: StringLiteralId) -> Result<&StringLiteral> {
        self.string_literals.get(id).ok_or_else(|| Error::NotFound(format!("string literal {id:?}")))
    }

    pub fn declare_function(
        &mut self,
        symbol: SymbolId,
        parameter_types: Vec<TypeId>,
        return_type: Option<TypeId>,
        is_variadic: bool,
    ) -> Result<FunctionDeclarationId> {
        self.symbol(symbol)?;
        let id = self.declarations.push(FunctionDeclaration {
            id: FunctionDeclarationId::NONE,
            symbol,
            parameter_types,
            return_type,
            is_variadic,
        });
        self.declarations[id].id = id;
        Ok(id)
    }

    pub fn declaration(&self, id: FunctionDeclarationId) -> Result<&FunctionDeclaration> {
        self.declarations.get(id).ok_or_else(|| Error::NotFound(format!("function declaration {id:?}")))
    }

    /// Builds a new function body for `declaration`. Fails with
    /// `already-exists` if that declaration already has a body (spec.md §3).
    pub fn new_function(&mut self, declaration: FunctionDeclarationId) -> Result<FunctionId> {
        self.declaration(declaration)?;
        if self.bodies_by_declaration.contains_key(&declaration) {
            return Err(Error::AlreadyExists(format!(
                "function declaration {declaration:?} already has a body"
            )));
        }
        let id = self.functions.push(Function::new(FunctionId::NONE, declaration));
        self.functions[id].id = id;
        self.bodies_by_declaration.insert(declaration, id);
        Ok(id)
    }

    pub fn function(&self, id: FunctionId) -> Result<&Function> {
        self.functions.get(id).ok_or_else(|| Error::NotFound(format!("function {id:?}")))
    }

    pub fn function_mut(&mut self, id: FunctionId) -> Result<&mut Function> {
        self.functions.get_mut(id).ok_or_else(|| Error::NotFound(format!("function {id:?}")))
    }

    pub fn functions(&self) -> impl Iterator<Item = (FunctionId, &Function)> {
        self.functions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_symbol_name_rejected() {
        let mut m = Module::new();
        m.declare_symbol("foo", SymbolKind::Function, SymbolScope::Export, SymbolVisibility::Default)
            .unwrap();
        assert!(m
            .declare_symbol("foo", SymbolKind::Function, SymbolScope::Export, SymbolVisibility::Default)
            .is_err());
    }

    #[test]
    fn declaration_gets_at_most_one_body() {
        let mut m = Module::new();
        let sym = m
            .declare_symbol("f", SymbolKind::Function, SymbolScope::Export, SymbolVisibility::Default)
            .unwrap();
        let decl = m.declare_function(sym, vec![], None, false).unwrap();
        m.new_function(decl).unwrap();
        assert!(m.new_function(decl).is_err());
    }
}
