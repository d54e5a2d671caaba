use crate::CompileErrorKind;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    Global,
    Local,
    Free,
    Builtin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
    pub mutable: bool,
}

/// One lexical scope's bindings, chained to the enclosing scope.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    pub outer: Option<Box<SymbolTable>>,
    pub free_symbols: Vec<Symbol>,
    pub num_definitions: usize,
    store: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_enclosed(outer: SymbolTable) -> Self {
        Self {
            outer: Some(Box::new(outer)),
            ..Default::default()
        }
    }

    pub fn define(&mut self, name: &str, mutable: bool) -> Result<Symbol, CompileErrorKind> {
        if self.has_value(name) {
            return Err(CompileErrorKind::AlreadyDefined(name.to_string()));
        }

        let scope = match self.outer {
            Some(_) => SymbolScope::Local,
            None => SymbolScope::Global,
        };
        let symbol = Symbol {
            name: name.to_string(),
            scope,
            index: self.num_definitions,
            mutable,
        };
        self.store.insert(name.to_string(), symbol.clone());
        self.num_definitions += 1;
        Ok(symbol)
    }

    pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Builtin,
            index,
            mutable: false,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    fn define_free(&mut self, captured: Symbol) -> Symbol {
        let symbol = Symbol {
            name: captured.name.to_string(),
            scope: SymbolScope::Free,
            index: self.free_symbols.len(),
            mutable: captured.mutable,
        };
        self.free_symbols.push(captured);
        self.store.insert(symbol.name.to_string(), symbol.clone());
        symbol
    }

    /// Looks `name` up through the enclosing scopes, capturing locals of
    /// enclosing functions as free symbols along the way.
    pub fn resolve(&mut self, name: &str) -> Option<Symbol> {
        if let Some(symbol) = self.store.get(name) {
            return Some(symbol.clone());
        }

        let symbol = self.outer.as_mut()?.resolve(name)?;
        match symbol.scope {
            SymbolScope::Global | SymbolScope::Builtin => Some(symbol),
            SymbolScope::Local | SymbolScope::Free => Some(self.define_free(symbol)),
        }
    }

    /// Whether `name` is bound in this table, ignoring enclosing scopes.
    pub fn has_value(&self, name: &str) -> bool {
        self.store.contains_key(name)
    }
}
