use std::collections::HashMap;

/// Two-level symbol table: an always-visible global part plus at most one
/// local part.
///
/// The local part only exists inside a [`LocalScope`] obtained from
/// [`SymbolTable::enter_local`]. The scope borrows the table mutably and
/// offers no way to enter another local scope, so procedures cannot nest.
/// Dropping the scope discards every local entry.
///
/// The table is generic over the attribute stored per name: the checker
/// keeps [`Type`](crate::lang::ty::Type)s, the encoder keeps
/// [`Address`](crate::bytecode::ir::Address)es.
#[derive(Debug, Clone)]
pub struct SymbolTable<T> {
    globals: HashMap<String, T>,
}

impl<T> Default for SymbolTable<T> {
    fn default() -> Self {
        Self {
            globals: HashMap::new(),
        }
    }
}

impl<T> SymbolTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a global entry. Returns false if `name` is already global.
    pub fn define(&mut self, name: &str, attr: T) -> bool {
        if self.globals.contains_key(name) {
            return false;
        }
        self.globals.insert(name.to_string(), attr);
        true
    }

    pub fn lookup(&self, name: &str) -> Option<&T> {
        self.globals.get(name)
    }

    /// Activate an empty local part.
    pub fn enter_local(&mut self) -> LocalScope<'_, T> {
        LocalScope {
            table: self,
            locals: HashMap::new(),
        }
    }
}

/// The local part of a [`SymbolTable`], alive for one procedure body.
#[derive(Debug)]
pub struct LocalScope<'t, T> {
    table: &'t mut SymbolTable<T>,
    locals: HashMap<String, T>,
}

impl<T> LocalScope<'_, T> {
    /// Add a local entry. Returns false if `name` is already local; a
    /// global of the same name is shadowed, not a conflict.
    pub fn define(&mut self, name: &str, attr: T) -> bool {
        if self.locals.contains_key(name) {
            return false;
        }
        self.locals.insert(name.to_string(), attr);
        true
    }

    /// Local entries shadow global ones.
    pub fn lookup(&self, name: &str) -> Option<&T> {
        self.locals.get(name).or_else(|| self.table.lookup(name))
    }

    pub fn lookup_local(&self, name: &str) -> Option<&T> {
        self.locals.get(name)
    }

    /// Discard the local part.
    pub fn exit(self) {}
}

/// Name resolution shared by the global table and a local scope, so code
/// that only defines and looks up names works in either.
pub trait Scope<T> {
    fn define(&mut self, name: &str, attr: T) -> bool;
    fn lookup(&self, name: &str) -> Option<&T>;
}

impl<T> Scope<T> for SymbolTable<T> {
    fn define(&mut self, name: &str, attr: T) -> bool {
        SymbolTable::define(self, name, attr)
    }

    fn lookup(&self, name: &str) -> Option<&T> {
        SymbolTable::lookup(self, name)
    }
}

impl<T> Scope<T> for LocalScope<'_, T> {
    fn define(&mut self, name: &str, attr: T) -> bool {
        LocalScope::define(self, name, attr)
    }

    fn lookup(&self, name: &str) -> Option<&T> {
        LocalScope::lookup(self, name)
    }
}

impl<T, S: Scope<T>> Scope<T> for &mut S {
    fn define(&mut self, name: &str, attr: T) -> bool {
        (**self).define(name, attr)
    }

    fn lookup(&self, name: &str) -> Option<&T> {
        (**self).lookup(name)
    }
}
