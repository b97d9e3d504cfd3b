//! Symbols: opaque, identity-compared column handles (spec §3).

use crate::types::Type;
use std::cell::Cell;
use std::fmt;

/// A typed value-column identifier. Two symbols with the same `name` but
/// minted by different scopes are distinct: equality and hashing are by
/// `id`, never by `name`.
#[derive(Debug, Clone)]
pub struct Symbol {
    id: SymbolId,
    name: String,
    ty: Type,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

impl Symbol {
    pub fn id(&self) -> SymbolId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id.0)
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Symbol {}

impl std::hash::Hash for Symbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Mints symbols with crate-session-unique ids. One `SymbolAllocator` is
/// created per rewrite invocation so symbols minted during desugaring (e.g.
/// lambda capture, §3 lifecycle) never collide with caller-supplied ones.
#[derive(Debug, Default)]
pub struct SymbolAllocator {
    next: Cell<u32>,
}

impl SymbolAllocator {
    /// Starts allocation above the highest id already in use by the input
    /// plan, so freshly minted symbols never collide with caller-supplied
    /// ones.
    pub fn starting_after(max_existing: Option<SymbolId>) -> Self {
        let next = max_existing.map(|id| id.0 + 1).unwrap_or(0);
        Self {
            next: Cell::new(next),
        }
    }

    pub fn fresh(&self, name: impl Into<String>, ty: Type) -> Symbol {
        let id = SymbolId(self.next.get());
        self.next.set(self.next.get() + 1);
        Symbol {
            id,
            name: name.into(),
            ty,
        }
    }

    /// Mints a fresh symbol whose display name is derived from `base`,
    /// used by rules that desugar an expression into a new intermediate
    /// column (e.g. common-subexpression extraction).
    pub fn fresh_like(&self, base: &Symbol) -> Symbol {
        self.fresh(format!("{}_{}", base.name(), self.next.get()), base.ty().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    #[test]
    fn fresh_symbols_get_distinct_ids() {
        let alloc = SymbolAllocator::default();
        let a = alloc.fresh("a", Type::Boolean);
        let b = alloc.fresh("a", Type::Boolean);
        assert_ne!(a.id(), b.id());
        assert_ne!(a, b, "same name, different scope must not compare equal");
    }

    #[test]
    fn starting_after_avoids_collisions() {
        let alloc = SymbolAllocator::starting_after(Some(SymbolId(41)));
        let fresh = alloc.fresh("x", Type::Boolean);
        assert_eq!(fresh.id(), SymbolId(42));
    }
}
