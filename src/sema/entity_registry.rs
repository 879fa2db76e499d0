// src/sema/entity_registry.rs
//
// Computed facts about declarations, keyed by DeclId. The AST stays
// immutable; everything the checker derives from a declaration head lands
// here: its type, constructor signatures, member types, type parameters,
// lowered where-clauses, and impl targets.

use rustc_hash::FxHashMap;

use crate::frontend::{DeclId, Symbol};
use crate::sema::type_arena::{TypeId, TypeVarVec};

#[derive(Debug, Default)]
pub struct EntityRegistry {
    /// Type of the declaration itself: the nominal type for user types, the
    /// (possibly quantified) signature for functions.
    decl_types: FxHashMap<DeclId, TypeId>,
    /// Constructor signature of a struct declaration.
    ctor_types: FxHashMap<DeclId, TypeId>,
    /// Constructor signatures of an enum's variants, in declaration order.
    variant_ctors: FxHashMap<DeclId, Vec<(Symbol, TypeId)>>,
    /// Struct fields with their lowered types, under the decl's own vars.
    field_types: FxHashMap<DeclId, Vec<(Symbol, TypeId)>>,
    /// Member types walked by the sizedness/order queries: struct fields
    /// plus enum payloads, under the decl's own vars.
    member_types: FxHashMap<DeclId, Vec<TypeId>>,
    /// Type parameters of a generic declaration.
    type_params: FxHashMap<DeclId, TypeVarVec>,
    /// Lowered where-clause obligations of a generic declaration.
    where_clauses: FxHashMap<DeclId, Vec<TypeId>>,
    /// The trait application an impl witnesses, under the impl's own vars.
    impl_targets: FxHashMap<DeclId, TypeId>,
    /// Method signatures of a trait, under the trait's own vars.
    trait_methods: FxHashMap<DeclId, Vec<(Symbol, TypeId)>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_decl_type(&mut self, decl: DeclId, ty: TypeId) {
        self.decl_types.insert(decl, ty);
    }

    pub fn decl_type(&self, decl: DeclId) -> Option<TypeId> {
        self.decl_types.get(&decl).copied()
    }

    pub fn set_ctor_type(&mut self, decl: DeclId, ty: TypeId) {
        self.ctor_types.insert(decl, ty);
    }

    pub fn ctor_type(&self, decl: DeclId) -> Option<TypeId> {
        self.ctor_types.get(&decl).copied()
    }

    pub fn set_variant_ctors(&mut self, decl: DeclId, ctors: Vec<(Symbol, TypeId)>) {
        self.variant_ctors.insert(decl, ctors);
    }

    pub fn variant_ctor(&self, decl: DeclId, name: Symbol) -> Option<TypeId> {
        self.variant_ctors
            .get(&decl)?
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, ty)| ty)
    }

    pub fn set_field_types(&mut self, decl: DeclId, fields: Vec<(Symbol, TypeId)>) {
        self.field_types.insert(decl, fields);
    }

    pub fn field_types(&self, decl: DeclId) -> &[(Symbol, TypeId)] {
        self.field_types.get(&decl).map_or(&[], |f| f.as_slice())
    }

    pub fn set_member_types(&mut self, decl: DeclId, members: Vec<TypeId>) {
        self.member_types.insert(decl, members);
    }

    pub fn member_types(&self, decl: DeclId) -> &[TypeId] {
        self.member_types.get(&decl).map_or(&[], |m| m.as_slice())
    }

    pub fn set_type_params(&mut self, decl: DeclId, params: TypeVarVec) {
        self.type_params.insert(decl, params);
    }

    pub fn type_params(&self, decl: DeclId) -> &[crate::frontend::TypeVarId] {
        self.type_params.get(&decl).map_or(&[], |p| p.as_slice())
    }

    pub fn set_where_clauses(&mut self, decl: DeclId, clauses: Vec<TypeId>) {
        self.where_clauses.insert(decl, clauses);
    }

    pub fn where_clauses(&self, decl: DeclId) -> &[TypeId] {
        self.where_clauses.get(&decl).map_or(&[], |c| c.as_slice())
    }

    pub fn set_impl_target(&mut self, decl: DeclId, target: TypeId) {
        self.impl_targets.insert(decl, target);
    }

    pub fn impl_target(&self, decl: DeclId) -> Option<TypeId> {
        self.impl_targets.get(&decl).copied()
    }

    pub fn set_trait_methods(&mut self, decl: DeclId, methods: Vec<(Symbol, TypeId)>) {
        self.trait_methods.insert(decl, methods);
    }

    pub fn trait_method(&self, decl: DeclId, name: Symbol) -> Option<TypeId> {
        self.trait_methods
            .get(&decl)?
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, ty)| ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sema::type_arena::TypeArena;

    #[test]
    fn lookups_default_to_empty() {
        let defs = EntityRegistry::new();
        let d = DeclId(3);
        assert!(defs.decl_type(d).is_none());
        assert!(defs.type_params(d).is_empty());
        assert!(defs.where_clauses(d).is_empty());
        assert!(defs.member_types(d).is_empty());
    }

    #[test]
    fn variant_lookup_by_name() {
        let mut defs = EntityRegistry::new();
        let mut arena = TypeArena::new();
        let d = DeclId(1);
        let some = Symbol(10);
        let none = Symbol(11);
        let bool_ = arena.bool_();
        let unit = arena.unit();
        defs.set_variant_ctors(d, vec![(some, bool_), (none, unit)]);
        assert_eq!(defs.variant_ctor(d, some), Some(bool_));
        assert_eq!(defs.variant_ctor(d, none), Some(unit));
        assert_eq!(defs.variant_ctor(d, Symbol(12)), None);
    }
}
