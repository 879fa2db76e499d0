// src/sema/type_arena.rs
//
// Interned type universe using TypeId handles for O(1) equality.
//
// Every type the checker ever manipulates is produced by the TypeArena and
// identified by a TypeId:
// - TypeId: u32 handle to an interned type (Copy, trivial Eq/Hash)
// - Ty: the shape enum, with TypeId children so SmallVec works
// - TypeArena: per-compilation storage with automatic deduplication
//
// Identity comparison of TypeIds is a sound substitute for structural
// equality: the intern map guarantees at most one inhabitant per
// equivalence class. Nominal shapes carry only their DeclId, so two
// declarations that look alike still get distinct types.

use hashbrown::HashMap;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::frontend::{DeclId, PrimType, TypeVarId};

/// Handle to an interned type.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct TypeId(u32);

impl TypeId {
    /// Get the raw index (for debugging/serialization)
    pub fn index(self) -> u32 {
        self.0
    }
}

/// SmallVec for type children - inline up to 4 (covers most tuples and
/// generic argument lists)
pub type TypeIdVec = SmallVec<[TypeId; 4]>;

/// Binder list of a quantifier; determined by the quantified declaration.
pub type TypeVarVec = SmallVec<[TypeVarId; 4]>;

/// Interned type shapes.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Ty {
    Prim(PrimType),
    /// Unit is the empty tuple.
    Tuple(TypeIdVec),
    SizedArray {
        elem: TypeId,
        len: u64,
        simd: bool,
    },
    UnsizedArray(TypeId),
    Ptr {
        pointee: TypeId,
        is_mut: bool,
        addr_space: u32,
    },
    Ref {
        pointee: TypeId,
        is_mut: bool,
        addr_space: u32,
    },
    Fn {
        dom: TypeId,
        codom: TypeId,
    },
    /// Codomain of continuations; `cn (T)` is `fn (T) -> !`.
    NoRet,
    /// Bottom of the subtype lattice.
    Bottom,
    /// Top of the subtype lattice.
    Top,
    /// Sentinel for ill-typed nodes; silences cascading diagnostics.
    Error,
    /// A type parameter or inference variable.
    Var(TypeVarId),
    /// Prenex quantifier over a generic declaration's parameters.
    Forall {
        decl: DeclId,
        vars: TypeVarVec,
        body: TypeId,
    },
    Struct(DeclId),
    Enum(DeclId),
    Trait(DeclId),
    Impl(DeclId),
    Mod(DeclId),
    Alias(DeclId),
    /// A user type applied to arguments. Never an alias application: those
    /// are expanded before interning.
    App {
        applied: TypeId,
        args: TypeIdVec,
    },
}

/// Pre-interned types with O(1) accessors.
#[derive(Debug, Clone, Copy)]
pub struct Singletons {
    pub error: TypeId,
    pub bool_: TypeId,
    pub unit: TypeId,
    pub bottom: TypeId,
    pub top: TypeId,
    pub no_ret: TypeId,
}

#[derive(Debug, Clone)]
struct AliasDef {
    params: TypeVarVec,
    body: TypeId,
}

/// Per-compilation type store with automatic interning.
pub struct TypeArena {
    /// Interned types, indexed by TypeId
    types: Vec<Ty>,
    /// Deduplication map
    intern_map: HashMap<Ty, TypeId>,
    /// Alias definitions registered at head emission, pre-expanded
    alias_defs: FxHashMap<DeclId, AliasDef>,
    pub singletons: Singletons,
}

impl TypeArena {
    pub fn new() -> Self {
        let mut arena = Self {
            types: Vec::new(),
            intern_map: HashMap::new(),
            alias_defs: FxHashMap::default(),
            singletons: Singletons {
                error: TypeId(0),
                bool_: TypeId(0),
                unit: TypeId(0),
                bottom: TypeId(0),
                top: TypeId(0),
                no_ret: TypeId(0),
            },
        };

        // Error must be first (index 0) for is_error()
        arena.singletons.error = arena.intern(Ty::Error);
        debug_assert_eq!(arena.singletons.error.0, 0);
        arena.singletons.bool_ = arena.intern(Ty::Prim(PrimType::Bool));
        arena.singletons.unit = arena.intern(Ty::Tuple(TypeIdVec::new()));
        arena.singletons.bottom = arena.intern(Ty::Bottom);
        arena.singletons.top = arena.intern(Ty::Top);
        arena.singletons.no_ret = arena.intern(Ty::NoRet);

        arena
    }

    /// Intern a shape, returning the existing TypeId if already present.
    fn intern(&mut self, ty: Ty) -> TypeId {
        let next_id = TypeId(self.types.len() as u32);
        *self.intern_map.entry(ty.clone()).or_insert_with(|| {
            self.types.push(ty);
            next_id
        })
    }

    pub fn get(&self, id: TypeId) -> &Ty {
        &self.types[id.0 as usize]
    }

    pub fn is_error(&self, id: TypeId) -> bool {
        id.0 == 0
    }

    // ========================================================================
    // Singleton accessors
    // ========================================================================

    pub fn error(&self) -> TypeId {
        self.singletons.error
    }
    pub fn bool_(&self) -> TypeId {
        self.singletons.bool_
    }
    pub fn unit(&self) -> TypeId {
        self.singletons.unit
    }
    pub fn bottom(&self) -> TypeId {
        self.singletons.bottom
    }
    pub fn top(&self) -> TypeId {
        self.singletons.top
    }
    pub fn no_ret(&self) -> TypeId {
        self.singletons.no_ret
    }

    // ========================================================================
    // Builders - intern on construction
    // ========================================================================

    pub fn prim(&mut self, tag: PrimType) -> TypeId {
        self.intern(Ty::Prim(tag))
    }

    pub fn tuple(&mut self, elems: impl Into<TypeIdVec>) -> TypeId {
        self.intern(Ty::Tuple(elems.into()))
    }

    pub fn sized_array(&mut self, elem: TypeId, len: u64, simd: bool) -> TypeId {
        self.intern(Ty::SizedArray { elem, len, simd })
    }

    pub fn unsized_array(&mut self, elem: TypeId) -> TypeId {
        self.intern(Ty::UnsizedArray(elem))
    }

    pub fn ptr(&mut self, pointee: TypeId, is_mut: bool, addr_space: u32) -> TypeId {
        self.intern(Ty::Ptr {
            pointee,
            is_mut,
            addr_space,
        })
    }

    pub fn ref_(&mut self, pointee: TypeId, is_mut: bool, addr_space: u32) -> TypeId {
        self.intern(Ty::Ref {
            pointee,
            is_mut,
            addr_space,
        })
    }

    pub fn fn_(&mut self, dom: TypeId, codom: TypeId) -> TypeId {
        self.intern(Ty::Fn { dom, codom })
    }

    /// Continuation type: a function that never returns.
    pub fn cn(&mut self, dom: TypeId) -> TypeId {
        let no_ret = self.no_ret();
        self.fn_(dom, no_ret)
    }

    pub fn type_var(&mut self, var: TypeVarId) -> TypeId {
        self.intern(Ty::Var(var))
    }

    pub fn forall(&mut self, decl: DeclId, vars: impl Into<TypeVarVec>, body: TypeId) -> TypeId {
        self.intern(Ty::Forall {
            decl,
            vars: vars.into(),
            body,
        })
    }

    pub fn struct_(&mut self, decl: DeclId) -> TypeId {
        self.intern(Ty::Struct(decl))
    }

    pub fn enum_(&mut self, decl: DeclId) -> TypeId {
        self.intern(Ty::Enum(decl))
    }

    pub fn trait_(&mut self, decl: DeclId) -> TypeId {
        self.intern(Ty::Trait(decl))
    }

    pub fn impl_(&mut self, decl: DeclId) -> TypeId {
        self.intern(Ty::Impl(decl))
    }

    pub fn mod_(&mut self, decl: DeclId) -> TypeId {
        self.intern(Ty::Mod(decl))
    }

    pub fn alias(&mut self, decl: DeclId) -> TypeId {
        self.intern(Ty::Alias(decl))
    }

    /// Record an alias's parameters and (already lowered, alias-free) body.
    pub fn define_alias(&mut self, decl: DeclId, params: impl Into<TypeVarVec>, body: TypeId) {
        self.alias_defs.insert(
            decl,
            AliasDef {
                params: params.into(),
                body,
            },
        );
    }

    pub fn alias_is_defined(&self, decl: DeclId) -> bool {
        self.alias_defs.contains_key(&decl)
    }

    /// Apply a user type to arguments. Alias applications are expanded
    /// before interning: the result never contains an alias node.
    pub fn type_app(&mut self, applied: TypeId, args: impl Into<TypeIdVec>) -> TypeId {
        let args = args.into();
        if let Ty::Alias(decl) = *self.get(applied) {
            let Some(def) = self.alias_defs.get(&decl).cloned() else {
                // Alias never registered; head emission reported it already.
                return self.error();
            };
            if def.params.len() != args.len() {
                return self.error();
            }
            let map: FxHashMap<TypeVarId, TypeId> =
                def.params.iter().copied().zip(args.iter().copied()).collect();
            return self.substitute(def.body, &map);
        }
        if args.is_empty() {
            return applied;
        }
        self.intern(Ty::App { applied, args })
    }

    // ========================================================================
    // Query helpers
    // ========================================================================

    pub fn as_fn(&self, id: TypeId) -> Option<(TypeId, TypeId)> {
        match self.get(id) {
            Ty::Fn { dom, codom } => Some((*dom, *codom)),
            _ => None,
        }
    }

    pub fn as_tuple(&self, id: TypeId) -> Option<&TypeIdVec> {
        match self.get(id) {
            Ty::Tuple(elems) => Some(elems),
            _ => None,
        }
    }

    pub fn as_forall(&self, id: TypeId) -> Option<(DeclId, &TypeVarVec, TypeId)> {
        match self.get(id) {
            Ty::Forall { decl, vars, body } => Some((*decl, vars, *body)),
            _ => None,
        }
    }

    /// The trait declaration behind `target`, when `target` is a trait or
    /// an application of one.
    pub fn as_trait_app(&self, id: TypeId) -> Option<DeclId> {
        match self.get(id) {
            Ty::Trait(decl) => Some(*decl),
            Ty::App { applied, .. } => match self.get(*applied) {
                Ty::Trait(decl) => Some(*decl),
                _ => None,
            },
            _ => None,
        }
    }

    /// Nominal declaration behind a type, looking through applications.
    pub fn nominal_decl(&self, id: TypeId) -> Option<DeclId> {
        match self.get(id) {
            Ty::Struct(d) | Ty::Enum(d) | Ty::Trait(d) | Ty::Impl(d) | Ty::Mod(d)
            | Ty::Alias(d) => Some(*d),
            Ty::App { applied, .. } => self.nominal_decl(*applied),
            _ => None,
        }
    }

    /// Type arguments of an application; empty for bare types.
    pub fn type_args(&self, id: TypeId) -> &[TypeId] {
        match self.get(id) {
            Ty::App { args, .. } => args,
            _ => &[],
        }
    }

    /// Reflexive structural containment. Recurses into sub-parts; stops at
    /// nominal types (a struct does not "contain" its fields here).
    pub fn contains(&self, ty: TypeId, other: TypeId) -> bool {
        if ty == other {
            return true;
        }
        match self.get(ty) {
            Ty::Tuple(elems) => elems.iter().any(|&e| self.contains(e, other)),
            Ty::SizedArray { elem, .. } | Ty::UnsizedArray(elem) => self.contains(*elem, other),
            Ty::Ptr { pointee, .. } | Ty::Ref { pointee, .. } => self.contains(*pointee, other),
            Ty::Fn { dom, codom } => self.contains(*dom, other) || self.contains(*codom, other),
            Ty::Forall { body, .. } => self.contains(*body, other),
            Ty::App { applied, args } => {
                self.contains(*applied, other) || args.iter().any(|&a| self.contains(a, other))
            }
            _ => false,
        }
    }

    // ========================================================================
    // Substitution
    // ========================================================================

    /// Substitute type variables with concrete types.
    ///
    /// Structural shapes rebuild with substituted children and re-intern, so
    /// the result participates in identity comparison for free. A variable
    /// absent from the map is returned unchanged. Quantifiers drop their own
    /// binders from the map; binder ids are globally fresh, so capture
    /// cannot occur.
    pub fn substitute(&mut self, ty: TypeId, map: &FxHashMap<TypeVarId, TypeId>) -> TypeId {
        if map.is_empty() {
            return ty;
        }

        match self.get(ty).clone() {
            Ty::Var(v) => map.get(&v).copied().unwrap_or(ty),

            Ty::Tuple(elems) => {
                let new_elems: TypeIdVec =
                    elems.iter().map(|&e| self.substitute(e, map)).collect();
                self.tuple(new_elems)
            }

            Ty::SizedArray { elem, len, simd } => {
                let new_elem = self.substitute(elem, map);
                self.sized_array(new_elem, len, simd)
            }

            Ty::UnsizedArray(elem) => {
                let new_elem = self.substitute(elem, map);
                self.unsized_array(new_elem)
            }

            Ty::Ptr {
                pointee,
                is_mut,
                addr_space,
            } => {
                let new_pointee = self.substitute(pointee, map);
                self.ptr(new_pointee, is_mut, addr_space)
            }

            Ty::Ref {
                pointee,
                is_mut,
                addr_space,
            } => {
                let new_pointee = self.substitute(pointee, map);
                self.ref_(new_pointee, is_mut, addr_space)
            }

            Ty::Fn { dom, codom } => {
                let new_dom = self.substitute(dom, map);
                let new_codom = self.substitute(codom, map);
                self.fn_(new_dom, new_codom)
            }

            Ty::App { applied, args } => {
                let new_args: TypeIdVec = args.iter().map(|&a| self.substitute(a, map)).collect();
                self.type_app(applied, new_args)
            }

            Ty::Forall { decl, vars, body } => {
                let inner: FxHashMap<TypeVarId, TypeId> = map
                    .iter()
                    .filter(|&(v, _)| !vars.contains(v))
                    .map(|(&v, &t)| (v, t))
                    .collect();
                let new_body = self.substitute(body, &inner);
                self.forall(decl, vars, new_body)
            }

            // Leaves and nominal types have no substitutable parts
            Ty::Prim(_)
            | Ty::NoRet
            | Ty::Bottom
            | Ty::Top
            | Ty::Error
            | Ty::Struct(_)
            | Ty::Enum(_)
            | Ty::Trait(_)
            | Ty::Impl(_)
            | Ty::Mod(_)
            | Ty::Alias(_) => ty,
        }
    }
}

impl Default for TypeArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn type_id_size() {
        assert_eq!(size_of::<TypeId>(), 4);
    }

    #[test]
    fn error_is_at_index_zero() {
        let arena = TypeArena::new();
        assert_eq!(arena.error().0, 0);
        assert!(arena.is_error(arena.error()));
        assert!(!arena.is_error(arena.bool_()));
    }

    #[test]
    fn interning_deduplicates() {
        let mut arena = TypeArena::new();
        let i32_ = arena.prim(PrimType::I32);
        let a = arena.tuple(smallvec![i32_, i32_]);
        let b = arena.tuple(smallvec![i32_, i32_]);
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_decls_make_distinct_types() {
        let mut arena = TypeArena::new();
        let a = arena.struct_(DeclId(1));
        let b = arena.struct_(DeclId(2));
        assert_ne!(a, b);
        assert_eq!(arena.struct_(DeclId(1)), a);
    }

    #[test]
    fn unit_is_the_empty_tuple() {
        let mut arena = TypeArena::new();
        let unit = arena.tuple(TypeIdVec::new());
        assert_eq!(unit, arena.unit());
    }

    #[test]
    fn cn_is_fn_to_no_ret() {
        let mut arena = TypeArena::new();
        let i32_ = arena.prim(PrimType::I32);
        let cn = arena.cn(i32_);
        assert_eq!(arena.as_fn(cn), Some((i32_, arena.no_ret())));
    }

    #[test]
    fn bare_application_is_the_type_itself() {
        let mut arena = TypeArena::new();
        let st = arena.struct_(DeclId(3));
        assert_eq!(arena.type_app(st, TypeIdVec::new()), st);
    }

    #[test]
    fn alias_application_expands() {
        let mut arena = TypeArena::new();
        let t = TypeVarId(0);
        let t_ty = arena.type_var(t);
        let pair = arena.tuple(smallvec![t_ty, t_ty]);
        let alias = arena.alias(DeclId(4));
        arena.define_alias(DeclId(4), smallvec![t], pair);

        let i32_ = arena.prim(PrimType::I32);
        let applied = arena.type_app(alias, smallvec![i32_]);
        let expected = arena.tuple(smallvec![i32_, i32_]);
        assert_eq!(applied, expected);
        assert!(!arena.contains(applied, alias));
    }

    #[test]
    fn alias_arity_mismatch_is_error() {
        let mut arena = TypeArena::new();
        let alias = arena.alias(DeclId(5));
        let body = arena.bool_();
        arena.define_alias(DeclId(5), TypeVarVec::new(), body);
        let i32_ = arena.prim(PrimType::I32);
        let bad = arena.type_app(alias, smallvec![i32_]);
        assert!(arena.is_error(bad));
    }

    #[test]
    fn contains_is_reflexive_and_structural() {
        let mut arena = TypeArena::new();
        let i32_ = arena.prim(PrimType::I32);
        let bool_ = arena.bool_();
        let f = arena.fn_(i32_, bool_);
        assert!(arena.contains(f, f));
        assert!(arena.contains(f, i32_));
        assert!(arena.contains(f, bool_));
        assert!(!arena.contains(i32_, f));
    }

    #[test]
    fn contains_stops_at_nominal_types() {
        let mut arena = TypeArena::new();
        let st = arena.struct_(DeclId(6));
        let i32_ = arena.prim(PrimType::I32);
        // Struct members are reached through the AST, not through contains.
        assert!(!arena.contains(st, i32_));
        let app = arena.type_app(st, smallvec![i32_]);
        assert!(arena.contains(app, i32_));
        assert!(arena.contains(app, st));
    }

    #[test]
    fn substitute_empty_is_identity() {
        let mut arena = TypeArena::new();
        let i32_ = arena.prim(PrimType::I32);
        let arr = arena.unsized_array(i32_);
        let empty = FxHashMap::default();
        assert_eq!(arena.substitute(arr, &empty), arr);
    }

    #[test]
    fn substitute_rebuilds_and_reinterns() {
        let mut arena = TypeArena::new();
        let v = TypeVarId(9);
        let v_ty = arena.type_var(v);
        let i32_ = arena.prim(PrimType::I32);
        let f = arena.fn_(v_ty, v_ty);

        let mut map = FxHashMap::default();
        map.insert(v, i32_);
        let result = arena.substitute(f, &map);
        let direct = arena.fn_(i32_, i32_);
        assert_eq!(result, direct);
    }

    #[test]
    fn substitute_missing_var_unchanged() {
        let mut arena = TypeArena::new();
        let v_ty = arena.type_var(TypeVarId(10));
        let mut map = FxHashMap::default();
        map.insert(TypeVarId(11), arena.bool_());
        assert_eq!(arena.substitute(v_ty, &map), v_ty);
    }

    #[test]
    fn substitute_respects_quantifier_binders() {
        let mut arena = TypeArena::new();
        let t = TypeVarId(12);
        let t_ty = arena.type_var(t);
        let body = arena.fn_(t_ty, t_ty);
        let forall = arena.forall(DeclId(7), smallvec![t], body);

        let mut map = FxHashMap::default();
        map.insert(t, arena.bool_());
        // T is bound by the quantifier; the substitution must not reach it.
        assert_eq!(arena.substitute(forall, &map), forall);
    }

    #[test]
    fn substitute_under_quantifier_reaches_free_vars() {
        let mut arena = TypeArena::new();
        let t = TypeVarId(13);
        let u = TypeVarId(14);
        let t_ty = arena.type_var(t);
        let u_ty = arena.type_var(u);
        let body = arena.fn_(t_ty, u_ty);
        let forall = arena.forall(DeclId(8), smallvec![t], body);

        let mut map = FxHashMap::default();
        map.insert(u, arena.bool_());
        let result = arena.substitute(forall, &map);
        let bool_ = arena.bool_();
        let new_body = arena.fn_(t_ty, bool_);
        let expected = arena.forall(DeclId(8), smallvec![t], new_body);
        assert_eq!(result, expected);
        assert_ne!(result, forall);
    }

    #[test]
    fn app_substitution_goes_through_type_app() {
        let mut arena = TypeArena::new();
        let st = arena.struct_(DeclId(9));
        let v = TypeVarId(15);
        let v_ty = arena.type_var(v);
        let app = arena.type_app(st, smallvec![v_ty]);

        let mut map = FxHashMap::default();
        map.insert(v, arena.bool_());
        let result = arena.substitute(app, &map);
        let bool_ = arena.bool_();
        let expected = arena.type_app(st, smallvec![bool_]);
        assert_eq!(result, expected);
    }
}
