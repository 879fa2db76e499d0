// src/sema/unify.rs
//
// First-order unification of an impl pattern against an obligation.
//
// The unifier is asymmetric: only variables on the `from` side bind.
// Callers pass the impl's declared type on the left and the target on the
// right, so this answers "does this impl pattern match this obligation?".
// No occurs check is needed: variables introduced by an impl are fresh
// relative to the obligation.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::frontend::TypeVarId;
use crate::sema::type_arena::{Ty, TypeArena, TypeId};

/// A partial substitution over type variables. Generic arity is small, so
/// bindings stay inline.
#[derive(Debug, Clone, Default)]
pub struct Subst {
    bindings: SmallVec<[(TypeVarId, TypeId); 4]>,
}

impl Subst {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, var: TypeVarId) -> Option<TypeId> {
        self.bindings
            .iter()
            .find(|(v, _)| *v == var)
            .map(|&(_, ty)| ty)
    }

    pub fn insert(&mut self, var: TypeVarId, ty: TypeId) {
        debug_assert!(self.get(var).is_none());
        self.bindings.push((var, ty));
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeVarId, TypeId)> {
        self.bindings.iter().copied()
    }

    /// Apply the substitution to a type.
    pub fn apply(&self, arena: &mut TypeArena, ty: TypeId) -> TypeId {
        if self.bindings.is_empty() {
            return ty;
        }
        let map: FxHashMap<TypeVarId, TypeId> = self.bindings.iter().copied().collect();
        arena.substitute(ty, &map)
    }
}

impl FromIterator<(TypeVarId, TypeId)> for Subst {
    fn from_iter<I: IntoIterator<Item = (TypeVarId, TypeId)>>(iter: I) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
        }
    }
}

/// Unify `from` against `to`, extending `subst` with bindings for
/// `from`-side variables. An already-bound variable must map to exactly
/// `to`; bindings are never rewritten. On failure `subst` may hold partial
/// bindings; callers start from a fresh substitution per candidate.
pub fn unify(arena: &TypeArena, from: TypeId, to: TypeId, subst: &mut Subst) -> bool {
    if from == to {
        return true;
    }
    match arena.get(from) {
        Ty::Var(v) => match subst.get(*v) {
            None => {
                subst.insert(*v, to);
                true
            }
            Some(bound) => bound == to,
        },
        Ty::Tuple(from_elems) => match arena.get(to) {
            Ty::Tuple(to_elems) if from_elems.len() == to_elems.len() => from_elems
                .clone()
                .iter()
                .zip(to_elems.clone().iter())
                .all(|(&f, &t)| unify(arena, f, t, subst)),
            _ => false,
        },
        Ty::App {
            applied: from_applied,
            args: from_args,
        } => match arena.get(to) {
            Ty::App {
                applied: to_applied,
                args: to_args,
            } if from_args.len() == to_args.len() => {
                let (fa, ta) = (*from_applied, *to_applied);
                let pairs: SmallVec<[(TypeId, TypeId); 4]> = from_args
                    .iter()
                    .copied()
                    .zip(to_args.iter().copied())
                    .collect();
                unify(arena, fa, ta, subst)
                    && pairs.iter().all(|&(f, t)| unify(arena, f, t, subst))
            }
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{DeclId, PrimType};
    use smallvec::smallvec;

    #[test]
    fn identical_types_unify_without_bindings() {
        let mut arena = TypeArena::new();
        let i32_ = arena.prim(PrimType::I32);
        let mut subst = Subst::new();
        assert!(unify(&arena, i32_, i32_, &mut subst));
        assert!(subst.is_empty());
    }

    #[test]
    fn variable_binds_to_target() {
        let mut arena = TypeArena::new();
        let x = TypeVarId(0);
        let x_ty = arena.type_var(x);
        let i32_ = arena.prim(PrimType::I32);
        let mut subst = Subst::new();
        assert!(unify(&arena, x_ty, i32_, &mut subst));
        assert_eq!(subst.get(x), Some(i32_));
    }

    #[test]
    fn tuple_pattern_binds_componentwise() {
        let mut arena = TypeArena::new();
        let x = TypeVarId(0);
        let y = TypeVarId(1);
        let x_ty = arena.type_var(x);
        let y_ty = arena.type_var(y);
        let pattern = arena.tuple(smallvec![x_ty, y_ty]);

        let i32_ = arena.prim(PrimType::I32);
        let bool_ = arena.bool_();
        let pair = arena.tuple(smallvec![bool_, bool_]);
        let target = arena.tuple(smallvec![i32_, pair]);

        let mut subst = Subst::new();
        assert!(unify(&arena, pattern, target, &mut subst));
        assert_eq!(subst.get(x), Some(i32_));
        assert_eq!(subst.get(y), Some(pair));
    }

    #[test]
    fn repeated_variable_must_match_its_binding() {
        let mut arena = TypeArena::new();
        let x = TypeVarId(0);
        let x_ty = arena.type_var(x);
        let pattern = arena.tuple(smallvec![x_ty, x_ty]);

        let i32_ = arena.prim(PrimType::I32);
        let bool_ = arena.bool_();
        let same = arena.tuple(smallvec![i32_, i32_]);
        let mixed = arena.tuple(smallvec![i32_, bool_]);

        let mut subst = Subst::new();
        assert!(unify(&arena, pattern, same, &mut subst));

        let mut subst = Subst::new();
        assert!(!unify(&arena, pattern, mixed, &mut subst));
    }

    #[test]
    fn only_from_side_variables_bind() {
        let mut arena = TypeArena::new();
        let x = TypeVarId(0);
        let x_ty = arena.type_var(x);
        let i32_ = arena.prim(PrimType::I32);
        let mut subst = Subst::new();
        // A variable on the `to` side is an opaque constant.
        assert!(!unify(&arena, i32_, x_ty, &mut subst));
    }

    #[test]
    fn applications_unify_head_and_arguments() {
        let mut arena = TypeArena::new();
        let tr = arena.trait_(DeclId(1));
        let other = arena.trait_(DeclId(2));
        let x = TypeVarId(0);
        let x_ty = arena.type_var(x);
        let i32_ = arena.prim(PrimType::I32);

        let pattern = arena.type_app(tr, smallvec![x_ty]);
        let target = arena.type_app(tr, smallvec![i32_]);
        let wrong_head = arena.type_app(other, smallvec![i32_]);

        let mut subst = Subst::new();
        assert!(unify(&arena, pattern, target, &mut subst));
        assert_eq!(subst.get(x), Some(i32_));

        let mut subst = Subst::new();
        assert!(!unify(&arena, pattern, wrong_head, &mut subst));
    }

    #[test]
    fn unifier_soundness_replace_gives_target() {
        let mut arena = TypeArena::new();
        let x = TypeVarId(0);
        let y = TypeVarId(1);
        let x_ty = arena.type_var(x);
        let y_ty = arena.type_var(y);
        let pattern = arena.tuple(smallvec![x_ty, y_ty]);

        let i32_ = arena.prim(PrimType::I32);
        let bool_ = arena.bool_();
        let target = arena.tuple(smallvec![i32_, bool_]);

        let mut subst = Subst::new();
        assert!(unify(&arena, pattern, target, &mut subst));
        assert_eq!(subst.apply(&mut arena, pattern), target);
    }

    #[test]
    fn arity_mismatch_fails() {
        let mut arena = TypeArena::new();
        let x = TypeVarId(0);
        let x_ty = arena.type_var(x);
        let i32_ = arena.prim(PrimType::I32);
        let pattern = arena.tuple(smallvec![x_ty]);
        let target = arena.tuple(smallvec![i32_, i32_]);
        let mut subst = Subst::new();
        assert!(!unify(&arena, pattern, target, &mut subst));
    }
}
