// src/sema/query.rs
//
// Derived analyses over canonical types: order, variance, and sizedness.
// The back-end consults order and sizedness to pick representations; the
// checker uses sizedness to reject infinitely-sized recursive types
// without indirection.
//
// Nominal complex types are walked through their registered member types
// with an in-progress set, so cycles terminate.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::frontend::{DeclId, TypeVarId};
use crate::sema::entity_registry::EntityRegistry;
use crate::sema::type_arena::{Ty, TypeArena, TypeId};

/// Direction in which a type parameter's subtyping flows through a
/// constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variance {
    Covariant,
    Contravariant,
    Invariant,
}

/// Substituted member types of a nominal application, or the plain members
/// for a bare nominal type.
fn instantiated_members(
    arena: &mut TypeArena,
    defs: &EntityRegistry,
    decl: DeclId,
    args: &[TypeId],
) -> Vec<TypeId> {
    let members: Vec<TypeId> = defs.member_types(decl).to_vec();
    if args.is_empty() {
        return members;
    }
    let map: FxHashMap<TypeVarId, TypeId> = defs
        .type_params(decl)
        .iter()
        .copied()
        .zip(args.iter().copied())
        .collect();
    members
        .into_iter()
        .map(|m| arena.substitute(m, &map))
        .collect()
}

/// Syntactic nesting depth of function arrows. First-class types are
/// order 0.
pub fn order(arena: &mut TypeArena, defs: &EntityRegistry, ty: TypeId) -> u32 {
    order_rec(arena, defs, ty, &mut FxHashSet::default())
}

fn order_rec(
    arena: &mut TypeArena,
    defs: &EntityRegistry,
    ty: TypeId,
    seen: &mut FxHashSet<DeclId>,
) -> u32 {
    match arena.get(ty).clone() {
        Ty::Fn { dom, codom } => {
            1 + order_rec(arena, defs, dom, seen).max(order_rec(arena, defs, codom, seen))
        }
        Ty::Tuple(elems) => elems
            .iter()
            .map(|&e| order_rec(arena, defs, e, seen))
            .max()
            .unwrap_or(0),
        Ty::SizedArray { elem, .. } | Ty::UnsizedArray(elem) => order_rec(arena, defs, elem, seen),
        Ty::Ptr { pointee, .. } | Ty::Ref { pointee, .. } => order_rec(arena, defs, pointee, seen),
        Ty::Forall { body, .. } => order_rec(arena, defs, body, seen),
        Ty::Struct(decl) | Ty::Enum(decl) => nominal_order(arena, defs, decl, &[], seen),
        Ty::Trait(decl) => {
            if !seen.insert(decl) {
                return 0;
            }
            let methods: Vec<TypeId> = defs.member_types(decl).to_vec();
            let result = methods
                .into_iter()
                .map(|m| order_rec(arena, defs, m, seen))
                .max()
                .unwrap_or(0);
            seen.remove(&decl);
            result
        }
        Ty::App { applied, args } => match arena.get(applied).clone() {
            Ty::Struct(decl) | Ty::Enum(decl) => nominal_order(arena, defs, decl, &args, seen),
            _ => args
                .iter()
                .map(|&a| order_rec(arena, defs, a, seen))
                .max()
                .unwrap_or(0),
        },
        _ => 0,
    }
}

fn nominal_order(
    arena: &mut TypeArena,
    defs: &EntityRegistry,
    decl: DeclId,
    args: &[TypeId],
    seen: &mut FxHashSet<DeclId>,
) -> u32 {
    if !seen.insert(decl) {
        return 0;
    }
    let members = instantiated_members(arena, defs, decl, args);
    let result = members
        .into_iter()
        .map(|m| order_rec(arena, defs, m, seen))
        .max()
        .unwrap_or(0);
    seen.remove(&decl);
    result
}

/// How each type variable appears in `ty`, starting in the given direction
/// (`covariant = true`). A variable appearing in both directions is
/// invariant.
pub fn variance(arena: &TypeArena, ty: TypeId, covariant: bool) -> FxHashMap<TypeVarId, Variance> {
    let mut out = FxHashMap::default();
    variance_rec(arena, ty, covariant, &mut out);
    out
}

fn variance_rec(
    arena: &TypeArena,
    ty: TypeId,
    covariant: bool,
    out: &mut FxHashMap<TypeVarId, Variance>,
) {
    match arena.get(ty) {
        Ty::Var(v) => {
            let this = if covariant {
                Variance::Covariant
            } else {
                Variance::Contravariant
            };
            out.entry(*v)
                .and_modify(|existing| {
                    if *existing != this {
                        *existing = Variance::Invariant;
                    }
                })
                .or_insert(this);
        }
        Ty::Tuple(elems) => {
            for &e in elems {
                variance_rec(arena, e, covariant, out);
            }
        }
        Ty::SizedArray { elem, .. } | Ty::UnsizedArray(elem) => {
            variance_rec(arena, *elem, covariant, out);
        }
        Ty::Ptr { pointee, .. } | Ty::Ref { pointee, .. } => {
            variance_rec(arena, *pointee, covariant, out);
        }
        Ty::Fn { dom, codom } => {
            // Function domains flip direction.
            variance_rec(arena, *dom, !covariant, out);
            variance_rec(arena, *codom, covariant, out);
        }
        Ty::Forall { vars, body, .. } => {
            variance_rec(arena, *body, covariant, out);
            for v in vars {
                out.remove(v);
            }
        }
        Ty::App { args, .. } => {
            for &a in args {
                variance_rec(arena, a, covariant, out);
            }
        }
        _ => {}
    }
}

/// Whether values of `ty` have a size known without indirection. A nominal
/// type reaching itself through its members while being walked is unsized;
/// this is what rejects infinitely-sized recursive types.
pub fn is_sized(arena: &mut TypeArena, defs: &EntityRegistry, ty: TypeId) -> bool {
    sized_rec(arena, defs, ty, &mut FxHashSet::default())
}

fn sized_rec(
    arena: &mut TypeArena,
    defs: &EntityRegistry,
    ty: TypeId,
    walking: &mut FxHashSet<DeclId>,
) -> bool {
    match arena.get(ty).clone() {
        Ty::UnsizedArray(_) => false,
        Ty::Prim(_) | Ty::Ptr { .. } | Ty::Ref { .. } => true,
        Ty::Tuple(elems) => elems.iter().all(|&e| sized_rec(arena, defs, e, walking)),
        Ty::SizedArray { elem, .. } => sized_rec(arena, defs, elem, walking),
        Ty::Fn { dom, codom } => {
            sized_rec(arena, defs, dom, walking) && sized_rec(arena, defs, codom, walking)
        }
        Ty::Forall { body, .. } => sized_rec(arena, defs, body, walking),
        Ty::Struct(decl) | Ty::Enum(decl) => nominal_sized(arena, defs, decl, &[], walking),
        Ty::App { applied, args } => match arena.get(applied).clone() {
            Ty::Struct(decl) | Ty::Enum(decl) => nominal_sized(arena, defs, decl, &args, walking),
            _ => true,
        },
        // Vars are assumed sized; the rest never reaches layout.
        _ => true,
    }
}

fn nominal_sized(
    arena: &mut TypeArena,
    defs: &EntityRegistry,
    decl: DeclId,
    args: &[TypeId],
    walking: &mut FxHashSet<DeclId>,
) -> bool {
    if !walking.insert(decl) {
        // Self-reference without indirection.
        return false;
    }
    let members = instantiated_members(arena, defs, decl, args);
    let result = members
        .into_iter()
        .all(|m| sized_rec(arena, defs, m, walking));
    walking.remove(&decl);
    result
}
