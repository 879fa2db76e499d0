// src/sema/subtype.rs
//
// The subtype relation and the join/meet it induces on the bounded lattice
// with Top and Bottom as extrema. Pure functions over interned ids; the
// arena is never mutated, so join/meet can hand back the pre-interned
// extrema.
//
// Pointer targets never compose: `&&T <: &T` does not hold. Three guards
// enforce that below: the implicit-deref rule skips reference supertypes,
// reference pointee covariance requires both pointees to be non-address
// types, and address-of introduction requires a non-address target pointee.

use crate::sema::type_arena::{Ty, TypeArena, TypeId};

fn is_addr(ty: &Ty) -> bool {
    matches!(ty, Ty::Ref { .. } | Ty::Ptr { .. })
}

/// `&[T * N]` coerces to `&[T]` when the sized array is not SIMD.
fn sized_to_unsized(arena: &TypeArena, from: TypeId, to: TypeId) -> bool {
    if let (
        Ty::SizedArray {
            elem: from_elem,
            simd: false,
            ..
        },
        Ty::UnsizedArray(to_elem),
    ) = (arena.get(from), arena.get(to))
    {
        from_elem == to_elem
    } else {
        false
    }
}

/// Whether `a <: b`.
pub fn is_subtype(arena: &TypeArena, a: TypeId, b: TypeId) -> bool {
    if a == b {
        return true;
    }
    let (ta, tb) = (arena.get(a), arena.get(b));
    // The error sentinel relates to everything, in both directions.
    if matches!(ta, Ty::Bottom | Ty::Error) || matches!(tb, Ty::Top | Ty::Error) {
        return true;
    }

    match (ta, tb) {
        (
            Ty::Ref {
                pointee: pa,
                addr_space: sa,
                ..
            },
            Ty::Ref {
                pointee: pb,
                is_mut: mb,
                addr_space: sb,
            },
        ) => {
            // Mutability is a subtype of immutability; a mutable target
            // needs identical references, which reflexivity already covers.
            if sa != sb || *mb {
                return false;
            }
            if pa == pb || sized_to_unsized(arena, *pa, *pb) {
                return true;
            }
            !is_addr(arena.get(*pa)) && !is_addr(arena.get(*pb)) && is_subtype(arena, *pa, *pb)
        }

        // Implicit dereference: a reference can stand in for its pointee.
        // Not taken when the supertype is itself a reference (handled above)
        // so that reference nesting never collapses.
        (Ty::Ref { pointee, .. }, _) => is_subtype(arena, *pointee, b),

        (
            Ty::SizedArray {
                elem, simd: false, ..
            },
            Ty::Ref {
                pointee,
                is_mut: false,
                addr_space: 0,
            },
        ) if matches!(arena.get(*pointee), Ty::UnsizedArray(to_elem) if to_elem == elem) => true,

        // Address-of introduction, immutable target only; the target
        // pointee must not itself be an address type.
        (
            _,
            Ty::Ref {
                pointee,
                is_mut: false,
                ..
            },
        ) => !is_addr(arena.get(*pointee)) && is_subtype(arena, a, *pointee),

        (Ty::Tuple(ea), Ty::Tuple(eb)) => {
            ea.len() == eb.len()
                && ea
                    .iter()
                    .zip(eb.iter())
                    .all(|(&x, &y)| is_subtype(arena, x, y))
        }

        // Contravariant in the domain, covariant in the codomain.
        (
            Ty::Fn {
                dom: da,
                codom: ca,
            },
            Ty::Fn {
                dom: db,
                codom: cb,
            },
        ) => is_subtype(arena, *db, *da) && is_subtype(arena, *ca, *cb),

        _ => false,
    }
}

/// Least upper bound under `is_subtype`; `Top` when the types are
/// unrelated.
pub fn join(arena: &TypeArena, a: TypeId, b: TypeId) -> TypeId {
    if is_subtype(arena, a, b) {
        b
    } else if is_subtype(arena, b, a) {
        a
    } else {
        arena.top()
    }
}

/// Greatest lower bound under `is_subtype`; `Bottom` when the types are
/// unrelated.
pub fn meet(arena: &TypeArena, a: TypeId, b: TypeId) -> TypeId {
    if is_subtype(arena, a, b) {
        a
    } else if is_subtype(arena, b, a) {
        b
    } else {
        arena.bottom()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::PrimType;
    use smallvec::smallvec;

    fn arena() -> TypeArena {
        TypeArena::new()
    }

    #[test]
    fn reflexive_and_extrema() {
        let mut arena = arena();
        let i32_ = arena.prim(PrimType::I32);
        assert!(is_subtype(&arena, i32_, i32_));
        assert!(is_subtype(&arena, arena.bottom(), i32_));
        assert!(is_subtype(&arena, i32_, arena.top()));
        assert!(!is_subtype(&arena, arena.top(), i32_));
        assert!(!is_subtype(&arena, i32_, arena.bottom()));
    }

    #[test]
    fn error_relates_both_ways() {
        let mut arena = arena();
        let i32_ = arena.prim(PrimType::I32);
        assert!(is_subtype(&arena, arena.error(), i32_));
        assert!(is_subtype(&arena, i32_, arena.error()));
    }

    #[test]
    fn mut_ref_below_immutable_ref() {
        let mut arena = arena();
        let i32_ = arena.prim(PrimType::I32);
        let ref_mut = arena.ref_(i32_, true, 0);
        let ref_imm = arena.ref_(i32_, false, 0);
        assert!(is_subtype(&arena, ref_mut, ref_imm));
        assert!(!is_subtype(&arena, ref_imm, ref_mut));
    }

    #[test]
    fn ref_subtyping_requires_same_address_space() {
        let mut arena = arena();
        let i32_ = arena.prim(PrimType::I32);
        let in_zero = arena.ref_(i32_, false, 0);
        let in_one = arena.ref_(i32_, false, 1);
        assert!(!is_subtype(&arena, in_zero, in_one));
        assert!(!is_subtype(&arena, in_one, in_zero));
    }

    #[test]
    fn implicit_deref() {
        let mut arena = arena();
        let i32_ = arena.prim(PrimType::I32);
        let r = arena.ref_(i32_, false, 0);
        let rm = arena.ref_(i32_, true, 0);
        assert!(is_subtype(&arena, r, i32_));
        assert!(is_subtype(&arena, rm, i32_));
    }

    #[test]
    fn address_of_introduction_immutable_only() {
        let mut arena = arena();
        let i32_ = arena.prim(PrimType::I32);
        let r = arena.ref_(i32_, false, 0);
        let rm = arena.ref_(i32_, true, 0);
        assert!(is_subtype(&arena, i32_, r));
        assert!(!is_subtype(&arena, i32_, rm));
    }

    #[test]
    fn reference_nesting_never_collapses() {
        let mut arena = arena();
        let i32_ = arena.prim(PrimType::I32);
        let r = arena.ref_(i32_, false, 0);
        let rr = arena.ref_(r, false, 0);
        assert!(!is_subtype(&arena, rr, r));
        assert!(!is_subtype(&arena, r, rr));
    }

    #[test]
    fn sized_array_ref_coerces_to_slice_ref() {
        let mut arena = arena();
        let i32_ = arena.prim(PrimType::I32);
        let sized = arena.sized_array(i32_, 4, false);
        let unsized_ = arena.unsized_array(i32_);
        let ref_sized = arena.ref_(sized, false, 0);
        let ref_slice = arena.ref_(unsized_, false, 0);
        assert!(is_subtype(&arena, ref_sized, ref_slice));
        assert!(!is_subtype(&arena, ref_slice, ref_sized));
    }

    #[test]
    fn simd_arrays_do_not_coerce() {
        let mut arena = arena();
        let i32_ = arena.prim(PrimType::I32);
        let simd = arena.sized_array(i32_, 4, true);
        let unsized_ = arena.unsized_array(i32_);
        let ref_simd = arena.ref_(simd, false, 0);
        let ref_slice = arena.ref_(unsized_, false, 0);
        assert!(!is_subtype(&arena, ref_simd, ref_slice));
        assert!(!is_subtype(&arena, simd, ref_slice));
    }

    #[test]
    fn sized_array_coerces_to_slice_ref_in_space_zero() {
        let mut arena = arena();
        let i32_ = arena.prim(PrimType::I32);
        let sized = arena.sized_array(i32_, 4, false);
        let unsized_ = arena.unsized_array(i32_);
        let ref_slice = arena.ref_(unsized_, false, 0);
        let ref_slice_one = arena.ref_(unsized_, false, 1);
        assert!(is_subtype(&arena, sized, ref_slice));
        assert!(!is_subtype(&arena, sized, ref_slice_one));
    }

    #[test]
    fn tuples_componentwise() {
        let mut arena = arena();
        let i32_ = arena.prim(PrimType::I32);
        let bot = arena.bottom();
        let top = arena.top();
        let lo = arena.tuple(smallvec![bot, i32_]);
        let hi = arena.tuple(smallvec![i32_, top]);
        let wide = arena.tuple(smallvec![i32_, i32_, i32_]);
        assert!(is_subtype(&arena, lo, hi));
        assert!(!is_subtype(&arena, hi, lo));
        assert!(!is_subtype(&arena, lo, wide));
    }

    #[test]
    fn functions_contra_in_domain_co_in_codomain() {
        let mut arena = arena();
        let i32_ = arena.prim(PrimType::I32);
        let f32_ = arena.prim(PrimType::F32);
        let top = arena.top();
        let bot = arena.bottom();
        let general = arena.fn_(top, bot);
        let specific = arena.fn_(i32_, f32_);
        assert!(is_subtype(&arena, general, specific));
        assert!(!is_subtype(&arena, specific, general));
    }

    #[test]
    fn transitivity_spot_checks() {
        let mut arena = arena();
        let i32_ = arena.prim(PrimType::I32);
        let rm = arena.ref_(i32_, true, 0);
        let r = arena.ref_(i32_, false, 0);
        // &mut i32 <: &i32 <: i32, and the composite holds directly.
        assert!(is_subtype(&arena, rm, r));
        assert!(is_subtype(&arena, r, i32_));
        assert!(is_subtype(&arena, rm, i32_));
    }

    #[test]
    fn join_picks_the_supertype() {
        let mut arena = arena();
        let i32_ = arena.prim(PrimType::I32);
        let bool_ = arena.bool_();
        let bot = arena.bottom();
        assert_eq!(join(&arena, bot, i32_), i32_);
        assert_eq!(join(&arena, i32_, bot), i32_);
        assert_eq!(join(&arena, i32_, i32_), i32_);
        assert_eq!(join(&arena, i32_, bool_), arena.top());
    }

    #[test]
    fn join_is_commutative_and_upper() {
        let mut arena = arena();
        let i32_ = arena.prim(PrimType::I32);
        let rm = arena.ref_(i32_, true, 0);
        let r = arena.ref_(i32_, false, 0);
        let j = join(&arena, rm, r);
        assert_eq!(j, join(&arena, r, rm));
        assert!(is_subtype(&arena, rm, j));
        assert!(is_subtype(&arena, r, j));
    }

    #[test]
    fn meet_picks_the_subtype() {
        let mut arena = arena();
        let i32_ = arena.prim(PrimType::I32);
        let bool_ = arena.bool_();
        let rm = arena.ref_(i32_, true, 0);
        let r = arena.ref_(i32_, false, 0);
        assert_eq!(meet(&arena, rm, r), rm);
        assert_eq!(meet(&arena, i32_, bool_), arena.bottom());
    }
}
