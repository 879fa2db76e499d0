// src/sema/bounds.rs
//
// Lower/upper bound collection for inference variables.
//
// One BoundsCtx lives for one inference scope (a function body). Posting a
// subtype obligation walks the two types together; every tracked variable
// met on the way tightens its bounds, and var-free leaves are checked
// against the subtype relation directly. At scope exit each variable
// collapses to a concrete type and the caller rewrites everything the
// scope recorded.

use rustc_hash::FxHashMap;

use crate::frontend::{Span, TypeVarId};
use crate::sema::subtype::{is_subtype, join, meet};
use crate::sema::type_arena::{Ty, TypeArena, TypeId};

/// A pair of bounds for one inference variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeBounds {
    pub lower: TypeId,
    pub upper: TypeId,
}

impl TypeBounds {
    /// The unconstrained bounds `(Bottom, Top)`.
    pub fn unconstrained(arena: &TypeArena) -> Self {
        Self {
            lower: arena.bottom(),
            upper: arena.top(),
        }
    }

    /// Combine two bounds: the new lower is the one that is a supertype of
    /// the other (else Top), the new upper the one that is a subtype of the
    /// other (else Bottom).
    pub fn meet(self, arena: &TypeArena, other: TypeBounds) -> TypeBounds {
        TypeBounds {
            lower: join(arena, self.lower, other.lower),
            upper: meet(arena, self.upper, other.upper),
        }
    }

    pub fn is_consistent(self, arena: &TypeArena) -> bool {
        is_subtype(arena, self.lower, self.upper)
    }
}

/// Result of collapsing one variable at scope exit.
#[derive(Debug, Clone, Copy)]
pub enum Collapsed {
    /// The variable resolved to this type.
    Resolved(TypeId),
    /// Lower and upper bounds disagree.
    Inconsistent { lower: TypeId, upper: TypeId },
    /// Nothing constrained the variable.
    Unconstrained,
}

/// Bounds for every inference variable of one scope.
#[derive(Debug, Default)]
pub struct BoundsCtx {
    bounds: FxHashMap<TypeVarId, TypeBounds>,
    spans: FxHashMap<TypeVarId, Span>,
    /// Introduction order, for deterministic collapse.
    order: Vec<TypeVarId>,
}

/// A structural mismatch found while descending an obligation.
#[derive(Debug, Clone, Copy)]
pub struct BoundsMismatch {
    pub sub: TypeId,
    pub sup: TypeId,
}

impl BoundsCtx {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a fresh inference variable introduced at `span`.
    pub fn introduce(&mut self, arena: &TypeArena, var: TypeVarId, span: Span) {
        self.bounds.insert(var, TypeBounds::unconstrained(arena));
        self.spans.insert(var, span);
        self.order.push(var);
    }

    pub fn is_tracked(&self, var: TypeVarId) -> bool {
        self.bounds.contains_key(&var)
    }

    pub fn span_of(&self, var: TypeVarId) -> Option<Span> {
        self.spans.get(&var).copied()
    }

    /// Whether `ty` mentions a variable this scope tracks.
    pub fn mentions_tracked_var(&self, arena: &TypeArena, ty: TypeId) -> bool {
        match arena.get(ty) {
            Ty::Var(v) => self.is_tracked(*v),
            Ty::Tuple(elems) => elems.iter().any(|&e| self.mentions_tracked_var(arena, e)),
            Ty::SizedArray { elem, .. } | Ty::UnsizedArray(elem) => {
                self.mentions_tracked_var(arena, *elem)
            }
            Ty::Ptr { pointee, .. } | Ty::Ref { pointee, .. } => {
                self.mentions_tracked_var(arena, *pointee)
            }
            Ty::Fn { dom, codom } => {
                self.mentions_tracked_var(arena, *dom) || self.mentions_tracked_var(arena, *codom)
            }
            Ty::Forall { body, .. } => self.mentions_tracked_var(arena, *body),
            Ty::App { args, .. } => args.iter().any(|&a| self.mentions_tracked_var(arena, a)),
            _ => false,
        }
    }

    fn raise_lower(&mut self, arena: &TypeArena, var: TypeVarId, ty: TypeId) {
        let current = self.bounds[&var];
        let tightened = current.meet(
            arena,
            TypeBounds {
                lower: ty,
                upper: arena.top(),
            },
        );
        self.bounds.insert(var, tightened);
    }

    fn lower_upper(&mut self, arena: &TypeArena, var: TypeVarId, ty: TypeId) {
        let current = self.bounds[&var];
        let tightened = current.meet(
            arena,
            TypeBounds {
                lower: arena.bottom(),
                upper: ty,
            },
        );
        self.bounds.insert(var, tightened);
    }

    /// Post the obligation `sub <: sup`, tightening the bounds of every
    /// tracked variable either side mentions. Var-free parts are checked
    /// directly; a structural disagreement is returned as a mismatch for
    /// the caller to report.
    pub fn post(
        &mut self,
        arena: &TypeArena,
        sub: TypeId,
        sup: TypeId,
    ) -> Result<(), BoundsMismatch> {
        if sub == sup {
            return Ok(());
        }

        let tracked = |ty: TypeId| match arena.get(ty) {
            Ty::Var(v) if self.is_tracked(*v) => Some(*v),
            _ => None,
        };

        match (tracked(sub), tracked(sup)) {
            (Some(l), Some(r)) => {
                // Two inference variables: bound each against the other's
                // current opposite bound.
                let l_lower = self.bounds[&l].lower;
                let r_upper = self.bounds[&r].upper;
                self.lower_upper(arena, l, r_upper);
                self.raise_lower(arena, r, l_lower);
                Ok(())
            }
            (Some(v), None) => {
                self.lower_upper(arena, v, sup);
                Ok(())
            }
            (None, Some(v)) => {
                self.raise_lower(arena, v, sub);
                Ok(())
            }
            (None, None) => self.descend(arena, sub, sup),
        }
    }

    fn descend(
        &mut self,
        arena: &TypeArena,
        sub: TypeId,
        sup: TypeId,
    ) -> Result<(), BoundsMismatch> {
        // No tracked variables anywhere: the subtype relation decides.
        if !self.mentions_tracked_var(arena, sub) && !self.mentions_tracked_var(arena, sup) {
            return if is_subtype(arena, sub, sup) {
                Ok(())
            } else {
                Err(BoundsMismatch { sub, sup })
            };
        }

        let mismatch = BoundsMismatch { sub, sup };
        match (arena.get(sub).clone(), arena.get(sup).clone()) {
            (Ty::Tuple(a), Ty::Tuple(b)) if a.len() == b.len() => {
                for (&x, &y) in a.iter().zip(b.iter()) {
                    self.post(arena, x, y)?;
                }
                Ok(())
            }
            (
                Ty::SizedArray {
                    elem: a,
                    len: la,
                    simd: sa,
                },
                Ty::SizedArray {
                    elem: b,
                    len: lb,
                    simd: sb,
                },
            ) if la == lb && sa == sb => self.post(arena, a, b),
            (Ty::UnsizedArray(a), Ty::UnsizedArray(b)) => self.post(arena, a, b),
            (
                Ty::Ref {
                    pointee: a,
                    is_mut: ma,
                    addr_space: sa,
                },
                Ty::Ref {
                    pointee: b,
                    is_mut: mb,
                    addr_space: sb,
                },
            ) if sa == sb && (ma || !mb) => self.post(arena, a, b),
            // Raw pointers are invariant: the subtype relation only accepts
            // interned-identical pointers, so the bounds engine must not
            // descend into their pointees.
            (
                Ty::Ptr {
                    pointee: pa,
                    is_mut: ma,
                    addr_space: sa,
                },
                Ty::Ptr {
                    pointee: pb,
                    is_mut: mb,
                    addr_space: sb,
                },
            ) if sa == sb && ma == mb && pa == pb => Ok(()),
            (
                Ty::Fn {
                    dom: da,
                    codom: ca,
                },
                Ty::Fn {
                    dom: db,
                    codom: cb,
                },
            ) => {
                // Contravariant domain: the obligation flips.
                self.post(arena, db, da)?;
                self.post(arena, ca, cb)
            }
            (
                Ty::App {
                    applied: ha,
                    args: aa,
                },
                Ty::App {
                    applied: hb,
                    args: ab,
                },
            ) if ha == hb && aa.len() == ab.len() => {
                for (&x, &y) in aa.iter().zip(ab.iter()) {
                    self.post(arena, x, y)?;
                }
                Ok(())
            }
            _ => Err(mismatch),
        }
    }

    /// Collapse every variable in introduction order: the lower bound if
    /// one exists and the bounds are consistent, else the upper bound,
    /// else Top.
    pub fn collapse(&self, arena: &TypeArena) -> Vec<(TypeVarId, Collapsed)> {
        self.order
            .iter()
            .map(|&var| {
                let bounds = self.bounds[&var];
                let result = if !bounds.is_consistent(arena) {
                    Collapsed::Inconsistent {
                        lower: bounds.lower,
                        upper: bounds.upper,
                    }
                } else if bounds.lower != arena.bottom() {
                    Collapsed::Resolved(bounds.lower)
                } else if bounds.upper != arena.top() {
                    Collapsed::Resolved(bounds.upper)
                } else {
                    Collapsed::Unconstrained
                };
                (var, result)
            })
            .collect()
    }

    pub fn bounds_of(&self, var: TypeVarId) -> Option<TypeBounds> {
        self.bounds.get(&var).copied()
    }
}
