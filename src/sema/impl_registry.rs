// src/sema/impl_registry.rs
//
// Registry of trait impls and resolution of trait obligations.
//
// Impls are registered during the head pass, keyed by the lexical module
// containing them and the trait they implement; after that phase the map
// is read-only. Resolution walks the obligation site's enclosing
// declarations for a where-clause witness first (clauses shadow impls),
// then enclosing modules for candidate impls, recursively discharging each
// candidate's own where-clauses under the matching substitution.

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::frontend::{DeclId, DeclKind, Program};
use crate::sema::entity_registry::EntityRegistry;
use crate::sema::type_arena::{TypeArena, TypeId};
use crate::sema::unify::{Subst, unify};

/// Knobs for obligation resolution.
#[derive(Debug, Clone, Copy)]
pub struct ResolverOptions {
    /// Bound on recursive where-clause discharge. An impl whose clauses
    /// require themselves at the same instantiation would otherwise recurse
    /// forever; exhausting the bound fails that resolution branch.
    pub max_depth: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self { max_depth: 64 }
    }
}

/// How an obligation was discharged.
#[derive(Debug, Clone)]
pub enum ImplWitness {
    /// A where-clause of an enclosing declaration.
    Clause { owner: DeclId, index: usize },
    /// A registered impl, with the substitution that matched it.
    Impl { decl: DeclId, subst: Subst },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindImplError {
    /// The obligation is not a trait application.
    NotATrait,
    /// No impl or where-clause witnesses the obligation.
    NoImpl,
}

#[derive(Debug, Default)]
pub struct ImplRegistry {
    /// (enclosing module, trait) -> impls, in registration order.
    candidates: FxHashMap<(DeclId, DeclId), Vec<DeclId>>,
    options: ResolverOptions,
}

impl ImplRegistry {
    pub fn new(options: ResolverOptions) -> Self {
        Self {
            candidates: FxHashMap::default(),
            options,
        }
    }

    /// Key an impl by the trait it implements and the module containing it.
    pub fn register_impl(&mut self, module: DeclId, trait_: DeclId, impl_: DeclId) {
        trace!(%module, %trait_, %impl_, "registering impl");
        self.candidates
            .entry((module, trait_))
            .or_default()
            .push(impl_);
    }

    pub fn impls_for(&self, module: DeclId, trait_: DeclId) -> &[DeclId] {
        self.candidates
            .get(&(module, trait_))
            .map_or(&[], |v| v.as_slice())
    }

    /// Resolve `target` (a concrete trait application) from the lexical
    /// site `site`.
    pub fn find_impl(
        &self,
        program: &Program,
        defs: &EntityRegistry,
        arena: &mut TypeArena,
        site: DeclId,
        target: TypeId,
    ) -> Result<ImplWitness, FindImplError> {
        self.resolve(program, defs, arena, site, target, 0)
    }

    fn resolve(
        &self,
        program: &Program,
        defs: &EntityRegistry,
        arena: &mut TypeArena,
        site: DeclId,
        target: TypeId,
        depth: usize,
    ) -> Result<ImplWitness, FindImplError> {
        if depth > self.options.max_depth {
            trace!(depth, "obligation depth bound exceeded");
            return Err(FindImplError::NoImpl);
        }
        let Some(trait_) = arena.as_trait_app(target) else {
            return Err(FindImplError::NotATrait);
        };

        // Where-clauses of enclosing generic declarations shadow impls.
        for decl in program.ancestors(site) {
            for (index, &clause) in defs.where_clauses(decl.id).iter().enumerate() {
                if clause == target {
                    trace!(owner = %decl.id, index, "obligation witnessed by where-clause");
                    return Ok(ImplWitness::Clause {
                        owner: decl.id,
                        index,
                    });
                }
            }
        }

        // Candidate impls of enclosing modules, innermost first.
        let modules: Vec<DeclId> = program
            .ancestors(site)
            .filter(|d| matches!(d.kind, DeclKind::Mod(_)))
            .map(|d| d.id)
            .collect();
        for module in modules {
            let impls: Vec<DeclId> = self.impls_for(module, trait_).to_vec();
            for impl_ in impls {
                let Some(pattern) = defs.impl_target(impl_) else {
                    continue;
                };
                let mut subst = Subst::new();
                if !unify(arena, pattern, target, &mut subst) {
                    continue;
                }
                // Discharge the impl's own obligations under the match.
                let clauses: Vec<TypeId> = defs.where_clauses(impl_).to_vec();
                let discharged = clauses.into_iter().all(|clause| {
                    let instantiated = subst.apply(arena, clause);
                    self.resolve(program, defs, arena, impl_, instantiated, depth + 1)
                        .is_ok()
                });
                if discharged {
                    trace!(%impl_, "obligation witnessed by impl");
                    return Ok(ImplWitness::Impl { decl: impl_, subst });
                }
            }
        }

        trace!("no impl found");
        Err(FindImplError::NoImpl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{
        DeclKind, FnDecl, ImplDecl, ModDecl, PrimType, Program, Span, Symbol, TraitDecl, TypeExpr,
        TypeExprKind,
    };
    use smallvec::smallvec;

    fn dummy_type_expr() -> TypeExpr {
        TypeExpr::new(TypeExprKind::Error, Span::default())
    }

    struct Fixture {
        program: Program,
        arena: TypeArena,
        defs: EntityRegistry,
        trait_decl: DeclId,
        trait_ty: TypeId,
    }

    /// A program with a root module and a `Show` trait over one parameter.
    fn fixture() -> Fixture {
        let mut program = Program::new(Symbol(0));
        let root = program.root();
        let trait_decl = program.add_decl(
            root,
            Symbol(1),
            DeclKind::Trait(TraitDecl {
                type_params: vec![],
                methods: vec![],
            }),
            Span::default(),
        );
        let mut arena = TypeArena::new();
        let trait_ty = arena.trait_(trait_decl);
        Fixture {
            program,
            arena,
            defs: EntityRegistry::new(),
            trait_decl,
            trait_ty,
        }
    }

    fn add_impl(fx: &mut Fixture, pattern: TypeId, clauses: Vec<TypeId>) -> DeclId {
        let root = fx.program.root();
        let impl_ = fx.program.add_decl(
            root,
            Symbol(9),
            DeclKind::Impl(ImplDecl {
                type_params: vec![],
                target: dummy_type_expr(),
                where_clauses: vec![],
                methods: vec![],
            }),
            Span::default(),
        );
        fx.defs.set_impl_target(impl_, pattern);
        fx.defs.set_where_clauses(impl_, clauses);
        impl_
    }

    #[test]
    fn simple_impl_resolves() {
        let mut fx = fixture();
        let i32_ = fx.arena.prim(PrimType::I32);
        let show_i32 = fx.arena.type_app(fx.trait_ty, smallvec![i32_]);
        let impl_ = add_impl(&mut fx, show_i32, vec![]);

        let registry = {
            let mut r = ImplRegistry::new(ResolverOptions::default());
            r.register_impl(fx.program.root(), fx.trait_decl, impl_);
            r
        };
        let witness = registry
            .find_impl(
                &fx.program,
                &fx.defs,
                &mut fx.arena,
                fx.program.root(),
                show_i32,
            )
            .unwrap();
        match witness {
            ImplWitness::Impl { decl, .. } => assert_eq!(decl, impl_),
            other => panic!("expected impl witness, got {other:?}"),
        }
    }

    #[test]
    fn generic_impl_discharges_its_clauses() {
        let mut fx = fixture();
        let i32_ = fx.arena.prim(PrimType::I32);
        let bool_ = fx.arena.bool_();

        // impl[T] Show for (T, T) where Show[T]
        let t = fx.program.fresh_type_var(Symbol(5));
        let t_ty = fx.arena.type_var(t);
        let pair_t = fx.arena.tuple(smallvec![t_ty, t_ty]);
        let show_pair = fx.arena.type_app(fx.trait_ty, smallvec![pair_t]);
        let show_t = fx.arena.type_app(fx.trait_ty, smallvec![t_ty]);
        let pair_impl = add_impl(&mut fx, show_pair, vec![show_t]);

        // impl Show for i32
        let show_i32 = fx.arena.type_app(fx.trait_ty, smallvec![i32_]);
        let i32_impl = add_impl(&mut fx, show_i32, vec![]);

        let mut registry = ImplRegistry::new(ResolverOptions::default());
        registry.register_impl(fx.program.root(), fx.trait_decl, pair_impl);
        registry.register_impl(fx.program.root(), fx.trait_decl, i32_impl);

        // Show[(i32, i32)] resolves through both impls.
        let pair_i32 = fx.arena.tuple(smallvec![i32_, i32_]);
        let goal = fx.arena.type_app(fx.trait_ty, smallvec![pair_i32]);
        assert!(
            registry
                .find_impl(&fx.program, &fx.defs, &mut fx.arena, fx.program.root(), goal)
                .is_ok()
        );

        // Show[(i32, bool)] fails: the pattern wants both halves equal.
        let mixed = fx.arena.tuple(smallvec![i32_, bool_]);
        let goal = fx.arena.type_app(fx.trait_ty, smallvec![mixed]);
        assert_eq!(
            registry
                .find_impl(&fx.program, &fx.defs, &mut fx.arena, fx.program.root(), goal)
                .unwrap_err(),
            FindImplError::NoImpl
        );

        // Show[(bool, bool)] matches the pattern but Show[bool] is missing.
        let pair_bool = fx.arena.tuple(smallvec![bool_, bool_]);
        let goal = fx.arena.type_app(fx.trait_ty, smallvec![pair_bool]);
        assert_eq!(
            registry
                .find_impl(&fx.program, &fx.defs, &mut fx.arena, fx.program.root(), goal)
                .unwrap_err(),
            FindImplError::NoImpl
        );
    }

    #[test]
    fn where_clause_shadows_impls() {
        let mut fx = fixture();
        let i32_ = fx.arena.prim(PrimType::I32);
        let show_i32 = fx.arena.type_app(fx.trait_ty, smallvec![i32_]);
        let impl_ = add_impl(&mut fx, show_i32, vec![]);

        // fn f() where Show[i32]
        let root = fx.program.root();
        let f = fx.program.add_decl(
            root,
            Symbol(7),
            DeclKind::Fn(FnDecl {
                type_params: vec![],
                where_clauses: vec![],
                params: vec![],
                ret: None,
                body: None,
            }),
            Span::default(),
        );
        fx.defs.set_where_clauses(f, vec![show_i32]);

        let mut registry = ImplRegistry::new(ResolverOptions::default());
        registry.register_impl(root, fx.trait_decl, impl_);

        let witness = registry
            .find_impl(&fx.program, &fx.defs, &mut fx.arena, f, show_i32)
            .unwrap();
        match witness {
            ImplWitness::Clause { owner, index } => {
                assert_eq!(owner, f);
                assert_eq!(index, 0);
            }
            other => panic!("expected clause witness, got {other:?}"),
        }
    }

    #[test]
    fn inner_module_impls_are_not_visible_outside() {
        let mut fx = fixture();
        let root = fx.program.root();
        let inner = fx.program.add_decl(
            root,
            Symbol(3),
            DeclKind::Mod(ModDecl::default()),
            Span::default(),
        );
        let i32_ = fx.arena.prim(PrimType::I32);
        let show_i32 = fx.arena.type_app(fx.trait_ty, smallvec![i32_]);
        let impl_ = add_impl(&mut fx, show_i32, vec![]);

        let mut registry = ImplRegistry::new(ResolverOptions::default());
        registry.register_impl(inner, fx.trait_decl, impl_);

        // Resolving from the root cannot see the inner module's impl.
        assert!(
            registry
                .find_impl(&fx.program, &fx.defs, &mut fx.arena, root, show_i32)
                .is_err()
        );
        // Resolving from inside the inner module can.
        assert!(
            registry
                .find_impl(&fx.program, &fx.defs, &mut fx.arena, inner, show_i32)
                .is_ok()
        );
    }

    #[test]
    fn self_recursive_clause_hits_the_depth_bound() {
        let mut fx = fixture();
        // impl[T] Show for (T, T) where Show[((T, T), (T, T))]: every
        // discharge requires itself one nesting level deeper.
        let t = fx.program.fresh_type_var(Symbol(5));
        let t_ty = fx.arena.type_var(t);
        let pair_t = fx.arena.tuple(smallvec![t_ty, t_ty]);
        let pair_pair_t = fx.arena.tuple(smallvec![pair_t, pair_t]);
        let show_pair = fx.arena.type_app(fx.trait_ty, smallvec![pair_t]);
        let show_pair_pair = fx.arena.type_app(fx.trait_ty, smallvec![pair_pair_t]);
        let impl_ = add_impl(&mut fx, show_pair, vec![show_pair_pair]);

        let mut registry = ImplRegistry::new(ResolverOptions { max_depth: 16 });
        registry.register_impl(fx.program.root(), fx.trait_decl, impl_);

        let i32_ = fx.arena.prim(PrimType::I32);
        let pair_i32 = fx.arena.tuple(smallvec![i32_, i32_]);
        let goal = fx.arena.type_app(fx.trait_ty, smallvec![pair_i32]);
        assert_eq!(
            registry
                .find_impl(&fx.program, &fx.defs, &mut fx.arena, fx.program.root(), goal)
                .unwrap_err(),
            FindImplError::NoImpl
        );
    }

    #[test]
    fn non_trait_obligation_is_rejected() {
        let mut fx = fixture();
        let i32_ = fx.arena.prim(PrimType::I32);
        let registry = ImplRegistry::new(ResolverOptions::default());
        assert_eq!(
            registry
                .find_impl(&fx.program, &fx.defs, &mut fx.arena, fx.program.root(), i32_)
                .unwrap_err(),
            FindImplError::NotATrait
        );
    }
}
