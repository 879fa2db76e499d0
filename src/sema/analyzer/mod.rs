// src/sema/analyzer/mod.rs
//
// The checker. One Analyzer walks a program in two passes: head emission
// (declaration signatures, nominal identities, impl registration) and body
// checking (expressions and patterns against those signatures, one
// inference scope per function body). Node types land in a side table; the
// pass never unwinds, it collects diagnostics and keeps going.

mod declarations;
mod expr;
mod types;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::errors::SemanticError;
use crate::frontend::{DeclId, Interner, NodeId, Program, Span, Symbol, TypeVarId};
use crate::sema::bounds::{BoundsCtx, Collapsed};
use crate::sema::display::TypeDisplay;
use crate::sema::entity_registry::EntityRegistry;
use crate::sema::impl_registry::{FindImplError, ImplRegistry, ImplWitness, ResolverOptions};
use crate::sema::type_arena::{TypeArena, TypeId};

/// Everything the back-end needs after a successful pass.
pub struct TypeCheckOutput {
    pub arena: TypeArena,
    pub defs: EntityRegistry,
    /// Type of every expression and pattern node.
    pub node_types: FxHashMap<NodeId, TypeId>,
    /// How each trait obligation was discharged, keyed by the use site.
    pub witnesses: FxHashMap<NodeId, ImplWitness>,
}

impl TypeCheckOutput {
    pub fn node_type(&self, node: NodeId) -> Option<TypeId> {
        self.node_types.get(&node).copied()
    }
}

/// Type-check a whole program. Returns the collected diagnostics when any
/// were produced; downstream compilation must not proceed in that case.
pub fn check_program(
    program: &Program,
    interner: &Interner,
    options: ResolverOptions,
) -> Result<TypeCheckOutput, Vec<SemanticError>> {
    let mut analyzer = Analyzer::new(program, interner, options);
    analyzer.check();
    let Analyzer {
        arena,
        defs,
        node_types,
        witnesses,
        errors,
        ..
    } = analyzer;
    if errors.is_empty() {
        Ok(TypeCheckOutput {
            arena,
            defs,
            node_types,
            witnesses,
        })
    } else {
        Err(errors)
    }
}

/// A trait obligation postponed to the end of its inference scope, so that
/// the target handed to the resolver is concrete.
pub(crate) struct Obligation {
    pub node: NodeId,
    pub span: Span,
    pub site: DeclId,
    pub target: TypeId,
}

pub(crate) struct Analyzer<'a> {
    pub(crate) program: &'a Program,
    pub(crate) interner: &'a Interner,
    pub(crate) arena: TypeArena,
    pub(crate) defs: EntityRegistry,
    pub(crate) impls: ImplRegistry,
    pub(crate) node_types: FxHashMap<NodeId, TypeId>,
    pub(crate) witnesses: FxHashMap<NodeId, ImplWitness>,
    pub(crate) errors: Vec<SemanticError>,
    /// Value scopes of the body currently being checked.
    pub(crate) locals: Vec<FxHashMap<Symbol, TypeId>>,
    /// Declaration whose body is being checked; lexical site for name
    /// resolution and obligation discharge.
    pub(crate) site: DeclId,
    pub(crate) bounds: BoundsCtx,
    /// Nodes typed inside the current inference scope; rewritten when the
    /// scope's variables collapse.
    pub(crate) scope_nodes: Vec<NodeId>,
    pub(crate) deferred: Vec<Obligation>,
    /// Aliases whose bodies are being lowered; re-entry is a cycle.
    pub(crate) alias_visiting: rustc_hash::FxHashSet<DeclId>,
    next_infer_var: u32,
}

impl<'a> Analyzer<'a> {
    fn new(program: &'a Program, interner: &'a Interner, options: ResolverOptions) -> Self {
        Self {
            program,
            interner,
            arena: TypeArena::new(),
            defs: EntityRegistry::new(),
            impls: ImplRegistry::new(options),
            node_types: FxHashMap::default(),
            witnesses: FxHashMap::default(),
            errors: Vec::new(),
            locals: Vec::new(),
            site: program.root(),
            bounds: BoundsCtx::new(),
            scope_nodes: Vec::new(),
            deferred: Vec::new(),
            alias_visiting: rustc_hash::FxHashSet::default(),
            next_infer_var: program.next_type_var_id(),
        }
    }

    fn check(&mut self) {
        self.emit_heads();
        self.validate_recursion();
        self.check_bodies();
        debug!(errors = self.errors.len(), "type check finished");
    }

    pub(crate) fn error(&mut self, err: SemanticError) {
        self.errors.push(err);
    }

    pub(crate) fn render(&self, ty: TypeId) -> String {
        TypeDisplay::new(&self.arena, self.program, self.interner, &self.defs).render(ty)
    }

    pub(crate) fn var_name(&self, var: TypeVarId) -> String {
        match self.program.type_var_name(var) {
            Some(sym) => self.interner.resolve(sym).to_string(),
            None => format!("?{}", var.0),
        }
    }

    /// Mint an inference variable tracked by the current scope.
    pub(crate) fn fresh_infer_var(&mut self, span: Span) -> TypeVarId {
        let var = TypeVarId(self.next_infer_var);
        self.next_infer_var += 1;
        self.bounds.introduce(&self.arena, var, span);
        var
    }

    pub(crate) fn record(&mut self, node: NodeId, ty: TypeId) {
        self.node_types.insert(node, ty);
        self.scope_nodes.push(node);
    }

    /// Post `found <: expected`, reporting a mismatch diagnostic on
    /// failure.
    pub(crate) fn expect(&mut self, span: Span, found: TypeId, expected: TypeId) {
        if self.bounds.post(&self.arena, found, expected).is_err() {
            let err = SemanticError::TypeMismatch {
                expected: self.render(expected),
                found: self.render(found),
                span: span.into(),
            };
            self.error(err);
        }
    }

    /// Find a declaration named `name` in the enclosing scopes of `site`.
    pub(crate) fn lookup_decl(&self, site: DeclId, name: Symbol) -> Option<DeclId> {
        use crate::frontend::DeclKind;
        for ancestor in self.program.ancestors(site) {
            let children: &[DeclId] = match &ancestor.kind {
                DeclKind::Mod(m) => &m.items,
                DeclKind::Trait(t) => &t.methods,
                DeclKind::Impl(i) => &i.methods,
                _ => &[],
            };
            for &child in children {
                if self.program.decl(child).name == name {
                    return Some(child);
                }
            }
        }
        None
    }

    /// Find a type parameter named `name` on an enclosing declaration.
    pub(crate) fn lookup_type_param(&self, site: DeclId, name: Symbol) -> Option<TypeVarId> {
        use crate::frontend::DeclKind;
        for ancestor in self.program.ancestors(site) {
            let params = match &ancestor.kind {
                DeclKind::Struct(s) => &s.type_params,
                DeclKind::Enum(e) => &e.type_params,
                DeclKind::Trait(t) => &t.type_params,
                DeclKind::Impl(i) => &i.type_params,
                DeclKind::Alias(a) => &a.type_params,
                DeclKind::Fn(f) => &f.type_params,
                _ => continue,
            };
            for param in params {
                if param.name == name {
                    return Some(param.var);
                }
            }
        }
        None
    }

    /// Close the current inference scope: collapse every variable, rewrite
    /// the types recorded in the scope, and discharge deferred trait
    /// obligations against the now-concrete targets.
    pub(crate) fn finish_scope(&mut self) {
        let mut resolution: FxHashMap<TypeVarId, TypeId> = FxHashMap::default();
        for (var, collapsed) in self.bounds.collapse(&self.arena) {
            let span = self.bounds.span_of(var).unwrap_or_default();
            match collapsed {
                Collapsed::Resolved(ty) => {
                    resolution.insert(var, ty);
                }
                Collapsed::Inconsistent { lower, upper } => {
                    let err = SemanticError::AmbiguousBounds {
                        var: self.var_name(var),
                        lower: self.render(lower),
                        upper: self.render(upper),
                        span: span.into(),
                    };
                    self.error(err);
                    resolution.insert(var, self.arena.error());
                }
                Collapsed::Unconstrained => {
                    self.error(SemanticError::CannotInfer { span: span.into() });
                    resolution.insert(var, self.arena.top());
                }
            }
        }

        // A variable's resolution may mention other scope variables; chase
        // bindings until the map is stable.
        for _ in 0..resolution.len() {
            let mut changed = false;
            let vars: Vec<TypeVarId> = resolution.keys().copied().collect();
            for var in vars {
                let ty = resolution[&var];
                let rewritten = self.arena.substitute(ty, &resolution);
                if rewritten != ty {
                    resolution.insert(var, rewritten);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let nodes = std::mem::take(&mut self.scope_nodes);
        for node in nodes {
            if let Some(&ty) = self.node_types.get(&node) {
                let rewritten = self.arena.substitute(ty, &resolution);
                self.node_types.insert(node, rewritten);
            }
        }

        let deferred = std::mem::take(&mut self.deferred);
        for ob in deferred {
            let target = self.arena.substitute(ob.target, &resolution);
            // Obligations poisoned by earlier errors stay silent.
            if self.arena.contains(target, self.arena.error()) {
                continue;
            }
            match self
                .impls
                .find_impl(self.program, &self.defs, &mut self.arena, ob.site, target)
            {
                Ok(witness) => {
                    self.witnesses.insert(ob.node, witness);
                }
                Err(FindImplError::NotATrait) => {
                    let err = SemanticError::NotATrait {
                        ty: self.render(target),
                        span: ob.span.into(),
                    };
                    self.error(err);
                }
                Err(FindImplError::NoImpl) => {
                    let err = SemanticError::UnresolvedImpl {
                        obligation: self.render(target),
                        span: ob.span.into(),
                    };
                    self.error(err);
                }
            }
        }

        self.bounds = BoundsCtx::new();
    }
}
