// src/sema/analyzer/types.rs
//
// Lowering of surface type expressions into the arena. Name resolution for
// types is lexical: type parameters of enclosing declarations first, then
// declarations of enclosing scopes. Alias bodies are lowered on demand so
// forward references work; re-entering an alias under lowering is a cycle.

use crate::errors::SemanticError;
use crate::frontend::{DeclId, DeclKind, Span, Symbol, TypeExpr, TypeExprKind};
use crate::sema::type_arena::{TypeId, TypeIdVec, TypeVarVec};

use super::Analyzer;

impl<'a> Analyzer<'a> {
    pub(crate) fn lower_type(&mut self, site: DeclId, te: &TypeExpr) -> TypeId {
        match &te.kind {
            TypeExprKind::Prim(p) => self.arena.prim(*p),
            TypeExprKind::Tuple(elems) => {
                let tys: TypeIdVec = elems.iter().map(|e| self.lower_type(site, e)).collect();
                self.arena.tuple(tys)
            }
            TypeExprKind::SizedArray { elem, len, simd } => {
                let elem = self.lower_type(site, elem);
                self.arena.sized_array(elem, *len, *simd)
            }
            TypeExprKind::UnsizedArray(elem) => {
                let elem = self.lower_type(site, elem);
                self.arena.unsized_array(elem)
            }
            TypeExprKind::Ptr {
                pointee,
                is_mut,
                addr_space,
            } => {
                let pointee = self.lower_type(site, pointee);
                self.arena.ptr(pointee, *is_mut, *addr_space)
            }
            TypeExprKind::Ref {
                pointee,
                is_mut,
                addr_space,
            } => {
                let pointee = self.lower_type(site, pointee);
                self.arena.ref_(pointee, *is_mut, *addr_space)
            }
            TypeExprKind::Fn { dom, codom } => {
                let dom = self.lower_type(site, dom);
                let codom = self.lower_type(site, codom);
                self.arena.fn_(dom, codom)
            }
            TypeExprKind::Named { name, args } => self.lower_named(site, te.span, *name, args),
            TypeExprKind::Error => self.arena.error(),
        }
    }

    fn lower_named(
        &mut self,
        site: DeclId,
        span: Span,
        name: Symbol,
        args: &[TypeExpr],
    ) -> TypeId {
        if let Some(var) = self.lookup_type_param(site, name) {
            if !args.is_empty() {
                self.error(SemanticError::ArityMismatch {
                    expected: 0,
                    found: args.len(),
                    span: span.into(),
                });
                return self.arena.error();
            }
            return self.arena.type_var(var);
        }

        let Some(decl_id) = self.lookup_decl(site, name) else {
            self.error(SemanticError::UnresolvedName {
                name: self.interner.resolve(name).to_string(),
                span: span.into(),
            });
            return self.arena.error();
        };

        let lowered: TypeIdVec = args.iter().map(|a| self.lower_type(site, a)).collect();
        let arity = self.defs.type_params(decl_id).len();
        if arity != lowered.len() {
            self.error(SemanticError::ArityMismatch {
                expected: arity,
                found: lowered.len(),
                span: span.into(),
            });
            return self.arena.error();
        }

        let program = self.program;
        match &program.decl(decl_id).kind {
            DeclKind::Struct(_) | DeclKind::Enum(_) | DeclKind::Trait(_) => {
                let head = self
                    .defs
                    .decl_type(decl_id)
                    .unwrap_or_else(|| self.arena.error());
                self.arena.type_app(head, lowered)
            }
            DeclKind::Alias(_) => {
                self.ensure_alias_defined(decl_id);
                let head = self.arena.alias(decl_id);
                self.arena.type_app(head, lowered)
            }
            _ => {
                self.error(SemanticError::UnresolvedName {
                    name: self.interner.resolve(name).to_string(),
                    span: span.into(),
                });
                self.arena.error()
            }
        }
    }

    /// Lower an alias body, if not done yet. Cycles are cut by defining
    /// the alias as the error sentinel.
    pub(crate) fn ensure_alias_defined(&mut self, decl_id: DeclId) {
        if self.arena.alias_is_defined(decl_id) {
            return;
        }
        let program = self.program;
        let decl = program.decl(decl_id);
        let DeclKind::Alias(alias) = &decl.kind else {
            return;
        };
        let params: TypeVarVec = alias.type_params.iter().map(|p| p.var).collect();

        if !self.alias_visiting.insert(decl_id) {
            self.error(SemanticError::RecursiveType {
                name: self.interner.resolve(decl.name).to_string(),
                span: decl.span.into(),
            });
            let err = self.arena.error();
            self.arena.define_alias(decl_id, params, err);
            return;
        }

        let body = self.lower_type(decl_id, &alias.body);
        self.alias_visiting.remove(&decl_id);
        if !self.arena.alias_is_defined(decl_id) {
            self.arena.define_alias(decl_id, params, body);
        }
    }

    /// Lower where-clauses, keeping only well-formed trait applications.
    pub(crate) fn lower_clauses(&mut self, site: DeclId, clauses: &[TypeExpr]) -> Vec<TypeId> {
        clauses
            .iter()
            .filter_map(|clause| {
                let ty = self.lower_type(site, clause);
                if self.arena.as_trait_app(ty).is_some() {
                    Some(ty)
                } else {
                    if !self.arena.is_error(ty) {
                        self.error(SemanticError::NotATrait {
                            ty: self.render(ty),
                            span: clause.span.into(),
                        });
                    }
                    None
                }
            })
            .collect()
    }
}
