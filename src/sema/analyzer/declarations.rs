// src/sema/analyzer/declarations.rs
//
// Head emission and the body-check driver.
//
// Heads run in sub-passes over the flat declaration arena so forward
// references to sibling declarations are legal: nominal identities first,
// then alias definitions, then signatures and member types, then the
// trait method tables that depend on those signatures. Bodies only run
// after every head exists.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::errors::SemanticError;
use crate::frontend::{DeclId, DeclKind, EnumDecl, Expr, FnDecl, StructDecl, Symbol};
use crate::sema::query::is_sized;
use crate::sema::type_arena::{Ty, TypeId, TypeIdVec, TypeVarVec};

use super::Analyzer;

impl<'a> Analyzer<'a> {
    pub(crate) fn emit_heads(&mut self) {
        let program = self.program;

        // Nominal identities and type parameters for everything.
        for decl in program.decls() {
            let params: TypeVarVec = match &decl.kind {
                DeclKind::Struct(s) => s.type_params.iter().map(|p| p.var).collect(),
                DeclKind::Enum(e) => e.type_params.iter().map(|p| p.var).collect(),
                DeclKind::Trait(t) => t.type_params.iter().map(|p| p.var).collect(),
                DeclKind::Impl(i) => i.type_params.iter().map(|p| p.var).collect(),
                DeclKind::Alias(a) => a.type_params.iter().map(|p| p.var).collect(),
                DeclKind::Fn(f) => f.type_params.iter().map(|p| p.var).collect(),
                _ => TypeVarVec::new(),
            };
            self.defs.set_type_params(decl.id, params);

            let ty = match &decl.kind {
                DeclKind::Mod(_) => self.arena.mod_(decl.id),
                DeclKind::Struct(_) => self.arena.struct_(decl.id),
                DeclKind::Enum(_) => self.arena.enum_(decl.id),
                DeclKind::Trait(_) => self.arena.trait_(decl.id),
                DeclKind::Impl(_) => self.arena.impl_(decl.id),
                DeclKind::Alias(_) => self.arena.alias(decl.id),
                DeclKind::Error => self.arena.error(),
                // Function signatures need lowered types; next pass.
                DeclKind::Fn(_) => continue,
            };
            self.defs.set_decl_type(decl.id, ty);
        }

        // Alias bodies, on-demand recursive.
        for decl in program.decls() {
            if matches!(decl.kind, DeclKind::Alias(_)) {
                self.ensure_alias_defined(decl.id);
            }
        }

        // Signatures and member types.
        for decl in program.decls() {
            match &decl.kind {
                DeclKind::Struct(s) => self.emit_struct_head(decl.id, s),
                DeclKind::Enum(e) => self.emit_enum_head(decl.id, e),
                DeclKind::Fn(f) => self.emit_fn_head(decl.id, f),
                _ => {}
            }
        }

        // Impl targets and registration; where-clauses may mention any head.
        for decl in program.decls() {
            if let DeclKind::Impl(i) = &decl.kind {
                let target = self.lower_type(decl.id, &i.target);
                match self.arena.as_trait_app(target) {
                    Some(trait_decl) => {
                        self.defs.set_impl_target(decl.id, target);
                        let module = program
                            .ancestors(decl.id)
                            .find(|d| matches!(d.kind, DeclKind::Mod(_)))
                            .map(|d| d.id);
                        if let Some(module) = module {
                            self.impls.register_impl(module, trait_decl, decl.id);
                        }
                    }
                    None => {
                        if !self.arena.is_error(target) {
                            self.error(SemanticError::NotATrait {
                                ty: self.render(target),
                                span: i.target.span.into(),
                            });
                        }
                    }
                }
                let clauses = self.lower_clauses(decl.id, &i.where_clauses);
                self.defs.set_where_clauses(decl.id, clauses);
            }
        }

        // Trait method tables, from the signatures emitted above.
        for decl in program.decls() {
            if let DeclKind::Trait(t) = &decl.kind {
                let methods: Vec<(Symbol, TypeId)> = t
                    .methods
                    .iter()
                    .map(|&m| {
                        let sig = self
                            .defs
                            .decl_type(m)
                            .unwrap_or_else(|| self.arena.error());
                        (program.decl(m).name, sig)
                    })
                    .collect();
                let members: Vec<TypeId> = methods.iter().map(|&(_, sig)| sig).collect();
                self.defs.set_member_types(decl.id, members);
                self.defs.set_trait_methods(decl.id, methods);
            }
        }
    }

    fn ctor_dom(&mut self, parts: &[TypeId]) -> TypeId {
        match parts {
            [] => self.arena.unit(),
            [single] => *single,
            many => self.arena.tuple(TypeIdVec::from_slice(many)),
        }
    }

    /// The type a declaration's own parameters instantiate it to, e.g.
    /// `List[T]` inside `List`'s declaration.
    fn self_application(&mut self, decl_id: DeclId, head: TypeId) -> TypeId {
        let params: TypeVarVec = self.defs.type_params(decl_id).iter().copied().collect();
        let args: TypeIdVec = params.iter().map(|&v| self.arena.type_var(v)).collect();
        self.arena.type_app(head, args)
    }

    fn quantify(&mut self, decl_id: DeclId, sig: TypeId) -> TypeId {
        let params: TypeVarVec = self.defs.type_params(decl_id).iter().copied().collect();
        if params.is_empty() {
            sig
        } else {
            self.arena.forall(decl_id, params, sig)
        }
    }

    fn emit_struct_head(&mut self, decl_id: DeclId, s: &StructDecl) {
        let fields: Vec<(Symbol, TypeId)> = s
            .fields
            .iter()
            .map(|f| (f.name, self.lower_type(decl_id, &f.ty)))
            .collect();
        let members: Vec<TypeId> = fields.iter().map(|&(_, ty)| ty).collect();

        let dom = self.ctor_dom(&members);
        let head = self.arena.struct_(decl_id);
        let codom = self.self_application(decl_id, head);
        let sig = self.arena.fn_(dom, codom);
        let ctor = self.quantify(decl_id, sig);

        trace!(decl = %decl_id, ctor = %self.render(ctor), "struct head");
        self.defs.set_field_types(decl_id, fields);
        self.defs.set_member_types(decl_id, members);
        self.defs.set_ctor_type(decl_id, ctor);
    }

    fn emit_enum_head(&mut self, decl_id: DeclId, e: &EnumDecl) {
        let head = self.arena.enum_(decl_id);
        let codom = self.self_application(decl_id, head);

        let mut members = Vec::new();
        let mut ctors = Vec::new();
        for variant in &e.variants {
            let sig = match &variant.payload {
                Some(payload) => {
                    let payload = self.lower_type(decl_id, payload);
                    members.push(payload);
                    self.arena.fn_(payload, codom)
                }
                None => codom,
            };
            ctors.push((variant.name, self.quantify(decl_id, sig)));
        }

        self.defs.set_member_types(decl_id, members);
        self.defs.set_variant_ctors(decl_id, ctors);
    }

    fn emit_fn_head(&mut self, decl_id: DeclId, f: &FnDecl) {
        let param_tys: Vec<TypeId> = f
            .params
            .iter()
            .map(|p| self.lower_type(decl_id, &p.ty))
            .collect();
        let dom = self.ctor_dom(&param_tys);
        let codom = match &f.ret {
            Some(ret) => self.lower_type(decl_id, ret),
            None => self.arena.unit(),
        };
        let sig = self.arena.fn_(dom, codom);
        let ty = self.quantify(decl_id, sig);

        trace!(decl = %decl_id, sig = %self.render(ty), "fn head");
        self.defs.set_decl_type(decl_id, ty);
        let clauses = self.lower_clauses(decl_id, &f.where_clauses);
        self.defs.set_where_clauses(decl_id, clauses);
    }

    /// Report every struct/enum that reaches itself through its members
    /// without an intervening reference or pointer.
    pub(crate) fn validate_recursion(&mut self) {
        let program = self.program;
        for decl in program.decls() {
            if !matches!(decl.kind, DeclKind::Struct(_) | DeclKind::Enum(_)) {
                continue;
            }
            let mut walking = FxHashSet::default();
            walking.insert(decl.id);
            let members: Vec<TypeId> = self.defs.member_types(decl.id).to_vec();
            if members
                .iter()
                .any(|&m| self.type_reaches(decl.id, m, &mut walking))
            {
                self.error(SemanticError::RecursiveType {
                    name: self.interner.resolve(decl.name).to_string(),
                    span: decl.span.into(),
                });
            }
        }
    }

    fn type_reaches(&mut self, root: DeclId, ty: TypeId, walking: &mut FxHashSet<DeclId>) -> bool {
        match self.arena.get(ty).clone() {
            Ty::Struct(d) | Ty::Enum(d) => self.decl_reaches(root, d, walking),
            Ty::App { applied, args } => {
                let head = match self.arena.get(applied) {
                    Ty::Struct(d) | Ty::Enum(d) => Some(*d),
                    _ => None,
                };
                if let Some(d) = head
                    && self.decl_reaches(root, d, walking)
                {
                    return true;
                }
                args.iter().any(|&a| self.type_reaches(root, a, walking))
            }
            Ty::Tuple(elems) => elems.iter().any(|&e| self.type_reaches(root, e, walking)),
            Ty::SizedArray { elem, .. } => self.type_reaches(root, elem, walking),
            Ty::Fn { dom, codom } => {
                self.type_reaches(root, dom, walking) || self.type_reaches(root, codom, walking)
            }
            Ty::Forall { body, .. } => self.type_reaches(root, body, walking),
            // References and pointers break the cycle; everything else is
            // a leaf for this walk.
            _ => false,
        }
    }

    fn decl_reaches(&mut self, root: DeclId, d: DeclId, walking: &mut FxHashSet<DeclId>) -> bool {
        if d == root {
            return true;
        }
        if !walking.insert(d) {
            return false;
        }
        let members: Vec<TypeId> = self.defs.member_types(d).to_vec();
        let reached = members
            .iter()
            .any(|&m| self.type_reaches(root, m, walking));
        walking.remove(&d);
        reached
    }

    pub(crate) fn check_bodies(&mut self) {
        let program = self.program;
        for decl in program.decls() {
            if let DeclKind::Fn(f) = &decl.kind
                && let Some(body) = &f.body
            {
                self.check_fn_body(decl.id, f, body);
            }
        }
    }

    fn check_fn_body(&mut self, decl_id: DeclId, f: &FnDecl, body: &Expr) {
        trace!(decl = %decl_id, "checking body");
        self.site = decl_id;
        self.scope_nodes.clear();
        self.deferred.clear();

        let sig = self
            .defs
            .decl_type(decl_id)
            .unwrap_or_else(|| self.arena.error());
        let sig = match self.arena.as_forall(sig) {
            Some((_, _, inner)) => inner,
            None => sig,
        };
        let Some((dom, codom)) = self.arena.as_fn(sig) else {
            return;
        };

        let param_tys: Vec<TypeId> = match f.params.len() {
            0 => Vec::new(),
            1 => vec![dom],
            n => self
                .arena
                .as_tuple(dom)
                .map(|elems| elems.to_vec())
                .unwrap_or_else(|| vec![self.arena.error(); n]),
        };
        let mut scope = FxHashMap::default();
        for (param, &ty) in f.params.iter().zip(param_tys.iter()) {
            self.record(param.id, ty);
            scope.insert(param.name, ty);
            if !is_sized(&mut self.arena, &self.defs, ty) {
                self.error(SemanticError::Unsized {
                    ty: self.render(ty),
                    span: param.span.into(),
                });
            }
        }
        self.locals.push(scope);

        let body_ty = self.check_expr(body, Some(codom));
        self.expect(body.span, body_ty, codom);

        self.finish_scope();
        self.locals.pop();
    }
}
