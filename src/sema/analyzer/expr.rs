// src/sema/analyzer/expr.rs
//
// Expression and pattern checking. The expected type is propagated inward
// where it helps (literals, branches, tuple shapes); everything else is
// inferred bottom-up and reconciled through subtype obligations posted to
// the bounds context. References to generic declarations instantiate
// their quantifier with fresh inference variables; the trait obligations
// that come with them are deferred to the end of the scope.

use rustc_hash::FxHashMap;

use crate::errors::SemanticError;
use crate::frontend::{
    Block, DeclKind, Expr, ExprKind, LetStmt, Literal, NodeId, Path, Pattern, PatternKind,
    PrimType, Span, Stmt, Symbol, TypeExpr, TypeVarId,
};
use crate::sema::query::is_sized;
use crate::sema::subtype::join;
use crate::sema::type_arena::{Ty, TypeId, TypeIdVec};

use super::{Analyzer, Obligation};

impl<'a> Analyzer<'a> {
    pub(crate) fn check_expr(&mut self, expr: &Expr, expected: Option<TypeId>) -> TypeId {
        let ty = match &expr.kind {
            ExprKind::Lit(lit) => self.lit_type(lit, expected),
            ExprKind::Path(path) => self.check_path(expr, path),
            ExprKind::Tuple(elems) => {
                let elem_expected: Vec<Option<TypeId>> = match expected {
                    Some(e) => match self.arena.as_tuple(e) {
                        Some(tys) if tys.len() == elems.len() => {
                            tys.iter().map(|&t| Some(t)).collect()
                        }
                        _ => vec![None; elems.len()],
                    },
                    None => vec![None; elems.len()],
                };
                let tys: TypeIdVec = elems
                    .iter()
                    .zip(elem_expected)
                    .map(|(e, exp)| self.check_expr(e, exp))
                    .collect();
                self.arena.tuple(tys)
            }
            ExprKind::Array { elems, simd } => self.check_array(expr.span, elems, *simd, expected),
            ExprKind::Call { callee, arg } => {
                let callee_ty = self.check_expr(callee, None);
                match self.arena.as_fn(callee_ty) {
                    Some((dom, codom)) => {
                        let arg_ty = self.check_expr(arg, Some(dom));
                        self.expect(arg.span, arg_ty, dom);
                        codom
                    }
                    None => {
                        self.check_expr(arg, None);
                        if !self.arena.is_error(callee_ty) {
                            let err = SemanticError::NotCallable {
                                ty: self.render(callee_ty),
                                span: callee.span.into(),
                            };
                            self.error(err);
                        }
                        self.arena.error()
                    }
                }
            }
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let bool_ = self.arena.bool_();
                let cond_ty = self.check_expr(cond, Some(bool_));
                if self.bounds.post(&self.arena, cond_ty, bool_).is_err() {
                    let err = SemanticError::ConditionNotBool {
                        found: self.render(cond_ty),
                        span: cond.span.into(),
                    };
                    self.error(err);
                }
                match else_branch {
                    Some(els) => {
                        let then_ty = self.check_expr(then_branch, expected);
                        let else_ty = self.check_expr(els, expected);
                        self.combine(expr.span, then_ty, else_ty)
                    }
                    None => {
                        let unit = self.arena.unit();
                        let then_ty = self.check_expr(then_branch, Some(unit));
                        self.expect(then_branch.span, then_ty, unit);
                        unit
                    }
                }
            }
            ExprKind::Match { scrutinee, arms } => {
                let scrut_ty = self.check_expr(scrutinee, None);
                let mut result: Option<TypeId> = None;
                for arm in arms {
                    self.locals.push(FxHashMap::default());
                    self.check_pattern(&arm.pattern, scrut_ty);
                    let arm_ty = self.check_expr(&arm.body, expected);
                    self.locals.pop();
                    result = Some(match result {
                        Some(acc) => self.combine(arm.body.span, acc, arm_ty),
                        None => arm_ty,
                    });
                }
                // An empty match never produces a value.
                result.unwrap_or_else(|| self.arena.bottom())
            }
            ExprKind::Block(block) => self.check_block(block, expected),
            ExprKind::Error => self.arena.error(),
        };
        self.record(expr.id, ty);
        ty
    }

    fn lit_type(&mut self, lit: &Literal, expected: Option<TypeId>) -> TypeId {
        match lit {
            Literal::Bool(_) => self.arena.bool_(),
            Literal::Int(_) => {
                if let Some(e) = expected
                    && let Ty::Prim(p) = self.arena.get(e)
                    && (p.is_integer() || p.is_float())
                {
                    e
                } else {
                    self.arena.prim(PrimType::I32)
                }
            }
            Literal::Float(_) => {
                if let Some(e) = expected
                    && let Ty::Prim(p) = self.arena.get(e)
                    && p.is_float()
                {
                    e
                } else {
                    self.arena.prim(PrimType::F64)
                }
            }
        }
    }

    fn check_array(
        &mut self,
        span: Span,
        elems: &[Expr],
        simd: bool,
        expected: Option<TypeId>,
    ) -> TypeId {
        let expected_elem = expected.and_then(|e| match self.arena.get(e) {
            Ty::SizedArray { elem, .. } => Some(*elem),
            Ty::UnsizedArray(elem) => Some(*elem),
            _ => None,
        });
        if elems.is_empty() {
            return match expected_elem {
                Some(elem) => self.arena.sized_array(elem, 0, simd),
                None => {
                    self.error(SemanticError::CannotInfer { span: span.into() });
                    self.arena.error()
                }
            };
        }
        let mut elem_ty = self.check_expr(&elems[0], expected_elem);
        for e in &elems[1..] {
            let t = self.check_expr(e, expected_elem.or(Some(elem_ty)));
            elem_ty = self.combine(e.span, elem_ty, t);
        }
        self.arena.sized_array(elem_ty, elems.len() as u64, simd)
    }

    /// Reconcile two branch types: their join when one exists, a fresh
    /// bounded variable when inference is still open, a diagnostic
    /// otherwise.
    pub(crate) fn combine(&mut self, span: Span, a: TypeId, b: TypeId) -> TypeId {
        let top = self.arena.top();
        let j = join(&self.arena, a, b);
        if j != top || a == top || b == top {
            return j;
        }
        if self.bounds.mentions_tracked_var(&self.arena, a)
            || self.bounds.mentions_tracked_var(&self.arena, b)
        {
            let var = self.fresh_infer_var(span);
            let var_ty = self.arena.type_var(var);
            let _ = self.bounds.post(&self.arena, a, var_ty);
            let _ = self.bounds.post(&self.arena, b, var_ty);
            return var_ty;
        }
        let err = SemanticError::BranchMismatch {
            first: self.render(a),
            second: self.render(b),
            span: span.into(),
        };
        self.error(err);
        self.arena.error()
    }

    fn check_block(&mut self, block: &Block, expected: Option<TypeId>) -> TypeId {
        self.locals.push(FxHashMap::default());
        let mut value = self.arena.unit();
        let count = block.stmts.len();
        for (i, stmt) in block.stmts.iter().enumerate() {
            match stmt {
                Stmt::Let(ls) => {
                    self.check_let(ls);
                    value = self.arena.unit();
                }
                Stmt::Expr { expr, semi } => {
                    let last = i + 1 == count && !semi;
                    let ty = self.check_expr(expr, if last { expected } else { None });
                    value = if last { ty } else { self.arena.unit() };
                }
            }
        }
        self.locals.pop();
        value
    }

    fn check_let(&mut self, ls: &LetStmt) {
        let annotation = ls.ty.as_ref().map(|t| self.lower_type(self.site, t));
        let init_ty = self.check_expr(&ls.init, annotation);
        let bound = match annotation {
            Some(ann) => {
                self.expect(ls.init.span, init_ty, ann);
                ann
            }
            None => init_ty,
        };
        // Bindings hold values; the type must be sized. Types still under
        // inference are checked once their variables collapse elsewhere.
        if !self.bounds.mentions_tracked_var(&self.arena, bound)
            && !is_sized(&mut self.arena, &self.defs, bound)
        {
            let err = SemanticError::Unsized {
                ty: self.render(bound),
                span: ls.span.into(),
            };
            self.error(err);
        }
        self.check_pattern(&ls.pattern, bound);
    }

    pub(crate) fn check_pattern(&mut self, pat: &Pattern, expected: TypeId) -> TypeId {
        let ty = match &pat.kind {
            PatternKind::Wildcard => expected,
            PatternKind::Binding(name) => {
                if let Some(scope) = self.locals.last_mut() {
                    scope.insert(*name, expected);
                }
                expected
            }
            PatternKind::Tuple(pats) => match self.arena.as_tuple(expected).cloned() {
                Some(elems) if elems.len() == pats.len() => {
                    for (p, &e) in pats.iter().zip(elems.iter()) {
                        self.check_pattern(p, e);
                    }
                    expected
                }
                Some(elems) => {
                    self.error(SemanticError::ArityMismatch {
                        expected: elems.len(),
                        found: pats.len(),
                        span: pat.span.into(),
                    });
                    let err = self.arena.error();
                    for p in pats {
                        self.check_pattern(p, err);
                    }
                    err
                }
                None => {
                    let err = self.arena.error();
                    if !self.arena.is_error(expected) {
                        let e = SemanticError::PatternMismatch {
                            expected: self.render(expected),
                            span: pat.span.into(),
                        };
                        self.error(e);
                    }
                    for p in pats {
                        self.check_pattern(p, err);
                    }
                    err
                }
            },
            PatternKind::Lit(lit) => {
                let lit_ty = self.lit_type(lit, Some(expected));
                self.expect(pat.span, lit_ty, expected);
                lit_ty
            }
            PatternKind::Error => self.arena.error(),
        };
        self.record(pat.id, ty);
        ty
    }

    fn lookup_local(&self, name: Symbol) -> Option<TypeId> {
        for scope in self.locals.iter().rev() {
            if let Some(&ty) = scope.get(&name) {
                return Some(ty);
            }
        }
        None
    }

    fn check_path(&mut self, expr: &Expr, path: &Path) -> TypeId {
        let span = expr.span;
        let node = expr.id;
        let program = self.program;
        match path.segments.as_slice() {
            [name] => {
                if path.type_args.is_empty()
                    && let Some(ty) = self.lookup_local(*name)
                {
                    return ty;
                }
                let Some(decl_id) = self.lookup_decl(self.site, *name) else {
                    return self.unresolved(*name, span);
                };
                match &program.decl(decl_id).kind {
                    DeclKind::Fn(_) => {
                        let sig = self
                            .defs
                            .decl_type(decl_id)
                            .unwrap_or_else(|| self.arena.error());
                        self.reference(node, span, sig, &path.type_args)
                    }
                    DeclKind::Struct(_) => {
                        let ctor = self
                            .defs
                            .ctor_type(decl_id)
                            .unwrap_or_else(|| self.arena.error());
                        self.reference(node, span, ctor, &path.type_args)
                    }
                    _ => self.unresolved(*name, span),
                }
            }
            [first, second] => {
                let Some(decl_id) = self.lookup_decl(self.site, *first) else {
                    return self.unresolved(*first, span);
                };
                match &program.decl(decl_id).kind {
                    DeclKind::Enum(_) => match self.defs.variant_ctor(decl_id, *second) {
                        Some(ctor) => self.reference(node, span, ctor, &path.type_args),
                        None => self.unknown_member(*first, *second, span),
                    },
                    DeclKind::Trait(_) => {
                        self.trait_method_ref(node, span, decl_id, *second, &path.type_args)
                    }
                    _ => self.unknown_member(*first, *second, span),
                }
            }
            _ => {
                let name = path.segments.first().copied().unwrap_or(Symbol(0));
                self.unresolved(name, span)
            }
        }
    }

    fn unresolved(&mut self, name: Symbol, span: Span) -> TypeId {
        let err = SemanticError::UnresolvedName {
            name: self.interner.resolve(name).to_string(),
            span: span.into(),
        };
        self.error(err);
        self.arena.error()
    }

    fn unknown_member(&mut self, name: Symbol, member: Symbol, span: Span) -> TypeId {
        let err = SemanticError::UnknownMember {
            name: self.interner.resolve(name).to_string(),
            member: self.interner.resolve(member).to_string(),
            span: span.into(),
        };
        self.error(err);
        self.arena.error()
    }

    fn reference(
        &mut self,
        node: NodeId,
        span: Span,
        ty: TypeId,
        type_args: &[TypeExpr],
    ) -> TypeId {
        if type_args.is_empty() {
            self.instantiate(node, span, ty)
        } else {
            self.instantiate_with(node, span, ty, type_args)
        }
    }

    /// Strip every prenex quantifier, minting fresh inference variables
    /// for the binders and deferring the quantified declaration's
    /// where-clauses under the same substitution.
    fn instantiate(&mut self, node: NodeId, span: Span, mut ty: TypeId) -> TypeId {
        while let Some((decl, vars, body)) = self
            .arena
            .as_forall(ty)
            .map(|(d, v, b)| (d, v.clone(), b))
        {
            let mut map: FxHashMap<TypeVarId, TypeId> = FxHashMap::default();
            for &v in &vars {
                let fresh = self.fresh_infer_var(span);
                let fresh_ty = self.arena.type_var(fresh);
                map.insert(v, fresh_ty);
            }
            self.defer_clauses(node, span, decl, &map);
            ty = self.arena.substitute(body, &map);
        }
        ty
    }

    /// Instantiate the outermost quantifier with explicit arguments, then
    /// any remaining quantifiers with fresh variables.
    fn instantiate_with(
        &mut self,
        node: NodeId,
        span: Span,
        ty: TypeId,
        type_args: &[TypeExpr],
    ) -> TypeId {
        let lowered: Vec<TypeId> = type_args
            .iter()
            .map(|a| self.lower_type(self.site, a))
            .collect();
        match self.arena.as_forall(ty).map(|(d, v, b)| (d, v.clone(), b)) {
            Some((decl, vars, body)) => {
                if vars.len() != lowered.len() {
                    self.error(SemanticError::ArityMismatch {
                        expected: vars.len(),
                        found: lowered.len(),
                        span: span.into(),
                    });
                    return self.arena.error();
                }
                let map: FxHashMap<TypeVarId, TypeId> =
                    vars.iter().copied().zip(lowered).collect();
                self.defer_clauses(node, span, decl, &map);
                let inner = self.arena.substitute(body, &map);
                self.instantiate(node, span, inner)
            }
            None => {
                self.error(SemanticError::ArityMismatch {
                    expected: 0,
                    found: lowered.len(),
                    span: span.into(),
                });
                self.arena.error()
            }
        }
    }

    fn defer_clauses(
        &mut self,
        node: NodeId,
        span: Span,
        decl: crate::frontend::DeclId,
        map: &FxHashMap<TypeVarId, TypeId>,
    ) {
        let clauses: Vec<TypeId> = self.defs.where_clauses(decl).to_vec();
        for clause in clauses {
            let target = self.arena.substitute(clause, map);
            self.deferred.push(Obligation {
                node,
                span,
                site: self.site,
                target,
            });
        }
    }

    /// `Trait::method`: instantiate the trait's parameters, post the trait
    /// application as an obligation, and hand back the method's signature
    /// under that instantiation.
    fn trait_method_ref(
        &mut self,
        node: NodeId,
        span: Span,
        trait_decl: crate::frontend::DeclId,
        method: Symbol,
        type_args: &[TypeExpr],
    ) -> TypeId {
        let Some(sig) = self.defs.trait_method(trait_decl, method) else {
            let name = self.program.decl(trait_decl).name;
            return self.unknown_member(name, method, span);
        };
        let params: Vec<TypeVarId> = self.defs.type_params(trait_decl).to_vec();
        let args: Vec<TypeId> = if type_args.is_empty() {
            params
                .iter()
                .map(|_| {
                    let fresh = self.fresh_infer_var(span);
                    self.arena.type_var(fresh)
                })
                .collect()
        } else {
            if type_args.len() != params.len() {
                self.error(SemanticError::ArityMismatch {
                    expected: params.len(),
                    found: type_args.len(),
                    span: span.into(),
                });
                return self.arena.error();
            }
            type_args
                .iter()
                .map(|a| self.lower_type(self.site, a))
                .collect()
        };

        let trait_ty = self
            .defs
            .decl_type(trait_decl)
            .unwrap_or_else(|| self.arena.error());
        let target = self
            .arena
            .type_app(trait_ty, TypeIdVec::from_iter(args.iter().copied()));
        self.deferred.push(Obligation {
            node,
            span,
            site: self.site,
            target,
        });

        let map: FxHashMap<TypeVarId, TypeId> = params.into_iter().zip(args).collect();
        let sig = self.arena.substitute(sig, &map);
        self.instantiate(node, span, sig)
    }
}
