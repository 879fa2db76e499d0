// src/sema/display.rs
//
// Rendering of canonical types in the surface syntax, for diagnostics.
// The pretty-printer for the AST lives with the parser; this only needs to
// round-trip types.

use std::fmt::Write;

use crate::frontend::{Interner, Program};
use crate::sema::entity_registry::EntityRegistry;
use crate::sema::type_arena::{Ty, TypeArena, TypeId};

pub struct TypeDisplay<'a> {
    arena: &'a TypeArena,
    program: &'a Program,
    interner: &'a Interner,
    defs: &'a EntityRegistry,
}

impl<'a> TypeDisplay<'a> {
    pub fn new(
        arena: &'a TypeArena,
        program: &'a Program,
        interner: &'a Interner,
        defs: &'a EntityRegistry,
    ) -> Self {
        Self {
            arena,
            program,
            interner,
            defs,
        }
    }

    pub fn render(&self, ty: TypeId) -> String {
        let mut out = String::new();
        self.write(&mut out, ty);
        out
    }

    fn decl_name(&self, decl: crate::frontend::DeclId) -> &str {
        self.interner.resolve(self.program.decl(decl).name)
    }

    fn write(&self, out: &mut String, ty: TypeId) {
        match self.arena.get(ty) {
            Ty::Prim(p) => out.push_str(p.name()),
            Ty::Tuple(elems) => {
                out.push('(');
                for (i, &e) in elems.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write(out, e);
                }
                out.push(')');
            }
            Ty::SizedArray { elem, len, simd } => {
                if *simd {
                    out.push_str("simd");
                }
                out.push('[');
                self.write(out, *elem);
                let _ = write!(out, " * {len}");
                out.push(']');
            }
            Ty::UnsizedArray(elem) => {
                out.push('[');
                self.write(out, *elem);
                out.push(']');
            }
            Ty::Ptr {
                pointee,
                is_mut,
                addr_space,
            } => {
                out.push('*');
                if *addr_space != 0 {
                    let _ = write!(out, "{addr_space}");
                    out.push(' ');
                }
                if *is_mut {
                    out.push_str("mut ");
                }
                self.write(out, *pointee);
            }
            Ty::Ref {
                pointee,
                is_mut,
                addr_space,
            } => {
                out.push('&');
                if *addr_space != 0 {
                    let _ = write!(out, "{addr_space}");
                    out.push(' ');
                }
                if *is_mut {
                    out.push_str("mut ");
                }
                self.write(out, *pointee);
            }
            Ty::Fn { dom, codom } => {
                out.push_str("fn ");
                let parens = !matches!(self.arena.get(*dom), Ty::Tuple(_));
                if parens {
                    out.push('(');
                }
                self.write(out, *dom);
                if parens {
                    out.push(')');
                }
                out.push_str(" -> ");
                self.write(out, *codom);
            }
            Ty::NoRet => out.push('!'),
            Ty::Bottom => out.push('⊥'),
            Ty::Top => out.push('⊤'),
            Ty::Error => out.push_str("<error>"),
            Ty::Var(v) => match self.program.type_var_name(*v) {
                Some(name) => out.push_str(self.interner.resolve(name)),
                None => {
                    let _ = write!(out, "?{}", v.0);
                }
            },
            Ty::Forall { decl, vars, body } => {
                out.push('[');
                for (i, &v) in vars.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    match self.program.type_var_name(v) {
                        Some(name) => out.push_str(self.interner.resolve(name)),
                        None => {
                            let _ = write!(out, "?{}", v.0);
                        }
                    }
                }
                let clauses = self.defs.where_clauses(*decl);
                for (i, &clause) in clauses.iter().enumerate() {
                    out.push_str(if i == 0 { " with " } else { ", " });
                    self.write(out, clause);
                }
                out.push_str("] ");
                self.write(out, *body);
            }
            Ty::Struct(decl)
            | Ty::Enum(decl)
            | Ty::Trait(decl)
            | Ty::Impl(decl)
            | Ty::Mod(decl)
            | Ty::Alias(decl) => out.push_str(self.decl_name(*decl)),
            Ty::App { applied, args } => {
                self.write(out, *applied);
                out.push('[');
                for (i, &a) in args.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write(out, a);
                }
                out.push(']');
            }
        }
    }
}
