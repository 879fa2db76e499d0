// src/errors/sema.rs
//! Type-checking errors (E2xxx).

#![allow(unused_assignments)] // False positives from thiserror derive

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum SemanticError {
    #[error("expected {expected}, found {found}")]
    #[diagnostic(code(E2001))]
    TypeMismatch {
        expected: String,
        found: String,
        #[label("type mismatch")]
        span: SourceSpan,
    },

    #[error("unresolved name '{name}'")]
    #[diagnostic(code(E2002))]
    UnresolvedName {
        name: String,
        #[label("not found in scope")]
        span: SourceSpan,
    },

    #[error("cannot call non-function type '{ty}'")]
    #[diagnostic(code(E2003))]
    NotCallable {
        ty: String,
        #[label("not a function")]
        span: SourceSpan,
    },

    #[error("expected {expected} arguments, found {found}")]
    #[diagnostic(code(E2004))]
    ArityMismatch {
        expected: usize,
        found: usize,
        #[label("wrong number of arguments")]
        span: SourceSpan,
    },

    #[error("condition must be bool, found {found}")]
    #[diagnostic(code(E2005))]
    ConditionNotBool {
        found: String,
        #[label("expected bool")]
        span: SourceSpan,
    },

    #[error("incompatible branch types: {first} and {second}")]
    #[diagnostic(code(E2006))]
    BranchMismatch {
        first: String,
        second: String,
        #[label("branches must have a common type")]
        span: SourceSpan,
    },

    #[error("no implementation found for '{obligation}'")]
    #[diagnostic(
        code(E2007),
        help("add an impl for this trait application or a where-clause to the enclosing declaration")
    )]
    UnresolvedImpl {
        obligation: String,
        #[label("required here")]
        span: SourceSpan,
    },

    #[error("conflicting bounds for '{var}': lower {lower} is not a subtype of upper {upper}")]
    #[diagnostic(code(E2008))]
    AmbiguousBounds {
        var: String,
        lower: String,
        upper: String,
        #[label("introduced here")]
        span: SourceSpan,
    },

    #[error("cannot infer type")]
    #[diagnostic(code(E2009), help("add a type annotation"))]
    CannotInfer {
        #[label("type cannot be determined")]
        span: SourceSpan,
    },

    #[error("type '{ty}' has no size")]
    #[diagnostic(code(E2010))]
    Unsized {
        ty: String,
        #[label("a sized type is required here")]
        span: SourceSpan,
    },

    #[error("recursive type '{name}' has infinite size")]
    #[diagnostic(
        code(E2011),
        help("insert a reference or pointer to break the recursion")
    )]
    RecursiveType {
        name: String,
        #[label("recursive without indirection")]
        span: SourceSpan,
    },

    #[error("'{ty}' is not a trait")]
    #[diagnostic(code(E2012))]
    NotATrait {
        ty: String,
        #[label("a trait application is required here")]
        span: SourceSpan,
    },

    #[error("'{name}' has no variant or method '{member}'")]
    #[diagnostic(code(E2013))]
    UnknownMember {
        name: String,
        member: String,
        #[label("unknown member")]
        span: SourceSpan,
    },

    #[error("pattern does not match type {expected}")]
    #[diagnostic(code(E2014))]
    PatternMismatch {
        expected: String,
        #[label("pattern shape disagrees with the scrutinee")]
        span: SourceSpan,
    },
}
