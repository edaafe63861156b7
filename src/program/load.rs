// S-expression flow graph serialization (ilsexp)
//
//  Copyright (C) 2014-2022 Ryan Specialty Group, LLC.
//
//  This file is part of ilsexp.
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Loading a [`Program`] from an S-expression.
//!
//! ```text
//! (Program
//!   (Library "file:///main.dart"
//!     (Class Foo { cid 20 }
//!       (Field x { final true, static false, type_cid 3 })
//!       (Function bar { kind getter, static false }))
//!     (Field counter)
//!     (Function main)))
//! ```
//!
//! Names may be written either as symbols or as strings.
//! Every key is optional:
//!   `cid` defaults to the next available class id,
//!   `final` and `static` default to `false`,
//!   and `kind` defaults to `method`
//!     (one of `method`, `getter`, `setter`, or `dyn`).
//!
//! Libraries are merged by URL,
//!   so `(Library "dart:core" ...)` extends the core library.

use super::{
    ClassId, FieldSpec, MemberKind, Owner, Program, ProgramError, ProgramModel,
};
use crate::{
    diagnose::{Annotate, AnnotatedSpan, Diagnostic},
    fmt::{DisplayWrapper, TtQuote},
    sexp::SExp,
    span::Span,
    sym::{GlobalSymbolIntern, GlobalSymbolResolve, SymbolId},
};
use std::{error::Error, fmt::Display};

/// Tag of the top-level program form.
pub const PROGRAM_TAG: &str = "Program";

impl Program {
    /// Load a program from a `(Program ...)` form.
    ///
    /// The result always includes the core library.
    pub fn from_sexp(sexp: &SExp) -> Result<Self, LoadError> {
        let mut program = Program::new();
        let mut cid_refs = Vec::new();

        for lib_sexp in tagged_body(sexp, PROGRAM_TAG)?.iter().skip(1) {
            let body = tagged_body(lib_sexp, "Library")?;
            let url = name_at(lib_sexp, 1)?;
            let lib = program.add_library(url);

            for member in body.iter().skip(2) {
                match member.tag().map(|tag| tag.lookup_str()) {
                    Some("Class") => {
                        load_class(&mut program, lib, member, &mut cid_refs)?
                    }
                    _ => load_member(
                        &mut program,
                        Owner::Library(lib),
                        member,
                        &mut cid_refs,
                    )?,
                }
            }
        }

        // Fields may refer to classes declared after them.
        for (cid, span) in cid_refs {
            if !program.is_valid_cid(cid) {
                return Err(LoadError::new(LoadErrorKind::UnknownCid(cid), span));
            }
        }

        Ok(program)
    }
}

fn load_class(
    program: &mut Program,
    lib: super::LibraryId,
    sexp: &SExp,
    cid_refs: &mut Vec<(ClassId, Option<Span>)>,
) -> Result<(), LoadError> {
    let body = tagged_body(sexp, "Class")?;
    let name = name_at(sexp, 1)?;
    let cid = opt_cid(sexp, "cid")?;

    let cid = program
        .add_class(lib, name, cid)
        .map_err(|e| LoadError::new(e.into(), sexp.span()))?;

    for member in body.iter().skip(2) {
        load_member(program, Owner::Class(cid), member, cid_refs)?;
    }

    Ok(())
}

fn load_member(
    program: &mut Program,
    owner: Owner,
    sexp: &SExp,
    cid_refs: &mut Vec<(ClassId, Option<Span>)>,
) -> Result<(), LoadError> {
    let in_program = |e: ProgramError| LoadError::new(e.into(), sexp.span());

    match sexp.tag().map(|tag| tag.lookup_str()) {
        Some("Field") => {
            let name = name_at(sexp, 1)?;
            let static_cid = opt_cid(sexp, "type_cid")?;

            if let Some(cid) = static_cid {
                cid_refs.push((cid, sexp.span()));
            }

            let spec = FieldSpec {
                is_final: opt_bool(sexp, "final")?,
                is_static: opt_bool(sexp, "static")?,
                static_cid,
            };

            program.add_field(owner, name, spec).map_err(in_program)?;
        }

        Some("Function") => {
            let name = name_at(sexp, 1)?;
            let kind = function_kind(sexp)?;
            let is_static = opt_bool(sexp, "static")?;

            program
                .add_function(owner, name, kind, is_static)
                .map_err(in_program)?;
        }

        _ => {
            return Err(LoadError::new(
                LoadErrorKind::UnexpectedMember(sexp.tag()),
                sexp.span(),
            ))
        }
    }

    Ok(())
}

/// Elements of a list tagged `tag`.
fn tagged_body<'a>(sexp: &'a SExp, tag: &'static str) -> Result<&'a [SExp], LoadError> {
    match sexp.as_list() {
        Some(list) if sexp.tag() == Some(tag.intern()) => Ok(list.elems()),
        _ => Err(LoadError::new(
            LoadErrorKind::ExpectedTag(tag, sexp.tag()),
            sexp.span(),
        )),
    }
}

/// A name given as either a symbol or a string at position `i`.
fn name_at(sexp: &SExp, i: usize) -> Result<SymbolId, LoadError> {
    let elem = sexp.as_list().and_then(|list| list.get(i));

    elem.and_then(|e| e.as_symbol().or_else(|| e.as_string()))
        .ok_or_else(|| {
            LoadError::new(
                LoadErrorKind::ExpectedName,
                elem.and_then(SExp::span).or_else(|| sexp.span()),
            )
        })
}

fn extra<'a>(sexp: &'a SExp, label: &str) -> Option<&'a SExp> {
    sexp.as_list()
        .and_then(|list| list.extra_lookup_value(label))
}

fn opt_bool(sexp: &SExp, label: &'static str) -> Result<bool, LoadError> {
    match extra(sexp, label) {
        None => Ok(false),
        Some(value) => value.as_bool().ok_or_else(|| {
            LoadError::new(LoadErrorKind::ExpectedBool(label), value.span())
        }),
    }
}

fn opt_cid(sexp: &SExp, label: &'static str) -> Result<Option<ClassId>, LoadError> {
    extra(sexp, label)
        .map(|value| {
            value
                .as_integer()
                .and_then(|n| u32::try_from(n).ok())
                .map(ClassId::new)
                .ok_or_else(|| {
                    LoadError::new(LoadErrorKind::ExpectedCid(label), value.span())
                })
        })
        .transpose()
}

fn function_kind(sexp: &SExp) -> Result<MemberKind, LoadError> {
    let value = match extra(sexp, "kind") {
        None => return Ok(MemberKind::Method),
        Some(value) => value,
    };

    let err = || {
        LoadError::new(LoadErrorKind::InvalidFunctionKind, value.span())
    };

    match value.as_symbol().ok_or_else(err)?.lookup_str() {
        "method" => Ok(MemberKind::Method),
        "getter" => Ok(MemberKind::Getter),
        "setter" => Ok(MemberKind::Setter),
        "dyn" => Ok(MemberKind::DynForwarder),
        _ => Err(err()),
    }
}

/// Error loading a [`Program`] from an S-expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    kind: LoadErrorKind,
    span: Option<Span>,
}

impl LoadError {
    fn new(kind: LoadErrorKind, span: Option<Span>) -> Self {
        Self { kind, span }
    }

    pub fn kind(&self) -> &LoadErrorKind {
        &self.kind
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadErrorKind {
    ExpectedTag(&'static str, Option<SymbolId>),
    ExpectedName,
    ExpectedBool(&'static str),
    ExpectedCid(&'static str),
    InvalidFunctionKind,
    UnexpectedMember(Option<SymbolId>),
    UnknownCid(ClassId),
    Program(ProgramError),
}

impl From<ProgramError> for LoadErrorKind {
    fn from(e: ProgramError) -> Self {
        Self::Program(e)
    }
}

impl Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use LoadErrorKind::*;

        match &self.kind {
            ExpectedTag(tag, Some(found)) => write!(
                f,
                "expected {}, found {}",
                TtQuote::wrap(tag),
                TtQuote::wrap(found)
            ),
            ExpectedTag(tag, None) => {
                write!(f, "expected list tagged {}", TtQuote::wrap(tag))
            }
            ExpectedName => write!(f, "expected name as symbol or string"),
            ExpectedBool(label) => {
                write!(f, "expected boolean for {}", TtQuote::wrap(label))
            }
            ExpectedCid(label) => {
                write!(f, "expected class id for {}", TtQuote::wrap(label))
            }
            InvalidFunctionKind => write!(
                f,
                "function kind must be one of \
                   `method`, `getter`, `setter`, or `dyn`"
            ),
            UnexpectedMember(Some(tag)) => write!(
                f,
                "unexpected {} in program declaration",
                TtQuote::wrap(tag)
            ),
            UnexpectedMember(None) => {
                write!(f, "unexpected form in program declaration")
            }
            UnknownCid(cid) => write!(f, "unknown class id {cid}"),
            Program(e) => Display::fmt(e, f),
        }
    }
}

impl Error for LoadError {}

impl Diagnostic for LoadError {
    fn describe(&self) -> Vec<AnnotatedSpan> {
        self.span.map(|span| span.mark_error()).into_iter().collect()
    }
}
