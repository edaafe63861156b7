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

//! Deserialization errors.
//!
//! Deserialization fails on the first error encountered.
//! The error retains a copy of the offending S-expression so that it can
//!   be reported with its source location
//!     (if it was parsed from text)
//!   or printed on its own
//!     (if it was constructed programmatically).

use crate::{
    diagnose::{Annotate, AnnotatedSpan, Diagnostic},
    fmt::{DisplayWrapper, OrList, TtQuote},
    il::{BinaryOpKind, BlockId, BlockKind, Representation, SsaIndex},
    program::{CanonicalName, CanonicalNameError},
    sexp::SExp,
    span::Span,
    sym::SymbolId,
};
use std::{error::Error, fmt::Display};

/// Deserialization of a flow graph failed at [`DeserializeError::at`].
#[derive(Debug, Clone, PartialEq)]
pub struct DeserializeError {
    kind: DeserializeErrorKind,
    at: SExp,
}

impl DeserializeError {
    pub(super) fn new(kind: DeserializeErrorKind, at: &SExp) -> Self {
        Self {
            kind,
            at: at.clone(),
        }
    }

    pub fn kind(&self) -> &DeserializeErrorKind {
        &self.kind
    }

    /// The S-expression that caused the failure.
    pub fn at(&self) -> &SExp {
        &self.at
    }

    pub fn span(&self) -> Option<Span> {
        self.at.span()
    }

    /// Path from `root` to [`DeserializeError::at`],
    ///   if it can be found.
    ///
    /// Nodes are matched by source span when available and structurally
    ///   otherwise,
    ///     in which case the first structural match in depth-first order
    ///     is used.
    pub fn path_from_root(&self, root: &SExp) -> Option<Vec<PathElem>> {
        let mut path = Vec::new();

        find_path(root, &self.at, &mut path).then_some(path)
    }
}

fn find_path(node: &SExp, target: &SExp, path: &mut Vec<PathElem>) -> bool {
    let found = match target.span() {
        Some(span) => node.span() == Some(span),
        None => node == target,
    };

    if found {
        return true;
    }

    let Some(list) = node.as_list() else {
        return false;
    };

    for (i, elem) in list.elems().iter().enumerate() {
        path.push(PathElem::Index(i));

        if find_path(elem, target, path) {
            return true;
        }

        path.pop();
    }

    for (label, value) in list.extra_iter() {
        path.push(PathElem::Extra(label));

        if find_path(value, target, path) {
            return true;
        }

        path.pop();
    }

    false
}

/// Step from a list to one of its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathElem {
    /// Positional element.
    Index(usize),

    /// Extra-info value.
    Extra(SymbolId),
}

impl Display for PathElem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Extra(label) => write!(f, "{{{label}}}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeserializeErrorKind {
    /// A list with one of the given tags was expected.
    ExpectedTag(&'static [&'static str]),

    /// Some other kind of node was expected.
    Expected(&'static str),

    MissingElement {
        index: usize,
        what: &'static str,
    },
    MissingField(&'static str),
    MissingSection(&'static str),
    DuplicateSection(&'static str),
    UnexpectedElement,
    OutOfRange(&'static str),

    /// A symbol is not one of the names permitted in this position.
    UnknownSymbol {
        what: &'static str,
        allowed: &'static [&'static str],
    },
    UnknownInstruction(SymbolId),
    InvalidCid(i64),
    Name(CanonicalNameError),

    ReservedBlock,

    /// Block ids are too sparse for the number of blocks in the graph.
    BlockIdTooLarge {
        id: BlockId,
        limit: usize,
    },
    DuplicateEntry(BlockId),
    DuplicateBlock(BlockId),
    UndefinedBlock(BlockId),
    UnreachableBlock(BlockId),
    BlockTypeMismatch(BlockId, BlockKind),

    DuplicateDefinition(SsaIndex),
    UseBeforeDefinition(SsaIndex),
    UndefinedUse(SsaIndex),
    NoInheritedType(SsaIndex),
    ConflictingValueType,
    ConflictingConstantRefinement(SsaIndex),
    NotADefinition(&'static str),

    ConstantOutsidePool,
    PhiOutsideJoin,
    PhiAfterInstruction,
    OnlyPhis,
    MissingControl,
    InstructionAfterControl,
    InvalidGotoTarget(BlockId, BlockKind),
    InvalidBranchTarget(BlockId, BlockKind),
    TargetPredecessors(BlockId, usize),
    PhiArity {
        expected: usize,
        found: usize,
    },

    InvalidRange,
    UnknownTypeHash(i64),
    DuplicateTypeHash(i64),
    IcEntryArity {
        expected: usize,
        found: usize,
    },
    TooManyArgumentNames,
    UnsupportedOp(BinaryOpKind, Representation),

    FieldNotInClass(CanonicalName, CanonicalName),
    NonFinalField(CanonicalName),
    IllTypedField(CanonicalName),
    StaticFieldMismatch {
        field: CanonicalName,
        expected_static: bool,
    },
}

impl From<CanonicalNameError> for DeserializeErrorKind {
    fn from(e: CanonicalNameError) -> Self {
        Self::Name(e)
    }
}

impl Display for DeserializeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use DeserializeErrorKind::*;

        match &self.kind {
            ExpectedTag(tags) => match self.at.tag() {
                Some(found) => write!(
                    f,
                    "expected {}, found {}",
                    OrList::<TtQuote>::wrap(tags),
                    TtQuote::wrap(found),
                ),
                None => write!(
                    f,
                    "expected list tagged {}, found {}",
                    OrList::<TtQuote>::wrap(tags),
                    self.at.kind_name(),
                ),
            },
            Expected(what) => {
                write!(f, "expected {what}, found {}", self.at.kind_name())
            }
            MissingElement { index, what } => {
                write!(f, "missing {what} at position {index}")
            }
            MissingField(label) => {
                write!(f, "missing required field {}", TtQuote::wrap(label))
            }
            MissingSection(tag) => {
                write!(f, "missing required {} section", TtQuote::wrap(tag))
            }
            DuplicateSection(tag) => {
                write!(f, "multiple {} sections found", TtQuote::wrap(tag))
            }
            UnexpectedElement => write!(f, "unexpected element"),
            OutOfRange(what) => write!(f, "{what} out of range"),
            UnknownSymbol { what, allowed } => write!(
                f,
                "unknown {what}; expected {}",
                OrList::<TtQuote>::wrap(allowed),
            ),
            UnknownInstruction(tag) => {
                write!(f, "unhandled instruction {}", TtQuote::wrap(tag))
            }
            InvalidCid(cid) => write!(f, "invalid class id {cid}"),
            Name(e) => Display::fmt(e, f),

            ReservedBlock => write!(
                f,
                "block {} is reserved for the graph entry",
                BlockId::GRAPH_ENTRY
            ),
            BlockIdTooLarge { id, limit } => write!(
                f,
                "block id {id} exceeds the limit of {limit} for this graph"
            ),
            DuplicateEntry(_) => write!(f, "multiple entries for block found"),
            DuplicateBlock(id) => {
                write!(f, "multiple definitions of block {id} found")
            }
            UndefinedBlock(id) => {
                write!(f, "reference to undefined block {id}")
            }
            UnreachableBlock(_) => write!(f, "block unreachable in flow graph"),
            BlockTypeMismatch(id, kind) => write!(
                f,
                "block type of {id} contradicts its declaration as {kind}"
            ),

            DuplicateDefinition(ssa) => {
                write!(f, "multiple definitions of {} found", TtQuote::wrap(ssa))
            }
            UseBeforeDefinition(_) => write!(f, "found use prior to definition"),
            UndefinedUse(_) => {
                write!(f, "no definition found for use in flow graph")
            }
            NoInheritedType(ssa) => write!(
                f,
                "value inherits type of {}, which has no type",
                TtQuote::wrap(ssa)
            ),
            ConflictingValueType => write!(
                f,
                "value cannot both inherit its type and declare a type"
            ),
            ConflictingConstantRefinement(ssa) => write!(
                f,
                "refinement conflicts with that of equal constant {}",
                TtQuote::wrap(ssa)
            ),
            NotADefinition(tag) => write!(
                f,
                "instruction {} does not define a value",
                TtQuote::wrap(tag)
            ),

            ConstantOutsidePool => write!(
                f,
                "constant definition outside of the constant pool"
            ),
            PhiOutsideJoin => write!(f, "phi definition outside of join block"),
            PhiAfterInstruction => {
                write!(f, "phi definition following non-phi instruction")
            }
            OnlyPhis => write!(f, "block contains only phi definitions"),
            MissingControl => {
                write!(f, "block does not end with a control instruction")
            }
            InstructionAfterControl => {
                write!(f, "instruction following control instruction")
            }
            InvalidGotoTarget(id, kind) => {
                write!(f, "goto target {id} is a {kind} block, not a join")
            }
            InvalidBranchTarget(id, kind) => write!(
                f,
                "branch target {id} is a {kind} block, not a target"
            ),
            TargetPredecessors(id, n) => write!(
                f,
                "target block {id} must have exactly one predecessor, \
                    but has {n}"
            ),
            PhiArity { expected, found } => write!(
                f,
                "phi has {found} input(s), but its block has \
                    {expected} predecessor(s)"
            ),

            InvalidRange => {
                write!(f, "range lower bound exceeds upper bound")
            }
            UnknownTypeHash(hash) => write!(
                f,
                "reference to recursive type with unknown hash {hash}"
            ),
            DuplicateTypeHash(hash) => {
                write!(f, "recursive type hash {hash} is already in use")
            }
            IcEntryArity { expected, found } => write!(
                f,
                "inline cache entry has {found} class id(s), \
                    but {expected} argument(s) are tested"
            ),
            TooManyArgumentNames => {
                write!(f, "more argument names than arguments")
            }
            UnsupportedOp(op, rep) => write!(
                f,
                "operator {} is not supported by {}",
                TtQuote::wrap(op),
                TtQuote::wrap(rep.binary_op_tag()),
            ),

            FieldNotInClass(field, class) => write!(
                f,
                "field {} does not belong to class {}",
                TtQuote::wrap(field),
                TtQuote::wrap(class),
            ),
            NonFinalField(_) => write!(f, "non-final field in constant instance"),
            IllTypedField(_) => write!(f, "ill-typed field initialization"),
            StaticFieldMismatch {
                field,
                expected_static: true,
            } => write!(f, "field {} is not static", TtQuote::wrap(field)),
            StaticFieldMismatch {
                field,
                expected_static: false,
            } => write!(
                f,
                "static field {} used as an instance slot",
                TtQuote::wrap(field)
            ),
        }
    }
}

impl Error for DeserializeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            DeserializeErrorKind::Name(e) => Some(e),
            _ => None,
        }
    }
}

impl Diagnostic for DeserializeError {
    fn describe(&self) -> Vec<AnnotatedSpan> {
        use DeserializeErrorKind::*;

        let Some(span) = self.at.span() else {
            return vec![];
        };

        match &self.kind {
            UnreachableBlock(id) => vec![
                span.error(format!("no entry or branch reaches {id}")),
            ],
            UndefinedUse(ssa) => {
                vec![span.error(format!("{ssa} is never defined"))]
            }
            UseBeforeDefinition(ssa) => vec![
                span.error(format!("{ssa} is not yet defined here")),
                span.help(
                    "environments may only refer to values defined \
                        before them",
                ),
            ],
            DuplicateEntry(id) => vec![
                span.error(format!("{id} was already declared as an entry")),
            ],
            NonFinalField(field) => vec![
                span.error(format!("{field} is not final")),
                span.help("only final fields may be initialized by a constant"),
            ],
            IllTypedField(field) => vec![span.error(format!(
                "value is incompatible with the declared type of {field}"
            ))],
            UnknownInstruction(_) => vec![
                span.mark_error(),
                span.help(
                    "handled instructions are listed in \
                        `ilsexp::il::INSTRUCTION_TAGS`",
                ),
            ],
            _ => vec![span.mark_error()],
        }
    }
}
