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

//! Mapping to source input byte intervals.
//!
//! A [`Span`] is a mapping to a byte interval within a source buffer,
//!   representing where an S-expression originated.
//! This underpins the diagnostic system;
//!   every parser error and every deserializer error carries byte offsets
//!   rather than lines and columns,
//!     which are resolved only when a report is rendered
//!     (see [`crate::diagnose`]).
//!
//! A span contains a [`Context`] representing the source location,
//!   such as a file path.
//!
//! ```
//! use ilsexp::span::{Span, Context};
//! use ilsexp::sym::GlobalSymbolIntern;
//!
//! let ctx: Context = "some/graph.sexp".intern().into();
//! let span = Span::new(2, 6, ctx);
//!
//! assert_eq!(2, span.offset());
//! assert_eq!(6, span.len());
//! assert_eq!(ctx, span.context());
//!
//! // Freely copyable
//! let cp = span;
//! assert_eq!(cp, span);
//! ```
//!
//! A span is ordered first by [`Context`],
//!   then by offset,
//!   and finally by length.
//! The deserializer relies on this ordering to report the _earliest_
//!   dangling use of an SSA value.

use crate::{
    global,
    sym::{GlobalSymbolResolve, SymbolId},
};
use std::{fmt::Display, path::Path};

/// Size of a [`Span`]'s `offset` field.
pub type SpanOffsetSize = global::SourceFileSize;

/// Size of a [`Span`]'s `len` field.
pub type SpanLenSize = global::ExprLength;

/// Description of a source location and byte interval for some
///   S-expression.
///
/// See the [module-level documentation](self) for more information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    /// Context onto which byte offsets are mapped,
    ///   such as a source file.
    ctx: Context,

    /// Starting 0-indexed byte position, inclusive.
    offset: SpanOffsetSize,

    /// Length in bytes.
    len: SpanLenSize,
}

impl Span {
    /// Create a new span from its constituent parts.
    pub fn new<C: Into<Context>>(
        offset: SpanOffsetSize,
        len: SpanLenSize,
        ctx: C,
    ) -> Self {
        Self {
            ctx: ctx.into(),
            offset,
            len,
        }
    }

    /// Byte offset of the beginning of the span relative to its context.
    pub fn offset(&self) -> SpanOffsetSize {
        self.offset
    }

    /// Length of the span in bytes.
    ///
    /// The interval of the span is `[offset, offset+len)`.
    pub fn len(&self) -> SpanLenSize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The context to which the span applies.
    pub fn context(&self) -> Context {
        self.ctx
    }

    /// Create two zero-length spans representing respectively the first and
    ///   last offsets in the span,
    ///     saturating the ending offset if it cannot be represented by
    ///     [`SpanOffsetSize`].
    ///
    /// ```
    /// # use ilsexp::span::{Span, Context};
    /// # use ilsexp::sym::GlobalSymbolIntern;
    /// #
    /// # let ctx: Context = "some/path/foo".intern().into();
    /// #
    /// // [0123456789]
    /// //    [---]
    /// //    2   6
    /// let a = Span::new(2, 6, ctx);
    ///
    /// assert_eq!(
    ///   a.endpoints_saturated(),
    ///   (Span::new(2, 0, ctx), Span::new(8, 0, ctx)),
    /// );
    /// ```
    pub fn endpoints_saturated(self) -> (Self, Self) {
        (
            Self { len: 0, ..self },
            Self {
                offset: self.offset.saturating_add(self.len),
                len: 0,
                ..self
            },
        )
    }

    /// Adjust span such that its offset is relative to the provided span.
    ///
    /// If the provided `rel_span` does not precede this span,
    ///   or the two spans do not share the same [`Context`],
    ///   [`None`] will be returned.
    pub fn relative_to(self, rel_span: Span) -> Option<Self> {
        if self.ctx != rel_span.ctx || self.offset < rel_span.offset {
            return None;
        }

        Some(Self {
            offset: self.offset - rel_span.offset,
            ..self
        })
    }

    /// Merge with another span `b` such that the combined span begins at
    ///   the offset of the earlier of the two spans and extends to the end
    ///   of the later of the two.
    ///
    /// Both spans must have the same [`Context`],
    ///   otherwise the result will be [`None`].
    pub fn merge(self, b: Span) -> Option<Span> {
        if self.ctx != b.ctx {
            return None;
        }

        if self.offset > b.offset {
            return b.merge(self);
        }

        let end = b.offset.checked_add(b.len)?;
        let self_end = self.offset.checked_add(self.len)?;

        Some(Self {
            len: end.max(self_end) - self.offset,
            ..self
        })
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let end = self.offset as usize + self.len as usize;
        write!(f, "[{} offset {}-{}]", self.ctx, self.offset, end)
    }
}

/// A placeholder span indicating that a span is expected but is not yet
///   known.
pub const UNKNOWN_SPAN: Span = UNKNOWN_CONTEXT.span(0, 0);

/// Context for byte offsets (e.g. a source file).
///
/// A context is lifetime-free and [`Copy`]-able,
///   with the assumption that an interned path will only need to be
///   resolved to its underlying value in a diagnostic context.
///
/// Flow graph text is often produced in memory and never written to a
///   file,
///     so the context may be unknown.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct Context(Option<SymbolId>);

impl Context {
    /// Produce a [`Span`] within the given context.
    #[inline]
    pub const fn span(self, offset: SpanOffsetSize, len: SpanLenSize) -> Span {
        Span {
            ctx: self,
            offset,
            len,
        }
    }

    /// Attempt to produce a [`Span`] of the given length at the given
    ///   offset,
    ///     otherwise fall back to a `(0,0)` (ZZ) span.
    ///
    /// If the offset can be represented but not the length,
    ///   then a zero-length span at that offset will be produced,
    ///   which still provides useful information.
    #[inline]
    pub fn span_or_zz(self, offset: usize, len: usize) -> Span {
        match SpanOffsetSize::try_from(offset) {
            Ok(offset) => self.span(offset, len.try_into().unwrap_or(0)),
            Err(_) => self.span(0, 0),
        }
    }

    /// The interned path of this context,
    ///   if known.
    pub fn path_sym(&self) -> Option<SymbolId> {
        self.0
    }
}

/// A placeholder context indicating that the source of a span is unknown,
///   such as text produced in memory.
pub const UNKNOWN_CONTEXT: Context = Context(None);

impl From<SymbolId> for Context {
    fn from(sym: SymbolId) -> Self {
        Self(Some(sym))
    }
}

impl From<&str> for Context {
    fn from(s: &str) -> Self {
        use crate::sym::GlobalSymbolIntern;
        Self(Some(s.intern()))
    }
}

impl Display for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(sym) => Display::fmt(&sym, f),
            None => write!(f, "<unknown>"),
        }
    }
}

impl AsRef<Path> for Context {
    fn as_ref(&self) -> &Path {
        Path::new(self.0.map(|sym| sym.lookup_str()).unwrap_or(""))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn span_ordering() {
        let ctx = Context::from("span/order");

        let a = ctx.span(2, 6);
        let b = ctx.span(10, 5);
        let c = ctx.span(10, 4);
        let f = ctx.span(5, 7);

        let mut spans = vec![a, b, c, f];
        spans.sort();

        assert_eq!(spans, vec![a, f, c, b]);
    }

    #[test]
    fn merge_overlapping_and_contained() {
        let ctx = Context::from("span/merge");

        assert_eq!(
            Some(ctx.span(2, 10)),
            ctx.span(8, 4).merge(ctx.span(2, 3)),
        );

        // Contained entirely within the first.
        assert_eq!(Some(ctx.span(2, 10)), ctx.span(2, 10).merge(ctx.span(4, 1)));
    }

    #[test]
    fn merge_different_contexts() {
        let a = Context::from("span/merge-a").span(1, 1);
        let b = Context::from("span/merge-b").span(1, 1);

        assert_eq!(None, a.merge(b));
    }

    #[test]
    fn relative_to_preceding_span() {
        let ctx = Context::from("span/rel");

        assert_eq!(Some(ctx.span(3, 2)), ctx.span(8, 2).relative_to(ctx.span(5, 9)));
        assert_eq!(None, ctx.span(4, 2).relative_to(ctx.span(5, 9)));
    }

    #[test]
    fn span_or_zz_with_large_offset() {
        let ctx = Context::from("span/zz");

        assert_eq!(ctx.span(0, 0), ctx.span_or_zz(usize::MAX, 5));
        assert_eq!(ctx.span(5, 2), ctx.span_or_zz(5, 2));
    }

    #[test]
    fn unknown_context_display() {
        assert_eq!("<unknown>", UNKNOWN_CONTEXT.to_string());
        assert_eq!("[<unknown> offset 0-0]", UNKNOWN_SPAN.to_string());
    }
}
