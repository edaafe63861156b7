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

//! Resolve [`Span`]s into line:column source locations.

use crate::span::{Context, Span};
use memchr::{memchr, memchr_iter, memrchr};
use std::{
    error::Error,
    fmt::Display,
    fs, io,
    num::NonZeroU32,
};
use unicode_width::UnicodeWidthChar;

/// Resolves [`Span`]s into line:column source locations.
///
/// A [`Span`] contains a [`Context`] and raw byte offsets gathered during
///   parsing.
/// These byte offsets can be used to go back to the source text referred
///   to by a [`Context`] to resolve the byte offsets to line and column
///   numbers.
/// This is not done during parsing because this information is only useful
///   in a diagnostic context,
///     which is not the typical happy path.
pub trait SpanResolver {
    /// Resolve the provided [`Span`] into line:column source locations.
    fn resolve(&mut self, span: Span) -> Result<ResolvedSpan, SpanResolverError>;
}

/// A [`Span`] resolved to its source location.
///
/// Only the first line of a span is retained;
///   a span covering a multi-line list is reported at the line where the
///   list opens.
#[derive(Debug, PartialEq, Eq)]
pub struct ResolvedSpan {
    /// The original [`Span`] whose resolution was requested.
    span: Span,

    /// The first line of source text that corresponds to this [`Span`].
    line: SourceLine,
}

impl ResolvedSpan {
    /// Line number representing the offset of the [`Span`].
    pub fn line_num(&self) -> NonZeroU32 {
        self.line.num
    }

    /// Column number(s) relative to the beginning of the first line.
    ///
    /// The column may not be able to be resolved if the line contains
    ///   invalid UTF-8 data.
    pub fn col_num(&self) -> Option<Column> {
        self.line.column
    }

    /// A [`Span`] representing the first line.
    pub fn first_line_span(&self) -> Span {
        self.line.span
    }

    /// [`Context`] of the [`Span`] used for resolution.
    pub fn context(&self) -> Context {
        self.span.context()
    }

    /// The original [`Span`] before resolution.
    pub fn unresolved_span(&self) -> Span {
        self.span
    }

    pub fn line(&self) -> &SourceLine {
        &self.line
    }

    pub fn into_line(self) -> SourceLine {
        self.line
    }
}

/// Source column offsets.
///
/// A "column" is somewhat loosely defined as a terminal cell.
/// Certain unicode characters occupy more than one cell,
///   while others occupy none.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Column {
    /// A range of 1-indexed columns, inclusive.
    Endpoints(NonZeroU32, NonZeroU32),

    /// Immediately before a column.
    ///
    /// This is caused by a zero-length [`Span`],
    ///   such as the end of input.
    Before(NonZeroU32),
}

impl Column {
    /// First column and number of columns to be marked.
    ///
    /// A [`Column::Before`] is marked with a single cell.
    pub fn extent(&self) -> (NonZeroU32, u32) {
        match *self {
            Self::Endpoints(start, end) => {
                (start, end.get().saturating_sub(start.get()) + 1)
            }
            Self::Before(at) => (at, 1),
        }
    }
}

impl Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // Coerces to a single column number.
            Self::Endpoints(at, _) | Self::Before(at) => Display::fmt(at, f),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SourceLine {
    /// 1-indexed line number relative to the entire source [`Context`].
    num: NonZeroU32,

    /// 1-indexed column number(s) relative to the beginning of the line.
    ///
    /// If the line contains invalid UTF-8,
    ///   this may be [`None`].
    column: Option<Column>,

    /// The [`Span`] representing the entire source line.
    span: Span,

    /// Source code text of the line _excluding_ the newline.
    text: Vec<u8>,
}

impl SourceLine {
    pub fn num(&self) -> NonZeroU32 {
        self.num
    }

    pub fn column(&self) -> Option<Column> {
        self.column
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn text(&self) -> &[u8] {
        &self.text
    }
}

/// Resolve a [`Span`] against a source buffer held in memory.
///
/// Flow graph text is typically already in memory by the time an error is
///   reported,
///     so there is no need to read it a second time.
pub struct BufSpanResolver<'a> {
    buf: &'a [u8],
    ctx: Context,
}

impl<'a> BufSpanResolver<'a> {
    pub fn new(buf: &'a [u8], ctx: Context) -> Self {
        Self { buf, ctx }
    }
}

impl<'a> SpanResolver for BufSpanResolver<'a> {
    fn resolve(&mut self, span: Span) -> Result<ResolvedSpan, SpanResolverError> {
        if self.ctx != span.context() {
            return Err(SpanResolverError::ContextMismatch {
                given: span.context(),
                expected: self.ctx,
            });
        }

        resolve_in(self.buf, span)
    }
}

/// Resolve a [`Span`] by reading the file named by its [`Context`].
///
/// The file is read anew for each resolution;
///   this is only expected to happen a handful of times per report.
#[derive(Debug, Default)]
pub struct FsSpanResolver;

impl SpanResolver for FsSpanResolver {
    fn resolve(&mut self, span: Span) -> Result<ResolvedSpan, SpanResolverError> {
        let ctx = span.context();

        if ctx.path_sym().is_none() {
            return Err(SpanResolverError::UnknownContext);
        }

        let buf = fs::read(ctx)?;
        resolve_in(&buf, span)
    }
}

/// Locate the line containing the start of `span` within `buf`.
fn resolve_in(buf: &[u8], span: Span) -> Result<ResolvedSpan, SpanResolverError> {
    let offset = span.offset() as usize;

    if offset > buf.len() {
        return Err(SpanResolverError::OutOfRange(offset));
    }

    let line_start = memrchr(b'\n', &buf[..offset]).map_or(0, |i| i + 1);
    let mut line_end =
        memchr(b'\n', &buf[offset..]).map_or(buf.len(), |i| offset + i);

    if line_end > line_start && buf[line_end - 1] == b'\r' {
        line_end -= 1;
    }

    let text = &buf[line_start..line_end];

    // Saturating will handle billions of lines,
    //   which is not expected to happen,
    //   but avoids a panic at the cost of inaccurate information in the
    //     unlikely event that it does.
    let nlines = memchr_iter(b'\n', &buf[..line_start]).count();
    let num = u32::try_from(nlines)
        .ok()
        .and_then(|n| NonZeroU32::new(n.saturating_add(1)))
        .unwrap_or(NonZeroU32::MAX);

    let span_end = offset.saturating_add(span.len() as usize).min(line_end);
    let column = column_for(
        text,
        offset.min(line_end) - line_start,
        span_end.max(offset.min(line_end)) - line_start,
        span.is_empty(),
    );

    Ok(ResolvedSpan {
        span,
        line: SourceLine {
            num,
            column,
            span: span.context().span_or_zz(line_start, text.len()),
            text: text.to_vec(),
        },
    })
}

/// Compute the visual column(s) of the byte range `[rel_start, rel_end)`
///   within `line`.
///
/// Yields [`None`] if the line is not valid UTF-8 or the offsets do not
///   fall on character boundaries.
fn column_for(
    line: &[u8],
    rel_start: usize,
    rel_end: usize,
    zero_len: bool,
) -> Option<Column> {
    let text = std::str::from_utf8(line).ok()?;

    let width = |s: &str| -> u32 {
        s.chars().map(|c| c.width().unwrap_or(0) as u32).sum()
    };

    let start = NonZeroU32::new(width(text.get(..rel_start)?) + 1)?;

    if zero_len || rel_end <= rel_start {
        return Some(Column::Before(start));
    }

    let end = width(text.get(..rel_end)?).max(start.get());

    Some(Column::Endpoints(start, NonZeroU32::new(end)?))
}

/// An error occurring while attempting to resolve a [`Span`].
#[derive(Debug, PartialEq, Eq)]
pub enum SpanResolverError {
    Io(io::ErrorKind),

    /// The span's context does not name a readable source.
    UnknownContext,

    /// The requested offset lies beyond the end of the source.
    OutOfRange(usize),

    /// The resolver was asked to resolve a span belonging to another
    ///   source.
    ContextMismatch { given: Context, expected: Context },
}

impl From<io::Error> for SpanResolverError {
    fn from(e: io::Error) -> Self {
        Self::Io(e.kind())
    }
}

impl Display for SpanResolverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(kind) => write!(f, "I/O error: {kind}"),
            Self::UnknownContext => {
                write!(f, "source of span is not known")
            }
            Self::OutOfRange(offset) => write!(
                f,
                "offset {offset} is beyond the end of the source text"
            ),
            Self::ContextMismatch { given, expected } => write!(
                f,
                "attempted to read context {given} using resolver \
                    for context {expected}"
            ),
        }
    }
}

impl Error for SpanResolverError {}
