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

//! Rendering of diagnostic information.

// NB: `write!` together with `\n` is preferred to `writeln!` so that there
//   is only a single sequence of characters to search for while tracking
//   down newlines,
//     rather than using both.

use super::{
    resolver::{ResolvedSpan, SourceLine, SpanResolver, SpanResolverError},
    AnnotatedSpan, Diagnostic, Label, Level,
};
use crate::span::{Context, Span};
use std::fmt::{self, Display};

pub trait Reporter {
    /// Render diagnostic report.
    ///
    /// The provided [`Report`] implements [`Display`].
    /// Render it to a [`String`] before writing it out if the output stream
    ///   is shared,
    ///     otherwise the report may become interleaved with other output.
    ///
    /// This method _does not return [`Result`]_ and should never fail.
    /// The report absorbs errors during span resolution and renders those
    ///   errors to the report itself,
    ///     ensuring that the actual diagnostic message is never masked.
    fn render<'d, D: Diagnostic>(&mut self, diagnostic: &'d D)
        -> Report<'d, D>;
}

/// Render diagnostic report in a highly visual way.
///
/// Each annotated span is rendered with its source line,
///   underlined,
///   followed by its labels.
pub struct VisualReporter<R: SpanResolver> {
    resolver: R,
}

impl<R: SpanResolver> VisualReporter<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }
}

impl<R: SpanResolver> Reporter for VisualReporter<R> {
    fn render<'d, D: Diagnostic>(
        &mut self,
        diagnostic: &'d D,
    ) -> Report<'d, D> {
        let mspans = diagnostic
            .describe()
            .into_iter()
            .map(|aspan| {
                let span = aspan.span();
                let slabel = aspan
                    .label()
                    .map(|label| SpanLabel(aspan.level(), into_owned(label)));

                match self.resolver.resolve(span) {
                    Ok(rspan) => MaybeResolvedSpan::Resolved(rspan, slabel),
                    Err(e) => MaybeResolvedSpan::Unresolved(span, slabel, e),
                }
            })
            .collect::<Vec<_>>();

        let mut report = Report::empty(Message(diagnostic));
        report.extend(mspans.into_iter().map(Into::into));
        report
    }
}

/// Labels are copied out of the diagnostic since [`Diagnostic::describe`]
///   produces its spans on demand.
fn into_owned(label: &Label) -> Label<'static> {
    Label::from(label.to_string())
}

#[derive(Debug)]
pub struct Report<'d, D: Diagnostic> {
    msg: Message<'d, D>,
    secs: Vec<Section>,
    level: Level,
}

impl<'d, D: Diagnostic> Report<'d, D> {
    fn empty(msg: Message<'d, D>) -> Self {
        Self {
            msg,
            secs: Vec::new(),
            level: Level::default(),
        }
    }

    /// Most severe level of any section of this report.
    pub fn level(&self) -> Level {
        self.level
    }
}

impl<'d, D: Diagnostic> Extend<Section> for Report<'d, D> {
    fn extend<T: IntoIterator<Item = Section>>(&mut self, secs: T) {
        for sec in secs {
            self.level = self.level.min(sec.level);

            // Add the section if it cannot be squashed into the previous.
            let remain = sec.maybe_squash_into(self.secs.last_mut());
            self.secs.extend(remain);
        }
    }
}

impl<'d, D: Diagnostic> Display for Report<'d, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{level}: {msg}\n", level = self.level, msg = self.msg)?;
        self.secs.iter().try_for_each(|sec| sec.fmt(f))
    }
}

#[derive(Debug)]
struct Message<'d, D: Diagnostic>(&'d D);

impl<'d, D: Diagnostic> Display for Message<'d, D> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(self.0, f)
    }
}

/// A section of a [`Report`] describing a [`Span`].
///
/// Adjacent sections describing the same [`Span`] are squashed
///   (see [`Section::maybe_squash_into`]),
///   but not non-adjacent ones.
#[derive(Debug, PartialEq, Eq)]
struct Section {
    heading: SpanHeading,
    line: Option<SourceLine>,
    labels: Vec<SpanLabel>,
    level: Level,
    span: Span,
}

impl Section {
    /// Squash self into the provided [`Section`] if they represent the same
    ///   [`Span`],
    ///     otherwise do nothing.
    ///
    /// If squashed,
    ///   [`None`] is returned.
    /// Otherwise [`Some`] is returned with `self`.
    fn maybe_squash_into(self, extend: Option<&mut Section>) -> Option<Self> {
        match extend {
            Some(extend_sec) if self.span == extend_sec.span => {
                extend_sec.labels.extend(self.labels);
                None
            }

            _ => Some(self),
        }
    }
}

impl From<MaybeResolvedSpan> for Section {
    fn from(mspan: MaybeResolvedSpan) -> Self {
        let heading = SpanHeading::from(&mspan);
        let mut labels = mspan.system_labels();

        let (span, line, olabel) = match mspan {
            MaybeResolvedSpan::Resolved(rspan, olabel) => {
                (rspan.unresolved_span(), Some(rspan.into_line()), olabel)
            }
            MaybeResolvedSpan::Unresolved(span, olabel, _) => {
                (span, None, olabel)
            }
        };

        let level = olabel.as_ref().map(|l| l.0).unwrap_or_default();

        labels.extend(olabel);

        Section {
            heading,
            line,
            labels,
            level,
            span,
        }
    }
}

impl Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .line
            .as_ref()
            .map_or(1, |line| line.num().to_string().len());
        let gutter = " ".repeat(width + 2);

        write!(f, "  {heading}\n", heading = self.heading)?;

        if let Some(line) = &self.line {
            write!(f, "{gutter}|\n")?;
            write!(
                f,
                " {num:>width$} | {text}\n",
                num = line.num(),
                text = String::from_utf8_lossy(line.text()),
            )?;

            if let Some(col) = line.column() {
                let (start, ncols) = col.extent();
                write!(
                    f,
                    "{gutter}| {pad}{marks}\n",
                    pad = " ".repeat(start.get() as usize - 1),
                    marks = "^".repeat(ncols as usize),
                )?;
            }
        }

        for label in self.labels.iter() {
            write!(f, "{gutter}= {label}\n")?;
        }

        Ok(())
    }
}

/// A [`Span`] that may have been resolved.
///
/// The span will remain unresolved if an error occurred,
///   in which case the error will be provided.
#[derive(Debug, PartialEq, Eq)]
enum MaybeResolvedSpan {
    Resolved(ResolvedSpan, Option<SpanLabel>),
    Unresolved(Span, Option<SpanLabel>, SpanResolverError),
}

impl MaybeResolvedSpan {
    /// We should never mask an error with our own;
    ///   the diagnostic system is supposed to _help_ the user in diagnosing
    ///   problems,
    ///     not hinder them by masking it.
    fn system_labels(&self) -> Vec<SpanLabel> {
        match self {
            Self::Resolved(rspan, _) if rspan.col_num().is_none() => {
                vec![SpanLabel(
                    Level::Help,
                    "unable to calculate columns because the line is \
                        not a valid UTF-8 string"
                        .into(),
                )]
            }

            Self::Unresolved(_, _, e) => {
                vec![SpanLabel(
                    Level::Help,
                    format!(
                        "an error occurred while trying to look up \
                         information about this span: {e}"
                    )
                    .into(),
                )]
            }

            _ => vec![],
        }
    }
}

/// Heading describing the context of a (hopefully resolved) span.
#[derive(Debug, PartialEq, Eq)]
struct SpanHeading(Context, HeadingLineNum);

impl Display for SpanHeading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self(ctx, line) = self;
        write!(f, "--> {ctx}{line}")
    }
}

impl From<&MaybeResolvedSpan> for SpanHeading {
    fn from(mspan: &MaybeResolvedSpan) -> Self {
        match mspan {
            MaybeResolvedSpan::Resolved(rspan, _) => SpanHeading(
                rspan.context(),
                HeadingLineNum::Resolved(
                    rspan.line_num().get(),
                    rspan.col_num().map(|col| col.to_string()),
                ),
            ),

            MaybeResolvedSpan::Unresolved(span, _, _) => {
                SpanHeading(span.context(), HeadingLineNum::Unresolved(*span))
            }
        }
    }
}

/// Span line number or fallback representation.
///
/// If a span could not be resolved,
///   offsets are rendered in place of lines and columns.
#[derive(Debug, PartialEq, Eq)]
enum HeadingLineNum {
    Resolved(u32, Option<String>),
    Unresolved(Span),
}

impl Display for HeadingLineNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved(line_num, Some(col)) => {
                write!(f, ":{line_num}:{col}")
            }
            Self::Resolved(line_num, None) => write!(f, ":{line_num}"),

            // Not ideal,
            //   but the user still has enough information to diagnose the
            //   problem.
            Self::Unresolved(span) => {
                write!(
                    f,
                    " offset {}--{}",
                    span.offset(),
                    span.endpoints_saturated().1.offset(),
                )
            }
        }
    }
}

/// A label describing a span.
#[derive(Debug, PartialEq, Eq)]
struct SpanLabel(Level, Label<'static>);

impl Display for SpanLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self(level, label) = self;
        write!(f, "{level}: {label}")
    }
}
