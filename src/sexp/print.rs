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

//! S-expression printer.
//!
//! Two forms are provided:
//!
//!   - [`SExp::to_line`] (and [`Display`]) produces the compact form on a
//!       single line; and
//!   - [`SExp::serialize_to`] wraps lists to fit within a target width.
//!
//! Width affects only whitespace;
//!   the output of either form parses back into an equal [`SExp`].
//!
//! ```
//! use ilsexp::sexp::{parse_str, SExp, SList};
//!
//! let sexp = SExp::from(
//!     SList::tagged("Block")
//!         .with(SExp::symbol("B1"))
//!         .with_extra("block_type", SExp::symbol("Join")),
//! );
//!
//! assert_eq!("(Block B1 { block_type Join })", sexp.to_line());
//! assert_eq!("(Block B1\n  { block_type Join })", sexp.serialize_to(20));
//! assert_eq!(Ok(sexp.clone()), parse_str(&sexp.serialize_to(20)));
//! ```
//!
//! Wrapping is greedy:
//!   siblings are packed onto the current line until one does not fit,
//!     at which point a new line is started at the sibling's indentation
//!     (one column past the opening paren for positional elements,
//!       two for extra info).
//! If a sibling does not fit even on a line of its own,
//!   it is itself broken across lines.

use super::{SExp, SExpKind, SList};
use crate::{global, sym::GlobalSymbolResolve};
use std::fmt::{self, Display, Write};
use unicode_width::UnicodeWidthStr;

impl SExp {
    /// Compact single-line form.
    pub fn to_line(&self) -> String {
        self.to_string()
    }

    /// Form wrapped to fit within `width` columns where possible.
    ///
    /// Atoms are never broken,
    ///   so a line may exceed `width` if an atom is wider than the space
    ///   available to it.
    pub fn serialize_to(&self, width: usize) -> String {
        let mut layout = Layout {
            out: String::new(),
            col: 0,
            width,
        };

        layout.emit(self, 0);
        layout.out
    }

    /// [`SExp::serialize_to`] using [`global::DEFAULT_PRINT_WIDTH`].
    pub fn to_pretty(&self) -> String {
        self.serialize_to(global::DEFAULT_PRINT_WIDTH)
    }
}

impl Display for SExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            SExpKind::Bool(b) => write!(f, "{b}"),
            SExpKind::Integer(n) => write!(f, "{n}"),
            SExpKind::Double(n) => write_double(*n, f),
            SExpKind::String(s) => write_quoted(s.lookup_str(), f),
            SExpKind::Symbol(s) => f.write_str(s.lookup_str()),
            SExpKind::List(list) => Display::fmt(list, f),
        }
    }
}

impl Display for SList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('(')?;

        for (i, elem) in self.elems().iter().enumerate() {
            if i > 0 {
                f.write_char(' ')?;
            }

            Display::fmt(elem, f)?;
        }

        if self.extra_len() > 0 {
            if !self.is_empty() {
                f.write_char(' ')?;
            }

            f.write_str("{ ")?;

            for (i, (label, value)) in self.extra_iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }

                write!(f, "{label} {value}")?;
            }

            f.write_str(" }")?;
        }

        f.write_char(')')
    }
}

/// Write a double such that it will be parsed back as a double.
fn write_double(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        return f.write_str("NaN");
    } else if n.is_infinite() {
        return f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" });
    }

    let abs = n.abs();

    if abs >= 1e16 || (abs != 0.0 && abs < 1e-5) {
        return write!(f, "{n:e}");
    }

    let s = n.to_string();
    f.write_str(&s)?;

    if !s.contains('.') {
        f.write_str(".0")?;
    }

    Ok(())
}

fn write_quoted(s: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_char('"')?;

    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\u{08}' => f.write_str("\\b")?,
            '\u{0c}' => f.write_str("\\f")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c.is_ascii_control() => write!(f, "\\u{:04X}", c as u32)?,
            c => f.write_char(c)?,
        }
    }

    f.write_char('"')
}

/// Greedy line-wrapping state.
struct Layout {
    out: String,
    col: usize,
    width: usize,
}

impl Layout {
    fn push(&mut self, s: &str) {
        self.out.push_str(s);
        self.col += s.width();
    }

    fn newline(&mut self, indent: usize) {
        self.out.push('\n');
        self.out.extend(std::iter::repeat(' ').take(indent));
        self.col = indent;
    }

    fn fits(&self, s: &str) -> bool {
        self.col + s.width() <= self.width
    }

    fn emit(&mut self, sexp: &SExp, indent: usize) {
        let line = sexp.to_line();

        match sexp.as_list() {
            Some(list) if !self.fits(&line) => self.emit_list(list, indent),
            _ => self.push(&line),
        }
    }

    fn emit_list(&mut self, list: &SList, indent: usize) {
        self.push("(");

        for (i, elem) in list.elems().iter().enumerate() {
            self.piece(i > 0, indent + 1, "", elem, "");
        }

        let n = list.extra_len();

        for (i, (label, value)) in list.extra_iter().enumerate() {
            let prefix = match i {
                0 => format!("{{ {label} "),
                _ => format!("{label} "),
            };
            let suffix = if i + 1 == n { " }" } else { "," };

            self.piece(i > 0 || !list.is_empty(), indent + 2, &prefix, value, suffix);
        }

        self.push(")");
    }

    /// Place `sexp`,
    ///   surrounded by `prefix` and `suffix`,
    ///   after a space on the current line if `sep` and it fits;
    ///     on a new line at `indent` if it fits there;
    ///     or otherwise broken across lines.
    fn piece(
        &mut self,
        sep: bool,
        indent: usize,
        prefix: &str,
        sexp: &SExp,
        suffix: &str,
    ) {
        let text = format!("{prefix}{sexp}{suffix}");

        if sep {
            if self.col + 1 + text.width() <= self.width {
                self.push(" ");
                self.push(&text);
                return;
            }

            self.newline(indent);
        }

        if self.fits(&text) {
            self.push(&text);
            return;
        }

        self.push(prefix);
        let col = self.col;
        self.emit(sexp, col);
        self.push(suffix);
    }
}

#[cfg(test)]
mod test;
