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

//! S-expression parser.
//!
//! The parser converts text into a single top-level [`SExp`],
//!   or fails with the byte offset at which parsing could not continue.
//! Parsing is not resumable after an error.
//!
//! Grammar
//! =======
//! ```text
//! sexp   := atom | list
//! atom   := bool | integer | double | string | symbol
//! list   := '(' sexp* extra? ')'
//! extra  := '{' (symbol sexp ',')* '}'
//! ```
//!
//! A list may contain any number of `{ ... }` blocks interleaved with its
//!   positional elements;
//!     all of their pairs are merged into the list's single extra-info
//!     map,
//!       and so labels must be unique across all blocks of a list.
//! The final pair of a block may omit its trailing comma.
//!
//! Atoms are delimited by whitespace and by the characters `(){},"`.
//! An atom is classified as follows:
//!
//!   - `true` and `false` are [`SExpKind::Bool`];
//!   - `NaN`, `Infinity`, and `-Infinity` are [`SExpKind::Double`];
//!   - an optional `-` followed by one or more digits is an
//!       [`SExpKind::Integer`],
//!         unless it overflows,
//!         in which case it is a [`SExpKind::Double`];
//!   - a token consisting only of digits, signs, `.`, `e`, and `E`
//!       containing a digit and either `.` or an exponent marker is a
//!       [`SExpKind::Double`];
//!   - anything else is a [`SExpKind::Symbol`].
//!
//! Strings are delimited by `"` and support the escapes `\b`, `\f`, `\n`,
//!   `\r`, `\t`, and `\uXXXX` (exactly four hex digits, at most `007F`);
//!   any other escaped character stands for itself.
//!
//! ```
//! use ilsexp::sexp::{parse_str, SExp, SList};
//!
//! let sexp = parse_str(r#"(CompileType { nullable false } 147 { name "T" })"#)?;
//!
//! let expected = SList::tagged("CompileType")
//!     .with(147i64)
//!     .with_extra("nullable", false)
//!     .with_extra("name", SExp::string("T"));
//!
//! assert_eq!(SExp::from(expected), sexp);
//! # Ok::<(), ilsexp::sexp::ParseError>(())
//! ```

use super::{SExp, SExpKind, SList};
use crate::{
    diagnose::{Annotate, AnnotatedSpan, Diagnostic},
    fmt::{DisplayWrapper, TtQuote},
    global,
    span::{Context, Span, UNKNOWN_CONTEXT},
    sym::{GlobalSymbolIntern, SymbolId},
};
use memchr::memchr2;
use std::{error::Error, fmt::Display};

/// Parse a single S-expression from `src` with an unknown source
///   [`Context`].
///
/// Any input following the first complete form is ignored;
///   use [`SExpParser`] directly to detect or consume it.
pub fn parse_str(src: &str) -> Result<SExp, ParseError> {
    SExpParser::new(src, UNKNOWN_CONTEXT).parse()
}

/// Incremental S-expression parser over a source buffer.
///
/// Each call to [`SExpParser::parse`] yields the next top-level form,
///   leaving the parser positioned immediately after it.
pub struct SExpParser<'a> {
    src: &'a str,
    pos: usize,
    ctx: Context,
}

/// A list being built.
struct Frame {
    list: SList,
    start: usize,
    map: Option<MapState>,
}

/// State of an open `{ ... }` block within a [`Frame`].
#[derive(Default)]
struct MapState {
    start: usize,
    label: Option<(SymbolId, usize)>,
    value: Option<SExp>,
}

impl<'a> SExpParser<'a> {
    pub fn new(src: &'a str, ctx: Context) -> Self {
        Self { src, pos: 0, ctx }
    }

    /// Byte offset of the next character to be read.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Whether only whitespace remains.
    ///
    /// This consumes any leading whitespace.
    pub fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos >= self.src.len()
    }

    /// Parse every remaining top-level form.
    pub fn parse_all(&mut self) -> Result<Vec<SExp>, ParseError> {
        let mut forms = Vec::new();

        while !self.at_end() {
            forms.push(self.parse()?);
        }

        Ok(forms)
    }

    /// Parse the next top-level form.
    ///
    /// Parsing stops as soon as the first complete form has been read.
    pub fn parse(&mut self) -> Result<SExp, ParseError> {
        let mut stack: Vec<Frame> =
            Vec::with_capacity(global::INIT_PARSE_STACK_CAPACITY);

        loop {
            self.skip_whitespace();

            let start = self.pos;
            let byte = match self.src.as_bytes().get(start) {
                Some(&byte) => byte,
                None => return Err(self.eof_error(&stack)),
            };

            let completed = match byte {
                b'(' => {
                    self.check_list_start(&stack, start)?;
                    self.pos += 1;

                    stack.push(Frame {
                        list: SList::new(),
                        start,
                        map: None,
                    });

                    None
                }

                b')' => {
                    self.pos += 1;

                    let frame = stack.pop().ok_or_else(|| {
                        self.err(ParseErrorKind::UnexpectedRightParen, start)
                    })?;

                    if let Some(map) = frame.map {
                        return Err(self.err(
                            ParseErrorKind::UnterminatedMap { start: map.start },
                            start,
                        ));
                    }

                    let list = SExp::list(frame.list)
                        .with_span(self.span(frame.start, self.pos));

                    self.complete(&mut stack, list, frame.start)?
                }

                b'{' => {
                    self.pos += 1;
                    self.open_map(&mut stack, start)?;
                    None
                }

                b'}' => {
                    self.pos += 1;
                    self.close_map(&mut stack, start)?;
                    None
                }

                b',' => {
                    self.pos += 1;
                    self.end_pair(&mut stack, start)?;
                    None
                }

                b'"' => {
                    let string = self.parse_string()?;
                    self.complete(&mut stack, string, start)?
                }

                _ => {
                    let atom = self.parse_atom();
                    self.complete(&mut stack, atom, start)?
                }
            };

            if let Some(sexp) = completed {
                return Ok(sexp);
            }
        }
    }

    fn skip_whitespace(&mut self) {
        let bytes = self.src.as_bytes();

        while self.pos < bytes.len() && is_whitespace(bytes[self.pos]) {
            self.pos += 1;
        }
    }

    fn span(&self, start: usize, end: usize) -> Span {
        self.ctx.span_or_zz(start, end - start)
    }

    fn err(&self, kind: ParseErrorKind, offset: usize) -> ParseError {
        ParseError {
            kind,
            offset,
            ctx: self.ctx,
        }
    }

    /// Error for input that ended before a form was complete,
    ///   citing the innermost unterminated construct.
    fn eof_error(&self, stack: &[Frame]) -> ParseError {
        let kind = match stack.last() {
            None => ParseErrorKind::UnexpectedEof,
            Some(Frame {
                map: Some(map), ..
            }) => ParseErrorKind::UnterminatedMap { start: map.start },
            Some(frame) => ParseErrorKind::UnterminatedList {
                start: frame.start,
            },
        };

        self.err(kind, self.src.len())
    }

    /// A list may not appear in label position or after a pair's value.
    fn check_list_start(
        &self,
        stack: &[Frame],
        start: usize,
    ) -> Result<(), ParseError> {
        match stack.last().and_then(|frame| frame.map.as_ref()) {
            Some(MapState { label: None, .. }) => {
                Err(self.err(ParseErrorKind::NonSymbolLabel, start))
            }
            Some(MapState { value: Some(_), .. }) => {
                Err(self.err(ParseErrorKind::ExtraMapValue, start))
            }
            _ => Ok(()),
        }
    }

    /// Deliver a completed form to the enclosing list,
    ///   or return it if it is the top-level form.
    fn complete(
        &self,
        stack: &mut [Frame],
        sexp: SExp,
        start: usize,
    ) -> Result<Option<SExp>, ParseError> {
        let frame = match stack.last_mut() {
            Some(frame) => frame,
            None => return Ok(Some(sexp)),
        };

        match &mut frame.map {
            None => frame.list.add(sexp),

            Some(MapState { label: label @ None, .. }) => {
                let sym = sexp.as_symbol().ok_or_else(|| {
                    self.err(ParseErrorKind::NonSymbolLabel, start)
                })?;

                *label = Some((sym, start));
            }

            Some(MapState { value: Some(_), .. }) => {
                return Err(self.err(ParseErrorKind::ExtraMapValue, start))
            }

            Some(MapState { value, .. }) => *value = Some(sexp),
        }

        Ok(None)
    }

    fn open_map(
        &self,
        stack: &mut [Frame],
        start: usize,
    ) -> Result<(), ParseError> {
        let frame = stack
            .last_mut()
            .ok_or_else(|| self.err(ParseErrorKind::MapOutsideList, start))?;

        if frame.map.is_some() {
            return Err(self.err(ParseErrorKind::NestedMap, start));
        }

        frame.map = Some(MapState {
            start,
            ..Default::default()
        });

        Ok(())
    }

    fn close_map(
        &self,
        stack: &mut [Frame],
        start: usize,
    ) -> Result<(), ParseError> {
        let frame = match stack.last_mut() {
            Some(frame) if frame.map.is_some() => frame,
            _ => {
                return Err(self.err(ParseErrorKind::UnexpectedRightBrace, start))
            }
        };

        match frame.map.take() {
            Some(MapState {
                label: Some((label, _)),
                value: None,
                ..
            }) => Err(self.err(ParseErrorKind::MapPairMissingValue(label), start)),

            Some(MapState {
                label: Some((label, label_start)),
                value: Some(value),
                ..
            }) => self.insert_pair(&mut frame.list, label, label_start, value),

            _ => Ok(()),
        }
    }

    fn end_pair(
        &self,
        stack: &mut [Frame],
        start: usize,
    ) -> Result<(), ParseError> {
        let (list, map) = match stack.last_mut() {
            Some(Frame {
                list,
                map: Some(map),
                ..
            }) => (list, map),
            _ => return Err(self.err(ParseErrorKind::CommaOutsideMap, start)),
        };

        match (map.label.take(), map.value.take()) {
            (None, _) => Err(self.err(ParseErrorKind::MissingLabel, start)),
            (Some((label, _)), None) => {
                Err(self.err(ParseErrorKind::MapPairMissingValue(label), start))
            }
            (Some((label, label_start)), Some(value)) => {
                self.insert_pair(list, label, label_start, value)
            }
        }
    }

    fn insert_pair(
        &self,
        list: &mut SList,
        label: SymbolId,
        label_start: usize,
        value: SExp,
    ) -> Result<(), ParseError> {
        list.try_add_extra(label, value).map_err(|(label, _)| {
            self.err(ParseErrorKind::RepeatedLabel(label), label_start)
        })
    }

    fn parse_string(&mut self) -> Result<SExp, ParseError> {
        let start = self.pos;
        let src = self.src;
        let bytes = src.as_bytes();
        let mut buf = String::new();
        let mut i = start + 1;

        loop {
            let at = match memchr2(b'"', b'\\', &bytes[i..]) {
                Some(found) => i + found,
                None => {
                    return Err(self.err(
                        ParseErrorKind::UnterminatedString { start },
                        self.src.len(),
                    ))
                }
            };

            buf.push_str(&src[i..at]);

            if bytes[at] == b'"' {
                self.pos = at + 1;

                return Ok(SExp::string(buf)
                    .with_span(self.span(start, self.pos)));
            }

            i = self.parse_escape(at, start, &mut buf)?;
        }
    }

    /// Decode the escape sequence whose backslash is at `at`,
    ///   returning the offset following it.
    fn parse_escape(
        &self,
        at: usize,
        start: usize,
        buf: &mut String,
    ) -> Result<usize, ParseError> {
        let escaped = self.src[at + 1..].chars().next().ok_or_else(|| {
            self.err(ParseErrorKind::UnterminatedString { start }, self.src.len())
        })?;

        buf.push(match escaped {
            'b' => '\u{08}',
            'f' => '\u{0c}',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'u' => return self.parse_unicode_escape(at, buf),
            c => c,
        });

        Ok(at + 1 + escaped.len_utf8())
    }

    fn parse_unicode_escape(
        &self,
        at: usize,
        buf: &mut String,
    ) -> Result<usize, ParseError> {
        let digits_start = at + 2;
        let malformed = || self.err(ParseErrorKind::MalformedUnicodeEscape, at);

        let digits = self
            .src
            .as_bytes()
            .get(digits_start..digits_start + 4)
            .ok_or_else(malformed)?;

        let code = digits.iter().try_fold(0u32, |acc, &digit| {
            char::from(digit)
                .to_digit(16)
                .map(|value| acc * 16 + value)
                .ok_or_else(malformed)
        })?;

        match u8::try_from(code) {
            Ok(ascii) if ascii.is_ascii() => buf.push(char::from(ascii)),
            _ => {
                return Err(self
                    .err(ParseErrorKind::UnsupportedUnicodeEscape(code), at))
            }
        }

        Ok(digits_start + 4)
    }

    fn parse_atom(&mut self) -> SExp {
        let start = self.pos;
        let src = self.src;
        let rest = &src.as_bytes()[start..];

        let len = rest
            .iter()
            .position(|&b| is_delimiter(b))
            .unwrap_or(rest.len());

        self.pos = start + len;

        SExp::new(classify_atom(&src[start..self.pos]))
            .with_span(self.span(start, self.pos))
    }
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r')
}

fn is_delimiter(b: u8) -> bool {
    is_whitespace(b) || matches!(b, b'(' | b')' | b'{' | b'}' | b',' | b'"')
}

/// Determine the kind of a bare atom token.
fn classify_atom(token: &str) -> SExpKind {
    match token {
        "true" => return SExpKind::Bool(true),
        "false" => return SExpKind::Bool(false),
        "NaN" => return SExpKind::Double(f64::NAN),
        "Infinity" => return SExpKind::Double(f64::INFINITY),
        "-Infinity" => return SExpKind::Double(f64::NEG_INFINITY),
        _ => (),
    }

    let digits = token.strip_prefix('-').unwrap_or(token);

    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return match token.parse::<i64>() {
            Ok(n) => SExpKind::Integer(n),
            // Overflow; digits alone are always a valid double.
            Err(_) => token
                .parse::<f64>()
                .map(SExpKind::Double)
                .unwrap_or_else(|_| SExpKind::Symbol(token.intern())),
        };
    }

    if is_double_token(token) {
        if let Ok(n) = token.parse::<f64>() {
            return SExpKind::Double(n);
        }
    }

    SExpKind::Symbol(token.intern())
}

fn is_double_token(token: &str) -> bool {
    let bytes = token.as_bytes();

    bytes
        .iter()
        .all(|b| matches!(b, b'0'..=b'9' | b'+' | b'-' | b'.' | b'e' | b'E'))
        && bytes.iter().any(u8::is_ascii_digit)
        && bytes.iter().any(|b| matches!(b, b'.' | b'e' | b'E'))
}

/// Parsing failed at [`ParseError::offset`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    kind: ParseErrorKind,
    offset: usize,
    ctx: Context,
}

impl ParseError {
    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }

    /// Byte offset at which parsing failed.
    ///
    /// For errors caused by premature end of input,
    ///   this is the length of the input.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn context(&self) -> Context {
        self.ctx
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Input contained no form.
    UnexpectedEof,

    UnterminatedString { start: usize },
    UnterminatedList { start: usize },
    UnterminatedMap { start: usize },

    /// `\u` not followed by four hex digits.
    MalformedUnicodeEscape,

    /// `\u` escape outside of the ASCII range.
    UnsupportedUnicodeEscape(u32),

    /// A map label must be a symbol.
    NonSymbolLabel,

    MapPairMissingValue(SymbolId),

    /// A second value followed a map pair's value without an
    ///   intervening comma.
    ExtraMapValue,

    CommaOutsideMap,
    MissingLabel,
    UnexpectedRightParen,
    UnexpectedRightBrace,
    NestedMap,
    MapOutsideList,
    RepeatedLabel(SymbolId),
}

impl Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ParseErrorKind::*;

        match self {
            UnexpectedEof => write!(f, "unexpected end of input"),
            UnterminatedString { start } => write!(
                f,
                "unterminated quoted string starting at offset {start}"
            ),
            UnterminatedList { start } => write!(
                f,
                "unterminated S-expression list starting at offset {start}"
            ),
            UnterminatedMap { start } => write!(
                f,
                "unterminated extra info map starting at offset {start}"
            ),
            MalformedUnicodeEscape => write!(f, "malformed Unicode escape"),
            UnsupportedUnicodeEscape(code) => write!(
                f,
                "unsupported Unicode escape \\u{code:04X} \
                   (only code points up to U+007F are supported)"
            ),
            NonSymbolLabel => write!(f, "non-symbol label in extra info map"),
            MapPairMissingValue(label) => write!(
                f,
                "missing value for extra info label {}",
                TtQuote::wrap(label)
            ),
            ExtraMapValue => {
                write!(f, "extra value following extra info map pair")
            }
            CommaOutsideMap => write!(f, "comma outside of extra info map"),
            MissingLabel => write!(f, "missing label in extra info map pair"),
            UnexpectedRightParen => {
                write!(f, "unexpected {} with no open list", TtQuote::wrap(")"))
            }
            UnexpectedRightBrace => write!(
                f,
                "unexpected {} outside of extra info map",
                TtQuote::wrap("}")
            ),
            NestedMap => write!(f, "nested extra info map"),
            MapOutsideList => {
                write!(f, "extra info map outside of any list")
            }
            RepeatedLabel(label) => write!(
                f,
                "repeated extra info label {}",
                TtQuote::wrap(label)
            ),
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.kind, f)
    }
}

impl Error for ParseError {}

impl Diagnostic for ParseError {
    fn describe(&self) -> Vec<AnnotatedSpan> {
        use ParseErrorKind::*;

        let at = self.ctx.span_or_zz(self.offset, 1);
        let eof = self.ctx.span_or_zz(self.offset, 0);

        match self.kind {
            UnexpectedEof => vec![eof.error("expected an S-expression")],

            UnterminatedString { start } => vec![
                self.ctx
                    .span_or_zz(start, 1)
                    .error("string starts here but is never closed"),
                eof.help("add a closing `\"` or escape any quotes inside"),
            ],

            UnterminatedList { start } => vec![
                eof.error("end of input reached while list is open"),
                self.ctx.span_or_zz(start, 1).note("list starts here"),
                eof.help("add a closing `)`"),
            ],

            UnterminatedMap { start } => vec![
                at.error("extra info map is still open here"),
                self.ctx.span_or_zz(start, 1).note("map starts here"),
                eof.help("close the map with `}` before closing the list"),
            ],

            MalformedUnicodeEscape => vec![self
                .ctx
                .span_or_zz(self.offset, 2)
                .error("expected exactly four hexadecimal digits")],

            UnsupportedUnicodeEscape(_) => vec![self
                .ctx
                .span_or_zz(self.offset, 6)
                .error("use the UTF-8 encoded character directly")],

            RepeatedLabel(_) => {
                vec![at.error("this label was already defined for this list")]
            }

            _ => vec![at.mark_error()],
        }
    }
}

#[cfg(test)]
mod test;
