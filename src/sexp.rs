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

//! S-expression value model.
//!
//! An [`SExp`] is either an atom
//!   (boolean, integer, double, string, or symbol)
//!   or a [list](SList).
//! A list holds an ordered sequence of positional elements and,
//!   in addition,
//!   a map of _extra info_ from symbol labels to values:
//!
//! ```text
//! (CompileType 147 { nullable false, name "T{Smi}" })
//!  ^^^^^^^^^^^^^^^   ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^
//!    positional              extra info
//! ```
//!
//! If the first positional element of a list is a symbol,
//!   it is the list's [_tag_](SExp::tag).
//!
//! Equality is structural and ignores source spans:
//!   positional elements are compared in order,
//!   while extra info is compared as a map,
//!     independent of insertion order.
//!
//! ```
//! use ilsexp::sexp::{SExp, SList};
//!
//! let mut a = SList::tagged("CompileType");
//! a.add(SExp::integer(147));
//! a.add_extra("nullable", SExp::bool(false));
//! a.add_extra("name", SExp::string("T{Smi}"));
//!
//! let mut b = SList::tagged("CompileType");
//! b.add(SExp::integer(147));
//! b.add_extra("name", SExp::string("T{Smi}"));
//! b.add_extra("nullable", SExp::bool(false));
//!
//! assert_eq!(SExp::from(a), SExp::from(b));
//! ```
//!
//! See [`parse`] for the textual grammar and [`print`] for the inverse.

pub mod parse;
pub mod print;

pub use parse::{parse_str, ParseError, ParseErrorKind, SExpParser};

use crate::{
    span::Span,
    sym::{GlobalSymbolIntern, GlobalSymbolResolve, SymbolId},
};

/// An S-expression node.
///
/// Every node carries an optional source [`Span`],
///   which is present for nodes produced by [`SExpParser`] and absent for
///   nodes constructed programmatically.
/// Spans are used only for diagnostics and do not participate in
///   equality.
#[derive(Debug, Clone)]
pub struct SExp {
    kind: SExpKind,
    span: Option<Span>,
}

/// The closed set of S-expression variants.
#[derive(Debug, Clone)]
pub enum SExpKind {
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(SymbolId),
    Symbol(SymbolId),
    List(SList),
}

impl SExp {
    pub fn new(kind: SExpKind) -> Self {
        Self { kind, span: None }
    }

    pub fn bool(value: bool) -> Self {
        Self::new(SExpKind::Bool(value))
    }

    pub fn integer(value: i64) -> Self {
        Self::new(SExpKind::Integer(value))
    }

    pub fn double(value: f64) -> Self {
        Self::new(SExpKind::Double(value))
    }

    /// A string atom holding `value`.
    pub fn string<S: GlobalSymbolIntern>(value: S) -> Self {
        Self::new(SExpKind::String(value.intern()))
    }

    /// A bare symbol `name`.
    pub fn symbol<S: GlobalSymbolIntern>(name: S) -> Self {
        Self::new(SExpKind::Symbol(name.intern()))
    }

    pub fn list(list: SList) -> Self {
        Self::new(SExpKind::List(list))
    }

    /// Associate a source [`Span`] with this node.
    pub fn with_span(self, span: Span) -> Self {
        Self {
            span: Some(span),
            ..self
        }
    }

    pub fn kind(&self) -> &SExpKind {
        &self.kind
    }

    pub fn into_kind(self) -> SExpKind {
        self.kind
    }

    /// Source span,
    ///   if this node was parsed from text.
    pub fn span(&self) -> Option<Span> {
        self.span
    }

    /// Byte offset of the start of this node in its source text,
    ///   if known.
    pub fn start(&self) -> Option<usize> {
        self.span.map(|span| span.offset() as usize)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.kind {
            SExpKind::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self.kind {
            SExpKind::Integer(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self.kind {
            SExpKind::Double(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<SymbolId> {
        match self.kind {
            SExpKind::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<SymbolId> {
        match self.kind {
            SExpKind::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&SList> {
        match &self.kind {
            SExpKind::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut SList> {
        match &mut self.kind {
            SExpKind::List(list) => Some(list),
            _ => None,
        }
    }

    /// Whether this node is the symbol `name`.
    pub fn is_symbol(&self, name: &str) -> bool {
        self.as_symbol()
            .map_or(false, |sym| sym.lookup_str() == name)
    }

    /// The tag of a list:
    ///   its first positional element,
    ///   if that element is a symbol.
    pub fn tag(&self) -> Option<SymbolId> {
        self.as_list().and_then(SList::tag)
    }

    /// Human-readable name of the variant of this node,
    ///   for use in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            SExpKind::Bool(_) => "bool",
            SExpKind::Integer(_) => "integer",
            SExpKind::Double(_) => "double",
            SExpKind::String(_) => "string",
            SExpKind::Symbol(_) => "symbol",
            SExpKind::List(_) => "list",
        }
    }
}

impl PartialEq for SExp {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl PartialEq for SExpKind {
    fn eq(&self, other: &Self) -> bool {
        use SExpKind::*;

        match (self, other) {
            (Bool(a), Bool(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            // NaN is printed and parsed as a value like any other,
            //   so it must compare equal to itself to round-trip.
            (Double(a), Double(b)) => a == b || (a.is_nan() && b.is_nan()),
            (String(a), String(b)) => a == b,
            (Symbol(a), Symbol(b)) => a == b,
            (List(a), List(b)) => a == b,
            _ => false,
        }
    }
}

impl From<SList> for SExp {
    fn from(list: SList) -> Self {
        Self::list(list)
    }
}

impl From<bool> for SExp {
    fn from(value: bool) -> Self {
        Self::bool(value)
    }
}

impl From<i64> for SExp {
    fn from(value: i64) -> Self {
        Self::integer(value)
    }
}

impl From<f64> for SExp {
    fn from(value: f64) -> Self {
        Self::double(value)
    }
}

/// A list of positional elements with an associated extra-info map.
///
/// Extra info is stored in insertion order so that printing is
///   reproducible for a given instance,
///     but equality treats it as an unordered map.
/// Labels are unique within a single list.
#[derive(Debug, Clone, Default)]
pub struct SList {
    elems: Vec<SExp>,
    extra: Vec<(SymbolId, SExp)>,
}

impl SList {
    pub fn new() -> Self {
        Self::default()
    }

    /// A list whose first positional element is the symbol `tag`.
    pub fn tagged<S: GlobalSymbolIntern>(tag: S) -> Self {
        Self {
            elems: vec![SExp::symbol(tag)],
            extra: Vec::new(),
        }
    }

    /// Number of positional elements.
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    /// Whether there are no positional elements.
    ///
    /// A list may be empty yet still hold extra info.
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Positional element at index `i`.
    ///
    /// Panics
    /// ======
    /// Out-of-range access is a caller error;
    ///   check [`SList::len`] first or use [`SList::get`].
    pub fn at(&self, i: usize) -> &SExp {
        &self.elems[i]
    }

    /// Positional element at index `i`,
    ///   if present.
    pub fn get(&self, i: usize) -> Option<&SExp> {
        self.elems.get(i)
    }

    pub fn elems(&self) -> &[SExp] {
        &self.elems
    }

    /// The first positional element,
    ///   if it is a symbol.
    pub fn tag(&self) -> Option<SymbolId> {
        self.elems.first().and_then(SExp::as_symbol)
    }

    /// Append a positional element.
    pub fn add<E: Into<SExp>>(&mut self, elem: E) {
        self.elems.push(elem.into());
    }

    /// Builder-style [`SList::add`].
    pub fn with<E: Into<SExp>>(mut self, elem: E) -> Self {
        self.add(elem);
        self
    }

    /// Add an extra-info entry.
    ///
    /// Panics
    /// ======
    /// Labels must be unique;
    ///   adding a label that is already present is a caller error.
    /// Use [`SList::try_add_extra`] for input that has not been validated.
    pub fn add_extra<S: GlobalSymbolIntern, E: Into<SExp>>(
        &mut self,
        label: S,
        value: E,
    ) {
        let label = label.intern();

        if let Err((label, _)) = self.try_add_extra(label, value.into()) {
            panic!("duplicate extra info label `{label}`");
        }
    }

    /// Builder-style [`SList::add_extra`].
    pub fn with_extra<S: GlobalSymbolIntern, E: Into<SExp>>(
        mut self,
        label: S,
        value: E,
    ) -> Self {
        self.add_extra(label, value);
        self
    }

    /// Add an extra-info entry unless `label` is already present,
    ///   in which case the rejected entry is returned.
    pub fn try_add_extra(
        &mut self,
        label: SymbolId,
        value: SExp,
    ) -> Result<(), (SymbolId, SExp)> {
        if self.extra_has_key_sym(label) {
            return Err((label, value));
        }

        self.extra.push((label, value));
        Ok(())
    }

    pub fn extra_has_key(&self, label: &str) -> bool {
        self.extra_has_key_sym(label.intern())
    }

    pub fn extra_has_key_sym(&self, label: SymbolId) -> bool {
        self.extra.iter().any(|(k, _)| *k == label)
    }

    /// Value of the extra-info entry labeled `label`,
    ///   if present.
    pub fn extra_lookup_value(&self, label: &str) -> Option<&SExp> {
        self.extra_lookup_value_sym(label.intern())
    }

    pub fn extra_lookup_value_sym(&self, label: SymbolId) -> Option<&SExp> {
        self.extra
            .iter()
            .find_map(|(k, v)| (*k == label).then_some(v))
    }

    /// Iterate over extra-info entries in insertion order.
    pub fn extra_iter(&self) -> impl Iterator<Item = (SymbolId, &SExp)> {
        self.extra.iter().map(|(k, v)| (*k, v))
    }

    pub fn extra_len(&self) -> usize {
        self.extra.len()
    }
}

impl PartialEq for SList {
    fn eq(&self, other: &Self) -> bool {
        self.elems == other.elems
            && self.extra.len() == other.extra.len()
            && self.extra.iter().all(|(k, v)| {
                other.extra_lookup_value_sym(*k).map_or(false, |ov| ov == v)
            })
    }
}

#[cfg(test)]
mod test;
