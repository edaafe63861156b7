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

//! Canonical names of program entities.
//!
//! Flow graph text refers to libraries, classes, fields, and functions by
//!   a _canonical name_:
//!
//! ```text
//! name   := lib "::" rest
//! rest   := class | class "." field | class ":" member
//! member := [ "get:" | "set:" | "dyn:" ] ident
//! ```
//!
//! The library URL is everything preceding the first `::`,
//!   which permits URLs such as `dart:core` and `file:///main.dart`.
//! An empty class denotes a top-level member of the library.
//!
//! ```
//! use ilsexp::program::{CanonicalName, MemberKind};
//!
//! let name = CanonicalName::parse("dart:core::_List:get:length")?;
//!
//! assert_eq!("dart:core", name.library().to_string());
//! assert_eq!(Some("_List"), name.class().map(|c| c.to_string()).as_deref());
//! assert_eq!(Some(MemberKind::Getter), name.member_kind());
//! assert_eq!("dart:core::_List:get:length", name.to_string());
//! # Ok::<(), ilsexp::program::CanonicalNameError>(())
//! ```
//!
//! Closures have no stable name and so cannot be resolved;
//!   names mentioning `<anonymous closure>` are rejected outright.

use crate::{
    fmt::{DisplayWrapper, TtQuote},
    sym::{GlobalSymbolIntern, SymbolId},
};
use std::{error::Error, fmt::Display};

const ANONYMOUS_CLOSURE: &str = "<anonymous closure>";

/// A parsed canonical name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanonicalName {
    library: SymbolId,
    class: Option<SymbolId>,
    member: Option<(MemberKind, SymbolId)>,
}

/// The kind of member named,
///   as determined by its separator and prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// `Class.field`
    Field,
    /// `Class:method`
    Method,
    /// `Class:get:name`
    Getter,
    /// `Class:set:name`
    Setter,
    /// `Class:dyn:name`;
    ///   a dynamic invocation forwarder for the method `name`.
    DynForwarder,
}

impl MemberKind {
    fn prefix(&self) -> &'static str {
        match self {
            Self::Field => ".",
            Self::Method => ":",
            Self::Getter => ":get:",
            Self::Setter => ":set:",
            Self::DynForwarder => ":dyn:",
        }
    }
}

impl CanonicalName {
    /// Name of a class.
    pub fn class_name(library: SymbolId, class: SymbolId) -> Self {
        Self {
            library,
            class: Some(class),
            member: None,
        }
    }

    /// Name of a member of `class`,
    ///   or of the library itself if `class` is [`None`].
    pub fn member_name(
        library: SymbolId,
        class: Option<SymbolId>,
        kind: MemberKind,
        member: SymbolId,
    ) -> Self {
        Self {
            library,
            class,
            member: Some((kind, member)),
        }
    }

    pub fn parse(name: &str) -> Result<Self, CanonicalNameError> {
        use CanonicalNameError::*;

        if name.contains(ANONYMOUS_CLOSURE) {
            return Err(AnonymousClosure);
        }

        let (library, rest) =
            name.split_once("::").ok_or(MissingLibrarySeparator)?;

        if library.is_empty() {
            return Err(EmptyLibrary);
        }

        let library = library.intern();

        let (class, sep, after) = match rest.find(|c| c == '.' || c == ':') {
            None if rest.is_empty() => return Err(EmptyMember),
            None => {
                return Ok(Self::class_name(library, rest.intern()));
            }
            Some(i) => (&rest[..i], &rest[i..i + 1], &rest[i + 1..]),
        };

        let (kind, ident) = match sep {
            "." => (MemberKind::Field, after),
            _ => [
                ("get:", MemberKind::Getter),
                ("set:", MemberKind::Setter),
                ("dyn:", MemberKind::DynForwarder),
            ]
            .into_iter()
            .find_map(|(prefix, kind)| {
                after.strip_prefix(prefix).map(|ident| (kind, ident))
            })
            .unwrap_or((MemberKind::Method, after)),
        };

        if ident.is_empty() {
            return Err(EmptyMember);
        }

        let class = (!class.is_empty()).then(|| class.intern());

        Ok(Self::member_name(library, class, kind, ident.intern()))
    }

    pub fn library(&self) -> SymbolId {
        self.library
    }

    /// Class component,
    ///   or [`None`] for top-level members.
    pub fn class(&self) -> Option<SymbolId> {
        self.class
    }

    pub fn member(&self) -> Option<SymbolId> {
        self.member.map(|(_, ident)| ident)
    }

    pub fn member_kind(&self) -> Option<MemberKind> {
        self.member.map(|(kind, _)| kind)
    }

    /// Whether this names a class rather than a member.
    pub fn is_class(&self) -> bool {
        self.member.is_none()
    }
}

impl Display for CanonicalName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::", self.library)?;

        if let Some(class) = self.class {
            write!(f, "{class}")?;
        }

        match self.member {
            Some((kind, ident)) => write!(f, "{}{ident}", kind.prefix()),
            None => Ok(()),
        }
    }
}

/// A canonical name could not be parsed or does not name a known entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonicalNameError {
    MissingLibrarySeparator,
    EmptyLibrary,
    EmptyMember,
    AnonymousClosure,

    UnknownLibrary(SymbolId),
    UnknownClass(CanonicalName),
    UnknownField(CanonicalName),
    UnknownFunction(CanonicalName),

    /// A class was expected but the name denotes a member.
    ExpectedClass(CanonicalName),
    /// A field was expected but the name denotes something else.
    ExpectedField(CanonicalName),
    /// A function was expected but the name denotes something else.
    ExpectedFunction(CanonicalName),
}

impl Display for CanonicalNameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use CanonicalNameError::*;

        match self {
            MissingLibrarySeparator => write!(
                f,
                "canonical name is missing library separator {}",
                TtQuote::wrap("::")
            ),
            EmptyLibrary => write!(f, "canonical name has empty library"),
            EmptyMember => write!(f, "canonical name has empty member"),
            AnonymousClosure => {
                write!(f, "cannot resolve anonymous closure by name")
            }
            UnknownLibrary(url) => {
                write!(f, "unknown library {}", TtQuote::wrap(url))
            }
            UnknownClass(name) => {
                write!(f, "unknown class {}", TtQuote::wrap(name))
            }
            UnknownField(name) => {
                write!(f, "unknown field {}", TtQuote::wrap(name))
            }
            UnknownFunction(name) => {
                write!(f, "unknown function {}", TtQuote::wrap(name))
            }
            ExpectedClass(name) => {
                write!(f, "expected class name, found {}", TtQuote::wrap(name))
            }
            ExpectedField(name) => {
                write!(f, "expected field name, found {}", TtQuote::wrap(name))
            }
            ExpectedFunction(name) => write!(
                f,
                "expected function name, found {}",
                TtQuote::wrap(name)
            ),
        }
    }
}

impl Error for CanonicalNameError {}

#[cfg(test)]
mod test {
    use super::*;
    use CanonicalNameError::*;

    fn parse(name: &str) -> Result<CanonicalName, CanonicalNameError> {
        CanonicalName::parse(name)
    }

    #[test]
    fn class_name() {
        let name = parse("file:///main.dart::Foo").unwrap();

        assert_eq!("file:///main.dart".intern(), name.library());
        assert_eq!(Some("Foo".intern()), name.class());
        assert!(name.is_class());
        assert_eq!(None, name.member_kind());
    }

    #[test]
    fn member_kinds() {
        let cases = [
            ("dart:core::Foo.x", MemberKind::Field, "x"),
            ("dart:core::Foo:bar", MemberKind::Method, "bar"),
            ("dart:core::Foo:get:bar", MemberKind::Getter, "bar"),
            ("dart:core::Foo:set:bar", MemberKind::Setter, "bar"),
            ("dart:core::Foo:dyn:bar", MemberKind::DynForwarder, "bar"),
        ];

        for (src, kind, ident) in cases {
            let name = parse(src).unwrap();

            assert_eq!(Some("Foo".intern()), name.class(), "{src}");
            assert_eq!(Some(kind), name.member_kind(), "{src}");
            assert_eq!(Some(ident.intern()), name.member(), "{src}");
            assert_eq!(src, name.to_string());
        }
    }

    #[test]
    fn top_level_members() {
        let func = parse("dart:core:::print").unwrap();
        assert_eq!(None, func.class());
        assert_eq!(Some(MemberKind::Method), func.member_kind());
        assert_eq!("dart:core:::print", func.to_string());

        let field = parse("dart:core::.x").unwrap();
        assert_eq!(None, field.class());
        assert_eq!(Some(MemberKind::Field), field.member_kind());
    }

    #[test]
    fn getter_named_like_prefix_only_is_method() {
        // `get` alone is not a prefix.
        let name = parse("lib::C:get").unwrap();

        assert_eq!(Some(MemberKind::Method), name.member_kind());
        assert_eq!(Some("get".intern()), name.member());
    }

    #[test]
    fn errors() {
        assert_eq!(Err(MissingLibrarySeparator), parse("dart:core:Foo"));
        assert_eq!(Err(EmptyLibrary), parse("::Foo"));
        assert_eq!(Err(EmptyMember), parse("lib::"));
        assert_eq!(Err(EmptyMember), parse("lib::Foo."));
        assert_eq!(Err(EmptyMember), parse("lib::Foo:get:"));
        assert_eq!(
            Err(AnonymousClosure),
            parse("lib::Foo:<anonymous closure>")
        );
    }
}
