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

//! Interners used to intern values as symbols.
//!
//! See the [parent module](super) for more information.
//!
//! ```
//! use ilsexp::sym::{Interner, DefaultInterner};
//!
//! let interner = DefaultInterner::new();
//!
//! let (ia, ib, ic) = (
//!     interner.intern("v1"),
//!     interner.intern(&String::from("v1")),
//!     interner.intern("v2"),
//! );
//!
//! assert_eq!(ia, ib);
//! assert_ne!(ia, ic);
//! assert_eq!(2, interner.len());
//! assert_eq!(Some("v1"), interner.index_lookup(ia));
//! ```

use super::SymbolId;
use crate::global;
use bumpalo::Bump;
use fxhash::FxBuildHasher;
use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::BuildHasher;

/// Create, store, compare, and retrieve interned values.
///
/// The same [`SymbolId`] will always be returned for a given string,
///   allowing symbols to be compared for equality cheaply by comparing
///   integers.
pub trait Interner<'i> {
    /// Intern a string slice or return an existing [`SymbolId`].
    fn intern(&self, value: &str) -> SymbolId;

    /// Retrieve an existing intern for the provided string slice without
    ///   interning it.
    fn intern_soft(&self, value: &str) -> Option<SymbolId>;

    /// Determine whether the given value has already been interned.
    fn contains(&self, value: &str) -> bool {
        self.intern_soft(value).is_some()
    }

    /// Number of interned strings in this interner's pool.
    fn len(&self) -> usize;

    /// Whether nothing has yet been interned.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a symbol's string value by its [`SymbolId`].
    ///
    /// If the index was not allocated by this interner,
    ///   the result is [`None`].
    fn index_lookup(&'i self, index: SymbolId) -> Option<&'i str>;
}

/// An interner backed by an [arena](bumpalo).
///
/// Since all symbols exist until the interner itself is freed,
///   an arena is a much more efficient and appropriate memory allocation
///   strategy.
/// This also provides a stable location in memory for symbol data.
pub struct ArenaInterner<'i, S>
where
    S: BuildHasher + Default,
{
    /// Storage for interned strings.
    arena: Bump,

    /// Interned strings by [`SymbolId`].
    ///
    /// The first index must always be populated during initialization to
    ///   ensure that [`SymbolId`] will never be `0`.
    strings: RefCell<Vec<&'i str>>,

    /// Map of interned strings to their respective [`SymbolId`].
    map: RefCell<HashMap<&'i str, SymbolId, S>>,
}

/// Interner configuration suitable for most uses.
///
/// [`fxhash`] is used since keys are short and attacker-controlled input
///   is not a concern for a developer tool.
pub type DefaultInterner<'i> = ArenaInterner<'i, FxBuildHasher>;

impl<'i, S> ArenaInterner<'i, S>
where
    S: BuildHasher + Default,
{
    /// Initialize a new interner with no initial capacity.
    #[inline]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Initialize a new interner with an initial capacity for the
    ///   underlying [`HashMap`].
    ///
    /// The given `capacity` has no effect on arena allocation.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut strings = Vec::<_>::with_capacity(capacity + 1);

        // The first index is not used since SymbolId cannot be 0.
        strings.push("");

        Self {
            arena: Bump::new(),
            strings: RefCell::new(strings),
            map: RefCell::new(HashMap::with_capacity_and_hasher(
                capacity,
                Default::default(),
            )),
        }
    }

    #[inline]
    fn copy_slice_into_arena(&self, value: &str) -> &'i str {
        // The arena is never reset and lives as long as `self`,
        //   and strings are only ever handed out for `'i`,
        //   which cannot outlive the interner.
        unsafe { &*(self.arena.alloc_str(value) as *const str) }
    }
}

impl<'i, S> Default for ArenaInterner<'i, S>
where
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::with_capacity(global::INIT_GLOBAL_INTERNER_CAPACITY)
    }
}

impl<'i, S> Interner<'i> for ArenaInterner<'i, S>
where
    S: BuildHasher + Default,
{
    fn intern(&self, value: &str) -> SymbolId {
        let mut map = self.map.borrow_mut();

        if let Some(sym) = map.get(value) {
            return *sym;
        }

        let mut syms = self.strings.borrow_mut();
        let id = SymbolId::from_index(syms.len());

        let clone = self.copy_slice_into_arena(value);

        map.insert(clone, id);
        syms.push(clone);

        id
    }

    #[inline]
    fn intern_soft(&self, value: &str) -> Option<SymbolId> {
        self.map.borrow().get(value).copied()
    }

    #[inline]
    fn len(&self) -> usize {
        // The placeholder at index 0 is not a symbol.
        self.strings.borrow().len() - 1
    }

    fn index_lookup(&'i self, index: SymbolId) -> Option<&'i str> {
        self.strings.borrow().get(index.as_usize()).copied()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    type Sut<'i> = DefaultInterner<'i>;

    #[test]
    fn recognizes_equal_strings() {
        let a = "foo";
        let b = String::from("foo");
        let c = "bar";

        let sut = Sut::new();

        let (ia, ib, ic) = (sut.intern(a), sut.intern(&b), sut.intern(c));

        assert_eq!(ia, ib);
        assert_ne!(ia, ic);
    }

    #[test]
    fn length_of_intern_pool() {
        let sut = Sut::new();
        assert!(sut.is_empty());

        sut.intern("foo");
        assert_eq!(1, sut.len());

        sut.intern("bar");
        assert_eq!(2, sut.len());

        // already interned
        sut.intern("foo");
        assert_eq!(2, sut.len());
    }

    #[test]
    fn intern_soft() {
        let sut = Sut::new();

        assert_eq!(None, sut.intern_soft("foo"));
        assert!(!sut.contains("foo"));

        let foo = sut.intern("foo");
        assert_eq!(Some(foo), sut.intern_soft("foo"));
        assert!(sut.contains("foo"));
    }

    #[test]
    fn retrieve_string_by_index() {
        let sut = Sut::new();
        let at = "at one";
        let a = sut.intern(at);

        assert_eq!(Some(at), sut.index_lookup(a));
    }

    #[test]
    fn lookup_unallocated_index() {
        let sut = Sut::new();
        sut.intern("only");

        assert_eq!(None, sut.index_lookup(SymbolId::from_index(100)));
    }
}
