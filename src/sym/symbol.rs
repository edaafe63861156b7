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

//! Symbol objects representing interned strings.
//!
//! See the [parent module](super) for more information.

use super::{DefaultInterner, Interner};
use crate::global;
use std::fmt::{Debug, Display};
use std::thread::LocalKey;

/// Unique symbol identifier produced by an [`Interner`].
///
/// The index `0` is never valid,
///   which allows us to have `Option<SymbolId>` at no space cost.
///
/// Symbols allocated using the global interner will automatically resolve
///   to strings via [`Display`].
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(global::NonZeroProgSymSize);

assert_eq_size!(Option<SymbolId>, SymbolId);

impl SymbolId {
    /// Construct a symbol from the index of its string within an
    ///   interner's pool.
    ///
    /// Panics
    /// ======
    /// Will panic if `n == 0` or if the index space has been exhausted;
    ///   neither can happen when used as intended by [`Interner`].
    pub(super) fn from_index(n: usize) -> Self {
        global::ProgSymSize::try_from(n)
            .ok()
            .and_then(global::NonZeroProgSymSize::new)
            .map(SymbolId)
            .unwrap_or_else(|| {
                panic!("internal error: invalid SymbolId index {n}")
            })
    }

    pub fn as_usize(self) -> usize {
        self.0.get() as usize
    }
}

type StaticInterner = DefaultInterner<'static>;

thread_local! {
    static INTERNER: StaticInterner =
        StaticInterner::with_capacity(global::INIT_GLOBAL_INTERNER_CAPACITY);
}

/// Acquire a static reference to the global interner.
///
/// [`thread_local!`] produces a [`LocalKey`] that provides access with a
///   lifetime that cannot exceed that of the closure,
///     but we must return string slices from the interner's storage.
/// This transmutes the lifetime of the reference back to `'static`.
///
/// This is expected to be safe,
///   because the thread-local storage is never deallocated while the
///   thread is alive,
///     and the storage is only accessible to one thread.
fn with_static_interner<F, R>(key: &'static LocalKey<StaticInterner>, f: F) -> R
where
    F: FnOnce(&'static StaticInterner) -> R,
{
    key.with(|interner| {
        f(unsafe {
            // These type annotations are inferred, but please leave
            // them here; transmute is especially dangerous, and we want
            // to be sure reality always matches our expectations.
            std::mem::transmute::<&StaticInterner, &'static StaticInterner>(
                interner,
            )
        })
    })
}

/// Resolve a [`SymbolId`] to the string value it represents using the
///   global interner.
///
/// This exists as its own trait
///   (rather than simply adding to [`SymbolId`])
///   to make it easy to see what systems rely on global state.
pub trait GlobalSymbolResolve {
    /// Resolve a [`SymbolId`] allocated using the global interner.
    ///
    /// Panics
    /// ======
    /// This will panic if the symbol cannot be found,
    ///   which can only happen if the symbol was allocated by another
    ///   interner or on another thread.
    fn lookup_str(&self) -> &'static str;

    /// Attempt to resolve a [`SymbolId`] allocated using the global
    ///   interner.
    ///
    /// Unlike [`GlobalSymbolResolve::lookup_str`],
    ///   this cannot panic.
    fn try_lookup_str(&self) -> Option<&'static str>;
}

impl GlobalSymbolResolve for SymbolId {
    fn lookup_str(&self) -> &'static str {
        with_static_interner(&INTERNER, |interner| {
            interner.index_lookup(*self).unwrap_or_else(|| {
                panic!(
                    "internal error: failed to resolve SymbolId({}) using \
                        global interner of length {}",
                    self.0,
                    interner.len()
                )
            })
        })
    }

    fn try_lookup_str(&self) -> Option<&'static str> {
        with_static_interner(&INTERNER, |interner| interner.index_lookup(*self))
    }
}

impl Display for SymbolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.lookup_str())
    }
}

impl Debug for SymbolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // This may be called during a panic,
        //   and we don't want to panic yet again if we cannot find the
        //   symbol.
        write!(
            f,
            "SymbolId({} {:?})",
            self.0,
            self.try_lookup_str().unwrap_or("<#!UNKNOWN_SYMBOL>")
        )
    }
}

/// Intern a string using the global interner.
///
/// This provides a convenient API that creates the appearance that string
///   interning is a core Rust language feature
///   (e.g. `"foo".intern()`).
pub trait GlobalSymbolIntern {
    /// Intern a string using the global interner.
    fn intern(self) -> SymbolId;
}

impl GlobalSymbolIntern for &str {
    fn intern(self) -> SymbolId {
        with_static_interner(&INTERNER, |interner| interner.intern(self))
    }
}

impl GlobalSymbolIntern for &String {
    fn intern(self) -> SymbolId {
        self.as_str().intern()
    }
}

impl GlobalSymbolIntern for String {
    fn intern(self) -> SymbolId {
        self.as_str().intern()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn global_intern_and_resolve() {
        let given = "global sym";
        let sym = given.intern();

        assert_eq!(given, sym.lookup_str());
        assert_eq!(Some(given), sym.try_lookup_str());
        assert_eq!(sym, String::from(given).intern());
    }

    #[test]
    fn display_resolves_string() {
        let sym = "displayed".intern();
        assert_eq!("displayed", sym.to_string());
    }

    #[test]
    fn try_lookup_unknown_symbol() {
        assert_eq!(None, SymbolId::from_index(u32::MAX as usize).try_lookup_str());
    }
}
