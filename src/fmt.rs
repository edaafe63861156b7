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

//! Typed formatting helpers.
//!
//! These types create composable formatters for use with [`Display`].
//! Whereas [`Display`] operates on data owned by the type implementing it,
//!   these formatters operate on data provided _to_ them,
//!     which keeps error messages consistent without each error type
//!     repeating the same quoting logic.
//!
//! ```
//! # use ilsexp::fmt::*;
//! assert_eq!(TtQuote::wrap("Block").to_string(), "`Block`");
//!
//! assert_eq!(
//!     OrList::<TtQuote>::wrap(&["Join", "Target"]).to_string(),
//!     "`Join` or `Target`",
//! );
//!
//! assert_eq!(
//!     OrList::<TtQuote>::wrap(&["===", "!==", "=="]).to_string(),
//!     "`===`, `!==`, or `==`",
//! );
//! ```

use std::{
    fmt::{Display, Formatter, Result},
    marker::PhantomData,
};

/// Formatter that wraps a value to be displayed.
pub trait DisplayWrapper {
    /// Format `inner` using the provided [`Formatter`].
    fn fmt<T: Display>(inner: T, f: &mut Formatter) -> Result;

    /// Wrap the provided object so that it can be rendered using
    ///   [`Display`] via this formatter.
    fn wrap<T: Display>(inner: T) -> Wrap<Self, T> {
        Wrap {
            inner,
            _phantom: PhantomData,
        }
    }
}

/// An object wrapped by a [`DisplayWrapper`].
pub struct Wrap<W: DisplayWrapper + ?Sized, T: Display> {
    inner: T,
    _phantom: PhantomData<W>,
}

impl<W: DisplayWrapper, T: Display> Display for Wrap<W, T> {
    fn fmt(&self, f: &mut Formatter) -> Result {
        W::fmt(&self.inner, f)
    }
}

/// Render the inner value unchanged.
pub struct Raw;

impl DisplayWrapper for Raw {
    fn fmt<T: Display>(inner: T, f: &mut Formatter) -> Result {
        inner.fmt(f)
    }
}

/// Quote the inner value in backticks,
///   like inline code.
///
/// This is used throughout error messages to delimit tags, labels, and
///   symbols from surrounding prose.
pub struct TtQuote;

impl DisplayWrapper for TtQuote {
    fn fmt<T: Display>(inner: T, f: &mut Formatter) -> Result {
        write!(f, "`{inner}`")
    }
}

/// Render a list of alternatives joined by "or",
///   with an Oxford comma when there are more than two.
pub struct OrList<W: DisplayWrapper>(PhantomData<W>);

impl<W: DisplayWrapper> OrList<W> {
    pub fn wrap<T: Display>(list: &[T]) -> ListWrap<'_, W, T> {
        ListWrap {
            list,
            _phantom: PhantomData,
        }
    }
}

/// A slice wrapped by [`OrList`].
pub struct ListWrap<'a, W: DisplayWrapper, T: Display> {
    list: &'a [T],
    _phantom: PhantomData<W>,
}

impl<'a, W: DisplayWrapper, T: Display> Display for ListWrap<'a, W, T> {
    fn fmt(&self, f: &mut Formatter) -> Result {
        let n = self.list.len();

        for (i, item) in self.list.iter().enumerate() {
            match (n, i) {
                (_, 0) => (),
                (2, 1) => write!(f, " or ")?,
                (_, i) if i == n - 1 => write!(f, ", or ")?,
                _ => write!(f, ", ")?,
            }

            W::fmt(item, f)?;
        }

        Ok(())
    }
}
