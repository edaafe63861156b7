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

//! String internment system.
//!
//! Every string and symbol atom of an S-expression,
//!   every extra-info label,
//!   and every canonical program name is interned as a [`SymbolId`].
//! Symbols are small [`Copy`] values that compare in constant time,
//!   which keeps S-expression trees cheap to clone and makes tag dispatch
//!   an integer comparison.
//!
//! ```
//! use ilsexp::sym::{GlobalSymbolIntern, GlobalSymbolResolve};
//!
//! let a = "Block".intern();
//! let b = String::from("Block").intern();
//!
//! assert_eq!(a, b);
//! assert_eq!("Block", a.lookup_str());
//! ```
//!
//! Global Interner
//! ===============
//! Symbols are allocated by a thread-local [`ArenaInterner`].
//! Since parsing and deserialization are single-threaded and run to
//!   completion on the calling thread,
//!     a symbol must never be sent to another thread and resolved there.
//! [`SymbolId`] is therefore deliberately `!Send`-agnostic;
//!   it is the caller's responsibility not to mix threads.
//!
//! Interned strings live for the life of the thread,
//!   which is appropriate for a developer tool that processes a bounded
//!   number of flow graphs.

mod interner;
mod symbol;

pub use interner::{ArenaInterner, DefaultInterner, Interner};
pub use symbol::{GlobalSymbolIntern, GlobalSymbolResolve, SymbolId};
