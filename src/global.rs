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

//! System-wide static configuration.
//!
//! This module provides a system-wide configuration.
//! Subsystems should reference these values rather than defining their own
//!   and risk incompatibilities or maintenance issues as requirements
//!   change.
//!
//! By convention,
//!   import this entire module rather than individual members and reference
//!   them as `global::foo` to emphasize their nature and risk.

use std::num;

/// A size capable of representing every interned string in a program.
pub type ProgSymSize = u32;

/// A non-zero equivalent of [`ProgSymSize`];
pub type NonZeroProgSymSize = num::NonZeroU32;

/// The initial capacity for global interners.
///
/// Flow graph text is dominated by a small vocabulary of tags and SSA
///   names,
///     so this need not be large.
pub const INIT_GLOBAL_INTERNER_CAPACITY: usize = 1024;

/// A size capable of representing any byte offset within a source buffer.
///
/// Flow graph dumps are produced one function at a time and so will never
///   approach 4GiB.
pub type SourceFileSize = u32;

/// A size capable of representing the byte length of any single
///   S-expression.
///
/// Unlike most token-based spans,
///   a span here may cover an entire list
///     (and therefore an entire flow graph),
///   so this must be as large as [`SourceFileSize`].
pub type ExprLength = u32;

/// A size capable of representing every block identifier in a single
///   flow graph.
pub type BlockIdSize = u32;

/// A size capable of representing every SSA temporary index in a single
///   flow graph.
///
/// Note that the deserializer reserves two indexes past the largest index
///   that it encounters
///     (see [`crate::il::FlowGraph::current_ssa_temp_index`]),
///   so the largest usable index is two less than the maximum.
pub type SsaIndexSize = u32;

/// A size capable of representing every class id known to a program.
pub type ClassIdSize = u32;

/// Maximum number of arguments whose class ids may be recorded by a single
///   inline cache entry.
///
/// This bounds [`crate::il::ICData`] entries so that they can be stored
///   inline without allocation.
pub const MAX_IC_ARGS_TESTED: usize = 2;

/// Line width used when pretty-printing S-expressions if no other width is
///   requested.
pub const DEFAULT_PRINT_WIDTH: usize = 80;

/// Initial capacity of the S-expression parser's list stack.
///
/// This is the expected maximum nesting depth of typical flow graph text;
///   the stack will grow as necessary.
pub const INIT_PARSE_STACK_CAPACITY: usize = 16;

/// Initial capacity of the deserializer's block worklist.
pub const INIT_BLOCK_WORKLIST_CAPACITY: usize = 32;

/// Largest block id permitted per block of a flow graph.
///
/// Blocks are stored densely by id,
///   so a graph of `n` blocks may use ids no greater than
///   `(n + 1) * MAX_BLOCK_ID_SPREAD`.
/// Ids are not required to be contiguous,
///   since optimization passes leave gaps behind.
pub const MAX_BLOCK_ID_SPREAD: usize = 64;
