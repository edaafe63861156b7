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

//! Textual S-expression form of optimizing-compiler flow graphs.
//!
//! A flow graph is written as an S-expression
//!   (see [`sexp`])
//!   and read back by the [deserializer](il::deserialize),
//!     which resolves every name against a [program model](program),
//!     validates the graph against the invariants of the IR,
//!     and computes block orders and dominators.
//! The [serializer](il::serialize) is its inverse,
//!   and [`roundtrip`] checks that the two agree.

// We build docs for private items.
#![allow(rustdoc::private_intra_doc_links)]

pub mod global;

#[macro_use]
extern crate static_assertions;

pub mod diagnose;
pub mod fmt;
pub mod il;
pub mod program;
pub mod roundtrip;
pub mod sexp;
pub mod span;
pub mod sym;
