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

//! Tracing for deserialization.
//!
//! This provides human-readable traces on standard error as the
//!   deserializer moves through its phases,
//!   visits blocks,
//!   and binds definitions to pending uses.
//! These traces are provided automatically when `cfg(test)`,
//!   which means that they are automatically included in the output of any
//!   test failure.
//!
//! Outside of tests,
//!   this can be enabled at build-time using the
//!   `deserializer-trace-stderr` feature flag.
//!
//! _These traces are not meant to be machine-readable!_
//! Do not try to parse them;
//!   the format is subject to change without notice.

use super::{deserialize::DeserializeError, BlockId, InstrId, SsaIndex};
use crate::sexp::SExp;

pub trait DeserializerTrace: Default {
    /// A new phase of deserialization has begun.
    fn trace_phase(&mut self, phase: &'static str);

    /// A block is about to be parsed from `form`.
    fn trace_block(&mut self, id: BlockId, form: &SExp);

    /// A constant definition could not yet be parsed because it refers to
    ///   `missing`,
    ///     and so has been requeued.
    fn trace_requeue(&mut self, ssa: SsaIndex, missing: SsaIndex);

    /// `ssa` has been bound to `instr`,
    ///   resolving `pending` uses that preceded it.
    fn trace_define(&mut self, ssa: SsaIndex, instr: InstrId, pending: usize);

    /// Deserialization failed.
    ///
    /// There is no means to return an error and a failure to output the
    ///   trace should not interrupt processing.
    fn trace_error(&mut self, err: &DeserializeError);
}

/// Perform no tracing.
///
/// This should be used by default for non-test builds,
///   since tracing can incur a significant performance cost.
#[derive(Debug, PartialEq, Default)]
pub struct VoidTrace;

impl DeserializerTrace for VoidTrace {
    fn trace_phase(&mut self, _phase: &'static str) {
        // Do nothing at all.
    }

    fn trace_block(&mut self, _id: BlockId, _form: &SExp) {
        // Do nothing at all.
    }

    fn trace_requeue(&mut self, _ssa: SsaIndex, _missing: SsaIndex) {
        // Do nothing at all.
    }

    fn trace_define(&mut self, _ssa: SsaIndex, _instr: InstrId, _pending: usize) {
        // Do nothing at all.
    }

    fn trace_error(&mut self, _err: &DeserializeError) {
        // Do nothing at all.
    }
}

/// Human-readable [`DeserializerTrace`].
///
/// See [module-level](self) documentation for more information.
#[derive(Debug, PartialEq, Default)]
pub struct HumanReadableTrace;

impl DeserializerTrace for HumanReadableTrace {
    fn trace_phase(&mut self, phase: &'static str) {
        eprint!("[Deserializer] ==> phase: {phase}\n|\n");
    }

    fn trace_block(&mut self, id: BlockId, form: &SExp) {
        eprint!(
            "\
| ==> visiting block {id}
|  |  {form}
|\n",
        );
    }

    fn trace_requeue(&mut self, ssa: SsaIndex, missing: SsaIndex) {
        eprint!("| ==> constant {ssa} requeued; waiting on {missing}\n|\n");
    }

    fn trace_define(&mut self, ssa: SsaIndex, instr: InstrId, pending: usize) {
        eprint!("| ==> {ssa} defined by {instr:?}");

        if pending > 0 {
            eprint!(" (resolving {pending} pending use(s))");
        }

        eprint!("\n");
    }

    fn trace_error(&mut self, err: &DeserializeError) {
        eprint!(
            "\
|
| ==> !!! error: {err}.
|  |  at: {at}\n",
            at = err.at(),
        );

        #[allow(unused_variables)]
        let cfg = ""; // so that this compiles without matching cfg
        #[cfg(feature = "deserializer-trace-stderr")]
        #[allow(unused_variables)]
        let cfg = "feature = \"deserializer-trace-stderr\"";
        #[cfg(test)] // takes precedence if both are set
        let cfg = "test";
        eprint!(
            "= note: this trace was output as a debugging aid \
                because `cfg({cfg})`.\n\n",
        );
    }
}

/// Trace used by [`Deserializer`](super::deserialize::Deserializer) unless
///   another is requested.
#[cfg(any(test, feature = "deserializer-trace-stderr"))]
pub type DefaultTrace = HumanReadableTrace;

/// Trace used by [`Deserializer`](super::deserialize::Deserializer) unless
///   another is requested.
#[cfg(not(any(test, feature = "deserializer-trace-stderr")))]
pub type DefaultTrace = VoidTrace;
