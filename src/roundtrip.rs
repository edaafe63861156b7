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

//! Round-trip self-test of the flow graph text form.
//!
//! The driver deserializes a flow graph,
//!   serializes the result,
//!   and then deserializes and serializes that again;
//!     the test succeeds when the two serialized forms are equal.
//! The first serialized form is canonical,
//!   so the comparison is between canonical texts and tolerates
//!   non-canonical input.
//!
//! Graphs containing instructions that the deserializer does not
//!   understand are not deserialized at all;
//!     instead,
//!       the report lists a histogram of the offending tags so that
//!       missing instruction support can be prioritized.
//!
//! The [`RoundTripReport`] is itself an S-expression
//!   (see [`RoundTripReport::to_sexp`]):
//!
//! ```text
//! (RoundTrip { success false,
//!              error "undefined SSA name v7",
//!              at v7,
//!              path (4 2 1) })
//! ```

use crate::{
    il::{
        deserialize,
        deserialize::{PathElem, BLOCK_TAG, DEF_TAG, ENTRIES_TAG},
        serialize, DeserializeError, INSTRUCTION_TAGS,
    },
    program::ProgramModel,
    sexp::{SExp, SExpKind, SList},
    sym::{GlobalSymbolResolve, SymbolId},
};
use fxhash::FxHashMap;
use std::{error::Error, fmt::Display};

/// Run the round-trip self-test on the flow graph `input`.
pub fn round_trip<P: ProgramModel>(program: &P, input: &SExp) -> RoundTripReport {
    let unhandled = unhandled_instructions(input);

    if !unhandled.is_empty() {
        return RoundTripReport {
            unhandled,
            serialized: None,
            error: None,
        };
    }

    let first = match deserialize(program, input) {
        Ok(graph) => serialize(program, &graph),
        Err(e) => return RoundTripReport::failed(input, None, e),
    };

    let second = match deserialize(program, &first) {
        Ok(graph) => serialize(program, &graph),
        Err(e) => return RoundTripReport::failed(&first, Some(first.clone()), e),
    };

    let error = (first != second).then(|| RoundTripError::Unstable {
        second: second.clone(),
    });

    RoundTripReport {
        unhandled,
        serialized: Some(first),
        error,
    }
}

/// Outcome of [`round_trip`].
#[derive(Debug, Clone, PartialEq)]
pub struct RoundTripReport {
    /// Unhandled instruction tags and the number of occurrences of each,
    ///   ordered by tag.
    pub unhandled: Vec<(SymbolId, usize)>,

    /// Canonical form produced by the first serialization,
    ///   if deserialization of the input succeeded.
    pub serialized: Option<SExp>,

    pub error: Option<RoundTripError>,
}

impl RoundTripReport {
    fn failed(
        root: &SExp,
        serialized: Option<SExp>,
        error: DeserializeError,
    ) -> Self {
        let path = error.path_from_root(root).unwrap_or_default();

        Self {
            unhandled: Vec::new(),
            serialized,
            error: Some(RoundTripError::Deserialize { error, path }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.unhandled.is_empty() && self.error.is_none()
    }

    /// Structured form of this report.
    pub fn to_sexp(&self) -> SExp {
        let mut report =
            SList::tagged("RoundTrip").with_extra("success", self.is_success());

        if !self.unhandled.is_empty() {
            let mut histogram = SList::new();

            for &(tag, count) in &self.unhandled {
                histogram.add(
                    SList::new()
                        .with(SExp::new(SExpKind::Symbol(tag)))
                        .with(SExp::integer(count as i64)),
                );
            }

            report.add_extra("unhandled", histogram);
        }

        if let Some(serialized) = &self.serialized {
            report.add_extra("serialized", serialized.clone());
        }

        if let Some(e) = &self.error {
            report.add_extra("error", SExp::string(e.to_string()));

            match e {
                RoundTripError::Deserialize { error, path } => {
                    report.add_extra("at", error.at().clone());

                    let mut elems = SList::new();
                    for elem in path {
                        elems.add(match elem {
                            PathElem::Index(i) => SExp::integer(*i as i64),
                            PathElem::Extra(label) => {
                                SExp::new(SExpKind::Symbol(*label))
                            }
                        });
                    }

                    report.add_extra("path", elems);
                }
                RoundTripError::Unstable { second } => {
                    report.add_extra("reserialized", second.clone());
                }
            }
        }

        report.into()
    }
}

/// Failure of a round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundTripError {
    /// The input,
    ///   or its serialized form,
    ///   could not be deserialized.
    Deserialize {
        error: DeserializeError,

        /// Path to the offending S-expression from the root of the
        ///   S-expression being deserialized.
        path: Vec<PathElem>,
    },

    /// Serializing the deserialized canonical form did not reproduce it.
    Unstable { second: SExp },
}

impl Display for RoundTripError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deserialize { error, .. } => Display::fmt(error, f),
            Self::Unstable { .. } => {
                write!(f, "serialized flow graph is not stable under round trip")
            }
        }
    }
}

impl Error for RoundTripError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Deserialize { error, .. } => Some(error),
            Self::Unstable { .. } => None,
        }
    }
}

/// Histogram of instruction tags in `root` that are not understood by
///   the deserializer,
///     ordered by tag.
pub fn unhandled_instructions(root: &SExp) -> Vec<(SymbolId, usize)> {
    let mut counts = FxHashMap::<SymbolId, usize>::default();

    let Some(root) = root.as_list() else {
        return Vec::new();
    };

    for section in root.elems() {
        let Some(list) = section.as_list() else {
            continue;
        };

        match list.tag().map(|tag| tag.lookup_str()) {
            Some(BLOCK_TAG) => {
                for instr in list.elems().iter().skip(2) {
                    count_unhandled(instr, &mut counts);
                }
            }
            Some(ENTRIES_TAG) => {
                let entries = list.elems().iter().skip(1).filter_map(SExp::as_list);

                for entry in entries {
                    for def in entry.elems().iter().skip(2) {
                        count_unhandled(def, &mut counts);
                    }
                }
            }
            _ => (),
        }
    }

    let mut histogram = counts.into_iter().collect::<Vec<_>>();
    histogram.sort_by(|(a, _), (b, _)| a.lookup_str().cmp(b.lookup_str()));
    histogram
}

fn count_unhandled(sexp: &SExp, counts: &mut FxHashMap<SymbolId, usize>) {
    let Some(list) = sexp.as_list() else {
        return;
    };
    let Some(tag) = list.tag() else {
        return;
    };

    match tag.lookup_str() {
        DEF_TAG => {
            if let Some(instr) = list.get(2) {
                count_unhandled(instr, counts);
            }
        }
        "Branch" => {
            if let Some(comparison) = list.get(1) {
                count_unhandled(comparison, counts);
            }
        }
        name if INSTRUCTION_TAGS.contains(&name) => (),
        _ => *counts.entry(tag).or_default() += 1,
    }
}

#[cfg(test)]
mod test;
