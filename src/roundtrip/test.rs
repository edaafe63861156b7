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

use super::*;
use crate::{
    il::deserialize::DeserializeErrorKind, il::SsaIndex, program::Program,
    sexp::parse_str, sym::GlobalSymbolIntern,
};

const PROGRAM: &str = r#"(Program (Library "file:///main.dart" (Function main)))"#;

fn program() -> Program {
    Program::from_sexp(&parse_str(PROGRAM).unwrap()).unwrap()
}

fn flow_graph(body: &str) -> SExp {
    parse_str(&format!(r#"(FlowGraph "file:///main.dart:::main" {body})"#))
        .unwrap()
}

fn sut(body: &str) -> RoundTripReport {
    round_trip(&program(), &flow_graph(body))
}

#[test]
fn canonical_input_succeeds() {
    let body = "(Constants (def v0 (Constant null)))
                (Entries (Normal B1))
                (Block B1 (Return v0))";

    let report = sut(body);

    assert!(report.is_success());
    assert_eq!(Some(flow_graph(body)), report.serialized);
}

#[test]
fn non_canonical_input_succeeds() {
    let report = sut(
        "(Constants (def v0 (Constant 1)) (def v1 (Constant 1)))
         (Entries (Normal B1 (def v2 (Parameter 0)) { try_index -1 }))
         (Block B1
           (CheckStackOverflow { loop_depth 0 })
           (Branch (StrictCompare v2 v1 { kind === }) B3 B2))
         (Block B2 { block_type Target } (Return v1))
         (Block B3 { block_type Target } (Return v2))",
    );

    assert_eq!(None, report.error);
    assert!(report.is_success());
}

#[test]
fn unhandled_instructions_skip_deserialization() {
    let report = sut(
        "(Constants (def v0 (Constant null)))
         (Entries (Normal B1 (def v1 (Frobnicate))))
         (Block B1
           (Frobnicate v0)
           (def v2 (Twiddle v0))
           (Branch (Compare v0 v0) B2 B2))
         (Block B2 { block_type Target } (Frobnicate) (Return v0))",
    );

    assert!(!report.is_success());
    assert_eq!(None, report.serialized);
    assert_eq!(None, report.error);
    assert_eq!(
        vec![
            ("Compare".intern(), 1),
            ("Frobnicate".intern(), 3),
            ("Twiddle".intern(), 1),
        ],
        report.unhandled,
    );

    let expected = parse_str(
        "(RoundTrip { success false,
                      unhandled ((Compare 1) (Frobnicate 3) (Twiddle 1)) })",
    )
    .unwrap();

    assert_eq!(expected, report.to_sexp());
}

#[test]
fn deserialize_failure_reported_with_path() {
    let report = sut(
        "(Constants (def v0 (Constant null)))
         (Entries (Normal B1))
         (Block B1 (Return v7))",
    );

    assert!(!report.is_success());
    assert_eq!(None, report.serialized);

    let Some(RoundTripError::Deserialize { error, path }) = &report.error else {
        panic!("unexpected {:?}", report.error);
    };

    assert_eq!(
        &DeserializeErrorKind::UndefinedUse(SsaIndex::new(7)),
        error.kind()
    );
    assert_eq!(
        &vec![PathElem::Index(4), PathElem::Index(2), PathElem::Index(1)],
        path
    );

    let sexp = report.to_sexp();
    let list = sexp.as_list().unwrap();

    assert_eq!(Some(&SExp::bool(false)), list.extra_lookup_value("success"));
    assert_eq!(Some(&SExp::symbol("v7")), list.extra_lookup_value("at"));
    assert_eq!(
        Some(&parse_str("(4 2 1)").unwrap()),
        list.extra_lookup_value("path")
    );
    assert!(list.extra_has_key("error"));
}

#[test]
fn report_of_success() {
    let report = sut(
        "(Constants (def v0 (Constant null)))
         (Entries (Normal B1))
         (Block B1 (Return v0))",
    );

    let sexp = report.to_sexp();
    let list = sexp.as_list().unwrap();

    assert_eq!(Some(&SExp::bool(true)), list.extra_lookup_value("success"));
    assert_eq!(report.serialized.as_ref(), list.extra_lookup_value("serialized"));
    assert!(!list.extra_has_key("error"));
}
