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
use crate::sexp::parse_str;

fn compile_type() -> SExp {
    SList::tagged("CompileType")
        .with(147i64)
        .with_extra("nullable", false)
        .with_extra("name", SExp::string("T{Smi}"))
        .into()
}

/// A representative flow graph fragment.
const GRAPH: &str = r#"
(FlowGraph "dart:core::_Foo:bar" { deopt_id 4 }
  (Constants (def v0 (Constant null)) (def v1 (Constant 1.5) { type (CompileType 5 { nullable false }) }))
  (Entries (Normal B1 (def v2 (Parameter 0)) { try_index -1 }))
  (Block B2 { block_type Join } (def v3 (Phi v2 v0)) (Return v3 { token_pos NoSource }))
  (Block B3 { block_type Target } (def v4 (StaticCall "dart:core::print" v1 { args_names ("x") })) (Goto B2)))
"#;

#[test]
fn line_form() {
    assert_eq!(
        r#"(CompileType 147 { nullable false, name "T{Smi}" })"#,
        compile_type().to_line(),
    );
}

#[test]
fn empty_and_extra_only_lists() {
    assert_eq!("()", SExp::from(SList::new()).to_line());
    assert_eq!(
        "({ k 1 })",
        SExp::from(SList::new().with_extra("k", 1i64)).to_line()
    );
}

#[test]
fn doubles_print_as_doubles() {
    let cases = [
        (1.0, "1.0"),
        (-2.0, "-2.0"),
        (0.05, "0.05"),
        (1.05, "1.05"),
        (1e100, "1e100"),
        (1e-100, "1e-100"),
        (0.0, "0.0"),
        (f64::NAN, "NaN"),
        (f64::INFINITY, "Infinity"),
        (f64::NEG_INFINITY, "-Infinity"),
    ];

    for (n, expected) in cases {
        let printed = SExp::double(n).to_line();
        assert_eq!(expected, printed);
        assert_eq!(Ok(SExp::double(n)), parse_str(&printed));
    }
}

#[test]
fn strings_are_escaped() {
    let sexp = SExp::string("a\"b\\c\n\t\u{01}\u{7f}é");

    assert_eq!(r#""a\"b\\c\n\t\u0001\u007Fé""#, sexp.to_line());
    assert_eq!(Ok(sexp.clone()), parse_str(&sexp.to_line()));
}

#[test]
fn wraps_elements_at_width() {
    let sexp = parse_str("(a bb ccc)").unwrap();

    assert_eq!("(a bb ccc)", sexp.serialize_to(10));
    assert_eq!("(a bb\n ccc)", sexp.serialize_to(6));
}

#[test]
fn wraps_extra_info_at_double_indent() {
    let sexp = parse_str("(T { a 1, b 2 })").unwrap();

    assert_eq!("(T { a 1,\n  b 2 })", sexp.serialize_to(10));
}

#[test]
fn breaks_children_that_fit_nowhere() {
    let sexp = parse_str("(a (bbb ccc ddd))").unwrap();

    assert_eq!("(a\n (bbb ccc\n  ddd))", sexp.serialize_to(10));
}

#[test]
fn reparse_at_every_width() {
    let sexp = parse_str(GRAPH).unwrap();

    for width in 0..=140 {
        let printed = sexp.serialize_to(width);

        assert_eq!(
            Ok(sexp.clone()),
            parse_str(&printed),
            "width {width}:\n{printed}"
        );
    }

    assert_eq!(Ok(sexp.clone()), parse_str(&sexp.to_line()));
}

#[test]
fn printing_is_deterministic() {
    let sexp = parse_str(GRAPH).unwrap();
    let printed = sexp.to_pretty();

    assert_eq!(printed, parse_str(&printed).unwrap().to_pretty());
}
