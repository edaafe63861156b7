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
use crate::sym::GlobalSymbolResolve;

type Sut<'a> = SExpParser<'a>;

fn parse(src: &str) -> Result<SExp, ParseError> {
    Sut::new(src, UNKNOWN_CONTEXT).parse()
}

fn parse_list(src: &str) -> SList {
    parse(src)
        .expect("parse failed")
        .as_list()
        .expect("not a list")
        .clone()
}

fn err_kind(src: &str) -> (ParseErrorKind, usize) {
    let err = parse(src).expect_err("parse unexpectedly succeeded");
    (err.kind().clone(), err.offset())
}

fn string_content(src: &str) -> String {
    parse(src)
        .expect("parse failed")
        .as_string()
        .expect("not a string")
        .lookup_str()
        .to_string()
}

#[test]
fn bare_atoms() {
    assert_eq!(Ok(SExp::bool(true)), parse("true"));
    assert_eq!(Ok(SExp::bool(false)), parse("  false "));
    assert_eq!(Ok(SExp::integer(42)), parse("42"));
    assert_eq!(Ok(SExp::symbol("B1")), parse("B1"));
    assert_eq!(Ok(SExp::string("foo bar")), parse(r#""foo bar""#));
}

#[test]
fn bool_requires_exact_match() {
    assert_eq!(Ok(SExp::symbol("truely")), parse("truely"));
    assert_eq!(Ok(SExp::symbol("True")), parse("True"));
}

#[test]
fn negative_integers() {
    let list = parse_list("(-4 -50 -1414243)");

    assert_eq!(
        vec![
            SExp::integer(-4),
            SExp::integer(-50),
            SExp::integer(-1414243),
        ],
        list.elems(),
    );
}

#[test]
fn doubles() {
    let list = parse_list("(1.05 0.05 .03 1e100 1e-100)");
    let expected = [1.05, 0.05, 0.03, 1e100, 1e-100];

    assert_eq!(expected.len(), list.len());

    for (elem, expected) in list.elems().iter().zip(expected) {
        let actual = elem.as_double().expect("not a double");
        assert!(
            (actual - expected).abs() <= expected.abs() * f64::EPSILON,
            "{actual} != {expected}"
        );
    }
}

#[test]
fn special_doubles() {
    let list = parse_list("(NaN Infinity -Infinity)");

    assert!(list.at(0).as_double().unwrap().is_nan());

    let inf = list.at(1).as_double().unwrap();
    assert!(inf.is_infinite() && inf.is_sign_positive());

    let neg = list.at(2).as_double().unwrap();
    assert!(neg.is_infinite() && neg.is_sign_negative());
}

#[test]
fn integer_overflow_becomes_double() {
    assert_eq!(
        Ok(SExp::double(99999999999999999999.0)),
        parse("99999999999999999999"),
    );
}

#[test]
fn number_like_symbols() {
    assert_eq!(Ok(SExp::symbol("-")), parse("-"));
    assert_eq!(Ok(SExp::symbol("-inf")), parse("-inf"));
    assert_eq!(Ok(SExp::symbol("+inf")), parse("+inf"));
    assert_eq!(Ok(SExp::symbol("v10")), parse("v10"));
    assert_eq!(Ok(SExp::symbol("1-2")), parse("1-2"));
    assert_eq!(Ok(SExp::symbol("e5")), parse("e5"));
}

#[test]
fn escaped_backslash() {
    assert_eq!("123\\", string_content(r#""123\\""#));
}

#[test]
fn escaped_quote_does_not_terminate() {
    assert_eq!(
        (ParseErrorKind::UnterminatedString { start: 0 }, 6),
        err_kind(r#""123\""#),
    );
}

#[test]
fn control_escapes() {
    assert_eq!("\u{08}\u{0c}\n\r\t", string_content(r#""\b\f\n\r\t""#));
}

#[test]
fn identity_escapes() {
    assert_eq!("a\"q", string_content(r#""\a\"\q""#));
}

#[test]
fn unicode_escapes() {
    assert_eq!("\u{01} T", string_content(r#""\u0001 T""#));
}

#[test]
fn malformed_unicode_escape() {
    assert_eq!(
        (ParseErrorKind::MalformedUnicodeEscape, 1),
        err_kind(r#""\u12""#),
    );

    assert_eq!(
        (ParseErrorKind::MalformedUnicodeEscape, 1),
        err_kind(r#""\u12"#),
    );

    assert_eq!(
        (ParseErrorKind::MalformedUnicodeEscape, 3),
        err_kind(r#""ab\u00g1""#),
    );
}

#[test]
fn unicode_escape_above_ascii_rejected() {
    assert_eq!(
        (ParseErrorKind::UnsupportedUnicodeEscape(0xe9), 1),
        err_kind(r#""\u00e9""#),
    );
}

#[test]
fn unescaped_utf8_in_strings() {
    assert_eq!("caf\u{e9}", string_content("\"caf\u{e9}\""));
}

#[test]
fn extra_info_split_across_blocks() {
    let whole = parse(r#"(CompileType 147 { nullable false, name "T{Smi}"})"#);
    let split = parse(r#"(CompileType { nullable false } 147 { name "T{Smi}"})"#);

    assert_eq!(whole, split);

    let list = parse_list(r#"(CompileType { nullable false } 147 { name "T{Smi}"})"#);
    assert_eq!(
        vec![SExp::symbol("CompileType"), SExp::integer(147)],
        list.elems(),
    );
    assert_eq!(
        Some(&SExp::string("T{Smi}")),
        list.extra_lookup_value("name"),
    );
}

#[test]
fn trailing_comma_optional() {
    assert_eq!(parse("(a { x 1, y 2 })"), parse("(a { x 1, y 2, })"));
}

#[test]
fn list_as_map_value() {
    let list = parse_list("(Value v1 { type (CompileType 3), inherit_type true })");

    assert_eq!(
        Some("CompileType".intern()),
        list.extra_lookup_value("type").and_then(SExp::tag),
    );
}

#[test]
fn nested_lists() {
    let list = parse_list("(a (b (c)) ())");

    assert_eq!(3, list.len());
    assert_eq!(Some(0), list.at(2).as_list().map(SList::len));
}

#[test]
fn stops_after_first_form() {
    let mut sut = Sut::new("(a) (b) c", UNKNOWN_CONTEXT);

    assert_eq!(parse("(a)"), sut.parse());
    assert_eq!(3, sut.position());

    assert_eq!(parse("(b)"), sut.parse());
    assert_eq!(Ok(SExp::symbol("c")), sut.parse());
    assert!(sut.at_end());
}

#[test]
fn parse_all_forms() {
    let mut sut = Sut::new(" (a)\n(b) 5 ", UNKNOWN_CONTEXT);

    assert_eq!(
        Ok(vec![
            parse("(a)").unwrap(),
            parse("(b)").unwrap(),
            SExp::integer(5)
        ]),
        sut.parse_all(),
    );
}

#[test]
fn spans_recorded_for_atoms_and_lists() {
    let ctx = Context::from("parse/spans");
    let sexp = Sut::new("(foo \"s\" 12)", ctx).parse().unwrap();

    assert_eq!(Some(ctx.span(0, 12)), sexp.span());

    let list = sexp.as_list().unwrap();
    assert_eq!(Some(ctx.span(1, 3)), list.at(0).span());
    assert_eq!(Some(ctx.span(5, 3)), list.at(1).span());
    assert_eq!(Some(ctx.span(9, 2)), list.at(2).span());
}

#[test]
fn unterminated_list_cites_innermost_start() {
    let src = "(def v0 (Constant 3";

    assert_eq!(
        (ParseErrorKind::UnterminatedList { start: 8 }, src.len()),
        err_kind(src),
    );

    assert_eq!(
        "unterminated S-expression list starting at offset 8",
        parse(src).unwrap_err().to_string(),
    );
}

#[test]
fn unterminated_map_at_eof() {
    assert_eq!(
        (ParseErrorKind::UnterminatedMap { start: 3 }, 9),
        err_kind("(a { b 1 "),
    );
}

#[test]
fn unterminated_map_at_close_paren() {
    assert_eq!(
        (ParseErrorKind::UnterminatedMap { start: 3 }, 9),
        err_kind("(a { b 1 )"),
    );
}

#[test]
fn empty_input() {
    assert_eq!((ParseErrorKind::UnexpectedEof, 3), err_kind("   "));
}

#[test]
fn unexpected_close() {
    assert_eq!((ParseErrorKind::UnexpectedRightParen, 1), err_kind(" )"));
    assert_eq!((ParseErrorKind::UnexpectedRightBrace, 3), err_kind("(a })"));
}

#[test]
fn map_structure_errors() {
    assert_eq!((ParseErrorKind::MapOutsideList, 0), err_kind("{ a 1 }"));
    assert_eq!((ParseErrorKind::NestedMap, 5), err_kind("(a { { b 1 } })"));
    assert_eq!((ParseErrorKind::CommaOutsideMap, 2), err_kind("(a, b)"));
    assert_eq!((ParseErrorKind::MissingLabel, 5), err_kind("(a { , })"));
    assert_eq!((ParseErrorKind::NonSymbolLabel, 5), err_kind("(a { 1 2 })"));
    assert_eq!((ParseErrorKind::NonSymbolLabel, 5), err_kind("(a { (b) 2 })"));
    assert_eq!((ParseErrorKind::ExtraMapValue, 9), err_kind("(a { b 1 2 })"));
    assert_eq!((ParseErrorKind::ExtraMapValue, 9), err_kind("(a { b 1 (c) })"));
}

#[test]
fn map_pair_missing_value() {
    assert_eq!(
        (ParseErrorKind::MapPairMissingValue("b".intern()), 7),
        err_kind("(a { b , })"),
    );

    assert_eq!(
        (ParseErrorKind::MapPairMissingValue("b".intern()), 7),
        err_kind("(a { b })"),
    );
}

#[test]
fn repeated_label_across_blocks() {
    assert_eq!(
        (ParseErrorKind::RepeatedLabel("b".intern()), 13),
        err_kind("(a { b 1 } { b 2 })"),
    );
}

#[test]
fn diagnostic_for_unterminated_list_notes_start() {
    let ctx = Context::from("parse/diag");
    let err = Sut::new("(a (b", ctx).parse().unwrap_err();

    let desc = err.describe();
    assert_eq!(ctx.span(5, 0), desc[0].span());
    assert_eq!(ctx.span(3, 1), desc[1].span());
}
