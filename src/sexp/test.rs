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
use crate::span::Context;

fn tagged(tag: &str) -> SList {
    SList::tagged(tag)
}

#[test]
fn atom_downcasts_match_only_own_variant() {
    let int = SExp::integer(5);

    assert_eq!(Some(5), int.as_integer());
    assert_eq!(None, int.as_bool());
    assert_eq!(None, int.as_double());
    assert_eq!(None, int.as_list());
    assert_eq!("integer", int.kind_name());

    let sym = SExp::symbol("v0");
    assert_eq!(Some("v0".intern()), sym.as_symbol());
    assert_eq!(None, sym.as_string());
    assert!(sym.is_symbol("v0"));
    assert!(!sym.is_symbol("v1"));

    // A string is not a symbol even if the content is the same.
    let string = SExp::string("v0");
    assert!(!string.is_symbol("v0"));
    assert_ne!(sym, string);
}

#[test]
fn tag_is_first_element_if_symbol() {
    let list = SExp::from(tagged("Block").with(SExp::symbol("B1")));
    assert_eq!(Some("Block".intern()), list.tag());

    let untagged = SExp::from(SList::new().with(SExp::integer(1)));
    assert_eq!(None, untagged.tag());

    assert_eq!(None, SExp::from(SList::new()).tag());
    assert_eq!(None, SExp::symbol("Block").tag());
}

#[test]
fn equality_ignores_spans() {
    let ctx = Context::from("sexp/eq");

    let a = SExp::integer(1).with_span(ctx.span(0, 1));
    let b = SExp::integer(1).with_span(ctx.span(40, 1));

    assert_eq!(a, b);
    assert_eq!(a, SExp::integer(1));
}

#[test]
fn equality_of_positional_elements_is_ordered() {
    let a = SExp::from(SList::new().with(1i64).with(2i64));
    let b = SExp::from(SList::new().with(2i64).with(1i64));

    assert_ne!(a, b);
}

#[test]
fn equality_of_extra_info_is_unordered() {
    let a = tagged("Range").with_extra("a", 1i64).with_extra("b", true);
    let b = tagged("Range").with_extra("b", true).with_extra("a", 1i64);

    assert_eq!(a, b);
}

#[test]
fn equality_requires_same_extra_keys() {
    let a = tagged("Range").with_extra("a", 1i64);
    let b = tagged("Range").with_extra("a", 1i64).with_extra("b", 2i64);
    let c = tagged("Range").with_extra("c", 1i64);

    assert_ne!(a, b);
    assert_ne!(b, a);
    assert_ne!(a, c);
}

#[test]
fn nan_equals_nan() {
    assert_eq!(SExp::double(f64::NAN), SExp::double(f64::NAN));
    assert_ne!(SExp::double(f64::NAN), SExp::double(0.0));

    // Different variants never compare equal.
    assert_ne!(SExp::double(1.0), SExp::integer(1));
}

#[test]
fn extra_lookup() {
    let list = tagged("CompileType")
        .with(147i64)
        .with_extra("nullable", false);

    assert!(list.extra_has_key("nullable"));
    assert!(!list.extra_has_key("name"));
    assert_eq!(Some(&SExp::bool(false)), list.extra_lookup_value("nullable"));
    assert_eq!(None, list.extra_lookup_value("name"));
    assert_eq!(1, list.extra_len());

    // Extra info does not count toward positional length.
    assert_eq!(2, list.len());
    assert_eq!(&SExp::integer(147), list.at(1));
    assert_eq!(None, list.get(2));
}

#[test]
fn extra_iter_preserves_insertion_order() {
    let list = tagged("T").with_extra("z", 1i64).with_extra("a", 2i64);

    let keys: Vec<_> = list.extra_iter().map(|(k, _)| k.lookup_str()).collect();
    assert_eq!(vec!["z", "a"], keys);
}

#[test]
fn try_add_extra_rejects_duplicate() {
    let mut list = tagged("T").with_extra("k", 1i64);

    assert_eq!(
        Err(("k".intern(), SExp::integer(2))),
        list.try_add_extra("k".intern(), SExp::integer(2)),
    );

    // Original value is retained.
    assert_eq!(Some(&SExp::integer(1)), list.extra_lookup_value("k"));
}

#[test]
#[should_panic]
fn add_extra_panics_on_duplicate() {
    let mut list = tagged("T");
    list.add_extra("k", 1i64);
    list.add_extra("k", 2i64);
}

#[test]
#[should_panic]
fn at_out_of_range_panics() {
    tagged("T").at(1);
}

#[test]
fn empty_list_may_hold_extra_info() {
    let list = SList::new().with_extra("k", 1i64);

    assert!(list.is_empty());
    assert_eq!(1, list.extra_len());
}
