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

type Sut = Program;

fn sut_with_foo() -> (Sut, ClassId, FieldId) {
    let mut sut = Sut::new();
    let lib = sut.add_library("file:///foo.dart".intern());
    let foo = sut.add_class(lib, "Foo".intern(), None).unwrap();
    let x = sut
        .add_field(Owner::Class(foo), "x".intern(), FieldSpec::default())
        .unwrap();

    (sut, foo, x)
}

#[test]
fn predefined_classes_resolvable() {
    let sut = Sut::new();

    for (cid, name) in cid::PREDEFINED {
        let cname = format!("dart:core::{name}");

        assert_eq!(Ok(cid), sut.resolve_class(&cname));
        assert_eq!(Some(cid), sut.class_name(cid).and_then(|n| sut.lookup_class(&n).ok()));
    }

    assert!(!sut.is_valid_cid(ClassId::new(0)));
    assert!(!sut.is_valid_cid(ClassId::new(19)));
}

#[test]
fn first_user_class_id() {
    let (_, foo, _) = sut_with_foo();
    assert_eq!(ClassId::new(cid::NUM_PREDEFINED), foo);
}

#[test]
fn add_library_is_idempotent() {
    let mut sut = Sut::new();

    let a = sut.add_library("lib".intern());
    let b = sut.add_library("lib".intern());

    assert_eq!(a, b);
}

#[test]
fn duplicate_class_rejected() {
    let (mut sut, _, _) = sut_with_foo();
    let lib = sut.add_library("file:///foo.dart".intern());

    assert!(matches!(
        sut.add_class(lib, "Foo".intern(), None),
        Err(ProgramError::DuplicateDefinition(_))
    ));
}

#[test]
fn explicit_cid_conflicts() {
    let (mut sut, foo, _) = sut_with_foo();
    let lib = sut.add_library("file:///foo.dart".intern());

    assert_eq!(
        Err(ProgramError::CidInUse(foo)),
        sut.add_class(lib, "Bar".intern(), Some(foo))
    );
    assert_eq!(
        Err(ProgramError::ReservedCid(cid::SMI)),
        sut.add_class(lib, "Bar".intern(), Some(cid::SMI))
    );
}

#[test]
fn lookup_kind_mismatch() {
    let (sut, _, _) = sut_with_foo();

    assert!(matches!(
        sut.resolve_class("file:///foo.dart::Foo.x"),
        Err(CanonicalNameError::ExpectedClass(_))
    ));
    assert!(matches!(
        sut.resolve_field("file:///foo.dart::Foo"),
        Err(CanonicalNameError::ExpectedField(_))
    ));
    assert!(matches!(
        sut.resolve_function("file:///foo.dart::Foo.x"),
        Err(CanonicalNameError::ExpectedFunction(_))
    ));
}

#[test]
fn lookup_unknown_entities() {
    let (sut, _, _) = sut_with_foo();

    assert_eq!(
        Err(CanonicalNameError::UnknownLibrary("nope".intern())),
        sut.resolve_class("nope::Foo")
    );
    assert!(matches!(
        sut.resolve_class("file:///foo.dart::Baz"),
        Err(CanonicalNameError::UnknownClass(_))
    ));
    assert!(matches!(
        sut.resolve_field("file:///foo.dart::Foo.y"),
        Err(CanonicalNameError::UnknownField(_))
    ));
    assert!(matches!(
        sut.resolve_field("file:///foo.dart::Baz.x"),
        Err(CanonicalNameError::UnknownClass(_))
    ));
    assert!(matches!(
        sut.resolve_function("file:///foo.dart::Foo:x"),
        Err(CanonicalNameError::UnknownFunction(_))
    ));
}

#[test]
fn getter_and_method_are_distinct() {
    let (mut sut, foo, _) = sut_with_foo();
    let owner = Owner::Class(foo);

    let get = sut
        .add_function(owner, "len".intern(), MemberKind::Getter, false)
        .unwrap();
    let method = sut
        .add_function(owner, "len".intern(), MemberKind::Method, false)
        .unwrap();

    assert_ne!(get, method);
    assert_eq!(Ok(get), sut.resolve_function("file:///foo.dart::Foo:get:len"));
    assert_eq!(Ok(method), sut.resolve_function("file:///foo.dart::Foo:len"));
    assert_eq!(
        "file:///foo.dart::Foo:get:len",
        sut.function_name(get).to_string()
    );
    assert_eq!(&[get, method], sut.class_functions(foo));
}

#[test]
fn field_guard_widens_under_pause() {
    let (sut, _, x) = sut_with_foo();

    assert_eq!(FieldGuard::Unknown, sut.field_guard(x));

    {
        let pause = sut.safepoint().pause();

        assert_eq!(
            FieldGuard::Cid(cid::SMI),
            sut.widen_field_guard(x, cid::SMI, &pause)
        );
        assert_eq!(
            FieldGuard::Cid(cid::SMI),
            sut.widen_field_guard(x, cid::SMI, &pause)
        );
        assert_eq!(
            FieldGuard::Dynamic,
            sut.widen_field_guard(x, cid::DOUBLE, &pause)
        );
    }

    assert_eq!(FieldGuard::Dynamic, sut.field_guard(x));
}

#[test]
fn compatible_cids() {
    assert!(cid::is_compatible(cid::SMI, cid::MINT));
    assert!(cid::is_compatible(cid::OBJECT, cid::STRING));
    assert!(!cid::is_compatible(cid::STRING, cid::SMI));
}
