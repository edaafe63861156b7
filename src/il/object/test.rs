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
use crate::{program::ClassId, sym::GlobalSymbolIntern};

type Sut = ObjectStore;

#[test]
fn integer_class_depends_on_magnitude() {
    assert_eq!(cid::SMI, Object::Integer(0).cid());
    assert_eq!(cid::SMI, Object::Integer(-(1 << 62)).cid());
    assert_eq!(cid::MINT, Object::Integer(1 << 62).cid());
    assert_eq!(cid::MINT, Object::Integer(i64::MIN).cid());
}

#[test]
fn nan_canonicalizes_to_itself() {
    let mut sut = Sut::new();

    let a = sut.alloc(Object::double(f64::NAN));
    let b = sut.alloc(Object::double(f64::NAN));

    assert_eq!(sut.canonicalize(a), sut.canonicalize(b));
    assert!(sut.get(a).as_double().unwrap().is_nan());
}

#[test]
fn canonicalization_is_structural() {
    let mut sut = Sut::new();

    let one = sut.alloc(Object::Integer(1));
    let s = sut.alloc(Object::String("a".intern()));
    let list = sut.alloc(Object::ImmutableList {
        elems: vec![one, s],
        type_args: None,
    });

    // Same structure built from distinct children.
    let one2 = sut.alloc(Object::Integer(1));
    let s2 = sut.alloc(Object::String("a".intern()));
    let list2 = sut.alloc(Object::ImmutableList {
        elems: vec![one2, s2],
        type_args: None,
    });

    let canon = sut.canonicalize(list);
    assert_eq!(list, canon);
    assert_eq!(canon, sut.canonicalize(list2));
    assert!(sut.is_canonical(canon));
    assert!(!sut.is_canonical(list2));

    let different = sut.alloc(Object::ImmutableList {
        elems: vec![s, one],
        type_args: None,
    });
    assert_ne!(canon, sut.canonicalize(different));
}

#[test]
fn recursive_type_through_type_ref() {
    let mut sut = Sut::new();
    let cid = ClassId::new(20);

    let type_ref = sut.alloc(Object::TypeRef(None));
    let args = sut.alloc(Object::TypeArguments(vec![type_ref]));
    let ty = sut.alloc(Object::Type {
        cid,
        type_args: Some(args),
        nullability: Nullability::NonNullable,
    });

    sut.patch_type_ref(type_ref, ty);

    assert_eq!(ty, sut.canonicalize(ty));
    assert_eq!(&Object::TypeRef(Some(ty)), sut.get(type_ref));
    assert!(sut.is_canonical(type_ref));
    assert_eq!(vec![ty], sut.get(type_ref).children());
}

#[test]
fn type_ref_target_canonicalized() {
    let mut sut = Sut::new();
    let cid = ClassId::new(20);
    let foo = || Object::Type {
        cid,
        type_args: None,
        nullability: Nullability::NonNullable,
    };

    let canon = sut.alloc(foo());
    assert_eq!(canon, sut.canonicalize(canon));

    let dup = sut.alloc(foo());
    let type_ref = sut.alloc(Object::TypeRef(Some(dup)));

    assert_eq!(type_ref, sut.canonicalize(type_ref));
    assert_eq!(&Object::TypeRef(Some(canon)), sut.get(type_ref));
    assert!(sut.is_canonical(canon));
}

#[test]
fn recursive_type_canonicalized_through_its_reference() {
    let mut sut = Sut::new();

    let type_ref = sut.alloc(Object::TypeRef(None));
    let args = sut.alloc(Object::TypeArguments(vec![type_ref]));
    let ty = sut.alloc(Object::Type {
        cid: ClassId::new(20),
        type_args: Some(args),
        nullability: Nullability::NonNullable,
    });
    sut.patch_type_ref(type_ref, ty);

    assert_eq!(type_ref, sut.canonicalize(type_ref));
    assert_eq!(&Object::TypeRef(Some(ty)), sut.get(type_ref));
    assert!(sut.is_canonical(ty));
    assert!(sut.is_canonical(args));
}

#[test]
#[should_panic]
fn patching_resolved_type_ref_panics() {
    let mut sut = Sut::new();

    let target = sut.alloc(Object::Null);
    let type_ref = sut.alloc(Object::TypeRef(Some(target)));

    sut.patch_type_ref(type_ref, target);
}

#[test]
fn rollback_discards_later_objects() {
    let mut sut = Sut::new();

    let kept = sut.alloc(Object::Bool(true));
    sut.canonicalize(kept);

    let mark = sut.mark();
    sut.alloc(Object::Integer(5));
    sut.alloc(Object::Null);
    assert_eq!(3, sut.len());

    sut.rollback(mark);
    assert_eq!(1, sut.len());
    assert!(sut.is_canonical(kept));

    // Allocation resumes at the mark.
    let again = sut.alloc(Object::Integer(5));
    assert_eq!(ObjectId(1), again);
}
