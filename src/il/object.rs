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

//! Constant objects.
//!
//! Constants referenced by a flow graph are stored in an [`ObjectStore`]
//!   owned by the graph and referred to by [`ObjectId`].
//! Objects are allocated freely while they are being parsed and are later
//!   [canonicalized](ObjectStore::canonicalize),
//!     which coalesces structurally identical objects into a single
//!     instance.
//!
//! Recursive types are represented by [`Object::TypeRef`],
//!   which is allocated unresolved and patched once the type that it
//!   refers to exists.
//! Type references are never coalesced and canonicalization does not
//!   follow them,
//!     so canonicalization always terminates even for self-referential
//!     types.

use crate::{
    program::{cid, ClassId, FieldId, FunctionId},
    sym::SymbolId,
};
use super::types::Nullability;
use fxhash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u32);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Object {
    Null,

    /// Marker for a value that has not yet been initialized.
    Sentinel,

    Bool(bool),
    Integer(i64),

    /// IEEE 754 bits of a double,
    ///   so that objects may be hashed and `NaN` canonicalizes to itself.
    Double(u64),

    String(SymbolId),

    ImmutableList {
        elems: Vec<ObjectId>,
        type_args: Option<ObjectId>,
    },

    /// Instance of a program class with its field values.
    Instance {
        cid: ClassId,
        fields: Vec<(FieldId, ObjectId)>,
    },

    TypeArguments(Vec<ObjectId>),

    Type {
        cid: ClassId,
        type_args: Option<ObjectId>,
        nullability: Nullability,
    },

    /// Reference to a type,
    ///   or [`None`] while the referenced type is still being constructed.
    TypeRef(Option<ObjectId>),

    TypeParameter {
        name: SymbolId,
        index: u32,
        bound: Option<ObjectId>,
        nullability: Nullability,
    },

    Class(ClassId),
    Function(FunctionId),
    Field(FieldId),

    Closure {
        function: FunctionId,
        context: Option<ObjectId>,
    },
}

impl Object {
    pub fn double(value: f64) -> Self {
        Self::Double(value.to_bits())
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(bits) => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }

    /// Class of this object.
    pub fn cid(&self) -> ClassId {
        match self {
            Self::Null => cid::NULL,
            Self::Sentinel => cid::SENTINEL,
            Self::Bool(_) => cid::BOOL,
            Self::Integer(n) if is_smi(*n) => cid::SMI,
            Self::Integer(_) => cid::MINT,
            Self::Double(_) => cid::DOUBLE,
            Self::String(_) => cid::STRING,
            Self::ImmutableList { .. } => cid::IMMUTABLE_LIST,
            Self::Instance { cid, .. } => *cid,
            Self::TypeArguments(_) => cid::TYPE_ARGUMENTS,
            Self::Type { .. } => cid::TYPE,
            Self::TypeRef(_) => cid::TYPE_REF,
            Self::TypeParameter { .. } => cid::TYPE_PARAMETER,
            Self::Class(_) => cid::CLASS,
            Self::Function(_) => cid::FUNCTION,
            Self::Field(_) => cid::FIELD,
            Self::Closure { .. } => cid::CLOSURE,
        }
    }

    /// Objects directly referenced by this object.
    pub fn children(&self) -> Vec<ObjectId> {
        match self {
            Self::ImmutableList { elems, type_args } => {
                elems.iter().copied().chain(*type_args).collect()
            }
            Self::Instance { fields, .. } => {
                fields.iter().map(|(_, value)| *value).collect()
            }
            Self::TypeArguments(types) => types.clone(),
            Self::Type { type_args, .. } => type_args.iter().copied().collect(),
            Self::TypeRef(target) => target.iter().copied().collect(),
            Self::TypeParameter { bound, .. } => bound.iter().copied().collect(),
            Self::Closure { context, .. } => context.iter().copied().collect(),
            _ => Vec::new(),
        }
    }

    /// This object with each child replaced by `f(child)`.
    ///
    /// [`Object::TypeRef`] targets are not mapped.
    fn map_children<F: FnMut(ObjectId) -> ObjectId>(&self, mut f: F) -> Self {
        match self {
            Self::ImmutableList { elems, type_args } => Self::ImmutableList {
                elems: elems.iter().map(|&id| f(id)).collect(),
                type_args: type_args.map(&mut f),
            },
            Self::Instance { cid, fields } => Self::Instance {
                cid: *cid,
                fields: fields.iter().map(|&(field, id)| (field, f(id))).collect(),
            },
            Self::TypeArguments(types) => {
                Self::TypeArguments(types.iter().map(|&id| f(id)).collect())
            }
            Self::Type {
                cid,
                type_args,
                nullability,
            } => Self::Type {
                cid: *cid,
                type_args: type_args.map(&mut f),
                nullability: *nullability,
            },
            Self::TypeParameter {
                name,
                index,
                bound,
                nullability,
            } => Self::TypeParameter {
                name: *name,
                index: *index,
                bound: bound.map(&mut f),
                nullability: *nullability,
            },
            Self::Closure { function, context } => Self::Closure {
                function: *function,
                context: context.map(&mut f),
            },
            other => other.clone(),
        }
    }
}

/// Whether `n` fits in a tagged small integer.
fn is_smi(n: i64) -> bool {
    (-(1 << 62)..(1 << 62)).contains(&n)
}

/// Arena of [`Object`]s with canonicalization.
#[derive(Debug, Default)]
pub struct ObjectStore {
    objects: Vec<Object>,
    canonical: FxHashMap<Object, ObjectId>,
}

/// Allocation position of an [`ObjectStore`] to which it may later be
///   [rolled back](ObjectStore::rollback).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreMark(usize);

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, object: Object) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(object);
        id
    }

    pub fn get(&self, id: ObjectId) -> &Object {
        &self.objects[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Point the unresolved [`Object::TypeRef`] `id` at `target`.
    ///
    /// Panics
    /// ======
    /// Patching anything other than an unresolved type reference is a
    ///   caller error.
    pub fn patch_type_ref(&mut self, id: ObjectId, target: ObjectId) {
        match &mut self.objects[id.0 as usize] {
            Object::TypeRef(slot @ None) => *slot = Some(target),
            other => panic!(
                "internal error: attempted to patch {other:?} as an \
                    unresolved type reference"
            ),
        }
    }

    pub fn mark(&self) -> StoreMark {
        StoreMark(self.objects.len())
    }

    /// Discard every object allocated since `mark`.
    ///
    /// Objects allocated after the mark must not have been canonicalized.
    pub fn rollback(&mut self, mark: StoreMark) {
        self.objects.truncate(mark.0);
        self.canonical.retain(|_, id| (id.0 as usize) < mark.0);
    }

    /// Canonical instance of the object `id`.
    ///
    /// Children are canonicalized first,
    ///   so two objects are coalesced exactly when they are structurally
    ///   equal after their children have been coalesced.
    /// Every [`Object::TypeRef`] is its own canonical instance,
    ///   but its target is canonicalized in place unless the reference
    ///   closes a cycle back to an object being canonicalized.
    ///
    /// Every type reference reachable from `id` must have been patched.
    pub fn canonicalize(&mut self, id: ObjectId) -> ObjectId {
        let mut visiting = Vec::new();
        self.canonicalize_within(id, &mut visiting)
    }

    fn canonicalize_within(
        &mut self,
        id: ObjectId,
        visiting: &mut Vec<ObjectId>,
    ) -> ObjectId {
        if let Object::TypeRef(target) = *self.get(id) {
            if let Some(target) = target.filter(|t| !visiting.contains(t)) {
                let canon = self.canonicalize_within(target, visiting);
                self.objects[id.0 as usize] = Object::TypeRef(Some(canon));
            }

            return id;
        }

        visiting.push(id);
        let canon = self
            .get(id)
            .clone()
            .map_children(|child| self.canonicalize_within(child, visiting));
        visiting.pop();

        match self.canonical.get(&canon) {
            Some(&existing) => existing,
            None => {
                self.objects[id.0 as usize] = canon.clone();
                self.canonical.insert(canon, id);
                id
            }
        }
    }

    /// Whether the object `id` is a canonical instance.
    pub fn is_canonical(&self, id: ObjectId) -> bool {
        match self.get(id) {
            Object::TypeRef(_) => true,
            object => self.canonical.get(object) == Some(&id),
        }
    }
}

#[cfg(test)]
mod test;
