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

//! Constant objects and the structured operands that refer to them.

use super::{
    bool_value, expected, integer, name, name_str, symbolic_enum, u32_value,
    DeserializeError, DeserializeErrorKind, Deserializer, Form, Result,
};
use crate::{
    il::{
        object::Object, trace::DeserializerTrace, CompileType, Nullability,
        ObjectId, SsaIndex,
    },
    program::{cid, ClassId, FieldId, FunctionId, Owner, ProgramModel},
    sexp::{SExp, SExpKind},
    sym::GlobalSymbolResolve,
};

const OBJECT_TAGS: &[&str] = &[
    "ImmutableList",
    "Instance",
    "TypeArguments",
    "Type",
    "TypeRef",
    "TypeParameter",
    "Class",
    "Function",
    "Field",
    "Closure",
];

impl<'s, 'p, P: ProgramModel, T: DeserializerTrace> Deserializer<'s, 'p, P, T> {
    /// Parse a constant object.
    ///
    /// If the object refers to a constant definition that has not yet
    ///   been parsed,
    ///     the reference is recorded in [`Self::missing`] and [`None`] is
    ///     returned;
    ///   any objects allocated in the meantime must be discarded by the
    ///   caller.
    pub(super) fn parse_object(
        &mut self,
        sexp: &'s SExp,
    ) -> Result<Option<ObjectId>> {
        let object = match sexp.kind() {
            SExpKind::Bool(b) => Object::Bool(*b),
            SExpKind::Integer(n) => Object::Integer(*n),
            SExpKind::Double(n) => Object::double(*n),
            SExpKind::String(s) => Object::String(*s),

            SExpKind::Symbol(sym) => match sym.lookup_str() {
                "null" => Object::Null,
                "sentinel" => Object::Sentinel,
                other => {
                    let ssa = SsaIndex::parse(other)
                        .ok_or_else(|| expected("constant object", sexp))?;

                    return match self.pool_objects.get(&ssa) {
                        Some(&id) => Ok(Some(id)),
                        None => {
                            self.missing = Some((ssa, sexp));
                            Ok(None)
                        }
                    };
                }
            },

            SExpKind::List(_) => return self.parse_object_form(sexp),
        };

        Ok(Some(self.graph.objects.alloc(object)))
    }

    fn parse_object_form(&mut self, sexp: &'s SExp) -> Result<Option<ObjectId>> {
        let form = Form::tagged(sexp, OBJECT_TAGS)?;

        let object = match form.tag {
            "ImmutableList" => {
                let mut elems = Vec::with_capacity(form.list.len() - 1);

                for elem in form.rest(1) {
                    let Some(id) = self.parse_object(elem)? else {
                        return Ok(None);
                    };
                    elems.push(id);
                }

                let Some(type_args) = self.opt_object(&form, "type_args")? else {
                    return Ok(None);
                };

                Object::ImmutableList { elems, type_args }
            }

            "Instance" => return self.parse_instance(form),

            "TypeArguments" => {
                let mut types = Vec::with_capacity(form.list.len() - 1);

                for elem in form.rest(1) {
                    let Some(id) = self.parse_object(elem)? else {
                        return Ok(None);
                    };
                    types.push(id);
                }

                Object::TypeArguments(types)
            }

            "Type" => return self.parse_type(form),

            "TypeRef" => return self.parse_type_ref(form),

            "TypeParameter" => {
                form.max_len(2)?;

                let name = name(form.at(1, "type parameter name")?)?;
                let index = form.extra(u32_value, "index")?.unwrap_or(0);
                let nullability = self.nullability(&form)?;

                let Some(bound) = self.opt_object(&form, "bound")? else {
                    return Ok(None);
                };

                Object::TypeParameter {
                    name,
                    index,
                    bound,
                    nullability,
                }
            }

            "Class" => {
                form.max_len(2)?;
                Object::Class(self.class_ref(form.at(1, "class")?)?)
            }

            "Function" => {
                form.max_len(2)?;
                Object::Function(self.function_ref(form.at(1, "function name")?)?)
            }

            "Field" => {
                form.max_len(2)?;
                Object::Field(self.field_ref(form.at(1, "field name")?)?)
            }

            _ => {
                form.max_len(2)?;

                let function = self.function_ref(form.at(1, "function name")?)?;
                let Some(context) = self.opt_object(&form, "context")? else {
                    return Ok(None);
                };

                Object::Closure { function, context }
            }
        };

        Ok(Some(self.graph.objects.alloc(object)))
    }

    /// Parse `(Instance <class> { fields (<field-name> <object> …) })`.
    fn parse_instance(&mut self, form: Form<'s>) -> Result<Option<ObjectId>> {
        form.max_len(2)?;

        let class = self.class_ref(form.at(1, "class")?)?;
        let mut fields = Vec::new();

        if let Some(pairs) = form.list.extra_lookup_value("fields") {
            let list = pairs.as_list().ok_or_else(|| expected("field list", pairs))?;
            let elems = list.elems();

            if elems.len() % 2 != 0 {
                return Err(DeserializeError::new(
                    DeserializeErrorKind::MissingElement {
                        index: elems.len(),
                        what: "field value",
                    },
                    pairs,
                ));
            }

            for pair in elems.chunks_exact(2) {
                let field = self.field_ref(&pair[0])?;
                self.check_instance_field(class, field, &pair[0])?;

                let Some(value) = self.parse_object(&pair[1])? else {
                    return Ok(None);
                };

                let field_def = self.program.field(field);
                let actual = self.graph.objects.get(value).cid();

                if let Some(declared) = field_def.static_cid() {
                    if actual != cid::NULL && !cid::is_compatible(declared, actual) {
                        return Err(DeserializeError::new(
                            DeserializeErrorKind::IllTypedField(
                                self.program.field_name(field),
                            ),
                            &pair[1],
                        ));
                    }
                }

                fields.push((field, value));
            }
        }

        // Guards are shared with concurrent mutators of the program,
        //   which need be paused only if a guard actually widens.
        let widens = {
            let _mutator = self.program.safepoint().enter();

            fields.iter().any(|&(field, value)| {
                let guard = self.program.field_guard(field);
                guard.widen(self.graph.objects.get(value).cid()) != guard
            })
        };

        if widens {
            let pause = self.program.safepoint().pause();

            for &(field, value) in &fields {
                let cid = self.graph.objects.get(value).cid();
                self.program.widen_field_guard(field, cid, &pause);
            }
        }

        Ok(Some(
            self.graph.objects.alloc(Object::Instance { cid: class, fields }),
        ))
    }

    fn check_instance_field(
        &self,
        class: ClassId,
        field: FieldId,
        at: &'s SExp,
    ) -> Result<()> {
        let def = self.program.field(field);
        let field_name = || self.program.field_name(field);

        if def.owner() != Owner::Class(class) {
            let class_name = self.program.class_name(class).ok_or_else(|| {
                DeserializeError::new(
                    DeserializeErrorKind::InvalidCid(class.as_u32().into()),
                    at,
                )
            })?;

            return Err(DeserializeError::new(
                DeserializeErrorKind::FieldNotInClass(field_name(), class_name),
                at,
            ));
        }

        if def.is_static() {
            return Err(DeserializeError::new(
                DeserializeErrorKind::StaticFieldMismatch {
                    field: field_name(),
                    expected_static: false,
                },
                at,
            ));
        }

        if !def.is_final() {
            return Err(DeserializeError::new(
                DeserializeErrorKind::NonFinalField(field_name()),
                at,
            ));
        }

        Ok(())
    }

    /// Parse `(Type <class> { type_args …, nullability …, hash H })`.
    ///
    /// A type carrying a hash may refer to itself through
    ///   `(TypeRef { hash H })`;
    ///     those references are patched once the type has been allocated.
    fn parse_type(&mut self, form: Form<'s>) -> Result<Option<ObjectId>> {
        form.max_len(2)?;

        let cid = self.class_ref(form.at(1, "class")?)?;
        let nullability = self.nullability(&form)?;
        let hash = form.extra(integer, "hash")?;

        if let Some(hash) = hash {
            if self.type_hashes.insert(hash, Vec::new()).is_some() {
                return Err(form.error(DeserializeErrorKind::DuplicateTypeHash(hash)));
            }
        }

        let type_args = self.opt_object(&form, "type_args")?;
        let refs = hash
            .and_then(|hash| self.type_hashes.remove(&hash))
            .unwrap_or_default();

        let Some(type_args) = type_args else {
            return Ok(None);
        };

        let id = self.graph.objects.alloc(Object::Type {
            cid,
            type_args,
            nullability,
        });

        for type_ref in refs {
            self.graph.objects.patch_type_ref(type_ref, id);
        }

        Ok(Some(id))
    }

    /// Parse `(TypeRef <object>)` or `(TypeRef { hash H })`.
    fn parse_type_ref(&mut self, form: Form<'s>) -> Result<Option<ObjectId>> {
        form.max_len(2)?;

        if let Some(target) = form.list.get(1) {
            let Some(target) = self.parse_object(target)? else {
                return Ok(None);
            };

            return Ok(Some(
                self.graph.objects.alloc(Object::TypeRef(Some(target))),
            ));
        }

        let hash = form.required(integer, "hash")?;

        if !self.type_hashes.contains_key(&hash) {
            return Err(form.error(DeserializeErrorKind::UnknownTypeHash(hash)));
        }

        let id = self.graph.objects.alloc(Object::TypeRef(None));
        self.type_hashes.entry(hash).or_default().push(id);

        Ok(Some(id))
    }

    /// Extra-info object `label`,
    ///   where the outer [`None`] indicates an unresolved reference.
    fn opt_object(
        &mut self,
        form: &Form<'s>,
        label: &str,
    ) -> Result<Option<Option<ObjectId>>> {
        match form.list.extra_lookup_value(label) {
            Some(sexp) => Ok(self.parse_object(sexp)?.map(Some)),
            None => Ok(Some(None)),
        }
    }

    fn nullability(&self, form: &Form<'s>) -> Result<Nullability> {
        form.extra(
            |sexp| {
                symbolic_enum(sexp, "nullability", Nullability::NAMES, Nullability::parse)
            },
            "nullability",
        )
        .map(Option::unwrap_or_default)
    }

    /// Parse a constant object outside of the constant pool,
    ///   where every reference must already be resolvable.
    pub(super) fn resolved_object(&mut self, sexp: &'s SExp) -> Result<ObjectId> {
        match self.parse_object(sexp)? {
            Some(id) => Ok(self.graph.objects.canonicalize(id)),
            None => {
                let (ssa, at) = self.missing.take().unwrap_or_else(|| {
                    panic!("internal error: unresolved object without a reference")
                });

                Err(DeserializeError::new(
                    DeserializeErrorKind::UndefinedUse(ssa),
                    at,
                ))
            }
        }
    }

    /// Parse `(CompileType [cid] { nullable B, name "…", type <object> })`.
    pub(super) fn parse_compile_type(
        &mut self,
        sexp: &'s SExp,
    ) -> Result<CompileType> {
        let form = Form::tagged(sexp, &["CompileType"])?;
        form.max_len(2)?;

        let cid = match form.list.get(1) {
            Some(cid) => Some(self.class_ref(cid)?),
            None => None,
        };

        let ty = match form.list.extra_lookup_value("type") {
            Some(ty) => Some(self.resolved_object(ty)?),
            None => None,
        };

        Ok(CompileType {
            cid,
            nullable: form
                .extra(bool_value, "nullable")?
                .unwrap_or(true),
            name: form.extra(name, "name")?,
            ty,
        })
    }

    /// A class given either by class id or by canonical name.
    pub(super) fn class_ref(&self, sexp: &SExp) -> Result<ClassId> {
        match sexp.kind() {
            SExpKind::Integer(n) => u32::try_from(*n)
                .ok()
                .map(ClassId::new)
                .filter(|cid| self.program.is_valid_cid(*cid))
                .ok_or_else(|| {
                    DeserializeError::new(DeserializeErrorKind::InvalidCid(*n), sexp)
                }),
            _ => self
                .program
                .resolve_class(name_str(sexp)?)
                .map_err(|e| DeserializeError::new(e.into(), sexp)),
        }
    }

    pub(super) fn field_ref(&self, sexp: &SExp) -> Result<FieldId> {
        self.program
            .resolve_field(name_str(sexp)?)
            .map_err(|e| DeserializeError::new(e.into(), sexp))
    }

    pub(super) fn function_ref(&self, sexp: &SExp) -> Result<FunctionId> {
        self.program
            .resolve_function(name_str(sexp)?)
            .map_err(|e| DeserializeError::new(e.into(), sexp))
    }
}
