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

//! Instructions and their operands.
//!
//! See [`INSTRUCTION_TAGS`] for the instructions that are understood;
//!   any other tag in instruction position is rejected as unhandled.

use super::{
    block_id, bool_value, integer, name, opt_id, symbolic, symbolic_enum,
    u32_value, DeserializeError, DeserializeErrorKind, Deserializer, Form,
    Result,
};
use crate::{
    il::{
        trace::DeserializerTrace, BinaryOpKind, BlockId, CallArgs,
        ComparisonKind, ICData, ICEntry, Instr, InstrId, InstrKind,
        NativeSlot, Representation, Slot, SpecialParameterKind, UnaryOpKind,
        ValueId, INSTRUCTION_TAGS,
    },
    program::{FieldId, ProgramModel},
    sexp::SExp,
    sym::GlobalSymbolResolve,
};
use arrayvec::ArrayVec;

const COMPARISON_TAGS: &[&str] =
    &["StrictCompare", "EqualityCompare", "RelationalOp"];

const SLOT_KINDS: &[&str] = &["Dart", "Native"];

impl<'s, 'p, P: ProgramModel, T: DeserializerTrace> Deserializer<'s, 'p, P, T> {
    /// Parse an instruction of the block `block`,
    ///   including its common extra info.
    pub(super) fn parse_instr(
        &mut self,
        sexp: &'s SExp,
        block: BlockId,
    ) -> Result<InstrId> {
        if let Some(tag) = sexp.tag() {
            if !INSTRUCTION_TAGS.contains(&tag.lookup_str()) {
                return Err(DeserializeError::new(
                    DeserializeErrorKind::UnknownInstruction(tag),
                    sexp,
                ));
            }
        }

        let form = Form::tagged(sexp, INSTRUCTION_TAGS)?;
        let kind = self.parse_instr_kind(form, block)?;

        let mut instr = Instr::new(kind, block);
        instr.meta.deopt_id = form.extra(opt_id, "deopt_id")?.flatten();
        instr.meta.inlining_id = form.extra(opt_id, "inlining_id")?.flatten();
        instr.meta.token_pos = form.extra(token_pos, "token_pos")?.flatten();

        if let Some(env) = form.list.extra_lookup_value("env") {
            instr.env = Some(self.parse_env(env)?);
        }

        Ok(self.graph.alloc_instr(instr))
    }

    fn parse_instr_kind(
        &mut self,
        form: Form<'s>,
        block: BlockId,
    ) -> Result<InstrKind> {
        use InstrKind::*;

        let kind = match form.tag {
            "Constant" => {
                return Err(form.error(DeserializeErrorKind::ConstantOutsidePool))
            }

            "Phi" => {
                return Err(form.error(DeserializeErrorKind::PhiAfterInstruction))
            }

            "Parameter" => {
                form.max_len(2)?;
                Parameter {
                    index: u32_value(form.at(1, "parameter index")?)?,
                }
            }

            "SpecialParameter" => {
                form.max_len(1)?;
                SpecialParameter(form.required(
                    |sexp| {
                        symbolic_enum(
                            sexp,
                            "special parameter kind",
                            SpecialParameterKind::NAMES,
                            SpecialParameterKind::parse,
                        )
                    },
                    "kind",
                )?)
            }

            "Redefinition" => {
                form.max_len(2)?;
                Redefinition(self.operand(&form, 1, "value")?)
            }

            "CheckStackOverflow" => {
                form.max_len(1)?;
                CheckStackOverflow {
                    stack_depth: form.extra(u32_value, "stack_depth")?.unwrap_or(0),
                    loop_depth: form.extra(u32_value, "loop_depth")?.unwrap_or(0),
                }
            }

            "Goto" => {
                form.max_len(2)?;
                Goto(block_id(form.at(1, "target block")?)?)
            }

            "Branch" => {
                form.max_len(4)?;

                let cmp = form.at(1, "comparison")?;
                let comparison = self.parse_instr(cmp, block)?;

                if !self.graph.instr(comparison).kind.is_comparison() {
                    return Err(DeserializeError::new(
                        DeserializeErrorKind::ExpectedTag(COMPARISON_TAGS),
                        cmp,
                    ));
                }

                Branch {
                    comparison,
                    true_target: block_id(form.at(2, "true target")?)?,
                    false_target: block_id(form.at(3, "false target")?)?,
                }
            }

            "Return" => {
                form.max_len(2)?;
                Return(self.operand(&form, 1, "value")?)
            }

            "Throw" => {
                form.max_len(2)?;
                Throw(self.operand(&form, 1, "exception")?)
            }

            "ReThrow" => {
                form.max_len(3)?;
                ReThrow {
                    exception: self.operand(&form, 1, "exception")?,
                    stacktrace: self.operand(&form, 2, "stack trace")?,
                    catch_try_index: form.required(u32_value, "catch_try_index")?,
                }
            }

            "StaticCall" => {
                let function = self.function_ref(form.at(1, "function name")?)?;
                let args = self.operands(&form, 2)?;
                let call = self.call_args(&form, args.len())?;

                StaticCall {
                    function,
                    args,
                    call,
                }
            }

            "InstanceCall" => {
                let selector = name(form.at(1, "selector")?)?;
                let args = self.operands(&form, 2)?;
                let call = self.call_args(&form, args.len())?;

                let ic_data = match form.list.extra_lookup_value("ic_data") {
                    Some(ic_data) => Some(self.parse_ic_data(ic_data)?),
                    None => None,
                };

                InstanceCall {
                    selector,
                    args,
                    call,
                    checked_arg_count: form
                        .extra(u32_value, "checked_arg_count")?
                        .unwrap_or(1),
                    ic_data,
                }
            }

            "LoadField" => {
                form.max_len(3)?;
                LoadField {
                    instance: self.operand(&form, 1, "instance")?,
                    slot: self.parse_slot(form.at(2, "slot")?)?,
                }
            }

            "StoreInstanceField" => {
                form.max_len(4)?;
                StoreInstanceField {
                    instance: self.operand(&form, 1, "instance")?,
                    slot: self.parse_slot(form.at(2, "slot")?)?,
                    value: self.operand(&form, 3, "value")?,
                    emit_store_barrier: form
                        .extra(bool_value, "emit_store_barrier")?
                        .unwrap_or(true),
                    is_initialization: form
                        .extra(bool_value, "is_initialization")?
                        .unwrap_or(false),
                }
            }

            "LoadStaticField" => {
                form.max_len(2)?;
                LoadStaticField(self.field_with(form.at(1, "field name")?, true)?)
            }

            "StoreStaticField" => {
                form.max_len(3)?;
                StoreStaticField {
                    field: self.field_with(form.at(1, "field name")?, true)?,
                    value: self.operand(&form, 2, "value")?,
                }
            }

            "AllocateObject" => {
                form.max_len(2)?;
                AllocateObject(self.class_ref(form.at(1, "class")?)?)
            }

            "CreateArray" => {
                form.max_len(3)?;
                CreateArray {
                    type_args: self.operand(&form, 1, "type arguments")?,
                    length: self.operand(&form, 2, "length")?,
                }
            }

            "BinarySmiOp" | "BinaryInt64Op" | "BinaryDoubleOp" => {
                form.max_len(3)?;

                let rep = match form.tag {
                    "BinarySmiOp" => Representation::Smi,
                    "BinaryInt64Op" => Representation::Int64,
                    _ => Representation::Double,
                };

                let op = form.required(
                    |sexp| {
                        symbolic_enum(
                            sexp,
                            "operator",
                            BinaryOpKind::NAMES,
                            BinaryOpKind::parse,
                        )
                    },
                    "op_kind",
                )?;

                if !rep.supports(op) {
                    return Err(
                        form.error(DeserializeErrorKind::UnsupportedOp(op, rep))
                    );
                }

                BinaryOp {
                    rep,
                    op,
                    left: self.operand(&form, 1, "left operand")?,
                    right: self.operand(&form, 2, "right operand")?,
                    is_truncating: form
                        .extra(bool_value, "is_truncating")?
                        .unwrap_or(false),
                }
            }

            "UnarySmiOp" => {
                form.max_len(2)?;
                UnarySmiOp {
                    op: form.required(
                        |sexp| {
                            symbolic_enum(
                                sexp,
                                "operator",
                                UnaryOpKind::NAMES,
                                UnaryOpKind::parse,
                            )
                        },
                        "op_kind",
                    )?,
                    value: self.operand(&form, 1, "value")?,
                }
            }

            "BoxInt64" | "BoxDouble" | "UnboxInt64" | "UnboxDouble" => {
                form.max_len(2)?;

                let rep = match form.tag {
                    "BoxInt64" | "UnboxInt64" => Representation::Int64,
                    _ => Representation::Double,
                };
                let value = self.operand(&form, 1, "value")?;

                match form.tag {
                    "BoxInt64" | "BoxDouble" => Box { rep, value },
                    _ => Unbox { rep, value },
                }
            }

            "StrictCompare" => {
                form.max_len(3)?;
                StrictCompare {
                    kind: comparison_kind(&form, ComparisonKind::STRICT)?,
                    left: self.operand(&form, 1, "left operand")?,
                    right: self.operand(&form, 2, "right operand")?,
                    needs_number_check: form
                        .extra(bool_value, "needs_number_check")?
                        .unwrap_or(false),
                }
            }

            "EqualityCompare" | "RelationalOp" => {
                form.max_len(3)?;

                let allowed = match form.tag {
                    "EqualityCompare" => ComparisonKind::EQUALITY,
                    _ => ComparisonKind::RELATIONAL,
                };

                let kind = comparison_kind(&form, allowed)?;
                let left = self.operand(&form, 1, "left operand")?;
                let right = self.operand(&form, 2, "right operand")?;
                let operation_cid = match form.list.extra_lookup_value("operation_cid") {
                    Some(cid) => Some(self.class_ref(cid)?),
                    None => None,
                };

                match form.tag {
                    "EqualityCompare" => EqualityCompare {
                        kind,
                        left,
                        right,
                        operation_cid,
                    },
                    _ => RelationalOp {
                        kind,
                        left,
                        right,
                        operation_cid,
                    },
                }
            }

            "CheckNull" => {
                form.max_len(2)?;
                CheckNull {
                    value: self.operand(&form, 1, "value")?,
                    function_name: form.extra(name, "function_name")?,
                }
            }

            "AssertAssignable" => {
                form.max_len(5)?;
                AssertAssignable {
                    value: self.operand(&form, 1, "value")?,
                    dst_type: self.operand(&form, 2, "destination type")?,
                    instantiator_type_args: self.operand(
                        &form,
                        3,
                        "instantiator type arguments",
                    )?,
                    function_type_args: self.operand(
                        &form,
                        4,
                        "function type arguments",
                    )?,
                    name: form.extra(name, "name")?,
                }
            }

            "AssertBoolean" => {
                form.max_len(2)?;
                AssertBoolean(self.operand(&form, 1, "value")?)
            }

            _ => {
                form.max_len(1)?;
                DebugStepCheck
            }
        };

        Ok(kind)
    }

    /// Use at positional element `index`.
    fn operand(
        &mut self,
        form: &Form<'s>,
        index: usize,
        what: &'static str,
    ) -> Result<ValueId> {
        self.parse_use(form.at(index, what)?, true)
    }

    /// Uses of every positional element starting at `index`.
    fn operands(&mut self, form: &Form<'s>, index: usize) -> Result<Vec<ValueId>> {
        form.rest(index)
            .iter()
            .map(|arg| self.parse_use(arg, true))
            .collect()
    }

    /// Parse `type_args_len` and `args_names` of a call with `nargs`
    ///   arguments.
    ///
    /// Named arguments are the trailing arguments of the call,
    ///   and the type arguments vector
    ///     (if any)
    ///   is its first argument.
    fn call_args(&self, form: &Form<'s>, nargs: usize) -> Result<CallArgs> {
        let type_args_len = form.extra(u32_value, "type_args_len")?.unwrap_or(0);

        let args_names = match form.list.extra_lookup_value("args_names") {
            Some(names) => names
                .as_list()
                .ok_or_else(|| super::expected("argument name list", names))?
                .elems()
                .iter()
                .map(name)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        if args_names.len() + usize::from(type_args_len > 0) > nargs {
            return Err(form.error(DeserializeErrorKind::TooManyArgumentNames));
        }

        Ok(CallArgs {
            type_args_len,
            args_names,
        })
    }

    /// Parse `(Slot <field-name>)` or `(Slot <native> { kind Native })`.
    fn parse_slot(&self, sexp: &'s SExp) -> Result<Slot> {
        let form = Form::tagged(sexp, &["Slot"])?;
        form.max_len(2)?;

        let kind = form
            .extra(|sexp| symbolic(sexp, "slot kind", SLOT_KINDS), "kind")?
            .unwrap_or("Dart");

        let target = form.at(1, "slot name")?;

        match kind {
            "Native" => symbolic_enum(
                target,
                "native slot",
                NativeSlot::NAMES,
                NativeSlot::parse,
            )
            .map(Slot::Native),
            _ => self.field_with(target, false).map(Slot::Dart),
        }
    }

    /// Resolve a field that must be static exactly when `is_static`.
    fn field_with(&self, sexp: &'s SExp, is_static: bool) -> Result<FieldId> {
        let field = self.field_ref(sexp)?;

        if self.program.field(field).is_static() != is_static {
            return Err(DeserializeError::new(
                DeserializeErrorKind::StaticFieldMismatch {
                    field: self.program.field_name(field),
                    expected_static: is_static,
                },
                sexp,
            ));
        }

        Ok(field)
    }

    /// Parse
    ///   `(ICData { num_args_tested N } (Entry (<cid>…) <function> <count>)…)`.
    fn parse_ic_data(&self, sexp: &'s SExp) -> Result<ICData> {
        let form = Form::tagged(sexp, &["ICData"])?;

        let num_args_tested = form.required(u32_value, "num_args_tested")?;
        let mut ic_data = ICData::new(num_args_tested as usize).ok_or_else(|| {
            form.error(DeserializeErrorKind::OutOfRange("num_args_tested"))
        })?;

        let expected = ic_data.num_args_tested();

        for entry_sexp in form.rest(1) {
            let entry = Form::tagged(entry_sexp, &["Entry"])?;
            entry.max_len(4)?;

            let cids_sexp = entry.at(1, "class ids")?;
            let cids_list = cids_sexp
                .as_list()
                .ok_or_else(|| super::expected("class id list", cids_sexp))?;

            let arity = |found| {
                DeserializeError::new(
                    DeserializeErrorKind::IcEntryArity { expected, found },
                    cids_sexp,
                )
            };

            let mut cids = ArrayVec::new();
            for cid in cids_list.elems() {
                cids.try_push(self.class_ref(cid)?)
                    .map_err(|_| arity(cids_list.len()))?;
            }

            ic_data
                .add_entry(ICEntry {
                    cids,
                    target: self.function_ref(entry.at(2, "target function")?)?,
                    count: integer(entry.at(3, "count")?)?,
                })
                .map_err(|rejected| arity(rejected.cids.len()))?;
        }

        Ok(ic_data)
    }
}

/// Required `kind` of a comparison,
///   restricted to `allowed`.
fn comparison_kind(
    form: &Form,
    allowed: &'static [&'static str],
) -> Result<ComparisonKind> {
    form.required(
        |sexp| {
            symbolic_enum(sexp, "comparison", allowed, ComparisonKind::parse)
        },
        "kind",
    )
}

/// Source position,
///   where `NoSource` denotes its absence.
fn token_pos(sexp: &SExp) -> Result<Option<i64>> {
    if sexp.is_symbol("NoSource") {
        Ok(None)
    } else {
        integer(sexp).map(Some)
    }
}
