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

//! Flow graph serializer.
//!
//! The [`Serializer`] is the inverse of the
//!   [deserializer](super::deserialize):
//!     it produces the canonical text form of a [`FlowGraph`].
//! The canonical form
//!
//!   - names every program entity by its canonical name as a string;
//!   - omits every extra-info entry whose value is the default;
//!   - emits blocks in reverse postorder;
//!   - refers to a constant that is in the pool by its SSA name wherever
//!       it appears within another constant;
//!   - and tags recursive types with hashes numbered in the order in which
//!       they are first referenced.
//!
//! Deserializing canonical text and serializing the result yields
//!   the same text.
//! Non-canonical text reaches a fixpoint after a single round trip.

use super::{
    deserialize::{
        BLOCK_TAG, CONSTANTS_TAG, DEF_TAG, ENTRIES_TAG, ENV_TAG, FLOW_GRAPH_TAG,
        VALUE_TAG,
    },
    object::Object,
    Block, BlockId, BlockKind, CallArgs, CompileType, EnvId, FlowGraph, ICData, InstrId,
    InstrKind, Nullability, ObjectId, Range, RangeBoundary, Slot, SsaIndex,
    ValueId,
};
use crate::{
    program::{ClassId, ProgramModel},
    sexp::{SExp, SExpKind, SList},
    sym::SymbolId,
};
use fxhash::FxHashMap;

/// Serialize `graph`,
///   which must have been deserialized against `program`.
pub fn serialize<P: ProgramModel>(program: &P, graph: &FlowGraph) -> SExp {
    Serializer::new(program, graph).serialize()
}

/// Flow graph serializer.
///
/// See the [module-level documentation](self) for more information.
pub struct Serializer<'a, P: ProgramModel> {
    program: &'a P,
    graph: &'a FlowGraph,

    /// SSA name of each object in the constant pool.
    pool: FxHashMap<ObjectId, SsaIndex>,

    /// Constant whose definition is being emitted.
    defining: Option<ObjectId>,

    /// Types being emitted,
    ///   with the hash assigned to each once it is first referenced.
    type_stack: Vec<(ObjectId, Option<i64>)>,
    next_hash: i64,
}

impl<'a, P: ProgramModel> Serializer<'a, P> {
    pub fn new(program: &'a P, graph: &'a FlowGraph) -> Self {
        let pool = graph
            .constants()
            .iter()
            .filter_map(|&id| {
                let instr = graph.instr(id);

                match (instr.kind(), instr.ssa()) {
                    (InstrKind::Constant(object), Some(ssa)) => {
                        Some((*object, ssa))
                    }
                    _ => None,
                }
            })
            .collect();

        Self {
            program,
            graph,
            pool,
            defining: None,
            type_stack: Vec::new(),
            next_hash: 0,
        }
    }

    pub fn serialize(mut self) -> SExp {
        let graph = self.graph;
        let name = self.program.function_name(graph.function()).to_string();

        let mut root = SList::tagged(FLOW_GRAPH_TAG).with(SExp::string(name));
        add_opt_id(&mut root, "deopt_id", graph.deopt_id());
        add_opt_id(&mut root, "osr_id", graph.osr_id());

        if let Some(env) = graph.env() {
            root.add_extra("env", self.env(env));
        }

        if !graph.constants().is_empty() {
            let mut constants = SList::tagged(CONSTANTS_TAG);

            for &id in graph.constants() {
                constants.add(self.def(id));
            }

            root.add(constants);
        }

        let mut entries = SList::tagged(ENTRIES_TAG);
        for &id in graph.entries() {
            entries.add(self.entry(id));
        }
        root.add(entries);

        for &id in graph.reverse_postorder() {
            if id != BlockId::GRAPH_ENTRY {
                root.add(self.block(id));
            }
        }

        root.into()
    }

    fn entry(&mut self, id: BlockId) -> SExp {
        let block = self.existing_block(id);

        let tag = match block.kind() {
            BlockKind::FunctionEntry { unchecked: false } => "Normal",
            BlockKind::FunctionEntry { unchecked: true } => "Unchecked",
            BlockKind::OsrEntry => "Osr",
            BlockKind::CatchEntry { .. } => "Catch",
            _ => "Indirect",
        };

        let mut entry = SList::tagged(tag).with(SExp::symbol(id.to_string()));

        for &def in block.initial_defs() {
            entry.add(self.def(def));
        }

        match block.kind() {
            BlockKind::CatchEntry {
                catch_try_index,
                needs_stacktrace,
            } => {
                entry.add_extra("catch_try_index", i64::from(catch_try_index));

                if needs_stacktrace {
                    entry.add_extra("needs_stacktrace", true);
                }
            }
            BlockKind::IndirectEntry { indirect_id } => {
                entry.add_extra("indirect_id", i64::from(indirect_id));
            }
            _ => (),
        }

        add_opt_id(&mut entry, "try_index", block.try_index());
        add_opt_id(&mut entry, "deopt_id", block.deopt_id());

        entry.into()
    }

    fn block(&mut self, id: BlockId) -> SExp {
        let block = self.existing_block(id);
        let mut list = SList::tagged(BLOCK_TAG).with(SExp::symbol(id.to_string()));

        // Entry headers are emitted only in the entries section.
        if !block.kind().is_entry() {
            let block_type = match block.kind() {
                BlockKind::Join => "Join",
                _ => "Target",
            };

            list.add_extra("block_type", SExp::symbol(block_type));
            add_opt_id(&mut list, "try_index", block.try_index());
            add_opt_id(&mut list, "deopt_id", block.deopt_id());
        }

        if let Some(env) = block.env() {
            list.add_extra("env", self.env(env));
        }

        for &phi in block.phis() {
            list.add(self.def(phi));
        }

        for &instr in block.instrs() {
            list.add(self.def(instr));
        }

        list.into()
    }

    fn existing_block(&self, id: BlockId) -> &'a Block {
        let graph = self.graph;

        graph.block(id).unwrap_or_else(|| {
            panic!("internal error: missing block {id}")
        })
    }

    /// An instruction,
    ///   wrapped in `(def v<N> …)` if it defines an SSA index.
    fn def(&mut self, id: InstrId) -> SExp {
        let graph = self.graph;
        let instr = graph.instr(id);
        let body = self.instr(id);

        let Some(ssa) = instr.ssa() else {
            return body;
        };

        let mut def = SList::tagged(DEF_TAG)
            .with(SExp::symbol(ssa.to_string()))
            .with(body);

        if let Some(ty) = instr.ty() {
            def.add_extra("type", self.compile_type(ty));
        }
        if let Some(range) = instr.range() {
            def.add_extra("range", range_sexp(range));
        }

        def.into()
    }

    fn instr(&mut self, id: InstrId) -> SExp {
        use InstrKind::*;

        let graph = self.graph;
        let instr = graph.instr(id);
        let kind = instr.kind();

        let mut list = SList::tagged(kind.tag());

        match kind {
            Constant(object) => {
                self.defining = Some(*object);
                list.add(self.object(*object));
                self.defining = None;
            }

            Parameter { index } => list.add(i64::from(*index)),

            SpecialParameter(kind) => {
                list.add_extra("kind", SExp::symbol(kind.name()))
            }

            Phi { inputs } => {
                for &input in inputs {
                    list.add(self.value(input));
                }
            }

            Redefinition(value)
            | Return(value)
            | Throw(value)
            | AssertBoolean(value) => list.add(self.value(*value)),

            CheckStackOverflow {
                stack_depth,
                loop_depth,
            } => {
                add_nonzero(&mut list, "stack_depth", *stack_depth);
                add_nonzero(&mut list, "loop_depth", *loop_depth);
            }

            Goto(target) => list.add(SExp::symbol(target.to_string())),

            Branch {
                comparison,
                true_target,
                false_target,
            } => {
                list.add(self.instr(*comparison));
                list.add(SExp::symbol(true_target.to_string()));
                list.add(SExp::symbol(false_target.to_string()));
            }

            ReThrow {
                exception,
                stacktrace,
                catch_try_index,
            } => {
                list.add(self.value(*exception));
                list.add(self.value(*stacktrace));
                list.add_extra("catch_try_index", i64::from(*catch_try_index));
            }

            StaticCall {
                function,
                args,
                call,
            } => {
                let name = self.program.function_name(*function).to_string();
                list.add(SExp::string(name));
                self.add_values(&mut list, args);
                add_call_args(&mut list, call);
            }

            InstanceCall {
                selector,
                args,
                call,
                checked_arg_count,
                ic_data,
            } => {
                list.add(string_sym(*selector));
                self.add_values(&mut list, args);
                add_call_args(&mut list, call);

                if *checked_arg_count != 1 {
                    list.add_extra("checked_arg_count", i64::from(*checked_arg_count));
                }

                if let Some(ic_data) = ic_data {
                    list.add_extra("ic_data", self.ic_data(ic_data));
                }
            }

            LoadField { instance, slot } => {
                list.add(self.value(*instance));
                list.add(self.slot(slot));
            }

            StoreInstanceField {
                instance,
                slot,
                value,
                emit_store_barrier,
                is_initialization,
            } => {
                list.add(self.value(*instance));
                list.add(self.slot(slot));
                list.add(self.value(*value));

                if !emit_store_barrier {
                    list.add_extra("emit_store_barrier", false);
                }
                if *is_initialization {
                    list.add_extra("is_initialization", true);
                }
            }

            LoadStaticField(field) => {
                list.add(SExp::string(self.program.field_name(*field).to_string()))
            }

            StoreStaticField { field, value } => {
                list.add(SExp::string(self.program.field_name(*field).to_string()));
                list.add(self.value(*value));
            }

            AllocateObject(cid) => list.add(self.class(*cid)),

            CreateArray { type_args, length } => {
                list.add(self.value(*type_args));
                list.add(self.value(*length));
            }

            BinaryOp {
                op,
                left,
                right,
                is_truncating,
                ..
            } => {
                list.add(self.value(*left));
                list.add(self.value(*right));
                list.add_extra("op_kind", SExp::symbol(op.name()));

                if *is_truncating {
                    list.add_extra("is_truncating", true);
                }
            }

            UnarySmiOp { op, value } => {
                list.add(self.value(*value));
                list.add_extra("op_kind", SExp::symbol(op.name()));
            }

            Box { value, .. } | Unbox { value, .. } => {
                list.add(self.value(*value))
            }

            StrictCompare {
                kind,
                left,
                right,
                needs_number_check,
            } => {
                list.add(self.value(*left));
                list.add(self.value(*right));
                list.add_extra("kind", SExp::symbol(kind.name()));

                if *needs_number_check {
                    list.add_extra("needs_number_check", true);
                }
            }

            EqualityCompare {
                kind,
                left,
                right,
                operation_cid,
            }
            | RelationalOp {
                kind,
                left,
                right,
                operation_cid,
            } => {
                list.add(self.value(*left));
                list.add(self.value(*right));
                list.add_extra("kind", SExp::symbol(kind.name()));

                if let Some(cid) = operation_cid {
                    list.add_extra("operation_cid", cid_sexp(*cid));
                }
            }

            CheckNull {
                value,
                function_name,
            } => {
                list.add(self.value(*value));

                if let Some(name) = function_name {
                    list.add_extra("function_name", string_sym(*name));
                }
            }

            AssertAssignable {
                value,
                dst_type,
                instantiator_type_args,
                function_type_args,
                name,
            } => {
                self.add_values(
                    &mut list,
                    &[*value, *dst_type, *instantiator_type_args, *function_type_args],
                );

                if let Some(name) = name {
                    list.add_extra("name", string_sym(*name));
                }
            }

            DebugStepCheck => (),
        }

        let meta = instr.meta();
        add_opt_id(&mut list, "deopt_id", meta.deopt_id);
        add_opt_id(&mut list, "inlining_id", meta.inlining_id);

        if let Some(pos) = meta.token_pos {
            list.add_extra("token_pos", pos);
        }

        if let Some(env) = instr.env() {
            list.add_extra("env", self.env(env));
        }

        list.into()
    }

    fn add_values(&mut self, list: &mut SList, values: &[ValueId]) {
        for &value in values {
            list.add(self.value(value));
        }
    }

    /// A use,
    ///   written as the SSA name of its definition.
    fn value(&mut self, id: ValueId) -> SExp {
        let graph = self.graph;
        let value = graph.value(id);
        let def = graph.definition_of(id);

        let ssa = def.ssa().unwrap_or_else(|| {
            panic!("internal error: use of {} without an SSA index", def.kind().tag())
        });
        let name = SExp::symbol(ssa.to_string());

        if value.inherits_type() {
            SList::tagged(VALUE_TAG)
                .with(name)
                .with_extra("inherit_type", true)
                .into()
        } else if let Some(ty) = value.reaching_type() {
            let ty = self.compile_type(ty);
            SList::tagged(VALUE_TAG).with(name).with_extra("type", ty).into()
        } else {
            name
        }
    }

    fn env(&mut self, id: EnvId) -> SExp {
        let graph = self.graph;
        let env = graph.environment(id);

        let mut list = SList::tagged(ENV_TAG);
        self.add_values(&mut list, env.values());
        add_nonzero(&mut list, "fixed_param_count", env.fixed_param_count());

        if let Some(outer) = env.outer() {
            list.add_extra("outer", self.env(outer));
        }

        list.into()
    }

    fn compile_type(&mut self, ty: &CompileType) -> SExp {
        let mut list = SList::tagged("CompileType");

        if let Some(cid) = ty.cid {
            list.add(cid_sexp(cid));
        }
        if !ty.nullable {
            list.add_extra("nullable", false);
        }
        if let Some(name) = ty.name {
            list.add_extra("name", string_sym(name));
        }
        if let Some(object) = ty.ty {
            list.add_extra("type", self.child(object));
        }

        list.into()
    }

    fn slot(&self, slot: &Slot) -> SExp {
        let list = match slot {
            Slot::Dart(field) => SList::tagged("Slot")
                .with(SExp::string(self.program.field_name(*field).to_string())),
            Slot::Native(native) => SList::tagged("Slot")
                .with(SExp::symbol(native.name()))
                .with_extra("kind", SExp::symbol("Native")),
        };

        list.into()
    }

    fn ic_data(&self, ic_data: &ICData) -> SExp {
        let mut list = SList::tagged("ICData")
            .with_extra("num_args_tested", ic_data.num_args_tested() as i64);

        for entry in ic_data.entries() {
            let mut cids = SList::new();
            for &cid in &entry.cids {
                cids.add(cid_sexp(cid));
            }

            let target = self.program.function_name(entry.target).to_string();

            list.add(
                SList::tagged("Entry")
                    .with(cids)
                    .with(SExp::string(target))
                    .with(entry.count),
            );
        }

        list.into()
    }

    /// A class by canonical name,
    ///   or by class id if it has none.
    fn class(&self, cid: ClassId) -> SExp {
        match self.program.class_name(cid) {
            Some(name) => SExp::string(name.to_string()),
            None => cid_sexp(cid),
        }
    }

    /// An object referenced from within another object.
    fn child(&mut self, id: ObjectId) -> SExp {
        match self.pool.get(&id) {
            Some(ssa) if self.defining != Some(id) => SExp::symbol(ssa.to_string()),
            _ => self.object(id),
        }
    }

    fn opt_child(&mut self, list: &mut SList, label: &str, id: Option<ObjectId>) {
        if let Some(id) = id {
            let child = self.child(id);
            list.add_extra(label, child);
        }
    }

    fn object(&mut self, id: ObjectId) -> SExp {
        let graph = self.graph;

        match graph.objects().get(id) {
            Object::Null => SExp::symbol("null"),
            Object::Sentinel => SExp::symbol("sentinel"),
            Object::Bool(b) => SExp::bool(*b),
            Object::Integer(n) => SExp::integer(*n),
            Object::Double(bits) => SExp::double(f64::from_bits(*bits)),
            Object::String(s) => string_sym(*s),

            Object::ImmutableList { elems, type_args } => {
                let mut list = SList::tagged("ImmutableList");

                for &elem in elems {
                    list.add(self.child(elem));
                }

                self.opt_child(&mut list, "type_args", *type_args);
                list.into()
            }

            Object::Instance { cid, fields } => {
                let mut list = SList::tagged("Instance").with(self.class(*cid));

                if !fields.is_empty() {
                    let mut pairs = SList::new();

                    for &(field, value) in fields {
                        pairs.add(SExp::string(
                            self.program.field_name(field).to_string(),
                        ));
                        pairs.add(self.child(value));
                    }

                    list.add_extra("fields", pairs);
                }

                list.into()
            }

            Object::TypeArguments(types) => {
                let mut list = SList::tagged("TypeArguments");

                for &ty in types {
                    list.add(self.child(ty));
                }

                list.into()
            }

            Object::Type {
                cid,
                type_args,
                nullability,
            } => {
                let mut list = SList::tagged("Type").with(self.class(*cid));

                self.type_stack.push((id, None));
                self.opt_child(&mut list, "type_args", *type_args);

                if let Some((_, Some(hash))) = self.type_stack.pop() {
                    list.add_extra("hash", hash);
                }

                add_nullability(&mut list, *nullability);
                list.into()
            }

            Object::TypeRef(target) => {
                let target = target.unwrap_or_else(|| {
                    panic!("internal error: unresolved type reference")
                });

                let on_stack = self
                    .type_stack
                    .iter_mut()
                    .rev()
                    .find(|(ty, _)| *ty == target);

                match on_stack {
                    Some((_, hash)) => {
                        let next_hash = &mut self.next_hash;
                        let hash = *hash.get_or_insert_with(|| {
                            *next_hash += 1;
                            *next_hash - 1
                        });

                        SList::tagged("TypeRef").with_extra("hash", hash).into()
                    }
                    None => SList::tagged("TypeRef").with(self.child(target)).into(),
                }
            }

            Object::TypeParameter {
                name,
                index,
                bound,
                nullability,
            } => {
                let mut list = SList::tagged("TypeParameter").with(string_sym(*name));

                add_nonzero(&mut list, "index", *index);
                self.opt_child(&mut list, "bound", *bound);
                add_nullability(&mut list, *nullability);

                list.into()
            }

            Object::Class(cid) => SList::tagged("Class").with(self.class(*cid)).into(),

            Object::Function(function) => SList::tagged("Function")
                .with(SExp::string(
                    self.program.function_name(*function).to_string(),
                ))
                .into(),

            Object::Field(field) => SList::tagged("Field")
                .with(SExp::string(self.program.field_name(*field).to_string()))
                .into(),

            Object::Closure { function, context } => {
                let mut list = SList::tagged("Closure").with(SExp::string(
                    self.program.function_name(*function).to_string(),
                ));

                self.opt_child(&mut list, "context", *context);
                list.into()
            }
        }
    }
}

fn string_sym(sym: SymbolId) -> SExp {
    SExp::new(SExpKind::String(sym))
}

fn cid_sexp(cid: ClassId) -> SExp {
    SExp::integer(cid.as_u32().into())
}

fn add_opt_id(list: &mut SList, label: &str, id: Option<u32>) {
    if let Some(id) = id {
        list.add_extra(label, i64::from(id));
    }
}

fn add_nonzero(list: &mut SList, label: &str, n: u32) {
    if n != 0 {
        list.add_extra(label, i64::from(n));
    }
}

fn add_nullability(list: &mut SList, nullability: Nullability) {
    if nullability != Nullability::default() {
        list.add_extra("nullability", SExp::symbol(nullability.name()));
    }
}

fn add_call_args(list: &mut SList, call: &CallArgs) {
    if call.type_args_len != 0 {
        list.add_extra("type_args_len", i64::from(call.type_args_len));
    }

    if !call.args_names.is_empty() {
        let mut names = SList::new();
        for &name in &call.args_names {
            names.add(string_sym(name));
        }

        list.add_extra("args_names", names);
    }
}

fn range_sexp(range: &Range) -> SExp {
    let bound = |bound: RangeBoundary| match bound {
        RangeBoundary::Const(n) => SExp::integer(n),
        other => SExp::symbol(other.to_string()),
    };

    SList::tagged("Range")
        .with(bound(range.min()))
        .with(bound(range.max()))
        .into()
}
