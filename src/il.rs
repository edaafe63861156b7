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

//! Flow graph intermediate representation.
//!
//! A [`FlowGraph`] is the SSA-form control-flow graph of a single function
//!   as produced by the [deserializer](deserialize).
//! It is an arena:
//!   blocks, instructions, values, and environments are owned by the
//!   graph and refer to one another by index
//!     ([`BlockId`], [`InstrId`], [`ValueId`], [`EnvId`]),
//!   which allows uses to be created before their definitions and patched
//!   afterward without any shared ownership.
//!
//! Block [`BlockId::GRAPH_ENTRY`] is always the graph entry.
//! Its initial definitions are the constant pool,
//!   and its successors are the function's [entries](FlowGraph::entries).
//!
//! Block discovery and dominators are derived state
//!   (see [`graph`]);
//!     they are recomputed after construction and never read from text.

pub mod deserialize;
pub mod graph;
pub mod object;
pub mod serialize;
pub mod trace;
pub mod types;

pub use deserialize::{deserialize, DeserializeError, Deserializer};
pub use object::{Object, ObjectId, ObjectStore};
pub use serialize::{serialize, Serializer};
pub use types::{
    BinaryOpKind, CallArgs, ComparisonKind, CompileType, ICData, ICEntry,
    NativeSlot, Nullability, Range, RangeBoundary, Representation, Slot,
    SpecialParameterKind, UnaryOpKind,
};

use crate::{
    global,
    program::{ClassId, FieldId, FunctionId},
    sym::SymbolId,
};
use arrayvec::ArrayVec;
use fxhash::FxHashMap;
use std::fmt::Display;

/// Identifier of a basic block,
///   written `B<N>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(global::BlockIdSize);

impl BlockId {
    /// The graph entry,
    ///   which is implicit in the text form.
    pub const GRAPH_ENTRY: BlockId = BlockId(0);

    pub const fn new(id: global::BlockIdSize) -> Self {
        Self(id)
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Parse a block name of the form `B<N>`.
    pub fn parse(name: &str) -> Option<Self> {
        parse_index(name, 'B').map(Self)
    }
}

impl Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// Index of an SSA temporary,
///   written `v<N>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SsaIndex(global::SsaIndexSize);

impl SsaIndex {
    pub const fn new(index: global::SsaIndexSize) -> Self {
        Self(index)
    }

    pub fn as_u32(self) -> global::SsaIndexSize {
        self.0
    }

    /// Parse an SSA name of the form `v<N>`.
    pub fn parse(name: &str) -> Option<Self> {
        parse_index(name, 'v').map(Self)
    }
}

impl Display for SsaIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

fn parse_index(name: &str, prefix: char) -> Option<u32> {
    name.strip_prefix(prefix)
        .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|n| n.parse().ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstrId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EnvId(u32);

/// Flow graph of a single function.
///
/// See the [module-level documentation](self) for more information.
#[derive(Debug)]
pub struct FlowGraph {
    function: FunctionId,
    deopt_id: Option<u32>,
    osr_id: Option<u32>,
    env: Option<EnvId>,

    blocks: Vec<Option<Block>>,
    instrs: Vec<Instr>,
    values: Vec<Value>,
    envs: Vec<Environment>,
    objects: ObjectStore,

    entries: Vec<BlockId>,
    ssa_defs: FxHashMap<SsaIndex, InstrId>,

    max_block_id: BlockId,
    current_ssa_temp_index: u32,

    order: graph::BlockOrder,
}

impl FlowGraph {
    fn new(function: FunctionId) -> Self {
        let mut graph = Self {
            function,
            deopt_id: None,
            osr_id: None,
            env: None,
            blocks: Vec::new(),
            instrs: Vec::new(),
            values: Vec::new(),
            envs: Vec::new(),
            objects: ObjectStore::new(),
            entries: Vec::new(),
            ssa_defs: FxHashMap::default(),
            max_block_id: BlockId::GRAPH_ENTRY,
            current_ssa_temp_index: 0,
            order: graph::BlockOrder::default(),
        };

        graph.insert_block(Block::new(
            BlockId::GRAPH_ENTRY,
            BlockKind::GraphEntry,
        ));

        graph
    }

    /// The function that this graph implements.
    pub fn function(&self) -> FunctionId {
        self.function
    }

    pub fn deopt_id(&self) -> Option<u32> {
        self.deopt_id
    }

    /// Bytecode offset at which on-stack replacement enters this graph,
    ///   if it was compiled for OSR.
    pub fn osr_id(&self) -> Option<u32> {
        self.osr_id
    }

    /// Environment of the graph entry.
    pub fn env(&self) -> Option<EnvId> {
        self.env
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.as_usize()).and_then(Option::as_ref)
    }

    /// All blocks in order of increasing id.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().flatten()
    }

    pub fn graph_entry(&self) -> &Block {
        // Inserted by `FlowGraph::new` and never removed.
        self.blocks[0]
            .as_ref()
            .unwrap_or_else(|| panic!("internal error: missing graph entry"))
    }

    pub fn instr(&self, id: InstrId) -> &Instr {
        &self.instrs[id.0 as usize]
    }

    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.0 as usize]
    }

    pub fn environment(&self, id: EnvId) -> &Environment {
        &self.envs[id.0 as usize]
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    /// Entry blocks in declaration order.
    pub fn entries(&self) -> &[BlockId] {
        &self.entries
    }

    /// Constant pool,
    ///   which is the list of initial definitions of the graph entry.
    pub fn constants(&self) -> &[InstrId] {
        &self.graph_entry().initial_defs
    }

    /// Instruction defining `ssa`,
    ///   if any.
    ///
    /// Multiple SSA indexes may map to the same constant instruction if
    ///   their objects canonicalized to the same instance.
    pub fn definition(&self, ssa: SsaIndex) -> Option<InstrId> {
        self.ssa_defs.get(&ssa).copied()
    }

    /// Instruction defining the value `id`.
    pub fn definition_of(&self, id: ValueId) -> &Instr {
        self.instr(self.value(id).definition())
    }

    pub fn max_block_id(&self) -> BlockId {
        self.max_block_id
    }

    /// Next SSA index available for allocation by later passes.
    pub fn current_ssa_temp_index(&self) -> u32 {
        self.current_ssa_temp_index
    }

    /// Control-flow successors of the block `id`.
    ///
    /// The successors of the graph entry are the function's entries,
    ///   excluding indirect entries,
    ///     which are reached only by jumps within the graph;
    ///   the successors of any other block are determined by its final
    ///   instruction.
    pub fn successors(&self, id: BlockId) -> Vec<BlockId> {
        if id == BlockId::GRAPH_ENTRY {
            return self
                .entries
                .iter()
                .copied()
                .filter(|&entry| {
                    !matches!(
                        self.block(entry).map(Block::kind),
                        Some(BlockKind::IndirectEntry { .. })
                    )
                })
                .collect();
        }

        self.block(id)
            .and_then(|block| block.instrs.last())
            .map(|&last| self.instr(last).kind.successors().to_vec())
            .unwrap_or_default()
    }

    fn insert_block(&mut self, block: Block) {
        let index = block.id.as_usize();

        if self.blocks.len() <= index {
            self.blocks.resize_with(index + 1, || None);
        }

        self.blocks[index] = Some(block);
    }

    fn graph_entry_mut(&mut self) -> &mut Block {
        self.block_mut(BlockId::GRAPH_ENTRY)
            .unwrap_or_else(|| panic!("internal error: missing graph entry"))
    }

    /// Remove the block `id` so that it can be modified independently of
    ///   the graph and later restored with [`FlowGraph::insert_block`].
    fn take_block(&mut self, id: BlockId) -> Option<Block> {
        self.blocks.get_mut(id.as_usize()).and_then(Option::take)
    }

    fn block_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.blocks.get_mut(id.as_usize()).and_then(Option::as_mut)
    }

    fn alloc_instr(&mut self, instr: Instr) -> InstrId {
        let id = InstrId(self.instrs.len() as u32);
        self.instrs.push(instr);
        id
    }

    fn instr_mut(&mut self, id: InstrId) -> &mut Instr {
        &mut self.instrs[id.0 as usize]
    }

    fn alloc_value(&mut self, value: Value) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(value);
        id
    }

    fn value_mut(&mut self, id: ValueId) -> &mut Value {
        &mut self.values[id.0 as usize]
    }

    fn alloc_env(&mut self, env: Environment) -> EnvId {
        let id = EnvId(self.envs.len() as u32);
        self.envs.push(env);
        id
    }
}

/// Kind of a basic block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    GraphEntry,

    /// Normal or unchecked entry of the function.
    FunctionEntry {
        unchecked: bool,
    },

    /// On-stack replacement entry.
    OsrEntry,

    /// Entry of an exception handler.
    CatchEntry {
        catch_try_index: u32,
        needs_stacktrace: bool,
    },

    /// Entry reached by an indirect jump.
    ///
    /// This behaves as a join.
    IndirectEntry {
        indirect_id: u32,
    },

    Join,
    Target,
}

impl BlockKind {
    pub fn is_entry(&self) -> bool {
        !matches!(self, Self::Join | Self::Target)
    }

    /// Whether this block may merge control flow and so hold phis.
    pub fn is_join_like(&self) -> bool {
        matches!(self, Self::Join | Self::IndirectEntry { .. })
    }
}

impl Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GraphEntry => write!(f, "graph entry"),
            Self::FunctionEntry { unchecked: false } => {
                write!(f, "normal entry")
            }
            Self::FunctionEntry { unchecked: true } => {
                write!(f, "unchecked entry")
            }
            Self::OsrEntry => write!(f, "OSR entry"),
            Self::CatchEntry { .. } => write!(f, "catch entry"),
            Self::IndirectEntry { .. } => write!(f, "indirect entry"),
            Self::Join => write!(f, "join"),
            Self::Target => write!(f, "target"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    id: BlockId,
    kind: BlockKind,
    try_index: Option<u32>,
    deopt_id: Option<u32>,
    predecessors: Vec<BlockId>,
    initial_defs: Vec<InstrId>,
    phis: Vec<InstrId>,
    instrs: Vec<InstrId>,
    env: Option<EnvId>,
}

impl Block {
    fn new(id: BlockId, kind: BlockKind) -> Self {
        Self {
            id,
            kind,
            try_index: None,
            deopt_id: None,
            predecessors: Vec::new(),
            initial_defs: Vec::new(),
            phis: Vec::new(),
            instrs: Vec::new(),
            env: None,
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    /// Index of the enclosing try block,
    ///   if any.
    pub fn try_index(&self) -> Option<u32> {
        self.try_index
    }

    pub fn deopt_id(&self) -> Option<u32> {
        self.deopt_id
    }

    /// Predecessors in ascending order of block id.
    pub fn predecessors(&self) -> &[BlockId] {
        &self.predecessors
    }

    /// Definitions available on entry
    ///   (parameters of an entry block,
    ///     or the constant pool of the graph entry).
    pub fn initial_defs(&self) -> &[InstrId] {
        &self.initial_defs
    }

    pub fn phis(&self) -> &[InstrId] {
        &self.phis
    }

    /// Instructions of the block body,
    ///   the last of which is its control instruction.
    pub fn instrs(&self) -> &[InstrId] {
        &self.instrs
    }

    pub fn env(&self) -> Option<EnvId> {
        self.env
    }
}

/// Metadata common to every instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstrMeta {
    pub deopt_id: Option<u32>,

    /// Source position,
    ///   or [`None`] if the instruction has no corresponding source.
    pub token_pos: Option<i64>,

    pub inlining_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    kind: InstrKind,
    block: BlockId,
    ssa: Option<SsaIndex>,
    ty: Option<CompileType>,
    range: Option<Range>,
    meta: InstrMeta,
    env: Option<EnvId>,
}

impl Instr {
    fn new(kind: InstrKind, block: BlockId) -> Self {
        Self {
            kind,
            block,
            ssa: None,
            ty: None,
            range: None,
            meta: InstrMeta::default(),
            env: None,
        }
    }

    pub fn kind(&self) -> &InstrKind {
        &self.kind
    }

    /// Block containing this instruction.
    pub fn block(&self) -> BlockId {
        self.block
    }

    /// SSA index defined by this instruction,
    ///   if it is a definition.
    pub fn ssa(&self) -> Option<SsaIndex> {
        self.ssa
    }

    /// Type inferred for the definition.
    pub fn ty(&self) -> Option<&CompileType> {
        self.ty.as_ref()
    }

    pub fn range(&self) -> Option<&Range> {
        self.range.as_ref()
    }

    pub fn meta(&self) -> InstrMeta {
        self.meta
    }

    /// Deoptimization environment.
    pub fn env(&self) -> Option<EnvId> {
        self.env
    }
}

/// Use of a definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    def: Option<InstrId>,
    reaching_type: Option<CompileType>,
    inherit_type: bool,
}

impl Value {
    /// The instruction that defines this value.
    ///
    /// Panics
    /// ======
    /// A value is bound to its definition by the deserializer before the
    ///   graph is returned;
    ///     an unbound value indicates a bug in the deserializer.
    pub fn definition(&self) -> InstrId {
        self.def.unwrap_or_else(|| {
            panic!("internal error: use of an unbound pending value")
        })
    }

    /// Type refinement at this use.
    pub fn reaching_type(&self) -> Option<&CompileType> {
        self.reaching_type.as_ref()
    }

    /// Whether [`Value::reaching_type`] was copied from the definition.
    pub fn inherits_type(&self) -> bool {
        self.inherit_type
    }
}

/// Snapshot of live values used for deoptimization.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    values: Vec<ValueId>,
    fixed_param_count: u32,
    outer: Option<EnvId>,
}

impl Environment {
    pub fn values(&self) -> &[ValueId] {
        &self.values
    }

    pub fn fixed_param_count(&self) -> u32 {
        self.fixed_param_count
    }

    /// Environment of the caller,
    ///   if this environment belongs to an inlined function.
    pub fn outer(&self) -> Option<EnvId> {
        self.outer
    }
}

/// Instruction tags understood by the deserializer.
///
/// Any other tag in instruction position is unhandled.
pub const INSTRUCTION_TAGS: &[&str] = &[
    "Constant",
    "Parameter",
    "SpecialParameter",
    "Phi",
    "Redefinition",
    "CheckStackOverflow",
    "Goto",
    "Branch",
    "Return",
    "Throw",
    "ReThrow",
    "StaticCall",
    "InstanceCall",
    "LoadField",
    "StoreInstanceField",
    "LoadStaticField",
    "StoreStaticField",
    "AllocateObject",
    "CreateArray",
    "BinarySmiOp",
    "BinaryInt64Op",
    "BinaryDoubleOp",
    "UnarySmiOp",
    "BoxInt64",
    "BoxDouble",
    "UnboxInt64",
    "UnboxDouble",
    "StrictCompare",
    "EqualityCompare",
    "RelationalOp",
    "CheckNull",
    "AssertAssignable",
    "AssertBoolean",
    "DebugStepCheck",
];

#[derive(Debug, Clone, PartialEq)]
pub enum InstrKind {
    Constant(ObjectId),
    Parameter {
        index: u32,
    },
    SpecialParameter(SpecialParameterKind),
    Phi {
        inputs: Vec<ValueId>,
    },
    Redefinition(ValueId),
    CheckStackOverflow {
        stack_depth: u32,
        loop_depth: u32,
    },

    Goto(BlockId),

    /// Conditional branch on a comparison.
    ///
    /// The comparison instruction is owned by the branch and does not
    ///   appear in the block's instruction list.
    Branch {
        comparison: InstrId,
        true_target: BlockId,
        false_target: BlockId,
    },
    Return(ValueId),
    Throw(ValueId),
    ReThrow {
        exception: ValueId,
        stacktrace: ValueId,
        catch_try_index: u32,
    },

    StaticCall {
        function: FunctionId,
        args: Vec<ValueId>,
        call: CallArgs,
    },
    InstanceCall {
        selector: SymbolId,
        args: Vec<ValueId>,
        call: CallArgs,
        checked_arg_count: u32,
        ic_data: Option<ICData>,
    },

    LoadField {
        instance: ValueId,
        slot: Slot,
    },
    StoreInstanceField {
        instance: ValueId,
        slot: Slot,
        value: ValueId,
        emit_store_barrier: bool,
        is_initialization: bool,
    },
    LoadStaticField(FieldId),
    StoreStaticField {
        field: FieldId,
        value: ValueId,
    },

    AllocateObject(ClassId),
    CreateArray {
        type_args: ValueId,
        length: ValueId,
    },

    BinaryOp {
        rep: Representation,
        op: BinaryOpKind,
        left: ValueId,
        right: ValueId,
        is_truncating: bool,
    },
    UnarySmiOp {
        op: UnaryOpKind,
        value: ValueId,
    },
    Box {
        rep: Representation,
        value: ValueId,
    },
    Unbox {
        rep: Representation,
        value: ValueId,
    },

    StrictCompare {
        kind: ComparisonKind,
        left: ValueId,
        right: ValueId,
        needs_number_check: bool,
    },
    EqualityCompare {
        kind: ComparisonKind,
        left: ValueId,
        right: ValueId,
        operation_cid: Option<ClassId>,
    },
    RelationalOp {
        kind: ComparisonKind,
        left: ValueId,
        right: ValueId,
        operation_cid: Option<ClassId>,
    },

    CheckNull {
        value: ValueId,
        function_name: Option<SymbolId>,
    },
    AssertAssignable {
        value: ValueId,
        dst_type: ValueId,
        instantiator_type_args: ValueId,
        function_type_args: ValueId,
        name: Option<SymbolId>,
    },
    AssertBoolean(ValueId),
    DebugStepCheck,
}

impl InstrKind {
    /// Tag of this instruction in the text form.
    pub fn tag(&self) -> &'static str {
        use InstrKind::*;

        match self {
            Constant(_) => "Constant",
            Parameter { .. } => "Parameter",
            SpecialParameter(_) => "SpecialParameter",
            Phi { .. } => "Phi",
            Redefinition(_) => "Redefinition",
            CheckStackOverflow { .. } => "CheckStackOverflow",
            Goto(_) => "Goto",
            Branch { .. } => "Branch",
            Return(_) => "Return",
            Throw(_) => "Throw",
            ReThrow { .. } => "ReThrow",
            StaticCall { .. } => "StaticCall",
            InstanceCall { .. } => "InstanceCall",
            LoadField { .. } => "LoadField",
            StoreInstanceField { .. } => "StoreInstanceField",
            LoadStaticField(_) => "LoadStaticField",
            StoreStaticField { .. } => "StoreStaticField",
            AllocateObject(_) => "AllocateObject",
            CreateArray { .. } => "CreateArray",
            BinaryOp { rep, .. } => rep.binary_op_tag(),
            UnarySmiOp { .. } => "UnarySmiOp",
            Box { rep, .. } => rep.box_tag(),
            Unbox { rep, .. } => rep.unbox_tag(),
            StrictCompare { .. } => "StrictCompare",
            EqualityCompare { .. } => "EqualityCompare",
            RelationalOp { .. } => "RelationalOp",
            CheckNull { .. } => "CheckNull",
            AssertAssignable { .. } => "AssertAssignable",
            AssertBoolean(_) => "AssertBoolean",
            DebugStepCheck => "DebugStepCheck",
        }
    }

    /// Whether this instruction transfers control out of its block.
    pub fn is_control(&self) -> bool {
        use InstrKind::*;
        matches!(
            self,
            Goto(_) | Branch { .. } | Return(_) | Throw(_) | ReThrow { .. }
        )
    }

    /// Whether this instruction may be the comparison of a
    ///   [`InstrKind::Branch`].
    pub fn is_comparison(&self) -> bool {
        use InstrKind::*;
        matches!(
            self,
            StrictCompare { .. } | EqualityCompare { .. } | RelationalOp { .. }
        )
    }

    /// Whether this instruction produces a value and so may be bound to an
    ///   SSA index.
    pub fn is_definition(&self) -> bool {
        use InstrKind::*;
        !self.is_control()
            && !matches!(
                self,
                CheckStackOverflow { .. }
                    | StoreInstanceField { .. }
                    | StoreStaticField { .. }
                    | DebugStepCheck
            )
    }

    /// Blocks to which control may transfer from this instruction,
    ///   in order.
    pub fn successors(&self) -> ArrayVec<BlockId, 2> {
        let mut succ = ArrayVec::new();

        match self {
            Self::Goto(target) => succ.push(*target),
            Self::Branch {
                true_target,
                false_target,
                ..
            } => {
                succ.push(*true_target);
                succ.push(*false_target);
            }
            _ => (),
        }

        succ
    }
}
