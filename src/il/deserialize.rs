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

//! Flow graph deserializer.
//!
//! The [`Deserializer`] reconstructs a [`FlowGraph`] from its
//!   S-expression text form:
//!
//! ```text
//! (FlowGraph "file:///main.dart::Foo:bar" { deopt_id 0 }
//!   (Constants
//!     (def v0 (Constant null))
//!     (def v1 (Constant 42) { type (CompileType 3 { nullable false }) }))
//!   (Entries
//!     (Normal B1 (def v2 (Parameter 0)) { deopt_id 1 }))
//!   (Block B1
//!     (CheckStackOverflow { deopt_id 2 })
//!     (Branch (StrictCompare v2 v0 { kind === }) B2 B3))
//!   (Block B2 { block_type Target } (Goto B4))
//!   (Block B3 { block_type Target } (Goto B4))
//!   (Block B4 { block_type Join }
//!     (def v3 (Phi v1 v2))
//!     (Return v3)))
//! ```
//!
//! Deserialization proceeds in strictly ordered phases:
//!
//!   1. The root is validated and the graph entry is constructed
//!        ([`Deserializer::new`]).
//!   2. The constant pool is parsed.
//!      Constants may refer to one another in any textual order,
//!        so each definition is attempted repeatedly until a pass over
//!        the remaining definitions makes no progress.
//!      Objects are then canonicalized;
//!        definitions whose objects are coalesced share a single
//!        `Constant` instruction.
//!   3. The environment of the graph entry is parsed,
//!        which may refer only to constants.
//!   4. Entries are registered along with their initial definitions.
//!   5. Block bodies are parsed from a worklist seeded with the entries.
//!      Each block parses its phis,
//!        then its environment,
//!        then its instructions,
//!        and finally queues the successors of its control instruction.
//!   6. Every block that appears in the text must have been reached,
//!        every use must have been bound to a definition,
//!        and control-flow edges must agree with the kinds of the blocks
//!        that they target.
//!   7. Block discovery and dominators are computed.
//!
//! A use of an SSA value that precedes its definition
//!   (as in a phi input along a back edge)
//!   produces a _pending_ value that is bound once the definition is
//!   parsed.
//! Environments must not refer to values that have not yet been defined.
//!
//! Deserialization fails on the first error;
//!   see [`DeserializeError`].

mod error;
mod instr;
mod object;

pub use error::{DeserializeError, DeserializeErrorKind, PathElem};

use super::{
    trace::{DefaultTrace, DeserializerTrace},
    Block, BlockId, BlockKind, CompileType, EnvId, Environment, FlowGraph,
    Instr, InstrId, InstrKind, ObjectId, Range, SsaIndex, Value, ValueId,
};
use crate::{
    global,
    program::ProgramModel,
    sexp::{SExp, SExpKind, SList},
    sym::{GlobalSymbolResolve, SymbolId},
};
use fixedbitset::FixedBitSet;
use fxhash::{FxHashMap, FxHashSet};
use std::mem::take;

type Result<T> = std::result::Result<T, DeserializeError>;

pub const FLOW_GRAPH_TAG: &str = "FlowGraph";
pub const CONSTANTS_TAG: &str = "Constants";
pub const ENTRIES_TAG: &str = "Entries";
pub const BLOCK_TAG: &str = "Block";
pub const DEF_TAG: &str = "def";
pub const VALUE_TAG: &str = "value";
pub const ENV_TAG: &str = "Env";

const SECTION_TAGS: &[&str] = &[CONSTANTS_TAG, ENTRIES_TAG, BLOCK_TAG];
const ENTRY_TAGS: &[&str] = &["Normal", "Unchecked", "Osr", "Catch", "Indirect"];
const BLOCK_TYPES: &[&str] = &["Join", "Target"];

/// Deserialize the flow graph `root` of a function of `program`.
///
/// This is a shorthand for [`Deserializer::new`] followed by
///   [`Deserializer::deserialize`].
pub fn deserialize<P: ProgramModel>(
    program: &P,
    root: &SExp,
) -> Result<FlowGraph> {
    Deserializer::<P, DefaultTrace>::new(program, root)?.deserialize()
}

/// Flow graph deserializer.
///
/// See the [module-level documentation](self) for more information.
pub struct Deserializer<'s, 'p, P: ProgramModel, T: DeserializerTrace = DefaultTrace>
{
    program: &'p P,
    root: Form<'s>,
    graph: FlowGraph,
    trace: T,

    constants: Option<&'s SExp>,
    entries: Option<&'s SExp>,
    blocks: Vec<&'s SExp>,

    /// Definition of each SSA index bound so far.
    defs: FxHashMap<SsaIndex, InstrId>,

    /// Uses of SSA indexes that have not yet been defined,
    ///   with the node that produced each.
    pending: FxHashMap<SsaIndex, Vec<(ValueId, &'s SExp)>>,

    max_ssa: Option<SsaIndex>,

    /// Objects of constant pool definitions.
    pool_objects: FxHashMap<SsaIndex, ObjectId>,

    /// Reference that caused the most recent object to be unresolvable.
    missing: Option<(SsaIndex, &'s SExp)>,

    /// Unpatched type references of each recursive type under
    ///   construction.
    type_hashes: FxHashMap<i64, Vec<ObjectId>>,

    block_forms: FxHashMap<BlockId, &'s SExp>,
    block_preds: FxHashMap<BlockId, Vec<BlockId>>,
    edges: Vec<Edge<'s>>,
    phis: Vec<(InstrId, &'s SExp)>,

    /// Blocks that have been placed on [`Self::worklist`].
    queued: FixedBitSet,
    worklist: Vec<BlockId>,
}

/// Control-flow edge,
///   retained until all blocks are known so that it can be checked
///   against the kind of its target.
#[derive(Debug, Clone, Copy)]
struct Edge<'s> {
    to: BlockId,
    at: &'s SExp,
    goto: bool,
}

impl<'s, 'p, P: ProgramModel, T: DeserializerTrace> Deserializer<'s, 'p, P, T> {
    /// Validate the root of the flow graph `root` and construct its graph
    ///   entry.
    ///
    /// The root must be a list tagged `FlowGraph` naming the function
    ///   that it implements,
    ///     followed by the sections of the graph.
    pub fn new(program: &'p P, root: &'s SExp) -> Result<Self> {
        let root = Form::tagged(root, &[FLOW_GRAPH_TAG])?;
        let name = root.at(1, "function name")?;
        let function = program
            .resolve_function(name_str(name)?)
            .map_err(|e| DeserializeError::new(e.into(), name))?;

        let mut graph = FlowGraph::new(function);
        graph.deopt_id = root.extra(opt_id, "deopt_id")?.flatten();
        graph.osr_id = root.extra(opt_id, "osr_id")?.flatten();

        let mut constants = None;
        let mut entries = None;
        let mut blocks = Vec::new();

        for section in root.rest(2) {
            let form = Form::tagged(section, SECTION_TAGS)?;

            let slot = match form.tag {
                CONSTANTS_TAG => &mut constants,
                ENTRIES_TAG => &mut entries,
                _ => {
                    blocks.push(section);
                    continue;
                }
            };

            if slot.replace(section).is_some() {
                return Err(DeserializeError::new(
                    DeserializeErrorKind::DuplicateSection(form.tag),
                    section,
                ));
            }
        }

        Ok(Self {
            program,
            root,
            graph,
            trace: T::default(),
            constants,
            entries,
            blocks,
            defs: FxHashMap::default(),
            pending: FxHashMap::default(),
            max_ssa: None,
            pool_objects: FxHashMap::default(),
            missing: None,
            type_hashes: FxHashMap::default(),
            block_forms: FxHashMap::default(),
            block_preds: FxHashMap::default(),
            edges: Vec::new(),
            phis: Vec::new(),
            queued: FixedBitSet::new(),
            worklist: Vec::with_capacity(global::INIT_BLOCK_WORKLIST_CAPACITY),
        })
    }

    /// Reconstruct the flow graph.
    pub fn deserialize(mut self) -> Result<FlowGraph> {
        match self.build() {
            Ok(()) => Ok(self.graph),
            Err(e) => {
                self.trace.trace_error(&e);
                Err(e)
            }
        }
    }

    fn build(&mut self) -> Result<()> {
        self.trace.trace_phase("constants");
        if let Some(constants) = self.constants {
            self.parse_constants(constants)?;
        }

        self.trace.trace_phase("environment");
        if let Some(env) = self.root.list.extra_lookup_value("env") {
            self.graph.env = Some(self.parse_env(env)?);
        }

        self.trace.trace_phase("entries");
        self.index_blocks()?;

        let entries = self.entries.ok_or_else(|| {
            DeserializeError::new(
                DeserializeErrorKind::MissingSection(ENTRIES_TAG),
                self.root.sexp,
            )
        })?;
        self.parse_entries(entries)?;

        self.trace.trace_phase("blocks");
        while let Some(id) = self.worklist.pop() {
            self.parse_block(id)?;
        }

        self.trace.trace_phase("completion");
        self.check_complete()?;
        self.link_predecessors()?;

        self.trace.trace_phase("discovery");
        self.finish()
    }

    fn parse_constants(&mut self, sexp: &'s SExp) -> Result<()> {
        let form = Form::tagged(sexp, &[CONSTANTS_TAG])?;

        let mut seen = FxHashSet::default();
        let mut order = Vec::with_capacity(form.list.len());

        for def_sexp in form.rest(1) {
            let def = DefForm::parse(def_sexp)?;

            if !seen.insert(def.ssa) {
                return Err(DeserializeError::new(
                    DeserializeErrorKind::DuplicateDefinition(def.ssa),
                    def_sexp,
                ));
            }

            let constant = Form::tagged(def.instr, &["Constant"])?;
            constant.max_len(2)?;
            order.push((def, constant.at(1, "constant object")?));
        }

        // Constants may refer to constants that follow them textually,
        //   so parse until a full pass makes no progress.
        let mut work = order.clone();

        while !work.is_empty() {
            let remaining = work.len();
            let mut retry = Vec::with_capacity(work.len());
            let mut first_missing = None;

            for (def, object) in work {
                let mark = self.graph.objects.mark();

                match self.parse_object(object)? {
                    Some(id) => {
                        self.pool_objects.insert(def.ssa, id);
                    }
                    None => {
                        self.graph.objects.rollback(mark);
                        self.type_hashes.clear();

                        if let Some((missing, _)) = self.missing {
                            self.trace.trace_requeue(def.ssa, missing);
                        }

                        first_missing = first_missing.or(self.missing.take());
                        retry.push((def, object));
                    }
                }
            }

            // No progress means that some reference can never be resolved.
            if retry.len() == remaining {
                let (ssa, at) = first_missing.unwrap_or_else(|| {
                    panic!("internal error: unresolved constant without a reference")
                });

                return Err(DeserializeError::new(
                    DeserializeErrorKind::UndefinedUse(ssa),
                    at,
                ));
            }

            work = retry;
        }

        // Canonicalization may coalesce distinct definitions into the same
        //   object,
        //     which then share a single definition.
        let mut by_object = FxHashMap::<ObjectId, InstrId>::default();

        for (def, _) in order {
            let Some(object) = self.pool_objects.get(&def.ssa).copied() else {
                continue;
            };

            let canon = self.graph.objects.canonicalize(object);
            self.pool_objects.insert(def.ssa, canon);

            let (ty, range) = self.def_extras(&def)?;

            let instr = match by_object.get(&canon) {
                Some(&instr) => {
                    self.refine_constant(instr, ty, range, def.sexp)?;
                    instr
                }
                None => {
                    let mut instr = Instr::new(
                        InstrKind::Constant(canon),
                        BlockId::GRAPH_ENTRY,
                    );
                    instr.ty = ty;
                    instr.range = range;

                    let id = self.graph.alloc_instr(instr);
                    self.graph.graph_entry_mut().initial_defs.push(id);
                    by_object.insert(canon, id);
                    id
                }
            };

            self.define(def.ssa, instr, def.sexp)?;
        }

        Ok(())
    }

    fn index_blocks(&mut self) -> Result<()> {
        let mut max = BlockId::GRAPH_ENTRY;
        let limit = (self.blocks.len() + 1)
            .saturating_mul(global::MAX_BLOCK_ID_SPREAD);

        for &sexp in &self.blocks {
            let form = Form::tagged(sexp, &[BLOCK_TAG])?;
            let id = block_id(form.at(1, "block id")?)?;

            if id == BlockId::GRAPH_ENTRY {
                return Err(DeserializeError::new(
                    DeserializeErrorKind::ReservedBlock,
                    sexp,
                ));
            } else if id.as_usize() > limit {
                return Err(DeserializeError::new(
                    DeserializeErrorKind::BlockIdTooLarge { id, limit },
                    sexp,
                ));
            }

            if self.block_forms.insert(id, sexp).is_some() {
                return Err(DeserializeError::new(
                    DeserializeErrorKind::DuplicateBlock(id),
                    sexp,
                ));
            }

            max = max.max(id);
        }

        self.graph.max_block_id = max;
        self.queued = FixedBitSet::with_capacity(max.as_usize() + 1);
        self.queued.insert(BlockId::GRAPH_ENTRY.as_usize());

        Ok(())
    }

    fn parse_entries(&mut self, sexp: &'s SExp) -> Result<()> {
        let form = Form::tagged(sexp, &[ENTRIES_TAG])?;

        for entry in form.rest(1) {
            let entry = Form::tagged(entry, ENTRY_TAGS)?;
            let id = block_id(entry.at(1, "block id")?)?;

            if id == BlockId::GRAPH_ENTRY {
                return Err(entry.error(DeserializeErrorKind::ReservedBlock));
            } else if self.graph.block(id).is_some() {
                return Err(entry.error(DeserializeErrorKind::DuplicateEntry(id)));
            } else if !self.block_forms.contains_key(&id) {
                return Err(entry.error(DeserializeErrorKind::UndefinedBlock(id)));
            }

            let kind = match entry.tag {
                "Normal" => BlockKind::FunctionEntry { unchecked: false },
                "Unchecked" => BlockKind::FunctionEntry { unchecked: true },
                "Osr" => BlockKind::OsrEntry,
                "Catch" => BlockKind::CatchEntry {
                    catch_try_index: entry.required(u32_value, "catch_try_index")?,
                    needs_stacktrace: entry
                        .extra(bool_value, "needs_stacktrace")?
                        .unwrap_or(false),
                },
                _ => {
                    entry.max_len(2)?;

                    BlockKind::IndirectEntry {
                        indirect_id: entry.required(u32_value, "indirect_id")?,
                    }
                }
            };

            let mut block = Block::new(id, kind);
            block.try_index = entry.extra(opt_id, "try_index")?.flatten();
            block.deopt_id = entry.extra(opt_id, "deopt_id")?.flatten();

            for def_sexp in entry.rest(2) {
                let instr = self.parse_def(def_sexp, id)?;

                match self.graph.instr(instr).kind {
                    InstrKind::Parameter { .. }
                    | InstrKind::SpecialParameter(_) => {
                        block.initial_defs.push(instr)
                    }
                    _ => {
                        return Err(DeserializeError::new(
                            DeserializeErrorKind::ExpectedTag(&[
                                "Parameter",
                                "SpecialParameter",
                            ]),
                            DefForm::parse(def_sexp)?.instr,
                        ))
                    }
                }
            }

            // Indirect entries are reached only by jumps within the graph.
            if !matches!(kind, BlockKind::IndirectEntry { .. }) {
                self.block_preds.entry(id).or_default().push(BlockId::GRAPH_ENTRY);
            }

            self.graph.insert_block(block);
            self.graph.entries.push(id);
        }

        // Reverse order so that entries are popped in declaration order.
        for id in self.graph.entries.clone().into_iter().rev() {
            self.enqueue(id);
        }

        Ok(())
    }

    fn parse_block(&mut self, id: BlockId) -> Result<()> {
        let sexp = self.block_forms.get(&id).copied().ok_or_else(|| {
            DeserializeError::new(
                DeserializeErrorKind::UndefinedBlock(id),
                self.root.sexp,
            )
        })?;

        self.trace.trace_block(id, sexp);

        let form = Form::tagged(sexp, &[BLOCK_TAG])?;
        let block_type =
            form.extra(|s| symbolic(s, "block type", BLOCK_TYPES), "block_type")?;

        let mut block = match self.graph.take_block(id) {
            Some(entry) => {
                let compatible = match block_type {
                    None => true,
                    Some(ty) => {
                        ty == "Join"
                            && matches!(entry.kind, BlockKind::IndirectEntry { .. })
                    }
                };

                if !compatible {
                    return Err(form.error(
                        DeserializeErrorKind::BlockTypeMismatch(id, entry.kind),
                    ));
                }

                entry
            }

            None => {
                let kind = match block_type {
                    Some("Join") => BlockKind::Join,
                    Some(_) => BlockKind::Target,
                    None => {
                        return Err(form.error(
                            DeserializeErrorKind::MissingField("block_type"),
                        ))
                    }
                };

                Block::new(id, kind)
            }
        };

        if let Some(try_index) = form.extra(opt_id, "try_index")? {
            block.try_index = try_index;
        }
        if let Some(deopt_id) = form.extra(opt_id, "deopt_id")? {
            block.deopt_id = deopt_id;
        }

        let body = form.rest(2);
        let nphis = body.iter().take_while(|elem| is_phi_def(elem)).count();

        for elem in &body[..nphis] {
            if !block.kind.is_join_like() {
                return Err(DeserializeError::new(
                    DeserializeErrorKind::PhiOutsideJoin,
                    elem,
                ));
            }

            block.phis.push(self.parse_phi(elem, id)?);
        }

        if nphis > 0 && nphis == body.len() {
            return Err(form.error(DeserializeErrorKind::OnlyPhis));
        }

        // The environment textually precedes the body,
        //   so it may refer only to phis and dominating definitions.
        if let Some(env) = form.list.extra_lookup_value("env") {
            block.env = Some(self.parse_env(env)?);
        }

        for elem in &body[nphis..] {
            if is_phi_def(elem) {
                return Err(DeserializeError::new(
                    DeserializeErrorKind::PhiAfterInstruction,
                    elem,
                ));
            }

            if let Some(&last) = block.instrs.last() {
                if self.graph.instr(last).kind.is_control() {
                    return Err(DeserializeError::new(
                        DeserializeErrorKind::InstructionAfterControl,
                        elem,
                    ));
                }
            }

            let instr = if is_tagged(elem, DEF_TAG) {
                self.parse_def(elem, id)?
            } else {
                self.parse_instr(elem, id)?
            };

            block.instrs.push(instr);
        }

        let control = block
            .instrs
            .last()
            .map(|&last| &self.graph.instr(last).kind)
            .filter(|kind| kind.is_control())
            .ok_or_else(|| form.error(DeserializeErrorKind::MissingControl))?;

        let goto = matches!(control, InstrKind::Goto(_));
        let succs = control.successors();

        self.graph.insert_block(block);

        // Reverse order so that we pop successors in order.
        let at = body.last().unwrap_or(sexp);
        for &succ in succs.iter().rev() {
            self.add_edge(id, succ, at, goto)?;
        }

        Ok(())
    }

    fn add_edge(
        &mut self,
        from: BlockId,
        to: BlockId,
        at: &'s SExp,
        goto: bool,
    ) -> Result<()> {
        if to == BlockId::GRAPH_ENTRY {
            return Err(DeserializeError::new(
                DeserializeErrorKind::ReservedBlock,
                at,
            ));
        } else if !self.block_forms.contains_key(&to) {
            return Err(DeserializeError::new(
                DeserializeErrorKind::UndefinedBlock(to),
                at,
            ));
        }

        self.block_preds.entry(to).or_default().push(from);
        self.edges.push(Edge { to, at, goto });
        self.enqueue(to);

        Ok(())
    }

    fn enqueue(&mut self, id: BlockId) {
        if id.as_usize() >= self.queued.len() {
            self.queued.grow(id.as_usize() + 1);
        }

        if !self.queued.put(id.as_usize()) {
            self.worklist.push(id);
        }
    }

    fn check_complete(&self) -> Result<()> {
        let unreached = self
            .block_forms
            .iter()
            .filter(|(id, _)| !self.queued.contains(id.as_usize()))
            .min_by_key(|(id, _)| **id);

        if let Some((&id, &at)) = unreached {
            return Err(DeserializeError::new(
                DeserializeErrorKind::UnreachableBlock(id),
                at,
            ));
        }

        let earliest = self
            .pending
            .iter()
            .flat_map(|(&ssa, uses)| uses.iter().map(move |&(_, at)| (ssa, at)))
            .min_by_key(|(ssa, at)| (at.start().unwrap_or(usize::MAX), *ssa));

        if let Some((ssa, at)) = earliest {
            return Err(DeserializeError::new(
                DeserializeErrorKind::UndefinedUse(ssa),
                at,
            ));
        }

        Ok(())
    }

    fn link_predecessors(&mut self) -> Result<()> {
        for (id, mut preds) in take(&mut self.block_preds) {
            preds.sort();

            if let Some(block) = self.graph.block_mut(id) {
                block.predecessors = preds;
            }
        }

        for edge in &self.edges {
            let Some(target) = self.graph.block(edge.to) else {
                continue;
            };

            if edge.goto && !target.kind.is_join_like() {
                return Err(DeserializeError::new(
                    DeserializeErrorKind::InvalidGotoTarget(edge.to, target.kind),
                    edge.at,
                ));
            } else if !edge.goto && target.kind != BlockKind::Target {
                return Err(DeserializeError::new(
                    DeserializeErrorKind::InvalidBranchTarget(edge.to, target.kind),
                    edge.at,
                ));
            } else if !edge.goto && target.predecessors.len() != 1 {
                return Err(DeserializeError::new(
                    DeserializeErrorKind::TargetPredecessors(
                        edge.to,
                        target.predecessors.len(),
                    ),
                    edge.at,
                ));
            }
        }

        for &(phi, at) in &self.phis {
            let instr = self.graph.instr(phi);
            let expected = self
                .graph
                .block(instr.block)
                .map_or(0, |block| block.predecessors.len());

            if let InstrKind::Phi { inputs } = &instr.kind {
                if inputs.len() != expected {
                    return Err(DeserializeError::new(
                        DeserializeErrorKind::PhiArity {
                            expected,
                            found: inputs.len(),
                        },
                        at,
                    ));
                }
            }
        }

        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.graph.current_ssa_temp_index = self
            .max_ssa
            .map_or(0, |ssa| ssa.as_u32().saturating_add(2));
        self.graph.ssa_defs = take(&mut self.defs);

        self.graph.discover_blocks();

        // Indirect entries are not successors of the graph entry,
        //   and so must be reached by a jump from some discovered block.
        let mut discovered =
            FixedBitSet::with_capacity(self.graph.max_block_id.as_usize() + 1);
        discovered.extend(self.graph.preorder().iter().map(|id| id.as_usize()));

        let undiscovered = self
            .block_forms
            .iter()
            .filter(|(id, _)| !discovered.contains(id.as_usize()))
            .min_by_key(|(id, _)| **id);

        if let Some((&id, &at)) = undiscovered {
            return Err(DeserializeError::new(
                DeserializeErrorKind::UnreachableBlock(id),
                at,
            ));
        }

        self.graph.compute_dominators();

        Ok(())
    }

    /// Parse `(def v<N> <instr> { type …, range … })` and bind `v<N>` to
    ///   the resulting instruction.
    fn parse_def(&mut self, sexp: &'s SExp, block: BlockId) -> Result<InstrId> {
        let def = DefForm::parse(sexp)?;
        let id = self.parse_instr(def.instr, block)?;

        let kind = &self.graph.instr(id).kind;
        if !kind.is_definition() {
            return Err(DeserializeError::new(
                DeserializeErrorKind::NotADefinition(kind.tag()),
                def.instr,
            ));
        }

        let (ty, range) = self.def_extras(&def)?;
        let instr = self.graph.instr_mut(id);
        instr.ty = ty;
        instr.range = range;

        self.define(def.ssa, id, sexp)?;
        Ok(id)
    }

    fn parse_phi(&mut self, sexp: &'s SExp, block: BlockId) -> Result<InstrId> {
        let def = DefForm::parse(sexp)?;
        let phi = Form::tagged(def.instr, &["Phi"])?;

        let inputs = phi
            .rest(1)
            .iter()
            .map(|input| self.parse_use(input, true))
            .collect::<Result<Vec<_>>>()?;

        let (ty, range) = self.def_extras(&def)?;
        let mut instr = Instr::new(InstrKind::Phi { inputs }, block);
        instr.ty = ty;
        instr.range = range;

        let id = self.graph.alloc_instr(instr);
        self.phis.push((id, sexp));
        self.define(def.ssa, id, sexp)?;

        Ok(id)
    }

    fn def_extras(
        &mut self,
        def: &DefForm<'s>,
    ) -> Result<(Option<CompileType>, Option<Range>)> {
        let ty = match def.form.list.extra_lookup_value("type") {
            Some(ty) => Some(self.parse_compile_type(ty)?),
            None => None,
        };

        let range = def.form.extra(parse_range, "range")?;

        Ok((ty, range))
    }

    /// Merge the refinements of a definition that canonicalized to an
    ///   existing constant into that constant's definition.
    fn refine_constant(
        &mut self,
        instr: InstrId,
        ty: Option<CompileType>,
        range: Option<Range>,
        at: &'s SExp,
    ) -> Result<()> {
        let def = self.graph.instr_mut(instr);

        let conflict = matches!((&def.ty, &ty), (Some(a), Some(b)) if a != b)
            || matches!((&def.range, &range), (Some(a), Some(b)) if a != b);

        if conflict {
            let ssa = def.ssa.unwrap_or_else(|| {
                panic!("internal error: pool constant without an SSA index")
            });

            return Err(DeserializeError::new(
                DeserializeErrorKind::ConflictingConstantRefinement(ssa),
                at,
            ));
        }

        if def.ty.is_none() {
            def.ty = ty;
        }
        if def.range.is_none() {
            def.range = range;
        }

        Ok(())
    }

    /// Bind `ssa` to the instruction `instr`,
    ///   resolving any pending uses.
    fn define(&mut self, ssa: SsaIndex, instr: InstrId, at: &'s SExp) -> Result<()> {
        if self.defs.insert(ssa, instr).is_some() {
            return Err(DeserializeError::new(
                DeserializeErrorKind::DuplicateDefinition(ssa),
                at,
            ));
        }

        self.max_ssa = self.max_ssa.max(Some(ssa));

        let def = self.graph.instr_mut(instr);
        def.ssa.get_or_insert(ssa);
        let ty = def.ty.clone();

        let pending = self.pending.remove(&ssa).unwrap_or_default();
        self.trace.trace_define(ssa, instr, pending.len());

        for (value, use_at) in pending {
            let value = self.graph.value_mut(value);
            value.def = Some(instr);

            if value.inherit_type {
                value.reaching_type = Some(ty.clone().ok_or_else(|| {
                    DeserializeError::new(
                        DeserializeErrorKind::NoInheritedType(ssa),
                        use_at,
                    )
                })?);
            }
        }

        Ok(())
    }

    /// Resolve a use of an SSA value.
    ///
    /// A use is either `v<N>` or
    ///   `(value v<N> { type <CompileType>, inherit_type <bool> })`.
    /// If `v<N>` has not yet been defined and `forward` is set,
    ///   the use is recorded as pending until its definition is parsed;
    ///     otherwise it is an error.
    fn parse_use(&mut self, sexp: &'s SExp, forward: bool) -> Result<ValueId> {
        let (ssa, reaching_type, inherit_type) = match sexp.kind() {
            SExpKind::List(_) => {
                let form = Form::tagged(sexp, &[VALUE_TAG])?;
                form.max_len(2)?;

                let ssa = ssa_index(form.at(1, "SSA name")?)?;
                let inherit = form.extra(bool_value, "inherit_type")?.unwrap_or(false);

                let ty = match form.list.extra_lookup_value("type") {
                    Some(_) if inherit => {
                        return Err(form.error(
                            DeserializeErrorKind::ConflictingValueType,
                        ))
                    }
                    Some(ty) => Some(self.parse_compile_type(ty)?),
                    None => None,
                };

                (ssa, ty, inherit)
            }
            _ => (ssa_index(sexp)?, None, false),
        };

        let mut value = Value {
            def: None,
            reaching_type,
            inherit_type,
        };

        match self.defs.get(&ssa) {
            Some(&def) => {
                value.def = Some(def);

                if inherit_type {
                    value.reaching_type =
                        Some(self.graph.instr(def).ty.clone().ok_or_else(|| {
                            DeserializeError::new(
                                DeserializeErrorKind::NoInheritedType(ssa),
                                sexp,
                            )
                        })?);
                }

                Ok(self.graph.alloc_value(value))
            }

            None if forward => {
                let id = self.graph.alloc_value(value);
                self.pending.entry(ssa).or_default().push((id, sexp));
                Ok(id)
            }

            None => Err(DeserializeError::new(
                DeserializeErrorKind::UseBeforeDefinition(ssa),
                sexp,
            )),
        }
    }

    /// Parse `(Env <value>… { fixed_param_count N, outer <Env> })`.
    fn parse_env(&mut self, sexp: &'s SExp) -> Result<EnvId> {
        let form = Form::tagged(sexp, &[ENV_TAG])?;

        let values = form
            .rest(1)
            .iter()
            .map(|value| self.parse_use(value, false))
            .collect::<Result<Vec<_>>>()?;

        let fixed_param_count =
            form.extra(u32_value, "fixed_param_count")?.unwrap_or(0);

        let outer = match form.list.extra_lookup_value("outer") {
            Some(outer) => Some(self.parse_env(outer)?),
            None => None,
        };

        Ok(self.graph.alloc_env(Environment {
            values,
            fixed_param_count,
            outer,
        }))
    }
}

/// A list with a recognized tag.
#[derive(Debug, Clone, Copy)]
struct Form<'s> {
    sexp: &'s SExp,
    list: &'s SList,
    tag: &'static str,
}

impl<'s> Form<'s> {
    /// Interpret `sexp` as a list tagged with one of `tags`.
    fn tagged(sexp: &'s SExp, tags: &'static [&'static str]) -> Result<Self> {
        let err = || {
            DeserializeError::new(DeserializeErrorKind::ExpectedTag(tags), sexp)
        };

        let list = sexp.as_list().ok_or_else(err)?;
        let tag = list
            .tag()
            .and_then(|sym| tags.iter().find(|t| **t == sym.lookup_str()))
            .copied()
            .ok_or_else(err)?;

        Ok(Self { sexp, list, tag })
    }

    fn error(&self, kind: DeserializeErrorKind) -> DeserializeError {
        DeserializeError::new(kind, self.sexp)
    }

    /// Positional element `index`,
    ///   which must be present.
    fn at(&self, index: usize, what: &'static str) -> Result<&'s SExp> {
        self.list
            .get(index)
            .ok_or_else(|| self.error(DeserializeErrorKind::MissingElement { index, what }))
    }

    /// Positional elements starting at `index`.
    fn rest(&self, index: usize) -> &'s [SExp] {
        self.list.elems().get(index..).unwrap_or(&[])
    }

    /// Fail if there are more than `len` positional elements.
    fn max_len(&self, len: usize) -> Result<()> {
        match self.list.get(len) {
            Some(extra) => Err(DeserializeError::new(
                DeserializeErrorKind::UnexpectedElement,
                extra,
            )),
            None => Ok(()),
        }
    }

    /// Extra-info value `label` interpreted by `f`,
    ///   if present.
    fn extra<V>(
        &self,
        f: impl FnOnce(&'s SExp) -> Result<V>,
        label: &str,
    ) -> Result<Option<V>> {
        self.list.extra_lookup_value(label).map(f).transpose()
    }

    fn required<V>(
        &self,
        f: impl FnOnce(&'s SExp) -> Result<V>,
        label: &'static str,
    ) -> Result<V> {
        self.extra(f, label)?
            .ok_or_else(|| self.error(DeserializeErrorKind::MissingField(label)))
    }
}

/// `(def v<N> <instr> …)`.
#[derive(Debug, Clone, Copy)]
struct DefForm<'s> {
    sexp: &'s SExp,
    form: Form<'s>,
    ssa: SsaIndex,
    instr: &'s SExp,
}

impl<'s> DefForm<'s> {
    fn parse(sexp: &'s SExp) -> Result<Self> {
        let form = Form::tagged(sexp, &[DEF_TAG])?;
        form.max_len(3)?;

        Ok(Self {
            sexp,
            form,
            ssa: ssa_index(form.at(1, "SSA name")?)?,
            instr: form.at(2, "instruction")?,
        })
    }
}

fn is_tagged(sexp: &SExp, tag: &str) -> bool {
    sexp.tag().map_or(false, |sym| sym.lookup_str() == tag)
}

fn is_phi_def(sexp: &SExp) -> bool {
    is_tagged(sexp, DEF_TAG)
        && sexp
            .as_list()
            .and_then(|list| list.get(2))
            .map_or(false, |instr| is_tagged(instr, "Phi"))
}

fn expected(what: &'static str, sexp: &SExp) -> DeserializeError {
    DeserializeError::new(DeserializeErrorKind::Expected(what), sexp)
}

fn integer(sexp: &SExp) -> Result<i64> {
    sexp.as_integer().ok_or_else(|| expected("integer", sexp))
}

fn u32_value(sexp: &SExp) -> Result<u32> {
    u32::try_from(integer(sexp)?).map_err(|_| {
        DeserializeError::new(DeserializeErrorKind::OutOfRange("integer"), sexp)
    })
}

/// An optional id,
///   where any negative value denotes its absence.
fn opt_id(sexp: &SExp) -> Result<Option<u32>> {
    match integer(sexp)? {
        n if n < 0 => Ok(None),
        _ => u32_value(sexp).map(Some),
    }
}

fn bool_value(sexp: &SExp) -> Result<bool> {
    sexp.as_bool().ok_or_else(|| expected("boolean", sexp))
}

/// A name given either as a string or as a symbol.
fn name(sexp: &SExp) -> Result<SymbolId> {
    sexp.as_string()
        .or_else(|| sexp.as_symbol())
        .ok_or_else(|| expected("name", sexp))
}

fn name_str(sexp: &SExp) -> Result<&'static str> {
    name(sexp).map(|sym| sym.lookup_str())
}

/// A symbol that must be one of `allowed`.
fn symbolic(
    sexp: &SExp,
    what: &'static str,
    allowed: &'static [&'static str],
) -> Result<&'static str> {
    let sym = sexp.as_symbol().ok_or_else(|| expected(what, sexp))?;

    allowed
        .iter()
        .find(|name| **name == sym.lookup_str())
        .copied()
        .ok_or_else(|| {
            DeserializeError::new(
                DeserializeErrorKind::UnknownSymbol { what, allowed },
                sexp,
            )
        })
}

/// A symbol naming a variant of an enumeration with textual `names`.
fn symbolic_enum<E>(
    sexp: &SExp,
    what: &'static str,
    names: &'static [&'static str],
    parse: fn(&str) -> Option<E>,
) -> Result<E> {
    symbolic(sexp, what, names)
        .and_then(|name| parse(name).ok_or_else(|| expected(what, sexp)))
}

fn block_id(sexp: &SExp) -> Result<BlockId> {
    sexp.as_symbol()
        .and_then(|sym| BlockId::parse(sym.lookup_str()))
        .ok_or_else(|| expected("block id", sexp))
}

fn ssa_index(sexp: &SExp) -> Result<SsaIndex> {
    sexp.as_symbol()
        .and_then(|sym| SsaIndex::parse(sym.lookup_str()))
        .ok_or_else(|| expected("SSA name", sexp))
}

/// Parse `(Range <bound> <bound>)`,
///   where each bound is an integer,
///   `-inf`,
///   or `+inf`.
fn parse_range(sexp: &SExp) -> Result<Range> {
    use super::RangeBoundary;

    let form = Form::tagged(sexp, &["Range"])?;
    form.max_len(3)?;

    let bound = |sexp: &SExp| match sexp.kind() {
        SExpKind::Integer(n) => Ok(RangeBoundary::Const(*n)),
        SExpKind::Symbol(sym) => RangeBoundary::parse(sym.lookup_str())
            .ok_or_else(|| expected("range bound", sexp)),
        _ => Err(expected("range bound", sexp)),
    };

    let min = bound(form.at(1, "lower bound")?)?;
    let max = bound(form.at(2, "upper bound")?)?;

    Range::new(min, max).ok_or_else(|| form.error(DeserializeErrorKind::InvalidRange))
}

#[cfg(test)]
mod test;
