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

//! Block discovery and dominators.
//!
//! Both are derived from the control-flow edges of a [`FlowGraph`]
//!   and are recomputed after the graph is constructed;
//!     any ordering present in the text form is ignored.
//!
//! Discovery is a depth-first search (DFS) from the graph entry that
//!   records blocks in preorder and postorder.
//! Successors are visited in the order of the final instruction's targets
//!   (the graph entry visits entries in declaration order),
//!   so the ordering is deterministic for a given graph.
//! Only blocks reachable from the graph entry are discovered.
//!
//! Dominators are computed over the discovered blocks by
//!   [`petgraph`]'s implementation of the Cooper--Harvey--Kennedy
//!   algorithm.

use super::{BlockId, FlowGraph};
use fixedbitset::FixedBitSet;
use fxhash::FxHashMap;
use petgraph::{algo::dominators::simple_fast, graphmap::DiGraphMap};

/// Initial capacity of the discovery stack.
///
/// This is the expected depth of the DFS,
///   not the number of blocks.
const INIT_STACK_CAP: usize = 32;

/// Derived block orderings and dominator tree.
#[derive(Debug, Default)]
pub(super) struct BlockOrder {
    preorder: Vec<BlockId>,
    postorder: Vec<BlockId>,
    reverse_postorder: Vec<BlockId>,
    idom: FxHashMap<BlockId, BlockId>,
    dominated: FxHashMap<BlockId, Vec<BlockId>>,
}

impl FlowGraph {
    /// Recompute [`FlowGraph::preorder`], [`FlowGraph::postorder`], and
    ///   [`FlowGraph::reverse_postorder`].
    pub fn discover_blocks(&mut self) {
        let root = BlockId::GRAPH_ENTRY;
        let mut visited =
            FixedBitSet::with_capacity(self.max_block_id.as_usize() + 1);

        let mut preorder = vec![root];
        let mut postorder = Vec::new();

        let mut stack = Vec::with_capacity(INIT_STACK_CAP);
        stack.push((root, self.successors(root), 0));
        visited.insert(root.as_usize());

        while let Some(top) = stack.last_mut() {
            match top.1.get(top.2).copied() {
                Some(succ) => {
                    top.2 += 1;

                    if succ.as_usize() >= visited.len() {
                        visited.grow(succ.as_usize() + 1);
                    }

                    if !visited.put(succ.as_usize()) {
                        preorder.push(succ);
                        stack.push((succ, self.successors(succ), 0));
                    }
                }

                None => {
                    postorder.push(top.0);
                    stack.pop();
                }
            }
        }

        self.order.reverse_postorder = postorder.iter().rev().copied().collect();
        self.order.preorder = preorder;
        self.order.postorder = postorder;
    }

    /// Recompute the dominator tree over discovered blocks.
    ///
    /// This must be preceded by [`FlowGraph::discover_blocks`].
    pub fn compute_dominators(&mut self) {
        let mut cfg = DiGraphMap::<BlockId, ()>::new();

        for &block in &self.order.preorder {
            cfg.add_node(block);

            for succ in self.successors(block) {
                cfg.add_edge(block, succ, ());
            }
        }

        let doms = simple_fast(&cfg, BlockId::GRAPH_ENTRY);

        self.order.idom.clear();
        self.order.dominated.clear();

        for &block in &self.order.preorder {
            if let Some(idom) = doms.immediate_dominator(block) {
                self.order.idom.insert(block, idom);
                self.order.dominated.entry(idom).or_default().push(block);
            }
        }
    }

    /// Blocks reachable from the graph entry in DFS preorder.
    pub fn preorder(&self) -> &[BlockId] {
        &self.order.preorder
    }

    pub fn postorder(&self) -> &[BlockId] {
        &self.order.postorder
    }

    pub fn reverse_postorder(&self) -> &[BlockId] {
        &self.order.reverse_postorder
    }

    /// Immediate dominator of `block`.
    ///
    /// The graph entry has no dominator,
    ///   nor do blocks that were not discovered.
    pub fn immediate_dominator(&self, block: BlockId) -> Option<BlockId> {
        self.order.idom.get(&block).copied()
    }

    /// Blocks immediately dominated by `block`,
    ///   in preorder.
    pub fn dominated(&self, block: BlockId) -> &[BlockId] {
        self.order
            .dominated
            .get(&block)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether `a` dominates `b`.
    ///
    /// Every block dominates itself.
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        let mut cur = Some(b);

        while let Some(block) = cur {
            if block == a {
                return true;
            }

            cur = self.immediate_dominator(block);
        }

        false
    }
}
