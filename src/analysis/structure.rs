//! `CodeStructure` — predecessor/successor sets, reachability, and the
//! dominator tree (spec.md §4.2, C4). Grounded in
//! `cranelift-codegen/src/flowgraph.rs` (CFG edge sets stored as
//! `bforest::Set`) and `cranelift-codegen/src/dominator_tree/simple.rs`
//! (Keith Cooper's "simple, fast" iterative-intersect algorithm over a
//! reverse-postorder numbering).

use std::collections::{HashMap, HashSet};

use cranelift_bforest::{Set, SetForest};

use crate::error::{Error, Result};
use crate::ir::code::CodeContainer;
use crate::ir::entities::BlockId;

#[derive(Default)]
struct BlockNode {
    successors: Set<BlockId>,
    predecessors: Set<BlockId>,
    rpo_number: u32,
    immediate_dominator: BlockId,
}

/// Per-function CFG edges, reachability and dominance (spec.md §4.2).
pub struct CodeStructure {
    nodes: HashMap<BlockId, BlockNode>,
    succ_forest: SetForest<BlockId>,
    pred_forest: SetForest<BlockId>,
    reachable: HashSet<BlockId>,
    indirect_jump_target_blocks: HashSet<BlockId>,
    postorder: Vec<BlockId>,
    entry_point: BlockId,
}

impl CodeStructure {
    /// Build order (spec.md §4.2): reachability BFS from `entry_point`, then
    /// successor/predecessor lists, then dominators by the classical
    /// iterative "intersect" algorithm over a reverse-postorder traversal.
    pub fn build(code: &CodeContainer, entry_point: BlockId) -> Result<Self> {
        let mut structure = CodeStructure {
            nodes: HashMap::new(),
            succ_forest: SetForest::new(),
            pred_forest: SetForest::new(),
            reachable: HashSet::new(),
            indirect_jump_target_blocks: HashSet::new(),
            postorder: Vec::new(),
            entry_point,
        };
        structure.collect_indirect_targets(code)?;
        structure.compute_edges(code)?;
        structure.compute_reachability(code, entry_point)?;
        structure.compute_postorder(entry_point);
        structure.compute_dominators()?;
        Ok(structure)
    }

    fn node_mut(&mut self, block: BlockId) -> &mut BlockNode {
        self.nodes.entry(block).or_default()
    }

    fn collect_indirect_targets(&mut self, code: &CodeContainer) -> Result<()> {
        for (_, instr) in code.instructions() {
            if let crate::ir::Operand::Immediate(crate::ir::Immediate::BlockRef(b)) = &instr.operands {
                self.indirect_jump_target_blocks.insert(*b);
            }
        }
        for (_, asm) in code_inline_asm_iter(code) {
            if let Some(default) = asm.default_jump_target {
                self.indirect_jump_target_blocks.insert(default);
            }
            for &target in asm.jump_targets.values() {
                self.indirect_jump_target_blocks.insert(target);
            }
        }
        Ok(())
    }

    fn compute_edges(&mut self, code: &CodeContainer) -> Result<()> {
        for (block_id, _) in code.blocks() {
            self.nodes.entry(block_id).or_default();
            for target in self.branch_targets_of(code, block_id)? {
                self.add_edge(block_id, target);
            }
        }
        Ok(())
    }

    fn branch_targets_of(&self, code: &CodeContainer, block_id: BlockId) -> Result<Vec<BlockId>> {
        let mut targets = Vec::new();
        if let Some(term) = code.block_terminator(block_id)? {
            let instr = code.instr(term)?;
            targets.extend(instr.operands.branch_targets());
            if let crate::ir::Operand::InlineAsm(asm_id) = &instr.operands {
                let asm = code.inline_asm(*asm_id)?;
                targets.extend(asm.default_jump_target);
                targets.extend(asm.jump_targets.values().copied());
            }
        }
        Ok(targets)
    }

    fn add_edge(&mut self, from: BlockId, to: BlockId) {
        self.nodes.entry(from).or_default();
        self.nodes.entry(to).or_default();
        let succ_forest = &mut self.succ_forest;
        self.nodes.get_mut(&from).unwrap().successors.insert(to, succ_forest, &());
        let pred_forest = &mut self.pred_forest;
        self.nodes.get_mut(&to).unwrap().predecessors.insert(from, pred_forest, &());
    }

    fn compute_reachability(&mut self, code: &CodeContainer, entry_point: BlockId) -> Result<()> {
        code.block(entry_point)?;
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(entry_point);
        self.reachable.insert(entry_point);
        while let Some(block) = queue.pop_front() {
            let succs: Vec<BlockId> = self
                .nodes
                .get(&block)
                .map(|n| n.successors.iter(&self.succ_forest).collect())
                .unwrap_or_default();
            for succ in succs {
                if self.reachable.insert(succ) {
                    queue.push_back(succ);
                }
            }
        }
        Ok(())
    }

    fn compute_postorder(&mut self, entry_point: BlockId) {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let mut stack: Vec<(BlockId, usize)> = vec![(entry_point, 0)];
        visited.insert(entry_point);
        while let Some((block, child_idx)) = stack.pop() {
            let succs: Vec<BlockId> = self
                .nodes
                .get(&block)
                .map(|n| n.successors.iter(&self.succ_forest).collect())
                .unwrap_or_default();
            if child_idx < succs.len() {
                stack.push((block, child_idx + 1));
                let next = succs[child_idx];
                if visited.insert(next) {
                    stack.push((next, 0));
                }
            } else {
                order.push(block);
            }
        }
        self.postorder = order;
    }

    fn compute_dominators(&mut self) -> Result<()> {
        if self.postorder.is_empty() {
            return Ok(());
        }
        // RPO numbers, highest for the entry block (postorder.last()).
        for (i, &block) in self.postorder.iter().enumerate() {
            self.node_mut(block).rpo_number = (i as u32) + 1;
        }
        let entry = *self.postorder.last().unwrap();
        self.node_mut(entry).immediate_dominator = BlockId::NONE;

        let rpo: Vec<BlockId> = self.postorder.iter().rev().copied().collect();
        let mut changed = true;
        while changed {
            changed = false;
            for &block in rpo.iter().skip(1) {
                let preds: Vec<BlockId> = self.predecessors(block);
                let mut new_idom = BlockId::NONE;
                for pred in preds {
                    if !self.reachable.contains(&pred) {
                        continue;
                    }
                    if self.nodes.get(&pred).map(|n| n.rpo_number).unwrap_or(0) == 0 {
                        continue;
                    }
                    new_idom = if new_idom.is_none() {
                        pred
                    } else {
                        self.intersect(new_idom, pred)
                    };
                }
                let current = self.nodes.get(&block).map(|n| n.immediate_dominator).unwrap_or(BlockId::NONE);
                if current != new_idom {
                    self.node_mut(block).immediate_dominator = new_idom;
                    changed = true;
                }
            }
        }
        Ok(())
    }

    fn rpo_number(&self, block: BlockId) -> u32 {
        self.nodes.get(&block).map(|n| n.rpo_number).unwrap_or(0)
    }

    fn intersect(&self, mut a: BlockId, mut b: BlockId) -> BlockId {
        loop {
            if a == b {
                return a;
            }
            // Lower RPO number = later in the traversal = closer to the root
            // here since we numbered by postorder position ascending toward
            // the entry; walk the finger with the *higher* number up first.
            while self.rpo_number(a) < self.rpo_number(b) {
                a = self.nodes.get(&a).map(|n| n.immediate_dominator).unwrap_or(BlockId::NONE);
                if a.is_none() {
                    return b;
                }
            }
            while self.rpo_number(b) < self.rpo_number(a) {
                b = self.nodes.get(&b).map(|n| n.immediate_dominator).unwrap_or(BlockId::NONE);
                if b.is_none() {
                    return a;
                }
            }
        }
    }

    pub fn is_reachable_from_entry(&self, block: BlockId) -> bool {
        self.reachable.contains(&block)
    }

    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        self.nodes.get(&block).map(|n| n.successors.iter(&self.succ_forest).collect()).unwrap_or_default()
    }

    pub fn predecessors(&self, block: BlockId) -> Vec<BlockId> {
        self.nodes.get(&block).map(|n| n.predecessors.iter(&self.pred_forest).collect()).unwrap_or_default()
    }

    pub fn block_direct_predecessor(&self, a: BlockId, b: BlockId) -> bool {
        self.nodes
            .get(&b)
            .map(|n| n.predecessors.contains(a, &self.pred_forest, &()))
            .unwrap_or(false)
    }

    pub fn immediate_dominator(&self, block: BlockId) -> Option<BlockId> {
        let idom = self.nodes.get(&block)?.immediate_dominator;
        if idom.is_none() {
            None
        } else {
            Some(idom)
        }
    }

    /// Walks the immediate-dominator chain from `dominated` looking for
    /// `dominator` (spec.md §4.2). A block dominates itself.
    pub fn is_dominator(&self, dominated: BlockId, dominator: BlockId) -> bool {
        if !self.reachable.contains(&dominated) || !self.reachable.contains(&dominator) {
            return false;
        }
        let mut cur = dominated;
        loop {
            if cur == dominator {
                return true;
            }
            match self.immediate_dominator(cur) {
                Some(next) => cur = next,
                None => return false,
            }
        }
    }

    pub fn indirect_jump_target_blocks(&self) -> &HashSet<BlockId> {
        &self.indirect_jump_target_blocks
    }

    pub fn cfg_postorder(&self) -> &[BlockId] {
        &self.postorder
    }

    pub fn entry_point(&self) -> BlockId {
        self.entry_point
    }
}

fn code_inline_asm_iter(code: &CodeContainer) -> Vec<(crate::ir::InlineAsmId, crate::ir::InlineAsm)> {
    // `CodeContainer` doesn't expose a direct inline-asm iterator (spec.md
    // §4.1 names no such accessor); we only need the jump-target sets here,
    // which every block already lists by id.
    let mut out = Vec::new();
    for (_, block) in code.blocks() {
        for &asm_id in &block.inline_asm {
            if let Ok(asm) = code.inline_asm(asm_id) {
                out.push((asm_id, asm.clone()));
            }
        }
    }
    out
}
