use crate::common::{
    identifier::SymbolIdentifier,
    ir::{FunctionDef, IrLeaf, IrNode, SpillSlotId},
    symbol_table::Symbol,
    types::{STACK_SLOT_BYTELEN, stack_align},
};
use anyhow::{Result, anyhow};
use getset::CopyGetters;
use std::collections::HashMap;
use std::rc::Rc;

/// Frame-pointer-relative layout of one call activation.
///
/// `[FP+0]` saved caller FP, `[FP+2]` return address, `[FP+4...]` parameters
/// in declaration order (padded to stack slots), `[FP-...]` locals then spill
/// cells, downward in order of first use. These offsets are a bit-exact
/// contract with hand-written runtime code.
#[derive(CopyGetters, Debug)]
pub struct FrameLayout {
    obj_offsets: HashMap<Rc<SymbolIdentifier>, i32>,
    spill_offsets: HashMap<SpillSlotId, i32>,

    /// Bytes the prologue must reserve below FP.
    #[getset(get_copy = "pub")]
    frame_bytelen: u16,
}

pub const PARAM_BASE_OFFSET: i32 = 4;

impl FrameLayout {
    pub fn build(def: &FunctionDef) -> Result<Self> {
        let mut obj_offsets = HashMap::new();

        let mut param_offset = PARAM_BASE_OFFSET;
        for param in def.params.iter() {
            obj_offsets.insert(Rc::clone(&param.ident), param_offset);
            param_offset += stack_align(param.bytelen) as i32;
        }

        let mut depth: u32 = 0;
        for local in def.locals.iter() {
            let align = local.alignment.max(STACK_SLOT_BYTELEN) as u32;
            depth = (depth + local.bytelen as u32).div_ceil(align) * align;
            obj_offsets.insert(Rc::clone(&local.ident), -(depth as i32));
        }

        let mut spill_offsets = HashMap::new();
        for slot in spill_slots_in_first_use_order(&def.body) {
            depth += STACK_SLOT_BYTELEN as u32;
            spill_offsets.insert(slot, -(depth as i32));
        }

        if depth > u16::MAX as u32 {
            return Err(anyhow!("frame of {depth} bytes exceeds the address space"));
        }
        Ok(Self {
            obj_offsets,
            spill_offsets,
            frame_bytelen: depth as u16,
        })
    }

    pub fn offset_of(&self, sym: &Symbol) -> Result<i32> {
        self.obj_offsets
            .get(&sym.ident)
            .copied()
            .ok_or_else(|| anyhow!("symbol {:?} is not in the current frame", sym.ident))
    }

    pub fn spill_offset(&self, slot: SpillSlotId) -> Result<i32> {
        self.spill_offsets
            .get(&slot)
            .copied()
            .ok_or_else(|| anyhow!("spill slot {slot:?} was not allocated"))
    }
}

fn spill_slots_in_first_use_order(body: &[IrNode]) -> Vec<SpillSlotId> {
    let mut slots = vec![];
    for stmt in body {
        scan(stmt, &mut slots);
    }
    slots
}
fn scan(node: &IrNode, slots: &mut Vec<SpillSlotId>) {
    if let Some(IrLeaf::Spill(slot)) = &node.leaf
        && slots.contains(slot) == false
    {
        slots.push(*slot);
    }
    for kid in node.kids.iter() {
        scan(kid, slots);
    }
}
