use crate::common::{
    identifier::JumpLabel,
    symbol_table::Symbol,
    types::{SizeClass, Signedness},
};
use derive_more::Constructor;
use std::rc::Rc;

/// Operation tag of an IR node. Together with the size class and signedness it
/// forms the terminal the matcher labels the node with.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Operation {
    Const,
    AddrGlobal,
    AddrFrame,
    AddrLocal,
    AddrSpill,
    Indir,
    Asgn,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    ShiftLeft,
    ShiftRight,
    Widen,
    Narrow,
    Label,
    Jump,
    BranchEq,
    BranchNe,
    BranchLt,
    BranchLe,
    BranchGt,
    BranchGe,
    Arg,
    Call,
    CallVoid,
    Ret,
    RetVoid,
}

/// Ordinal of a spill slot within the enclosing call's frame.
#[derive(Constructor, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SpillSlotId(pub u16);

#[derive(Debug)]
pub enum IrLeaf {
    Const(i64),
    Obj { sym: Rc<Symbol>, delta: i64 },
    Target(Rc<JumpLabel>),
    Spill(SpillSlotId),
    Callee { sym: Rc<Symbol>, arg_bytelen: u16 },
}

/// One node of the front end's expression/statement tree. Children are owned
/// exclusively; the tree is never shared and never mutated after construction.
#[derive(Debug)]
pub struct IrNode {
    pub op: Operation,
    pub size: SizeClass,
    pub sign: Signedness,
    pub kids: Vec<IrNode>,
    pub leaf: Option<IrLeaf>,
}
impl IrNode {
    fn new(
        op: Operation,
        size: SizeClass,
        sign: Signedness,
        kids: Vec<IrNode>,
        leaf: Option<IrLeaf>,
    ) -> Self {
        Self { op, size, sign, kids, leaf }
    }

    pub fn konst(size: SizeClass, sign: Signedness, value: i64) -> Self {
        Self::new(Operation::Const, size, sign, vec![], Some(IrLeaf::Const(value)))
    }
    pub fn addr_global(sym: Rc<Symbol>) -> Self {
        Self::addr_global_delta(sym, 0)
    }
    pub fn addr_global_delta(sym: Rc<Symbol>, delta: i64) -> Self {
        Self::new(
            Operation::AddrGlobal,
            SizeClass::B2,
            Signedness::Unsigned,
            vec![],
            Some(IrLeaf::Obj { sym, delta }),
        )
    }
    pub fn addr_frame(sym: Rc<Symbol>) -> Self {
        Self::new(
            Operation::AddrFrame,
            SizeClass::B2,
            Signedness::Unsigned,
            vec![],
            Some(IrLeaf::Obj { sym, delta: 0 }),
        )
    }
    pub fn addr_local(sym: Rc<Symbol>) -> Self {
        Self::new(
            Operation::AddrLocal,
            SizeClass::B2,
            Signedness::Unsigned,
            vec![],
            Some(IrLeaf::Obj { sym, delta: 0 }),
        )
    }
    pub fn addr_spill(slot: SpillSlotId) -> Self {
        Self::new(
            Operation::AddrSpill,
            SizeClass::B2,
            Signedness::Unsigned,
            vec![],
            Some(IrLeaf::Spill(slot)),
        )
    }
    pub fn indir(size: SizeClass, sign: Signedness, addr: IrNode) -> Self {
        Self::new(Operation::Indir, size, sign, vec![addr], None)
    }
    pub fn asgn(size: SizeClass, sign: Signedness, dst_addr: IrNode, value: IrNode) -> Self {
        Self::new(Operation::Asgn, size, sign, vec![dst_addr, value], None)
    }
    pub fn binary(
        op: Operation,
        size: SizeClass,
        sign: Signedness,
        lhs: IrNode,
        rhs: IrNode,
    ) -> Self {
        Self::new(op, size, sign, vec![lhs, rhs], None)
    }
    pub fn unary(op: Operation, size: SizeClass, sign: Signedness, operand: IrNode) -> Self {
        Self::new(op, size, sign, vec![operand], None)
    }
    pub fn widen(to: SizeClass, from_sign: Signedness, operand: IrNode) -> Self {
        Self::new(Operation::Widen, to, from_sign, vec![operand], None)
    }
    pub fn narrow(to: SizeClass, sign: Signedness, operand: IrNode) -> Self {
        Self::new(Operation::Narrow, to, sign, vec![operand], None)
    }
    pub fn label(lbl: Rc<JumpLabel>) -> Self {
        Self::new(
            Operation::Label,
            SizeClass::B2,
            Signedness::Unsigned,
            vec![],
            Some(IrLeaf::Target(lbl)),
        )
    }
    pub fn jump(lbl: Rc<JumpLabel>) -> Self {
        Self::new(
            Operation::Jump,
            SizeClass::B2,
            Signedness::Unsigned,
            vec![],
            Some(IrLeaf::Target(lbl)),
        )
    }
    pub fn branch(
        op: Operation,
        size: SizeClass,
        sign: Signedness,
        lhs: IrNode,
        rhs: IrNode,
        target: Rc<JumpLabel>,
    ) -> Self {
        Self::new(op, size, sign, vec![lhs, rhs], Some(IrLeaf::Target(target)))
    }
    pub fn arg(size: SizeClass, sign: Signedness, value: IrNode) -> Self {
        Self::new(Operation::Arg, size, sign, vec![value], None)
    }
    pub fn call(size: SizeClass, sign: Signedness, callee: Rc<Symbol>, arg_bytelen: u16) -> Self {
        Self::new(
            Operation::Call,
            size,
            sign,
            vec![],
            Some(IrLeaf::Callee { sym: callee, arg_bytelen }),
        )
    }
    pub fn call_void(callee: Rc<Symbol>, arg_bytelen: u16) -> Self {
        Self::new(
            Operation::CallVoid,
            SizeClass::B2,
            Signedness::Unsigned,
            vec![],
            Some(IrLeaf::Callee { sym: callee, arg_bytelen }),
        )
    }
    pub fn ret(size: SizeClass, sign: Signedness, value: IrNode) -> Self {
        Self::new(Operation::Ret, size, sign, vec![value], None)
    }
    pub fn ret_void() -> Self {
        Self::new(
            Operation::RetVoid,
            SizeClass::B2,
            Signedness::Unsigned,
            vec![],
            None,
        )
    }
}

/// A function as handed over by the front end: its symbol, the declared
/// parameters and locals, and the statement trees of the body in order.
#[derive(Debug)]
pub struct FunctionDef {
    pub sym: Rc<Symbol>,
    pub params: Vec<Rc<Symbol>>,
    pub locals: Vec<Rc<Symbol>>,
    pub body: Vec<IrNode>,
}
