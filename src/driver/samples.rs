//! Built-in sample programs, standing in for the external front end: each
//! builds the symbol table and IR trees a front end would hand over, then
//! drives the emitter through the regular callback sequence.

use crate::common::{
    identifier::{JumpLabel, SymbolIdentifier},
    ir::{FunctionDef, IrNode, Operation as Op, SpillSlotId},
    symbol_table::{StorageClass, Symbol, SymbolTable},
    types::{SizeClass::*, Signedness::*},
};
use crate::stage2_emit::emit::AsmEmitter;
use anyhow::{Context, Result, anyhow};
use std::io::Write;
use std::rc::Rc;

pub const SAMPLE_NAMES: [&str; 2] = ["add", "factorial"];

pub fn compile(name: &str) -> Result<String> {
    let (symtab, funs) = match name {
        "add" => add_functions(),
        "factorial" => factorial_functions(),
        _ => return Err(anyhow!("unknown sample {name:?}; try --list")),
    };
    log::debug!("front end declared {} symbols", symtab.objs().len());

    let mut out = Vec::<u8>::new();
    {
        let mut emitter = AsmEmitter::new(&mut out);
        emitter.prog_begin()?;
        emit_functions(&mut emitter, &funs)?;
        emitter.prog_end()?;
    }
    String::from_utf8(out).context("emitted assembly is not utf-8")
}

fn emit_functions<W: Write>(emitter: &mut AsmEmitter<W>, funs: &[FunctionDef]) -> Result<()> {
    for fun in funs {
        emitter.export(&fun.sym)?;
        emitter.function(fun)?;
    }
    Ok(())
}

/// `char add(char a, char b) { return a + b; }` and a `main` returning
/// `add(5, 3)`. Arguments are pushed right-to-left, so the rightmost argument's
/// statement comes first.
pub fn add_functions() -> (SymbolTable, Vec<FunctionDef>) {
    let mut symtab = SymbolTable::default();
    let add_fn = symtab.declare(Symbol::new(
        SymbolIdentifier::new_exact("add"),
        StorageClass::Global,
        0,
        2,
    ));
    let main_fn = symtab.declare(Symbol::new(
        SymbolIdentifier::new_exact("main"),
        StorageClass::Global,
        0,
        2,
    ));
    let a = symtab.declare(Symbol::new(
        SymbolIdentifier::new_exact("a"),
        StorageClass::Parameter,
        1,
        1,
    ));
    let b = symtab.declare(Symbol::new(
        SymbolIdentifier::new_exact("b"),
        StorageClass::Parameter,
        1,
        1,
    ));

    let add_def = FunctionDef {
        sym: Rc::clone(&add_fn),
        params: vec![Rc::clone(&a), Rc::clone(&b)],
        locals: vec![],
        body: vec![IrNode::ret(
            B1,
            Signed,
            IrNode::binary(
                Op::Add,
                B1,
                Signed,
                IrNode::indir(B1, Signed, IrNode::addr_frame(Rc::clone(&a))),
                IrNode::indir(B1, Signed, IrNode::addr_frame(Rc::clone(&b))),
            ),
        )],
    };
    let main_def = FunctionDef {
        sym: Rc::clone(&main_fn),
        params: vec![],
        locals: vec![],
        body: vec![
            IrNode::arg(B1, Signed, IrNode::konst(B1, Signed, 3)),
            IrNode::arg(B1, Signed, IrNode::konst(B1, Signed, 5)),
            IrNode::ret(B1, Signed, IrNode::call(B1, Signed, Rc::clone(&add_fn), 4)),
        ],
    };
    (symtab, vec![add_def, main_def])
}

/// Recursive `int fact(int n)` spilling `n` and the recursive result across
/// the call, and a `main` returning `fact(5)`. Exercises the call-scoped
/// spill cells, the 16-bit compare-and-branch, and the multiply routine.
pub fn factorial_functions() -> (SymbolTable, Vec<FunctionDef>) {
    let mut symtab = SymbolTable::default();
    let fact_fn = symtab.declare(Symbol::new(
        SymbolIdentifier::new_exact("fact"),
        StorageClass::Global,
        0,
        2,
    ));
    let main_fn = symtab.declare(Symbol::new(
        SymbolIdentifier::new_exact("main"),
        StorageClass::Global,
        0,
        2,
    ));
    let n = symtab.declare(Symbol::new(
        SymbolIdentifier::new_exact("n"),
        StorageClass::Parameter,
        2,
        2,
    ));

    let rec = Rc::new(JumpLabel::new("rec"));
    let load_n = || IrNode::indir(B2, Signed, IrNode::addr_frame(Rc::clone(&n)));

    let fact_def = FunctionDef {
        sym: Rc::clone(&fact_fn),
        params: vec![Rc::clone(&n)],
        locals: vec![],
        body: vec![
            IrNode::branch(
                Op::BranchGt,
                B2,
                Signed,
                load_n(),
                IrNode::konst(B2, Signed, 1),
                Rc::clone(&rec),
            ),
            IrNode::ret(B2, Signed, IrNode::konst(B2, Signed, 1)),
            IrNode::label(Rc::clone(&rec)),
            IrNode::asgn(B2, Signed, IrNode::addr_spill(SpillSlotId::new(0)), load_n()),
            IrNode::arg(
                B2,
                Signed,
                IrNode::binary(Op::Sub, B2, Signed, load_n(), IrNode::konst(B2, Signed, 1)),
            ),
            IrNode::asgn(
                B2,
                Signed,
                IrNode::addr_spill(SpillSlotId::new(1)),
                IrNode::call(B2, Signed, Rc::clone(&fact_fn), 2),
            ),
            IrNode::ret(
                B2,
                Signed,
                IrNode::binary(
                    Op::Mul,
                    B2,
                    Signed,
                    IrNode::indir(B2, Signed, IrNode::addr_spill(SpillSlotId::new(0))),
                    IrNode::indir(B2, Signed, IrNode::addr_spill(SpillSlotId::new(1))),
                ),
            ),
        ],
    };
    let main_def = FunctionDef {
        sym: Rc::clone(&main_fn),
        params: vec![],
        locals: vec![],
        body: vec![
            IrNode::arg(B2, Signed, IrNode::konst(B2, Signed, 5)),
            IrNode::ret(B2, Signed, IrNode::call(B2, Signed, Rc::clone(&fact_fn), 2)),
        ],
    };
    (symtab, vec![fact_def, main_def])
}
