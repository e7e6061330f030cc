use crate::common::{
    identifier::SymbolIdentifier,
    ir::{FunctionDef, IrNode},
    symbol_table::{StorageClass, Symbol},
    types::{SizeClass, Signedness},
};
use crate::stage2_emit::emit::AsmEmitter;
use crate::test::utils::simulator::Simulator;
use anyhow::{Context, Result};
use std::rc::Rc;

pub fn sym_global(name: &str) -> Rc<Symbol> {
    Rc::new(Symbol::new(
        SymbolIdentifier::new_exact(name),
        StorageClass::Global,
        0,
        2,
    ))
}
pub fn sym_static(name: &str, bytelen: u16, alignment: u16) -> Rc<Symbol> {
    Rc::new(Symbol::new(
        SymbolIdentifier::new_exact(name),
        StorageClass::Static,
        bytelen,
        alignment,
    ))
}
pub fn sym_param(name: &str, bytelen: u16, alignment: u16) -> Rc<Symbol> {
    Rc::new(Symbol::new(
        SymbolIdentifier::new_exact(name),
        StorageClass::Parameter,
        bytelen,
        alignment,
    ))
}
pub fn sym_local(name: &str, bytelen: u16, alignment: u16) -> Rc<Symbol> {
    Rc::new(Symbol::new(
        SymbolIdentifier::new_exact(name),
        StorageClass::Local,
        bytelen,
        alignment,
    ))
}

pub fn compile_functions(funs: &[FunctionDef]) -> Result<String> {
    let mut out = Vec::<u8>::new();
    {
        let mut emitter = AsmEmitter::new(&mut out);
        emitter.prog_begin()?;
        for fun in funs {
            emitter.export(&fun.sym)?;
            emitter.function(fun)?;
        }
        emitter.prog_end()?;
    }
    String::from_utf8(out).context("emitted assembly is not utf-8")
}

/// A `main` with no parameters or locals returning the given expression.
pub fn compile_main(size: SizeClass, sign: Signedness, ret_expr: IrNode) -> Result<String> {
    let main_def = FunctionDef {
        sym: sym_global("main"),
        params: vec![],
        locals: vec![],
        body: vec![IrNode::ret(size, sign, ret_expr)],
    };
    compile_functions(&[main_def])
}

pub fn run(asm: &str) -> Result<Simulator> {
    let mut sim = Simulator::load(asm)?;
    sim.run()?;
    Ok(sim)
}

pub fn run_main(size: SizeClass, sign: Signedness, ret_expr: IrNode) -> Result<Simulator> {
    let asm = compile_main(size, sign, ret_expr)?;
    run(&asm)
}
