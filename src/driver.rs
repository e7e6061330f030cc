pub mod samples;

use anyhow::{Result, anyhow};
use clap::Parser as ClapParser;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(ClapParser, Debug)]
pub struct CliArgs {
    /// Name of the built-in sample program to compile.
    sample: Option<String>,

    #[clap(short = 'o')]
    out_filepath: Option<PathBuf>,

    #[clap(long = "list")]
    list_samples: bool,
}

pub fn driver_main() -> Result<()> {
    env_logger::init();

    let args = CliArgs::parse();
    log::info!("{args:?}");

    if args.list_samples {
        for name in samples::SAMPLE_NAMES {
            println!("{name}");
        }
        return Ok(());
    }

    let name = args
        .sample
        .ok_or_else(|| anyhow!("expected a sample name; try --list"))?;
    let asm = samples::compile(&name)?;
    log::info!("Backend done for sample {name:?}");

    match args.out_filepath {
        Some(path) => {
            fs::write(&path, asm)?;
            log::info!("Assembly written -> {path:?}");
        }
        None => {
            io::stdout().write_all(asm.as_bytes())?;
        }
    }
    Ok(())
}
