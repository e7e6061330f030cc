use anyhow::Result;

fn main() -> Result<()> {
    compiler_neanderx::driver::driver_main()
}
