fn main() -> anyhow::Result<()> {
    aimem::run()?;
    Ok(())
}
