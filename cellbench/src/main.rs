fn main() -> anyhow::Result<()> {
    cellbench::run()
}
