fn main() -> anyhow::Result<()> {
    datakit::cli::run()
}
