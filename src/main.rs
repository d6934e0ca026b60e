fn main() -> memsweep::Result<()> {
    memsweep::cli::run()
}
