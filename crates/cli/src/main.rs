fn main() {
    if let Err(error) = arbor_cli::run() {
        // tracing is initialized inside run() after argument parsing
        tracing::error!("{error:#}");
        std::process::exit(1);
    }
}
