fn main() {
    if let Err(err) = blackout_cli::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
