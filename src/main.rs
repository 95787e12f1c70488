fn main() {
    if let Err(err) = fintab::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
