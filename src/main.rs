fn main() {
    if let Err(e) = segtiler::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
