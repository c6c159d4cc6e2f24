fn main() {
    if let Err(err) = sector_indicators::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
