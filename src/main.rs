fn main() {
    if let Err(err) = inventory_lens::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
