fn main() {
    if let Err(err) = invoice_recon::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
