fn main() {
    std::process::exit(apigen_cli::run_cli(std::env::args().collect()));
}
