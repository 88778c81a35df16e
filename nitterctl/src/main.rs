use clap::Parser;

fn main() {
    let cli = nitterctl::Cli::parse();
    if let Err(err) = nitterctl::run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
