mod app;
mod cli;

fn main() {
    let cli = cli::parse();
    if let Err(e) = app::run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
