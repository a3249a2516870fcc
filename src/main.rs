use reels_tui::cli;

fn main() {
    let cli = match cli::parse_from(std::env::args_os()) {
        Ok(cli) => cli,
        Err(err) => err.exit(),
    };

    if let Err(err) = reels_tui::run(cli) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}
