use std::process::ExitCode;

mod cli;
mod logging;

fn main() -> ExitCode {
    let matches = cli::build_cli().get_matches();

    if let Err(err) = logging::init(matches.get_count("verbose")) {
        eprintln!("warning: logging disabled: {err:#}");
    }

    match cli::run(&matches) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
