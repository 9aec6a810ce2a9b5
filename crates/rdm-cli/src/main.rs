use rdm_core::logging;

mod cli;

fn main() {
    if let Err(e) = logging::init_logging() {
        eprintln!("rdm: log file unavailable ({}), using stderr", e);
        logging::init_logging_stderr();
    }

    if let Err(err) = cli::run_from_args() {
        eprintln!("rdm error: {:#}", err);
        std::process::exit(1);
    }
}
