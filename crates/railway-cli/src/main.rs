use std::{env, process::ExitCode};

use railway::Module;

mod argv;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let Some((file, rest)) = args.split_first() else {
        eprintln!("usage: railway <file> [-flag value]*");
        return ExitCode::FAILURE;
    };

    let argv = match argv::parse_argv(rest) {
        Ok(argv) => argv,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    let module = match Module::from_file(file) {
        Ok(module) => module,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    match module.run(argv) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("\n{err}");
            ExitCode::FAILURE
        }
    }
}
