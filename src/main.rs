use pourover::config::VmConfig;
use pourover::error::{ClassFormatError, VmError};
use pourover::jvm::read_class_file;
use pourover::runtime::Runtime;

use std::env;
use std::path::Path;
use std::process::ExitCode;

use tracing::error;

fn main() -> ExitCode {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(VmConfig::log_level())
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("failed to set global default tracing subscriber");
    }

    let paths: Vec<String> = env::args().skip(1).collect();
    if paths.is_empty() {
        eprintln!("usage: pourover <file.class>...");
        return ExitCode::FAILURE;
    }

    let mut rt = Runtime::new(VmConfig::from_env());
    let mut status = ExitCode::SUCCESS;
    for path in &paths {
        let loaded = read_class_file(Path::new(path))
            .map_err(|err| VmError::from(ClassFormatError::from(err)))
            .and_then(|bytes| rt.define_class(&bytes));
        match loaded {
            Ok(class) => print!("{class}"),
            Err(err) => {
                error!("failed to load {path}: {err}");
                status = ExitCode::FAILURE;
            }
        }
    }
    status
}
