use std::env;
use std::io;
use std::process::ExitCode;

use rawdump::Unbuffered;
use rawdump_thermo::ThermoProvider;

fn main() -> ExitCode {
    let stdout = Unbuffered::new(io::stdout().lock());
    let code = rawdump::cli::run(env::args_os(), stdout, ThermoProvider::start);
    ExitCode::from(code)
}
