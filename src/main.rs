use std::process::ExitCode;

use tinyalu_tb::config::TbConfig;
use tinyalu_tb::device::Device;
use tinyalu_tb::scenarios::default_suite;
use tinyalu_tb::tinyalu::TinyAlu;

fn tinyalu() -> Box<dyn Device> {
    Box::new(TinyAlu::new())
}

fn main() -> ExitCode {
    let config = match TbConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("tinyalu-tb: {}", e);
            return ExitCode::from(2);
        }
    };
    let report = default_suite().run(tinyalu, &config);
    report.print_summary();
    if let Err(e) = report.write_junit("results.xml") {
        eprintln!("tinyalu-tb: {}", e);
    }
    match report.passed() {
        true => ExitCode::SUCCESS,
        false => ExitCode::FAILURE,
    }
}
