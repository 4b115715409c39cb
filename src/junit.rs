use junit_report::{Duration, ReportBuilder, TestCaseBuilder, TestSuiteBuilder};
use std::path::Path;

use crate::runner::SuiteReport;
use crate::{TbError, TbResult};

pub(crate) fn write_junit_xml(suite: &SuiteReport, path: &Path) -> TbResult {
    let mut test_cases = Vec::new();

    for t in suite.reports.iter() {
        let duration = Duration::seconds_f64(t.time_secs);
        let tc = match t.failure_message() {
            None => TestCaseBuilder::success(&t.name, duration),
            Some(msg) => {
                let kind = match t.result {
                    Ok(_) => "failure",
                    Err(_) => "error",
                };
                TestCaseBuilder::failure(&t.name, duration, kind, &msg)
            }
        }
        .build();
        test_cases.push(tc);
    }

    let test_suite = TestSuiteBuilder::new(&suite.name)
        .add_testcases(test_cases)
        .build();
    let report = ReportBuilder::new().add_testsuite(test_suite).build();
    let file = std::fs::File::create(path)
        .map_err(|e| TbError::Report(format!("{}: {}", path.display(), e)))?;
    report
        .write_xml(file)
        .map_err(|e| TbError::Report(e.to_string()))
}
