//! Runs named tests, each on a fresh simulation, and reports the results.

use futures::future::BoxFuture;
use prettytable::{Cell, Row, Table};
use std::cell::RefCell;
use std::future::Future;
use std::path::Path;
use std::time;

use crate::config::TbConfig;
use crate::device::Device;
use crate::executor;
use crate::junit;
use crate::native;
use crate::prelude::*;
use crate::scoreboard::Verdict;
use crate::testbench::clock;
use crate::trigger;

pub type TestFn = fn(SimObject, TbConfig) -> BoxFuture<'static, TbResult<Verdict>>;

thread_local! {
    // first error raised by a background task of the running test
    static FAILURE: RefCell<Option<TbError>> = const { RefCell::new(None) };
}

/// Fails the running test. Only the first failure is kept.
pub fn fail_test(err: TbError) {
    SIM_IF.log(&format!("Test failed: {}", err));
    FAILURE.with(|f| {
        f.borrow_mut().get_or_insert(err);
    });
}

fn has_failed() -> bool {
    FAILURE.with(|f| f.borrow().is_some())
}

fn take_failure() -> Option<TbError> {
    FAILURE.with(|f| f.borrow_mut().take())
}

/// Spawns a background task whose error fails the running test.
pub(crate) fn spawn_checked(
    name: &str,
    future: impl Future<Output = TbResult> + Send + 'static,
) -> JoinHandle<()> {
    Task::spawn(
        async move {
            if let Err(e) = future.await {
                fail_test(e);
            }
        },
        name,
    )
}

#[derive(Clone)]
pub struct TestCase {
    pub name: String,
    pub test: TestFn,
}

impl TestCase {
    pub fn new(name: &str, test: TestFn) -> Self {
        TestCase { name: name.to_string(), test }
    }
}

#[derive(Debug)]
pub struct TestReport {
    pub name: String,
    pub result: TbResult<Verdict>,
    pub time_secs: f64,
    pub sim_time_ns: f64,
}

impl TestReport {
    pub fn passed(&self) -> bool {
        matches!(&self.result, Ok(verdict) if verdict.passed())
    }

    /// Why the test failed, `None` if it passed.
    pub fn failure_message(&self) -> Option<String> {
        match &self.result {
            Err(e) => Some(e.to_string()),
            Ok(verdict) if !verdict.passed() => {
                let reasons: Vec<_> = verdict.failures().iter().map(|f| f.to_string()).collect();
                Some(reasons.join("\n"))
            }
            Ok(_) => None,
        }
    }

    pub fn result_str(&self) -> &'static str {
        match self.passed() {
            true => "passed",
            false => "failed",
        }
    }
}

/// Runs one test against `device`: elaborate, start the clock, run until the test
/// finishes, fails or hits the time limit, then tear everything down.
pub fn run_test(case: &TestCase, device: Box<dyn Device>, config: &TbConfig) -> TestReport {
    let time_start = time::Instant::now();
    let clock_name = device.clock().to_string();
    let (result, sim_time_ns) = match config.validate().and_then(|()| native::init(device)) {
        Ok(root) => {
            SIM_IF.log(&format!("Running test {}", case.name));
            let result = execute(case, root, &clock_name, config);
            let sim_time_ns = SIM_IF.get_sim_time(TimeUnit::Ns);
            tear_down_test();
            (result, sim_time_ns)
        }
        Err(e) => (Err(e), 0.0),
    };
    let report = TestReport {
        name: case.name.clone(),
        result,
        time_secs: time_start.elapsed().as_secs_f64(),
        sim_time_ns,
    };
    if let Some(msg) = report.failure_message() {
        SIM_IF.log(&format!("TEST {} failed: {}", report.name, msg));
    }
    report
}

fn execute(case: &TestCase, root: SimObject, clock_name: &str, config: &TbConfig) -> TbResult<Verdict> {
    spawn_checked("clock", clock(root.c(clock_name)?, config.clock_period_ns, TimeUnit::Ns));
    let outcome: TbObj<Option<TbResult<Verdict>>> = TbObj::new(None);
    let o = outcome.clone();
    let test = (case.test)(root, config.clone());
    Task::spawn(
        async move {
            let result = test.await;
            o.with_mut(|slot| *slot = Some(result));
        },
        &case.name,
    );
    let limit = SIM_IF.get_sim_steps(config.timeout_ns, TimeUnit::Ns)?;
    let run = native::run_until(|| outcome.get().is_some() || has_failed(), limit);
    let failure = take_failure();
    let outcome = outcome.with_mut(Option::take);
    match (failure, outcome) {
        (Some(e), _) => Err(e),
        (None, Some(result)) => result,
        // the run only stops early on an error
        (None, None) => run.and(Err(TbError::Cancelled(case.name.clone()))),
    }
}

fn tear_down_test() {
    let reaped = executor::reap_all();
    if let Err(e) = trigger::cancel_all_triggers() {
        SIM_IF.log(&format!("Warning: {}", e));
    }
    if reaped > 0 {
        SIM_IF.log(&format!("Reaped {} background tasks", reaped));
    }
    native::shutdown();
    take_failure();
}

pub struct TestSuite {
    pub name: String,
    cases: Vec<TestCase>,
}

impl TestSuite {
    pub fn new(name: &str) -> Self {
        TestSuite { name: name.to_string(), cases: Vec::new() }
    }

    pub fn add(mut self, name: &str, test: TestFn) -> Self {
        self.cases.push(TestCase::new(name, test));
        self
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    /// Runs every test on its own freshly built device.
    pub fn run(&self, device: fn() -> Box<dyn Device>, config: &TbConfig) -> SuiteReport {
        let time_start = time::Instant::now();
        let reports = self
            .cases
            .iter()
            .map(|case| run_test(case, device(), config))
            .collect();
        SuiteReport {
            name: self.name.clone(),
            reports,
            time_secs: time_start.elapsed().as_secs_f64(),
        }
    }
}

pub struct SuiteReport {
    pub name: String,
    pub reports: Vec<TestReport>,
    pub time_secs: f64,
}

impl SuiteReport {
    pub fn passed(&self) -> bool {
        self.reports.iter().all(TestReport::passed)
    }

    pub fn failed_count(&self) -> usize {
        self.reports.iter().filter(|r| !r.passed()).count()
    }

    pub fn summary_table(&self) -> Table {
        let mut table = Table::new();
        table.set_titles(Row::new(
            ["Test", "Result", "Time (s)", "SimTime (ns)", "SimSpeed (ns/s)", "Verdict"]
                .iter()
                .map(|t| Cell::new(t))
                .collect(),
        ));
        for r in &self.reports {
            let verdict = match &r.result {
                Ok(v) => v.summary(),
                Err(e) => e.to_string(),
            };
            table.add_row(Row::new(vec![
                Cell::new(&r.name),
                Cell::new(r.result_str()),
                Cell::new(&format!("{:.3}", r.time_secs)),
                Cell::new(&format!("{}", r.sim_time_ns)),
                Cell::new(&format!("{:.3}", r.sim_time_ns / r.time_secs.max(f64::EPSILON))),
                Cell::new(&verdict),
            ]));
        }
        table
    }

    pub fn print_summary(&self) {
        self.summary_table().printstd();
        let sim_time: f64 = self.reports.iter().map(|r| r.sim_time_ns).sum();
        SIM_IF.log("TOTAL SIMULATION");
        SIM_IF.log(&format!("Simulation time: {} ns", sim_time));
        SIM_IF.log(&format!("Real time: {:.3} s", self.time_secs));
        SIM_IF.log(&format!(
            "{}: {} of {} tests passed",
            self.name,
            self.reports.len() - self.failed_count(),
            self.reports.len()
        ));
    }

    pub fn write_junit(&self, path: impl AsRef<Path>) -> TbResult {
        junit::write_junit_xml(self, path.as_ref())
    }
}
