use tinyalu_tb::device::Device;
use tinyalu_tb::prelude::*;
use tinyalu_tb::runner::TestReport;
use tinyalu_tb::scenarios::{alu_test_boundary, alu_test_random, default_suite};
use tinyalu_tb::scoreboard::{check, Failure};

fn tinyalu() -> Box<dyn Device> {
    Box::new(TinyAlu::new())
}

fn config() -> TbConfig {
    TbConfig::default().with_seed(0x5eed)
}

fn run(name: &str, test: tinyalu_tb::runner::TestFn, device: Box<dyn Device>, config: &TbConfig) -> TestReport {
    run_test(&TestCase::new(name, test), device, config)
}

fn verdict(report: &TestReport) -> &Verdict {
    match &report.result {
        Ok(verdict) => verdict,
        Err(e) => panic!("{} ended with an error: {}", report.name, e),
    }
}

fn directed_3_4(dut: SimObject, config: TbConfig) -> BoxFuture<'static, TbResult<Verdict>> {
    async move {
        AluTest::with_policy(dut, config, Box::new(FixedOperands::new(3, 4)))?
            .run()
            .await
    }
    .boxed()
}

#[test]
fn random_test_passes_with_full_coverage() {
    let report = run("random", alu_test_random, tinyalu(), &config());
    let verdict = verdict(&report);
    assert!(report.passed(), "{}", verdict);
    // one per operation plus the fillers
    assert_eq!(verdict.comparisons.len(), Operation::ALL.len() + PIPELINE_DEPTH);
    assert_eq!(verdict.coverage.len(), Operation::ALL.len());
    assert_eq!(verdict.unpaired_results, 0);
    assert!(report.sim_time_ns > 0.0);
}

#[test]
fn objection_flavor_gives_the_same_transactions() {
    let sequential = run("sequential", alu_test_random, tinyalu(), &config());
    let objection = run(
        "objection",
        alu_test_random,
        tinyalu(),
        &config().with_flavor(Flavor::Objection),
    );
    assert!(objection.passed());
    assert_eq!(verdict(&sequential).comparisons, verdict(&objection).comparisons);
}

#[test]
fn same_seed_reproduces_the_operands() {
    let first = run("first", alu_test_random, tinyalu(), &config());
    let second = run("second", alu_test_random, tinyalu(), &config());
    assert_eq!(verdict(&first), verdict(&second));
}

#[test]
fn boundary_test_passes() {
    let report = run("boundary", alu_test_boundary, tinyalu(), &config());
    let verdict = verdict(&report);
    assert!(report.passed());
    let results: Vec<(Operation, u16)> = verdict.comparisons[..4]
        .iter()
        .map(|c| (c.cmd.op, c.actual))
        .collect();
    assert_eq!(
        results,
        vec![
            (Operation::Add, 0x01fe),
            (Operation::And, 0x00ff),
            (Operation::Xor, 0x0000),
            (Operation::Mul, 0xfe01),
        ]
    );
}

#[test]
fn directed_add_gives_seven() {
    let report = run("directed", directed_3_4, tinyalu(), &config());
    let first = verdict(&report).comparisons[0];
    assert_eq!(first.cmd, Command::new(3, 4, Operation::Add));
    assert_eq!(first.actual, 0x0007);
    assert_eq!(first.to_string(), "PASSED: 03 ADD 04 = 0007");
}

#[test]
fn truncated_product_is_caught() {
    let report = run(
        "truncated_mul",
        alu_test_boundary,
        Box::new(TinyAlu::with_fault(Fault::TruncatedMul)),
        &config(),
    );
    assert!(!report.passed());
    let failures = verdict(&report).failures();
    assert_eq!(failures.len(), 1);
    match &failures[0] {
        Failure::Mismatch(c) => {
            assert_eq!(c.cmd.op, Operation::Mul);
            assert_eq!((c.actual, c.expected), (0x0001, 0xfe01));
        }
        other => panic!("unexpected failure {}", other),
    }
    // checking went on after the mismatch
    assert_eq!(verdict(&report).comparisons.len(), 4 + PIPELINE_DEPTH);
}

#[test]
fn dropped_carry_is_caught() {
    let report = run(
        "dropped_carry",
        alu_test_boundary,
        Box::new(TinyAlu::with_fault(Fault::DroppedCarry)),
        &config(),
    );
    let mismatches: Vec<_> = verdict(&report).mismatches().map(|c| c.cmd.op).collect();
    assert_eq!(mismatches, vec![Operation::Add]);
}

#[test]
fn missing_operation_fails_on_coverage() {
    let config = config().with_ops(&[Operation::Add, Operation::And, Operation::Xor]);
    let report = run("no_mul", alu_test_random, tinyalu(), &config);
    let verdict = verdict(&report);
    assert_eq!(verdict.mismatches().count(), 0);
    assert!(!report.passed());
    assert_eq!(verdict.failures(), vec![Failure::CoverageGap(vec![Operation::Mul])]);
    assert!(report.failure_message().unwrap().contains("Missed: MUL"));
}

#[test]
fn fillers_do_not_cover_and() {
    let config = config().with_ops(&[Operation::Add, Operation::Xor, Operation::Mul]);
    let report = run("no_and", alu_test_random, tinyalu(), &config);
    let verdict = verdict(&report);
    // the AND fillers are still checked against the oracle
    assert_eq!(verdict.comparisons.len(), 3 + PIPELINE_DEPTH);
    assert_eq!(verdict.mismatches().count(), 0);
    assert!(!report.passed());
    assert_eq!(verdict.failures(), vec![Failure::CoverageGap(vec![Operation::And])]);
    assert!(report.failure_message().unwrap().contains("Missed: AND"));
}

#[test]
fn result_without_a_command_fails_the_test() {
    let report = run(
        "spurious_done",
        alu_test_random,
        Box::new(TinyAlu::with_fault(Fault::SpuriousDone)),
        &config(),
    );
    let issued = Operation::ALL.len() + PIPELINE_DEPTH;
    assert_eq!(
        report.result,
        Err(TbError::ResultCount { issued, observed: issued + 1 })
    );
    assert!(!report.passed());
}

#[test]
fn too_few_fillers_are_rejected() {
    let config = TbConfig { filler_count: 1, ..config() };
    let report = run("few_fillers", alu_test_random, tinyalu(), &config);
    assert!(matches!(report.result, Err(TbError::Config(_))));
}

#[test]
fn more_fillers_are_accepted() {
    let config = TbConfig { filler_count: 4, drain_cycles: 12, ..config() };
    let report = run("more_fillers", alu_test_random, tinyalu(), &config);
    assert!(report.passed());
    assert_eq!(verdict(&report).comparisons.len(), 8);
}

#[test]
fn simulated_time_limit_fails_the_test() {
    let config = TbConfig { timeout_ns: 50, ..config() };
    let report = run("timeout", alu_test_random, tinyalu(), &config);
    assert_eq!(report.result, Err(TbError::Timeout(50)));
}

fn reset_after_start(dut: SimObject, _config: TbConfig) -> BoxFuture<'static, TbResult<Verdict>> {
    async move {
        let bfm = AluBfm::new(dut, 1)?;
        bfm.reset().await?;
        bfm.start_tasks()?;
        bfm.reset().await?;
        check(&[], &[], 0)
    }
    .boxed()
}

#[test]
fn reset_after_start_is_a_protocol_violation() {
    let report = run("reset_after_start", reset_after_start, tinyalu(), &config());
    assert_eq!(report.result, Err(TbError::ResetAfterStart));
}

fn send_before_start(dut: SimObject, _config: TbConfig) -> BoxFuture<'static, TbResult<Verdict>> {
    async move {
        let bfm = AluBfm::new(dut, 1)?;
        bfm.reset().await?;
        bfm.send_op(1, 2, Operation::Add).await?;
        check(&[], &[], 0)
    }
    .boxed()
}

#[test]
fn send_before_start_is_rejected() {
    let report = run("send_before_start", send_before_start, tinyalu(), &config());
    assert_eq!(report.result, Err(TbError::TasksNotStarted));
}

fn start_twice(dut: SimObject, _config: TbConfig) -> BoxFuture<'static, TbResult<Verdict>> {
    async move {
        let bfm = AluBfm::new(dut, 1)?;
        bfm.start_tasks()?;
        bfm.start_tasks()?;
        check(&[], &[], 0)
    }
    .boxed()
}

#[test]
fn tasks_start_only_once() {
    let report = run("start_twice", start_twice, tinyalu(), &config());
    assert_eq!(report.result, Err(TbError::TasksAlreadyStarted));
}

fn take_receiver_twice(dut: SimObject, _config: TbConfig) -> BoxFuture<'static, TbResult<Verdict>> {
    async move {
        let bfm = AluBfm::new(dut, 1)?;
        let _rx = bfm.take_result_receiver()?;
        bfm.take_result_receiver()?;
        check(&[], &[], 0)
    }
    .boxed()
}

#[test]
fn receivers_are_handed_out_once() {
    let report = run("take_twice", take_receiver_twice, tinyalu(), &config());
    assert_eq!(report.result, Err(TbError::ChannelTaken("result")));
}

// A second producer shows up while the first one waits for the mailbox.
fn concurrent_send(dut: SimObject, _config: TbConfig) -> BoxFuture<'static, TbResult<Verdict>> {
    async move {
        let bfm = AluBfm::new(dut, 1)?;
        bfm.reset().await?;
        bfm.start_tasks()?;
        // fills the mailbox, the driver only empties it on the next falling edge
        bfm.send_op(1, 2, Operation::Add).await?;
        let waiting = bfm.clone();
        Task::spawn(
            async move { waiting.send_op(3, 4, Operation::Xor).await },
            "waiting_sender",
        );
        Trigger::read_write().await?;
        bfm.send_op(5, 6, Operation::And).await?;
        check(&[], &[], 0)
    }
    .boxed()
}

#[test]
fn concurrent_senders_are_rejected() {
    let report = run("concurrent_send", concurrent_send, tinyalu(), &config());
    assert_eq!(report.result, Err(TbError::ConcurrentSend));
    assert_eq!(
        report.failure_message().unwrap(),
        "another task is already sending on the stimulus mailbox"
    );
}

// Drives an undefined opcode past the driver, straight onto the pins.
fn rogue_opcode(dut: SimObject, _config: TbConfig) -> BoxFuture<'static, TbResult<Verdict>> {
    async move {
        let bfm = AluBfm::new(dut, 1)?;
        bfm.reset().await?;
        bfm.start_tasks()?;
        let clk = dut.c("clk")?;
        clk.falling_edge().await?;
        dut.c("op")?.set_u32(5)?;
        dut.c("start")?.set_u32(1)?;
        utils::clock_cycles(clk, 5).await?;
        check(&[], &[], 0)
    }
    .boxed()
}

#[test]
fn undefined_opcode_on_the_bus_fails_the_test() {
    let report = run("rogue_opcode", rogue_opcode, tinyalu(), &config());
    assert_eq!(report.result, Err(TbError::UnknownOpcode(5)));
}

#[test]
fn monitors_observe_every_issued_transaction() {
    let report = run("counts", alu_test_boundary, tinyalu(), &config());
    let verdict = verdict(&report);
    let issued: Vec<Command> = Operation::ALL
        .into_iter()
        .map(|op| Command::new(0xff, 0xff, op))
        .chain(std::iter::repeat(Command::filler()).take(PIPELINE_DEPTH))
        .collect();
    let observed: Vec<Command> = verdict.comparisons.iter().map(|c| c.cmd).collect();
    assert_eq!(observed, issued);
}

#[test]
fn suite_writes_junit_report() {
    let report = default_suite().run(tinyalu, &config());
    assert!(report.passed());
    assert_eq!(report.reports.len(), 2);
    assert_eq!(report.summary_table().len(), 2);

    let path = std::env::temp_dir().join(format!("tinyalu_tb_results_{}.xml", std::process::id()));
    report.write_junit(&path).unwrap();
    let xml = std::fs::read_to_string(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    assert!(xml.contains("testsuite"));
    assert!(xml.contains("alu_test_random"));
    assert!(xml.contains("alu_test_boundary"));
}
