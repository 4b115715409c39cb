use proptest::prelude::*;
use tinyalu_tb::bfm::PIPELINE_DEPTH;
use tinyalu_tb::oracle::predict;
use tinyalu_tb::ops::Operation;
use tinyalu_tb::scoreboard::check;
use tinyalu_tb::ops::Command;

fn operation() -> impl Strategy<Value = Operation> {
    prop::sample::select(Operation::ALL.to_vec())
}

proptest! {
    #[test]
    fn oracle_is_pure(a in any::<u8>(), b in any::<u8>(), op in operation()) {
        prop_assert_eq!(predict(a, b, op), predict(a, b, op));
    }

    #[test]
    fn oracle_matches_wide_arithmetic(a in any::<u8>(), b in any::<u8>()) {
        let (wa, wb) = (u32::from(a), u32::from(b));
        prop_assert_eq!(u32::from(predict(a, b, Operation::Add)), wa + wb);
        prop_assert_eq!(u32::from(predict(a, b, Operation::Mul)), wa * wb);
        prop_assert!(predict(a, b, Operation::And) <= 0xff);
        prop_assert!(predict(a, b, Operation::Xor) <= 0xff);
    }

    #[test]
    fn replayed_history_gives_the_same_verdict(
        cmds in proptest::collection::vec((any::<u8>(), any::<u8>(), operation()), 1..16),
        flip in any::<prop::sample::Index>(),
    ) {
        let cmds: Vec<Command> = cmds.into_iter().map(|(a, b, op)| Command::new(a, b, op)).collect();
        let mut results: Vec<u16> = cmds.iter().map(|c| predict(c.a, c.b, c.op)).collect();
        let i = flip.index(results.len());
        results[i] ^= 0x8000;

        let first = check(&cmds, &results, PIPELINE_DEPTH).unwrap();
        let again = check(&cmds, &results, PIPELINE_DEPTH).unwrap();
        prop_assert_eq!(first.mismatches().count(), 1);
        prop_assert_eq!(first.log_lines(), again.log_lines());
        prop_assert_eq!(first, again);
    }

    #[test]
    fn coverage_ignores_trailing_fillers(
        cmds in proptest::collection::vec((any::<u8>(), any::<u8>(), operation()), 0..12),
        fillers in 0..4usize,
    ) {
        let real: Vec<Command> = cmds.into_iter().map(|(a, b, op)| Command::new(a, b, op)).collect();
        let mut all = real.clone();
        all.extend(std::iter::repeat(Command::filler()).take(fillers));
        let results: Vec<u16> = all.iter().map(|c| predict(c.a, c.b, c.op)).collect();

        let verdict = check(&all, &results, fillers).unwrap();
        let expected: std::collections::BTreeSet<Operation> = real.iter().map(|c| c.op).collect();
        prop_assert_eq!(verdict.coverage, expected);
        prop_assert_eq!(verdict.comparisons.len(), all.len());
    }
}
