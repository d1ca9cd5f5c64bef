//! Tests of the reversibility discipline: running constructs forwards
//! and then backwards (via uncall) must restore the original state,
//! and the guards that protect this property must fire when it is
//! about to be broken.

use std::path::Path;

use pretty_assertions::assert_eq;
use railway::{ErrorKind, Module, RailwayError};

fn run(source: &str) -> (Result<(), RailwayError>, String) {
    let module = Module::from_source(source, "test", Path::new(".")).expect("program should compile");
    module.run_collecting_output(vec![])
}

fn run_ok(source: &str) -> String {
    let (result, output) = run(source);
    if let Err(err) = result {
        panic!("program failed: {err}\noutput so far: {output:?}");
    }
    output
}

fn run_err(source: &str) -> ErrorKind {
    let (result, _) = run(source);
    result.expect_err("program should fail").kind
}

#[test]
fn if_statement_reverses_through_its_exit_assertion() {
    // With x = 3, the branch takes x to 4; uncalling restores 3.
    let output = run_ok(
        "func step()(x)\n\
         \tif (x > 0)\n\
         \t\tx += 1\n\
         \telse\n\
         \t\tx -= 1\n\
         \tfi (x > 1)\n\
         return (x)\n\
         func main(argv)()\n\
         \tlet x = 3\n\
         \t(x) => call step() => (x)\n\
         \tprintln(x)\n\
         \t(x) => uncall step() => (x)\n\
         \tprintln(x)\n\
         \tunlet x = 3\n\
         return ()\n",
    );
    assert_eq!(output, "4\n3\n");
}

#[test]
fn failed_exit_assertion_is_fatal() {
    // The branch moves x from 1 to 0, so the exit expression no longer
    // agrees with the entry decision.
    let source = "func main(argv)()\n\
                  \tlet x = 1\n\
                  \tif (x > 0)\n\
                  \t\tx -= 1\n\
                  \tfi (x > 0)\n\
                  \tunlet x = 0\n\
                  return ()\n";
    assert_eq!(run_err(source), ErrorKind::FailedAssertion);
}

#[test]
fn loop_counts_up_and_uncounts_back() {
    let output = run_ok(
        "func count(n)(i)\n\
         \tloop (i < n)\n\
         \t\ti += 1\n\
         \tpool (i > 0)\n\
         return (i)\n\
         func main(argv)()\n\
         \tlet n = 3\n\
         \tlet i = 0\n\
         \t(i) => call count(n) => (i)\n\
         \tprintln(i)\n\
         \t(i) => uncall count(n) => (i)\n\
         \tprintln(i)\n\
         \tunlet i = 0\n\
         \tunlet n = 3\n\
         return ()\n",
    );
    assert_eq!(output, "3\n0\n");
}

#[test]
fn loop_reverse_condition_true_at_entry_is_fatal() {
    let source = "func main(argv)()\n\
                  \tlet i = 1\n\
                  \tloop (i < 3)\n\
                  \t\ti += 1\n\
                  \tpool (i > 0)\n\
                  \tunlet i = 3\n\
                  return ()\n";
    assert_eq!(run_err(source), ErrorKind::FailedAssertion);
}

#[test]
fn for_over_a_range_sums_and_unsums() {
    let output = run_ok(
        "func accumulate()(sum)\n\
         \tfor (v in [0 to 4])\n\
         \t\tsum += v\n\
         \trof\n\
         return (sum)\n\
         func main(argv)()\n\
         \tlet sum = 0\n\
         \t(sum) => call accumulate() => (sum)\n\
         \tprintln(sum)\n\
         \t(sum) => uncall accumulate() => (sum)\n\
         \tprintln(sum)\n\
         \tunlet sum = 0\n\
         return ()\n",
    );
    assert_eq!(output, "6\n0\n");
}

#[test]
fn for_loop_variable_must_round_trip() {
    // The body leaves v changed, so reversal could not rederive it.
    let source = "func main(argv)()\n\
                  \tlet sum = 0\n\
                  \tfor (v in [1, 2])\n\
                  \t\tv += 1\n\
                  \trof\n\
                  \tunlet sum = 0\n\
                  return ()\n";
    assert_eq!(run_err(source), ErrorKind::FailedAssertion);
}

#[test]
fn for_loop_variable_may_be_scratched_if_restored() {
    run_ok(
        "func main(argv)()\n\
         \tlet sum = 0\n\
         \tfor (v in [1, 2, 3])\n\
         \t\tv += 10\n\
         \t\tsum += v\n\
         \t\tsum -= 10\n\
         \t\tv -= 10\n\
         \trof\n\
         \tunlet sum = 6\n\
         return ()\n",
    );
}

#[test]
fn do_yield_undo_hides_scratch_work() {
    let output = run_ok(
        "func main(argv)()\n\
         \tlet x = 3\n\
         \tdo\n\
         \t\tlet sq = x * x\n\
         \tyield\n\
         \t\tlet y = sq + 1\n\
         \tundo\n\
         \tprintln(x, y)\n\
         \tunlet y = 10\n\
         \tunlet x = 3\n\
         return ()\n",
    );
    assert_eq!(output, "3 10\n");
}

#[test]
fn do_yield_undo_reverses_cleanly_inside_an_uncall() {
    let output = run_ok(
        "func wrap()(x, y)\n\
         \tdo\n\
         \t\tlet t = x * 2\n\
         \tyield\n\
         \t\ty += t\n\
         \tundo\n\
         return (x, y)\n\
         func main(argv)()\n\
         \tlet x = 5\n\
         \tlet y = 1\n\
         \t(x, y) => call wrap() => (x, y)\n\
         \tprintln(y)\n\
         \t(x, y) => uncall wrap() => (x, y)\n\
         \tprintln(y)\n\
         \tunlet y = 1\n\
         \tunlet x = 5\n\
         return ()\n",
    );
    assert_eq!(output, "11\n1\n");
}

#[test]
fn unconsumed_mono_blocks_the_undo_flip() {
    let source = "func main(argv)()\n\
                  \tlet x = 1\n\
                  \tdo\n\
                  \t\tlet .t = 5\n\
                  \tyield\n\
                  \tundo\n\
                  \tunlet x = 1\n\
                  return ()\n";
    assert_eq!(run_err(source), ErrorKind::DirectionChange);
}

#[test]
fn try_accepts_the_first_uncaught_element() {
    let output = run_ok(
        "func main(argv)()\n\
         \tlet threshold = 2\n\
         \ttry (v in [0 to 5])\n\
         \t\tcatch (v < threshold)\n\
         \tyrt\n\
         \tprintln(v)\n\
         \tunlet v = 2\n\
         \tunlet threshold = 2\n\
         return ()\n",
    );
    assert_eq!(output, "2\n");
}

#[test]
fn try_rolls_back_partial_attempts() {
    // Each rejected attempt increments and must be undone before the
    // next element is tried; only the accepted attempt's effect stays.
    let output = run_ok(
        "func main(argv)()\n\
         \tlet probes = 0\n\
         \ttry (v in [0 to 4])\n\
         \t\tprobes += 1\n\
         \t\tcatch (v < 2)\n\
         \tyrt\n\
         \tprintln(probes, v)\n\
         \tprobes -= 1\n\
         \tunlet probes = 0\n\
         \tunlet v = 2\n\
         return ()\n",
    );
    assert_eq!(output, "1 2\n");
}

#[test]
fn try_exhaustion_is_fatal() {
    let source = "func main(argv)()\n\
                  \ttry (v in [0 to 3])\n\
                  \t\tcatch (1)\n\
                  \tyrt\n\
                  return ()\n";
    assert_eq!(run_err(source), ErrorKind::ExhaustedTry);
}

#[test]
fn try_reverses_by_replaying_the_iterator() {
    let output = run_ok(
        "func pick()(threshold)\n\
         \ttry (v in [0 to 5])\n\
         \t\tcatch (v < threshold)\n\
         \tyrt\n\
         return (threshold, v)\n\
         func main(argv)()\n\
         \tlet t = 2\n\
         \t(t) => call pick() => (t, v)\n\
         \tprintln(v)\n\
         \t(t, v) => uncall pick() => (t)\n\
         \tunlet t = 2\n\
         return ()\n",
    );
    assert_eq!(output, "2\n");
}

#[test]
fn reversed_try_rejects_a_wrong_exit_value() {
    // 9 is not what the forward pass would have accepted.
    let source = "func pick()(threshold)\n\
                  \ttry (v in [0 to 5])\n\
                  \t\tcatch (v < threshold)\n\
                  \tyrt\n\
                  return (threshold, v)\n\
                  func main(argv)()\n\
                  \tlet t = 2\n\
                  \tlet v = 9\n\
                  \t(t, v) => uncall pick() => (t)\n\
                  \tunlet t = 2\n\
                  return ()\n";
    assert_eq!(run_err(source), ErrorKind::TryReverseError);
}

#[test]
fn reversed_try_rejects_an_exit_value_that_now_catches() {
    let source = "func pick()(threshold)\n\
                  \ttry (v in [0 to 5])\n\
                  \t\tcatch (v < threshold)\n\
                  \tyrt\n\
                  return (threshold, v)\n\
                  func main(argv)()\n\
                  \tlet t = 2\n\
                  \tlet v = 1\n\
                  \t(t, v) => uncall pick() => (t)\n\
                  \tunlet t = 2\n\
                  return ()\n";
    assert_eq!(run_err(source), ErrorKind::TryReverseError);
}

#[test]
fn mono_statements_do_not_run_in_reverse() {
    // The mono accumulator only exists on the forward pass; uncalling
    // the function must not touch it (or fail for its absence).
    let output = run_ok(
        "func observe(log)(x)\n\
         \tlet .seen = x\n\
         \tlog += 0\n\
         return (x)\n\
         func main(argv)()\n\
         \tlet log = 0\n\
         \tlet x = 4\n\
         \t(x) => call observe(log) => (x)\n\
         \t(x) => uncall observe(log) => (x)\n\
         \tprintln(x)\n\
         \tunlet x = 4\n\
         \tunlet log = 0\n\
         return ()\n",
    );
    assert_eq!(output, "4\n");
}
