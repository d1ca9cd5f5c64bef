//! Tests of parallel calls: input splitting, result collection,
//! thread-index expressions, barriers, direction-aware mutexes, and
//! failure propagation across workers.

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

fn run_err(source: &str) -> RailwayError {
    let (result, _) = run(source);
    result.expect_err("program should fail")
}

#[test]
fn thread_expressions_are_sentinels_outside_parallel() {
    let output = run_ok(
        "func main(argv)()\n\
         \tprintln(TID, #TID)\n\
         return ()\n",
    );
    assert_eq!(output, "-1 -1\n");
}

#[test]
fn stolen_inputs_split_across_threads() {
    // Four threads each sum their own slice of xs.
    let output = run_ok(
        "func sumslice()(xs)\n\
         \tlet s = 0\n\
         \tfor (v in xs)\n\
         \t\ts += v\n\
         \trof\n\
         return (s, xs)\n\
         func main(argv)()\n\
         \tlet xs = [[1, 2], [3, 4], [5, 6], [7, 8]]\n\
         \t(xs) => call sumslice{4}() => (sums, xs)\n\
         \tprintln(sums)\n\
         \tunlet xs = [[1, 2], [3, 4], [5, 6], [7, 8]]\n\
         \tunlet sums = [3, 7, 11, 15]\n\
         return ()\n",
    );
    assert_eq!(output, "[3, 7, 11, 15]\n");
}

#[test]
fn thread_index_and_count_inside_workers() {
    run_ok(
        "func ids()(x)\n\
         \tx += TID * 10 + #TID\n\
         return (x)\n\
         func main(argv)()\n\
         \tlet xs = [0, 0, 0]\n\
         \t(xs) => call ids{3}() => (ys)\n\
         \tunlet ys = [3, 13, 23]\n\
         return ()\n",
    );
}

#[test]
fn split_requires_arrays_of_thread_count_length() {
    let source = "func noop()(x)\n\
                  return (x)\n\
                  func main(argv)()\n\
                  \tlet xs = [1, 2]\n\
                  \t(xs) => call noop{3}() => (ys)\n\
                  return ()\n";
    assert_eq!(run_err(source).kind, ErrorKind::ValueError);
}

#[test]
fn thread_counts_must_be_positive() {
    let source = "func noop()()\n\
                  return ()\n\
                  func main(argv)()\n\
                  \tcall noop{0}()\n\
                  return ()\n";
    assert_eq!(run_err(source).kind, ErrorKind::ValueError);
}

#[test]
fn barriers_order_phases_across_threads() {
    // Every thread fills its own slot, then reads its neighbour's; the
    // barrier guarantees the neighbour's write has landed.
    run_ok(
        "func stage(data)()\n\
         \tdata[TID] += TID\n\
         \tbarrier \"sync\"\n\
         \tlet neighbour = data[(TID + 1) % #TID]\n\
         \tunlet neighbour = (TID + 1) % #TID\n\
         return ()\n\
         func main(argv)()\n\
         \tlet data = [0, 0, 0]\n\
         \tcall stage{3}(data)\n\
         \tunlet data = [0, 1, 2]\n\
         return ()\n",
    );
}

#[test]
fn mutexes_serialise_in_ring_order() {
    // The shared clock makes the hand-off order observable: thread i
    // always sees the clock at i regardless of arrival order.
    run_ok(
        "global clock\n\
         func record(order)()\n\
         \tmutex \"m\"\n\
         \t\torder[TID] += clock\n\
         \t\tclock += 1\n\
         \txetum\n\
         return ()\n\
         func main(argv)()\n\
         \tlet order = [0, 0, 0]\n\
         \tcall record{3}(order)\n\
         \tunlet order = [0, 1, 2]\n\
         return ()\n",
    );
}

#[test]
fn mutex_counter_flow_is_fatal() {
    // One thread holds the mutex forwards, the other arrives running
    // backwards via the uncall; the latecomer must fail.
    let source = "global counter\n\
                  func hold()()\n\
                  \tmutex \"m\"\n\
                  \t\tcounter += 1\n\
                  \t\tcounter -= 1\n\
                  \txetum\n\
                  return ()\n\
                  func clash()()\n\
                  \tif (TID == 0)\n\
                  \t\tcall hold()\n\
                  \telse\n\
                  \t\tuncall hold()\n\
                  \tfi (TID == 0)\n\
                  return ()\n\
                  func main(argv)()\n\
                  \tcall clash{2}()\n\
                  return ()\n";
    assert_eq!(run_err(source).kind, ErrorKind::MutexError);
}

#[test]
fn worker_failures_wake_blocked_peers() {
    // Thread 0 divides by zero while the rest wait on a barrier that
    // can never complete; the original error must win over the
    // sympathetic aborts.
    let source = "func crash()(x)\n\
                  \tif (TID == 0)\n\
                  \t\tx /= 0\n\
                  \telse\n\
                  \t\tbarrier \"sync\"\n\
                  \tfi (TID == 0)\n\
                  return (x)\n\
                  func main(argv)()\n\
                  \tlet xs = [1, 2, 3]\n\
                  \t(xs) => call crash{3}() => (ys)\n\
                  return ()\n";
    let err = run_err(source);
    assert_eq!(err.kind, ErrorKind::ZeroError);
    // The failing frame records its thread index.
    assert_eq!(err.stack[0].thread, Some(0));
}

#[test]
fn mutexes_and_barriers_are_inert_outside_parallel_calls() {
    run_ok(
        "func main(argv)()\n\
         \tlet x = 0\n\
         \tbarrier \"solo\"\n\
         \tmutex \"m\"\n\
         \t\tx += 1\n\
         \txetum\n\
         \tunlet x = 1\n\
         return ()\n",
    );
}

#[test]
fn uncalling_a_parallel_call_restores_the_inputs() {
    run_ok(
        "func scale()(x)\n\
         \tx *= 2\n\
         return (x)\n\
         func main(argv)()\n\
         \tlet xs = [1, 2, 3]\n\
         \t(xs) => call scale{3}() => (ys)\n\
         \tunlet ys = [2, 4, 6]\n\
         \tlet zs = [2, 4, 6]\n\
         \t(zs) => uncall scale{3}() => (ws)\n\
         \tunlet ws = [1, 2, 3]\n\
         return ()\n",
    );
}
