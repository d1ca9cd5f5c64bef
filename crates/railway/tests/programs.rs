//! End-to-end tests of single-function programs: value formatting,
//! arithmetic, data statements, and the runtime error taxonomy.

use std::path::Path;

use pretty_assertions::assert_eq;
use railway::{ErrorKind, MemoryCell, Module, Number, RailwayError};

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
fn printing_numbers_and_arrays() {
    let output = run_ok(
        "func main(argv)()\n\
         \tlet x = 5/10\n\
         \tprintln(x)\n\
         \tlet xs = [1, 2/3, [4, 5], []]\n\
         \tprintln(xs)\n\
         \tprintln(\"value:\", x, \"done\")\n\
         \tprint(x)\n\
         \tunlet xs = [1, 2/3, [4, 5], []]\n\
         \tunlet x = 1/2\n\
         return ()\n",
    );
    assert_eq!(output, "1/2\n[1, 2/3, [4, 5], []]\nvalue: 1/2 done\n1/2");
}

#[test]
fn arithmetic_operators() {
    let output = run_ok(
        "func main(argv)()\n\
         \tlet a = 7\n\
         \tlet b = 2\n\
         \tlet xs = [1, 2, 3]\n\
         \tprintln(a / b, a // b, a % b, a ** b, -a, !a, #xs)\n\
         \tprintln(a < b, a >= b, a == 7, a != b, a & b, 0 | b, 1 ^ 1)\n\
         \tunlet xs = [1, 2, 3]\n\
         \tunlet b = 2\n\
         \tunlet a = 7\n\
         return ()\n",
    );
    assert_eq!(output, "7/2 3 1 49 -7 0 3\n0 1 1 1 1 1 0\n");
}

#[test]
fn exact_rational_roots() {
    let output = run_ok(
        "func main(argv)()\n\
         \tprintln(4 ** (1/2), (8/27) ** (2/3), (-8) ** (1/3))\n\
         return ()\n",
    );
    assert_eq!(output, "2 4/9 -2\n");
}

#[test]
fn irrational_power_is_a_value_error() {
    let source = "func main(argv)()\n\
                  \tlet x = 2 ** (1/2)\n\
                  return ()\n";
    assert_eq!(run_err(source), ErrorKind::ValueError);
}

#[test]
fn unlet_value_mismatch() {
    // `let x = 5; unlet x = 6` fails on the unlet.
    let source = "func main(argv)()\n\
                  \tlet x = 5\n\
                  \tunlet x = 6\n\
                  return ()\n";
    assert_eq!(run_err(source), ErrorKind::ValueError);
}

#[test]
fn unlet_shape_mismatch_is_a_type_error() {
    let source = "func main(argv)()\n\
                  \tlet x = [1, 2]\n\
                  \tunlet x = 5\n\
                  return ()\n";
    assert_eq!(run_err(source), ErrorKind::TypeError);
}

#[test]
fn defaulted_let_and_unlet_are_zero() {
    run_ok(
        "func main(argv)()\n\
         \tlet x\n\
         \tunlet x\n\
         return ()\n",
    );
}

#[test]
fn division_by_zero() {
    assert_eq!(
        run_err("func main(argv)()\n\tlet x = 1 / 0\n\treturn ()\n"),
        ErrorKind::ZeroError
    );
    assert_eq!(
        run_err(
            "func main(argv)()\n\
             \tlet x = 3\n\
             \tx /= 0\n\
             return ()\n"
        ),
        ErrorKind::ZeroError
    );
    // Multiplying by zero would be irreversible, so it is also caught.
    assert_eq!(
        run_err(
            "func main(argv)()\n\
             \tlet x = 3\n\
             \tx *= 0\n\
             return ()\n"
        ),
        ErrorKind::ZeroError
    );
}

#[test]
fn out_of_bounds_and_scalar_indexing() {
    assert_eq!(
        run_err(
            "func main(argv)()\n\
             \tlet xs = [1, 2]\n\
             \tlet y = xs[5]\n\
             return ()\n"
        ),
        ErrorKind::IndexError
    );
    assert_eq!(
        run_err(
            "func main(argv)()\n\
             \tlet x = 1\n\
             \tlet y = x[0]\n\
             return ()\n"
        ),
        ErrorKind::IndexError
    );
}

#[test]
fn undefined_variable_and_name_clash() {
    assert_eq!(
        run_err("func main(argv)()\n\ty += 1\n\treturn ()\n"),
        ErrorKind::UndefinedVariable
    );
    assert_eq!(
        run_err(
            "func main(argv)()\n\
             \tlet x = 1\n\
             \tlet x = 2\n\
             return ()\n"
        ),
        ErrorKind::NameClash
    );
}

#[test]
fn leaked_locals_are_fatal() {
    assert_eq!(
        run_err("func main(argv)()\n\tlet x = 5\n\treturn ()\n"),
        ErrorKind::LeakedInformation
    );
}

#[test]
fn swap_exchanges_cells_of_any_shape() {
    run_ok(
        "func main(argv)()\n\
         \tlet xs = [1, [2, 3]]\n\
         \tlet y = 9\n\
         \tswap xs[0] <=> y\n\
         \tunlet y = 1\n\
         \tswap xs[1][0] <=> xs[1][1]\n\
         \tunlet xs = [9, [3, 2]]\n\
         return ()\n",
    );
}

#[test]
fn swap_rejects_negative_indices() {
    assert_eq!(
        run_err(
            "func main(argv)()\n\
             \tlet xs = [1, 2]\n\
             \tlet y = 0\n\
             \tswap xs[0 - 1] <=> y\n\
             return ()\n"
        ),
        ErrorKind::IndexError
    );
}

#[test]
fn push_and_pop_move_ownership() {
    let output = run_ok(
        "func main(argv)()\n\
         \tlet stack = [1, 2]\n\
         \tlet v = 3\n\
         \tpush v => stack\n\
         \tprintln(#stack)\n\
         \tpop stack => w\n\
         \tunlet w = 3\n\
         \tunlet stack = [1, 2]\n\
         return ()\n",
    );
    assert_eq!(output, "3\n");
}

#[test]
fn popping_an_empty_array_is_an_index_error() {
    assert_eq!(
        run_err(
            "func main(argv)()\n\
             \tlet xs = []\n\
             \tpop xs => v\n\
             return ()\n"
        ),
        ErrorKind::IndexError
    );
}

#[test]
fn mono_variables_promote_into_reversible_code() {
    run_ok(
        "func main(argv)()\n\
         \tlet .t = 5\n\
         \t.t **= 2\n\
         \tpromote .t => t\n\
         \tunlet t = 25\n\
         return ()\n",
    );
}

#[test]
fn tensors_and_element_writes() {
    run_ok(
        "func main(argv)()\n\
         \tlet grid = [0 tensor [2, 2]]\n\
         \tgrid[0][1] += 5\n\
         \tunlet grid = [[0, 5], [0, 0]]\n\
         return ()\n",
    );
}

#[test]
fn range_step_of_zero_is_a_value_error() {
    assert_eq!(
        run_err(
            "func main(argv)()\n\
             \tlet xs = [0 to 5 by 0]\n\
             return ()\n"
        ),
        ErrorKind::ValueError
    );
}

#[test]
fn negative_indices_count_from_the_end() {
    let output = run_ok(
        "func main(argv)()\n\
         \tlet xs = [10, 20, 30]\n\
         \tprintln(xs[0 - 1], xs[0 - 3])\n\
         \tunlet xs = [10, 20, 30]\n\
         return ()\n",
    );
    assert_eq!(output, "30 10\n");
}

#[test]
fn argv_is_borrowed_into_main() {
    let module = Module::from_source(
        "func main(argv)()\n\
         \tprintln(#argv, argv[0], argv[1])\n\
         return ()\n",
        "test",
        Path::new("."),
    )
    .unwrap();
    let argv = vec![
        MemoryCell::Num(Number::from_integer(7)),
        MemoryCell::Array(vec![
            MemoryCell::Num(Number::from_integer(1)),
            MemoryCell::Num(Number::from_integer(2)),
        ]),
    ];
    let (result, output) = module.run_collecting_output(argv);
    result.unwrap();
    assert_eq!(output, "2 7 [1, 2]\n");
}

#[test]
fn missing_main_is_an_undefined_function() {
    let module = Module::from_source("func helper()()\nreturn ()\n", "test", Path::new(".")).unwrap();
    let err = module.run_collecting_output(vec![]).0.unwrap_err();
    assert_eq!(err.kind, ErrorKind::UndefinedFunction);
}

#[test]
fn mono_main_is_accepted() {
    let output = run_ok(
        "func .main(argv)()\n\
         \tlet .x = 3\n\
         \tprintln(.x)\n\
         return ()\n",
    );
    assert_eq!(output, "3\n");
}

#[test]
fn globals_initialise_in_order_and_reject_overwrites() {
    let output = run_ok(
        "global base = 10\n\
         global derived = base + 5\n\
         func main(argv)()\n\
         \tprintln(base, derived)\n\
         return ()\n",
    );
    assert_eq!(output, "10 15\n");

    let source = "global x = 1\n\
                  global x = 2\n\
                  func main(argv)()\n\
                  return ()\n";
    assert_eq!(run_err(source), ErrorKind::NameClash);
}

#[test]
fn errors_carry_the_call_stack() {
    let source = "func inner()()\n\
                  \tmissing += 1\n\
                  return ()\n\
                  func outer()()\n\
                  \tcall inner()\n\
                  return ()\n\
                  func main(argv)()\n\
                  \tcall outer()\n\
                  return ()\n";
    let (result, _) = run(source);
    let err = result.unwrap_err();
    assert_eq!(err.kind, ErrorKind::UndefinedVariable);
    let names: Vec<&str> = err.stack.iter().map(|f| f.function.as_str()).collect();
    assert_eq!(names, vec!["inner", "outer", "main"]);
    let rendered = err.to_string();
    assert!(rendered.starts_with("Call Stack:\n-> inner\n-> outer\n-> main\n"));
    assert!(rendered.contains("Runtime Error of type undefined-variable:"));
}
