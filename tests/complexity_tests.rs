// Integration tests for the complexity estimator

use steptrace::estimate_complexity;

#[test]
fn straight_line_code_is_constant() {
    let source = r#"
x = 1
y = x + 2
z = y * 3
"#;
    assert_eq!(estimate_complexity(source), "O(1)");
}

#[test]
fn one_loop_is_linear() {
    let source = r#"
total = 0
for i in range(10):
    total = total + i
"#;
    assert_eq!(estimate_complexity(source), "O(n)");
}

#[test]
fn two_nested_loops_are_quadratic() {
    let source = r#"
for i in range(10):
    for j in range(10):
        x = i * j
"#;
    assert_eq!(estimate_complexity(source), "O(n^2)");
}

#[test]
fn loop_plus_halving_is_linearithmic() {
    let source = r#"
n = 64
while n > 1:
    n = n // 2
"#;
    assert_eq!(estimate_complexity(source), "O(n log n)");
}

#[test]
fn halving_without_a_loop_is_logarithmic() {
    let source = r#"
n = 64
n = n // 2
"#;
    assert_eq!(estimate_complexity(source), "O(log n)");
}

#[test]
fn recursive_function_with_loop_is_linearithmic() {
    let source = r#"
def walk(arr):
    if len(arr) <= 1:
        return arr
    total = 0
    for x in arr:
        total = total + x
    return walk(arr)
"#;
    assert_eq!(estimate_complexity(source), "O(n log n)");
}

#[test]
fn recursive_tree_descent_is_logarithmic() {
    let source = r#"
def find(node, key):
    if key < node.val:
        return find(node.left, key)
    return find(node.right, key)
"#;
    assert_eq!(estimate_complexity(source), "O(log n)");
}

#[test]
fn plain_recursion_is_linear() {
    let source = r#"
def countdown(n):
    if n == 0:
        return 0
    return countdown(n - 1)
"#;
    assert_eq!(estimate_complexity(source), "O(n)");
}

#[test]
fn merge_sort_shape_is_linearithmic() {
    // Recursion plus slicing: the halving heuristic decides
    let source = r#"
def merge_sort(arr):
    if len(arr) <= 1:
        return arr
    mid = len(arr) // 2
    left = merge_sort(arr[:mid])
    right = merge_sort(arr[mid:])
    return left + right
"#;
    assert_eq!(estimate_complexity(source), "O(n log n)");
}

#[test]
fn invalid_source_is_unknown_without_panicking() {
    assert_eq!(estimate_complexity("def broken(:\n"), "unknown");
    assert_eq!(estimate_complexity("if x\n    y = 1\n"), "unknown");
    assert_eq!(estimate_complexity(""), "O(1)");
}

#[test]
fn estimator_is_deterministic() {
    let source = r#"
def f(arr):
    return [x * x for x in arr]
"#;
    let first = estimate_complexity(source);
    for _ in 0..10 {
        assert_eq!(estimate_complexity(source), first);
    }
}
