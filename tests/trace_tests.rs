// End-to-end tests for the tracing pipeline

use serde_json::json;
use steptrace::{trace, TraceError};

#[test]
fn loop_yields_one_frame_per_iteration() {
    let result = trace("for i in range(3):\n    x = i\n").expect("trace failed");

    assert_eq!(result.frames.len(), 3);
    assert_eq!(result.complexity, "O(n)");

    for (frame, expected) in result.frames.iter().zip(0..3) {
        assert_eq!(frame.line_no, 2);
        assert_eq!(frame.prims["i"], json!(expected));
        assert_eq!(frame.prims["x"], json!(expected));
    }
}

#[test]
fn frame_count_follows_execution_not_source() {
    let source = r#"
x = 0
for i in range(2):
    x = x + 1
    y = x
"#;
    let result = trace(source).expect("trace failed");
    // One frame for the top-level assignment, two per iteration
    assert_eq!(result.frames.len(), 5);
}

#[test]
fn only_the_taken_branch_produces_frames() {
    let source = r#"
x = 10
if x > 5:
    big = True
else:
    small = True
"#;
    let result = trace(source).expect("trace failed");
    assert_eq!(result.frames.len(), 2);
    let last = result.frames.last().unwrap();
    assert_eq!(last.prims["big"], json!(true));
    assert!(!last.prims.contains_key("small"));
}

#[test]
fn index_bindings_are_cross_referenced() {
    let source = "arr = [5, 1, 9]\ni = 1\n";
    let result = trace(source).expect("trace failed");

    let last = result.frames.last().unwrap();
    assert_eq!(last.lists["arr"], json!([5, 1, 9]));
    assert_eq!(last.prims["i"], json!(1));
    assert_eq!(last.array_indices["arr"], vec![("i".to_string(), 1)]);
}

#[test]
fn dicts_are_captured_with_string_keys() {
    let source = "counts = {}\ncounts['a'] = 1\ncounts['b'] = counts['a'] + 1\n";
    let result = trace(source).expect("trace failed");

    let last = result.frames.last().unwrap();
    assert_eq!(last.dicts["counts"], json!({"a": 1, "b": 2}));
}

#[test]
fn linked_chain_is_walked_through_next() {
    let source = r#"
class Node:
    def __init__(self, val):
        self.val = val
        self.next = None

head = Node(1)
head.next = Node(2)
head.next.next = Node(3)
"#;
    let result = trace(source).expect("trace failed");
    let last = result.frames.last().unwrap();
    assert_eq!(last.linked["head"], json!([1, 2, 3]));
}

#[test]
fn cyclic_chain_serializes_finitely() {
    let source = r#"
class Node:
    def __init__(self, val):
        self.val = val
        self.next = None

a = Node(1)
b = Node(2)
a.next = b
b.next = a
"#;
    let result = trace(source).expect("trace failed");
    let last = result.frames.last().unwrap();
    // Two distinct node identities before the first repeat
    assert_eq!(last.linked["a"], json!([1, 2]));
    assert_eq!(last.linked["b"], json!([2, 1]));
}

#[test]
fn binary_tree_serializes_every_node() {
    let source = r#"
class Node:
    def __init__(self, val):
        self.val = val
        self.left = None
        self.right = None

root = Node(2)
root.left = Node(1)
root.right = Node(3)
"#;
    let result = trace(source).expect("trace failed");
    let last = result.frames.last().unwrap();
    let tree = &last.trees["root"];

    assert_eq!(tree["val"], json!(2));
    assert_eq!(tree["left"]["val"], json!(1));
    assert_eq!(tree["right"]["val"], json!(3));
    assert_eq!(tree["left"]["left"], serde_json::Value::Null);
    assert_eq!(tree["right"]["right"], serde_json::Value::Null);

    // Identity tokens are unique per node
    let ids = [&tree["id"], &tree["left"]["id"], &tree["right"]["id"]];
    assert_ne!(ids[0], ids[1]);
    assert_ne!(ids[0], ids[2]);
    assert_ne!(ids[1], ids[2]);
}

#[test]
fn merge_sort_traces_to_sorted_array() {
    let source = r#"
def closest_pair_1d(arr):
    def merge_sort(arr):
        if len(arr) <= 1:
            return arr
        mid = len(arr) // 2
        left = merge_sort(arr[:mid])
        right = merge_sort(arr[mid:])
        return merge(left, right)

    def merge(left, right):
        result = []
        i = j = 0
        while i < len(left) and j < len(right):
            if left[i] < right[j]:
                result.append(left[i])
                i += 1
            else:
                result.append(right[j])
                j += 1
        result.extend(left[i:])
        result.extend(right[j:])
        return result

    sorted_arr = merge_sort(arr)
    min_dist = float('inf')
    for i in range(1, len(sorted_arr)):
        min_dist = min(min_dist, abs(sorted_arr[i] - sorted_arr[i-1]))
    return min_dist

arr = [10, 2, 14, 4, 7]
print("closest_pair_1d(arr) =", closest_pair_1d(arr))
"#;
    let result = trace(source).expect("trace failed");

    assert_eq!(result.complexity, "O(n log n)");
    assert!(!result.frames.is_empty());

    // The last frame holding `sorted_arr` shows the fully sorted array
    let sorted_frame = result
        .frames
        .iter()
        .rev()
        .find(|frame| frame.lists.contains_key("sorted_arr"))
        .expect("no frame captured sorted_arr");
    assert_eq!(sorted_frame.lists["sorted_arr"], json!([2, 4, 7, 10, 14]));
}

#[test]
fn bubble_sort_with_tuple_swap() {
    let source = r#"
arr = [3, 1, 2]
n = len(arr)
for i in range(n):
    for j in range(n - i - 1):
        if arr[j] > arr[j + 1]:
            arr[j], arr[j + 1] = arr[j + 1], arr[j]
"#;
    let result = trace(source).expect("trace failed");
    assert_eq!(result.complexity, "O(n^2)");
    let last = result.frames.last().unwrap();
    assert_eq!(last.lists["arr"], json!([1, 2, 3]));
}

#[test]
fn while_else_and_break() {
    let source = r#"
n = 0
while n < 10:
    n += 1
    if n == 3:
        break
else:
    unreachable = 1
after = n
"#;
    let result = trace(source).expect("trace failed");
    let last = result.frames.last().unwrap();
    assert_eq!(last.prims["after"], json!(3));
    assert!(!last.prims.contains_key("unreachable"));
}

#[test]
fn try_except_contains_subject_errors() {
    let source = r#"
outcome = 0
try:
    x = 1 // 0
except ZeroDivisionError:
    outcome = 1
finally:
    done = True
"#;
    let result = trace(source).expect("trace failed");
    let last = result.frames.last().unwrap();
    assert_eq!(last.prims["outcome"], json!(1));
    assert_eq!(last.prims["done"], json!(true));
}

#[test]
fn uncaught_subject_error_fails_the_invocation() {
    let result = trace("x = 1 // 0\n");
    assert!(matches!(result, Err(TraceError::Runtime(_))));
}

#[test]
fn parse_error_fails_trace_but_not_estimate() {
    let source = "def broken(:\n";
    let result = trace(source);
    assert!(matches!(result, Err(TraceError::Parse(_))));
    assert_eq!(steptrace::estimate_complexity(source), "unknown");
}

#[test]
fn deep_recursion_fails_only_the_invocation() {
    let source = r#"
def f(n):
    return f(n + 1)

f(0)
"#;
    let result = trace(source);
    assert!(matches!(result, Err(TraceError::Runtime(_))));

    // The process survives and a fresh invocation is unaffected
    let ok = trace("x = 1\n").expect("fresh trace failed");
    assert_eq!(ok.frames.len(), 1);
}

#[test]
fn runaway_loop_hits_the_step_budget() {
    let result = trace("while True:\n    pass\n");
    assert!(matches!(result, Err(TraceError::Runtime(_))));
}

#[test]
fn list_comprehension_executes() {
    let source = "arr = [1, 2, 3, 4]\nevens = [x * 10 for x in arr if x % 2 == 0]\n";
    let result = trace(source).expect("trace failed");
    let last = result.frames.last().unwrap();
    assert_eq!(last.lists["evens"], json!([20, 40]));
    // The comprehension variable does not leak into the frame
    assert!(!last.prims.contains_key("x"));
}

#[test]
fn nonfinite_floats_survive_serialization() {
    let source = "best = float('inf')\n";
    let result = trace(source).expect("trace failed");
    assert_eq!(result.frames[0].prims["best"], json!("Infinity"));
}

#[test]
fn functions_never_appear_in_frames() {
    let source = r#"
def helper(x):
    return x

y = helper(1)
"#;
    let result = trace(source).expect("trace failed");
    let last = result.frames.last().unwrap();
    assert_eq!(last.prims["y"], json!(1));
    assert!(!last.prims.contains_key("helper"));
    assert!(!last.lists.contains_key("helper"));
}

#[test]
fn concurrent_invocations_are_isolated() {
    let first = std::thread::spawn(|| trace("for i in range(50):\n    a = i\n"));
    let second = std::thread::spawn(|| trace("for i in range(20):\n    b = i * 2\n"));

    let first = first.join().unwrap().expect("first trace failed");
    let second = second.join().unwrap().expect("second trace failed");

    assert_eq!(first.frames.len(), 50);
    assert_eq!(second.frames.len(), 20);
    assert!(first.frames.iter().all(|f| f.prims.contains_key("a")));
    assert!(second.frames.iter().all(|f| f.prims.contains_key("b")));
}

#[test]
fn result_serializes_to_the_wire_contract() {
    let result = trace("arr = [5, 1]\ni = 0\n").expect("trace failed");
    let wire = serde_json::to_value(&result).expect("serialization failed");

    assert!(wire["frames"].is_array());
    assert_eq!(wire["complexity"], json!("O(1)"));

    let frame = &wire["frames"][1];
    for field in ["line_no", "lists", "dicts", "prims", "linked", "trees", "array_indices"] {
        assert!(frame.get(field).is_some(), "missing field {}", field);
    }
    assert_eq!(frame["array_indices"]["arr"], json!([["i", 0]]));
}
