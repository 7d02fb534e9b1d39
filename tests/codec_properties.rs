//! Property tests for the package codec and install ordering

use apm::package::*;
use quickcheck::TestResult;
use quickcheck_macros::quickcheck;

/// Distinct ids derived from arbitrary seeds, one dependency per seed
fn deps_from_seeds(seeds: &[Vec<u8>]) -> Option<Vec<(String, PackageId)>> {
    let mut entries = Vec::new();
    for (i, seed) in seeds.iter().enumerate() {
        let id = content_address(seed);
        if entries.iter().any(|(_, existing)| existing == &id) {
            return None;
        }
        entries.push((format!("dep{}", i), id));
    }
    Some(entries)
}

fn build(entries: &[(String, PackageId)]) -> DirectDeps {
    let mut deps = DirectDeps::new();
    for (name, id) in entries {
        deps.insert(name.clone(), id.clone()).unwrap();
    }
    deps
}

#[quickcheck]
fn prop_round_trip(name: String, seeds: Vec<Vec<u8>>, payload: Vec<u8>) -> TestResult {
    let entries = match deps_from_seeds(&seeds) {
        Some(entries) => entries,
        None => return TestResult::discard(),
    };
    let deps = build(&entries);

    let bytes = encode(&name, &deps, &payload).unwrap();
    let decoded = decode(&bytes).unwrap();

    TestResult::from_bool(
        decoded.name == name
            && decoded.deps == deps
            && decoded.payload == payload.as_slice()
            && decoded.archive_offset + payload.len() == bytes.len(),
    )
}

#[quickcheck]
fn prop_insertion_order_does_not_matter(seeds: Vec<Vec<u8>>, payload: Vec<u8>) -> TestResult {
    let entries = match deps_from_seeds(&seeds) {
        Some(entries) => entries,
        None => return TestResult::discard(),
    };
    let mut reversed = entries.clone();
    reversed.reverse();

    let forward = encode("pkg", &build(&entries), &payload).unwrap();
    let backward = encode("pkg", &build(&reversed), &payload).unwrap();
    TestResult::from_bool(forward == backward && content_address(&forward) == content_address(&backward))
}

#[quickcheck]
fn prop_truncation_never_panics(name: String, payload: Vec<u8>, cut: usize) -> bool {
    let bytes = encode(&name, &DirectDeps::new(), &payload).unwrap();
    let header_len = bytes.len() - payload.len();
    let cut = cut % (bytes.len() + 1);

    match decode(&bytes[..cut]) {
        Ok(decoded) => cut >= header_len && decoded.payload == &payload[..cut - header_len],
        Err(_) => cut < header_len,
    }
}

#[quickcheck]
fn prop_decode_arbitrary_bytes_never_panics(bytes: Vec<u8>) -> bool {
    let _ = decode(&bytes);
    true
}

#[quickcheck]
fn prop_children_precede_parents(shape: Vec<u8>) -> bool {
    // Node i + 1 hangs under node shape[i] % (i + 1), so every prefix is a tree.
    let count = shape.len().min(40) + 1;
    let mut parents = vec![None; count];
    for (i, byte) in shape.iter().take(count - 1).enumerate() {
        parents[i + 1] = Some(*byte as usize % (i + 1));
    }

    fn build_tree(node: usize, parents: &[Option<usize>]) -> PackageTree {
        let children = (0..parents.len())
            .filter(|&child| parents[child] == Some(node))
            .map(|child| build_tree(child, parents))
            .collect();
        let value = Package::create(&format!("p{}", node), DirectDeps::new(), &[]).unwrap();
        PackageTree::new(value, children)
    }

    let tree = build_tree(0, &parents);
    let order: Vec<usize> = tree
        .topological_sort()
        .iter()
        .map(|p| p.name()[1..].parse().unwrap())
        .collect();

    let position = |node: usize| order.iter().position(|&n| n == node).unwrap();
    order.len() == count
        && (1..count).all(|node| match parents[node] {
            Some(parent) => position(node) < position(parent),
            None => false,
        })
}
