//! Resolved dependency trees and install ordering

use super::bundle::Package;
use std::fmt;

/// A package together with the subtrees of its resolved dependencies
#[derive(Debug, Clone)]
pub struct PackageTree {
    pub value: Package,
    pub children: Vec<PackageTree>,
}

impl PackageTree {
    pub fn new(value: Package, children: Vec<PackageTree>) -> Self {
        PackageTree { value, children }
    }

    pub fn leaf(value: Package) -> Self {
        PackageTree {
            value,
            children: Vec::new(),
        }
    }

    /// Post-order listing: every child subtree before its parent
    pub fn topological_sort(&self) -> Vec<&Package> {
        let mut result = Vec::new();
        self.visit_post_order(&mut result);
        result
    }

    fn visit_post_order<'a>(&'a self, result: &mut Vec<&'a Package>) {
        for child in &self.children {
            child.visit_post_order(result);
        }
        result.push(&self.value);
    }

    /// Number of nodes in the tree
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(PackageTree::len).sum::<usize>()
    }

    fn render(&self, out: &mut String, start_prefix: &str, mid_prefix: &str) {
        let label = boxed(&[self.value.name(), self.value.id().as_str()]);
        let mut lines = label.lines();
        if let Some(first) = lines.next() {
            out.push_str(start_prefix);
            out.push_str(first);
            out.push('\n');
        }
        for line in lines {
            out.push_str(mid_prefix);
            out.push_str(line);
            out.push('\n');
        }

        let last = self.children.len().saturating_sub(1);
        for (i, child) in self.children.iter().enumerate() {
            let (child_start, child_mid) = if i == last {
                ("└───", "    ")
            } else {
                ("├───", "│   ")
            };
            child.render(
                out,
                &format!("{}{}", mid_prefix, child_start),
                &format!("{}{}", mid_prefix, child_mid),
            );
        }
    }
}

impl fmt::Display for PackageTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.render(&mut out, "", "");
        f.write_str(&out)
    }
}

/// Install order for a forest: each tree's sort, concatenated in forest order
///
/// A package reachable along several paths appears once per path.
pub fn topological_order(forest: &[PackageTree]) -> Vec<&Package> {
    forest.iter().flat_map(PackageTree::topological_sort).collect()
}

/// Draw right-aligned lines inside a box
fn boxed(lines: &[&str]) -> String {
    let width = lines.iter().map(|line| line.chars().count()).max().unwrap_or(0);
    let rule = "─".repeat(width + 2);

    let mut out = format!("┌{}┐\n", rule);
    for line in lines {
        out.push_str(&format!("│ {:>width$} │\n", line, width = width));
    }
    out.push_str(&format!("└{}┘\n", rule));
    out
}
