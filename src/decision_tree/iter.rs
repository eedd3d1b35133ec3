use super::TreeNode;

/// Depth-first iterator over the nodes of a decision tree
///
/// Left subtrees are visited before right subtrees. Every node is yielded together with its
/// depth, the number of internal nodes between it and the root.
pub struct NodeIter<'a, F> {
    stack: Vec<(usize, &'a TreeNode<F>)>,
}

impl<'a, F> NodeIter<'a, F> {
    pub fn new(root: &'a TreeNode<F>) -> Self {
        NodeIter {
            stack: vec![(0, root)],
        }
    }
}

impl<'a, F> Iterator for NodeIter<'a, F> {
    type Item = (usize, &'a TreeNode<F>);

    fn next(&mut self) -> Option<Self::Item> {
        self.stack.pop().map(|(depth, node)| {
            if let Some((left, right)) = node.children() {
                self.stack.push((depth + 1, right));
                self.stack.push((depth + 1, left));
            }

            (depth, node)
        })
    }
}
