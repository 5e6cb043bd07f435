/*
 * Copyright Stalwart Labs Ltd. See the COPYING
 * file at the top-level directory of this distribution.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

//! Message threading based on the JWZ algorithm.
//!
//! Containers live in an arena and refer to each other through
//! [`ContainerId`] handles; loop checks walk the parent handles iteratively.

use std::collections::HashMap;

use crate::Part;

/// A message that can be placed in a thread.
pub trait Threadable {
    /// The `Message-Id` of the message, without angle brackets.
    fn thread_message_id(&self) -> Option<String>;

    /// The ids of the ancestors of the message, oldest first.
    fn thread_references(&self) -> Vec<String>;
}

impl Threadable for Part<'_> {
    fn thread_message_id(&self) -> Option<String> {
        self.message_id().ok().flatten()
    }

    fn thread_references(&self) -> Vec<String> {
        self.references().unwrap_or_default()
    }
}

impl<T: Threadable> Threadable for &T {
    fn thread_message_id(&self) -> Option<String> {
        (*self).thread_message_id()
    }

    fn thread_references(&self) -> Vec<String> {
        (*self).thread_references()
    }
}

/// Handle of a container in a [`ThreadTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(usize);

/// A node of a thread: a message, or a placeholder for a referenced message
/// that was not supplied.
#[derive(Debug, Clone)]
pub struct ThreadContainer<M> {
    pub message: Option<M>,
    pub message_id: String,
    pub parent: Option<ContainerId>,
    pub children: Vec<ContainerId>,
}

impl<M> ThreadContainer<M> {
    pub fn is_empty(&self) -> bool {
        self.message.is_none()
    }
}

/// The threads built from a set of messages.
#[derive(Debug, Clone)]
pub struct ThreadTree<M> {
    containers: Vec<ThreadContainer<M>>,
    roots: Vec<ContainerId>,
    id_table: HashMap<String, ContainerId>,
}

impl<M> ThreadTree<M> {
    /// Top level containers, in the order their ids were first seen.
    pub fn roots(&self) -> &[ContainerId] {
        &self.roots
    }

    pub fn get(&self, id: ContainerId) -> Option<&ThreadContainer<M>> {
        self.containers.get(id.0)
    }

    pub fn children(&self, id: ContainerId) -> &[ContainerId] {
        self.get(id).map_or(&[], |container| container.children.as_slice())
    }

    pub fn parent(&self, id: ContainerId) -> Option<ContainerId> {
        self.get(id).and_then(|container| container.parent)
    }

    /// Looks up the container of a message id.
    pub fn find(&self, message_id: &str) -> Option<ContainerId> {
        self.id_table.get(message_id).copied()
    }

    /// Depth-first traversal of every thread, yielding the depth of each
    /// container.
    pub fn walk(&self) -> impl Iterator<Item = (usize, ContainerId)> + '_ {
        let mut stack = self
            .roots
            .iter()
            .rev()
            .map(|id| (0, *id))
            .collect::<Vec<_>>();

        std::iter::from_fn(move || {
            let (depth, id) = stack.pop()?;
            stack.extend(self.children(id).iter().rev().map(|child| (depth + 1, *child)));
            Some((depth, id))
        })
    }

    /// Number of messages placed in the threads.
    pub fn num_messages(&self) -> usize {
        self.walk()
            .filter(|(_, id)| self.containers[id.0].message.is_some())
            .count()
    }

    fn container(&mut self, message_id: &str) -> ContainerId {
        if let Some(id) = self.id_table.get(message_id) {
            return *id;
        }
        let id = ContainerId(self.containers.len());
        self.containers.push(ThreadContainer {
            message: None,
            message_id: message_id.to_string(),
            parent: None,
            children: Vec::new(),
        });
        self.id_table.insert(message_id.to_string(), id);
        id
    }

    fn synthetic_id(&self) -> String {
        let mut seq = self.containers.len();
        loop {
            let id = format!("synthetic.{seq}@thread");
            if !self.id_table.contains_key(&id) {
                return id;
            }
            seq += 1;
        }
    }

    /// Returns `true` when `child` is `parent` or one of its ancestors.
    fn would_loop(&self, parent: ContainerId, child: ContainerId) -> bool {
        let mut current = Some(parent);
        while let Some(id) = current {
            if id == child {
                return true;
            }
            current = self.containers[id.0].parent;
        }
        false
    }

    fn unlink(&mut self, child: ContainerId) {
        if let Some(parent) = self.containers[child.0].parent.take() {
            self.containers[parent.0].children.retain(|id| *id != child);
        }
    }

    fn link(&mut self, parent: ContainerId, child: ContainerId) {
        self.unlink(child);
        self.containers[child.0].parent = Some(parent);
        self.containers[parent.0].children.push(child);
    }

    fn add(&mut self, message: M, message_id: Option<String>, references: Vec<String>) {
        let message_id = match message_id {
            Some(id) if !self.find(&id).is_some_and(|id| !self.containers[id.0].is_empty()) => id,
            _ => self.synthetic_id(),
        };
        let this = self.container(&message_id);
        self.containers[this.0].message = Some(message);

        let mut previous: Option<ContainerId> = None;
        for reference in references.iter().filter(|id| **id != message_id) {
            let current = self.container(reference);
            if let Some(previous) = previous {
                if self.containers[current.0].parent.is_none()
                    && !self.would_loop(previous, current)
                {
                    self.link(previous, current);
                }
            }
            previous = Some(current);
        }

        match previous {
            Some(parent) if !self.would_loop(parent, this) => self.link(parent, this),
            Some(_) => (),
            None => self.unlink(this),
        }
    }

    fn prune_frame(&mut self, id: ContainerId, parent_is_empty: bool) -> PruneFrame {
        PruneFrame {
            id,
            is_empty: self.containers[id.0].is_empty(),
            parent_is_empty,
            pending: std::mem::take(&mut self.containers[id.0].children).into_iter(),
            pruned: Vec::new(),
        }
    }

    /// Prunes the subtree of `root` and returns what replaces it among its
    /// siblings. Children are visited through an explicit stack.
    fn prune(&mut self, root: ContainerId) -> Vec<ContainerId> {
        let mut stack = vec![self.prune_frame(root, false)];

        while let Some(frame) = stack.last_mut() {
            if let Some(child) = frame.pending.next() {
                let is_empty = frame.is_empty;
                let child = self.prune_frame(child, is_empty);
                stack.push(child);
                continue;
            }

            let Some(frame) = stack.pop() else {
                break;
            };
            for child in &frame.pruned {
                self.containers[child.0].parent = Some(frame.id);
            }
            let replacement = if frame.is_empty && (frame.pruned.is_empty() || frame.parent_is_empty)
            {
                self.containers[frame.id.0].parent = None;
                frame.pruned
            } else {
                self.containers[frame.id.0].children = frame.pruned;
                vec![frame.id]
            };

            match stack.last_mut() {
                Some(parent) => parent.pruned.extend(replacement),
                None => return replacement,
            }
        }

        Vec::new()
    }

    fn prune_roots(&mut self) {
        let candidates = (0..self.containers.len())
            .map(ContainerId)
            .filter(|id| self.containers[id.0].parent.is_none())
            .collect::<Vec<_>>();

        let mut roots = Vec::with_capacity(candidates.len());
        for id in candidates {
            for root in self.prune(id) {
                let container = &self.containers[root.0];
                if container.is_empty() && container.children.len() == 1 {
                    let child = container.children[0];
                    self.containers[root.0].children.clear();
                    self.containers[child.0].parent = None;
                    roots.push(child);
                } else {
                    self.containers[root.0].parent = None;
                    roots.push(root);
                }
            }
        }

        self.roots = roots;
    }
}

struct PruneFrame {
    id: ContainerId,
    is_empty: bool,
    parent_is_empty: bool,
    pending: std::vec::IntoIter<ContainerId>,
    pruned: Vec<ContainerId>,
}

/// Groups `messages` into threads.
///
/// Messages without a `Message-Id`, or repeating one already used, get a
/// synthetic id. References are chained parent to child without
/// re-parenting containers that were already linked or creating loops, and
/// each message is placed under its last reference. Placeholders left without
/// children are dropped, an empty root with one child is replaced by that
/// child and nested placeholders are collapsed into their parent.
pub fn build_thread<M: Threadable>(messages: impl IntoIterator<Item = M>) -> ThreadTree<M> {
    let mut tree = ThreadTree {
        containers: Vec::new(),
        roots: Vec::new(),
        id_table: HashMap::new(),
    };

    for message in messages {
        let message_id = message.thread_message_id();
        let references = message.thread_references();
        tree.add(message, message_id, references);
    }
    tree.prune_roots();

    tree
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::from_bytes;

    use super::{build_thread, ContainerId, ThreadContainer, ThreadTree, Threadable};

    #[derive(Debug, PartialEq)]
    struct Msg(Option<&'static str>, &'static [&'static str]);

    impl Threadable for Msg {
        fn thread_message_id(&self) -> Option<String> {
            self.0.map(str::to_string)
        }

        fn thread_references(&self) -> Vec<String> {
            self.1.iter().map(|id| id.to_string()).collect()
        }
    }

    fn layout<M>(tree: &ThreadTree<M>) -> Vec<String> {
        tree.walk()
            .map(|(depth, id)| {
                let container = tree.get(id).unwrap();
                format!(
                    "{}{}{}",
                    " ".repeat(depth),
                    container.message_id,
                    if container.is_empty() { "*" } else { "" }
                )
            })
            .collect()
    }

    #[test]
    fn thread_layouts() {
        let inputs: [(&[Msg], &[&str]); 6] = [
            (
                &[
                    Msg(Some("a"), &[]),
                    Msg(Some("b"), &["a"]),
                    Msg(Some("d"), &["a", "b", "c"]),
                ],
                &["a", " b", "  c*", "   d"],
            ),
            (
                &[Msg(Some("b"), &["a"]), Msg(Some("c"), &["a"])],
                &["a*", " b", " c"],
            ),
            (&[Msg(Some("b"), &["a"])], &["b"]),
            (
                &[Msg(Some("c"), &["x", "y", "a"]), Msg(Some("d"), &["x", "y", "b"])],
                &["x*", " c", " d"],
            ),
            (
                &[Msg(Some("a"), &["b"]), Msg(Some("b"), &["a"])],
                &["b", " a"],
            ),
            (
                &[Msg(Some("a"), &[]), Msg(Some("a"), &[]), Msg(None, &["a"])],
                &["a", " synthetic.2@thread", "synthetic.1@thread"],
            ),
        ];

        for (messages, expected) in inputs {
            let tree = build_thread(messages);
            assert_eq!(layout(&tree), expected, "Failed for {messages:?}");
        }
    }

    #[test]
    fn thread_gap() {
        let tree = build_thread([
            Msg(Some("a"), &[]),
            Msg(Some("b"), &["a"]),
            Msg(Some("d"), &["a", "b", "c"]),
        ]);

        assert_eq!(layout(&tree), ["a", " b", "  c*", "   d"]);
        assert_eq!(tree.roots().len(), 1);
        assert_eq!(tree.num_messages(), 3);

        let gap = tree.find("c").unwrap();
        assert!(tree.get(gap).unwrap().is_empty());
        assert_eq!(tree.parent(gap), tree.find("b"));
        assert_eq!(tree.children(gap), [tree.find("d").unwrap()]);
    }

    #[test]
    fn thread_parts() {
        let inputs = [
            "Message-ID: <1@x>\r\nSubject: hi\r\n\r\n",
            "Message-ID: <2@x>\r\nIn-Reply-To: <1@x>\r\n\r\n",
            "Message-ID: <3@x>\r\nReferences: <1@x> <2@x>\r\n\r\n",
        ];
        let messages = inputs
            .iter()
            .map(|input| from_bytes(input.as_bytes()).unwrap())
            .collect::<Vec<_>>();

        let tree = build_thread(&messages);
        assert_eq!(tree.roots(), [tree.find("1@x").unwrap()]);
        assert_eq!(
            tree.walk().map(|(depth, _)| depth).collect::<Vec<_>>(),
            [0, 1, 2]
        );
        let leaf = tree.find("3@x").unwrap();
        assert_eq!(
            tree.get(leaf).unwrap().message.unwrap().subject().unwrap(),
            None
        );
    }

    #[test]
    fn deep_thread() {
        const DEPTH: usize = 100_000;

        // Messages at even depths, placeholders at odd depths.
        let mut tree = ThreadTree {
            containers: (0..DEPTH)
                .map(|n| ThreadContainer {
                    message: (n % 2 == 0).then_some(n),
                    message_id: format!("{n}@example.com"),
                    parent: n.checked_sub(1).map(ContainerId),
                    children: if n + 1 < DEPTH {
                        vec![ContainerId(n + 1)]
                    } else {
                        Vec::new()
                    },
                })
                .collect(),
            roots: Vec::new(),
            id_table: HashMap::new(),
        };
        tree.prune_roots();

        assert_eq!(tree.roots(), [ContainerId(0)]);
        assert_eq!(tree.walk().count(), DEPTH - 1);
        assert_eq!(tree.num_messages(), DEPTH / 2);
        assert_eq!(tree.walk().map(|(depth, _)| depth).max(), Some(DEPTH - 2));
    }
}
