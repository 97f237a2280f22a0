//! Generalized Barnes-Hut tree for approximating pairwise repulsion.
//!
//! A node of a D-dimensional tree has up to 2^D children, but only the
//! occupied ones are stored: each node links to its first child and to its
//! next sibling, and remembers which orthant of its parent it covers as a
//! bit mask. Nodes live in an arena that is reused across rebuilds, and both
//! insertion and force queries run on explicit pooled work lists instead of
//! recursion.

use crate::physics::aabb::{self, Aabb};
use crate::physics::body::Body;
use crate::physics::math::{self, Scalar, Vector};
use crate::resources::SharedRng;
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, Dim, DimName};
use rand::Rng;
use std::collections::VecDeque;
use tracing::debug;

/// Subdivision depth at which a leaf stops splitting. Bodies that would need
/// a deeper tree are treated like coincident bodies and skipped for the
/// current rebuild.
pub const MAX_TREE_DEPTH: usize = 96;

const MAX_NUDGE_ATTEMPTS: usize = 3;
const NO_NODE: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeOptions {
    /// Coupling constant; negative values repel.
    pub gravity: Scalar,
    /// Opening criterion: a cell is aggregated when `width / r < theta`.
    pub theta: Scalar,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            gravity: -12.0,
            theta: 0.8,
        }
    }
}

/// A cell of the tree.
///
/// A leaf references exactly one body and carries no aggregate mass of its
/// own; an internal node has `body == None` and accumulates the mass and the
/// mass-weighted position sum of everything inserted below it.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode<D: Dim>
where
    DefaultAllocator: Allocator<D>,
{
    pub body: Option<usize>,
    pub mass: Scalar,
    pub mass_sum: Vector<D>,
    pub bounds: Aabb<D>,
    first_child: u32,
    next_sibling: u32,
}

impl<D: Dim> TreeNode<D>
where
    DefaultAllocator: Allocator<D>,
{
    fn empty(bounds: Aabb<D>) -> Self {
        Self {
            body: None,
            mass: 0.0,
            mass_sum: math::zeros(bounds.dim()),
            bounds,
            first_child: NO_NODE,
            next_sibling: NO_NODE,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.body.is_some()
    }

    /// Center of mass of an internal node with non-zero mass.
    pub fn center_of_mass(&self) -> Option<Vector<D>> {
        (self.body.is_none() && self.mass != 0.0).then(|| &self.mass_sum / self.mass)
    }
}

#[derive(Debug, Clone, Copy)]
struct InsertJob {
    node: usize,
    body: usize,
    depth: usize,
}

#[derive(Debug, Clone)]
pub struct BarnesHutTree<D: Dim>
where
    DefaultAllocator: Allocator<D>,
{
    dim: D,
    nodes: Vec<TreeNode<D>>,
    /// Orthant key of every pooled node within its parent, `words` per node.
    orthants: Vec<u64>,
    words: usize,
    key: Vec<u64>,
    node_count: usize,
    insert_stack: Vec<InsertJob>,
    queue: VecDeque<usize>,
    options: TreeOptions,
    skipped: usize,
}

impl<D: DimName> Default for BarnesHutTree<D>
where
    DefaultAllocator: Allocator<D>,
{
    fn default() -> Self {
        Self::new(D::name(), TreeOptions::default())
    }
}

impl<D: Dim> BarnesHutTree<D>
where
    DefaultAllocator: Allocator<D>,
{
    pub fn new(dim: D, options: TreeOptions) -> Self {
        let words = aabb::orthant_words(dim.value());
        Self {
            dim,
            nodes: Vec::new(),
            orthants: Vec::new(),
            words,
            key: vec![0; words],
            node_count: 0,
            insert_stack: Vec::new(),
            queue: VecDeque::new(),
            options,
            skipped: 0,
        }
    }

    pub fn with_pool_capacity(dim: D, options: TreeOptions, capacity: usize) -> Self {
        let mut tree = Self::new(dim, options);
        tree.nodes.reserve(capacity);
        tree.orthants.reserve(capacity * tree.words);
        tree
    }

    pub fn options(&self) -> TreeOptions {
        self.options
    }

    pub fn set_options(&mut self, options: TreeOptions) {
        self.options = options;
    }

    /// Nodes used by the last rebuild and nodes allocated in total.
    pub fn pool_stats(&self) -> (usize, usize) {
        (self.node_count, self.nodes.len())
    }

    /// Releases the node pool. The next rebuild allocates from scratch.
    pub fn clear_pool(&mut self) {
        self.nodes = Vec::new();
        self.orthants = Vec::new();
        self.node_count = 0;
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Bodies left out of the last rebuild because they could not be
    /// separated from a body already in the tree.
    pub fn skipped_bodies(&self) -> usize {
        self.skipped
    }

    pub fn root(&self) -> Option<&TreeNode<D>> {
        self.node(0)
    }

    pub fn node(&self, index: usize) -> Option<&TreeNode<D>> {
        self.nodes[..self.node_count].get(index)
    }

    /// Indices of the occupied children of `index`.
    pub fn children_of(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        let first = self.node(index).map_or(NO_NODE, |node| node.first_child);
        std::iter::successors(link(first), move |&child| {
            link(self.nodes[child].next_sibling)
        })
    }

    fn orthant_key(&self, index: usize) -> &[u64] {
        &self.orthants[index * self.words..(index + 1) * self.words]
    }

    /// Child of `node` whose orthant key equals the scratch key.
    fn find_child(&self, node: usize) -> Option<usize> {
        let mut child = self.nodes[node].first_child;
        while child != NO_NODE {
            let index = child as usize;
            if self.orthant_key(index) == self.key.as_slice() {
                return Some(index);
            }
            child = self.nodes[index].next_sibling;
        }
        None
    }

    fn alloc_node(&mut self, bounds: Aabb<D>) -> usize {
        let index = self.node_count;

        if let Some(node) = self.nodes.get_mut(index) {
            node.body = None;
            node.mass = 0.0;
            node.mass_sum.fill(0.0);
            node.bounds = bounds;
            node.first_child = NO_NODE;
            node.next_sibling = NO_NODE;
        } else {
            self.nodes.push(TreeNode::empty(bounds));
            self.orthants.extend(std::iter::repeat_n(0, self.words));
        }

        self.node_count += 1;
        index
    }

    /// Rebuilds the tree over `bodies`.
    ///
    /// The root is the smallest hyper-cube anchored at the bodies' minimum
    /// corner that covers them all. The last body seeds the root leaf and the
    /// rest are inserted in reverse order. A body whose position coincides
    /// with a body already in a leaf causes the resident body to be moved to
    /// a random spot inside that leaf; positions in `bodies` may therefore
    /// change.
    pub fn insert_bodies(&mut self, bodies: &mut [Body<D>], rng: &mut SharedRng) {
        self.node_count = 0;
        self.skipped = 0;

        let Some(bounds) = Aabb::from_points(bodies.iter().map(|body| &body.pos)) else {
            return;
        };

        let root = self.alloc_node(bounds.to_cube());
        let last = bodies.len() - 1;
        self.nodes[root].body = Some(last);

        let mut stack = std::mem::take(&mut self.insert_stack);
        for body in (0..last).rev() {
            stack.clear();
            stack.push(InsertJob {
                node: root,
                body,
                depth: 0,
            });

            while let Some(job) = stack.pop() {
                self.insert_step(job, bodies, rng, &mut stack);
            }
        }
        self.insert_stack = stack;
    }

    fn insert_step(
        &mut self,
        job: InsertJob,
        bodies: &mut [Body<D>],
        rng: &mut SharedRng,
        stack: &mut Vec<InsertJob>,
    ) {
        let InsertJob { node, body, depth } = job;

        let Some(resident) = self.nodes[node].body else {
            let incoming = &bodies[body];
            let cell = &mut self.nodes[node];
            cell.mass += incoming.mass;
            cell.mass_sum.axpy(incoming.mass, &incoming.pos, 1.0);
            cell.bounds.orthant(&incoming.pos, &mut self.key);

            match self.find_child(node) {
                Some(child) => stack.push(InsertJob {
                    node: child,
                    body,
                    depth: depth + 1,
                }),
                None => {
                    let region = self.nodes[node].bounds.orthant_bounds(&self.key);
                    let child = self.alloc_node(region);
                    let words = self.words;
                    self.orthants[child * words..(child + 1) * words].copy_from_slice(&self.key);
                    self.nodes[child].body = Some(body);
                    self.nodes[child].next_sibling = self.nodes[node].first_child;
                    self.nodes[node].first_child = child as u32;
                }
            }
            return;
        };

        if depth >= MAX_TREE_DEPTH || !self.separate(node, resident, body, bodies, rng) {
            self.skipped += 1;
            debug!(body, resident, depth, "skipping body that coincides with a tree leaf");
            return;
        }

        // The leaf becomes internal and both bodies go back through it
        self.nodes[node].body = None;
        stack.push(InsertJob {
            node,
            body: resident,
            depth,
        });
        stack.push(InsertJob { node, body, depth });
    }

    /// Moves `resident` to a random point inside the leaf while it shares a
    /// position with `incoming`. Returns whether the two ended up apart.
    fn separate(
        &self,
        node: usize,
        resident: usize,
        incoming: usize,
        bodies: &mut [Body<D>],
        rng: &mut SharedRng,
    ) -> bool {
        let bounds = &self.nodes[node].bounds;

        for _ in 0..MAX_NUDGE_ATTEMPTS {
            if !math::is_same_position(&bodies[resident].pos, &bodies[incoming].pos) {
                return true;
            }
            let offset: Scalar = rng.random();
            bodies[resident].pos = &bounds.min + bounds.size() * offset;
        }

        !math::is_same_position(&bodies[resident].pos, &bodies[incoming].pos)
    }

    /// Adds the tree's force on `source` to `bodies[source].force`.
    pub fn update_body_force(
        &mut self,
        source: usize,
        bodies: &mut [Body<D>],
        rng: &mut SharedRng,
    ) {
        let force = self.body_force(source, bodies, rng);
        bodies[source].force += force;
    }

    /// Force the bodies in the tree exert on `bodies[source]`.
    ///
    /// Breadth-first walk from the root. A leaf holding another body
    /// contributes the exact pairwise force; an internal node is collapsed
    /// into a pseudo-body at its center of mass once it looks small enough
    /// from the source, otherwise its children are visited.
    pub fn body_force(
        &mut self,
        source: usize,
        bodies: &[Body<D>],
        rng: &mut SharedRng,
    ) -> Vector<D> {
        let mut force = math::zeros(self.dim);
        if self.node_count == 0 {
            return force;
        }

        let Self {
            nodes,
            queue,
            options,
            ..
        } = self;
        let TreeOptions { gravity, theta } = *options;
        let source_body = &bodies[source];

        queue.clear();
        queue.push_back(0);

        while let Some(index) = queue.pop_front() {
            let node = &nodes[index];

            match node.body {
                Some(other) if other != source => {
                    let other = &bodies[other];
                    let (d, r) = separation(&source_body.pos, &other.pos, rng);
                    force.axpy(gravity * other.mass * source_body.mass / (r * r * r), &d, 1.0);
                }
                Some(_) => {}
                None => {
                    let width = node.bounds.max[0] - node.bounds.min[0];
                    if node.mass != 0.0 {
                        let center = &node.mass_sum / node.mass;
                        let (d, r) = separation(&source_body.pos, &center, rng);
                        if width / r < theta {
                            force.axpy(
                                gravity * node.mass * source_body.mass / (r * r * r),
                                &d,
                                1.0,
                            );
                            continue;
                        }
                    }

                    let mut child = node.first_child;
                    while child != NO_NODE {
                        queue.push_back(child as usize);
                        child = nodes[child as usize].next_sibling;
                    }
                }
            }
        }

        force
    }
}

#[inline]
fn link(index: u32) -> Option<usize> {
    (index != NO_NODE).then_some(index as usize)
}

/// Vector from `from` to `to` and its length, with a random nudge in place
/// of a zero-length vector.
#[inline]
fn separation<D: Dim>(
    from: &Vector<D>,
    to: &Vector<D>,
    rng: &mut SharedRng,
) -> (Vector<D>, Scalar)
where
    DefaultAllocator: Allocator<D>,
{
    let d = to - from;
    let r = d.norm();
    if r == 0.0 {
        let jitter = math::zero_distance_jitter(math::dim_of(from), rng);
        let r = jitter.norm();
        (jitter, r)
    } else {
        (d, r)
    }
}
