//! A small balanced KD-tree over dye-track points, used for the
//! approximate-nearest-neighbors pre-classifier.
//!
//! `original_source/cc_code/src/classifiers/kwann-classifier.h` builds its
//! index with FLANN, an external C++ library with no equivalent in the
//! pack's dependency stack, so this module is a
//! from-scratch balanced KD-tree instead, built by partitioning on the axis
//! of largest spread at each node (the standard approach when no external
//! index library is available). Points are never physically reordered:
//! `order` holds a permutation of point indices, and each node owns a
//! contiguous range within it — equivalent to the in-place point-array
//! partitioning a C++ KD-tree would do, without requiring the point storage
//! itself to move.

const LEAF_SIZE: usize = 8;

enum Node {
    Leaf {
        range: (usize, usize),
    },
    Split {
        axis: usize,
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// An immutable index over a fixed, owned point set. Owning (rather than
/// borrowing) the points lets a classifier keep both the points and the
/// tree as plain sibling fields instead of a self-referential struct.
pub struct KdTree {
    points: Vec<Vec<f64>>,
    dims: usize,
    order: Vec<usize>,
    root: Node,
}

impl KdTree {
    pub fn build(points: Vec<Vec<f64>>) -> Self {
        let dims = points.first().map_or(0, |p| p.len());
        let mut order: Vec<usize> = (0..points.len()).collect();
        let root = Self::build_node(&points, &mut order, 0, order.len(), dims);
        KdTree {
            points,
            dims,
            order,
            root,
        }
    }

    fn build_node(points: &[Vec<f64>], order: &mut [usize], lo: usize, hi: usize, dims: usize) -> Node {
        if hi - lo <= LEAF_SIZE || dims == 0 {
            return Node::Leaf { range: (lo, hi) };
        }
        let axis = Self::widest_axis(points, &order[lo..hi], dims);
        let mid = lo + (hi - lo) / 2;
        order[lo..hi].select_nth_unstable_by(mid - lo, |&a, &b| {
            points[a][axis].partial_cmp(&points[b][axis]).unwrap()
        });
        let value = points[order[mid]][axis];
        let left = Box::new(Self::build_node(points, order, lo, mid, dims));
        let right = Box::new(Self::build_node(points, order, mid, hi, dims));
        Node::Split { axis, value, left, right }
    }

    fn widest_axis(points: &[Vec<f64>], indices: &[usize], dims: usize) -> usize {
        let mut best_axis = 0;
        let mut best_spread = -1.0;
        for axis in 0..dims {
            let mut lo = f64::INFINITY;
            let mut hi = f64::NEG_INFINITY;
            for &i in indices {
                let v = points[i][axis];
                lo = lo.min(v);
                hi = hi.max(v);
            }
            let spread = hi - lo;
            if spread > best_spread {
                best_spread = spread;
                best_axis = axis;
            }
        }
        best_axis
    }

    /// The `k` nearest points to `query` by squared Euclidean distance,
    /// sorted ascending by distance. Exact (not approximate) within this
    /// tree's own index; the "approximate" half of the pre-classifier
    /// comes from running this query against deduplicated dye-track
    /// representatives rather than peptide identity.
    pub fn nearest(&self, query: &[f64], k: usize) -> Vec<(usize, f64)> {
        if k == 0 || self.dims == 0 {
            return Vec::new();
        }
        let mut heap = BoundedMaxHeap::new(k);
        self.search(&self.root, query, &mut heap);
        heap.into_sorted_vec()
    }

    fn search(&self, node: &Node, query: &[f64], heap: &mut BoundedMaxHeap) {
        match node {
            Node::Leaf { range } => {
                for &i in &self.order[range.0..range.1] {
                    let d = squared_distance(query, &self.points[i]);
                    heap.push(i, d);
                }
            }
            Node::Split { axis, value, left, right } => {
                let delta = query[*axis] - value;
                let (near, far) = if delta <= 0.0 { (left, right) } else { (right, left) };
                self.search(near, query, heap);
                if !heap.is_full() || delta * delta < heap.worst() {
                    self.search(far, query, heap);
                }
            }
        }
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Bounded max-heap keyed by distance: retains the `k` smallest-distance
/// entries seen so far, evicting the worst when a closer one arrives.
struct BoundedMaxHeap {
    capacity: usize,
    entries: Vec<(usize, f64)>,
}

impl BoundedMaxHeap {
    fn new(capacity: usize) -> Self {
        BoundedMaxHeap {
            capacity,
            entries: Vec::with_capacity(capacity),
        }
    }

    fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    fn worst(&self) -> f64 {
        self.entries.iter().map(|&(_, d)| d).fold(0.0, f64::max)
    }

    fn push(&mut self, index: usize, dist: f64) {
        if self.entries.len() < self.capacity {
            self.entries.push((index, dist));
            return;
        }
        let (worst_pos, &(_, worst_dist)) = self
            .entries
            .iter()
            .enumerate()
            .max_by(|a, b| a.1 .1.partial_cmp(&b.1 .1).unwrap())
            .unwrap();
        if dist < worst_dist {
            self.entries[worst_pos] = (index, dist);
        }
    }

    fn into_sorted_vec(mut self) -> Vec<(usize, f64)> {
        self.entries.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        self.entries
    }
}
