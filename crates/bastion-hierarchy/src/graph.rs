//! Graph snapshots and the copy-on-write [`HierarchyGraph`].

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use arc_swap::ArcSwap;
use bastion_types::{AccessError, GraphKind, Result};
use tracing::debug;

use crate::DEFAULT_MAX_DEPTH;

/// Bound for graph node names.
pub trait NodeName: Clone + Ord + Display + Send + Sync + 'static {}

impl<T> NodeName for T where T: Clone + Ord + Display + Send + Sync + 'static {}

type Adjacency<N> = BTreeMap<N, BTreeSet<N>>;

// ============================================================================
// Snapshot
// ============================================================================

#[derive(Debug)]
struct Closures<N> {
    ascendants: Adjacency<N>,
    descendants: Adjacency<N>,
}

/// Immutable view of a graph at one point in time.
#[derive(Debug)]
pub struct Snapshot<N: NodeName> {
    /// child -> parents
    parents: Adjacency<N>,
    /// parent -> children
    children: Adjacency<N>,
    version: u64,
    closures: OnceLock<Closures<N>>,
}

impl<N: NodeName> Snapshot<N> {
    fn empty() -> Self {
        Self {
            parents: BTreeMap::new(),
            children: BTreeMap::new(),
            version: 0,
            closures: OnceLock::new(),
        }
    }

    /// Copies the edge sets into a new, uncached snapshot.
    fn next(&self) -> Self {
        Self {
            parents: self.parents.clone(),
            children: self.children.clone(),
            version: self.version + 1,
            closures: OnceLock::new(),
        }
    }

    /// Incremented on every published mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn contains(&self, node: &N) -> bool {
        self.parents.contains_key(node) || self.children.contains_key(node)
    }

    pub fn has_edge(&self, parent: &N, child: &N) -> bool {
        self.children
            .get(parent)
            .is_some_and(|children| children.contains(child))
    }

    pub fn parents(&self, node: &N) -> BTreeSet<N> {
        self.parents.get(node).cloned().unwrap_or_default()
    }

    pub fn children(&self, node: &N) -> BTreeSet<N> {
        self.children.get(node).cloned().unwrap_or_default()
    }

    /// Every node that appears in at least one edge.
    pub fn nodes(&self) -> BTreeSet<N> {
        self.parents
            .keys()
            .chain(self.children.keys())
            .cloned()
            .collect()
    }

    /// All edges as `(parent, child)` pairs.
    pub fn edges(&self) -> Vec<(N, N)> {
        self.children
            .iter()
            .flat_map(|(parent, children)| {
                children
                    .iter()
                    .map(move |child| (parent.clone(), child.clone()))
            })
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.children.values().map(BTreeSet::len).sum()
    }

    pub fn ascendants(&self, node: &N) -> BTreeSet<N> {
        self.closures()
            .ascendants
            .get(node)
            .cloned()
            .unwrap_or_default()
    }

    pub fn descendants(&self, node: &N) -> BTreeSet<N> {
        self.closures()
            .descendants
            .get(node)
            .cloned()
            .unwrap_or_default()
    }

    /// True if `a` is reachable from `b` through parent links.
    pub fn is_ascendant(&self, a: &N, b: &N) -> bool {
        self.closures()
            .ascendants
            .get(b)
            .is_some_and(|set| set.contains(a))
    }

    /// The given nodes together with all of their ascendants.
    pub fn closure<'a, I>(&self, nodes: I) -> BTreeSet<N>
    where
        I: IntoIterator<Item = &'a N>,
    {
        let closures = self.closures();
        let mut out = BTreeSet::new();
        for node in nodes {
            out.insert(node.clone());
            if let Some(asc) = closures.ascendants.get(node) {
                out.extend(asc.iter().cloned());
            }
        }
        out
    }

    fn closures(&self) -> &Closures<N> {
        self.closures.get_or_init(|| Closures {
            ascendants: transitive(&self.parents),
            descendants: transitive(&self.children),
        })
    }

    /// Number of edges on the longest path starting at `node` along `links`.
    fn height(links: &Adjacency<N>, node: &N, memo: &mut BTreeMap<N, usize>) -> usize {
        if let Some(&h) = memo.get(node) {
            return h;
        }
        let h = links.get(node).map_or(0, |next| {
            next.iter()
                .map(|n| Self::height(links, n, memo) + 1)
                .max()
                .unwrap_or(0)
        });
        memo.insert(node.clone(), h);
        h
    }

    fn insert_edge(&mut self, parent: &N, child: &N) {
        self.children
            .entry(parent.clone())
            .or_default()
            .insert(child.clone());
        self.parents
            .entry(child.clone())
            .or_default()
            .insert(parent.clone());
    }

    fn delete_edge(&mut self, parent: &N, child: &N) {
        if let Some(set) = self.children.get_mut(parent) {
            set.remove(child);
            if set.is_empty() {
                self.children.remove(parent);
            }
        }
        if let Some(set) = self.parents.get_mut(child) {
            set.remove(parent);
            if set.is_empty() {
                self.parents.remove(child);
            }
        }
    }
}

/// Breadth-first reachability for every key of `links`.
fn transitive<N: NodeName>(links: &Adjacency<N>) -> Adjacency<N> {
    let mut out = BTreeMap::new();
    for start in links.keys() {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&N> = links[start].iter().collect();
        while let Some(node) = queue.pop_front() {
            if seen.insert(node.clone()) {
                if let Some(next) = links.get(node) {
                    queue.extend(next.iter());
                }
            }
        }
        out.insert(start.clone(), seen);
    }
    out
}

// ============================================================================
// Hierarchy Graph
// ============================================================================

/// A hierarchy published through atomic snapshot swaps.
///
/// Every mutation accepts an optional `persist` callback that runs under the
/// writer lock after validation and before publication. If it fails, nothing
/// is published.
#[derive(Debug)]
pub struct HierarchyGraph<N: NodeName> {
    kind: GraphKind,
    current: ArcSwap<Snapshot<N>>,
    writer: Mutex<()>,
    max_depth: usize,
}

impl<N: NodeName> HierarchyGraph<N> {
    /// Creates an empty graph.
    pub fn new(kind: GraphKind) -> Self {
        Self {
            kind,
            current: ArcSwap::from_pointee(Snapshot::empty()),
            writer: Mutex::new(()),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Sets the maximum parent-chain length.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    /// Builds a graph from `(parent, child)` edges, validating each one.
    pub fn from_edges<I>(kind: GraphKind, max_depth: usize, edges: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, N)>,
    {
        let graph = Self::new(kind).with_max_depth(max_depth);
        graph.replace_edges(edges)?;
        Ok(graph)
    }

    pub fn kind(&self) -> GraphKind {
        self.kind
    }

    /// Loads the current snapshot. Never blocks.
    pub fn snapshot(&self) -> Arc<Snapshot<N>> {
        self.current.load_full()
    }

    pub fn ascendants(&self, node: &N) -> BTreeSet<N> {
        self.current.load().ascendants(node)
    }

    pub fn descendants(&self, node: &N) -> BTreeSet<N> {
        self.current.load().descendants(node)
    }

    pub fn is_ascendant(&self, a: &N, b: &N) -> bool {
        self.current.load().is_ascendant(a, b)
    }

    pub fn parents(&self, node: &N) -> BTreeSet<N> {
        self.current.load().parents(node)
    }

    pub fn children(&self, node: &N) -> BTreeSet<N> {
        self.current.load().children(node)
    }

    pub fn closure<'a, I>(&self, nodes: I) -> BTreeSet<N>
    where
        I: IntoIterator<Item = &'a N>,
    {
        self.current.load().closure(nodes)
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    pub fn add_edge(&self, parent: &N, child: &N) -> Result<()> {
        self.add_edge_with(parent, child, || Ok(()))
    }

    /// Adds `(parent, child)`, running `persist` before publishing.
    pub fn add_edge_with<F>(&self, parent: &N, child: &N, persist: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        let _guard = self.lock_writer();
        let current = self.current.load_full();
        let next = self.stage_add(&current, parent, child)?;
        persist()?;
        self.publish(next, "edge added", parent, child);
        Ok(())
    }

    pub fn remove_edge(&self, parent: &N, child: &N) -> Result<()> {
        self.remove_edge_with(parent, child, || Ok(()))
    }

    /// Removes `(parent, child)`, running `persist` before publishing.
    pub fn remove_edge_with<F>(&self, parent: &N, child: &N, persist: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        let _guard = self.lock_writer();
        let current = self.current.load_full();
        if !current.has_edge(parent, child) {
            return Err(AccessError::RelationshipNotFound {
                graph: self.kind,
                parent: parent.to_string(),
                child: child.to_string(),
            });
        }
        let mut next = current.next();
        next.delete_edge(parent, child);
        persist()?;
        self.publish(next, "edge removed", parent, child);
        Ok(())
    }

    /// Checks that `node` has no edges left.
    ///
    /// Nodes exist only through their edges, so a detached node needs no
    /// further removal.
    pub fn remove_node(&self, node: &N) -> Result<()> {
        if self.current.load().contains(node) {
            return Err(AccessError::NodeInUse {
                graph: self.kind,
                node: node.to_string(),
            });
        }
        Ok(())
    }

    /// Removes `node` and links each of its parents to each of its children.
    pub fn remove_node_relinking(&self, node: &N) -> Result<()> {
        self.remove_node_relinking_with(node, |_, _| Ok(()))
    }

    /// Like [`remove_node_relinking`](Self::remove_node_relinking), handing
    /// the removed and added edges to `persist` before publishing.
    pub fn remove_node_relinking_with<F>(&self, node: &N, persist: F) -> Result<()>
    where
        F: FnOnce(&[(N, N)], &[(N, N)]) -> Result<()>,
    {
        let _guard = self.lock_writer();
        let current = self.current.load_full();
        let parents = current.parents(node);
        let children = current.children(node);

        let mut next = current.next();
        let mut removed = Vec::new();
        for parent in &parents {
            next.delete_edge(parent, node);
            removed.push((parent.clone(), node.clone()));
        }
        for child in &children {
            next.delete_edge(node, child);
            removed.push((node.clone(), child.clone()));
        }

        // Relinking cannot create a cycle: every new edge shortcuts an
        // existing path through `node`.
        let mut added = Vec::new();
        for parent in &parents {
            for child in &children {
                if !next.has_edge(parent, child) {
                    next.insert_edge(parent, child);
                    added.push((parent.clone(), child.clone()));
                }
            }
        }

        persist(&removed, &added)?;
        self.current.store(Arc::new(next));
        debug!(
            graph = %self.kind,
            node = %node,
            removed = removed.len(),
            added = added.len(),
            "hierarchy node removed"
        );
        Ok(())
    }

    /// Replaces all edges at once, as when reloading from a directory.
    pub fn replace_edges<I>(&self, edges: I) -> Result<()>
    where
        I: IntoIterator<Item = (N, N)>,
    {
        let _guard = self.lock_writer();
        let mut staged = Snapshot::empty();
        for (parent, child) in edges {
            if parent == child {
                return Err(self.cyclic(&parent, &child));
            }
            if staged.has_edge(&parent, &child) {
                return Err(AccessError::RelationshipExists {
                    graph: self.kind,
                    parent: parent.to_string(),
                    child: child.to_string(),
                });
            }
            staged.insert_edge(&parent, &child);
        }
        self.check_layers(&staged)?;
        staged.version = self.current.load().version + 1;
        let count = staged.edge_count();
        self.current.store(Arc::new(staged));
        debug!(graph = %self.kind, edges = count, "hierarchy loaded");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cyclic(&self, parent: &N, child: &N) -> AccessError {
        AccessError::CyclicRelationship {
            graph: self.kind,
            parent: parent.to_string(),
            child: child.to_string(),
        }
    }

    fn too_deep(&self, depth: usize) -> AccessError {
        AccessError::ValidationFailed(format!(
            "{} hierarchy depth {depth} exceeds limit {}",
            self.kind, self.max_depth
        ))
    }

    /// Checks a whole staged graph in one topological pass (Kahn's algorithm):
    /// it must be acyclic and no parent chain may exceed `max_depth` edges.
    fn check_layers(&self, staged: &Snapshot<N>) -> Result<()> {
        // Nodes with parents, mapped to the number of parents not yet visited.
        let mut pending: BTreeMap<&N, usize> =
            staged.parents.iter().map(|(node, ps)| (node, ps.len())).collect();
        let mut queue: VecDeque<&N> = staged
            .children
            .keys()
            .filter(|node| !staged.parents.contains_key(*node))
            .collect();
        let mut height: BTreeMap<&N, usize> = BTreeMap::new();
        let mut deepest = 0;

        while let Some(node) = queue.pop_front() {
            let h = height.get(node).copied().unwrap_or(0);
            deepest = deepest.max(h);
            for child in staged.children.get(node).into_iter().flatten() {
                let slot = height.entry(child).or_insert(0);
                *slot = (*slot).max(h + 1);
                let remaining = pending.get_mut(child).map(|count| {
                    *count -= 1;
                    *count
                });
                if remaining == Some(0) {
                    pending.remove(child);
                    queue.push_back(child);
                }
            }
        }

        // Every node left over has an unvisited parent. Walking up through
        // those parents must revisit a node, and that step closes the cycle.
        if let Some(&start) = pending.keys().next() {
            let mut seen = BTreeSet::from([start]);
            let mut node = start;
            while let Some(parent) = staged
                .parents
                .get(node)
                .and_then(|ps| ps.iter().find(|p| pending.contains_key(*p)))
            {
                if !seen.insert(parent) {
                    return Err(self.cyclic(parent, node));
                }
                node = parent;
            }
            return Err(self.cyclic(node, start));
        }

        if deepest > self.max_depth {
            return Err(self.too_deep(deepest));
        }
        Ok(())
    }

    /// Validates `(parent, child)` against `base` and returns the new snapshot.
    fn stage_add(&self, base: &Snapshot<N>, parent: &N, child: &N) -> Result<Snapshot<N>> {
        if parent == child {
            return Err(self.cyclic(parent, child));
        }
        if base.has_edge(parent, child) {
            return Err(AccessError::RelationshipExists {
                graph: self.kind,
                parent: parent.to_string(),
                child: child.to_string(),
            });
        }
        if base.is_ascendant(child, parent) {
            return Err(self.cyclic(parent, child));
        }

        // Longest chain through the new edge: parent's upward height, the
        // edge itself, and the child's downward height.
        let up = Snapshot::height(&base.parents, parent, &mut BTreeMap::new());
        let down = Snapshot::height(&base.children, child, &mut BTreeMap::new());
        let depth = up + 1 + down;
        if depth > self.max_depth {
            return Err(self.too_deep(depth));
        }

        let mut next = base.next();
        next.insert_edge(parent, child);
        Ok(next)
    }

    fn publish(&self, next: Snapshot<N>, event: &'static str, parent: &N, child: &N) {
        let version = next.version;
        self.current.store(Arc::new(next));
        debug!(
            graph = %self.kind,
            parent = %parent,
            child = %child,
            version,
            "hierarchy {event}"
        );
    }
}
