//! Incremental reconciliation of the contact graph view.
//!
//! Restarting a force layout on every simulation step makes the picture jump
//! and costs a full relayout. The reconciler keeps the current visual graph
//! and, for each new snapshot, picks the cheapest update that is still
//! correct:
//!
//! | snapshot vs. view                         | action     |
//! |-------------------------------------------|------------|
//! | no nodes                                  | `Skipped`  |
//! | no view, different count or different ids | `Rebuilt`  |
//! | same ids, same edges                      | `Patched`  |
//! | same ids, different edges                 | `Relinked` |
//!
//! Edges are always resolved by node id, never by position in the node list.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::layout::{Body, ForceLayout, LayoutParams, REHEAT_ALPHA, Viewport};
use crate::model::{Link, NodeId, NodeStatus, Snapshot};

/// What [`GraphView::reconcile`] did with a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Snapshot had no nodes; the previous view is left on screen.
    Skipped,
    /// Statuses updated in place; positions and layout untouched.
    Patched,
    /// Statuses and edges updated in place; the running layout was reheated.
    Relinked,
    /// View discarded and rebuilt with a fresh layout run.
    Rebuilt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisualNode {
    pub id: NodeId,
    pub status: NodeStatus,
}

type EdgeKey = (NodeId, NodeId);

/// Undirected key so `a-b` and `b-a` compare equal.
fn edge_key(link: &Link) -> EdgeKey {
    if link.source <= link.target {
        (link.source, link.target)
    } else {
        (link.target, link.source)
    }
}

/// The rendered graph: node order, edge set and layout handle.
#[derive(Debug, Clone, Default)]
pub struct GraphView {
    nodes: Vec<VisualNode>,
    index: HashMap<NodeId, usize>,
    edges: HashSet<EdgeKey>,
    layout: Option<ForceLayout>,
    viewport: Viewport,
    params: LayoutParams,
    generation: u64,
}

impl GraphView {
    pub fn new(params: LayoutParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    /// Bring the view in line with `snapshot`.
    pub fn reconcile(&mut self, snapshot: &Snapshot, viewport: Viewport) -> Reconciliation {
        if snapshot.nodes.is_empty() {
            log::debug!(
                "graph: day {} has no nodes, keeping current view",
                snapshot.day
            );
            return Reconciliation::Skipped;
        }

        if !self.same_node_ids(snapshot) {
            self.rebuild(snapshot, viewport);
            log::debug!(
                "graph: rebuilt with {} nodes / {} edges (generation {})",
                self.nodes.len(),
                self.edges.len(),
                self.generation
            );
            return Reconciliation::Rebuilt;
        }

        for (visual, node) in self.nodes.iter_mut().zip(&snapshot.nodes) {
            visual.status = node.status;
        }

        let edges: HashSet<EdgeKey> = snapshot
            .links
            .iter()
            .filter(|l| self.resolves(l))
            .map(edge_key)
            .collect();
        if edges == self.edges {
            return Reconciliation::Patched;
        }

        let (resolved, kept) = self.resolve_links(&snapshot.links);
        log::debug!(
            "graph: relinked day {} ({} -> {} edges)",
            snapshot.day,
            self.edges.len(),
            kept.len()
        );
        self.edges = kept;
        if let Some(layout) = self.layout.as_mut() {
            layout.set_links(resolved);
            layout.reheat(REHEAT_ALPHA);
        }
        Reconciliation::Relinked
    }

    /// Advance the layout by one iteration. Returns `false` once settled.
    pub fn tick(&mut self) -> bool {
        self.layout.as_mut().is_some_and(ForceLayout::tick)
    }

    pub fn is_settling(&self) -> bool {
        self.layout.as_ref().is_some_and(ForceLayout::is_active)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
        self.edges.clear();
        self.layout = None;
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn nodes(&self) -> &[VisualNode] {
        &self.nodes
    }

    pub fn layout(&self) -> Option<&ForceLayout> {
        self.layout.as_ref()
    }

    /// Number of rebuilds so far; bumps every time the layout restarts.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn bodies(&self) -> &[Body] {
        match &self.layout {
            Some(layout) => layout.bodies(),
            None => &[],
        }
    }

    /// Positions and colours for one rendered frame.
    pub fn frame(&self) -> GraphFrame {
        let bodies = self.bodies();
        let nodes = self
            .nodes
            .iter()
            .zip(bodies)
            .map(|(n, b)| FrameNode {
                id: n.id,
                status: n.status,
                x: b.x,
                y: b.y,
            })
            .collect();
        let edges = self
            .layout
            .as_ref()
            .map(|l| {
                l.links()
                    .iter()
                    .map(|&(s, t)| ((bodies[s].x, bodies[s].y), (bodies[t].x, bodies[t].y)))
                    .collect()
            })
            .unwrap_or_default();
        GraphFrame {
            viewport: self.viewport,
            nodes,
            edges,
            generation: self.generation,
            settling: self.is_settling(),
        }
    }

    fn same_node_ids(&self, snapshot: &Snapshot) -> bool {
        !self.nodes.is_empty()
            && self.nodes.len() == snapshot.nodes.len()
            && self
                .nodes
                .iter()
                .zip(&snapshot.nodes)
                .all(|(v, n)| v.id == n.id)
    }

    fn rebuild(&mut self, snapshot: &Snapshot, viewport: Viewport) {
        self.nodes = snapshot
            .nodes
            .iter()
            .map(|n| VisualNode {
                id: n.id,
                status: n.status,
            })
            .collect();
        self.index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id, i))
            .collect();
        let (resolved, kept) = self.resolve_links(&snapshot.links);
        self.edges = kept;
        self.viewport = viewport;
        self.layout = Some(ForceLayout::new(
            self.nodes.len(),
            resolved,
            viewport,
            self.params,
        ));
        self.generation += 1;
    }

    fn resolves(&self, link: &Link) -> bool {
        self.index.contains_key(&link.source) && self.index.contains_key(&link.target)
    }

    /// Map links to layout indices by node id. Links naming unknown nodes
    /// are dropped.
    fn resolve_links(&self, links: &[Link]) -> (Vec<(usize, usize)>, HashSet<EdgeKey>) {
        let mut resolved = Vec::with_capacity(links.len());
        let mut kept = HashSet::with_capacity(links.len());
        let mut dropped = 0usize;
        for link in links {
            match (self.index.get(&link.source), self.index.get(&link.target)) {
                (Some(&s), Some(&t)) => {
                    resolved.push((s, t));
                    kept.insert(edge_key(link));
                }
                _ => dropped += 1,
            }
        }
        if dropped > 0 {
            log::warn!("graph: dropped {dropped} link(s) referencing unknown nodes");
        }
        (resolved, kept)
    }
}

// ---------------------------------------------------------------------------
// GraphFrame: what the presentation layer draws
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameNode {
    pub id: NodeId,
    pub status: NodeStatus,
    pub x: f64,
    pub y: f64,
}

/// Snapshot of the visual graph in viewport coordinates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphFrame {
    pub viewport: Viewport,
    pub nodes: Vec<FrameNode>,
    pub edges: Vec<((f64, f64), (f64, f64))>,
    pub generation: u64,
    pub settling: bool,
}
