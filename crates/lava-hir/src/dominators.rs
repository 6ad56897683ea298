//! Dominator sets and immediate dominators over the control-flow subgraph
//! (§4.3), computed with the classical iterative reverse-post-order
//! fixpoint.
//!
//! Control-flow nodes encode their predecessor edge as an *operand*
//! (`Region`'s operands are its predecessor regions, `If`'s `region` field
//! is the block it closes, and so on); the forward successor edge is the
//! corresponding reference (use) list entry. Dataflow here therefore reads
//! predecessors straight off `NodeKind::operands()` and needs no separate
//! backward-edge table.

use std::collections::{BTreeSet, HashMap};

use crate::error::{HirError, HirResult};
use crate::graph::Graph;
use crate::id::NodeId;

pub type DominatorSet = BTreeSet<NodeId>;

pub struct Dominators {
    sets: HashMap<NodeId, DominatorSet>,
    idom: HashMap<NodeId, NodeId>,
}

impl Dominators {
    /// Computes dominator sets for every control-flow node reachable from
    /// `graph.start()`, and the immediate dominator of each (other than
    /// start itself).
    pub fn compute(graph: &Graph) -> HirResult<Self> {
        let start = graph.start().ok_or(HirError::UnreachableFromStart {
            id: NodeId(0),
        })?;
        let rpo = graph.control_flow_rpo();
        let pos: HashMap<NodeId, usize> =
            rpo.iter().enumerate().map(|(i, n)| (*n, i)).collect();

        let mut sets: HashMap<NodeId, DominatorSet> = HashMap::new();
        for &n in &rpo {
            let mut set = DominatorSet::new();
            set.insert(n);
            sets.insert(n, set);
        }

        let mut changed = true;
        while changed {
            changed = false;
            for &n in &rpo {
                if n == start {
                    continue;
                }
                let preds = control_predecessors(graph, n)?;
                let mut merged: Option<DominatorSet> = None;
                for p in &preds {
                    let pred_set = sets.get(p).cloned().unwrap_or_default();
                    merged = Some(match merged {
                        None => pred_set,
                        Some(acc) => acc.intersection(&pred_set).copied().collect(),
                    });
                }
                let mut new_set = merged.unwrap_or_default();
                new_set.insert(n);
                if sets.get(&n) != Some(&new_set) {
                    changed = true;
                    sets.insert(n, new_set);
                }
            }
        }

        let mut idom = HashMap::new();
        for &n in &rpo {
            if n == start {
                continue;
            }
            let set = &sets[&n];
            let mut best: Option<NodeId> = None;
            for &dom in set {
                if dom == n {
                    continue;
                }
                best = match best {
                    None => Some(dom),
                    // Closest dominator = largest RPO position among
                    // candidates (latest one reached walking from start).
                    Some(cur) if pos[&dom] > pos[&cur] => Some(dom),
                    Some(cur) => Some(cur),
                };
            }
            if let Some(b) = best {
                idom.insert(n, b);
            }
        }

        Ok(Dominators { sets, idom })
    }

    pub fn dominator_set(&self, node: NodeId) -> HirResult<&DominatorSet> {
        self.sets.get(&node).ok_or(HirError::UnreachableFromStart { id: node })
    }

    pub fn immediate_dominator(&self, node: NodeId) -> Option<NodeId> {
        self.idom.get(&node).copied()
    }

    pub fn is_dominator(&self, node: NodeId, candidate: NodeId) -> bool {
        self.sets.get(&node).map(|s| s.contains(&candidate)).unwrap_or(false)
    }

    /// Largest set intersected over `n1` and `n2`'s dominator sets -- the
    /// set of nodes that dominate both.
    pub fn common_dominators(&self, n1: NodeId, n2: NodeId) -> HirResult<DominatorSet> {
        let l = self.dominator_set(n1)?;
        let r = self.dominator_set(n2)?;
        Ok(l.intersection(r).copied().collect())
    }
}

fn control_predecessors(graph: &Graph, id: NodeId) -> HirResult<Vec<NodeId>> {
    Ok(graph
        .get(id)?
        .operands()
        .into_iter()
        .filter(|op| graph.get(*op).map(|k| k.is_control_flow()).unwrap_or(false))
        .collect())
}
