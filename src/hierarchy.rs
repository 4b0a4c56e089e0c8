//! # Actor Hierarchy
//!
//! The registry of live actors and their parent/child relations.
//!
//! The hierarchy is an arena: cells are stored once, keyed by [`ActorId`], and
//! the tree is expressed as id-to-id maps. Parents never hold their children
//! directly, so there are no reference cycles between cells.
//!
//! ## Invariants
//!
//! - A name maps to at most one registered cell.
//! - Every cell except the root has exactly one parent.
//! - The active set is exactly the registered cells that are not disposed.
//!
//! ## Cascading
//!
//! [`Hierarchy::stop`] and [`Hierarchy::dispose`] walk a subtree in pre-order
//! with an explicit stack. The lock is held only to read one node's children;
//! the cell itself is signalled with the lock released, since on the immediate
//! scheduler signalling a cell runs its teardown (and thus `unregister`)
//! synchronously.

use crate::actor::{AnyActorRef, AnyCell};
use crate::error::SpawnError;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Identity of one actor cell, unique within its actor system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub(crate) u64);

impl ActorId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Default)]
struct Tables {
    cells: HashMap<ActorId, Arc<dyn AnyCell>>,
    names: HashMap<String, ActorId>,
    parents: HashMap<ActorId, ActorId>,
    children: HashMap<ActorId, Vec<ActorId>>,
    active: HashSet<ActorId>,
    root: Option<ActorId>,
}

impl Tables {
    fn attach(&mut self, child: ActorId, parent: ActorId) {
        self.parents.insert(child, parent);
        self.children.entry(parent).or_default().push(child);
    }

    fn detach(&mut self, child: ActorId) {
        if let Some(parent) = self.parents.remove(&child) {
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.retain(|id| *id != child);
            }
        }
    }
}

/// Registry of every live actor in one actor system.
#[derive(Default)]
pub struct Hierarchy {
    tables: Mutex<Tables>,
    terminated: Condvar,
}

impl Hierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `cell` under `parent`.
    ///
    /// Without a parent the first cell becomes the root; later parentless
    /// cells are attached to the root.
    pub(crate) fn register(
        &self,
        cell: Arc<dyn AnyCell>,
        parent: Option<ActorId>,
    ) -> Result<(), SpawnError> {
        let mut tables = self.tables.lock();
        let id = cell.id();
        let name = cell.name().to_string();
        if tables.names.contains_key(&name) {
            return Err(SpawnError::NameTaken(name));
        }
        let parent = match parent.or(tables.root) {
            Some(parent) if !tables.active.contains(&parent) => {
                return Err(SpawnError::ParentTerminated(parent.to_string()));
            }
            Some(parent) => Some(parent),
            None => None,
        };
        match parent {
            Some(parent) => tables.attach(id, parent),
            None => tables.root = Some(id),
        }
        tables.names.insert(name, id);
        tables.active.insert(id);
        tables.cells.insert(id, cell);
        Ok(())
    }

    /// Removes `id` from the registry. Idempotent.
    ///
    /// Children still registered are handed to the root so every live cell
    /// stays reachable from it.
    pub(crate) fn unregister(&self, id: ActorId) {
        let mut tables = self.tables.lock();
        let Some(cell) = tables.cells.remove(&id) else {
            return;
        };
        if tables.names.get(cell.name()) == Some(&id) {
            tables.names.remove(cell.name());
        }
        tables.active.remove(&id);
        tables.detach(id);
        let orphans = tables.children.remove(&id).unwrap_or_default();
        if tables.root == Some(id) {
            tables.root = None;
            for orphan in orphans {
                tables.parents.remove(&orphan);
            }
        } else if let Some(root) = tables.root {
            for orphan in orphans {
                tables.attach(orphan, root);
            }
        }
        debug!(actor = cell.name(), "Actor unregistered");
        if tables.active.is_empty() {
            self.terminated.notify_all();
        }
    }

    /// Moves every child of `id` under the root.
    pub(crate) fn detach_children(&self, id: ActorId) {
        let mut tables = self.tables.lock();
        let Some(root) = tables.root.filter(|root| *root != id) else {
            return;
        };
        let children = tables.children.remove(&id).unwrap_or_default();
        for child in children {
            tables.parents.remove(&child);
            tables.attach(child, root);
        }
    }

    /// Sends a poison pill to `root` and every descendant, parents first.
    pub fn stop(&self, root: ActorId) {
        self.walk(root, |_, cell| cell.stop());
    }

    /// Forcefully terminates `root` and every descendant, parents first,
    /// unregistering each as it is torn down.
    pub fn dispose(&self, root: ActorId) {
        self.walk(root, |hierarchy, cell| {
            let id = cell.id();
            cell.terminate();
            hierarchy.unregister(id);
        });
    }

    fn walk(&self, root: ActorId, mut visit: impl FnMut(&Self, Arc<dyn AnyCell>)) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let (cell, children) = {
                let tables = self.tables.lock();
                (
                    tables.cells.get(&id).cloned(),
                    tables.children.get(&id).cloned().unwrap_or_default(),
                )
            };
            stack.extend(children.into_iter().rev());
            if let Some(cell) = cell {
                visit(self, cell);
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Option<AnyActorRef> {
        let tables = self.tables.lock();
        let id = tables.names.get(name)?;
        tables.cells.get(id).cloned().map(AnyActorRef::from_cell)
    }

    pub fn get(&self, id: ActorId) -> Option<AnyActorRef> {
        self.tables.lock().cells.get(&id).cloned().map(AnyActorRef::from_cell)
    }

    pub fn parent_of(&self, id: ActorId) -> Option<ActorId> {
        self.tables.lock().parents.get(&id).copied()
    }

    pub fn children_of(&self, id: ActorId) -> Vec<ActorId> {
        self.tables
            .lock()
            .children
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn root(&self) -> Option<ActorId> {
        self.tables.lock().root
    }

    pub fn is_active(&self, id: ActorId) -> bool {
        self.tables.lock().active.contains(&id)
    }

    pub fn active_count(&self) -> usize {
        self.tables.lock().active.len()
    }

    pub fn all_terminated(&self) -> bool {
        self.tables.lock().active.is_empty()
    }

    /// Blocks until the active set is empty. Returns `false` if `timeout`
    /// elapsed first.
    pub fn await_termination(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut tables = self.tables.lock();
        while !tables.active.is_empty() {
            match deadline {
                Some(deadline) => {
                    if self
                        .terminated
                        .wait_until(&mut tables, deadline)
                        .timed_out()
                    {
                        return tables.active.is_empty();
                    }
                }
                None => self.terminated.wait(&mut tables),
            }
        }
        true
    }
}

impl fmt::Debug for Hierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tables = self.tables.lock();
        f.debug_struct("Hierarchy")
            .field("root", &tables.root)
            .field("active", &tables.active.len())
            .finish()
    }
}
