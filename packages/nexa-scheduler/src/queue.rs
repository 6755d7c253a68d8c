use crate::priority::PriorityLevel;
use crate::task::Task;
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    pub struct TaskId;
}

/// Where a task lands relative to queued tasks with the same expiration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Behind its peers. Used for freshly scheduled callbacks.
    AfterPeers,
    /// In front of its peers. Used for continuations so a yielded callback
    /// is not starved by siblings scheduled after it.
    BeforePeers,
}

impl Placement {
    fn goes_before(self, queued: f64, incoming: f64) -> bool {
        match self {
            Placement::AfterPeers => queued > incoming,
            Placement::BeforePeers => queued >= incoming,
        }
    }
}

/// A queued task plus its links to the neighbouring nodes in the ring.
pub struct TaskNode {
    pub task: Task,
    next: TaskId,
    previous: TaskId,
}

impl TaskNode {
    /// Next node in expiration order. Wraps around to the head.
    pub fn next(&self) -> TaskId {
        self.next
    }

    /// Previous node. The head's previous is the tail.
    pub fn previous(&self) -> TaskId {
        self.previous
    }
}

/// Outcome of [`TaskList::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inserted {
    pub id: TaskId,
    /// The task is now the head of the list.
    pub is_first: bool,
    /// The list held nothing before this insertion.
    pub was_empty: bool,
}

/// Circular doubly linked list of pending tasks, sorted by expiration time.
///
/// Nodes live in a slot map and link to each other by key, so removal by
/// handle is O(1) and a removed key simply stops resolving. Insertion walks
/// from the head to find its slot.
#[derive(Default)]
pub struct TaskList {
    nodes: SlotMap<TaskId, TaskNode>,
    first: Option<TaskId>,
}

impl TaskList {
    /// An empty list.
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            first: None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_none()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn first_id(&self) -> Option<TaskId> {
        self.first
    }

    pub fn first(&self) -> Option<&Task> {
        self.first.map(|id| &self.nodes[id].task)
    }

    pub fn first_expiration_time(&self) -> Option<f64> {
        self.first().map(|task| task.expiration_time)
    }

    pub fn first_priority_level(&self) -> Option<PriorityLevel> {
        self.first().map(|task| task.priority_level)
    }

    pub fn get(&self, id: TaskId) -> Option<&TaskNode> {
        self.nodes.get(id)
    }

    /// Links `task` in at its expiration-ordered slot, honouring `placement`
    /// among tasks with the same expiration time.
    pub fn insert(&mut self, task: Task, placement: Placement) -> Inserted {
        let Some(first) = self.first else {
            let id = self.nodes.insert_with_key(|id| TaskNode {
                task,
                next: id,
                previous: id,
            });
            self.first = Some(id);
            return Inserted {
                id,
                is_first: true,
                was_empty: true,
            };
        };

        // Find the first queued node that should come after the new one.
        let expiration_time = task.expiration_time;
        let mut next = None;
        let mut node = first;
        loop {
            let current = &self.nodes[node];
            if placement.goes_before(current.task.expiration_time, expiration_time) {
                next = Some(node);
                break;
            }
            node = current.next;
            if node == first {
                break;
            }
        }

        // Nothing later: append, which in a ring means "just before the head".
        let is_first = next == Some(first);
        let next = next.unwrap_or(first);
        let previous = self.nodes[next].previous;

        let id = self.nodes.insert(TaskNode {
            task,
            next,
            previous,
        });
        self.nodes[previous].next = id;
        self.nodes[next].previous = id;

        if is_first {
            self.first = Some(id);
        }

        Inserted {
            id,
            is_first,
            was_empty: false,
        }
    }

    /// Unlinks a task. Returns `None` if it already ran or was removed.
    pub fn remove(&mut self, id: TaskId) -> Option<Task> {
        let node = self.nodes.remove(id)?;

        if node.next == id {
            self.first = None;
        } else {
            if self.first == Some(id) {
                self.first = Some(node.next);
            }
            self.nodes[node.previous].next = node.next;
            self.nodes[node.next].previous = node.previous;
        }

        Some(node.task)
    }

    pub fn pop_first(&mut self) -> Option<Task> {
        let first = self.first?;
        self.remove(first)
    }

    /// Walks the ring once, starting at the head.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cursor: self.first,
        }
    }
}

pub struct Iter<'a> {
    list: &'a TaskList,
    cursor: Option<TaskId>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (TaskId, &'a Task);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let node = &self.list.nodes[id];
        self.cursor = Some(node.next).filter(|next| Some(*next) != self.list.first);
        Some((id, &node.task))
    }
}
