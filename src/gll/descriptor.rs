// Descriptors and the worklist that drains them

use rustc_hash::FxHashSet;
use std::collections::VecDeque;

use super::gss::GSSNodeId;
use super::slots::SlotId;
use super::sppf::SPPFNodeId;
use crate::config::Scheduling;
use crate::datadependent::Environment;

type HashSet<K> = FxHashSet<K>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Descriptor {
    /// Grammar slot
    pub gn: SlotId,
    /// Input position
    pub i: usize,
    /// GSS node index
    pub sn: GSSNodeId,
    /// SPPF node index
    pub dn: Option<SPPFNodeId>,
    pub env: Environment,
}

/// Deduplicating worklist. Every descriptor is accepted at most once per
/// parse; `seen` doubles as the descriptor statistic.
#[derive(Debug, Default)]
pub struct DescriptorScheduler {
    seen: HashSet<Descriptor>,
    queue: VecDeque<Descriptor>,
    /// Descriptor to run next without going through the queue
    next: Option<Descriptor>,
    scheduling: Scheduling,
    shortcut: bool,
}

impl DescriptorScheduler {
    pub fn new(scheduling: Scheduling, shortcut: bool) -> Self {
        DescriptorScheduler {
            scheduling,
            shortcut,
            ..Default::default()
        }
    }

    pub fn clear(&mut self) {
        self.seen.clear();
        self.queue.clear();
        self.next = None;
    }

    /// Add new descriptor to the queue, skip if already seen
    pub fn queue_descriptor(&mut self, desc: Descriptor) -> bool {
        if self.seen.contains(&desc) {
            return false;
        }
        self.seen.insert(desc.clone());
        self.queue.push_back(desc);
        true
    }

    /// Like `queue_descriptor`, but a new descriptor is run next if the
    /// shortcut is enabled and nothing else is waiting in the register
    pub fn queue_immediate(&mut self, desc: Descriptor) -> bool {
        if !self.shortcut || self.next.is_some() {
            return self.queue_descriptor(desc);
        }
        if self.seen.contains(&desc) {
            return false;
        }
        self.seen.insert(desc.clone());
        self.next = Some(desc);
        true
    }

    pub fn dequeue_descriptor(&mut self) -> Option<Descriptor> {
        if let Some(desc) = self.next.take() {
            return Some(desc);
        }
        match self.scheduling {
            Scheduling::Fifo => self.queue.pop_front(),
            Scheduling::Lifo => self.queue.pop_back(),
        }
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn pending(&self) -> usize {
        self.queue.len() + usize::from(self.next.is_some())
    }
}
