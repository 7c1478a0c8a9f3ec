use crate::model::Processable;
use std::collections::{HashSet, VecDeque};

/// Named types waiting to be expanded.
///
/// An entry stays "queued" from the moment it is added until it is finalized, including while
/// its batch is being expanded, so nested references to it are not queued again.
#[derive(Debug, Default)]
pub struct Worklist {
    queue: VecDeque<Processable>,
    queued: HashSet<Processable>,
    finalized: HashSet<Processable>,
}

impl Worklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a pair unless it is already queued or finalized
    pub fn add_to_be_processed(&mut self, processable: Processable) -> bool {
        if self.finalized.contains(&processable) || self.queued.contains(&processable) {
            return false;
        }
        self.queued.insert(processable.clone());
        self.queue.push_back(processable);
        true
    }

    /// Marks a pair as expanded; it is never queued again
    pub fn finalize(&mut self, processable: Processable) {
        self.queued.remove(&processable);
        self.finalized.insert(processable);
    }

    pub fn is_finalized(&self, processable: &Processable) -> bool {
        self.finalized.contains(processable)
    }

    pub fn is_queued(&self, processable: &Processable) -> bool {
        self.queued.contains(processable)
    }

    /// Removes and returns everything waiting in the queue
    pub fn take_batch(&mut self) -> Vec<Processable> {
        self.queue.drain(..).collect()
    }

    /// Entries waiting in the queue, in insertion order
    pub fn pending(&self) -> Vec<Processable> {
        self.queue.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> Processable {
        Processable::new("crate::models", "User")
    }

    #[test]
    fn test_enqueue_once() {
        let mut worklist = Worklist::new();
        assert!(worklist.add_to_be_processed(user()));
        for _ in 0..4 {
            assert!(!worklist.add_to_be_processed(user()));
        }
        assert_eq!(worklist.len(), 1);
    }

    #[test]
    fn test_finalized_entries_are_not_requeued() {
        let mut worklist = Worklist::new();
        worklist.add_to_be_processed(user());

        let batch = worklist.take_batch();
        assert_eq!(batch, vec![user()]);
        assert!(worklist.is_empty());

        // still in flight: not queued a second time
        assert!(!worklist.add_to_be_processed(user()));

        worklist.finalize(user());
        assert!(worklist.is_finalized(&user()));
        assert!(!worklist.add_to_be_processed(user()));
        assert!(worklist.is_empty());
    }

    #[test]
    fn test_pending_keeps_insertion_order() {
        let mut worklist = Worklist::new();
        worklist.add_to_be_processed(Processable::new("crate", "B"));
        worklist.add_to_be_processed(Processable::new("crate", "A"));

        let names: Vec<String> = worklist.pending().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["B", "A"]);
    }
}
