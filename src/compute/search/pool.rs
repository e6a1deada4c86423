//! Fixed pool of reusable diagram slots.
//!
//! Strategies refer to diagrams by slot index. A slot is either free or owned
//! by exactly one population member (or scratch role) at a time, and diagrams
//! move between roles by handing over the index, never by copying points.

use std::mem;

use crate::schema::Diagram;

/// Slot-indexed diagram storage with a free list.
#[derive(Debug)]
pub struct DiagramPool {
    slots: Vec<Diagram>,
    free: Vec<usize>,
    point_count: usize,
}

impl DiagramPool {
    /// Pre-allocate `capacity` diagrams of `point_count` points each.
    pub fn new(capacity: usize, point_count: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| Diagram::new(point_count)).collect(),
            free: (0..capacity).rev().collect(),
            point_count,
        }
    }

    pub fn point_count(&self) -> usize {
        self.point_count
    }

    /// Slots currently not owned by anyone.
    pub fn free_slots(&self) -> usize {
        self.free.len()
    }

    /// Take a free slot, growing the pool if every slot is in use.
    pub fn acquire(&mut self) -> usize {
        match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(Diagram::new(self.point_count));
                self.slots.len() - 1
            }
        }
    }

    /// Return a slot to the free list.
    pub fn release(&mut self, slot: usize) {
        debug_assert!(!self.free.contains(&slot), "slot {slot} released twice");
        self.free.push(slot);
    }

    #[inline]
    pub fn diagram(&self, slot: usize) -> &Diagram {
        &self.slots[slot]
    }

    #[inline]
    pub fn diagram_mut(&mut self, slot: usize) -> &mut Diagram {
        &mut self.slots[slot]
    }

    /// Move the diagram out of a slot so it can be read while other slots are
    /// written. Must be paired with [`DiagramPool::restore`].
    pub fn checkout(&mut self, slot: usize) -> Diagram {
        mem::take(&mut self.slots[slot])
    }

    pub fn restore(&mut self, slot: usize, diagram: Diagram) {
        debug_assert_eq!(diagram.len(), self.point_count);
        self.slots[slot] = diagram;
    }
}

/// A population member: a diagram slot and the fitness of its diagram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Member {
    pub slot: usize,
    pub fitness: f64,
}
