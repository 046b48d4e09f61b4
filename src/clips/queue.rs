// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! An index-stable, singly linked queue of clips.
//!
//! Nodes live in a preallocated slot arena. Slot 0 is a permanent head that
//! never holds a clip; every real clip is reachable from it by following
//! `next`. Freed slots go on a free list and are reused by later pushes, so
//! steady-state playback neither allocates nor shifts existing entries.

use super::Clip;

/// Index of the permanent head node.
pub const HEAD: usize = 0;

#[derive(Debug, Default)]
struct Slot {
    clip: Option<Clip>,
    next: Option<usize>,
}

#[derive(Debug)]
pub struct ClipQueue {
    slots: Vec<Slot>,
    free: Vec<usize>,
    tail: usize,
    len: usize,
    /// Linked clips that don't loop. A clip's looping flag never changes once
    /// it is queued.
    sounds: usize,
}

impl ClipQueue {
    /// Creates a queue with room for `capacity` clips before it has to grow.
    pub fn with_capacity(capacity: usize) -> ClipQueue {
        let mut slots = Vec::with_capacity(capacity + 1);
        slots.push(Slot::default());
        ClipQueue {
            slots,
            free: Vec::with_capacity(capacity),
            tail: HEAD,
            len: 0,
            sounds: 0,
        }
    }

    /// Appends a clip at the tail and returns its slot index.
    pub fn push_back(&mut self, clip: Clip) -> usize {
        if !clip.is_looping() {
            self.sounds += 1;
        }
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Slot {
                    clip: Some(clip),
                    next: None,
                };
                index
            }
            None => {
                self.slots.push(Slot {
                    clip: Some(clip),
                    next: None,
                });
                // The free list must be able to take every slot back without
                // growing on the audio thread.
                let needed = self.slots.len().saturating_sub(self.free.len());
                self.free.reserve(needed);
                self.slots.len() - 1
            }
        };

        self.slots[self.tail].next = Some(index);
        self.tail = index;
        self.len += 1;
        index
    }

    /// Visits every clip in queue order. Clips for which `f` returns false are
    /// unlinked and dropped, and their slots are returned to the free list.
    pub fn walk_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut Clip) -> bool,
    {
        let mut prev = HEAD;
        let mut current = self.slots[HEAD].next;

        while let Some(index) = current {
            let next = self.slots[index].next;
            let keep = match self.slots[index].clip.as_mut() {
                Some(clip) => f(clip),
                None => false,
            };

            if keep {
                prev = index;
            } else {
                self.slots[prev].next = next;
                if let Some(clip) = self.slots[index].clip.take() {
                    if !clip.is_looping() {
                        self.sounds -= 1;
                    }
                }
                self.slots[index] = Slot::default();
                self.free.push(index);
                self.len -= 1;
                if self.tail == index {
                    self.tail = prev;
                }
            }
            current = next;
        }
    }

    /// Iterates over the linked clips in queue order.
    pub fn iter(&self) -> impl Iterator<Item = &Clip> + '_ {
        let mut current = self.slots[HEAD].next;
        std::iter::from_fn(move || {
            let index = current?;
            current = self.slots[index].next;
            self.slots[index].clip.as_ref()
        })
    }

    /// Number of clips linked after the head.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Number of linked clips that play once.
    pub fn sound_count(&self) -> usize {
        self.sounds
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots allocated, including the head.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Unlinks and drops every clip. Returns how many were freed.
    pub fn clear(&mut self) -> usize {
        let freed = self.len;
        self.walk_mut(|_| false);
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav::Pcm;

    fn clip(name: &str) -> Clip {
        let pcm = Pcm {
            samples: vec![0; 8],
            channels: 1,
            sample_rate: 48000,
        };
        Clip::from_pcm(name, pcm, false, 128)
    }

    fn track(name: &str) -> Clip {
        clip(name).duplicate(true, 128)
    }

    fn names(queue: &ClipQueue) -> Vec<String> {
        queue.iter().map(|clip| clip.name().to_string()).collect()
    }

    #[test]
    fn test_push_back_keeps_order() {
        let mut queue = ClipQueue::with_capacity(4);
        assert!(queue.is_empty());
        queue.push_back(clip("a"));
        queue.push_back(clip("b"));
        queue.push_back(clip("c"));

        assert_eq!(queue.len(), 3);
        assert_eq!(names(&queue), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_walk_mut_unlinks_rejected() {
        let mut queue = ClipQueue::with_capacity(4);
        for name in ["a", "b", "c", "d"] {
            queue.push_back(clip(name));
        }

        queue.walk_mut(|clip| clip.name() != "b" && clip.name() != "d");
        assert_eq!(names(&queue), vec!["a", "c"]);
        assert_eq!(queue.len(), 2);

        // The tail moved back to "c", so new clips still land at the end.
        queue.push_back(clip("e"));
        assert_eq!(names(&queue), vec!["a", "c", "e"]);
    }

    #[test]
    fn test_slots_are_reused() {
        let mut queue = ClipQueue::with_capacity(2);
        let first = queue.push_back(clip("a"));
        queue.push_back(clip("b"));
        assert_eq!(queue.slot_count(), 3);

        queue.walk_mut(|clip| clip.name() != "a");
        let reused = queue.push_back(clip("c"));
        assert_eq!(reused, first);
        assert_eq!(queue.slot_count(), 3);
        assert_eq!(names(&queue), vec!["b", "c"]);
    }

    #[test]
    fn test_sound_count_tracks_one_shots() {
        let mut queue = ClipQueue::with_capacity(4);
        queue.push_back(clip("a"));
        queue.push_back(track("music"));
        queue.push_back(clip("b"));
        assert_eq!(queue.sound_count(), 2);

        queue.walk_mut(|clip| clip.name() != "a");
        assert_eq!(queue.sound_count(), 1);

        queue.walk_mut(|clip| !clip.is_looping());
        assert_eq!(queue.sound_count(), 1);
        assert_eq!(queue.len(), 1);

        queue.push_back(clip("c"));
        assert_eq!(queue.sound_count(), 2);
        queue.clear();
        assert_eq!(queue.sound_count(), 0);
    }

    #[test]
    fn test_clear_leaves_only_head() {
        let mut queue = ClipQueue::with_capacity(2);
        for name in ["a", "b", "c"] {
            queue.push_back(clip(name));
        }

        assert_eq!(queue.clear(), 3);
        assert!(queue.is_empty());
        assert_eq!(queue.iter().count(), 0);

        queue.push_back(clip("d"));
        assert_eq!(names(&queue), vec!["d"]);
    }
}
