// 🧭 Step Graph - which view is active and how to move between them
//
// Each topology is an explicit ordered list of named steps, split into
// three segments:
//
//   prelude      shown once before the pets   (pet count)
//   per-entity   repeated for every pet       (acquisition mode .. social reaction)
//   tail         shown once after the pets    (owner, contact, checkout, portraits)
//
// A position is {step tag, pet index}. Progress flattens the segments:
//   global = prelude + index * per_entity + offset
//   total  = prelude + count * per_entity + tail

use serde::{Deserialize, Serialize};

// ============================================================================
// STEP TAGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepTag {
    PetCount,
    AcquisitionMode,
    Name,
    Species,
    Breed,
    Sex,
    OriginDateTime,
    Location,
    SoulArchetype,
    SpecialTrait,
    SocialReaction,
    OwnerDetails,
    ContactEmail,
    Checkout,
    PortraitSelection,
    PhotoUpload,
    /// Terminal marker after the last tail step
    Complete,
}

impl StepTag {
    /// Canonical step number shared by all topologies (used in logs)
    pub fn number(&self) -> u8 {
        match self {
            StepTag::PetCount => 0,
            StepTag::AcquisitionMode => 1,
            StepTag::Name => 2,
            StepTag::Species => 3,
            StepTag::Breed => 4,
            StepTag::Sex => 5,
            StepTag::OriginDateTime => 6,
            StepTag::Location => 7,
            StepTag::SoulArchetype => 8,
            StepTag::SpecialTrait => 9,
            StepTag::SocialReaction => 10,
            StepTag::OwnerDetails => 11,
            StepTag::ContactEmail => 12,
            StepTag::Checkout => 13,
            StepTag::PortraitSelection => 14,
            StepTag::PhotoUpload => 15,
            StepTag::Complete => 16,
        }
    }

    pub fn is_per_entity(&self) -> bool {
        (1..=10).contains(&self.number())
    }
}

const PER_ENTITY_NORMAL: [StepTag; 10] = [
    StepTag::AcquisitionMode,
    StepTag::Name,
    StepTag::Species,
    StepTag::Breed,
    StepTag::Sex,
    StepTag::OriginDateTime,
    StepTag::Location,
    StepTag::SoulArchetype,
    StepTag::SpecialTrait,
    StepTag::SocialReaction,
];

const TAIL_BASE: [StepTag; 3] = [StepTag::OwnerDetails, StepTag::ContactEmail, StepTag::Checkout];

// ============================================================================
// TOPOLOGY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    Normal,
    Gift,
    Test,
}

impl Topology {
    pub fn name(&self) -> &'static str {
        match self {
            Topology::Normal => "normal",
            Topology::Gift => "gift",
            Topology::Test => "test",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepPosition {
    pub step: StepTag,
    pub entity_index: usize,
}

impl StepPosition {
    pub fn new(step: StepTag, entity_index: usize) -> Self {
        StepPosition { step, entity_index }
    }
}

/// Where a tag sits inside a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Prelude(usize),
    Entity(usize),
    Tail(usize),
    Complete,
}

// ============================================================================
// STEP GRAPH
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepGraph {
    topology: Topology,
    prelude: Vec<StepTag>,
    per_entity: Vec<StepTag>,
    tail: Vec<StepTag>,
}

impl StepGraph {
    pub fn normal() -> Self {
        StepGraph {
            topology: Topology::Normal,
            prelude: vec![StepTag::PetCount],
            per_entity: PER_ENTITY_NORMAL.to_vec(),
            tail: TAIL_BASE.to_vec(),
        }
    }

    /// Same shape as normal; dev shortcuts are gated elsewhere
    pub fn test() -> Self {
        StepGraph {
            topology: Topology::Test,
            ..Self::normal()
        }
    }

    /// Gift flows skip the pet count and acquisition mode steps.
    /// Portrait steps are spliced in after checkout when the gift includes
    /// portraits; the selection step only when several pets are entitled.
    pub fn gift(portrait_entitled: usize) -> Self {
        let mut tail = TAIL_BASE.to_vec();
        if portrait_entitled > 1 {
            tail.push(StepTag::PortraitSelection);
        }
        if portrait_entitled > 0 {
            tail.push(StepTag::PhotoUpload);
        }

        StepGraph {
            topology: Topology::Gift,
            prelude: Vec::new(),
            per_entity: PER_ENTITY_NORMAL[1..].to_vec(),
            tail,
        }
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn per_entity_len(&self) -> usize {
        self.per_entity.len()
    }

    pub fn contains(&self, step: StepTag) -> bool {
        step == StepTag::Complete || self.segment(step).is_some()
    }

    pub fn first_entity_step(&self) -> StepTag {
        self.per_entity.first().copied().unwrap_or(StepTag::Name)
    }

    pub fn last_entity_step(&self) -> StepTag {
        self.per_entity.last().copied().unwrap_or(StepTag::SocialReaction)
    }

    pub fn last_tail_step(&self) -> StepTag {
        self.tail.last().copied().unwrap_or(StepTag::Checkout)
    }

    /// Where a fresh flow of this topology starts
    pub fn first_position(&self) -> StepPosition {
        let step = self.prelude.first().copied().unwrap_or_else(|| self.first_entity_step());
        StepPosition::new(step, 0)
    }

    pub fn is_first_position(&self, position: &StepPosition) -> bool {
        *position == self.first_position()
    }

    fn segment(&self, step: StepTag) -> Option<Segment> {
        if step == StepTag::Complete {
            return Some(Segment::Complete);
        }
        if let Some(i) = self.prelude.iter().position(|s| *s == step) {
            return Some(Segment::Prelude(i));
        }
        if let Some(i) = self.per_entity.iter().position(|s| *s == step) {
            return Some(Segment::Entity(i));
        }
        self.tail.iter().position(|s| *s == step).map(Segment::Tail)
    }

    /// Move forward one view
    pub fn advance(&self, position: StepPosition, entity_count: usize) -> StepPosition {
        let count = entity_count.max(1);
        let index = position.entity_index.min(count - 1);

        match self.segment(position.step) {
            Some(Segment::Prelude(i)) => {
                if i + 1 < self.prelude.len() {
                    StepPosition::new(self.prelude[i + 1], 0)
                } else {
                    StepPosition::new(self.first_entity_step(), 0)
                }
            }
            Some(Segment::Entity(j)) => {
                if j + 1 < self.per_entity.len() {
                    StepPosition::new(self.per_entity[j + 1], index)
                } else if index + 1 < count {
                    StepPosition::new(self.first_entity_step(), index + 1)
                } else {
                    StepPosition::new(self.tail.first().copied().unwrap_or(StepTag::Complete), count - 1)
                }
            }
            Some(Segment::Tail(i)) => {
                if i + 1 < self.tail.len() {
                    StepPosition::new(self.tail[i + 1], index)
                } else {
                    StepPosition::new(StepTag::Complete, index)
                }
            }
            Some(Segment::Complete) => position,
            None => self.first_position(),
        }
    }

    /// Mirror of advance; the first position has nowhere to go
    pub fn retreat(&self, position: StepPosition, entity_count: usize) -> StepPosition {
        let count = entity_count.max(1);
        let index = position.entity_index.min(count - 1);

        match self.segment(position.step) {
            Some(Segment::Prelude(i)) => {
                if i > 0 {
                    StepPosition::new(self.prelude[i - 1], 0)
                } else {
                    position
                }
            }
            Some(Segment::Entity(j)) => {
                if j > 0 {
                    StepPosition::new(self.per_entity[j - 1], index)
                } else if index > 0 {
                    StepPosition::new(self.last_entity_step(), index - 1)
                } else if let Some(last) = self.prelude.last() {
                    StepPosition::new(*last, 0)
                } else {
                    StepPosition::new(self.first_entity_step(), 0)
                }
            }
            Some(Segment::Tail(i)) => {
                if i > 0 {
                    StepPosition::new(self.tail[i - 1], index)
                } else {
                    StepPosition::new(self.last_entity_step(), count - 1)
                }
            }
            Some(Segment::Complete) => StepPosition::new(self.last_tail_step(), index),
            None => self.first_position(),
        }
    }

    pub fn total_steps(&self, entity_count: usize) -> usize {
        self.prelude.len() + entity_count.max(1) * self.per_entity.len() + self.tail.len()
    }

    /// Flattened position across the whole flow; never exceeds total_steps
    pub fn global_step(&self, position: &StepPosition, entity_count: usize) -> usize {
        let count = entity_count.max(1);
        let index = position.entity_index.min(count - 1);
        let entity_block = self.prelude.len();
        let tail_block = entity_block + count * self.per_entity.len();

        match self.segment(position.step) {
            Some(Segment::Prelude(i)) => i,
            Some(Segment::Entity(j)) => entity_block + index * self.per_entity.len() + j,
            Some(Segment::Tail(i)) => tail_block + i,
            Some(Segment::Complete) => self.total_steps(count),
            None => 0,
        }
    }

    /// Progress bar value, 0..=100
    pub fn progress_percent(&self, position: &StepPosition, entity_count: usize) -> u8 {
        let total = self.total_steps(entity_count);
        let global = self.global_step(position, entity_count);
        ((global * 100) / total).min(100) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(graph: &StepGraph, count: usize) -> Vec<StepPosition> {
        let mut visited = vec![graph.first_position()];
        let mut pos = graph.first_position();
        while pos.step != StepTag::Complete {
            pos = graph.advance(pos, count);
            visited.push(pos);
            assert!(visited.len() < 200, "walk did not terminate");
        }
        visited
    }

    #[test]
    fn test_normal_total_steps() {
        let graph = StepGraph::normal();
        for count in 1..=5 {
            assert_eq!(graph.total_steps(count), 1 + count * 10 + 3);
        }
    }

    #[test]
    fn test_normal_walk_visits_every_position_in_order() {
        let graph = StepGraph::normal();
        for count in 1..=5 {
            let visited = walk(&graph, count);
            assert_eq!(visited.len(), graph.total_steps(count) + 1);

            let globals: Vec<usize> = visited.iter().map(|p| graph.global_step(p, count)).collect();
            let expected: Vec<usize> = (0..=graph.total_steps(count)).collect();
            assert_eq!(globals, expected, "count {}", count);
        }
    }

    #[test]
    fn test_last_entity_hands_over_to_owner_step() {
        let graph = StepGraph::normal();
        let pos = graph.advance(StepPosition::new(StepTag::SocialReaction, 1), 3);
        assert_eq!(pos, StepPosition::new(StepTag::AcquisitionMode, 2));

        let pos = graph.advance(StepPosition::new(StepTag::SocialReaction, 2), 3);
        assert_eq!(pos, StepPosition::new(StepTag::OwnerDetails, 2));
    }

    #[test]
    fn test_retreat_mirrors_advance() {
        let graph = StepGraph::normal();
        assert_eq!(
            graph.retreat(StepPosition::new(StepTag::AcquisitionMode, 1), 2),
            StepPosition::new(StepTag::SocialReaction, 0)
        );
        assert_eq!(
            graph.retreat(StepPosition::new(StepTag::AcquisitionMode, 0), 2),
            StepPosition::new(StepTag::PetCount, 0)
        );
        assert_eq!(
            graph.retreat(StepPosition::new(StepTag::OwnerDetails, 1), 2),
            StepPosition::new(StepTag::SocialReaction, 1)
        );
        assert_eq!(
            graph.retreat(StepPosition::new(StepTag::ContactEmail, 1), 2),
            StepPosition::new(StepTag::OwnerDetails, 1)
        );
        assert_eq!(
            graph.retreat(StepPosition::new(StepTag::PetCount, 0), 2),
            StepPosition::new(StepTag::PetCount, 0)
        );

        // advance then retreat returns to the start everywhere
        let count = 3;
        for pos in walk(&graph, count).into_iter().filter(|p| p.step != StepTag::Complete) {
            assert_eq!(graph.retreat(graph.advance(pos, count), count), pos);
        }
    }

    #[test]
    fn test_gift_graph_starts_at_name() {
        let graph = StepGraph::gift(0);
        assert_eq!(graph.first_position(), StepPosition::new(StepTag::Name, 0));
        assert_eq!(graph.first_entity_step().number(), 2);
        assert!(!graph.contains(StepTag::PetCount));
        assert!(!graph.contains(StepTag::AcquisitionMode));
        assert_eq!(graph.total_steps(2), 2 * 9 + 3);

        // Next pet resumes at the name step
        let pos = graph.advance(StepPosition::new(StepTag::SocialReaction, 0), 2);
        assert_eq!(pos, StepPosition::new(StepTag::Name, 1));
    }

    #[test]
    fn test_gift_portrait_splice() {
        let single = StepGraph::gift(1);
        let pos = single.advance(StepPosition::new(StepTag::Checkout, 1), 2);
        assert_eq!(pos.step, StepTag::PhotoUpload);
        assert!(!single.contains(StepTag::PortraitSelection));

        let multi = StepGraph::gift(2);
        let pos = multi.advance(StepPosition::new(StepTag::Checkout, 1), 2);
        assert_eq!(pos.step, StepTag::PortraitSelection);
        assert_eq!(multi.advance(pos, 2).step, StepTag::PhotoUpload);

        let none = StepGraph::gift(0);
        assert_eq!(none.advance(StepPosition::new(StepTag::Checkout, 0), 1).step, StepTag::Complete);
    }

    #[test]
    fn test_segment_ends() {
        let normal = StepGraph::normal();
        assert_eq!(normal.first_entity_step(), StepTag::AcquisitionMode);
        assert_eq!(normal.last_entity_step(), StepTag::SocialReaction);
        assert_eq!(normal.last_tail_step(), StepTag::Checkout);

        let gift = StepGraph::gift(2);
        assert_eq!(gift.first_entity_step(), StepTag::Name);
        assert_eq!(gift.last_tail_step(), StepTag::PhotoUpload);
        assert_eq!(
            gift.retreat(StepPosition::new(StepTag::Complete, 1), 2),
            StepPosition::new(StepTag::PhotoUpload, 1)
        );
    }

    #[test]
    fn test_progress_is_monotonic_and_bounded() {
        for graph in [StepGraph::normal(), StepGraph::gift(2), StepGraph::test()] {
            let count = 4;
            let mut last = 0;
            for pos in walk(&graph, count) {
                let global = graph.global_step(&pos, count);
                assert!(global >= last);
                assert!(global <= graph.total_steps(count));
                last = global;
            }
            assert_eq!(graph.progress_percent(&StepPosition::new(StepTag::Complete, 3), count), 100);
        }
    }

    #[test]
    fn test_out_of_range_index_is_clamped() {
        let graph = StepGraph::normal();
        let pos = StepPosition::new(StepTag::Breed, 7);
        assert_eq!(graph.global_step(&pos, 2), 1 + 10 + 3);
        assert_eq!(graph.advance(pos, 2), StepPosition::new(StepTag::Sex, 1));
    }
}
