//! Contact event tracking
//!
//! The solver only reports which shapes touch during a step. This module keeps the
//! touching pairs of the previous step and diffs the two generations, so every
//! pair produces one begin event when it starts touching, one during event per
//! step while it keeps touching, and one end event when it separates.

use crate::physics::pair_hash::{ContactPairKey, ShapeId};
use crate::physics::solver::RawContact;
use hecs::Entity;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace, warn};

/// Event emitted by the physics layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicsEvent {
    /// Two colliders started touching this step
    BeginContact { entity_a: Entity, entity_b: Entity },
    /// Two colliders that touched last step still touch
    DuringContact { entity_a: Entity, entity_b: Entity },
    /// Two colliders that touched last step no longer touch
    EndContact { entity_a: Entity, entity_b: Entity },
    /// One internal solver step completed
    SubStep,
}

impl PhysicsEvent {
    /// The entity pair of a contact event
    pub fn entities(&self) -> Option<(Entity, Entity)> {
        match *self {
            PhysicsEvent::BeginContact { entity_a, entity_b }
            | PhysicsEvent::DuringContact { entity_a, entity_b }
            | PhysicsEvent::EndContact { entity_a, entity_b } => Some((entity_a, entity_b)),
            PhysicsEvent::SubStep => None,
        }
    }

    /// Whether this is a contact event between `a` and `b`, in either order
    pub fn involves_pair(&self, a: Entity, b: Entity) -> bool {
        matches!(self.entities(), Some((x, y)) if (x == a && y == b) || (x == b && y == a))
    }
}

/// Diffs consecutive contact sets into [`PhysicsEvent`]s
///
/// Must be fed exactly once per solver step; skipping or repeating a step shifts
/// the begin/during classification of the following step.
#[derive(Debug, Default)]
pub struct ContactEventTracker {
    /// Pairs touching in the step being processed
    current: HashSet<ContactPairKey>,
    /// Pairs touching in the previous step
    last: HashSet<ContactPairKey>,
    /// Collider entity owning each registered shape
    shape_entities: HashMap<ShapeId, Entity>,
    /// Sort buffer reused across steps
    sorted: Vec<(ContactPairKey, RawContact)>,
    events: Vec<PhysicsEvent>,
}

impl ContactEventTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `shape` belongs to the collider on `entity`
    pub fn register_shape(&mut self, shape: ShapeId, entity: Entity) {
        if let Some(previous) = self.shape_entities.insert(shape, entity) {
            if previous != entity {
                warn!(
                    shape = shape.raw(),
                    previous = ?previous,
                    entity = ?entity,
                    "Shape id re-registered to a different entity"
                );
            }
        }
    }

    /// Forget a shape that left the solver, along with every pair it was part of
    ///
    /// The solver may hand the id to a new shape, which must start with no contacts.
    pub fn unregister_shape(&mut self, shape: ShapeId) -> Option<Entity> {
        let involves = |key: &ContactPairKey| key.low_id() == shape || key.high_id() == shape;
        self.last.retain(|key| !involves(key));
        self.current.retain(|key| !involves(key));
        self.shape_entities.remove(&shape)
    }

    /// The collider entity owning a shape
    pub fn entity_for_shape(&self, shape: ShapeId) -> Option<Entity> {
        self.shape_entities.get(&shape).copied()
    }

    /// Number of registered shapes
    pub fn shape_count(&self) -> usize {
        self.shape_entities.len()
    }

    /// Whether two shapes touched in the last processed step
    pub fn is_touching(&self, a: ShapeId, b: ShapeId) -> bool {
        self.last.contains(&ContactPairKey::new(a, b))
    }

    /// Number of distinct pairs touching in the last processed step
    pub fn active_pair_count(&self) -> usize {
        self.last.len()
    }

    /// Post-step hook: diff this step's contacts against the previous step
    pub fn on_post_step(&mut self, contacts: &[RawContact]) {
        // Unique pairs of this step
        for contact in contacts {
            self.current
                .insert(ContactPairKey::new(contact.shape_a, contact.shape_b));
        }

        // Sorted copy so every record of one pair is adjacent
        self.sorted.clear();
        self.sorted.extend(
            contacts
                .iter()
                .map(|contact| (ContactPairKey::new(contact.shape_a, contact.shape_b), *contact)),
        );
        self.sorted.sort_unstable_by_key(|(key, _)| *key);

        let mut previous_key = None;
        for &(key, contact) in &self.sorted {
            if previous_key == Some(key) {
                continue;
            }
            previous_key = Some(key);

            let (Some(entity_a), Some(entity_b)) = (
                self.shape_entities.get(&contact.shape_a).copied(),
                self.shape_entities.get(&contact.shape_b).copied(),
            ) else {
                warn!(
                    shape_a = contact.shape_a.raw(),
                    shape_b = contact.shape_b.raw(),
                    "Contact references an unregistered shape"
                );
                continue;
            };

            if self.last.contains(&key) {
                self.events
                    .push(PhysicsEvent::DuringContact { entity_a, entity_b });
            } else {
                trace!(?entity_a, ?entity_b, "Begin contact");
                self.events
                    .push(PhysicsEvent::BeginContact { entity_a, entity_b });
            }
        }

        for key in &self.last {
            if self.current.contains(key) {
                continue;
            }

            match (
                self.shape_entities.get(&key.low_id()).copied(),
                self.shape_entities.get(&key.high_id()).copied(),
            ) {
                (Some(entity_a), Some(entity_b)) => {
                    trace!(?entity_a, ?entity_b, "End contact");
                    self.events
                        .push(PhysicsEvent::EndContact { entity_a, entity_b });
                }
                // Expected after a touching shape was removed from the solver
                _ => debug!(
                    shape_a = key.low_id().raw(),
                    shape_b = key.high_id().raw(),
                    "Dropping end contact for a removed shape"
                ),
            }
        }

        self.swap_contact_sets();
        self.events.push(PhysicsEvent::SubStep);
    }

    /// Move this step's pairs into the previous generation, leaving `current` empty
    fn swap_contact_sets(&mut self) {
        std::mem::swap(&mut self.current, &mut self.last);
        self.current.clear();
    }

    /// Take all events emitted since the last drain
    pub fn drain_events(&mut self) -> std::vec::Drain<'_, PhysicsEvent> {
        self.events.drain(..)
    }

    /// Drop undrained events, returning how many there were
    pub fn discard_events(&mut self) -> usize {
        let count = self.events.len();
        self.events.clear();
        count
    }

    /// Events emitted since the last drain
    pub fn events(&self) -> &[PhysicsEvent] {
        &self.events
    }

    /// Forget every tracked pair, so the next step reports only begin events
    pub fn clear_contacts(&mut self) {
        self.current.clear();
        self.last.clear();
    }
}
