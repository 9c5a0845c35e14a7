//! Animation gate: counts outstanding renderer transitions for the bundle on
//! screen and reports when they have all finished.
//!
//! The gate owns the animation registry for one game view. Transitions are
//! tracked per element so a completion for an element that never started is
//! recognised as stray and dropped instead of driving the count negative.

use std::collections::HashMap;

/// Renderer-chosen identifier for an animating element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef(String);

impl ElementRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ElementRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementRef {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ElementRef {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    /// Transitions are still running (or the cycle already completed).
    Pending,
    /// The last outstanding transition finished; fire `all_done` now.
    AllDone,
}

#[derive(Debug, Default)]
pub struct AnimationGate {
    registry: HashMap<ElementRef, u32>,
    outstanding: u32,
    /// True between `reset` and the first time the cycle reports `AllDone`.
    armed: bool,
}

impl AnimationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new delivery cycle expecting zero transitions.
    pub fn reset(&mut self) {
        if self.outstanding > 0 {
            tracing::debug!(
                outstanding = self.outstanding,
                "Discarding unfinished transitions from previous cycle"
            );
        }
        self.registry.clear();
        self.outstanding = 0;
        self.armed = true;
    }

    /// Tear down without arming a new cycle.
    pub fn disarm(&mut self) {
        self.registry.clear();
        self.outstanding = 0;
        self.armed = false;
    }

    pub fn will_animate(&mut self, element: ElementRef) {
        *self.registry.entry(element).or_insert(0) += 1;
        self.outstanding += 1;
    }

    pub fn animation_done(&mut self, element: &ElementRef) -> GateStatus {
        match self.registry.get_mut(element) {
            Some(count) => {
                *count -= 1;
                if *count == 0 {
                    self.registry.remove(element);
                }
                self.outstanding = self.outstanding.saturating_sub(1);
            }
            None => {
                tracing::warn!(%element, "Transition completed without a matching start; ignoring");
                return GateStatus::Pending;
            }
        }
        self.check()
    }

    /// Post-dispatch check: a bundle that started no transitions is done
    /// right away.
    pub fn settle(&mut self) -> GateStatus {
        self.check()
    }

    pub fn outstanding(&self) -> u32 {
        self.outstanding
    }

    pub fn is_animating(&self, element: &ElementRef) -> bool {
        self.registry.contains_key(element)
    }

    fn check(&mut self) -> GateStatus {
        if self.armed && self.outstanding == 0 {
            self.armed = false;
            GateStatus::AllDone
        } else {
            GateStatus::Pending
        }
    }
}
