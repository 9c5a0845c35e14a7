//! FIFO of pending bundles with single-primitive delivery scheduling.
//!
//! The queue never touches a clock. [`BundleQueue::schedule_next`] returns the
//! primitive the caller must arm (an animation frame or a timer) together with
//! a ticket; when that primitive fires, the caller hands the ticket back to
//! [`BundleQueue::fire`]. Tickets from cleared or superseded schedules are
//! rejected, so late callbacks cannot deliver anything.
//!
//! Delivery cycle: `Idle -> Dispatched -> WaitingForTransitions -> Idle`.

use std::collections::VecDeque;
use std::time::Duration;

use super::bundle::Bundle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeliveryTicket(u64);

impl std::fmt::Display for DeliveryTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What the caller must wait for before firing a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryTrigger {
    /// Next animation frame, so the renderer has settled.
    AnimationFrame,
    /// Fixed delay requested by the bundle.
    Timer(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledDelivery {
    pub ticket: DeliveryTicket,
    pub trigger: DeliveryTrigger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPhase {
    Idle,
    /// Bundle handed to the renderer, render call not yet returned.
    Dispatched(DeliveryTicket),
    /// Render returned; waiting on the animation gate.
    WaitingForTransitions(DeliveryTicket),
}

#[derive(Debug)]
pub struct BundleQueue {
    pending: VecDeque<Bundle>,
    scheduled: Option<ScheduledDelivery>,
    phase: DeliveryPhase,
    next_ticket: u64,
}

impl Default for BundleQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl BundleQueue {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            scheduled: None,
            phase: DeliveryPhase::Idle,
            next_ticket: 0,
        }
    }

    pub fn enqueue(&mut self, bundle: Bundle) {
        tracing::debug!(
            version = bundle.version(),
            delay_ms = bundle.delay.as_millis() as u64,
            queued = self.pending.len() + 1,
            "Bundle enqueued"
        );
        self.pending.push_back(bundle);
    }

    /// Arm delivery of the next bundle.
    ///
    /// Returns `None` (and changes nothing) when a primitive is already
    /// pending, a delivered bundle is still animating, or the queue is empty.
    pub fn schedule_next(&mut self) -> Option<ScheduledDelivery> {
        if self.scheduled.is_some() || self.phase != DeliveryPhase::Idle {
            return None;
        }
        let next = self.pending.front()?;

        let trigger = if next.delay.is_zero() {
            DeliveryTrigger::AnimationFrame
        } else {
            DeliveryTrigger::Timer(next.delay)
        };
        self.next_ticket += 1;
        let scheduled = ScheduledDelivery {
            ticket: DeliveryTicket(self.next_ticket),
            trigger,
        };
        self.scheduled = Some(scheduled);
        Some(scheduled)
    }

    /// Take the next bundle for delivery if `ticket` is the armed one.
    pub fn fire(&mut self, ticket: DeliveryTicket) -> Option<Bundle> {
        match self.scheduled {
            Some(scheduled) if scheduled.ticket == ticket => {}
            _ => {
                tracing::debug!(%ticket, "Ignoring stale delivery ticket");
                return None;
            }
        }
        self.scheduled = None;

        let bundle = self.pending.pop_front()?;
        self.phase = DeliveryPhase::Dispatched(ticket);
        Some(bundle)
    }

    /// The renderer has accepted the dispatched bundle.
    pub fn mark_rendered(&mut self, ticket: DeliveryTicket) {
        if self.phase == DeliveryPhase::Dispatched(ticket) {
            self.phase = DeliveryPhase::WaitingForTransitions(ticket);
        }
    }

    /// Close the delivery cycle for `ticket`. Returns false if that cycle is
    /// not the current one.
    pub fn complete(&mut self, ticket: DeliveryTicket) -> bool {
        match self.phase {
            DeliveryPhase::Dispatched(current) | DeliveryPhase::WaitingForTransitions(current)
                if current == ticket =>
            {
                self.phase = DeliveryPhase::Idle;
                true
            }
            _ => false,
        }
    }

    /// Ticket of the bundle currently being shown, if any.
    pub fn in_flight(&self) -> Option<DeliveryTicket> {
        match self.phase {
            DeliveryPhase::Idle => None,
            DeliveryPhase::Dispatched(ticket) | DeliveryPhase::WaitingForTransitions(ticket) => {
                Some(ticket)
            }
        }
    }

    pub fn phase(&self) -> DeliveryPhase {
        self.phase
    }

    pub fn has_pending_primitive(&self) -> bool {
        self.scheduled.is_some()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every queued bundle and forget any armed primitive.
    ///
    /// Returns the number of bundles dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        self.scheduled = None;
        self.phase = DeliveryPhase::Idle;
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::testing::fixtures::{chest, raw_bundle, GAME_NAME};

    fn bundle(version: i64, delay_ms: u64) -> Bundle {
        Bundle::from_raw(&raw_bundle(version, delay_ms), &chest(), GAME_NAME)
    }

    /// Run one full delivery cycle and return the delivered version.
    fn deliver_one(queue: &mut BundleQueue) -> i64 {
        let scheduled = queue.schedule_next().unwrap();
        let delivered = queue.fire(scheduled.ticket).unwrap();
        queue.mark_rendered(scheduled.ticket);
        assert!(queue.complete(scheduled.ticket));
        delivered.version()
    }

    #[test]
    fn delivers_in_fifo_order() {
        let mut queue = BundleQueue::new();
        for version in [5, 6, 7] {
            queue.enqueue(bundle(version, 0));
        }

        let delivered: Vec<i64> = (0..3).map(|_| deliver_one(&mut queue)).collect();
        assert_eq!(delivered, vec![5, 6, 7]);
        assert!(queue.schedule_next().is_none());
    }

    #[test]
    fn schedule_next_is_idempotent() {
        let mut queue = BundleQueue::new();
        for version in [1, 2, 3] {
            queue.enqueue(bundle(version, 0));
        }

        let first = queue.schedule_next();
        assert!(first.is_some());
        assert!(queue.schedule_next().is_none());
        assert!(queue.schedule_next().is_none());
        assert!(queue.has_pending_primitive());
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn no_scheduling_while_transitions_are_outstanding() {
        let mut queue = BundleQueue::new();
        queue.enqueue(bundle(1, 0));
        queue.enqueue(bundle(2, 0));

        let scheduled = queue.schedule_next().unwrap();
        queue.fire(scheduled.ticket).unwrap();
        queue.mark_rendered(scheduled.ticket);
        assert_eq!(
            queue.phase(),
            DeliveryPhase::WaitingForTransitions(scheduled.ticket)
        );
        assert!(queue.schedule_next().is_none());

        assert!(queue.complete(scheduled.ticket));
        assert!(queue.schedule_next().is_some());
    }

    #[test]
    fn trigger_follows_bundle_delay() {
        let mut queue = BundleQueue::new();
        queue.enqueue(bundle(1, 0));
        queue.enqueue(bundle(2, 400));

        let first = queue.schedule_next().unwrap();
        assert_eq!(first.trigger, DeliveryTrigger::AnimationFrame);
        queue.fire(first.ticket).unwrap();
        queue.complete(first.ticket);

        let second = queue.schedule_next().unwrap();
        assert_eq!(
            second.trigger,
            DeliveryTrigger::Timer(Duration::from_millis(400))
        );
    }

    #[test]
    fn stale_tickets_do_not_deliver() {
        let mut queue = BundleQueue::new();
        queue.enqueue(bundle(1, 0));

        let scheduled = queue.schedule_next().unwrap();
        assert_eq!(queue.clear(), 1);
        assert!(!queue.has_pending_primitive());

        queue.enqueue(bundle(2, 0));
        assert!(queue.fire(scheduled.ticket).is_none());

        let fresh = queue.schedule_next().unwrap();
        assert_ne!(fresh.ticket, scheduled.ticket);
        assert_eq!(queue.fire(fresh.ticket).unwrap().version(), 2);
    }

    #[test]
    fn completing_an_old_cycle_is_rejected() {
        let mut queue = BundleQueue::new();
        queue.enqueue(bundle(1, 0));
        queue.enqueue(bundle(2, 0));

        let first = queue.schedule_next().unwrap();
        queue.fire(first.ticket).unwrap();
        assert!(queue.complete(first.ticket));
        assert!(!queue.complete(first.ticket));

        let second = queue.schedule_next().unwrap();
        queue.fire(second.ticket).unwrap();
        assert!(!queue.complete(first.ticket));
        assert_eq!(queue.in_flight(), Some(second.ticket));
    }
}
