//! Structural change notifications emitted by pages
//!
//! One event per structural mutation, addressed in global coordinates
//! (the page's offset plus the local position).

use tokio::sync::mpsc::UnboundedSender;

/// A structural change of the aggregated list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    Inserted { position: usize },
    RangeInserted { start: usize, count: usize },
    Removed { position: usize },
    RangeRemoved { start: usize, count: usize },
    Changed { position: usize },
    RangeChanged { start: usize, count: usize },
}

impl ChangeEvent {
    pub(crate) fn inserted(start: usize, count: usize) -> Self {
        if count == 1 {
            Self::Inserted { position: start }
        } else {
            Self::RangeInserted { start, count }
        }
    }

    pub(crate) fn removed(start: usize, count: usize) -> Self {
        if count == 1 {
            Self::Removed { position: start }
        } else {
            Self::RangeRemoved { start, count }
        }
    }

    pub(crate) fn changed(start: usize, count: usize) -> Self {
        if count == 1 {
            Self::Changed { position: start }
        } else {
            Self::RangeChanged { start, count }
        }
    }

    /// Net change in element count caused by this event.
    pub fn delta(&self) -> isize {
        match *self {
            Self::Inserted { .. } => 1,
            Self::RangeInserted { count, .. } => count as isize,
            Self::Removed { .. } => -1,
            Self::RangeRemoved { count, .. } => -(count as isize),
            Self::Changed { .. } | Self::RangeChanged { .. } => 0,
        }
    }
}

/// Receives change events in mutation order.
///
/// Listeners are invoked while the pager lock is held, so they must not
/// call back into the pager.
pub trait ChangeListener: Send + Sync {
    fn on_change(&self, event: ChangeEvent);
}

impl ChangeListener for UnboundedSender<ChangeEvent> {
    fn on_change(&self, event: ChangeEvent) {
        // A dropped receiver just means nobody is watching anymore.
        let _ = self.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_counts_collapse_to_single_variants() {
        assert_eq!(ChangeEvent::inserted(4, 1), ChangeEvent::Inserted { position: 4 });
        assert_eq!(
            ChangeEvent::inserted(4, 3),
            ChangeEvent::RangeInserted { start: 4, count: 3 }
        );
        assert_eq!(ChangeEvent::removed(0, 1), ChangeEvent::Removed { position: 0 });
        assert_eq!(ChangeEvent::changed(2, 1), ChangeEvent::Changed { position: 2 });
    }

    #[test]
    fn delta_matches_kind() {
        assert_eq!(ChangeEvent::inserted(0, 5).delta(), 5);
        assert_eq!(ChangeEvent::removed(0, 2).delta(), -2);
        assert_eq!(ChangeEvent::changed(0, 9).delta(), 0);
    }

    #[tokio::test]
    async fn unbounded_sender_forwards_events() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.on_change(ChangeEvent::Removed { position: 1 });
        assert_eq!(rx.recv().await, Some(ChangeEvent::Removed { position: 1 }));
    }
}
