//! Tracking of active links.

use bt_hci::param::ConnHandle;

/// Bounded set of connected link handles.
///
/// Fixed slot storage, linear scans; `MAX` is small. Uniqueness is
/// enforced, order is irrelevant.
pub struct LinkSet<const MAX: usize> {
    slots: [Option<ConnHandle>; MAX],
}

/// Returned by [`LinkSet::add`] when every slot is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkSetFull;

impl<const MAX: usize> LinkSet<MAX> {
    const EMPTY: Option<ConnHandle> = None;

    pub const fn new() -> Self {
        Self {
            slots: [Self::EMPTY; MAX],
        }
    }

    /// Insert a handle. Adding a handle that is already tracked is a no-op.
    pub fn add(&mut self, handle: ConnHandle) -> Result<(), LinkSetFull> {
        if self.contains(handle) {
            return Ok(());
        }
        for slot in self.slots.iter_mut() {
            if slot.is_none() {
                *slot = Some(handle);
                return Ok(());
            }
        }
        Err(LinkSetFull)
    }

    /// Remove a handle, returning whether it was tracked.
    pub fn remove(&mut self, handle: ConnHandle) -> bool {
        for slot in self.slots.iter_mut() {
            if *slot == Some(handle) {
                *slot = None;
                return true;
            }
        }
        false
    }

    pub fn contains(&self, handle: ConnHandle) -> bool {
        self.slots.iter().any(|slot| *slot == Some(handle))
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|slot| slot.is_none())
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = ConnHandle> + '_ {
        self.slots.iter().filter_map(|slot| *slot)
    }

    pub fn clear(&mut self) {
        self.slots = [Self::EMPTY; MAX];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_tracks_connects_minus_disconnects() {
        let mut links = LinkSet::<3>::new();
        assert!(links.is_empty());

        unwrap!(links.add(ConnHandle::new(1)));
        unwrap!(links.add(ConnHandle::new(2)));
        assert_eq!(links.len(), 2);

        assert!(links.remove(ConnHandle::new(1)));
        assert_eq!(links.len(), 1);

        assert!(links.remove(ConnHandle::new(2)));
        assert!(links.is_empty());

        // Removing from an empty set never yields a negative size.
        assert!(!links.remove(ConnHandle::new(2)));
        assert!(links.is_empty());
    }

    #[test]
    fn duplicate_add_is_ignored() {
        let mut links = LinkSet::<3>::new();
        unwrap!(links.add(ConnHandle::new(7)));
        unwrap!(links.add(ConnHandle::new(7)));
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn add_fails_when_full() {
        let mut links = LinkSet::<2>::new();
        unwrap!(links.add(ConnHandle::new(1)));
        unwrap!(links.add(ConnHandle::new(2)));
        assert_eq!(links.add(ConnHandle::new(3)), Err(LinkSetFull));
        assert!(!links.contains(ConnHandle::new(3)));
    }

    #[test]
    fn remove_of_untracked_handle_changes_nothing() {
        let mut links = LinkSet::<2>::new();
        unwrap!(links.add(ConnHandle::new(1)));
        assert!(!links.remove(ConnHandle::new(9)));
        assert_eq!(links.len(), 1);
        assert!(links.contains(ConnHandle::new(1)));
    }

    #[test]
    fn iter_visits_every_tracked_handle_once() {
        let mut links = LinkSet::<4>::new();
        unwrap!(links.add(ConnHandle::new(1)));
        unwrap!(links.add(ConnHandle::new(2)));
        unwrap!(links.add(ConnHandle::new(3)));
        assert!(links.remove(ConnHandle::new(2)));

        let mut seen = [false; 4];
        for handle in links.iter() {
            seen[handle.raw() as usize] = true;
        }
        assert_eq!(seen, [false, true, false, true]);
    }
}
