//! Request ID allocation and dispatch
//!
//! Every SFTP request carries a 32-bit ID so responses can be matched
//! to outstanding operations in any order. IDs are allocated
//! first-fit-lowest from 256 upward: the live-ID vector is kept
//! sorted, so the length of its dense prefix (`ids[i] == i + 256`) can
//! be found by binary search, and the first free ID sits just past it.

use std::collections::HashMap;

/// IDs below this are never allocated, keeping them clear of any
/// values a confused server might fabricate.
pub const REQUEST_ID_OFFSET: u32 = 256;

/// An outstanding request's ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestHandle(u32);

impl RequestHandle {
    pub fn id(&self) -> u32 {
        self.0
    }
}

#[derive(Debug, Default)]
struct RequestState {
    registered: bool,
    userdata: Option<u64>,
}

/// The registry of outstanding requests.
#[derive(Debug, Default)]
pub struct RequestSet {
    /// Sorted vector of live IDs; the index is the order statistic.
    ids: Vec<u32>,
    states: HashMap<u32, RequestState>,
}

impl RequestSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Allocate the lowest unused ID at or above the offset.
    pub fn alloc(&mut self) -> RequestHandle {
        // The predicate "entry i is part of the dense initial run" is
        // monotone over the sorted vector, so binary search finds the
        // run's length.
        let (mut lo, mut hi) = (0usize, self.ids.len());
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.ids[mid] == mid as u32 + REQUEST_ID_OFFSET {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        let id = lo as u32 + REQUEST_ID_OFFSET;
        self.ids.insert(lo, id);
        self.states.insert(id, RequestState::default());
        RequestHandle(id)
    }

    /// Make the request visible to [`find`](Self::find). A response
    /// for an unregistered ID is treated as a protocol error.
    pub fn register(&mut self, req: RequestHandle) {
        if let Some(state) = self.states.get_mut(&req.0) {
            state.registered = true;
        }
    }

    /// Attach an opaque tag, used by the transfer engine to link a
    /// request to its in-flight queue node.
    pub fn set_userdata(&mut self, req: RequestHandle, userdata: u64) {
        if let Some(state) = self.states.get_mut(&req.0) {
            state.userdata = Some(userdata);
        }
    }

    /// Claim the request matching a response ID, removing it from the
    /// registry. `None` for unknown or unregistered IDs.
    pub fn find(&mut self, id: u32) -> Option<(RequestHandle, Option<u64>)> {
        let registered = self.states.get(&id).is_some_and(|s| s.registered);
        if !registered {
            return None;
        }
        let state = self.states.remove(&id)?;
        if let Ok(pos) = self.ids.binary_search(&id) {
            self.ids.remove(pos);
        }
        Some((RequestHandle(id), state.userdata))
    }

    /// Drop every outstanding request.
    pub fn cleanup(&mut self) {
        self.ids.clear();
        self.states.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_fit_allocation_order() {
        let mut set = RequestSet::new();
        assert_eq!(set.alloc().id(), 256);
        assert_eq!(set.alloc().id(), 257);
        assert_eq!(set.alloc().id(), 258);

        set.register(RequestHandle(257));
        assert!(set.find(257).is_some());

        assert_eq!(set.alloc().id(), 257);
        assert_eq!(set.alloc().id(), 259);
    }

    #[test]
    fn test_dense_run_of_allocations() {
        let mut set = RequestSet::new();
        for i in 0..100 {
            assert_eq!(set.alloc().id(), 256 + i);
        }
        assert_eq!(set.len(), 100);
    }

    #[test]
    fn test_freed_id_is_reused_first() {
        let mut set = RequestSet::new();
        let handles: Vec<_> = (0..10).map(|_| set.alloc()).collect();
        for h in &handles {
            set.register(*h);
        }
        assert!(set.find(260).is_some());
        assert!(set.find(263).is_some());
        assert_eq!(set.alloc().id(), 260);
        assert_eq!(set.alloc().id(), 263);
        assert_eq!(set.alloc().id(), 266);
    }

    #[test]
    fn test_unregistered_requests_are_not_found() {
        let mut set = RequestSet::new();
        let req = set.alloc();
        assert!(set.find(req.id()).is_none());
        set.register(req);
        assert!(set.find(req.id()).is_some());
        // Claimed exactly once.
        assert!(set.find(req.id()).is_none());
    }

    #[test]
    fn test_userdata_round_trip() {
        let mut set = RequestSet::new();
        let req = set.alloc();
        set.register(req);
        set.set_userdata(req, 42);
        let (found, userdata) = set.find(req.id()).unwrap();
        assert_eq!(found, req);
        assert_eq!(userdata, Some(42));
    }
}
