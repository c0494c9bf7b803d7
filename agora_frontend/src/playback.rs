//! Cooperative "one player at a time" coordination.
//!
//! The coordinator only records which registered element may play. Each
//! [`PlaybackSession`] enforces that for its own element by comparing the
//! current id with its own before calling `play()`; nothing here reaches
//! into another element.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use agora_content::MediaKind;
use log::debug;

/// A playable element as seen by the coordinator.
pub trait MediaElement {
    fn play(&mut self);
    fn pause(&mut self);
    fn is_playing(&self) -> bool;
}

#[derive(Debug, Default)]
struct CoordinatorState {
    registered: HashMap<String, MediaKind>,
    current: Option<String>,
}

/// Owned by the application root and handed down by cloning; all clones
/// share one registry.
#[derive(Debug, Clone, Default)]
pub struct PlaybackCoordinator {
    state: Rc<RefCell<CoordinatorState>>,
}

impl PlaybackCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: impl Into<String>, kind: MediaKind) {
        self.state.borrow_mut().registered.insert(id.into(), kind);
    }

    /// Removes `id`; if it held the current slot, nobody plays afterwards.
    pub fn unregister(&self, id: &str) {
        let mut state = self.state.borrow_mut();
        state.registered.remove(id);
        if state.current.as_deref() == Some(id) {
            state.current = None;
        }
    }

    /// Makes `id` the sole current player. Unknown ids are ignored.
    pub fn request_play(&self, id: &str) -> bool {
        let mut state = self.state.borrow_mut();
        if !state.registered.contains_key(id) {
            debug!("ignoring play request for unregistered media {id}");
            return false;
        }
        state.current = Some(id.to_string());
        true
    }

    /// Clears the current slot if `id` holds it.
    pub fn release(&self, id: &str) {
        let mut state = self.state.borrow_mut();
        if state.current.as_deref() == Some(id) {
            state.current = None;
        }
    }

    pub fn current(&self) -> Option<String> {
        self.state.borrow().current.clone()
    }

    pub fn is_current(&self, id: &str) -> bool {
        self.state.borrow().current.as_deref() == Some(id)
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.state.borrow().registered.contains_key(id)
    }

    pub fn registered_count(&self) -> usize {
        self.state.borrow().registered.len()
    }
}

/// Registration of one mounted element. Dropping the session unregisters it.
pub struct PlaybackSession<E: MediaElement> {
    id: String,
    coordinator: PlaybackCoordinator,
    element: E,
    visible: bool,
}

impl<E: MediaElement> PlaybackSession<E> {
    pub fn new(coordinator: &PlaybackCoordinator, kind: MediaKind, element: E) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        coordinator.register(id.clone(), kind);
        Self {
            id,
            coordinator: coordinator.clone(),
            element,
            visible: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn element(&self) -> &E {
        &self.element
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Entering view claims the current slot; leaving view pauses this
    /// element and gives the slot up.
    pub fn on_visibility_change(&mut self, visible: bool) {
        if visible == self.visible {
            return;
        }
        self.visible = visible;
        if visible {
            self.coordinator.request_play(&self.id);
        } else {
            self.element.pause();
            self.coordinator.release(&self.id);
        }
        self.sync();
    }

    /// Plays only while this session holds the current slot.
    pub fn sync(&mut self) {
        let should_play = self.coordinator.is_current(&self.id);
        match (should_play, self.element.is_playing()) {
            (true, false) => self.element.play(),
            (false, true) => self.element.pause(),
            _ => {}
        }
    }
}

impl<E: MediaElement> Drop for PlaybackSession<E> {
    fn drop(&mut self) {
        self.coordinator.unregister(&self.id);
    }
}
