use shared::ElementRef;

/// Hover and pick state of one session.
///
/// At most one hovered and one picked element. Picking replaces the previous
/// pick, there is no multi-select.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    hovered: Option<ElementRef>,
    picked: Option<ElementRef>,
    /// Bumped on every change (for cache invalidation by observers)
    version: u64,
}

impl SelectionState {
    /// Element under the pointer, if any
    pub fn hovered(&self) -> Option<&ElementRef> {
        self.hovered.as_ref()
    }

    /// The sole picked element, if any
    pub fn picked(&self) -> Option<&ElementRef> {
        self.picked.as_ref()
    }

    /// Picked element first, hovered one otherwise
    pub fn focus(&self) -> Option<&ElementRef> {
        self.picked.as_ref().or(self.hovered.as_ref())
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Replace the hover target. Returns true if it changed.
    pub fn set_hovered(&mut self, element: Option<ElementRef>) -> bool {
        if self.hovered == element {
            return false;
        }
        self.hovered = element;
        self.version += 1;
        true
    }

    /// Exclusive pick: the new element replaces any previous one
    pub fn pick(&mut self, element: ElementRef) {
        if self.picked.as_ref() != Some(&element) {
            self.picked = Some(element);
            self.version += 1;
        }
    }

    pub fn is_picked(&self, element: &ElementRef) -> bool {
        self.picked.as_ref() == Some(element)
    }

    /// Number of picked elements (0 or 1)
    pub fn picked_count(&self) -> usize {
        usize::from(self.picked.is_some())
    }

    /// Clear hover and pick
    pub fn clear(&mut self) {
        if self.hovered.is_some() || self.picked.is_some() {
            self.hovered = None;
            self.picked = None;
            self.version += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ModelId;

    fn el(id: u32) -> ElementRef {
        ElementRef::new(ModelId(0), id)
    }

    #[test]
    fn test_initial_empty() {
        let s = SelectionState::default();
        assert!(s.hovered().is_none());
        assert!(s.picked().is_none());
        assert_eq!(s.picked_count(), 0);
    }

    #[test]
    fn test_pick_replaces_previous() {
        let mut s = SelectionState::default();
        s.pick(el(1));
        s.pick(el(2));
        assert_eq!(s.picked_count(), 1);
        assert!(!s.is_picked(&el(1)));
        assert!(s.is_picked(&el(2)));
    }

    #[test]
    fn test_same_hover_is_not_a_change() {
        let mut s = SelectionState::default();
        assert!(s.set_hovered(Some(el(3))));
        let v = s.version();
        assert!(!s.set_hovered(Some(el(3))));
        assert_eq!(s.version(), v);
        assert!(s.set_hovered(None));
    }

    #[test]
    fn test_focus_prefers_pick() {
        let mut s = SelectionState::default();
        s.set_hovered(Some(el(1)));
        assert_eq!(s.focus(), Some(&el(1)));
        s.pick(el(2));
        assert_eq!(s.focus(), Some(&el(2)));
    }

    #[test]
    fn test_clear() {
        let mut s = SelectionState::default();
        s.set_hovered(Some(el(1)));
        s.pick(el(2));
        s.clear();
        assert!(s.focus().is_none());
    }
}
