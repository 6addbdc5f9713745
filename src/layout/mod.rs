//! Maps each visible comment to a vertical position that tracks its anchor
//! in the document while keeping comment cards from overlapping.
//!
//! The controller never touches the store: it keeps a parallel map keyed by
//! the same local ids and tolerates entries whose comment has since been
//! removed. DOM measurement sits behind [`AnchorNode`] so the packing
//! algorithm itself is plain arithmetic.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::sequences::CommentId;

/// Vertical clearance kept between adjacent comment cards, in pixels.
pub const GAP: f64 = 10.0;

/// Opaque link from a comment to its in-content marker. Issued by the
/// integration layer; the store never dereferences it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct AnnotationHandle(pub u32);

/// A position source for one comment: the anchored content element, or the
/// collapsed container standing in for it.
pub trait AnchorNode {
    /// Top of the anchor in page coordinates. `None` while detached from
    /// the document (no measurement possible).
    fn top(&self) -> Option<f64>;
    /// Tab/pane the anchor lives in; `None` for untabbed content.
    fn tab(&self) -> Option<String>;
}

#[derive(Default)]
pub struct LayoutController {
    /// Anchor registered per comment card (fallback position source).
    elements: BTreeMap<CommentId, Rc<dyn AnchorNode>>,
    /// In-content marker per comment (preferred position source).
    annotations: BTreeMap<CommentId, Rc<dyn AnchorNode>>,
    heights: BTreeMap<CommentId, f64>,
    desired: BTreeMap<CommentId, f64>,
    resolved: BTreeMap<CommentId, f64>,
    pinned_comment: Option<CommentId>,
    is_dirty: bool,
}

impl LayoutController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or with `None`, unregister) the card element used as the
    /// fallback position source. A registered annotation survives element
    /// unregistration, so a card that unmounts and remounts (tab switches)
    /// keeps its preferred position source. Once neither an annotation nor
    /// an element remains, every piece of metadata for the id is dropped;
    /// this is how stale entries get pruned.
    pub fn set_comment_element(&mut self, local_id: CommentId, anchor: Option<Rc<dyn AnchorNode>>) {
        match anchor {
            Some(anchor) => {
                self.elements.insert(local_id, anchor);
            }
            None => {
                self.elements.remove(&local_id);
                self.heights.remove(&local_id);
                if !self.annotations.contains_key(&local_id) {
                    self.desired.remove(&local_id);
                    self.resolved.remove(&local_id);
                }
            }
        }
        self.is_dirty = true;
    }

    pub fn set_comment_annotation(&mut self, local_id: CommentId, annotation: Rc<dyn AnchorNode>) {
        self.annotations.insert(local_id, annotation);
        self.is_dirty = true;
    }

    /// Drop a comment's in-content marker; the registered card element, if
    /// any, becomes the position source again.
    pub fn remove_comment_annotation(&mut self, local_id: CommentId) {
        if self.annotations.remove(&local_id).is_some() {
            self.is_dirty = true;
        }
        if !self.elements.contains_key(&local_id) {
            self.heights.remove(&local_id);
            self.desired.remove(&local_id);
            self.resolved.remove(&local_id);
        }
    }

    /// Record the last-measured rendered height of a comment card.
    pub fn set_comment_height(&mut self, local_id: CommentId, height: f64) {
        if self.heights.get(&local_id) != Some(&height) {
            self.heights.insert(local_id, height);
            self.is_dirty = true;
        }
    }

    /// The pinned comment keeps anchor priority: it sorts ahead of anything
    /// sharing its natural position, so only comments genuinely above it
    /// can push it in the packing pass.
    pub fn set_pinned_comment(&mut self, local_id: Option<CommentId>) {
        if self.pinned_comment != local_id {
            self.pinned_comment = local_id;
            self.is_dirty = true;
        }
    }

    fn anchor_for(&self, local_id: CommentId) -> Option<&Rc<dyn AnchorNode>> {
        self.annotations
            .get(&local_id)
            .or_else(|| self.elements.get(&local_id))
    }

    /// Whether the comment's anchor lies within the given tab. Comments with
    /// untabbed anchors (or none registered yet) are treated as visible.
    pub fn get_comment_visible(&self, tab: Option<&str>, local_id: CommentId) -> bool {
        match self.anchor_for(local_id) {
            Some(anchor) => match anchor.tab() {
                Some(anchor_tab) => tab == Some(anchor_tab.as_str()),
                None => true,
            },
            None => true,
        }
    }

    /// Re-read each visible comment's natural top position from its anchor.
    /// Comments outside the active tab lose their desired position and drop
    /// out of the packing pass. Returns whether anything moved.
    pub fn refresh_desired_positions(&mut self, tab: Option<&str>) -> bool {
        let ids: Vec<CommentId> = self
            .annotations
            .keys()
            .chain(self.elements.keys())
            .copied()
            .collect();

        let mut changed = false;
        for local_id in ids {
            if !self.get_comment_visible(tab, local_id) {
                changed |= self.desired.remove(&local_id).is_some();
                continue;
            }
            let Some(top) = self.anchor_for(local_id).and_then(|a| a.top()) else {
                continue;
            };
            if self.desired.get(&local_id) != Some(&top) {
                self.desired.insert(local_id, top);
                changed = true;
            }
        }

        if changed {
            self.is_dirty = true;
        }
        changed
    }

    /// One top-to-bottom overlap-resolution sweep over the comments in
    /// natural order. Each overlapping card is pushed down to clear the one
    /// above it by [`GAP`]; nothing is ever pushed up within a pass.
    /// Returns true if any resolved position changed since the last pass,
    /// signalling the caller to re-render (and, after re-measuring heights,
    /// call again until it reports no change).
    pub fn refresh_layout(&mut self) -> bool {
        if !self.is_dirty {
            return false;
        }

        let mut ordered: Vec<(CommentId, f64)> =
            self.desired.iter().map(|(id, top)| (*id, *top)).collect();
        ordered.sort_by(|(a_id, a_top), (b_id, b_top)| {
            a_top
                .partial_cmp(b_top)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    // Pinned comment wins ties for its natural position.
                    let a_pinned = Some(*a_id) == self.pinned_comment;
                    let b_pinned = Some(*b_id) == self.pinned_comment;
                    b_pinned.cmp(&a_pinned)
                })
                .then(a_id.cmp(b_id))
        });

        let mut resolved: BTreeMap<CommentId, f64> = BTreeMap::new();
        let mut previous: Option<(f64, f64)> = None;
        for (local_id, desired_top) in ordered {
            let height = self.heights.get(&local_id).copied().unwrap_or(0.0);
            let mut top = desired_top;
            if let Some((prev_top, prev_height)) = previous {
                if top < prev_top + prev_height {
                    top = prev_top + prev_height + GAP;
                }
            }
            resolved.insert(local_id, top);
            previous = Some((top, height));
        }

        let changed = resolved != self.resolved;
        self.resolved = resolved;
        self.is_dirty = false;
        changed
    }

    /// Resolved top position for a comment, if it took part in the last
    /// packing pass.
    pub fn get_comment_position(&self, local_id: CommentId) -> Option<f64> {
        self.resolved
            .get(&local_id)
            .or_else(|| self.desired.get(&local_id))
            .copied()
    }
}
