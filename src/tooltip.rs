use serde::{Deserialize, Serialize};

/// Minimum distance kept between the tooltip and the viewport's left/right
/// edges.
pub const EDGE_MARGIN: f64 = 10.0;
/// Vertical gap between the hovered marker and the tooltip.
pub const ANCHOR_GAP: f64 = 8.0;

/// Bounding box of a hovered marker, in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub scroll_x: f64,
    pub scroll_y: f64,
}

impl Viewport {
    pub fn unscrolled(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }
}

/// Resolved tooltip position in document coordinates. `above` is set when the
/// tooltip was flipped over the anchor to avoid the bottom edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub left: f64,
    pub top: f64,
    pub above: bool,
}

/// Computes where the shared floating element goes for a hovered anchor:
/// below the anchor and horizontally centered on it, clamped to stay
/// `EDGE_MARGIN` clear of the left and right viewport edges, flipped above
/// the anchor when it would overflow the bottom.
pub fn place(anchor: Rect, tooltip: Size, viewport: Viewport) -> Placement {
    let mut top = anchor.bottom() + viewport.scroll_y + ANCHOR_GAP;
    let mut left = anchor.left + viewport.scroll_x + anchor.width / 2.0 - tooltip.width / 2.0;

    if left < EDGE_MARGIN {
        left = EDGE_MARGIN;
    }
    if left + tooltip.width > viewport.width - EDGE_MARGIN {
        left = viewport.width - tooltip.width - EDGE_MARGIN;
    }

    let above = top + tooltip.height > viewport.height + viewport.scroll_y;
    if above {
        top = anchor.top + viewport.scroll_y - tooltip.height - ANCHOR_GAP;
    }

    Placement { left, top, above }
}

/// The single shared floating element, created lazily on first use and
/// reused for every marker. Held as an owned service (not an ambient global)
/// so tests can construct and inspect their own instance.
pub struct TooltipPresenter {
    viewport: Viewport,
    element: Option<TooltipElement>,
    elements_created: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TooltipElement {
    pub visible: bool,
    pub content: String,
    pub placement: Option<Placement>,
}

impl TooltipPresenter {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            element: None,
            elements_created: 0,
        }
    }

    /// Creates the floating element if it does not exist yet. Idempotent.
    pub fn ensure_element(&mut self) -> &mut TooltipElement {
        if self.element.is_none() {
            self.elements_created += 1;
            self.element = Some(TooltipElement {
                visible: false,
                content: String::new(),
                placement: None,
            });
        }
        self.element.as_mut().expect("element exists after ensure")
    }

    /// Populates the element with the hovered term's definition and positions
    /// it relative to the anchor.
    pub fn show(&mut self, anchor: Rect, content: &str, tooltip: Size) -> Placement {
        let placement = place(anchor, tooltip, self.viewport);
        let element = self.ensure_element();
        element.visible = true;
        element.content = content.to_string();
        element.placement = Some(placement);
        placement
    }

    pub fn hide(&mut self) {
        if let Some(element) = self.element.as_mut() {
            element.visible = false;
        }
    }

    pub fn is_visible(&self) -> bool {
        self.element.as_ref().is_some_and(|element| element.visible)
    }

    pub fn elements_created(&self) -> usize {
        self.elements_created
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOOLTIP: Size = Size {
        width: 200.0,
        height: 60.0,
    };

    fn viewport() -> Viewport {
        Viewport::unscrolled(1024.0, 768.0)
    }

    #[test]
    fn centered_below_the_anchor() {
        let anchor = Rect {
            left: 400.0,
            top: 100.0,
            width: 80.0,
            height: 20.0,
        };
        let placement = place(anchor, TOOLTIP, viewport());
        assert!(!placement.above);
        assert_eq!(placement.top, 128.0);
        assert_eq!(placement.left, 340.0);
    }

    #[test]
    fn clamped_at_the_right_edge() {
        let anchor = Rect {
            left: 1008.0,
            top: 100.0,
            width: 12.0,
            height: 20.0,
        };
        let placement = place(anchor, TOOLTIP, viewport());
        assert!(placement.left + TOOLTIP.width <= 1024.0 - EDGE_MARGIN);
        assert_eq!(placement.left, 1024.0 - TOOLTIP.width - EDGE_MARGIN);
    }

    #[test]
    fn clamped_at_the_left_edge() {
        let anchor = Rect {
            left: 2.0,
            top: 100.0,
            width: 12.0,
            height: 20.0,
        };
        let placement = place(anchor, TOOLTIP, viewport());
        assert_eq!(placement.left, EDGE_MARGIN);
    }

    #[test]
    fn flips_above_near_the_bottom_edge() {
        let anchor = Rect {
            left: 400.0,
            top: 740.0,
            width: 80.0,
            height: 20.0,
        };
        let placement = place(anchor, TOOLTIP, viewport());
        assert!(placement.above);
        assert_eq!(placement.top, 740.0 - TOOLTIP.height - ANCHOR_GAP);
    }

    #[test]
    fn scroll_offsets_shift_document_coordinates() {
        let anchor = Rect {
            left: 400.0,
            top: 100.0,
            width: 80.0,
            height: 20.0,
        };
        let mut scrolled = viewport();
        scrolled.scroll_y = 500.0;
        let placement = place(anchor, TOOLTIP, scrolled);
        assert_eq!(placement.top, 100.0 + 20.0 + 500.0 + ANCHOR_GAP);
    }

    #[test]
    fn element_is_created_exactly_once() {
        let mut presenter = TooltipPresenter::new(viewport());
        let anchor = Rect {
            left: 10.0,
            top: 10.0,
            width: 40.0,
            height: 16.0,
        };
        presenter.show(anchor, "첫 번째 설명", TOOLTIP);
        presenter.hide();
        presenter.show(anchor, "두 번째 설명", TOOLTIP);
        assert_eq!(presenter.elements_created(), 1);
        assert!(presenter.is_visible());
    }

    #[test]
    fn hide_clears_visibility_but_keeps_the_element() {
        let mut presenter = TooltipPresenter::new(viewport());
        presenter.ensure_element();
        presenter.hide();
        assert!(!presenter.is_visible());
        assert_eq!(presenter.elements_created(), 1);
    }
}
