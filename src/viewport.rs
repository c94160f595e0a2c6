//! Horizontal bounds for the pannable weight graph.

/// Left margin the graph's start may not scroll past.
pub const XAXIS_MIN_POS: f64 = -20.0;

/// Clamp a proposed horizontal offset of the graph container.
///
/// `content_width` is the width of the graph, `viewport_width` the visible
/// width. The start of the graph stays at or left of `margin`, and its end
/// never scrolls left of the visible area.
pub fn clamp_position(proposed: f64, content_width: f64, viewport_width: f64, margin: f64) -> f64 {
    let lowest = -content_width + viewport_width + margin;

    if proposed > margin {
        margin
    } else if proposed < lowest {
        lowest
    } else {
        proposed
    }
}

/// Current offset of the graph container within its viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollViewport {
    x: f64,
    content_width: f64,
    viewport_width: f64,
    margin: f64,
}

impl ScrollViewport {
    pub fn new(viewport_width: f64, margin: f64) -> Self {
        Self {
            x: margin,
            content_width: 0.0,
            viewport_width,
            margin,
        }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn content_width(&self) -> f64 {
        self.content_width
    }

    pub fn viewport_width(&self) -> f64 {
        self.viewport_width
    }

    /// Move the container, returning the clamped offset.
    pub fn pan_to(&mut self, proposed: f64) -> f64 {
        self.x = clamp_position(proposed, self.content_width, self.viewport_width, self.margin);
        self.x
    }

    /// Change the visible width and re-clamp the current offset.
    pub fn resize(&mut self, viewport_width: f64) -> f64 {
        self.viewport_width = viewport_width;
        self.pan_to(self.x)
    }

    /// Swap in new content and scroll to its end, where the newest days are.
    pub fn set_content_width(&mut self, content_width: f64) -> f64 {
        self.content_width = content_width;
        self.pan_to(f64::NEG_INFINITY)
    }
}
