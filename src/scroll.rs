/// Viewport geometry reported by the host view on every scroll event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub viewport_height: f64,
    pub content_height: f64,
}

impl ScrollMetrics {
    pub fn new(scroll_top: f64, viewport_height: f64, content_height: f64) -> Self {
        Self { scroll_top, viewport_height, content_height }
    }

    /// Viewport pinned to the end of the content.
    pub fn at_end(viewport_height: f64, content_height: f64) -> Self {
        Self::new((content_height - viewport_height).max(0.0), viewport_height, content_height)
    }

    pub fn distance_to_bottom(&self) -> f64 {
        (self.content_height - (self.scroll_top + self.viewport_height)).max(0.0)
    }

    pub fn is_near_bottom(&self, threshold_px: f64) -> bool { self.distance_to_bottom() <= threshold_px }
}
