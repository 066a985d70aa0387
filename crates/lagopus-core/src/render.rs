//! Render adapter seam.
//!
//! The driver calls [`RenderAdapter::redraw`] after every tick that changed at
//! least one buffer. Implementations must not block; copying the chart into a
//! UI-owned snapshot is the expected pattern.

use crate::series::Chart;

pub trait RenderAdapter: Send + Sync {
    fn redraw(&self, chart: &Chart);
}

impl<F> RenderAdapter for F
where
    F: Fn(&Chart) + Send + Sync,
{
    fn redraw(&self, chart: &Chart) {
        self(chart)
    }
}

/// Discards redraws; for headless use and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRender;

impl RenderAdapter for NoRender {
    fn redraw(&self, _chart: &Chart) {}
}
