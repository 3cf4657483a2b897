use serde::{Deserialize, Serialize};

/// Screen and window bounds as reported by `window.screen` and `window`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenGeometry {
    /// `screen.width`.
    pub screen_width: f64,
    /// `screen.height`.
    pub screen_height: f64,
    /// `screen.availWidth`.
    pub avail_width: f64,
    /// `screen.availHeight`.
    pub avail_height: f64,
    /// `window.screenX`.
    pub window_x: f64,
    /// `window.screenY`.
    pub window_y: f64,
    /// `window.outerWidth`.
    pub outer_width: f64,
    /// `window.outerHeight`.
    pub outer_height: f64,
}

impl ScreenGeometry {
    /// Single display with the window maximized on it.
    pub fn single(width: f64, height: f64) -> Self {
        Self {
            screen_width: width,
            screen_height: height,
            avail_width: width,
            avail_height: height,
            window_x: 0.0,
            window_y: 0.0,
            outer_width: width,
            outer_height: height,
        }
    }

    /// First bound the window breaks, if any.
    ///
    /// An extended desktop reports a screen much larger than the usable
    /// area, and a window dragged onto another display has a negative
    /// origin or reaches past the usable area.
    pub fn spanning_reason(&self) -> Option<&'static str> {
        if self.screen_width > self.avail_width * 1.5 {
            Some("screen width exceeds available width")
        } else if self.screen_height > self.avail_height * 1.5 {
            Some("screen height exceeds available height")
        } else if self.window_x < 0.0 || self.window_y < 0.0 {
            Some("window origin is off the primary display")
        } else if self.window_x + self.outer_width > self.avail_width {
            Some("window extends past the right edge")
        } else if self.window_y + self.outer_height > self.avail_height {
            Some("window extends past the bottom edge")
        } else {
            None
        }
    }
}

/// Snapshot access to the candidate's browser environment.
pub trait HostEnvironment: Send + Sync {
    /// Current screen and window bounds.
    fn screen_geometry(&self) -> ScreenGeometry;

    /// `navigator.onLine`.
    fn is_online(&self) -> bool;
}
