use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CoreError, Result};

/// A viewport selection expressed as fractions of the plotted pixel width
///
/// Serialized as `null` for the full extent or as a `[start, end]` pair.
/// Saved zooms store this unit, so it must not change.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ZoomWindow {
    /// Full extent
    #[default]
    Home,
    /// Brushed interval, `0 <= start < end <= 1`
    Range { start: f64, end: f64 },
}

impl ZoomWindow {
    /// Create a range window, rejecting anything outside `0 <= start < end <= 1`
    pub fn range(start: f64, end: f64) -> Result<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(CoreError::ValidationFailed(format!(
                "zoom window bounds must be finite, got [{start}, {end}]"
            )));
        }
        if start < 0.0 || end > 1.0 || start >= end {
            return Err(CoreError::ValidationFailed(format!(
                "zoom window [{start}, {end}] is not within 0 <= start < end <= 1"
            )));
        }
        Ok(ZoomWindow::Range { start, end })
    }

    /// Convert a brush extent in pixels into a window.
    ///
    /// The extent is clamped to the brushable width; an empty brush is the home window.
    pub fn from_brush_pixels(start_px: f64, end_px: f64, brush_width: f64) -> Self {
        if !(brush_width > 0.0) {
            return ZoomWindow::Home;
        }
        let a = (start_px / brush_width).clamp(0.0, 1.0);
        let b = (end_px / brush_width).clamp(0.0, 1.0);
        let (start, end) = if a <= b { (a, b) } else { (b, a) };
        ZoomWindow::range(start, end).unwrap_or(ZoomWindow::Home)
    }

    pub fn is_home(&self) -> bool {
        matches!(self, ZoomWindow::Home)
    }

    pub fn bounds(&self) -> Option<(f64, f64)> {
        match *self {
            ZoomWindow::Home => None,
            ZoomWindow::Range { start, end } => Some((start, end)),
        }
    }

    /// Pixel extent of this window on a plot of the given width
    pub fn to_pixels(&self, width: f64) -> Option<(f64, f64)> {
        self.bounds().map(|(start, end)| (start * width, end * width))
    }

    /// Portion of the data domain `[min, max]` that this window shows
    pub fn visible_extent(&self, min: f64, max: f64) -> (f64, f64) {
        match *self {
            ZoomWindow::Home => (min, max),
            ZoomWindow::Range { start, end } => {
                let span = max - min;
                (min + span * start, min + span * end)
            }
        }
    }
}

impl Serialize for ZoomWindow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.bounds()
            .map(|(start, end)| [start, end])
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ZoomWindow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Option::<[f64; 2]>::deserialize(deserializer)? {
            None => Ok(ZoomWindow::Home),
            Some([start, end]) => ZoomWindow::range(start, end).map_err(de::Error::custom),
        }
    }
}

/// Ordered history of viewport selections; never empty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ZoomWindow>", into = "Vec<ZoomWindow>")]
pub struct ZoomPath(Vec<ZoomWindow>);

impl ZoomPath {
    /// The one-element path `[null]`
    pub fn home() -> Self {
        ZoomPath(vec![ZoomWindow::Home])
    }

    pub fn new(windows: Vec<ZoomWindow>) -> Result<Self> {
        if windows.is_empty() {
            return Err(CoreError::ValidationFailed(
                "zoom sequence must contain at least one window".to_string(),
            ));
        }
        Ok(ZoomPath(windows))
    }

    /// Path for a tracker log; an empty log is the home path
    pub(crate) fn from_log(log: &[ZoomWindow]) -> Self {
        if log.is_empty() {
            ZoomPath::home()
        } else {
            ZoomPath(log.to_vec())
        }
    }

    pub fn windows(&self) -> &[ZoomWindow] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a constructed path
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> ZoomWindow {
        self.0.first().copied().unwrap_or_default()
    }

    pub fn last(&self) -> ZoomWindow {
        self.0.last().copied().unwrap_or_default()
    }

    pub fn is_home(&self) -> bool {
        self.0.iter().all(ZoomWindow::is_home)
    }

    /// Windows after the last reset in this path
    pub fn since_last_reset(&self) -> Vec<ZoomWindow> {
        let start = self
            .0
            .iter()
            .rposition(ZoomWindow::is_home)
            .map(|idx| idx + 1)
            .unwrap_or(0);
        self.0[start..].to_vec()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ZoomWindow> {
        self.0.iter()
    }
}

impl Default for ZoomPath {
    fn default() -> Self {
        ZoomPath::home()
    }
}

impl TryFrom<Vec<ZoomWindow>> for ZoomPath {
    type Error = CoreError;

    fn try_from(windows: Vec<ZoomWindow>) -> Result<Self> {
        ZoomPath::new(windows)
    }
}

impl From<ZoomPath> for Vec<ZoomWindow> {
    fn from(path: ZoomPath) -> Self {
        path.0
    }
}
