//! Fixed registry of series transforms
//!
//! Transforms only rewrite `y`; length and every `x` are preserved.

use indexmap::IndexMap;
use tracing::debug;

use crate::series::{Point, Series};

/// A registered transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    /// Centered moving average over `window` samples, clipped at the series ends
    MovingAverage { window: usize },
    /// Multiply every y by a constant
    Multiply { factor: f64 },
}

impl Transform {
    pub fn apply(&self, series: &Series) -> Series {
        match *self {
            Transform::MovingAverage { window } => moving_average(series, window),
            Transform::Multiply { factor } => series
                .iter()
                .map(|p| Point::new(p.x, p.y * factor))
                .collect(),
        }
    }
}

/// Named transforms available to views
#[derive(Debug, Clone)]
pub struct TransformRegistry {
    transforms: IndexMap<&'static str, Transform>,
}

impl TransformRegistry {
    /// Registry with the standard set
    pub fn standard() -> Self {
        let mut transforms = IndexMap::new();
        let averages = [
            ("SMA20", 20),
            ("SMA50", 50),
            ("SMA100", 100),
            ("SMA500", 500),
            ("SMA1000", 1000),
        ];
        for (name, window) in averages {
            transforms.insert(name, Transform::MovingAverage { window });
        }
        transforms.insert("x100", Transform::Multiply { factor: 100.0 });
        Self { transforms }
    }

    /// Registered names in registration order
    pub fn names(&self) -> Vec<&'static str> {
        self.transforms.keys().copied().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Transform> {
        self.transforms.get(name).copied()
    }

    /// Apply the named transform; unknown names return the input unchanged
    pub fn apply(&self, name: &str, series: &Series) -> Series {
        match self.get(name) {
            Some(transform) => transform.apply(series),
            None => {
                debug!(name, "Unknown transform, passing series through");
                series.clone()
            }
        }
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Running sum over a window that keeps non-finite samples out of the float sum
#[derive(Default)]
struct WindowSum {
    sum: f64,
    count: usize,
    nan: usize,
    pos_inf: usize,
    neg_inf: usize,
}

impl WindowSum {
    fn add(&mut self, y: f64) {
        self.count += 1;
        if y.is_nan() {
            self.nan += 1;
        } else if y == f64::INFINITY {
            self.pos_inf += 1;
        } else if y == f64::NEG_INFINITY {
            self.neg_inf += 1;
        } else {
            self.sum += y;
        }
    }

    fn remove(&mut self, y: f64) {
        self.count -= 1;
        if y.is_nan() {
            self.nan -= 1;
        } else if y == f64::INFINITY {
            self.pos_inf -= 1;
        } else if y == f64::NEG_INFINITY {
            self.neg_inf -= 1;
        } else {
            self.sum -= y;
        }
    }

    fn mean(&self) -> f64 {
        if self.nan > 0 || (self.pos_inf > 0 && self.neg_inf > 0) {
            f64::NAN
        } else if self.pos_inf > 0 {
            f64::INFINITY
        } else if self.neg_inf > 0 {
            f64::NEG_INFINITY
        } else {
            self.sum / self.count as f64
        }
    }
}

/// y'[i] is the mean of y[j] for j in [i - window/2, i + window/2), clipped to the series
fn moving_average(series: &Series, window: usize) -> Series {
    let points = series.points();
    let len = points.len();
    let half = window / 2;
    let mut out = Series::with_capacity(len);
    let mut acc = WindowSum::default();
    let (mut lo, mut hi) = (0usize, 0usize);

    for (i, point) in points.iter().enumerate() {
        // Always include the sample itself
        let start = i.saturating_sub(half);
        let end = (i + half).max(i + 1).min(len);

        while hi < end {
            acc.add(points[hi].y);
            hi += 1;
        }
        while lo < start {
            acc.remove(points[lo].y);
            lo += 1;
        }
        out.push(Point::new(point.x, acc.mean()));
    }
    out
}
