//! View state, time-window math and vertical scaling
//!
//! Everything here is pure arithmetic over a [`Recording`](crate::Recording)'s
//! shape. [`render_frame`](crate::render_frame) combines it into draw
//! primitives.

use std::ops::Range;

use log::{trace, warn};

use crate::types::ChannelDescriptor;

/// Drag-to-scroll damping used when none is configured
pub const DEFAULT_DRAG_SENSITIVITY: f64 = 5.0;

/// Initial settings for a [`ViewState`]
///
/// ```rust
/// use edfview::{ViewConfig, ViewState};
///
/// let config = ViewConfig::default()
///     .with_time_window(30.0)
///     .with_auto_scale(true);
/// let state = ViewState::from_config(&config);
///
/// assert_eq!(state.time_window_seconds(), 30.0);
/// assert_eq!(state.amplitude_scale(), 1.0);
/// assert!(state.auto_scale());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ViewConfig {
    pub amplitude_scale: f64,
    pub time_window_seconds: f64,
    pub scroll_percent: f64,
    pub auto_scale: bool,
    /// Divides the pointer travel (in percent of the viewport) before it is
    /// applied to the scroll position
    pub drag_sensitivity: f64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        ViewConfig {
            amplitude_scale: 1.0,
            time_window_seconds: 10.0,
            scroll_percent: 0.0,
            auto_scale: false,
            drag_sensitivity: DEFAULT_DRAG_SENSITIVITY,
        }
    }
}

impl ViewConfig {
    pub fn with_amplitude_scale(mut self, scale: f64) -> Self {
        self.amplitude_scale = scale;
        self
    }

    pub fn with_time_window(mut self, seconds: f64) -> Self {
        self.time_window_seconds = seconds;
        self
    }

    pub fn with_scroll_percent(mut self, percent: f64) -> Self {
        self.scroll_percent = percent;
        self
    }

    pub fn with_auto_scale(mut self, auto_scale: bool) -> Self {
        self.auto_scale = auto_scale;
        self
    }

    pub fn with_drag_sensitivity(mut self, divisor: f64) -> Self {
        self.drag_sensitivity = divisor;
        self
    }
}

/// Pan interaction state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        anchor_scroll_percent: f64,
        anchor_pointer_x: f64,
    },
}

/// Pointer input fed to [`ViewState::handle_pointer`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down { x: f64 },
    Move { x: f64 },
    Up,
    Leave,
}

/// Mutable view settings read by the renderer on every frame
///
/// Setters sanitise their input instead of failing: scroll is clamped into
/// `[0, 100]`, and non-positive or non-finite scale and window values are
/// ignored. Every setter returns whether the state actually changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    amplitude_scale: f64,
    time_window_seconds: f64,
    scroll_percent: f64,
    auto_scale: bool,
    drag: DragState,
    drag_sensitivity: f64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::from_config(&ViewConfig::default())
    }
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a state from `config`, replacing invalid values with defaults
    pub fn from_config(config: &ViewConfig) -> Self {
        let defaults = ViewConfig::default();
        let positive_or = |v: f64, fallback: f64| if is_positive(v) { v } else { fallback };

        ViewState {
            amplitude_scale: positive_or(config.amplitude_scale, defaults.amplitude_scale),
            time_window_seconds: positive_or(config.time_window_seconds, defaults.time_window_seconds),
            scroll_percent: clamp_percent(config.scroll_percent),
            auto_scale: config.auto_scale,
            drag: DragState::Idle,
            drag_sensitivity: positive_or(config.drag_sensitivity, defaults.drag_sensitivity),
        }
    }

    pub fn amplitude_scale(&self) -> f64 {
        self.amplitude_scale
    }

    pub fn time_window_seconds(&self) -> f64 {
        self.time_window_seconds
    }

    pub fn scroll_percent(&self) -> f64 {
        self.scroll_percent
    }

    pub fn auto_scale(&self) -> bool {
        self.auto_scale
    }

    pub fn drag_state(&self) -> DragState {
        self.drag
    }

    pub fn drag_sensitivity(&self) -> f64 {
        self.drag_sensitivity
    }

    pub fn set_amplitude_scale(&mut self, scale: f64) -> bool {
        if !is_positive(scale) {
            warn!("Ignoring amplitude scale {}", scale);
            return false;
        }
        replace(&mut self.amplitude_scale, scale)
    }

    pub fn set_time_window(&mut self, seconds: f64) -> bool {
        if !is_positive(seconds) {
            warn!("Ignoring time window {}", seconds);
            return false;
        }
        replace(&mut self.time_window_seconds, seconds)
    }

    pub fn set_scroll_percent(&mut self, percent: f64) -> bool {
        replace(&mut self.scroll_percent, clamp_percent(percent))
    }

    pub fn set_auto_scale(&mut self, auto_scale: bool) -> bool {
        let changed = self.auto_scale != auto_scale;
        self.auto_scale = auto_scale;
        changed
    }

    pub fn set_drag_sensitivity(&mut self, divisor: f64) -> bool {
        if !is_positive(divisor) {
            warn!("Ignoring drag sensitivity {}", divisor);
            return false;
        }
        replace(&mut self.drag_sensitivity, divisor)
    }

    /// Drops any drag in progress without touching the scroll position
    pub fn cancel_drag(&mut self) {
        self.drag = DragState::Idle;
    }

    /// Advances the pan state machine
    ///
    /// `Down` anchors a drag from `Idle` (ignored while already dragging),
    /// `Move` while dragging rescrolls relative to the anchor, `Up`/`Leave`
    /// return to `Idle`. Any other combination is a no-op. Returns whether
    /// the scroll position changed.
    ///
    /// ```rust
    /// use edfview::{DragState, PointerEvent, ViewState};
    ///
    /// let mut state = ViewState::new();
    /// state.set_scroll_percent(50.0);
    ///
    /// state.handle_pointer(PointerEvent::Down { x: 400.0 }, 800.0);
    /// // 向左拖动半个视口：50% / 5 = 10%
    /// assert!(state.handle_pointer(PointerEvent::Move { x: 0.0 }, 800.0));
    /// assert_eq!(state.scroll_percent(), 60.0);
    ///
    /// state.handle_pointer(PointerEvent::Up, 800.0);
    /// assert_eq!(state.drag_state(), DragState::Idle);
    /// ```
    pub fn handle_pointer(&mut self, event: PointerEvent, viewport_width: f64) -> bool {
        match (self.drag, event) {
            (DragState::Idle, PointerEvent::Down { x }) => {
                self.drag = DragState::Dragging {
                    anchor_scroll_percent: self.scroll_percent,
                    anchor_pointer_x: x,
                };
                trace!("Drag started at x={} scroll={}", x, self.scroll_percent);
                false
            }
            (
                DragState::Dragging {
                    anchor_scroll_percent,
                    anchor_pointer_x,
                },
                PointerEvent::Move { x },
            ) => {
                if !is_positive(viewport_width) {
                    return false;
                }
                let travel = (x - anchor_pointer_x) / viewport_width * 100.0;
                let target = anchor_scroll_percent - travel / self.drag_sensitivity;
                self.set_scroll_percent(target)
            }
            (DragState::Dragging { .. }, PointerEvent::Up | PointerEvent::Leave) => {
                self.drag = DragState::Idle;
                trace!("Drag ended at scroll={}", self.scroll_percent);
                false
            }
            _ => false,
        }
    }
}

fn is_positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

fn clamp_percent(percent: f64) -> f64 {
    if percent.is_nan() {
        0.0
    } else {
        percent.clamp(0.0, 100.0)
    }
}

fn replace(slot: &mut f64, value: f64) -> bool {
    let changed = *slot != value;
    *slot = value;
    changed
}

/// Visible span of the timeline in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    /// Window for a recording of `duration` seconds under `state`
    ///
    /// `start = scroll/100 × max(0, duration − window)`,
    /// `end = min(start + window, duration)`.
    ///
    /// At full scroll, or when the window covers the whole recording, `end`
    /// is exactly `duration`.
    pub fn compute(duration: f64, state: &ViewState) -> Self {
        let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        let window = state.time_window_seconds;
        let start = state.scroll_percent / 100.0 * (duration - window).max(0.0);
        // (d − w) + w 在浮点下可能比 d 小一个 ulp
        let end = if state.scroll_percent >= 100.0 || window >= duration {
            duration
        } else {
            (start + window).min(duration)
        };
        TimeWindow { start, end }
    }

    pub fn span(&self) -> f64 {
        self.end - self.start
    }

    /// Sample indices of a channel at `rate` Hz that fall inside the window
    ///
    /// `[floor(start × rate), min(ceil(end × rate), sample_count))`, always
    /// satisfying `start <= end <= sample_count`.
    pub fn sample_range(&self, rate: f64, sample_count: usize) -> Range<usize> {
        if !is_positive(rate) {
            return 0..0;
        }
        let end = ((self.end * rate).ceil().max(0.0) as usize).min(sample_count);
        let start = ((self.start * rate).floor().max(0.0) as usize).min(end);
        start..end
    }
}

/// Maps a channel's physical values onto its band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerticalScale {
    /// Physical value drawn at the band centre
    pub center: f64,
    /// Pixels per physical unit
    pub pixel_scale: f64,
}

impl VerticalScale {
    /// Scale from the channel's declared physical range
    pub fn fixed(descriptor: &ChannelDescriptor, channel_height: f64, amplitude_scale: f64) -> Self {
        let range = descriptor.physical_max - descriptor.physical_min;
        let pixel_scale = if range != 0.0 && range.is_finite() {
            channel_height * 0.4 / range * amplitude_scale
        } else {
            1.0
        };
        VerticalScale {
            center: (descriptor.physical_max + descriptor.physical_min) / 2.0,
            pixel_scale,
        }
    }

    /// Scale from the min/max of the visible samples
    ///
    /// A flat or empty window falls back to unit scale.
    pub fn auto(visible: &[f64], channel_height: f64, amplitude_scale: f64) -> Self {
        let (min, max) = visible
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if visible.is_empty() {
            return VerticalScale { center: 0.0, pixel_scale: 1.0 };
        }
        let range = max - min;
        let pixel_scale = if range > 0.0 {
            channel_height * 0.8 / range * amplitude_scale
        } else {
            1.0
        };
        VerticalScale {
            center: (max + min) / 2.0,
            pixel_scale,
        }
    }

    /// Vertical pixel position of `value` in a band centred at `center_y`
    pub fn y(&self, value: f64, center_y: f64) -> f64 {
        center_y - (value - self.center) * self.pixel_scale
    }
}
