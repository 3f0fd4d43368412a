use std::sync::Arc;

use log::debug;

use crate::render::{render_frame, Frame, Surface, Viewport};
use crate::types::Recording;
use crate::view::{PointerEvent, ViewConfig, ViewState};

/// A viewing session binding one shared recording to one view state and a
/// drawing surface
///
/// All mutation goes through `&mut self`, so a render never observes a
/// half-updated [`ViewState`]. Every call that changes what is visible
/// renders and paints one full frame. Without a loaded recording nothing is
/// painted.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use edfview::{decode, DrawPrimitive, PointerEvent, ViewConfig, ViewerSession, Viewport};
///
/// # let bytes = edfview::doctest_utils::multi_channel_bytes()?;
/// let recording = Arc::new(decode(&bytes)?);
///
/// let surface: Vec<DrawPrimitive> = Vec::new();
/// let mut session = ViewerSession::new(surface, Viewport::new(800.0, 400.0), ViewConfig::default());
/// session.load(recording);
///
/// session.set_time_window(2.0);
/// session.pointer(PointerEvent::Down { x: 400.0 });
/// session.pointer(PointerEvent::Move { x: 200.0 });
/// session.pointer(PointerEvent::Up);
///
/// assert!(session.state().scroll_percent() > 0.0);
/// # Ok::<(), edfview::DecodeError>(())
/// ```
#[derive(Debug)]
pub struct ViewerSession<S: Surface> {
    surface: S,
    recording: Option<Arc<Recording>>,
    state: ViewState,
    viewport: Viewport,
}

impl<S: Surface> ViewerSession<S> {
    pub fn new(surface: S, viewport: Viewport, config: ViewConfig) -> Self {
        ViewerSession {
            surface,
            recording: None,
            state: ViewState::from_config(&config),
            viewport,
        }
    }

    /// Publishes a new recording and redraws
    ///
    /// Scale, window and scroll settings are kept; a drag in progress is
    /// dropped so its anchor does not carry over to the new recording.
    pub fn load(&mut self, recording: Arc<Recording>) -> Option<Frame> {
        debug!(
            "Loaded recording: {} signals, {:.2}s",
            recording.channels().len(),
            recording.duration()
        );
        self.recording = Some(recording);
        self.state.cancel_drag();
        self.refresh()
    }

    pub fn recording(&self) -> Option<&Arc<Recording>> {
        self.recording.as_ref()
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn resize(&mut self, viewport: Viewport) -> Option<Frame> {
        self.viewport = viewport;
        self.refresh()
    }

    pub fn set_amplitude_scale(&mut self, scale: f64) -> Option<Frame> {
        let changed = self.state.set_amplitude_scale(scale);
        self.refresh_if(changed)
    }

    pub fn set_time_window(&mut self, seconds: f64) -> Option<Frame> {
        let changed = self.state.set_time_window(seconds);
        self.refresh_if(changed)
    }

    pub fn set_scroll_percent(&mut self, percent: f64) -> Option<Frame> {
        let changed = self.state.set_scroll_percent(percent);
        self.refresh_if(changed)
    }

    pub fn set_auto_scale(&mut self, auto_scale: bool) -> Option<Frame> {
        let changed = self.state.set_auto_scale(auto_scale);
        self.refresh_if(changed)
    }

    /// Feeds a pointer event to the pan state machine, redrawing if the
    /// scroll position moved
    pub fn pointer(&mut self, event: PointerEvent) -> Option<Frame> {
        let changed = self.state.handle_pointer(event, self.viewport.width);
        self.refresh_if(changed)
    }

    /// Renders the current frame and paints it onto the surface
    pub fn refresh(&mut self) -> Option<Frame> {
        let recording = self.recording.as_ref()?;
        let frame = render_frame(recording, &self.state, self.viewport);
        frame.paint(&mut self.surface);
        Some(frame)
    }

    fn refresh_if(&mut self, changed: bool) -> Option<Frame> {
        if changed {
            self.refresh()
        } else {
            None
        }
    }
}
