//! # EDF decoding and windowed waveform viewing
//!
//! A pure Rust library that decodes EDF (European Data Format) biosignal
//! recordings from an in-memory byte buffer and renders a scrollable,
//! scalable multi-channel view of them as plain draw primitives.
//!
//! The crate has two halves:
//!
//! - the **decoder** ([`Decoder`], [`decode`], [`DecodeTask`]) producing an
//!   immutable [`Recording`];
//! - the **view engine** ([`ViewState`], [`render_frame`], [`ViewerSession`])
//!   turning a recording plus view settings into a [`Frame`].
//!
//! ## Quick Start
//!
//! ```rust
//! use edfview::{decode, render_frame, Result, ViewConfig, ViewState, Viewport};
//!
//! fn main() -> Result<()> {
//!     # let bytes = edfview::doctest_utils::multi_channel_bytes()?;
//!     // `bytes` holds a complete EDF file, e.g. from std::fs::read
//!     let recording = decode(&bytes)?;
//!     println!("{}", recording);
//!
//!     let state = ViewState::from_config(
//!         &ViewConfig::default().with_time_window(5.0).with_auto_scale(true),
//!     );
//!     let frame = render_frame(&recording, &state, Viewport::new(1024.0, 600.0));
//!     println!("{} primitives", frame.primitives.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Physical vs Digital Values
//!
//! EDF stores samples as 16-bit integers. Each channel declares a digital and
//! a physical range, and every sample is mapped through the affine function
//! between them while decoding:
//!
//! ```rust
//! use edfview::doctest_utils::eeg_descriptor;
//!
//! let channel = eeg_descriptor("EEG Fp1", 256); // -200..200 uV, full 16-bit range
//! assert_eq!(channel.to_physical(32767), 200.0);
//! assert!((channel.to_physical(16384) - 100.0).abs() < 0.01);
//! ```
//!
//! ## Scrolling
//!
//! The visible window starts at `scroll/100 × max(0, duration − window)`.
//! Each channel picks its own sample range using its own sampling rate, so
//! channels recorded at different rates show different sample counts for the
//! same span of time.

pub mod error;
pub mod types;
pub mod utils;
pub mod reader;
pub mod writer;
pub mod view;
pub mod render;
pub mod session;

#[doc(hidden)]
pub mod doctest_utils; // For internal doctest support

// Re-export main types for convenience
pub use error::{DecodeError, Field, RangeKind, Result};
pub use types::{Channel, ChannelDescriptor, Recording, RecordingHeader};
pub use reader::{decode, read_file, CancelToken, DecodeTask, Decoder};
pub use writer::{encode_recording, EdfEncoder};
pub use view::{DragState, PointerEvent, TimeWindow, VerticalScale, ViewConfig, ViewState};
pub use render::{render_frame, DrawPrimitive, Frame, Point, Rgb, Surface, Viewport};
pub use session::ViewerSession;

// Important constants
pub const EDF_HEADER_BYTES: usize = 256;
pub const EDF_SIGNAL_HEADER_BYTES: usize = 256;
pub const EDF_MAX_CHANNELS: usize = 4096;

/// Library version
///
/// ```rust
/// let version = edfview::version();
/// assert!(version.contains('.'));
/// ```
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
