//! Frame rendering: turns a recording plus a view state into draw primitives

use log::trace;

use crate::types::Recording;
use crate::view::{TimeWindow, VerticalScale, ViewState};

/// Number of time divisions across the viewport (11 grid lines)
pub const TIME_GRID_DIVISIONS: usize = 10;

pub const BACKGROUND: Rgb = Rgb(0x0a, 0x0a, 0x0a);
pub const GRID_COLOR: Rgb = Rgb(0x1a, 0x1a, 0x1a);
pub const TIME_LABEL_COLOR: Rgb = Rgb(0x66, 0x66, 0x66);
pub const BASELINE_COLOR: Rgb = Rgb(0x22, 0x22, 0x22);
pub const LABEL_COLOR: Rgb = Rgb(0xff, 0xff, 0xff);

/// Channel trace colours, cycled by channel index
pub const CHANNEL_PALETTE: [Rgb; 8] = [
    Rgb(0xff, 0xff, 0xff),
    Rgb(0xdd, 0xdd, 0xdd),
    Rgb(0xbb, 0xbb, 0xbb),
    Rgb(0x99, 0x99, 0x99),
    Rgb(0xcc, 0xcc, 0xcc),
    Rgb(0xaa, 0xaa, 0xaa),
    Rgb(0x88, 0x88, 0x88),
    Rgb(0xe5, 0xe5, 0xe5),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

/// Pixel size of the drawing area
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Viewport { width, height }
    }

    fn is_drawable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// One drawing instruction in absolute pixel coordinates
#[derive(Debug, Clone, PartialEq)]
pub enum DrawPrimitive {
    /// Fill the whole viewport
    Clear { color: Rgb },
    /// Grid lines and channel baselines
    Line {
        from: Point,
        to: Point,
        color: Rgb,
        width: f32,
    },
    /// A channel's visible samples
    Polyline {
        channel: usize,
        points: Vec<Point>,
        color: Rgb,
        width: f32,
    },
    Text {
        position: Point,
        text: String,
        color: Rgb,
        size: f32,
        bold: bool,
    },
}

/// Anything that can execute draw primitives (a canvas, an image buffer, ...)
pub trait Surface {
    fn draw(&mut self, primitive: &DrawPrimitive);
}

impl Surface for Vec<DrawPrimitive> {
    fn draw(&mut self, primitive: &DrawPrimitive) {
        self.push(primitive.clone());
    }
}

/// The primitives of one rendered frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub primitives: Vec<DrawPrimitive>,
    /// Visible time span, `None` for a blank frame
    pub window: Option<TimeWindow>,
}

impl Frame {
    fn blank() -> Self {
        Frame {
            primitives: vec![DrawPrimitive::Clear { color: BACKGROUND }],
            window: None,
        }
    }

    /// True if the frame only clears the background
    pub fn is_blank(&self) -> bool {
        self.primitives
            .iter()
            .all(|p| matches!(p, DrawPrimitive::Clear { .. }))
    }

    /// Issues every primitive to `surface` in order
    pub fn paint<S: Surface + ?Sized>(&self, surface: &mut S) {
        for primitive in &self.primitives {
            surface.draw(primitive);
        }
    }

    pub fn polylines(&self) -> impl Iterator<Item = (usize, &[Point])> {
        self.primitives.iter().filter_map(|p| match p {
            DrawPrimitive::Polyline { channel, points, .. } => Some((*channel, points.as_slice())),
            _ => None,
        })
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.primitives.iter().filter_map(|p| match p {
            DrawPrimitive::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// Renders one complete frame
///
/// Pure function of its inputs: calling it repeatedly with the same
/// arguments yields identical frames. A recording without channels or with
/// zero duration, or a degenerate viewport, gives a blank frame.
///
/// # Examples
///
/// ```rust
/// use edfview::{decode, render_frame, ViewState, Viewport};
///
/// # let bytes = edfview::doctest_utils::multi_channel_bytes()?;
/// let recording = decode(&bytes)?;
/// let frame = render_frame(&recording, &ViewState::new(), Viewport::new(800.0, 600.0));
///
/// assert!(!frame.is_blank());
/// assert_eq!(frame.polylines().count(), recording.channels().len());
/// # Ok::<(), edfview::DecodeError>(())
/// ```
pub fn render_frame(recording: &Recording, state: &ViewState, viewport: Viewport) -> Frame {
    let channels = recording.channels();
    let duration = recording.duration();
    if channels.is_empty() || !(duration > 0.0) || !viewport.is_drawable() {
        return Frame::blank();
    }

    let window = TimeWindow::compute(duration, state);
    let Viewport { width, height } = viewport;
    let channel_height = height / channels.len() as f64;
    let record_duration = recording.header().record_duration_seconds;

    let mut primitives = vec![DrawPrimitive::Clear { color: BACKGROUND }];
    draw_grid(&mut primitives, viewport, window, channels.len());

    for (index, channel) in channels.iter().enumerate() {
        let center_y = channel_height * (index as f64 + 0.5);
        let rate = channel.descriptor.sampling_rate(record_duration);
        let range = window.sample_range(rate, channel.sample_count());
        let visible = &channel.samples[range];

        if !visible.is_empty() {
            let scale = if state.auto_scale() {
                VerticalScale::auto(visible, channel_height, state.amplitude_scale())
            } else {
                VerticalScale::fixed(&channel.descriptor, channel_height, state.amplitude_scale())
            };
            let n = visible.len() as f64;
            let points = visible
                .iter()
                .enumerate()
                .map(|(i, &v)| Point::new(i as f64 / n * width, scale.y(v, center_y)))
                .collect();
            primitives.push(DrawPrimitive::Polyline {
                channel: index,
                points,
                color: CHANNEL_PALETTE[index % CHANNEL_PALETTE.len()],
                width: 1.5,
            });
        }

        primitives.push(DrawPrimitive::Line {
            from: Point::new(0.0, center_y),
            to: Point::new(width, center_y),
            color: BASELINE_COLOR,
            width: 0.5,
        });
    }

    for (index, channel) in channels.iter().enumerate() {
        primitives.push(DrawPrimitive::Text {
            position: Point::new(5.0, channel_height * index as f64 + 15.0),
            text: format!(
                "{} ({})",
                channel.descriptor.display_label(index),
                channel.descriptor.physical_unit
            ),
            color: LABEL_COLOR,
            size: 12.0,
            bold: true,
        });
    }

    trace!(
        "Rendered {:.3}s..{:.3}s, {} primitives",
        window.start,
        window.end,
        primitives.len()
    );

    Frame {
        primitives,
        window: Some(window),
    }
}

fn draw_grid(out: &mut Vec<DrawPrimitive>, viewport: Viewport, window: TimeWindow, channel_count: usize) {
    let Viewport { width, height } = viewport;

    // 垂直时间网格线及时间标签
    for i in 0..=TIME_GRID_DIVISIONS {
        let fraction = i as f64 / TIME_GRID_DIVISIONS as f64;
        let x = fraction * width;
        out.push(DrawPrimitive::Line {
            from: Point::new(x, 0.0),
            to: Point::new(x, height),
            color: GRID_COLOR,
            width: 1.0,
        });

        let time = window.start + window.span() * fraction;
        out.push(DrawPrimitive::Text {
            position: Point::new(x + 2.0, height - 5.0),
            text: format!("{:.1}s", time),
            color: TIME_LABEL_COLOR,
            size: 11.0,
            bold: false,
        });
    }

    // 通道分隔线
    for i in 0..=channel_count {
        let y = i as f64 / channel_count as f64 * height;
        out.push(DrawPrimitive::Line {
            from: Point::new(0.0, y),
            to: Point::new(width, y),
            color: GRID_COLOR,
            width: 1.0,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Channel, ChannelDescriptor, RecordingHeader};
    use crate::view::ViewConfig;

    fn recording(rates: &[usize], records: usize) -> Recording {
        let header = RecordingHeader {
            version: "0".to_string(),
            patient_id: String::new(),
            recording_id: String::new(),
            start_date: String::new(),
            start_time: String::new(),
            header_byte_count: 256 * (rates.len() + 1),
            record_count: records,
            record_duration_seconds: 1.0,
            channel_count: rates.len(),
        };
        let channels = rates
            .iter()
            .enumerate()
            .map(|(i, &spr)| Channel {
                descriptor: ChannelDescriptor {
                    label: format!("S{}", i),
                    transducer_type: String::new(),
                    physical_unit: "uV".to_string(),
                    physical_min: -10.0,
                    physical_max: 10.0,
                    digital_min: -100,
                    digital_max: 100,
                    prefiltering: String::new(),
                    samples_per_record: spr,
                },
                samples: (0..spr * records).map(|k| (k % 5) as f64).collect(),
            })
            .collect();
        Recording::from_parts(header, channels).unwrap()
    }

    #[test]
    fn test_frame_layout_order() {
        let rec = recording(&[4], 2);
        let frame = render_frame(&rec, &ViewState::new(), Viewport::new(100.0, 50.0));

        assert_eq!(frame.primitives[0], DrawPrimitive::Clear { color: BACKGROUND });
        // 11 条时间线 + 11 个时间标签 + 2 条通道分隔线
        let grid_end = 1 + 2 * (TIME_GRID_DIVISIONS + 1) + 2;
        assert!(matches!(frame.primitives[grid_end], DrawPrimitive::Polyline { .. }));
        assert!(matches!(
            frame.primitives[grid_end + 1],
            DrawPrimitive::Line { color: BASELINE_COLOR, .. }
        ));
        assert!(matches!(frame.primitives.last(), Some(DrawPrimitive::Text { bold: true, .. })));
        assert_eq!(frame.primitives.len(), grid_end + 3);
    }

    #[test]
    fn test_time_labels_span_window() {
        let rec = recording(&[1], 20);
        let state = ViewState::from_config(&ViewConfig::default().with_scroll_percent(100.0));
        let frame = render_frame(&rec, &state, Viewport::new(100.0, 50.0));

        assert_eq!(frame.window, Some(TimeWindow { start: 10.0, end: 20.0 }));
        let texts: Vec<&str> = frame.texts().collect();
        assert_eq!(texts[0], "10.0s");
        assert_eq!(texts[1], "11.0s");
        assert_eq!(texts[TIME_GRID_DIVISIONS], "20.0s");
        assert_eq!(texts.last(), Some(&"S0 (uV)"));
    }

    #[test]
    fn test_polyline_x_spans_viewport() {
        let rec = recording(&[10], 1);
        let frame = render_frame(&rec, &ViewState::new(), Viewport::new(200.0, 100.0));
        let (_, points) = frame.polylines().next().unwrap();
        assert_eq!(points.len(), 10);
        assert_eq!(points[0].x, 0.0);
        assert_eq!(points[5].x, 100.0);
        assert!(points[9].x < 200.0);
    }

    #[test]
    fn test_channel_colours_cycle() {
        let rec = recording(&[1; 9], 1);
        let frame = render_frame(&rec, &ViewState::new(), Viewport::new(100.0, 900.0));
        let colours: Vec<Rgb> = frame
            .primitives
            .iter()
            .filter_map(|p| match p {
                DrawPrimitive::Polyline { color, .. } => Some(*color),
                _ => None,
            })
            .collect();
        assert_eq!(colours.len(), 9);
        assert_eq!(colours[8], CHANNEL_PALETTE[0]);
    }

    #[test]
    fn test_degenerate_viewport_is_blank() {
        let rec = recording(&[4], 2);
        assert!(render_frame(&rec, &ViewState::new(), Viewport::new(0.0, 100.0)).is_blank());
        assert!(render_frame(&rec, &ViewState::new(), Viewport::new(100.0, f64::NAN)).is_blank());
    }

    #[test]
    fn test_paint_forwards_in_order() {
        let rec = recording(&[2], 1);
        let frame = render_frame(&rec, &ViewState::new(), Viewport::new(10.0, 10.0));
        let mut surface: Vec<DrawPrimitive> = Vec::new();
        frame.paint(&mut surface);
        assert_eq!(surface, frame.primitives);
    }
}
