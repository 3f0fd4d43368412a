use edfview::doctest_utils::{eeg_descriptor, multi_channel_bytes, sine_digital};
use edfview::{
    decode, render_frame, CancelToken, DecodeError, DecodeTask, Decoder, DragState,
    DrawPrimitive, EdfEncoder, PointerEvent, ViewConfig, ViewState, ViewerSession, Viewport,
};
use std::sync::Arc;
use std::thread;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn long_recording_bytes(seconds: usize) -> Vec<u8> {
    let mut encoder = EdfEncoder::new();
    encoder.set_record_count(seconds);
    for ch in 0..4 {
        let samples = sine_digital(256 * seconds, 256.0, 8.0 + ch as f64 * 2.0, 9000.0);
        encoder
            .add_channel(eeg_descriptor(&format!("EEG C{}", ch + 1), 256), samples)
            .unwrap();
    }
    encoder.encode().unwrap()
}

#[test]
fn test_decode_task_publishes_recording() {
    init_logging();
    let bytes = long_recording_bytes(30);
    let expected = decode(&bytes).unwrap();

    let task = DecodeTask::spawn(bytes);
    let recording = task.join().unwrap();
    assert_eq!(*recording, expected);
    assert_eq!(recording.duration(), 30.0);
}

#[test]
fn test_decode_task_reports_errors() {
    let mut bytes = long_recording_bytes(2);
    bytes.truncate(bytes.len() - 10);

    let task = DecodeTask::spawn(bytes);
    assert!(matches!(task.join(), Err(DecodeError::TruncatedData { .. })));
}

#[test]
fn test_cancelled_decode_publishes_nothing() {
    init_logging();
    let bytes = long_recording_bytes(5);

    let token = CancelToken::new();
    token.cancel();
    let result = Decoder::new().with_cancel_token(token).decode(&bytes);
    assert!(matches!(result, Err(DecodeError::Cancelled)));

    // 后台任务被取消时，要么整体完成，要么返回 Cancelled
    let task = DecodeTask::spawn(long_recording_bytes(600));
    task.cancel();
    match task.join() {
        Ok(recording) => {
            for channel in recording.channels() {
                assert_eq!(channel.sample_count(), 256 * 600);
            }
        }
        Err(DecodeError::Cancelled) => {}
        Err(other) => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_abandoned_decode_does_not_affect_next_one() {
    let first = DecodeTask::spawn(long_recording_bytes(300));
    first.cancel();

    let second = DecodeTask::spawn(multi_channel_bytes().unwrap());
    let recording = second.join().unwrap();
    assert_eq!(recording.channels().len(), 2);

    let _ = first.join();
}

#[test]
fn test_concurrent_render_from_shared_recording() {
    let recording = Arc::new(decode(&long_recording_bytes(60)).unwrap());
    let mut handles = Vec::new();

    // 每个线程拥有自己的视图状态，共享同一份只读记录
    for reader_id in 0..4 {
        let recording = Arc::clone(&recording);
        handles.push(thread::spawn(move || {
            let state = ViewState::from_config(
                &ViewConfig::default()
                    .with_time_window(15.0)
                    .with_scroll_percent(reader_id as f64 * 100.0 / 3.0),
            );
            let frame = render_frame(&recording, &state, Viewport::new(800.0, 600.0));
            frame.window.unwrap()
        }));
    }

    let windows: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(windows.len(), 4);
    assert_eq!(windows[0].start, 0.0);
    assert_eq!(windows[3].end, 60.0);
    for pair in windows.windows(2) {
        assert!(pair[0].start < pair[1].start);
    }
}

#[test]
fn test_session_drag_sequence() {
    init_logging();
    let recording = Arc::new(decode(&long_recording_bytes(60)).unwrap());
    let surface: Vec<DrawPrimitive> = Vec::new();
    let mut session = ViewerSession::new(
        surface,
        Viewport::new(1000.0, 500.0),
        ViewConfig::default().with_scroll_percent(50.0),
    );

    assert!(session.load(Arc::clone(&recording)).is_some());
    let painted_after_load = session.surface().len();
    assert!(painted_after_load > 0);

    // 按下不重绘
    assert!(session.pointer(PointerEvent::Down { x: 500.0 }).is_none());
    assert!(matches!(session.state().drag_state(), DragState::Dragging { .. }));

    // 每次移动都重绘整帧
    let frame = session.pointer(PointerEvent::Move { x: 750.0 }).unwrap();
    assert!((session.state().scroll_percent() - 45.0).abs() < 1e-9);
    assert_eq!(session.surface().len(), painted_after_load + frame.primitives.len());

    let frame = session.pointer(PointerEvent::Move { x: 250.0 }).unwrap();
    assert!((session.state().scroll_percent() - 55.0).abs() < 1e-9);
    let window = frame.window.unwrap();
    assert!((window.start - 0.55 * 50.0).abs() < 1e-9);

    assert!(session.pointer(PointerEvent::Leave).is_none());
    assert_eq!(session.state().drag_state(), DragState::Idle);
    assert!(session.pointer(PointerEvent::Move { x: 0.0 }).is_none());
    assert!(session.pointer(PointerEvent::Up).is_none());
}

#[test]
fn test_session_setters_republish() {
    let recording = Arc::new(decode(&multi_channel_bytes().unwrap()).unwrap());
    let mut session = ViewerSession::new(
        Vec::<DrawPrimitive>::new(),
        Viewport::new(640.0, 480.0),
        ViewConfig::default(),
    );
    session.load(recording);

    let frame = session.set_time_window(2.0).unwrap();
    assert_eq!(frame.window.unwrap().end, 2.0);

    let frame = session.set_scroll_percent(150.0).unwrap();
    assert_eq!(session.state().scroll_percent(), 100.0);
    assert_eq!(frame.window.unwrap().end, 10.0);

    assert!(session.set_amplitude_scale(3.0).is_some());
    assert!(session.set_auto_scale(true).is_some());
    assert!(session.set_time_window(0.0).is_none());

    let frame = session.resize(Viewport::new(320.0, 240.0)).unwrap();
    assert_eq!(session.viewport(), Viewport::new(320.0, 240.0));
    assert!(!frame.is_blank());
}
