//! Integration tests for the recorder lifecycle and capture loop

mod mocks;

use deskrec_core::capture::LoopExit;
use deskrec_core::{
    CaptureRegion, ErrorCode, FrameRate, PixelFormat, Recorder, RecorderState, TimeBase,
};
use mocks::{capture_deliveries, wait_for, Delivery, MockBackend, Script, BURST_PTS_OFFSET};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);

fn full_hd() -> CaptureRegion {
    CaptureRegion::new(0, 0, 1920, 1080).unwrap()
}

fn fps(n: u32) -> FrameRate {
    FrameRate::new(n).unwrap()
}

#[test]
fn test_init_builds_backend_options() {
    let backend = MockBackend::healthy();
    let last_options = backend.last_options.clone();
    let mut recorder = Recorder::new(backend);

    recorder.init(full_hd(), fps(30)).unwrap();

    let options = last_options.lock().clone().expect("backend should be opened");
    assert_eq!(options.video_size, "1920x1080");
    assert_eq!(options.framerate, 30);
    assert_eq!(options.offset_x, 0);
    assert_eq!(options.offset_y, 0);
    assert!(options.draw_mouse);
}

#[test]
fn test_init_is_idempotent() {
    let backend = MockBackend::healthy();
    let counters = backend.counters.clone();
    let mut recorder = Recorder::new(backend);

    assert_eq!(recorder.init(full_hd(), fps(30)), Ok(()));
    assert_eq!(recorder.init(full_hd(), fps(60)), Ok(()));

    assert_eq!(counters.opens(), 1);
    assert_eq!(counters.decoder_opens(), 1);
    assert_eq!(counters.closes(), 0);
    assert_eq!(recorder.state(), RecorderState::Initialized);
}

#[test]
fn test_start_before_init_needs_init() {
    let mut recorder = Recorder::new(MockBackend::healthy());

    assert_eq!(recorder.start(), Err(ErrorCode::NeedInit));
    assert!(!recorder.has_capture_thread());
    assert_eq!(recorder.state(), RecorderState::Uninitialized);
}

#[test]
fn test_stop_without_start_is_noop() {
    let backend = MockBackend::healthy();
    let counters = backend.counters.clone();
    let mut recorder = Recorder::new(backend);

    assert_eq!(recorder.stop(), Ok(()));
    assert_eq!(recorder.state(), RecorderState::Uninitialized);

    recorder.init(full_hd(), fps(30)).unwrap();
    assert_eq!(recorder.stop(), Ok(()));
    assert_eq!(recorder.state(), RecorderState::Initialized);
    assert_eq!(counters.reads(), 0);
    assert_eq!(recorder.last_exit(), None);
}

#[test]
fn test_time_base_fallback() {
    let mut recorder = Recorder::new(MockBackend::healthy());
    assert_eq!(recorder.time_base(), TimeBase::new(1, 90000));

    recorder.init(full_hd(), fps(30)).unwrap();
    assert_eq!(recorder.time_base(), TimeBase::new(1, 1000));
    assert_eq!(recorder.start_time(), Some(1234));
    assert_eq!(recorder.pixel_format(), Some(PixelFormat::Bgr0));

    recorder.teardown();
    assert_eq!(recorder.time_base(), TimeBase::new(1, 90000));
    assert_eq!(recorder.start_time(), None);
    assert_eq!(recorder.pixel_format(), None);
    assert_eq!(recorder.state(), RecorderState::Uninitialized);
}

#[test]
fn test_scenario_capture_then_stop() {
    let backend = MockBackend::new(Script {
        read_delay: Duration::from_millis(1),
        ..Script::default()
    });
    let counters = backend.counters.clone();
    let mut recorder = Recorder::new(backend);
    let log = capture_deliveries(&recorder);

    assert_eq!(recorder.init(full_hd(), fps(30)), Ok(()));
    assert_eq!(recorder.start(), Ok(()));
    assert_eq!(recorder.state(), RecorderState::Running);

    assert!(wait_for(WAIT, || !log.lock().is_empty()), "no frame delivered");

    assert_eq!(recorder.stop(), Ok(()));
    assert!(!recorder.has_capture_thread());
    assert_eq!(recorder.state(), RecorderState::Initialized);
    assert_eq!(recorder.last_exit(), Some(LoopExit::Stopped));

    // Nothing fires once stop() has returned
    let delivered = log.lock().len();
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(log.lock().len(), delivered);
    assert!(log.lock().iter().all(|d| matches!(d, Delivery::Frame(_))));

    // The session survives a stop
    assert_eq!(counters.closes(), 0);
    drop(recorder);
    assert!(counters.all_closed());
}

#[test]
fn test_scenario_open_failure() {
    let backend = MockBackend::new(Script {
        fail_open: true,
        ..Script::default()
    });
    let mut recorder = Recorder::new(backend);

    assert_eq!(
        recorder.init(full_hd(), fps(30)),
        Err(ErrorCode::OpenInputFailed)
    );
    assert_eq!(recorder.state(), RecorderState::Uninitialized);
    assert_eq!(recorder.start(), Err(ErrorCode::NeedInit));
    assert!(!recorder.has_capture_thread());
}

#[test]
fn test_init_failures_tear_down() {
    let cases = [
        (
            Script {
                fail_probe: true,
                ..Script::default()
            },
            ErrorCode::FindStreamFailed,
        ),
        (
            Script {
                no_video_stream: true,
                ..Script::default()
            },
            ErrorCode::FindStreamFailed,
        ),
        (
            Script {
                missing_decoder: true,
                ..Script::default()
            },
            ErrorCode::FindDecoderFailed,
        ),
        (
            Script {
                fail_codec_open: true,
                ..Script::default()
            },
            ErrorCode::OpenCodecFailed,
        ),
    ];

    for (script, expected) in cases {
        let backend = MockBackend::new(script);
        let counters = backend.counters.clone();
        let mut recorder = Recorder::new(backend);

        assert_eq!(recorder.init(full_hd(), fps(30)), Err(expected));
        assert_eq!(recorder.state(), RecorderState::Uninitialized);
        assert_eq!(counters.opens(), 1);
        assert!(counters.all_closed(), "{:?} left a handle open", expected);
        assert_eq!(recorder.time_base(), TimeBase::DEFAULT);
    }
}

#[test]
fn test_init_can_be_retried() {
    let backend = MockBackend::new(Script {
        fail_open: true,
        ..Script::default()
    });
    let counters = backend.counters.clone();
    let mut recorder = Recorder::new(backend);
    assert_eq!(
        recorder.init(full_hd(), fps(30)),
        Err(ErrorCode::OpenInputFailed)
    );
    assert_eq!(
        recorder.init(full_hd(), fps(30)),
        Err(ErrorCode::OpenInputFailed)
    );
    assert_eq!(counters.opens(), 0);

    let mut recorder = Recorder::new(MockBackend::healthy());
    assert_eq!(recorder.init(full_hd(), fps(30)), Ok(()));
    recorder.teardown();
    assert_eq!(recorder.init(full_hd(), fps(30)), Ok(()));
    assert_eq!(recorder.state(), RecorderState::Initialized);
}

#[test]
fn test_scenario_read_failure() {
    let backend = MockBackend::new(Script {
        fail_read_after: Some(4),
        ..Script::default()
    });
    let mut recorder = Recorder::new(backend);
    let log = capture_deliveries(&recorder);

    recorder.init(full_hd(), fps(30)).unwrap();
    recorder.start().unwrap();

    // The loop ends by itself, without stop()
    assert!(wait_for(WAIT, || !recorder.is_running()));
    assert!(wait_for(WAIT, || log
        .lock()
        .last()
        .is_some_and(|d| matches!(d, Delivery::Error(_)))));
    assert_eq!(recorder.state(), RecorderState::Initialized);

    let log = log.lock().clone();
    let errors: Vec<_> = log
        .iter()
        .filter(|d| matches!(d, Delivery::Error(_)))
        .collect();
    assert_eq!(errors, vec![&Delivery::Error(ErrorCode::ReadFrameFailed)]);
    assert_eq!(log.last(), Some(&Delivery::Error(ErrorCode::ReadFrameFailed)));
    assert_eq!(log.len(), 5);

    recorder.stop().unwrap();
    assert_eq!(
        recorder.last_exit(),
        Some(LoopExit::Failed(ErrorCode::ReadFrameFailed))
    );
}

#[test]
fn test_decode_failure_is_terminal() {
    let backend = MockBackend::new(Script {
        fail_decode_at: Some(2),
        ..Script::default()
    });
    let mut recorder = Recorder::new(backend);
    let log = capture_deliveries(&recorder);

    recorder.init(full_hd(), fps(30)).unwrap();
    recorder.start().unwrap();
    assert!(wait_for(WAIT, || !recorder.is_running()));
    recorder.stop().unwrap();

    assert_eq!(
        *log.lock(),
        vec![
            Delivery::Frame(Some(0)),
            Delivery::Frame(Some(1)),
            Delivery::Error(ErrorCode::DecodeFrameFailed),
        ]
    );
}

#[test]
fn test_other_streams_are_skipped() {
    let backend = MockBackend::new(Script {
        interleave_audio: true,
        partial_pictures: true,
        fail_read_after: Some(8),
        ..Script::default()
    });
    let mut recorder = Recorder::new(backend);
    let log = capture_deliveries(&recorder);

    recorder.init(full_hd(), fps(30)).unwrap();
    recorder.start().unwrap();
    assert!(wait_for(WAIT, || !recorder.is_running()));
    recorder.stop().unwrap();

    // Samples 0, 2, 4, 6 are video; every other one yields no picture
    assert_eq!(
        *log.lock(),
        vec![
            Delivery::Frame(Some(0)),
            Delivery::Frame(Some(4)),
            Delivery::Error(ErrorCode::ReadFrameFailed),
        ]
    );

    let stats = recorder.stats();
    assert_eq!(stats.samples_read, 8);
    assert_eq!(stats.samples_skipped, 4);
    assert_eq!(stats.frames_delivered, 2);
}

#[test]
fn test_start_twice_keeps_one_thread() {
    let backend = MockBackend::new(Script {
        read_delay: Duration::from_millis(1),
        ..Script::default()
    });
    let counters = backend.counters.clone();
    let mut recorder = Recorder::new(backend);

    recorder.init(full_hd(), fps(30)).unwrap();
    assert_eq!(recorder.start(), Ok(()));
    assert_eq!(recorder.start(), Ok(()));
    assert_eq!(recorder.state(), RecorderState::Running);

    recorder.stop().unwrap();
    assert_eq!(counters.opens(), 1);
    assert_eq!(recorder.state(), RecorderState::Initialized);
}

#[test]
fn test_restart_after_runtime_error() {
    let backend = MockBackend::new(Script {
        fail_read_after: Some(2),
        ..Script::default()
    });
    let mut recorder = Recorder::new(backend);
    let log = capture_deliveries(&recorder);

    recorder.init(full_hd(), fps(30)).unwrap();
    recorder.start().unwrap();
    assert!(wait_for(WAIT, || !recorder.is_running()));

    // Restarting reuses the exhausted source, which fails again at once
    assert_eq!(recorder.start(), Ok(()));
    assert!(wait_for(WAIT, || !recorder.is_running()));
    recorder.stop().unwrap();

    let errors = log
        .lock()
        .iter()
        .filter(|d| **d == Delivery::Error(ErrorCode::ReadFrameFailed))
        .count();
    assert_eq!(errors, 2);
}

#[test]
fn test_drop_while_running_closes_everything() {
    let backend = MockBackend::new(Script {
        read_delay: Duration::from_millis(1),
        ..Script::default()
    });
    let counters = backend.counters.clone();
    let mut recorder = Recorder::new(backend);
    let log = capture_deliveries(&recorder);

    recorder.init(full_hd(), fps(30)).unwrap();
    recorder.start().unwrap();
    assert!(wait_for(WAIT, || !log.lock().is_empty()));

    drop(recorder);

    assert!(counters.all_closed());
    let delivered = log.lock().len();
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(log.lock().len(), delivered);
}

#[test]
fn test_teardown_then_reinit_reopens() {
    let backend = MockBackend::healthy();
    let counters = backend.counters.clone();
    let mut recorder = Recorder::new(backend);

    recorder.init(full_hd(), fps(30)).unwrap();
    recorder.teardown();
    assert_eq!(counters.closes(), 1);

    recorder.init(CaptureRegion::new(100, 100, 740, 580).unwrap(), fps(15)).unwrap();
    assert_eq!(counters.opens(), 2);
    let info = recorder.session_info().unwrap();
    assert_eq!(info.options.video_size, "640x480");
    assert_eq!(info.options.offset_x, 100);
}

#[test]
fn test_callbacks_can_be_cleared() {
    let backend = MockBackend::new(Script {
        fail_read_after: Some(3),
        ..Script::default()
    });
    let mut recorder = Recorder::new(backend);
    let log = capture_deliveries(&recorder);
    recorder.clear_callbacks();

    recorder.init(full_hd(), fps(30)).unwrap();
    recorder.start().unwrap();
    assert!(wait_for(WAIT, || !recorder.is_running()));
    recorder.stop().unwrap();

    assert!(log.lock().is_empty());
    assert_eq!(recorder.stats().frames_delivered, 3);
}

#[test]
fn test_every_buffered_picture_is_delivered() {
    let backend = MockBackend::new(Script {
        burst_pictures: true,
        fail_read_after: Some(2),
        ..Script::default()
    });
    let mut recorder = Recorder::new(backend);
    let log = capture_deliveries(&recorder);

    recorder.init(full_hd(), fps(30)).unwrap();
    recorder.start().unwrap();
    assert!(wait_for(WAIT, || !recorder.is_running()));
    recorder.stop().unwrap();

    assert_eq!(
        *log.lock(),
        vec![
            Delivery::Frame(Some(0)),
            Delivery::Frame(Some(BURST_PTS_OFFSET)),
            Delivery::Frame(Some(1)),
            Delivery::Frame(Some(1 + BURST_PTS_OFFSET)),
            Delivery::Error(ErrorCode::ReadFrameFailed),
        ]
    );
    assert_eq!(recorder.stats().frames_delivered, 4);
    assert_eq!(recorder.stats().samples_read, 2);
}

#[test]
fn test_registration_does_not_wait_for_running_callback() {
    let backend = MockBackend::new(Script {
        fail_read_after: Some(1),
        ..Script::default()
    });
    let mut recorder = Recorder::new(backend);

    let entered = Arc::new(AtomicBool::new(false));
    let entered_clone = entered.clone();
    recorder.set_on_data(move |_| {
        entered_clone.store(true, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(500));
    });

    recorder.init(full_hd(), fps(30)).unwrap();
    recorder.start().unwrap();
    assert!(wait_for(WAIT, || entered.load(Ordering::SeqCst)));

    let began = Instant::now();
    recorder.set_on_error(|_| {});
    recorder.set_on_data(|_| {});
    recorder.clear_callbacks();
    assert!(
        began.elapsed() < Duration::from_millis(250),
        "registration waited {:?}",
        began.elapsed()
    );

    recorder.stop().unwrap();
}
