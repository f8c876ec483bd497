//! Integration tests for the node playback engine
//!
//! Uses the synthetic decoder and recording sinks to drive whole
//! playback runs without real media.

use showlink_common::media::{AudioFormat, Frame, MediaAttribute, Sample};
use showlink_common::playorder::PlayOrder;
use showlink_node::engine::{NodeEngine, PlaybackState};
use showlink_node::sink::{AudioSink, FrameSink};
use showlink_node::source::SyntheticOpener;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn attr(index: u32, duration_us: u64) -> MediaAttribute {
    MediaAttribute {
        index,
        source: PathBuf::from(format!("item{}.mov", index)),
        duration_us,
        audio_format: AudioFormat::default(),
    }
}

#[derive(Default)]
struct RecordingSink {
    frames: Mutex<Vec<(u32, u64)>>,
    samples: Mutex<usize>,
    fusion: Mutex<Vec<(String, f32)>>,
}

impl RecordingSink {
    fn frame_log(&self) -> Vec<(u32, u64)> {
        self.frames.lock().unwrap().clone()
    }
}

impl FrameSink for RecordingSink {
    fn present(&self, frame: &Frame) {
        self.frames
            .lock()
            .unwrap()
            .push((frame.attribute.index, frame.timestamp_us));
    }

    fn fusion_test(&self, image: &str, factor: f32) {
        self.fusion.lock().unwrap().push((image.to_string(), factor));
    }
}

impl AudioSink for RecordingSink {
    fn play(&self, _sample: &Sample) {
        *self.samples.lock().unwrap() += 1;
    }
}

fn engine_with(
    media: &[MediaAttribute],
    order: &[u32],
) -> (Arc<NodeEngine>, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let play_order = PlayOrder::new(media, order).unwrap();
    let engine = Arc::new(NodeEngine::new(
        16,
        play_order,
        0,
        Arc::new(SyntheticOpener),
        Arc::clone(&sink) as Arc<dyn FrameSink>,
        Arc::clone(&sink) as Arc<dyn AudioSink>,
    ));
    (engine, sink)
}

async fn wait_until_stopped(engine: &NodeEngine) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while engine.state() != PlaybackState::Stopped {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("playback should complete");
}

#[tokio::test]
async fn playback_runs_the_flow_in_order() {
    let media = vec![attr(0, 120_000), attr(1, 120_000)];
    let (engine, sink) = engine_with(&media, &[0, 1]);

    assert!(engine.start());
    wait_until_stopped(&engine).await;

    let log = sink.frame_log();
    assert!(!log.is_empty());
    // Item 0's frames strictly precede item 1's
    let first_of_second = log.iter().position(|(index, _)| *index == 1).unwrap();
    assert!(log[..first_of_second].iter().all(|(index, _)| *index == 0));
    assert!(log[first_of_second..].iter().all(|(index, _)| *index == 1));
    // Timestamps within one item are monotonic
    let zeros: Vec<u64> = log
        .iter()
        .filter(|(index, _)| *index == 0)
        .map(|(_, ts)| *ts)
        .collect();
    assert!(zeros.windows(2).all(|pair| pair[0] < pair[1]));
    assert!(*sink.samples.lock().unwrap() > 0);
}

#[tokio::test]
async fn start_while_playing_is_rejected() {
    let media = vec![attr(0, 2_000_000)];
    let (engine, _sink) = engine_with(&media, &[0]);

    assert!(engine.start());
    assert!(!engine.start(), "second start while playing must fail");
    engine.stop().await;
}

#[tokio::test]
async fn stop_is_idempotent_and_allows_restart() {
    let media = vec![attr(0, 2_000_000)];
    let (engine, _sink) = engine_with(&media, &[0]);

    assert!(engine.start());
    tokio::time::sleep(Duration::from_millis(50)).await;
    engine.stop().await;
    engine.stop().await; // second stop is a no-op
    assert_eq!(engine.state(), PlaybackState::Stopped);

    // A fresh run is possible after stop
    assert!(engine.start());
    engine.stop().await;
}

#[tokio::test]
async fn pause_suspends_presentation() {
    let media = vec![attr(0, 5_000_000)];
    let (engine, sink) = engine_with(&media, &[0]);

    assert!(engine.start());
    tokio::time::sleep(Duration::from_millis(100)).await;
    engine.pause(true);
    assert_eq!(engine.state(), PlaybackState::Paused);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let during_pause = sink.frame_log().len();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(
        sink.frame_log().len(),
        during_pause,
        "no frames presented while paused"
    );

    engine.pause(false);
    assert_eq!(engine.state(), PlaybackState::Playing);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(sink.frame_log().len() > during_pause);
    engine.stop().await;
}

#[tokio::test]
async fn select_before_start_redirects_first_position() {
    let media = vec![attr(0, 120_000), attr(1, 120_000)];
    let (engine, sink) = engine_with(&media, &[0, 1]);

    engine.select(1);
    assert!(engine.start());
    wait_until_stopped(&engine).await;

    let log = sink.frame_log();
    assert_eq!(log.first().unwrap().0, 1, "redirected item plays first");
}

#[tokio::test]
async fn select_with_unknown_index_is_ignored() {
    let media = vec![attr(0, 120_000)];
    let (engine, sink) = engine_with(&media, &[0]);

    engine.select(99);
    assert!(engine.start());
    wait_until_stopped(&engine).await;
    assert_eq!(sink.frame_log().first().unwrap().0, 0);
}

#[tokio::test]
async fn fusion_test_reaches_the_frame_sink() {
    let media = vec![attr(0, 120_000)];
    let (engine, sink) = engine_with(&media, &[0]);
    engine.fusion_test("grid.png", 0.4);
    let calls = sink.fusion.lock().unwrap().clone();
    assert_eq!(calls, vec![("grid.png".to_string(), 0.4)]);
}
