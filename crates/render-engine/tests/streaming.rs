//! Streaming sessions through the render coordinator.

use std::path::PathBuf;
use std::sync::Arc;

use notecast_common::config::EncodeConfig;
use notecast_common::error::NotecastError;
use notecast_process_core::scripted::{ScriptedRun, ScriptedRunner};
use notecast_render_engine::{ActiveRender, FramePayload, RenderCoordinator, StreamSpec};

fn spec(output: &str) -> StreamSpec {
    StreamSpec::new(1279, 720, 60.0, "6000", "/work/output.aac", output).unwrap()
}

fn coordinator(runner: &ScriptedRunner) -> RenderCoordinator {
    RenderCoordinator::new(Arc::new(runner.clone()), EncodeConfig::default())
}

fn frame(n: u8) -> FramePayload {
    FramePayload::from_bytes(vec![n; 16])
}

#[tokio::test]
async fn frames_flow_into_the_encoder_in_order() {
    let runner = ScriptedRunner::new();
    let coordinator = coordinator(&runner);

    coordinator.start_stream(spec("/work/live.mp4")).await.unwrap();
    assert_eq!(coordinator.active(), Some(ActiveRender::Stream));
    for n in 0..3 {
        coordinator.push_frame(&frame(n)).await.unwrap();
    }
    assert_eq!(coordinator.frames_written().await, Some(3));
    let output = coordinator.end_stream().await.unwrap();

    assert_eq!(output, PathBuf::from("/work/live.mp4"));
    assert_eq!(coordinator.active(), None);
    assert_eq!(
        runner.written_chunks(),
        vec![vec![0u8; 16], vec![1u8; 16], vec![2u8; 16]]
    );

    let calls = runner.invocations();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].piped);
    assert!(calls[0].args.contains(&"scale=1278:720".to_string()));
}

#[tokio::test]
async fn second_start_is_rejected_and_leaves_session_intact() {
    let runner = ScriptedRunner::new();
    let coordinator = coordinator(&runner);
    coordinator.start_stream(spec("/work/first.mp4")).await.unwrap();
    coordinator.push_frame(&frame(7)).await.unwrap();

    let err = coordinator
        .start_stream(spec("/work/second.mp4"))
        .await
        .unwrap_err();
    assert!(matches!(err, NotecastError::SessionState { .. }));

    assert_eq!(coordinator.active(), Some(ActiveRender::Stream));
    assert_eq!(coordinator.frames_written().await, Some(1));
    coordinator.push_frame(&frame(8)).await.unwrap();
    let output = coordinator.end_stream().await.unwrap();

    assert_eq!(output, PathBuf::from("/work/first.mp4"));
    assert_eq!(runner.invocations().len(), 1);
    assert_eq!(runner.written_chunks().len(), 2);
}

#[tokio::test]
async fn push_and_end_without_session_fail() {
    let runner = ScriptedRunner::new();
    let coordinator = coordinator(&runner);

    let push = coordinator.push_frame(&frame(1)).await.unwrap_err();
    assert!(matches!(push, NotecastError::SessionState { .. }));
    let end = coordinator.end_stream().await.unwrap_err();
    assert!(matches!(end, NotecastError::SessionState { .. }));
    assert!(runner.invocations().is_empty());
}

#[tokio::test]
async fn push_after_end_fails() {
    let runner = ScriptedRunner::new();
    let coordinator = coordinator(&runner);
    coordinator.start_stream(spec("/work/live.mp4")).await.unwrap();
    coordinator.end_stream().await.unwrap();

    let err = coordinator.push_frame(&frame(1)).await.unwrap_err();
    assert!(matches!(err, NotecastError::SessionState { .. }));
}

#[tokio::test]
async fn broken_pipe_closes_input_and_end_reports_exit_code() {
    let runner = ScriptedRunner::new();
    runner.push(ScriptedRun::broken_pipe(1).with_lines(["[image2pipe] Invalid data found"]));
    let coordinator = coordinator(&runner);
    coordinator.start_stream(spec("/work/live.mp4")).await.unwrap();

    let first = coordinator.push_frame(&frame(1)).await.unwrap_err();
    assert!(matches!(first, NotecastError::Pipe { .. }));
    let second = coordinator.push_frame(&frame(2)).await.unwrap_err();
    assert!(matches!(second, NotecastError::SessionState { .. }));

    let end = coordinator.end_stream().await.unwrap_err();
    assert!(matches!(end, NotecastError::ProcessExit { code: Some(1), .. }));
    assert_eq!(coordinator.active(), None);
}

#[tokio::test]
async fn failed_launch_releases_the_slot() {
    let runner = ScriptedRunner::new();
    runner.push(ScriptedRun::spawn_failure("permission denied"));
    let coordinator = coordinator(&runner);

    let err = coordinator.start_stream(spec("/work/live.mp4")).await.unwrap_err();
    assert!(matches!(err, NotecastError::ProcessSpawn { .. }));
    assert_eq!(coordinator.active(), None);

    coordinator.start_stream(spec("/work/live.mp4")).await.unwrap();
    coordinator.end_stream().await.unwrap();
}

#[tokio::test]
async fn concurrent_pushes_are_all_delivered_whole() {
    let runner = ScriptedRunner::new();
    let coordinator = Arc::new(coordinator(&runner));
    coordinator.start_stream(spec("/work/live.mp4")).await.unwrap();

    let mut tasks = tokio::task::JoinSet::new();
    for n in 0..32u8 {
        let coordinator = Arc::clone(&coordinator);
        tasks.spawn(async move { coordinator.push_frame(&frame(n)).await });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap().unwrap();
    }
    coordinator.end_stream().await.unwrap();

    let mut chunks = runner.written_chunks();
    assert_eq!(chunks.len(), 32);
    assert!(chunks.iter().all(|c| c.len() == 16 && c.iter().all(|b| *b == c[0])));
    chunks.sort();
    chunks.dedup();
    assert_eq!(chunks.len(), 32);
}
