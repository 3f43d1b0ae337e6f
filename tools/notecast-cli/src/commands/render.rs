//! Encode the workspace frame sequence.

use std::io::Write;
use std::path::PathBuf;

use tokio::sync::mpsc;

use notecast_render_engine::{EncodeJob, EventSink, RenderCoordinator, RenderEvent};

use super::Context;

pub async fn run(
    ctx: &Context,
    workspace: Option<PathBuf>,
    fps: f64,
    bitrate: String,
    json: bool,
) -> anyhow::Result<()> {
    let layout = ctx.layout(workspace);
    let job = EncodeJob::from_layout(&layout, fps, &bitrate)?;

    if !json {
        println!("Rendering frames: {}", job.frame_pattern.display());
        println!("  Audio: {}", job.audio_track.display());
        println!("  Output: {}", job.output.display());
        println!("  Frame rate: {fps}, bitrate: {}k", job.bitrate_kbps);
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if json {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => tracing::warn!(error = %e, "Failed to serialize render event"),
                }
                continue;
            }
            match event {
                RenderEvent::Started { mode } => println!("  Encoder started ({mode})"),
                RenderEvent::Progress { percent } => {
                    print!("\r  Progress: {percent}%  ");
                    let _ = std::io::stdout().flush();
                }
                RenderEvent::FallingBackToCpu { reason } => {
                    println!("\n  Hardware encode unavailable ({reason}), using software encoder")
                }
                RenderEvent::Finished { .. } => println!(),
            }
        }
    });

    let coordinator = RenderCoordinator::new(ctx.runner(), ctx.config.encode.clone());
    let sink = EventSink::new(tx);
    let result = coordinator.render_frames(&job, &sink).await;
    drop(sink);
    let _ = printer.await;

    let outcome = result?;
    if !json {
        println!(
            "Render complete: {} ({} encoder{})",
            outcome.output.display(),
            outcome.mode,
            if outcome.fell_back { ", after fallback" } else { "" }
        );
    }
    Ok(())
}
