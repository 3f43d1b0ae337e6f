//! Pipe a directory of frames into a streaming encode.

use std::path::{Path, PathBuf};

use notecast_render_engine::{FramePayload, RenderCoordinator, StreamSpec};

use super::Context;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    ctx: &Context,
    workspace: Option<PathBuf>,
    frames: PathBuf,
    width: u32,
    height: u32,
    fps: f64,
    bitrate: String,
    output: String,
) -> anyhow::Result<()> {
    let layout = ctx.layout(workspace);
    let spec = StreamSpec::new(
        width,
        height,
        fps,
        &bitrate,
        layout.mixed_track_path(),
        layout.path(&output),
    )?;

    let files = frame_files(&frames)?;
    if files.is_empty() {
        return Err(anyhow::anyhow!("No frames found in {}", frames.display()));
    }

    let (out_w, out_h) = spec.output_dimensions();
    println!("Streaming {} frames from: {}", files.len(), frames.display());
    println!("  Output: {} ({out_w}x{out_h})", spec.output.display());

    let coordinator = RenderCoordinator::new(ctx.runner(), ctx.config.encode.clone());
    coordinator.start_stream(spec).await?;

    let mut push_error = None;
    for path in &files {
        let frame = match load_frame(path) {
            Ok(frame) => frame,
            Err(e) => {
                push_error = Some(e);
                break;
            }
        };
        if let Err(e) = coordinator.push_frame(&frame).await {
            push_error = Some(e.into());
            break;
        }
    }

    // Always collect the encoder status, even after a failed push.
    let ended = coordinator.end_stream().await;
    if let Some(e) = push_error {
        if let Err(end_err) = ended {
            tracing::warn!(error = %end_err, "Encoder also failed while closing");
        }
        return Err(e);
    }

    let output = ended?;
    println!("Stream complete: {}", output.display());
    Ok(())
}

/// Frame files in numeric order (`f2.png` before `f10.png`).
fn frame_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files: Vec<(u64, PathBuf)> = std::fs::read_dir(dir)
        .map_err(|e| anyhow::anyhow!("Failed to read frames directory {}: {e}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter_map(|path| {
            let index = frame_index(path.file_stem()?.to_str()?)?;
            Some((index, path))
        })
        .collect();
    files.sort();
    Ok(files.into_iter().map(|(_, path)| path).collect())
}

fn frame_index(stem: &str) -> Option<u64> {
    let digits: String = stem.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn load_frame(path: &Path) -> anyhow::Result<FramePayload> {
    let is_data_url = path.extension().is_some_and(|ext| ext == "txt");
    if is_data_url {
        let text = std::fs::read_to_string(path)?;
        Ok(FramePayload::from_data_url(&text)?)
    } else {
        Ok(FramePayload::from_bytes(std::fs::read(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_index() {
        assert_eq!(frame_index("f10"), Some(10));
        assert_eq!(frame_index("frame_0007"), Some(7));
        assert_eq!(frame_index("cover"), None);
    }

    #[test]
    fn test_frame_files_numeric_order() {
        let dir = std::env::temp_dir().join(format!("notecast_cli_frames_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for name in ["f10.png", "f2.png", "f1.png", "notes.md"] {
            std::fs::write(dir.join(name), b"x").unwrap();
        }

        let names: Vec<String> = frame_files(&dir)
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["f1.png", "f2.png", "f10.png"]);
        std::fs::remove_dir_all(&dir).ok();
    }
}
