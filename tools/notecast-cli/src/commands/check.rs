//! Check the encoder installation.

use notecast_common::config::config_file_path;
use notecast_process_core::{LineAction, ProcessRunner};
use notecast_render_engine::{HardwareFailure, PHRASE_SET_REVISION};

use super::Context;

pub async fn run(ctx: &Context) -> anyhow::Result<()> {
    println!("notecast System Check");
    println!("{}", "=".repeat(50));

    let config_path = config_file_path();
    if config_path.exists() {
        println!("[OK] Config: {}", config_path.display());
    } else {
        println!("[--] Config: defaults ({} not found)", config_path.display());
    }

    let layout = &ctx.config.workspace;
    if layout.dir.is_dir() {
        println!("[OK] Workspace: {}", layout.dir.display());
    } else {
        println!("[WARN] Workspace does not exist yet: {}", layout.dir.display());
    }

    let mut version = None;
    let mut observer = |line: &str| {
        if version.is_none() && line.contains("version") {
            version = Some(line.to_string());
        }
        LineAction::Continue
    };
    let args = ["-hide_banner".to_string(), "-version".to_string()];
    match ctx.ffmpeg.run(&args, &mut observer).await {
        Ok(_) => {
            println!("[OK] Encoder: {}", ctx.ffmpeg.binary().display());
            if let Some(version) = version {
                println!("     {version}");
            }
        }
        Err(e) => {
            println!("[FAIL] Encoder: {}", ctx.ffmpeg.binary().display());
            println!("     {e}");
            println!();
            println!("Install ffmpeg, set FFMPEG_PATH, or set encoder.binary in the config.");
            return Err(e.into());
        }
    }

    println!(
        "     Hardware codec: {}, software codec: {}",
        ctx.config.encode.gpu_codec, ctx.config.encode.cpu_codec
    );
    println!(
        "     Hardware fallback phrases: revision {PHRASE_SET_REVISION} ({} known)",
        HardwareFailure::ALL.len()
    );
    println!();
    println!("The encoder is available. notecast is ready.");
    Ok(())
}
