//! Mix hit sounds over the main track.

use std::path::PathBuf;

use notecast_audio_mix::{AudioMixEngine, MixRequest};
use notecast_chart_model::{parse_hit_list, parse_volume_list, VolumeTable};

use super::Context;

pub async fn run(
    ctx: &Context,
    workspace: Option<PathBuf>,
    hits: Option<String>,
    hits_file: Option<PathBuf>,
    volumes: Option<String>,
) -> anyhow::Result<()> {
    let layout = ctx.layout(workspace);
    println!("Mixing audio in: {}", layout.dir.display());

    let raw_hits = match (hits, hits_file) {
        (Some(list), _) => list,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Failed to read hit list {}: {e}", path.display()))?,
        (None, None) => return Err(anyhow::anyhow!("Provide --hits or --hits-file")),
    };
    let events = parse_hit_list(&raw_hits)?;

    let slot_count = ctx.config.mix.slot_count;
    let volumes = match volumes {
        Some(list) => parse_volume_list(&list, slot_count)?,
        None => VolumeTable::unity(slot_count),
    };

    println!("  Hit events: {}", events.len());
    println!("  Batch size: {}", ctx.config.mix.batch_size);

    let engine = AudioMixEngine::new(ctx.runner(), layout, ctx.config.mix.clone());
    let report = engine.mix(&MixRequest { events, volumes }).await?;

    println!(
        "Mix complete: {} ({} batches, {} clips adjusted)",
        report.output.display(),
        report.batches,
        report.adjusted_clips
    );
    Ok(())
}
