//! Render score card images.

use std::path::PathBuf;

use b50reel_project_model::load_records;
use b50reel_render_engine::{render_score_cards, FontCache};

pub fn run(records: PathBuf, style: PathBuf, out: PathBuf) -> anyhow::Result<()> {
    let records = load_records(&records)
        .map_err(|e| anyhow::anyhow!("Failed to load records: {e}"))?;
    let style = super::load_style(&style)?;
    std::fs::create_dir_all(&out)?;

    println!("Rendering {} score cards into {}", records.len(), out.display());
    let results = render_score_cards(&records, &style, &out, &FontCache::new());

    let mut failed = 0;
    for (clip_id, result) in &results {
        if !result.is_ok() {
            failed += 1;
        }
        println!("  {:<24} {:<8} {}", clip_id, result.status, result.info);
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} score cards failed", results.len());
    }
    Ok(())
}
