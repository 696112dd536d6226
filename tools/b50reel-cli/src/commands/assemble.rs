//! Assemble rendered clips from a render manifest.

use std::path::PathBuf;

use b50reel_common::config::AppConfig;
use b50reel_render_engine::{
    assemble_video, request_from_manifest, strategy_for, StrategyKind, TransitionName,
};

pub fn run(
    config: &AppConfig,
    dir: PathBuf,
    strategy: String,
    transition: String,
    trans_time: Option<f64>,
    fade: bool,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let kind: StrategyKind = strategy.parse()?;
    let transition: TransitionName = transition.parse()?;
    let tools = super::tools(config);
    let output = output.unwrap_or_else(|| dir.join("assembled.mp4"));

    let request = request_from_manifest(&tools, &dir, &output, trans_time)?;
    let strategy = strategy_for(kind, transition, fade);
    if !strategy.is_available(&tools) {
        anyhow::bail!(
            "the {} strategy needs tools that are not available; run `b50reel check`",
            strategy.name()
        );
    }

    println!(
        "Assembling {} clips with {} into {}",
        request.clips.len(),
        strategy.name(),
        output.display()
    );
    let sink = super::progress_sink();
    let on_progress = |fraction: f64| {
        sink(b50reel_render_engine::PipelineEvent::AssemblyProgress { fraction })
    };
    let result = assemble_video(&tools, strategy.as_ref(), &request, Some(&on_progress));

    println!("\n{}: {}", result.status, result.info);
    if !result.is_ok() {
        anyhow::bail!("assembly failed");
    }
    Ok(())
}
