//! Check external tool availability.

use b50reel_common::config::AppConfig;
use serde::Serialize;

#[derive(Serialize)]
struct ToolStatus {
    name: &'static str,
    path: String,
    available: bool,
    required: bool,
}

pub fn run(config: &AppConfig, json: bool) -> anyhow::Result<()> {
    let tools = super::tools(config);
    let report = [
        ToolStatus {
            name: "ffmpeg",
            path: tools.ffmpeg.display().to_string(),
            available: tools.ffmpeg_available(),
            required: true,
        },
        ToolStatus {
            name: "ffprobe",
            path: tools.ffprobe.display().to_string(),
            available: tools.ffprobe_available(),
            required: true,
        },
        ToolStatus {
            name: "ffmpeg-concat",
            path: tools.ffmpeg_concat.display().to_string(),
            available: tools.ffmpeg_concat_available(),
            required: false,
        },
    ];

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("b50reel System Check");
    println!("{}", "=".repeat(50));
    for tool in &report {
        let tag = match (tool.available, tool.required) {
            (true, _) => "[OK]  ",
            (false, true) => "[FAIL]",
            (false, false) => "[WARN]",
        };
        println!("{tag} {} ({})", tool.name, tool.path);
    }

    println!();
    if report.iter().filter(|t| t.required).all(|t| t.available) {
        println!("All required tools are available.");
        if !report[2].available {
            println!("Morph transitions need ffmpeg-concat on PATH.");
        }
    } else {
        println!("ffmpeg and ffprobe are required. Install them or set their paths in the config.");
    }
    Ok(())
}
