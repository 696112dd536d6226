//! b50reel Render Engine
//!
//! Turns score records and clip configurations into a finished highlight
//! reel by driving ffmpeg subprocesses.
//!
//! # Pipeline Architecture
//!
//! ```text
//! records.json ── score_card ──> <clip_id>.png
//!                                     │
//! source.mp4 ── decode (RGBA) ── ClipScene ── encode (H.264/AAC) ──> <clip_id>.mp4
//!                                     │
//!                 text block ─────────┘            ... one per clip (batch)
//!                                                          │
//!                                       assemble (xfade | direct | morph)
//!                                                          │
//!                                                          ▼
//!                                                 <username>_B50.mp4
//! ```

pub mod assemble;
pub mod batch;
pub mod clip;
pub mod compositor;
pub mod ffmpeg;
pub mod manifest;
pub mod outcome;
pub mod pipeline;
pub mod preview;
pub mod score_card;
pub mod text;

pub use assemble::{
    assemble, assemble_video, request_from_manifest, strategy_for, AssemblyClip,
    AssemblyRequest, AssemblyStrategy, DirectConcat, MorphTransition, StrategyKind,
    TransitionName, XfadeStrategy,
};
pub use batch::{
    render_all, BatchEntry, BatchOptions, BatchSummary, CancelToken, EventSink, PipelineEvent,
};
pub use clip::{render_clip, render_clip_preview, ClipPlan, ClipRenderOutcome, ClipRenderer};
pub use compositor::{compose_frame, compose_text_block, ClipScene, Rect};
pub use ffmpeg::{FfmpegTools, MediaInfo};
pub use manifest::RenderManifest;
pub use outcome::{OperationResult, OperationStatus};
pub use pipeline::{render_complete_video, FullVideoReport, FullVideoRequest};
pub use preview::{render_preview_frame, write_preview, PreviewTarget};
pub use score_card::{render_score_card, render_score_cards, write_score_card};
pub use text::FontCache;
