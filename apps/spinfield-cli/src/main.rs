use anyhow::Result;
use clap::{Parser, Subcommand};
use glam::Vec3;
use serde::Serialize;
use spinfield_common::{
    AppConfig, Capabilities, ClipDepth, PlayerState, RenderConfig, TransformMode,
};
use spinfield_frame::{CancelHandle, FrameHandler, FrameScheduler};
use spinfield_instances::{InstanceModel, InstanceStack};
use spinfield_kernel::Simulation;
use spinfield_render::{Camera, FrameStats, HeadlessBackend, RenderDispatch, cube_mesh};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "spinfield-cli", about = "CLI tool for spinfield runs and configs")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version, crate info and the default configuration
    Info,
    /// Run frames against the headless backend and report the work issued
    Run {
        /// YAML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Number of frames to run
        #[arg(short, long, default_value = "120")]
        frames: u64,
        /// Target frame interval in milliseconds
        #[arg(long, default_value = "16")]
        interval_ms: u64,
        /// Transform mode: per-draw, host or device
        #[arg(short, long)]
        mode: Option<TransformMode>,
        /// Number of instances to generate
        #[arg(short = 'n', long)]
        instances: Option<u32>,
        /// Draw without directional lighting
        #[arg(long)]
        no_lighting: bool,
        /// Movement keys held for the whole run (forward, back, left, right, up, down)
        #[arg(long = "hold", value_delimiter = ',')]
        hold: Vec<String>,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load a config file and resolve its render capabilities
    Validate {
        path: PathBuf,
    },
    /// Print the composed camera matrix for a pose
    Camera {
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        x: f32,
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        y: f32,
        #[arg(long, default_value = "-5", allow_negative_numbers = true)]
        z: f32,
        /// Yaw in radians
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        yaw: f32,
        /// Pitch in radians, clamped to ±π/2
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        pitch: f32,
        /// Field of view in degrees
        #[arg(long, default_value = "108")]
        fov: f32,
        #[arg(long, default_value = "1280")]
        width: f32,
        #[arg(long, default_value = "720")]
        height: f32,
        /// Use GL-style [-1, 1] clip depth
        #[arg(long)]
        gl_depth: bool,
    },
}

#[derive(Debug, Serialize)]
struct RunSummary {
    mode: TransformMode,
    lighting: bool,
    instances: usize,
    frames: u64,
    elapsed_ms: f64,
    fps: Option<f64>,
    draw_calls: u64,
    instances_drawn: u64,
    bytes_uploaded: u64,
    uniform_writes: u64,
    failed_frames: u64,
    position: [f32; 3],
    yaw: f32,
    pitch: f32,
    world_angle: f32,
}

/// Frame handler that renders into a [`HeadlessBackend`] for a fixed frame count.
struct HeadlessRun {
    sim: Simulation,
    model: InstanceModel,
    backend: HeadlessBackend,
    dispatch: RenderDispatch,
    remaining: u64,
    cancel: CancelHandle,
    totals: FrameStats,
    failed_frames: u64,
    fps: Option<f64>,
}

impl FrameHandler for HeadlessRun {
    fn tick(&mut self, delta_ms: f64) {
        self.sim.update(delta_ms);
        self.model.update(self.sim.world().angle);
        match self.dispatch.draw_frame(
            &mut self.backend,
            &self.model,
            self.sim.player(),
            self.sim.world(),
            (1280.0, 720.0),
        ) {
            Ok(stats) => self.totals += stats,
            Err(e) => {
                self.failed_frames += 1;
                tracing::error!("frame failed: {e}");
            }
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.cancel.cancel();
        }
    }

    fn report_fps(&mut self, fps: Option<f64>) {
        self.fps = fps;
        tracing::trace!(?fps, "frame reported");
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Info => {
            let config = AppConfig::default();
            println!("spinfield-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("render: {}", spinfield_render::crate_info());
            println!(
                "defaults: instances={}, mode={}, lighting={}, seed={}",
                config.render.instance_count,
                config.validate()?.mode,
                config.render.lighting,
                config.seed
            );
            println!(
                "modes: {}",
                TransformMode::ALL.map(TransformMode::name).join(", ")
            );
        }
        Commands::Run {
            config,
            frames,
            interval_ms,
            mode,
            instances,
            no_lighting,
            hold,
            json,
        } => {
            let mut config = match config {
                Some(path) => AppConfig::load(path)?,
                None => AppConfig::default(),
            };
            let count = instances.unwrap_or(config.render.instance_count);
            let lighting = config.render.lighting && !no_lighting;
            config.render = match mode {
                Some(mode) => RenderConfig::with_mode(count, mode, lighting),
                None => RenderConfig {
                    instance_count: count,
                    lighting,
                    ..config.render
                },
            };
            let caps = config.validate()?;
            let summary = run_headless(&config, caps, frames, interval_ms, &hold)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
        }
        Commands::Validate { path } => {
            let config = AppConfig::load(&path)?;
            let caps = config.validate()?;
            println!(
                "{}: ok (mode={}, lighting={}, instances={})",
                path.display(),
                caps.mode,
                caps.lighting,
                config.render.instance_count
            );
        }
        Commands::Camera {
            x,
            y,
            z,
            yaw,
            pitch,
            fov,
            width,
            height,
            gl_depth,
        } => {
            let config = AppConfig::default();
            let clip_depth = if gl_depth {
                ClipDepth::NegOneToOne
            } else {
                ClipDepth::ZeroToOne
            };
            let mut player = PlayerState::default();
            player.position = Vec3::new(x, y, z);
            player.yaw = yaw;
            player.set_pitch(pitch);
            player.fov = fov.to_radians();

            let camera = Camera::new(config.projection, clip_depth);
            let m = camera.view_projection(&player, width, height);
            for row in 0..4 {
                let r = m.row(row);
                println!("{:>12.6} {:>12.6} {:>12.6} {:>12.6}", r.x, r.y, r.z, r.w);
            }
        }
    }

    Ok(())
}

fn run_headless(
    config: &AppConfig,
    caps: Capabilities,
    frames: u64,
    interval_ms: u64,
    hold: &[String],
) -> Result<RunSummary> {
    let stack = InstanceStack::generate(config.render.instance_count, &config.generation, config.seed);
    let mut model = InstanceModel::new(stack, caps.mode);
    let mut sim = Simulation::new(config);
    model.update(sim.world().angle);
    for name in hold {
        if !sim.input_mut().set_held_by_name(name, true) {
            tracing::warn!(name, "unknown key name ignored");
        }
    }

    let mut backend = HeadlessBackend::new();
    let camera = Camera::new(config.projection, ClipDepth::ZeroToOne);
    let dispatch = RenderDispatch::setup(&mut backend, &cube_mesh(), &model, caps, camera)?;

    let mut scheduler = FrameScheduler::start();
    if frames == 0 {
        scheduler.cancel();
    }
    let mut run = HeadlessRun {
        sim,
        model,
        backend,
        dispatch,
        remaining: frames,
        cancel: scheduler.cancel_handle(),
        totals: FrameStats::default(),
        failed_frames: 0,
        fps: None,
    };

    let started = Instant::now();
    let ran = scheduler.run_paced(&mut run, Duration::from_millis(interval_ms));
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    tracing::info!(frames = ran, elapsed_ms, "headless run finished");

    let player = run.sim.player();
    Ok(RunSummary {
        mode: caps.mode,
        lighting: run.dispatch.lighting_active(),
        instances: run.model.len(),
        frames: ran,
        elapsed_ms,
        fps: run.fps,
        draw_calls: run.totals.draw_calls,
        instances_drawn: run.totals.instances_drawn,
        bytes_uploaded: run.totals.bytes_uploaded,
        uniform_writes: run.totals.uniform_writes,
        failed_frames: run.failed_frames,
        position: player.position.to_array(),
        yaw: player.yaw,
        pitch: player.pitch(),
        world_angle: run.sim.world().angle,
    })
}

fn print_summary(s: &RunSummary) {
    println!(
        "mode={} lighting={} instances={} frames={}",
        s.mode, s.lighting, s.instances, s.frames
    );
    match s.fps {
        Some(fps) => println!("elapsed: {:.1} ms, fps: {fps:.1}", s.elapsed_ms),
        None => println!("elapsed: {:.1} ms, fps: n/a", s.elapsed_ms),
    }
    println!(
        "draw calls: {}, instances drawn: {}, bytes uploaded: {}, uniform writes: {}",
        s.draw_calls, s.instances_drawn, s.bytes_uploaded, s.uniform_writes
    );
    if s.failed_frames > 0 {
        println!("failed frames: {}", s.failed_frames);
    }
    println!(
        "player: ({:.2}, {:.2}, {:.2}) yaw={:.3} pitch={:.3}, world angle={:.3}",
        s.position[0], s.position[1], s.position[2], s.yaw, s.pitch, s.world_angle
    );
}
