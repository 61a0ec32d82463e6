use anyhow::{Context, Result};
use clap::Parser;
use glam::Vec2;
use spinfield_common::{AppConfig, Capabilities, ClipDepth, RenderConfig, TransformMode};
use spinfield_frame::{FrameHandler, FrameOutcome, FrameScheduler};
use spinfield_input::{HoldKey, PointerMode};
use spinfield_instances::{InstanceModel, InstanceStack};
use spinfield_kernel::Simulation;
use spinfield_render::{Camera, RenderDispatch, cube_mesh};
use spinfield_render_wgpu::WgpuBackend;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{CursorGrabMode, Window, WindowId};

const FOV_STEP_DEGREES: f32 = 5.0;
const TITLE_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "spinfield-desktop", about = "Spinning cube field renderer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of instances to generate
    #[arg(short = 'n', long)]
    instances: Option<u32>,

    /// Transform mode: per-draw, host or device
    #[arg(short, long)]
    mode: Option<TransformMode>,

    /// Draw without directional lighting
    #[arg(long)]
    no_lighting: bool,

    /// Seed for instance generation
    #[arg(long)]
    seed: Option<u64>,

    /// Initial field of view in degrees
    #[arg(long)]
    fov: Option<f32>,
}

impl Cli {
    fn resolve_config(&self) -> Result<(AppConfig, Capabilities)> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(fov) = self.fov {
            config.player.fov_degrees = fov;
        }
        let count = self.instances.unwrap_or(config.render.instance_count);
        let lighting = config.render.lighting && !self.no_lighting;
        config.render = match self.mode {
            Some(mode) => RenderConfig::with_mode(count, mode, lighting),
            None => RenderConfig {
                instance_count: count,
                lighting,
                ..config.render
            },
        };
        let caps = config.validate()?;
        Ok((config, caps))
    }
}

fn hold_key(code: KeyCode) -> Option<HoldKey> {
    match code {
        KeyCode::KeyW => Some(HoldKey::Forward),
        KeyCode::KeyS => Some(HoldKey::Back),
        KeyCode::KeyA => Some(HoldKey::Left),
        KeyCode::KeyD => Some(HoldKey::Right),
        KeyCode::Space => Some(HoldKey::Up),
        KeyCode::ShiftLeft => Some(HoldKey::Down),
        _ => None,
    }
}

/// Everything that exists once the window and device are up.
struct Runtime {
    window: Arc<Window>,
    backend: WgpuBackend,
    dispatch: RenderDispatch,
    sim: Simulation,
    model: InstanceModel,
    failed_frames: u64,
    fps: Option<f64>,
    title_updated: Option<Instant>,
}

impl Runtime {
    fn new(
        event_loop: &ActiveEventLoop,
        config: &AppConfig,
        caps: Capabilities,
    ) -> Result<Self> {
        let attrs = Window::default_attributes()
            .with_title("spinfield")
            .with_inner_size(PhysicalSize::new(1280u32, 720));
        let window = Arc::new(event_loop.create_window(attrs)?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("no graphics adapter for this surface")?;
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("spinfield_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))?;

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or(surface_caps.formats.first())
            .copied()
            .context("surface reports no formats")?;
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        tracing::info!(
            backend = adapter.get_info().backend.to_str(),
            adapter = %adapter.get_info().name,
            ?format,
            "GPU initialized"
        );

        let mut backend = WgpuBackend::new(device, queue, surface, surface_config);

        let stack = InstanceStack::generate(
            config.render.instance_count,
            &config.generation,
            config.seed,
        );
        let mut model = InstanceModel::new(stack, caps.mode);
        let mut sim = Simulation::new(config);
        model.update(sim.world().angle);

        let camera = Camera::new(config.projection, ClipDepth::ZeroToOne);
        let dispatch = RenderDispatch::setup(&mut backend, &cube_mesh(), &model, caps, camera)?;

        // Start in the menu until the user clicks into the window.
        sim.input_mut().focus_lost();

        Ok(Self {
            window,
            backend,
            dispatch,
            sim,
            model,
            failed_frames: 0,
            fps: None,
            title_updated: None,
        })
    }

    fn viewport(&self) -> Vec2 {
        let (w, h) = self.backend.size();
        Vec2::new(w as f32, h as f32)
    }

    fn grab_pointer(&mut self) {
        let grabbed = self
            .window
            .set_cursor_grab(CursorGrabMode::Locked)
            .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Confined));
        let mode = match grabbed {
            Ok(()) => {
                self.window.set_cursor_visible(false);
                PointerMode::Locked
            }
            Err(e) => {
                tracing::warn!("pointer lock unavailable, using absolute pointer: {e}");
                PointerMode::Unlocked
            }
        };
        self.sim.input_mut().focus_gained_with(mode);
    }

    fn release_pointer(&mut self) {
        if let Err(e) = self.window.set_cursor_grab(CursorGrabMode::None) {
            tracing::debug!("cursor release failed: {e}");
        }
        self.window.set_cursor_visible(true);
        self.sim.input_mut().focus_lost();
    }

    fn handle_key(&mut self, code: KeyCode, pressed: bool, repeat: bool) {
        if let Some(key) = hold_key(code) {
            self.sim.input_mut().set_held(key, pressed);
            return;
        }
        if !pressed || repeat {
            return;
        }
        match code {
            KeyCode::Escape => self.release_pointer(),
            KeyCode::Minus => {
                self.sim.adjust_fov_degrees(-FOV_STEP_DEGREES);
            }
            KeyCode::Equal => {
                self.sim.adjust_fov_degrees(FOV_STEP_DEGREES);
            }
            _ => {}
        }
    }

    fn update_title(&mut self) {
        let now = Instant::now();
        if self
            .title_updated
            .is_some_and(|t| now.duration_since(t) < TITLE_INTERVAL)
        {
            return;
        }
        self.title_updated = Some(now);

        let mut parts = vec![
            "spinfield".to_string(),
            self.dispatch.capabilities().mode.to_string(),
            format!("{} instances", self.model.len()),
        ];
        match self.fps {
            Some(fps) => parts.push(format!("{fps:.1} fps")),
            None => parts.push("-- fps".to_string()),
        }
        if self.sim.player().in_menu {
            parts.push("click to play".to_string());
        }
        self.window.set_title(&parts.join(" | "));
    }
}

impl FrameHandler for Runtime {
    fn tick(&mut self, delta_ms: f64) {
        self.sim.update(delta_ms);
        self.model.update(self.sim.world().angle);
        let viewport = self.viewport();
        if let Err(e) = self.dispatch.draw_frame(
            &mut self.backend,
            &self.model,
            self.sim.player(),
            self.sim.world(),
            (viewport.x, viewport.y),
        ) {
            self.failed_frames += 1;
            if self.failed_frames == 1 {
                tracing::error!("frame failed: {e}");
            } else {
                tracing::debug!(failed = self.failed_frames, "frame failed: {e}");
            }
        }
    }

    fn report_fps(&mut self, fps: Option<f64>) {
        self.fps = fps;
        self.update_title();
    }
}

struct SpinfieldApp {
    config: AppConfig,
    capabilities: Capabilities,
    scheduler: FrameScheduler,
    clock: Instant,
    runtime: Option<Runtime>,
    error: Option<anyhow::Error>,
}

impl SpinfieldApp {
    fn new(config: AppConfig, capabilities: Capabilities) -> Self {
        Self {
            config,
            capabilities,
            scheduler: FrameScheduler::start(),
            clock: Instant::now(),
            runtime: None,
            error: None,
        }
    }
}

impl ApplicationHandler for SpinfieldApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.runtime.is_some() {
            return;
        }
        match Runtime::new(event_loop, &self.config, self.capabilities) {
            Ok(runtime) => {
                runtime.window.request_redraw();
                self.runtime = Some(runtime);
            }
            Err(e) => {
                tracing::error!("setup failed: {e:#}");
                self.error = Some(e);
                self.scheduler.cancel();
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(runtime) = &mut self.runtime else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                self.scheduler.cancel();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                runtime.backend.resize(size.width, size.height);
            }
            WindowEvent::Focused(false) => runtime.release_pointer(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        repeat,
                        ..
                    },
                ..
            } => {
                runtime.handle_key(code, state == ElementState::Pressed, repeat);
            }
            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state: ElementState::Pressed,
                ..
            } => {
                if runtime.sim.input().pointer_mode() == PointerMode::Unlocked {
                    runtime.grab_pointer();
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let viewport = runtime.viewport();
                runtime
                    .sim
                    .input_mut()
                    .pointer_position(Vec2::new(position.x as f32, position.y as f32), viewport);
            }
            WindowEvent::RedrawRequested => {
                let now_ms = self.clock.elapsed().as_secs_f64() * 1000.0;
                match self.scheduler.on_frame(now_ms, runtime) {
                    FrameOutcome::Ticked { .. } => {}
                    FrameOutcome::Finished { .. } | FrameOutcome::Cancelled => {
                        tracing::info!(frames = self.scheduler.frames(), "frame loop stopped");
                        event_loop.exit();
                    }
                }
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let (Some(runtime), DeviceEvent::MouseMotion { delta }) = (&mut self.runtime, event) {
            runtime
                .sim
                .input_mut()
                .pointer_motion(Vec2::new(delta.0 as f32, delta.1 as f32));
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(runtime) = &self.runtime {
            runtime.window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let (config, caps) = cli.resolve_config()?;
    tracing::info!(
        mode = %caps.mode,
        lighting = caps.lighting,
        instances = config.render.instance_count,
        "spinfield-desktop starting"
    );

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = SpinfieldApp::new(config, caps);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
