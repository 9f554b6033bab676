//! Viewer lifecycle and the winit application driving it.
//!
//! Each [`ViewerConfig`] gets its own window (a canvas on the web), GPU
//! context and model. A viewer moves through the [`ViewerPhase`]s:
//!
//! 1. `Mounting`: the window exists, the GPU context is being created
//! 2. `Loading`: the asset is fetched on a background task that reports
//!    progress and the result back through the event loop proxy
//! 3. `Ready` (or `Failed`): frames are rendered until the window closes or
//!    `max_frames` is reached
//! 4. `Unmounted`: every resource has been released in a fixed order
//!
//! The event loop exits once every viewer is unmounted.

use std::{collections::HashMap, fmt::Debug, sync::Arc};

use log::{debug, error, info, warn};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::{Window, WindowId},
};

use crate::{
    animation::clock::Clock,
    config::ViewerConfig,
    context::Context,
    render::render_frame,
    resources::{self, LoadProgress, ModelData},
    scene::LoadedScene,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewerPhase {
    Mounting,
    Loading,
    Ready,
    /// The asset could not be loaded; the empty scene keeps rendering.
    Failed,
    Unmounted,
}

impl ViewerPhase {
    /// The GPU context is up and the asset load has been started.
    pub fn on_context_ready(self) -> Self {
        match self {
            ViewerPhase::Mounting => ViewerPhase::Loading,
            other => other,
        }
    }

    /// Only a viewer still waiting for its asset takes a load result. This
    /// drops results arriving after unmount and keeps attach to at most once.
    pub fn accepts_load_result(self) -> bool {
        self == ViewerPhase::Loading
    }

    pub fn on_loaded(self, success: bool) -> Self {
        match (self, success) {
            (ViewerPhase::Loading, true) => ViewerPhase::Ready,
            (ViewerPhase::Loading, false) => ViewerPhase::Failed,
            (other, _) => other,
        }
    }

    pub fn renders(self) -> bool {
        matches!(
            self,
            ViewerPhase::Loading | ViewerPhase::Ready | ViewerPhase::Failed
        )
    }

    pub fn is_mounted(self) -> bool {
        self != ViewerPhase::Unmounted
    }
}

pub enum ViewerEvent {
    #[cfg(target_arch = "wasm32")]
    ContextReady {
        window_id: WindowId,
        result: anyhow::Result<Context>,
    },
    Progress {
        window_id: WindowId,
        progress: LoadProgress,
    },
    Loaded {
        window_id: WindowId,
        result: anyhow::Result<ModelData>,
    },
}

impl Debug for ViewerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(target_arch = "wasm32")]
            Self::ContextReady { window_id, result } => f
                .debug_struct("ContextReady")
                .field("window_id", window_id)
                .field("ok", &result.is_ok())
                .finish(),
            Self::Progress {
                window_id,
                progress,
            } => f
                .debug_struct("Progress")
                .field("window_id", window_id)
                .field("progress", progress)
                .finish(),
            Self::Loaded { window_id, result } => f
                .debug_struct("Loaded")
                .field("window_id", window_id)
                .field("ok", &result.is_ok())
                .finish(),
        }
    }
}

/// One mounted model viewer.
pub struct Viewer {
    config: ViewerConfig,
    window: Arc<Window>,
    mount: Mount,
    clock: Clock,
    frames: u64,
}

impl Viewer {
    fn new(config: ViewerConfig, window: Arc<Window>) -> Self {
        Self {
            config,
            window,
            mount: Mount::default(),
            clock: Clock::new(),
            frames: 0,
        }
    }

    pub fn phase(&self) -> ViewerPhase {
        self.mount.phase
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn context_ready(&mut self, mut ctx: Context) {
        if !self.mount.phase.is_mounted() {
            debug!("Discarding GPU context of unmounted viewer {}", self.config.title);
            ctx.destroy();
            return;
        }
        let size = self.window.inner_size();
        ctx.resize(size.width, size.height);
        self.mount.ctx = Some(ctx);
        self.mount.phase = self.mount.phase.on_context_ready();
        self.window.request_redraw();
    }

    fn on_progress(&self, progress: LoadProgress) {
        if !self.mount.phase.accepts_load_result() {
            return;
        }
        match progress.percent() {
            Some(percent) => info!("{percent:.2}% loaded"),
            None => info!("{} bytes loaded", progress.loaded),
        }
    }

    fn on_loaded(&mut self, result: anyhow::Result<ModelData>) {
        if !self.mount.phase.accepts_load_result() || self.mount.scene.is_some() {
            debug!(
                "Discarding load result for {} in phase {:?}",
                self.config.asset_path, self.mount.phase
            );
            return;
        }
        let Some(ctx) = self.mount.ctx.as_mut() else {
            debug!("Discarding load result for {}: no GPU context", self.config.asset_path);
            return;
        };
        match result {
            Ok(data) => {
                info!(
                    "Loaded {}: {} nodes, {} primitives, {} animations",
                    self.config.asset_path,
                    data.graph.len(),
                    data.meshes.len(),
                    data.animations.len()
                );
                self.mount.scene = Some(LoadedScene::attach(ctx, data, &self.config));
                self.mount.phase = self.mount.phase.on_loaded(true);
            }
            Err(e) => {
                error!("Error loading model {}: {e:#}", self.config.asset_path);
                self.mount.phase = self.mount.phase.on_loaded(false);
            }
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        if let Some(ctx) = self.mount.ctx.as_mut() {
            ctx.resize(width, height);
        }
    }

    /// Advance animations and draw one frame. Returns `true` when the viewer
    /// has rendered its configured number of frames and should unmount.
    fn redraw(&mut self) -> bool {
        if !self.mount.phase.renders() {
            return false;
        }
        let Some(ctx) = self.mount.ctx.as_mut() else {
            return false;
        };

        let dt = self.clock.delta();
        if let Some(scene) = self.mount.scene.as_mut() {
            for event in scene.update(dt) {
                debug!("{event:?}");
            }
            scene.write_instances(&ctx.queue);
        }

        match render_frame(ctx, self.mount.scene.as_ref()) {
            Ok(()) => self.frames += 1,
            // Reconfigure the surface if it's lost or outdated
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = self.window.inner_size();
                ctx.resize(size.width, size.height);
            }
            Err(e) => error!("Unable to render {e}"),
        }

        if self
            .config
            .max_frames
            .is_some_and(|max_frames| self.frames >= max_frames)
        {
            return true;
        }
        self.window.request_redraw();
        false
    }

    /// Release everything the viewer owns. Calling it again does nothing.
    pub fn unmount(&mut self) -> Vec<CleanupStep> {
        self.mount.teardown(&self.config.title)
    }
}

/// A step of the unmount sequence, in the order they run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CleanupStep {
    StoppedFrameLoop,
    ReleasedAnimations,
    DisposedModel,
    DisposedRenderer,
    RemovedCanvas,
    Complete,
}

/// The parts of a viewer that unmount tears down.
struct Mount {
    phase: ViewerPhase,
    ctx: Option<Context>,
    scene: Option<LoadedScene>,
    #[cfg(target_arch = "wasm32")]
    canvas: Option<web_sys::HtmlCanvasElement>,
}

impl Default for Mount {
    fn default() -> Self {
        Self {
            phase: ViewerPhase::Mounting,
            ctx: None,
            scene: None,
            #[cfg(target_arch = "wasm32")]
            canvas: None,
        }
    }
}

impl Mount {
    fn teardown(&mut self, title: &str) -> Vec<CleanupStep> {
        if !self.phase.is_mounted() {
            return Vec::new();
        }
        let mut steps = Vec::new();
        self.phase = ViewerPhase::Unmounted;
        info!("Cleanup: Stopped frame loop of {title}");
        steps.push(CleanupStep::StoppedFrameLoop);

        if let Some(mut scene) = self.scene.take() {
            scene.release_animations();
            info!("Cleanup: Released animation mixer and actions");
            steps.push(CleanupStep::ReleasedAnimations);
            scene.destroy();
            info!("Cleanup: Disposed model geometry, materials and textures");
            steps.push(CleanupStep::DisposedModel);
        }

        if let Some(ctx) = self.ctx.take() {
            ctx.destroy();
            info!("Cleanup: Disposed lights, camera and renderer");
            steps.push(CleanupStep::DisposedRenderer);
        }

        #[cfg(target_arch = "wasm32")]
        if let Some(canvas) = self.canvas.take() {
            match crate::web::remove_canvas(&canvas) {
                Ok(()) => {
                    info!("Cleanup: Removed canvas");
                    steps.push(CleanupStep::RemovedCanvas);
                }
                Err(e) => error!("Cleanup: Could not remove canvas: {e:#}"),
            }
        }

        info!("Cleanup: Complete");
        steps.push(CleanupStep::Complete);
        steps
    }
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<ViewerEvent>,
    pending: Vec<ViewerConfig>,
    viewers: HashMap<WindowId, Viewer>,
}

impl App {
    fn new(event_loop: &EventLoop<ViewerEvent>, configs: Vec<ViewerConfig>) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            proxy,
            pending: configs,
            viewers: HashMap::new(),
        })
    }

    fn mount(&mut self, event_loop: &ActiveEventLoop, config: ViewerConfig) -> anyhow::Result<()> {
        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes()
            .with_title(config.title.clone())
            .with_transparent(config.clear_colour.a < 1.0);

        #[cfg(target_arch = "wasm32")]
        let canvas = {
            use winit::platform::web::WindowAttributesExtWebSys;

            let canvas = crate::web::create_canvas(&config.mount_id)?;
            window_attributes = window_attributes
                .with_canvas(Some(canvas.clone()))
                .with_append(false);
            canvas
        };

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let window_id = window.id();
        info!("Mounting viewer {} for {}", config.title, config.asset_path);

        #[allow(unused_mut)]
        let mut viewer = Viewer::new(config.clone(), window.clone());
        #[cfg(target_arch = "wasm32")]
        {
            viewer.mount.canvas = Some(canvas);
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let ctx = self
                .async_runtime
                .block_on(Context::new(window, &config))?;
            viewer.context_ready(ctx);
            self.viewers.insert(window_id, viewer);
            self.start_loading(window_id, &config);
        }

        #[cfg(target_arch = "wasm32")]
        {
            self.viewers.insert(window_id, viewer);
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let result = Context::new(window, &config).await;
                if proxy
                    .send_event(ViewerEvent::ContextReady { window_id, result })
                    .is_err()
                {
                    warn!("Event loop closed before the GPU context was ready");
                }
            });
        }

        Ok(())
    }

    /// Fetch the asset of a viewer on a background task.
    fn start_loading(&self, window_id: WindowId, config: &ViewerConfig) {
        let root = config.asset_root.clone();
        let asset_path = config.asset_path.clone();
        let progress_proxy = self.proxy.clone();
        let proxy = self.proxy.clone();
        let load = async move {
            let result = resources::load_model_gltf(&root, &asset_path, move |progress| {
                // Progress is informational, a closed loop is reported by the final send.
                let _ = progress_proxy.send_event(ViewerEvent::Progress {
                    window_id,
                    progress,
                });
            })
            .await;
            if proxy
                .send_event(ViewerEvent::Loaded { window_id, result })
                .is_err()
            {
                debug!("Event loop closed before {asset_path} finished loading");
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            self.async_runtime.spawn(load);
        }

        #[cfg(target_arch = "wasm32")]
        {
            wasm_bindgen_futures::spawn_local(load);
        }
    }

    fn unmount(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId) {
        if let Some(mut viewer) = self.viewers.remove(&window_id) {
            viewer.unmount();
        }
        if self.viewers.is_empty() && self.pending.is_empty() {
            info!("All viewers unmounted, exiting");
            event_loop.exit();
        }
    }
}

impl ApplicationHandler<ViewerEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        for config in std::mem::take(&mut self.pending) {
            let title = config.title.clone();
            if let Err(e) = self.mount(event_loop, config) {
                error!("Could not mount viewer {title}: {e:#}");
            }
        }
        if self.viewers.is_empty() {
            warn!("No viewer could be mounted, exiting");
            event_loop.exit();
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        // Only a failed GPU setup on the web unmounts from here.
        #[cfg(not(target_arch = "wasm32"))]
        let _ = event_loop;
        match event {
            #[cfg(target_arch = "wasm32")]
            ViewerEvent::ContextReady { window_id, result } => match result {
                Ok(ctx) => {
                    let config = match self.viewers.get_mut(&window_id) {
                        Some(viewer) => {
                            viewer.context_ready(ctx);
                            viewer.config.clone()
                        }
                        None => {
                            ctx.destroy();
                            return;
                        }
                    };
                    self.start_loading(window_id, &config);
                }
                Err(e) => {
                    error!("Could not set up the GPU: {e:#}");
                    self.unmount(event_loop, window_id);
                }
            },
            ViewerEvent::Progress {
                window_id,
                progress,
            } => {
                if let Some(viewer) = self.viewers.get(&window_id) {
                    viewer.on_progress(progress);
                }
            }
            ViewerEvent::Loaded { window_id, result } => match self.viewers.get_mut(&window_id) {
                Some(viewer) => viewer.on_loaded(result),
                None => debug!("Discarding load result for an unmounted viewer"),
            },
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(viewer) = self.viewers.get_mut(&window_id) else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => self.unmount(event_loop, window_id),
            WindowEvent::Resized(size) => viewer.resize(size.width, size.height),
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = viewer.window.inner_size();
                viewer.resize(size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                if viewer.redraw() {
                    info!(
                        "Rendered {} frames of {}, unmounting",
                        viewer.frames(),
                        viewer.config.title
                    );
                    self.unmount(event_loop, window_id);
                }
            }
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        for (_, mut viewer) in self.viewers.drain() {
            viewer.unmount();
        }
    }
}

/// Run the viewers until every one of them is unmounted.
///
/// Natively this blocks; on the web the event loop is handed to the browser
/// and the call returns immediately.
pub fn run(configs: Vec<ViewerConfig>) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        // A second viewer on the same page finds the logger already set.
        let _ = console_log::init_with_level(log::Level::Info);
    }

    #[cfg(all(feature = "integration-tests", target_os = "linux"))]
    let event_loop: EventLoop<ViewerEvent> = {
        use winit::platform::wayland::EventLoopBuilderExtWayland;

        EventLoop::with_user_event().with_any_thread(true).build()?
    };

    #[cfg(all(feature = "integration-tests", target_os = "windows"))]
    let event_loop: EventLoop<ViewerEvent> = {
        use winit::platform::windows::EventLoopBuilderExtWindows;

        EventLoop::with_user_event().with_any_thread(true).build()?
    };

    #[cfg(not(all(
        feature = "integration-tests",
        any(target_os = "linux", target_os = "windows")
    )))]
    let event_loop: EventLoop<ViewerEvent> = EventLoop::with_user_event().build()?;

    #[allow(unused_mut)]
    let mut app = App::new(&event_loop, configs)?;

    #[cfg(not(target_arch = "wasm32"))]
    event_loop.run_app(&mut app)?;

    #[cfg(target_arch = "wasm32")]
    {
        use winit::platform::web::EventLoopExtWebSys;
        event_loop.spawn_app(app);
    }

    Ok(())
}
