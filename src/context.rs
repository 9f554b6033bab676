use std::sync::Arc;

use anyhow::Context as _;
use log::{debug, info};
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    camera::{Camera, CameraResources, CameraUniform, Projection},
    config::ViewerConfig,
    data_structures::texture,
    pipelines::{basic, light::LightResources},
    resources,
};

/// GPU state of one viewer: surface, device, camera, light and the model
/// pipeline.
#[derive(Debug)]
pub struct Context {
    pub(crate) depth_texture: texture::Texture,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub camera: CameraResources,
    pub projection: Projection,
    pub light: LightResources,
    pub material_layout: wgpu::BindGroupLayout,
    pub pipeline: wgpu::RenderPipeline,
    pub clear_colour: wgpu::Color,
}

impl Context {
    pub async fn new(window: Arc<Window>, viewer: &ViewerConfig) -> anyhow::Result<Self> {
        let size = window.inner_size();

        debug!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        // The surface keeps its own handle on the window.
        let surface = instance
            .create_surface(window)
            .context("could not create a surface for the window")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no GPU adapter can present to this window")?;
        info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some(viewer.title.as_str()),
                // WebGL doesn't support all of wgpu's features, so if
                // we're building for the web we'll have to disable some.
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                ..Default::default()
            })
            .await
            .context("could not open the GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The shader writes linear colours and relies on an sRGB target.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no texture formats")?;
        // A transparent clear colour only shows the page behind the canvas
        // with a blending alpha mode.
        let alpha_mode = [
            wgpu::CompositeAlphaMode::PreMultiplied,
            wgpu::CompositeAlphaMode::PostMultiplied,
        ]
        .into_iter()
        .find(|mode| surface_caps.alpha_modes.contains(mode))
        .or_else(|| surface_caps.alpha_modes.first().copied())
        .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let camera = Camera::default();
        let projection = Projection::new(
            config.width,
            config.height,
            viewer.fov_y,
            viewer.z_near,
            viewer.z_far,
        );
        let camera = mk_camera_resources(&device, camera, &projection);

        let depth_texture = texture::Texture::create_depth_texture(
            &device,
            [config.width, config.height],
            "depth_texture",
        );

        let light = LightResources::new(&device, viewer);
        let material_layout = resources::texture::material_layout(&device);
        let pipeline = basic::mk_model_pipeline(
            &device,
            config.format,
            &material_layout,
            &camera.bind_group_layout,
            &light.bind_group_layout,
        );

        Ok(Self {
            depth_texture,
            surface,
            device,
            queue,
            config,
            camera,
            projection,
            light,
            material_layout,
            pipeline,
            clear_colour: viewer.clear_colour,
        })
    }

    /// Reconfigure the surface, depth buffer and projection for a new size.
    ///
    /// A zero sized window (minimised) is ignored and `false` returned.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_texture.texture.destroy();
        self.depth_texture =
            texture::Texture::create_depth_texture(&self.device, [width, height], "depth_texture");
        self.projection.resize(width, height);
        self.camera.write(&self.queue, &self.projection);
        true
    }

    /// Release the renderer's GPU memory: lights and camera first, then the
    /// depth texture and the device. The context must not be used afterwards.
    pub fn destroy(&self) {
        for resource in RELEASE_ORDER {
            match resource {
                GpuResource::Light => self.light.destroy(),
                GpuResource::Camera => self.camera.buffer.destroy(),
                GpuResource::DepthTexture => self.depth_texture.texture.destroy(),
                GpuResource::Device => self.device.destroy(),
            }
            debug!("Destroyed {resource:?}");
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GpuResource {
    Light,
    Camera,
    DepthTexture,
    Device,
}

/// Lights and camera go before the render targets; the device is last.
const RELEASE_ORDER: [GpuResource; 4] = [
    GpuResource::Light,
    GpuResource::Camera,
    GpuResource::DepthTexture,
    GpuResource::Device,
];

fn mk_camera_resources(
    device: &wgpu::Device,
    camera: Camera,
    projection: &Projection,
) -> CameraResources {
    let mut camera_uniform = CameraUniform::new();
    camera_uniform.update_view_proj(&camera, projection);

    let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Camera Buffer"),
        contents: bytemuck::cast_slice(&[camera_uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("camera_bind_group_layout"),
    });

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: &bind_group_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: camera_buffer.as_entire_binding(),
        }],
        label: Some("camera_bind_group"),
    });

    CameraResources {
        camera,
        uniform: camera_uniform,
        buffer: camera_buffer,
        bind_group,
        bind_group_layout,
    }
}
