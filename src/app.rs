//! A minimal window runner.
//!
//! [`run`] opens a window, sets up wgpu, and hands the setup closure a
//! [`RenderContext`] over a [`WgpuDevice`]. The closure it returns is called
//! once per redraw with a [`Frame`]; whatever it draws is presented afterwards.

use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::error::EventLoopError;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::color::Color;
use crate::context::RenderContext;
use crate::device::{GraphicsDevice, WgpuDevice};
use crate::gpu::GpuContext;
use crate::logging::{LoggingConfig, init_logging};

/// Configuration for the app window.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Background for frames that do not clear the target themselves.
    pub clear_color: Color,
    pub vsync: bool,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Brazier".to_string(),
            width: 800,
            height: 600,
            clear_color: Color::BLACK,
            vsync: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn clear_color(mut self, color: Color) -> Self {
        self.clear_color = color;
        self
    }

    pub fn vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }
}

/// Context provided each frame.
pub struct Frame<'a> {
    pub ctx: &'a RenderContext,
    /// Total elapsed time in seconds.
    pub time: f32,
    /// Delta time since last frame in seconds.
    pub dt: f32,
    width: u32,
    height: u32,
}

impl Frame<'_> {
    /// Current frames per second.
    pub fn fps(&self) -> f32 {
        if self.dt > 0.0 { 1.0 / self.dt } else { 0.0 }
    }

    /// Surface width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Surface height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Width over height, for camera projections.
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// Runs an app with the default configuration.
///
/// ```no_run
/// use brazier::*;
/// use std::rc::Rc;
///
/// run(|ctx| {
///     let mut scene = Scene::new(ctx);
///     let mut camera = Camera::default().at(Vec3::new(0.0, 2.0, 5.0));
///     move |frame| {
///         camera.aspect = frame.aspect();
///         scene.draw(&camera, None);
///     }
/// })
/// .unwrap();
/// ```
pub fn run<S, F>(setup: S) -> Result<(), EventLoopError>
where
    S: FnOnce(&RenderContext) -> F + 'static,
    F: FnMut(&mut Frame) + 'static,
{
    run_with_config(AppConfig::default(), setup)
}

/// Runs an app with a custom configuration.
///
/// Returns once the window is closed. Failing to create the window or the
/// GPU device is logged and ends the event loop.
pub fn run_with_config<S, F>(config: AppConfig, setup: S) -> Result<(), EventLoopError>
where
    S: FnOnce(&RenderContext) -> F + 'static,
    F: FnMut(&mut Frame) + 'static,
{
    init_logging(&config.logging);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = BrazierApp::Pending {
        config,
        setup: Some(Box::new(move |ctx| {
            Box::new(setup(ctx)) as Box<dyn FnMut(&mut Frame)>
        })),
    };
    event_loop.run_app(&mut app)
}

type SetupFn = Box<dyn FnOnce(&RenderContext) -> Box<dyn FnMut(&mut Frame)>>;

enum BrazierApp {
    Pending {
        config: AppConfig,
        setup: Option<SetupFn>,
    },
    Running {
        window: Arc<Window>,
        device: Rc<WgpuDevice>,
        ctx: RenderContext,
        clear_color: Color,
        frame_fn: Box<dyn FnMut(&mut Frame)>,
        start_time: Instant,
        last_frame: Instant,
    },
    Stopped,
}

impl ApplicationHandler for BrazierApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let BrazierApp::Pending { config, setup } = self else {
            return;
        };
        let Some(setup_fn) = setup.take() else {
            return;
        };

        let window_attrs = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));
        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("failed to create window: {e}");
                *self = BrazierApp::Stopped;
                event_loop.exit();
                return;
            }
        };

        let gpu = match GpuContext::new(window.clone(), config.vsync) {
            Ok(gpu) => gpu,
            Err(e) => {
                log::error!("{e}");
                *self = BrazierApp::Stopped;
                event_loop.exit();
                return;
            }
        };

        let device = Rc::new(WgpuDevice::new(gpu));
        let ctx = RenderContext::new(device.clone());
        let frame_fn = setup_fn(&ctx);
        let clear_color = config.clear_color;
        window.request_redraw();

        *self = BrazierApp::Running {
            window,
            device,
            ctx,
            clear_color,
            frame_fn,
            start_time: Instant::now(),
            last_frame: Instant::now(),
        };
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let BrazierApp::Running {
            window,
            device,
            ctx,
            clear_color,
            frame_fn,
            start_time,
            last_frame,
        } = self
        else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                device.resize(size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let time = start_time.elapsed().as_secs_f32();
                let dt = now.duration_since(*last_frame).as_secs_f32();
                *last_frame = now;

                device.clear(*clear_color);
                let mut frame = Frame {
                    ctx,
                    time,
                    dt,
                    width: device.width(),
                    height: device.height(),
                };
                frame_fn(&mut frame);

                if let Err(e) = device.present() {
                    log::warn!("frame dropped: {e}");
                }
                window.request_redraw();
            }
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let BrazierApp::Running { .. } = self {
            log::info!("shutting down");
        }
        *self = BrazierApp::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder() {
        let config = AppConfig::new()
            .title("Grid")
            .size(1280, 720)
            .clear_color(Color::rgb(0.1, 0.1, 0.15))
            .vsync(false)
            .logging(LoggingConfig::new().filter("debug"));
        assert_eq!(config.title, "Grid");
        assert_eq!((config.width, config.height), (1280, 720));
        assert_eq!(config.clear_color, Color::rgb(0.1, 0.1, 0.15));
        assert!(!config.vsync);
        assert_eq!(config.logging.filter.as_deref(), Some("debug"));
    }

    #[test]
    fn frame_aspect() {
        let (ctx, _device) = RenderContext::headless();
        let frame = Frame {
            ctx: &ctx,
            time: 1.0,
            dt: 0.5,
            width: 1600,
            height: 800,
        };
        assert_eq!(frame.aspect(), 2.0);
        assert_eq!(frame.fps(), 2.0);
    }
}
