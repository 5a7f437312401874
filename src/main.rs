// vk-clear - minimal Vulkan presentation bootstrap
//
// Loads the driver, builds a device context and swapchain, pre-records
// command buffers that clear every swapchain image, and presents once per
// tick. The windowing side (winit) is a thin collaborator: it supplies the
// raw window/display handles and forwards resize and redraw events to the
// Presenter.
//
// FRAME FLOW:
// 1. Acquire swapchain image (signals image_available)
// 2. Submit pre-recorded clear commands (waits image_available,
//    signals render_finished)
// 3. Present (waits render_finished)
// 4. On OUT_OF_DATE anywhere: rebuild swapchain + frame resources, continue

mod backend;
mod config;
mod error;
mod presenter;

use anyhow::Result;
use config::Config;
use presenter::{Drawable, Presenter, Resizable};
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::sync::Arc;
use std::time::Instant;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowAttributes},
};

fn main() -> Result<()> {
    let config = Config::load();

    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!(
        "Starting {} ({}x{})",
        config.window.title,
        config.window.width,
        config.window.height
    );

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;
    Ok(())
}

struct App {
    config: Config,
    window: Option<Arc<Window>>,
    presenter: Option<Presenter>,

    // Frame statistics for the window title
    frame_count: u32,
    last_fps_update: Instant,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            window: None,
            presenter: None,
            frame_count: 0,
            last_fps_update: Instant::now(),
        }
    }

    fn init_presenter(&mut self, window: &Window) -> Result<()> {
        let enable_validation = cfg!(debug_assertions) && self.config.debug.validation_layers;
        let size = window.inner_size();

        let presenter = Presenter::prepare(
            &self.config.window.title,
            self.config.graphics.clear_color,
            self.config.graphics.preferred_present_mode(),
            enable_validation,
            window.raw_display_handle(),
            window.raw_window_handle(),
            size.width,
            size.height,
        )?;

        self.presenter = Some(presenter);
        Ok(())
    }

    fn update_fps(&mut self) {
        self.frame_count += 1;

        let now = Instant::now();
        let elapsed = now.duration_since(self.last_fps_update).as_secs_f32();
        if elapsed >= 1.0 {
            let fps = self.frame_count as f32 / elapsed;
            if let Some(ref window) = self.window {
                window.set_title(&format!("{} - {:.0} FPS", self.config.window.title, fps));
            }
            self.frame_count = 0;
            self.last_fps_update = now;
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        let window = match event_loop.create_window(attributes) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("Failed to create window: {e:?}");
                event_loop.exit();
                return;
            }
        };

        if let Err(e) = self.init_presenter(&window) {
            log::error!("Failed to initialize Vulkan: {e:?}");
            event_loop.exit();
            return;
        }

        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down");
                if let Some(ref presenter) = self.presenter {
                    if let Err(e) = presenter.wait_idle() {
                        log::warn!("Device wait before shutdown failed: {}", e);
                    }
                }
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                if let Some(ref mut presenter) = self.presenter {
                    if let Err(e) = presenter.on_surface_resized(size.width, size.height) {
                        log::error!("Swapchain rebuild failed: {e}");
                        event_loop.exit();
                    }
                }
            }

            WindowEvent::RedrawRequested => {
                if let Some(ref mut presenter) = self.presenter {
                    match presenter.draw_frame() {
                        Ok(true) => self.update_fps(),
                        Ok(false) => {}
                        Err(e) => {
                            // Steady-state failures terminate the render loop
                            log::error!("Frame failed: {e}");
                            event_loop.exit();
                        }
                    }
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if event.state.is_pressed() {
                    if let PhysicalKey::Code(KeyCode::Escape) = event.physical_key {
                        log::info!("ESC pressed, exiting");
                        event_loop.exit();
                    }
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        // Continuous redraw: one frame per tick
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}
