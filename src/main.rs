//! glsurface demo
//!
//! Opens a surface and runs a small sketch: `f` toggles fullscreen, `d`
//! toggles the display link and Escape exits. On macOS the surface is a Cocoa
//! window; elsewhere the headless backend runs for a fixed number of frames.

use glsurface::input::{Key, NamedKey};
use glsurface::{Ctx, SurfaceHandler};
use log::info;

/// Frames between frame-rate reports
const REPORT_INTERVAL: u64 = 60;

/// The demo sketch
#[derive(Debug, Default)]
struct Demo {
    /// Exit after this many frames
    max_frames: Option<u64>,
}

impl SurfaceHandler for Demo {
    fn setup(&mut self, ctx: &mut Ctx<'_>) {
        info!("Sketch setup at {}x{}", ctx.width(), ctx.height());
    }

    fn update(&mut self, ctx: &mut Ctx<'_>) {
        let state = *ctx.state();
        if state.frame_count > 0 && state.frame_count % REPORT_INTERVAL == 0 {
            info!(
                "Frame {}: {:.1} fps (target {})",
                state.frame_count, state.frame_rate, state.target_frame_rate
            );
        }
        if self.max_frames.is_some_and(|max| state.frame_count >= max) {
            ctx.exit();
        }
    }

    fn exit(&mut self) {
        info!("Sketch exit");
    }

    fn key_pressed(&mut self, ctx: &mut Ctx<'_>, key: Key) {
        match key {
            Key::Character('f') => ctx.toggle_fullscreen(),
            Key::Character('d') => {
                let enabled = !ctx.state().display_link;
                info!("Display link {}", if enabled { "on" } else { "off" });
                ctx.enable_display_link(enabled);
            }
            Key::Named(NamedKey::Escape) => ctx.exit(),
            _ => {}
        }
    }

    fn window_resized(&mut self, _ctx: &mut Ctx<'_>, size: glsurface::Size) {
        info!("Resized to {}x{}", size.width, size.height);
    }
}

#[cfg(target_os = "macos")]
mod macos_main {
    use glsurface::backend::{CocoaApp, CocoaGlContext, CocoaHost, EventLoop};
    use glsurface::{SharedContext, Surface, SurfaceConfig};
    use log::info;

    use super::Demo;

    pub fn run() -> anyhow::Result<()> {
        info!("Starting glsurface demo");

        let config = SurfaceConfig::from_env()?;
        let app = CocoaApp::new(&config.title)?;
        let host = CocoaHost::new(app.main_thread_marker(), &config)?;
        let context = SharedContext::new(CocoaGlContext::new(host.view())?);

        let mut event_loop = EventLoop::<Surface<CocoaHost, CocoaGlContext, Demo>>::new()?;
        let mut surface = Surface::new(
            host,
            context,
            Box::new(event_loop.clock()),
            Demo::default(),
            &config,
        )?;

        app.activate();
        surface.setup()?;
        event_loop.run(&mut surface)?;

        if let Some(e) = surface.failure() {
            anyhow::bail!("surface failed: {}", e);
        }
        Ok(())
    }
}

#[cfg(not(target_os = "macos"))]
mod headless_main {
    use glsurface::backend::{EventLoop, HeadlessContext, HeadlessHost};
    use glsurface::input::RawEvent;
    use glsurface::{SharedContext, Surface, SurfaceConfig};
    use log::{info, warn};

    use super::Demo;

    /// Frames rendered before the headless demo exits
    const HEADLESS_FRAMES: u64 = 180;

    pub fn run() -> anyhow::Result<()> {
        warn!("No window server on this platform, running headless");

        let config = SurfaceConfig::from_env()?;
        let mut event_loop =
            EventLoop::<Surface<HeadlessHost, HeadlessContext, Demo>>::new()?;
        let mut surface = Surface::new(
            HeadlessHost::new(config.size),
            SharedContext::new(HeadlessContext::new()),
            Box::new(event_loop.clock()),
            Demo {
                max_frames: Some(HEADLESS_FRAMES),
            },
            &config,
        )?;

        surface.setup()?;
        // Exercise fullscreen as if `f` had been pressed
        surface.host_mut().push_event(RawEvent::KeyDown {
            keycode: 0x03,
            character: Some('f'),
            repeat: false,
        });
        event_loop.run(&mut surface)?;

        if let Some(e) = surface.failure() {
            anyhow::bail!("surface failed: {}", e);
        }
        info!(
            "Rendered {} frames, {} context flushes",
            surface.frame_count(),
            surface.shared_context().lock()?.stats().flushes
        );
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    #[cfg(target_os = "macos")]
    {
        macos_main::run()
    }

    #[cfg(not(target_os = "macos"))]
    {
        headless_main::run()
    }
}
