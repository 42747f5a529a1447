//! NSApplication setup

use log::{debug, info};
use objc2::rc::Retained;
use objc2_app_kit::{NSApplication, NSApplicationActivationPolicy, NSMenu, NSMenuItem};
use objc2_foundation::{MainThreadMarker, NSString};

/// The shared application, configured to show a window and a menu bar
///
/// The application's events are pumped by [`super::CocoaHost`] from the
/// surface's event loop; `NSApplication::run` is never called.
pub struct CocoaApp {
    /// Main thread marker
    mtm: MainThreadMarker,
    /// NSApplication instance
    app: Retained<NSApplication>,
}

impl CocoaApp {
    /// Set up the shared application; must run on the main thread
    pub fn new(name: &str) -> anyhow::Result<Self> {
        info!("Initializing Cocoa application");

        let mtm = MainThreadMarker::new()
            .ok_or_else(|| anyhow::anyhow!("Must be called from the main thread"))?;

        let app = NSApplication::sharedApplication(mtm);

        // Regular app: dock icon, menu bar, key windows
        app.setActivationPolicy(NSApplicationActivationPolicy::Regular);

        Self::setup_menu_bar(mtm, &app, name);
        unsafe { app.finishLaunching() };

        debug!("Cocoa application initialized");
        Ok(Self { mtm, app })
    }

    fn setup_menu_bar(mtm: MainThreadMarker, app: &NSApplication, name: &str) {
        let main_menu = NSMenu::new(mtm);
        let app_menu_item = NSMenuItem::new(mtm);
        let app_menu = NSMenu::new(mtm);

        let quit_title = NSString::from_str(&format!("Quit {}", name));
        let quit_key = NSString::from_str("q");
        let quit_item = unsafe {
            NSMenuItem::initWithTitle_action_keyEquivalent(
                mtm.alloc(),
                &quit_title,
                Some(objc2::sel!(terminate:)),
                &quit_key,
            )
        };
        app_menu.addItem(&quit_item);

        app_menu_item.setSubmenu(Some(&app_menu));
        main_menu.addItem(&app_menu_item);
        app.setMainMenu(Some(&main_menu));
    }

    /// Bring the application to the front
    pub fn activate(&self) {
        #[allow(deprecated)]
        self.app.activateIgnoringOtherApps(true);
    }

    /// Get the main thread marker
    pub fn main_thread_marker(&self) -> MainThreadMarker {
        self.mtm
    }
}
