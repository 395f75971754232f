//! fishctl: a minimal uinput keyboard/mouse for input automation.
//!
//! The device only exposes what automation needs: the five mouse buttons and
//! the keys that [`parse_key_name`] understands.

mod device;
pub mod error;
pub mod keyboard;
pub mod mouse;

use evdev::uinput::VirtualDevice;
use evdev::InputEvent;
pub use evdev::Key;
use std::collections::HashSet;
use tracing::{debug, trace};

pub use error::{Error, Result};
pub use keyboard::parse_key_name;
pub use mouse::MouseButton;

/// Virtual input device for keyboard and mouse automation
pub struct InputCtl {
    device: VirtualDevice,
    held_keys: HashSet<Key>,
    held_buttons: HashSet<MouseButton>,
}

impl InputCtl {
    /// Create a new virtual input device
    ///
    /// Note: This takes ~1 second as the kernel needs time to recognize the device.
    /// Requires access to /dev/uinput (typically root or input group membership).
    pub fn new() -> Result<Self> {
        let device = device::create_device()?;
        debug!("virtual input device ready");

        Ok(Self {
            device,
            held_keys: HashSet::new(),
            held_buttons: HashSet::new(),
        })
    }

    /// Press a key down
    pub fn key_down(&mut self, key: Key) -> Result<()> {
        self.held_keys.insert(key);
        self.emit_key(key, 1)
    }

    /// Release a key
    pub fn key_up(&mut self, key: Key) -> Result<()> {
        self.held_keys.remove(&key);
        self.emit_key(key, 0)
    }

    /// Press and release a key
    pub fn key_click(&mut self, key: Key) -> Result<()> {
        self.key_down(key)?;
        self.key_up(key)
    }

    /// Click a mouse button (press and release)
    pub fn click(&mut self, button: MouseButton) -> Result<()> {
        self.mouse_down(button)?;
        self.mouse_up(button)
    }

    /// Press a mouse button down
    pub fn mouse_down(&mut self, button: MouseButton) -> Result<()> {
        self.held_buttons.insert(button);
        self.emit_key(button.to_key(), 1)
    }

    /// Release a mouse button
    pub fn mouse_up(&mut self, button: MouseButton) -> Result<()> {
        self.held_buttons.remove(&button);
        self.emit_key(button.to_key(), 0)
    }

    /// Check if a key is currently held down
    pub fn is_key_held(&self, key: Key) -> bool {
        self.held_keys.contains(&key)
    }

    /// Check if a mouse button is currently held down
    pub fn is_mouse_button_held(&self, button: MouseButton) -> bool {
        self.held_buttons.contains(&button)
    }

    /// Release all currently held keys and mouse buttons
    ///
    /// Called automatically when the device is dropped.
    pub fn release_all(&mut self) -> Result<()> {
        let keys: Vec<Key> = self.held_keys.iter().copied().collect();
        let buttons: Vec<MouseButton> = self.held_buttons.iter().copied().collect();

        for key in keys {
            self.key_up(key)?;
        }
        for button in buttons {
            self.mouse_up(button)?;
        }
        Ok(())
    }

    fn emit_key(&mut self, key: Key, value: i32) -> Result<()> {
        trace!(?key, value, "emit key");
        let events = [
            InputEvent::new_now(evdev::EventType::KEY, key.code(), value),
            InputEvent::new_now(evdev::EventType::SYNCHRONIZATION, 0, 0), // SYN_REPORT
        ];
        self.device.emit(&events).map_err(Error::EmitFailed)
    }
}

impl Drop for InputCtl {
    fn drop(&mut self) {
        // Drop can't return Result
        let _ = self.release_all();
    }
}
