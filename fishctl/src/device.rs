use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, Key, RelativeAxisType};
use std::thread;
use std::time::Duration;

use crate::error::Result;
use crate::keyboard::supported_keys;
use crate::mouse::MouseButton;

/// Relative axes the device advertises.
///
/// udev only tags a device as a mouse when it has both REL_X and REL_Y, and
/// libinput ignores button events from devices without the pointer capability,
/// so these are required even though the cursor is never moved.
pub(crate) fn pointer_axes() -> AttributeSet<RelativeAxisType> {
    let mut axes = AttributeSet::<RelativeAxisType>::new();
    axes.insert(RelativeAxisType::REL_X);
    axes.insert(RelativeAxisType::REL_Y);
    axes.insert(RelativeAxisType::REL_WHEEL);
    axes.insert(RelativeAxisType::REL_HWHEEL);
    axes
}

/// Creates and configures a virtual input device
pub fn create_device() -> Result<VirtualDevice> {
    let mut keys = AttributeSet::<Key>::new();

    for key in supported_keys() {
        keys.insert(key);
    }

    for button in MouseButton::ALL {
        keys.insert(button.to_key());
    }

    let device = VirtualDeviceBuilder::new()?
        .name("fishctl virtual device")
        .with_keys(&keys)?
        .with_relative_axes(&pointer_axes())?
        .build()?;

    // Wait for the kernel to fully recognize the device
    // Without this delay, initial events may be lost
    thread::sleep(Duration::from_secs(1));

    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertises_pointer_axes() {
        let axes = pointer_axes();
        assert!(axes.contains(RelativeAxisType::REL_X));
        assert!(axes.contains(RelativeAxisType::REL_Y));
    }
}
