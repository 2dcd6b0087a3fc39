//! Devices command - list capture inputs

use anyhow::Result;

/// List the screen-capture inputs this build can open
pub async fn devices() -> Result<()> {
    println!("Capture backends:\n");
    println!("  synthetic    Generated test pattern (always available)");

    #[cfg(feature = "ffmpeg")]
    {
        use anyhow::Context;
        use deskrec_core::backend::{list_input_devices, DeviceSpec};

        let default = DeviceSpec::platform_default();
        println!("  ffmpeg       libavdevice input (default: {} \"{}\")", default.format, default.url);
        println!();

        let devices = list_input_devices().context("Failed to query FFmpeg input devices")?;
        if devices.is_empty() {
            println!("FFmpeg reports no video input devices.");
        } else {
            println!("FFmpeg video input devices:\n");
            for device in devices {
                let marker = if device.name == default.format { "*" } else { " " };
                println!("  {} {:<14} {}", marker, device.name, device.description);
            }
            println!();
            println!("Pick one with --device-format NAME and --device URL.");
        }
    }

    #[cfg(not(feature = "ffmpeg"))]
    {
        println!();
        println!("This build has no FFmpeg support; rebuild with `--features ffmpeg`");
        println!("to capture the real screen.");
    }

    Ok(())
}
