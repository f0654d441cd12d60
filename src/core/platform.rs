use crate::automation::context::DeviceFactory;
use crate::automation::interaction::{BasicInput, PreciseInput};
use crate::core::screen_capture::ScreenCapture;

/// Real screen and input devices of the current OS.
///
/// Outside Windows there is no backend: capture always fails and no input tier
/// is offered, so the loop idles and logs instead of acting.
#[derive(Debug, Default)]
pub struct DesktopDevices;

#[cfg(windows)]
impl DeviceFactory for DesktopDevices {
    fn capture(&self) -> Box<dyn ScreenCapture> {
        Box::new(crate::core::screen_capture::GdiScreenCapture)
    }

    fn precise_input(&self) -> Option<Box<dyn PreciseInput>> {
        Some(Box::new(crate::core::input::SendInputMouse))
    }

    fn basic_input(&self) -> Option<Box<dyn BasicInput>> {
        match crate::core::input::AutoGuiInput::new() {
            Ok(input) => Some(Box::new(input)),
            Err(e) => {
                tracing::warn!("generic input fallback unavailable: {}", e);
                None
            }
        }
    }
}

#[cfg(not(windows))]
impl DeviceFactory for DesktopDevices {
    fn capture(&self) -> Box<dyn ScreenCapture> {
        tracing::warn!("no screen capture backend for this platform");
        Box::new(crate::core::screen_capture::UnavailableCapture)
    }

    fn precise_input(&self) -> Option<Box<dyn PreciseInput>> {
        None
    }

    fn basic_input(&self) -> Option<Box<dyn BasicInput>> {
        None
    }
}

/// Make capture pixels and cursor coordinates agree on scaled displays.
pub fn enable_dpi_awareness() {
    #[cfg(windows)]
    {
        use windows::Win32::UI::HiDpi::{
            SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
        };
        if let Err(e) = unsafe { SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2) } {
            tracing::debug!("DPI awareness not changed: {}", e);
        }
    }
}
