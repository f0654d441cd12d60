//! Desktop input tiers.
//!
//! `SendInputMouse` is the precise tier (cursor placement plus raw button and key
//! events through `SendInput`); `AutoGuiInput` is the generic fallback.

#[cfg(windows)]
pub use win32::SendInputMouse;

#[cfg(windows)]
pub use autogui::AutoGuiInput;

#[cfg(windows)]
mod win32 {
    use crate::automation::interaction::PreciseInput;
    use crate::core::keys::Key;
    use crate::error::InputError;
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYBD_EVENT_FLAGS,
        KEYEVENTF_KEYUP, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEINPUT, VIRTUAL_KEY,
    };
    use windows::Win32::UI::WindowsAndMessaging::SetCursorPos;

    const TIER: &str = "win32";

    #[derive(Debug, Default)]
    pub struct SendInputMouse;

    fn send(input: INPUT) -> Result<(), InputError> {
        let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
        if sent == 1 {
            Ok(())
        } else {
            Err(InputError::injection(TIER, "SendInput was blocked"))
        }
    }

    impl PreciseInput for SendInputMouse {
        fn move_cursor(&mut self, x: i32, y: i32) -> Result<(), InputError> {
            unsafe { SetCursorPos(x, y) }.map_err(|e| InputError::injection(TIER, e.to_string()))
        }

        fn left_button(&mut self, down: bool) -> Result<(), InputError> {
            let flags = if down { MOUSEEVENTF_LEFTDOWN } else { MOUSEEVENTF_LEFTUP };
            send(INPUT {
                r#type: INPUT_MOUSE,
                Anonymous: INPUT_0 {
                    mi: MOUSEINPUT {
                        dx: 0,
                        dy: 0,
                        mouseData: 0,
                        dwFlags: flags,
                        time: 0,
                        dwExtraInfo: 0,
                    },
                },
            })
        }

        fn key(&mut self, key: Key, down: bool) -> Result<(), InputError> {
            let flags = if down { KEYBD_EVENT_FLAGS(0) } else { KEYEVENTF_KEYUP };
            send(INPUT {
                r#type: INPUT_KEYBOARD,
                Anonymous: INPUT_0 {
                    ki: KEYBDINPUT {
                        wVk: VIRTUAL_KEY(key.virtual_key()),
                        wScan: 0,
                        dwFlags: flags,
                        time: 0,
                        dwExtraInfo: 0,
                    },
                },
            })
        }
    }
}

#[cfg(windows)]
mod autogui {
    use crate::automation::interaction::BasicInput;
    use crate::core::keys::Key;
    use crate::error::InputError;
    use rustautogui::RustAutoGui;

    const TIER: &str = "rustautogui";

    pub struct AutoGuiInput {
        gui: RustAutoGui,
    }

    impl AutoGuiInput {
        pub fn new() -> Result<Self, InputError> {
            let gui = RustAutoGui::new(false)
                .map_err(|e| InputError::injection(TIER, format!("Failed to initialize RustAutoGui: {}", e)))?;
            Ok(Self { gui })
        }
    }

    impl BasicInput for AutoGuiInput {
        fn move_and_click(&mut self, x: i32, y: i32) -> Result<(), InputError> {
            if x < 0 || y < 0 {
                return Err(InputError::injection(TIER, format!("({}, {}) is off screen", x, y)));
            }
            self.gui
                .move_mouse_to_pos(x as u32, y as u32, 0.0)
                .map_err(|e| InputError::injection(TIER, e.to_string()))?;
            self.gui
                .left_click()
                .map_err(|e| InputError::injection(TIER, e.to_string()))
        }

        fn press_key(&mut self, key: Key) -> Result<(), InputError> {
            self.gui
                .keyboard_command(key.gui_name())
                .map_err(|e| InputError::injection(TIER, e.to_string()))
        }
    }
}
