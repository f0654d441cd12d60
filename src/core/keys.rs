use eframe::egui;
use global_hotkey::hotkey::Code;
use serde::{Deserialize, Serialize};

// One row per key: display label, global-hotkey code, Win32 virtual key,
// rustautogui name, egui key.
macro_rules! key_table {
    ($($variant:ident => $label:literal, $code:ident, $vk:literal, $gui:literal, $egui:ident;)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum Key {
            $($variant,)*
        }

        impl Key {
            pub const ALL: &'static [Key] = &[$(Key::$variant,)*];

            pub fn label(self) -> &'static str {
                match self {
                    $(Key::$variant => $label,)*
                }
            }

            pub fn code(self) -> Code {
                match self {
                    $(Key::$variant => Code::$code,)*
                }
            }

            /// Win32 virtual-key code used by the precise input tier.
            pub fn virtual_key(self) -> u16 {
                match self {
                    $(Key::$variant => $vk,)*
                }
            }

            /// Key name understood by the generic keyboard fallback.
            pub fn gui_name(self) -> &'static str {
                match self {
                    $(Key::$variant => $gui,)*
                }
            }

            /// The key a UI key press names, if it can be bound.
            pub fn from_egui(key: egui::Key) -> Option<Key> {
                match key {
                    $(egui::Key::$egui => Some(Key::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

key_table! {
    A => "A", KeyA, 0x41, "a", A;
    B => "B", KeyB, 0x42, "b", B;
    C => "C", KeyC, 0x43, "c", C;
    D => "D", KeyD, 0x44, "d", D;
    E => "E", KeyE, 0x45, "e", E;
    F => "F", KeyF, 0x46, "f", F;
    G => "G", KeyG, 0x47, "g", G;
    H => "H", KeyH, 0x48, "h", H;
    I => "I", KeyI, 0x49, "i", I;
    J => "J", KeyJ, 0x4A, "j", J;
    K => "K", KeyK, 0x4B, "k", K;
    L => "L", KeyL, 0x4C, "l", L;
    M => "M", KeyM, 0x4D, "m", M;
    N => "N", KeyN, 0x4E, "n", N;
    O => "O", KeyO, 0x4F, "o", O;
    P => "P", KeyP, 0x50, "p", P;
    Q => "Q", KeyQ, 0x51, "q", Q;
    R => "R", KeyR, 0x52, "r", R;
    S => "S", KeyS, 0x53, "s", S;
    T => "T", KeyT, 0x54, "t", T;
    U => "U", KeyU, 0x55, "u", U;
    V => "V", KeyV, 0x56, "v", V;
    W => "W", KeyW, 0x57, "w", W;
    X => "X", KeyX, 0x58, "x", X;
    Y => "Y", KeyY, 0x59, "y", Y;
    Z => "Z", KeyZ, 0x5A, "z", Z;
    Digit0 => "0", Digit0, 0x30, "0", Num0;
    Digit1 => "1", Digit1, 0x31, "1", Num1;
    Digit2 => "2", Digit2, 0x32, "2", Num2;
    Digit3 => "3", Digit3, 0x33, "3", Num3;
    Digit4 => "4", Digit4, 0x34, "4", Num4;
    Digit5 => "5", Digit5, 0x35, "5", Num5;
    Digit6 => "6", Digit6, 0x36, "6", Num6;
    Digit7 => "7", Digit7, 0x37, "7", Num7;
    Digit8 => "8", Digit8, 0x38, "8", Num8;
    Digit9 => "9", Digit9, 0x39, "9", Num9;
    F1 => "F1", F1, 0x70, "f1", F1;
    F2 => "F2", F2, 0x71, "f2", F2;
    F3 => "F3", F3, 0x72, "f3", F3;
    F4 => "F4", F4, 0x73, "f4", F4;
    F5 => "F5", F5, 0x74, "f5", F5;
    F6 => "F6", F6, 0x75, "f6", F6;
    F7 => "F7", F7, 0x76, "f7", F7;
    F8 => "F8", F8, 0x77, "f8", F8;
    F9 => "F9", F9, 0x78, "f9", F9;
    F10 => "F10", F10, 0x79, "f10", F10;
    F11 => "F11", F11, 0x7A, "f11", F11;
    F12 => "F12", F12, 0x7B, "f12", F12;
    Escape => "Esc", Escape, 0x1B, "escape", Escape;
    Space => "Space", Space, 0x20, "space", Space;
    Enter => "Enter", Enter, 0x0D, "return", Enter;
    Tab => "Tab", Tab, 0x09, "tab", Tab;
    Backspace => "Backspace", Backspace, 0x08, "backspace", Backspace;
    Insert => "Insert", Insert, 0x2D, "insert", Insert;
    Delete => "Delete", Delete, 0x2E, "delete", Delete;
    Home => "Home", Home, 0x24, "home", Home;
    End => "End", End, 0x23, "end", End;
    PageUp => "Page Up", PageUp, 0x21, "pageup", PageUp;
    PageDown => "Page Down", PageDown, 0x22, "pagedown", PageDown;
    ArrowUp => "Up", ArrowUp, 0x26, "up", ArrowUp;
    ArrowDown => "Down", ArrowDown, 0x28, "down", ArrowDown;
    ArrowLeft => "Left", ArrowLeft, 0x25, "left", ArrowLeft;
    ArrowRight => "Right", ArrowRight, 0x27, "right", ArrowRight;
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
