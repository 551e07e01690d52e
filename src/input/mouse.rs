//! Per-OS mouse synthesis
//!
//! - Windows: SetCursorPos for placement, SendInput for button events
//! - Linux: X11 xtest fake input
//! - macOS: stubbed, requires accessibility permission plumbing

use super::MouseButton;

// ============================================================================
// Windows Implementation
// ============================================================================
#[cfg(target_os = "windows")]
pub mod windows {
    use super::*;
    use ::windows::Win32::UI::Input::KeyboardAndMouse::{
        SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP,
        MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP, MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP,
        MOUSEINPUT, MOUSE_EVENT_FLAGS,
    };
    use ::windows::Win32::UI::WindowsAndMessaging::SetCursorPos;

    fn make_mouse_input(dx: i32, dy: i32, flags: MOUSE_EVENT_FLAGS) -> INPUT {
        INPUT {
            r#type: INPUT_MOUSE,
            Anonymous: INPUT_0 {
                mi: MOUSEINPUT {
                    dx,
                    dy,
                    mouseData: 0,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        }
    }

    pub fn move_mouse(x: i32, y: i32) -> anyhow::Result<()> {
        unsafe {
            SetCursorPos(x, y)?;
        }
        Ok(())
    }

    pub fn click_mouse(button: MouseButton) -> anyhow::Result<()> {
        unsafe {
            let (down_flag, up_flag) = match button {
                MouseButton::Left => (MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP),
                MouseButton::Right => (MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP),
                MouseButton::Middle => (MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP),
            };

            let down_input = make_mouse_input(0, 0, down_flag);
            SendInput(&[down_input], std::mem::size_of::<INPUT>() as i32);

            std::thread::sleep(std::time::Duration::from_millis(50));

            let up_input = make_mouse_input(0, 0, up_flag);
            SendInput(&[up_input], std::mem::size_of::<INPUT>() as i32);

            Ok(())
        }
    }
}

// ============================================================================
// Linux Implementation
// ============================================================================
#[cfg(target_os = "linux")]
pub mod linux {
    use super::*;

    pub async fn move_mouse(x: i32, y: i32) -> anyhow::Result<()> {
        use x11rb::connection::Connection;
        use x11rb::protocol::xtest::ConnectionExt as XtestConnectionExt;

        let (conn, _) = x11rb::connect(None)?;
        let root = conn.setup().roots[0].root;

        // Move pointer - detail=0 for motion events
        conn.xtest_fake_input(
            x11rb::protocol::xproto::MOTION_NOTIFY_EVENT,
            0,
            x11rb::CURRENT_TIME,
            root,
            x as i16,
            y as i16,
            0,
        )?;

        conn.flush()?;

        Ok(())
    }

    pub async fn click_mouse(button: MouseButton) -> anyhow::Result<()> {
        use x11rb::connection::Connection;
        use x11rb::protocol::xtest::ConnectionExt as XtestConnectionExt;

        let (conn, _) = x11rb::connect(None)?;
        let root = conn.setup().roots[0].root;

        let button_num: u8 = match button {
            MouseButton::Left => 1,
            MouseButton::Middle => 2,
            MouseButton::Right => 3,
        };

        // Button press - detail is the button number
        conn.xtest_fake_input(
            x11rb::protocol::xproto::BUTTON_PRESS_EVENT,
            button_num,
            x11rb::CURRENT_TIME,
            root,
            0,
            0,
            0,
        )?;

        conn.flush()?;

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        // Button release
        conn.xtest_fake_input(
            x11rb::protocol::xproto::BUTTON_RELEASE_EVENT,
            button_num,
            x11rb::CURRENT_TIME,
            root,
            0,
            0,
            0,
        )?;

        conn.flush()?;

        Ok(())
    }
}

// ============================================================================
// macOS Implementation
// ============================================================================
#[cfg(target_os = "macos")]
pub mod macos {
    use super::*;

    pub fn move_mouse(_x: i32, _y: i32) -> anyhow::Result<()> {
        anyhow::bail!("macOS pointer control requires accessibility permissions")
    }

    pub fn click_mouse(_button: MouseButton) -> anyhow::Result<()> {
        anyhow::bail!("macOS pointer control requires accessibility permissions")
    }
}

// ============================================================================
// Stub for unsupported platforms
// ============================================================================
#[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
pub mod stub {
    use super::*;

    pub fn move_mouse(_x: i32, _y: i32) -> anyhow::Result<()> {
        anyhow::bail!("platform not supported")
    }

    pub fn click_mouse(_button: MouseButton) -> anyhow::Result<()> {
        anyhow::bail!("platform not supported")
    }
}
