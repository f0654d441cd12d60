use crate::error::CaptureError;
use image::GrayImage;

/// Produces single-channel frames of the whole primary display.
pub trait ScreenCapture {
    fn capture(&mut self) -> Result<GrayImage, CaptureError>;
}

/// Capture for platforms without a desktop backend.
#[derive(Debug, Default)]
pub struct UnavailableCapture;

impl ScreenCapture for UnavailableCapture {
    fn capture(&mut self) -> Result<GrayImage, CaptureError> {
        Err(CaptureError::Unavailable)
    }
}

#[cfg(windows)]
pub use gdi::GdiScreenCapture;

#[cfg(windows)]
mod gdi {
    use super::ScreenCapture;
    use crate::error::CaptureError;
    use image::{DynamicImage, GrayImage, RgbImage};
    use windows::Win32::Foundation::HWND;
    use windows::Win32::Graphics::Gdi::{
        BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC,
        GetDIBits, ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS,
        SRCCOPY,
    };
    use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

    /// Primary display capture through a screen DC and `BitBlt`.
    #[derive(Debug, Default)]
    pub struct GdiScreenCapture;

    impl ScreenCapture for GdiScreenCapture {
        fn capture(&mut self) -> Result<GrayImage, CaptureError> {
            let (width, height) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
            if width <= 0 || height <= 0 {
                return Err(CaptureError::InvalidFrame { width, height });
            }

            let bgra = unsafe { grab_bgra(width, height)? };

            let mut rgb = RgbImage::new(width as u32, height as u32);
            for (pixel, chunk) in rgb.pixels_mut().zip(bgra.chunks_exact(4)) {
                pixel.0 = [chunk[2], chunk[1], chunk[0]];
            }
            Ok(DynamicImage::ImageRgb8(rgb).to_luma8())
        }
    }

    unsafe fn grab_bgra(width: i32, height: i32) -> Result<Vec<u8>, CaptureError> {
        let screen_dc = GetDC(HWND(0));
        if screen_dc.is_invalid() {
            return Err(CaptureError::Display("failed to get screen device context".to_string()));
        }

        let mem_dc = CreateCompatibleDC(screen_dc);
        if mem_dc.is_invalid() {
            let _ = ReleaseDC(HWND(0), screen_dc);
            return Err(CaptureError::Display("failed to create compatible DC".to_string()));
        }

        let bitmap = CreateCompatibleBitmap(screen_dc, width, height);
        if bitmap.is_invalid() {
            let _ = DeleteDC(mem_dc);
            let _ = ReleaseDC(HWND(0), screen_dc);
            return Err(CaptureError::Display("failed to create compatible bitmap".to_string()));
        }

        let old_bitmap = SelectObject(mem_dc, bitmap);
        let blit = BitBlt(mem_dc, 0, 0, width, height, screen_dc, 0, 0, SRCCOPY);

        // 32 bits per pixel keeps rows free of padding.
        let mut bmi = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width,
                biHeight: -height, // top-down
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0 as u32,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut buffer = vec![0u8; (width as usize) * (height as usize) * 4];
        let scan_lines = if blit.is_ok() {
            GetDIBits(
                mem_dc,
                bitmap,
                0,
                height as u32,
                Some(buffer.as_mut_ptr() as *mut _),
                &mut bmi,
                DIB_RGB_COLORS,
            )
        } else {
            0
        };

        let _ = SelectObject(mem_dc, old_bitmap);
        let _ = DeleteObject(bitmap);
        let _ = DeleteDC(mem_dc);
        let _ = ReleaseDC(HWND(0), screen_dc);

        if let Err(e) = blit {
            return Err(CaptureError::Display(format!("BitBlt failed: {}", e)));
        }
        if scan_lines == 0 {
            return Err(CaptureError::Display("failed to read bitmap bits".to_string()));
        }
        Ok(buffer)
    }
}
