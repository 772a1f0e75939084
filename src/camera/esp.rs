//! esp32-camera driver backend.
//!
//! Bindings come from the `espressif/esp32-camera` component declared in
//! `Cargo.toml` and are exposed by esp-idf-sys as `esp_idf_sys::camera`.

use super::config::CaptureConfig;
use super::driver::{CameraDriver, CameraError, Frame, FrameSource, SensorControl};
use super::sensor::{Calibration, SensorId};
use super::types::{FbLocation, FrameSize, GrabMode, MemoryCapability, PixelFormat};
use esp_idf_sys::camera;
use esp_idf_sys::{heap_caps_get_total_size, ledc_channel_t, ledc_timer_t, MALLOC_CAP_SPIRAM};
use log::debug;
use std::os::raw::c_int;

/// Check for external RAM.
pub fn detect_memory_capability() -> MemoryCapability {
    // SAFETY: read-only heap statistics query
    let total = unsafe { heap_caps_get_total_size(MALLOC_CAP_SPIRAM) };
    debug!("External RAM: {} bytes", total);
    MemoryCapability::new(total > 0)
}

fn pixel_format(format: PixelFormat) -> camera::pixformat_t {
    match format {
        PixelFormat::Jpeg => camera::pixformat_t_PIXFORMAT_JPEG,
        PixelFormat::Rgb565 => camera::pixformat_t_PIXFORMAT_RGB565,
        PixelFormat::Yuv422 => camera::pixformat_t_PIXFORMAT_YUV422,
        PixelFormat::Grayscale => camera::pixformat_t_PIXFORMAT_GRAYSCALE,
    }
}

fn frame_size(size: FrameSize) -> camera::framesize_t {
    match size {
        FrameSize::Qqvga => camera::framesize_t_FRAMESIZE_QQVGA,
        FrameSize::R240x240 => camera::framesize_t_FRAMESIZE_240X240,
        FrameSize::Qvga => camera::framesize_t_FRAMESIZE_QVGA,
        FrameSize::Cif => camera::framesize_t_FRAMESIZE_CIF,
        FrameSize::Hvga => camera::framesize_t_FRAMESIZE_HVGA,
        FrameSize::Vga => camera::framesize_t_FRAMESIZE_VGA,
        FrameSize::Svga => camera::framesize_t_FRAMESIZE_SVGA,
        FrameSize::Xga => camera::framesize_t_FRAMESIZE_XGA,
        FrameSize::Hd => camera::framesize_t_FRAMESIZE_HD,
        FrameSize::Sxga => camera::framesize_t_FRAMESIZE_SXGA,
        FrameSize::Uxga => camera::framesize_t_FRAMESIZE_UXGA,
    }
}

fn driver_config(config: &CaptureConfig) -> camera::camera_config_t {
    let pins = &config.pins;
    camera::camera_config_t {
        pin_pwdn: pins.pwdn,
        pin_reset: pins.reset,
        pin_xclk: pins.xclk,
        __bindgen_anon_1: camera::camera_config_t__bindgen_ty_1 {
            pin_sccb_sda: pins.sccb_sda,
        },
        __bindgen_anon_2: camera::camera_config_t__bindgen_ty_2 {
            pin_sccb_scl: pins.sccb_scl,
        },
        pin_d7: pins.data[7],
        pin_d6: pins.data[6],
        pin_d5: pins.data[5],
        pin_d4: pins.data[4],
        pin_d3: pins.data[3],
        pin_d2: pins.data[2],
        pin_d1: pins.data[1],
        pin_d0: pins.data[0],
        pin_vsync: pins.vsync,
        pin_href: pins.href,
        pin_pclk: pins.pclk,
        xclk_freq_hz: config.xclk_freq_hz as c_int,
        ledc_timer: ledc_timer_t::from(config.xclk.ledc_timer),
        ledc_channel: ledc_channel_t::from(config.xclk.ledc_channel),
        pixel_format: pixel_format(config.pixel_format),
        frame_size: frame_size(config.frame_size),
        jpeg_quality: c_int::from(config.jpeg_quality),
        fb_count: usize::from(config.fb_count),
        fb_location: match config.fb_location {
            FbLocation::ExternalRam => camera::camera_fb_location_t_CAMERA_FB_IN_PSRAM,
            FbLocation::InternalRam => camera::camera_fb_location_t_CAMERA_FB_IN_DRAM,
        },
        grab_mode: match config.grab_mode {
            GrabMode::WhenEmpty => camera::camera_grab_mode_t_CAMERA_GRAB_WHEN_EMPTY,
            GrabMode::Latest => camera::camera_grab_mode_t_CAMERA_GRAB_LATEST,
        },
        ..Default::default()
    }
}

/// The esp32-camera driver. Only one instance can be initialized.
#[derive(Debug, Default)]
pub struct EspCamera;

impl EspCamera {
    pub fn new() -> Self {
        Self
    }
}

impl CameraDriver for EspCamera {
    type Handle = EspSensor;

    fn initialize(&mut self, config: &CaptureConfig) -> Result<EspSensor, CameraError> {
        let driver_config = driver_config(config);

        // SAFETY: config outlives the call; the driver copies what it keeps
        let status = unsafe { camera::esp_camera_init(&driver_config) };
        if status != 0 {
            return Err(CameraError::Init(status));
        }

        // SAFETY: valid after a successful init
        let sensor = unsafe { camera::esp_camera_sensor_get() };
        if sensor.is_null() {
            return Err(CameraError::NoSensor);
        }

        Ok(EspSensor { sensor })
    }
}

/// Live sensor handle.
#[derive(Debug)]
pub struct EspSensor {
    sensor: *mut camera::sensor_t,
}

// The driver owns the sensor for the lifetime of the program and serializes
// SCCB access internally.
unsafe impl Send for EspSensor {}

fn control(name: &'static str, status: c_int) -> Result<(), CameraError> {
    if status == 0 {
        Ok(())
    } else {
        Err(CameraError::Control {
            control: name,
            status,
        })
    }
}

impl SensorControl for EspSensor {
    fn sensor_id(&self) -> SensorId {
        // SAFETY: non-null, checked in initialize
        SensorId(unsafe { (*self.sensor).id.PID })
    }

    fn apply_calibration(&mut self, calibration: &Calibration) -> Result<(), CameraError> {
        // SAFETY: driver-provided function table of a live sensor
        unsafe {
            let s = &*self.sensor;
            let set_vflip = s.set_vflip.ok_or(CameraError::Control {
                control: "vflip",
                status: -1,
            })?;
            control("vflip", set_vflip(self.sensor, c_int::from(calibration.vflip)))?;

            let set_brightness = s.set_brightness.ok_or(CameraError::Control {
                control: "brightness",
                status: -1,
            })?;
            control(
                "brightness",
                set_brightness(self.sensor, c_int::from(calibration.brightness)),
            )?;

            let set_saturation = s.set_saturation.ok_or(CameraError::Control {
                control: "saturation",
                status: -1,
            })?;
            control(
                "saturation",
                set_saturation(self.sensor, c_int::from(calibration.saturation)),
            )?;
        }
        Ok(())
    }

    fn set_frame_size(&mut self, size: FrameSize) -> Result<(), CameraError> {
        // SAFETY: as above
        unsafe {
            let set_framesize = (*self.sensor).set_framesize.ok_or(CameraError::Control {
                control: "framesize",
                status: -1,
            })?;
            control("framesize", set_framesize(self.sensor, frame_size(size)))
        }
    }
}

impl FrameSource for EspSensor {
    fn capture(&mut self) -> Result<Frame, CameraError> {
        // SAFETY: the buffer is copied out and handed back before returning
        unsafe {
            let fb = camera::esp_camera_fb_get();
            if fb.is_null() {
                return Err(CameraError::Capture);
            }
            let data = std::slice::from_raw_parts((*fb).buf, (*fb).len).to_vec();
            let frame = Frame {
                width: (*fb).width as u16,
                height: (*fb).height as u16,
                data,
            };
            camera::esp_camera_fb_return(fb);
            Ok(frame)
        }
    }
}
