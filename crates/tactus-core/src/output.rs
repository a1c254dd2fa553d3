//! CPAL reference backend.
//!
//! One concrete driver exercising the [`Soundcard`] contract from a
//! real OS callback: each period it advances the transport, joins the
//! handshake, and transmits the previous ring slot converted from the
//! configured sample format.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::config::SampleFormat;
use crate::engine::SoundcardEngine;
use crate::soundcard::Soundcard;
use crate::{Error, Result};

/// Wrapper to hold a `cpal::Stream` in a `Send` context.
///
/// `cpal::Stream` is `!Send` due to platform internals. The stream
/// stays on the thread that created it and is only dropped when the
/// backend stops.
struct StreamHandle(#[allow(dead_code)] cpal::Stream);

// SAFETY: the stream is never concurrently accessed; it lives inside
// the backend until drop.
unsafe impl Send for StreamHandle {}

/// Output driver bound to one engine.
pub struct CpalBackend {
    engine: Arc<SoundcardEngine>,
    output_device_index: Option<usize>,
    _stream: Option<StreamHandle>,
}

impl CpalBackend {
    pub fn new(engine: Arc<SoundcardEngine>, output_device_index: Option<usize>) -> Self {
        Self {
            engine,
            output_device_index,
            _stream: None,
        }
    }

    /// Opens the device, activates the handshake client, and starts the
    /// session.
    pub fn start(&mut self) -> Result<()> {
        if self._stream.is_some() {
            return Ok(());
        }

        let device = Self::get_device(self.output_device_index)?;
        let config = device.default_output_config()?;

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => self.build_stream::<f32>(&device, &config.into())?,
            cpal::SampleFormat::I16 => self.build_stream::<i16>(&device, &config.into())?,
            cpal::SampleFormat::U16 => self.build_stream::<u16>(&device, &config.into())?,
            format => {
                return Err(Error::UnsupportedFormat(format!("{:?}", format)));
            }
        };

        self.engine.sync().set_client_active(true);
        self.engine.start()?;
        stream.play()?;

        self._stream = Some(StreamHandle(stream));
        Ok(())
    }

    /// Tears the stream down through the pass-through transition.
    pub fn stop(&mut self) {
        self.engine.stop();
        self.engine.sync().set_client_active(false);
        self._stream = None;
    }

    pub fn is_running(&self) -> bool {
        self._stream.is_some()
    }

    fn get_device(index: Option<usize>) -> Result<cpal::Device> {
        let host = cpal::default_host();

        if let Some(idx) = index {
            let devices: Vec<_> = host.output_devices()?.collect();
            let device_count = devices.len();
            devices.into_iter().nth(idx).ok_or_else(|| {
                Error::InvalidDevice(format!(
                    "Output device index {} out of range (available: {})",
                    idx, device_count
                ))
            })
        } else {
            host.default_output_device()
                .ok_or_else(|| Error::InvalidDevice("No output device available".to_string()))
        }
    }

    fn build_stream<T>(
        &self,
        device: &cpal::Device,
        config: &cpal::StreamConfig,
    ) -> Result<cpal::Stream>
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        let out_channels = config.channels as usize;
        let engine = Arc::clone(&self.engine);

        let stream = device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for sample in data.iter_mut() {
                    *sample = T::from_sample(0.0);
                }

                engine.tic();
                if !engine.sync().callback_begin() {
                    return;
                }

                let handle = engine.get_prev_buffer();
                if let Some(guard) = engine.lock_buffer(handle) {
                    let presets = engine.presets();
                    let src = guard.bytes();
                    let frames = (data.len() / out_channels).min(presets.buffer_size);

                    for frame in 0..frames {
                        for channel in 0..out_channels {
                            let src_channel = channel.min(presets.channels - 1);
                            let index = src_channel * presets.buffer_size + frame;
                            let value = sample_as_f32(src, presets.format, index);
                            data[frame * out_channels + channel] = T::from_sample(value);
                        }
                    }
                }

                engine.sync().callback_finished();
            },
            |_err| {
                // stream error - cannot log from callback
            },
            None,
        )?;

        Ok(stream)
    }

    /// List available output devices.
    pub fn list_output_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices: Result<Vec<String>> = host
            .output_devices()?
            .enumerate()
            .map(|(idx, device)| Ok(format!("{}: {}", idx, device.name()?)))
            .collect();
        devices
    }
}

impl Drop for CpalBackend {
    fn drop(&mut self) {
        self.stop();
    }
}

// cpal reports name errors through DeviceTrait
impl From<cpal::DeviceNameError> for Error {
    fn from(err: cpal::DeviceNameError) -> Self {
        Error::InvalidDevice(err.to_string())
    }
}

/// Decodes one sample of a channel-major slot to f32.
fn sample_as_f32(bytes: &[u8], format: SampleFormat, index: usize) -> f32 {
    let word = format.word_size();
    let at = index * word;
    let Some(raw) = bytes.get(at..at + word) else {
        return 0.0;
    };

    match format {
        SampleFormat::Int8 => raw[0] as i8 as f32 / i8::MAX as f32,
        SampleFormat::Int16 => {
            i16::from_ne_bytes([raw[0], raw[1]]) as f32 / i16::MAX as f32
        }
        SampleFormat::Int24 => {
            // 24-bit payload in a 32-bit word
            i32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]]) as f32 / 8_388_607.0
        }
        SampleFormat::Int32 => {
            i32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]]) as f32 / i32::MAX as f32
        }
        SampleFormat::Int64 => {
            i64::from_ne_bytes([
                raw[0], raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7],
            ]) as f32
                / i64::MAX as f32
        }
        SampleFormat::Float32 => f32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]]),
        SampleFormat::Float64 => f64::from_ne_bytes([
            raw[0], raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7],
        ]) as f32,
    }
}
