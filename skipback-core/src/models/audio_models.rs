use serde::{Deserialize, Serialize};

/// Fixed stream parameters negotiated with the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames per delivered block.
    pub block_size: u32,
}

impl StreamFormat {
    /// Samples in one full block (`block_size × channels`).
    pub fn block_samples(&self) -> usize {
        self.block_size as usize * self.channels as usize
    }
}

/// Native sample layout of a block as handed over by the driver.
#[derive(Debug, Clone, Copy)]
pub enum SampleBlock<'a> {
    /// Interleaved float samples in `[-1.0, 1.0]`.
    F32(&'a [f32]),
    /// Interleaved 16-bit samples, already in storage format.
    I16(&'a [i16]),
    /// One float slice per channel.
    PlanarF32(&'a [&'a [f32]]),
}

/// Driver status flags attached to a block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockStatus {
    pub input_overflow: bool,
    pub input_underflow: bool,
}

impl BlockStatus {
    pub fn is_anomaly(&self) -> bool {
        self.input_overflow || self.input_underflow
    }
}

/// One hardware block delivered to the capture callback.
#[derive(Debug, Clone, Copy)]
pub struct DeviceBlock<'a> {
    pub samples: SampleBlock<'a>,
    pub frames: usize,
    pub status: BlockStatus,
}

impl<'a> DeviceBlock<'a> {
    pub fn new(samples: SampleBlock<'a>, frames: usize) -> Self {
        Self {
            samples,
            frames,
            status: BlockStatus::default(),
        }
    }

    pub fn with_status(mut self, status: BlockStatus) -> Self {
        self.status = status;
        self
    }
}

/// Transport type for an audio device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioTransportType {
    BuiltIn,
    Bluetooth,
    BluetoothLE,
    Usb,
    Virtual,
    Unknown,
}

/// An input device available for capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSource {
    pub id: String,
    pub name: String,
    pub is_default: bool,
    pub transport_type: Option<AudioTransportType>,
}

/// Counters maintained by the capture callback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureDiagnostics {
    pub blocks_delivered: u64,
    pub samples_delivered: u64,
    pub blocks_recorded: u64,
    pub anomalies: u64,
}
