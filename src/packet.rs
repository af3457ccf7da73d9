//! Demuxed packet records.
//!
//! [`PacketRecord`] is the timestamp and payload size of a single video
//! packet as reported by ffprobe's `-show_packets`. The bitrate windowing
//! engine consumes these in the order the probe emitted them.

use serde::{Deserialize, Serialize};

/// Timestamp and byte size of one demuxed packet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PacketRecord {
    /// Decoding timestamp in seconds.
    pub timestamp: f64,
    /// Payload size in bytes.
    pub size: u64,
}

impl PacketRecord {
    /// Create a packet record.
    pub fn new(timestamp: f64, size: u64) -> Self {
        Self { timestamp, size }
    }
}

/// One entry of ffprobe's `packets` array.
///
/// ffprobe prints numbers as strings and omits `dts_time` for packets
/// without a decoding timestamp.
#[derive(Debug, Deserialize)]
pub(crate) struct RawPacket {
    #[serde(default)]
    dts_time: Option<String>,
    #[serde(default)]
    size: Option<String>,
}

impl RawPacket {
    /// Convert to a [`PacketRecord`], or `None` if the timestamp or size is
    /// missing or unparseable.
    pub(crate) fn to_record(&self) -> Option<PacketRecord> {
        let timestamp = self.dts_time.as_deref()?.trim().parse::<f64>().ok()?;
        if !timestamp.is_finite() {
            return None;
        }
        let size = self.size.as_deref()?.trim().parse::<u64>().ok()?;
        Some(PacketRecord { timestamp, size })
    }
}
