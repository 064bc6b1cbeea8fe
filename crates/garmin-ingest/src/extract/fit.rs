//! Extractor for the proprietary binary track format (FIT)
//!
//! Byte-level decoding belongs to an external decoder behind the
//! [`FitDecoder`] trait; this extractor only reshapes the decoded
//! messages into canonical mappings and turns decoder failures into
//! per-file parse errors the batch driver can skip.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::extract::Extraction;
use crate::fields::{put, FieldMap};
use crate::identity;

/// Messages the external decoder reports per file
#[derive(Debug, Clone)]
pub enum FitMessage {
    /// File header: which device wrote the file
    FileId {
        serial_number: Option<i64>,
        manufacturer: Option<String>,
        product: Option<String>,
        time_created: Option<DateTime<Utc>>,
    },
    /// Periodic device status
    DeviceInfo {
        timestamp: DateTime<Utc>,
        serial_number: Option<i64>,
        software_version: Option<String>,
        hardware_version: Option<String>,
    },
}

/// Byte-level decoder boundary. Implementations report malformed input
/// as an error for that file; they never panic on bad bytes.
pub trait FitDecoder {
    fn decode(&self, path: &Path) -> Result<Vec<FitMessage>>;
}

/// Extract one binary track file through the given decoder
pub fn extract(path: &Path, decoder: &dyn FitDecoder) -> Result<Extraction> {
    let messages = decoder.decode(path)?;

    let mut extraction = Extraction::default();
    let file_name = identity::file_name(path)?;
    extraction.file.insert("name", file_name.clone().into());
    extraction.file.insert("type", "fit".into());

    for message in messages {
        match message {
            FitMessage::FileId {
                serial_number,
                manufacturer,
                product,
                time_created,
            } => {
                let serial = serial_number.unwrap_or(identity::UNKNOWN_DEVICE_SERIAL);
                let mut device = FieldMap::new();
                device.insert("serial_number", serial.into());
                put(&mut device, "timestamp", time_created.map(Into::into));
                put(&mut device, "manufacturer", manufacturer.map(Into::into));
                put(&mut device, "product", product.map(Into::into));
                extraction.device = Some(device);
                extraction.file.insert("serial_number", serial.into());
            }
            FitMessage::DeviceInfo {
                timestamp,
                serial_number,
                software_version,
                hardware_version,
            } => {
                let mut info = FieldMap::new();
                info.insert("timestamp", timestamp.into());
                info.insert("file_name", file_name.clone().into());
                put(&mut info, "serial_number", serial_number.map(Into::into));
                put(
                    &mut info,
                    "software_version",
                    software_version.map(Into::into),
                );
                extraction.device_info.push(info);

                // A device's hardware version is only ever reported here
                if let (Some(device), Some(hw)) = (&mut extraction.device, hardware_version) {
                    put(device, "hardware_version", Some(hw.into()));
                }
            }
        }
    }

    Ok(extraction)
}
