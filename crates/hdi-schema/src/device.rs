//! Device records and root-device selection

use serde::Serialize;

/// One entry of the `system-entities` array in an attach response.
///
/// `hdiutil` reports one entry for the whole-disk device plus one per
/// partition or volume it found inside the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Device {
    /// Device node path (e.g., "/dev/disk42s1"). Never empty.
    pub dev_entry: String,

    /// Whether the entry carries a filesystem that could be mounted.
    pub potentially_mountable: bool,

    /// Partition type reported by the tool (e.g., "`GUID_partition_scheme`")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hint: Option<String>,

    /// Raw partition type GUID, when the tool mapped it to a friendlier hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unmapped_content_hint: Option<String>,

    /// Filesystem kind of a mounted volume (e.g., "hfs", "apfs")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_kind: Option<String>,

    /// Where the volume was mounted, if it was
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mount_point: Option<String>,
}

impl Device {
    /// Create a device with only the required fields set.
    pub fn new(dev_entry: impl Into<String>, potentially_mountable: bool) -> Self {
        Self {
            dev_entry: dev_entry.into(),
            potentially_mountable,
            content_hint: None,
            unmapped_content_hint: None,
            volume_kind: None,
            mount_point: None,
        }
    }
}

/// Pick the device that represents the whole attached image.
///
/// The entry with the shortest `dev_entry` wins; on equal length the earlier
/// entry is kept. This leans on macOS device-node naming, where the
/// whole-disk node (`/dev/disk42`) is always shorter than its slices
/// (`/dev/disk42s1`). It is a heuristic, not something every storage
/// subsystem guarantees.
pub fn root_device(devices: &[Device]) -> Option<&Device> {
    let mut root: Option<&Device> = None;
    for device in devices {
        match root {
            Some(best) if device.dev_entry.len() >= best.dev_entry.len() => {}
            _ => root = Some(device),
        }
    }
    root
}
