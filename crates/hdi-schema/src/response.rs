//! Parser for the plist document printed by `hdiutil attach -plist`.
//!
//! Expected shape:
//!
//! ```text
//! { "system-entities": [
//!     { "dev-entry": string, "potentially-mountable": bool,
//!       "content-hint"?: string, "unmapped-content-hint"?: string,
//!       "volume-kind"?: string, "mount-point"?: string }, ... ] }
//! ```

use std::io::Cursor;

use plist::{Dictionary, Value};
use thiserror::Error;

use crate::device::Device;

const SYSTEM_ENTITIES: &str = "system-entities";

/// Errors raised while interpreting an attach response.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The document is not a plist, or its root is not a dictionary.
    #[error("Malformed root: {0}")]
    MalformedRoot(String),

    /// `system-entities` is absent or not an array.
    #[error("system-entities missing or wrong type")]
    SystemEntities,

    /// An element of `system-entities` is not a dictionary.
    #[error("system-entities[{index}]: expected a dictionary")]
    EntityNotDictionary {
        /// Position in the entity array
        index: usize,
    },

    /// A required key is absent from an entity.
    #[error("system-entities[{index}].{key}: missing required field")]
    MissingField {
        /// Position in the entity array
        index: usize,
        /// Plist key that was looked up
        key: &'static str,
    },

    /// A key is present but holds the wrong kind of value.
    #[error("system-entities[{index}].{key}: expected {expected}")]
    WrongType {
        /// Position in the entity array
        index: usize,
        /// Plist key that was looked up
        key: &'static str,
        /// Kind of value the key must hold
        expected: &'static str,
    },

    /// `dev-entry` is present but empty.
    #[error("system-entities[{index}].{key}: must not be empty")]
    EmptyField {
        /// Position in the entity array
        index: usize,
        /// Plist key that was looked up
        key: &'static str,
    },
}

/// Leaf types that can be pulled out of an entity dictionary.
trait FromPlist: Sized {
    const EXPECTED: &'static str;

    fn from_plist(value: &Value) -> Option<Self>;
}

impl FromPlist for String {
    const EXPECTED: &'static str = "a string";

    fn from_plist(value: &Value) -> Option<Self> {
        value.as_string().map(str::to_owned)
    }
}

impl FromPlist for bool {
    const EXPECTED: &'static str = "a boolean";

    fn from_plist(value: &Value) -> Option<Self> {
        value.as_boolean()
    }
}

fn optional<T: FromPlist>(
    dict: &Dictionary,
    index: usize,
    key: &'static str,
) -> Result<Option<T>, ParseError> {
    match dict.get(key) {
        None => Ok(None),
        Some(value) => T::from_plist(value)
            .map(Some)
            .ok_or(ParseError::WrongType {
                index,
                key,
                expected: T::EXPECTED,
            }),
    }
}

fn required<T: FromPlist>(
    dict: &Dictionary,
    index: usize,
    key: &'static str,
) -> Result<T, ParseError> {
    optional(dict, index, key)?.ok_or(ParseError::MissingField { index, key })
}

fn parse_entity(index: usize, entity: &Value) -> Result<Device, ParseError> {
    let dict = entity
        .as_dictionary()
        .ok_or(ParseError::EntityNotDictionary { index })?;

    let dev_entry: String = required(dict, index, "dev-entry")?;
    if dev_entry.is_empty() {
        return Err(ParseError::EmptyField {
            index,
            key: "dev-entry",
        });
    }

    Ok(Device {
        dev_entry,
        potentially_mountable: required(dict, index, "potentially-mountable")?,
        content_hint: optional(dict, index, "content-hint")?,
        unmapped_content_hint: optional(dict, index, "unmapped-content-hint")?,
        volume_kind: optional(dict, index, "volume-kind")?,
        mount_point: optional(dict, index, "mount-point")?,
    })
}

/// Parse the stdout of a successful `hdiutil attach -plist` into devices.
///
/// Devices are returned in the order the tool listed them. An empty
/// `system-entities` array is valid and yields an empty list.
///
/// # Errors
///
/// Returns [`ParseError::MalformedRoot`] if the bytes are not a plist with a
/// dictionary root, [`ParseError::SystemEntities`] if the entity array is
/// missing, and a per-entity variant naming the offending field otherwise.
pub fn parse_attach_response(stdout: &[u8]) -> Result<Vec<Device>, ParseError> {
    let root = Value::from_reader(Cursor::new(stdout))
        .map_err(|e| ParseError::MalformedRoot(e.to_string()))?;
    let root = root
        .as_dictionary()
        .ok_or_else(|| ParseError::MalformedRoot("expected a dictionary".to_string()))?;

    let entities = root
        .get(SYSTEM_ENTITIES)
        .and_then(Value::as_array)
        .ok_or(ParseError::SystemEntities)?;

    entities
        .iter()
        .enumerate()
        .map(|(index, entity)| parse_entity(index, entity))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plist(body: &str) -> Vec<u8> {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
{body}
</plist>"#
        )
        .into_bytes()
    }

    fn entities(items: &str) -> Vec<u8> {
        plist(&format!(
            "<dict><key>system-entities</key><array>{items}</array></dict>"
        ))
    }

    #[test]
    fn test_parse_all_fields() {
        let doc = entities(
            r"<dict>
                <key>content-hint</key><string>Apple_HFS</string>
                <key>dev-entry</key><string>/dev/disk42s1</string>
                <key>mount-point</key><string>/Volumes/x</string>
                <key>potentially-mountable</key><true/>
                <key>unmapped-content-hint</key><string>48465300-0000-11AA-AA11-00306543ECAC</string>
                <key>volume-kind</key><string>hfs</string>
            </dict>",
        );

        let devices = parse_attach_response(&doc).unwrap();
        assert_eq!(
            devices,
            vec![Device {
                dev_entry: "/dev/disk42s1".to_string(),
                potentially_mountable: true,
                content_hint: Some("Apple_HFS".to_string()),
                unmapped_content_hint: Some("48465300-0000-11AA-AA11-00306543ECAC".to_string()),
                volume_kind: Some("hfs".to_string()),
                mount_point: Some("/Volumes/x".to_string()),
            }]
        );
    }

    #[test]
    fn test_parse_preserves_order() {
        let doc = entities(
            r"<dict><key>dev-entry</key><string>/dev/disk42s2</string><key>potentially-mountable</key><true/></dict>
              <dict><key>dev-entry</key><string>/dev/disk42</string><key>potentially-mountable</key><false/></dict>
              <dict><key>dev-entry</key><string>/dev/disk42s1</string><key>potentially-mountable</key><true/></dict>",
        );

        let devices = parse_attach_response(&doc).unwrap();
        let order: Vec<&str> = devices.iter().map(|d| d.dev_entry.as_str()).collect();
        assert_eq!(order, ["/dev/disk42s2", "/dev/disk42", "/dev/disk42s1"]);
        assert!(!devices[1].potentially_mountable);
    }

    #[test]
    fn test_missing_optional_is_none() {
        let doc = entities(
            r"<dict><key>dev-entry</key><string>/dev/disk9</string><key>potentially-mountable</key><false/></dict>",
        );
        let devices = parse_attach_response(&doc).unwrap();
        assert_eq!(devices[0].mount_point, None);
        assert_eq!(devices[0].volume_kind, None);
    }

    #[test]
    fn test_empty_optional_string_is_kept() {
        let doc = entities(
            r"<dict><key>dev-entry</key><string>/dev/disk9</string><key>potentially-mountable</key><false/><key>mount-point</key><string></string></dict>",
        );
        let devices = parse_attach_response(&doc).unwrap();
        assert_eq!(devices[0].mount_point.as_deref(), Some(""));
    }

    #[test]
    fn test_empty_entities_is_valid() {
        let doc = entities("");
        assert!(parse_attach_response(&doc).unwrap().is_empty());
    }

    #[test]
    fn test_entities_wrong_type() {
        let doc = plist("<dict><key>system-entities</key><string>nope</string></dict>");
        assert!(matches!(
            parse_attach_response(&doc),
            Err(ParseError::SystemEntities)
        ));

        let doc = plist("<dict><key>other</key><array/></dict>");
        assert!(matches!(
            parse_attach_response(&doc),
            Err(ParseError::SystemEntities)
        ));
    }

    #[test]
    fn test_malformed_root() {
        assert!(matches!(
            parse_attach_response(b""),
            Err(ParseError::MalformedRoot(_))
        ));
        assert!(matches!(
            parse_attach_response(b"<plist><dict>"),
            Err(ParseError::MalformedRoot(_))
        ));
        assert!(matches!(
            parse_attach_response(&plist("<array/>")),
            Err(ParseError::MalformedRoot(_))
        ));
    }

    #[test]
    fn test_entity_not_dictionary() {
        let doc = entities("<string>/dev/disk1</string>");
        assert!(matches!(
            parse_attach_response(&doc),
            Err(ParseError::EntityNotDictionary { index: 0 })
        ));
    }

    #[test]
    fn test_missing_dev_entry() {
        let doc = entities(
            r"<dict><key>dev-entry</key><string>/dev/disk1</string><key>potentially-mountable</key><true/></dict>
              <dict><key>potentially-mountable</key><true/></dict>",
        );
        let err = parse_attach_response(&doc).unwrap_err();
        assert!(matches!(
            err,
            ParseError::MissingField {
                index: 1,
                key: "dev-entry"
            }
        ));
        assert_eq!(
            err.to_string(),
            "system-entities[1].dev-entry: missing required field"
        );
    }

    #[test]
    fn test_empty_dev_entry() {
        let doc = entities(
            r"<dict><key>dev-entry</key><string></string><key>potentially-mountable</key><true/></dict>",
        );
        assert!(matches!(
            parse_attach_response(&doc),
            Err(ParseError::EmptyField { index: 0, .. })
        ));
    }

    #[test]
    fn test_wrong_types() {
        let doc = entities(
            r"<dict><key>dev-entry</key><string>/dev/disk1</string><key>potentially-mountable</key><string>yes</string></dict>",
        );
        assert!(matches!(
            parse_attach_response(&doc),
            Err(ParseError::WrongType {
                key: "potentially-mountable",
                expected: "a boolean",
                ..
            })
        ));

        let doc = entities(
            r"<dict><key>dev-entry</key><string>/dev/disk1</string><key>potentially-mountable</key><true/><key>volume-kind</key><integer>3</integer></dict>",
        );
        assert!(matches!(
            parse_attach_response(&doc),
            Err(ParseError::WrongType {
                key: "volume-kind",
                ..
            })
        ));
    }
}
