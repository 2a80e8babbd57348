//! Attach command

use std::path::Path;

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use hdi_core::{AttachOptions, Device, EjectOptions, Mounter, MounterConfig};

/// Attach an image and print its devices.
///
/// With `hold` set, the root device is registered for auto-eject and the
/// command waits for Ctrl-C before draining the shutdown hooks.
pub async fn attach(
    config: &MounterConfig,
    image: &Path,
    options: AttachOptions,
    json: bool,
    hold: Option<EjectOptions>,
) -> Result<()> {
    let mounter = Mounter::new(config);
    let result = mounter
        .attach(image, options, hold)
        .await
        .with_context(|| format!("Failed to attach {}", image.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result.devices)?);
    } else {
        print_devices(&result.devices);
    }

    let Some(root) = result.eject_handle().target() else {
        return Ok(());
    };
    if hold.is_none() {
        return Ok(());
    }

    eprintln!(
        "{} {} attached, press Ctrl-C to eject",
        "holding".dark_grey(),
        root.display()
    );
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    release(&mounter, &root).await?;
    eprintln!("{} {}", "ejected".green(), root.display());
    Ok(())
}

/// Run every pending auto-eject, failing on the first eject that failed.
async fn release(mounter: &Mounter, root: &Path) -> Result<()> {
    for (_, outcome) in mounter.shutdown_hooks().drain_and_run_all().await {
        outcome.with_context(|| format!("Failed to eject {}", root.display()))?;
    }
    Ok(())
}

/// One listing row: padded device entry, kind, and mount point.
#[derive(Debug, PartialEq, Eq)]
struct Row<'a> {
    entry: String,
    kind: &'a str,
    mount: Option<&'a str>,
}

fn device_rows(devices: &[Device]) -> Vec<Row<'_>> {
    let width = devices
        .iter()
        .map(|d| d.dev_entry.len())
        .max()
        .unwrap_or(0)
        + 2;

    devices
        .iter()
        .map(|device| Row {
            entry: format!("{:<width$}", device.dev_entry),
            kind: device
                .volume_kind
                .as_deref()
                .or(device.content_hint.as_deref())
                .unwrap_or(""),
            mount: device.mount_point.as_deref(),
        })
        .collect()
}

fn print_devices(devices: &[Device]) {
    for row in device_rows(devices) {
        let entry = row.entry.white().bold();
        match row.mount {
            Some(mount) => println!("  {}{:<24}{}", entry, row.kind, mount.green()),
            None => println!("  {}{}", entry, row.kind.dark_grey()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use hdi_core::{MountError, ProcessOutput, ProcessRunner};

    use super::*;

    const ATTACH_OUTPUT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
    <key>system-entities</key>
    <array>
        <dict>
            <key>dev-entry</key><string>/dev/disk42</string>
            <key>potentially-mountable</key><false/>
        </dict>
        <dict>
            <key>dev-entry</key><string>/dev/disk42s1</string>
            <key>potentially-mountable</key><true/>
        </dict>
    </array>
</dict>
</plist>"#;

    #[derive(Debug)]
    struct FakeRunner {
        eject_code: i32,
        ejected: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl ProcessRunner for FakeRunner {
        async fn run(&self, _tool: &Path, args: &[OsString]) -> Result<ProcessOutput, MountError> {
            if args[0] == "attach" {
                return Ok(ProcessOutput::success(ATTACH_OUTPUT));
            }
            let target = args.last().map(PathBuf::from).unwrap_or_default();
            self.ejected.lock().unwrap().push(target);
            Ok(ProcessOutput {
                code: Some(self.eject_code),
                stdout: Vec::new(),
            })
        }
    }

    async fn held_mount(eject_code: i32) -> (Arc<FakeRunner>, Mounter, PathBuf) {
        let runner = Arc::new(FakeRunner {
            eject_code,
            ejected: Mutex::default(),
        });
        let mounter = Mounter::with_runner(
            &MounterConfig::default(),
            Arc::clone(&runner) as Arc<dyn ProcessRunner>,
        );
        let result = mounter
            .attach("a.dmg", AttachOptions::default(), Some(EjectOptions::default()))
            .await
            .unwrap();
        let root = result.eject_handle().target().unwrap();
        (runner, mounter, root)
    }

    #[tokio::test]
    async fn test_release_ejects_held_root() {
        let (runner, mounter, root) = held_mount(0).await;
        assert_eq!(mounter.shutdown_hooks().len(), 1);

        release(&mounter, &root).await.unwrap();
        assert_eq!(*runner.ejected.lock().unwrap(), [PathBuf::from("/dev/disk42")]);
        assert!(mounter.shutdown_hooks().is_empty());

        // Nothing left to eject.
        release(&mounter, &root).await.unwrap();
        assert_eq!(runner.ejected.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_release_reports_failed_eject() {
        let (runner, mounter, root) = held_mount(16).await;

        let err = release(&mounter, &root).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to eject /dev/disk42");
        assert!(matches!(
            err.downcast_ref::<MountError>(),
            Some(MountError::EjectFailed { code: 16 })
        ));
        assert_eq!(runner.ejected.lock().unwrap().len(), 1);
        assert!(mounter.shutdown_hooks().is_empty());
    }

    #[test]
    fn test_device_rows() {
        let mut whole = Device::new("/dev/disk42", false);
        whole.content_hint = Some("GUID_partition_scheme".to_string());
        let mut slice = Device::new("/dev/disk42s1", true);
        slice.content_hint = Some("Apple_HFS".to_string());
        slice.volume_kind = Some("hfs".to_string());
        slice.mount_point = Some("/Volumes/x".to_string());
        let bare = Device::new("/dev/disk42s2", false);

        let entries = [whole, slice, bare];
        let rows = device_rows(&entries);
        assert_eq!(
            rows,
            [
                Row {
                    entry: "/dev/disk42    ".to_string(),
                    kind: "GUID_partition_scheme",
                    mount: None,
                },
                Row {
                    entry: "/dev/disk42s1  ".to_string(),
                    kind: "hfs",
                    mount: Some("/Volumes/x"),
                },
                Row {
                    entry: "/dev/disk42s2  ".to_string(),
                    kind: "",
                    mount: None,
                },
            ]
        );
    }

    #[test]
    fn test_device_rows_empty() {
        assert!(device_rows(&[]).is_empty());
    }
}
