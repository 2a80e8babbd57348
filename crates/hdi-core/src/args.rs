//! Command-line assembly for `hdiutil attach` and `hdiutil eject`.

use std::borrow::Cow;
use std::ffi::OsString;
use std::path::Path;

/// Options for `hdiutil attach`. Every flag defaults to off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttachOptions {
    /// Pass `-readonly`: force the device to be read-only.
    pub readonly: bool,

    /// Pass `-nobrowse`: hide the volume from Finder.
    pub nobrowse: bool,
}

/// Options for `hdiutil eject`. Every flag defaults to off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EjectOptions {
    /// Pass `-force`: detach even if files are open.
    pub force: bool,
}

impl AttachOptions {
    /// Set the read-only flag.
    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    /// Set the no-browse flag.
    pub fn nobrowse(mut self, nobrowse: bool) -> Self {
        self.nobrowse = nobrowse;
        self
    }
}

impl EjectOptions {
    /// Eject with `-force`.
    pub fn forced() -> Self {
        Self { force: true }
    }
}

/// Make sure a path can't be mistaken for a flag.
///
/// Paths starting with `-` get a `./` prefix; everything else is returned
/// untouched.
pub fn file_arg(path: &Path) -> Cow<'_, Path> {
    if path.as_os_str().as_encoded_bytes().starts_with(b"-") {
        Cow::Owned(Path::new(".").join(path))
    } else {
        Cow::Borrowed(path)
    }
}

/// Arguments for `hdiutil attach -plist [-readonly] [-nobrowse] <file>`.
pub fn attach_args(file: &Path, options: AttachOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["attach".into(), "-plist".into()];
    if options.readonly {
        args.push("-readonly".into());
    }
    if options.nobrowse {
        args.push("-nobrowse".into());
    }
    args.push(file_arg(file).into_owned().into_os_string());
    args
}

/// Arguments for `hdiutil eject [-force] <target>`.
pub fn eject_args(target: &Path, options: EjectOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["eject".into()];
    if options.force {
        args.push("-force".into());
    }
    args.push(file_arg(target).into_owned().into_os_string());
    args
}
