use crate::error::{LauncherError, Result};
use std::fmt;

/// Operating systems with published Deno release archives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    Linux,
    Mac,
    Windows,
}

/// Host OS identifiers (as reported by `std::env::consts::OS`) and their release mapping
const OS_TABLE: &[(&str, Os)] = &[
    ("linux", Os::Linux),
    ("macos", Os::Mac),
    ("windows", Os::Windows),
];

impl Os {
    /// Tag used in release archive names
    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Linux => "linux",
            Os::Mac => "osx",
            Os::Windows => "win",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Supported architectures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    X64,
}

const ARCH_TABLE: &[(&str, Arch)] = &[("x86_64", Arch::X64), ("amd64", Arch::X64)];

impl Arch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X64 => "x64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A supported os/arch pair. Only constructible through [`RuntimePlatform::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimePlatform {
    pub os: Os,
    pub arch: Arch,
}

impl RuntimePlatform {
    /// Map host identifiers onto the release naming scheme.
    pub fn resolve(os: &str, arch: &str) -> Result<Self> {
        let unsupported = || LauncherError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        };

        let os_kind = OS_TABLE
            .iter()
            .find(|(name, _)| *name == os)
            .map(|(_, kind)| *kind)
            .ok_or_else(unsupported)?;
        let arch_kind = ARCH_TABLE
            .iter()
            .find(|(name, _)| *name == arch)
            .map(|(_, kind)| *kind)
            .ok_or_else(unsupported)?;

        Ok(Self {
            os: os_kind,
            arch: arch_kind,
        })
    }

    pub fn is_windows(&self) -> bool {
        self.os == Os::Windows
    }

    pub fn executable_name(&self) -> &'static str {
        if self.is_windows() {
            "deno.exe"
        } else {
            "deno"
        }
    }

    pub fn archive_extension(&self) -> &'static str {
        if self.is_windows() {
            ".zip"
        } else {
            ".gz"
        }
    }
}

impl fmt::Display for RuntimePlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

/// The version and platform one launcher invocation runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeTarget {
    pub version: String,
    pub platform: RuntimePlatform,
}

impl RuntimeTarget {
    pub fn new(version: impl Into<String>, platform: RuntimePlatform) -> Self {
        Self {
            version: version.into(),
            platform,
        }
    }

    /// Version usable as a single path component
    pub fn version_component(&self) -> String {
        self.version.replace(['/', '\\'], "_")
    }

    /// Name of the archive as published in the release
    pub fn remote_archive_name(&self) -> String {
        format!(
            "deno_{}_{}{}",
            self.platform.os,
            self.platform.arch,
            self.platform.archive_extension()
        )
    }

    /// Name of the archive in the shared download cache, unique per version and platform
    pub fn local_archive_name(&self) -> String {
        format!(
            "deno_{}_{}_{}{}",
            self.version_component(),
            self.platform.os,
            self.platform.arch,
            self.platform.archive_extension()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_table() {
        let cases = [
            ("linux", "x86_64", Os::Linux, "deno", ".gz"),
            ("macos", "x86_64", Os::Mac, "deno", ".gz"),
            ("windows", "x86_64", Os::Windows, "deno.exe", ".zip"),
            ("linux", "amd64", Os::Linux, "deno", ".gz"),
        ];

        for (os, arch, expected_os, exe, ext) in cases {
            let platform = RuntimePlatform::resolve(os, arch).unwrap();
            assert_eq!(platform.os, expected_os, "{os}/{arch}");
            assert_eq!(platform.arch, Arch::X64);
            assert_eq!(platform.executable_name(), exe);
            assert_eq!(platform.archive_extension(), ext);
        }
    }

    #[test]
    fn test_unsupported_platforms() {
        for (os, arch) in [
            ("freebsd", "x86_64"),
            ("linux", "aarch64"),
            ("macos", "aarch64"),
            ("windows", "x86"),
            ("", ""),
        ] {
            match RuntimePlatform::resolve(os, arch) {
                Err(LauncherError::UnsupportedPlatform { os: o, arch: a }) => {
                    assert_eq!(o, os);
                    assert_eq!(a, arch);
                }
                other => panic!("Expected UnsupportedPlatform for {os}/{arch}, got: {:?}", other),
            }
        }
    }

    #[test]
    fn test_archive_names() {
        let linux = RuntimePlatform::resolve("linux", "x86_64").unwrap();
        let target = RuntimeTarget::new("v1.2.3", linux);
        assert_eq!(target.remote_archive_name(), "deno_linux_x64.gz");
        assert_eq!(target.local_archive_name(), "deno_v1.2.3_linux_x64.gz");

        let windows = RuntimePlatform::resolve("windows", "x86_64").unwrap();
        let target = RuntimeTarget::new("v1.2.3", windows);
        assert_eq!(target.remote_archive_name(), "deno_win_x64.zip");
        assert_eq!(target.local_archive_name(), "deno_v1.2.3_win_x64.zip");
    }

    #[test]
    fn test_version_component_strips_separators() {
        let linux = RuntimePlatform::resolve("linux", "x86_64").unwrap();
        let target = RuntimeTarget::new("../v1\\x", linux);
        assert_eq!(target.version_component(), ".._v1_x");
    }
}
