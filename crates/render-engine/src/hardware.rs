//! Recognition of hardware-encoder incompatibility in diagnostic output.
//!
//! Matching is best-effort: the phrases are the encoder's own messages and
//! can change between encoder releases. [`PHRASE_SET_REVISION`] is bumped
//! whenever the set changes.

use std::fmt;

/// Revision of the recognized phrase set.
pub const PHRASE_SET_REVISION: u32 = 1;

/// A recognized reason the hardware encoder cannot run on this machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HardwareFailure {
    /// Installed driver is older than the encoder API requires.
    DriverApiVersion,
    /// No compatible GPU is present.
    NoGpu,
    /// The encode library could not be loaded.
    MissingEncodeLibrary,
}

impl HardwareFailure {
    pub const ALL: [HardwareFailure; 3] = [
        HardwareFailure::DriverApiVersion,
        HardwareFailure::NoGpu,
        HardwareFailure::MissingEncodeLibrary,
    ];

    /// The diagnostic phrase that identifies this failure.
    pub fn phrase(self) -> &'static str {
        match self {
            HardwareFailure::DriverApiVersion => {
                "Driver does not support the required nvenc API version"
            }
            HardwareFailure::NoGpu => "No NVIDIA GPU was found",
            HardwareFailure::MissingEncodeLibrary => "Cannot load libnvidia-encode.so",
        }
    }

    /// Classify one diagnostic line.
    pub fn classify(line: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| line.contains(f.phrase()))
    }
}

impl fmt::Display for HardwareFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.phrase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_phrases() {
        assert_eq!(
            HardwareFailure::classify(
                "[h264_nvenc @ 0x55] Driver does not support the required nvenc API version. Required: 12.1 Found: 11.0"
            ),
            Some(HardwareFailure::DriverApiVersion)
        );
        assert_eq!(
            HardwareFailure::classify("[h264_nvenc @ 0x1] No NVIDIA GPU was found"),
            Some(HardwareFailure::NoGpu)
        );
        assert_eq!(
            HardwareFailure::classify("Cannot load libnvidia-encode.so.1"),
            Some(HardwareFailure::MissingEncodeLibrary)
        );
    }

    #[test]
    fn test_classify_ignores_other_output() {
        assert_eq!(HardwareFailure::classify("frame=  10 fps=0.0 time=00:00:00.33"), None);
        assert_eq!(HardwareFailure::classify("no nvidia gpu was found"), None);
    }
}
