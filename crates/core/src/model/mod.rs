//! Entities recovered from canonical crash-report text.
//!
//! A [`Process`] owns its threads and binary images; all of them are owned in turn by
//! the [`crate::report::ReportFile`] they were extracted from.

use serde::{Deserialize, Serialize};

use crate::build_id::BuildId;

/// A loaded binary image row from a `Binary Images:` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryImage {
    pub load_address: u64,
    /// Inclusive end address; `None` when the report prints `???`.
    pub end_address: Option<u64>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    pub build_id: BuildId,
    pub path: String,
}

impl BinaryImage {
    pub fn contains(&self, address: u64) -> bool {
        match self.end_address {
            Some(end) => (self.load_address..=end).contains(&address),
            None => address == self.load_address,
        }
    }
}

/// One row of a thread backtrace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub index: u32,
    pub image_name: String,
    pub address: u64,
    /// Whatever follows the address: `0x1000 + 42`, or an already resolved symbol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub crashed: bool,
    pub frames: Vec<Frame>,
}

/// A process section of a crash report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Architecture derived from the `Code Type:` line (e.g. `arm64`, `x86_64`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crashed_thread: Option<u32>,
    pub threads: Vec<Thread>,
    pub binary_images: Vec<BinaryImage>,
}

impl Process {
    pub fn new(name: impl Into<String>, pid: Option<u32>) -> Self {
        Self {
            name: name.into(),
            pid,
            path: None,
            identifier: None,
            version: None,
            architecture: None,
            crashed_thread: None,
            threads: Vec::new(),
            binary_images: Vec::new(),
        }
    }

    /// Build identifiers of this process's images, in table order.
    pub fn build_ids(&self) -> impl Iterator<Item = BuildId> + '_ {
        self.binary_images.iter().map(|image| image.build_id)
    }

    pub fn image_containing(&self, address: u64) -> Option<&BinaryImage> {
        self.binary_images.iter().find(|image| image.contains(address))
    }

    pub fn crashed_thread(&self) -> Option<&Thread> {
        self.threads.iter().find(|t| t.crashed).or_else(|| {
            let idx = self.crashed_thread?;
            self.threads.iter().find(|t| t.index == idx)
        })
    }
}

/// Map a report `Code Type:` value to the architecture name symbol tools expect.
pub fn architecture_for_code_type(code_type: &str) -> Option<String> {
    let first = code_type.split_whitespace().next()?;
    let arch = match first.to_ascii_uppercase().as_str() {
        "ARM-64" | "ARM64" => "arm64",
        "ARM64E" => "arm64e",
        "ARM-64_32" | "ARM64_32" => "arm64_32",
        "ARM" => "armv7",
        "X86-64" | "X86_64" => "x86_64",
        "X86" | "I386" => "i386",
        _ => return None,
    };
    Some(arch.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(start: u64, end: Option<u64>) -> BinaryImage {
        BinaryImage {
            load_address: start,
            end_address: end,
            name: "App".into(),
            version: None,
            architecture: None,
            build_id: BuildId::parse("AAAAAAAA-1111-2222-3333-444444444444").unwrap(),
            path: "/App".into(),
        }
    }

    #[test]
    fn image_range_is_inclusive() {
        let img = image(0x1000, Some(0x1fff));
        assert!(img.contains(0x1000));
        assert!(img.contains(0x1fff));
        assert!(!img.contains(0x2000));
        assert!(image(0x1000, None).contains(0x1000));
    }

    #[test]
    fn code_types_map_to_architectures() {
        assert_eq!(architecture_for_code_type("ARM-64 (Native)").as_deref(), Some("arm64"));
        assert_eq!(architecture_for_code_type("X86-64").as_deref(), Some("x86_64"));
        assert_eq!(architecture_for_code_type("PPC"), None);
        assert_eq!(architecture_for_code_type(""), None);
    }
}
