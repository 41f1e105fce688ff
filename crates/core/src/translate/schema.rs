//! Serde model of the JSON incident report (`.ips`) format.
//!
//! An `.ips` file is a single-line header object followed by the payload object.
//! Everything is optional except the fields an image row cannot do without.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct IpsHeader {
    pub app_name: Option<String>,
    pub app_version: Option<String>,
    pub build_version: Option<String>,
    pub timestamp: Option<String>,
    pub bug_type: Option<String>,
    pub os_version: Option<String>,
    pub incident_id: Option<String>,
    #[serde(rename = "bundleID")]
    pub bundle_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct IpsPayload {
    pub incident: Option<String>,
    pub crash_reporter_key: Option<String>,
    pub model_code: Option<String>,
    pub proc_name: Option<String>,
    pub pid: Option<u64>,
    pub proc_path: Option<String>,
    pub proc_role: Option<String>,
    pub proc_launch: Option<String>,
    pub capture_time: Option<String>,
    pub parent_proc: Option<String>,
    pub parent_pid: Option<u64>,
    pub coalition_name: Option<String>,
    pub cpu_type: Option<String>,
    pub translated: Option<bool>,
    pub os_version: Option<IpsOsVersion>,
    pub bundle_info: Option<IpsBundleInfo>,
    pub exception: Option<IpsException>,
    pub termination: Option<IpsTermination>,
    pub asi: Option<Value>,
    pub faulting_thread: Option<u32>,
    pub last_exception_backtrace: Vec<IpsFrame>,
    pub threads: Vec<IpsThread>,
    pub used_images: Option<Vec<IpsImage>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct IpsOsVersion {
    pub train: Option<String>,
    pub build: Option<String>,
    pub release_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct IpsBundleInfo {
    #[serde(rename = "CFBundleIdentifier")]
    pub identifier: Option<String>,
    #[serde(rename = "CFBundleShortVersionString")]
    pub short_version: Option<String>,
    #[serde(rename = "CFBundleVersion")]
    pub version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct IpsException {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub signal: Option<String>,
    pub subtype: Option<String>,
    pub codes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct IpsTermination {
    pub namespace: Option<String>,
    pub code: Option<Value>,
    pub indicator: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct IpsThread {
    pub triggered: bool,
    pub name: Option<String>,
    pub queue: Option<String>,
    pub frames: Vec<IpsFrame>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IpsFrame {
    pub image_offset: u64,
    #[serde(default)]
    pub image_index: Option<usize>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub symbol_location: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IpsImage {
    pub base: u64,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
    #[serde(default, rename = "CFBundleShortVersionString")]
    pub short_version: Option<String>,
    #[serde(default, rename = "CFBundleVersion")]
    pub version: Option<String>,
}
