// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 device controls through `v4l2-ctl`
//!
//! The control tool is an external protocol: its `-L` listing is parsed into
//! typed [`ControlDescriptor`]s, its `--list-formats-ext` output into a list
//! of resolutions, and settings are written back with `--set-ctrl`.
//!
//! Settings are applied in three batches, bool controls first, then menus,
//! then everything else. Auto modes (`exposure_auto`, `white_balance_auto`)
//! gate whether their manual counterparts are writable, so the order matters.

use super::Resolution;
use crate::constants::controls::INACTIVE_FLAG;
use crate::errors::SettingsError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

/// A control value as printed and accepted by `v4l2-ctl`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlValue {
    Int(i64),
    Text(String),
}

impl ControlValue {
    /// Integer first, string fallback
    pub fn parse(raw: &str) -> Self {
        raw.parse::<i64>()
            .map(Self::Int)
            .unwrap_or_else(|_| Self::Text(raw.to_string()))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Text(_) => None,
        }
    }
}

impl std::fmt::Display for ControlValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for ControlValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

/// Typed payload of a control descriptor
#[derive(Debug, Clone, PartialEq)]
pub enum ControlKind {
    Int {
        value: i64,
        default: Option<i64>,
        min: i64,
        max: i64,
        step: i64,
    },
    Bool {
        value: bool,
        default: Option<bool>,
    },
    Menu {
        value: i64,
        default: Option<i64>,
        min: Option<i64>,
        max: Option<i64>,
        /// Menu code to label; never empty and always contains `value`
        items: BTreeMap<i64, String>,
    },
    /// Any other `v4l2-ctl` type (int64, button, bitmask, intmenu, ...)
    Other {
        type_name: String,
        value: Option<ControlValue>,
        fields: BTreeMap<String, ControlValue>,
    },
}

/// One hardware control from a `v4l2-ctl -L` listing
#[derive(Debug, Clone, PartialEq)]
pub struct ControlDescriptor {
    pub name: String,
    pub flags: Option<String>,
    pub kind: ControlKind,
}

impl ControlDescriptor {
    /// Type name as `v4l2-ctl` prints it
    pub fn type_name(&self) -> &str {
        match &self.kind {
            ControlKind::Int { .. } => "int",
            ControlKind::Bool { .. } => "bool",
            ControlKind::Menu { .. } => "menu",
            ControlKind::Other { type_name, .. } => type_name,
        }
    }

    /// True if the driver currently refuses writes to this control
    pub fn is_inactive(&self) -> bool {
        self.flags.as_deref().is_some_and(is_inactive_flags)
    }

    pub fn value(&self) -> Option<ControlValue> {
        match &self.kind {
            ControlKind::Int { value, .. } | ControlKind::Menu { value, .. } => {
                Some(ControlValue::Int(*value))
            }
            ControlKind::Bool { value, .. } => Some(ControlValue::Int(i64::from(*value))),
            ControlKind::Other { value, .. } => value.clone(),
        }
    }

    pub fn default_value(&self) -> Option<ControlValue> {
        match &self.kind {
            ControlKind::Int { default, .. } | ControlKind::Menu { default, .. } => {
                default.map(ControlValue::Int)
            }
            ControlKind::Bool { default, .. } => default.map(|d| ControlValue::Int(i64::from(d))),
            ControlKind::Other { fields, .. } => fields.get("default").cloned(),
        }
    }

    /// Change the value, checking it against the control's range or menu
    pub fn set_value(&mut self, new_value: ControlValue) -> Result<(), SettingsError> {
        let invalid = || SettingsError::InvalidValue {
            name: self.name.clone(),
            value: new_value.to_string(),
        };

        match &mut self.kind {
            ControlKind::Int {
                value, min, max, ..
            } => {
                let v = new_value.as_int().ok_or_else(invalid)?;
                if v < *min || v > *max {
                    return Err(invalid());
                }
                *value = v;
            }
            ControlKind::Bool { value, .. } => match new_value.as_int() {
                Some(0) => *value = false,
                Some(1) => *value = true,
                _ => return Err(invalid()),
            },
            ControlKind::Menu { value, items, .. } => {
                let v = new_value.as_int().ok_or_else(invalid)?;
                if !items.contains_key(&v) {
                    return Err(invalid());
                }
                *value = v;
            }
            ControlKind::Other { value, .. } => *value = Some(new_value),
        }
        Ok(())
    }

    /// Reset to the driver default; returns false if there is none
    pub fn reset(&mut self) -> bool {
        match self.default_value() {
            Some(default) => self.set_value(default).is_ok(),
            None => false,
        }
    }

    /// Value one step up (`direction > 0`) or down from the current one
    ///
    /// Ints move by their step and stop at the range ends, bools flip and
    /// menus move to the neighbouring item. `None` when nothing would change.
    pub fn stepped(&self, direction: i64) -> Option<ControlValue> {
        let next = match &self.kind {
            ControlKind::Int {
                value,
                min,
                max,
                step,
                ..
            } => {
                let delta = (*step).max(1).saturating_mul(direction.signum());
                value.saturating_add(delta).clamp(*min, *max)
            }
            ControlKind::Bool { value, .. } => i64::from(!*value),
            ControlKind::Menu { value, items, .. } => {
                let neighbour = if direction < 0 {
                    items.range(..*value).next_back()
                } else {
                    items.range(value.saturating_add(1)..).next()
                };
                *neighbour?.0
            }
            ControlKind::Other { .. } => return None,
        };
        let next = ControlValue::Int(next);
        (self.value().as_ref() != Some(&next)).then_some(next)
    }

    /// The persisted subset, or `None` if the control has no value to write
    pub fn to_setting(&self) -> Option<ControlSetting> {
        Some(ControlSetting {
            name: self.name.clone(),
            kind: Some(self.type_name().to_string()),
            value: Some(self.value()?),
            flags: self.flags.clone(),
        })
    }
}

/// A control value to write, as stored in session files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlSetting {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Missing for controls saved without a value (e.g. buttons)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ControlValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<String>,
}

impl ControlSetting {
    pub fn new(name: impl Into<String>, kind: Option<&str>, value: ControlValue) -> Self {
        Self {
            name: name.into(),
            kind: kind.map(str::to_string),
            value: Some(value),
            flags: None,
        }
    }

    pub fn is_inactive(&self) -> bool {
        self.flags.as_deref().is_some_and(is_inactive_flags)
    }

    fn bucket(&self) -> Bucket {
        match self.kind.as_deref() {
            Some("bool") => Bucket::Bool,
            Some("menu") => Bucket::Menu,
            _ => Bucket::Other,
        }
    }
}

fn is_inactive_flags(flags: &str) -> bool {
    flags.split(',').any(|f| f.trim() == INACTIVE_FLAG)
}

/// Write order for `--set-ctrl` batches
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Bucket {
    Bool,
    Menu,
    Other,
}

impl Bucket {
    const ORDER: [Bucket; 3] = [Bucket::Bool, Bucket::Menu, Bucket::Other];

    fn label(self) -> &'static str {
        match self {
            Bucket::Bool => "bool",
            Bucket::Menu => "menu",
            Bucket::Other => "other",
        }
    }
}

// ===== Parsing =====

/// Parse a `v4l2-ctl -L` listing into descriptors sorted by name
pub fn parse_controls(listing: &str) -> Result<Vec<ControlDescriptor>, SettingsError> {
    struct RawControl {
        name: String,
        type_name: String,
        fields: BTreeMap<String, ControlValue>,
        items: BTreeMap<i64, String>,
    }

    let mut raw: Vec<RawControl> = Vec::new();

    for line in listing.lines().map(str::trim) {
        if let Some((code, label)) = parse_menu_line(line) {
            match raw.last_mut() {
                Some(control) => {
                    control.items.insert(code, label.to_string());
                }
                None => debug!(line, "Menu entry before any control, ignoring"),
            }
            continue;
        }

        let Some((name, type_name)) = parse_control_header(line) else {
            continue;
        };

        raw.push(RawControl {
            name: name.to_string(),
            type_name: type_name.to_string(),
            fields: parse_fields(line),
            items: BTreeMap::new(),
        });
    }

    let mut controls = raw
        .into_iter()
        .map(|r| build_descriptor(r.name, r.type_name, r.fields, r.items))
        .collect::<Result<Vec<_>, _>>()?;

    controls.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(controls)
}

/// `<digits>: <label>`
fn parse_menu_line(line: &str) -> Option<(i64, &str)> {
    let (code, rest) = line.split_once(':')?;
    if code.is_empty() || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let label = rest.strip_prefix(|c: char| c.is_whitespace())?;
    if label.is_empty() {
        return None;
    }
    Some((code.parse().ok()?, label))
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// `<name> ... (<type>)`: leading word, and the last whitespace-preceded
/// parenthesised word on the line
fn parse_control_header(line: &str) -> Option<(&str, &str)> {
    let name_end = line.find(|c: char| !is_word_char(c)).unwrap_or(line.len());
    if name_end == 0 {
        return None;
    }
    let name = &line[..name_end];
    let rest = &line[name_end..];

    let type_name = rest
        .match_indices('(')
        .filter(|(i, _)| {
            rest[..*i]
                .chars()
                .next_back()
                .is_some_and(char::is_whitespace)
        })
        .filter_map(|(i, _)| {
            let inner = &rest[i + 1..];
            let close = inner.find(')')?;
            let word = &inner[..close];
            (!word.is_empty() && word.chars().all(is_word_char)).then_some(word)
        })
        .last()?;

    Some((name, type_name))
}

/// Every `key=value` token on the line, value up to the next whitespace
fn parse_fields(line: &str) -> BTreeMap<String, ControlValue> {
    let mut fields = BTreeMap::new();
    for token in line.split_whitespace() {
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        // Keep only the word characters directly before '='
        let key_start = key
            .char_indices()
            .rev()
            .take_while(|(_, c)| is_word_char(*c))
            .last()
            .map(|(i, _)| i);
        let Some(key_start) = key_start else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        fields.insert(key[key_start..].to_string(), ControlValue::parse(value));
    }
    fields
}

fn build_descriptor(
    name: String,
    type_name: String,
    mut fields: BTreeMap<String, ControlValue>,
    items: BTreeMap<i64, String>,
) -> Result<ControlDescriptor, SettingsError> {
    let flags = fields.remove("flags").map(|f| f.to_string());

    let int_field = |fields: &BTreeMap<String, ControlValue>, key: &str| {
        fields.get(key).and_then(ControlValue::as_int)
    };
    let require = |fields: &BTreeMap<String, ControlValue>, key: &str| {
        int_field(fields, key).ok_or_else(|| {
            SettingsError::Parse(format!("{} control '{}' has no integer {}", type_name, name, key))
        })
    };

    let kind = match type_name.as_str() {
        "int" => ControlKind::Int {
            value: require(&fields, "value")?,
            default: int_field(&fields, "default"),
            min: require(&fields, "min")?,
            max: require(&fields, "max")?,
            step: int_field(&fields, "step").unwrap_or(1),
        },
        "bool" => ControlKind::Bool {
            value: require(&fields, "value")? != 0,
            default: int_field(&fields, "default").map(|d| d != 0),
        },
        "menu" => {
            let value = require(&fields, "value")?;
            if items.is_empty() {
                return Err(SettingsError::Parse(format!(
                    "menu control '{}' has no entries",
                    name
                )));
            }
            if !items.contains_key(&value) {
                return Err(SettingsError::Parse(format!(
                    "menu control '{}' value {} is not a menu entry",
                    name, value
                )));
            }
            ControlKind::Menu {
                value,
                default: int_field(&fields, "default"),
                min: int_field(&fields, "min"),
                max: int_field(&fields, "max"),
                items,
            }
        }
        _ => {
            let value = fields.remove("value");
            ControlKind::Other {
                type_name: type_name.clone(),
                value,
                fields,
            }
        }
    };

    Ok(ControlDescriptor { name, flags, kind })
}

/// Every whitespace-preceded `WIDTHxHEIGHT` token, deduplicated and sorted
pub fn parse_resolutions(listing: &str) -> Vec<Resolution> {
    let mut found: Vec<Resolution> = listing
        .split(char::is_whitespace)
        .skip(1)
        .filter_map(find_resolution_prefix)
        .collect();
    found.sort();
    found.dedup();
    found
}

/// Parse the leading `<digits>x<digits>` of a token
fn find_resolution_prefix(token: &str) -> Option<Resolution> {
    let (w_str, rest) = token.split_at(token.find(|c: char| !c.is_ascii_digit())?);
    let rest = rest.strip_prefix('x')?;
    let h_len = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let (w, h) = (w_str.parse().ok()?, rest[..h_len].parse().ok()?);
    Some(Resolution::new(w, h))
}

/// `name=value,name=value` argument for `--set-ctrl`
pub fn format_settings<'a>(settings: impl IntoIterator<Item = &'a ControlSetting>) -> String {
    settings
        .into_iter()
        .filter_map(|s| s.value.as_ref().map(|v| format!("{}={}", s.name, v)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse one `name=value` command-line assignment
pub fn parse_assignment(arg: &str) -> Result<(String, ControlValue), SettingsError> {
    match arg.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() && !value.trim().is_empty() => {
            Ok((name.trim().to_string(), ControlValue::parse(value.trim())))
        }
        _ => Err(SettingsError::Parse(format!(
            "expected name=value, got '{}'",
            arg
        ))),
    }
}

// ===== Subprocess =====

/// Runs the control tool and returns its standard output
pub trait CommandRunner: Send + Sync {
    fn run(&self, args: &[String]) -> Result<String, SettingsError>;
}

/// Spawns the control tool as a child process
///
/// Any output on stderr is treated as failure. With a timeout the child is
/// killed once it expires.
#[derive(Debug, Clone)]
pub struct SubprocessRunner {
    program: String,
    timeout: Option<Duration>,
}

impl SubprocessRunner {
    pub fn new(program: &str, timeout: Option<Duration>) -> Self {
        Self {
            program: program.to_string(),
            timeout,
        }
    }
}

impl CommandRunner for SubprocessRunner {
    fn run(&self, args: &[String]) -> Result<String, SettingsError> {
        debug!(program = %self.program, ?args, "Running control tool");

        let spawn_err = |e: std::io::Error| SettingsError::Spawn {
            tool: self.program.clone(),
            reason: e.to_string(),
        };

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;

        let (stdout, stderr) = match self.timeout {
            Some(timeout) => {
                // Drain both pipes while waiting, a full pipe blocks the child
                let stdout_reader = child.stdout.take().map(spawn_drain);
                let stderr_reader = child.stderr.take().map(spawn_drain);

                if child.wait_timeout(timeout).map_err(spawn_err)?.is_none() {
                    let _ = child.kill();
                    let _ = child.wait();
                    warn!(program = %self.program, ?timeout, "Control tool timed out");
                    return Err(SettingsError::Timeout {
                        tool: self.program.clone(),
                        timeout,
                    });
                }
                (
                    join_drain(stdout_reader).map_err(spawn_err)?,
                    join_drain(stderr_reader).map_err(spawn_err)?,
                )
            }
            None => {
                let output = child.wait_with_output().map_err(spawn_err)?;
                (output.stdout, output.stderr)
            }
        };

        let stderr = String::from_utf8_lossy(&stderr);
        if !stderr.trim().is_empty() {
            return Err(SettingsError::Device(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

/// Read a pipe to the end on its own thread
fn spawn_drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<std::io::Result<Vec<u8>>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn join_drain(reader: Option<JoinHandle<std::io::Result<Vec<u8>>>>) -> std::io::Result<Vec<u8>> {
    match reader {
        Some(handle) => handle
            .join()
            .unwrap_or_else(|_| Err(std::io::Error::other("pipe reader panicked"))),
        None => Ok(Vec::new()),
    }
}

// ===== Control protocol =====

/// Narrow device-control interface
///
/// `list`, `resolutions` and `apply` are the whole protocol; the helpers are
/// built on top of them.
pub trait DeviceControl: Send + Sync {
    /// Device node this binding talks to
    fn device(&self) -> &str;

    /// Current controls, sorted by name
    fn list(&self) -> Result<Vec<ControlDescriptor>, SettingsError>;

    /// Frame sizes the device advertises, ascending
    fn resolutions(&self) -> Result<Vec<Resolution>, SettingsError>;

    /// Write settings: inactive ones skipped, then bool, menu, other batches
    ///
    /// A failing batch aborts the rest; earlier batches stay applied.
    fn apply(&self, settings: &[ControlSetting]) -> Result<(), SettingsError>;

    /// Write descriptors as edited in the UI
    fn apply_descriptors(&self, controls: &[ControlDescriptor]) -> Result<(), SettingsError> {
        let settings: Vec<ControlSetting> =
            controls.iter().filter_map(ControlDescriptor::to_setting).collect();
        self.apply(&settings)
    }

    /// Write a single control
    fn set_control(&self, control: &ControlDescriptor) -> Result<(), SettingsError> {
        self.apply_descriptors(std::slice::from_ref(control))
    }

    /// Set controls by name, validated against the current listing
    ///
    /// Nothing is written if any name is unknown or any value is out of
    /// range. Returns the updated descriptors in the order given.
    fn set_by_name(
        &self,
        assignments: &[(String, ControlValue)],
    ) -> Result<Vec<ControlDescriptor>, SettingsError> {
        let current = self.list()?;
        let mut updated = Vec::with_capacity(assignments.len());
        for (name, value) in assignments {
            let mut control = current
                .iter()
                .find(|c| c.name == *name)
                .cloned()
                .ok_or_else(|| SettingsError::UnknownControl(name.clone()))?;
            control.set_value(value.clone())?;
            updated.push(control);
        }
        self.apply_descriptors(&updated)?;
        Ok(updated)
    }

    /// Put every control back to its driver default
    fn reset_to_defaults(&self) -> Result<(), SettingsError> {
        let mut controls = self.list()?;
        for control in &mut controls {
            control.reset();
        }
        info!(device = self.device(), count = controls.len(), "Resetting controls to defaults");
        self.apply_descriptors(&controls)
    }
}

/// `v4l2-ctl` binding for one device
#[derive(Debug, Clone)]
pub struct V4l2CtlControls<R> {
    device: String,
    runner: R,
}

impl<R: CommandRunner> V4l2CtlControls<R> {
    pub fn new(device: &str, runner: R) -> Self {
        Self {
            device: device.to_string(),
            runner,
        }
    }

    fn run(&self, extra: &[&str]) -> Result<String, SettingsError> {
        let mut args = vec!["-d".to_string(), self.device.clone()];
        args.extend(extra.iter().map(|s| s.to_string()));
        self.runner.run(&args)
    }
}

impl<R: CommandRunner> DeviceControl for V4l2CtlControls<R> {
    fn device(&self) -> &str {
        &self.device
    }

    fn list(&self) -> Result<Vec<ControlDescriptor>, SettingsError> {
        let listing = self.run(&["-L"])?;
        let controls = parse_controls(&listing)?;
        debug!(device = %self.device, count = controls.len(), "Listed device controls");
        Ok(controls)
    }

    fn resolutions(&self) -> Result<Vec<Resolution>, SettingsError> {
        let listing = self.run(&["--list-formats-ext"])?;
        let resolutions = parse_resolutions(&listing);
        debug!(device = %self.device, count = resolutions.len(), "Listed device resolutions");
        Ok(resolutions)
    }

    fn apply(&self, settings: &[ControlSetting]) -> Result<(), SettingsError> {
        let mut buckets: BTreeMap<Bucket, Vec<&ControlSetting>> = BTreeMap::new();
        for setting in settings
            .iter()
            .filter(|s| !s.is_inactive() && s.value.is_some())
        {
            buckets.entry(setting.bucket()).or_default().push(setting);
        }

        info!(device = %self.device, count = settings.len(), "Applying device settings");

        for bucket in Bucket::ORDER {
            let Some(batch) = buckets.get(&bucket) else {
                continue;
            };
            let arg = format_settings(batch.iter().copied());
            debug!(device = %self.device, bucket = bucket.label(), settings = %arg, "Setting controls");

            if let Err(e) = self.run(&["--set-ctrl", arg.as_str()]) {
                warn!(
                    device = %self.device,
                    bucket = bucket.label(),
                    error = %e,
                    "Failed to apply settings batch"
                );
                return Err(e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records invocations and replies with canned output
    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<Vec<String>>>,
        listing: String,
        fail_on_set: bool,
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, args: &[String]) -> Result<String, SettingsError> {
            self.calls.lock().unwrap().push(args.to_vec());
            if self.fail_on_set && args.iter().any(|a| a == "--set-ctrl") {
                return Err(SettingsError::Device("Permission denied".into()));
            }
            Ok(self.listing.clone())
        }
    }

    impl RecordingRunner {
        fn set_args(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.get(2).map(String::as_str) == Some("--set-ctrl"))
                .map(|c| c[3].clone())
                .collect()
        }
    }

    const LISTING: &str = "
User Controls

                     brightness 0x00980900 (int)    : min=-64 max=64 step=1 default=0 value=10
         white_balance_automatic 0x0098090c (bool)   : default=1 value=1
                   power_line_frequency 0x00980918 (menu)   : min=0 max=2 default=1 value=1 (50 Hz)
\t\t\t\t0: Disabled
\t\t\t\t1: 50 Hz
\t\t\t\t2: 60 Hz
      white_balance_temperature 0x0098091a (int)    : min=2800 max=6500 step=1 default=4600 value=4600 flags=inactive

Camera Controls

                  auto_exposure 0x009a0901 (menu)   : min=0 max=3 default=3 value=3 (Aperture Priority Mode)
\t\t\t\t1: Manual Mode
\t\t\t\t3: Aperture Priority Mode
              focus_absolute 0x009a090a (int64)  : min=0 max=255 step=5 default=0 value=0
";

    #[test]
    fn test_parse_menu_example() {
        let text = "exposure_auto 0x00980901 (menu) min=0 max=3 default=3 value=1\n\t0: auto\n\t1: manual\n";
        let controls = parse_controls(text).unwrap();
        assert_eq!(controls.len(), 1);

        let c = &controls[0];
        assert_eq!(c.name, "exposure_auto");
        assert_eq!(c.type_name(), "menu");
        assert_eq!(
            c.kind,
            ControlKind::Menu {
                value: 1,
                default: Some(3),
                min: Some(0),
                max: Some(3),
                items: BTreeMap::from([(0, "auto".to_string()), (1, "manual".to_string())]),
            }
        );
    }

    #[test]
    fn test_parse_full_listing() {
        let controls = parse_controls(LISTING).unwrap();
        let names: Vec<&str> = controls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "auto_exposure",
                "brightness",
                "focus_absolute",
                "power_line_frequency",
                "white_balance_automatic",
                "white_balance_temperature",
            ]
        );

        let brightness = &controls[1];
        assert_eq!(
            brightness.kind,
            ControlKind::Int {
                value: 10,
                default: Some(0),
                min: -64,
                max: 64,
                step: 1
            }
        );

        let focus = &controls[2];
        assert_eq!(focus.type_name(), "int64");
        assert_eq!(focus.value(), Some(ControlValue::Int(0)));

        assert!(controls[5].is_inactive());
        assert!(!controls[4].is_inactive());
    }

    #[test]
    fn test_parse_ignores_leading_menu_line() {
        let controls = parse_controls("0: orphan\nsharpness 0x1 (int) : min=0 max=7 value=3").unwrap();
        assert_eq!(controls.len(), 1);
        assert_eq!(controls[0].name, "sharpness");
    }

    #[test]
    fn test_parse_rejects_menu_without_entries() {
        let err = parse_controls("scene (menu) : min=0 max=1 value=0").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn test_parse_rejects_menu_value_outside_items() {
        let err = parse_controls("scene (menu) : value=4\n0: a\n1: b").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn test_field_values_fall_back_to_text() {
        let controls = parse_controls("mask 0x1 (bitmask) : max=0x0000ffff default=0x0 value=0x0").unwrap();
        match &controls[0].kind {
            ControlKind::Other { value, fields, .. } => {
                assert_eq!(value, &Some(ControlValue::Text("0x0".into())));
                assert_eq!(fields.get("max"), Some(&ControlValue::Text("0x0000ffff".into())));
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_parse_resolutions_dedup_sorted() {
        let text = "\tSize: Discrete 1920x1080\n\tSize: Discrete 640x480\n\tSize: Discrete 640x480\n";
        assert_eq!(
            parse_resolutions(text),
            vec![Resolution::new(640, 480), Resolution::new(1920, 1080)]
        );
    }

    #[test]
    fn test_resolution_requires_leading_whitespace() {
        assert!(parse_resolutions("640x480").is_empty());
        assert_eq!(parse_resolutions(" 320x240@30"), vec![Resolution::new(320, 240)]);
    }

    #[test]
    fn test_apply_bucket_order() {
        let runner = RecordingRunner::default();
        let controls = V4l2CtlControls::new("/dev/video0", runner);
        let settings = vec![
            ControlSetting::new("led", Some("bool"), ControlValue::Int(1)),
            ControlSetting::new("zoom", Some("other"), ControlValue::Int(5)),
            ControlSetting::new("exposure_auto", Some("menu"), ControlValue::Int(1)),
            ControlSetting::new("gain", None, ControlValue::Int(3)),
        ];

        controls.apply(&settings).unwrap();

        assert_eq!(
            controls.runner.set_args(),
            vec!["led=1", "exposure_auto=1", "zoom=5,gain=3"]
        );
        let calls = controls.runner.calls.lock().unwrap();
        assert_eq!(calls[0][..2], ["-d".to_string(), "/dev/video0".to_string()]);
    }

    #[test]
    fn test_apply_skips_inactive_and_empty_buckets() {
        let controls = V4l2CtlControls::new("/dev/video0", RecordingRunner::default());
        let mut inactive = ControlSetting::new("white_balance_temperature", Some("int"), ControlValue::Int(4600));
        inactive.flags = Some("inactive".into());

        controls
            .apply(&[inactive, ControlSetting::new("brightness", Some("int"), ControlValue::Int(3))])
            .unwrap();

        assert_eq!(controls.runner.set_args(), vec!["brightness=3"]);
    }

    #[test]
    fn test_apply_skips_settings_without_value() {
        let controls = V4l2CtlControls::new("/dev/video0", RecordingRunner::default());
        let button: ControlSetting =
            serde_json::from_str(r#"{"name":"pan_reset","type":"button"}"#).unwrap();
        assert_eq!(button.value, None);

        controls
            .apply(&[button, ControlSetting::new("zoom", Some("int"), ControlValue::Int(2))])
            .unwrap();

        assert_eq!(controls.runner.set_args(), vec!["zoom=2"]);
    }

    #[test]
    fn test_apply_stops_at_failing_batch() {
        let runner = RecordingRunner {
            fail_on_set: true,
            ..Default::default()
        };
        let controls = V4l2CtlControls::new("/dev/video0", runner);
        let err = controls
            .apply(&[
                ControlSetting::new("led", Some("bool"), ControlValue::Int(1)),
                ControlSetting::new("gain", Some("int"), ControlValue::Int(3)),
            ])
            .unwrap_err();

        assert!(matches!(err, SettingsError::Device(_)));
        assert_eq!(controls.runner.set_args(), vec!["led=1"]);
    }

    #[test]
    fn test_reset_to_defaults() {
        let runner = RecordingRunner {
            listing: LISTING.to_string(),
            ..Default::default()
        };
        let controls = V4l2CtlControls::new("/dev/video2", runner);

        controls.reset_to_defaults().unwrap();

        assert_eq!(
            controls.runner.set_args(),
            vec![
                "white_balance_automatic=1",
                "auto_exposure=3,power_line_frequency=1",
                "brightness=0,focus_absolute=0",
            ]
        );
    }

    #[test]
    fn test_set_value_validation() {
        let mut controls = parse_controls(LISTING).unwrap();
        let brightness = &mut controls[1];

        assert!(brightness.set_value(ControlValue::Int(100)).is_err());
        brightness.set_value(ControlValue::Int(-5)).unwrap();
        assert_eq!(brightness.value(), Some(ControlValue::Int(-5)));

        let menu = &mut controls[0];
        assert!(menu.set_value(ControlValue::Int(2)).is_err());
        menu.set_value(ControlValue::Int(1)).unwrap();
        assert_eq!(menu.to_setting().unwrap().value, Some(ControlValue::Int(1)));
    }

    #[test]
    fn test_stepped_values() {
        let controls = parse_controls(LISTING).unwrap();

        // brightness: 10 within -64..=64, step 1
        assert_eq!(controls[1].stepped(1), Some(ControlValue::Int(11)));
        assert_eq!(controls[1].stepped(-1), Some(ControlValue::Int(9)));

        // focus_absolute is int64, so it has no step
        assert_eq!(controls[2].stepped(1), None);

        // power_line_frequency: menu 0, 1, 2 at 1
        assert_eq!(controls[3].stepped(1), Some(ControlValue::Int(2)));
        assert_eq!(controls[3].stepped(-1), Some(ControlValue::Int(0)));

        // auto_exposure: menu 1, 3 at 3, nothing above
        assert_eq!(controls[0].stepped(1), None);
        assert_eq!(controls[0].stepped(-1), Some(ControlValue::Int(1)));

        // bool flips either way
        assert_eq!(controls[4].stepped(-1), Some(ControlValue::Int(0)));
    }

    #[test]
    fn test_stepped_stops_at_range_end() {
        let mut controls = parse_controls(LISTING).unwrap();
        let brightness = &mut controls[1];
        brightness.set_value(ControlValue::Int(64)).unwrap();
        assert_eq!(brightness.stepped(1), None);
        assert_eq!(brightness.stepped(-1), Some(ControlValue::Int(63)));
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("brightness=12").unwrap(),
            ("brightness".to_string(), ControlValue::Int(12))
        );
        assert_eq!(
            parse_assignment("mode = manual").unwrap(),
            ("mode".to_string(), ControlValue::Text("manual".into()))
        );
        assert!(matches!(parse_assignment("brightness"), Err(SettingsError::Parse(_))));
        assert!(matches!(parse_assignment("=3"), Err(SettingsError::Parse(_))));
        assert!(matches!(parse_assignment("gain="), Err(SettingsError::Parse(_))));
    }

    #[test]
    fn test_set_by_name_validates_before_writing() {
        let runner = RecordingRunner {
            listing: LISTING.to_string(),
            ..Default::default()
        };
        let controls = V4l2CtlControls::new("/dev/video2", runner);

        let err = controls
            .set_by_name(&[
                ("brightness".to_string(), ControlValue::Int(5)),
                ("zoom".to_string(), ControlValue::Int(1)),
            ])
            .unwrap_err();
        assert!(matches!(err, SettingsError::UnknownControl(name) if name == "zoom"));
        assert!(controls.runner.set_args().is_empty());

        let updated = controls
            .set_by_name(&[
                ("brightness".to_string(), ControlValue::Int(5)),
                ("auto_exposure".to_string(), ControlValue::Int(1)),
            ])
            .unwrap();
        assert_eq!(updated.len(), 2);
        assert_eq!(
            controls.runner.set_args(),
            vec!["auto_exposure=1", "brightness=5"]
        );
    }

    #[test]
    fn test_setting_json_shape() {
        let json = r#"{"name":"gain","type":"int","value":4,"min":0,"max":255}"#;
        let setting: ControlSetting = serde_json::from_str(json).unwrap();
        assert_eq!(setting, ControlSetting::new("gain", Some("int"), ControlValue::Int(4)));

        let out = serde_json::to_string(&ControlSetting::new("mode", None, ControlValue::Text("x".into()))).unwrap();
        assert_eq!(out, r#"{"name":"mode","value":"x"}"#);
    }

    #[test]
    fn test_subprocess_spawn_failure() {
        let runner = SubprocessRunner::new("/nonexistent/v4l2-ctl", None);
        let err = runner.run(&["-L".to_string()]).unwrap_err();
        assert!(matches!(err, SettingsError::Spawn { .. }));
    }

    #[test]
    fn test_subprocess_large_output_within_timeout() {
        // More than a pipe buffer's worth of output
        let runner = SubprocessRunner::new("head", Some(Duration::from_secs(3)));
        let args: Vec<String> = ["-c", "200000", "/dev/zero"].map(String::from).to_vec();
        let output = runner.run(&args).unwrap();
        assert_eq!(output.len(), 200_000);
    }

    #[test]
    fn test_subprocess_timeout_kills_child() {
        let runner = SubprocessRunner::new("sleep", Some(Duration::from_millis(200)));
        let err = runner.run(&["5".to_string()]).unwrap_err();
        assert!(matches!(err, SettingsError::Timeout { .. }));
    }
}
