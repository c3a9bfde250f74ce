//! Loader images and the per-chipset manifest.
//!
//! Each supported chipset has a directory of loader images next to a
//! `manifest.xml` naming the load address of every role:
//!
//! ```text
//! loaders/
//! └── kirin970/
//!     ├── manifest.xml
//!     ├── xloader.img
//!     ├── uce.img        (optional)
//!     └── fastboot.img
//! ```
//!
//! ```xml
//! <manifest>
//!   <image role="xloader"  address="0x00022000"/>
//!   <image role="fastboot" address="0x1AC00000"/>
//! </manifest>
//! ```

use crate::error::{Error, Result};
use log::debug;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use xmltree::{Element, XMLNode};

/// Stage of the boot chain an image belongs to.
///
/// The declaration order is the upload order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    /// First-stage loader.
    Xloader,
    /// Optional intermediate stage, present on some chipsets.
    Uce,
    /// Loader that exposes the command channel.
    Fastboot,
}

impl Role {
    /// All roles in upload order.
    pub const ALL: [Role; 3] = [Role::Xloader, Role::Uce, Role::Fastboot];

    /// Role name as used in the manifest and image file names.
    pub fn name(self) -> &'static str {
        match self {
            Role::Xloader => "xloader",
            Role::Uce => "uce",
            Role::Fastboot => "fastboot",
        }
    }

    /// Look a role up by its manifest name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.name() == name)
    }

    /// Whether a chipset profile must provide this role.
    pub fn is_mandatory(self) -> bool {
        !matches!(self, Role::Uce)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An image ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Boot stage.
    pub role: Role,
    /// Load address on the device.
    pub address: u32,
    /// Raw image bytes.
    pub data: Vec<u8>,
}

impl Image {
    /// Create an image from memory.
    pub fn new(role: Role, address: u32, data: Vec<u8>) -> Self {
        Self {
            role,
            address,
            data,
        }
    }

    /// Read an image from a file.
    pub fn from_file(role: Role, address: u32, path: &Path) -> Result<Self> {
        let data = fs::read(path).map_err(|source| Error::LoaderImage {
            role,
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded {} ({} bytes) from {}", role, data.len(), path.display());
        Ok(Self::new(role, address, data))
    }

    /// Image size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the image is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Role to load address mapping read from a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleTable {
    addresses: BTreeMap<Role, u32>,
}

impl RoleTable {
    /// Parse manifest XML.
    ///
    /// `<image>` children lacking a `role` or `address` attribute are
    /// skipped, as are unknown roles. A later entry for the same role
    /// replaces an earlier one.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let root = Element::parse(xml.as_bytes()).map_err(|e| Error::Manifest(e.to_string()))?;
        let mut table = Self::default();

        for node in &root.children {
            let XMLNode::Element(e) = node else {
                continue;
            };
            if e.name != "image" {
                continue;
            }
            let (Some(role), Some(address)) = (e.attributes.get("role"), e.attributes.get("address"))
            else {
                continue;
            };
            let Some(role) = Role::from_name(role) else {
                debug!("Ignoring unknown role '{role}'");
                continue;
            };
            let address = parse_address(address).ok_or_else(|| {
                Error::Manifest(format!("Invalid address '{address}' for role '{role}'"))
            })?;
            table.addresses.insert(role, address);
        }

        Ok(table)
    }

    /// Read and parse a manifest file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let xml = fs::read_to_string(path)
            .map_err(|e| Error::Manifest(format!("{}: {e}", path.display())))?;
        Self::from_xml(&xml)
    }

    /// Set the address for a role.
    pub fn insert(&mut self, role: Role, address: u32) {
        self.addresses.insert(role, address);
    }

    /// Load address of `role`, if present.
    pub fn get(&self, role: Role) -> Option<u32> {
        self.addresses.get(&role).copied()
    }

    /// Whether `role` has an address.
    pub fn contains(&self, role: Role) -> bool {
        self.addresses.contains_key(&role)
    }

    /// Entries in upload order.
    pub fn iter(&self) -> impl Iterator<Item = (Role, u32)> + '_ {
        self.addresses.iter().map(|(r, a)| (*r, *a))
    }
}

/// Parse an integer literal with an optional `0x`, `0o` or `0b` prefix.
///
/// Underscores may separate digits. Decimal literals other than zero may
/// not have leading zeros.
pub fn parse_address(text: &str) -> Option<u32> {
    let text = text.trim();
    let lower = text.to_ascii_lowercase();
    let (radix, digits) = if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (8, rest)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest)
    } else {
        (10, lower.as_str())
    };

    // A single separator may follow a radix prefix.
    let digits = match radix {
        10 => digits,
        _ => digits.strip_prefix('_').unwrap_or(digits),
    };
    if digits.is_empty() || digits.starts_with('_') || digits.ends_with('_') || digits.contains("__")
    {
        return None;
    }
    let digits: String = digits.chars().filter(|&c| c != '_').collect();
    if radix == 10 && digits.len() > 1 && digits.starts_with('0') && digits.bytes().any(|b| b != b'0')
    {
        return None;
    }
    if !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    u32::from_str_radix(&digits, radix).ok()
}

/// A chipset's loader directory.
#[derive(Debug, Clone)]
pub struct LoaderDir {
    root: PathBuf,
    chipset: String,
}

impl LoaderDir {
    /// Directory `<root>/<chipset>`.
    pub fn new(root: impl Into<PathBuf>, chipset: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            chipset: chipset.into(),
        }
    }

    /// Chipset profile name.
    pub fn chipset(&self) -> &str {
        &self.chipset
    }

    /// Path of the chipset directory.
    pub fn path(&self) -> PathBuf {
        self.root.join(&self.chipset)
    }

    /// Path of `manifest.xml`.
    pub fn manifest_path(&self) -> PathBuf {
        self.path().join("manifest.xml")
    }

    /// Path of the image file for `role`.
    pub fn image_path(&self, role: Role) -> PathBuf {
        self.path().join(format!("{}.img", role.name()))
    }

    /// Read the chipset manifest.
    pub fn load_manifest(&self) -> Result<RoleTable> {
        let path = self.manifest_path();
        if !path.is_file() {
            return Err(Error::Manifest(format!("Manifest not found: {}", path.display())));
        }
        RoleTable::from_file(&path)
    }

    /// Read the image for `role` at `address`.
    pub fn load_image(&self, role: Role, address: u32) -> Result<Image> {
        Image::from_file(role, address, &self.image_path(role))
    }
}

/// Chipset profiles available under `root`, sorted by name.
pub fn list_chipsets(root: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
