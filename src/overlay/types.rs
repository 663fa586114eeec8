use bitflags::bitflags;
use std::fmt;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerType {
    Overlay,
    Base,
}

impl LayerType {
    /// Layers in read-precedence order.
    pub const PRECEDENCE: [LayerType; 2] = [LayerType::Overlay, LayerType::Base];

    pub fn name(&self) -> &'static str {
        match self {
            LayerType::Overlay => "overlay",
            LayerType::Base => "base",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// Outcome of resolving a virtual path against both layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedEntry {
    /// The virtual root; never backed by a physical probe.
    Root,
    /// At least one of `overlay` / `base` is `Some`.
    Layered {
        overlay: Option<EntryKind>,
        base: Option<EntryKind>,
    },
}

impl ResolvedEntry {
    /// The layer that answers reads and single-valued metadata queries.
    pub fn winner(&self) -> Option<(LayerType, EntryKind)> {
        match *self {
            ResolvedEntry::Root => None,
            ResolvedEntry::Layered { overlay, base } => overlay
                .map(|kind| (LayerType::Overlay, kind))
                .or_else(|| base.map(|kind| (LayerType::Base, kind))),
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self.winner() {
            Some((_, kind)) => kind,
            None => EntryKind::Directory,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind() == EntryKind::Directory
    }

    pub fn in_layer(&self, layer: LayerType) -> Option<EntryKind> {
        match *self {
            ResolvedEntry::Root => Some(EntryKind::Directory),
            ResolvedEntry::Layered { overlay, base } => match layer {
                LayerType::Overlay => overlay,
                LayerType::Base => base,
            },
        }
    }

    /// Every layer holding the entry, overlay first.
    pub fn present_layers(&self) -> Vec<LayerType> {
        LayerType::PRECEDENCE
            .into_iter()
            .filter(|layer| self.in_layer(*layer).is_some())
            .collect()
    }
}

/// Identity the host bridge uses to correlate open → I/O → close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestContext(pub u64);

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

bitflags! {
    /// File attribute flags, using the on-wire values of the host bridge.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FileAttributes: u32 {
        const READONLY = 0x0000_0001;
        const HIDDEN = 0x0000_0002;
        const SYSTEM = 0x0000_0004;
        const DIRECTORY = 0x0000_0010;
        const ARCHIVE = 0x0000_0020;
        const NORMAL = 0x0000_0080;
    }
}

bitflags! {
    /// Access rights requested by an open.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessMask: u32 {
        const READ_DATA = 0x0000_0001;
        const WRITE_DATA = 0x0000_0002;
        const APPEND_DATA = 0x0000_0004;
        const READ_EXTENDED_ATTRIBUTES = 0x0000_0008;
        const WRITE_EXTENDED_ATTRIBUTES = 0x0000_0010;
        const EXECUTE = 0x0000_0020;
        const READ_ATTRIBUTES = 0x0000_0080;
        const WRITE_ATTRIBUTES = 0x0000_0100;
        const DELETE = 0x0001_0000;
        const READ_PERMISSIONS = 0x0002_0000;
        const CHANGE_PERMISSIONS = 0x0004_0000;
        const SET_OWNERSHIP = 0x0008_0000;
        const SYNCHRONIZE = 0x0010_0000;
        const GENERIC_ALL = 0x1000_0000;
        const GENERIC_EXECUTE = 0x2000_0000;
        const GENERIC_WRITE = 0x4000_0000;
        const GENERIC_READ = 0x8000_0000;

        /// Any right that touches file content.
        const DATA_ACCESS = Self::READ_DATA.bits()
            | Self::WRITE_DATA.bits()
            | Self::APPEND_DATA.bits()
            | Self::EXECUTE.bits()
            | Self::GENERIC_EXECUTE.bits()
            | Self::GENERIC_WRITE.bits()
            | Self::GENERIC_READ.bits()
            | Self::GENERIC_ALL.bits();

        /// Rights that mutate file content.
        const WRITE_INTENT = Self::WRITE_DATA.bits()
            | Self::APPEND_DATA.bits()
            | Self::GENERIC_WRITE.bits()
            | Self::GENERIC_ALL.bits();
    }
}

impl AccessMask {
    pub fn wants_write(&self) -> bool {
        self.intersects(AccessMask::WRITE_INTENT)
    }

    pub fn has_data_access(&self) -> bool {
        self.intersects(AccessMask::DATA_ACCESS)
    }
}

/// How an open treats an existing or missing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenDisposition {
    /// Create; fail if the entry already exists.
    CreateNew,
    /// Create, or overwrite (truncate) an existing entry.
    Create,
    /// Open an existing entry.
    Open,
    /// Open if present, otherwise create.
    OpenOrCreate,
    /// Open an existing entry and truncate it.
    Truncate,
    /// Open an existing entry positioned for append.
    Append,
}

impl OpenDisposition {
    pub fn is_create_family(&self) -> bool {
        matches!(
            self,
            OpenDisposition::CreateNew | OpenDisposition::Create | OpenDisposition::OpenOrCreate
        )
    }
}

/// Parameters of an open/create call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenRequest {
    pub access: AccessMask,
    pub disposition: OpenDisposition,
    /// The caller asked for a directory (create a directory, or open one).
    pub directory: bool,
}

impl OpenRequest {
    pub fn new(access: AccessMask, disposition: OpenDisposition) -> Self {
        OpenRequest {
            access,
            disposition,
            directory: false,
        }
    }

    pub fn directory(mut self) -> Self {
        self.directory = true;
        self
    }
}

/// What an open ended up binding to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenInfo {
    pub is_directory: bool,
    /// `None` for metadata-only handles and the virtual root.
    pub layer: Option<LayerType>,
    pub created: bool,
}

/// Timestamps to apply in a set-times call; `None` leaves a time untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeUpdate {
    /// Accepted for completeness; POSIX layers cannot change birth time.
    pub creation: Option<SystemTime>,
    pub last_access: Option<SystemTime>,
    pub last_write: Option<SystemTime>,
}

impl TimeUpdate {
    /// True when no time the layers can store is set; `creation` is not
    /// counted.
    pub fn is_empty(&self) -> bool {
        self.last_access.is_none() && self.last_write.is_none()
    }

    pub fn to_file_times(self) -> std::fs::FileTimes {
        let mut times = std::fs::FileTimes::new();
        if let Some(accessed) = self.last_access {
            times = times.set_accessed(accessed);
        }
        if let Some(modified) = self.last_write {
            times = times.set_modified(modified);
        }
        times
    }
}

/// Virtual metadata record for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInformation {
    pub file_name: String,
    pub attributes: FileAttributes,
    pub creation_time: SystemTime,
    pub last_access_time: SystemTime,
    pub last_write_time: SystemTime,
    pub length: u64,
}

impl FileInformation {
    pub fn is_directory(&self) -> bool {
        self.attributes.contains(FileAttributes::DIRECTORY)
    }
}
