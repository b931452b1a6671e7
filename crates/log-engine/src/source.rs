//! Log sources and their topology
//!
//! File names carry the rotation scheme: a trailing `.<digits>` is the
//! rotation index and the rest is the family (base) name. A family whose
//! name contains `-child.` comes from a child process. Sorting by
//! (parent first, family, rotation) yields each source's `base_order`, the
//! tie-breaker for lines with equal timestamps.

use std::future::Future;
use std::io;
use std::path::Path;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};

use crate::sink::{Warning, WarningKind};

/// One physical input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSource {
    id: usize,
    name: String,
    size: u64,
    family: String,
    rotation: u64,
    child: bool,
    base_order: usize,
}

impl LogSource {
    /// Derives family, rotation index and child flag from `name`.
    pub fn from_name(id: usize, name: impl Into<String>, size: u64) -> Self {
        let name = name.into();
        let (family, rotation) = split_rotation(&name);
        let child = family.contains("-child.");
        Self {
            id,
            family: family.to_owned(),
            rotation,
            child,
            name,
            size,
            base_order: id,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn rotation(&self) -> u64 {
        self.rotation
    }

    pub fn is_child(&self) -> bool {
        self.child
    }

    pub fn base_order(&self) -> usize {
        self.base_order
    }
}

fn split_rotation(name: &str) -> (&str, u64) {
    if let Some((base, suffix)) = name.rsplit_once('.') {
        if !base.is_empty() && !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(rotation) = suffix.parse() {
                return (base, rotation);
            }
        }
    }
    (name, 0)
}

/// What the set of loaded sources looks like
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub parent_families: Vec<String>,
    pub child_families: Vec<String>,
    pub warnings: Vec<Warning>,
}

impl Topology {
    /// Assigns `base_order` to every source and inspects the families.
    pub fn analyze(sources: &mut [LogSource]) -> Self {
        let mut order: Vec<usize> = (0..sources.len()).collect();
        order.sort_by(|&a, &b| {
            let (a, b) = (&sources[a], &sources[b]);
            (a.child, &a.family, a.rotation, a.id).cmp(&(b.child, &b.family, b.rotation, b.id))
        });
        for (position, &index) in order.iter().enumerate() {
            sources[index].base_order = position;
        }

        let mut parent_families: Vec<String> = Vec::new();
        let mut child_families: Vec<String> = Vec::new();
        for &index in &order {
            let source = &sources[index];
            let families = if source.child {
                &mut child_families
            } else {
                &mut parent_families
            };
            if !families.contains(&source.family) {
                families.push(source.family.clone());
            }
        }

        let mut warnings = Vec::new();
        if parent_families.len() > 1 {
            warnings.push(Warning::new(
                WarningKind::MultipleParents,
                format!(
                    "{} parent process logs loaded: {}",
                    parent_families.len(),
                    parent_families.join(", ")
                ),
            ));
        }
        if parent_families.is_empty() && child_families.len() > 1 {
            warnings.push(Warning::new(
                WarningKind::OrphanChildren,
                format!(
                    "{} child process logs loaded without a parent log",
                    child_families.len()
                ),
            ));
        }

        Self {
            parent_families,
            child_families,
            warnings,
        }
    }

    /// Both a parent and a child family are present.
    pub fn suggests_ipc(&self) -> bool {
        !self.parent_families.is_empty() && !self.child_families.is_empty()
    }
}

/// Random-access byte source
pub trait ByteSource {
    /// Reads up to `len` bytes at `offset`. Fewer bytes means end of data.
    fn read_at(&mut self, offset: u64, len: usize) -> impl Future<Output = io::Result<Bytes>> + Send;
}

/// File on disk
#[derive(Debug)]
pub struct FileSource {
    file: tokio::fs::File,
    len: u64,
}

impl FileSource {
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        Ok(Self { file, len })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl ByteSource for FileSource {
    async fn read_at(&mut self, offset: u64, len: usize) -> io::Result<Bytes> {
        self.file.seek(SeekFrom::Start(offset)).await?;
        let mut buf = BytesMut::zeroed(len);
        let mut filled = 0;
        while filled < len {
            let n = self.file.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        Ok(buf.freeze())
    }
}

/// In-memory bytes
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
}

impl MemorySource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl ByteSource for MemorySource {
    async fn read_at(&mut self, offset: u64, len: usize) -> io::Result<Bytes> {
        let start = usize::try_from(offset)
            .unwrap_or(usize::MAX)
            .min(self.data.len());
        let end = start.saturating_add(len).min(self.data.len());
        Ok(self.data.slice(start..end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_suffix() {
        let s = LogSource::from_name(0, "log.txt-main.1234.moz_log.3", 10);
        assert_eq!(s.family(), "log.txt-main.1234.moz_log");
        assert_eq!(s.rotation(), 3);
        assert!(!s.is_child());

        let s = LogSource::from_name(1, "trace-child.200.moz_log", 10);
        assert_eq!(s.family(), "trace-child.200.moz_log");
        assert_eq!(s.rotation(), 0);
        assert!(s.is_child());

        let s = LogSource::from_name(2, "plain", 0);
        assert_eq!((s.family(), s.rotation()), ("plain", 0));
    }

    #[test]
    fn base_order_parent_first_then_rotation() {
        let mut sources = vec![
            LogSource::from_name(0, "app-child.2.log.1", 0),
            LogSource::from_name(1, "app-main.1.log.1", 0),
            LogSource::from_name(2, "app-main.1.log.0", 0),
        ];
        let topology = Topology::analyze(&mut sources);
        assert_eq!(sources[2].base_order(), 0);
        assert_eq!(sources[1].base_order(), 1);
        assert_eq!(sources[0].base_order(), 2);
        assert!(topology.suggests_ipc());
        assert!(topology.warnings.is_empty());
    }

    #[test]
    fn multiple_parents_warn() {
        let mut sources = vec![
            LogSource::from_name(0, "a-main.1.log", 0),
            LogSource::from_name(1, "b-main.2.log", 0),
        ];
        let topology = Topology::analyze(&mut sources);
        assert_eq!(topology.warnings.len(), 1);
        assert_eq!(topology.warnings[0].kind, WarningKind::MultipleParents);
        assert!(!topology.suggests_ipc());
    }

    #[test]
    fn orphan_children_warn() {
        let mut sources = vec![
            LogSource::from_name(0, "a-child.1.log", 0),
            LogSource::from_name(1, "a-child.2.log", 0),
        ];
        let topology = Topology::analyze(&mut sources);
        assert_eq!(topology.warnings.len(), 1);
        assert_eq!(topology.warnings[0].kind, WarningKind::OrphanChildren);
    }

    #[tokio::test]
    async fn memory_source_reads_ranges() {
        let mut src = MemorySource::new(&b"hello world"[..]);
        assert_eq!(&src.read_at(6, 100).await.unwrap()[..], b"world");
        assert!(src.read_at(50, 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_source_reads_ranges() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.log");
        std::fs::write(&path, b"0123456789").unwrap();
        let mut src = FileSource::open(&path).await.unwrap();
        assert_eq!(src.len(), 10);
        assert_eq!(&src.read_at(2, 3).await.unwrap()[..], b"234");
        assert_eq!(&src.read_at(8, 10).await.unwrap()[..], b"89");
    }
}
