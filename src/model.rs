//! The in-memory catalog (C2): disk → partitions → filesystem → block
//! groups → files, as built once by [`crate::loader`] and then read by the
//! classifier and inspector.

use std::collections::HashSet;

use crate::ext2;

/// An inclusive range of absolute disk sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorRange {
    pub start: u64,
    pub end: u64,
}

impl SectorRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, sector: u64) -> bool {
        sector >= self.start && sector <= self.end
    }
}

/// The MBR record at the head of the disk.
#[derive(Debug, Clone)]
pub struct Mbr {
    /// Sector the MBR itself occupies (conventionally 0).
    pub sector: u64,
    /// Whether the crawler flagged this disk as GPT-partitioned. The engine
    /// does not support GPT; this is carried through only for fidelity with
    /// the catalog schema (see Open Question on GPT).
    pub gpt: bool,
}

/// One block group descriptor of an ext2 filesystem, with its metadata
/// regions resolved to absolute sector ranges.
#[derive(Debug, Clone)]
pub struct BlockGroup {
    pub raw: ext2::BlockGroupDescriptor,
    pub descriptor_sector: u64,
    pub block_bitmap: SectorRange,
    pub inode_bitmap: SectorRange,
    pub inode_table: SectorRange,
}

/// A file (or directory) known to the catalog.
#[derive(Debug, Clone)]
pub struct File {
    pub inode_sector: u64,
    pub inode_offset_in_sector: u64,
    pub path: String,
    pub is_dir: bool,
    pub inode: ext2::Inode,
    /// Absolute disk sectors currently backing this file's data, as observed
    /// by the crawler. Never updated after load (see Open Question on
    /// `sectors` staleness).
    pub sectors: HashSet<u32>,
}

/// An ext2 filesystem occupying one partition.
#[derive(Debug, Clone)]
pub struct Filesystem {
    pub mount_point: String,
    pub block_groups: Vec<BlockGroup>,
    pub files: Vec<File>,
    pub superblock: ext2::Superblock,
}

impl Filesystem {
    pub fn block_size(&self) -> u32 {
        self.superblock.block_size()
    }
}

/// One MBR partition table entry and the filesystem it carries.
#[derive(Debug, Clone)]
pub struct Partition {
    pub index: u8,
    pub type_code: u8,
    pub first_lba: u32,
    pub final_lba: u32,
    pub descriptor_sector: u64,
    pub fs: Filesystem,
}

impl Partition {
    pub fn contains(&self, sector: u64) -> bool {
        sector >= self.first_lba as u64 && sector <= self.final_lba as u64
    }
}

/// The full catalog: MBR plus every partition's filesystem.
#[derive(Debug, Clone)]
pub struct Index {
    pub mbr: Mbr,
    pub partitions: Vec<Partition>,
}

impl Index {
    /// Finds the unique partition whose LBA window contains `sector`.
    /// Partitions are disjoint by invariant, so the first match is the
    /// only match.
    pub fn partition_containing(&self, sector: u64) -> Option<&Partition> {
        self.partitions.iter().find(|p| p.contains(sector))
    }

    pub fn partition_containing_mut(&mut self, sector: u64) -> Option<&mut Partition> {
        self.partitions.iter_mut().find(|p| p.contains(sector))
    }
}
