//! Raw on-disk `ext2` structures.
//!
//! Layouts are `repr(C, packed)` and read by reinterpreting a byte slice,
//! the same approach `mkfs`'s `Superblock`/`BlockGroupDescriptor`/`INode`
//! use against a live device; here they are reinterpreted against bytes
//! pulled out of a catalog document or a write's data buffer instead.

use std::mem::size_of;

/// The ext2 signature, stored in [`Superblock::signature`].
pub const EXT2_SIGNATURE: u16 = 0xef53;

/// The ext2 superblock, as stored on disk (and, verbatim, as the `superblock`
/// binary field of the catalog's filesystem document).
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct Superblock {
    pub total_inodes: u32,
    pub total_blocks: u32,
    pub superuser_blocks: u32,
    pub total_unallocated_blocks: u32,
    pub total_unallocated_inodes: u32,
    /// Block number of the block containing the superblock.
    pub first_data_block: u32,
    /// log2(block_size) - 10
    pub log_block_size: u32,
    /// log2(fragment_size) - 10
    pub log_fragment_size: u32,
    pub blocks_per_group: u32,
    pub fragments_per_group: u32,
    pub inodes_per_group: u32,
    pub last_mount_timestamp: u32,
    pub last_write_timestamp: u32,
    pub mount_count_since_fsck: u16,
    pub mount_count_before_fsck: u16,
    pub signature: u16,
    pub fs_state: u16,
    pub error_action: u16,
    pub minor_version: u16,
    pub last_fsck_timestamp: u32,
    pub fsck_interval: u32,
    pub os_id: u32,
    pub major_version: u32,
    pub uid_reserved: u16,
    pub gid_reserved: u16,

    // Extended superblock fields.
    pub first_non_reserved_inode: u32,
    pub inode_size: u16,
    pub superblock_group: u16,
    pub optional_features: u32,
    pub required_features: u32,
    pub write_required_features: u32,
    pub filesystem_id: [u8; 16],
    pub volume_name: [u8; 16],
    pub last_mount_path: [u8; 64],
    pub compression_algorithms: u32,
    pub files_preallocate_count: u8,
    pub directories_preallocate_count: u8,
    _unused: u16,
    pub journal_id: [u8; 16],
    pub journal_inode: u32,
    pub journal_device: u32,
    pub orphan_inode_head: u32,

    _padding: [u8; 788],
}

impl Superblock {
    /// Size of the raw on-disk structure; the catalog's `superblock` binary
    /// field must carry exactly this many bytes.
    pub const SIZE: usize = size_of::<Self>();

    /// Reinterprets a byte slice of exactly [`Superblock::SIZE`] bytes.
    ///
    /// Returns `None` if `bytes` is the wrong length.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::SIZE {
            return None;
        }
        let mut sb = std::mem::MaybeUninit::<Self>::uninit();
        // SAFETY: `bytes` has exactly `size_of::<Self>()` bytes and `Self`
        // is `repr(C, packed)` with no padding-sensitive invariants.
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                sb.as_mut_ptr() as *mut u8,
                Self::SIZE,
            );
            sb.assume_init()
        }
        .into()
    }

    /// The filesystem's block size in bytes (`1024 << log_block_size`).
    pub fn block_size(&self) -> u32 {
        1024u32 << self.log_block_size
    }

    /// The size of a single on-disk inode, in bytes.
    pub fn inode_size(&self) -> usize {
        if self.major_version >= 1 {
            self.inode_size as usize
        } else {
            128
        }
    }
}

/// A single block group descriptor, as stored in the Block Group Descriptor
/// Table (and, verbatim, as the `bgd` binary field of the catalog).
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct BlockGroupDescriptor {
    pub block_usage_bitmap_addr: u32,
    pub inode_usage_bitmap_addr: u32,
    pub inode_table_start_addr: u32,
    pub unallocated_blocks_number: u16,
    pub unallocated_inodes_number: u16,
    pub directories_number: u16,
    _padding: [u8; 14],
}

impl BlockGroupDescriptor {
    pub const SIZE: usize = size_of::<Self>();

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::SIZE {
            return None;
        }
        let mut bgd = std::mem::MaybeUninit::<Self>::uninit();
        // SAFETY: see `Superblock::from_bytes`.
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                bgd.as_mut_ptr() as *mut u8,
                Self::SIZE,
            );
            bgd.assume_init()
        }
        .into()
    }
}

/// The 128-byte on-disk ext2 inode.
#[repr(C, packed)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Inode {
    pub i_mode: u16,
    pub i_uid: u16,
    pub i_size: u32,
    pub i_atime: u32,
    pub i_ctime: u32,
    pub i_mtime: u32,
    pub i_dtime: u32,
    pub i_gid: u16,
    pub i_links_count: u16,
    pub i_blocks: u32,
    pub i_flags: u32,
    pub i_osd1: u32,
    pub i_block: [u32; 15],
    pub i_generation: u32,
    pub i_file_acl: u32,
    pub i_dir_acl: u32,
    pub i_faddr: u32,
    pub i_osd2: [u8; 12],
}

impl Inode {
    pub const SIZE: usize = size_of::<Self>();

    /// Reinterprets a byte slice of exactly [`Inode::SIZE`] bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::SIZE {
            return None;
        }
        let mut inode = std::mem::MaybeUninit::<Self>::uninit();
        // SAFETY: see `Superblock::from_bytes`.
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                inode.as_mut_ptr() as *mut u8,
                Self::SIZE,
            );
            inode.assume_init()
        }
        .into()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn superblock_size_is_1024() {
        assert_eq!(Superblock::SIZE, 1024);
    }

    #[test]
    fn bgd_size_is_32() {
        assert_eq!(BlockGroupDescriptor::SIZE, 32);
    }

    #[test]
    fn inode_size_is_128() {
        assert_eq!(Inode::SIZE, 128);
    }

    #[test]
    fn inode_from_bytes_roundtrips_fields() {
        let mut bytes = [0u8; Inode::SIZE];
        bytes[0..2].copy_from_slice(&0o100644u16.to_le_bytes());
        bytes[4..8].copy_from_slice(&42u32.to_le_bytes());
        let inode = Inode::from_bytes(&bytes).unwrap();
        assert_eq!({ inode.i_mode }, 0o100644);
        assert_eq!({ inode.i_size }, 42);
    }

    #[test]
    fn inode_from_bytes_rejects_wrong_length() {
        assert!(Inode::from_bytes(&[0u8; 10]).is_none());
    }
}
