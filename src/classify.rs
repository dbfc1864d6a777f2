//! Sector classifier (C4): maps a write's starting sector to a semantic
//! filesystem role.

use crate::model::Index;

/// Stable small-integer sector-role codes (§6), used in logs and carried to
/// downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SectorRole {
    Unknown = 0,
    Mbr = 1,
    Ext2Superblock = 2,
    Ext2Bgd = 3,
    Ext2BlockBitmap = 4,
    Ext2InodeBitmap = 5,
    Ext2Inode = 6,
    Ext2Data = 7,
    Ext2Partition = 8,
}

const SECTOR_SIZE: u64 = 512;

/// Classifies a write's starting sector. Never panics: an empty write or one
/// outside every known partition resolves to [`SectorRole::Unknown`].
pub fn classify(first_sector: u64, count: u32, index: &Index) -> SectorRole {
    if count == 0 {
        return SectorRole::Unknown;
    }

    let s = first_sector;

    if s == index.mbr.sector {
        return SectorRole::Mbr;
    }

    let Some(partition) = index.partition_containing(s) else {
        return SectorRole::Unknown;
    };

    if s == partition.first_lba as u64 + 2 {
        return SectorRole::Ext2Superblock;
    }

    let fs = &partition.fs;
    let sectors_per_block = (fs.block_size() as u64) / SECTOR_SIZE;
    let sectors_per_group = sectors_per_block * fs.superblock.blocks_per_group as u64;
    let group_start_0 =
        partition.first_lba as u64 + fs.superblock.first_data_block as u64 * sectors_per_block;

    for (j, group) in fs.block_groups.iter().enumerate() {
        if s == group.descriptor_sector {
            return SectorRole::Ext2Bgd;
        }
        if group.block_bitmap.contains(s) {
            return SectorRole::Ext2BlockBitmap;
        }
        if group.inode_bitmap.contains(s) {
            return SectorRole::Ext2InodeBitmap;
        }
        if group.inode_table.contains(s) {
            return SectorRole::Ext2Inode;
        }
        let data_start = group_start_0 + j as u64 * sectors_per_group;
        let data_end = group_start_0 + (j as u64 + 1) * sectors_per_group;
        if s >= data_start && s < data_end {
            return SectorRole::Ext2Data;
        }
    }

    SectorRole::Ext2Partition
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ext2;
    use crate::model::{Filesystem, Mbr, Partition};

    fn empty_index_with_partition(first_lba: u32, final_lba: u32) -> Index {
        let mut superblock: ext2::Superblock = unsafe { std::mem::zeroed() };
        superblock.log_block_size = 0; // 1024-byte blocks
        superblock.blocks_per_group = 8192;
        superblock.first_data_block = 1;

        Index {
            mbr: Mbr {
                sector: 0,
                gpt: false,
            },
            partitions: vec![Partition {
                index: 0,
                type_code: 0x83,
                first_lba,
                final_lba,
                descriptor_sector: 0,
                fs: Filesystem {
                    mount_point: "/".to_string(),
                    block_groups: Vec::new(),
                    files: Vec::new(),
                    superblock,
                },
            }],
        }
    }

    #[test]
    fn s1_pure_mbr_write() {
        let index = empty_index_with_partition(2048, 10000);
        assert_eq!(classify(0, 1, &index), SectorRole::Mbr);
    }

    #[test]
    fn s2_superblock_write() {
        let index = empty_index_with_partition(2048, 10000);
        assert_eq!(classify(2050, 1, &index), SectorRole::Ext2Superblock);
    }

    #[test]
    fn s6_outside_any_partition_is_unknown() {
        let index = empty_index_with_partition(2048, 10000);
        assert_eq!(classify(1_000_000_000, 1, &index), SectorRole::Unknown);
    }

    #[test]
    fn zero_count_write_is_unknown() {
        let index = empty_index_with_partition(2048, 10000);
        assert_eq!(classify(2048, 0, &index), SectorRole::Unknown);
    }

    #[test]
    fn unclassified_sector_inside_partition_is_ext2_partition() {
        let index = empty_index_with_partition(2048, 10000);
        assert_eq!(classify(9999, 1, &index), SectorRole::Ext2Partition);
    }
}
