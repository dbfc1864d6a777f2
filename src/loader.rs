//! Deserializes the catalog document stream into an [`Index`] (C3).
//!
//! Documents arrive in one fixed order (§4.2): an MBR document, then per
//! active partition a partition document, a filesystem document, its block
//! group descriptors, and its files. Any schema violation aborts the whole
//! load — a half-built `Index` is never handed back to the caller.

use std::collections::HashSet;
use std::io::Read;

use crate::document::{self, Document, Value};
use crate::error::EngineError;
use crate::ext2;
use crate::model::{BlockGroup, File, Filesystem, Index, Mbr, Partition, SectorRange};

pub fn load<R: Read>(r: &mut R) -> Result<Index, EngineError> {
    let mbr_doc = next_document(r, "mbr")?;
    let gpt = get_bool(&mbr_doc, "gpt")?;
    let sector = get_i32(&mbr_doc, "sector")? as u64;
    let active_partitions = get_i32(&mbr_doc, "active_partitions")?;
    if active_partitions < 0 {
        return Err(EngineError::corrupt("negative active_partitions", 0));
    }

    let mut partitions = Vec::with_capacity(active_partitions as usize);
    for _ in 0..active_partitions {
        partitions.push(load_partition(r)?);
    }

    Ok(Index {
        mbr: Mbr { sector, gpt },
        partitions,
    })
}

fn load_partition<R: Read>(r: &mut R) -> Result<Partition, EngineError> {
    let part_doc = next_document(r, "partition")?;
    let index = get_i32(&part_doc, "pte_num")?;
    let type_code = get_i32(&part_doc, "partition_type")?;
    let first_lba = get_i32(&part_doc, "first_sector_lba")?;
    let final_lba = get_i32(&part_doc, "final_sector_lba")?;
    let descriptor_sector = get_i32(&part_doc, "sector")? as u64;

    let fs = load_filesystem(r)?;

    Ok(Partition {
        index: index as u8,
        type_code: type_code as u8,
        first_lba: first_lba as u32,
        final_lba: final_lba as u32,
        descriptor_sector,
        fs,
    })
}

fn load_filesystem<R: Read>(r: &mut R) -> Result<Filesystem, EngineError> {
    let fs_doc = next_document(r, "filesystem")?;
    let fs_type = get_i32(&fs_doc, "fs_type")?;
    if fs_type != 0 {
        return Err(EngineError::corrupt(
            format!("unsupported filesystem kind {}", fs_type),
            0,
        ));
    }
    let mount_point = get_str(&fs_doc, "mount_point")?.to_string();
    let num_block_groups = get_i32(&fs_doc, "num_block_groups")?;
    let num_files = get_i32(&fs_doc, "num_files")?;
    let superblock_bytes = get_binary(&fs_doc, "superblock")?;
    let superblock = ext2::Superblock::from_bytes(superblock_bytes).ok_or_else(|| {
        EngineError::corrupt(
            format!(
                "superblock binary is {} bytes, expected {}",
                superblock_bytes.len(),
                ext2::Superblock::SIZE
            ),
            0,
        )
    })?;

    if num_block_groups < 0 || num_files < 0 {
        return Err(EngineError::corrupt(
            "negative num_block_groups/num_files",
            0,
        ));
    }

    let mut block_groups = Vec::with_capacity(num_block_groups as usize);
    for _ in 0..num_block_groups {
        block_groups.push(load_block_group(r)?);
    }

    let mut files = Vec::with_capacity(num_files as usize);
    for _ in 0..num_files {
        files.push(load_file(r)?);
    }

    Ok(Filesystem {
        mount_point,
        block_groups,
        files,
        superblock,
    })
}

fn load_block_group<R: Read>(r: &mut R) -> Result<BlockGroup, EngineError> {
    let doc = next_document(r, "bgd")?;
    let raw_bytes = get_binary(&doc, "bgd")?;
    let raw = ext2::BlockGroupDescriptor::from_bytes(raw_bytes).ok_or_else(|| {
        EngineError::corrupt(
            format!(
                "bgd binary is {} bytes, expected {}",
                raw_bytes.len(),
                ext2::BlockGroupDescriptor::SIZE
            ),
            0,
        )
    })?;
    let descriptor_sector = get_i32(&doc, "sector")? as u64;
    let block_bitmap = SectorRange::new(
        get_i32(&doc, "block_bitmap_sector_start")? as u64,
        get_i32(&doc, "block_bitmap_sector_end")? as u64,
    );
    let inode_bitmap = SectorRange::new(
        get_i32(&doc, "inode_bitmap_sector_start")? as u64,
        get_i32(&doc, "inode_bitmap_sector_end")? as u64,
    );
    let inode_table = SectorRange::new(
        get_i32(&doc, "inode_table_sector_start")? as u64,
        get_i32(&doc, "inode_table_sector_end")? as u64,
    );

    Ok(BlockGroup {
        raw,
        descriptor_sector,
        block_bitmap,
        inode_bitmap,
        inode_table,
    })
}

fn load_file<R: Read>(r: &mut R) -> Result<File, EngineError> {
    let doc = next_document(r, "file")?;
    let inode_sector = get_i64(&doc, "inode_sector")? as u64;
    let inode_offset_in_sector = get_i64(&doc, "inode_offset")? as u64;
    let path = get_str(&doc, "path")?.to_string();
    crate::config::check_path_len(&path)?;
    let is_dir = get_bool(&doc, "is_dir")?;
    let inode_bytes = get_binary(&doc, "inode")?;
    let inode = ext2::Inode::from_bytes(inode_bytes).ok_or_else(|| {
        EngineError::corrupt(
            format!(
                "inode binary is {} bytes, expected {}",
                inode_bytes.len(),
                ext2::Inode::SIZE
            ),
            0,
        )
    })?;

    let sectors_bytes = get_binary(&doc, "sectors")?;
    let sectors_doc = document::decode_document(sectors_bytes, 0)?;
    let mut sectors = HashSet::with_capacity(sectors_doc.len());
    for (_, value) in sectors_doc.iter() {
        let sector = value
            .as_i32()
            .ok_or_else(|| EngineError::corrupt("sectors entry is not int32", 0))?;
        sectors.insert(sector as u32);
    }

    Ok(File {
        inode_sector,
        inode_offset_in_sector,
        path,
        is_dir,
        inode,
        sectors,
    })
}

fn next_document<R: Read>(r: &mut R, what: &str) -> Result<Document, EngineError> {
    document::read_document(r)?
        .ok_or_else(|| EngineError::corrupt(format!("expected {} document, got eof", what), 0))
}

fn get_i32(doc: &Document, key: &str) -> Result<i32, EngineError> {
    doc.get(key)
        .and_then(Value::as_i32)
        .ok_or_else(|| missing(key, "int32"))
}

fn get_i64(doc: &Document, key: &str) -> Result<i64, EngineError> {
    doc.get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| missing(key, "int64"))
}

fn get_str<'a>(doc: &'a Document, key: &str) -> Result<&'a str, EngineError> {
    doc.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| missing(key, "string"))
}

fn get_bool(doc: &Document, key: &str) -> Result<bool, EngineError> {
    doc.get(key)
        .and_then(Value::as_bool)
        .ok_or_else(|| missing(key, "bool"))
}

fn get_binary<'a>(doc: &'a Document, key: &str) -> Result<&'a [u8], EngineError> {
    doc.get(key)
        .and_then(Value::as_binary)
        .ok_or_else(|| missing(key, "binary"))
}

fn missing(key: &str, kind: &str) -> EngineError {
    EngineError::corrupt(format!("missing or mistyped field '{}' ({})", key, kind), 0)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::document::Value;
    use std::io::Cursor;

    fn minimal_stream() -> Vec<u8> {
        let mbr = Document::new(vec![
            ("gpt".to_string(), Value::Bool(false)),
            ("sector".to_string(), Value::Int32(0)),
            ("active_partitions".to_string(), Value::Int32(0)),
        ]);
        mbr.encode()
    }

    #[test]
    fn loads_mbr_only_index() {
        let bytes = minimal_stream();
        let mut r = Cursor::new(bytes);
        let index = load(&mut r).unwrap();
        assert_eq!(index.mbr.sector, 0);
        assert!(!index.mbr.gpt);
        assert!(index.partitions.is_empty());
    }

    #[test]
    fn rejects_truncated_stream() {
        let bytes = vec![0u8; 2];
        let mut r = Cursor::new(bytes);
        assert!(load(&mut r).is_err());
    }
}
