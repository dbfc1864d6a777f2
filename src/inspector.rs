//! Deep inspector (C6): dispatch layer tying classification, index lookup,
//! the inode differ, and data-overwrite events together for one write.

use crate::classify;
use crate::config::EngineConfig;
use crate::differ;
use crate::error::{EngineError, InodeDecodeOutOfRange};
use crate::ext2::Inode;
use crate::model::Index;
use crate::publish::{FileCtx, Publisher};
use crate::stream::Write;

/// Outcome of inspecting one write: whether it fell inside a known
/// partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectOutcome {
    NoMatch,
    Partition,
}

/// Runs classification, locates affected inode(s)/data extent(s) for `w`,
/// invokes the differ, and publishes data-overwrite events.
///
/// Fatal publish errors propagate via `EngineError::Publish`; a per-file
/// inode-decode failure is logged and that file is skipped, inspection of
/// the rest of the write continues.
pub fn on_write(
    w: &Write,
    index: &mut Index,
    config: &EngineConfig,
    publisher: &mut dyn Publisher,
) -> Result<InspectOutcome, EngineError> {
    let role = classify::classify(w.sector_num as u64, w.nb_sectors as u32, index);
    log::debug!(
        "write sector={} count={} role={:?}",
        w.sector_num,
        w.nb_sectors,
        role
    );

    let sector_num = w.sector_num as u64;
    let Some(partition) = index.partition_containing_mut(sector_num) else {
        return Ok(InspectOutcome::NoMatch);
    };

    let write_end = sector_num + w.nb_sectors as u64 - 1;

    for file in &mut partition.fs.files {
        if file.inode_sector >= sector_num && file.inode_sector <= write_end {
            let offset =
                (file.inode_sector - sector_num) as usize * 512 + file.inode_offset_in_sector as usize;
            if offset + Inode::SIZE > w.data.len() {
                log::warn!(
                    "inode decode out of range for {}: {}",
                    file.path,
                    InodeDecodeOutOfRange {
                        offset,
                        len: Inode::SIZE,
                        buf_len: w.data.len(),
                    }
                );
            } else {
                let new_inode = Inode::from_bytes(&w.data[offset..offset + Inode::SIZE])
                    .expect("slice length checked above");
                let ctx = FileCtx {
                    hostname: &config.hostname,
                    vmname: &config.vmname,
                    path: &file.path,
                };
                differ::diff_and_commit(&mut file.inode, new_inode, &ctx, publisher)?;
            }
        }

        if file.sectors.contains(&(w.sector_num as u32)) {
            if file.is_dir {
                log::info!("directory modification: {}", file.path);
            } else {
                let ctx = FileCtx {
                    hostname: &config.hostname,
                    vmname: &config.vmname,
                    path: &file.path,
                };
                crate::publish::publish_data_event(publisher, &ctx, &w.data)?;
            }
        }
    }

    // A partition matched above (the early `NoMatch` return already handled
    // the no-partition case), so this write is always `Partition` from here.
    Ok(InspectOutcome::Partition)
}
