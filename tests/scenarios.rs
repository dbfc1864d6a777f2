//! Black-box scenario tests (§8) driving the public API end to end: an
//! `Index` built in memory, a recording `Publisher` double, and
//! `on_write`/`classify` exercised the way an embedding application would.

use std::collections::HashSet;

use diskwatch::classify::{classify, SectorRole};
use diskwatch::config::EngineConfig;
use diskwatch::document::Document;
use diskwatch::error::PublishError;
use diskwatch::ext2;
use diskwatch::inspector::{on_write, InspectOutcome};
use diskwatch::model::{File, Filesystem, Index, Mbr, Partition};
use diskwatch::publish::Publisher;
use diskwatch::stream::Write;

#[derive(Default)]
struct TestPublisher {
    messages: Vec<(String, Document)>,
}

impl Publisher for TestPublisher {
    fn publish(&mut self, topic: &str, payload: Box<[u8]>) -> Result<(), PublishError> {
        let nul = payload.iter().position(|&b| b == 0).unwrap();
        let doc = diskwatch::document::decode_document(&payload[nul + 1..], 0).unwrap();
        self.messages.push((topic.to_string(), doc));
        Ok(())
    }
}

fn config() -> EngineConfig {
    EngineConfig {
        hostname: "host".to_string(),
        vmname: "vm".to_string(),
    }
}

fn file(inode_sector: u64, path: &str, is_dir: bool, sectors: HashSet<u32>) -> File {
    File {
        inode_sector,
        inode_offset_in_sector: 0,
        path: path.to_string(),
        is_dir,
        inode: unsafe { std::mem::zeroed() },
        sectors,
    }
}

fn single_partition_index(first_lba: u32, final_lba: u32, files: Vec<File>) -> Index {
    let mut superblock: ext2::Superblock = unsafe { std::mem::zeroed() };
    superblock.log_block_size = 0;
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
                files,
                superblock,
            },
        }],
    }
}

#[test]
fn s1_pure_mbr_write_has_no_file_events() {
    let mut index = single_partition_index(2048, 10000, vec![]);
    let cfg = config();
    let mut publisher = TestPublisher::default();

    assert_eq!(classify(0, 1, &index), SectorRole::Mbr);

    let w = Write {
        sector_num: 0,
        nb_sectors: 1,
        data: vec![0u8; 512],
    };
    let outcome = on_write(&w, &mut index, &cfg, &mut publisher).unwrap();
    assert_eq!(outcome, InspectOutcome::NoMatch);
    assert!(publisher.messages.is_empty());
}

#[test]
fn s2_superblock_write_is_classified() {
    let index = single_partition_index(2048, 10000, vec![]);
    assert_eq!(classify(2050, 1, &index), SectorRole::Ext2Superblock);
}

#[test]
fn s5_data_overwrite_publishes_exactly_one_event_with_full_topic() {
    let mut sectors = HashSet::new();
    sectors.insert(3000);
    let mut index = single_partition_index(
        2048,
        10000,
        vec![file(99_999, "/etc/hosts", false, sectors)],
    );
    let cfg = config();
    let mut publisher = TestPublisher::default();

    let w = Write {
        sector_num: 3000,
        nb_sectors: 2,
        data: vec![0xABu8; 1024],
    };
    on_write(&w, &mut index, &cfg, &mut publisher).unwrap();

    assert_eq!(publisher.messages.len(), 1);
    let (topic, doc) = &publisher.messages[0];
    assert_eq!(topic, "host:vm:/etc/hosts");
    assert_eq!(doc.get("type").unwrap().as_str().unwrap(), "data");
    assert_eq!(doc.get("data").unwrap().as_binary().unwrap().len(), 1024);
}

#[test]
fn s6_write_outside_any_partition_has_no_publish() {
    let mut index = single_partition_index(2048, 10000, vec![]);
    let cfg = config();
    let mut publisher = TestPublisher::default();

    assert_eq!(classify(1_000_000_000, 1, &index), SectorRole::Unknown);

    let w = Write {
        sector_num: 1_000_000_000,
        nb_sectors: 1,
        data: vec![0u8; 512],
    };
    let outcome = on_write(&w, &mut index, &cfg, &mut publisher).unwrap();
    assert_eq!(outcome, InspectOutcome::NoMatch);
    assert!(publisher.messages.is_empty());
}

#[test]
fn ordering_inode_events_precede_data_event_for_same_write() {
    // A single sector serves as both a file's inode sector and, for a second
    // file, a data sector: both events fire off one write, inode first.
    let mut sectors = HashSet::new();
    sectors.insert(5000);
    let files = vec![
        file(5000, "/etc/passwd", false, HashSet::new()),
        file(99_999, "/var/log/messages", false, sectors),
    ];
    let mut index = single_partition_index(2048, 10000, files);

    // Flip one byte of the inode's mode field within the write's data so the
    // differ has something to report.
    let mut data = vec![0u8; 512];
    data[0..2].copy_from_slice(&0o100755u16.to_le_bytes());

    let cfg = config();
    let mut publisher = TestPublisher::default();
    let w = Write {
        sector_num: 5000,
        nb_sectors: 1,
        data,
    };
    on_write(&w, &mut index, &cfg, &mut publisher).unwrap();

    assert_eq!(publisher.messages.len(), 2);
    assert_eq!(
        publisher.messages[0].1.get("type").unwrap().as_str().unwrap(),
        "inode.i_mode"
    );
    assert_eq!(
        publisher.messages[1].1.get("type").unwrap().as_str().unwrap(),
        "data"
    );
}
