//! Table-driven inode differ (C5).
//!
//! The original inspector open-coded the same serialize-and-publish
//! sequence once per inode field (§9, Repeated boilerplate). Here a single
//! ordered table of field descriptors drives one loop that compares,
//! encodes, and publishes every field — scalar or array.

use crate::document::{Document, Value};
use crate::error::PublishError;
use crate::ext2::Inode;
use crate::publish::{self, FileCtx, Publisher};

enum FieldKind {
    Scalar(fn(&Inode) -> i64),
    Array {
        extract: fn(&Inode, usize) -> i64,
        len: usize,
    },
}

struct FieldSpec {
    name: &'static str,
    kind: FieldKind,
}

fn f_mode(i: &Inode) -> i64 {
    i.i_mode as i64
}
fn f_uid(i: &Inode) -> i64 {
    i.i_uid as i64
}
fn f_size(i: &Inode) -> i64 {
    i.i_size as i64
}
fn f_atime(i: &Inode) -> i64 {
    i.i_atime as i64
}
fn f_ctime(i: &Inode) -> i64 {
    i.i_ctime as i64
}
fn f_mtime(i: &Inode) -> i64 {
    i.i_mtime as i64
}
fn f_dtime(i: &Inode) -> i64 {
    i.i_dtime as i64
}
fn f_gid(i: &Inode) -> i64 {
    i.i_gid as i64
}
fn f_links_count(i: &Inode) -> i64 {
    i.i_links_count as i64
}
fn f_blocks(i: &Inode) -> i64 {
    i.i_blocks as i64
}
fn f_flags(i: &Inode) -> i64 {
    i.i_flags as i64
}
fn f_osd1(i: &Inode) -> i64 {
    i.i_osd1 as i64
}
fn f_block(i: &Inode, idx: usize) -> i64 {
    i.i_block[idx] as i64
}
fn f_generation(i: &Inode) -> i64 {
    i.i_generation as i64
}
fn f_file_acl(i: &Inode) -> i64 {
    i.i_file_acl as i64
}
fn f_dir_acl(i: &Inode) -> i64 {
    i.i_dir_acl as i64
}
fn f_faddr(i: &Inode) -> i64 {
    i.i_faddr as i64
}
fn f_osd2(i: &Inode, idx: usize) -> i64 {
    i.i_osd2[idx] as i64
}

/// The fixed, ordered field table. Order is contractual: §4.4 requires
/// events from one write to publish in this exact order.
const FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "i_mode",
        kind: FieldKind::Scalar(f_mode),
    },
    FieldSpec {
        name: "i_uid",
        kind: FieldKind::Scalar(f_uid),
    },
    FieldSpec {
        name: "i_size",
        kind: FieldKind::Scalar(f_size),
    },
    FieldSpec {
        name: "i_atime",
        kind: FieldKind::Scalar(f_atime),
    },
    FieldSpec {
        name: "i_ctime",
        kind: FieldKind::Scalar(f_ctime),
    },
    FieldSpec {
        name: "i_mtime",
        kind: FieldKind::Scalar(f_mtime),
    },
    FieldSpec {
        name: "i_dtime",
        kind: FieldKind::Scalar(f_dtime),
    },
    FieldSpec {
        name: "i_gid",
        kind: FieldKind::Scalar(f_gid),
    },
    FieldSpec {
        name: "i_links_count",
        kind: FieldKind::Scalar(f_links_count),
    },
    FieldSpec {
        name: "i_blocks",
        kind: FieldKind::Scalar(f_blocks),
    },
    FieldSpec {
        name: "i_flags",
        kind: FieldKind::Scalar(f_flags),
    },
    FieldSpec {
        name: "i_osd1",
        kind: FieldKind::Scalar(f_osd1),
    },
    FieldSpec {
        name: "i_block",
        kind: FieldKind::Array {
            extract: f_block,
            len: 15,
        },
    },
    FieldSpec {
        name: "i_generation",
        kind: FieldKind::Scalar(f_generation),
    },
    FieldSpec {
        name: "i_file_acl",
        kind: FieldKind::Scalar(f_file_acl),
    },
    FieldSpec {
        name: "i_dir_acl",
        kind: FieldKind::Scalar(f_dir_acl),
    },
    FieldSpec {
        name: "i_faddr",
        kind: FieldKind::Scalar(f_faddr),
    },
    FieldSpec {
        name: "i_osd2",
        kind: FieldKind::Array {
            extract: f_osd2,
            len: 12,
        },
    },
];

/// Compares `old` against `new` field by field, publishing one `inode.<field>`
/// event per changed field (one per changed index for array fields), then
/// unconditionally commits `*old = new`.
///
/// Commit happens even if one or more `publish` calls failed along the way —
/// this mirrors the original inspector and is a recorded, deliberate choice
/// (see the design ledger), not an oversight. The first publish error
/// encountered, if any, is returned after every field has been attempted.
pub fn diff_and_commit(
    old: &mut Inode,
    new: Inode,
    ctx: &FileCtx,
    publisher: &mut dyn Publisher,
) -> Result<(), PublishError> {
    let mut first_err = None;

    for field in FIELDS {
        match field.kind {
            FieldKind::Scalar(extract) => {
                let old_v = extract(old);
                let new_v = extract(&new);
                if old_v != new_v {
                    if let Err(e) = emit_field(publisher, ctx, field.name, None, old_v, new_v) {
                        first_err.get_or_insert(e);
                    }
                }
            }
            FieldKind::Array { extract, len } => {
                for idx in 0..len {
                    let old_v = extract(old, idx);
                    let new_v = extract(&new, idx);
                    if old_v != new_v {
                        if let Err(e) =
                            emit_field(publisher, ctx, field.name, Some(idx as i64), old_v, new_v)
                        {
                            first_err.get_or_insert(e);
                        }
                    }
                }
            }
        }
    }

    *old = new;

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn emit_field(
    publisher: &mut dyn Publisher,
    ctx: &FileCtx,
    field_name: &str,
    index: Option<i64>,
    old_v: i64,
    new_v: i64,
) -> Result<(), PublishError> {
    let mut fields = vec![(
        "type".to_string(),
        Value::Str(format!("inode.{}", field_name)),
    )];
    if let Some(idx) = index {
        fields.push(("index".to_string(), Value::Int64(idx)));
    }
    fields.push(("old".to_string(), Value::Int64(old_v)));
    fields.push(("new".to_string(), Value::Int64(new_v)));

    let doc = Document::new(fields);
    publish::publish_document(publisher, ctx, &doc)
}
