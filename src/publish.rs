//! Event encoder and publisher adapter (C7).
//!
//! `Publisher` is the engine's sole abstraction over the external publish
//! transport — it never depends on a concrete broker, only on this trait.

use crate::document::{Document, Value};
use crate::error::PublishError;

/// Sink for `(topic, payload)` pairs. Implemented by whatever message bus
/// (or test double) the embedding application wires up.
pub trait Publisher {
    /// Publishes one message. `payload` is moved in; the transport owns its
    /// release and the engine never retains or shares it afterward.
    fn publish(&mut self, topic: &str, payload: Box<[u8]>) -> Result<(), PublishError>;
}

/// The per-file addressing context a topic is built from.
pub struct FileCtx<'a> {
    pub hostname: &'a str,
    pub vmname: &'a str,
    pub path: &'a str,
}

/// Builds the `hostname:vmname:path` topic string.
pub fn topic(ctx: &FileCtx) -> String {
    format!("{}:{}:{}", ctx.hostname, ctx.vmname, ctx.path)
}

/// Encodes `doc` and hands `topic\0 || document` to `publisher`.
pub fn publish_document(
    publisher: &mut dyn Publisher,
    ctx: &FileCtx,
    doc: &Document,
) -> Result<(), PublishError> {
    let topic_str = topic(ctx);
    let mut payload = Vec::with_capacity(topic_str.len() + 1 + 64);
    payload.extend_from_slice(topic_str.as_bytes());
    payload.push(0);
    payload.extend_from_slice(&doc.encode());

    publisher.publish(&topic_str, payload.into_boxed_slice())
}

/// Builds and publishes a `data` overwrite event (§4.6).
///
/// `start_byte`/`end_byte` are always `0`: the wire format carries these
/// fields but no producer ever computed real byte offsets for them (see the
/// design ledger's Open Question decision); this preserves that literally
/// rather than inventing semantics.
pub fn publish_data_event(
    publisher: &mut dyn Publisher,
    ctx: &FileCtx,
    data: &[u8],
) -> Result<(), PublishError> {
    let doc = Document::new(vec![
        ("type".to_string(), Value::Str("data".to_string())),
        ("start_byte".to_string(), Value::Int64(0)),
        ("end_byte".to_string(), Value::Int64(0)),
        ("data".to_string(), Value::Binary(data.to_vec())),
    ]);
    publish_document(publisher, ctx, &doc)
}

#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingPublisher {
    pub messages: Vec<(String, Document)>,
    fail_all: bool,
}

#[cfg(test)]
impl RecordingPublisher {
    pub fn failing() -> Self {
        Self {
            messages: Vec::new(),
            fail_all: true,
        }
    }
}

#[cfg(test)]
impl Publisher for RecordingPublisher {
    fn publish(&mut self, topic: &str, payload: Box<[u8]>) -> Result<(), PublishError> {
        let nul = payload
            .iter()
            .position(|&b| b == 0)
            .expect("payload must contain a topic terminator");
        let doc_bytes = &payload[nul + 1..];
        let doc = crate::document::decode_document(doc_bytes, 0).unwrap();
        self.messages.push((topic.to_string(), doc));
        if self.fail_all {
            Err(PublishError::Fatal("test failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn topic_format_has_single_terminator_boundary() {
        let ctx = FileCtx {
            hostname: "host",
            vmname: "vm",
            path: "/etc/hosts",
        };
        let mut publisher = RecordingPublisher::default();
        let doc = Document::new(vec![("type".to_string(), Value::Str("data".to_string()))]);
        publish_document(&mut publisher, &ctx, &doc).unwrap();
        assert_eq!(publisher.messages[0].0, "host:vm:/etc/hosts");
    }
}
