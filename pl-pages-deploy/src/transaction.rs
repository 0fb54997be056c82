//! Layer-1 (format 2) storage network transactions.
//!
//! Used by the gateway fallback, which does not accept data items. The
//! payload is split into chunks whose SHA-256 merkle root (`data_root`) is
//! signed instead of the data itself. Payloads up to one chunk are posted
//! inline with the header; larger ones are posted as a header followed by
//! one `/chunk` request per chunk, each carrying its merkle proof.
//!
//! The signed message is the deep hash of
//! `["2", owner, target, quantity, reward, last_tx, [[name, value]…], data_size, data_root]`.

use serde::Serialize;
use sha2::{Digest, Sha256};

use pl_pages_core::{ObjectId, Tag};

use crate::data_item::{deep_hash, DeepHashChunk};
use crate::error::SignError;
use crate::signer::{b64url, decode_b64url, Signer};

pub const MAX_CHUNK_SIZE: usize = 256 * 1024;
pub const MIN_CHUNK_SIZE: usize = 32 * 1024;

/// A signed transaction and its chunk proofs.
#[derive(Debug, Clone)]
pub struct Transaction {
    header: Header,
    data: Vec<u8>,
    chunks: Vec<Chunk>,
}

#[derive(Debug, Clone, Serialize)]
struct Header {
    format: u8,
    id: String,
    last_tx: String,
    owner: String,
    tags: Vec<WireTag>,
    target: String,
    quantity: String,
    data: String,
    data_size: String,
    data_root: String,
    reward: String,
    signature: String,
}

#[derive(Debug, Clone, Serialize)]
struct WireTag {
    name: String,
    value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Chunk {
    min: usize,
    max: usize,
    proof: Vec<u8>,
}

impl Transaction {
    /// Sign `data` with `tags` against the gateway-supplied `last_tx` anchor
    /// and `reward` (in base units).
    pub fn sign(
        data: &[u8],
        tags: &[Tag],
        last_tx: &str,
        reward: &str,
        signer: &dyn Signer,
    ) -> Result<Self, SignError> {
        let anchor = decode_b64url(last_tx, "last_tx")?;
        let (data_root, chunks) = match merkle(data) {
            Some((root, chunks)) => (root.to_vec(), chunks),
            None => (Vec::new(), Vec::new()),
        };
        let data_size = data.len().to_string();
        let owner = signer.owner();

        let tag_chunks = tags
            .iter()
            .map(|tag| {
                DeepHashChunk::List(vec![
                    DeepHashChunk::Blob(tag.name.as_bytes()),
                    DeepHashChunk::Blob(tag.value.as_bytes()),
                ])
            })
            .collect();
        let message = deep_hash(&DeepHashChunk::List(vec![
            DeepHashChunk::Blob(b"2"),
            DeepHashChunk::Blob(owner),
            DeepHashChunk::Blob(b""),
            DeepHashChunk::Blob(b"0"),
            DeepHashChunk::Blob(reward.as_bytes()),
            DeepHashChunk::Blob(&anchor),
            DeepHashChunk::List(tag_chunks),
            DeepHashChunk::Blob(data_size.as_bytes()),
            DeepHashChunk::Blob(&data_root),
        ]));
        let signature = signer.sign(&message)?;

        let header = Header {
            format: 2,
            id: b64url(&Sha256::digest(&signature)),
            last_tx: last_tx.to_owned(),
            owner: b64url(owner),
            tags: tags
                .iter()
                .map(|tag| WireTag {
                    name: b64url(tag.name.as_bytes()),
                    value: b64url(tag.value.as_bytes()),
                })
                .collect(),
            target: String::new(),
            quantity: "0".to_owned(),
            data: String::new(),
            data_size,
            data_root: b64url(&data_root),
            reward: reward.to_owned(),
            signature: b64url(&signature),
        };
        Ok(Self {
            header,
            data: data.to_vec(),
            chunks,
        })
    }

    pub fn id(&self) -> ObjectId {
        ObjectId(self.header.id.clone())
    }

    /// Whether the data travels inside the header post.
    pub fn inline(&self) -> bool {
        self.data.len() <= MAX_CHUNK_SIZE
    }

    /// JSON body for `POST /tx`.
    pub fn header_json(&self) -> serde_json::Value {
        let mut header = self.header.clone();
        if self.inline() {
            header.data = b64url(&self.data);
        }
        serde_json::to_value(header).unwrap_or_default()
    }

    /// JSON bodies for `POST /chunk`, in offset order. Empty when the data
    /// is posted inline.
    pub fn chunk_bodies(&self) -> Vec<serde_json::Value> {
        if self.inline() {
            return Vec::new();
        }
        self.chunks
            .iter()
            .filter(|chunk| chunk.max > chunk.min)
            .map(|chunk| {
                serde_json::json!({
                    "data_root": self.header.data_root,
                    "data_size": self.header.data_size,
                    "data_path": b64url(&chunk.proof),
                    "offset": (chunk.max - 1).to_string(),
                    "chunk": b64url(&self.data[chunk.min..chunk.max]),
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Merkle tree
// ---------------------------------------------------------------------------

enum Node {
    Leaf {
        id: [u8; 32],
        data_hash: [u8; 32],
        max: usize,
    },
    Branch {
        id: [u8; 32],
        byte_range: usize,
        max: usize,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn id(&self) -> &[u8; 32] {
        match self {
            Node::Leaf { id, .. } | Node::Branch { id, .. } => id,
        }
    }

    fn max(&self) -> usize {
        match self {
            Node::Leaf { max, .. } | Node::Branch { max, .. } => *max,
        }
    }
}

/// Chunk boundaries: full chunks, except that a tail shorter than the
/// minimum is balanced with the chunk before it. The last range may be
/// empty when the length is a multiple of the chunk size; it still takes
/// part in the root.
fn chunk_ranges(len: usize) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut cursor = 0;
    let mut rest = len;
    while rest >= MAX_CHUNK_SIZE {
        let mut size = MAX_CHUNK_SIZE;
        let next = rest - MAX_CHUNK_SIZE;
        if next > 0 && next < MIN_CHUNK_SIZE {
            size = rest.div_ceil(2);
        }
        ranges.push((cursor, cursor + size));
        cursor += size;
        rest -= size;
    }
    ranges.push((cursor, cursor + rest));
    ranges
}

fn merkle(data: &[u8]) -> Option<([u8; 32], Vec<Chunk>)> {
    if data.is_empty() {
        return None;
    }
    let ranges = chunk_ranges(data.len());
    let mut layer: Vec<Node> = ranges
        .iter()
        .map(|&(min, max)| {
            let data_hash = sha256(&[&data[min..max]]);
            Node::Leaf {
                id: sha256(&[&sha256(&[&data_hash]), &sha256(&[&note(max)])]),
                data_hash,
                max,
            }
        })
        .collect();

    while layer.len() > 1 {
        let mut next = Vec::with_capacity(layer.len().div_ceil(2));
        let mut nodes = layer.into_iter();
        while let Some(left) = nodes.next() {
            match nodes.next() {
                Some(right) => next.push(branch(left, right)),
                None => next.push(left),
            }
        }
        layer = next;
    }
    let root = layer.pop()?;

    let mut proofs = Vec::with_capacity(ranges.len());
    collect_proofs(&root, Vec::new(), &mut proofs);
    let chunks = ranges
        .into_iter()
        .zip(proofs)
        .map(|((min, max), proof)| Chunk { min, max, proof })
        .collect();
    Some((*root.id(), chunks))
}

fn branch(left: Node, right: Node) -> Node {
    let byte_range = left.max();
    Node::Branch {
        id: sha256(&[
            &sha256(&[left.id()]),
            &sha256(&[right.id()]),
            &sha256(&[&note(byte_range)]),
        ]),
        byte_range,
        max: right.max(),
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Leaf proofs in left-to-right order: every branch on the way down as
/// `(left id, right id, boundary)`, then `(data hash, leaf end)`.
fn collect_proofs(node: &Node, prefix: Vec<u8>, out: &mut Vec<Vec<u8>>) {
    match node {
        Node::Leaf { data_hash, max, .. } => {
            let mut proof = prefix;
            proof.extend_from_slice(data_hash);
            proof.extend_from_slice(&note(*max));
            out.push(proof);
        }
        Node::Branch {
            byte_range,
            left,
            right,
            ..
        } => {
            let mut proof = prefix;
            proof.extend_from_slice(left.id());
            proof.extend_from_slice(right.id());
            proof.extend_from_slice(&note(*byte_range));
            collect_proofs(left, proof.clone(), out);
            collect_proofs(right, proof, out);
        }
    }
}

/// 32-byte big-endian offset.
fn note(n: usize) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[24..].copy_from_slice(&(n as u64).to_be_bytes());
    out
}

fn sha256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::Ed25519Signer;

    const ANCHOR: &str = "bcutzJJDcVV_z2r10vwUK-luIL-a9j8F8a-Nsq-CCKo";

    #[test]
    fn short_tails_are_balanced_with_the_previous_chunk() {
        assert_eq!(chunk_ranges(10), [(0, 10)]);
        assert_eq!(
            chunk_ranges(MAX_CHUNK_SIZE),
            [(0, MAX_CHUNK_SIZE), (MAX_CHUNK_SIZE, MAX_CHUNK_SIZE)]
        );
        let len = MAX_CHUNK_SIZE + 10;
        let half = len.div_ceil(2);
        assert_eq!(chunk_ranges(len), [(0, half), (half, len)]);
        let len = MAX_CHUNK_SIZE + MIN_CHUNK_SIZE;
        assert_eq!(
            chunk_ranges(len),
            [(0, MAX_CHUNK_SIZE), (MAX_CHUNK_SIZE, len)]
        );
    }

    #[test]
    fn single_chunk_root_hashes_the_leaf() {
        let (root, chunks) = merkle(b"hello").unwrap();
        let data_hash = sha256(&[b"hello"]);
        let expected = sha256(&[&sha256(&[&data_hash]), &sha256(&[&note(5)])]);
        assert_eq!(root, expected);
        assert_eq!(chunks.len(), 1);
        assert_eq!(&chunks[0].proof[..32], &data_hash);
        assert_eq!(&chunks[0].proof[32..], &note(5));
    }

    #[test]
    fn proofs_start_with_the_root_branch() {
        let data = vec![7u8; MAX_CHUNK_SIZE + MIN_CHUNK_SIZE];
        let (root, chunks) = merkle(&data).unwrap();
        assert_eq!(chunks.len(), 2);
        for chunk in &chunks {
            assert_eq!(chunk.proof.len(), 96 + 64);
            let boundary = &chunk.proof[64..96];
            assert_eq!(boundary, &note(MAX_CHUNK_SIZE));
            let left = &chunk.proof[..32];
            let right = &chunk.proof[32..64];
            let id = sha256(&[&sha256(&[left]), &sha256(&[right]), &sha256(&[boundary])]);
            assert_eq!(id, root);
        }
    }

    #[test]
    fn empty_data_has_no_root() {
        let tx = Transaction::sign(b"", &[], ANCHOR, "0", &Ed25519Signer::from_secret([2u8; 32]))
            .unwrap();
        let json = tx.header_json();
        assert_eq!(json["data_root"], "");
        assert_eq!(json["data_size"], "0");
    }

    #[test]
    fn small_payloads_post_inline() {
        let signer = Ed25519Signer::from_secret([2u8; 32]);
        let tags = [Tag::new("Content-Type", "text/html")];
        let tx = Transaction::sign(b"<p>hi</p>", &tags, ANCHOR, "1234", &signer).unwrap();
        let json = tx.header_json();

        assert_eq!(json["format"], 2);
        assert_eq!(json["data"], b64url(b"<p>hi</p>"));
        assert_eq!(json["data_size"], "9");
        assert_eq!(json["reward"], "1234");
        assert_eq!(json["last_tx"], ANCHOR);
        assert_eq!(json["tags"][0]["name"], b64url(b"Content-Type"));
        assert_eq!(json["id"], tx.id().0);
        assert!(tx.chunk_bodies().is_empty());
    }

    #[test]
    fn large_payloads_post_chunks_without_inline_data() {
        let signer = Ed25519Signer::from_secret([2u8; 32]);
        let data = vec![1u8; MAX_CHUNK_SIZE * 2];
        let tx = Transaction::sign(&data, &[], ANCHOR, "1", &signer).unwrap();

        assert_eq!(tx.header_json()["data"], "");
        let bodies = tx.chunk_bodies();
        assert_eq!(bodies.len(), 2, "the empty trailing chunk is not posted");
        assert_eq!(bodies[0]["offset"], (MAX_CHUNK_SIZE - 1).to_string());
        assert_eq!(bodies[1]["offset"], (2 * MAX_CHUNK_SIZE - 1).to_string());
        assert_eq!(bodies[0]["data_root"], tx.header_json()["data_root"]);
    }

    #[test]
    fn anchor_must_be_base64url() {
        let signer = Ed25519Signer::from_secret([2u8; 32]);
        assert!(Transaction::sign(b"x", &[], "not base64!", "1", &signer).is_err());
    }
}
