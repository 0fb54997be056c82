//! Signed data items and bundles (ANS-104 binary layout).
//!
//! ```text
//! sig type   u16 LE
//! signature  signature_len bytes
//! owner      owner bytes
//! target     0 | 1 + 32 bytes
//! anchor     0 | 1 + 32 bytes
//! tag count  u64 LE
//! tag bytes  u64 LE
//! tags       Avro array of {name: bytes, value: bytes}
//! data       rest
//! ```
//!
//! The signed message is the deep hash of
//! `["dataitem", "1", sig type, owner, target, anchor, tags, data]` and the
//! item id is the base64url SHA-256 of the signature.

use sha2::{Digest, Sha256, Sha384};

use pl_pages_core::{ObjectId, Tag};

use crate::error::SignError;
use crate::signer::{b64url, decode_b64url, Signer};

/// A signed, serialized data item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataItem {
    raw: Vec<u8>,
    raw_id: [u8; 32],
}

impl DataItem {
    /// Sign `data` with `tags`, an optional `target` and `anchor`.
    pub fn sign(
        data: &[u8],
        tags: &[Tag],
        target: Option<&[u8; 32]>,
        anchor: Option<&[u8; 32]>,
        signer: &dyn Signer,
    ) -> Result<Self, SignError> {
        let sig_type = signer.signature_type();
        let owner = signer.owner();
        let encoded_tags = encode_tags(tags);
        let target_bytes: &[u8] = target.map_or(&[], |t| t.as_slice());
        let anchor_bytes: &[u8] = anchor.map_or(&[], |a| a.as_slice());

        let message = deep_hash(&DeepHashChunk::List(vec![
            DeepHashChunk::Blob(b"dataitem"),
            DeepHashChunk::Blob(b"1"),
            DeepHashChunk::Blob(sig_type.to_string().as_bytes()),
            DeepHashChunk::Blob(owner),
            DeepHashChunk::Blob(target_bytes),
            DeepHashChunk::Blob(anchor_bytes),
            DeepHashChunk::Blob(&encoded_tags),
            DeepHashChunk::Blob(data),
        ]));
        let signature = signer.sign(&message)?;
        if signature.len() != signer.signature_len() {
            return Err(SignError::InvalidKey(format!(
                "signer produced {} bytes, expected {}",
                signature.len(),
                signer.signature_len()
            )));
        }

        let mut raw = Vec::with_capacity(
            2 + signature.len() + owner.len() + 66 + 16 + encoded_tags.len() + data.len(),
        );
        raw.extend_from_slice(&sig_type.to_le_bytes());
        raw.extend_from_slice(&signature);
        raw.extend_from_slice(owner);
        push_optional(&mut raw, target);
        push_optional(&mut raw, anchor);
        raw.extend_from_slice(&(tags.len() as u64).to_le_bytes());
        raw.extend_from_slice(&(encoded_tags.len() as u64).to_le_bytes());
        raw.extend_from_slice(&encoded_tags);
        raw.extend_from_slice(data);

        Ok(Self {
            raw,
            raw_id: Sha256::digest(&signature).into(),
        })
    }

    pub fn id(&self) -> ObjectId {
        ObjectId(b64url(&self.raw_id))
    }

    pub fn raw_id(&self) -> &[u8; 32] {
        &self.raw_id
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.raw
    }
}

fn push_optional(raw: &mut Vec<u8>, value: Option<&[u8; 32]>) {
    match value {
        Some(bytes) => {
            raw.push(1);
            raw.extend_from_slice(bytes);
        }
        None => raw.push(0),
    }
}

/// Decode a base64url process or transaction id into the 32 bytes used
/// as a data item target.
pub fn decode_target(id: &str) -> Result<[u8; 32], SignError> {
    decode_b64url(id, "target")?
        .try_into()
        .map_err(|_| SignError::InvalidKey(format!("target {id} is not 32 bytes")))
}

/// Assemble items into an ANS-104 bundle: a 32-byte LE item count, one
/// (32-byte LE size, 32-byte id) header per item, then the items.
pub fn bundle(items: &[DataItem]) -> Vec<u8> {
    let body: usize = items.iter().map(|i| i.raw.len()).sum();
    let mut out = Vec::with_capacity(32 + 64 * items.len() + body);
    out.extend_from_slice(&le_u256(items.len() as u64));
    for item in items {
        out.extend_from_slice(&le_u256(item.raw.len() as u64));
        out.extend_from_slice(&item.raw_id);
    }
    for item in items {
        out.extend_from_slice(&item.raw);
    }
    out
}

fn le_u256(n: u64) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[..8].copy_from_slice(&n.to_le_bytes());
    out
}

// ---------------------------------------------------------------------------
// Avro tag encoding
// ---------------------------------------------------------------------------

/// Avro-encode tags as an array of `{name: bytes, value: bytes}` records.
/// No tags encode to zero bytes.
pub fn encode_tags(tags: &[Tag]) -> Vec<u8> {
    let mut out = Vec::new();
    if tags.is_empty() {
        return out;
    }
    write_long(&mut out, tags.len() as i64);
    for tag in tags {
        write_bytes(&mut out, tag.name.as_bytes());
        write_bytes(&mut out, tag.value.as_bytes());
    }
    write_long(&mut out, 0);
    out
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_long(out, bytes.len() as i64);
    out.extend_from_slice(bytes);
}

fn write_long(out: &mut Vec<u8>, n: i64) {
    let mut z = ((n << 1) ^ (n >> 63)) as u64;
    loop {
        let byte = (z & 0x7f) as u8;
        z >>= 7;
        if z == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

// ---------------------------------------------------------------------------
// Deep hash
// ---------------------------------------------------------------------------

pub(crate) enum DeepHashChunk<'a> {
    Blob(&'a [u8]),
    List(Vec<DeepHashChunk<'a>>),
}

pub(crate) fn deep_hash(chunk: &DeepHashChunk<'_>) -> [u8; 48] {
    match chunk {
        DeepHashChunk::Blob(data) => {
            let tag = sha384(&[format!("blob{}", data.len()).as_bytes()]);
            sha384(&[tag.as_slice(), sha384(&[*data]).as_slice()])
        }
        DeepHashChunk::List(items) => {
            let mut acc = sha384(&[format!("list{}", items.len()).as_bytes()]);
            for item in items {
                acc = sha384(&[acc.as_slice(), deep_hash(item).as_slice()]);
            }
            acc
        }
    }
}

fn sha384(parts: &[&[u8]]) -> [u8; 48] {
    let mut hasher = Sha384::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 48];
    out.copy_from_slice(&hasher.finalize());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::Ed25519Signer;
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    fn signer() -> Ed25519Signer {
        Ed25519Signer::from_secret([5u8; 32])
    }

    #[test]
    fn deep_hash_matches_known_vectors() {
        assert_eq!(
            hex::encode(deep_hash(&DeepHashChunk::Blob(b""))),
            "fbf00cc444f5fea9dc3bedf62a13fba8ae87e7445fc910567a23bec4eb82fadb1143c433069314d8362983dc3c2e4a38"
        );
        let list = DeepHashChunk::List(vec![
            DeepHashChunk::Blob(b"dataitem"),
            DeepHashChunk::Blob(b"1"),
            DeepHashChunk::Blob(b"2"),
        ]);
        assert_eq!(
            hex::encode(deep_hash(&list)),
            "a0e030e00b9e9842d8fdf88eabbfb8f6d17a89b366b313f59a30231af981763b8e330f49985a2677a73bf5cb82f76141"
        );
    }

    #[test]
    fn tags_use_avro_zigzag_encoding() {
        let encoded = encode_tags(&[Tag::new("Content-Type", "text/html")]);
        assert_eq!(
            hex::encode(encoded),
            "0218436f6e74656e742d5479706512746578742f68746d6c00"
        );
        assert!(encode_tags(&[]).is_empty());
    }

    #[test]
    fn layout_places_fields_at_fixed_offsets() {
        let s = signer();
        let tags = [Tag::new("App-Name", "Dragon-Deploy")];
        let item = DataItem::sign(b"hello", &tags, None, None, &s).unwrap();
        let raw = item.as_bytes();

        assert_eq!(&raw[..2], &2u16.to_le_bytes());
        assert_eq!(&raw[66..98], s.owner());
        assert_eq!(raw[98], 0, "no target");
        assert_eq!(raw[99], 0, "no anchor");
        assert_eq!(&raw[100..108], &1u64.to_le_bytes());
        let tag_len = encode_tags(&tags).len();
        assert_eq!(&raw[108..116], &(tag_len as u64).to_le_bytes());
        assert_eq!(&raw[116 + tag_len..], b"hello");
    }

    #[test]
    fn signature_covers_deep_hash_and_id_derives_from_it() {
        let s = signer();
        let target = [9u8; 32];
        let item = DataItem::sign(b"data", &[], Some(&target), None, &s).unwrap();
        let raw = item.as_bytes();
        assert_eq!(raw[98], 1);
        assert_eq!(&raw[99..131], &target);

        let message = deep_hash(&DeepHashChunk::List(vec![
            DeepHashChunk::Blob(b"dataitem"),
            DeepHashChunk::Blob(b"1"),
            DeepHashChunk::Blob(b"2"),
            DeepHashChunk::Blob(s.owner()),
            DeepHashChunk::Blob(&target),
            DeepHashChunk::Blob(b""),
            DeepHashChunk::Blob(b""),
            DeepHashChunk::Blob(b"data"),
        ]));
        let signature = &raw[2..66];
        let owner: [u8; 32] = s.owner().try_into().unwrap();
        VerifyingKey::from_bytes(&owner)
            .unwrap()
            .verify(&message, &Signature::from_slice(signature).unwrap())
            .unwrap();

        let expected: [u8; 32] = Sha256::digest(signature).into();
        assert_eq!(item.raw_id(), &expected);
        assert_eq!(item.id().0, b64url(&expected));
    }

    #[test]
    fn bundle_headers_list_sizes_and_ids() {
        let s = signer();
        let a = DataItem::sign(b"a", &[], None, None, &s).unwrap();
        let b = DataItem::sign(b"bb", &[], None, None, &s).unwrap();
        let out = bundle(&[a.clone(), b.clone()]);

        assert_eq!(&out[..8], &2u64.to_le_bytes());
        assert!(out[8..32].iter().all(|&x| x == 0));
        assert_eq!(&out[32..40], &(a.as_bytes().len() as u64).to_le_bytes());
        assert_eq!(&out[64..96], a.raw_id());
        assert_eq!(&out[128..160], b.raw_id());
        assert_eq!(&out[160..160 + a.as_bytes().len()], a.as_bytes());
        assert!(out.ends_with(b.as_bytes()));
    }

    #[test]
    fn target_must_decode_to_32_bytes() {
        assert!(decode_target("bcutzJJDcVV_z2r10vwUK-luIL-a9j8F8a-Nsq-CCKo").is_ok());
        assert!(decode_target("short").is_err());
    }
}
