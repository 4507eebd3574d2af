//! Wire segment format: DATA and ACK records with a one's-complement checksum.
//!
//! Layout (big-endian): `type(1) | seq_or_ack(4) | length(2) | checksum(2) | payload/trailer`.
//! For ACK segments the trailer is an optional SACK bitmap: a count of selectively-acked
//! sequence numbers followed by that many 4-byte entries.

use std::collections::BTreeSet;

const TYPE_DATA: u8 = 0;
const TYPE_ACK: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Data { seq: u32, payload: Vec<u8> },
    Ack { ack: u32, sack: Option<BTreeSet<u32>> },
}

impl Segment {
    pub fn seq_for_log(&self) -> u32 {
        match self {
            Segment::Data { seq, .. } => *seq,
            Segment::Ack { ack, .. } => *ack,
        }
    }

    /// Encodes the segment to its wire form with a valid checksum.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        match self {
            Segment::Data { seq, payload } => {
                body.push(TYPE_DATA);
                body.extend_from_slice(&seq.to_be_bytes());
                body.extend_from_slice(&(payload.len() as u16).to_be_bytes());
                body.extend_from_slice(payload);
            }
            Segment::Ack { ack, sack } => {
                body.push(TYPE_ACK);
                body.extend_from_slice(&ack.to_be_bytes());
                match sack {
                    None => body.extend_from_slice(&0u16.to_be_bytes()),
                    Some(set) => {
                        let trailer_len = (set.len() * 4) as u16;
                        body.extend_from_slice(&trailer_len.to_be_bytes());
                        for seq in set {
                            body.extend_from_slice(&seq.to_be_bytes());
                        }
                    }
                }
            }
        }
        let checksum = internet_checksum(&body);
        let mut out = Vec::with_capacity(body.len() + 2);
        // header is [type, seq/ack(4), length(2)] = first 7 bytes of `body`
        out.extend_from_slice(&body[..7]);
        out.extend_from_slice(&checksum.to_be_bytes());
        out.extend_from_slice(&body[7..]);
        out
    }

    /// Decodes a wire segment, verifying its checksum. Corruption is reported
    /// as `Err(ChecksumMismatch)` — the caller treats this exactly like a loss.
    pub fn decode(bytes: &[u8]) -> Result<Segment, DecodeError> {
        if bytes.len() < 9 {
            return Err(DecodeError::Truncated);
        }
        let ty = bytes[0];
        let seq_or_ack = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        let length = u16::from_be_bytes([bytes[5], bytes[6]]) as usize;
        let checksum = u16::from_be_bytes([bytes[7], bytes[8]]);
        let rest = &bytes[9..];
        if rest.len() < length {
            return Err(DecodeError::Truncated);
        }

        let mut body = Vec::with_capacity(bytes.len() - 2);
        body.extend_from_slice(&bytes[..7]);
        body.extend_from_slice(&rest[..length]);
        if internet_checksum(&body) != checksum {
            return Err(DecodeError::ChecksumMismatch);
        }

        match ty {
            TYPE_DATA => Ok(Segment::Data {
                seq: seq_or_ack,
                payload: rest[..length].to_vec(),
            }),
            TYPE_ACK => {
                let sack = if length == 0 {
                    None
                } else {
                    let mut set = BTreeSet::new();
                    for chunk in rest[..length].chunks(4) {
                        if chunk.len() == 4 {
                            set.insert(u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
                        }
                    }
                    Some(set)
                };
                Ok(Segment::Ack { ack: seq_or_ack, sack })
            }
            _ => Err(DecodeError::UnknownType(ty)),
        }
    }

    /// Flips the checksum field's low bit in an already-encoded segment,
    /// simulating bit-level corruption in transit.
    pub fn corrupt_encoded(bytes: &mut [u8]) {
        if bytes.len() >= 9 {
            bytes[8] ^= 0x01;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("segment checksum mismatch")]
    ChecksumMismatch,
    #[error("segment too short to decode")]
    Truncated,
    #[error("unknown segment type byte {0}")]
    UnknownType(u8),
}

/// Internet-style one's-complement checksum: sum 16-bit words, fold carries, complement.
fn internet_checksum(bytes: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    for chunk in bytes.chunks(2) {
        let word = if chunk.len() == 2 {
            u16::from_be_bytes([chunk[0], chunk[1]])
        } else {
            u16::from_be_bytes([chunk[0], 0])
        };
        sum += word as u32;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

/// Splits a payload into fixed-size (MSS) DATA segments; the last may be short.
pub fn segment_payload(payload: &[u8], mss: usize) -> Vec<Segment> {
    payload
        .chunks(mss.max(1))
        .enumerate()
        .map(|(i, chunk)| Segment::Data {
            seq: i as u32,
            payload: chunk.to_vec(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_data_segment() {
        let seg = Segment::Data { seq: 42, payload: vec![1, 2, 3, 4, 5] };
        let encoded = seg.encode();
        assert_eq!(Segment::decode(&encoded).unwrap(), seg);
    }

    #[test]
    fn round_trips_ack_without_sack() {
        let seg = Segment::Ack { ack: 7, sack: None };
        let encoded = seg.encode();
        assert_eq!(Segment::decode(&encoded).unwrap(), seg);
    }

    #[test]
    fn round_trips_ack_with_sack() {
        let mut set = BTreeSet::new();
        set.insert(3);
        set.insert(9);
        let seg = Segment::Ack { ack: 2, sack: Some(set) };
        let encoded = seg.encode();
        assert_eq!(Segment::decode(&encoded).unwrap(), seg);
    }

    #[test]
    fn detects_corruption() {
        let seg = Segment::Data { seq: 1, payload: vec![9, 9, 9] };
        let mut encoded = seg.encode();
        Segment::corrupt_encoded(&mut encoded);
        assert_eq!(Segment::decode(&encoded), Err(DecodeError::ChecksumMismatch));
    }

    #[test]
    fn empty_payload_segments_short_last_chunk() {
        let payload = vec![0u8; 2500];
        let segs = segment_payload(&payload, 1024);
        assert_eq!(segs.len(), 3);
        match &segs[2] {
            Segment::Data { payload, .. } => assert_eq!(payload.len(), 452),
            _ => panic!("expected data segment"),
        }
    }
}
