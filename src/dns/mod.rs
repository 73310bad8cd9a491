//! DNS message decoding.
//!
//! Every decoder takes the whole datagram and an offset, and returns the
//! decoded value together with the offset just past it. Reads are bounds
//! checked; a message that runs past the end of the buffer fails as a whole.

pub mod builder;

use std::net::Ipv4Addr;

use crate::error::{MalformedMessage, NotAnARecord};

pub const HEADER_LEN: usize = 12;

/// Resource record type of an IPv4 host address.
pub const TYPE_A: u16 = 1;

/// Class of internet records.
pub const CLASS_IN: u16 = 1;

/// Longest name allowed on the wire, length octets included.
const MAX_NAME_LEN: usize = 255;

const POINTER_BITS: u8 = 0xC0;

/// A 255-octet name holds at most 127 labels, so no honest name needs more
/// pointers than this.
pub const MAX_POINTER_JUMPS: usize = 127;

/// Fixed 12-byte message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub id: u16,
    pub flags: u16,
    pub question_count: u16,
    pub answer_count: u16,
    pub authority_count: u16,
    pub additional_count: u16,
}

impl Header {
    pub fn decode(buf: &[u8], offset: usize) -> Result<(Self, usize), MalformedMessage> {
        let (id, offset) = read_u16(buf, offset)?;
        let (flags, offset) = read_u16(buf, offset)?;
        let (question_count, offset) = read_u16(buf, offset)?;
        let (answer_count, offset) = read_u16(buf, offset)?;
        let (authority_count, offset) = read_u16(buf, offset)?;
        let (additional_count, offset) = read_u16(buf, offset)?;

        let header = Self {
            id,
            flags,
            question_count,
            answer_count,
            authority_count,
            additional_count,
        };
        Ok((header, offset))
    }

    /// QR bit: set on replies.
    pub fn is_response(&self) -> bool {
        self.flags & 0x8000 != 0
    }
}

/// A question section entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: String,
    pub qtype: u16,
    pub qclass: u16,
}

impl Question {
    pub fn decode(buf: &[u8], offset: usize) -> Result<(Self, usize), MalformedMessage> {
        let (name, offset) = decode_name(buf, offset)?;
        let (qtype, offset) = read_u16(buf, offset)?;
        let (qclass, offset) = read_u16(buf, offset)?;

        Ok((
            Self {
                name,
                qtype,
                qclass,
            },
            offset,
        ))
    }
}

/// An answer, authority or additional section entry.
///
/// The payload is kept raw; only A records are ever interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub name: String,
    pub rtype: u16,
    pub class: u16,
    pub ttl: i32,
    pub data: Vec<u8>,
}

impl ResourceRecord {
    pub fn decode(buf: &[u8], offset: usize) -> Result<(Self, usize), MalformedMessage> {
        let (name, offset) = decode_name(buf, offset)?;
        let (rtype, offset) = read_u16(buf, offset)?;
        let (class, offset) = read_u16(buf, offset)?;
        let (ttl, offset) = read_u32(buf, offset)?;
        let (data_len, offset) = read_u16(buf, offset)?;
        let data = take(buf, offset, usize::from(data_len))?.to_vec();

        let record = Self {
            name,
            rtype,
            class,
            ttl: ttl as i32,
            data,
        };
        Ok((record, offset + usize::from(data_len)))
    }

    /// The IPv4 address carried by an A record.
    ///
    /// Any other type, or an A record whose payload is not exactly four
    /// bytes, yields [`NotAnARecord`].
    pub fn ipv4(&self) -> Result<Ipv4Addr, NotAnARecord> {
        match <[u8; 4]>::try_from(self.data.as_slice()) {
            Ok(octets) if self.rtype == TYPE_A => Ok(Ipv4Addr::from(octets)),
            _ => Err(NotAnARecord {
                rtype: self.rtype,
                len: self.data.len(),
            }),
        }
    }
}

/// A fully decoded DNS message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
    pub authorities: Vec<ResourceRecord>,
    pub additionals: Vec<ResourceRecord>,
}

impl Message {
    /// Decode one datagram. Trailing bytes after the last record are ignored.
    pub fn decode(buf: &[u8]) -> Result<Self, MalformedMessage> {
        let (header, offset) = Header::decode(buf, 0)?;
        let (questions, offset) =
            decode_section(buf, offset, header.question_count, Question::decode)?;
        let (answers, offset) =
            decode_section(buf, offset, header.answer_count, ResourceRecord::decode)?;
        let (authorities, offset) =
            decode_section(buf, offset, header.authority_count, ResourceRecord::decode)?;
        let (additionals, _) =
            decode_section(buf, offset, header.additional_count, ResourceRecord::decode)?;

        Ok(Self {
            header,
            questions,
            answers,
            authorities,
            additionals,
        })
    }

    /// Name of the first question, if any.
    pub fn query_name(&self) -> Option<&str> {
        self.questions.first().map(|q| q.name.as_str())
    }
}

fn decode_section<T>(
    buf: &[u8],
    mut offset: usize,
    count: u16,
    decode: fn(&[u8], usize) -> Result<(T, usize), MalformedMessage>,
) -> Result<(Vec<T>, usize), MalformedMessage> {
    // Each entry takes at least 5 bytes, so never trust the count for capacity.
    let capacity = usize::from(count).min(buf.len().saturating_sub(offset) / 5);
    let mut entries = Vec::with_capacity(capacity);

    for _ in 0..count {
        let (entry, next) = decode(buf, offset)?;
        entries.push(entry);
        offset = next;
    }

    Ok((entries, offset))
}

/// Decode a possibly compressed domain name starting at `offset`.
///
/// Returns the dotted, lower-cased name (empty for the root) and the offset
/// just past its local encoding: when the name ends in a compression pointer,
/// that is the byte after the 2-byte pointer, wherever the pointer leads.
///
/// Pointer chains are followed iteratively. Every pointer must lead strictly
/// before the start of the segment it ends, and at most [`MAX_POINTER_JUMPS`]
/// are followed per name, so decoding one name is bounded no matter how the
/// message is built. A pointer breaking either rule is a [`PointerLoop`].
///
/// [`PointerLoop`]: MalformedMessage::PointerLoop
pub fn decode_name(buf: &[u8], offset: usize) -> Result<(String, usize), MalformedMessage> {
    let mut name = String::new();
    let mut wire_len = 1;
    let mut pos = offset;
    let mut resume = None;
    let mut segment_start = offset;
    let mut jumps = 0;

    loop {
        let len = *buf
            .get(pos)
            .ok_or(MalformedMessage::Truncated { offset: pos, needed: 1 })?;

        match len & POINTER_BITS {
            POINTER_BITS => {
                let low = *buf.get(pos + 1).ok_or(MalformedMessage::Truncated {
                    offset: pos + 1,
                    needed: 1,
                })?;
                let target = usize::from(u16::from_be_bytes([len & !POINTER_BITS, low]));
                if target >= buf.len() {
                    return Err(MalformedMessage::PointerOutOfRange {
                        offset: pos,
                        target,
                    });
                }
                jumps += 1;
                if target >= segment_start || jumps > MAX_POINTER_JUMPS {
                    return Err(MalformedMessage::PointerLoop { target });
                }
                resume.get_or_insert(pos + 2);
                segment_start = target;
                pos = target;
            }
            0 if len == 0 => {
                pos += 1;
                break;
            }
            0 => {
                let label_len = usize::from(len);
                let label = take(buf, pos + 1, label_len)?;
                if !label.is_ascii() {
                    return Err(MalformedMessage::NonAsciiLabel { offset: pos });
                }

                wire_len += label_len + 1;
                if wire_len > MAX_NAME_LEN {
                    return Err(MalformedMessage::NameTooLong { offset });
                }

                if !name.is_empty() {
                    name.push('.');
                }
                name.extend(label.iter().map(|b| char::from(b.to_ascii_lowercase())));
                pos += 1 + label_len;
            }
            _ => {
                return Err(MalformedMessage::ReservedLabelType {
                    offset: pos,
                    byte: len,
                });
            }
        }
    }

    Ok((name, resume.unwrap_or(pos)))
}

fn take(buf: &[u8], offset: usize, len: usize) -> Result<&[u8], MalformedMessage> {
    offset
        .checked_add(len)
        .and_then(|end| buf.get(offset..end))
        .ok_or(MalformedMessage::Truncated {
            offset,
            needed: len,
        })
}

fn read_u16(buf: &[u8], offset: usize) -> Result<(u16, usize), MalformedMessage> {
    let bytes = take(buf, offset, 2)?;
    Ok((u16::from_be_bytes([bytes[0], bytes[1]]), offset + 2))
}

fn read_u32(buf: &[u8], offset: usize) -> Result<(u32, usize), MalformedMessage> {
    let bytes = take(buf, offset, 4)?;
    Ok((
        u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        offset + 4,
    ))
}
