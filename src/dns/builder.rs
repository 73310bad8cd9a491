//! DNS message construction.
//!
//! The relay never rewrites messages; this encoder exists to produce wire
//! data for tests and benchmarks.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use super::{CLASS_IN, TYPE_A};

#[derive(Debug, Clone)]
struct Record {
    name: String,
    rtype: u16,
    ttl: i32,
    data: Vec<u8>,
}

/// Builder for DNS messages in wire format.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    id: u16,
    flags: u16,
    compress: bool,
    questions: Vec<(String, u16)>,
    answers: Vec<Record>,
    authorities: Vec<Record>,
    additionals: Vec<Record>,
}

impl MessageBuilder {
    /// Standard query with recursion desired.
    pub fn query(id: u16) -> Self {
        Self::with_flags(id, 0x0100)
    }

    /// Standard response, recursion available, no error.
    pub fn response(id: u16) -> Self {
        Self::with_flags(id, 0x8180)
    }

    fn with_flags(id: u16, flags: u16) -> Self {
        Self {
            id,
            flags,
            compress: false,
            questions: Vec::new(),
            answers: Vec::new(),
            authorities: Vec::new(),
            additionals: Vec::new(),
        }
    }

    /// Replace repeated name suffixes with compression pointers.
    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn question(mut self, name: &str, qtype: u16) -> Self {
        self.questions.push((name.to_string(), qtype));
        self
    }

    pub fn answer(mut self, name: &str, rtype: u16, ttl: i32, data: &[u8]) -> Self {
        self.answers.push(record(name, rtype, ttl, data));
        self
    }

    pub fn answer_a(self, name: &str, addr: Ipv4Addr, ttl: i32) -> Self {
        self.answer(name, TYPE_A, ttl, &addr.octets())
    }

    pub fn authority(mut self, name: &str, rtype: u16, ttl: i32, data: &[u8]) -> Self {
        self.authorities.push(record(name, rtype, ttl, data));
        self
    }

    pub fn additional(mut self, name: &str, rtype: u16, ttl: i32, data: &[u8]) -> Self {
        self.additionals.push(record(name, rtype, ttl, data));
        self
    }

    /// Encode the message to wire format bytes.
    pub fn build(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(512);
        let mut suffixes = HashMap::new();

        // Header
        data.extend_from_slice(&self.id.to_be_bytes());
        data.extend_from_slice(&self.flags.to_be_bytes());
        data.extend_from_slice(&(self.questions.len() as u16).to_be_bytes());
        data.extend_from_slice(&(self.answers.len() as u16).to_be_bytes());
        data.extend_from_slice(&(self.authorities.len() as u16).to_be_bytes());
        data.extend_from_slice(&(self.additionals.len() as u16).to_be_bytes());

        for (name, qtype) in &self.questions {
            self.encode_name(&mut data, &mut suffixes, name);
            data.extend_from_slice(&qtype.to_be_bytes());
            data.extend_from_slice(&CLASS_IN.to_be_bytes());
        }

        for r in self
            .answers
            .iter()
            .chain(&self.authorities)
            .chain(&self.additionals)
        {
            self.encode_name(&mut data, &mut suffixes, &r.name);
            data.extend_from_slice(&r.rtype.to_be_bytes());
            data.extend_from_slice(&CLASS_IN.to_be_bytes());
            data.extend_from_slice(&r.ttl.to_be_bytes());
            data.extend_from_slice(&(r.data.len() as u16).to_be_bytes());
            data.extend_from_slice(&r.data);
        }

        data
    }

    fn encode_name(&self, buf: &mut Vec<u8>, suffixes: &mut HashMap<String, usize>, name: &str) {
        let labels: Vec<&str> = name.split('.').filter(|l| !l.is_empty()).collect();

        for (i, label) in labels.iter().enumerate() {
            let suffix = labels[i..].join(".").to_lowercase();
            if self.compress {
                if let Some(&offset) = suffixes.get(&suffix) {
                    buf.extend_from_slice(&(0xC000 | offset as u16).to_be_bytes());
                    return;
                }
                if buf.len() < 0x4000 {
                    suffixes.insert(suffix, buf.len());
                }
            }
            buf.push(label.len() as u8);
            buf.extend_from_slice(label.as_bytes());
        }
        buf.push(0);
    }
}

fn record(name: &str, rtype: u16, ttl: i32, data: &[u8]) -> Record {
    Record {
        name: name.to_string(),
        rtype,
        ttl,
        data: data.to_vec(),
    }
}
