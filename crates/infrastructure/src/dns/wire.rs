//! Wire-format helpers for the query pipeline.
//!
//! Negative responses are patched at the byte level so the original header
//! flags and question section are relayed untouched; synthesized rewrite
//! answers are built through `hickory-proto`.

use hickory_proto::op::{Message, MessageType, OpCode};
use hickory_proto::rr::{rdata, Name, RData, Record, RecordType};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use sentinel_dns_domain::DomainError;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

const HEADER_LEN: usize = 12;

pub const RCODE_SERVFAIL: u8 = 2;
pub const RCODE_NXDOMAIN: u8 = 3;

/// TTL of synthesized rewrite answers.
const REWRITE_TTL: u32 = 60;

/// Decode a client packet into a message.
pub fn decode(packet: &[u8]) -> Result<Message, DomainError> {
    Message::from_vec(packet).map_err(|e| DomainError::Decode(e.to_string()))
}

/// The transaction id, when enough of the header survived to echo one.
pub fn recover_id(packet: &[u8]) -> Option<u16> {
    (packet.len() >= HEADER_LEN).then(|| u16::from_be_bytes([packet[0], packet[1]]))
}

/// Build an NXDOMAIN/SERVFAIL response from the raw query bytes: same id,
/// same flag bits except QR and the low 4 rcode bits, question section
/// copied verbatim, all other sections empty.
pub fn build_negative_response(query_packet: &[u8], rcode: u8) -> Option<Vec<u8>> {
    if query_packet.len() < HEADER_LEN {
        return None;
    }
    let qdcount = u16::from_be_bytes([query_packet[4], query_packet[5]]);
    let question_len = question_section_len(query_packet, qdcount)?;

    let mut response = Vec::with_capacity(HEADER_LEN + question_len);
    response.extend_from_slice(&query_packet[..4]);
    response[2] |= 0x80; // QR: this is a response
    response[3] = (response[3] & 0xF0) | (rcode & 0x0F);
    response.extend_from_slice(&qdcount.to_be_bytes());
    response.extend_from_slice(&[0u8; 6]); // ANCOUNT, NSCOUNT, ARCOUNT
    response.extend_from_slice(&query_packet[HEADER_LEN..HEADER_LEN + question_len]);
    Some(response)
}

/// SERVFAIL for a packet whose body would not decode: header-only response
/// echoing the id and flags, with every section empty.
pub fn build_header_only_servfail(packet: &[u8]) -> Option<Vec<u8>> {
    if packet.len() < HEADER_LEN {
        return None;
    }
    let mut response = vec![0u8; HEADER_LEN];
    response[..4].copy_from_slice(&packet[..4]);
    response[2] |= 0x80;
    response[3] = (response[3] & 0xF0) | RCODE_SERVFAIL;
    Some(response)
}

/// Byte length of the question section. Names in questions are almost never
/// compressed, but a pointer still terminates the walk cleanly.
fn question_section_len(packet: &[u8], qdcount: u16) -> Option<usize> {
    let mut pos = HEADER_LEN;
    for _ in 0..qdcount {
        loop {
            let len = *packet.get(pos)? as usize;
            if len == 0 {
                pos += 1;
                break;
            }
            if len & 0xC0 == 0xC0 {
                pos += 2;
                break;
            }
            pos += 1 + len;
        }
        pos += 4; // QTYPE + QCLASS
        if pos > packet.len() {
            return None;
        }
    }
    Some(pos - HEADER_LEN)
}

/// Synthesize a rewrite answer for the request's first question.
///
/// `A`/`AAAA` answer directly when the target parses as the matching
/// address family, otherwise a CNAME to the normalized target; `ANY`
/// prefers A, then AAAA, then CNAME. Unsupported qtypes return `Ok(None)`
/// and the pipeline forwards upstream instead. The answer name keeps the
/// case the query arrived with.
pub fn build_rewrite_answer(request: &Message, target: &str) -> Result<Option<Vec<u8>>, DomainError> {
    let Some(query) = request.queries().first() else {
        return Ok(None);
    };

    let target = target.trim().trim_end_matches('.');
    let v4 = Ipv4Addr::from_str(target).ok();
    let v6 = Ipv6Addr::from_str(target).ok();

    let rdata = match query.query_type() {
        RecordType::A => match v4 {
            Some(addr) => RData::A(rdata::A(addr)),
            None => cname_rdata(target)?,
        },
        RecordType::AAAA => match v6 {
            Some(addr) => RData::AAAA(rdata::AAAA(addr)),
            None => cname_rdata(target)?,
        },
        RecordType::CNAME => cname_rdata(target)?,
        RecordType::ANY => match (v4, v6) {
            (Some(addr), _) => RData::A(rdata::A(addr)),
            (None, Some(addr)) => RData::AAAA(rdata::AAAA(addr)),
            (None, None) => cname_rdata(target)?,
        },
        _ => return Ok(None),
    };

    let mut message = Message::new(request.id(), MessageType::Response, OpCode::Query);
    message.set_recursion_desired(request.recursion_desired());
    message.set_recursion_available(true);
    message.add_query(query.clone());
    message.add_answer(Record::from_rdata(query.name().clone(), REWRITE_TTL, rdata));

    serialize(&message).map(Some)
}

fn cname_rdata(target: &str) -> Result<RData, DomainError> {
    let name = Name::from_utf8(&target.to_ascii_lowercase())
        .map_err(|e| DomainError::InvalidDomainName(format!("rewrite target '{}': {}", target, e)))?;
    Ok(RData::CNAME(rdata::CNAME(name)))
}

fn serialize(message: &Message) -> Result<Vec<u8>, DomainError> {
    let mut buf = Vec::with_capacity(512);
    let mut encoder = BinEncoder::new(&mut buf);
    message.emit(&mut encoder).map_err(|e| DomainError::Encode(e.to_string()))?;
    Ok(buf)
}

/// A/AAAA addresses from a response's answer section, unique, capped at 8.
/// Undecodable responses yield nothing.
pub fn extract_answer_ips(response: &[u8]) -> Vec<IpAddr> {
    const MAX_IPS: usize = 8;

    let Ok(message) = Message::from_vec(response) else {
        return Vec::new();
    };

    let mut ips: Vec<IpAddr> = Vec::new();
    for record in message.answers() {
        let ip = match record.data() {
            RData::A(a) => IpAddr::V4(a.0),
            RData::AAAA(aaaa) => IpAddr::V6(aaaa.0),
            _ => continue,
        };
        if !ips.contains(&ip) {
            ips.push(ip);
            if ips.len() == MAX_IPS {
                break;
            }
        }
    }
    ips
}

/// The rcode carried in a raw response, when the header is readable.
pub fn response_rcode(response: &[u8]) -> Option<u8> {
    (response.len() >= HEADER_LEN).then(|| response[3] & 0x0F)
}
