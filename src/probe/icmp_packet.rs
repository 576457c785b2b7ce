use anyhow::{Result, anyhow};
use bytes::{Buf, BufMut, BytesMut};

const HEADER_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpType {
    EchoReply = 0,
    EchoRequest = 8,
    EchoRequestV6 = 128,
    EchoReplyV6 = 129,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcmpPacket {
    pub message_type: u8,
    pub code: u8,
    #[allow(dead_code)]
    pub checksum: u16,
    pub identifier: u16,
    pub sequence: u16,
    pub payload: Vec<u8>,
}

impl IcmpPacket {
    pub fn echo_request(v6: bool, identifier: u16, sequence: u16, payload: Vec<u8>) -> Self {
        let message_type = if v6 { IcmpType::EchoRequestV6 } else { IcmpType::EchoRequest };
        Self {
            message_type: message_type as u8,
            code: 0,
            checksum: 0,
            identifier,
            sequence,
            payload,
        }
    }

    pub fn is_echo_reply(&self, v6: bool) -> bool {
        let expected = if v6 { IcmpType::EchoReplyV6 } else { IcmpType::EchoReply };
        self.message_type == expected as u8 && self.code == 0
    }

    /// Serialises the packet. ICMPv4 gets its checksum filled in here; the
    /// kernel computes ICMPv6 checksums itself.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        buf.put_u8(self.message_type);
        buf.put_u8(self.code);
        buf.put_u16(0);
        buf.put_u16(self.identifier);
        buf.put_u16(self.sequence);
        buf.put_slice(&self.payload);

        if self.message_type == IcmpType::EchoRequest as u8 {
            let checksum = checksum(&buf);
            buf[2..4].copy_from_slice(&checksum.to_be_bytes());
        }
        buf.to_vec()
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(anyhow!("ICMP packet too short ({} bytes)", data.len()));
        }
        let mut buf = data;
        let message_type = buf.get_u8();
        let code = buf.get_u8();
        let checksum = buf.get_u16();
        let identifier = buf.get_u16();
        let sequence = buf.get_u16();

        Ok(Self {
            message_type,
            code,
            checksum,
            identifier,
            sequence,
            payload: buf.to_vec(),
        })
    }
}

/// RFC 1071 internet checksum.
fn checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = data
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]) as u32,
            [hi] => (*hi as u32) << 8,
            _ => 0,
        })
        .fold(0u32, u32::wrapping_add);

    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !sum as u16
}
