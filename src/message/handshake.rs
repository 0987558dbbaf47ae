use super::{
    Certificate, CertificateRequest, CertificateVerify, ClientHello, ClientKeyExchange, Finished,
    HelloVerifyRequest, ServerHello, ServerKeyExchange,
};
use crate::util::{all_consumed, put_u24};
use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::number::complete::{be_u16, be_u24, be_u8};
use nom::{Err, IResult};

/// Size of the DTLS handshake header.
pub const HANDSHAKE_HEADER_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub msg_type: MessageType,
    pub length: u32,
    pub message_seq: u16,
    pub fragment_offset: u32,
    pub fragment_length: u32,
}

impl Header {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Header> {
        let (input, msg_type) = MessageType::parse(input)?;
        let (input, length) = be_u24(input)?;
        let (input, message_seq) = be_u16(input)?;
        let (input, fragment_offset) = be_u24(input)?;
        let (input, fragment_length) = be_u24(input)?;

        Ok((
            input,
            Header {
                msg_type,
                length,
                message_seq,
                fragment_offset,
                fragment_length,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.msg_type.as_u8());
        put_u24(output, self.length as usize);
        output.extend_from_slice(&self.message_seq.to_be_bytes());
        put_u24(output, self.fragment_offset as usize);
        put_u24(output, self.fragment_length as usize);
    }

    pub fn is_fragment(&self) -> bool {
        self.fragment_offset > 0 || self.fragment_length < self.length
    }
}

/// A complete (reassembled) handshake message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake<'a> {
    pub header: Header,
    pub body: Body<'a>,
}

impl<'a> Handshake<'a> {
    pub fn new(message_seq: u16, body: Body<'a>) -> Self {
        let mut buf = Vec::new();
        body.serialize(&mut buf);
        let length = buf.len() as u32;

        Handshake {
            header: Header {
                msg_type: body.message_type(),
                length,
                message_seq,
                fragment_offset: 0,
                fragment_length: length,
            },
            body,
        }
    }

    /// Parse a full, unfragmented message.
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Handshake<'a>> {
        let (input, header) = Header::parse(input)?;

        if header.is_fragment() || header.fragment_length != header.length {
            return Err(Err::Failure(Error::new(input, ErrorKind::LengthValue)));
        }

        let (input, body_bytes) = take(header.length as usize)(input)?;
        let (rest, body) = Body::parse(body_bytes, header.msg_type)?;
        all_consumed(rest)?;

        Ok((input, Handshake { header, body }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.header.serialize(output);
        self.body.serialize(output);
    }

    pub fn marshal(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HANDSHAKE_HEADER_LEN + self.header.length as usize);
        self.serialize(&mut out);
        out
    }

    /// Split a marshaled message into handshake fragments of at most
    /// `max_body` body bytes each. The message sequence is kept.
    pub fn fragments(message: &[u8], max_body: usize) -> Vec<Vec<u8>> {
        let Ok((body, header)) = Header::parse(message) else {
            return Vec::new();
        };
        let max_body = max_body.max(1);

        if body.is_empty() {
            return vec![message.to_vec()];
        }

        body.chunks(max_body)
            .enumerate()
            .map(|(i, chunk)| {
                let fragment_header = Header {
                    fragment_offset: (i * max_body) as u32,
                    fragment_length: chunk.len() as u32,
                    ..header
                };
                let mut out = Vec::with_capacity(HANDSHAKE_HEADER_LEN + chunk.len());
                fragment_header.serialize(&mut out);
                out.extend_from_slice(chunk);
                out
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    HelloRequest,
    ClientHello,
    ServerHello,
    HelloVerifyRequest,
    Certificate,
    ServerKeyExchange,
    CertificateRequest,
    ServerHelloDone,
    CertificateVerify,
    ClientKeyExchange,
    Finished,
    Unknown(u8),
}

impl Default for MessageType {
    fn default() -> Self {
        Self::Unknown(255)
    }
}

impl MessageType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => MessageType::HelloRequest,
            1 => MessageType::ClientHello,
            2 => MessageType::ServerHello,
            3 => MessageType::HelloVerifyRequest,
            11 => MessageType::Certificate,
            12 => MessageType::ServerKeyExchange,
            13 => MessageType::CertificateRequest,
            14 => MessageType::ServerHelloDone,
            15 => MessageType::CertificateVerify,
            16 => MessageType::ClientKeyExchange,
            20 => MessageType::Finished,
            _ => MessageType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            MessageType::HelloRequest => 0,
            MessageType::ClientHello => 1,
            MessageType::ServerHello => 2,
            MessageType::HelloVerifyRequest => 3,
            MessageType::Certificate => 11,
            MessageType::ServerKeyExchange => 12,
            MessageType::CertificateRequest => 13,
            MessageType::ServerHelloDone => 14,
            MessageType::CertificateVerify => 15,
            MessageType::ClientKeyExchange => 16,
            MessageType::Finished => 20,
            MessageType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], MessageType> {
        let (input, byte) = be_u8(input)?;
        Ok((input, Self::from_u8(byte)))
    }
}

/// Handshake message bodies. HelloRequest belongs to renegotiation and
/// parses as `Unknown` like every other type we do not act on.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::large_enum_variant)]
pub enum Body<'a> {
    ClientHello(ClientHello<'a>),
    ServerHello(ServerHello<'a>),
    HelloVerifyRequest(HelloVerifyRequest),
    Certificate(Certificate<'a>),
    ServerKeyExchange(ServerKeyExchange<'a>),
    CertificateRequest(CertificateRequest<'a>),
    ServerHelloDone,
    CertificateVerify(CertificateVerify<'a>),
    ClientKeyExchange(ClientKeyExchange<'a>),
    Finished(Finished<'a>),
    Unknown(u8, &'a [u8]),
}

impl<'a> Body<'a> {
    pub fn message_type(&self) -> MessageType {
        match self {
            Body::ClientHello(_) => MessageType::ClientHello,
            Body::ServerHello(_) => MessageType::ServerHello,
            Body::HelloVerifyRequest(_) => MessageType::HelloVerifyRequest,
            Body::Certificate(_) => MessageType::Certificate,
            Body::ServerKeyExchange(_) => MessageType::ServerKeyExchange,
            Body::CertificateRequest(_) => MessageType::CertificateRequest,
            Body::ServerHelloDone => MessageType::ServerHelloDone,
            Body::CertificateVerify(_) => MessageType::CertificateVerify,
            Body::ClientKeyExchange(_) => MessageType::ClientKeyExchange,
            Body::Finished(_) => MessageType::Finished,
            Body::Unknown(value, _) => MessageType::from_u8(*value),
        }
    }

    pub fn parse(input: &'a [u8], m: MessageType) -> IResult<&'a [u8], Body<'a>> {
        match m {
            MessageType::ClientHello => {
                let (input, v) = ClientHello::parse(input)?;
                Ok((input, Body::ClientHello(v)))
            }
            MessageType::ServerHello => {
                let (input, v) = ServerHello::parse(input)?;
                Ok((input, Body::ServerHello(v)))
            }
            MessageType::HelloVerifyRequest => {
                let (input, v) = HelloVerifyRequest::parse(input)?;
                Ok((input, Body::HelloVerifyRequest(v)))
            }
            MessageType::Certificate => {
                let (input, v) = Certificate::parse(input)?;
                Ok((input, Body::Certificate(v)))
            }
            MessageType::ServerKeyExchange => {
                let (input, v) = ServerKeyExchange::parse(input)?;
                Ok((input, Body::ServerKeyExchange(v)))
            }
            MessageType::CertificateRequest => {
                let (input, v) = CertificateRequest::parse(input)?;
                Ok((input, Body::CertificateRequest(v)))
            }
            MessageType::ServerHelloDone => Ok((input, Body::ServerHelloDone)),
            MessageType::CertificateVerify => {
                let (input, v) = CertificateVerify::parse(input)?;
                Ok((input, Body::CertificateVerify(v)))
            }
            MessageType::ClientKeyExchange => {
                let (input, v) = ClientKeyExchange::parse(input)?;
                Ok((input, Body::ClientKeyExchange(v)))
            }
            MessageType::Finished => {
                let (input, v) = Finished::parse(input)?;
                Ok((input, Body::Finished(v)))
            }
            MessageType::HelloRequest | MessageType::Unknown(_) => {
                Ok((&input[input.len()..], Body::Unknown(m.as_u8(), input)))
            }
        }
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        match self {
            Body::ClientHello(v) => v.serialize(output),
            Body::ServerHello(v) => v.serialize(output),
            Body::HelloVerifyRequest(v) => v.serialize(output),
            Body::Certificate(v) => v.serialize(output),
            Body::ServerKeyExchange(v) => v.serialize(output),
            Body::CertificateRequest(v) => v.serialize(output),
            Body::ServerHelloDone => {}
            Body::CertificateVerify(v) => v.serialize(output),
            Body::ClientKeyExchange(v) => v.serialize(output),
            Body::Finished(v) => v.serialize(output),
            Body::Unknown(_, data) => output.extend_from_slice(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{CipherSuite, Cookie, Random};
    use tinyvec::{array_vec, ArrayVec};

    fn client_hello() -> Handshake<'static> {
        let hello = ClientHello::new(
            Random::default(),
            Cookie::try_new(&[0xBB; 20]).unwrap(),
            array_vec![[CipherSuite; 64] => CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256],
            ArrayVec::new(),
        );
        Handshake::new(3, Body::ClientHello(hello))
    }

    #[test]
    fn header_layout() {
        let h = Handshake::new(7, Body::ServerHelloDone);
        let bytes = h.marshal();
        assert_eq!(bytes, [14, 0, 0, 0, 0, 7, 0, 0, 0, 0, 0, 0]);
        assert_eq!(bytes.len(), HANDSHAKE_HEADER_LEN);

        let (rest, parsed) = Handshake::parse(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, h);
    }

    #[test]
    fn full_message() {
        let h = client_hello();
        let bytes = h.marshal();
        assert_eq!(h.header.length as usize, bytes.len() - HANDSHAKE_HEADER_LEN);

        let (rest, parsed) = Handshake::parse(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, h);
    }

    #[test]
    fn fragment_is_not_a_full_message() {
        let bytes = client_hello().marshal();
        let fragments = Handshake::fragments(&bytes, 10);
        assert!(Handshake::parse(&fragments[0]).is_err());
    }

    #[test]
    fn fragments_cover_the_body() {
        let bytes = client_hello().marshal();
        let body_len = bytes.len() - HANDSHAKE_HEADER_LEN;
        let fragments = Handshake::fragments(&bytes, 10);
        assert_eq!(fragments.len(), (body_len + 9) / 10);

        let mut reassembled = Vec::new();
        for (i, f) in fragments.iter().enumerate() {
            let (data, header) = Header::parse(f).unwrap();
            assert_eq!(header.message_seq, 3);
            assert_eq!(header.length as usize, body_len);
            assert_eq!(header.fragment_offset as usize, i * 10);
            assert_eq!(header.fragment_length as usize, data.len());
            reassembled.extend_from_slice(data);
        }
        assert_eq!(reassembled, &bytes[HANDSHAKE_HEADER_LEN..]);
    }

    #[test]
    fn empty_body_is_one_fragment() {
        let bytes = Handshake::new(0, Body::ServerHelloDone).marshal();
        assert_eq!(Handshake::fragments(&bytes, 100), vec![bytes]);
    }

    #[test]
    fn unknown_type_keeps_body() {
        let bytes = [99, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 2, 0xAA, 0xBB];
        let (_, parsed) = Handshake::parse(&bytes).unwrap();
        assert_eq!(parsed.body, Body::Unknown(99, &[0xAA, 0xBB]));
    }

    #[test]
    fn trailing_bytes_in_body_fail() {
        // Finished with 13 bytes of body
        let mut bytes = vec![20, 0, 0, 13, 0, 0, 0, 0, 0, 0, 0, 13];
        bytes.extend_from_slice(&[0; 13]);
        assert!(Handshake::parse(&bytes).is_err());
    }
}
