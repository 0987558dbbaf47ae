use super::ProtocolVersion;
use crate::util::be_u48;
use crate::Error;
use nom::bytes::complete::take;
use nom::error::ErrorKind;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

/// Size of the fixed record header.
pub const RECORD_HEADER_LEN: usize = 13;

/// Epoch and 48 bit sequence number of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sequence {
    pub epoch: u16,
    pub sequence_number: u64,
}

impl Sequence {
    pub const MAX_SEQUENCE_NUMBER: u64 = (1 << 48) - 1;

    pub fn new(epoch: u16, sequence_number: u64) -> Self {
        Sequence {
            epoch,
            sequence_number,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct DTLSRecord<'a> {
    pub content_type: ContentType,
    pub version: ProtocolVersion,
    pub sequence: Sequence,
    pub fragment: &'a [u8],
}

impl<'a> DTLSRecord<'a> {
    pub fn new(
        content_type: ContentType,
        sequence: Sequence,
        fragment: &'a [u8],
    ) -> DTLSRecord<'a> {
        DTLSRecord {
            content_type,
            version: ProtocolVersion::DTLS1_2,
            sequence,
            fragment,
        }
    }

    /// Parse one record off the front of a datagram.
    ///
    /// A length field pointing past the end of the input is a failure, not
    /// an incomplete parse. Datagrams are never continued.
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], DTLSRecord<'a>> {
        let (input, content_type) = ContentType::parse(input)?;
        let (input, version) = ProtocolVersion::parse(input)?;
        let (input, epoch) = be_u16(input)?;
        let (input, sequence_number) = be_u48(input)?;
        let (input, length) = be_u16(input)?;
        if input.len() < length as usize {
            return Err(nom::Err::Failure(nom::error::Error::new(
                input,
                ErrorKind::LengthValue,
            )));
        }
        let (input, fragment) = take(length as usize)(input)?;

        Ok((
            input,
            DTLSRecord {
                content_type,
                version,
                sequence: Sequence::new(epoch, sequence_number),
                fragment,
            },
        ))
    }

    /// Parse exactly one record. The declared length must match the payload.
    pub fn unmarshal(input: &'a [u8]) -> Result<DTLSRecord<'a>, Error> {
        if input.len() < RECORD_HEADER_LEN {
            return Err(Error::ParseIncomplete);
        }
        let declared = u16::from_be_bytes([input[11], input[12]]) as usize;
        let actual = input.len() - RECORD_HEADER_LEN;
        if declared != actual {
            return Err(Error::RecordLengthMismatch { declared, actual });
        }
        let (_, record) = Self::parse(input)?;
        Ok(record)
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.content_type.as_u8());
        self.version.serialize(output);
        output.extend_from_slice(&self.sequence.epoch.to_be_bytes());
        output.extend_from_slice(&self.sequence.sequence_number.to_be_bytes()[2..]);
        output.extend_from_slice(&(self.fragment.len() as u16).to_be_bytes());
        output.extend_from_slice(self.fragment);
    }

    pub fn marshal(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(RECORD_HEADER_LEN + self.fragment.len());
        self.serialize(&mut out);
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    ChangeCipherSpec,
    Alert,
    Handshake,
    ApplicationData,
    Unknown(u8),
}

impl Default for ContentType {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl ContentType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            20 => ContentType::ChangeCipherSpec,
            21 => ContentType::Alert,
            22 => ContentType::Handshake,
            23 => ContentType::ApplicationData,
            _ => ContentType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            ContentType::ChangeCipherSpec => 20,
            ContentType::Alert => 21,
            ContentType::Handshake => 22,
            ContentType::ApplicationData => 23,
            ContentType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ContentType> {
        let (input, byte) = be_u8(input)?;
        Ok((input, Self::from_u8(byte)))
    }
}
