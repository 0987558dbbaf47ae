use crate::util::{all_consumed, many0};
use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;
use tinyvec::ArrayVec;

/// DTLS-SRTP protection profile identifiers, RFC 5764 4.1.2 and RFC 7714.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrtpProfileId {
    SrtpAes128CmSha1_80,
    SrtpAes128CmSha1_32,
    SrtpAeadAes128Gcm,
    SrtpAeadAes256Gcm,
    Unknown(u16),
}

impl Default for SrtpProfileId {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl SrtpProfileId {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0001 => SrtpProfileId::SrtpAes128CmSha1_80,
            0x0002 => SrtpProfileId::SrtpAes128CmSha1_32,
            0x0007 => SrtpProfileId::SrtpAeadAes128Gcm,
            0x0008 => SrtpProfileId::SrtpAeadAes256Gcm,
            _ => SrtpProfileId::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            SrtpProfileId::SrtpAes128CmSha1_80 => 0x0001,
            SrtpProfileId::SrtpAes128CmSha1_32 => 0x0002,
            SrtpProfileId::SrtpAeadAes128Gcm => 0x0007,
            SrtpProfileId::SrtpAeadAes256Gcm => 0x0008,
            SrtpProfileId::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], SrtpProfileId> {
        let (input, value) = be_u16(input)?;
        Ok((input, SrtpProfileId::from_u16(value)))
    }
}

/// UseSrtp extension, RFC 5764 4.1.1.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UseSrtpExtension<'a> {
    pub profiles: ArrayVec<[SrtpProfileId; 32]>,
    pub mki: &'a [u8],
}

impl<'a> UseSrtpExtension<'a> {
    pub fn new(profiles: ArrayVec<[SrtpProfileId; 32]>) -> Self {
        UseSrtpExtension { profiles, mki: &[] }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], UseSrtpExtension<'a>> {
        let (input, profiles_len) = be_u16(input)?;
        let (input, list) = take(profiles_len)(input)?;
        let (rest, profiles) = many0(SrtpProfileId::parse)(list)?;
        all_consumed(rest)?;

        let (input, mki_len) = be_u8(input)?;
        let (input, mki) = take(mki_len)(input)?;

        Ok((input, UseSrtpExtension { profiles, mki }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&((self.profiles.len() * 2) as u16).to_be_bytes());
        for profile in &self.profiles {
            output.extend_from_slice(&profile.as_u16().to_be_bytes());
        }
        output.push(self.mki.len() as u8);
        output.extend_from_slice(self.mki);
    }
}
