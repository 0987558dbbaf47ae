use super::extensions::{
    ECPointFormatsExtension, ServerNameExtension, SignatureAlgorithmsExtension,
    SupportedGroupsExtension, UseSrtpExtension,
};
use crate::util::all_consumed;
use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::number::complete::{be_u16, be_u8};
use nom::{Err, IResult};
use tinyvec::ArrayVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionType {
    ServerName,
    SupportedGroups,
    EcPointFormats,
    SignatureAlgorithms,
    UseSrtp,
    ExtendedMasterSecret,
    RenegotiationInfo,
    Unknown(u16),
}

impl Default for ExtensionType {
    fn default() -> Self {
        Self::Unknown(0xFFFF)
    }
}

impl ExtensionType {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0000 => ExtensionType::ServerName,
            0x000A => ExtensionType::SupportedGroups,
            0x000B => ExtensionType::EcPointFormats,
            0x000D => ExtensionType::SignatureAlgorithms,
            0x000E => ExtensionType::UseSrtp,
            0x0017 => ExtensionType::ExtendedMasterSecret,
            0xFF01 => ExtensionType::RenegotiationInfo,
            _ => ExtensionType::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            ExtensionType::ServerName => 0x0000,
            ExtensionType::SupportedGroups => 0x000A,
            ExtensionType::EcPointFormats => 0x000B,
            ExtensionType::SignatureAlgorithms => 0x000D,
            ExtensionType::UseSrtp => 0x000E,
            ExtensionType::ExtendedMasterSecret => 0x0017,
            ExtensionType::RenegotiationInfo => 0xFF01,
            ExtensionType::Unknown(value) => *value,
        }
    }
}

/// A hello extension.
///
/// Extensions this implementation does not act on parse as `Unknown` and
/// are ignored by the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extension<'a> {
    ServerName(ServerNameExtension<'a>),
    SupportedGroups(SupportedGroupsExtension),
    EcPointFormats(ECPointFormatsExtension),
    SignatureAlgorithms(SignatureAlgorithmsExtension),
    UseSrtp(UseSrtpExtension<'a>),
    ExtendedMasterSecret,
    /// Only the initial (empty) renegotiated_connection is ever valid.
    RenegotiationInfo,
    Unknown(u16, &'a [u8]),
}

impl<'a> Default for Extension<'a> {
    fn default() -> Self {
        Extension::Unknown(0xFFFF, &[])
    }
}

impl<'a> Extension<'a> {
    pub fn extension_type(&self) -> ExtensionType {
        match self {
            Extension::ServerName(_) => ExtensionType::ServerName,
            Extension::SupportedGroups(_) => ExtensionType::SupportedGroups,
            Extension::EcPointFormats(_) => ExtensionType::EcPointFormats,
            Extension::SignatureAlgorithms(_) => ExtensionType::SignatureAlgorithms,
            Extension::UseSrtp(_) => ExtensionType::UseSrtp,
            Extension::ExtendedMasterSecret => ExtensionType::ExtendedMasterSecret,
            Extension::RenegotiationInfo => ExtensionType::RenegotiationInfo,
            Extension::Unknown(t, _) => ExtensionType::Unknown(*t),
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Extension<'a>> {
        let (input, extension_type) = be_u16(input)?;
        let (input, extension_length) = be_u16(input)?;
        let (input, data) = take(extension_length)(input)?;

        let (rest, extension) = match ExtensionType::from_u16(extension_type) {
            ExtensionType::ServerName => {
                // A server echoes SNI with an empty body.
                if data.is_empty() {
                    (data, Extension::ServerName(ServerNameExtension::default()))
                } else {
                    let (rest, v) = ServerNameExtension::parse(data)?;
                    (rest, Extension::ServerName(v))
                }
            }
            ExtensionType::SupportedGroups => {
                let (rest, v) = SupportedGroupsExtension::parse(data)?;
                (rest, Extension::SupportedGroups(v))
            }
            ExtensionType::EcPointFormats => {
                let (rest, v) = ECPointFormatsExtension::parse(data)?;
                (rest, Extension::EcPointFormats(v))
            }
            ExtensionType::SignatureAlgorithms => {
                let (rest, v) = SignatureAlgorithmsExtension::parse(data)?;
                (rest, Extension::SignatureAlgorithms(v))
            }
            ExtensionType::UseSrtp => {
                let (rest, v) = UseSrtpExtension::parse(data)?;
                (rest, Extension::UseSrtp(v))
            }
            ExtensionType::ExtendedMasterSecret => (data, Extension::ExtendedMasterSecret),
            ExtensionType::RenegotiationInfo => {
                let (rest, len) = be_u8(data)?;
                if len != 0 {
                    return Err(Err::Failure(Error::new(data, ErrorKind::Verify)));
                }
                (rest, Extension::RenegotiationInfo)
            }
            ExtensionType::Unknown(t) => (&data[data.len()..], Extension::Unknown(t, data)),
        };
        all_consumed(rest)?;

        Ok((input, extension))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        let mut body = Vec::new();
        match self {
            Extension::ServerName(v) => {
                if !v.host_name.is_empty() {
                    v.serialize(&mut body)
                }
            }
            Extension::SupportedGroups(v) => v.serialize(&mut body),
            Extension::EcPointFormats(v) => v.serialize(&mut body),
            Extension::SignatureAlgorithms(v) => v.serialize(&mut body),
            Extension::UseSrtp(v) => v.serialize(&mut body),
            Extension::ExtendedMasterSecret => {}
            Extension::RenegotiationInfo => body.push(0),
            Extension::Unknown(_, data) => body.extend_from_slice(data),
        }

        output.extend_from_slice(&self.extension_type().as_u16().to_be_bytes());
        output.extend_from_slice(&(body.len() as u16).to_be_bytes());
        output.extend_from_slice(&body);
    }

    /// Parse the optional extensions block trailing a hello message.
    pub fn parse_list(input: &'a [u8]) -> IResult<&'a [u8], ArrayVec<[Extension<'a>; 32]>> {
        let mut extensions = ArrayVec::new();

        if input.is_empty() {
            return Ok((input, extensions));
        }

        let (input, extensions_len) = be_u16(input)?;
        let (input, mut data) = take(extensions_len)(input)?;

        while !data.is_empty() {
            let (rest, extension) = Extension::parse(data)?;
            if extensions.try_push(extension).is_some() {
                return Err(Err::Failure(Error::new(data, ErrorKind::TooLarge)));
            }
            data = rest;
        }

        Ok((input, extensions))
    }

    /// Serialize an extensions block. Nothing is written for an empty list.
    pub fn serialize_list(extensions: &[Extension<'_>], output: &mut Vec<u8>) {
        if extensions.is_empty() {
            return;
        }
        let mut body = Vec::new();
        for ext in extensions {
            ext.serialize(&mut body);
        }
        output.extend_from_slice(&(body.len() as u16).to_be_bytes());
        output.extend_from_slice(&body);
    }
}
