use super::extensions::{SignatureAlgorithmsExtension, SupportedGroupsExtension, UseSrtpExtension};
use super::{CipherSuite, CompressionMethod, ProtocolVersion};
use super::{Cookie, Extension, Random, SessionId};
use crate::util::{all_consumed, many1};
use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;
use tinyvec::ArrayVec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello<'a> {
    pub client_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cookie: Cookie,
    pub cipher_suites: ArrayVec<[CipherSuite; 64]>,
    pub compression_methods: ArrayVec<[CompressionMethod; 8]>,
    pub extensions: ArrayVec<[Extension<'a>; 32]>,
}

impl<'a> ClientHello<'a> {
    pub fn new(
        random: Random,
        cookie: Cookie,
        cipher_suites: ArrayVec<[CipherSuite; 64]>,
        extensions: ArrayVec<[Extension<'a>; 32]>,
    ) -> Self {
        let mut compression_methods = ArrayVec::new();
        compression_methods.push(CompressionMethod::Null);

        ClientHello {
            client_version: ProtocolVersion::DTLS1_2,
            random,
            session_id: SessionId::empty(),
            cookie,
            cipher_suites,
            compression_methods,
            extensions,
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ClientHello<'a>> {
        let (input, client_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = SessionId::parse(input)?;
        let (input, cookie) = Cookie::parse(input)?;

        let (input, cipher_suites_len) = be_u16(input)?;
        let (input, input_cipher) = take(cipher_suites_len)(input)?;
        let (rest, cipher_suites) = many1(CipherSuite::parse)(input_cipher)?;
        all_consumed(rest)?;

        let (input, compression_methods_len) = be_u8(input)?;
        let (input, input_compression) = take(compression_methods_len)(input)?;
        let (rest, compression_methods) = many1(CompressionMethod::parse)(input_compression)?;
        all_consumed(rest)?;

        let (input, extensions) = Extension::parse_list(input)?;

        Ok((
            input,
            ClientHello {
                client_version,
                random,
                session_id,
                cookie,
                cipher_suites,
                compression_methods,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.client_version.serialize(output);
        self.random.serialize(output);
        self.session_id.serialize(output);
        self.cookie.serialize(output);
        output.extend_from_slice(&((self.cipher_suites.len() * 2) as u16).to_be_bytes());
        for suite in &self.cipher_suites {
            output.extend_from_slice(&suite.as_u16().to_be_bytes());
        }
        output.push(self.compression_methods.len() as u8);
        for method in &self.compression_methods {
            output.push(method.as_u8());
        }
        Extension::serialize_list(&self.extensions, output);
    }

    pub fn supported_groups(&self) -> Option<&SupportedGroupsExtension> {
        self.extensions.iter().find_map(|e| match e {
            Extension::SupportedGroups(v) => Some(v),
            _ => None,
        })
    }

    pub fn use_srtp(&self) -> Option<&UseSrtpExtension<'a>> {
        self.extensions.iter().find_map(|e| match e {
            Extension::UseSrtp(v) => Some(v),
            _ => None,
        })
    }

    pub fn server_name(&self) -> Option<&'a str> {
        self.extensions.iter().find_map(|e| match e {
            Extension::ServerName(v) if !v.host_name.is_empty() => Some(v.host_name),
            _ => None,
        })
    }

    pub fn signature_algorithms(&self) -> Option<&SignatureAlgorithmsExtension> {
        self.extensions.iter().find_map(|e| match e {
            Extension::SignatureAlgorithms(v) => Some(v),
            _ => None,
        })
    }

    pub fn has_extended_master_secret(&self) -> bool {
        self.extensions
            .iter()
            .any(|e| matches!(e, Extension::ExtendedMasterSecret))
    }
}
