use super::extensions::UseSrtpExtension;
use super::{CipherSuite, CompressionMethod, Extension, ProtocolVersion, Random, SessionId};
use nom::IResult;
use tinyvec::ArrayVec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello<'a> {
    pub server_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cipher_suite: CipherSuite,
    pub compression_method: CompressionMethod,
    pub extensions: ArrayVec<[Extension<'a>; 32]>,
}

impl<'a> ServerHello<'a> {
    pub fn new(
        random: Random,
        cipher_suite: CipherSuite,
        extensions: ArrayVec<[Extension<'a>; 32]>,
    ) -> Self {
        ServerHello {
            server_version: ProtocolVersion::DTLS1_2,
            random,
            session_id: SessionId::empty(),
            cipher_suite,
            compression_method: CompressionMethod::Null,
            extensions,
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ServerHello<'a>> {
        let (input, server_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = SessionId::parse(input)?;
        let (input, cipher_suite) = CipherSuite::parse(input)?;
        let (input, compression_method) = CompressionMethod::parse(input)?;
        let (input, extensions) = Extension::parse_list(input)?;

        Ok((
            input,
            ServerHello {
                server_version,
                random,
                session_id,
                cipher_suite,
                compression_method,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.server_version.serialize(output);
        self.random.serialize(output);
        self.session_id.serialize(output);
        output.extend_from_slice(&self.cipher_suite.as_u16().to_be_bytes());
        output.push(self.compression_method.as_u8());
        Extension::serialize_list(&self.extensions, output);
    }

    pub fn use_srtp(&self) -> Option<&UseSrtpExtension<'a>> {
        self.extensions.iter().find_map(|e| match e {
            Extension::UseSrtp(v) => Some(v),
            _ => None,
        })
    }

    pub fn has_extended_master_secret(&self) -> bool {
        self.extensions
            .iter()
            .any(|e| matches!(e, Extension::ExtendedMasterSecret))
    }
}
