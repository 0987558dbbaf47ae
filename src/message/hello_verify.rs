use super::{Cookie, ProtocolVersion};
use nom::combinator::map;
use nom::sequence::pair;
use nom::IResult;

/// The server's stateless cookie challenge, answered by a second ClientHello
/// echoing `cookie`.
///
/// Neither this message nor the ClientHello that triggered it enters the
/// Finished transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelloVerifyRequest {
    pub server_version: ProtocolVersion,
    pub cookie: Cookie,
}

impl HelloVerifyRequest {
    pub fn new(server_version: ProtocolVersion, cookie: Cookie) -> Self {
        HelloVerifyRequest {
            server_version,
            cookie,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], HelloVerifyRequest> {
        map(
            pair(ProtocolVersion::parse, Cookie::parse),
            |(server_version, cookie)| HelloVerifyRequest::new(server_version, cookie),
        )(input)
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.server_version.serialize(output);
        self.cookie.serialize(output);
    }
}
