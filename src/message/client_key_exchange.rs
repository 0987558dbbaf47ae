use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::number::complete::be_u8;
use nom::{Err, IResult};

/// ClientKeyExchange for ECDHE (RFC 8422 5.7): the client's ephemeral public point.
///
/// The curve was fixed by ServerKeyExchange, so only the point is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClientKeyExchange<'a> {
    pub public_key: &'a [u8],
}

impl<'a> ClientKeyExchange<'a> {
    pub fn new(public_key: &'a [u8]) -> Self {
        ClientKeyExchange { public_key }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ClientKeyExchange<'a>> {
        let (input, public_key_len) = be_u8(input)?;
        if public_key_len == 0 {
            return Err(Err::Failure(Error::new(input, ErrorKind::LengthValue)));
        }
        let (input, public_key) = take(public_key_len)(input)?;
        Ok((input, ClientKeyExchange { public_key }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.public_key.len() as u8);
        output.extend_from_slice(self.public_key);
    }
}
