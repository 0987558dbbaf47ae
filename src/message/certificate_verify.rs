use super::DigitallySigned;
use nom::combinator::map;
use nom::IResult;

/// The client's signature over the transcript up to its ClientKeyExchange.
///
/// Only sent when the server asked for a certificate and the client had one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CertificateVerify<'a> {
    pub signed: DigitallySigned<'a>,
}

impl<'a> CertificateVerify<'a> {
    pub fn new(signed: DigitallySigned<'a>) -> Self {
        CertificateVerify { signed }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], CertificateVerify<'a>> {
        map(DigitallySigned::parse, CertificateVerify::new)(input)
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.signed.serialize(output);
    }
}
