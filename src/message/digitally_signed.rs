use crate::message::SignatureAndHashAlgorithm;
use nom::bytes::complete::take;
use nom::combinator::verify;
use nom::number::complete::be_u16;
use nom::IResult;

/// A signature tagged with the algorithm pair that produced it.
///
/// Carried by ServerKeyExchange and CertificateVerify. An empty signature is
/// a decode error rather than a verification failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DigitallySigned<'a> {
    pub algorithm: SignatureAndHashAlgorithm,
    pub signature: &'a [u8],
}

impl<'a> DigitallySigned<'a> {
    pub fn new(algorithm: SignatureAndHashAlgorithm, signature: &'a [u8]) -> Self {
        DigitallySigned {
            algorithm,
            signature,
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], DigitallySigned<'a>> {
        let (input, algorithm) = SignatureAndHashAlgorithm::parse(input)?;
        let (input, len) = be_u16(input)?;
        let (input, signature) = verify(take(len), |s: &[u8]| !s.is_empty())(input)?;
        Ok((input, DigitallySigned::new(algorithm, signature)))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.algorithm.as_u16().to_be_bytes());
        output.extend_from_slice(&(self.signature.len() as u16).to_be_bytes());
        output.extend_from_slice(self.signature);
    }
}
