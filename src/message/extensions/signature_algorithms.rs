use crate::message::SignatureAndHashAlgorithm;
use crate::util::{all_consumed, many0};
use nom::bytes::complete::take;
use nom::number::complete::be_u16;
use nom::IResult;
use tinyvec::ArrayVec;

/// SignatureAlgorithms extension, RFC 5246 7.4.1.4.1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureAlgorithmsExtension {
    pub supported_signature_algorithms: ArrayVec<[SignatureAndHashAlgorithm; 32]>,
}

impl Default for SignatureAlgorithmsExtension {
    fn default() -> Self {
        let mut supported_signature_algorithms = ArrayVec::new();
        supported_signature_algorithms.extend(SignatureAndHashAlgorithm::supported());
        SignatureAlgorithmsExtension {
            supported_signature_algorithms,
        }
    }
}

impl SignatureAlgorithmsExtension {
    pub fn parse(input: &[u8]) -> IResult<&[u8], SignatureAlgorithmsExtension> {
        let (input, list_len) = be_u16(input)?;
        let (input, list) = take(list_len)(input)?;
        let (rest, supported_signature_algorithms) =
            many0(SignatureAndHashAlgorithm::parse)(list)?;
        all_consumed(rest)?;

        Ok((
            input,
            SignatureAlgorithmsExtension {
                supported_signature_algorithms,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(
            &((self.supported_signature_algorithms.len() * 2) as u16).to_be_bytes(),
        );
        for alg in &self.supported_signature_algorithms {
            output.extend_from_slice(&alg.as_u16().to_be_bytes());
        }
    }

    pub fn contains(&self, alg: SignatureAndHashAlgorithm) -> bool {
        self.supported_signature_algorithms.contains(&alg)
    }
}
