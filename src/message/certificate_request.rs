use super::{ClientCertificateType, SignatureAndHashAlgorithm};
use crate::util::{all_consumed, many0, many1};
use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;
use tinyvec::ArrayVec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest<'a> {
    pub certificate_types: ArrayVec<[ClientCertificateType; 8]>,
    pub supported_signature_algorithms: ArrayVec<[SignatureAndHashAlgorithm; 32]>,
    pub certificate_authorities: ArrayVec<[&'a [u8]; 32]>,
}

impl<'a> CertificateRequest<'a> {
    /// Request an ECDSA certificate signed with one of our supported schemes.
    pub fn ecdsa() -> Self {
        let mut certificate_types = ArrayVec::new();
        certificate_types.push(ClientCertificateType::ECDSA_SIGN);

        let mut supported_signature_algorithms = ArrayVec::new();
        supported_signature_algorithms.extend(SignatureAndHashAlgorithm::supported());

        CertificateRequest {
            certificate_types,
            supported_signature_algorithms,
            certificate_authorities: ArrayVec::new(),
        }
    }

    fn parse_name(input: &'a [u8]) -> IResult<&'a [u8], &'a [u8]> {
        let (input, len) = be_u16(input)?;
        take(len)(input)
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], CertificateRequest<'a>> {
        let (input, cert_types_len) = be_u8(input)?;
        let (input, input_type) = take(cert_types_len)(input)?;
        let (rest, certificate_types) = many1(ClientCertificateType::parse)(input_type)?;
        all_consumed(rest)?;

        let (input, sig_algs_len) = be_u16(input)?;
        let (input, input_sigs) = take(sig_algs_len)(input)?;
        let (rest, supported_signature_algorithms) =
            many0(SignatureAndHashAlgorithm::parse)(input_sigs)?;
        all_consumed(rest)?;

        let (input, cert_auths_len) = be_u16(input)?;
        let (input, input_auths) = take(cert_auths_len)(input)?;
        let (rest, certificate_authorities) = many0(Self::parse_name)(input_auths)?;
        all_consumed(rest)?;

        Ok((
            input,
            CertificateRequest {
                certificate_types,
                supported_signature_algorithms,
                certificate_authorities,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.certificate_types.len() as u8);
        for cert_type in &self.certificate_types {
            output.push(cert_type.as_u8());
        }

        let sig_algs_len = (self.supported_signature_algorithms.len() * 2) as u16;
        output.extend_from_slice(&sig_algs_len.to_be_bytes());
        for sig_alg in &self.supported_signature_algorithms {
            output.extend_from_slice(&sig_alg.as_u16().to_be_bytes());
        }

        let cert_auths_len: usize = self
            .certificate_authorities
            .iter()
            .map(|name| 2 + name.len())
            .sum();
        output.extend_from_slice(&(cert_auths_len as u16).to_be_bytes());
        for name in &self.certificate_authorities {
            output.extend_from_slice(&(name.len() as u16).to_be_bytes());
            output.extend_from_slice(name);
        }
    }
}
