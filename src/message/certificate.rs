use crate::util::{all_consumed, many0, put_u24};
use nom::bytes::complete::take;
use nom::number::complete::be_u24;
use nom::IResult;
use tinyvec::ArrayVec;

/// DER encoded certificate chain, leaf first. May be empty when a client
/// has no certificate to answer a CertificateRequest with.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Certificate<'a> {
    pub certificate_list: ArrayVec<[&'a [u8]; 16]>,
}

impl<'a> Certificate<'a> {
    pub fn new<I>(chain: I) -> Self
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut certificate_list = ArrayVec::new();
        for cert in chain.into_iter().take(16) {
            certificate_list.push(cert);
        }
        Certificate { certificate_list }
    }

    fn parse_one(input: &'a [u8]) -> IResult<&'a [u8], &'a [u8]> {
        let (input, cert_len) = be_u24(input)?;
        take(cert_len as usize)(input)
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Certificate<'a>> {
        let (input, total_len) = be_u24(input)?;
        let (input, list) = take(total_len as usize)(input)?;
        let (rest, certificate_list) = many0(Self::parse_one)(list)?;
        all_consumed(rest)?;

        Ok((input, Certificate { certificate_list }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        let total_len: usize = self
            .certificate_list
            .iter()
            .map(|cert| 3 + cert.len())
            .sum();
        put_u24(output, total_len);

        for cert in &self.certificate_list {
            put_u24(output, cert.len());
            output.extend_from_slice(cert);
        }
    }

    pub fn leaf(&self) -> Option<&'a [u8]> {
        self.certificate_list.first().copied()
    }
}
