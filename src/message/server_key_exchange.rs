use super::{CurveType, DigitallySigned, NamedCurve};
use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::number::complete::be_u8;
use nom::{Err, IResult};

/// ServerKeyExchange for ECDHE_ECDSA (RFC 8422 5.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServerKeyExchange<'a> {
    pub curve_type: CurveType,
    pub named_curve: NamedCurve,
    pub public_key: &'a [u8],
    pub signed: DigitallySigned<'a>,
}

impl<'a> ServerKeyExchange<'a> {
    pub fn new(named_curve: NamedCurve, public_key: &'a [u8], signed: DigitallySigned<'a>) -> Self {
        ServerKeyExchange {
            curve_type: CurveType::NamedCurve,
            named_curve,
            public_key,
            signed,
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ServerKeyExchange<'a>> {
        let (input, curve_type) = CurveType::parse(input)?;
        if curve_type != CurveType::NamedCurve {
            return Err(Err::Failure(Error::new(input, ErrorKind::Tag)));
        }
        let (input, named_curve) = NamedCurve::parse(input)?;
        let (input, public_key_len) = be_u8(input)?;
        let (input, public_key) = take(public_key_len)(input)?;
        let (input, signed) = DigitallySigned::parse(input)?;

        Ok((
            input,
            ServerKeyExchange {
                curve_type,
                named_curve,
                public_key,
                signed,
            },
        ))
    }

    /// The ServerECDHParams covered by the signature.
    pub fn serialize_params(named_curve: NamedCurve, public_key: &[u8], output: &mut Vec<u8>) {
        output.push(CurveType::NamedCurve.as_u8());
        output.extend_from_slice(&named_curve.as_u16().to_be_bytes());
        output.push(public_key.len() as u8);
        output.extend_from_slice(public_key);
    }

    pub fn params(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.public_key.len());
        Self::serialize_params(self.named_curve, self.public_key, &mut out);
        out
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        Self::serialize_params(self.named_curve, self.public_key, output);
        self.signed.serialize(output);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::message::SignatureAndHashAlgorithm;

    const MESSAGE: &[u8] = &[
        0x03, // curve_type
        0x00, 0x17, // named_curve
        0x04, // public_key length
        0x01, 0x02, 0x03, 0x04, // public_key
        0x04, 0x03, // ECDSA + SHA256
        0x00, 0x02, // signature length
        0x05, 0x06, // signature
    ];

    #[test]
    fn server_key_exchange() {
        let (rest, parsed) = ServerKeyExchange::parse(MESSAGE).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed.named_curve, NamedCurve::Secp256r1);
        assert_eq!(parsed.public_key, &[1, 2, 3, 4]);
        assert_eq!(parsed.signed.algorithm, SignatureAndHashAlgorithm::ECDSA_SHA256);
        assert_eq!(parsed.params(), &MESSAGE[..8]);

        let mut serialized = Vec::new();
        parsed.serialize(&mut serialized);
        assert_eq!(serialized, MESSAGE);
    }

    #[test]
    fn explicit_curves_are_rejected() {
        let mut message = MESSAGE.to_vec();
        message[0] = 0x01;
        assert!(matches!(
            ServerKeyExchange::parse(&message),
            Err(nom::Err::Failure(_))
        ));
    }
}
