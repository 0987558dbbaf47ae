use nom::number::complete::{be_u16, be_u8};
use nom::IResult;
use tinyvec::ArrayVec;

/// Elliptic curves for ECDHE key exchange (RFC 8422).
///
/// Only P-256, P-384 and X25519 can be negotiated. The remaining named
/// variants are recognized so a peer's offer can be logged by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedCurve {
    /// secp256r1 / P-256.
    Secp256r1,
    /// secp384r1 / P-384.
    Secp384r1,
    /// secp521r1 / P-521 (not implemented).
    Secp521r1,
    /// X25519.
    X25519,
    /// X448 (not implemented).
    X448,
    /// Any other curve.
    Unknown(u16),
}

impl Default for NamedCurve {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl NamedCurve {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0017 => NamedCurve::Secp256r1,
            0x0018 => NamedCurve::Secp384r1,
            0x0019 => NamedCurve::Secp521r1,
            0x001D => NamedCurve::X25519,
            0x001E => NamedCurve::X448,
            _ => NamedCurve::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            NamedCurve::Secp256r1 => 0x0017,
            NamedCurve::Secp384r1 => 0x0018,
            NamedCurve::Secp521r1 => 0x0019,
            NamedCurve::X25519 => 0x001D,
            NamedCurve::X448 => 0x001E,
            NamedCurve::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], NamedCurve> {
        let (input, value) = be_u16(input)?;
        Ok((input, NamedCurve::from_u16(value)))
    }

    /// Whether a key pair can be generated for this curve.
    pub fn is_supported(&self) -> bool {
        matches!(
            self,
            NamedCurve::X25519 | NamedCurve::Secp256r1 | NamedCurve::Secp384r1
        )
    }

    /// Supported curves in order of preference.
    pub fn supported() -> ArrayVec<[NamedCurve; 8]> {
        let mut curves = ArrayVec::new();
        curves.push(NamedCurve::X25519);
        curves.push(NamedCurve::Secp256r1);
        curves.push(NamedCurve::Secp384r1);
        curves
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveType {
    ExplicitPrime,
    ExplicitChar2,
    NamedCurve,
    Unknown(u8),
}

impl Default for CurveType {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl CurveType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => CurveType::ExplicitPrime,
            2 => CurveType::ExplicitChar2,
            3 => CurveType::NamedCurve,
            _ => CurveType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            CurveType::ExplicitPrime => 1,
            CurveType::ExplicitChar2 => 2,
            CurveType::NamedCurve => 3,
            CurveType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], CurveType> {
        let (input, value) = be_u8(input)?;
        Ok((input, CurveType::from_u8(value)))
    }
}
