use crate::util::{all_consumed, many0};
use nom::bytes::complete::take;
use nom::number::complete::be_u8;
use nom::IResult;
use tinyvec::ArrayVec;

/// EC point format, RFC 8422 5.1.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointFormat {
    Uncompressed,
    AnsiX962CompressedPrime,
    AnsiX962CompressedChar2,
    Unknown(u8),
}

impl Default for PointFormat {
    fn default() -> Self {
        Self::Uncompressed
    }
}

impl PointFormat {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => PointFormat::Uncompressed,
            1 => PointFormat::AnsiX962CompressedPrime,
            2 => PointFormat::AnsiX962CompressedChar2,
            _ => PointFormat::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            PointFormat::Uncompressed => 0,
            PointFormat::AnsiX962CompressedPrime => 1,
            PointFormat::AnsiX962CompressedChar2 => 2,
            PointFormat::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], PointFormat> {
        let (input, value) = be_u8(input)?;
        Ok((input, PointFormat::from_u8(value)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ECPointFormatsExtension {
    pub formats: ArrayVec<[PointFormat; 8]>,
}

impl Default for ECPointFormatsExtension {
    /// Uncompressed only, the one format every implementation must support.
    fn default() -> Self {
        let mut formats = ArrayVec::new();
        formats.push(PointFormat::Uncompressed);
        ECPointFormatsExtension { formats }
    }
}

impl ECPointFormatsExtension {
    pub fn parse(input: &[u8]) -> IResult<&[u8], ECPointFormatsExtension> {
        let (input, list_len) = be_u8(input)?;
        let (input, list) = take(list_len)(input)?;
        let (rest, formats) = many0(PointFormat::parse)(list)?;
        all_consumed(rest)?;

        Ok((input, ECPointFormatsExtension { formats }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.formats.len() as u8);
        for format in &self.formats {
            output.push(format.as_u8());
        }
    }
}
