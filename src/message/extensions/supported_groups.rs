use crate::message::NamedCurve;
use crate::util::{all_consumed, many0};
use nom::bytes::complete::take;
use nom::number::complete::be_u16;
use nom::IResult;
use tinyvec::ArrayVec;

/// Supported Groups (formerly EllipticCurves) extension, RFC 8422 5.1.1.
///
/// Unknown groups are kept in the list. Selection skips them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SupportedGroupsExtension {
    pub groups: ArrayVec<[NamedCurve; 32]>,
}

impl SupportedGroupsExtension {
    pub fn new(curves: &[NamedCurve]) -> Self {
        let mut groups = ArrayVec::new();
        for curve in curves.iter().take(32) {
            groups.push(*curve);
        }
        SupportedGroupsExtension { groups }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], SupportedGroupsExtension> {
        let (input, list_len) = be_u16(input)?;
        let (input, list) = take(list_len)(input)?;
        let (rest, groups) = many0(NamedCurve::parse)(list)?;
        all_consumed(rest)?;

        Ok((input, SupportedGroupsExtension { groups }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&((self.groups.len() * 2) as u16).to_be_bytes());
        for group in &self.groups {
            output.extend_from_slice(&group.as_u16().to_be_bytes());
        }
    }
}
