use nom::bytes::complete::take;
use nom::combinator::map;
use nom::IResult;

/// verify_data is 12 bytes for all the GCM suites we negotiate.
pub const VERIFY_DATA_LEN: usize = 12;

/// The PRF over the handshake transcript, sent as the first message of epoch 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Finished<'a> {
    pub verify_data: &'a [u8],
}

impl<'a> Finished<'a> {
    pub fn new(verify_data: &'a [u8]) -> Self {
        Finished { verify_data }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Finished<'a>> {
        map(take(VERIFY_DATA_LEN), Finished::new)(input)
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(self.verify_data);
    }

    /// Compare against locally computed verify_data without an early exit.
    pub fn matches(&self, expected: &[u8]) -> bool {
        if self.verify_data.len() != expected.len() {
            return false;
        }
        self.verify_data
            .iter()
            .zip(expected)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}
