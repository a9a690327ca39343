#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NALUnitType {
    Unspecified = 0,
    CodedSliceNonIDR = 1,
    CodedSliceDataPartitionA = 2,
    CodedSliceDataPartitionB = 3,
    CodedSliceDataPartitionC = 4,
    CodedSliceIDR = 5,
    SEI = 6,
    SPS = 7,
    PPS = 8,
    AccessUnitDelimiter = 9,
    EndOfSequence = 10,
    EndOfStream = 11,
    FillerData = 12,
}

impl From<u8> for NALUnitType {
    fn from(header: u8) -> Self {
        match header & 0x1F {
            1 => NALUnitType::CodedSliceNonIDR,
            2 => NALUnitType::CodedSliceDataPartitionA,
            3 => NALUnitType::CodedSliceDataPartitionB,
            4 => NALUnitType::CodedSliceDataPartitionC,
            5 => NALUnitType::CodedSliceIDR,
            6 => NALUnitType::SEI,
            7 => NALUnitType::SPS,
            8 => NALUnitType::PPS,
            9 => NALUnitType::AccessUnitDelimiter,
            10 => NALUnitType::EndOfSequence,
            11 => NALUnitType::EndOfStream,
            12 => NALUnitType::FillerData,
            _ => NALUnitType::Unspecified,
        }
    }
}

impl NALUnitType {
    pub fn is_parameter_set(&self) -> bool {
        matches!(self, NALUnitType::SPS | NALUnitType::PPS)
    }
}
