//! Program Specific Information: PAT, PMT and SDT sections.
//!
//! Sections are rebuilt from the registered service and stream set on every
//! PSI cycle. The version number is shared by all tables and moves (mod 32)
//! only when the stream set changes.

use super::types::*;
use crate::av::{CodecType, MediaKind};
use crate::error::{Result, TsflowError};
use crate::utils::{BitWriter, Crc32Mpeg2};
use bytes::{BufMut, Bytes, BytesMut};

const MAX_SECTION_LENGTH: usize = 1021;
const ORIGINAL_NETWORK_ID: u16 = 0xff01;
const RUNNING_STATUS_RUNNING: u64 = 4;

/// DVB service types advertised in the SDT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceType {
    DigitalTv = 0x01,
    DigitalRadio = 0x02,
    Teletext = 0x03,
    AdvancedCodecDigitalRadio = 0x0a,
    Mpeg2HdDigitalTv = 0x11,
    AdvancedCodecSdDigitalTv = 0x16,
    AdvancedCodecHdDigitalTv = 0x19,
    HevcDigitalTv = 0x1f,
}

impl TryFrom<u8> for ServiceType {
    type Error = TsflowError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0x01 => ServiceType::DigitalTv,
            0x02 => ServiceType::DigitalRadio,
            0x03 => ServiceType::Teletext,
            0x0a => ServiceType::AdvancedCodecDigitalRadio,
            0x11 => ServiceType::Mpeg2HdDigitalTv,
            0x16 => ServiceType::AdvancedCodecSdDigitalTv,
            0x19 => ServiceType::AdvancedCodecHdDigitalTv,
            0x1f => ServiceType::HevcDigitalTv,
            other => {
                return Err(TsflowError::Configuration(format!(
                    "unknown service type 0x{:02x}",
                    other
                )))
            }
        })
    }
}

/// The single program carried by the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub id: u16,
    pub service_type: ServiceType,
    pub provider_name: String,
    pub name: String,
}

impl ServiceDescriptor {
    pub fn new(id: u16, service_type: ServiceType, provider_name: &str, name: &str) -> Self {
        Self {
            id,
            service_type,
            provider_name: provider_name.to_string(),
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub tag: u8,
    pub data: Vec<u8>,
}

impl Descriptor {
    pub fn new(tag: u8, data: Vec<u8>) -> Result<Self> {
        if data.len() > u8::MAX as usize {
            return Err(TsflowError::Configuration(format!(
                "descriptor 0x{:02x} payload of {} bytes is too long",
                tag,
                data.len()
            )));
        }
        Ok(Self { tag, data })
    }

    /// ISO 639 language descriptor, audio type "undefined".
    pub fn language(code: &str) -> Result<Self> {
        let mut data = code.as_bytes().to_vec();
        data.push(0);
        Self::new(DESCRIPTOR_ISO_639_LANGUAGE, data)
    }

    pub fn registration(format_identifier: &[u8; 4]) -> Self {
        Self {
            tag: DESCRIPTOR_REGISTRATION,
            data: format_identifier.to_vec(),
        }
    }

    pub fn service(service: &ServiceDescriptor) -> Result<Self> {
        let provider = service.provider_name.as_bytes();
        let name = service.name.as_bytes();
        if provider.len() > u8::MAX as usize || name.len() > u8::MAX as usize {
            return Err(TsflowError::Configuration(
                "provider and service names are limited to 255 bytes".into(),
            ));
        }
        let mut data = Vec::with_capacity(3 + provider.len() + name.len());
        data.push(service.service_type as u8);
        data.push(provider.len() as u8);
        data.extend_from_slice(provider);
        data.push(name.len() as u8);
        data.extend_from_slice(name);
        Self::new(DESCRIPTOR_SERVICE, data)
    }

    pub fn len(&self) -> usize {
        2 + self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn write_to(&self, writer: &mut BitWriter) {
        writer.write_bits(self.tag as u64, 8);
        writer.write_bits(self.data.len() as u64, 8);
        writer.write_bytes(&self.data);
    }
}

fn descriptors_len(descriptors: &[Descriptor]) -> usize {
    descriptors.iter().map(Descriptor::len).sum()
}

/// One registered elementary stream of the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementaryStreamDescriptor {
    pub pid: u16,
    pub stream_type: u8,
    pub stream_id: u8,
    pub kind: MediaKind,
    pub codec: CodecType,
    pub descriptors: Vec<Descriptor>,
}

impl ElementaryStreamDescriptor {
    /// Describes a `codec` stream on `pid`. Fails for codecs TS cannot carry.
    pub fn new(codec: CodecType, pid: u16) -> Result<Self> {
        let (stream_type, stream_id, descriptors) = match codec {
            CodecType::H264 => (STREAM_TYPE_H264, STREAM_ID_VIDEO, Vec::new()),
            CodecType::H265 => (
                STREAM_TYPE_H265,
                STREAM_ID_VIDEO,
                vec![Descriptor::registration(b"HEVC")],
            ),
            CodecType::AAC => (STREAM_TYPE_AAC, STREAM_ID_AUDIO, Vec::new()),
            other => {
                return Err(TsflowError::Configuration(format!(
                    "no transport stream mapping for {:?}",
                    other
                )))
            }
        };
        Ok(Self {
            pid,
            stream_type,
            stream_id,
            kind: codec.kind(),
            codec,
            descriptors,
        })
    }

    pub fn with_descriptor(mut self, descriptor: Descriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }
}

/// A complete long-form section, CRC included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsiSection {
    pub table_id: u8,
    pub version: u8,
    pub bytes: Bytes,
}

fn build_section(
    table_id: u8,
    table_id_extension: u16,
    version: u8,
    private_bit: bool,
    body: &[u8],
) -> Result<PsiSection> {
    let section_length = 5 + body.len() + 4;
    if section_length > MAX_SECTION_LENGTH {
        return Err(TsflowError::Muxing(format!(
            "section 0x{:02x} of {} bytes exceeds the PSI limit",
            table_id, section_length
        )));
    }

    let mut writer = BitWriter::with_capacity(3 + section_length);
    writer.write_bits(table_id as u64, 8);
    writer.write_bit(true); // section_syntax_indicator
    writer.write_bit(private_bit);
    writer.write_bits(0b11, 2);
    writer.write_bits(section_length as u64, 12);
    writer.write_bits(table_id_extension as u64, 16);
    writer.write_bits(0b11, 2);
    writer.write_bits((version & 0x1f) as u64, 5);
    writer.write_bit(true); // current_next_indicator
    writer.write_bits(0, 8); // section_number
    writer.write_bits(0, 8); // last_section_number
    writer.write_bytes(body);
    let section = writer.to_bytes();

    let mut bytes = BytesMut::with_capacity(section.len() + 4);
    bytes.put_slice(&section);
    bytes.put_u32(Crc32Mpeg2::checksum(&section));
    Ok(PsiSection {
        table_id,
        version,
        bytes: bytes.freeze(),
    })
}

/// Builds and versions the PSI tables for one service.
#[derive(Debug, Clone)]
pub struct TableBuilder {
    service: ServiceDescriptor,
    transport_stream_id: u16,
    pmt_pid: u16,
    pcr_pid: u16,
    streams: Vec<ElementaryStreamDescriptor>,
    version: u8,
    registered: bool,
}

impl TableBuilder {
    pub fn new(service: ServiceDescriptor, transport_stream_id: u16, pmt_pid: u16) -> Self {
        Self {
            service,
            transport_stream_id,
            pmt_pid,
            pcr_pid: PID_NULL,
            streams: Vec::new(),
            version: 0,
            registered: false,
        }
    }

    pub fn service(&self) -> &ServiceDescriptor {
        &self.service
    }

    pub fn pmt_pid(&self) -> u16 {
        self.pmt_pid
    }

    pub fn pcr_pid(&self) -> u16 {
        self.pcr_pid
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn streams(&self) -> &[ElementaryStreamDescriptor] {
        &self.streams
    }

    /// Replaces the stream set. Returns whether the version moved.
    pub fn set_streams(&mut self, streams: Vec<ElementaryStreamDescriptor>, pcr_pid: u16) -> bool {
        if !self.registered {
            self.registered = true;
            self.streams = streams;
            self.pcr_pid = pcr_pid;
            return false;
        }
        if self.streams == streams && self.pcr_pid == pcr_pid {
            return false;
        }
        self.streams = streams;
        self.pcr_pid = pcr_pid;
        self.version = (self.version + 1) % 32;
        true
    }

    pub fn pat(&self) -> Result<PsiSection> {
        let mut body = BitWriter::with_capacity(4);
        body.write_bits(self.service.id as u64, 16);
        body.write_bits(0b111, 3);
        body.write_bits(self.pmt_pid as u64, 13);
        build_section(
            TABLE_ID_PAT,
            self.transport_stream_id,
            self.version,
            false,
            &body.to_bytes(),
        )
    }

    pub fn pmt(&self) -> Result<PsiSection> {
        let mut body = BitWriter::new();
        body.write_bits(0b111, 3);
        body.write_bits(self.pcr_pid as u64, 13);
        body.write_bits(0b1111, 4);
        body.write_bits(0, 12); // program_info_length

        for stream in &self.streams {
            let es_info_length = descriptors_len(&stream.descriptors);
            if es_info_length > 0x3ff {
                return Err(TsflowError::Muxing(format!(
                    "descriptors of PID 0x{:04x} are too long",
                    stream.pid
                )));
            }
            body.write_bits(stream.stream_type as u64, 8);
            body.write_bits(0b111, 3);
            body.write_bits(stream.pid as u64, 13);
            body.write_bits(0b1111, 4);
            body.write_bits(es_info_length as u64, 12);
            for descriptor in &stream.descriptors {
                descriptor.write_to(&mut body);
            }
        }

        build_section(
            TABLE_ID_PMT,
            self.service.id,
            self.version,
            false,
            &body.to_bytes(),
        )
    }

    pub fn sdt(&self) -> Result<PsiSection> {
        let service_descriptor = Descriptor::service(&self.service)?;

        let mut body = BitWriter::new();
        body.write_bits(ORIGINAL_NETWORK_ID as u64, 16);
        body.write_bits(0xff, 8);
        body.write_bits(self.service.id as u64, 16);
        body.write_bits(0b111111, 6);
        body.write_bit(false); // EIT_schedule_flag
        body.write_bit(false); // EIT_present_following_flag
        body.write_bits(RUNNING_STATUS_RUNNING, 3);
        body.write_bit(false); // free_CA_mode
        body.write_bits(service_descriptor.len() as u64, 12);
        service_descriptor.write_to(&mut body);

        build_section(
            TABLE_ID_SDT,
            self.transport_stream_id,
            self.version,
            true,
            &body.to_bytes(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn service() -> ServiceDescriptor {
        ServiceDescriptor::new(0x4698, ServiceType::DigitalTv, "tsflow", "live")
    }

    fn streams() -> Vec<ElementaryStreamDescriptor> {
        vec![
            ElementaryStreamDescriptor::new(CodecType::H264, 0x100).unwrap(),
            ElementaryStreamDescriptor::new(CodecType::AAC, 0x101).unwrap(),
        ]
    }

    #[test]
    fn test_pat_bytes() {
        let mut builder = TableBuilder::new(service(), 1, PID_PMT);
        builder.set_streams(streams(), 0x100);
        let pat = builder.pat().unwrap();

        assert_eq!(
            &pat.bytes[..12],
            &[0x00, 0xb0, 0x0d, 0x00, 0x01, 0xc1, 0x00, 0x00, 0x46, 0x98, 0xf0, 0x00]
        );
        assert_eq!(pat.bytes.len(), 16);
        assert!(Crc32Mpeg2::verify(&pat.bytes));
    }

    #[test]
    fn test_pmt_bytes() {
        let mut builder = TableBuilder::new(service(), 1, PID_PMT);
        builder.set_streams(streams(), 0x100);
        let pmt = builder.pmt().unwrap();

        assert_eq!(
            &pmt.bytes[..pmt.bytes.len() - 4],
            &[
                0x02, 0xb0, 0x17, 0x46, 0x98, 0xc1, 0x00, 0x00, // header
                0xe1, 0x00, 0xf0, 0x00, // PCR PID, program info
                0x1b, 0xe1, 0x00, 0xf0, 0x00, // H.264
                0x0f, 0xe1, 0x01, 0xf0, 0x00, // AAC
            ]
        );
        assert!(Crc32Mpeg2::verify(&pmt.bytes));
    }

    #[test]
    fn test_version_moves_only_on_change() {
        let mut builder = TableBuilder::new(service(), 1, PID_PMT);
        assert!(!builder.set_streams(streams(), 0x100));
        assert_eq!(builder.version(), 0);

        assert!(!builder.set_streams(streams(), 0x100));
        assert_eq!(builder.version(), 0);

        let mut fewer = streams();
        fewer.pop();
        assert!(builder.set_streams(fewer, 0x100));
        assert_eq!(builder.version(), 1);
        assert_eq!(builder.pmt().unwrap().bytes[5], 0xc3);
    }

    #[test]
    fn test_version_wraps() {
        let mut builder = TableBuilder::new(service(), 1, PID_PMT);
        builder.set_streams(streams(), 0x100);
        for round in 0..32 {
            let mut changed = streams();
            changed[0].pid = 0x200 + round;
            builder.set_streams(changed, 0x200 + round);
        }
        assert_eq!(builder.version(), 0);
    }

    #[test]
    fn test_sdt_carries_names() {
        let builder = TableBuilder::new(service(), 1, PID_PMT);
        let sdt = builder.sdt().unwrap();
        assert_eq!(sdt.bytes[0], TABLE_ID_SDT);
        assert_eq!(sdt.bytes[1] & 0xf0, 0xf0);
        assert!(Crc32Mpeg2::verify(&sdt.bytes));
        let text = String::from_utf8_lossy(&sdt.bytes);
        assert!(text.contains("tsflow"));
        assert!(text.contains("live"));
    }

    #[test]
    fn test_language_descriptor() {
        let descriptor = Descriptor::language("eng").unwrap();
        assert_eq!(descriptor.tag, DESCRIPTOR_ISO_639_LANGUAGE);
        assert_eq!(descriptor.data, b"eng\0".to_vec());
        assert_eq!(descriptor.len(), 6);
    }
}
