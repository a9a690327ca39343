//! Parsing of emitted transport streams: packet headers, adaptation fields,
//! PSI sections and PES headers.

use super::pes::PESHeader;
use super::psi::Descriptor;
use super::types::*;
use crate::error::{Result, TsflowError};
use crate::utils::{BitReader, Crc32Mpeg2};
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;

/// A CRC-checked long-form PSI section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub table_id: u8,
    pub table_id_extension: u16,
    pub version: u8,
    pub current_next: bool,
    /// Bytes between the header and the CRC.
    pub body: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatEntry {
    pub program_number: u16,
    pub pid: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pat {
    pub transport_stream_id: u16,
    pub version: u8,
    pub entries: Vec<PatEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PmtStream {
    pub stream_type: u8,
    pub pid: u16,
    pub descriptors: Vec<Descriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pmt {
    pub program_number: u16,
    pub version: u8,
    pub pcr_pid: u16,
    pub streams: Vec<PmtStream>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdtService {
    pub service_id: u16,
    pub running_status: u8,
    pub descriptors: Vec<Descriptor>,
}

impl SdtService {
    /// Service type, provider name and service name from the service descriptor.
    pub fn names(&self) -> Option<(u8, String, String)> {
        let descriptor = self
            .descriptors
            .iter()
            .find(|d| d.tag == DESCRIPTOR_SERVICE)?;
        let data = &descriptor.data;
        let service_type = *data.first()?;
        let provider_len = *data.get(1)? as usize;
        let provider = data.get(2..2 + provider_len)?;
        let name_len = *data.get(2 + provider_len)? as usize;
        let name = data.get(3 + provider_len..3 + provider_len + name_len)?;
        Some((
            service_type,
            String::from_utf8_lossy(provider).into_owned(),
            String::from_utf8_lossy(name).into_owned(),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sdt {
    pub transport_stream_id: u16,
    pub original_network_id: u16,
    pub version: u8,
    pub services: Vec<SdtService>,
}

/// Stateful parser: reassembles PSI sections that span packets.
#[derive(Debug, Default)]
pub struct TSPacketParser {
    sections: HashMap<u16, BytesMut>,
}

impl TSPacketParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse_header(&self, data: &[u8]) -> Result<TSHeader> {
        if data.len() < TS_HEADER_SIZE {
            return Err(TsflowError::InvalidData("TS packet too short".into()));
        }
        if data[0] != TS_SYNC_BYTE {
            return Err(TsflowError::InvalidData("Invalid sync byte".into()));
        }

        let mut reader = BitReader::new(&data[1..TS_HEADER_SIZE]);
        Ok(TSHeader {
            transport_error: reader.read_bit()?,
            payload_unit_start: reader.read_bit()?,
            transport_priority: reader.read_bit()?,
            pid: reader.read_bits(13)? as u16,
            scrambling_control: reader.read_bits(2)? as u8,
            adaptation_field_exists: reader.read_bit()?,
            contains_payload: reader.read_bit()?,
            continuity_counter: reader.read_bits(4)? as u8,
        })
    }

    /// Decodes the adaptation field of a packet, if it has one.
    ///
    /// `stuffing` is reported as the bytes left after the decoded fields.
    pub fn parse_adaptation_field(&self, data: &[u8]) -> Result<Option<AdaptationField>> {
        let header = self.parse_header(data)?;
        if !header.adaptation_field_exists {
            return Ok(None);
        }

        let length = *data
            .get(TS_HEADER_SIZE)
            .ok_or_else(|| TsflowError::InvalidData("Adaptation field missing".into()))?
            as usize;
        if length == 0 {
            return Ok(Some(AdaptationField::default()));
        }
        let field = data
            .get(TS_HEADER_SIZE + 1..TS_HEADER_SIZE + 1 + length)
            .ok_or_else(|| TsflowError::InvalidData("Adaptation field too short".into()))?;

        let mut reader = BitReader::new(field);
        let mut parsed = AdaptationField {
            discontinuity: reader.read_bit()?,
            random_access: reader.read_bit()?,
            es_priority: reader.read_bit()?,
            ..Default::default()
        };
        let pcr_flag = reader.read_bit()?;
        reader.skip_bits(4)?;
        let mut used = 1;

        if pcr_flag {
            let base = reader.read_bits(33)?;
            reader.skip_bits(6)?;
            let extension = reader.read_bits(9)?;
            parsed.pcr = Some(base * 300 + extension);
            used += PCR_FIELD_SIZE;
        }
        parsed.stuffing = length - used;
        Ok(Some(parsed))
    }

    /// Parses and CRC-checks one section starting at `data[0]` (the table id).
    pub fn parse_section(&self, data: &[u8]) -> Result<Section> {
        if data.len() < 3 {
            return Err(TsflowError::Parser("section header truncated".into()));
        }
        let section_length = (((data[1] & 0x0f) as usize) << 8) | data[2] as usize;
        let total = 3 + section_length;
        if section_length < 9 || data.len() < total {
            return Err(TsflowError::Parser(format!(
                "section of {} bytes is truncated",
                section_length
            )));
        }
        let section = &data[..total];
        if !Crc32Mpeg2::verify(section) {
            return Err(TsflowError::Parser(format!(
                "CRC mismatch in table 0x{:02x}",
                section[0]
            )));
        }

        let mut reader = BitReader::new(&section[3..8]);
        let table_id_extension = reader.read_bits(16)? as u16;
        reader.skip_bits(2)?;
        let version = reader.read_bits(5)? as u8;
        let current_next = reader.read_bit()?;

        Ok(Section {
            table_id: section[0],
            table_id_extension,
            version,
            current_next,
            body: Bytes::copy_from_slice(&section[8..total - 4]),
        })
    }

    /// Feeds one packet of a PSI PID. Returns a section once it is complete.
    pub fn push_section_packet(&mut self, packet: &TsPacket) -> Result<Option<Section>> {
        let pid = packet.pid();
        let mut payload = packet.payload();
        if payload.is_empty() {
            return Ok(None);
        }

        if packet.payload_unit_start() {
            let pointer = payload[0] as usize;
            payload = payload
                .get(1 + pointer..)
                .ok_or_else(|| TsflowError::Parser("pointer field out of range".into()))?;
            self.sections.insert(pid, BytesMut::from(payload));
        } else if let Some(buffer) = self.sections.get_mut(&pid) {
            buffer.extend_from_slice(payload);
        } else {
            // joined mid-section
            return Ok(None);
        }

        let Some(buffer) = self.sections.get(&pid) else {
            return Ok(None);
        };
        if buffer.len() < 3 {
            return Ok(None);
        }
        let total = 3 + ((((buffer[1] & 0x0f) as usize) << 8) | buffer[2] as usize);
        if buffer.len() < total {
            return Ok(None);
        }
        let section = self.parse_section(buffer);
        self.sections.remove(&pid);
        section.map(Some)
    }

    pub fn parse_pat(&self, section: &Section) -> Result<Pat> {
        expect_table(section, TABLE_ID_PAT)?;
        let mut entries = Vec::new();
        for entry in section.body.chunks_exact(4) {
            let mut reader = BitReader::new(entry);
            let program_number = reader.read_bits(16)? as u16;
            reader.skip_bits(3)?;
            let pid = reader.read_bits(13)? as u16;
            entries.push(PatEntry {
                program_number,
                pid,
            });
        }
        Ok(Pat {
            transport_stream_id: section.table_id_extension,
            version: section.version,
            entries,
        })
    }

    pub fn parse_pmt(&self, section: &Section) -> Result<Pmt> {
        expect_table(section, TABLE_ID_PMT)?;
        let data = &section.body;
        if data.len() < 4 {
            return Err(TsflowError::Parser("PMT too short".into()));
        }
        let pcr_pid = (((data[0] & 0x1f) as u16) << 8) | data[1] as u16;
        let program_info_length = (((data[2] & 0x0f) as usize) << 8) | data[3] as usize;
        let mut pos = 4 + program_info_length;

        let mut streams = Vec::new();
        while pos + 5 <= data.len() {
            let stream_type = data[pos];
            let pid = (((data[pos + 1] & 0x1f) as u16) << 8) | data[pos + 2] as u16;
            let es_info_length = (((data[pos + 3] & 0x0f) as usize) << 8) | data[pos + 4] as usize;
            pos += 5;
            let info = data
                .get(pos..pos + es_info_length)
                .ok_or_else(|| TsflowError::Parser("ES info data too short".into()))?;
            streams.push(PmtStream {
                stream_type,
                pid,
                descriptors: parse_descriptors(info)?,
            });
            pos += es_info_length;
        }

        Ok(Pmt {
            program_number: section.table_id_extension,
            version: section.version,
            pcr_pid,
            streams,
        })
    }

    pub fn parse_sdt(&self, section: &Section) -> Result<Sdt> {
        expect_table(section, TABLE_ID_SDT)?;
        let data = &section.body;
        if data.len() < 3 {
            return Err(TsflowError::Parser("SDT too short".into()));
        }
        let original_network_id = ((data[0] as u16) << 8) | data[1] as u16;
        let mut pos = 3;

        let mut services = Vec::new();
        while pos + 5 <= data.len() {
            let mut reader = BitReader::new(&data[pos..pos + 5]);
            let service_id = reader.read_bits(16)? as u16;
            reader.skip_bits(8)?; // reserved, EIT flags
            let running_status = reader.read_bits(3)? as u8;
            reader.skip_bits(1)?;
            let loop_length = reader.read_bits(12)? as usize;
            pos += 5;
            let loop_data = data
                .get(pos..pos + loop_length)
                .ok_or_else(|| TsflowError::Parser("SDT descriptor loop too short".into()))?;
            services.push(SdtService {
                service_id,
                running_status,
                descriptors: parse_descriptors(loop_data)?,
            });
            pos += loop_length;
        }

        Ok(Sdt {
            transport_stream_id: section.table_id_extension,
            original_network_id,
            version: section.version,
            services,
        })
    }

    /// Decodes the PES header at the start of a PUSI payload.
    pub fn parse_pes_header(&self, data: &[u8]) -> Result<PESHeader> {
        if data.len() < 9 || data[..3] != [0x00, 0x00, 0x01] {
            return Err(TsflowError::Parser("missing PES start code".into()));
        }
        let mut header = PESHeader::new(data[3]);
        header.packet_length = ((data[4] as u16) << 8) | data[5] as u16;
        header.data_alignment = data[6] & 0x04 != 0;

        let flags = data[7] >> 6;
        let header_data_len = data[8] as usize;
        let optional = data
            .get(9..9 + header_data_len)
            .ok_or_else(|| TsflowError::Parser("PES header truncated".into()))?;
        let mut reader = BitReader::new(optional);
        if flags & 0b10 != 0 {
            header.pts = Some(read_timestamp(&mut reader)?);
        }
        if flags == 0b11 {
            header.dts = Some(read_timestamp(&mut reader)?);
        }
        Ok(header)
    }
}

fn expect_table(section: &Section, table_id: u8) -> Result<()> {
    if section.table_id != table_id {
        return Err(TsflowError::Parser(format!(
            "expected table 0x{:02x}, found 0x{:02x}",
            table_id, section.table_id
        )));
    }
    Ok(())
}

fn read_timestamp(reader: &mut BitReader) -> Result<u64> {
    reader.skip_bits(4)?;
    let high = reader.read_bits(3)?;
    reader.skip_bits(1)?;
    let mid = reader.read_bits(15)?;
    reader.skip_bits(1)?;
    let low = reader.read_bits(15)?;
    reader.skip_bits(1)?;
    Ok((high << 30) | (mid << 15) | low)
}

fn parse_descriptors(data: &[u8]) -> Result<Vec<Descriptor>> {
    let mut descriptors = Vec::new();
    let mut pos = 0;

    while pos + 2 <= data.len() {
        let tag = data[pos];
        let length = data[pos + 1] as usize;
        pos += 2;
        let payload = data
            .get(pos..pos + length)
            .ok_or_else(|| TsflowError::Parser("Descriptor data too short".into()))?;
        descriptors.push(Descriptor::new(tag, payload.to_vec())?);
        pos += length;
    }

    Ok(descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::av::CodecType;
    use crate::format::ts::packetizer::{packetize_section, PidState};
    use crate::format::ts::psi::{
        ElementaryStreamDescriptor, ServiceDescriptor, ServiceType, TableBuilder,
    };
    use pretty_assertions::assert_eq;

    fn builder() -> TableBuilder {
        let mut builder = TableBuilder::new(
            ServiceDescriptor::new(0x4698, ServiceType::DigitalTv, "tsflow", "news"),
            7,
            PID_PMT,
        );
        builder.set_streams(
            vec![
                ElementaryStreamDescriptor::new(CodecType::H265, 0x100).unwrap(),
                ElementaryStreamDescriptor::new(CodecType::AAC, 0x101)
                    .unwrap()
                    .with_descriptor(Descriptor::language("deu").unwrap()),
            ],
            0x100,
        );
        builder
    }

    #[test]
    fn test_parse_ts_header() {
        let parser = TSPacketParser::new();
        let header = parser.parse_header(&[0x47, 0x41, 0x00, 0x3a]).unwrap();
        assert!(header.payload_unit_start);
        assert_eq!(header.pid, 0x100);
        assert!(header.adaptation_field_exists);
        assert!(header.contains_payload);
        assert_eq!(header.continuity_counter, 0x0a);

        assert!(parser.parse_header(&[0x46, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_pat_and_pmt_round_trip() {
        let parser = TSPacketParser::new();
        let tables = builder();

        let pat = parser
            .parse_pat(&parser.parse_section(&tables.pat().unwrap().bytes).unwrap())
            .unwrap();
        assert_eq!(pat.transport_stream_id, 7);
        assert_eq!(
            pat.entries,
            vec![PatEntry {
                program_number: 0x4698,
                pid: PID_PMT
            }]
        );

        let pmt = parser
            .parse_pmt(&parser.parse_section(&tables.pmt().unwrap().bytes).unwrap())
            .unwrap();
        assert_eq!(pmt.program_number, 0x4698);
        assert_eq!(pmt.pcr_pid, 0x100);
        assert_eq!(pmt.streams.len(), 2);
        assert_eq!(pmt.streams[0].stream_type, STREAM_TYPE_H265);
        assert_eq!(pmt.streams[0].descriptors[0].data, b"HEVC".to_vec());
        assert_eq!(pmt.streams[1].descriptors[0].data, b"deu\0".to_vec());
    }

    #[test]
    fn test_sdt_round_trip() {
        let parser = TSPacketParser::new();
        let sdt = parser
            .parse_sdt(&parser.parse_section(&builder().sdt().unwrap().bytes).unwrap())
            .unwrap();
        assert_eq!(sdt.transport_stream_id, 7);
        assert_eq!(sdt.original_network_id, 0xff01);
        assert_eq!(sdt.services[0].service_id, 0x4698);
        assert_eq!(sdt.services[0].running_status, 4);
        assert_eq!(
            sdt.services[0].names(),
            Some((0x01, "tsflow".to_string(), "news".to_string()))
        );
    }

    #[test]
    fn test_corrupted_section_is_rejected() {
        let parser = TSPacketParser::new();
        let mut bytes = builder().pat().unwrap().bytes.to_vec();
        bytes[9] ^= 0x01;
        assert!(parser.parse_section(&bytes).is_err());
    }

    #[test]
    fn test_reassembly_from_packets() {
        let mut parser = TSPacketParser::new();
        let mut state = PidState::new(PID_PMT);
        let packets = packetize_section(&mut state, &builder().pmt().unwrap()).unwrap();
        let section = parser.push_section_packet(&packets[0]).unwrap().unwrap();
        assert_eq!(section.table_id, TABLE_ID_PMT);
    }

    #[test]
    fn test_pes_timestamps() {
        let parser = TSPacketParser::new();
        let data = [
            0x00, 0x00, 0x01, 0xe0, 0x00, 0x00, 0x84, 0xc0, 0x0a, 0x31, 0x00, 0x01, 0x1c, 0x21,
            0x11, 0x00, 0x01, 0x00, 0x01,
        ];
        let header = parser.parse_pes_header(&data).unwrap();
        assert_eq!(header.stream_id, STREAM_ID_VIDEO);
        assert!(header.data_alignment);
        assert_eq!(header.pts, Some(3600));
        assert_eq!(header.dts, Some(0));
    }
}
