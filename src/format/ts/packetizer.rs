//! Slices PSI sections and PES packets into 188-byte transport packets.

use super::psi::PsiSection;
use super::types::*;
use crate::error::{Result, TsflowError};
use crate::utils::BitWriter;

/// Continuity and discontinuity bookkeeping for one PID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidState {
    pub pid: u16,
    /// Counter value the next payload-carrying packet will use.
    continuity: u8,
    discontinuity_pending: bool,
}

impl PidState {
    pub fn new(pid: u16) -> Self {
        Self {
            pid,
            continuity: 0,
            discontinuity_pending: false,
        }
    }

    pub fn continuity_counter(&self) -> u8 {
        self.continuity
    }

    /// Flags the next packet on this PID with the discontinuity indicator.
    pub fn mark_discontinuity(&mut self) {
        self.discontinuity_pending = true;
    }

    pub fn discontinuity_pending(&self) -> bool {
        self.discontinuity_pending
    }

    fn advance(&mut self) -> u8 {
        let counter = self.continuity;
        self.continuity = (counter + 1) & 0x0f;
        counter
    }

    fn take_discontinuity(&mut self) -> bool {
        std::mem::take(&mut self.discontinuity_pending)
    }
}

/// Adaptation field content for the first packet of a unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitStart {
    pub random_access: bool,
    /// PCR in 27 MHz units.
    pub pcr: Option<u64>,
}

/// Slices one logical unit into packets, setting PUSI on the first one.
///
/// Short final packets are padded with adaptation field stuffing; the
/// payload bytes always run to the end of the packet.
pub fn packetize(state: &mut PidState, data: &[u8], start: UnitStart) -> Result<Vec<TsPacket>> {
    if data.is_empty() {
        return Err(TsflowError::Muxing(format!(
            "empty unit for PID 0x{:04x}",
            state.pid
        )));
    }

    let mut packets = Vec::with_capacity(data.len() / TS_PAYLOAD_SIZE + 1);
    let mut offset = 0;
    while offset < data.len() {
        let first = offset == 0;
        let mut field = AdaptationField {
            discontinuity: first && state.take_discontinuity(),
            random_access: first && start.random_access,
            pcr: if first { start.pcr } else { None },
            ..Default::default()
        };

        let remaining = data.len() - offset;
        let reserved = if field.has_flags() {
            1 + field.content_len()
        } else {
            0
        };
        let chunk = remaining.min(TS_PAYLOAD_SIZE - reserved);
        let has_field = reserved > 0 || chunk < TS_PAYLOAD_SIZE;
        if has_field {
            field.stuffing = TS_PAYLOAD_SIZE - chunk - 1 - field.content_len();
        }

        let header = TSHeader {
            payload_unit_start: first,
            pid: state.pid,
            adaptation_field_exists: has_field,
            contains_payload: true,
            continuity_counter: state.advance(),
            ..Default::default()
        };

        let mut writer = BitWriter::with_capacity(TS_PACKET_SIZE);
        header.write_to(&mut writer);
        if has_field {
            field.write_to(&mut writer)?;
        }
        writer.write_bytes(&data[offset..offset + chunk]);
        debug_assert_eq!(writer.byte_len(), TS_PACKET_SIZE);
        packets.push(TsPacket::from_bytes(writer.to_bytes())?);

        offset += chunk;
    }
    Ok(packets)
}

/// Packetizes a PSI section behind a zero pointer field.
pub fn packetize_section(state: &mut PidState, section: &PsiSection) -> Result<Vec<TsPacket>> {
    let mut data = Vec::with_capacity(1 + section.bytes.len());
    data.push(0);
    data.extend_from_slice(&section.bytes);
    packetize(state, &data, UnitStart::default())
}

/// An adaptation-only packet carrying just a PCR.
///
/// The packet has no payload, so the continuity counter repeats the
/// previous packet's value and does not advance.
pub fn pcr_packet(state: &mut PidState, pcr: u64) -> Result<TsPacket> {
    let field = AdaptationField {
        discontinuity: state.take_discontinuity(),
        pcr: Some(pcr),
        stuffing: TS_PAYLOAD_SIZE - 1 - 1 - PCR_FIELD_SIZE,
        ..Default::default()
    };
    let header = TSHeader {
        pid: state.pid,
        adaptation_field_exists: true,
        contains_payload: false,
        continuity_counter: state.continuity.wrapping_sub(1) & 0x0f,
        ..Default::default()
    };

    let mut writer = BitWriter::with_capacity(TS_PACKET_SIZE);
    header.write_to(&mut writer);
    field.write_to(&mut writer)?;
    TsPacket::from_bytes(writer.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_exact_fit_has_no_adaptation_field() {
        let mut state = PidState::new(0x100);
        let packets = packetize(&mut state, &[0xaa; 184], UnitStart::default()).unwrap();
        assert_eq!(packets.len(), 1);
        assert!(!packets[0].has_adaptation_field());
        assert!(packets[0].payload_unit_start());
        assert_eq!(packets[0].payload(), &[0xaa; 184][..]);
        assert_eq!(state.continuity_counter(), 1);
    }

    #[test]
    fn test_one_byte_short_uses_empty_adaptation_field() {
        let mut state = PidState::new(0x100);
        let packets = packetize(&mut state, &[0xaa; 183], UnitStart::default()).unwrap();
        let bytes = packets[0].as_bytes();
        assert_eq!(bytes[3], 0x30);
        assert_eq!(bytes[4], 0x00);
        assert_eq!(&bytes[5..], &[0xaa; 183][..]);
    }

    #[test]
    fn test_short_unit_is_stuffed() {
        let mut state = PidState::new(0x101);
        let packets = packetize(&mut state, &[1, 2, 3], UnitStart::default()).unwrap();
        let bytes = packets[0].as_bytes();
        assert_eq!(bytes.len(), TS_PACKET_SIZE);
        assert_eq!(bytes[4] as usize, 184 - 3 - 1);
        assert_eq!(bytes[5], 0x00);
        assert!(bytes[6..185].iter().all(|b| *b == 0xff));
        assert_eq!(&bytes[185..], &[1, 2, 3]);
    }

    #[test]
    fn test_pcr_and_random_access_only_on_first_packet() {
        let mut state = PidState::new(0x100);
        let start = UnitStart {
            random_access: true,
            pcr: Some(0),
        };
        let packets = packetize(&mut state, &[0u8; 400], start).unwrap();
        assert_eq!(packets.len(), 3);

        let first = packets[0].as_bytes();
        assert_eq!(first[4], 7);
        assert_eq!(first[5], 0x50);
        assert_eq!(packets[0].payload().len(), 176);

        assert!(!packets[1].has_adaptation_field());
        assert!(!packets[1].payload_unit_start());
        assert_eq!(packets[2].payload().len(), 400 - 176 - 184);

        let counters: Vec<u8> = packets.iter().map(TsPacket::continuity_counter).collect();
        assert_eq!(counters, vec![0, 1, 2]);
    }

    #[test]
    fn test_discontinuity_flag_is_consumed_once() {
        let mut state = PidState::new(0x100);
        state.mark_discontinuity();
        let packets = packetize(&mut state, &[0u8; 200], UnitStart::default()).unwrap();
        assert_eq!(packets[0].as_bytes()[5] & 0x80, 0x80);
        assert!(!state.discontinuity_pending());

        let packets = packetize(&mut state, &[0u8; 10], UnitStart::default()).unwrap();
        assert_eq!(packets[0].as_bytes()[5] & 0x80, 0);
    }

    #[test]
    fn test_counter_wraps() {
        let mut state = PidState::new(0x100);
        let packets = packetize(&mut state, &vec![0u8; 184 * 17], UnitStart::default()).unwrap();
        assert_eq!(packets[15].continuity_counter(), 15);
        assert_eq!(packets[16].continuity_counter(), 0);
    }

    #[test]
    fn test_pcr_packet_keeps_counter() {
        let mut state = PidState::new(PID_DEDICATED_PCR);
        let packet = pcr_packet(&mut state, 27_000_000).unwrap();
        let bytes = packet.as_bytes();
        assert_eq!(bytes[3] & 0x30, 0x20);
        assert_eq!(bytes[4], 183);
        assert_eq!(bytes[5], 0x10);
        assert!(packet.payload().is_empty());
        assert_eq!(state.continuity_counter(), 0);
    }

    #[test]
    fn test_section_starts_with_pointer_field() {
        let mut state = PidState::new(PID_PAT);
        let section = PsiSection {
            table_id: TABLE_ID_PAT,
            version: 0,
            bytes: bytes::Bytes::from_static(&[0x00, 0xb0, 0x0d]),
        };
        let packets = packetize_section(&mut state, &section).unwrap();
        assert_eq!(packets[0].payload(), &[0x00, 0x00, 0xb0, 0x0d]);
    }
}
