#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use quickcheck_macros::quickcheck;
    use std::collections::HashMap;
    use std::time::Duration;
    use tsflow::av::{AccessUnit, AudioConfig, VideoConfig};
    use tsflow::format::ts::parser::{Pmt, TSPacketParser};
    use tsflow::format::ts::types::{PCR_HZ, TS_SYNC_BYTE};
    use tsflow::format::ts::{
        interleave, MuxerConfig, ServiceDescriptor, ServiceType, TsMuxer, TsPacket, PID_PAT,
        PID_PMT, STREAM_TYPE_AAC, STREAM_TYPE_H264, TS_PACKET_SIZE,
    };

    const VIDEO_PID: u16 = 0x100;
    const AUDIO_PID: u16 = 0x101;

    fn service() -> ServiceDescriptor {
        ServiceDescriptor::new(0x4698, ServiceType::DigitalTv, "tsflow", "integration")
    }

    fn av_muxer(config: MuxerConfig) -> TsMuxer {
        let mut muxer = TsMuxer::new(config);
        muxer
            .register_service(
                service(),
                vec![
                    VideoConfig::default().into(),
                    AudioConfig::default().into(),
                ],
            )
            .unwrap();
        muxer
    }

    fn on_pid(packets: &[TsPacket], pid: u16) -> Vec<&TsPacket> {
        packets.iter().filter(|p| p.pid() == pid).collect()
    }

    fn parse_pmt(packets: &[TsPacket]) -> Pmt {
        let mut parser = TSPacketParser::new();
        for packet in on_pid(packets, PID_PMT) {
            if let Some(section) = parser.push_section_packet(packet).unwrap() {
                return parser.parse_pmt(&section).unwrap();
            }
        }
        panic!("no PMT in output");
    }

    #[test]
    fn test_video_key_frame_scenario() {
        let mut muxer = av_muxer(MuxerConfig::default());
        let unit = AccessUnit::video(vec![0xab; 4000], Duration::ZERO).with_key_flag(true);
        let packets = muxer.mux(&unit).unwrap();

        assert_eq!(packets[0].pid(), PID_PAT);
        assert_eq!(packets[1].pid(), PID_PMT);

        let video = &packets[2..];
        let expected = (14 + 4000 + 183) / 184;
        assert_eq!(video.len(), expected);
        assert!(video.iter().all(|p| p.pid() == VIDEO_PID));

        let parser = TSPacketParser::new();
        let first = &video[0];
        assert!(first.payload_unit_start());
        assert_eq!(first.continuity_counter(), 0);
        let field = parser
            .parse_adaptation_field(first.as_bytes())
            .unwrap()
            .unwrap();
        assert!(field.random_access);
        assert_eq!(field.pcr, Some(0));

        let pes = parser.parse_pes_header(first.payload()).unwrap();
        assert_eq!(pes.pts, Some(0));
        assert_eq!(pes.packet_length, 0);

        let payload: usize = video.iter().map(|p| p.payload().len()).sum();
        assert_eq!(payload, 14 + 4000);
        assert!(video[1..].iter().all(|p| !p.payload_unit_start()));
    }

    #[test]
    fn test_audio_counter_cycles() {
        let mut muxer = av_muxer(MuxerConfig::default());
        let mut packets = Vec::new();
        for frame in 0..50u64 {
            let unit = AccessUnit::audio(vec![0x11; 200], Duration::from_micros(frame * 23_220));
            packets.extend(muxer.mux(&unit).unwrap());
        }

        assert!(on_pid(&packets, VIDEO_PID).is_empty());
        let counters: Vec<u8> = on_pid(&packets, AUDIO_PID)
            .iter()
            .map(|p| p.continuity_counter())
            .collect();
        assert!(counters.len() >= 50);
        for (index, counter) in counters.iter().enumerate() {
            assert_eq!(*counter as usize, index % 16);
        }
    }

    #[test]
    fn test_psi_round_trip() {
        let mut muxer = av_muxer(MuxerConfig::default());
        let packets = muxer
            .mux(&AccessUnit::video(vec![1; 100], Duration::ZERO))
            .unwrap();

        let mut parser = TSPacketParser::new();
        let section = parser
            .push_section_packet(&packets[0])
            .unwrap()
            .unwrap();
        let pat = parser.parse_pat(&section).unwrap();
        assert_eq!(pat.entries.len(), 1);
        assert_eq!(pat.entries[0].program_number, 0x4698);
        assert_eq!(pat.entries[0].pid, PID_PMT);

        let pmt = parse_pmt(&packets);
        assert_eq!(pmt.program_number, 0x4698);
        assert_eq!(pmt.pcr_pid, VIDEO_PID);
        let streams: Vec<(u16, u8)> = pmt.streams.iter().map(|s| (s.pid, s.stream_type)).collect();
        assert_eq!(
            streams,
            vec![(VIDEO_PID, STREAM_TYPE_H264), (AUDIO_PID, STREAM_TYPE_AAC)]
        );
    }

    #[test]
    fn test_pcr_spacing_in_stream_time() {
        let mut muxer = av_muxer(MuxerConfig::default());
        let mut units = Vec::new();
        for frame in 0..75u64 {
            units.push(
                AccessUnit::video(vec![0x22; 3000], Duration::from_millis(frame * 40))
                    .with_key_flag(frame % 25 == 0),
            );
        }
        for frame in 0..150u64 {
            units.push(AccessUnit::audio(vec![0x33; 300], Duration::from_millis(frame * 20)));
        }
        interleave(&mut units);

        let parser = TSPacketParser::new();
        let mut pcrs = Vec::new();
        for unit in &units {
            for packet in muxer.mux(unit).unwrap() {
                if packet.pid() != VIDEO_PID {
                    continue;
                }
                if let Some(pcr) = parser
                    .parse_adaptation_field(packet.as_bytes())
                    .unwrap()
                    .and_then(|field| field.pcr)
                {
                    pcrs.push(pcr);
                }
            }
        }

        assert_eq!(pcrs.len(), 75);
        let max_gap = PCR_HZ * 40 / 1000;
        for pair in pcrs.windows(2) {
            assert!(pair[1] >= pair[0]);
            assert!(pair[1] - pair[0] <= max_gap);
        }
    }

    #[test]
    fn test_psi_reissued_every_interval() {
        let mut muxer = av_muxer(MuxerConfig::default().with_psi_interval(Duration::from_millis(200)));
        let mut pat_times = Vec::new();
        for frame in 0..50u64 {
            let pts = Duration::from_millis(frame * 20);
            let packets = muxer.mux(&AccessUnit::audio(vec![0; 100], pts)).unwrap();
            if packets.iter().any(|p| p.pid() == PID_PAT) {
                pat_times.push(pts.as_millis());
            }
        }
        assert_eq!(pat_times, vec![0, 200, 400, 600, 800]);
    }

    #[test]
    fn test_restart_produces_fresh_valid_stream() {
        let mut muxer = av_muxer(MuxerConfig::default());
        muxer.begin_session().unwrap();
        let first = muxer
            .mux(&AccessUnit::video(vec![5; 500], Duration::from_secs(10)).with_key_flag(true))
            .unwrap();
        muxer.end_session();

        muxer.begin_session().unwrap();
        let second = muxer
            .mux(&AccessUnit::video(vec![5; 500], Duration::ZERO).with_key_flag(true))
            .unwrap();
        muxer.end_session();

        assert_eq!(second[0].pid(), PID_PAT);
        assert_eq!(second[1].pid(), PID_PMT);

        // counters continue where the first session stopped
        let last = on_pid(&first, VIDEO_PID).last().unwrap().continuity_counter();
        let next = on_pid(&second, VIDEO_PID)[0].continuity_counter();
        assert_eq!(next, (last + 1) & 0x0f);

        let field = TSPacketParser::new()
            .parse_adaptation_field(on_pid(&second, VIDEO_PID)[0].as_bytes())
            .unwrap()
            .unwrap();
        assert!(field.discontinuity);
        assert_eq!(parse_pmt(&second).version, 0);
    }

    #[quickcheck]
    fn prop_packets_are_whole_and_counters_continuous(units: Vec<(bool, u16, bool)>) -> bool {
        let mut muxer = av_muxer(MuxerConfig::default());
        let mut packets = Vec::new();
        for (index, (is_video, size, is_key)) in units.into_iter().enumerate() {
            let size = size as usize % 5000 + 1;
            let pts = Duration::from_millis(index as u64 * 15);
            let unit = if is_video {
                AccessUnit::video(vec![0x5a; size], pts).with_key_flag(is_key)
            } else {
                AccessUnit::audio(vec![0x5a; size.min(4000)], pts)
            };
            match muxer.mux(&unit) {
                Ok(out) => packets.extend(out),
                Err(_) => return false,
            }
        }

        if !packets
            .iter()
            .all(|p| p.as_bytes().len() == TS_PACKET_SIZE && p.as_bytes()[0] == TS_SYNC_BYTE)
        {
            return false;
        }

        let mut last: HashMap<u16, u8> = HashMap::new();
        for packet in packets.iter().filter(|p| p.has_payload()) {
            let counter = packet.continuity_counter();
            if let Some(previous) = last.insert(packet.pid(), counter) {
                if counter != (previous + 1) & 0x0f {
                    return false;
                }
            } else if counter != 0 {
                return false;
            }
        }
        true
    }
}
