use super::packetizer::{packetize, packetize_section, pcr_packet, PidState, UnitStart};
use super::pes::PESPacket;
use super::psi::{Descriptor, ElementaryStreamDescriptor, ServiceDescriptor, TableBuilder};
use super::types::*;
use crate::av::{AccessUnit, AudioConfig, CodecType, MediaKind, VideoConfig};
use crate::codec::Framer;
use crate::error::{Result, TsflowError};
use log::{debug, trace};
use std::collections::HashMap;
use std::time::Duration;

const DEFAULT_PSI_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_PCR_INTERVAL: Duration = Duration::from_millis(40); // ~25 PCR updates per second

/// Muxer tuning, usually derived from [`crate::config::Settings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxerConfig {
    pub transport_stream_id: u16,
    pub pmt_pid: u16,
    /// Maximum stream time between two PSI cycles.
    pub psi_interval: Duration,
    /// Maximum stream time between two PCR samples.
    pub pcr_interval: Duration,
    pub emit_sdt: bool,
}

impl Default for MuxerConfig {
    fn default() -> Self {
        Self {
            transport_stream_id: 1,
            pmt_pid: PID_PMT,
            psi_interval: DEFAULT_PSI_INTERVAL,
            pcr_interval: DEFAULT_PCR_INTERVAL,
            emit_sdt: false,
        }
    }
}

impl MuxerConfig {
    pub fn with_psi_interval(mut self, interval: Duration) -> Self {
        self.psi_interval = interval;
        self
    }

    pub fn with_pcr_interval(mut self, interval: Duration) -> Self {
        self.pcr_interval = interval;
        self
    }

    pub fn with_sdt(mut self, emit_sdt: bool) -> Self {
        self.emit_sdt = emit_sdt;
        self
    }
}

/// Codec parameters of one stream to register.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamConfig {
    Audio(AudioConfig),
    Video(VideoConfig),
}

impl StreamConfig {
    pub fn kind(&self) -> MediaKind {
        match self {
            StreamConfig::Audio(_) => MediaKind::Audio,
            StreamConfig::Video(_) => MediaKind::Video,
        }
    }

    pub fn codec(&self) -> CodecType {
        match self {
            StreamConfig::Audio(config) => config.codec,
            StreamConfig::Video(config) => config.codec,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            StreamConfig::Audio(config) => config.validate(),
            StreamConfig::Video(config) => config.validate(),
        }
    }

    fn framer(&self) -> Result<Framer> {
        match self {
            StreamConfig::Audio(config) => Framer::for_audio(config),
            StreamConfig::Video(config) => Framer::for_video(config),
        }
    }

    fn describe(&self, pid: u16) -> Result<ElementaryStreamDescriptor> {
        let descriptor = ElementaryStreamDescriptor::new(self.codec(), pid)?;
        match self {
            StreamConfig::Audio(AudioConfig {
                language: Some(language),
                ..
            }) => Ok(descriptor.with_descriptor(Descriptor::language(language)?)),
            _ => Ok(descriptor),
        }
    }
}

impl From<AudioConfig> for StreamConfig {
    fn from(config: AudioConfig) -> Self {
        StreamConfig::Audio(config)
    }
}

impl From<VideoConfig> for StreamConfig {
    fn from(config: VideoConfig) -> Self {
        StreamConfig::Video(config)
    }
}

#[derive(Debug, Clone)]
struct MuxStream {
    descriptor: ElementaryStreamDescriptor,
    framer: Framer,
    last_pts: Option<Duration>,
}

/// Per-PID bookkeeping, one arena slot per PID ever written.
#[derive(Debug, Clone, Default)]
pub struct MuxerState {
    pids: Vec<PidState>,
    index: HashMap<u16, usize>,
    psi_pending: bool,
    /// Stream time of the last PSI cycle, in 90 kHz ticks.
    last_psi: Option<u64>,
    /// Stream time of the last PCR sample, in 90 kHz ticks.
    last_pcr: Option<u64>,
}

impl MuxerState {
    fn slot(&mut self, pid: u16) -> &mut PidState {
        let index = match self.index.get(&pid) {
            Some(index) => *index,
            None => {
                self.pids.push(PidState::new(pid));
                self.index.insert(pid, self.pids.len() - 1);
                self.pids.len() - 1
            }
        };
        &mut self.pids[index]
    }

    pub fn pid(&self, pid: u16) -> Option<&PidState> {
        self.index.get(&pid).map(|index| &self.pids[*index])
    }

    /// Counter value the next payload packet on `pid` will carry.
    pub fn continuity_counter(&self, pid: u16) -> Option<u8> {
        self.pid(pid).map(PidState::continuity_counter)
    }

    fn mark_discontinuity(&mut self) {
        for state in &mut self.pids {
            state.mark_discontinuity();
        }
    }
}

/// MPEG-TS multiplexer for a single service.
///
/// Every call to [`TsMuxer::mux`] turns exactly one access unit into an
/// ordered run of packets, with PSI and PCR inserted as their intervals
/// (measured in stream time) come due.
#[derive(Debug, Clone)]
pub struct TsMuxer {
    config: MuxerConfig,
    tables: Option<TableBuilder>,
    streams: Vec<MuxStream>,
    state: MuxerState,
    session_active: bool,
    sessions: u64,
}

impl TsMuxer {
    pub fn new(config: MuxerConfig) -> Self {
        Self {
            config,
            tables: None,
            streams: Vec::new(),
            state: MuxerState::default(),
            session_active: false,
            sessions: 0,
        }
    }

    pub fn config(&self) -> &MuxerConfig {
        &self.config
    }

    pub fn state(&self) -> &MuxerState {
        &self.state
    }

    pub fn tables(&self) -> Option<&TableBuilder> {
        self.tables.as_ref()
    }

    pub fn is_session_active(&self) -> bool {
        self.session_active
    }

    pub fn psi_version(&self) -> Option<u8> {
        self.tables.as_ref().map(TableBuilder::version)
    }

    pub fn pcr_pid(&self) -> Option<u16> {
        self.tables.as_ref().map(TableBuilder::pcr_pid)
    }

    pub fn stream_pid(&self, kind: MediaKind) -> Option<u16> {
        self.streams
            .iter()
            .find(|stream| stream.descriptor.kind == kind)
            .map(|stream| stream.descriptor.pid)
    }

    /// Registers the service and its streams, assigning PIDs from 0x100 in
    /// order and skipping the PMT PID.
    ///
    /// Re-registering the same service keeps the table version history, so a
    /// changed stream set bumps the version.
    pub fn register_service(
        &mut self,
        service: ServiceDescriptor,
        streams: Vec<StreamConfig>,
    ) -> Result<()> {
        self.ensure_idle("register a service")?;
        self.check_pmt_pid()?;
        if streams.is_empty() {
            return Err(TsflowError::Configuration(
                "a service needs at least one stream".into(),
            ));
        }

        let mut registered: Vec<MuxStream> = Vec::with_capacity(streams.len());
        for config in &streams {
            if registered
                .iter()
                .any(|stream| stream.descriptor.kind == config.kind())
            {
                return Err(TsflowError::Configuration(format!(
                    "more than one {} stream",
                    config.kind()
                )));
            }
            let pid = self.free_pid(&registered)?;
            registered.push(Self::build_stream(config, pid)?);
        }

        let same_service = self
            .tables
            .as_ref()
            .map(|tables| *tables.service() == service)
            .unwrap_or(false);
        if !same_service {
            self.tables = Some(TableBuilder::new(
                service,
                self.config.transport_stream_id,
                self.config.pmt_pid,
            ));
        }
        self.streams = registered;
        self.refresh_tables();
        self.state.psi_pending = true;

        debug!(
            "registered {} stream(s), PCR on PID 0x{:04x}",
            self.streams.len(),
            self.pcr_pid().unwrap_or(PID_NULL)
        );
        Ok(())
    }

    /// Adds one stream to the registered service and returns its PID.
    pub fn add_stream(&mut self, config: StreamConfig) -> Result<u16> {
        self.ensure_idle("add a stream")?;
        self.ensure_registered()?;
        if self.stream_pid(config.kind()).is_some() {
            return Err(TsflowError::Configuration(format!(
                "a {} stream is already registered",
                config.kind()
            )));
        }

        let pid = self.free_pid(&self.streams)?;
        self.streams.push(Self::build_stream(&config, pid)?);
        self.refresh_tables();
        Ok(pid)
    }

    pub fn remove_stream(&mut self, kind: MediaKind) -> Result<()> {
        self.ensure_idle("remove a stream")?;
        self.ensure_registered()?;
        let before = self.streams.len();
        self.streams.retain(|stream| stream.descriptor.kind != kind);
        if self.streams.len() == before {
            return Err(TsflowError::Configuration(format!(
                "no {} stream is registered",
                kind
            )));
        }
        self.refresh_tables();
        Ok(())
    }

    /// Starts a streaming session. Every session after the first begins
    /// with a discontinuity and a fresh PSI cycle.
    pub fn begin_session(&mut self) -> Result<()> {
        self.ensure_registered()?;
        if self.session_active {
            return Err(TsflowError::Muxing("a session is already active".into()));
        }
        if self.sessions > 0 {
            self.reset();
        }
        self.sessions += 1;
        self.session_active = true;
        Ok(())
    }

    pub fn end_session(&mut self) {
        self.session_active = false;
    }

    /// Marks the next packet on every PID as discontinuous and forces a PSI
    /// cycle. Continuity counters are kept.
    pub fn reset(&mut self) {
        self.state.mark_discontinuity();
        self.state.psi_pending = true;
        self.state.last_psi = None;
        self.state.last_pcr = None;
        for stream in &mut self.streams {
            stream.last_pts = None;
        }
        debug!("muxer reset, discontinuity on {} PID(s)", self.state.pids.len());
    }

    /// Muxes exactly one access unit.
    pub fn mux(&mut self, unit: &AccessUnit) -> Result<Vec<TsPacket>> {
        let tables = self
            .tables
            .as_ref()
            .ok_or_else(|| TsflowError::Configuration("no service registered".into()))?;
        let stream = self
            .streams
            .iter_mut()
            .find(|stream| stream.descriptor.kind == unit.kind)
            .ok_or_else(|| {
                TsflowError::Muxing(format!("no {} stream registered", unit.kind))
            })?;

        if let Some(dts) = unit.dts {
            if dts > unit.pts {
                return Err(TsflowError::Muxing(format!(
                    "{} DTS {:?} is after PTS {:?}",
                    unit.kind, dts, unit.pts
                )));
            }
        }
        if let Some(last) = stream.last_pts {
            if unit.pts < last {
                return Err(TsflowError::Muxing(format!(
                    "{} PTS regressed from {:?} to {:?}",
                    unit.kind, last, unit.pts
                )));
            }
        }

        // everything fallible runs before any counter or schedule moves
        let payload = stream.framer.frame(unit)?;
        let pes = PESPacket::for_access_unit(&stream.descriptor, unit, payload)?.to_bytes();

        let now = time_to_pts(unit.pts);
        let psi_due = self.state.psi_pending
            || self.state.last_psi.map_or(true, |last| {
                now.saturating_sub(last) >= time_to_pts(self.config.psi_interval)
            });
        let sections = if psi_due {
            let mut sections = vec![(PID_PAT, tables.pat()?), (tables.pmt_pid(), tables.pmt()?)];
            if self.config.emit_sdt {
                sections.push((PID_SDT, tables.sdt()?));
            }
            sections
        } else {
            Vec::new()
        };

        let mut packets = Vec::new();
        if psi_due {
            debug!(
                "PSI cycle at {:?}, version {}",
                unit.pts,
                tables.version()
            );
            for (pid, section) in &sections {
                packets.extend(packetize_section(self.state.slot(*pid), section)?);
            }
            self.state.psi_pending = false;
            self.state.last_psi = Some(now);
        }

        let pcr_pid = tables.pcr_pid();
        let pcr_due = self.state.last_pcr.map_or(true, |last| {
            now.saturating_sub(last) >= time_to_pts(self.config.pcr_interval)
        });
        let mut pcr = None;
        if pcr_due {
            if pcr_pid == stream.descriptor.pid {
                pcr = Some(time_to_pcr(unit.pts));
                self.state.last_pcr = Some(now);
            } else if pcr_pid == PID_DEDICATED_PCR {
                packets.push(pcr_packet(self.state.slot(pcr_pid), time_to_pcr(unit.pts))?);
                self.state.last_pcr = Some(now);
            }
        }

        let start = UnitStart {
            random_access: unit.is_key,
            pcr,
        };
        packets.extend(packetize(
            self.state.slot(stream.descriptor.pid),
            &pes,
            start,
        )?);
        stream.last_pts = Some(unit.pts);

        trace!(
            "muxed {} unit of {} bytes at {:?} into {} packet(s)",
            unit.kind,
            unit.len(),
            unit.pts,
            packets.len()
        );
        Ok(packets)
    }

    /// Lowest elementary PID not taken by a stream or by the PMT.
    fn free_pid(&self, taken: &[MuxStream]) -> Result<u16> {
        (PID_FIRST_ELEMENTARY..PID_DEDICATED_PCR)
            .find(|pid| {
                *pid != self.config.pmt_pid && taken.iter().all(|s| s.descriptor.pid != *pid)
            })
            .ok_or_else(|| TsflowError::Configuration("no free elementary PID".into()))
    }

    fn check_pmt_pid(&self) -> Result<()> {
        let pmt_pid = self.config.pmt_pid;
        if !(PID_FIRST_PROGRAM..PID_DEDICATED_PCR).contains(&pmt_pid)
            || (self.config.emit_sdt && pmt_pid == PID_SDT)
        {
            return Err(TsflowError::Configuration(format!(
                "PMT PID 0x{:04x} collides with a reserved PID",
                pmt_pid
            )));
        }
        Ok(())
    }

    fn build_stream(config: &StreamConfig, pid: u16) -> Result<MuxStream> {
        config.validate()?;
        Ok(MuxStream {
            descriptor: config.describe(pid)?,
            framer: config.framer()?,
            last_pts: None,
        })
    }

    fn refresh_tables(&mut self) {
        let descriptors: Vec<ElementaryStreamDescriptor> = self
            .streams
            .iter()
            .map(|stream| stream.descriptor.clone())
            .collect();
        let pcr_pid = descriptors
            .iter()
            .find(|descriptor| descriptor.kind == MediaKind::Video)
            .map(|descriptor| descriptor.pid)
            .unwrap_or(PID_DEDICATED_PCR);

        if let Some(tables) = self.tables.as_mut() {
            if tables.set_streams(descriptors, pcr_pid) {
                debug!("PSI version bumped to {}", tables.version());
                self.state.psi_pending = true;
            }
        }
    }

    fn ensure_idle(&self, operation: &str) -> Result<()> {
        if self.session_active {
            return Err(TsflowError::Configuration(format!(
                "cannot {} while streaming",
                operation
            )));
        }
        Ok(())
    }

    fn ensure_registered(&self) -> Result<()> {
        if self.tables.is_none() {
            return Err(TsflowError::Configuration("no service registered".into()));
        }
        Ok(())
    }
}

/// Orders ready units for muxing: earlier PTS first, audio before video on
/// ties. The sort is stable, so per-stream order is preserved.
pub fn interleave(units: &mut [AccessUnit]) {
    units.sort_by_key(|unit| (unit.pts, unit.kind));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ts::parser::TSPacketParser;
    use crate::format::ts::psi::ServiceType;
    use pretty_assertions::assert_eq;

    fn service() -> ServiceDescriptor {
        ServiceDescriptor::new(0x4698, ServiceType::DigitalTv, "tsflow", "test")
    }

    fn av_muxer() -> TsMuxer {
        let mut muxer = TsMuxer::new(MuxerConfig::default());
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

    fn pids(packets: &[TsPacket]) -> Vec<u16> {
        packets.iter().map(TsPacket::pid).collect()
    }

    #[test]
    fn test_pid_assignment() {
        let muxer = av_muxer();
        assert_eq!(muxer.stream_pid(MediaKind::Video), Some(0x100));
        assert_eq!(muxer.stream_pid(MediaKind::Audio), Some(0x101));
        assert_eq!(muxer.pcr_pid(), Some(0x100));
        assert_eq!(muxer.psi_version(), Some(0));
    }

    #[test]
    fn test_first_unit_gets_psi_and_pcr() {
        let mut muxer = av_muxer();
        let unit = AccessUnit::video(vec![0xab; 100], Duration::ZERO).with_key_flag(true);
        let packets = muxer.mux(&unit).unwrap();

        assert_eq!(pids(&packets), vec![PID_PAT, PID_PMT, 0x100]);
        let video = packets[2].as_bytes();
        assert_eq!(video[5] & 0x50, 0x50);
    }

    #[test]
    fn test_psi_reissued_after_interval() {
        let mut muxer = av_muxer();
        let mut psi_cycles = 0;
        for frame in 0..10u64 {
            let unit = AccessUnit::audio(vec![0u8; 50], Duration::from_millis(frame * 25));
            let packets = muxer.mux(&unit).unwrap();
            psi_cycles += packets.iter().filter(|p| p.pid() == PID_PAT).count();
        }
        // at 0, 100 and 200 ms
        assert_eq!(psi_cycles, 3);
    }

    #[test]
    fn test_pts_regression_is_rejected() {
        let mut muxer = av_muxer();
        muxer
            .mux(&AccessUnit::audio(vec![1; 10], Duration::from_millis(40)))
            .unwrap();
        let err = muxer
            .mux(&AccessUnit::audio(vec![1; 10], Duration::from_millis(20)))
            .unwrap_err();
        assert!(matches!(err, TsflowError::Muxing(_)));
    }

    #[test]
    fn test_dts_after_pts_is_rejected() {
        let mut muxer = av_muxer();
        let unit = AccessUnit::video(vec![1; 10], Duration::ZERO).with_dts(Duration::from_millis(1));
        assert!(muxer.mux(&unit).is_err());
    }

    #[test]
    fn test_registration_rejected_while_active() {
        let mut muxer = av_muxer();
        muxer.begin_session().unwrap();
        let err = muxer
            .register_service(service(), vec![AudioConfig::default().into()])
            .unwrap_err();
        assert!(matches!(err, TsflowError::Configuration(_)));
        assert!(muxer.remove_stream(MediaKind::Audio).is_err());
    }

    #[test]
    fn test_duplicate_and_unsupported_streams() {
        let mut muxer = TsMuxer::new(MuxerConfig::default());
        assert!(muxer
            .register_service(
                service(),
                vec![AudioConfig::default().into(), AudioConfig::default().into()],
            )
            .is_err());
        assert!(muxer
            .register_service(service(), vec![AudioConfig::new(CodecType::OPUS).into()])
            .is_err());
        assert!(muxer.register_service(service(), vec![]).is_err());
    }

    #[test]
    fn test_audio_only_uses_dedicated_pcr_pid() {
        let mut muxer = TsMuxer::new(MuxerConfig::default());
        muxer
            .register_service(service(), vec![AudioConfig::default().into()])
            .unwrap();
        assert_eq!(muxer.stream_pid(MediaKind::Audio), Some(0x100));
        assert_eq!(muxer.pcr_pid(), Some(PID_DEDICATED_PCR));

        let packets = muxer
            .mux(&AccessUnit::audio(vec![0u8; 100], Duration::ZERO))
            .unwrap();
        assert_eq!(pids(&packets), vec![PID_PAT, PID_PMT, PID_DEDICATED_PCR, 0x100]);
        assert!(!packets[2].has_payload());
    }

    #[test]
    fn test_stream_changes_bump_version() {
        let mut muxer = av_muxer();
        muxer.remove_stream(MediaKind::Audio).unwrap();
        assert_eq!(muxer.psi_version(), Some(1));
        let pid = muxer.add_stream(AudioConfig::default().into()).unwrap();
        assert_eq!(pid, 0x101);
        assert_eq!(muxer.psi_version(), Some(2));
        assert!(muxer.add_stream(AudioConfig::default().into()).is_err());
    }

    fn pmt_version(packets: &[TsPacket], pmt_pid: u16) -> u8 {
        let mut parser = TSPacketParser::new();
        let packet = packets.iter().find(|p| p.pid() == pmt_pid).unwrap();
        let section = parser.push_section_packet(packet).unwrap().unwrap();
        parser.parse_pmt(&section).unwrap().version
    }

    #[test]
    fn test_version_bump_reissues_psi_immediately() {
        let mut muxer = av_muxer();
        muxer
            .mux(&AccessUnit::video(vec![1u8; 10], Duration::ZERO))
            .unwrap();

        muxer.remove_stream(MediaKind::Audio).unwrap();
        let packets = muxer
            .mux(&AccessUnit::video(vec![1u8; 10], Duration::from_millis(10)))
            .unwrap();
        assert_eq!(pids(&packets), vec![PID_PAT, PID_PMT, 0x100]);
        assert_eq!(pmt_version(&packets, PID_PMT), 1);

        muxer.add_stream(AudioConfig::default().into()).unwrap();
        let packets = muxer
            .mux(&AccessUnit::audio(vec![1u8; 10], Duration::from_millis(20)))
            .unwrap();
        assert_eq!(pids(&packets), vec![PID_PAT, PID_PMT, 0x101]);
        assert_eq!(pmt_version(&packets, PID_PMT), 2);

        let packets = muxer
            .mux(&AccessUnit::video(vec![1u8; 10], Duration::from_millis(30)))
            .unwrap();
        assert_eq!(pids(&packets), vec![0x100]);
    }

    #[test]
    fn test_failed_unit_leaves_state_untouched() {
        let mut muxer = av_muxer();
        let err = muxer
            .mux(&AccessUnit::audio(vec![0u8; 70_000], Duration::ZERO))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Muxing);
        assert_eq!(muxer.state().continuity_counter(PID_PAT), None);

        let packets = muxer
            .mux(&AccessUnit::audio(vec![0u8; 100], Duration::from_millis(10)))
            .unwrap();
        assert_eq!(pids(&packets), vec![PID_PAT, PID_PMT, 0x101]);
        assert!(packets.iter().all(|p| p.continuity_counter() == 0));
        assert_eq!(muxer.state().continuity_counter(PID_PAT), Some(1));
    }

    #[test]
    fn test_elementary_pids_skip_pmt_pid() {
        let config = MuxerConfig {
            pmt_pid: 0x100,
            ..Default::default()
        };
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
        assert_eq!(muxer.stream_pid(MediaKind::Video), Some(0x101));
        assert_eq!(muxer.stream_pid(MediaKind::Audio), Some(0x102));

        let packets = muxer
            .mux(&AccessUnit::video(vec![1u8; 500], Duration::ZERO))
            .unwrap();
        assert_eq!(pids(&packets), vec![PID_PAT, 0x100, 0x101, 0x101, 0x101]);
        assert_eq!(pmt_version(&packets, 0x100), 0);

        muxer.remove_stream(MediaKind::Video).unwrap();
        assert_eq!(muxer.add_stream(VideoConfig::default().into()).unwrap(), 0x101);
    }

    #[test]
    fn test_reserved_pmt_pid_is_rejected() {
        let config = MuxerConfig {
            pmt_pid: PID_SDT,
            emit_sdt: true,
            ..Default::default()
        };
        let mut muxer = TsMuxer::new(config);
        let err = muxer
            .register_service(service(), vec![VideoConfig::default().into()])
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);

        let mut muxer = TsMuxer::new(MuxerConfig {
            pmt_pid: PID_PAT,
            ..Default::default()
        });
        assert!(muxer
            .register_service(service(), vec![VideoConfig::default().into()])
            .is_err());
    }

    #[test]
    fn test_restart_keeps_counters_and_flags_discontinuity() {
        let mut muxer = av_muxer();
        muxer.begin_session().unwrap();
        muxer
            .mux(&AccessUnit::audio(vec![0u8; 50], Duration::from_secs(5)))
            .unwrap();
        muxer.end_session();
        let counter = muxer.state().continuity_counter(0x101);
        assert_eq!(counter, Some(1));

        muxer.begin_session().unwrap();
        let packets = muxer
            .mux(&AccessUnit::audio(vec![0u8; 50], Duration::ZERO))
            .unwrap();
        assert_eq!(pids(&packets), vec![PID_PAT, PID_PMT, 0x101]);
        let audio = &packets[2];
        assert_eq!(audio.continuity_counter(), 1);
        assert_eq!(audio.as_bytes()[5] & 0x80, 0x80);
        assert_eq!(packets[0].as_bytes()[5] & 0x80, 0x80);
    }

    #[test]
    fn test_sdt_emitted_when_enabled() {
        let mut muxer = TsMuxer::new(MuxerConfig::default().with_sdt(true));
        muxer
            .register_service(service(), vec![VideoConfig::default().into()])
            .unwrap();
        let packets = muxer
            .mux(&AccessUnit::video(vec![1u8; 10], Duration::ZERO))
            .unwrap();
        assert_eq!(pids(&packets), vec![PID_PAT, PID_PMT, PID_SDT, 0x100]);
    }

    #[test]
    fn test_interleave_orders_by_pts_then_kind() {
        let mut units = vec![
            AccessUnit::video(vec![1], Duration::from_millis(40)),
            AccessUnit::video(vec![2], Duration::from_millis(0)),
            AccessUnit::audio(vec![3], Duration::from_millis(40)),
            AccessUnit::audio(vec![4], Duration::from_millis(20)),
        ];
        interleave(&mut units);
        let order: Vec<u8> = units.iter().map(|unit| unit.data[0]).collect();
        assert_eq!(order, vec![2, 4, 3, 1]);
    }
}
