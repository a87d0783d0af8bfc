#![deny(unsafe_code)]
#![deny(warnings)]
//! Wall clock: SNTP over UDP into the internal RTC
//!
//! The RTC is a single global behind a critical section so the network
//! task (writer) and the telemetry task (reader) can both reach it.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;
use defmt::{debug, info, warn, Debug2Format, Format};
use embassy_futures::select::{select, Either};
use embassy_net::dns::DnsQueryType;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{IpEndpoint, Stack};
use embassy_stm32::rtc::{DateTime, DayOfWeek, Rtc};
use embassy_time::{Duration, Instant, Timer};
use hal_abstractions::{ClockError, WallClock};
use relay_core::time::CivilDateTime;

const NTP_PORT: u16 = 123;
const NTP_PACKET_LEN: usize = 48;
/// 1900-01-01 to 1970-01-01
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;
const MAX_STRATUM: u8 = 15;

static RTC: Mutex<RefCell<Option<Rtc>>> = Mutex::new(RefCell::new(None));

/// Set by the first successful RTC write
static RTC_SET: AtomicBool = AtomicBool::new(false);

/// Hand the RTC over; call once from init
pub fn install_rtc(rtc: Rtc) {
    critical_section::with(|cs| {
        RTC.borrow(cs).replace(Some(rtc));
    });
}

/// SNTP exchange failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum SntpError {
    Dns,
    Socket,
    Timeout,
    /// Short reply or reply from the wrong host
    InvalidResponse,
    /// Server unsynchronized or too far from a reference clock
    BadStratum(u8),
}

impl From<SntpError> for ClockError {
    fn from(e: SntpError) -> Self {
        match e {
            SntpError::Dns | SntpError::Socket | SntpError::Timeout => ClockError::NotYetSynced,
            SntpError::InvalidResponse | SntpError::BadStratum(_) => ClockError::Hardware,
        }
    }
}

fn write_rtc(unix_secs: u64) -> Result<(), ClockError> {
    let datetime = to_datetime(unix_secs)?;
    critical_section::with(|cs| {
        let mut slot = RTC.borrow(cs).borrow_mut();
        let rtc = slot.as_mut().ok_or(ClockError::Hardware)?;
        rtc.set_datetime(datetime).map_err(|_| ClockError::Hardware)?;
        RTC_SET.store(true, Ordering::Release);
        Ok(())
    })
}

fn read_rtc() -> Result<u64, ClockError> {
    if !RTC_SET.load(Ordering::Acquire) {
        return Err(ClockError::NotYetSynced);
    }
    let datetime = critical_section::with(|cs| {
        let mut slot = RTC.borrow(cs).borrow_mut();
        let rtc = slot.as_mut().ok_or(ClockError::Hardware)?;
        rtc.now().map_err(|_| ClockError::Hardware)
    })?;
    let civil = CivilDateTime::new(
        datetime.year() as i16,
        datetime.month(),
        datetime.day(),
        datetime.hour(),
        datetime.minute(),
        datetime.second(),
    );
    Ok(civil.to_unix_seconds() as u64)
}

fn to_datetime(unix_secs: u64) -> Result<DateTime, ClockError> {
    let civil = CivilDateTime::from_unix_seconds(unix_secs as i64);
    let weekday = match civil.date().day_of_week() {
        1 => DayOfWeek::Monday,
        2 => DayOfWeek::Tuesday,
        3 => DayOfWeek::Wednesday,
        4 => DayOfWeek::Thursday,
        5 => DayOfWeek::Friday,
        6 => DayOfWeek::Saturday,
        _ => DayOfWeek::Sunday,
    };
    DateTime::from(
        civil.year as u16,
        civil.month,
        civil.day,
        weekday,
        civil.hour,
        civil.minute,
        civil.second,
        0,
    )
    .map_err(|_| ClockError::Hardware)
}

/// Unix seconds from the transmit timestamp of an NTP reply, rounded to the
/// nearest second after adding half the round trip
fn reply_time(reply: &[u8; NTP_PACKET_LEN], rtt_micros: u64) -> Result<u64, SntpError> {
    let stratum = reply[1];
    if stratum == 0 || stratum > MAX_STRATUM {
        return Err(SntpError::BadStratum(stratum));
    }
    let secs = u32::from_be_bytes([reply[40], reply[41], reply[42], reply[43]]) as u64;
    let frac = u32::from_be_bytes([reply[44], reply[45], reply[46], reply[47]]) as u64;
    let micros = ((frac * 1_000_000) >> 32) + rtt_micros / 2;
    let unix = secs.checked_sub(NTP_UNIX_OFFSET).ok_or(SntpError::InvalidResponse)?;
    Ok(unix + (micros + 500_000) / 1_000_000)
}

/// Read-only view of the RTC
///
/// Syncing needs the network stack, which lives in the network task; see
/// [`SntpClock`].
#[derive(Clone, Copy, Default)]
pub struct RtcClock;

impl WallClock for RtcClock {
    async fn request_sync(&mut self, _server: &str) -> Result<(), ClockError> {
        Err(ClockError::Hardware)
    }

    fn read(&self) -> Result<u64, ClockError> {
        read_rtc()
    }
}

/// [`WallClock`] that syncs the RTC from an SNTP server
pub struct SntpClock {
    stack: Stack<'static>,
    timeout: Duration,
}

impl SntpClock {
    pub fn new(stack: Stack<'static>, timeout_ms: u32) -> Self {
        Self {
            stack,
            timeout: Duration::from_millis(timeout_ms as u64),
        }
    }

    async fn exchange(&self, server: &str) -> Result<u64, SntpError> {
        let server_ip = self
            .stack
            .dns_query(server, DnsQueryType::A)
            .await
            .map_err(|_| SntpError::Dns)?
            .first()
            .copied()
            .ok_or(SntpError::Dns)?;
        let endpoint = IpEndpoint::new(server_ip, NTP_PORT);

        let mut rx_meta = [PacketMetadata::EMPTY; 2];
        let mut rx_buffer = [0u8; 64];
        let mut tx_meta = [PacketMetadata::EMPTY; 2];
        let mut tx_buffer = [0u8; 64];
        let mut socket = UdpSocket::new(
            self.stack,
            &mut rx_meta,
            &mut rx_buffer,
            &mut tx_meta,
            &mut tx_buffer,
        );
        socket.bind(0).map_err(|_| SntpError::Socket)?;

        // LI=0, VN=3, Mode=3 (client)
        let mut request = [0u8; NTP_PACKET_LEN];
        request[0] = 0x1B;
        let sent_at = Instant::now();
        socket
            .send_to(&request, endpoint)
            .await
            .map_err(|_| SntpError::Socket)?;

        let mut reply = [0u8; NTP_PACKET_LEN];
        let (len, from) = match select(Timer::after(self.timeout), socket.recv_from(&mut reply)).await {
            Either::First(()) => return Err(SntpError::Timeout),
            Either::Second(result) => result.map_err(|_| SntpError::Socket)?,
        };
        let rtt = Instant::now().duration_since(sent_at);

        if len < NTP_PACKET_LEN || from.endpoint.addr != server_ip {
            return Err(SntpError::InvalidResponse);
        }
        debug!("NTP reply from {}, stratum {}", Debug2Format(&from), reply[1]);
        reply_time(&reply, rtt.as_micros())
    }
}

impl WallClock for SntpClock {
    async fn request_sync(&mut self, server: &str) -> Result<(), ClockError> {
        match self.exchange(server).await {
            Ok(unix_secs) => {
                write_rtc(unix_secs)?;
                info!("RTC set from {}: {}", server, unix_secs);
                Ok(())
            }
            Err(e) => {
                warn!("SNTP exchange with {} failed: {:?}", server, e);
                Err(e.into())
            }
        }
    }

    fn read(&self) -> Result<u64, ClockError> {
        read_rtc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(stratum: u8, secs: u32, frac: u32) -> [u8; NTP_PACKET_LEN] {
        let mut packet = [0u8; NTP_PACKET_LEN];
        packet[1] = stratum;
        packet[40..44].copy_from_slice(&secs.to_be_bytes());
        packet[44..48].copy_from_slice(&frac.to_be_bytes());
        packet
    }

    #[test]
    fn test_ntp_epoch_maps_to_unix_epoch() {
        let packet = reply(2, NTP_UNIX_OFFSET as u32, 0);
        assert_eq!(reply_time(&packet, 0), Ok(0));
    }

    #[test]
    fn test_half_rtt_rounds_up() {
        let packet = reply(2, (NTP_UNIX_OFFSET + 100) as u32, 1 << 31);
        assert_eq!(reply_time(&packet, 0), Ok(101));
        assert_eq!(reply_time(&packet, 200_000), Ok(101));
    }

    #[test]
    fn test_unsynchronized_server_rejected() {
        let packet = reply(0, NTP_UNIX_OFFSET as u32, 0);
        assert_eq!(reply_time(&packet, 0), Err(SntpError::BadStratum(0)));
    }
}
