//! Broker session buffers in main SRAM
//!
//! The MQTT client borrows its socket and packet buffers, plus the client
//! id and credentials, for as long as the session lives. Sessions outlive
//! the call that opens them, so the borrows have to be `'static`.
//!
//! # Safety
//!
//! The buffers are `static mut`. Exactly one session exists at a time: the
//! transport drops the previous client before taking the buffers again, and
//! the firmware creates one transport per messaging duty instance.

#![allow(unsafe_code)] // Required for static mut buffers
#![deny(warnings)]

use heapless::String;
use relay_core::identity::CLIENT_ID_MAX_LEN;

/// TCP receive and transmit windows
pub const SOCKET_BUF_LEN: usize = 1024;

/// MQTT packet assembly, each direction; bounds the largest publish
pub const PACKET_BUF_LEN: usize = 512;

pub const CREDENTIAL_LEN: usize = 64;

static mut SOCKET_RX: [u8; SOCKET_BUF_LEN] = [0; SOCKET_BUF_LEN];
static mut SOCKET_TX: [u8; SOCKET_BUF_LEN] = [0; SOCKET_BUF_LEN];
static mut PACKET_TX: [u8; PACKET_BUF_LEN] = [0; PACKET_BUF_LEN];
static mut PACKET_RX: [u8; PACKET_BUF_LEN] = [0; PACKET_BUF_LEN];
static mut CLIENT_ID: String<CLIENT_ID_MAX_LEN> = String::new();
static mut USERNAME: String<CREDENTIAL_LEN> = String::new();
static mut PASSWORD: String<CREDENTIAL_LEN> = String::new();

/// Everything one broker session borrows
pub struct SessionBuffers {
    pub socket_rx: &'static mut [u8],
    pub socket_tx: &'static mut [u8],
    pub packet_tx: &'static mut [u8],
    pub packet_rx: &'static mut [u8],
    pub client_id: &'static mut String<CLIENT_ID_MAX_LEN>,
    pub username: &'static mut String<CREDENTIAL_LEN>,
    pub password: &'static mut String<CREDENTIAL_LEN>,
}

/// Take the session buffers
///
/// # Safety
///
/// The caller must ensure:
/// - No `SessionBuffers` from an earlier call, or anything borrowing from
///   one, is still alive
/// - The buffers are not accessed concurrently from multiple contexts
pub unsafe fn session_buffers() -> SessionBuffers {
    // SAFETY: the caller guarantees single-use semantics
    SessionBuffers {
        socket_rx: &mut *core::ptr::addr_of_mut!(SOCKET_RX),
        socket_tx: &mut *core::ptr::addr_of_mut!(SOCKET_TX),
        packet_tx: &mut *core::ptr::addr_of_mut!(PACKET_TX),
        packet_rx: &mut *core::ptr::addr_of_mut!(PACKET_RX),
        client_id: &mut *core::ptr::addr_of_mut!(CLIENT_ID),
        username: &mut *core::ptr::addr_of_mut!(USERNAME),
        password: &mut *core::ptr::addr_of_mut!(PASSWORD),
    }
}

/// Copy `text` into `buf` and hand it back for the rest of the session
pub fn hold<const N: usize>(buf: &'static mut String<N>, text: &str) -> Option<&'static str> {
    buf.clear();
    buf.push_str(text).ok()?;
    Some(buf.as_str())
}
