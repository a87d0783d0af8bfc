#![deny(unsafe_code)]
#![deny(warnings)]
//! W5500 Ethernet link
//!
//! The FeatherWing is wired, so "association" is the DHCP lease: a link is
//! up once the stack holds an IPv4 configuration.

use defmt::{info, warn};
use embassy_embedded_hal::shared_bus::asynch::spi::SpiDevice as SpiDeviceBus;
use embassy_net::Stack;
use embassy_net_wiznet::chip::W5500;
use embassy_net_wiznet::{Device, Runner};
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::Output;
use embassy_stm32::mode::Async;
use embassy_stm32::spi::Spi;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use hal_abstractions::{LinkDriver, LinkError, LinkEvent, MacAddress};
use relay_core::duty::LinkEvents;
use static_cell::StaticCell;

pub type W5500Runner = Runner<
    'static,
    W5500,
    SpiDeviceBus<'static, CriticalSectionRawMutex, Spi<'static, Async>, Output<'static>>,
    ExtiInput<'static>,
    Output<'static>,
>;

/// Ethernet peripherals bundle
pub struct EthPeripherals<'a> {
    pub spi: Spi<'a, Async>,
    pub cs: Output<'a>,
    pub reset: Output<'a>,
    pub int: ExtiInput<'a>,
}

/// Reset and bring up the W5500
///
/// The runner must be polled for as long as the device is in use.
pub async fn init_w5500(
    periph: EthPeripherals<'static>,
    mac: MacAddress,
) -> Result<(Device<'static>, W5500Runner), LinkError> {
    let EthPeripherals {
        spi,
        cs,
        mut reset,
        int,
    } = periph;

    info!("Performing W5500 hardware reset...");
    reset.set_low();
    embassy_time::Timer::after_millis(1).await;
    reset.set_high();
    embassy_time::Timer::after_millis(2).await;

    type SpiBusType = embassy_sync::mutex::Mutex<CriticalSectionRawMutex, Spi<'static, Async>>;
    static SPI_BUS: StaticCell<SpiBusType> = StaticCell::new();
    let spi_bus = SPI_BUS.init(embassy_sync::mutex::Mutex::new(spi));
    let spi_device = SpiDeviceBus::new(spi_bus, cs);

    static STATE: StaticCell<embassy_net_wiznet::State<8, 8>> = StaticCell::new();
    let state = STATE.init(embassy_net_wiznet::State::<8, 8>::new());

    let (device, runner) = embassy_net_wiznet::new(mac, state, spi_device, int, reset)
        .await
        .map_err(|_| LinkError::Rejected)?;

    info!(
        "W5500 up, MAC {:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );
    Ok((device, runner))
}

/// Turn DHCP lease changes into link events
///
/// Runs beside the stack runners for the life of the firmware.
pub async fn watch_lease(stack: Stack<'static>, mac: MacAddress, events: &LinkEvents) -> ! {
    loop {
        stack.wait_config_up().await;
        if let Some(config) = stack.config_v4() {
            let octets = config.address.address().octets();
            info!(
                "DHCP lease: {}.{}.{}.{}",
                octets[0], octets[1], octets[2], octets[3]
            );
        }
        post(events, LinkEvent::LinkUp);
        post(events, LinkEvent::GotLocalAddress(mac));

        stack.wait_config_down().await;
        warn!("DHCP lease lost");
        post(events, LinkEvent::LinkDown);
    }
}

fn post(events: &LinkEvents, event: LinkEvent) {
    if events.try_send(event).is_err() {
        warn!("Link event inbox full, dropping {:?}", event);
    }
}

/// [`LinkDriver`] over the embassy-net stack
pub struct EthLink {
    stack: Stack<'static>,
}

impl EthLink {
    pub fn new(stack: Stack<'static>) -> Self {
        Self { stack }
    }
}

impl LinkDriver for EthLink {
    /// DHCP runs on its own; there is nothing to request and no
    /// credentials to present
    async fn connect(&mut self, _ssid: &str, _password: &str) -> Result<(), LinkError> {
        if !self.stack.is_link_up() {
            info!("Waiting for Ethernet carrier");
        }
        Ok(())
    }

    fn has_address(&self) -> bool {
        self.stack.is_config_up()
    }
}
