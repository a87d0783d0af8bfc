#![deny(unsafe_code)]
#![deny(warnings)]
#![no_main]
#![no_std]

use defmt_rtt as _; // global logger
use panic_probe as _;
use rtic::app;
use rtic_monotonics::stm32::prelude::*;

mod clock;
mod eth;
mod leds;
mod memory;
mod reach;
mod relay;
mod session_buffers;
mod transport;

stm32_tim2_monotonic!(Mono, 1_000_000);

#[app(device = embassy_stm32, peripherals = true, dispatchers = [USART1, USART2, USART3])]
mod app {
    use super::*;
    use defmt::{info, warn};
    use embassy_futures::join::join5;
    use embassy_net::Stack;
    use embassy_stm32::exti::ExtiInput;
    use embassy_stm32::gpio::{Level, Output, Pull, Speed};
    use embassy_stm32::peripherals;
    use embassy_stm32::rcc::{Hse, HseMode, LsConfig, LseConfig, LseMode};
    use embassy_stm32::rng::Rng;
    use embassy_stm32::rtc::{Rtc, RtcConfig};
    use embassy_stm32::spi::{self, Spi};
    use embassy_stm32::time::Hertz;
    use embassy_time::Delay;
    use hal_abstractions::MacAddress;
    use rand_core::RngCore;
    use relay_core::duty::{IndicationDuty, MessagingDuty, NetworkDuty, TelemetryProducer};
    use relay_core::supervisor::{Duty, SlotRunner, Supervisor};
    use static_cell::StaticCell;

    use crate::clock::{RtcClock, SntpClock};
    use crate::eth::EthLink;
    use crate::leds::StatusLeds;
    use crate::reach::StackReach;
    use crate::relay::Relay;
    use crate::transport::MqttTransport;

    /// Locally administered address for the W5500
    const MAC: MacAddress = [0x02, 0x00, 0x00, 0x12, 0x34, 0x56];

    /// Kept under the supervision interval so a dead route costs one pass
    const PROBE_TIMEOUT_MS: u32 = 2000;

    type SpiPeripheral = embassy_stm32::Peri<'static, peripherals::SPI2>;
    type PinPB13 = embassy_stm32::Peri<'static, peripherals::PB13>;
    type PinPB15 = embassy_stm32::Peri<'static, peripherals::PB15>;
    type PinPB14 = embassy_stm32::Peri<'static, peripherals::PB14>;
    type PinPC6 = embassy_stm32::Peri<'static, peripherals::PC6>;
    type PinPC3 = embassy_stm32::Peri<'static, peripherals::PC3>;
    type PinPC2 = embassy_stm32::Peri<'static, peripherals::PC2>;
    type ExtiChannel = embassy_stm32::Peri<'static, peripherals::EXTI2>;
    type DmaTx = embassy_stm32::Peri<'static, peripherals::DMA1_CH4>;
    type DmaRx = embassy_stm32::Peri<'static, peripherals::DMA1_CH3>;

    struct NetworkPeripherals {
        spi: SpiPeripheral,
        sck: PinPB13,
        mosi: PinPB15,
        miso: PinPB14,
        cs: PinPC6,
        reset: PinPC3,
        int: PinPC2,
        exti: ExtiChannel,
        dma_tx: DmaTx,
        dma_rx: DmaRx,
    }

    type Leds = StatusLeds<Output<'static>, Output<'static>>;

    embassy_stm32::bind_interrupts!(struct RngIrqs {
        RNG => embassy_stm32::rng::InterruptHandler<peripherals::RNG>;
    });

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        leds: Leds,
    }

    #[init]
    fn init(_cx: init::Context) -> (Shared, Local) {
        info!("Telemetry relay starting...");

        // Adafruit Feather STM32F405: 12 MHz HSE, 32.768 kHz LSE (PC14/PC15)
        let mut config = embassy_stm32::Config::default();
        config.rcc.hse = Some(Hse {
            freq: Hertz(12_000_000),
            mode: HseMode::Oscillator,
        });

        // HSE (12 MHz) / 6 = 2 MHz PLL input, x168 = 336 MHz VCO
        // VCO / 4 = 84 MHz SYSCLK, VCO / 7 = 48 MHz for the RNG
        config.rcc.pll_src = embassy_stm32::rcc::PllSource::HSE;
        config.rcc.pll = Some(embassy_stm32::rcc::Pll {
            prediv: embassy_stm32::rcc::PllPreDiv::DIV6,
            mul: embassy_stm32::rcc::PllMul::MUL168,
            divp: Some(embassy_stm32::rcc::PllPDiv::DIV4),
            divq: Some(embassy_stm32::rcc::PllQDiv::DIV7),
            divr: None,
        });
        config.rcc.sys = embassy_stm32::rcc::Sysclk::PLL1_P;
        config.rcc.ahb_pre = embassy_stm32::rcc::AHBPrescaler::DIV1; // 84 MHz
        config.rcc.apb1_pre = embassy_stm32::rcc::APBPrescaler::DIV2; // 42 MHz
        config.rcc.apb2_pre = embassy_stm32::rcc::APBPrescaler::DIV1; // 84 MHz

        config.rcc.ls = LsConfig {
            rtc: embassy_stm32::rcc::RtcClockSource::LSE,
            lsi: false,
            lse: Some(LseConfig {
                frequency: Hertz(32_768),
                mode: LseMode::Oscillator(embassy_stm32::rcc::LseDrive::MediumHigh),
            }),
        };

        let p = embassy_stm32::init(config);

        // TIM2 on APB1: timer clock = 2*APB1 when prescaler != 1
        Mono::start(84_000_000);

        clock::install_rtc(Rtc::new(p.RTC, RtcConfig::default()));

        let seed = Rng::new(p.RNG, RngIrqs).next_u64();

        static RELAY: StaticCell<Relay> = StaticCell::new();
        let relay: &'static Relay = match Relay::new(relay::board_config()) {
            Ok(state) => RELAY.init(state),
            Err(e) => defmt::panic!("Invalid configuration: {}", e),
        };

        // Red on D13 (the on-board LED), green on D9
        let leds = StatusLeds::new(
            Output::new(p.PC1, Level::Low, Speed::Low),
            Output::new(p.PB8, Level::Low, Speed::Low),
        );

        let net_periph = NetworkPeripherals {
            spi: p.SPI2,
            sck: p.PB13,
            mosi: p.PB15,
            miso: p.PB14,
            cs: p.PC6,
            reset: p.PC3,
            int: p.PC2,
            exti: p.EXTI2,
            dma_tx: p.DMA1_CH4,
            dma_rx: p.DMA1_CH3,
        };

        supervisor::spawn(relay).ok();
        indication::spawn(relay).ok();
        telemetry::spawn(relay).ok();
        network_task::spawn(relay, net_periph, seed).ok();

        (Shared {}, Local { leds })
    }

    /// Restarts duties that stop beating
    #[task(priority = 2)]
    async fn supervisor(_cx: supervisor::Context, relay: &'static Relay) -> ! {
        let interval = relay.config.supervisor.interval_ms;
        let mut supervisor = Supervisor::new(SlotRunner::new(&relay.slots), &relay.heartbeats);
        info!("Supervising duties every {} ms", interval);
        loop {
            supervisor.supervise_once();
            Mono::delay((interval as u64).millis()).await;
        }
    }

    #[task(priority = 3, local = [leds])]
    async fn indication(cx: indication::Context, relay: &'static Relay) -> ! {
        let leds = cx.local.leds;
        let slot = &relay.slots[Duty::Indication.index()];
        loop {
            let mut duty = IndicationDuty::new(relay.shared(), &mut *leds, Delay);
            slot.run_next(duty.run(relay.heartbeats.heartbeat(Duty::Indication)))
                .await;
            warn!("Indication duty stopped");
        }
    }

    #[task(priority = 1)]
    async fn telemetry(_cx: telemetry::Context, relay: &'static Relay) -> ! {
        let mut producer = TelemetryProducer::new(relay.shared(), RtcClock, relay.probe(), Delay);
        producer.run().await
    }

    /// Owns the network stack and both duties that use it
    ///
    /// Stack is !Send and must remain within this task.
    #[task(priority = 1)]
    async fn network_task(
        _cx: network_task::Context,
        relay: &'static Relay,
        periph: NetworkPeripherals,
        seed: u64,
    ) {
        use embassy_net::{Config, StackResources};

        let mut spi_config = spi::Config::default();
        spi_config.frequency = Hertz(10_000_000); // 10 MHz for W5500

        let spi = Spi::new(
            periph.spi,
            periph.sck,
            periph.mosi,
            periph.miso,
            periph.dma_tx,
            periph.dma_rx,
            spi_config,
        );

        let eth_periph = eth::EthPeripherals {
            spi,
            cs: Output::new(periph.cs, Level::High, Speed::VeryHigh),
            reset: Output::new(periph.reset, Level::High, Speed::Low),
            int: ExtiInput::new(periph.int, periph.exti, Pull::Up),
        };

        let (device, w5500_runner) = match eth::init_w5500(eth_periph, MAC).await {
            Ok(parts) => parts,
            Err(e) => defmt::panic!("W5500 init failed: {}", e),
        };

        // DHCP, DNS, the SNTP and probe sockets, and the broker session
        static RESOURCES: StaticCell<StackResources<6>> = StaticCell::new();
        let (stack, mut net_runner) = embassy_net::new(
            device,
            Config::dhcpv4(Default::default()),
            RESOURCES.init(StackResources::new()),
            seed,
        );
        info!("Network stack initialized with DHCP");

        join5(
            w5500_runner.run(),
            net_runner.run(),
            eth::watch_lease(stack, MAC, &relay.events),
            host_network(relay, stack),
            host_messaging(relay, stack, seed),
        )
        .await;
    }

    async fn host_network(relay: &'static Relay, stack: Stack<'static>) -> ! {
        let slot = &relay.slots[Duty::Network.index()];
        loop {
            let mut duty = NetworkDuty::new(
                relay.shared(),
                relay.zones,
                &relay.events,
                EthLink::new(stack),
                StackReach::new(stack, PROBE_TIMEOUT_MS),
                SntpClock::new(stack, relay.config.sync.timeout_ms),
                Delay,
            );
            slot.run_next(duty.run(relay.heartbeats.heartbeat(Duty::Network)))
                .await;
            warn!("Network duty stopped");
        }
    }

    async fn host_messaging(relay: &'static Relay, stack: Stack<'static>, seed: u64) -> ! {
        let slot = &relay.slots[Duty::Messaging.index()];
        loop {
            let transport = MqttTransport::new(stack, seed);
            let mut duty = MessagingDuty::new(relay.shared(), transport, relay.probe(), Delay);
            slot.run_next(duty.run(relay.heartbeats.heartbeat(Duty::Messaging)))
                .await;
            warn!("Messaging duty stopped");
        }
    }

    /// RTIC idle task - WFI sleep mode when no tasks active
    #[idle]
    fn idle(_cx: idle::Context) -> ! {
        loop {
            cortex_m::asm::wfi();
        }
    }
}
