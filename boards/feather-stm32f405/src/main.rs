#![deny(unsafe_code)]
#![deny(warnings)]
#![no_main]
#![no_std]

use defmt_rtt as _; // global logger
use panic_probe as _;
use rtic::app;
use rtic_monotonics::stm32::prelude::*;

#[cfg(feature = "low-power")]
mod power;
mod storage;
mod time;
mod timer;

stm32_tim2_monotonic!(Mono, 1_000_000);

#[cfg(any(
    all(feature = "sensor-rtd", feature = "sensor-rs485"),
    not(any(feature = "sensor-rtd", feature = "sensor-rs485"))
))]
compile_error!("enable exactly one of `sensor-rtd` and `sensor-rs485`");

/// Console speed expected by the host sync tool
const CONSOLE_BAUD: u32 = 9600;

/// Sampling interval
const LOG_INTERVAL_MS: u32 = 10_000;

#[app(device = embassy_stm32, peripherals = true, dispatchers = [CAN1_RX0, CAN1_RX1])]
mod app {
    use super::*;
    use core::cell::RefCell;
    use defmt::{error, info};
    use embassy_embedded_hal::shared_bus::blocking::spi::SpiDeviceWithConfig;
    use embassy_stm32::gpio::{Level, Output, Speed};
    use embassy_stm32::mode::Blocking;
    use embassy_stm32::peripherals;
    use embassy_stm32::rcc::{Hse, HseMode, LsConfig, LseConfig, LseMode};
    use embassy_stm32::rtc::{Rtc, RtcConfig};
    use embassy_stm32::spi::{self, Spi};
    use embassy_stm32::time::Hertz;
    use embassy_stm32::usart::{self, BufferedUart};
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_sync::blocking_mutex::Mutex;
    use logger_core::{Controller, CsvHeader, LoggerConfig, LoggerParts};
    use static_cell::StaticCell;

    use storage::SdStore;
    use time::InternalRtc;
    use timer::MonoTimer;

    type Pin<P> = embassy_stm32::Peri<'static, P>;
    type SpiBus = Mutex<CriticalSectionRawMutex, RefCell<Spi<'static, Blocking>>>;

    /// Everything the logger task builds its drivers from
    ///
    /// Wiring on the Feather headers:
    /// - console: USART3 TX/RX pins (PB10/PB11)
    /// - SPI2 SCK/MOSI/MISO (PB13/PB15/PB14) shared by the SD breakout
    ///   (CS on D10, PB9) and the MAX31865 (CS on D9, PB8)
    /// - RS-485 transceiver: USART1 on SCL/SDA (PB6/PB7), DE+/RE on D5 (PC7)
    /// - activity LED: D13 (PC1)
    struct LoggerPeripherals {
        console: Pin<peripherals::USART3>,
        console_tx: Pin<peripherals::PB10>,
        console_rx: Pin<peripherals::PB11>,
        spi: Pin<peripherals::SPI2>,
        sck: Pin<peripherals::PB13>,
        mosi: Pin<peripherals::PB15>,
        miso: Pin<peripherals::PB14>,
        sd_cs: Pin<peripherals::PB9>,
        #[cfg(feature = "sensor-rtd")]
        rtd_cs: Pin<peripherals::PB8>,
        #[cfg(feature = "sensor-rs485")]
        bus: Pin<peripherals::USART1>,
        #[cfg(feature = "sensor-rs485")]
        bus_tx: Pin<peripherals::PB6>,
        #[cfg(feature = "sensor-rs485")]
        bus_rx: Pin<peripherals::PB7>,
        #[cfg(feature = "sensor-rs485")]
        bus_de: Pin<peripherals::PC7>,
        led: Pin<peripherals::PC1>,
    }

    embassy_stm32::bind_interrupts!(struct ConsoleIrqs {
        USART3 => usart::BufferedInterruptHandler<peripherals::USART3>;
    });

    #[cfg(feature = "sensor-rs485")]
    embassy_stm32::bind_interrupts!(struct BusIrqs {
        USART1 => usart::BufferedInterruptHandler<peripherals::USART1>;
    });

    #[shared]
    struct Shared {}

    #[local]
    struct Local {}

    #[init]
    fn init(_cx: init::Context) -> (Shared, Local) {
        info!("SD data logger starting...");

        // Adafruit Feather STM32F405: 12 MHz HSE, 32.768 kHz LSE (PC14/PC15)
        let mut config = embassy_stm32::Config::default();
        config.rcc.hse = Some(Hse {
            freq: Hertz(12_000_000),
            mode: HseMode::Oscillator,
        });

        // HSE (12 MHz) / PREDIV(6) = 2 MHz (PLL input)
        // 2 MHz * MUL(168) = 336 MHz (VCO)
        // VCO / DIVP(4) = 84 MHz (SYSCLK)
        // VCO / DIVQ(7) = 48 MHz
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
        info!("System initialized with HSE (12MHz) and LSE (32.768kHz)");

        // TIM2 on APB1: timer clock = 2*APB1 when prescaler != 1
        let timer_clock_hz = 84_000_000;
        Mono::start(timer_clock_hz);
        info!("TIM2 monotonic timer initialized at 1 MHz");

        let rtc = Rtc::new(p.RTC, RtcConfig::default());
        time::initialize_rtc(rtc);

        let periph = LoggerPeripherals {
            console: p.USART3,
            console_tx: p.PB10,
            console_rx: p.PB11,
            spi: p.SPI2,
            sck: p.PB13,
            mosi: p.PB15,
            miso: p.PB14,
            sd_cs: p.PB9,
            #[cfg(feature = "sensor-rtd")]
            rtd_cs: p.PB8,
            #[cfg(feature = "sensor-rs485")]
            bus: p.USART1,
            #[cfg(feature = "sensor-rs485")]
            bus_tx: p.PB6,
            #[cfg(feature = "sensor-rs485")]
            bus_rx: p.PB7,
            #[cfg(feature = "sensor-rs485")]
            bus_de: p.PC7,
            led: p.PC1,
        };

        logger::spawn(periph).ok();

        (Shared {}, Local {})
    }

    /// Logger task - builds the drivers and runs the control loop forever
    ///
    /// A boot failure has already been reported on the console; the task
    /// then parks the core.
    #[task(priority = 1)]
    async fn logger(_cx: logger::Context, periph: LoggerPeripherals) -> ! {
        info!("Logger task started");

        let mut uart_config = usart::Config::default();
        uart_config.baudrate = CONSOLE_BAUD;
        static CONSOLE_TX: StaticCell<[u8; 256]> = StaticCell::new();
        static CONSOLE_RX: StaticCell<[u8; 256]> = StaticCell::new();
        let console = match BufferedUart::new(
            periph.console,
            periph.console_rx,
            periph.console_tx,
            CONSOLE_TX.init([0; 256]),
            CONSOLE_RX.init([0; 256]),
            ConsoleIrqs,
            uart_config,
        ) {
            Ok(uart) => uart,
            Err(e) => {
                error!("Console UART rejected its config: {:?}", e);
                halt()
            }
        };

        // SD cards must be initialized at <= 400 kHz in SPI mode 0
        let mut sd_config = spi::Config::default();
        sd_config.frequency = Hertz(400_000);
        sd_config.mode = spi::MODE_0;

        static SPI_BUS: StaticCell<SpiBus> = StaticCell::new();
        let bus: &'static SpiBus = SPI_BUS.init(Mutex::new(RefCell::new(Spi::new_blocking(
            periph.spi,
            periph.sck,
            periph.mosi,
            periph.miso,
            sd_config,
        ))));

        let sd_cs = Output::new(periph.sd_cs, Level::High, Speed::VeryHigh);
        let store = SdStore::new(
            SpiDeviceWithConfig::new(bus, sd_cs, sd_config),
            embassy_time::Delay,
        );

        #[cfg(feature = "sensor-rtd")]
        let (sensor, config) = {
            // MAX31865 accepts SPI modes 1 and 3, up to 5 MHz
            let mut rtd_config = spi::Config::default();
            rtd_config.frequency = Hertz(1_000_000);
            rtd_config.mode = spi::MODE_1;

            let rtd_cs = Output::new(periph.rtd_cs, Level::High, Speed::VeryHigh);
            let mut rtd = logger_core::Max31865::new(
                SpiDeviceWithConfig::new(bus, rtd_cs, rtd_config),
                MonoTimer,
                logger_core::RtdConfig::pt100(),
            );
            if let Err(e) = rtd.init() {
                defmt::warn!("MAX31865 init failed: {:?}", defmt::Debug2Format(&e));
            }

            let config = LoggerConfig {
                interval_ms: LOG_INTERVAL_MS,
                header: CsvHeader::DateTemp,
                ..LoggerConfig::default()
            };
            (rtd, config)
        };

        #[cfg(feature = "sensor-rs485")]
        let (sensor, config) = {
            let mut bus_config = usart::Config::default();
            bus_config.baudrate = 9600;
            static BUS_TX: StaticCell<[u8; 64]> = StaticCell::new();
            static BUS_RX: StaticCell<[u8; 128]> = StaticCell::new();
            let uart = match BufferedUart::new(
                periph.bus,
                periph.bus_rx,
                periph.bus_tx,
                BUS_TX.init([0; 64]),
                BUS_RX.init([0; 128]),
                BusIrqs,
                bus_config,
            ) {
                Ok(uart) => uart,
                Err(e) => {
                    error!("RS-485 UART rejected its config: {:?}", e);
                    halt()
                }
            };
            let de = Output::new(periph.bus_de, Level::Low, Speed::Low);
            let probe = logger_core::Rs485Probe::new(
                uart,
                de,
                MonoTimer,
                logger_core::Rs485Config::default(),
            );

            // Rows carry the factory-programmed 96-bit UID as device ID
            let config = LoggerConfig {
                interval_ms: LOG_INTERVAL_MS,
                header: CsvHeader::IdDateTemp,
                device_id: Some(embassy_stm32::uid::uid_hex()),
                ..LoggerConfig::default()
            };
            (probe, config)
        };

        #[cfg(not(feature = "low-power"))]
        let policy = logger_core::BusyWait::new(logger_core::BusyWaitConfig::default());
        #[cfg(feature = "low-power")]
        let policy = logger_core::PowerManaged::new(
            power::Stm32Power::new(),
            logger_core::PowerConfig::default(),
        );

        let parts = LoggerParts {
            rtc: InternalRtc,
            sensor,
            store,
            console,
            led: Output::new(periph.led, Level::Low, Speed::Low),
            policy,
            timer: MonoTimer,
        };

        match Controller::boot(parts, config).await {
            Ok(mut controller) => controller.run().await,
            Err(e) => {
                error!("Boot failed: {}", e);
                halt()
            }
        }
    }

    /// Park the core after an unrecoverable error
    fn halt() -> ! {
        loop {
            cortex_m::asm::wfi();
        }
    }

    /// RTIC idle task - WFI sleep mode when no tasks active
    #[idle]
    fn idle(_cx: idle::Context) -> ! {
        info!("Idle task started - entering WFI loop");
        loop {
            cortex_m::asm::wfi();
        }
    }
}
