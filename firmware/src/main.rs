#![no_std]
#![no_main]

// Logging support
#[cfg(feature = "defmt")]
use defmt::{debug, error, info, warn};
#[cfg(feature = "defmt")]
use defmt_rtt as _;
#[cfg(feature = "defmt")]
use panic_probe as _;
#[cfg(not(feature = "defmt"))]
use panic_halt as _;

// Define simple logging macros when defmt is not available
#[cfg(not(feature = "defmt"))]
macro_rules! info {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "defmt"))]
macro_rules! debug {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "defmt"))]
macro_rules! warn {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "defmt"))]
macro_rules! error {
    ($($arg:tt)*) => {};
}

use core::cell::RefCell;

use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{NVIC, SYST};
use cortex_m_rt::{entry, exception};
use critical_section::Mutex;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::StatefulOutputPin;
use static_cell::StaticCell;
use stm32f1::stm32f103::interrupt;

use laser4_firmware::adc::ADC_POWER_UP_MS;
use laser4_firmware::stm32f103::{
    self, BATTERY_CHANNEL, GPIOC_BASE, SYSTICK_RELOAD, USB_ISTR_SUSP, USB_ISTR_WKUP,
    VREFINT_CHANNEL,
};
use laser4_firmware::tone::wait_for_completion;
use laser4_firmware::{
    default_config, startup, Adc1, AdcTelemetry, CoreConfig, CoreError, GpioOutput, Interrupt,
    Iwdg, Mode, ModeController, OperatingModes, PpmGenerator, PpmRelay, SharedState, TickCounter,
    TickDelay, TickSource, Tim1Buzzer, Tim4Ppm, TimerAction, TimerPool, ToneGenerator, UsbHid,
    WatchdogConfig, BATTERY_POLL_MS, BLINK_MS, SWTIM_NUM,
};

// ========================================
// Shared State
// ========================================

/// Millisecond tick (SysTick)
static TICKS: TickCounter = TickCounter::new();

/// Packed mode word, written from the USB interrupt
static MODES: ModeController = ModeController::new();

static TONE: Mutex<RefCell<ToneGenerator<Tim1Buzzer>>> =
    Mutex::new(RefCell::new(ToneGenerator::new(Tim1Buzzer::new())));

static PPM: Mutex<RefCell<PpmGenerator<Tim4Ppm>>> =
    Mutex::new(RefCell::new(PpmGenerator::new(Tim4Ppm::new())));

/// Replaced by the calibrated instance during init
static ADC: Mutex<RefCell<AdcTelemetry<Adc1>>> = Mutex::new(RefCell::new(AdcTelemetry::new(
    Adc1::new(),
    BATTERY_CHANNEL,
    VREFINT_CHANNEL,
)));

/// Foreground-only timer pool
static TIMERS: StaticCell<TimerPool<TimerAction, SWTIM_NUM>> = StaticCell::new();

/// Unrecoverable boot failure; halts and lets the watchdog (if armed) reset
fn fatal(what: &'static str, _error: CoreError) -> ! {
    error!("{}: {}", what, _error);
    panic!("{}", what);
}

// ========================================
// Initialization
// ========================================

fn hardware_init(syst: &mut SYST, config: &CoreConfig) {
    if let Err(e) = stm32f103::configure_clocks() {
        fatal("clock bring-up", e);
    }
    stm32f103::configure_peripherals();
    configure_systick(syst);

    TONE.with_mut(|tone| {
        tone.output_mut().configure();
        tone.set_volume(config.tone_volume);
    });

    match PpmGenerator::with_config(Tim4Ppm::new(), config) {
        Ok(mut ppm) => {
            ppm.output_mut().configure();
            PPM.with_mut(|slot| *slot = ppm);
        }
        Err(e) => fatal("PPM configuration", e),
    }

    initialize_adc(config);
    stm32f103::enable_usb_power_events();

    // SAFETY: handlers for these lines only touch state behind `Mutex`es or atomics
    unsafe {
        NVIC::unmask(Interrupt::DMA1_CHANNEL5);
        NVIC::unmask(Interrupt::DMA1_CHANNEL7);
        NVIC::unmask(Interrupt::ADC1_2);
        NVIC::unmask(Interrupt::USB_LP_CAN_RX0);
    }

    info!("Hardware initialization complete");
}

/// 1 ms SysTick from the core clock
fn configure_systick(syst: &mut SYST) {
    syst.set_clock_source(SystClkSource::Core);
    syst.set_reload(SYSTICK_RELOAD);
    syst.clear_current();
    syst.enable_counter();
    syst.enable_interrupt();
}

/// Calibrate outside the critical section; the delays need SysTick running
fn initialize_adc(config: &CoreConfig) {
    let adc = AdcTelemetry::with_config(Adc1::new(), BATTERY_CHANNEL, VREFINT_CHANNEL, config);
    let mut adc = match adc {
        Ok(adc) => adc,
        Err(e) => fatal("ADC configuration", e),
    };
    let mut delay = TickDelay::new(&TICKS);

    adc.adc_mut().power_up();
    delay.delay_ms(ADC_POWER_UP_MS);
    if let Err(e) = adc.calibrate(&mut delay, &TICKS, config.calibration_timeout_ms) {
        fatal("ADC calibration", e);
    }
    adc.adc_mut().enable_interrupt();

    ADC.with_mut(|slot| *slot = adc);
}

// ========================================
// Main Application
// ========================================

#[entry]
fn main() -> ! {
    let Some(mut cp) = cortex_m::Peripherals::take() else {
        panic!("core peripherals already taken");
    };
    let config = default_config();

    hardware_init(&mut cp.SYST, &config);
    info!("Laser4+ core v{}", laser4_firmware::VERSION);

    if let Err(_e) = startup(&MODES, &TONE) {
        warn!("Startup chime rejected: {}", _e);
    }
    if let Err(e) = wait_for_completion(&TONE, &TICKS, config.tone_timeout_ms) {
        fatal("startup chime", e);
    }

    let watchdog = WatchdogConfig::from_interval_ms(config.watchdog_ms);
    if !Iwdg::enable(watchdog) {
        warn!("Watchdog update in progress, not reconfigured");
    }

    main_loop(&config)
}

/// Main execution loop
fn main_loop(config: &CoreConfig) -> ! {
    let timers = TIMERS.init(TimerPool::new());
    let schedule = [
        (BLINK_MS, TimerAction::BlinkLed),
        (BATTERY_POLL_MS, TimerAction::PollBattery),
    ];
    for (period, action) in schedule {
        if let Err(_e) = timers.start(period, true, action) {
            warn!("Timer {} not started: {}", action, _e);
        }
    }

    if let Err(_e) = ADC.with_mut(|adc| adc.start_battery_conversion()) {
        warn!("Battery conversion not started: {}", _e);
    }

    let mut modes = OperatingModes::new(
        PpmRelay::new(&PPM, &TICKS, config),
        UsbHid,
        GpioOutput::new(GPIOC_BASE, 13),
        &TONE,
    );

    info!("Main loop started");

    loop {
        MODES.step(&mut modes);

        timers.poll(TICKS.now(), |action| match action {
            TimerAction::BlinkLed => {
                if MODES.current() == Some(Mode::Multiprotocol) {
                    let _ = modes.led.toggle();
                }
            }
            TimerAction::PollBattery => match ADC.with_mut(|adc| adc.read_battery_voltage()) {
                Ok(_mv) => {
                    debug!("Battery: {} mV", _mv);
                }
                // Keep the last known value, retry on the next poll
                Err(_) => {}
            },
        });

        Iwdg::reload();

        // SysTick wakes the core every millisecond
        cortex_m::asm::wfi();
    }
}

// ========================================
// Interrupt Handlers
// ========================================

#[exception]
fn SysTick() {
    TICKS.tick();
}

/// Buzzer transfer complete
#[interrupt]
fn DMA1_CHANNEL5() {
    TONE.with_mut(|tone| {
        if tone.output().take_transfer_complete() {
            tone.on_transfer_complete();
        }
    });
}

/// PPM transfer complete
#[interrupt]
fn DMA1_CHANNEL7() {
    PPM.with_mut(|ppm| {
        if ppm.output().take_transfer_complete() {
            ppm.on_transfer_complete();
        }
    });
}

/// End of conversion
#[interrupt]
fn ADC1_2() {
    let raw = Adc1::take_result();
    ADC.with_mut(|adc| adc.on_conversion_complete(raw));
}

/// USB suspend hands the module back to the RF side; resume brings HID up
#[interrupt]
fn USB_LP_CAN_RX0() {
    let events = stm32f103::take_usb_power_events();
    if events & USB_ISTR_SUSP != 0 {
        MODES.request(Mode::Multiprotocol);
    }
    if events & USB_ISTR_WKUP != 0 {
        MODES.request(Mode::Hid);
    }
}
