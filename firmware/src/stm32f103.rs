//! STM32F103 hardware implementation
//!
//! Register-level drivers behind the core's hardware traits. Board layout:
//!
//! - PA8  buzzer, TIM1_CH1, periods fed by DMA1 channel 5
//! - PB7  PPM output, TIM4_CH2, periods fed by DMA1 channel 7
//! - PB1  battery divider, ADC1 channel 9
//! - PC13 status LED

use core::convert::Infallible;
use portable_atomic::{AtomicU16, Ordering};

use embedded_hal::digital::{ErrorType, OutputPin, StatefulOutputPin};
use laser4_core::tone::TONE_IDLE_PERIOD;
use laser4_core::{
    AdcPeripheral, CoreError, PpmOutput, ToneOutput, WatchdogConfig, PPM_MAX_PERIOD,
    PPM_PULSE_WIDTH,
};

/// Core clock after `configure_clocks`
pub const SYSCLK_HZ: u32 = 72_000_000;
/// SysTick reload for a 1 ms tick
pub const SYSTICK_RELOAD: u32 = SYSCLK_HZ / 1000 - 1;

pub const BATTERY_CHANNEL: u8 = 9;
pub const VREFINT_CHANNEL: u8 = 17;
/// Battery channel sample time code (71.5 cycles)
const BATTERY_SAMPLE_TIME: u8 = 6;

/// Memory Map and Register Base Addresses
const FLASH_BASE: u32 = 0x4002_2000;
const RCC_BASE: u32 = 0x4002_1000;
const DMA1_BASE: u32 = 0x4002_0000;
const GPIOA_BASE: u32 = 0x4001_0800;
const GPIOB_BASE: u32 = 0x4001_0C00;
pub const GPIOC_BASE: u32 = 0x4001_1000;
const ADC1_BASE: u32 = 0x4001_2400;
const TIM1_BASE: u32 = 0x4001_2C00;
const TIM4_BASE: u32 = 0x4000_0800;
const IWDG_BASE: u32 = 0x4000_3000;
const USB_BASE: u32 = 0x4000_5C00;

/// FLASH Register offsets
const FLASH_ACR: u32 = 0x00;

/// RCC Register offsets
const RCC_CR: u32 = 0x00;
const RCC_CFGR: u32 = 0x04;
const RCC_AHBENR: u32 = 0x14;
const RCC_APB2ENR: u32 = 0x18;
const RCC_APB1ENR: u32 = 0x1C;

/// GPIO Register offsets
const GPIO_CRL: u32 = 0x00;
const GPIO_CRH: u32 = 0x04;
const GPIO_ODR: u32 = 0x0C;
const GPIO_BSRR: u32 = 0x10;

/// TIM Register offsets
const TIM_CR1: u32 = 0x00;
const TIM_DIER: u32 = 0x0C;
const TIM_EGR: u32 = 0x14;
const TIM_CCMR1: u32 = 0x18;
const TIM_CCER: u32 = 0x20;
const TIM_CNT: u32 = 0x24;
const TIM_PSC: u32 = 0x28;
const TIM_ARR: u32 = 0x2C;
const TIM_CCR1: u32 = 0x34;
const TIM_CCR2: u32 = 0x38;
const TIM_BDTR: u32 = 0x44;

const TIM_CR1_CEN: u32 = 1 << 0;
const TIM_CR1_DIR: u32 = 1 << 4;
const TIM_CR1_ARPE: u32 = 1 << 7;
const TIM_DIER_UDE: u32 = 1 << 8;
const TIM_EGR_UG: u32 = 1 << 0;

/// DMA Register offsets
const DMA_ISR: u32 = 0x00;
const DMA_IFCR: u32 = 0x04;
const DMA_CCR_EN: u32 = 1 << 0;
const DMA_CCR_TCIE: u32 = 1 << 1;
const DMA_CCR_DIR: u32 = 1 << 4;
const DMA_CCR_MINC: u32 = 1 << 7;
const DMA_CCR_PSIZE_16: u32 = 1 << 8;
const DMA_CCR_MSIZE_16: u32 = 1 << 10;
const DMA_CCR_PL_HIGHEST: u32 = 3 << 12;

/// ADC Register offsets
const ADC_SR: u32 = 0x00;
const ADC_CR1: u32 = 0x04;
const ADC_CR2: u32 = 0x08;
const ADC_SMPR1: u32 = 0x0C;
const ADC_SMPR2: u32 = 0x10;
const ADC_SQR3: u32 = 0x34;
const ADC_DR: u32 = 0x4C;

const ADC_SR_EOC: u32 = 1 << 1;
const ADC_CR1_EOCIE: u32 = 1 << 5;
const ADC_CR2_ADON: u32 = 1 << 0;
const ADC_CR2_CAL: u32 = 1 << 2;
const ADC_CR2_EXTSEL_SWSTART: u32 = 7 << 17;
const ADC_CR2_EXTTRIG: u32 = 1 << 20;
const ADC_CR2_SWSTART: u32 = 1 << 22;
const ADC_CR2_TSVREFE: u32 = 1 << 23;

/// IWDG Register offsets
const IWDG_KR: u32 = 0x00;
const IWDG_PR: u32 = 0x04;
const IWDG_RLR: u32 = 0x08;
const IWDG_SR: u32 = 0x0C;

/// USB Register offsets
const USB_CNTR: u32 = 0x40;
const USB_ISTR: u32 = 0x44;
pub const USB_ISTR_SUSP: u32 = 1 << 11;
pub const USB_ISTR_WKUP: u32 = 1 << 12;

#[inline(always)]
fn reg_read(base: u32, offset: u32) -> u32 {
    unsafe { core::ptr::read_volatile((base + offset) as *const u32) }
}

#[inline(always)]
fn reg_write(base: u32, offset: u32, value: u32) {
    unsafe { core::ptr::write_volatile((base + offset) as *mut u32, value) }
}

#[inline(always)]
fn reg_modify(base: u32, offset: u32, f: impl FnOnce(u32) -> u32) {
    reg_write(base, offset, f(reg_read(base, offset)));
}

/// Spin on a register bit with a loop-count bound (no time base yet)
fn spin_until(mut ready: impl FnMut() -> bool) -> Result<(), CoreError> {
    for _ in 0..0x10_0000 {
        if ready() {
            return Ok(());
        }
    }
    Err(CoreError::Timeout)
}

/// Configure one pin (4-bit CNF/MODE nibble)
fn gpio_mode(port: u32, pin: u8, mode: u32) {
    let (offset, shift) = if pin < 8 {
        (GPIO_CRL, pin as u32 * 4)
    } else {
        (GPIO_CRH, (pin as u32 - 8) * 4)
    };
    reg_modify(port, offset, |v| (v & !(0xF << shift)) | (mode << shift));
}

const GPIO_AF_PP_2MHZ: u32 = 0xA;
const GPIO_OUT_PP_2MHZ: u32 = 0x2;
const GPIO_ANALOG: u32 = 0x0;

/// HSE 8 MHz -> PLL x9 -> 72 MHz; APB1 /2, ADC /6, USB /1.5
pub fn configure_clocks() -> Result<(), CoreError> {
    reg_modify(RCC_BASE, RCC_CR, |v| v | 1 << 16); // HSEON
    spin_until(|| reg_read(RCC_BASE, RCC_CR) & 1 << 17 != 0)?;

    reg_write(FLASH_BASE, FLASH_ACR, 1 << 4 | 2); // Prefetch, two wait states
    reg_write(
        RCC_BASE,
        RCC_CFGR,
        7 << 18       // PLLMUL x9
            | 1 << 16 // PLLSRC = HSE
            | 2 << 14 // ADCPRE /6
            | 4 << 8, // PPRE1 /2
    );
    reg_modify(RCC_BASE, RCC_CR, |v| v | 1 << 24); // PLLON
    spin_until(|| reg_read(RCC_BASE, RCC_CR) & 1 << 25 != 0)?;

    reg_modify(RCC_BASE, RCC_CFGR, |v| (v & !0x3) | 0x2); // SW = PLL
    spin_until(|| reg_read(RCC_BASE, RCC_CFGR) & 0xC == 0x8)
}

/// Enable clocks and pins for every peripheral the firmware drives
pub fn configure_peripherals() {
    reg_modify(RCC_BASE, RCC_AHBENR, |v| v | 1 << 0); // DMA1
    // AFIO, GPIOA, GPIOB, GPIOC, ADC1, TIM1
    reg_modify(RCC_BASE, RCC_APB2ENR, |v| {
        v | 1 << 0 | 1 << 2 | 1 << 3 | 1 << 4 | 1 << 9 | 1 << 11
    });
    // TIM4, USB
    reg_modify(RCC_BASE, RCC_APB1ENR, |v| v | 1 << 2 | 1 << 23);

    gpio_mode(GPIOA_BASE, 8, GPIO_AF_PP_2MHZ);
    gpio_mode(GPIOB_BASE, 7, GPIO_AF_PP_2MHZ);
    gpio_mode(GPIOB_BASE, 1, GPIO_ANALOG);
    gpio_mode(GPIOC_BASE, 13, GPIO_OUT_PP_2MHZ);
}

/// Route USB suspend and wakeup to the low-priority interrupt
pub fn enable_usb_power_events() {
    reg_write(USB_BASE, USB_CNTR, USB_ISTR_SUSP | USB_ISTR_WKUP);
}

/// Read and acknowledge pending USB power events
pub fn take_usb_power_events() -> u32 {
    let pending = reg_read(USB_BASE, USB_ISTR) & (USB_ISTR_SUSP | USB_ISTR_WKUP);
    // ISTR bits are cleared by writing zero
    reg_write(USB_BASE, USB_ISTR, !pending & 0xFFFF);
    pending
}

struct DmaChannel(u32);

impl DmaChannel {
    const fn base(&self) -> u32 {
        DMA1_BASE + 0x08 + 20 * (self.0 - 1)
    }

    fn configure(&self, peripheral: u32, ccr: u32) {
        reg_write(self.base(), 0x00, 0);
        reg_write(self.base(), 0x08, peripheral);
        reg_write(self.base(), 0x00, ccr);
    }

    fn load(&self, memory: u32, count: u16) {
        reg_modify(self.base(), 0x00, |v| v & !DMA_CCR_EN);
        reg_write(self.base(), 0x0C, memory);
        reg_write(self.base(), 0x04, count as u32);
        reg_modify(self.base(), 0x00, |v| v | DMA_CCR_EN);
    }

    fn disable(&self) {
        reg_modify(self.base(), 0x00, |v| v & !DMA_CCR_EN);
    }

    /// Transfer-complete flag
    fn complete(&self) -> bool {
        reg_read(DMA1_BASE, DMA_ISR) & 1 << (4 * (self.0 - 1) + 1) != 0
    }

    fn clear_flags(&self) {
        reg_write(DMA1_BASE, DMA_IFCR, 1 << (4 * (self.0 - 1)));
    }
}

/// Period value the buzzer transfer engine repeats into TIM1_ARR
static BUZZER_PERIOD: AtomicU16 = AtomicU16::new(TONE_IDLE_PERIOD);

/// TIM1 down-counting PWM buzzer, reload values fed by DMA1 channel 5
pub struct Tim1Buzzer {
    dma: DmaChannel,
}

impl Tim1Buzzer {
    pub const fn new() -> Self {
        Self { dma: DmaChannel(5) }
    }

    pub fn configure(&mut self) {
        self.dma.configure(
            TIM1_BASE + TIM_ARR,
            DMA_CCR_MSIZE_16 | DMA_CCR_PSIZE_16 | DMA_CCR_DIR | DMA_CCR_TCIE,
        );

        reg_write(TIM1_BASE, TIM_CR1, TIM_CR1_DIR);
        reg_write(TIM1_BASE, TIM_CCMR1, 6 << 4); // PWM mode 1
        reg_write(TIM1_BASE, TIM_PSC, SYSCLK_HZ / 1_000_000 - 1);
        reg_write(TIM1_BASE, TIM_CCER, 1 << 0);
        reg_modify(TIM1_BASE, TIM_BDTR, |v| v | 1 << 15); // MOE
        reg_write(TIM1_BASE, TIM_ARR, TONE_IDLE_PERIOD as u32);
        reg_write(TIM1_BASE, TIM_EGR, TIM_EGR_UG);
        reg_modify(TIM1_BASE, TIM_DIER, |v| v | TIM_DIER_UDE);
    }

    /// Poll and acknowledge transfer-complete from the interrupt handler
    pub fn take_transfer_complete(&self) -> bool {
        let done = self.dma.complete();
        if done {
            self.dma.disable();
        }
        self.dma.clear_flags();
        done
    }

    fn load(&mut self, period: u16, pulses: u16) {
        BUZZER_PERIOD.store(period, Ordering::Relaxed);
        self.dma.load(BUZZER_PERIOD.as_ptr() as u32, pulses);
    }
}

impl Default for Tim1Buzzer {
    fn default() -> Self {
        Self::new()
    }
}

impl ToneOutput for Tim1Buzzer {
    fn set_pulse_width(&mut self, width: u16) {
        reg_write(TIM1_BASE, TIM_CCR1, width as u32);
    }

    fn pulse_width(&self) -> u16 {
        reg_read(TIM1_BASE, TIM_CCR1) as u16
    }

    fn start(&mut self, period: u16, pulses: u16) {
        self.load(period, pulses);
        reg_write(TIM1_BASE, TIM_EGR, TIM_EGR_UG);
        reg_modify(TIM1_BASE, TIM_CR1, |v| v | TIM_CR1_CEN);
    }

    fn rearm(&mut self, period: u16, pulses: u16) {
        self.load(period, pulses);
    }

    fn stop(&mut self) {
        self.dma.disable();
        reg_modify(TIM1_BASE, TIM_CR1, |v| v & !TIM_CR1_CEN);
        reg_write(TIM1_BASE, TIM_ARR, TONE_IDLE_PERIOD as u32);
        reg_write(TIM1_BASE, TIM_EGR, TIM_EGR_UG);
    }
}

/// TIM4 channel 2 PPM output, reload values fed by DMA1 channel 7
pub struct Tim4Ppm {
    dma: DmaChannel,
}

impl Tim4Ppm {
    pub const fn new() -> Self {
        Self { dma: DmaChannel(7) }
    }

    pub fn configure(&mut self) {
        self.dma.configure(
            TIM4_BASE + TIM_ARR,
            DMA_CCR_PL_HIGHEST
                | DMA_CCR_MSIZE_16
                | DMA_CCR_PSIZE_16
                | DMA_CCR_DIR
                | DMA_CCR_MINC
                | DMA_CCR_TCIE,
        );

        reg_write(TIM4_BASE, TIM_CR1, TIM_CR1_DIR | TIM_CR1_ARPE);
        // APB1 timers run at SYSCLK with APB1 /2
        reg_write(TIM4_BASE, TIM_PSC, SYSCLK_HZ / laser4_core::ppm::PPM_TIMER_HZ - 1);
        reg_write(TIM4_BASE, TIM_CCMR1, 7 << 12); // PWM mode 2 on channel 2
        reg_write(TIM4_BASE, TIM_CCER, 1 << 4);
        // Park the line high
        reg_write(TIM4_BASE, TIM_ARR, PPM_MAX_PERIOD as u32);
        reg_write(TIM4_BASE, TIM_CNT, PPM_MAX_PERIOD as u32);
        reg_write(TIM4_BASE, TIM_CCR2, PPM_PULSE_WIDTH as u32);
        reg_modify(TIM4_BASE, TIM_DIER, |v| v | TIM_DIER_UDE);
    }

    pub fn take_transfer_complete(&self) -> bool {
        let done = self.dma.complete();
        if done {
            self.dma.disable();
        }
        self.dma.clear_flags();
        done
    }
}

impl Default for Tim4Ppm {
    fn default() -> Self {
        Self::new()
    }
}

impl PpmOutput for Tim4Ppm {
    fn start(&mut self, frame: &[u16]) {
        let Some(&first) = frame.first() else { return };
        // The forced update produces the frame's leading edge; the transfer
        // then starts again from frame[0] to time the first channel.
        reg_write(TIM4_BASE, TIM_ARR, first as u32);
        reg_write(TIM4_BASE, TIM_EGR, TIM_EGR_UG);
        self.dma.load(frame.as_ptr() as u32, frame.len() as u16);
        reg_modify(TIM4_BASE, TIM_CR1, |v| v | TIM_CR1_CEN);
    }

    fn abort(&mut self) {
        self.dma.disable();
        self.dma.clear_flags();
    }

    fn stop(&mut self) {
        reg_modify(TIM4_BASE, TIM_CR1, |v| v & !TIM_CR1_CEN);
    }
}

/// ADC1 in single-conversion, software-triggered mode
pub struct Adc1;

impl Adc1 {
    pub const fn new() -> Self {
        Self
    }

    /// Power the converter up; the caller waits `ADC_POWER_UP_MS` afterwards
    pub fn power_up(&mut self) {
        reg_write(ADC1_BASE, ADC_CR1, 0);
        reg_write(
            ADC1_BASE,
            ADC_CR2,
            ADC_CR2_EXTSEL_SWSTART | ADC_CR2_EXTTRIG | ADC_CR2_ADON,
        );
        self.set_sample_time(BATTERY_CHANNEL, BATTERY_SAMPLE_TIME);
    }

    /// End-of-conversion interrupt, enabled once calibration is done
    pub fn enable_interrupt(&mut self) {
        reg_modify(ADC1_BASE, ADC_CR1, |v| v | ADC_CR1_EOCIE);
    }

    /// Data register, read from the interrupt handler
    pub fn take_result() -> u16 {
        reg_read(ADC1_BASE, ADC_DR) as u16
    }
}

impl Default for Adc1 {
    fn default() -> Self {
        Self::new()
    }
}

impl AdcPeripheral for Adc1 {
    fn start_calibration(&mut self) {
        reg_modify(ADC1_BASE, ADC_CR2, |v| v | ADC_CR2_CAL);
    }

    fn calibration_busy(&self) -> bool {
        reg_read(ADC1_BASE, ADC_CR2) & ADC_CR2_CAL != 0
    }

    fn set_sample_time(&mut self, channel: u8, sample_time: u8) {
        let (offset, shift) = if channel < 10 {
            (ADC_SMPR2, 3 * channel as u32)
        } else {
            (ADC_SMPR1, 3 * (channel as u32 - 10))
        };
        let code = sample_time as u32 & 7;
        reg_modify(ADC1_BASE, offset, |v| (v & !(7 << shift)) | (code << shift));
    }

    fn enable_reference(&mut self, enable: bool) {
        reg_modify(ADC1_BASE, ADC_CR2, |v| {
            if enable {
                v | ADC_CR2_TSVREFE
            } else {
                v & !ADC_CR2_TSVREFE
            }
        });
    }

    fn start_conversion(&mut self, channel: u8) {
        reg_write(ADC1_BASE, ADC_SQR3, channel as u32 & 0x1F);
        reg_modify(ADC1_BASE, ADC_CR2, |v| v | ADC_CR2_SWSTART);
    }

    fn conversion_done(&self) -> bool {
        reg_read(ADC1_BASE, ADC_SR) & ADC_SR_EOC != 0
    }

    fn read(&self) -> u16 {
        reg_read(ADC1_BASE, ADC_DR) as u16
    }
}

/// Independent watchdog
pub struct Iwdg;

impl Iwdg {
    /// Start the watchdog; skipped while a previous update is still in flight
    pub fn enable(config: WatchdogConfig) -> bool {
        if reg_read(IWDG_BASE, IWDG_SR) != 0 {
            return false;
        }
        reg_write(IWDG_BASE, IWDG_KR, WatchdogConfig::KEY_UNLOCK as u32);
        reg_write(IWDG_BASE, IWDG_PR, config.prescaler as u32);
        reg_write(IWDG_BASE, IWDG_RLR, config.reload as u32);
        reg_write(IWDG_BASE, IWDG_KR, WatchdogConfig::KEY_RELOAD as u32);
        reg_write(IWDG_BASE, IWDG_KR, WatchdogConfig::KEY_START as u32);
        true
    }

    pub fn reload() {
        reg_write(IWDG_BASE, IWDG_KR, WatchdogConfig::KEY_RELOAD as u32);
    }
}

/// Push-pull output pin
pub struct GpioOutput {
    port: u32,
    pin: u8,
}

impl GpioOutput {
    pub const fn new(port: u32, pin: u8) -> Self {
        Self { port, pin }
    }
}

impl ErrorType for GpioOutput {
    type Error = Infallible;
}

impl OutputPin for GpioOutput {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        reg_write(self.port, GPIO_BSRR, 1 << (self.pin as u32 + 16));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        reg_write(self.port, GPIO_BSRR, 1 << self.pin);
        Ok(())
    }
}

impl StatefulOutputPin for GpioOutput {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(reg_read(self.port, GPIO_ODR) & 1 << self.pin != 0)
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        self.is_set_high().map(|high| !high)
    }
}
