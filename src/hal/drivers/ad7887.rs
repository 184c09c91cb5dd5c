use embedded_hal::spi::{self, SpiDevice};

use crate::error::HardwareError;
use crate::hal::traits::SensorSource;
use crate::hal::types::{AdcCode, RawSample, SensorInfo, DEFAULT_BUS_CLOCK_HZ};

/// AD7887 maximum serial clock
pub const AD7887_MAX_CLOCK_HZ: u32 = 2_000_000;

/// Highest first frame byte a real conversion produces. The AD8318 output
/// never reaches codes 0xE00 and up, so those frames are bus noise.
pub const MAX_FRAME_HIGH_BYTE: u8 = 0x0D;

/// Power management field of the AD7887 control register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerMode {
    /// Power down whenever CS is high
    PowerDownBetweenConversions,
    /// Stay powered between conversions
    AlwaysOn,
}

/// Control word for external reference, single channel operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Control {
    pub power_mode: PowerMode,
}

impl Control {
    const SINGLE_CHANNEL_EXT_REF: u8 = 0b0010_0000;

    pub fn bits(&self) -> u8 {
        match self.power_mode {
            PowerMode::PowerDownBetweenConversions => Self::SINGLE_CHANNEL_EXT_REF,
            PowerMode::AlwaysOn => Self::SINGLE_CHANNEL_EXT_REF | 0b0000_0001,
        }
    }
}

impl Default for Control {
    fn default() -> Self {
        Self {
            power_mode: PowerMode::PowerDownBetweenConversions,
        }
    }
}

/// Clock control for the SPI peripheral carrying the ADC
pub trait BusClock {
    fn set_clock_hz(&mut self, hz: u32) -> Result<(), HardwareError>;
}

/// Decode a 16-bit conversion frame.
///
/// The AD7887 shifts out four leading zeros before the 12 data bits, and the
/// detector keeps the code below 0xE00. A first byte above
/// [`MAX_FRAME_HIGH_BYTE`] is line noise or a bus fault.
pub fn decode_frame(frame: [u8; 2]) -> Result<AdcCode, HardwareError> {
    if frame[0] > MAX_FRAME_HIGH_BYTE {
        return Err(HardwareError::Protocol(format!(
            "conversion frame out of detector range: {:#04x} {:#04x}",
            frame[0], frame[1]
        )));
    }
    Ok(u16::from_be_bytes(frame))
}

fn bus_error<E: spi::Error>(err: E) -> HardwareError {
    HardwareError::Transport(format!("{:?}", err.kind()))
}

/// AD8318 detector sampled through an AD7887 12-bit ADC.
///
/// `SpiDevice` has no notion of a deadline, so the bus implementation is
/// what bounds a transfer (spidev ioctls return once the clocks are out).
#[derive(Debug)]
pub struct Ad7887<B> {
    bus: B,
    control: Control,
    clock_hz: u32,
}

impl<B> Ad7887<B>
where
    B: SpiDevice<u8> + BusClock,
{
    pub fn new(mut bus: B, control: Control) -> Result<Self, HardwareError> {
        bus.set_clock_hz(DEFAULT_BUS_CLOCK_HZ)?;
        Ok(Self {
            bus,
            control,
            clock_hz: DEFAULT_BUS_CLOCK_HZ,
        })
    }

    /// Clock out the control word and read back one conversion
    pub fn convert(&mut self) -> Result<AdcCode, HardwareError> {
        let mut frame = [self.control.bits(); 2];
        self.bus.transfer_in_place(&mut frame).map_err(bus_error)?;
        decode_frame(frame)
    }

    pub fn release(self) -> B {
        self.bus
    }
}

impl<B> SensorSource for Ad7887<B>
where
    B: SpiDevice<u8> + BusClock + Send,
{
    fn read_raw(&mut self) -> Result<RawSample, HardwareError> {
        let code = self.convert()?;
        Ok(RawSample::new(code))
    }

    fn bus_clock_hz(&self) -> u32 {
        self.clock_hz
    }

    fn set_bus_clock_hz(&mut self, hz: u32) -> Result<(), HardwareError> {
        self.bus.set_clock_hz(hz)?;
        self.clock_hz = hz;
        Ok(())
    }

    fn max_bus_clock_hz(&self) -> u32 {
        AD7887_MAX_CLOCK_HZ
    }

    fn info(&self) -> SensorInfo {
        SensorInfo {
            name: "AD8318/AD7887".to_string(),
            resolution_bits: 12,
        }
    }
}
