//! Live capture/playback sessions and gated real-time decoding
//!
//! Devices are collaborators behind [`CaptureDevice`] and [`PlaybackDevice`]. A
//! session guard opens the device and closes it on drop, so the handle is released
//! on every exit path: end marker, stop signal, source exhaustion or error.

use crate::block::{AudioBlock, BlockSink, BlockSource};
use crate::config::ModemConfig;
use crate::demodulator::{Demodulator, ReceiverEvent};
use crate::error::{ModemError, Result};
use crate::modulator::{Modulator, Pacing};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// A live input yielding one symbol-length block per read
pub trait CaptureDevice {
    fn open(&mut self, config: &ModemConfig) -> Result<()>;

    /// Block until the next block is available; `None` once the device stops
    fn read_block(&mut self) -> Result<Option<AudioBlock>>;

    fn close(&mut self);
}

/// A live output accepting one block per write
pub trait PlaybackDevice {
    fn open(&mut self, config: &ModemConfig) -> Result<()>;

    fn write_block(&mut self, block: &AudioBlock) -> Result<()>;

    fn close(&mut self);
}

/// Open capture device; closed when dropped
pub struct CaptureSession<'a, D: CaptureDevice + ?Sized> {
    device: &'a mut D,
    block_len: usize,
}

impl<'a, D: CaptureDevice + ?Sized> CaptureSession<'a, D> {
    pub fn open(device: &'a mut D, config: &ModemConfig) -> Result<Self> {
        device.open(config)?;
        log::debug!("capture session opened");
        Ok(Self {
            device,
            block_len: config.samples_per_symbol(),
        })
    }
}

impl<D: CaptureDevice + ?Sized> BlockSource for CaptureSession<'_, D> {
    fn next_block(&mut self) -> Result<Option<AudioBlock>> {
        match self.device.read_block()? {
            Some(block) if block.len() != self.block_len => Err(ModemError::InvalidBlockSize {
                expected: self.block_len,
                actual: block.len(),
            }),
            other => Ok(other),
        }
    }
}

impl<D: CaptureDevice + ?Sized> Drop for CaptureSession<'_, D> {
    fn drop(&mut self) {
        self.device.close();
        log::debug!("capture session closed");
    }
}

/// Open playback device; closed when dropped
pub struct PlaybackSession<'a, D: PlaybackDevice + ?Sized> {
    device: &'a mut D,
}

impl<'a, D: PlaybackDevice + ?Sized> PlaybackSession<'a, D> {
    pub fn open(device: &'a mut D, config: &ModemConfig) -> Result<Self> {
        device.open(config)?;
        log::debug!("playback session opened");
        Ok(Self { device })
    }
}

impl<D: PlaybackDevice + ?Sized> BlockSink for PlaybackSession<'_, D> {
    fn write_block(&mut self, block: &AudioBlock) -> Result<()> {
        self.device.write_block(block)
    }
}

impl<D: PlaybackDevice + ?Sized> Drop for PlaybackSession<'_, D> {
    fn drop(&mut self) {
        self.device.close();
        log::debug!("playback session closed");
    }
}

/// Play one frame on `device` inside a scoped session
pub fn play<D: PlaybackDevice + ?Sized>(
    modulator: &Modulator,
    device: &mut D,
    payload: &[u8],
    pacing: Pacing,
) -> Result<usize> {
    let mut session = PlaybackSession::open(device, modulator.config())?;
    modulator.transmit(payload, &mut session, pacing)
}

/// Level of the out-of-band control signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateSignal {
    /// No start trigger yet
    Closed,
    /// Start trigger seen
    Open,
    /// Stop requested; end the session
    Stop,
}

/// Out-of-band start/stop control polled once per block
pub trait Gate {
    fn poll(&mut self) -> GateSignal;
}

/// Gate that is always open and never stops
#[derive(Debug, Default, Clone, Copy)]
pub struct Ungated;

impl Gate for Ungated {
    fn poll(&mut self) -> GateSignal {
        GateSignal::Open
    }
}

const GATE_CLOSED: u8 = 0;
const GATE_OPEN: u8 = 1;
const GATE_STOP: u8 = 2;

/// Gate driven from another thread through a [`GateHandle`]
#[derive(Debug, Clone)]
pub struct SharedGate {
    state: Arc<AtomicU8>,
}

impl SharedGate {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(GATE_CLOSED)),
        }
    }

    pub fn handle(&self) -> GateHandle {
        GateHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for SharedGate {
    fn default() -> Self {
        Self::new()
    }
}

impl Gate for SharedGate {
    fn poll(&mut self) -> GateSignal {
        match self.state.load(Ordering::Acquire) {
            GATE_CLOSED => GateSignal::Closed,
            GATE_OPEN => GateSignal::Open,
            _ => GateSignal::Stop,
        }
    }
}

/// Control side of a [`SharedGate`]
#[derive(Debug, Clone)]
pub struct GateHandle {
    state: Arc<AtomicU8>,
}

impl GateHandle {
    /// Open the gate; ignored once stopped
    pub fn open(&self) {
        let _ = self.state.compare_exchange(
            GATE_CLOSED,
            GATE_OPEN,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub fn stop(&self) {
        self.state.store(GATE_STOP, Ordering::Release);
    }
}

/// How a live session decides when to start listening for a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStrategy {
    /// Marker detection alone
    #[default]
    Automatic,
    /// Discard blocks until the gate opens, then search for the start marker
    Gated,
}

/// Decodes one frame from a live capture device
///
/// End detection is always frequency based. A `Stop` from the gate ends the session
/// with whatever was decoded, reported according to the demodulator's mode.
pub struct RealtimeDecoder {
    demodulator: Demodulator,
    strategy: SyncStrategy,
}

impl RealtimeDecoder {
    pub fn new(demodulator: Demodulator, strategy: SyncStrategy) -> Self {
        Self {
            demodulator,
            strategy,
        }
    }

    pub fn strategy(&self) -> SyncStrategy {
        self.strategy
    }

    pub fn demodulator(&self) -> &Demodulator {
        &self.demodulator
    }

    pub fn run<D, G>(&mut self, device: &mut D, gate: &mut G) -> Result<Vec<u8>>
    where
        D: CaptureDevice + ?Sized,
        G: Gate + ?Sized,
    {
        let mut session = CaptureSession::open(device, self.demodulator.config())?;
        let mut receiver = self.demodulator.receiver();
        let mut listening = self.strategy == SyncStrategy::Automatic;
        let mut blocks = 0usize;

        loop {
            match gate.poll() {
                GateSignal::Stop => {
                    log::info!("stop requested after {} blocks", blocks);
                    break;
                }
                GateSignal::Open if !listening => {
                    log::info!("gate opened after {} blocks, searching for start marker", blocks);
                    listening = true;
                }
                _ => {}
            }

            let Some(block) = session.next_block()? else {
                log::debug!("capture ended after {} blocks", blocks);
                break;
            };
            blocks += 1;

            if !listening {
                continue;
            }

            let frequency = self.demodulator.classify(&block);
            match receiver.push(frequency) {
                ReceiverEvent::FrameStarted => log::info!("start marker detected"),
                ReceiverEvent::FrameEnded => {
                    log::info!("end marker detected");
                    break;
                }
                _ => {}
            }
        }

        drop(session);
        receiver.finish(self.demodulator.mode())
    }
}
