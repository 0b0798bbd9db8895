//! SPI-mode SD card simulator.
//!
//! Answers the command subset the card driver uses (CMD0, CMD8, CMD55 +
//! ACMD41, CMD58, CMD17, CMD18, CMD12) byte by byte, serving blocks from an
//! in-memory image. Clone the simulator before handing it to [`MockSpi`] to
//! keep a handle for assertions.
//!
//! [`MockSpi`]: super::MockSpi

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::{locked, Responder};

const BLOCK: usize = 512;
const R1_IDLE: u8 = 0x01;
const R1_READY: u8 = 0x00;
const R1_ILLEGAL: u8 = 0x04;
const DATA_TOKEN: u8 = 0xFE;

struct SdState {
    image: Vec<u8>,
    block_addressing: bool,
    idle: bool,
    app_cmd: bool,
    init_polls_left: u32,
    frame: Vec<u8>,
    pending: VecDeque<u8>,
    streaming: Option<u32>,
    commands: Vec<u8>,
}

/// Byte-level SD card model.
#[derive(Clone)]
pub struct SdCardSim {
    state: Arc<Mutex<SdState>>,
}

impl SdCardSim {
    /// SDHC card (block addressing) backed by `image`.
    pub fn sdhc(image: Vec<u8>) -> Self {
        Self::build(image, true)
    }

    /// Standard-capacity card (byte addressing) backed by `image`.
    pub fn sdsc(image: Vec<u8>) -> Self {
        Self::build(image, false)
    }

    fn build(image: Vec<u8>, block_addressing: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(SdState {
                image,
                block_addressing,
                idle: true,
                app_cmd: false,
                init_polls_left: 2,
                frame: Vec::with_capacity(6),
                pending: VecDeque::new(),
                streaming: None,
                commands: Vec::new(),
            })),
        }
    }

    /// Command indices received so far (ACMD41 shows up as 41).
    pub fn commands(&self) -> Vec<u8> {
        locked(&self.state).commands.clone()
    }
}

impl SdState {
    fn block_bytes(&self, block: u32) -> Vec<u8> {
        let start = usize::try_from(block).unwrap_or(usize::MAX).saturating_mul(BLOCK);
        (0..BLOCK)
            .map(|i| {
                self.image
                    .get(start.saturating_add(i))
                    .copied()
                    .unwrap_or(0)
            })
            .collect()
    }

    fn queue_block(&mut self, block: u32) {
        self.pending.push_back(0xFF);
        self.pending.push_back(DATA_TOKEN);
        let data = self.block_bytes(block);
        self.pending.extend(data);
        self.pending.extend([0x00, 0x00]);
    }

    fn respond(&mut self, bytes: &[u8]) {
        self.pending.push_back(0xFF);
        self.pending.extend(bytes.iter().copied());
    }

    fn block_of(&self, arg: u32) -> u32 {
        if self.block_addressing {
            arg
        } else {
            arg / BLOCK as u32
        }
    }

    fn process(&mut self) {
        let frame = core::mem::take(&mut self.frame);
        let cmd = frame.first().copied().unwrap_or(0) & 0x3F;
        let arg = frame
            .get(1..5)
            .map_or(0, |b| b.iter().fold(0u32, |acc, &x| (acc << 8) | u32::from(x)));
        self.commands.push(cmd);
        self.pending.clear();

        let app = core::mem::take(&mut self.app_cmd);
        let r1 = if self.idle { R1_IDLE } else { R1_READY };
        match cmd {
            0 => {
                self.idle = true;
                self.streaming = None;
                self.respond(&[R1_IDLE]);
            }
            8 => {
                let echo = arg.to_be_bytes();
                self.respond(&[r1, 0x00, 0x00, echo[2] & 0x0F, echo[3]]);
            }
            55 => {
                self.app_cmd = true;
                self.respond(&[r1]);
            }
            41 if app => {
                if self.init_polls_left == 0 {
                    self.idle = false;
                } else {
                    self.init_polls_left = self.init_polls_left.saturating_sub(1);
                }
                let r1 = if self.idle { R1_IDLE } else { R1_READY };
                self.respond(&[r1]);
            }
            58 => {
                let ccs = if self.block_addressing { 0xC0 } else { 0x80 };
                self.respond(&[r1, ccs, 0xFF, 0x80, 0x00]);
            }
            17 => {
                self.respond(&[R1_READY]);
                let block = self.block_of(arg);
                self.queue_block(block);
            }
            18 => {
                self.respond(&[R1_READY]);
                let block = self.block_of(arg);
                self.queue_block(block);
                self.streaming = Some(block.saturating_add(1));
            }
            12 => {
                self.streaming = None;
                // Stuff byte, then R1.
                self.respond(&[0xFF, R1_READY]);
            }
            _ => self.respond(&[R1_ILLEGAL]),
        }
    }
}

impl Responder for SdCardSim {
    #[allow(clippy::arithmetic_side_effects)] // frame length bounded by 6
    fn exchange(&mut self, out: u8) -> u8 {
        let mut state = locked(&self.state);
        if !state.frame.is_empty() || (out != 0xFF && out & 0xC0 == 0x40) {
            state.frame.push(out);
            if state.frame.len() == 6 {
                state.process();
            }
            return 0xFF;
        }
        if state.pending.is_empty() {
            if let Some(next) = state.streaming {
                state.queue_block(next);
                state.streaming = Some(next.saturating_add(1));
            }
        }
        state.pending.pop_front().unwrap_or(0xFF)
    }
}
