use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use crossbeam::channel::{Receiver, RecvTimeoutError};
use ringbuf::traits::Consumer;

use crate::command::Command;
use crate::player::Player;

use anyhow::{anyhow, Context, Result};

/// Negotiated output device and stream configuration. The player is built
/// against the rate reported here, not the other way around.
pub struct OutputDevice {
    device: cpal::Device,
    config: StreamConfig,
    sample_format: SampleFormat,
}

impl OutputDevice {
    pub fn open_default() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("no output device available"))?;
        let supported = device
            .default_output_config()
            .context("no default output config")?;
        let sample_format = supported.sample_format();
        let mut config: StreamConfig = supported.into();
        config.channels = 2;
        log::info!(
            "output device: {} at {} Hz",
            device.name().unwrap_or_else(|_| "<unknown>".into()),
            config.sample_rate.0
        );
        Ok(Self {
            device,
            config,
            sample_format,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }
}

/// Drive the player from the device callback until a stop signal arrives.
/// Blocks the calling thread; the stream is torn down on return.
pub fn run_audio_stream<C>(
    output: OutputDevice,
    mut player: Player,
    mut commands: C,
    stop_rx: Receiver<()>,
) -> Result<()>
where
    C: Consumer<Item = Command> + Send + 'static,
{
    let callback = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        // Commands are drained at block boundaries only; mid-block state is
        // never touched from outside the callback.
        while let Some(cmd) = commands.try_pop() {
            player.handle_command(cmd);
        }
        player.process_block(data);
    };

    let stream = match output.sample_format {
        SampleFormat::F32 => output
            .device
            .build_output_stream(
                &output.config,
                callback,
                |err| log::error!("stream error: {err}"),
                None,
            )
            .context("failed to build output stream")?,
        other => return Err(anyhow!("unsupported sample format {other}")),
    };
    stream.play().context("failed to start output stream")?;

    // Keep the stream alive until a stop signal is received
    wait_for_stop(&stop_rx);
    Ok(())
}

/// Park until a stop signal arrives. A disconnected channel means every
/// sender is gone, which is also a shutdown.
fn wait_for_stop(stop_rx: &Receiver<()>) {
    loop {
        match stop_rx.recv_timeout(std::time::Duration::from_millis(100)) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
}

// The actual stop logic is handled via the channel in `run_audio_stream`.
pub fn stop_audio_stream(sender: &crossbeam::channel::Sender<()>) {
    let _ = sender.send(());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::unbounded;
    use std::time::{Duration, Instant};

    #[test]
    fn stop_signal_ends_the_wait() {
        let (tx, rx) = unbounded();
        stop_audio_stream(&tx);
        let start = Instant::now();
        wait_for_stop(&rx);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn dropped_senders_end_the_wait() {
        let (tx, rx) = unbounded::<()>();
        drop(tx);
        let start = Instant::now();
        wait_for_stop(&rx);
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
